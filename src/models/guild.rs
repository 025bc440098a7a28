use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Whether the authenticated user owns this guild.
    #[serde(default)]
    pub owner: bool,
    /// Permission bitmask for the authenticated user, as sent on the wire.
    #[serde(default)]
    pub permissions: Option<String>,
}
