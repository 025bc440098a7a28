use serde::{Deserialize, Serialize};

use crate::models::{Guild, User};

/// Opcodes for gateway messages.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Relationship type codes. Only friends are retained.
pub mod relationship {
    pub const FRIEND: u8 = 1;
}

/// Gateway payload envelope: operation code, optional data, optional
/// sequence number, optional dispatch event name.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// HELLO (op 10) payload data.
#[derive(Debug, Deserialize)]
pub struct HelloData {
    pub heartbeat_interval: u64,
}

/// IDENTIFY (op 2) payload data.
#[derive(Debug, Serialize)]
pub struct IdentifyData {
    pub token: String,
    pub intents: u64,
    pub properties: IdentifyProperties,
}

#[derive(Debug, Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// READY dispatch payload: the bulk session snapshot.
#[derive(Debug, Deserialize)]
pub struct ReadyData {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<GuildCreateData>,
    #[serde(default)]
    pub private_channels: Vec<ChannelData>,
    #[serde(default)]
    pub relationships: Vec<RelationshipData>,
}

/// GUILD_CREATE dispatch payload; also the shape of each guild entry in the
/// READY snapshot.
#[derive(Debug, Deserialize)]
pub struct GuildCreateData {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default)]
    pub channels: Vec<ChannelData>,
}

/// Channel entry as it appears on the wire, before routing into the
/// guild-channel or DM mapping.
#[derive(Debug, Deserialize)]
pub struct ChannelData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub recipients: Vec<User>,
}

impl ChannelData {
    /// DM and group-DM channels are folded into their own mapping, apart
    /// from guild-scoped channels.
    pub fn is_direct(&self) -> bool {
        matches!(
            self.kind,
            crate::models::channel::kind::DM | crate::models::channel::kind::GROUP_DM
        )
    }
}

/// RELATIONSHIP_ADD dispatch payload; also the shape of each relationship
/// entry in the READY snapshot.
#[derive(Debug, Deserialize)]
pub struct RelationshipData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    pub user: User,
}

impl RelationshipData {
    pub fn is_friend(&self) -> bool {
        self.kind == relationship::FRIEND
    }

    /// Relationship entries are keyed by their own id when present, falling
    /// back to the user id (the two coincide on the real gateway).
    pub fn key(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.user.id.clone())
    }
}

/// Typed domain events emitted to facade subscribers.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The READY snapshot has been fully reduced; session state is populated.
    Ready { user: User, guilds: Vec<Guild> },
    /// A MESSAGE_CREATE dispatch, forwarded verbatim.
    Message(serde_json::Value),
    /// The session is being torn down and automatically re-identified.
    Reconnecting { reason: String },
    /// The connection ended and no automatic reconnect will follow.
    Closed,
}
