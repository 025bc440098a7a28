use std::time::Duration;

/// Runtime configuration for the gateway client. Every field can be
/// overridden from the environment; unparsable values fall back to the
/// default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Versioned gateway endpoint.
    pub gateway_url: String,
    /// Client name reported in the IDENTIFY properties object.
    pub client_name: String,
    /// How long `connect()` waits for READY before failing.
    pub handshake_timeout: Duration,
    /// Settling delay between HELLO and the IDENTIFY send. Sending
    /// immediately after transport establishment risks loss on some links.
    pub identify_delay: Duration,
    /// Consecutive unacknowledged heartbeats before the connection is
    /// treated as a zombie and torn down.
    pub max_missed_acks: u32,
    /// Base delay for the reconnect backoff.
    pub reconnect_base: Duration,
    /// Upper bound for the reconnect backoff.
    pub reconnect_cap: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
            client_name: "cordlink".to_string(),
            handshake_timeout: Duration::from_secs(10),
            identify_delay: Duration::from_millis(250),
            max_missed_acks: 3,
            reconnect_base: Duration::from_secs(1),
            reconnect_cap: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            gateway_url: std::env::var("CORDLINK_GATEWAY_URL")
                .unwrap_or(defaults.gateway_url),
            client_name: std::env::var("CORDLINK_CLIENT_NAME")
                .unwrap_or(defaults.client_name),
            handshake_timeout: env_millis(
                "CORDLINK_HANDSHAKE_TIMEOUT_MS",
                defaults.handshake_timeout,
            ),
            identify_delay: env_millis("CORDLINK_IDENTIFY_DELAY_MS", defaults.identify_delay),
            max_missed_acks: std::env::var("CORDLINK_MAX_MISSED_ACKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_missed_acks),
            reconnect_base: env_millis("CORDLINK_RECONNECT_BASE_MS", defaults.reconnect_base),
            reconnect_cap: env_millis("CORDLINK_RECONNECT_CAP_MS", defaults.reconnect_cap),
        }
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
