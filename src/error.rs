use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    /// No credential stored before `connect()`.
    MissingCredential,
    /// READY was not observed within the handshake window.
    HandshakeTimeout,
    /// Socket-level failure before or during the session.
    Connection(String),
    /// Malformed or non-decompressible frame or payload.
    Decode(String),
    /// The server invalidated the session (opcode 9).
    InvalidSession,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::MissingCredential => {
                write!(f, "no credential set; call set_credential before connect")
            }
            GatewayError::HandshakeTimeout => {
                write!(f, "gateway did not become ready within the handshake window")
            }
            GatewayError::Connection(msg) => write!(f, "gateway connection error: {msg}"),
            GatewayError::Decode(msg) => write!(f, "gateway decode error: {msg}"),
            GatewayError::InvalidSession => write!(f, "gateway session invalidated by server"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Decode(e.to_string())
    }
}
