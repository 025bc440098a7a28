use std::io::Read;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::events::GatewayMessage;
use crate::error::GatewayError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the WebSocket connection. No retries here; reconnect policy lives
/// with the session supervisor.
pub(crate) async fn connect(url: &str) -> Result<WsStream, GatewayError> {
    let (stream, response) = connect_async(url).await?;
    tracing::debug!(status = %response.status(), "gateway socket open");
    Ok(stream)
}

/// Serialize an outbound payload to a JSON text frame.
pub(crate) fn encode_frame(msg: &GatewayMessage) -> Result<Message, GatewayError> {
    Ok(Message::Text(serde_json::to_string(msg)?.into()))
}

/// Decode one inbound frame into a payload envelope. Text frames are parsed
/// directly; binary frames are zlib-inflated when they carry the zlib magic,
/// otherwise treated as raw JSON bytes. Control frames yield `None`.
pub(crate) fn decode_frame(msg: &Message) -> Result<Option<GatewayMessage>, GatewayError> {
    match msg {
        Message::Text(text) => Ok(Some(serde_json::from_str(text.as_str())?)),
        Message::Binary(bytes) => {
            let json = if looks_like_zlib(bytes) {
                inflate(bytes)?
            } else {
                bytes.to_vec()
            };
            Ok(Some(serde_json::from_slice(&json)?))
        }
        _ => Ok(None),
    }
}

/// Zlib stream header: 0x78 followed by one of the standard flag bytes.
fn looks_like_zlib(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x78 && matches!(bytes[1], 0x01 | 0x5e | 0x9c | 0xda)
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
