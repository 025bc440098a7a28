#![allow(dead_code)]

use std::io::Write;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use cordlink::Config;

const WAIT: Duration = Duration::from_secs(5);

/// A mock gateway server on an ephemeral local port. Accepts any number of
/// client connections; each one is handed back as a [`GatewayConn`] the test
/// drives by hand (send HELLO, read IDENTIFY, send READY, ...).
pub struct MockGateway {
    url: String,
    accepted: mpsc::UnboundedReceiver<GatewayConn>,
}

impl MockGateway {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conn_tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

                tokio::spawn(async move {
                    let (mut sink, mut stream) = ws.split();
                    loop {
                        tokio::select! {
                            outbound = out_rx.recv() => match outbound {
                                Some(msg) => {
                                    if sink.send(msg).await.is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            },
                            frame = stream.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    let Ok(value) = serde_json::from_str::<Value>(text.as_str())
                                    else {
                                        continue;
                                    };
                                    if in_tx.send(value).is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                _ => {}
                            },
                        }
                    }
                });

                if conn_tx
                    .send(GatewayConn {
                        inbound: in_rx,
                        outbound: out_tx,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{}", addr.port()),
            accepted,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait (bounded) for the next client connection.
    pub async fn accept(&mut self) -> GatewayConn {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no client connection within the wait window")
            .expect("listener task stopped")
    }
}

/// One accepted client connection, driven frame by frame from the test.
pub struct GatewayConn {
    inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl GatewayConn {
    pub fn send(&self, payload: Value) {
        self.outbound
            .send(Message::Text(payload.to_string().into()))
            .expect("mock connection closed");
    }

    /// Send a payload as a zlib-deflated binary frame.
    pub fn send_zlib(&self, payload: Value) {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(payload.to_string().as_bytes()).unwrap();
        let compressed = enc.finish().unwrap();
        self.outbound
            .send(Message::Binary(compressed.into()))
            .expect("mock connection closed");
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    /// Next client frame, parsed as JSON.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .expect("no client frame within the wait window")
            .expect("client connection closed")
    }

    /// Next client frame with the given opcode, skipping frames with other
    /// opcodes (heartbeats keep flowing during a handshake).
    pub async fn recv_op(&mut self, op: u8) -> Value {
        loop {
            let frame = self.recv().await;
            if frame["op"] == op {
                return frame;
            }
        }
    }

    /// Wait for the client side of this connection to go away, discarding
    /// any frames still in flight.
    pub async fn expect_closed(&mut self) {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            match tokio::time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => return,
                Err(_) => panic!("client connection still open after the wait window"),
            }
        }
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.send(json!({
            "op": 10,
            "d": { "heartbeat_interval": heartbeat_interval_ms }
        }));
    }

    pub fn dispatch(&self, event: &str, seq: u64, data: Value) {
        self.send(json!({ "op": 0, "t": event, "s": seq, "d": data }));
    }

    pub fn ready(&self, data: Value) {
        self.dispatch("READY", 1, data);
    }
}

/// Client config pointed at the mock gateway, with timings tightened for
/// tests.
pub fn test_config(url: &str) -> Config {
    Config {
        gateway_url: url.to_string(),
        client_name: "cordlink-test".to_string(),
        handshake_timeout: Duration::from_secs(5),
        identify_delay: Duration::from_millis(10),
        max_missed_acks: 3,
        reconnect_base: Duration::from_millis(50),
        reconnect_cap: Duration::from_millis(200),
    }
}

/// Poll until the condition holds, failing the test after the wait window.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if condition() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within the wait window");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
