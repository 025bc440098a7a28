use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::Message;

use super::events::{
    opcode, GatewayEvent, GatewayMessage, HelloData, IdentifyData, IdentifyProperties,
};
use super::heartbeat::Heartbeat;
use super::state::SessionState;
use super::{intents, reducer, transport};
use crate::config::Config;
use crate::error::GatewayError;

/// Everything a session task needs, handed over by the facade at spawn time.
pub(crate) struct SessionContext {
    pub config: Config,
    pub token: String,
    pub state: Arc<SessionState>,
    pub events: broadcast::Sender<GatewayEvent>,
}

/// One-shot resolved when the first READY of this task has been reduced, or
/// when the handshake dies first.
type ReadyWaiter = oneshot::Sender<Result<(), GatewayError>>;

enum LoopExit {
    /// Explicit disconnect; stop without another event.
    Shutdown,
    /// Transport loss or error; no automatic retry once the pending connect
    /// (if any) has been rejected.
    Closed(Option<GatewayError>),
    /// Server invalidated the session or the link went zombie; tear down and
    /// re-identify from scratch.
    Reconnect(&'static str),
}

/// Session supervisor: runs one connection at a time, re-identifying with
/// jittered exponential backoff when the server invalidates the session or
/// heartbeat ACKs stop coming.
pub(crate) async fn run(
    ctx: SessionContext,
    mut shutdown: mpsc::Receiver<()>,
    ready_tx: ReadyWaiter,
) {
    let mut pending_ready = Some(ready_tx);
    let mut attempt: u32 = 0;

    loop {
        let exit = run_connection(&ctx, &mut shutdown, &mut pending_ready, &mut attempt).await;
        ctx.state.reset_lifecycle();

        match exit {
            LoopExit::Shutdown => break,
            LoopExit::Closed(err) => {
                if let Some(tx) = pending_ready.take() {
                    let _ = tx.send(Err(err.unwrap_or_else(|| {
                        GatewayError::Connection("connection closed before ready".to_string())
                    })));
                } else {
                    if let Some(err) = err {
                        tracing::warn!("gateway connection lost: {err}");
                    }
                    let _ = ctx.events.send(GatewayEvent::Closed);
                }
                break;
            }
            LoopExit::Reconnect(reason) => {
                let _ = ctx.events.send(GatewayEvent::Reconnecting {
                    reason: reason.to_string(),
                });
                attempt += 1;
                let delay = backoff_delay(&ctx.config, attempt);
                tracing::info!("re-identifying in {delay:?} ({reason})");
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    ctx.state.reset_lifecycle();
    if let Some(tx) = pending_ready.take() {
        let _ = tx.send(Err(GatewayError::Connection(
            "disconnected before ready".to_string(),
        )));
    }
}

async fn run_connection(
    ctx: &SessionContext,
    shutdown: &mut mpsc::Receiver<()>,
    pending_ready: &mut Option<ReadyWaiter>,
    attempt: &mut u32,
) -> LoopExit {
    let stream = match transport::connect(&ctx.config.gateway_url).await {
        Ok(stream) => stream,
        Err(err) => {
            if pending_ready.is_some() {
                return LoopExit::Closed(Some(err));
            }
            tracing::warn!("gateway reconnect failed: {err}");
            return LoopExit::Reconnect("transport error during reconnect");
        }
    };
    ctx.state.set_connected(true);

    let (mut sink, mut frames) = stream.split();
    let mut heartbeat = Heartbeat::new(ctx.config.max_missed_acks);
    let mut identify_delay: Option<Pin<Box<Sleep>>> = None;
    let mut last_seq: Option<u64> = None;

    let exit = loop {
        tokio::select! {
            _ = shutdown.recv() => break LoopExit::Shutdown,

            _ = heartbeat.tick() => {
                if heartbeat.beat() {
                    break LoopExit::Reconnect("heartbeat acks missed");
                }
                if let Err(err) = send_heartbeat(&mut sink, last_seq).await {
                    break LoopExit::Closed(Some(err));
                }
            }

            _ = wait_identify(&mut identify_delay) => {
                identify_delay = None;
                if let Err(err) = send_identify(&mut sink, ctx).await {
                    break LoopExit::Closed(Some(err));
                }
            }

            frame = frames.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(err)) => break LoopExit::Closed(Some(err.into())),
                    None => break LoopExit::Closed(None),
                };
                if let Message::Close(frame) = &msg {
                    tracing::debug!(?frame, "gateway closed the connection");
                    break LoopExit::Closed(None);
                }
                let envelope = match transport::decode_frame(&msg) {
                    Ok(Some(envelope)) => envelope,
                    // Ping/pong and other control frames.
                    Ok(None) => continue,
                    Err(err) => {
                        // Frame-level decode failures are recovered locally:
                        // drop the frame, keep the connection.
                        tracing::warn!("dropping undecodable frame: {err}");
                        continue;
                    }
                };
                match handle_envelope(
                    ctx,
                    envelope,
                    &mut sink,
                    &mut heartbeat,
                    &mut identify_delay,
                    &mut last_seq,
                    pending_ready,
                    attempt,
                )
                .await
                {
                    Ok(None) => {}
                    Ok(Some(exit)) => break exit,
                    Err(err) => break LoopExit::Closed(Some(err)),
                }
            }
        }
    };

    let _ = sink.close().await;
    ctx.state.set_connected(false);
    exit
}

/// Pends until the deferred-IDENTIFY timer elapses; forever while unarmed.
async fn wait_identify(delay: &mut Option<Pin<Box<Sleep>>>) {
    match delay.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_envelope(
    ctx: &SessionContext,
    envelope: GatewayMessage,
    sink: &mut SplitSink<transport::WsStream, Message>,
    heartbeat: &mut Heartbeat,
    identify_delay: &mut Option<Pin<Box<Sleep>>>,
    last_seq: &mut Option<u64>,
    pending_ready: &mut Option<ReadyWaiter>,
    attempt: &mut u32,
) -> Result<Option<LoopExit>, GatewayError> {
    match envelope.op {
        opcode::HELLO => {
            let hello: HelloData =
                match serde_json::from_value(envelope.d.unwrap_or(serde_json::Value::Null)) {
                    Ok(hello) => hello,
                    Err(err) => {
                        tracing::warn!("dropping malformed HELLO payload: {err}");
                        return Ok(None);
                    }
                };
            tracing::debug!(interval_ms = hello.heartbeat_interval, "gateway HELLO");
            heartbeat.start(hello.heartbeat_interval);
            heartbeat.beat();
            send_heartbeat(sink, *last_seq).await?;
            // IDENTIFY goes out after a short settling delay rather than
            // immediately on transport establishment.
            *identify_delay = Some(Box::pin(tokio::time::sleep(ctx.config.identify_delay)));
        }
        opcode::HEARTBEAT => {
            // Server-requested beat; answer immediately with the last seq.
            send_heartbeat(sink, *last_seq).await?;
        }
        opcode::HEARTBEAT_ACK => {
            heartbeat.ack();
        }
        opcode::DISPATCH => {
            // Sequence updates first, unconditionally, whenever present.
            if let Some(seq) = envelope.s {
                *last_seq = Some(seq);
            }
            if let (Some(event), Some(data)) = (envelope.t, envelope.d) {
                match reducer::dispatch(&ctx.state, &event, data) {
                    Ok(Some(domain_event)) => {
                        if matches!(domain_event, GatewayEvent::Ready { .. }) {
                            *attempt = 0;
                            if let Some(tx) = pending_ready.take() {
                                let _ = tx.send(Ok(()));
                            }
                        }
                        let _ = ctx.events.send(domain_event);
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!("dropping {event} dispatch: {err}"),
                }
            }
        }
        opcode::INVALID_SESSION => {
            tracing::warn!("gateway invalidated the session; re-identifying");
            return Ok(Some(LoopExit::Reconnect("session invalidated by server")));
        }
        other => tracing::debug!("ignoring unknown opcode {other}"),
    }
    Ok(None)
}

async fn send_heartbeat(
    sink: &mut SplitSink<transport::WsStream, Message>,
    last_seq: Option<u64>,
) -> Result<(), GatewayError> {
    let msg = GatewayMessage {
        op: opcode::HEARTBEAT,
        d: Some(serde_json::json!(last_seq)),
        s: None,
        t: None,
    };
    sink.send(transport::encode_frame(&msg)?).await?;
    Ok(())
}

async fn send_identify(
    sink: &mut SplitSink<transport::WsStream, Message>,
    ctx: &SessionContext,
) -> Result<(), GatewayError> {
    let identify = IdentifyData {
        token: ctx.token.clone(),
        intents: intents::default_intents(),
        properties: IdentifyProperties {
            os: std::env::consts::OS.to_string(),
            browser: ctx.config.client_name.clone(),
            device: ctx.config.client_name.clone(),
        },
    };
    let msg = GatewayMessage {
        op: opcode::IDENTIFY,
        d: Some(serde_json::to_value(identify)?),
        s: None,
        t: None,
    };
    tracing::debug!("sending IDENTIFY");
    sink.send(transport::encode_frame(&msg)?).await?;
    Ok(())
}

/// Exponential backoff with jitter between automatic re-identify attempts,
/// bounding how hard a misbehaving server gets hammered.
fn backoff_delay(config: &Config, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(5);
    let exp = config
        .reconnect_base
        .saturating_mul(1u32 << shift)
        .min(config.reconnect_cap);
    let jitter = rand::thread_rng().gen_range(0.7..=1.3);
    let millis = (exp.as_millis() as f64 * jitter)
        .min(config.reconnect_cap.as_millis() as f64)
        .max(1.0);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_respects_cap() {
        let config = Config {
            reconnect_base: Duration::from_millis(100),
            reconnect_cap: Duration::from_millis(1000),
            ..Config::default()
        };
        for attempt in 1..10 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay >= Duration::from_millis(1));
            assert!(delay <= Duration::from_millis(1000));
        }
        // First attempt stays in the neighborhood of the base.
        let first = backoff_delay(&config, 1);
        assert!(first <= Duration::from_millis(130));
    }
}
