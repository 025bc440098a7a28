pub mod events;
pub mod intents;

mod heartbeat;
mod reducer;
mod session;
mod state;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::{Channel, Guild, User};
use self::events::GatewayEvent;
use self::state::SessionState;

/// How long a teardown waits for the session task to exit on its own before
/// aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle to the spawned session task for the one active connection.
struct ConnectionHandle {
    task: JoinHandle<()>,
    shutdown: mpsc::Sender<()>,
}

impl ConnectionHandle {
    async fn stop(self) {
        let _ = self.shutdown.try_send(());
        let abort = self.task.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.task).await.is_err() {
            abort.abort();
        }
    }
}

/// Persistent gateway client: opcode handshake, heartbeat upkeep, and an
/// in-memory session snapshot (guilds, channels, DMs, friends) kept current
/// by dispatch events.
///
/// At most one connection is active per client. All snapshot accessors are
/// read-only views over state owned by the session task.
pub struct GatewayClient {
    config: Config,
    token: RwLock<Option<String>>,
    state: Arc<SessionState>,
    events: broadcast::Sender<GatewayEvent>,
    conn: Mutex<Option<ConnectionHandle>>,
}

impl GatewayClient {
    pub fn new(config: Config) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            token: RwLock::new(None),
            state: Arc::new(SessionState::new()),
            events,
            conn: Mutex::new(None),
        }
    }

    /// Store the opaque bearer token used by IDENTIFY. Takes effect on the
    /// next `connect()`.
    pub async fn set_credential(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Subscribe to domain events (`Ready`, `Message`, `Reconnecting`,
    /// `Closed`). Each receiver sees every event from subscription onward.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Open the gateway connection and resolve once the READY snapshot has
    /// been fully reduced into session state.
    ///
    /// Fails with `MissingCredential` (no network I/O) when no token is
    /// stored, `HandshakeTimeout` when READY does not arrive within the
    /// configured window, and `Connection` on transport failure before
    /// READY. Any previously active connection is torn down first, so at
    /// most one handshake is ever in flight.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or(GatewayError::MissingCredential)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut conn = self.conn.lock().await;
            if let Some(previous) = conn.take() {
                previous.stop().await;
            }
            self.state.reset_lifecycle();
            self.state.clear();

            let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
            let ctx = session::SessionContext {
                config: self.config.clone(),
                token,
                state: Arc::clone(&self.state),
                events: self.events.clone(),
            };
            let task = tokio::spawn(session::run(ctx, shutdown_rx, ready_tx));
            *conn = Some(ConnectionHandle {
                task,
                shutdown: shutdown_tx,
            });
        }

        match tokio::time::timeout(self.config.handshake_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => {
                self.disconnect().await;
                Err(err)
            }
            Ok(Err(_)) => {
                self.disconnect().await;
                Err(GatewayError::Connection(
                    "gateway task stopped before ready".to_string(),
                ))
            }
            Err(_) => {
                self.disconnect().await;
                Err(GatewayError::HandshakeTimeout)
            }
        }
    }

    /// Tear down the active connection, if any. Idempotent: a second call is
    /// a no-op, and a `connect()` still waiting on READY settles with an
    /// error rather than hanging.
    pub async fn disconnect(&self) {
        let handle = self.conn.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.state.reset_lifecycle();
    }

    /// True once the READY snapshot of the current connection has been fully
    /// processed.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// True while the transport-level connection is open.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.current_user()
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.state.guilds()
    }

    pub fn guild_channels(&self, guild_id: &str) -> Vec<Channel> {
        self.state.guild_channels(guild_id)
    }

    pub fn dm_channels(&self) -> Vec<Channel> {
        self.state.dm_channels()
    }

    pub fn friends(&self) -> Vec<User> {
        self.state.friends()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.session_id()
    }

    /// Resume URL captured from READY. Recorded for observability; this
    /// client always re-identifies from scratch instead of resuming.
    pub fn resume_url(&self) -> Option<String> {
        self.state.resume_url()
    }
}
