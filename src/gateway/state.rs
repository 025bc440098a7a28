use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;

use crate::models::{Channel, Guild, User};

/// Authoritative in-memory session state. Mutated only by the reducer on the
/// single event-processing path; read concurrently by facade accessors.
#[derive(Default)]
pub(crate) struct SessionState {
    current_user: ArcSwapOption<User>,
    pub(crate) guilds: DashMap<String, Guild>,
    pub(crate) channels: DashMap<String, Channel>,
    pub(crate) dm_channels: DashMap<String, Channel>,
    pub(crate) relationships: DashMap<String, User>,
    session_id: RwLock<Option<String>>,
    resume_url: RwLock<Option<String>>,
    connected: AtomicBool,
    ready: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe all snapshot-derived state. Called before a fresh connection and
    /// at the head of every READY reduction, so a re-identified session never
    /// carries entries from its predecessor.
    pub fn clear(&self) {
        self.current_user.store(None);
        self.guilds.clear();
        self.channels.clear();
        self.dm_channels.clear();
        self.relationships.clear();
        self.set_session(None, None);
    }

    /// Drop the lifecycle flags on teardown. Snapshot maps are left in place
    /// until the next READY replaces them.
    pub fn reset_lifecycle(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn set_session(&self, session_id: Option<String>, resume_url: Option<String>) {
        if let Ok(mut slot) = self.session_id.write() {
            *slot = session_id;
        }
        if let Ok(mut slot) = self.resume_url.write() {
            *slot = resume_url;
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|slot| slot.clone())
    }

    pub fn resume_url(&self) -> Option<String> {
        self.resume_url.read().ok().and_then(|slot| slot.clone())
    }

    pub fn set_current_user(&self, user: User) {
        self.current_user.store(Some(Arc::new(user)));
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user.load_full().map(|u| (*u).clone())
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.guilds.iter().map(|g| g.value().clone()).collect()
    }

    pub fn guild_channels(&self, guild_id: &str) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|c| c.value().guild_id.as_deref() == Some(guild_id))
            .map(|c| c.value().clone())
            .collect()
    }

    pub fn dm_channels(&self) -> Vec<Channel> {
        self.dm_channels.iter().map(|c| c.value().clone()).collect()
    }

    pub fn friends(&self) -> Vec<User> {
        self.relationships
            .iter()
            .map(|u| u.value().clone())
            .collect()
    }
}
