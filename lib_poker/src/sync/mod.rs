//! Room synchronization engine.
//!
//! Keeps the local room view eventually consistent with the server by
//! polling the snapshot endpoint on a fixed cadence. Ticks are skipped
//! entirely while the view is hidden or no local identity exists, and
//! fetches are serialized: each tick awaits its fetch before the next one
//! fires, so a stale response can never overwrite a newer one.

pub mod visibility;

pub use visibility::{AlwaysVisible, ToggleVisibility, VisibilitySource};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::Error;
use crate::model::{Participant, RoomSnapshot, VoteValue};
use crate::storage::{SessionStore, USERNAME_KEY};

/// Where snapshots come from. `RoomApi` is the production source; tests
/// substitute stubs.
pub trait RoomSource {
    fn fetch(
        &self,
        room_id: &str,
    ) -> impl Future<Output = Result<RoomSnapshot, Error>> + Send;
}

#[cfg(feature = "api")]
impl RoomSource for crate::api::RoomApi {
    async fn fetch(&self, room_id: &str) -> Result<RoomSnapshot, Error> {
        self.fetch_room(room_id).await
    }
}

impl<T> RoomSource for Arc<T>
where
    T: RoomSource + Send + Sync,
{
    fn fetch(
        &self,
        room_id: &str,
    ) -> impl Future<Output = Result<RoomSnapshot, Error>> + Send {
        (**self).fetch(room_id)
    }
}

/// Locally maintained view of the room.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    pub users: HashMap<String, Participant>,
    pub votes: HashMap<String, VoteValue>,
    pub votes_visible: bool,
    pub vote_options: Vec<String>,
    /// Terminal: once set, no further polling happens for this mount.
    pub not_found: bool,
}

/// Notifications pushed to the consumer after each effective tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    /// A fresh snapshot was merged into the view.
    Applied,
    /// The room is authoritatively gone; the engine stopped.
    NotFound,
    /// A transient fetch failure; state kept, next tick retries.
    Transient(String),
}

/// What one call to [`SyncEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Hidden view or missing identity; no network call was made.
    Skipped,
    /// Snapshot fetched and merged.
    Applied,
    /// Fetch failed transiently; the view is untouched.
    Transient,
    /// The room does not exist; polling must stop.
    Terminal,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Poll cadence.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
        }
    }
}

/// The poll-side synchronizer for one room mount.
pub struct SyncEngine<S, V> {
    room_id: String,
    source: S,
    visibility: V,
    session: Arc<SessionStore>,
    view: Arc<RwLock<RoomView>>,
    updates: mpsc::UnboundedSender<SyncUpdate>,
    config: SyncConfig,
}

impl<S, V> SyncEngine<S, V>
where
    S: RoomSource,
    V: VisibilitySource,
{
    /// Build an engine and the receiving end of its update stream.
    pub fn new(
        room_id: impl Into<String>,
        source: S,
        visibility: V,
        session: Arc<SessionStore>,
        config: SyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SyncUpdate>) {
        let (updates, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                room_id: room_id.into(),
                source,
                visibility,
                session,
                view: Arc::new(RwLock::new(RoomView::default())),
                updates,
                config,
            },
            update_rx,
        )
    }

    /// Shared handle onto the view, for render code.
    pub fn shared_view(&self) -> Arc<RwLock<RoomView>> {
        Arc::clone(&self.view)
    }

    /// A clone of the current view.
    pub fn view(&self) -> RoomView {
        self.view.read().expect("room view lock poisoned").clone()
    }

    /// One polling cycle.
    ///
    /// Skips entirely (no network call, no state change) while the view
    /// is hidden or no session identity exists.
    pub async fn tick(&self) -> TickOutcome {
        if !self.visibility.is_visible() {
            return TickOutcome::Skipped;
        }
        if self.session.get(USERNAME_KEY).is_none() {
            return TickOutcome::Skipped;
        }

        match self.source.fetch(&self.room_id).await {
            Ok(snapshot) => {
                self.apply(snapshot);
                let _ = self.updates.send(SyncUpdate::Applied);
                TickOutcome::Applied
            }
            Err(Error::RoomNotFound) => {
                // Authoritative: the room is gone. Terminal for this mount.
                let mut view = self.view.write().expect("room view lock poisoned");
                view.users.clear();
                view.votes.clear();
                view.not_found = true;
                drop(view);
                let _ = self.updates.send(SyncUpdate::NotFound);
                TickOutcome::Terminal
            }
            Err(e) => {
                // Transient: keep the current view, retry on the next tick.
                log::warn!("Polling room {} failed: {e}", self.room_id);
                let _ = self.updates.send(SyncUpdate::Transient(e.to_string()));
                TickOutcome::Transient
            }
        }
    }

    /// Merge a fetched snapshot into the view.
    ///
    /// Everything is replaced wholesale except two deliberate carries:
    /// vote options survive an empty payload (anti-flicker), and the local
    /// participant's own recorded vote wins over the server copy so a
    /// just-cast vote does not blink away on the next poll.
    fn apply(&self, snapshot: RoomSnapshot) {
        let me = self.session.get(USERNAME_KEY);
        let mut view = self.view.write().expect("room view lock poisoned");

        let own_vote = me
            .as_deref()
            .and_then(|user| view.votes.get(user))
            .filter(|vote| **vote != VoteValue::NotVoted)
            .cloned();

        view.users = snapshot.users;
        view.votes = snapshot.votes;
        if let (Some(user), Some(vote)) = (me, own_vote) {
            view.votes.insert(user, vote);
        }
        view.votes_visible = snapshot.show_votes;
        if !snapshot.vote_options.is_empty() {
            view.vote_options = snapshot.vote_options;
        }
    }

    /// Record the local user's vote immediately, ahead of the next poll.
    pub fn record_own_vote(&self, username: &str, vote: VoteValue) {
        let mut view = self.view.write().expect("room view lock poisoned");
        view.votes.insert(username.to_string(), vote);
    }

    /// Forget all recorded votes (after a reset action).
    pub fn clear_votes(&self) {
        let mut view = self.view.write().expect("room view lock poisoned");
        view.votes.clear();
        view.votes_visible = false;
    }

    /// Drive ticks on the configured cadence until the room disappears.
    /// The first tick fires immediately and doubles as the initial fetch.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.tick().await == TickOutcome::Terminal {
                return;
            }
        }
    }
}
