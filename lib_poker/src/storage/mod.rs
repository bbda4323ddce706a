//! Client-side key/value bookkeeping.
//!
//! Two stores, mirroring the browser split: a session store that dies
//! with the process and a durable store that survives it. Writes are
//! last-write-wins with no locking across processes; readers must
//! tolerate absent keys and must not assume freshness.

pub mod durable;
pub mod session;

pub use durable::DurableStore;
pub use session::SessionStore;

use std::sync::Arc;

use crate::error::Error;

/// Username key shared by both stores. The durable copy is only a
/// prefill suggestion; the session copy is the established identity.
pub const USERNAME_KEY: &str = "planning-poker-username";

/// Durable key remembering the last reaction emoji the user picked.
pub const LAST_EMOJI_KEY: &str = "planning-poker-last-emoji";

/// Session key caching the admin password for one room.
pub fn admin_key(room_id: &str) -> String {
    format!("admin_{room_id}")
}

/// Local identity bookkeeping around the two stores.
///
/// The server remains the source of truth for whether the username is
/// actually seated in a room; this only tracks what the user typed.
pub struct Identity {
    session: Arc<SessionStore>,
    durable: Arc<DurableStore>,
}

impl Identity {
    pub fn new(session: Arc<SessionStore>, durable: Arc<DurableStore>) -> Self {
        Self { session, durable }
    }

    /// Username established for this session, if any.
    pub fn session_username(&self) -> Option<String> {
        self.session.get(USERNAME_KEY)
    }

    /// Prefill suggestion for the join dialog: the session name first,
    /// falling back to the durable copy from an earlier session.
    pub fn prefill(&self) -> Option<String> {
        self.session_username().or_else(|| self.durable.get(USERNAME_KEY))
    }

    /// Record a successful join in both stores.
    pub fn remember(&self, username: &str) -> Result<(), Error> {
        self.session.set(USERNAME_KEY, username);
        self.durable.set(USERNAME_KEY, username)
    }

    /// Forget the session identity (the durable prefill stays).
    pub fn clear_session(&self) {
        self.session.remove(USERNAME_KEY);
    }
}
