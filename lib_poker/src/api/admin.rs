//! Admin credential bookkeeping for one room.
//!
//! The password is cached in the session store after a successful
//! verification and gates the privileged actions (reveal, reset, delete).
//! The cached credential is never assumed valid: every rejection evicts
//! the cache so the caller prompts again.

use std::sync::Arc;

use crate::error::Error;
use crate::storage::{admin_key, SessionStore};

use super::rooms::RoomApi;

pub struct AdminSession {
    room_id: String,
    api: Arc<RoomApi>,
    session: Arc<SessionStore>,
}

impl AdminSession {
    pub fn new(room_id: impl Into<String>, api: Arc<RoomApi>, session: Arc<SessionStore>) -> Self {
        Self {
            room_id: room_id.into(),
            api,
            session,
        }
    }

    /// The cached password for this room, if a verification succeeded
    /// earlier in the session.
    pub fn cached_password(&self) -> Option<String> {
        self.session.get(&admin_key(&self.room_id))
    }

    /// Drop the cached credential.
    pub fn clear(&self) {
        self.session.remove(&admin_key(&self.room_id));
    }

    /// Re-validate a cached credential against the server. A stale entry
    /// is evicted so the UI falls back to the password prompt.
    pub async fn check_status(&self) -> Result<bool, Error> {
        let Some(password) = self.cached_password() else {
            return Ok(false);
        };
        let valid = self.api.verify_admin(&self.room_id, Some(&password)).await?;
        if !valid {
            self.clear();
        }
        Ok(valid)
    }

    /// Verify a freshly entered password, caching it on success. An
    /// explicit "invalid" does not cache and does not error.
    pub async fn verify(&self, password: &str) -> Result<bool, Error> {
        let valid = self.api.verify_admin(&self.room_id, Some(password)).await?;
        if valid {
            self.session.set(&admin_key(&self.room_id), password);
        }
        Ok(valid)
    }

    /// Reveal all votes in the room.
    pub async fn reveal(&self) -> Result<(), Error> {
        let password = self.cached_password();
        let result = self.api.reveal_votes(&self.room_id, password.as_deref()).await;
        self.evict_on_rejection(result)
    }

    /// Clear all votes and hide them again.
    pub async fn reset(&self) -> Result<(), Error> {
        let password = self.cached_password();
        let result = self.api.reset_votes(&self.room_id, password.as_deref()).await;
        self.evict_on_rejection(result)
    }

    /// Delete the room entirely.
    pub async fn delete_room(&self) -> Result<(), Error> {
        let password = self.cached_password();
        let result = self.api.delete_room(&self.room_id, password.as_deref()).await;
        self.evict_on_rejection(result)
    }

    fn evict_on_rejection<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if matches!(result, Err(Error::Unauthorized)) {
            self.clear();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_with_cached_password() -> AdminSession {
        let api = Arc::new(RoomApi::new("http://localhost:9/").unwrap());
        let session = Arc::new(SessionStore::new());
        session.set(&admin_key("r1"), "sesame");
        AdminSession::new("r1", api, session)
    }

    #[test]
    fn rejection_evicts_the_cached_credential() {
        let admin = admin_with_cached_password();
        assert_eq!(admin.cached_password().as_deref(), Some("sesame"));

        let out: Result<(), Error> = admin.evict_on_rejection(Err(Error::Unauthorized));
        assert!(matches!(out, Err(Error::Unauthorized)));
        assert_eq!(admin.cached_password(), None);
    }

    #[test]
    fn other_failures_keep_the_cache() {
        let admin = admin_with_cached_password();

        let out: Result<(), Error> =
            admin.evict_on_rejection(Err(Error::Transport("reset by peer".into())));
        assert!(out.is_err());
        assert_eq!(admin.cached_password().as_deref(), Some("sesame"));

        let out: Result<(), Error> = admin.evict_on_rejection(Ok(()));
        assert!(out.is_ok());
        assert_eq!(admin.cached_password().as_deref(), Some("sesame"));
    }
}
