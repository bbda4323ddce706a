//! Ephemeral reaction events.
//!
//! A reaction lives only as long as its client-side animation. Nothing is
//! persisted, and delivery is best effort.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Display lifetime of one reaction.
pub const REACTION_TTL: Duration = Duration::from_secs(3);

static NEXT_REACTION_ID: AtomicU64 = AtomicU64::new(1);

/// One reaction received over the push channel.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    /// Who sent it, when the hub announces a sender.
    pub sender: Option<String>,
    /// Username the reaction points at.
    pub recipient: String,
    /// The emoji glyph.
    pub emoji: String,
    /// Client-local identifier, unique within the process.
    pub id: u64,
    /// When this client received the event.
    pub received_at: Instant,
}

impl ReactionEvent {
    /// Stamp a freshly received reaction with an id and receipt time.
    pub fn received(
        sender: Option<String>,
        recipient: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            recipient: recipient.into(),
            emoji: emoji.into(),
            id: NEXT_REACTION_ID.fetch_add(1, Ordering::Relaxed),
            received_at: Instant::now(),
        }
    }

    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.received_at) >= ttl
    }
}

/// In-memory buffer of the reactions currently animating.
pub struct ReactionTray {
    ttl: Duration,
    entries: Mutex<Vec<ReactionEvent>>,
}

impl Default for ReactionTray {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactionTray {
    pub fn new() -> Self {
        Self::with_ttl(REACTION_TTL)
    }

    /// Tray with a custom display lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, event: ReactionEvent) {
        self.entries
            .lock()
            .expect("reaction tray lock poisoned")
            .push(event);
    }

    /// Reactions still inside their display window. Expired entries are
    /// dropped on the way out.
    pub fn active(&self) -> Vec<ReactionEvent> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("reaction tray lock poisoned");
        entries.retain(|event| !event.expired(now, self.ttl));
        entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_event() {
        let a = ReactionEvent::received(None, "bob", "👍");
        let b = ReactionEvent::received(Some("alice".into()), "bob", "🎉");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn tray_prunes_after_the_display_window() {
        let tray = ReactionTray::with_ttl(Duration::from_millis(30));
        tray.push(ReactionEvent::received(None, "bob", "👍"));
        tray.push(ReactionEvent::received(None, "carol", "🎉"));
        assert_eq!(tray.active().len(), 2);

        std::thread::sleep(Duration::from_millis(40));
        assert!(tray.active().is_empty());
    }

    #[test]
    fn fresh_events_stay_while_stale_ones_go() {
        let tray = ReactionTray::with_ttl(Duration::from_millis(50));
        tray.push(ReactionEvent::received(None, "bob", "👍"));
        std::thread::sleep(Duration::from_millis(60));
        tray.push(ReactionEvent::received(None, "carol", "🎉"));

        let active = tray.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].recipient, "carol");
    }
}
