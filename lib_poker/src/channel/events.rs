//! Typed subscriber registry for hub events.
//!
//! Each event carries a statically known payload type, so subscribers
//! never downcast or juggle untyped argument lists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::reactions::ReactionEvent;

/// Handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&ReactionEvent) + Send + Sync>;

/// Reaction subscribers. Delivery order is registration order.
#[derive(Default)]
pub struct SmileSubscribers {
    entries: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl SmileSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ReactionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .expect("subscriber list lock poisoned")
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns true when the id was registered. Removal during a dispatch
    /// takes effect for the next event; the running dispatch keeps its
    /// snapshot.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock().expect("subscriber list lock poisoned");
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// The list lock is released before any callback runs, so callbacks
    /// may subscribe or unsubscribe freely without deadlocking; each
    /// subscriber is invoked at most once per dispatch.
    pub fn dispatch(&self, event: &ReactionEvent) {
        let snapshot: Vec<Callback> = self
            .entries
            .lock()
            .expect("subscriber list lock poisoned")
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("subscriber list lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ReactionEvent {
        ReactionEvent::received(None, "bob", "👍")
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let subs = SmileSubscribers::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        subs.subscribe(move |_| first.lock().unwrap().push("first"));
        let second = Arc::clone(&order);
        subs.subscribe(move |_| second.lock().unwrap().push("second"));

        subs.dispatch(&event());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_mid_dispatch_keeps_the_snapshot() {
        let subs = Arc::new(SmileSubscribers::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let victim_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let registry = Arc::clone(&subs);
        let seen = Arc::clone(&order);
        let victim = Arc::clone(&victim_id);
        subs.subscribe(move |_| {
            seen.lock().unwrap().push("remover");
            if let Some(id) = victim.lock().unwrap().take() {
                registry.unsubscribe(id);
            }
        });

        let seen = Arc::clone(&order);
        let id = subs.subscribe(move |_| seen.lock().unwrap().push("victim"));
        *victim_id.lock().unwrap() = Some(id);

        // First dispatch: the victim was removed mid-dispatch but its slot
        // in the snapshot still runs exactly once.
        subs.dispatch(&event());
        assert_eq!(*order.lock().unwrap(), vec!["remover", "victim"]);

        // Second dispatch: the removal has taken effect.
        subs.dispatch(&event());
        assert_eq!(
            *order.lock().unwrap(),
            vec!["remover", "victim", "remover"]
        );
    }

    #[test]
    fn unsubscribe_reports_unknown_ids() {
        let subs = SmileSubscribers::new();
        let id = subs.subscribe(|_| {});
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        assert!(subs.is_empty());
    }
}
