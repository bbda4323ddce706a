//! Session-scoped store: lives exactly as long as the process.

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory string key/value map, the analog of per-tab session
/// storage. Absent keys are a normal condition, not an error.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("session store lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("session store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("session store lock poisoned")
            .remove(key)
    }
}
