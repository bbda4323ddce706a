//! Durable store: a small JSON file that survives the session.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::Error;

/// File-backed string key/value map.
///
/// Another process may rewrite the file at any time, so every read goes
/// back to disk instead of caching. An absent or unreadable file is an
/// empty store.
#[derive(Debug, Clone)]
pub struct DurableStore {
    path: PathBuf,
}

impl DurableStore {
    /// Store under the platform config directory
    /// (`<config>/planning-poker/store.json`).
    pub fn open_default() -> Result<Self, Error> {
        let base = dirs::config_dir().ok_or_else(|| {
            Error::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                "no user config directory",
            ))
        })?;
        Ok(Self::at(base.join("planning-poker").join("store.json")))
    }

    /// Store at an explicit path. The file is created on first write.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> HashMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.read_all();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::at(dir.path().join("missing.json"));
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = DurableStore::at(&path);
        store.set("planning-poker-username", "alice").unwrap();
        drop(store);

        let reopened = DurableStore::at(&path);
        assert_eq!(
            reopened.get("planning-poker-username").as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn concurrent_writer_wins_the_next_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let ours = DurableStore::at(&path);
        let theirs = DurableStore::at(&path);
        ours.set("k", "ours").unwrap();
        theirs.set("k", "theirs").unwrap();
        // Reads go back to disk, so the other writer's value shows up.
        assert_eq!(ours.get("k").as_deref(), Some("theirs"));
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = DurableStore::at(&path);
        assert_eq!(store.get("k"), None);
        // A write replaces the corrupt content with a valid map.
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
