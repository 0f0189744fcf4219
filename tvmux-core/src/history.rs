//! Recently-accessed channel tracking
//!
//! Bounded most-recent-first list of canonical channel fingerprints,
//! updated on stream selection. Optionally persisted to a flat JSON file so
//! the list survives restarts; persistence is best effort and never affects
//! correctness.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

/// Process-wide access history, safe under concurrent touches.
///
/// Re-accessing an entry moves it to the front instead of duplicating it;
/// the length never exceeds the capacity.
#[derive(Debug)]
pub struct AccessHistory {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
    persist_path: Option<PathBuf>,
}

impl AccessHistory {
    pub const DEFAULT_CAPACITY: usize = 12;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            persist_path: None,
        }
    }

    /// History backed by a JSON file; existing contents are loaded eagerly.
    pub fn with_persistence(capacity: usize, path: PathBuf) -> Self {
        let mut history = Self::new(capacity);
        let loaded = load_entries(&path, history.capacity);
        if !loaded.is_empty() {
            tracing::debug!(count = loaded.len(), "loaded access history");
            history.entries = Mutex::new(loaded);
        }
        history.persist_path = Some(path);
        history
    }

    /// Move `fingerprint` to the front, inserting it if absent and
    /// truncating to capacity.
    pub fn touch(&self, fingerprint: &str) {
        let snapshot = {
            let mut entries = self.entries.lock().expect("access history lock poisoned");
            entries.retain(|f| f != fingerprint);
            entries.push_front(fingerprint.to_string());
            entries.truncate(self.capacity);
            self.persist_path.is_some().then(|| entries.iter().cloned().collect::<Vec<_>>())
        };
        if let (Some(path), Some(entries)) = (&self.persist_path, snapshot) {
            save_entries(path, &entries);
        }
    }

    /// Current fingerprints, most recent first.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("access history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("access history lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn load_entries(path: &PathBuf, capacity: usize) -> VecDeque<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(entries) => entries.into_iter().take(capacity).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "access history file unreadable; starting empty");
                VecDeque::new()
            }
        },
        Err(_) => VecDeque::new(),
    }
}

fn save_entries(path: &PathBuf, entries: &[String]) {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string());
        std::fs::write(path, raw)
    };
    if let Err(err) = write() {
        tracing::warn!(error = %err, "failed to persist access history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_inserts_most_recent_first() {
        let history = AccessHistory::new(5);
        history.touch("a");
        history.touch("b");
        history.touch("c");
        assert_eq!(history.list(), ["c", "b", "a"]);
    }

    #[test]
    fn test_retouch_moves_to_front_without_growing() {
        let history = AccessHistory::new(5);
        history.touch("a");
        history.touch("b");
        history.touch("a");
        assert_eq!(history.list(), ["a", "b"]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_capacity_invariant() {
        let capacity = AccessHistory::DEFAULT_CAPACITY;
        let history = AccessHistory::new(capacity);
        for i in 0..capacity + 5 {
            history.touch(&format!("ch{i}"));
        }
        assert_eq!(history.len(), capacity);
        assert_eq!(history.list()[0], format!("ch{}", capacity + 4));
    }

    #[test]
    fn test_concurrent_touches_respect_capacity() {
        use std::sync::Arc;

        let history = Arc::new(AccessHistory::new(10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        history.touch(&format!("t{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("touch task panicked");
        }
        assert!(history.len() <= 10);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");

        let history = AccessHistory::with_persistence(5, path.clone());
        history.touch("protv");
        history.touch("digisport1");

        let restored = AccessHistory::with_persistence(5, path);
        assert_eq!(restored.list(), ["digisport1", "protv"]);
    }

    #[test]
    fn test_corrupt_persistence_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").expect("write");

        let history = AccessHistory::with_persistence(5, path);
        assert!(history.is_empty());
    }
}
