//! Durable checkpoint storage.
//!
//! One JSON file per partition, written atomically via a temp file and
//! rename so a crash mid-write never leaves a truncated checkpoint. A
//! corrupt file is treated as absent: the worker re-processes from the
//! beginning rather than refusing to start (deliveries are idempotent).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use sync_types::Checkpoint;

use crate::error::CoreError;

/// Durable storage for per-partition checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a partition, `None` if never saved.
    fn load(&self, partition: &str) -> Result<Option<Checkpoint>, CoreError>;

    /// Persist the checkpoint for a partition.
    fn save(&self, partition: &str, checkpoint: &Checkpoint) -> Result<(), CoreError>;
}

/// File-backed checkpoint store.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| CoreError::CheckpointStore(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// Path of the checkpoint file for a partition.
    ///
    /// Partition names come from collection names; anything outside
    /// `[A-Za-z0-9._-]` is replaced so the name is always a plain file.
    pub fn path_for(&self, partition: &str) -> PathBuf {
        let safe: String = partition
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, partition: &str) -> Result<Option<Checkpoint>, CoreError> {
        let path = self.path_for(partition);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::CheckpointStore(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match Checkpoint::from_bytes(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                warn!(
                    partition,
                    path = %path.display(),
                    error = %e,
                    "Corrupt checkpoint file, starting over"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, partition: &str, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        let path = self.path_for(partition);
        let tmp = path.with_extension("json.tmp");

        let bytes = checkpoint
            .to_bytes()
            .map_err(|e| CoreError::CheckpointStore(e.to_string()))?;

        fs::write(&tmp, &bytes)
            .map_err(|e| CoreError::CheckpointStore(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| CoreError::CheckpointStore(format!("rename {}: {}", path.display(), e)))?;

        debug!(partition, position = %checkpoint.position, "Saved checkpoint");
        Ok(())
    }
}

/// In-memory checkpoint store for tests.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    /// Number of upcoming saves that fail.
    fail_saves: Mutex<u32>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail.
    pub fn fail_next_saves(&self, n: u32) {
        *self.fail_saves.lock().unwrap() = n;
    }

    /// Current checkpoint for a partition, if any.
    pub fn get(&self, partition: &str) -> Option<Checkpoint> {
        self.checkpoints.lock().unwrap().get(partition).cloned()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, partition: &str) -> Result<Option<Checkpoint>, CoreError> {
        Ok(self.get(partition))
    }

    fn save(&self, partition: &str, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        let mut remaining = self.fail_saves.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(CoreError::CheckpointStore("injected save failure".into()));
        }
        self.checkpoints
            .lock()
            .unwrap()
            .insert(partition.to_string(), checkpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::Position;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        assert!(store.load("notes").unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        let checkpoint = Checkpoint::at(Position::Sequence(42));
        store.save("notes", &checkpoint).unwrap();

        let loaded = store.load("notes").unwrap().unwrap();
        assert_eq!(loaded.position, Position::Sequence(42));
    }

    #[test]
    fn test_partitions_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        store.save("a", &Checkpoint::at(Position::Sequence(1))).unwrap();
        store.save("b", &Checkpoint::at(Position::Sequence(2))).unwrap();

        assert_eq!(store.load("a").unwrap().unwrap().position, Position::Sequence(1));
        assert_eq!(store.load("b").unwrap().unwrap().position, Position::Sequence(2));
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        fs::write(store.path_for("notes"), b"not json at all").unwrap();
        assert!(store.load("notes").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_atomically() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        store.save("notes", &Checkpoint::at(Position::Sequence(1))).unwrap();
        store.save("notes", &Checkpoint::at(Position::Sequence(2))).unwrap();

        // No temp file left behind.
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["notes.json".to_string()]);

        assert_eq!(store.load("notes").unwrap().unwrap().position, Position::Sequence(2));
    }

    #[test]
    fn test_partition_name_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        let path = store.path_for("db/coll name");
        assert!(path.ends_with("db_coll_name.json"));
    }

    #[test]
    fn test_memory_store_injected_failures() {
        let store = MemoryCheckpointStore::new();
        store.fail_next_saves(2);

        let cp = Checkpoint::beginning();
        assert!(store.save("p", &cp).is_err());
        assert!(store.save("p", &cp).is_err());
        assert!(store.save("p", &cp).is_ok());
        assert!(store.get("p").is_some());
    }
}
