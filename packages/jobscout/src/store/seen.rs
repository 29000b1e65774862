use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::write_json_atomic;
use crate::error::{StoreError, StoreResult};

/// In-memory set of posting ids already enumerated.
///
/// Only grows. Shared by reference between the acquisition engine and the
/// final flush; every operation takes the lock for its whole read-modify-write.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().contains(id)
    }

    /// Add an id. Returns false if it was already present.
    pub fn insert(&self, id: impl Into<String>) -> bool {
        self.ids().insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Sorted copy of the current ids.
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids().iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenFile {
    #[serde(default)]
    seen_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    // Keys written by other tools survive a rewrite.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// `seen_jobs.json` on disk.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> StoreResult<SeenFile> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::json(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SeenFile::default()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Load the set. A missing file is an empty set.
    pub fn load(&self) -> StoreResult<SeenSet> {
        let file = self.read_file()?;
        debug!(path = %self.path.display(), count = file.seen_ids.len(), "Loaded seen ids");
        Ok(SeenSet::from_ids(file.seen_ids))
    }

    /// Write the set back, unioned with whatever is on disk now.
    pub fn save(&self, seen: &SeenSet) -> StoreResult<()> {
        let mut file = self.read_file()?;
        let mut ids: HashSet<String> = file.seen_ids.drain(..).collect();
        ids.extend(seen.snapshot());

        let mut sorted: Vec<String> = ids.into_iter().collect();
        sorted.sort();
        file.seen_ids = sorted;
        file.last_updated = Some(Utc::now().to_rfc3339());

        write_json_atomic(&self.path, &file)?;
        info!(path = %self.path.display(), count = file.seen_ids.len(), "Saved seen ids");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen_jobs.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("data/seen_jobs.json"));

        let seen = SeenSet::from_ids(["222", "111"]);
        store.save(&seen).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.snapshot(), vec!["111", "222"]);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert!(raw["last_updated"].is_string());
    }

    #[test]
    fn test_save_never_drops_ids_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen_jobs.json");
        std::fs::write(
            &path,
            r#"{"seen_ids":["900"],"last_updated":"2024-01-01T00:00:00Z","note":"keep me"}"#,
        )
        .unwrap();

        let store = SeenStore::new(&path);
        store.save(&SeenSet::from_ids(["100"])).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["seen_ids"], serde_json::json!(["100", "900"]));
        assert_eq!(raw["note"], "keep me");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen_jobs.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(SeenStore::new(&path).load(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_insert_reports_new_ids_only() {
        let seen = SeenSet::from_ids(["1"]);
        assert!(!seen.insert("1"));
        assert!(seen.insert("2"));
        assert_eq!(seen.len(), 2);
    }
}
