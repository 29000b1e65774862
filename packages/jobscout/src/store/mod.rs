//! Durable run state: the seen-id set and the per-day manifest.

mod manifest;
mod seen;

pub use manifest::{ItemStatus, ManifestEntry, RunManifest};
pub use seen::{SeenSet, SeenStore};

use std::path::Path;

use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Write JSON through a temp file in the same directory, then rename over the
/// target so readers never see a half-written file.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let body = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    std::io::Write::write_all(&mut tmp, &body).map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
