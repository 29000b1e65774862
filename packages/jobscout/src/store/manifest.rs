use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::write_json_atomic;
use crate::error::{StoreError, StoreResult};
use crate::types::{CandidateItem, PipelineResult, UNKNOWN_AGE};

/// Processing state of one manifest entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

/// Minimal projection of a candidate, enough to rebuild it for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManifestEntry {
    pub fn from_candidate(item: &CandidateItem) -> Self {
        Self {
            job_id: item.job_id.clone(),
            title: item.title.clone(),
            company: item.company.clone(),
            location: item.location.clone(),
            url: item.url.clone(),
            category: item.category.clone(),
            status: ItemStatus::Pending,
            updated_at: None,
        }
    }

    /// Rebuild a candidate with no description.
    pub fn to_candidate(&self) -> CandidateItem {
        CandidateItem {
            job_id: self.job_id.clone(),
            title: self.title.clone(),
            company: self.company.clone(),
            location: self.location.clone(),
            url: self.url.clone(),
            keyword: String::new(),
            posted_date: String::new(),
            days_old: UNKNOWN_AGE,
            category: self.category.clone(),
            description: String::new(),
        }
    }
}

/// One day's manifest, `jobs_<date>.json`, keyed by canonical URL.
///
/// Every mutation rewrites the file while holding the lock, so concurrent
/// workers recording outcomes never interleave writes.
#[derive(Debug)]
pub struct RunManifest {
    path: PathBuf,
    entries: Mutex<IndexMap<String, ManifestEntry>>,
}

impl RunManifest {
    pub fn path_for(data_dir: &Path, date: NaiveDate) -> PathBuf {
        data_dir.join(format!("jobs_{}.json", date.format("%Y-%m-%d")))
    }

    /// Open a manifest for writing. A missing file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_entries(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open a manifest that must already exist.
    pub async fn open_existing(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::ManifestNotFound(path));
        }
        Self::open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append candidates not already present. Existing entries keep their status.
    /// Returns how many were added.
    pub async fn merge(&self, items: &[CandidateItem]) -> StoreResult<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        for item in items {
            entries
                .entry(item.url.clone())
                .or_insert_with(|| ManifestEntry::from_candidate(item));
        }
        let added = entries.len() - before;
        self.persist(&entries)?;
        info!(
            path = %self.path.display(),
            added,
            total = entries.len(),
            "Manifest merged"
        );
        Ok(added)
    }

    /// Record the outcome of one pipeline run.
    ///
    /// Items that never made it into the manifest (manual retries) are added.
    pub async fn record(&self, result: &PipelineResult) -> StoreResult<ItemStatus> {
        let status = if result.success() {
            ItemStatus::Succeeded
        } else {
            ItemStatus::Failed
        };

        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(result.item.url.clone())
            .or_insert_with(|| ManifestEntry::from_candidate(&result.item));
        entry.status = status;
        entry.updated_at = Some(Utc::now());
        self.persist(&entries)?;

        debug!(url = %result.item.url, ?status, "Recorded item status");
        Ok(status)
    }

    pub async fn entries(&self) -> Vec<ManifestEntry> {
        self.entries.lock().await.values().cloned().collect()
    }

    /// Entries not yet succeeded, in manifest order.
    pub async fn unfinished(&self) -> Vec<ManifestEntry> {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.status != ItemStatus::Succeeded)
            .cloned()
            .collect()
    }

    fn persist(&self, entries: &IndexMap<String, ManifestEntry>) -> StoreResult<()> {
        let list: Vec<&ManifestEntry> = entries.values().collect();
        write_json_atomic(&self.path, &list)
    }
}

fn parse_entries(path: &Path, bytes: &[u8]) -> StoreResult<IndexMap<String, ManifestEntry>> {
    let list: Vec<ManifestEntry> =
        serde_json::from_slice(bytes).map_err(|e| StoreError::json(path, e))?;
    let mut entries = IndexMap::with_capacity(list.len());
    for entry in list {
        entries.entry(entry.url.clone()).or_insert(entry);
    }
    Ok(entries)
}
