//! Summary of one day's output directory and manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::store::{ItemStatus, RunManifest};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompanyOutput {
    pub company: String,
    /// A rendered PDF is present.
    pub rendered: bool,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub date: NaiveDate,
    pub output_dir: PathBuf,
    pub companies: Vec<CompanyOutput>,
    /// Absent when no manifest exists for the day.
    pub manifest: Option<StatusCounts>,
}

async fn list_dir(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut names = Vec::new();
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };
    while let Some(entry) = reader.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        names.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    names.sort();
    Ok(names)
}

pub async fn summarize(date: NaiveDate, output_dir: &Path, manifest_path: &Path) -> Result<StatusSummary> {
    let mut companies = Vec::new();
    for (name, is_dir) in list_dir(output_dir).await? {
        if !is_dir {
            continue;
        }
        let files: Vec<String> = list_dir(&output_dir.join(&name))
            .await?
            .into_iter()
            .filter(|(_, is_dir)| !is_dir)
            .map(|(file, _)| file)
            .collect();
        companies.push(CompanyOutput {
            rendered: files.iter().any(|f| f.ends_with(".pdf")),
            company: name,
            files,
        });
    }

    let manifest = match RunManifest::open_existing(manifest_path).await {
        Ok(manifest) => {
            let mut counts = StatusCounts::default();
            for entry in manifest.entries().await {
                match entry.status {
                    ItemStatus::Pending => counts.pending += 1,
                    ItemStatus::Succeeded => counts.succeeded += 1,
                    ItemStatus::Failed => counts.failed += 1,
                }
            }
            Some(counts)
        }
        Err(crate::error::StoreError::ManifestNotFound(_)) => None,
        Err(e) => return Err(e).context("Failed to read manifest"),
    };

    Ok(StatusSummary {
        date,
        output_dir: output_dir.to_path_buf(),
        companies,
        manifest,
    })
}
