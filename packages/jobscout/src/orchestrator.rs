//! Daily run: acquire, persist, fan out to the pipeline, report.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::acquisition::{CandidateSource, FallbackController};
use crate::config::SearchConfig;
use crate::generation::BackendKind;
use crate::notify::{deliver, report_lines, Notifier};
use crate::pipeline::ItemPipeline;
use crate::store::{RunManifest, SeenStore};
use crate::types::{CandidateItem, PipelineResult};

/// Pool size actually used for `backend`.
pub fn effective_workers(requested: usize, backend: BackendKind) -> usize {
    if backend.concurrency_safe() {
        requested.max(1)
    } else {
        1
    }
}

/// Runs many items through one [`ItemPipeline`] with bounded parallelism.
pub struct Dispatcher {
    pipeline: Arc<ItemPipeline>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<ItemPipeline>, requested_workers: usize, backend: BackendKind) -> Self {
        let workers = effective_workers(requested_workers, backend);
        if workers != requested_workers {
            info!(backend = %backend, requested_workers, workers, "Worker pool adjusted for backend");
        }
        Self { pipeline, workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pipeline(&self) -> &ItemPipeline {
        &self.pipeline
    }

    /// Process every item, recording each outcome in `manifest` as it lands.
    ///
    /// Results come back in completion order. A panicking item becomes a
    /// failed result; the other items keep going.
    pub async fn dispatch(
        &self,
        items: Vec<CandidateItem>,
        output_root: &Path,
        manifest: Option<&RunManifest>,
    ) -> Vec<PipelineResult> {
        let total = items.len();
        info!(total, workers = self.workers, "Dispatching items");

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut pending: HashMap<usize, CandidateItem> = HashMap::with_capacity(total);
        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            pending.insert(index, item.clone());
            let pipeline = self.pipeline.clone();
            let permits = permits.clone();
            let root = output_root.to_path_buf();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = AssertUnwindSafe(pipeline.process(&item, &root))
                    .catch_unwind()
                    .await;
                let result = match outcome {
                    Ok(result) => result,
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        error!(job_id = %item.job_id, title = %item.title, reason = %reason, "❌ Item panicked");
                        PipelineResult::failed(item, format!("panic: {}", reason))
                    }
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok((index, result)) => {
                    pending.remove(&index);
                    result
                }
                Err(e) => {
                    // The item stays in `pending` and is failed below.
                    error!(error = %e, "Worker task did not finish");
                    continue;
                }
            };
            self.land(result, manifest, &mut results, total).await;
        }
        for result in unfinished(pending) {
            self.land(result, manifest, &mut results, total).await;
        }
        results
    }

    async fn land(
        &self,
        result: PipelineResult,
        manifest: Option<&RunManifest>,
        results: &mut Vec<PipelineResult>,
        total: usize,
    ) {
        if let Some(manifest) = manifest {
            if let Err(e) = manifest.record(&result).await {
                warn!(job_id = %result.item.job_id, error = %e, "Could not record item status");
            }
        }
        info!(done = results.len() + 1, total, "{} {}", result.marker(), result.item.title);
        results.push(result);
    }
}

/// Failed results for items whose worker task never handed one back.
fn unfinished(pending: HashMap<usize, CandidateItem>) -> Vec<PipelineResult> {
    let mut leftover: Vec<_> = pending.into_iter().collect();
    leftover.sort_by_key(|(index, _)| *index);
    leftover
        .into_iter()
        .map(|(_, item)| {
            error!(job_id = %item.job_id, title = %item.title, "❌ Item lost with its worker task");
            PipelineResult::failed(item, "worker task did not finish")
        })
        .collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Inputs to one daily run.
pub struct DailyRun<'a> {
    pub source: &'a dyn CandidateSource,
    pub search: &'a SearchConfig,
    pub seen_store: &'a SeenStore,
    pub manifest_path: PathBuf,
    pub output_root: PathBuf,
    pub notifier: &'a dyn Notifier,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub results: Vec<PipelineResult>,
    pub stages_run: Vec<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }
}

impl DailyRun<'_> {
    /// Acquire with fallback, persist the manifest, process, flush the seen
    /// set once every worker has joined, then report.
    pub async fn execute(self, dispatcher: &Dispatcher) -> Result<RunSummary> {
        let started = std::time::Instant::now();
        let seen = self
            .seen_store
            .load()
            .context("Failed to load seen set")?;
        let seen_before = seen.len();
        info!(seen = seen_before, "Loaded seen set");

        let controller = FallbackController::new(
            self.source,
            self.search.targets(),
            &self.search.fallback.stages,
        );
        let acquisition = controller
            .acquire(&seen)
            .await
            .context("Candidate acquisition failed")?;

        if acquisition.items.is_empty() {
            info!("No new jobs found");
            self.seen_store.save(&seen).context("Failed to save seen set")?;
            deliver(self.notifier, &report_lines(self.date, &[])).await;
            return Ok(RunSummary {
                results: Vec::new(),
                stages_run: acquisition.stages_run,
            });
        }

        let manifest = RunManifest::open(&self.manifest_path)
            .await
            .context("Failed to open run manifest")?;
        let added = manifest
            .merge(&acquisition.items)
            .await
            .context("Failed to write run manifest")?;
        info!(found = acquisition.items.len(), added, path = %self.manifest_path.display(), "Manifest updated");

        tokio::fs::create_dir_all(&self.output_root)
            .await
            .with_context(|| format!("Failed to create {}", self.output_root.display()))?;

        let results = dispatcher
            .dispatch(acquisition.items, &self.output_root, Some(&manifest))
            .await;

        self.seen_store.save(&seen).context("Failed to save seen set")?;
        info!(added = seen.len() - seen_before, total = seen.len(), "Seen set saved");

        deliver(self.notifier, &report_lines(self.date, &results)).await;

        let summary = RunSummary {
            results,
            stages_run: acquisition.stages_run,
        };
        info!(
            succeeded = summary.succeeded(),
            total = summary.results.len(),
            elapsed_secs = started.elapsed().as_secs(),
            "Run complete"
        );
        Ok(summary)
    }
}
