//! Run report and where it gets sent.

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::{info, warn};
use webhook::{WebhookError, WebhookOptions, WebhookService};

use crate::types::PipelineResult;

/// Destination for report lines.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the number of messages sent.
    async fn send(&self, lines: &[String]) -> Result<usize, WebhookError>;
}

#[async_trait]
impl Notifier for WebhookService {
    async fn send(&self, lines: &[String]) -> Result<usize, WebhookError> {
        self.post_lines(lines).await
    }
}

/// Used when no webhook is configured: the report only reaches the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, lines: &[String]) -> Result<usize, WebhookError> {
        for line in lines {
            info!("{}", line);
        }
        Ok(0)
    }
}

/// Webhook when a URL is set, log otherwise.
pub fn notifier_for(webhook_url: Option<&str>) -> Box<dyn Notifier> {
    match webhook_url {
        Some(url) => Box::new(WebhookService::new(
            WebhookOptions::new(url).with_username("jobscout"),
        )),
        None => {
            info!("DISCORD_WEBHOOK_URL not set, report goes to the log only");
            Box::new(LogNotifier)
        }
    }
}

pub fn no_jobs_message(date: NaiveDate) -> String {
    format!("No new jobs found today ({}).", date.format("%Y-%m-%d"))
}

/// One line per result.
pub fn result_line(result: &PipelineResult) -> String {
    let item = &result.item;
    format!(
        "{} {} @ {} ({}) [{}]",
        result.marker(),
        item.title,
        item.company,
        item.location,
        item.category
    )
}

/// Header, per-category counts, then one line per result.
pub fn report_lines(date: NaiveDate, results: &[PipelineResult]) -> Vec<String> {
    if results.is_empty() {
        return vec![no_jobs_message(date)];
    }

    let ok = results.iter().filter(|r| r.success()).count();
    let mut by_category: IndexMap<&str, (usize, usize)> = IndexMap::new();
    for result in results {
        let entry = by_category.entry(result.item.category.as_str()).or_default();
        entry.1 += 1;
        if result.success() {
            entry.0 += 1;
        }
    }

    let mut lines = Vec::with_capacity(results.len() + by_category.len() + 1);
    lines.push(format!(
        "Job run {}: {}/{} succeeded",
        date.format("%Y-%m-%d"),
        ok,
        results.len()
    ));
    for (category, (ok, total)) in &by_category {
        lines.push(format!("{}: {}/{}", category, ok, total));
    }
    lines.extend(results.iter().map(result_line));
    lines
}

/// Send the report, logging instead of failing when delivery breaks.
pub async fn deliver(notifier: &dyn Notifier, lines: &[String]) {
    match notifier.send(lines).await {
        Ok(posts) => info!(lines = lines.len(), posts, "Report sent"),
        Err(e) => warn!(error = %e, "Report delivery failed"),
    }
}
