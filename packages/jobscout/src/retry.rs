//! Re-running the pipeline outside the daily acquisition.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::acquisition::{canonical_url, extract_job_id, fetch_description, fetch_posting, ListingSource, PostingDetails};
use crate::browser::Browser;
use crate::orchestrator::Dispatcher;
use crate::store::RunManifest;
use crate::types::{CandidateItem, PipelineResult, UNKNOWN_AGE};

pub const MANUAL_CATEGORY: &str = "manual";

/// Values that win over whatever the posting page shows.
#[derive(Debug, Clone, Default)]
pub struct RetryRequest {
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
}

/// Build the synthetic candidate for a manual retry.
///
/// Fails before any generation when title or company is still unknown.
pub fn manual_candidate(request: &RetryRequest, details: PostingDetails) -> Result<CandidateItem> {
    let pick = |given: &Option<String>, fetched: String| {
        given
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or(fetched)
    };

    let title = pick(&request.title, details.title);
    let company = pick(&request.company, details.company);
    if title.is_empty() || company.is_empty() {
        bail!(
            "could not determine title/company for {}; pass --title and --company",
            request.url
        );
    }

    Ok(CandidateItem {
        job_id: extract_job_id(&request.url).unwrap_or_else(|| "manual".to_string()),
        title,
        company,
        location: pick(&request.location, details.location),
        url: canonical_url(&request.url),
        keyword: String::new(),
        posted_date: String::new(),
        days_old: UNKNOWN_AGE,
        category: pick(&request.category, MANUAL_CATEGORY.to_string()),
        description: details.description,
    })
}

/// Fetch one posting on demand and run it straight through the pipeline.
///
/// The outcome is recorded in `manifest` so the day's status reflects it.
pub async fn retry_one<B: Browser>(
    browser: &B,
    source: &ListingSource,
    request: &RetryRequest,
    dispatcher: &Dispatcher,
    output_root: &Path,
    manifest: &RunManifest,
) -> Result<PipelineResult> {
    let details = match browser.new_page().await {
        Ok(mut page) => match fetch_posting(&mut page, &request.url, source).await {
            Ok(details) => details,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Posting fetch failed, relying on overrides");
                PostingDetails::default()
            }
        },
        Err(e) => {
            warn!(error = %e, "Could not open a page, relying on overrides");
            PostingDetails::default()
        }
    };

    let item = manual_candidate(request, details)?;
    info!(
        title = %item.title,
        company = %item.company,
        description_chars = item.description.chars().count(),
        "Retrying single posting"
    );

    let result = dispatcher.pipeline().process(&item, output_root).await;
    if let Err(e) = manifest.record(&result).await {
        warn!(error = %e, "Could not record retry status");
    }
    Ok(result)
}

/// Counts from a whole-day retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayRetry {
    pub attempted: usize,
    pub succeeded: usize,
    pub already_done: usize,
}

/// Rerun every manifest entry that has not succeeded, re-fetching its
/// description first.
pub async fn retry_day<B: Browser>(
    browser: &B,
    source: &ListingSource,
    manifest: &RunManifest,
    dispatcher: &Dispatcher,
    output_root: &Path,
) -> Result<DayRetry> {
    let all = manifest.entries().await;
    let pending = manifest.unfinished().await;
    let already_done = all.len() - pending.len();
    info!(total = all.len(), already_done, to_retry = pending.len(), "Whole-day retry");

    if pending.is_empty() {
        return Ok(DayRetry {
            already_done,
            ..DayRetry::default()
        });
    }

    let mut items = Vec::with_capacity(pending.len());
    let mut page = browser.new_page().await?;
    for entry in &pending {
        let item = entry.to_candidate();
        let description = match fetch_description(&mut page, &item.url, source).await {
            Ok(description) => description,
            Err(e) => {
                warn!(job_id = %item.job_id, error = %e, "Description fetch failed");
                String::new()
            }
        };
        items.push(item.with_description(description));
        source.pacing.after_detail.sleep().await;
    }

    let results = dispatcher.dispatch(items, output_root, Some(manifest)).await;
    let succeeded = results.iter().filter(|r| r.success()).count();
    info!(succeeded, attempted = results.len(), "Whole-day retry complete");

    Ok(DayRetry {
        attempted: results.len(),
        succeeded,
        already_done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> RetryRequest {
        RetryRequest {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_overrides_win_over_fetched_details() {
        let mut req = request("https://www.linkedin.com/jobs/view/4000000001/?ref=x");
        req.company = Some("Override Co".to_string());
        let details = PostingDetails {
            title: "Fetched Title".to_string(),
            company: "Fetched Co".to_string(),
            location: "Remote".to_string(),
            description: "desc".to_string(),
        };

        let item = manual_candidate(&req, details).unwrap();
        assert_eq!(item.job_id, "4000000001");
        assert_eq!(item.url, "https://www.linkedin.com/jobs/view/4000000001/");
        assert_eq!(item.title, "Fetched Title");
        assert_eq!(item.company, "Override Co");
        assert_eq!(item.category, MANUAL_CATEGORY);
        assert_eq!(item.description, "desc");
    }

    #[test]
    fn test_missing_company_aborts() {
        let details = PostingDetails {
            title: "Only title".to_string(),
            ..Default::default()
        };
        let err = manual_candidate(&request("https://x.test/job"), details).unwrap_err();
        assert!(err.to_string().contains("--company"));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut req = request("https://x.test/jobs/view/1234567");
        req.title = Some("   ".to_string());
        req.company = Some("Acme".to_string());
        assert!(manual_candidate(&req, PostingDetails::default()).is_err());
    }
}
