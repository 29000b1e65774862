//! End-to-end daily run and retries with scripted collaborators.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::tempdir;
use tokio_test::assert_ok;

use jobscout::acquisition::{ListingSource, Pacing};
use jobscout::config::{CandidateProfile, SearchConfig};
use jobscout::generation::BackendKind;
use jobscout::orchestrator::{DailyRun, Dispatcher};
use jobscout::pipeline::{ItemPipeline, Templates};
use jobscout::retry::{retry_day, retry_one, RetryRequest};
use jobscout::store::{ItemStatus, RunManifest, SeenStore};
use jobscout::testing::{candidate, RecordingNotifier, ScriptedBrowser, ScriptedGenerator, ScriptedSource, StubRenderer};

const TAILORED: &str = "1) FINAL_RESUME_HTML\n<!DOCTYPE html><html><body>cv</body></html>\n2) CHANGELOG\n- tuned\n3) KEYWORD_COVERAGE\nrust";

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
}

fn search() -> SearchConfig {
    serde_json::from_value(serde_json::json!({
        "locations": ["Remote"],
        "categories": {
            "sde": {"keywords": ["software engineer"], "target_count": 2},
            "ai": {"keywords": ["ai engineer"], "target_count": 1}
        },
        "fallback": {"stages": [{"label": "two weeks", "max_days_old": 14}]}
    }))
    .unwrap()
}

fn dispatcher(generator: ScriptedGenerator, workers: usize) -> Dispatcher {
    let pipeline = ItemPipeline::new(
        Arc::new(generator),
        Arc::new(StubRenderer::new()),
        Templates {
            primary: "<html>base</html>".to_string(),
            secondary: Some("<html>alt</html>".to_string()),
        },
        CandidateProfile {
            name: "Ada".to_string(),
            ..Default::default()
        },
    )
    .with_date(date());
    Dispatcher::new(Arc::new(pipeline), workers, BackendKind::Claude)
}

fn seen_ids(path: &Path) -> Vec<String> {
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    raw["seen_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn full_run_processes_reports_and_persists() {
    let home = tempdir().unwrap();
    let seen_path = home.path().join("data/seen_jobs.json");
    std::fs::create_dir_all(seen_path.parent().unwrap()).unwrap();
    std::fs::write(&seen_path, r#"{"seen_ids": ["0000001"], "owner": "me"}"#).unwrap();

    let source = ScriptedSource::new()
        .then(vec![candidate("1000001", "sde"), candidate("1000002", "ai")])
        .then(vec![candidate("1000003", "sde"), candidate("1000004", "sde")]);
    let notifier = RecordingNotifier::new();
    let search = search();
    let manifest_path = home.path().join("data/jobs_2024-03-09.json");

    let summary = DailyRun {
        source: &source,
        search: &search,
        seen_store: &SeenStore::new(&seen_path),
        manifest_path: manifest_path.clone(),
        output_root: home.path().join("out"),
        notifier: &notifier,
        date: date(),
    }
    .execute(&dispatcher(ScriptedGenerator::new().with_tailor(TAILORED), 2))
    .await
    .unwrap();

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.stages_run, vec!["two weeks"]);
    assert_eq!(source.call_count(), 2);

    let ids = seen_ids(&seen_path);
    for id in ["0000001", "1000001", "1000002", "1000003", "1000004"] {
        assert!(ids.contains(&id.to_string()), "missing {}", id);
    }
    let raw = std::fs::read_to_string(&seen_path).unwrap();
    assert!(raw.contains("\"owner\""));

    let manifest = RunManifest::open_existing(&manifest_path).await.unwrap();
    let entries = manifest.entries().await;
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.status == ItemStatus::Succeeded));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0], "Job run 2024-03-09: 3/3 succeeded");
    assert!(home.path().join("out/Acme/Ada-Resume-Acme.pdf").exists());
}

#[tokio::test]
async fn empty_run_sends_no_jobs_message() {
    let home = tempdir().unwrap();
    let seen_path = home.path().join("seen_jobs.json");
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    let search = search();

    let summary = DailyRun {
        source: &source,
        search: &search,
        seen_store: &SeenStore::new(&seen_path),
        manifest_path: home.path().join("jobs.json"),
        output_root: home.path().join("out"),
        notifier: &notifier,
        date: date(),
    }
    .execute(&dispatcher(ScriptedGenerator::new(), 1))
    .await
    .unwrap();

    assert!(summary.results.is_empty());
    assert_eq!(notifier.sent(), vec![vec!["No new jobs found today (2024-03-09).".to_string()]]);
    assert!(!home.path().join("jobs.json").exists());
    assert!(seen_path.exists());
}

#[tokio::test]
async fn failed_items_are_recorded_and_run_continues() {
    let home = tempdir().unwrap();
    let source = ScriptedSource::new().then(vec![
        candidate("2000001", "sde"),
        candidate("2000002", "sde"),
        candidate("2000003", "ai"),
    ]);
    let notifier = RecordingNotifier::new();
    let search = search();
    let manifest_path = home.path().join("jobs.json");

    let summary = DailyRun {
        source: &source,
        search: &search,
        seen_store: &SeenStore::new(home.path().join("seen.json")),
        manifest_path: manifest_path.clone(),
        output_root: home.path().join("out"),
        notifier: &notifier,
        date: date(),
    }
    .execute(&dispatcher(ScriptedGenerator::new().with_tailor("no markup here"), 3))
    .await
    .unwrap();

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.succeeded(), 0);
    let manifest = RunManifest::open_existing(&manifest_path).await.unwrap();
    assert_eq!(manifest.unfinished().await.len(), 3);
    assert!(notifier.sent()[0].iter().filter(|l| l.starts_with("❌")).count() == 3);
}

#[tokio::test]
async fn whole_day_retry_only_reruns_unfinished_entries() {
    let home = tempdir().unwrap();
    let manifest_path = home.path().join("jobs.json");
    let manifest = RunManifest::open(&manifest_path).await.unwrap();
    let done = candidate("3000001", "sde");
    let pending = candidate("3000002", "sde");
    assert_ok!(manifest.merge(&[done.clone(), pending.clone()]).await);

    let mut succeeded = jobscout::PipelineResult::failed(done.clone(), "");
    succeeded.failure = None;
    succeeded.tailored = Some("a.html".into());
    succeeded.rendered = Some("a.pdf".into());
    assert_ok!(manifest.record(&succeeded).await);

    let browser = ScriptedBrowser::new().with_page(
        pending.url.clone(),
        r#"<div id="job-details">Ship Rust services.</div>"#,
    );
    let generator = ScriptedGenerator::new().with_tailor(TAILORED);
    let calls = generator.clone();
    let manifest = RunManifest::open_existing(&manifest_path).await.unwrap();

    let outcome = retry_day(
        &browser,
        &ListingSource::default().with_pacing(Pacing::immediate()),
        &manifest,
        &dispatcher(generator, 2),
        &home.path().join("out"),
    )
    .await
    .unwrap();

    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.already_done, 1);
    assert_eq!(browser.visits(), vec![pending.url.clone()]);
    assert!(calls.calls().iter().any(|c| c.prompt.contains("Ship Rust services.")));
    assert!(manifest.unfinished().await.is_empty());
}

#[tokio::test]
async fn whole_day_retry_requires_manifest() {
    let home = tempdir().unwrap();
    let err = RunManifest::open_existing(home.path().join("jobs_2000-01-01.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, jobscout::StoreError::ManifestNotFound(_)));
}

#[tokio::test]
async fn single_retry_uses_fetched_posting() {
    let home = tempdir().unwrap();
    let url = "https://www.linkedin.com/jobs/view/4000001";
    let browser = ScriptedBrowser::new().with_page(
        url,
        r#"<h1>Platform Engineer</h1>
           <a class="topcard__org-name-link">Globex</a>
           <span class="topcard__flavor--bullet">Remote</span>
           <div class="description__text">Operate the fleet.</div>"#,
    );
    let manifest = RunManifest::open(home.path().join("jobs.json")).await.unwrap();
    let request = RetryRequest {
        url: url.to_string(),
        category: Some("sde".to_string()),
        ..Default::default()
    };

    let result = retry_one(
        &browser,
        &ListingSource::default().with_pacing(Pacing::immediate()),
        &request,
        &dispatcher(ScriptedGenerator::new().with_tailor(TAILORED), 1),
        &home.path().join("out"),
        &manifest,
    )
    .await
    .unwrap();

    assert!(result.success());
    assert_eq!(result.item.company, "Globex");
    assert_eq!(result.item.job_id, "4000001");
    assert_eq!(result.item.category, "sde");
    let entries = manifest.entries().await;
    assert_eq!(entries[0].status, ItemStatus::Succeeded);
}

#[tokio::test]
async fn single_retry_without_company_does_no_work() {
    let home = tempdir().unwrap();
    let generator = ScriptedGenerator::new().with_tailor(TAILORED);
    let calls = generator.clone();
    let manifest = RunManifest::open(home.path().join("jobs.json")).await.unwrap();

    let outcome = retry_one(
        &ScriptedBrowser::new(),
        &ListingSource::default().with_pacing(Pacing::immediate()),
        &RetryRequest {
            url: "https://www.linkedin.com/jobs/view/4000002".to_string(),
            title: Some("Engineer".to_string()),
            ..Default::default()
        },
        &dispatcher(generator, 1),
        &home.path().join("out"),
        &manifest,
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(calls.call_count(), 0);
    assert!(manifest.entries().await.is_empty());
}
