//! Backend selection, the quota breaker and report chunking as seen from outside.

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::tempdir;
use tokio_test::assert_ok;

use jobscout::config::CandidateProfile;
use jobscout::generation::{Backend, BackendKind, GenerationSettings, Generator, QuotaBreaker, Role};
use jobscout::orchestrator::Dispatcher;
use jobscout::pipeline::{ItemPipeline, Templates};
use jobscout::testing::{candidate, ScriptedRunner, StubRenderer};
use jobscout::GenerationError;

fn settings(pairs: &[(&str, &str)]) -> GenerationSettings {
    let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    GenerationSettings::from_lookup(|key| env.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn quota_hit_stops_every_later_call() {
    let runner = ScriptedRunner::new()
        .with_failure(1, "Claude AI usage limit reached|1718000000")
        .with_success("never reached");
    let breaker = Arc::new(QuotaBreaker::default());
    let backend = Backend::from_settings(&settings(&[("LLM_MODE", "claude")]), breaker.clone(), Arc::new(runner.clone())).unwrap();
    assert_eq!(backend.kind(), BackendKind::Claude);

    for label in ["first", "second", "third"] {
        let err = backend.generate("prompt", Role::Auxiliary, label).await.unwrap_err();
        assert!(matches!(err, GenerationError::QuotaExhausted { .. }));
    }
    assert!(breaker.is_tripped());
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn tripped_breaker_fails_the_rest_of_the_run() {
    let home = tempdir().unwrap();
    let runner = ScriptedRunner::new().with_failure(1, "You've hit your limit · resets 5pm");
    let backend = Backend::from_settings(
        &settings(&[("LLM_MODE", "claude")]),
        Arc::new(QuotaBreaker::default()),
        Arc::new(runner.clone()),
    )
    .unwrap();
    let pipeline = ItemPipeline::new(
        Arc::new(backend),
        Arc::new(StubRenderer::new()),
        Templates {
            primary: "<html></html>".to_string(),
            secondary: None,
        },
        CandidateProfile::default(),
    );
    let dispatcher = Dispatcher::new(Arc::new(pipeline), 1, BackendKind::Claude);

    let items = vec![
        candidate("5000001", "sde"),
        candidate("5000002", "sde"),
        candidate("5000003", "ai"),
    ];
    let results = dispatcher.dispatch(items, home.path(), None).await;

    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(!result.success());
        assert!(result.failure.as_deref().unwrap().contains("quota"));
    }
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn success_output_is_normalized() {
    let runner = ScriptedRunner::new().with_success("  Here's the cover letter:\nDear team  \n");
    let backend = Backend::from_settings(
        &settings(&[("LLM_MODE", "claude")]),
        Arc::new(QuotaBreaker::default()),
        Arc::new(runner),
    )
    .unwrap();

    let text = assert_ok!(backend.generate("prompt", Role::Auxiliary, "cover").await);
    assert_eq!(text, "Dear team");
}

#[test]
fn hosted_backend_without_key_is_rejected() {
    let result = Backend::from_settings(
        &settings(&[("LLM_MODE", "openai")]),
        Arc::new(QuotaBreaker::default()),
        Arc::new(ScriptedRunner::new()),
    );
    assert!(matches!(result, Err(GenerationError::MissingCredential("OPENAI_API_KEY"))));
}

#[test]
fn openclaw_runs_alone() {
    let runner: Arc<ScriptedRunner> = Arc::new(ScriptedRunner::new());
    let backend = assert_ok!(Backend::from_settings(
        &settings(&[("LLM_MODE", "openclaw")]),
        Arc::new(QuotaBreaker::default()),
        runner,
    ));
    assert!(!backend.kind().concurrency_safe());
    assert_eq!(jobscout::orchestrator::effective_workers(4, backend.kind()), 1);
    assert_eq!(jobscout::orchestrator::effective_workers(4, BackendKind::Codex), 4);
}

#[test]
fn long_report_splits_on_line_boundaries() {
    let lines: Vec<String> = (0..50).map(|i| format!("{:0>50}", i)).collect();
    let chunks = webhook::chunk_lines(&lines, webhook::DEFAULT_CHUNK_BUDGET);

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.chars().count() <= 1900));
    let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
    assert_eq!(rejoined.len(), 50);
    assert_eq!(rejoined[49], lines[49]);
}
