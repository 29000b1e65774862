//! Testing utilities including mock implementations.
//!
//! Scripted stand-ins for the browser, subprocess runner, generation backend,
//! renderer, candidate source and notifier, so the acquisition and pipeline
//! logic can be exercised without network, binaries or a real browser.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use webhook::WebhookError;

use crate::acquisition::{AcquireOverrides, CandidateSource};
use crate::browser::{select_html, Browser, Element, PageSession};
use crate::error::{BrowseError, GenerationError, RenderError};
use crate::generation::{CommandRunner, Generator, Invocation, ProcessOutput, Role};
use crate::notify::Notifier;
use crate::pipeline::Renderer;
use crate::store::SeenSet;
use crate::types::{CandidateItem, UNKNOWN_AGE};

/// A minimal candidate at Acme, Remote, with a listings-style URL.
pub fn candidate(job_id: &str, category: &str) -> CandidateItem {
    CandidateItem {
        job_id: job_id.to_string(),
        title: format!("Engineer {}", job_id),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        url: format!("https://www.linkedin.com/jobs/view/{}", job_id),
        keyword: "software engineer".to_string(),
        posted_date: String::new(),
        days_old: UNKNOWN_AGE,
        category: category.to_string(),
        description: String::new(),
    }
}

// ============================================================================
// Subprocess runner
// ============================================================================

/// Replays queued process outcomes in order and records every invocation.
#[derive(Default, Clone)]
pub struct ScriptedRunner {
    outcomes: Arc<RwLock<VecDeque<Result<ProcessOutput, io::ErrorKind>>>>,
    calls: Arc<RwLock<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_success(self, stdout: impl Into<String>) -> Self {
        self.outcomes.write().unwrap().push_back(Ok(ProcessOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }));
        self
    }

    pub fn with_failure(self, code: i32, stderr: impl Into<String>) -> Self {
        self.outcomes.write().unwrap().push_back(Ok(ProcessOutput {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }));
        self
    }

    pub fn with_io_error(self, kind: io::ErrorKind) -> Self {
        self.outcomes.write().unwrap().push_back(Err(kind));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        self.calls.write().unwrap().push(invocation.clone());
        match self.outcomes.write().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Err(io::Error::new(io::ErrorKind::Other, "no scripted outcome left")),
        }
    }
}

// ============================================================================
// Browser
// ============================================================================

/// Serves canned HTML per URL and records every navigation.
///
/// Exact URLs registered with [`with_page`](Self::with_page) win; otherwise the
/// first route whose needle occurs in the URL is served. Anything else is a 404.
#[derive(Default, Clone)]
pub struct ScriptedBrowser {
    pages: Arc<RwLock<HashMap<String, String>>>,
    routes: Arc<RwLock<Vec<(String, String)>>>,
    visits: Arc<RwLock<Vec<String>>>,
    pages_opened: Arc<AtomicUsize>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    pub fn with_route(self, needle: impl Into<String>, html: impl Into<String>) -> Self {
        self.routes.write().unwrap().push((needle.into(), html.into()));
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.read().unwrap().clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Option<String> {
        if let Some(html) = self.pages.read().unwrap().get(url) {
            return Some(html.clone());
        }
        self.routes
            .read()
            .unwrap()
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, html)| html.clone())
    }
}

pub struct ScriptedPage {
    browser: ScriptedBrowser,
    html: Option<String>,
}

#[async_trait]
impl Browser for ScriptedBrowser {
    type Session = ScriptedPage;

    async fn new_page(&self) -> Result<ScriptedPage, BrowseError> {
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedPage {
            browser: self.clone(),
            html: None,
        })
    }
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), BrowseError> {
        self.browser.visits.write().unwrap().push(url.to_string());
        match self.browser.lookup(url) {
            Some(html) => {
                self.html = Some(html);
                Ok(())
            }
            None => {
                self.html = None;
                Err(BrowseError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            }
        }
    }

    async fn wait(&mut self, _duration: Duration) {}

    fn query_all(&self, selector: &str) -> Vec<Element> {
        match &self.html {
            Some(html) => select_html(html, selector),
            None => Vec::new(),
        }
    }
}

// ============================================================================
// Generation backend
// ============================================================================

/// Record of one call made to [`ScriptedGenerator`].
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub role: Role,
    pub label: String,
    pub prompt: String,
}

/// Answers by role. A role without a scripted answer fails as empty output.
#[derive(Default, Clone)]
pub struct ScriptedGenerator {
    tailor: Option<String>,
    auxiliary: Option<String>,
    panic_on: Option<String>,
    delay: Duration,
    calls: Arc<RwLock<Vec<GenerationCall>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tailor(mut self, output: impl Into<String>) -> Self {
        self.tailor = Some(output.into());
        self
    }

    pub fn with_auxiliary(mut self, output: impl Into<String>) -> Self {
        self.auxiliary = Some(output.into());
        self
    }

    /// Panic on any prompt containing `needle`.
    pub fn with_panic_on(mut self, needle: impl Into<String>) -> Self {
        self.panic_on = Some(needle.into());
        self
    }

    /// Sleep before answering, to make concurrent calls overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, role: Role, label: &str) -> Result<String, GenerationError> {
        self.calls.write().unwrap().push(GenerationCall {
            role,
            label: label.to_string(),
            prompt: prompt.to_string(),
        });
        if let Some(needle) = &self.panic_on {
            if prompt.contains(needle.as_str()) {
                panic!("scripted panic on {}", needle);
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = match role {
            Role::Tailor => &self.tailor,
            Role::Auxiliary => &self.auxiliary,
        };
        answer
            .clone()
            .ok_or(GenerationError::Empty { backend: "scripted" })
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Writes a placeholder artifact, or fails every call.
#[derive(Default, Clone)]
pub struct StubRenderer {
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(&self, _html: &Path, output: &Path) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RenderError::Failed("stub renderer told to fail".to_string()));
        }
        tokio::fs::write(output, b"%PDF-1.4 stub")
            .await
            .map_err(|e| RenderError::Failed(e.to_string()))
    }
}

// ============================================================================
// Candidate source
// ============================================================================

/// Replays one queued batch per call and records the overrides it was given.
///
/// Returned ids are added to the seen set the way the real engine does.
#[derive(Default, Clone)]
pub struct ScriptedSource {
    batches: Arc<RwLock<VecDeque<Option<Vec<CandidateItem>>>>>,
    calls: Arc<RwLock<Vec<AcquireOverrides>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, items: Vec<CandidateItem>) -> Self {
        self.batches.write().unwrap().push_back(Some(items));
        self
    }

    pub fn then_fail(self) -> Self {
        self.batches.write().unwrap().push_back(None);
        self
    }

    pub fn calls(&self) -> Vec<AcquireOverrides> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl CandidateSource for ScriptedSource {
    async fn acquire(
        &self,
        seen: &SeenSet,
        overrides: &AcquireOverrides,
    ) -> Result<Vec<CandidateItem>, BrowseError> {
        self.calls.write().unwrap().push(overrides.clone());
        match self.batches.write().unwrap().pop_front() {
            Some(Some(items)) => {
                for item in &items {
                    seen.insert(item.job_id.clone());
                }
                Ok(items)
            }
            Some(None) => Err(BrowseError::Setup("scripted source failure".to_string())),
            None => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Keeps every report it is handed.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<Vec<String>>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, lines: &[String]) -> Result<usize, WebhookError> {
        self.sent.write().unwrap().push(lines.to_vec());
        Ok(1)
    }
}
