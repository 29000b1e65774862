//! Job posting discovery and dispatch.
//!
//! Each run searches a listings source for new postings per configured
//! category, tops up short categories through fallback stages, then runs
//! every posting through a tailoring pipeline on a bounded worker pool and
//! reports the outcome.
//!
//! # Modules
//!
//! - [`acquisition`] - Search plan, two-phase card and detail collection, fallback stages
//! - [`browser`] - Page sessions and DOM queries against the listings source
//! - [`generation`] - Hosted and local text-generation backends behind one trait
//! - [`pipeline`] - Per-item tailoring, auxiliary documents and rendering
//! - [`orchestrator`] - Worker pool and the daily run
//! - [`retry`] - Single-item and whole-day retries
//! - [`store`] - Seen set and per-day manifest
//! - [`testing`] - Scripted stand-ins for tests

pub mod acquisition;
pub mod browser;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod status;
pub mod store;
pub mod testing;
pub mod types;

pub use acquisition::{AcquireOverrides, Acquisition, AcquisitionEngine, CandidateSource, FallbackController, ListingSource};
pub use config::{CandidateProfile, Config, SearchConfig};
pub use error::{BrowseError, GenerationError, RenderError, StoreError};
pub use generation::{Backend, BackendKind, Generator, QuotaBreaker, Role};
pub use orchestrator::{DailyRun, Dispatcher, RunSummary};
pub use pipeline::{ItemPipeline, PlaywrightRenderer, Renderer, Templates};
pub use store::{ItemStatus, RunManifest, SeenSet, SeenStore};
pub use types::{CandidateItem, PipelineResult};
