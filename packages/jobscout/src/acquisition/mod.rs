//! Candidate acquisition from the listings source.
//!
//! [`AcquisitionEngine`] runs a search plan in two phases against one browser
//! page. [`FallbackController`] wraps any [`CandidateSource`] and reruns it with
//! relaxed filters for categories that came up short.

mod detail;
mod engine;
mod fallback;
mod filters;
mod plan;
mod source;

pub use detail::{fetch_description, fetch_posting, PostingDetails};
pub use engine::{count_by_category, AcquisitionEngine};
pub use fallback::{Acquisition, FallbackController};
pub use filters::{canonical_url, days_ago, effective_keywords, extract_job_id, location_matches};
pub use plan::{build_plan, PlanEntry};
pub use source::{CardSelectors, DetailSelectors, Jitter, ListingSource, Pacing};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BrowseError;
use crate::store::SeenSet;
use crate::types::CandidateItem;

/// Parameter changes for one engine call. The default is the primary pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireOverrides {
    /// Replaces the configured recency ceiling (0 = any age).
    pub max_days_old: Option<u32>,
    /// Per-category replacement experience levels.
    pub experience_levels: HashMap<String, Vec<u8>>,
    /// Search only these categories.
    pub categories: Option<Vec<String>>,
}

/// Anything that can produce a filtered, trimmed, described candidate list.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Ids of accepted candidates are added to `seen` as they are found.
    async fn acquire(
        &self,
        seen: &SeenSet,
        overrides: &AcquireOverrides,
    ) -> Result<Vec<CandidateItem>, BrowseError>;
}
