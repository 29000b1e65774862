//! Core data types shared across acquisition, pipeline and reporting.

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Age marker for postings whose date could not be parsed.
pub const UNKNOWN_AGE: i64 = -1;

/// One discovered posting.
///
/// Created from a search card, then enriched with its description. The
/// category is fixed at creation and carried through every later stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Numeric posting id taken from the listing URL.
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Listing URL without its query string.
    pub url: String,
    /// Search keyword that surfaced this posting.
    pub keyword: String,
    /// Raw date string from the card, empty if none.
    pub posted_date: String,
    /// Days since posting, or [`UNKNOWN_AGE`].
    pub days_old: i64,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl CandidateItem {
    /// Attach the fetched description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Order by age, newest first, unknown ages last.
    pub fn cmp_by_age(&self, other: &Self) -> Ordering {
        let key = |c: &Self| (c.days_old < 0, c.days_old);
        key(self).cmp(&key(other))
    }

    /// Description text, or a one-line stand-in when the fetch came back empty.
    pub fn description_or_fallback(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            format!("Role: {} at {}, {}.", self.title, self.company, self.location)
        } else {
            description.to_string()
        }
    }

    pub fn age_label(&self) -> String {
        if self.days_old >= 0 {
            format!("{}d ago", self.days_old)
        } else {
            "?".to_string()
        }
    }
}

/// Paths of the auxiliary documents written for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryDocs {
    pub cover_letter: Option<PathBuf>,
    pub why_company: Option<PathBuf>,
}

impl AuxiliaryDocs {
    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        self.cover_letter.iter().chain(self.why_company.iter())
    }
}

/// Outcome of running one item through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub item: CandidateItem,
    /// Tailored HTML document.
    pub tailored: Option<PathBuf>,
    /// Rendered PDF.
    pub rendered: Option<PathBuf>,
    pub auxiliary: AuxiliaryDocs,
    /// Short reason when the item did not succeed.
    pub failure: Option<String>,
}

impl PipelineResult {
    pub fn failed(item: CandidateItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            tailored: None,
            rendered: None,
            auxiliary: AuxiliaryDocs::default(),
            failure: Some(reason.into()),
        }
    }

    /// Succeeded iff both the tailored document and the rendered artifact exist.
    /// Auxiliary documents never affect this.
    pub fn success(&self) -> bool {
        self.tailored.is_some() && self.rendered.is_some()
    }

    pub fn marker(&self) -> &'static str {
        if self.success() {
            "✅"
        } else {
            "❌"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candidate;

    #[test]
    fn test_unknown_age_sorts_last() {
        let mut items = vec![candidate("1", "x"), candidate("2", "x"), candidate("3", "x")];
        items[1].days_old = 4;
        items[2].days_old = 0;

        items.sort_by(CandidateItem::cmp_by_age);
        let ids: Vec<_> = items.iter().map(|c| c.job_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_empty_description_falls_back_to_summary_line() {
        let item = candidate("9", "x").with_description("   ");
        assert_eq!(
            item.description_or_fallback(),
            "Role: Engineer 9 at Acme, Remote."
        );
    }

    #[test]
    fn test_success_requires_both_artifacts() {
        let mut result = PipelineResult::failed(candidate("1", "x"), "no output");
        assert!(!result.success());

        result.tailored = Some(PathBuf::from("a.html"));
        assert!(!result.success());

        result.rendered = Some(PathBuf::from("a.pdf"));
        assert!(result.success());
        assert_eq!(result.marker(), "✅");
    }

    #[test]
    fn test_auxiliary_docs_do_not_count_toward_success() {
        let mut result = PipelineResult::failed(candidate("1", "x"), "render failed");
        result.auxiliary.cover_letter = Some(PathBuf::from("cl.txt"));
        result.auxiliary.why_company = Some(PathBuf::from("why.txt"));
        assert!(!result.success());
        assert_eq!(result.auxiliary.written().count(), 2);
    }
}
