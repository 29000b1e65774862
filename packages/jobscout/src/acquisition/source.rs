//! Where and how fast to read the listings source.

use std::time::Duration;

use url::Url;

use super::plan::PlanEntry;
use crate::error::BrowseError;

pub const DEFAULT_SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";

/// Selectors for the fields read off each search card.
#[derive(Debug, Clone)]
pub struct CardSelectors {
    /// Card containers, first selector with any match wins.
    pub card: Vec<String>,
    pub link: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted: String,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            card: vec![".job-search-card".into(), ".base-card".into()],
            link: "a".into(),
            title: ".base-search-card__title".into(),
            company: ".base-search-card__subtitle".into(),
            location: ".job-search-card__location".into(),
            posted: "time".into(),
        }
    }
}

/// Selectors for the posting detail page.
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    /// Description regions in order of preference.
    pub description: Vec<String>,
    pub title: String,
    pub company: String,
    pub location: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            description: vec![
                ".show-more-less-html__markup".into(),
                "#job-details".into(),
                ".description__text".into(),
            ],
            title: "h1".into(),
            company: ".topcard__org-name-link".into(),
            location: ".topcard__flavor--bullet".into(),
        }
    }
}

/// A base delay plus a uniformly random extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub base: Duration,
    pub spread: Duration,
}

impl Jitter {
    pub const NONE: Jitter = Jitter {
        base: Duration::ZERO,
        spread: Duration::ZERO,
    };

    pub fn new(base: Duration, spread: Duration) -> Self {
        Self { base, spread }
    }

    pub fn sample(&self) -> Duration {
        self.base + self.spread.mul_f64(fastrand::f64())
    }

    pub async fn sleep(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Timeouts, settle waits and politeness delays.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub search_timeout: Duration,
    pub search_settle: Duration,
    pub detail_timeout: Duration,
    pub detail_settle: Duration,
    pub between_pages: Jitter,
    pub after_detail: Jitter,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(30),
            search_settle: Duration::from_millis(3500),
            detail_timeout: Duration::from_secs(25),
            detail_settle: Duration::from_secs(3),
            between_pages: Jitter::new(Duration::from_millis(1500), Duration::from_millis(1000)),
            after_detail: Jitter::new(Duration::from_millis(1000), Duration::from_millis(500)),
        }
    }
}

impl Pacing {
    /// No waiting at all, for tests.
    pub fn immediate() -> Self {
        Self {
            search_timeout: Duration::from_secs(5),
            search_settle: Duration::ZERO,
            detail_timeout: Duration::from_secs(5),
            detail_settle: Duration::ZERO,
            between_pages: Jitter::NONE,
            after_detail: Jitter::NONE,
        }
    }
}

/// Everything the engine needs to know about the listings source.
#[derive(Debug, Clone)]
pub struct ListingSource {
    pub search_url: String,
    pub page_limit: usize,
    pub page_size: usize,
    /// A page with fewer than `page_size * short_page_ratio` cards is the last.
    pub short_page_ratio: f64,
    pub cards: CardSelectors,
    pub detail: DetailSelectors,
    pub pacing: Pacing,
}

impl Default for ListingSource {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            page_limit: 3,
            page_size: 25,
            short_page_ratio: 0.8,
            cards: CardSelectors::default(),
            detail: DetailSelectors::default(),
            pacing: Pacing::default(),
        }
    }
}

impl ListingSource {
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Search URL for one plan entry and zero-based page number.
    pub fn search_url(&self, entry: &PlanEntry, sort_by: &str, page: usize) -> Result<Url, BrowseError> {
        let levels = entry
            .experience_levels
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut url = Url::parse(&self.search_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("keywords", &entry.keyword)
                .append_pair("location", &entry.location)
                .append_pair("f_E", &levels)
                .append_pair("sortBy", sort_by);
            if page > 0 {
                query.append_pair("start", &(page * self.page_size).to_string());
            }
        }
        Ok(url)
    }

    /// Too few cards on a page means there is no next page.
    pub fn is_last_page(&self, cards_on_page: usize) -> bool {
        (cards_on_page as f64) < self.page_size as f64 * self.short_page_ratio
    }
}
