//! Two-phase acquisition: collect cards from search pages, then fetch the
//! description of each kept card.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::detail::fetch_description;
use super::filters::{canonical_url, days_ago, extract_job_id, location_matches, within_age};
use super::plan::{build_plan, PlanEntry};
use super::source::ListingSource;
use super::{AcquireOverrides, CandidateSource};
use crate::browser::{Browser, Element, PageSession};
use crate::config::SearchConfig;
use crate::error::BrowseError;
use crate::store::SeenSet;
use crate::types::CandidateItem;

/// Raw fields read off one search card.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Card {
    job_id: String,
    title: String,
    company: String,
    location: String,
    url: String,
    posted_date: String,
}

pub struct AcquisitionEngine<B: Browser> {
    browser: B,
    config: Arc<SearchConfig>,
    source: ListingSource,
    now: DateTime<Utc>,
}

/// Phase 1 bookkeeping for one engine call.
struct Collection {
    by_category: IndexMap<String, Vec<CandidateItem>>,
    run_ids: HashSet<String>,
    total: usize,
}

impl Collection {
    fn new(config: &SearchConfig) -> Self {
        Self {
            by_category: config
                .categories
                .keys()
                .map(|name| (name.clone(), Vec::new()))
                .collect(),
            run_ids: HashSet::new(),
            total: 0,
        }
    }

    fn count(&self, category: &str) -> usize {
        self.by_category.get(category).map_or(0, Vec::len)
    }
}

impl<B: Browser> AcquisitionEngine<B> {
    pub fn new(browser: B, config: Arc<SearchConfig>, source: ListingSource) -> Self {
        Self {
            browser,
            config,
            source,
            now: Utc::now(),
        }
    }

    /// Pin "now" for age calculations.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn source(&self) -> &ListingSource {
        &self.source
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Run both phases once.
    ///
    /// Every accepted id goes into `seen` immediately, including cards later
    /// trimmed away as over-collection.
    pub async fn run(
        &self,
        seen: &SeenSet,
        overrides: &AcquireOverrides,
    ) -> Result<Vec<CandidateItem>, BrowseError> {
        let max_days_old = overrides.max_days_old.unwrap_or(self.config.max_days_old);
        let plan = build_plan(
            &self.config,
            &overrides.experience_levels,
            overrides.categories.as_deref(),
        );

        let mut page = self.browser.new_page().await?;

        let collection = self.collect_cards(&mut page, &plan, seen, max_days_old).await;
        let candidates = self.trim_to_targets(collection);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        Ok(self.fetch_descriptions(&mut page, candidates).await)
    }

    async fn collect_cards(
        &self,
        page: &mut B::Session,
        plan: &[PlanEntry],
        seen: &SeenSet,
        max_days_old: u32,
    ) -> Collection {
        let mut collection = Collection::new(&self.config);
        let total_searches = plan.len();
        let max_candidates = self.config.max_candidates;
        let days_label = if max_days_old > 0 {
            format!("<={}d", max_days_old)
        } else {
            "any age".to_string()
        };

        info!(searches = total_searches, "Phase 1: searching listings");

        for (idx, entry) in plan.iter().enumerate() {
            let search_no = idx + 1;
            let target = self
                .config
                .categories
                .get(&entry.category)
                .map_or(0, |c| c.target_count);

            if collection.count(&entry.category) >= target * 2 {
                debug!(
                    search_no,
                    category = %entry.category,
                    keyword = %entry.keyword,
                    "Skipping search, category has enough"
                );
                continue;
            }
            if collection.total >= max_candidates {
                info!(search_no, max_candidates, "Max candidates reached, stopping");
                break;
            }

            info!(
                search_no,
                total_searches,
                category = %entry.category,
                keyword = %entry.keyword,
                location = %entry.location,
                levels = ?entry.experience_levels,
                age = %days_label,
                "Searching"
            );

            let mut search_new = 0;
            for page_no in 0..self.source.page_limit {
                let url = match self.source.search_url(entry, &self.config.sort_by, page_no) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(error = %e, "Could not build search URL");
                        break;
                    }
                };

                if let Err(e) = page.goto(url.as_str(), self.source.pacing.search_timeout).await {
                    warn!(page = page_no + 1, error = %e, "Search page failed to load");
                    break;
                }
                page.wait(self.source.pacing.search_settle).await;

                let cards = self.cards_on(page);
                let cards_on_page = cards.len();
                let mut page_new = 0;

                for element in cards {
                    if collection.total >= max_candidates {
                        break;
                    }
                    let Some(card) = parse_card(&element, &self.source, &entry.location) else {
                        continue;
                    };
                    if let Some(item) = self.accept(card, entry, seen, &mut collection, max_days_old) {
                        collection
                            .by_category
                            .entry(entry.category.clone())
                            .or_default()
                            .push(item);
                        collection.total += 1;
                        page_new += 1;
                    }
                }

                search_new += page_new;
                debug!(page = page_no + 1, cards = cards_on_page, new = page_new, "Search page parsed");

                if collection.total >= max_candidates || self.source.is_last_page(cards_on_page) {
                    break;
                }
                self.source.pacing.between_pages.sleep().await;
            }

            info!(search_no, new = search_new, "Search finished");
        }

        info!(collected = collection.total, "Phase 1 complete");
        for (name, category) in &self.config.categories {
            let found = collection.count(name);
            info!(
                category = %name,
                found,
                target = category.target_count,
                met = found >= category.target_count,
                "Category collection"
            );
        }

        collection
    }

    fn cards_on(&self, page: &B::Session) -> Vec<Element> {
        for selector in &self.source.cards.card {
            let cards = page.query_all(selector);
            if !cards.is_empty() {
                return cards;
            }
        }
        Vec::new()
    }

    /// Apply dedup, location and recency rules; record the id if accepted.
    fn accept(
        &self,
        card: Card,
        entry: &PlanEntry,
        seen: &SeenSet,
        collection: &mut Collection,
        max_days_old: u32,
    ) -> Option<CandidateItem> {
        if collection.run_ids.contains(&card.job_id) || seen.contains(&card.job_id) {
            return None;
        }
        if !location_matches(&card.location, &entry.location) {
            return None;
        }
        let days_old = days_ago(&card.posted_date, self.now);
        if !within_age(days_old, max_days_old) {
            return None;
        }

        collection.run_ids.insert(card.job_id.clone());
        seen.insert(card.job_id.clone());

        Some(CandidateItem {
            job_id: card.job_id,
            title: card.title,
            company: card.company,
            location: card.location,
            url: card.url,
            keyword: entry.keyword.clone(),
            posted_date: card.posted_date,
            days_old,
            category: entry.category.clone(),
            description: String::new(),
        })
    }

    /// Cut each category to its target, keeping collection order, and join
    /// them in configured order.
    fn trim_to_targets(&self, collection: Collection) -> Vec<CandidateItem> {
        let mut by_category = collection.by_category;
        let mut candidates = Vec::new();
        for (name, category) in &self.config.categories {
            if let Some(items) = by_category.swap_remove(name) {
                candidates.extend(items.into_iter().take(category.target_count));
            }
        }
        info!(selected = candidates.len(), "Selected candidates for detail fetch");
        candidates
    }

    async fn fetch_descriptions(
        &self,
        page: &mut B::Session,
        mut candidates: Vec<CandidateItem>,
    ) -> Vec<CandidateItem> {
        candidates.sort_by(CandidateItem::cmp_by_age);
        let total = candidates.len();
        info!(total, "Phase 2: fetching descriptions");

        let mut enriched = Vec::with_capacity(total);
        for (idx, item) in candidates.into_iter().enumerate() {
            let description = match fetch_description(page, &item.url, &self.source).await {
                Ok(description) => description,
                Err(e) => {
                    warn!(job_id = %item.job_id, error = %e, "Description fetch failed");
                    String::new()
                }
            };

            let chars = description.chars().count();
            info!(
                n = idx + 1,
                total,
                title = %item.title,
                company = %item.company,
                age = %item.age_label(),
                chars,
                short = chars <= 100,
                "Description fetched"
            );
            enriched.push(item.with_description(description));
            self.source.pacing.after_detail.sleep().await;
        }

        info!(fetched = enriched.len(), "Phase 2 complete");
        enriched
    }
}

/// Read one card. Cards without a recognizable posting id are skipped.
fn parse_card(element: &Element, source: &ListingSource, query_location: &str) -> Option<Card> {
    let selectors = &source.cards;
    let href = element
        .select_first(&selectors.link)
        .and_then(|a| a.attr("href").map(str::to_string))
        .unwrap_or_default();
    let job_id = extract_job_id(&href)?;

    let text = |selector: &str| element.select_first(selector).map(|el| el.text());
    let posted_date = element
        .select_first(&selectors.posted)
        .map(|el| {
            el.attr("datetime")
                .map(str::to_string)
                .unwrap_or_else(|| el.text())
        })
        .unwrap_or_default();

    Some(Card {
        job_id,
        title: text(&selectors.title).unwrap_or_default(),
        company: text(&selectors.company).unwrap_or_default(),
        // A card with no location element inherits the query location.
        location: text(&selectors.location).unwrap_or_else(|| query_location.to_string()),
        url: canonical_url(&href),
        posted_date,
    })
}

#[async_trait]
impl<B: Browser> CandidateSource for AcquisitionEngine<B> {
    async fn acquire(
        &self,
        seen: &SeenSet,
        overrides: &AcquireOverrides,
    ) -> Result<Vec<CandidateItem>, BrowseError> {
        self.run(seen, overrides).await
    }
}

/// Count items per category, zero-filled for every configured category.
pub fn count_by_category<'a>(
    categories: impl IntoIterator<Item = &'a String>,
    items: &[CandidateItem],
) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> =
        categories.into_iter().map(|name| (name.clone(), 0)).collect();
    let mut extra: HashMap<&str, usize> = HashMap::new();
    for item in items {
        match counts.get_mut(&item.category) {
            Some(count) => *count += 1,
            None => *extra.entry(item.category.as_str()).or_default() += 1,
        }
    }
    for (name, count) in extra {
        counts.insert(name.to_string(), count);
    }
    counts
}
