//! Escalating fallback searches for categories short of target.

use indexmap::IndexMap;
use tracing::{info, warn};

use super::engine::count_by_category;
use super::{AcquireOverrides, CandidateSource};
use crate::config::FallbackStage;
use crate::error::BrowseError;
use crate::store::SeenSet;
use crate::types::CandidateItem;

/// Final candidate list plus what it took to build it.
#[derive(Debug, Clone, Default)]
pub struct Acquisition {
    /// Trimmed to target, concatenated in configured category order.
    pub items: Vec<CandidateItem>,
    pub counts: IndexMap<String, usize>,
    /// Labels of the fallback stages that actually ran.
    pub stages_run: Vec<String>,
}

pub struct FallbackController<'a, S: CandidateSource + ?Sized> {
    source: &'a S,
    /// Category name to target count, in configured order.
    targets: IndexMap<String, usize>,
    stages: &'a [FallbackStage],
}

impl<'a, S: CandidateSource + ?Sized> FallbackController<'a, S> {
    pub fn new(source: &'a S, targets: IndexMap<String, usize>, stages: &'a [FallbackStage]) -> Self {
        Self {
            source,
            targets,
            stages,
        }
    }

    fn shortfalls(&self, buckets: &IndexMap<String, Vec<CandidateItem>>) -> IndexMap<String, usize> {
        self.targets
            .iter()
            .map(|(name, target)| {
                let have = buckets.get(name).map_or(0, Vec::len);
                (name.clone(), target.saturating_sub(have))
            })
            .collect()
    }

    /// Primary pass, then each stage in order while any category is short.
    ///
    /// Only a failure of the primary pass is returned; a failing stage is
    /// logged and the next stage tried.
    pub async fn acquire(&self, seen: &SeenSet) -> Result<Acquisition, BrowseError> {
        let primary = self.source.acquire(seen, &AcquireOverrides::default()).await?;

        let mut buckets: IndexMap<String, Vec<CandidateItem>> = self
            .targets
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        for item in primary {
            if let Some(bucket) = buckets.get_mut(&item.category) {
                bucket.push(item);
            }
        }

        let primary_counts: IndexMap<String, usize> =
            buckets.iter().map(|(k, v)| (k.clone(), v.len())).collect();
        info!(counts = ?primary_counts, "Primary pass result");

        let mut stages_run = Vec::new();
        for stage in self.stages {
            let shortfalls = self.shortfalls(&buckets);
            if shortfalls.values().all(|&s| s == 0) {
                break;
            }

            let short: Vec<String> = shortfalls
                .iter()
                .filter(|(_, &s)| s > 0)
                .map(|(name, _)| name.clone())
                .collect();
            warn!(stage = %stage.label, shortfalls = ?shortfalls, "Running fallback stage");
            stages_run.push(stage.label.clone());

            let overrides = AcquireOverrides {
                max_days_old: Some(stage.max_days_old),
                experience_levels: stage.category_exp_overrides.clone(),
                categories: Some(short),
            };
            let more = match self.source.acquire(seen, &overrides).await {
                Ok(more) => more,
                Err(e) => {
                    warn!(stage = %stage.label, error = %e, "Fallback stage failed");
                    continue;
                }
            };

            let mut remaining = shortfalls;
            for item in more {
                let Some(left) = remaining.get_mut(&item.category) else {
                    continue;
                };
                if *left == 0 {
                    continue;
                }
                *left -= 1;
                if let Some(bucket) = buckets.get_mut(&item.category) {
                    bucket.push(item);
                }
            }
        }

        let mut items = Vec::new();
        for (name, target) in &self.targets {
            if let Some(bucket) = buckets.swap_remove(name) {
                items.extend(bucket.into_iter().take(*target));
            }
        }
        let counts = count_by_category(self.targets.keys(), &items);
        info!(total = items.len(), counts = ?counts, "Final selection");

        Ok(Acquisition {
            items,
            counts,
            stages_run,
        })
    }
}
