//! Search plan: which (keyword, location) pairs to query for which category.

use std::collections::HashMap;

use super::filters::effective_keywords;
use crate::config::{SearchConfig, ENTRY_LEVEL};

/// One query against the listings source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub keyword: String,
    pub location: String,
    pub experience_levels: Vec<u8>,
    pub category: String,
}

/// Cross product of effective keywords and locations, category by category in
/// configured order.
///
/// `exp_overrides` replaces a category's experience levels; `only` restricts
/// the plan to the named categories.
pub fn build_plan(
    config: &SearchConfig,
    exp_overrides: &HashMap<String, Vec<u8>>,
    only: Option<&[String]>,
) -> Vec<PlanEntry> {
    let mut plan = Vec::new();

    for (name, category) in &config.categories {
        if let Some(only) = only {
            if !only.contains(name) {
                continue;
            }
        }

        let levels = exp_overrides
            .get(name)
            .filter(|levels| !levels.is_empty())
            .unwrap_or(&category.experience_levels);
        let keywords = effective_keywords(
            &category.keywords,
            &category.boost_keywords,
            levels,
            ENTRY_LEVEL,
        );

        for keyword in &keywords {
            for location in &config.locations {
                plan.push(PlanEntry {
                    keyword: keyword.clone(),
                    location: location.clone(),
                    experience_levels: levels.clone(),
                    category: name.clone(),
                });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SearchConfig {
        serde_json::from_str(
            r#"{
                "locations": ["Seattle, WA", "Remote"],
                "categories": {
                    "sde": {"keywords": ["swe"], "boost_keywords": ["new grad"], "experience_levels": [2], "target_count": 2},
                    "ai": {"keywords": ["ai engineer"], "boost_keywords": ["junior ai"], "experience_levels": [3], "target_count": 1}
                }
            }"#,
        )
        .unwrap()
    }

    fn pairs(plan: &[PlanEntry]) -> Vec<(&str, &str, &str)> {
        plan.iter()
            .map(|e| (e.category.as_str(), e.keyword.as_str(), e.location.as_str()))
            .collect()
    }

    #[test]
    fn test_plan_is_keyword_by_location_per_category() {
        let plan = build_plan(&config(), &HashMap::new(), None);
        assert_eq!(
            pairs(&plan),
            vec![
                ("sde", "swe", "Seattle, WA"),
                ("sde", "swe", "Remote"),
                ("sde", "new grad", "Seattle, WA"),
                ("sde", "new grad", "Remote"),
                ("ai", "ai engineer", "Seattle, WA"),
                ("ai", "ai engineer", "Remote"),
            ]
        );
        assert_eq!(plan[4].experience_levels, vec![3]);
    }

    #[test]
    fn test_override_can_enable_boost_keywords() {
        let overrides = HashMap::from([("ai".to_string(), vec![2, 3])]);
        let only = vec!["ai".to_string()];
        let plan = build_plan(&config(), &overrides, Some(&only));

        assert!(plan.iter().all(|e| e.category == "ai"));
        assert!(plan.iter().any(|e| e.keyword == "junior ai"));
        assert!(plan.iter().all(|e| e.experience_levels == vec![2, 3]));
    }
}
