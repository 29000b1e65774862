//! Card-level parsing and acceptance rules.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::types::UNKNOWN_AGE;

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[/-](\d{7,})").expect("job id pattern is valid"))
}

/// Numeric posting id embedded in a listing link.
pub fn extract_job_id(href: &str) -> Option<String> {
    job_id_pattern()
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Link with tracking parameters removed.
pub fn canonical_url(href: &str) -> String {
    href.split('?').next().unwrap_or(href).to_string()
}

/// Strict location check.
///
/// The source pads results with nearby cities, so a remote query only keeps
/// cards that say remote, and a city query needs the city name in the card.
pub fn location_matches(card_location: &str, query_location: &str) -> bool {
    let card = card_location.trim().to_lowercase();
    let query = query_location.trim().to_lowercase();

    if card.is_empty() {
        return false;
    }
    if query.contains("remote") {
        return card.contains("remote");
    }

    let city = query.split(',').next().unwrap_or("").trim();
    card.contains(city)
}

/// Whole days between the posting date and `now`, never negative.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps; anything else is
/// [`UNKNOWN_AGE`].
pub fn days_ago(posted: &str, now: DateTime<Utc>) -> i64 {
    let posted = posted.trim();
    if posted.is_empty() {
        return UNKNOWN_AGE;
    }

    if let Ok(date) = NaiveDate::parse_from_str(posted, "%Y-%m-%d") {
        return (now.date_naive() - date).num_days().max(0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(posted) {
        return (now - ts.with_timezone(&Utc)).num_days().max(0);
    }
    UNKNOWN_AGE
}

/// Recency check; unknown ages always pass, as does a ceiling of zero.
pub fn within_age(days_old: i64, max_days_old: u32) -> bool {
    max_days_old == 0 || days_old < 0 || days_old <= i64::from(max_days_old)
}

/// Keywords to search for a category: base keywords, plus boost keywords when
/// the entry level is among `levels`. Duplicates dropped, first one wins.
pub fn effective_keywords(base: &[String], boost: &[String], levels: &[u8], entry_level: u8) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::with_capacity(base.len() + boost.len());
    let extra: &[String] = if levels.contains(&entry_level) { boost } else { &[] };
    for keyword in base.iter().chain(extra) {
        if !keywords.contains(keyword) {
            keywords.push(keyword.clone());
        }
    }
    keywords
}
