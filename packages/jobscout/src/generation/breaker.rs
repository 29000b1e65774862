//! Sticky quota breaker for a provider that reports hard usage limits.

use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_KEYWORDS: &[&str] = &["hit your limit", "usage limit", "resets"];

/// Once tripped, stays tripped for the life of the process.
///
/// Shared by handle (`Arc<QuotaBreaker>`) between every worker that can call
/// the guarded provider.
#[derive(Debug)]
pub struct QuotaBreaker {
    tripped: AtomicBool,
    keywords: Vec<String>,
}

impl Default for QuotaBreaker {
    fn default() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl QuotaBreaker {
    pub fn with_keywords<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            tripped: AtomicBool::new(false),
            keywords: keywords.into_iter().map(str::to_lowercase).collect(),
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Atomically trip the breaker. Returns true only for the call that tripped it.
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }

    /// Does this error text look like a quota message?
    pub fn is_quota_error(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_detects_quota_messages() {
        let breaker = QuotaBreaker::default();
        assert!(breaker.is_quota_error("Claude AI usage limit reached|1718000000"));
        assert!(breaker.is_quota_error("You've hit your limit · resets 5pm"));
        assert!(!breaker.is_quota_error("error: connection refused"));
    }

    #[test]
    fn test_trip_is_sticky_and_reported_once() {
        let breaker = QuotaBreaker::default();
        assert!(!breaker.is_tripped());
        assert!(breaker.trip());
        assert!(!breaker.trip());
        assert!(breaker.is_tripped());
    }

    #[tokio::test]
    async fn test_concurrent_trip_has_single_winner() {
        let breaker = Arc::new(QuotaBreaker::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                tokio::spawn(async move { breaker.trip() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
