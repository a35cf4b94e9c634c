//! Time-expiring caches for derived analytics.
//!
//! Every cached value is a pure function of its inputs, so two requests
//! racing to fill the same key is wasted work rather than a hazard; the
//! last writer wins.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::DifficultyParams;
use crate::report::{ClassInsights, StudentSummary};

/// A key/value map whose entries expire `ttl` after insertion.
///
/// Expired entries are evicted lazily on the next lookup of the same key.
/// There is no capacity bound.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if it was inserted less than `ttl` ago.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some((inserted, value)) if now.saturating_duration_since(*inserted) < self.ttl => {
                    return Some(value.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // Another writer may have refreshed the entry in between.
        if let Some((inserted, value)) = entries.get(key) {
            if now.saturating_duration_since(*inserted) < self.ttl {
                return Some(value.clone());
            }
        }
        entries.remove(key);
        debug!("evicted expired cache entry {key}");
        None
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.write().insert(key.into(), (Instant::now(), value));
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.entries.read().len()
    }
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// The cache namespaces shared by the analytics engine.
#[derive(Debug)]
pub struct AnalyticsCache {
    /// Student summaries, keyed by student id.
    pub summary: TtlCache<StudentSummary>,
    /// Class insights, keyed by teacher and class.
    pub class_stats: TtlCache<ClassInsights>,
    /// Calibrated item parameters, keyed by question id.
    pub difficulty: TtlCache<DifficultyParams>,
}

impl AnalyticsCache {
    /// Create all namespaces with the same time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            summary: TtlCache::new(ttl),
            class_stats: TtlCache::new(ttl),
            difficulty: TtlCache::new(ttl),
        }
    }

    /// Empty every namespace.
    pub fn clear(&self) -> RefreshReport {
        self.summary.clear();
        self.class_stats.clear();
        self.difficulty.clear();
        info!("all analytics caches cleared");
        RefreshReport {
            status: "caches_cleared".to_string(),
            cached_items: 0,
            timestamp: Utc::now(),
        }
    }
}

impl Default for AnalyticsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

/// Outcome of a cache refresh. Caches are not introspectable, so the item
/// count is always zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub status: String,
    pub cached_items: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("k", 42);
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn missing_key_is_absent() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entry_is_evicted() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("k", "v".to_string());
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(cache.get_at("k", later), None);
        assert_eq!(cache.raw_len(), 0);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("k", 1);
        let inserted = cache.entries.read().get("k").map(|(t, _)| *t).unwrap();
        assert_eq!(cache.get_at("k", inserted + Duration::from_secs(10)), None);
    }

    #[test]
    fn set_overwrites() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("k", 1);
        cache.set("k", 2);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn zero_ttl_never_hits() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.set("k", 1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn clear_reports_zero_items() {
        let cache = AnalyticsCache::default();
        cache.difficulty.set(
            "q1",
            DifficultyParams {
                question_id: "q1".into(),
                difficulty_parameter: 0.0,
                discrimination_parameter: 1.0,
                guessing_parameter: 0.25,
                difficulty_label: crate::model::DifficultyLabel::Medium,
                total_responses: 4,
                success_rate: 0.5,
            },
        );
        let report = cache.clear();
        assert_eq!(report.status, "caches_cleared");
        assert_eq!(report.cached_items, 0);
        assert!(cache.difficulty.get("q1").is_none());
    }
}
