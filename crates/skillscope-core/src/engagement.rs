//! Activity-log aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::statistics::round_to;

/// One entry from a student's activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(default)]
    pub student_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "type")]
    pub activity_type: String,
    #[serde(default, alias = "xp")]
    pub xp_earned: f64,
}

/// When and how much a student is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    /// `YYYY-MM-DD` to event count.
    pub daily_activity: BTreeMap<String, usize>,
    /// Hour of day (UTC) to event count.
    pub hourly_activity: BTreeMap<u32, usize>,
    pub total_activities: usize,
    pub active_days: usize,
    pub avg_activities_per_day: f64,
    #[serde(rename = "totalXP")]
    pub total_xp: f64,
}

pub fn aggregate_engagement(events: &[ActivityEvent]) -> EngagementMetrics {
    let mut metrics = EngagementMetrics::default();
    for event in events {
        *metrics
            .daily_activity
            .entry(event.timestamp.format("%Y-%m-%d").to_string())
            .or_default() += 1;
        *metrics
            .hourly_activity
            .entry(event.timestamp.hour())
            .or_default() += 1;
        metrics.total_xp += event.xp_earned;
    }
    metrics.total_activities = events.len();
    metrics.active_days = metrics.daily_activity.len();
    if metrics.active_days > 0 {
        metrics.avg_activities_per_day =
            round_to(events.len() as f64 / metrics.active_days as f64, 2);
    }
    metrics
}
