//! Topic recommendation scoring.
//!
//! Every topic the student has attempted or the prerequisite graph names is
//! scored from four signals: weakness, prerequisite readiness, staleness and
//! a flat bonus when prerequisites are met. Mastered topics are skipped.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::graph::TopicGraph;
use crate::model::{
    topic_display_name, CompetencyAnalysis, CompetencyReport, RecommendationReport,
    RecommendationStatus, TopicRecommendation, TopicStanding,
};
use crate::statistics::round_to;

const WEAKNESS_WEIGHT: f64 = 0.4;
const PREREQUISITE_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const READINESS_WEIGHT: f64 = 0.1;
const READINESS_BONUS: f64 = 10.0;
const UNMET_PREREQUISITE_FACTOR: f64 = 0.6;
const PREREQUISITE_PASS_MARK: f64 = 50.0;

/// A request for ranked study recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub student_id: String,
    #[serde(default = "default_num_recommendations")]
    pub num_recommendations: usize,
}

fn default_num_recommendations() -> usize {
    5
}

impl RecommendationRequest {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            num_recommendations: default_num_recommendations(),
        }
    }

    /// `num_recommendations` must be within 1–20.
    pub fn validate(&self) -> Result<()> {
        if !(1..=20).contains(&self.num_recommendations) {
            return Err(AnalyticsError::validation(format!(
                "numRecommendations must be between 1 and 20, got {}",
                self.num_recommendations
            )));
        }
        Ok(())
    }
}

/// Scores candidate topics against a competency report.
#[derive(Debug, Clone, Copy)]
pub struct TopicRecommender {
    /// Staleness is capped at this many days.
    pub recency_cap_days: i64,
    /// Staleness assumed for topics never attempted.
    pub never_attempted_days: i64,
    /// Topics idle longer than this get a review note.
    pub review_after_days: i64,
}

impl Default for TopicRecommender {
    fn default() -> Self {
        Self {
            recency_cap_days: 60,
            never_attempted_days: 30,
            review_after_days: 14,
        }
    }
}

impl TopicRecommender {
    /// Rank every candidate topic, best first. `now` anchors staleness.
    pub fn rank(
        &self,
        report: &CompetencyReport,
        graph: &TopicGraph,
        now: DateTime<Utc>,
    ) -> Vec<TopicRecommendation> {
        let by_topic: HashMap<&str, &CompetencyAnalysis> = report
            .analyses
            .iter()
            .map(|a| (a.topic_id.as_str(), a))
            .collect();

        let mut candidates: BTreeSet<String> = graph.all_topics();
        candidates.extend(report.analyses.iter().map(|a| a.topic_id.clone()));

        let mut scored: Vec<TopicRecommendation> = candidates
            .iter()
            .filter_map(|topic| self.score_topic(topic, &by_topic, graph, now))
            .collect();

        scored.sort_by(|a, b| b.recommendation_score.total_cmp(&a.recommendation_score));
        scored
    }

    fn score_topic(
        &self,
        topic: &str,
        by_topic: &HashMap<&str, &CompetencyAnalysis>,
        graph: &TopicGraph,
        now: DateTime<Utc>,
    ) -> Option<TopicRecommendation> {
        let analysis = by_topic.get(topic).copied();
        let standing = analysis
            .map(|a| TopicStanding::from(a.competency_level))
            .unwrap_or(TopicStanding::NotAttempted);
        if standing == TopicStanding::Advanced {
            return None;
        }
        let accuracy = analysis.map(|a| a.average_accuracy).unwrap_or(0.0);

        let weakness = weakness_score(standing, accuracy);

        let prereqs = graph.prerequisites(topic);
        let (prereq_avg, prereqs_met) = if prereqs.is_empty() {
            (100.0, true)
        } else {
            let scores: Vec<f64> = prereqs
                .iter()
                .map(|p| by_topic.get(p.as_str()).map(|a| a.average_accuracy).unwrap_or(0.0))
                .collect();
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            (avg, scores.iter().all(|s| *s >= PREREQUISITE_PASS_MARK))
        };

        let idle_days = analysis
            .and_then(|a| a.last_attempt_date)
            .map(|last| (now - last).num_seconds().div_euclid(86_400).max(0));
        let recency = idle_days
            .unwrap_or(self.never_attempted_days)
            .min(self.recency_cap_days) as f64;

        let bonus = if prereqs_met { READINESS_BONUS } else { 0.0 };
        let mut total = WEAKNESS_WEIGHT * weakness
            + PREREQUISITE_WEIGHT * prereq_avg
            + RECENCY_WEIGHT * recency
            + READINESS_WEIGHT * bonus;
        if !prereqs_met {
            total *= UNMET_PREREQUISITE_FACTOR;
        }

        Some(TopicRecommendation {
            topic_id: topic.to_string(),
            topic_name: topic_display_name(topic),
            recommendation_score: round_to(total, 2),
            reasoning: self.reasoning(standing, accuracy, prereqs, prereqs_met, analysis, idle_days),
            estimated_time_to_mastery: hours_to_mastery(standing),
            prerequisites_met: prereqs_met,
            current_competency: standing,
        })
    }

    fn reasoning(
        &self,
        standing: TopicStanding,
        accuracy: f64,
        prereqs: &[String],
        prereqs_met: bool,
        analysis: Option<&CompetencyAnalysis>,
        idle_days: Option<i64>,
    ) -> String {
        let mut reasons = Vec::new();
        match standing {
            TopicStanding::NotAttempted => reasons.push(
                "Not yet attempted; focused practice will build a foundation".to_string(),
            ),
            TopicStanding::Beginner => reasons.push(
                "Currently at beginner level; focused practice will build a foundation".to_string(),
            ),
            TopicStanding::Developing => reasons.push(format!(
                "Developing competency ({accuracy:.0}% accuracy), close to proficiency with more practice"
            )),
            _ => reasons.push(format!(
                "Proficient but not yet mastered ({accuracy:.0}% accuracy)"
            )),
        }

        if !prereqs.is_empty() {
            if prereqs_met {
                reasons.push("All prerequisites are met".to_string());
            } else {
                reasons.push(format!(
                    "Prerequisites ({}) are not fully met; complete those first",
                    prereqs.join(", ")
                ));
            }
        }

        if let Some(a) = analysis {
            if a.learning_velocity > 0.0 {
                reasons.push(format!(
                    "Positive learning trend (velocity: {:+.3})",
                    a.learning_velocity
                ));
            } else if a.learning_velocity < 0.0 {
                reasons.push("Declining performance detected; review recommended".to_string());
            }
        }

        if let Some(days) = idle_days.filter(|d| *d > self.review_after_days) {
            reasons.push(format!("Not practiced in {days} days; review to prevent forgetting"));
        }

        format!("{}.", reasons.join(". "))
    }
}

/// Higher for weaker topics.
fn weakness_score(standing: TopicStanding, accuracy: f64) -> f64 {
    match standing {
        TopicStanding::NotAttempted => 70.0,
        TopicStanding::Beginner => 100.0 - accuracy,
        TopicStanding::Developing => 80.0 - 0.5 * accuracy,
        TopicStanding::Proficient | TopicStanding::Advanced => 40.0 - 0.3 * accuracy,
    }
}

/// Estimated study hours to reach mastery from the current standing.
pub fn hours_to_mastery(standing: TopicStanding) -> u32 {
    match standing {
        TopicStanding::NotAttempted => 8,
        TopicStanding::Beginner => 6,
        TopicStanding::Developing => 4,
        TopicStanding::Proficient | TopicStanding::Advanced => 2,
    }
}

/// Foundational topics offered to a student with no history.
pub fn cold_start(student_id: &str, limit: usize) -> RecommendationReport {
    let foundational = [
        (
            "Variables & Expressions",
            95.0,
            "Foundational topic essential for all algebra. Start here to build a strong base.",
            3,
        ),
        (
            "Integers",
            90.0,
            "Core number sense topic needed for all math areas.",
            2,
        ),
        (
            "Fractions & Decimals",
            85.0,
            "Understanding fractions is critical for algebra and calculus.",
            4,
        ),
    ];

    let recommendations = foundational
        .iter()
        .take(limit)
        .map(|(topic, score, reasoning, hours)| TopicRecommendation {
            topic_id: topic.to_string(),
            topic_name: topic.to_string(),
            recommendation_score: *score,
            reasoning: reasoning.to_string(),
            estimated_time_to_mastery: *hours,
            prerequisites_met: true,
            current_competency: TopicStanding::NotAttempted,
        })
        .collect();

    RecommendationReport {
        student_id: student_id.to_string(),
        recommendations,
        status: RecommendationStatus::ColdStart,
    }
}
