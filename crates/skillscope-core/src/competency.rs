//! Per-topic competency aggregation.
//!
//! Groups a student's quiz history by topic and derives accuracy, mastery,
//! efficiency, learning velocity and a competency level for each, plus a
//! single pooled ability estimate.

use std::collections::HashMap;

use tracing::debug;

use crate::irt::{AbilityEstimator, Observation};
use crate::model::{
    topic_display_name, AnalysisStatus, CompetencyAnalysis, CompetencyLevel, CompetencyReport,
    ItemParams, QuizAttempt,
};
use crate::statistics::{decayed_slope, mean, round_to};

const SECONDS_PER_DAY: f64 = 86_400.0;
const NEUTRAL_EFFICIENCY: f64 = 50.0;
const WRONG_ANSWER_MULTIPLIER: f64 = 0.3;

/// Aggregates quiz history into per-topic competency analyses.
#[derive(Debug, Clone, Copy)]
pub struct CompetencyAggregator {
    /// Total attempts required before any analysis is produced.
    pub min_attempts: usize,
    /// Exponential recency decay per day for learning velocity.
    pub velocity_decay: f64,
    /// Per-attempt efficiency ceiling before averaging.
    pub efficiency_cap: f64,
    pub estimator: AbilityEstimator,
}

impl Default for CompetencyAggregator {
    fn default() -> Self {
        Self {
            min_attempts: 3,
            velocity_decay: 0.05,
            efficiency_cap: 150.0,
            estimator: AbilityEstimator::default(),
        }
    }
}

impl CompetencyAggregator {
    /// Analyse a student's history, optionally restricted to one topic.
    ///
    /// The attempt floor applies to the whole history; a filter that matches
    /// nothing also yields `insufficient_data`. `item_params` supplies
    /// calibrated parameters for known question ids.
    pub fn analyze(
        &self,
        student_id: &str,
        history: &[QuizAttempt],
        topic_filter: Option<&str>,
        item_params: &HashMap<String, ItemParams>,
    ) -> CompetencyReport {
        if history.len() < self.min_attempts {
            debug!(
                "student {student_id} has {} attempts, need {}",
                history.len(),
                self.min_attempts
            );
            return CompetencyReport::insufficient(student_id);
        }

        let groups = group_by_topic(history, topic_filter);
        if groups.is_empty() {
            return CompetencyReport::insufficient(student_id);
        }

        let mut observations = Vec::with_capacity(history.len());
        for (_, attempts) in &groups {
            for attempt in attempts {
                let index = observations.len();
                observations.push(Observation::new(
                    attempt.question_key(index),
                    attempt.is_correct(),
                ));
            }
        }
        let theta = self.estimator.estimate(&observations, item_params);

        let mut analyses: Vec<CompetencyAnalysis> = groups
            .iter()
            .map(|(topic, attempts)| self.analyze_topic(topic, attempts))
            .collect();
        analyses.sort_by(|a, b| a.efficiency_score.total_cmp(&b.efficiency_score));

        let efficiencies: Vec<f64> = analyses.iter().map(|a| a.efficiency_score).collect();
        let overall = mean(&efficiencies).map(CompetencyLevel::from_score);

        CompetencyReport {
            student_id: student_id.to_string(),
            status: AnalysisStatus::Success,
            analyses,
            overall_competency: overall,
            theta_estimate: Some(theta),
        }
    }

    fn analyze_topic(&self, topic: &str, attempts: &[&QuizAttempt]) -> CompetencyAnalysis {
        let total = attempts.len();
        let passed = attempts.iter().filter(|a| a.passed()).count();
        let average_accuracy = passed as f64 / total.max(1) as f64 * 100.0;

        let first_tries: Vec<&&QuizAttempt> =
            attempts.iter().filter(|a| a.attempts_count <= 1).collect();
        let mastery = if first_tries.is_empty() {
            0.0
        } else {
            first_tries.iter().filter(|a| a.passed()).count() as f64 / first_tries.len() as f64
                * 100.0
        };

        let efficiency = efficiency_score(attempts, self.efficiency_cap);

        let points: Vec<(f64, f64)> = attempts
            .iter()
            .filter_map(|a| {
                a.timestamp
                    .map(|ts| (ts.timestamp() as f64 / SECONDS_PER_DAY, a.score_percentage()))
            })
            .collect();
        let velocity = learning_velocity(&points, self.velocity_decay);

        CompetencyAnalysis {
            topic_id: topic.to_string(),
            topic_name: topic_display_name(topic),
            efficiency_score: efficiency,
            competency_level: CompetencyLevel::from_score(average_accuracy),
            mastery_percentage: round_to(mastery, 2),
            learning_velocity: velocity,
            total_attempts: total,
            average_accuracy: round_to(average_accuracy, 2),
            last_attempt_date: attempts.iter().filter_map(|a| a.timestamp).max(),
        }
    }
}

/// Group attempts by topic, keeping topics in first-seen order.
fn group_by_topic<'a>(
    history: &'a [QuizAttempt],
    topic_filter: Option<&str>,
) -> Vec<(String, Vec<&'a QuizAttempt>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&QuizAttempt>)> = Vec::new();
    for attempt in history {
        if topic_filter.is_some_and(|t| t != attempt.topic_id) {
            continue;
        }
        match index.get(attempt.topic_id.as_str()) {
            Some(&i) => groups[i].1.push(attempt),
            None => {
                index.insert(attempt.topic_id.as_str(), groups.len());
                groups.push((attempt.topic_id.clone(), vec![attempt]));
            }
        }
    }
    groups
}

/// Composite speed/accuracy/tries score in `[0, 100]`.
///
/// Each attempt scores `(avg_time / time) * accuracy * (1 / tries) * 100`,
/// capped at `cap`, where accuracy is 1.0 for a pass and 0.3 otherwise and
/// `avg_time` is the mean time across the given attempts. The mean is then
/// clamped to `[0, 100]`. Returns 50 when no usable times exist.
pub fn efficiency_score(attempts: &[&QuizAttempt], cap: f64) -> f64 {
    let times: Vec<f64> = attempts.iter().map(|a| a.time_spent()).collect();
    let Some(avg_time) = mean(&times) else {
        return NEUTRAL_EFFICIENCY;
    };
    if avg_time <= 0.0 {
        return NEUTRAL_EFFICIENCY;
    }

    let per_attempt: Vec<f64> = attempts
        .iter()
        .zip(&times)
        .map(|(attempt, &time)| {
            let time = if time <= 0.0 { 1.0 } else { time };
            let accuracy = if attempt.passed() {
                1.0
            } else {
                WRONG_ANSWER_MULTIPLIER
            };
            let tries_penalty = 1.0 / attempt.tries() as f64;
            (avg_time / time * accuracy * tries_penalty * 100.0).min(cap)
        })
        .collect();

    let raw = mean(&per_attempt).unwrap_or(NEUTRAL_EFFICIENCY);
    round_to(raw.clamp(0.0, 100.0), 2)
}

/// Recency-weighted slope of score percentage over time in days, rounded
/// to four places. Fewer than two points give 0.
pub fn learning_velocity(points: &[(f64, f64)], decay: f64) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    round_to(decayed_slope(points, decay), 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn attempt(topic: &str, score: f64, time: f64, tries: u32, day: i64) -> QuizAttempt {
        QuizAttempt {
            student_id: "s1".into(),
            topic_id: topic.into(),
            question_id: None,
            score,
            total: 10.0,
            correct: None,
            attempts_count: tries,
            time_spent_seconds: Some(time),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap() + Duration::days(day)),
        }
    }

    fn analyze(history: &[QuizAttempt], filter: Option<&str>) -> CompetencyReport {
        CompetencyAggregator::default().analyze("s1", history, filter, &HashMap::new())
    }

    #[test]
    fn two_attempts_are_insufficient() {
        let history = vec![attempt("algebra", 8.0, 60.0, 1, 0), attempt("algebra", 9.0, 60.0, 1, 1)];
        let report = analyze(&history, None);
        assert_eq!(report.status, AnalysisStatus::InsufficientData);
        assert!(report.analyses.is_empty());
        assert!(report.theta_estimate.is_none());
    }

    #[test]
    fn three_attempts_succeed() {
        let history = vec![
            attempt("algebra", 8.0, 60.0, 1, 0),
            attempt("geometry", 3.0, 60.0, 1, 1),
            attempt("algebra", 9.0, 60.0, 1, 2),
        ];
        let report = analyze(&history, None);
        assert_eq!(report.status, AnalysisStatus::Success);
        assert_eq!(report.analyses.len(), 2);
        assert!(report.theta_estimate.is_some());
        assert!(report.overall_competency.is_some());
    }

    #[test]
    fn analyses_sorted_weakest_first() {
        let history = vec![
            attempt("strong", 10.0, 30.0, 1, 0),
            attempt("strong", 10.0, 30.0, 1, 1),
            attempt("weak", 2.0, 90.0, 3, 0),
            attempt("weak", 1.0, 120.0, 2, 1),
        ];
        let report = analyze(&history, None);
        assert_eq!(report.analyses[0].topic_id, "weak");
        assert!(report.analyses[0].efficiency_score <= report.analyses[1].efficiency_score);
    }

    #[test]
    fn topic_filter_restricts_analysis() {
        let history = vec![
            attempt("algebra", 8.0, 60.0, 1, 0),
            attempt("geometry", 3.0, 60.0, 1, 1),
            attempt("algebra", 9.0, 60.0, 1, 2),
        ];
        let report = analyze(&history, Some("geometry"));
        assert_eq!(report.status, AnalysisStatus::Success);
        assert_eq!(report.analyses.len(), 1);
        assert_eq!(report.analyses[0].topic_id, "geometry");

        let none = analyze(&history, Some("calculus"));
        assert_eq!(none.status, AnalysisStatus::InsufficientData);
    }

    #[test]
    fn accuracy_mastery_and_level() {
        let history = vec![
            attempt("algebra", 8.0, 60.0, 1, 0),
            attempt("algebra", 4.0, 60.0, 1, 1),
            attempt("algebra", 6.0, 60.0, 2, 2),
            attempt("algebra", 5.0, 60.0, 1, 3),
        ];
        let report = analyze(&history, None);
        let a = report.topic("algebra").unwrap();
        assert_eq!(a.total_attempts, 4);
        assert_eq!(a.average_accuracy, 75.0);
        assert_eq!(a.competency_level, CompetencyLevel::Proficient);
        // Three first tries, two of which passed.
        assert_eq!(a.mastery_percentage, 66.67);
        assert_eq!(a.topic_name, "Algebra");
        assert_eq!(
            a.last_attempt_date,
            Some(Utc.with_ymd_and_hms(2025, 9, 4, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn efficiency_is_clamped_for_pathologically_fast_attempt() {
        // The fast attempt alone would score millions; it is capped at 150.
        let fast = attempt("algebra", 10.0, 0.001, 1, 0);
        let slow = attempt("algebra", 2.0, 10_000.0, 1, 1);
        let score = efficiency_score(&[&fast, &slow], 150.0);
        assert_eq!(score, 82.5);

        let both_fast = attempt("algebra", 10.0, 0.001, 1, 1);
        assert_eq!(efficiency_score(&[&fast, &both_fast], 150.0), 100.0);

        let lone = attempt("algebra", 10.0, 1.0, 1, 0);
        assert_eq!(efficiency_score(&[&lone], 150.0), 100.0);
    }

    #[test]
    fn efficiency_penalises_wrong_answers_and_retries() {
        let wrong = attempt("algebra", 2.0, 60.0, 1, 0);
        assert_eq!(efficiency_score(&[&wrong], 150.0), 30.0);
        let retried = attempt("algebra", 10.0, 60.0, 4, 0);
        assert_eq!(efficiency_score(&[&retried], 150.0), 25.0);
    }

    #[test]
    fn efficiency_defaults_missing_time() {
        let mut a = attempt("algebra", 10.0, 0.0, 1, 0);
        a.time_spent_seconds = None;
        assert_eq!(efficiency_score(&[&a], 150.0), 100.0);
        assert_eq!(efficiency_score(&[], 150.0), 50.0);
    }

    #[test]
    fn velocity_tracks_trend_direction() {
        let improving = vec![
            attempt("algebra", 3.0, 60.0, 1, 0),
            attempt("algebra", 5.0, 60.0, 1, 5),
            attempt("algebra", 8.0, 60.0, 1, 10),
        ];
        let report = analyze(&improving, None);
        assert!(report.analyses[0].learning_velocity > 0.0);

        let declining = vec![
            attempt("algebra", 9.0, 60.0, 1, 0),
            attempt("algebra", 6.0, 60.0, 1, 5),
            attempt("algebra", 2.0, 60.0, 1, 10),
        ];
        let report = analyze(&declining, None);
        assert!(report.analyses[0].learning_velocity < 0.0);
    }

    #[test]
    fn velocity_needs_two_points() {
        assert_eq!(learning_velocity(&[(1.0, 50.0)], 0.05), 0.0);
    }

    #[test]
    fn theta_reflects_pooled_performance() {
        let strong: Vec<QuizAttempt> = (0..6).map(|d| attempt("algebra", 10.0, 60.0, 1, d)).collect();
        let weak: Vec<QuizAttempt> = (0..6).map(|d| attempt("algebra", 1.0, 60.0, 1, d)).collect();
        let high = analyze(&strong, None).theta_estimate.unwrap();
        let low = analyze(&weak, None).theta_estimate.unwrap();
        assert!(high > low);
    }
}
