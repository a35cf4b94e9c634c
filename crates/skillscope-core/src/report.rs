//! Student summaries and class insights, with JSON persistence.
//!
//! Both report types are assembled from already computed analytics; nothing
//! here touches collaborators.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engagement::EngagementMetrics;
use crate::model::{
    AnalysisStatus, CompetencyLevel, CompetencyReport, QuizAttempt, TopicRecommendation,
};
use crate::risk::{RiskLevel, RiskPrediction};
use crate::statistics::{extrapolate_next, mean, median, round_to};

/// Velocity above which a topic counts as improving, and below whose
/// negation it counts as declining.
pub const VELOCITY_THRESHOLD: f64 = 0.01;

const MAX_WEAK_TOPICS: usize = 10;
const MAX_INTERVENTIONS: usize = 10;
const PREDICTION_WINDOW: usize = 10;
const MIN_ATTEMPTS_FOR_PREDICTION: usize = 3;

// ---------------------------------------------------------------------------
// Student summary
// ---------------------------------------------------------------------------

/// Number of topics at each competency level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyDistribution {
    pub beginner: usize,
    pub developing: usize,
    pub proficient: usize,
    pub advanced: usize,
}

impl CompetencyDistribution {
    pub fn get(&self, level: CompetencyLevel) -> usize {
        match level {
            CompetencyLevel::Beginner => self.beginner,
            CompetencyLevel::Developing => self.developing,
            CompetencyLevel::Proficient => self.proficient,
            CompetencyLevel::Advanced => self.advanced,
        }
    }

    fn increment(&mut self, level: CompetencyLevel) {
        match level {
            CompetencyLevel::Beginner => self.beginner += 1,
            CompetencyLevel::Developing => self.developing += 1,
            CompetencyLevel::Proficient => self.proficient += 1,
            CompetencyLevel::Advanced => self.advanced += 1,
        }
    }
}

/// Per-topic learning trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityTrend {
    pub topic: String,
    pub velocity: f64,
    pub accuracy: f64,
    pub attempts: usize,
}

/// Compact recommendation row shown in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedTopic {
    pub topic_id: String,
    pub topic_name: String,
    pub score: f64,
    pub reasoning: String,
    pub prerequisites_met: bool,
}

impl From<&TopicRecommendation> for RecommendedTopic {
    fn from(r: &TopicRecommendation) -> Self {
        Self {
            topic_id: r.topic_id.clone(),
            topic_name: r.topic_name.clone(),
            score: r.recommendation_score,
            reasoning: r.reasoning.clone(),
            prerequisites_met: r.prerequisites_met,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Success,
    LimitedData,
}

/// Everything a dashboard shows for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub generated_at: DateTime<Utc>,
    pub status: SummaryStatus,
    #[serde(default)]
    pub overall_competency: Option<CompetencyLevel>,
    #[serde(default)]
    pub theta_estimate: Option<f64>,
    pub competency_distribution: CompetencyDistribution,
    /// Topic name to efficiency score.
    pub efficiency_scores: BTreeMap<String, f64>,
    pub learning_velocity_trend: Vec<VelocityTrend>,
    pub recommended_topics: Vec<RecommendedTopic>,
    #[serde(default)]
    pub predicted_next_score: Option<f64>,
    pub engagement_patterns: EngagementMetrics,
    #[serde(default)]
    pub risk_assessment: Option<RiskPrediction>,
}

impl StudentSummary {
    /// Assemble a summary from the individual analyses.
    pub fn from_parts(
        competency: &CompetencyReport,
        recommendations: &[TopicRecommendation],
        predicted_next_score: Option<f64>,
        engagement_patterns: EngagementMetrics,
        risk_assessment: Option<RiskPrediction>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut distribution = CompetencyDistribution::default();
        let mut efficiency_scores = BTreeMap::new();
        let mut trend = Vec::with_capacity(competency.analyses.len());

        for analysis in &competency.analyses {
            distribution.increment(analysis.competency_level);
            efficiency_scores.insert(analysis.topic_name.clone(), analysis.efficiency_score);
            trend.push(VelocityTrend {
                topic: analysis.topic_name.clone(),
                velocity: analysis.learning_velocity,
                accuracy: analysis.average_accuracy,
                attempts: analysis.total_attempts,
            });
        }

        let status = match competency.status {
            AnalysisStatus::Success => SummaryStatus::Success,
            AnalysisStatus::InsufficientData => SummaryStatus::LimitedData,
        };

        Self {
            student_id: competency.student_id.clone(),
            generated_at: now,
            status,
            overall_competency: competency.overall_competency,
            theta_estimate: competency.theta_estimate,
            competency_distribution: distribution,
            efficiency_scores,
            learning_velocity_trend: trend,
            recommended_topics: recommendations.iter().map(RecommendedTopic::from).collect(),
            predicted_next_score,
            engagement_patterns,
            risk_assessment,
        }
    }

    /// Why this student needs attention, if at all.
    pub fn intervention_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.competency_distribution.beginner >= 2 {
            reasons.push("Multiple topics at beginner level".to_string());
        }
        if self.predicted_next_score.is_some_and(|p| p < 50.0) {
            reasons.push("Predicted score below 50%".to_string());
        }
        reasons
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "student summary")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "student summary")
    }
}

/// Least-squares extrapolation of the score percentage over the most recent
/// attempts. `None` below three attempts.
pub fn predict_next_score(history: &[QuizAttempt]) -> Option<f64> {
    if history.len() < MIN_ATTEMPTS_FOR_PREDICTION {
        return None;
    }
    let mut ordered: Vec<&QuizAttempt> = history.iter().collect();
    ordered.sort_by_key(|a| a.timestamp);
    let recent: Vec<f64> = ordered
        .iter()
        .rev()
        .take(PREDICTION_WINDOW)
        .rev()
        .map(|a| a.score_percentage())
        .collect();
    extrapolate_next(&recent).map(|p| round_to(p.clamp(0.0, 100.0), 1))
}

// ---------------------------------------------------------------------------
// Class insights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    Success,
    NoStudents,
}

/// Students per risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    #[serde(rename = "High")]
    pub high: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "Low")]
    pub low: usize,
}

impl RiskDistribution {
    pub fn get(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }

    fn increment(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
        }
    }
}

/// A topic many students are declining on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakTopic {
    pub topic: String,
    pub student_count: usize,
    pub percentage_of_class: f64,
}

/// Spread of per-topic learning velocities across the class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityDistribution {
    pub mean: f64,
    pub median: f64,
    pub improving: usize,
    pub declining: usize,
    pub plateaued: usize,
}

impl VelocityDistribution {
    pub fn from_velocities(velocities: &[f64]) -> Self {
        Self {
            mean: mean(velocities).map(|m| round_to(m, 4)).unwrap_or(0.0),
            median: median(velocities).map(|m| round_to(m, 4)).unwrap_or(0.0),
            improving: velocities.iter().filter(|v| **v > VELOCITY_THRESHOLD).count(),
            declining: velocities.iter().filter(|v| **v < -VELOCITY_THRESHOLD).count(),
            plateaued: velocities
                .iter()
                .filter(|v| v.abs() <= VELOCITY_THRESHOLD)
                .count(),
        }
    }
}

/// A student flagged for teacher follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionFlag {
    pub student_id: String,
    pub reasons: Vec<String>,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPredictions {
    pub students_likely_to_struggle: usize,
    #[serde(default)]
    pub average_predicted_score: Option<f64>,
}

/// Aggregated view of one teacher's class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInsights {
    pub teacher_id: String,
    pub class_id: String,
    pub generated_at: DateTime<Utc>,
    pub status: ClassStatus,
    pub total_students: usize,
    pub risk_distribution: RiskDistribution,
    pub common_weak_topics: Vec<WeakTopic>,
    pub velocity_distribution: VelocityDistribution,
    pub hourly_engagement: BTreeMap<u32, usize>,
    pub interventions_needed: Vec<InterventionFlag>,
    pub success_predictions: SuccessPredictions,
}

impl ClassInsights {
    /// Insights for a class with nobody in it.
    pub fn empty(teacher_id: &str, class_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            teacher_id: teacher_id.to_string(),
            class_id: class_id.to_string(),
            generated_at: now,
            status: ClassStatus::NoStudents,
            total_students: 0,
            risk_distribution: RiskDistribution::default(),
            common_weak_topics: Vec::new(),
            velocity_distribution: VelocityDistribution::default(),
            hourly_engagement: BTreeMap::new(),
            interventions_needed: Vec::new(),
            success_predictions: SuccessPredictions::default(),
        }
    }

    /// Aggregate per-student summaries. `roster_size` is the full class
    /// size and is the denominator for weak-topic percentages.
    pub fn from_summaries(
        teacher_id: &str,
        class_id: &str,
        roster_size: usize,
        summaries: &[StudentSummary],
        now: DateTime<Utc>,
    ) -> Self {
        if roster_size == 0 {
            return Self::empty(teacher_id, class_id, now);
        }

        let mut risk_distribution = RiskDistribution::default();
        let mut weak_counts: HashMap<&str, usize> = HashMap::new();
        let mut velocities = Vec::new();
        let mut hourly_engagement: BTreeMap<u32, usize> = BTreeMap::new();
        let mut interventions = Vec::new();
        let mut predictions = Vec::new();

        for summary in summaries {
            if let Some(risk) = &summary.risk_assessment {
                risk_distribution.increment(risk.risk_level);
            }
            for row in &summary.learning_velocity_trend {
                velocities.push(row.velocity);
                if row.velocity < -VELOCITY_THRESHOLD {
                    *weak_counts.entry(row.topic.as_str()).or_default() += 1;
                }
            }
            for (hour, count) in &summary.engagement_patterns.hourly_activity {
                *hourly_engagement.entry(*hour).or_default() += count;
            }
            predictions.extend(summary.predicted_next_score);

            let reasons = summary.intervention_reasons();
            if !reasons.is_empty() {
                interventions.push(InterventionFlag {
                    student_id: summary.student_id.clone(),
                    reasons,
                    recommended_action: "Schedule one-on-one tutoring session".to_string(),
                });
            }
        }

        let mut weak: Vec<(&str, usize)> = weak_counts.into_iter().collect();
        weak.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let common_weak_topics = weak
            .into_iter()
            .take(MAX_WEAK_TOPICS)
            .map(|(topic, count)| WeakTopic {
                topic: topic.to_string(),
                student_count: count,
                percentage_of_class: round_to(count as f64 / roster_size as f64 * 100.0, 1),
            })
            .collect();

        let struggling = interventions.len();
        interventions.truncate(MAX_INTERVENTIONS);

        Self {
            teacher_id: teacher_id.to_string(),
            class_id: class_id.to_string(),
            generated_at: now,
            status: ClassStatus::Success,
            total_students: roster_size,
            risk_distribution,
            common_weak_topics,
            velocity_distribution: VelocityDistribution::from_velocities(&velocities),
            hourly_engagement,
            interventions_needed: interventions,
            success_predictions: SuccessPredictions {
                students_likely_to_struggle: struggling,
                average_predicted_score: mean(&predictions).map(|m| round_to(m, 1)),
            },
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "class insights")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "class insights")
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {what}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {what} to {}", path.display()))?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {what} JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CompetencyAnalysis;
    use crate::risk::{rule_based, RiskFeatures};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn analysis(topic: &str, efficiency: f64, velocity: f64) -> CompetencyAnalysis {
        CompetencyAnalysis {
            topic_id: topic.to_string(),
            topic_name: topic.to_string(),
            efficiency_score: efficiency,
            competency_level: CompetencyLevel::from_score(efficiency),
            mastery_percentage: 50.0,
            learning_velocity: velocity,
            total_attempts: 4,
            average_accuracy: 60.0,
            last_attempt_date: None,
        }
    }

    fn competency(student: &str, analyses: Vec<CompetencyAnalysis>) -> CompetencyReport {
        CompetencyReport {
            student_id: student.to_string(),
            status: AnalysisStatus::Success,
            analyses,
            overall_competency: Some(CompetencyLevel::Developing),
            theta_estimate: Some(0.0),
        }
    }

    fn summary(student: &str, analyses: Vec<CompetencyAnalysis>, predicted: Option<f64>) -> StudentSummary {
        StudentSummary::from_parts(
            &competency(student, analyses),
            &[],
            predicted,
            EngagementMetrics::default(),
            None,
            now(),
        )
    }

    fn attempt(score: f64, day: i64) -> QuizAttempt {
        QuizAttempt {
            student_id: "s1".into(),
            topic_id: "algebra".into(),
            question_id: None,
            score,
            total: 100.0,
            correct: None,
            attempts_count: 1,
            time_spent_seconds: Some(60.0),
            timestamp: Some(now() + Duration::days(day)),
        }
    }

    #[test]
    fn summary_distribution_and_rows() {
        let s = summary(
            "s1",
            vec![analysis("Algebra", 20.0, -0.2), analysis("Geometry", 90.0, 0.3)],
            Some(70.0),
        );
        assert_eq!(s.status, SummaryStatus::Success);
        assert_eq!(s.competency_distribution.get(CompetencyLevel::Beginner), 1);
        assert_eq!(s.competency_distribution.advanced, 1);
        assert_eq!(s.efficiency_scores["Geometry"], 90.0);
        assert_eq!(s.learning_velocity_trend[0].topic, "Algebra");
        assert!(s.intervention_reasons().is_empty());
    }

    #[test]
    fn insufficient_competency_is_limited_data() {
        let s = StudentSummary::from_parts(
            &CompetencyReport::insufficient("s9"),
            &[],
            None,
            EngagementMetrics::default(),
            None,
            now(),
        );
        assert_eq!(s.status, SummaryStatus::LimitedData);
        assert_eq!(s.student_id, "s9");
    }

    #[test]
    fn next_score_follows_linear_trend() {
        let history = vec![attempt(60.0, 2), attempt(40.0, 0), attempt(50.0, 1)];
        assert_eq!(predict_next_score(&history), Some(70.0));
        assert_eq!(predict_next_score(&history[..2]), None);

        let falling = vec![attempt(30.0, 0), attempt(10.0, 1), attempt(0.0, 2)];
        assert_eq!(predict_next_score(&falling), Some(0.0));
    }

    #[test]
    fn next_score_uses_last_ten_attempts() {
        let mut history: Vec<QuizAttempt> = (0..5).map(|d| attempt(0.0, d)).collect();
        history.extend((5..15).map(|d| attempt(80.0, d)));
        assert_eq!(predict_next_score(&history), Some(80.0));
    }

    #[test]
    fn class_aggregation() {
        let mut risky = summary(
            "s1",
            vec![analysis("Algebra", 10.0, -0.2), analysis("Fractions", 30.0, -0.05)],
            Some(40.0),
        );
        let features = RiskFeatures {
            engagement_score: 20.0,
            avg_quiz_score: 20.0,
            attendance: 20.0,
            assignment_completion: 20.0,
            streak: 0,
            xp_growth_rate: 0.0,
            time_on_platform: 1.0,
            engagement_trend_7d: None,
            quiz_score_variance: None,
            consecutive_absences: 0,
            days_since_last_activity: 0,
        };
        risky.risk_assessment = Some(rule_based(&features));
        risky.engagement_patterns.hourly_activity.insert(9, 3);

        let steady = summary("s2", vec![analysis("Algebra", 70.0, 0.0)], Some(75.0));
        let insights = ClassInsights::from_summaries("t1", "c1", 4, &[risky, steady], now());

        assert_eq!(insights.status, ClassStatus::Success);
        assert_eq!(insights.total_students, 4);
        assert_eq!(insights.risk_distribution.high, 1);
        assert_eq!(insights.common_weak_topics.len(), 2);
        assert_eq!(insights.common_weak_topics[0].topic, "Algebra");
        assert_eq!(insights.common_weak_topics[0].percentage_of_class, 25.0);
        assert_eq!(insights.velocity_distribution.declining, 2);
        assert_eq!(insights.velocity_distribution.plateaued, 1);
        assert_eq!(insights.velocity_distribution.median, -0.05);
        assert_eq!(insights.hourly_engagement[&9], 3);
        assert_eq!(insights.interventions_needed.len(), 1);
        assert_eq!(insights.interventions_needed[0].reasons.len(), 2);
        assert_eq!(insights.success_predictions.students_likely_to_struggle, 1);
        assert_eq!(insights.success_predictions.average_predicted_score, Some(57.5));
    }

    #[test]
    fn empty_roster() {
        let insights = ClassInsights::from_summaries("t1", "c1", 0, &[], now());
        assert_eq!(insights.status, ClassStatus::NoStudents);
        let json = serde_json::to_value(&insights).unwrap();
        assert_eq!(json["status"], "no_students");
        assert_eq!(json["riskDistribution"]["High"], 0);
    }

    #[test]
    fn json_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("summary.json");
        let s = summary("s1", vec![analysis("Algebra", 50.0, 0.1)], None);
        s.save_json(&path).unwrap();
        let loaded = StudentSummary::load_json(&path).unwrap();
        assert_eq!(loaded.student_id, "s1");
        assert_eq!(loaded.learning_velocity_trend, s.learning_velocity_trend);
    }
}
