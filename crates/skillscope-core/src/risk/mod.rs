//! Risk-of-failure classification.
//!
//! A trained softmax classifier is used when an artifact is available;
//! otherwise, and whenever the model fails, a deterministic rule-based
//! scorer answers instead. Prediction never returns an error.

pub mod model;
pub mod rules;
pub mod training;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AnalyticsError, Result};

pub use model::RiskModel;
pub use rules::rule_based;
pub use training::{LabelledSample, TrainingOptions, TrainingReport, TrainingStatus};

/// Number of features fed to the classifier.
pub const FEATURE_COUNT: usize = 11;

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "engagementScore",
    "avgQuizScore",
    "attendance",
    "assignmentCompletion",
    "streak",
    "xpGrowthRate",
    "timeOnPlatform",
    "engagementTrend7d",
    "quizScoreVariance",
    "consecutiveAbsences",
    "daysSinceLastActivity",
];

/// Engagement and performance signals for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFeatures {
    /// 0–100.
    pub engagement_score: f64,
    /// 0–100.
    pub avg_quiz_score: f64,
    /// 0–100.
    pub attendance: f64,
    /// 0–100.
    pub assignment_completion: f64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub xp_growth_rate: f64,
    /// Hours.
    #[serde(default)]
    pub time_on_platform: f64,
    #[serde(default)]
    pub engagement_trend_7d: Option<f64>,
    #[serde(default)]
    pub quiz_score_variance: Option<f64>,
    #[serde(default)]
    pub consecutive_absences: u32,
    #[serde(default)]
    pub days_since_last_activity: u32,
}

impl RiskFeatures {
    /// Features in [`FEATURE_NAMES`] order, missing trends as zero.
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.engagement_score,
            self.avg_quiz_score,
            self.attendance,
            self.assignment_completion,
            self.streak as f64,
            self.xp_growth_rate,
            self.time_on_platform,
            self.engagement_trend_7d.unwrap_or(0.0),
            self.quiz_score_variance.unwrap_or(0.0),
            self.consecutive_absences as f64,
            self.days_since_last_activity as f64,
        ]
    }

    /// Inverse of [`to_vector`](Self::to_vector); counts are truncated.
    pub fn from_vector(v: &[f64; FEATURE_COUNT]) -> Self {
        Self {
            engagement_score: v[0],
            avg_quiz_score: v[1],
            attendance: v[2],
            assignment_completion: v[3],
            streak: v[4].max(0.0) as u32,
            xp_growth_rate: v[5],
            time_on_platform: v[6],
            engagement_trend_7d: Some(v[7]),
            quiz_score_variance: Some(v[8]),
            consecutive_absences: v[9].max(0.0) as u32,
            days_since_last_activity: v[10].max(0.0) as u32,
        }
    }

    /// The four percentage features must lie within 0–100.
    pub fn validate(&self) -> Result<()> {
        let percentages = [
            ("engagementScore", self.engagement_score),
            ("avgQuizScore", self.avg_quiz_score),
            ("attendance", self.attendance),
            ("assignmentCompletion", self.assignment_completion),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnalyticsError::validation(format!(
                    "{name} must be between 0 and 100, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Discrete risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Class order used by the trained model.
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn index(self) -> usize {
        match self {
            RiskLevel::High => 0,
            RiskLevel::Medium => 1,
            RiskLevel::Low => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Probability per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskProbabilities {
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Medium")]
    pub medium: f64,
    #[serde(rename = "Low")]
    pub low: f64,
}

impl RiskProbabilities {
    pub fn get(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }

    pub fn max(&self) -> f64 {
        self.high.max(self.medium).max(self.low)
    }
}

/// A feature that pushed the prediction, with a signed impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributingFactor {
    pub feature: String,
    pub impact: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub detail: String,
}

/// Which tier of the classifier produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUsed {
    MlModel,
    RuleBased,
}

/// A risk assessment for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPrediction {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub probabilities: RiskProbabilities,
    pub contributing_factors: Vec<ContributingFactor>,
    pub recommendations: Vec<String>,
    pub model_used: ModelUsed,
}

/// The two classifier tiers behind a single `predict`.
#[derive(Debug, Clone)]
pub enum RiskClassifier {
    RuleBased,
    TrainedModel(Arc<RiskModel>),
}

impl RiskClassifier {
    /// Load the artifact at `path`, or fall back to rules when it is missing
    /// or unreadable.
    pub fn load_or_rules(path: &std::path::Path) -> Self {
        if !path.exists() {
            info!("no trained risk model at {}; using rule-based scoring", path.display());
            return RiskClassifier::RuleBased;
        }
        match RiskModel::load(path) {
            Ok(model) => {
                info!("loaded risk model {} from {}", model.id, path.display());
                RiskClassifier::TrainedModel(Arc::new(model))
            }
            Err(e) => {
                error!("failed to load risk model from {}: {e}", path.display());
                RiskClassifier::RuleBased
            }
        }
    }

    /// Classify a student. Any failure of the trained model is logged and
    /// answered by the rule-based scorer.
    pub fn predict(&self, features: &RiskFeatures) -> RiskPrediction {
        match self {
            RiskClassifier::RuleBased => rule_based(features),
            RiskClassifier::TrainedModel(model) => match model.predict(features) {
                Ok(prediction) => prediction,
                Err(e) => {
                    error!("risk model inference failed: {e}");
                    info!("falling back to rule-based risk prediction");
                    rule_based(features)
                }
            },
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, RiskClassifier::TrainedModel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn features(engagement: f64, quiz: f64, attendance: f64, completion: f64) -> RiskFeatures {
        RiskFeatures {
            engagement_score: engagement,
            avg_quiz_score: quiz,
            attendance,
            assignment_completion: completion,
            streak: 3,
            xp_growth_rate: 0.0,
            time_on_platform: 4.0,
            engagement_trend_7d: None,
            quiz_score_variance: None,
            consecutive_absences: 0,
            days_since_last_activity: 1,
        }
    }

    #[test]
    fn vector_order_matches_names() {
        let f = features(80.0, 75.0, 90.0, 85.0);
        let v = f.to_vector();
        assert_eq!(v[FEATURE_NAMES.iter().position(|n| *n == "attendance").unwrap()], 90.0);
        assert_eq!(v[7], 0.0);
        assert_eq!(v[10], 1.0);
    }

    #[test]
    fn percentage_validation() {
        assert!(features(80.0, 75.0, 90.0, 85.0).validate().is_ok());
        assert!(features(120.0, 75.0, 90.0, 85.0).validate().is_err());
        assert!(features(80.0, -1.0, 90.0, 85.0).validate().is_err());
    }

    #[test]
    fn fallback_matches_rule_based_output() {
        let broken = RiskModel {
            weights: vec![vec![0.0; 2]],
            ..RiskModel::untrained()
        };
        let classifier = RiskClassifier::TrainedModel(Arc::new(broken));
        let f = features(30.0, 40.0, 50.0, 45.0);
        assert_eq!(classifier.predict(&f), rule_based(&f));
    }

    #[test]
    fn missing_artifact_uses_rules() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = RiskClassifier::load_or_rules(&dir.path().join("missing.json"));
        assert!(!classifier.is_trained());
    }

    #[test]
    fn corrupt_artifact_uses_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        let classifier = RiskClassifier::load_or_rules(&path);
        assert!(!classifier.is_trained());
        let f = features(80.0, 75.0, 90.0, 85.0);
        assert_eq!(classifier.predict(&f).model_used, ModelUsed::RuleBased);
    }

    #[test]
    fn serde_shape() {
        let prediction = rule_based(&features(80.0, 75.0, 90.0, 85.0));
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["riskLevel"], "Low");
        assert_eq!(json["modelUsed"], "rule_based");
        assert_eq!(json["probabilities"]["Low"], 0.8);
    }
}
