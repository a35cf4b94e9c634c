//! Trained multinomial logistic risk classifier.
//!
//! Features are standardised with the training mean and standard deviation,
//! then scored by one linear logit per class and a softmax. The artifact is
//! a plain JSON file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{
    ContributingFactor, ModelUsed, RiskFeatures, RiskLevel, RiskPrediction, RiskProbabilities,
    FEATURE_COUNT, FEATURE_NAMES,
};
use crate::error::{AnalyticsError, Result};
use crate::statistics::round_to;

const CLASS_COUNT: usize = 3;
const TOP_FACTORS: usize = 3;

/// A serialisable softmax regression model over the risk features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskModel {
    pub id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    /// Per-feature training mean.
    pub means: Vec<f64>,
    /// Per-feature training standard deviation.
    pub stds: Vec<f64>,
    /// `weights[class][feature]`, classes in [`RiskLevel::ALL`] order.
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    /// Mean absolute standardised weight per feature, summing to 1.
    pub importances: Vec<f64>,
}

impl RiskModel {
    /// A zero-weight model predicting uniform probabilities.
    pub fn untrained() -> Self {
        Self {
            id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            means: vec![0.0; FEATURE_COUNT],
            stds: vec![1.0; FEATURE_COUNT],
            weights: vec![vec![0.0; FEATURE_COUNT]; CLASS_COUNT],
            biases: vec![0.0; CLASS_COUNT],
            importances: vec![1.0 / FEATURE_COUNT as f64; FEATURE_COUNT],
        }
    }

    /// Read an artifact and check its dimensions.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        model.check_shape()?;
        Ok(model)
    }

    /// Write the artifact, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn check_shape(&self) -> Result<()> {
        let ok = self.means.len() == FEATURE_COUNT
            && self.stds.len() == FEATURE_COUNT
            && self.biases.len() == CLASS_COUNT
            && self.weights.len() == CLASS_COUNT
            && self.weights.iter().all(|w| w.len() == FEATURE_COUNT);
        if ok {
            Ok(())
        } else {
            Err(AnalyticsError::ModelUnavailable(format!(
                "artifact {} does not match {CLASS_COUNT} classes x {FEATURE_COUNT} features",
                self.id
            )))
        }
    }

    pub fn standardize(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut z = [0.0; FEATURE_COUNT];
        for (j, value) in raw.iter().enumerate() {
            let std = if self.stds[j] > f64::EPSILON { self.stds[j] } else { 1.0 };
            z[j] = (value - self.means[j]) / std;
        }
        z
    }

    /// Class probabilities for standardised features.
    pub fn probabilities(&self, z: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let mut logits = [0.0; CLASS_COUNT];
        for (c, logit) in logits.iter_mut().enumerate() {
            *logit = self.biases[c]
                + self.weights[c]
                    .iter()
                    .zip(z.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
        }
        softmax(logits)
    }

    /// Classify one student with the trained weights.
    pub fn predict(&self, features: &RiskFeatures) -> Result<RiskPrediction> {
        self.check_shape()?;
        let raw = features.to_vector();
        let z = self.standardize(&raw);
        let probs = self.probabilities(&z);
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(AnalyticsError::ModelUnavailable(
                "non-finite class probability".into(),
            ));
        }

        let class = argmax(&probs);
        let risk_level = RiskLevel::from_index(class).ok_or_else(|| {
            AnalyticsError::ModelUnavailable(format!("class index {class} out of range"))
        })?;

        let contributing_factors = match self.attribution(&z, &raw, class) {
            Ok(factors) => factors,
            Err(e) => {
                warn!("feature attribution failed: {e}");
                self.importance_factors(&raw).unwrap_or_else(|e| {
                    warn!("feature importances unavailable: {e}");
                    Vec::new()
                })
            }
        };

        Ok(RiskPrediction {
            risk_level,
            confidence: round_to(probs[class], 4),
            probabilities: RiskProbabilities {
                high: round_to(probs[0], 4),
                medium: round_to(probs[1], 4),
                low: round_to(probs[2], 4),
            },
            contributing_factors,
            recommendations: recommendations(risk_level),
            model_used: ModelUsed::MlModel,
        })
    }

    /// Top features by contribution `w[class][j] * z[j]` to the predicted
    /// class logit, relative to the training mean.
    pub fn attribution(
        &self,
        z: &[f64; FEATURE_COUNT],
        raw: &[f64; FEATURE_COUNT],
        class: usize,
    ) -> Result<Vec<ContributingFactor>> {
        let weights = self.weights.get(class).ok_or_else(|| {
            AnalyticsError::ExplainabilityUnavailable(format!("no weights for class {class}"))
        })?;
        let mut impacts: Vec<(usize, f64)> = weights
            .iter()
            .zip(z.iter())
            .map(|(w, x)| w * x)
            .enumerate()
            .collect();
        if impacts.iter().any(|(_, v)| !v.is_finite()) {
            return Err(AnalyticsError::ExplainabilityUnavailable(
                "non-finite attribution".into(),
            ));
        }
        impacts.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

        Ok(impacts
            .into_iter()
            .take(TOP_FACTORS)
            .map(|(j, impact)| ContributingFactor {
                feature: FEATURE_NAMES[j].to_string(),
                impact: round_to(impact, 4),
                value: Some(round_to(raw[j], 2)),
                detail: format!(
                    "{} = {:.1} (attribution: {impact:.3})",
                    FEATURE_NAMES[j], raw[j]
                ),
            })
            .collect())
    }

    /// Top features by the model's intrinsic importance ranking.
    pub fn importance_factors(&self, raw: &[f64; FEATURE_COUNT]) -> Result<Vec<ContributingFactor>> {
        if self.importances.len() != FEATURE_COUNT
            || self.importances.iter().any(|v| !v.is_finite())
        {
            return Err(AnalyticsError::ExplainabilityUnavailable(
                "feature importances missing".into(),
            ));
        }
        let mut ranked: Vec<(usize, f64)> = self.importances.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(TOP_FACTORS)
            .map(|(j, importance)| ContributingFactor {
                feature: FEATURE_NAMES[j].to_string(),
                impact: round_to(importance, 4),
                value: Some(round_to(raw[j], 2)),
                detail: format!(
                    "{} = {:.1} (importance: {importance:.3})",
                    FEATURE_NAMES[j], raw[j]
                ),
            })
            .collect())
    }
}

/// Mean absolute weight per feature across classes, normalised to sum 1.
pub fn importances_from_weights(weights: &[Vec<f64>]) -> Vec<f64> {
    let mut importance = vec![0.0; FEATURE_COUNT];
    for class in weights {
        for (j, w) in class.iter().enumerate().take(FEATURE_COUNT) {
            importance[j] += w.abs();
        }
    }
    let total: f64 = importance.iter().sum();
    if total > 0.0 {
        importance.iter_mut().for_each(|v| *v /= total);
    } else {
        importance.fill(1.0 / FEATURE_COUNT as f64);
    }
    importance
}

pub(crate) fn softmax<const N: usize>(logits: [f64; N]) -> [f64; N] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; N];
    let mut sum = 0.0;
    for (o, l) in out.iter_mut().zip(logits.iter()) {
        *o = (l - max).exp();
        sum += *o;
    }
    out.iter_mut().for_each(|o| *o /= sum);
    out
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn recommendations(level: RiskLevel) -> Vec<String> {
    let lines: &[&str] = match level {
        RiskLevel::High => &[
            "Immediate intervention recommended: schedule a one-on-one session",
            "Review recent quiz performance for specific skill gaps",
            "Contact parent/guardian about academic concerns",
            "Create personalised remediation plan",
        ],
        RiskLevel::Medium => &[
            "Monitor student progress more frequently",
            "Assign targeted practice for weak areas",
            "Encourage peer study groups",
        ],
        RiskLevel::Low => &[
            "Student is performing well; maintain current pace",
            "Consider enrichment activities for advanced topics",
        ],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::tests::features;

    /// Weights favouring Low risk as quiz scores rise.
    fn quiz_driven_model() -> RiskModel {
        let mut model = RiskModel::untrained();
        model.means = vec![50.0; FEATURE_COUNT];
        model.stds = vec![10.0; FEATURE_COUNT];
        model.weights[0][1] = -2.0;
        model.weights[2][1] = 2.0;
        model.importances = importances_from_weights(&model.weights);
        model
    }

    #[test]
    fn untrained_model_is_uniform() {
        let prediction = RiskModel::untrained()
            .predict(&features(50.0, 50.0, 50.0, 50.0))
            .unwrap();
        assert_eq!(prediction.probabilities.high, 0.3333);
        assert_eq!(prediction.model_used, ModelUsed::MlModel);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let model = quiz_driven_model();
        let z = model.standardize(&features(70.0, 90.0, 80.0, 60.0).to_vector());
        let p = model.probabilities(&z);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn predicts_by_weights() {
        let model = quiz_driven_model();
        let high = model.predict(&features(50.0, 20.0, 50.0, 50.0)).unwrap();
        assert_eq!(high.risk_level, RiskLevel::High);
        let low = model.predict(&features(50.0, 90.0, 50.0, 50.0)).unwrap();
        assert_eq!(low.risk_level, RiskLevel::Low);
        assert_eq!(low.contributing_factors[0].feature, "avgQuizScore");
        assert_eq!(low.contributing_factors[0].value, Some(90.0));
        assert_eq!(low.contributing_factors.len(), 3);
        assert_eq!(low.confidence, low.probabilities.low);
    }

    #[test]
    fn non_finite_weights_are_unavailable() {
        let mut model = quiz_driven_model();
        model.weights[1][0] = f64::NAN;
        let err = model.predict(&features(50.0, 90.0, 50.0, 50.0)).unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelUnavailable(_)));
    }

    #[test]
    fn importance_factors_rank_by_importance() {
        let model = quiz_driven_model();
        let raw = features(50.0, 90.0, 50.0, 50.0).to_vector();
        let factors = model.importance_factors(&raw).unwrap();
        assert_eq!(factors[0].feature, "avgQuizScore");
        assert!(factors[0].detail.contains("importance"));
    }

    #[test]
    fn missing_importances_omit_explanations() {
        let mut model = quiz_driven_model();
        model.importances.clear();
        let raw = features(50.0, 90.0, 50.0, 50.0).to_vector();
        assert!(matches!(
            model.importance_factors(&raw),
            Err(AnalyticsError::ExplainabilityUnavailable(_))
        ));
    }

    #[test]
    fn wrong_shape_is_unavailable() {
        let model = RiskModel {
            biases: vec![0.0; 2],
            ..RiskModel::untrained()
        };
        let err = model.predict(&features(50.0, 50.0, 50.0, 50.0)).unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("risk.json");
        let model = quiz_driven_model();
        model.save(&path).unwrap();
        let loaded = RiskModel::load(&path).unwrap();
        assert_eq!(loaded.id, model.id);
        assert_eq!(loaded.weights, model.weights);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let p = softmax([1000.0, 0.0, -1000.0]);
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!(p.iter().all(|v| v.is_finite()));
    }
}
