//! Training pipeline for the risk model.
//!
//! Real labelled samples are optionally topped up with synthetic students
//! drawn from three archetypes, split 80/20 per class, fitted by full-batch
//! gradient descent and written out as a JSON artifact.

use std::path::PathBuf;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{argmax, importances_from_weights, RiskModel};
use super::{RiskFeatures, RiskLevel, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{AnalyticsError, Result};
use crate::statistics::round_to;

/// A student's features with a known outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledSample {
    pub features: RiskFeatures,
    #[serde(alias = "riskLevel")]
    pub label: RiskLevel,
}

/// Knobs for [`train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingOptions {
    pub model_path: PathBuf,
    pub force_retrain: bool,
    pub allow_synthetic_data: bool,
    /// Real samples required before training without synthetic data.
    pub min_real_samples: usize,
    pub synthetic_samples: usize,
    pub seed: u64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub test_fraction: f64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/risk_model.json"),
            force_retrain: false,
            allow_synthetic_data: false,
            min_real_samples: 50,
            synthetic_samples: 500,
            seed: 42,
            epochs: 500,
            learning_rate: 0.5,
            l2: 1e-3,
            test_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Trained,
    ModelExists,
}

/// Outcome of a training run. Metrics are measured on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub status: TrainingStatus,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub samples_used: usize,
    pub real_samples: usize,
    pub synthetic_samples: usize,
    pub used_synthetic_data: bool,
    pub model_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<Uuid>,
}

/// Accuracy and support-weighted precision, recall and F1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Train a model from `real` samples and write it to `options.model_path`.
pub fn train(real: Vec<LabelledSample>, options: &TrainingOptions) -> Result<TrainingReport> {
    if options.model_path.exists() && !options.force_retrain {
        info!(
            "risk model already exists at {}; skipping training",
            options.model_path.display()
        );
        return Ok(TrainingReport {
            status: TrainingStatus::ModelExists,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            samples_used: 0,
            real_samples: real.len(),
            synthetic_samples: 0,
            used_synthetic_data: false,
            model_path: options.model_path.clone(),
            model_id: None,
        });
    }

    let real_count = real.len();
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut samples = real;

    let synthetic_count = if real_count < options.min_real_samples {
        if !options.allow_synthetic_data {
            return Err(AnalyticsError::validation(format!(
                "{real_count} labelled samples available, at least {} required \
                 (enable synthetic data to augment)",
                options.min_real_samples
            )));
        }
        let synthetic = synthetic_samples(options.synthetic_samples, &mut rng);
        let n = synthetic.len();
        samples.extend(synthetic);
        n
    } else {
        0
    };

    if samples.is_empty() {
        return Err(AnalyticsError::validation("no training samples"));
    }

    let (train_set, test_set) = stratified_split(samples, options.test_fraction, &mut rng);
    debug!(
        "training risk model on {} samples, evaluating on {}",
        train_set.len(),
        test_set.len()
    );

    let model = fit(&train_set, options)?;
    let eval_set = if test_set.is_empty() { &train_set } else { &test_set };
    let metrics = evaluate(&model, eval_set);

    model.save(&options.model_path)?;
    info!(
        "trained risk model {} (accuracy {:.3}) saved to {}",
        model.id,
        metrics.accuracy,
        options.model_path.display()
    );

    Ok(TrainingReport {
        status: TrainingStatus::Trained,
        accuracy: round_to(metrics.accuracy, 4),
        precision: round_to(metrics.precision, 4),
        recall: round_to(metrics.recall, 4),
        f1_score: round_to(metrics.f1, 4),
        samples_used: train_set.len() + test_set.len(),
        real_samples: real_count,
        synthetic_samples: synthetic_count,
        used_synthetic_data: synthetic_count > 0,
        model_path: options.model_path.clone(),
        model_id: Some(model.id),
    })
}

/// Fit softmax regression weights by full-batch gradient descent.
pub fn fit(samples: &[LabelledSample], options: &TrainingOptions) -> Result<RiskModel> {
    if samples.is_empty() {
        return Err(AnalyticsError::validation("no training samples"));
    }
    let vectors: Vec<[f64; FEATURE_COUNT]> =
        samples.iter().map(|s| s.features.to_vector()).collect();
    let n = vectors.len() as f64;

    let mut means = vec![0.0; FEATURE_COUNT];
    for v in &vectors {
        for (m, x) in means.iter_mut().zip(v.iter()) {
            *m += x / n;
        }
    }
    let mut stds = vec![0.0; FEATURE_COUNT];
    for v in &vectors {
        for j in 0..FEATURE_COUNT {
            stds[j] += (v[j] - means[j]).powi(2) / n;
        }
    }
    for s in stds.iter_mut() {
        *s = s.sqrt();
        if *s <= f64::EPSILON {
            *s = 1.0;
        }
    }

    let mut model = RiskModel {
        id: Uuid::new_v4(),
        trained_at: Utc::now(),
        feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        means,
        stds,
        ..RiskModel::untrained()
    };

    let standardized: Vec<[f64; FEATURE_COUNT]> =
        vectors.iter().map(|v| model.standardize(v)).collect();
    let classes = RiskLevel::ALL.len();

    for _ in 0..options.epochs {
        let mut grad_w = vec![vec![0.0; FEATURE_COUNT]; classes];
        let mut grad_b = vec![0.0; classes];
        for (z, sample) in standardized.iter().zip(samples) {
            let p = model.probabilities(z);
            for c in 0..classes {
                let target = if sample.label.index() == c { 1.0 } else { 0.0 };
                let err = p[c] - target;
                grad_b[c] += err;
                for j in 0..FEATURE_COUNT {
                    grad_w[c][j] += err * z[j];
                }
            }
        }
        for c in 0..classes {
            model.biases[c] -= options.learning_rate * grad_b[c] / n;
            for j in 0..FEATURE_COUNT {
                let w = model.weights[c][j];
                model.weights[c][j] -=
                    options.learning_rate * (grad_w[c][j] / n + options.l2 * w);
            }
        }
    }

    if model.weights.iter().flatten().any(|w| !w.is_finite()) {
        return Err(AnalyticsError::ModelUnavailable(
            "training diverged".to_string(),
        ));
    }
    model.importances = importances_from_weights(&model.weights);
    Ok(model)
}

/// Score a model against labelled samples.
pub fn evaluate(model: &RiskModel, samples: &[LabelledSample]) -> ClassificationMetrics {
    let pairs: Vec<(usize, usize)> = samples
        .iter()
        .map(|s| {
            let z = model.standardize(&s.features.to_vector());
            (s.label.index(), argmax(&model.probabilities(&z)))
        })
        .collect();
    classification_metrics(&pairs)
}

/// Metrics over `(actual, predicted)` class indices. Undefined ratios count
/// as zero.
pub fn classification_metrics(pairs: &[(usize, usize)]) -> ClassificationMetrics {
    if pairs.is_empty() {
        return ClassificationMetrics::default();
    }
    let total = pairs.len() as f64;
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    let mut metrics = ClassificationMetrics {
        accuracy: ratio(pairs.iter().filter(|(a, p)| a == p).count(), pairs.len()),
        ..Default::default()
    };

    for class in 0..RiskLevel::ALL.len() {
        let tp = pairs.iter().filter(|(a, p)| *a == class && *p == class).count();
        let predicted = pairs.iter().filter(|(_, p)| *p == class).count();
        let support = pairs.iter().filter(|(a, _)| *a == class).count();

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let weight = support as f64 / total;
        metrics.precision += weight * precision;
        metrics.recall += weight * recall;
        metrics.f1 += weight * f1;
    }
    metrics
}

/// Split each class separately so both halves keep the class balance.
pub fn stratified_split(
    samples: Vec<LabelledSample>,
    test_fraction: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<LabelledSample>, Vec<LabelledSample>) {
    let mut by_class: Vec<Vec<LabelledSample>> = vec![Vec::new(); RiskLevel::ALL.len()];
    for sample in samples {
        by_class[sample.label.index()].push(sample);
    }

    let mut train_set = Vec::new();
    let mut test_set = Vec::new();
    for mut group in by_class {
        group.shuffle(rng);
        let test_count = ((group.len() as f64 * test_fraction).round() as usize).min(group.len());
        let rest = group.split_off(test_count);
        test_set.extend(group);
        train_set.extend(rest);
    }
    (train_set, test_set)
}

/// Gaussian profile per feature for one risk tier.
struct Archetype {
    /// `(mean, std)` per feature in vector order.
    profile: [(f64, f64); FEATURE_COUNT],
}

const HIGH_RISK: Archetype = Archetype {
    profile: [
        (30.0, 15.0),
        (35.0, 12.0),
        (50.0, 15.0),
        (35.0, 15.0),
        (1.0, 2.0),
        (-0.5, 0.3),
        (2.0, 1.0),
        (-10.0, 5.0),
        (25.0, 8.0),
        (4.0, 2.0),
        (10.0, 5.0),
    ],
};

const MEDIUM_RISK: Archetype = Archetype {
    profile: [
        (55.0, 12.0),
        (60.0, 10.0),
        (72.0, 10.0),
        (60.0, 12.0),
        (3.0, 3.0),
        (0.2, 0.3),
        (5.0, 2.0),
        (0.0, 8.0),
        (15.0, 5.0),
        (2.0, 1.0),
        (3.0, 3.0),
    ],
};

const LOW_RISK: Archetype = Archetype {
    profile: [
        (82.0, 10.0),
        (85.0, 8.0),
        (93.0, 5.0),
        (88.0, 8.0),
        (10.0, 5.0),
        (1.0, 0.4),
        (10.0, 3.0),
        (5.0, 5.0),
        (8.0, 3.0),
        (0.0, 0.0),
        (1.0, 1.0),
    ],
};

fn gaussian(rng: &mut ChaCha8Rng, mean: f64, std: f64) -> f64 {
    Normal::new(mean, std)
        .map(|d| d.sample(rng))
        .unwrap_or(mean)
}

/// Draw `n` synthetic students: 20% high, 30% medium and 50% low risk.
pub fn synthetic_samples(n: usize, rng: &mut ChaCha8Rng) -> Vec<LabelledSample> {
    (0..n)
        .map(|_| {
            let u: f64 = rng.gen();
            let (label, archetype) = if u < 0.2 {
                (RiskLevel::High, &HIGH_RISK)
            } else if u < 0.5 {
                (RiskLevel::Medium, &MEDIUM_RISK)
            } else {
                (RiskLevel::Low, &LOW_RISK)
            };

            let mut v = [0.0; FEATURE_COUNT];
            for (slot, (mean, std)) in v.iter_mut().zip(archetype.profile.iter()) {
                *slot = gaussian(rng, *mean, *std);
            }
            for pct in v.iter_mut().take(4) {
                *pct = pct.clamp(0.0, 100.0);
            }
            v[6] = v[6].max(0.0);
            v[8] = v[8].max(0.0);

            LabelledSample {
                features: RiskFeatures::from_vector(&v),
                label,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &tempfile::TempDir) -> TrainingOptions {
        TrainingOptions {
            model_path: dir.path().join("risk_model.json"),
            allow_synthetic_data: true,
            epochs: 200,
            ..TrainingOptions::default()
        }
    }

    #[test]
    fn synthetic_data_is_seeded() {
        let a = synthetic_samples(50, &mut ChaCha8Rng::seed_from_u64(42));
        let b = synthetic_samples(50, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
        for s in &a {
            assert!(s.features.validate().is_ok());
            assert!(s.features.time_on_platform >= 0.0);
        }
        let low = synthetic_samples(200, &mut ChaCha8Rng::seed_from_u64(7))
            .into_iter()
            .filter(|s| s.label == RiskLevel::Low)
            .collect::<Vec<_>>();
        assert!(low.iter().all(|s| s.features.consecutive_absences == 0));
    }

    #[test]
    fn split_keeps_class_balance() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let samples = synthetic_samples(300, &mut rng);
        let count = |set: &[LabelledSample], level| set.iter().filter(|s| s.label == level).count();
        let totals: Vec<usize> = RiskLevel::ALL.iter().map(|l| count(&samples, *l)).collect();

        let (train_set, test_set) = stratified_split(samples, 0.2, &mut rng);
        for (level, total) in RiskLevel::ALL.iter().zip(totals) {
            let expected = (total as f64 * 0.2).round() as usize;
            assert_eq!(count(&test_set, *level), expected);
            assert_eq!(count(&train_set, *level), total - expected);
        }
    }

    #[test]
    fn weighted_metrics() {
        // Two High predicted correctly, one Low predicted as High.
        let m = classification_metrics(&[(0, 0), (0, 0), (2, 0)]);
        assert!((m.accuracy - 2.0 / 3.0).abs() < 1e-12);
        // High: precision 2/3 recall 1 (weight 2/3); Low: both 0.
        assert!((m.precision - 4.0 / 9.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(classification_metrics(&[]), ClassificationMetrics::default());
    }

    #[test]
    fn trains_on_synthetic_archetypes() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);
        let report = train(Vec::new(), &opts).unwrap();

        assert_eq!(report.status, TrainingStatus::Trained);
        assert!(report.used_synthetic_data);
        assert_eq!(report.synthetic_samples, 500);
        assert_eq!(report.samples_used, 500);
        assert!(report.accuracy > 0.8, "accuracy {}", report.accuracy);
        assert!(report.f1_score > 0.0);

        let model = RiskModel::load(&opts.model_path).unwrap();
        assert_eq!(Some(model.id), report.model_id);
        assert!((model.importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn existing_artifact_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);
        RiskModel::untrained().save(&opts.model_path).unwrap();

        let report = train(Vec::new(), &opts).unwrap();
        assert_eq!(report.status, TrainingStatus::ModelExists);
        assert_eq!(report.accuracy, 0.0);

        let forced = TrainingOptions {
            force_retrain: true,
            ..opts
        };
        assert_eq!(train(Vec::new(), &forced).unwrap().status, TrainingStatus::Trained);
    }

    #[test]
    fn too_few_real_samples_without_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let opts = TrainingOptions {
            allow_synthetic_data: false,
            ..options(&dir)
        };
        let few = synthetic_samples(10, &mut ChaCha8Rng::seed_from_u64(3));
        let err = train(few, &opts).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));
        assert!(!opts.model_path.exists());
    }

    #[test]
    fn enough_real_samples_skip_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let opts = TrainingOptions {
            allow_synthetic_data: false,
            ..options(&dir)
        };
        let real = synthetic_samples(60, &mut ChaCha8Rng::seed_from_u64(9));
        let report = train(real, &opts).unwrap();
        assert!(!report.used_synthetic_data);
        assert_eq!(report.real_samples, 60);
        assert_eq!(report.synthetic_samples, 0);
    }
}
