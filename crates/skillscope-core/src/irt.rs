//! Three-parameter logistic item response model.
//!
//! Ability (`theta`) is estimated by maximum likelihood over a bounded
//! interval; item difficulty is calibrated from a pool of responses to a
//! single question.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::model::{DifficultyLabel, DifficultyParams, ItemParams, ItemResponse};
use crate::statistics::{minimize_bounded, round_to, upper_median};

/// Lower bound of the ability scale.
pub const THETA_MIN: f64 = -4.0;
/// Upper bound of the ability scale.
pub const THETA_MAX: f64 = 4.0;

const EXPONENT_CLAMP: f64 = 20.0;
const PROBABILITY_FLOOR: f64 = 1e-10;

/// Probability of a correct response under the 3PL model.
///
/// The logistic exponent is clamped to `[-20, 20]`, so the result always
/// lies in `[c, 1]`.
pub fn probability(theta: f64, item: ItemParams) -> f64 {
    let exponent = (-item.a * (theta - item.b)).clamp(-EXPONENT_CLAMP, EXPONENT_CLAMP);
    item.c + (1.0 - item.c) / (1.0 + exponent.exp())
}

/// A single scored response used for ability estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub question_id: String,
    pub correct: bool,
}

impl Observation {
    pub fn new(question_id: impl Into<String>, correct: bool) -> Self {
        Self {
            question_id: question_id.into(),
            correct,
        }
    }
}

/// Maximum-likelihood ability estimator.
#[derive(Debug, Clone, Copy)]
pub struct AbilityEstimator {
    /// Parameters assumed for questions with no calibration.
    pub defaults: ItemParams,
    /// Absolute tolerance on theta.
    pub xatol: f64,
    pub max_iter: usize,
}

impl Default for AbilityEstimator {
    fn default() -> Self {
        Self {
            defaults: ItemParams::default(),
            xatol: 1e-5,
            max_iter: 500,
        }
    }
}

impl AbilityEstimator {
    pub fn new(defaults: ItemParams) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Negative log-likelihood of the observations at `theta`.
    pub fn neg_log_likelihood(
        &self,
        theta: f64,
        observations: &[Observation],
        params: &HashMap<String, ItemParams>,
    ) -> f64 {
        observations
            .iter()
            .map(|obs| {
                let item = params
                    .get(&obs.question_id)
                    .copied()
                    .unwrap_or(self.defaults);
                let p = probability(theta, item).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
                if obs.correct {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum()
    }

    /// Unrounded ability estimate within `[-4, 4]`. An empty observation
    /// list yields the population mean, 0.0.
    pub fn estimate_raw(
        &self,
        observations: &[Observation],
        params: &HashMap<String, ItemParams>,
    ) -> f64 {
        if observations.is_empty() {
            return 0.0;
        }
        let minimum = minimize_bounded(
            |theta| self.neg_log_likelihood(theta, observations, params),
            THETA_MIN,
            THETA_MAX,
            self.xatol,
            self.max_iter,
        );
        if !minimum.converged {
            debug!(
                "theta search stopped after {} evaluations at {:.4}",
                minimum.evaluations, minimum.x
            );
        }
        minimum.x
    }

    /// Ability estimate rounded to three decimal places.
    pub fn estimate(
        &self,
        observations: &[Observation],
        params: &HashMap<String, ItemParams>,
    ) -> f64 {
        round_to(self.estimate_raw(observations, params), 3)
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Minimum number of responses before discrimination is estimated from
/// response times.
pub const MIN_RESPONSES_FOR_DISCRIMINATION: usize = 4;

/// Derive 3PL parameters for one question from a pool of responses.
///
/// Difficulty is the logit of the (clamped) failure rate. Discrimination
/// compares accuracy of fast and slow responders around the median time.
pub fn calibrate(question_id: &str, responses: &[ItemResponse], guessing: f64) -> Result<DifficultyParams> {
    if responses.is_empty() {
        return Err(AnalyticsError::validation(format!(
            "no student responses provided for question {question_id}"
        )));
    }

    let total = responses.len();
    let correct = responses.iter().filter(|r| r.correct).count();
    let success_rate = correct as f64 / total as f64;
    let p = success_rate.clamp(0.01, 0.99);
    let difficulty = ((1.0 - p) / p).ln();

    let discrimination = if total >= MIN_RESPONSES_FOR_DISCRIMINATION {
        discrimination_from_times(responses)
    } else {
        1.0
    };

    let params = DifficultyParams {
        question_id: question_id.to_string(),
        difficulty_parameter: round_to(difficulty, 3),
        discrimination_parameter: round_to(discrimination, 3),
        guessing_parameter: guessing,
        difficulty_label: DifficultyLabel::from_difficulty(difficulty),
        total_responses: total,
        success_rate: round_to(success_rate, 4),
    };
    debug!(
        "calibrated {question_id}: a={} b={} from {total} responses",
        params.discrimination_parameter, params.difficulty_parameter
    );
    Ok(params)
}

fn discrimination_from_times(responses: &[ItemResponse]) -> f64 {
    let times: Vec<f64> = responses.iter().map(|r| r.time_spent).collect();
    let Some(median) = upper_median(&times) else {
        return 1.0;
    };

    // An empty group scores zero accuracy.
    let accuracy = |group: Vec<&ItemResponse>| -> f64 {
        group.iter().filter(|r| r.correct).count() as f64 / group.len().max(1) as f64
    };

    let fast = accuracy(responses.iter().filter(|r| r.time_spent <= median).collect());
    let slow = accuracy(responses.iter().filter(|r| r.time_spent > median).collect());

    ((fast - slow) * 3.0 + 1.0).clamp(0.3, 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(correct: bool, time_spent: f64) -> ItemResponse {
        ItemResponse {
            student_id: None,
            correct,
            time_spent,
        }
    }

    #[test]
    fn probability_is_bounded_and_monotonic() {
        let item = ItemParams {
            a: 1.7,
            b: 0.4,
            c: 0.2,
        };
        let mut previous = 0.0;
        let mut theta = THETA_MIN;
        while theta <= THETA_MAX {
            let p = probability(theta, item);
            assert!(p >= item.c && p <= 1.0, "p={p} at theta={theta}");
            assert!(p >= previous);
            previous = p;
            theta += 0.1;
        }
    }

    #[test]
    fn probability_at_difficulty_is_midway() {
        let item = ItemParams::default();
        assert!((probability(0.0, item) - 0.625).abs() < 1e-12);
    }

    #[test]
    fn extreme_exponent_is_clamped() {
        let item = ItemParams {
            a: 100.0,
            b: 0.0,
            c: 0.25,
        };
        let low = probability(-4.0, item);
        assert!(low > 0.25 && low.is_finite());
    }

    #[test]
    fn empty_observations_give_zero() {
        let estimator = AbilityEstimator::default();
        assert_eq!(estimator.estimate(&[], &HashMap::new()), 0.0);
    }

    #[test]
    fn all_correct_pushes_to_upper_bound() {
        let estimator = AbilityEstimator::default();
        let obs: Vec<Observation> = (0..5).map(|i| Observation::new(format!("q{i}"), true)).collect();
        let theta = estimator.estimate(&obs, &HashMap::new());
        assert!(theta > 3.9, "got {theta}");
    }

    #[test]
    fn all_wrong_pushes_to_lower_bound() {
        let estimator = AbilityEstimator::default();
        let obs: Vec<Observation> = (0..5).map(|i| Observation::new(format!("q{i}"), false)).collect();
        let theta = estimator.estimate(&obs, &HashMap::new());
        assert!(theta < -3.9, "got {theta}");
    }

    #[test]
    fn mixed_responses_land_in_between() {
        let estimator = AbilityEstimator::default();
        let obs = vec![
            Observation::new("q1", true),
            Observation::new("q2", false),
            Observation::new("q3", true),
            Observation::new("q4", false),
        ];
        let theta = estimator.estimate(&obs, &HashMap::new());
        // With c = 0.25 the maximum sits where P = 0.5, slightly below b.
        assert!(theta < 0.0 && theta > -1.0, "got {theta}");
    }

    #[test]
    fn calibrated_params_shift_estimate() {
        let estimator = AbilityEstimator::default();
        let obs = vec![Observation::new("hard", true), Observation::new("easy", false)];
        let mut params = HashMap::new();
        params.insert("hard".to_string(), ItemParams { a: 1.0, b: 2.0, c: 0.25 });
        params.insert("easy".to_string(), ItemParams { a: 1.0, b: -2.0, c: 0.25 });
        let calibrated = estimator.estimate_raw(&obs, &params);
        let uncalibrated = estimator.estimate_raw(&obs, &HashMap::new());
        assert!((calibrated - uncalibrated).abs() > 1e-3);
    }

    #[test]
    fn all_correct_calibrates_easy() {
        let responses: Vec<ItemResponse> = (0..10).map(|_| response(true, 30.0)).collect();
        let params = calibrate("q1", &responses, 0.25).unwrap();
        assert_eq!(params.success_rate, 1.0);
        assert_eq!(params.difficulty_parameter, -4.595);
        assert_eq!(params.difficulty_label, DifficultyLabel::Easy);
        assert_eq!(params.total_responses, 10);
    }

    #[test]
    fn all_wrong_calibrates_hard() {
        let responses: Vec<ItemResponse> = (0..6).map(|_| response(false, 30.0)).collect();
        let params = calibrate("q1", &responses, 0.25).unwrap();
        assert_eq!(params.difficulty_parameter, 4.595);
        assert_eq!(params.difficulty_label, DifficultyLabel::Hard);
    }

    #[test]
    fn few_responses_use_default_discrimination() {
        let responses = vec![response(true, 10.0), response(false, 90.0), response(true, 20.0)];
        let params = calibrate("q1", &responses, 0.25).unwrap();
        assert_eq!(params.discrimination_parameter, 1.0);
    }

    #[test]
    fn fast_correct_responders_raise_discrimination() {
        let responses = vec![
            response(true, 10.0),
            response(true, 12.0),
            response(true, 15.0),
            response(false, 80.0),
            response(false, 90.0),
        ];
        // Upper median is 15: fast = 3/3 correct, slow = 0/2 correct.
        let params = calibrate("q1", &responses, 0.25).unwrap();
        assert_eq!(params.discrimination_parameter, 3.0);
    }

    #[test]
    fn discrimination_is_clamped_low() {
        let responses = vec![
            response(false, 10.0),
            response(false, 12.0),
            response(true, 80.0),
            response(true, 90.0),
        ];
        // Upper median is 80: fast = 1/3 correct, slow = 1/1 correct.
        let params = calibrate("q1", &responses, 0.25).unwrap();
        assert_eq!(params.discrimination_parameter, 0.3);
    }

    #[test]
    fn uniform_times_leave_slow_group_empty() {
        let uniform = |correct: [bool; 4]| -> Vec<ItemResponse> {
            correct.iter().map(|&c| response(c, 60.0)).collect()
        };
        let a = |responses: Vec<ItemResponse>| {
            calibrate("q1", &responses, 0.25).unwrap().discrimination_parameter
        };
        assert_eq!(a(uniform([true; 4])), 3.0);
        assert_eq!(a(uniform([false; 4])), 1.0);
        assert_eq!(a(uniform([true, false, true, false])), 2.5);
    }

    #[test]
    fn empty_responses_are_rejected() {
        let err = calibrate("q1", &[], 0.25).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));
    }
}
