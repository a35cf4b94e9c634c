//! Adaptive quiz selection.
//!
//! Targets question difficulties around a student's ability while holding
//! the realised easy/medium/hard mix to a quota chosen from the student's
//! ability bucket.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::irt::{probability, Observation, THETA_MAX, THETA_MIN};
use crate::model::{
    AdaptiveQuiz, CompetencyLevel, DifficultyHistogram, DifficultyLabel, ItemParams, QuizAttempt,
    QuizSelection,
};
use crate::statistics::{mean, round_to};

/// Request for an adaptively generated quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveQuizRequest {
    pub student_id: String,
    pub topic_id: String,
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
    #[serde(default = "default_target_success_rate")]
    pub target_success_rate: f64,
}

fn default_num_questions() -> usize {
    10
}

fn default_target_success_rate() -> f64 {
    0.70
}

impl AdaptiveQuizRequest {
    pub fn new(student_id: impl Into<String>, topic_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            topic_id: topic_id.into(),
            num_questions: default_num_questions(),
            target_success_rate: default_target_success_rate(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=50).contains(&self.num_questions) {
            return Err(AnalyticsError::validation(format!(
                "numQuestions must be between 1 and 50, got {}",
                self.num_questions
            )));
        }
        if !(0.3..=0.95).contains(&self.target_success_rate) {
            return Err(AnalyticsError::validation(format!(
                "targetSuccessRate must be between 0.3 and 0.95, got {}",
                self.target_success_rate
            )));
        }
        Ok(())
    }
}

/// Share of easy, medium and hard questions. Shares sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyMix {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl DifficultyMix {
    pub const fn new(easy: f64, medium: f64, hard: f64) -> Self {
        Self { easy, medium, hard }
    }

    /// Integer quota per bucket for `n` questions. Easy and medium get at
    /// least one question each where `n` allows; hard absorbs the remainder
    /// so the quota always sums to `n`.
    pub fn targets(&self, n: usize) -> DifficultyHistogram {
        let share = |s: f64| (n as f64 * s).round_ties_even().max(0.0) as usize;
        let easy = share(self.easy).max(1).min(n);
        let medium = share(self.medium).max(1).min(n - easy);
        DifficultyHistogram {
            easy,
            medium,
            hard: n - easy - medium,
        }
    }
}

/// Difficulty mix per ability bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionTable {
    pub beginner: DifficultyMix,
    pub developing: DifficultyMix,
    pub proficient: DifficultyMix,
    pub advanced: DifficultyMix,
}

impl Default for DistributionTable {
    fn default() -> Self {
        Self {
            beginner: DifficultyMix::new(0.70, 0.20, 0.10),
            developing: DifficultyMix::new(0.40, 0.40, 0.20),
            proficient: DifficultyMix::new(0.20, 0.40, 0.40),
            advanced: DifficultyMix::new(0.10, 0.30, 0.60),
        }
    }
}

impl DistributionTable {
    pub fn mix(&self, level: CompetencyLevel) -> DifficultyMix {
        match level {
            CompetencyLevel::Beginner => self.beginner,
            CompetencyLevel::Developing => self.developing,
            CompetencyLevel::Proficient => self.proficient,
            CompetencyLevel::Advanced => self.advanced,
        }
    }
}

/// Ability bucket for a theta, via its position on a 0–100 scale.
pub fn ability_bucket(theta: f64) -> CompetencyLevel {
    CompetencyLevel::from_score((theta - THETA_MIN) / (THETA_MAX - THETA_MIN) * 100.0)
}

/// Observations from a student's attempts on one topic.
pub fn topic_observations(history: &[QuizAttempt], topic_id: &str) -> Vec<Observation> {
    history
        .iter()
        .filter(|a| a.topic_id == topic_id)
        .enumerate()
        .map(|(i, a)| {
            let id = a.question_id.clone().unwrap_or_else(|| format!("q_{i}"));
            Observation::new(id, a.is_correct())
        })
        .collect()
}

/// Picks target difficulties for an adaptive quiz.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveSelector {
    pub table: DistributionTable,
    /// Parameters used to predict success on generated questions; `b` is
    /// replaced by each question's target difficulty.
    pub item: ItemParams,
    /// Offset of the easier and harder questions from the student's level.
    pub step: f64,
}

impl Default for AdaptiveSelector {
    fn default() -> Self {
        Self {
            table: DistributionTable::default(),
            item: ItemParams::default(),
            step: 0.5,
        }
    }
}

impl AdaptiveSelector {
    /// Build the quiz for an already-validated request and topic ability.
    pub fn select(&self, request: &AdaptiveQuizRequest, theta: f64) -> AdaptiveQuiz {
        let n = request.num_questions;
        let level = ability_bucket(theta);
        let targets = self.table.mix(level).targets(n);
        debug!(
            "adaptive quiz for {} on {}: theta={theta:.3} bucket={level} targets={targets:?}",
            request.student_id, request.topic_id
        );

        let mut counts = DifficultyHistogram::default();
        let mut selected = Vec::with_capacity(n);

        for i in 0..n {
            let mut b = self.target_difficulty(i, theta);
            let mut label = DifficultyLabel::from_difficulty(b);

            if counts.get(label) >= targets.get(label) {
                label = most_remaining(&targets, &counts);
                match label {
                    DifficultyLabel::Easy => b = b.min(-1.0),
                    DifficultyLabel::Hard => b = b.max(1.0),
                    DifficultyLabel::Medium => {}
                }
            }
            counts.increment(label);

            let item = ItemParams { b, ..self.item };
            selected.push(QuizSelection {
                question_id: format!("{}_q{}", request.topic_id, i + 1),
                estimated_difficulty: round_to(b, 3),
                predicted_success_probability: round_to(probability(theta, item), 3),
                difficulty_label: label,
            });
        }

        let predictions: Vec<f64> = selected
            .iter()
            .map(|q| q.predicted_success_probability)
            .collect();
        let expected = mean(&predictions).unwrap_or(0.0);

        AdaptiveQuiz {
            student_id: request.student_id.clone(),
            topic_id: request.topic_id.clone(),
            selected_questions: selected,
            student_ability_estimate: round_to(theta, 3),
            expected_success_rate: round_to(expected, 3),
            target_success_rate: request.target_success_rate,
            difficulty_distribution: counts,
        }
    }

    /// Two questions at the student's level, then easier / at-level / harder
    /// by position modulo three.
    fn target_difficulty(&self, index: usize, theta: f64) -> f64 {
        if index < 2 {
            return theta;
        }
        match index % 3 {
            0 => theta - self.step,
            1 => theta,
            _ => theta + self.step,
        }
    }
}

/// Bucket with the largest unmet quota; ties go to the easier bucket.
fn most_remaining(targets: &DifficultyHistogram, counts: &DifficultyHistogram) -> DifficultyLabel {
    let remaining = |l: DifficultyLabel| targets.get(l) as i64 - counts.get(l) as i64;
    let mut best = DifficultyLabel::Easy;
    for label in DifficultyLabel::ALL {
        if remaining(label) > remaining(best) {
            best = label;
        }
    }
    best
}
