//! Seeded mock dataset generator for demos and tests.
//!
//! Students are drawn from six archetypes, each with a Gaussian profile for
//! the risk features and a score trajectory for the quiz history.

use std::collections::HashMap;

use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use skillscope_core::engagement::ActivityEvent;
use skillscope_core::model::QuizAttempt;
use skillscope_core::risk::{LabelledSample, RiskFeatures, RiskLevel};
use skillscope_core::statistics::{round_to, variance};

use crate::dataset::{Dataset, DatasetMetadata, StudentRecord};

/// Topics quizzes are drawn from.
pub const MOCK_TOPICS: [&str; 10] = [
    "Linear Equations",
    "Quadratic Equations",
    "Polynomials",
    "Trigonometric Ratios",
    "Pythagorean Theorem",
    "Fractions & Decimals",
    "Integers",
    "Probability Basics",
    "Angles",
    "Area & Perimeter",
];

/// Student behaviour profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Perfect,
    Struggling,
    Inconsistent,
    Improving,
    Declining,
    Average,
}

impl Archetype {
    pub const ALL: [Archetype; 6] = [
        Archetype::Perfect,
        Archetype::Struggling,
        Archetype::Inconsistent,
        Archetype::Improving,
        Archetype::Declining,
        Archetype::Average,
    ];

    /// 10% perfect, 10% struggling, 10% inconsistent, 20% improving,
    /// 15% declining, the rest average.
    fn from_roll(roll: f64) -> Self {
        if roll < 0.1 {
            Archetype::Perfect
        } else if roll < 0.2 {
            Archetype::Struggling
        } else if roll < 0.3 {
            Archetype::Inconsistent
        } else if roll < 0.5 {
            Archetype::Improving
        } else if roll < 0.65 {
            Archetype::Declining
        } else {
            Archetype::Average
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Archetype::Perfect => "perfect",
            Archetype::Struggling => "struggling",
            Archetype::Inconsistent => "inconsistent",
            Archetype::Improving => "improving",
            Archetype::Declining => "declining",
            Archetype::Average => "average",
        }
    }

    /// `(mean, std)` for engagement, quiz, attendance, completion and streak.
    fn profile(self) -> [(f64, f64); 5] {
        match self {
            Archetype::Perfect => [(90.0, 5.0), (92.0, 4.0), (98.0, 2.0), (95.0, 3.0), (15.0, 3.0)],
            Archetype::Struggling => {
                [(25.0, 10.0), (30.0, 12.0), (55.0, 15.0), (30.0, 12.0), (0.0, 1.0)]
            }
            Archetype::Inconsistent => {
                [(60.0, 25.0), (55.0, 25.0), (70.0, 20.0), (55.0, 20.0), (3.0, 5.0)]
            }
            Archetype::Improving => [(65.0, 10.0), (60.0, 10.0), (80.0, 8.0), (70.0, 10.0), (7.0, 3.0)],
            Archetype::Declining => [(50.0, 15.0), (55.0, 15.0), (65.0, 12.0), (50.0, 15.0), (1.0, 2.0)],
            Archetype::Average => [(65.0, 12.0), (68.0, 10.0), (82.0, 8.0), (72.0, 10.0), (5.0, 3.0)],
        }
    }

    /// Expected score percentage for quiz `j` of `n`.
    fn base_score(self, j: usize, n: usize, rng: &mut ChaCha8Rng) -> f64 {
        let progress = j as f64 / n.max(1) as f64;
        match self {
            Archetype::Improving => 40.0 + progress * 40.0,
            Archetype::Declining => 80.0 - progress * 35.0,
            Archetype::Perfect => 90.0,
            Archetype::Struggling => 30.0,
            Archetype::Inconsistent => *[30.0, 50.0, 70.0, 90.0].choose(rng).unwrap_or(&50.0),
            Archetype::Average => 65.0,
        }
    }

    /// Outcome label used for training samples.
    pub fn risk_label(self) -> RiskLevel {
        match self {
            Archetype::Struggling => RiskLevel::High,
            Archetype::Inconsistent | Archetype::Declining => RiskLevel::Medium,
            Archetype::Perfect | Archetype::Improving | Archetype::Average => RiskLevel::Low,
        }
    }
}

/// Knobs for [`generate`].
#[derive(Debug, Clone)]
pub struct MockDataOptions {
    pub students: usize,
    pub quizzes_per_student: usize,
    /// `None` draws from system entropy.
    pub seed: Option<u64>,
    /// Quizzes fall within 150 days after this instant. Defaults to 151
    /// days ago.
    pub start: DateTime<Utc>,
    pub teacher_id: String,
    pub class_id: String,
}

impl Default for MockDataOptions {
    fn default() -> Self {
        Self {
            students: 30,
            quizzes_per_student: 20,
            seed: None,
            start: default_start(),
            teacher_id: "teacher_001".to_string(),
            class_id: "class_a".to_string(),
        }
    }
}

/// Midnight 151 days ago, so the generated history ends yesterday.
fn default_start() -> DateTime<Utc> {
    let start = Utc::now() - Duration::days(151);
    start.duration_trunc(Duration::days(1)).unwrap_or(start)
}

fn gaussian(rng: &mut ChaCha8Rng, mean: f64, std: f64) -> f64 {
    Normal::new(mean, std)
        .map(|d| d.sample(rng))
        .unwrap_or(mean)
}

/// Generate a dataset of students, quiz history, activity and training
/// labels.
pub fn generate(options: &MockDataOptions) -> Dataset {
    let mut rng = match options.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let mut dataset = Dataset::default();
    let mut distribution: HashMap<String, usize> = HashMap::new();

    for i in 0..options.students {
        let student_id = format!("mock_student_{:03}", i + 1);
        let archetype = Archetype::from_roll(rng.gen());
        *distribution.entry(archetype.name().to_string()).or_default() += 1;

        let [engagement, quiz, attendance, completion, streak] = archetype.profile();
        let pct = |(mean, std): (f64, f64), rng: &mut ChaCha8Rng| {
            round_to(gaussian(rng, mean, std).clamp(0.0, 100.0), 1)
        };
        let engagement_score = pct(engagement, &mut rng);
        let avg_quiz_score = pct(quiz, &mut rng);
        let attendance = pct(attendance, &mut rng);
        let assignment_completion = pct(completion, &mut rng);
        let streak = gaussian(&mut rng, streak.0, streak.1).max(0.0) as u32;
        let xp_mean = if archetype == Archetype::Improving { 0.5 } else { 0.0 };
        let xp_growth_rate = round_to(gaussian(&mut rng, xp_mean, 0.3), 2);
        let time_on_platform = round_to(gaussian(&mut rng, 8.0, 3.0).max(0.0), 1);

        let mut scores = Vec::with_capacity(options.quizzes_per_student);
        for j in 0..options.quizzes_per_student {
            let attempt = mock_attempt(&student_id, archetype, j, options, &mut rng);
            scores.push(attempt.score_percentage());
            if let Some(ts) = attempt.timestamp {
                dataset.activity.push(ActivityEvent {
                    student_id: Some(student_id.clone()),
                    timestamp: ts,
                    activity_type: "quiz_completed".to_string(),
                    xp_earned: attempt.score * 10.0,
                });
            }
            dataset.quiz_history.push(attempt);
        }

        let features = RiskFeatures {
            engagement_score,
            avg_quiz_score,
            attendance,
            assignment_completion,
            streak,
            xp_growth_rate,
            time_on_platform,
            engagement_trend_7d: None,
            quiz_score_variance: variance(&scores).map(|v| round_to(v.sqrt(), 2)),
            consecutive_absences: 0,
            days_since_last_activity: 0,
        };

        dataset.training_samples.push(LabelledSample {
            features: features.clone(),
            label: archetype.risk_label(),
        });
        dataset.students.push(StudentRecord {
            student_id,
            name: Some(format!("Student {}", i + 1)),
            archetype: Some(archetype.name().to_string()),
            teacher_id: Some(options.teacher_id.clone()),
            class_id: Some(options.class_id.clone()),
            risk_features: Some(features),
        });
        debug!("generated mock student {} ({})", i + 1, archetype.name());
    }

    dataset.metadata = Some(DatasetMetadata {
        num_students: options.students,
        quizzes_per_student: options.quizzes_per_student,
        archetype_distribution: distribution,
        topics_covered: MOCK_TOPICS.iter().map(|t| t.to_string()).collect(),
        seed: options.seed,
        generated_at: Some(Utc::now()),
    });
    dataset
}

fn mock_attempt(
    student_id: &str,
    archetype: Archetype,
    j: usize,
    options: &MockDataOptions,
    rng: &mut ChaCha8Rng,
) -> QuizAttempt {
    let topic = MOCK_TOPICS[rng.gen_range(0..MOCK_TOPICS.len())];
    let day = rng.gen_range(0..=150);
    let hour = rng.gen_range(8..22);
    let timestamp = options.start + Duration::days(day) + Duration::hours(hour);

    let base = archetype.base_score(j, options.quizzes_per_student, rng);
    let score = (base + gaussian(rng, 0.0, 8.0)).clamp(0.0, 100.0);
    let total = *[10.0, 15.0, 20.0].choose(rng).unwrap_or(&10.0);
    let correct = (total * score / 100.0).round();
    let mean_time = if score > 70.0 { 60.0 } else { 90.0 };
    let time_per_question = gaussian(rng, mean_time, 20.0).max(10.0);
    let attempts_count = if score < 60.0 {
        *[1, 1, 1, 2, 2, 3].choose(rng).unwrap_or(&1)
    } else {
        1
    };

    QuizAttempt {
        student_id: student_id.to_string(),
        topic_id: topic.to_string(),
        question_id: Some(format!("q_{}_{j}", topic.replace(' ', "_").to_lowercase())),
        score: correct,
        total,
        correct: Some(correct >= total * 0.5),
        attempts_count,
        time_spent_seconds: Some((time_per_question * total).round()),
        timestamp: Some(timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(students: usize) -> Dataset {
        generate(&MockDataOptions {
            students,
            seed: Some(42),
            ..MockDataOptions::default()
        })
    }

    #[test]
    fn same_seed_same_data() {
        let a = serde_json::to_value(seeded(5).quiz_history).unwrap();
        let b = serde_json::to_value(seeded(5).quiz_history).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shape_of_generated_dataset() {
        let data = seeded(12);
        assert_eq!(data.students.len(), 12);
        assert_eq!(data.quiz_history.len(), 12 * 20);
        assert_eq!(data.activity.len(), data.quiz_history.len());
        assert_eq!(data.training_samples.len(), 12);
        assert_eq!(data.students[0].student_id, "mock_student_001");
        assert_eq!(data.roster("teacher_001", "class_a").len(), 12);

        let meta = data.metadata.unwrap();
        assert_eq!(meta.archetype_distribution.values().sum::<usize>(), 12);
        assert_eq!(meta.topics_covered.len(), 10);
    }

    #[test]
    fn attempts_are_within_range() {
        let data = seeded(10);
        let end = MockDataOptions::default().start + Duration::days(151);
        for a in &data.quiz_history {
            assert!(a.score >= 0.0 && a.score <= a.total);
            assert!(MOCK_TOPICS.contains(&a.topic_id.as_str()));
            let ts = a.timestamp.unwrap();
            assert!(ts >= MockDataOptions::default().start && ts < end);
        }
        for s in &data.students {
            assert!(s.risk_features.as_ref().unwrap().validate().is_ok());
        }
    }

    #[test]
    fn archetype_labels() {
        assert_eq!(Archetype::Struggling.risk_label(), RiskLevel::High);
        assert_eq!(Archetype::Declining.risk_label(), RiskLevel::Medium);
        assert_eq!(Archetype::from_roll(0.05), Archetype::Perfect);
        assert_eq!(Archetype::from_roll(0.99), Archetype::Average);
    }
}
