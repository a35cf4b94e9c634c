//! Core data model types for skillscope.
//!
//! Quiz attempts come in from the external quiz system; everything else in
//! this module is derived by the analytics components and handed back to
//! the request layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time assumed for an attempt that did not record one, in seconds.
pub const DEFAULT_TIME_SPENT_SECS: f64 = 60.0;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A single recorded quiz attempt. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    /// Student who made the attempt.
    pub student_id: String,
    /// Topic the quiz belongs to.
    #[serde(alias = "topic", default = "unknown_topic")]
    pub topic_id: String,
    /// Question or quiz identifier, if the source recorded one.
    #[serde(default)]
    pub question_id: Option<String>,
    /// Points scored.
    #[serde(default)]
    pub score: f64,
    /// Points available.
    #[serde(default = "default_total")]
    pub total: f64,
    /// Explicit correctness flag, when the quiz system provides one.
    #[serde(default)]
    pub correct: Option<bool>,
    /// How many tries the student needed.
    #[serde(alias = "attempts", default = "default_attempts")]
    pub attempts_count: u32,
    /// Time spent on the attempt.
    #[serde(alias = "timeTaken", default)]
    pub time_spent_seconds: Option<f64>,
    /// When the attempt was completed.
    #[serde(alias = "completedAt", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn unknown_topic() -> String {
    "Unknown".to_string()
}

fn default_total() -> f64 {
    1.0
}

fn default_attempts() -> u32 {
    1
}

impl QuizAttempt {
    /// Score as a percentage of the available points.
    pub fn score_percentage(&self) -> f64 {
        self.score / self.total.max(1.0) * 100.0
    }

    /// Whether the attempt scored at least half of the available points.
    pub fn passed(&self) -> bool {
        self.score_percentage() >= 50.0
    }

    /// Correctness used for ability estimation: the explicit flag when
    /// present, otherwise the 50% score threshold.
    pub fn is_correct(&self) -> bool {
        self.correct.unwrap_or_else(|| self.passed())
    }

    /// Recorded time, falling back to [`DEFAULT_TIME_SPENT_SECS`] when the
    /// source left it empty or zero.
    pub fn time_spent(&self) -> f64 {
        match self.time_spent_seconds {
            Some(t) if t != 0.0 => t,
            _ => DEFAULT_TIME_SPENT_SECS,
        }
    }

    /// Number of tries, never below one.
    pub fn tries(&self) -> u32 {
        self.attempts_count.max(1)
    }

    /// Identifier used to look up item parameters for this attempt.
    pub fn question_key(&self, index: usize) -> String {
        self.question_id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.topic_id, index))
    }
}

/// One student's answer to a question, used for difficulty calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub correct: bool,
    #[serde(default = "default_time_spent")]
    pub time_spent: f64,
}

fn default_time_spent() -> f64 {
    DEFAULT_TIME_SPENT_SECS
}

// ---------------------------------------------------------------------------
// Item parameters
// ---------------------------------------------------------------------------

/// 3PL parameters for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParams {
    /// Discrimination.
    pub a: f64,
    /// Difficulty on the logit scale.
    pub b: f64,
    /// Guessing probability.
    pub c: f64,
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.25,
        }
    }
}

/// Calibrated parameters for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyParams {
    pub question_id: String,
    /// `b` parameter.
    pub difficulty_parameter: f64,
    /// `a` parameter, within `[0.3, 3.0]`.
    pub discrimination_parameter: f64,
    /// `c` parameter.
    pub guessing_parameter: f64,
    pub difficulty_label: DifficultyLabel,
    pub total_responses: usize,
    pub success_rate: f64,
}

impl DifficultyParams {
    /// The parameters in the form the ability estimator consumes.
    pub fn item(&self) -> ItemParams {
        ItemParams {
            a: self.discrimination_parameter,
            b: self.difficulty_parameter,
            c: self.guessing_parameter,
        }
    }
}

/// Coarse difficulty bucket for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLabel {
    /// All labels, in quota tie-break order.
    pub const ALL: [DifficultyLabel; 3] = [
        DifficultyLabel::Easy,
        DifficultyLabel::Medium,
        DifficultyLabel::Hard,
    ];

    /// Bucket a difficulty parameter: `b < -1` easy, `b >= 1` hard.
    pub fn from_difficulty(b: f64) -> Self {
        if b < -1.0 {
            DifficultyLabel::Easy
        } else if b < 1.0 {
            DifficultyLabel::Medium
        } else {
            DifficultyLabel::Hard
        }
    }
}

impl fmt::Display for DifficultyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyLabel::Easy => write!(f, "easy"),
            DifficultyLabel::Medium => write!(f, "medium"),
            DifficultyLabel::Hard => write!(f, "hard"),
        }
    }
}

// ---------------------------------------------------------------------------
// Competency
// ---------------------------------------------------------------------------

/// Competency bucket for a 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetencyLevel {
    Beginner,
    Developing,
    Proficient,
    Advanced,
}

impl CompetencyLevel {
    pub const ALL: [CompetencyLevel; 4] = [
        CompetencyLevel::Beginner,
        CompetencyLevel::Developing,
        CompetencyLevel::Proficient,
        CompetencyLevel::Advanced,
    ];

    /// Beginner `[0,40)`, developing `[40,65)`, proficient `[65,85)`,
    /// advanced `[85,100]`. Scores outside the range land in the nearest end.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            CompetencyLevel::Advanced
        } else if score >= 65.0 {
            CompetencyLevel::Proficient
        } else if score >= 40.0 {
            CompetencyLevel::Developing
        } else {
            CompetencyLevel::Beginner
        }
    }
}

impl fmt::Display for CompetencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompetencyLevel::Beginner => write!(f, "beginner"),
            CompetencyLevel::Developing => write!(f, "developing"),
            CompetencyLevel::Proficient => write!(f, "proficient"),
            CompetencyLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for CompetencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(CompetencyLevel::Beginner),
            "developing" => Ok(CompetencyLevel::Developing),
            "proficient" => Ok(CompetencyLevel::Proficient),
            "advanced" => Ok(CompetencyLevel::Advanced),
            other => Err(format!("unknown competency level: {other}")),
        }
    }
}

/// Outcome of a competency analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    InsufficientData,
}

/// Per-topic competency for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyAnalysis {
    pub topic_id: String,
    pub topic_name: String,
    /// Composite speed/accuracy/tries score in `[0, 100]`.
    pub efficiency_score: f64,
    pub competency_level: CompetencyLevel,
    pub mastery_percentage: f64,
    /// Recency-weighted trend of score percentage per day.
    pub learning_velocity: f64,
    pub total_attempts: usize,
    pub average_accuracy: f64,
    #[serde(default)]
    pub last_attempt_date: Option<DateTime<Utc>>,
}

/// Competency analysis across all of a student's topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyReport {
    pub student_id: String,
    pub status: AnalysisStatus,
    /// Sorted ascending by efficiency score, weakest first.
    pub analyses: Vec<CompetencyAnalysis>,
    #[serde(default)]
    pub overall_competency: Option<CompetencyLevel>,
    #[serde(default)]
    pub theta_estimate: Option<f64>,
}

impl CompetencyReport {
    pub fn insufficient(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            status: AnalysisStatus::InsufficientData,
            analyses: Vec::new(),
            overall_competency: None,
            theta_estimate: None,
        }
    }

    /// Look up the analysis for a topic.
    pub fn topic(&self, topic_id: &str) -> Option<&CompetencyAnalysis> {
        self.analyses.iter().find(|a| a.topic_id == topic_id)
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Where a student currently stands on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStanding {
    NotAttempted,
    Beginner,
    Developing,
    Proficient,
    Advanced,
}

impl From<CompetencyLevel> for TopicStanding {
    fn from(level: CompetencyLevel) -> Self {
        match level {
            CompetencyLevel::Beginner => TopicStanding::Beginner,
            CompetencyLevel::Developing => TopicStanding::Developing,
            CompetencyLevel::Proficient => TopicStanding::Proficient,
            CompetencyLevel::Advanced => TopicStanding::Advanced,
        }
    }
}

impl fmt::Display for TopicStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicStanding::NotAttempted => write!(f, "not_attempted"),
            TopicStanding::Beginner => write!(f, "beginner"),
            TopicStanding::Developing => write!(f, "developing"),
            TopicStanding::Proficient => write!(f, "proficient"),
            TopicStanding::Advanced => write!(f, "advanced"),
        }
    }
}

/// A ranked suggestion of what to study next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecommendation {
    pub topic_id: String,
    pub topic_name: String,
    pub recommendation_score: f64,
    pub reasoning: String,
    /// Hours.
    pub estimated_time_to_mastery: u32,
    pub prerequisites_met: bool,
    pub current_competency: TopicStanding,
}

/// How a recommendation list was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Success,
    ColdStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReport {
    pub student_id: String,
    pub recommendations: Vec<TopicRecommendation>,
    pub status: RecommendationStatus,
}

// ---------------------------------------------------------------------------
// Adaptive quizzes
// ---------------------------------------------------------------------------

/// One slot in an adaptively generated quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSelection {
    pub question_id: String,
    pub estimated_difficulty: f64,
    pub predicted_success_probability: f64,
    pub difficulty_label: DifficultyLabel,
}

/// Count of questions per difficulty bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyHistogram {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl DifficultyHistogram {
    pub fn get(&self, label: DifficultyLabel) -> usize {
        match label {
            DifficultyLabel::Easy => self.easy,
            DifficultyLabel::Medium => self.medium,
            DifficultyLabel::Hard => self.hard,
        }
    }

    pub fn increment(&mut self, label: DifficultyLabel) {
        match label {
            DifficultyLabel::Easy => self.easy += 1,
            DifficultyLabel::Medium => self.medium += 1,
            DifficultyLabel::Hard => self.hard += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }
}

/// An adaptively generated quiz for one student and topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveQuiz {
    pub student_id: String,
    pub topic_id: String,
    pub selected_questions: Vec<QuizSelection>,
    pub student_ability_estimate: f64,
    pub expected_success_rate: f64,
    pub target_success_rate: f64,
    pub difficulty_distribution: DifficultyHistogram,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Human-readable name for a topic id: underscores become spaces and each
/// word is capitalised.
pub fn topic_display_name(topic_id: &str) -> String {
    let mut name = String::with_capacity(topic_id.len());
    let mut prev_alpha = false;
    for ch in topic_id.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                name.extend(ch.to_lowercase());
            } else {
                name.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            name.push(ch);
            prev_alpha = false;
        }
    }
    name
}
