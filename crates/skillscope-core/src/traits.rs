//! Collaborator seams.
//!
//! The analytics engine never talks to a database directly. Quiz history,
//! activity logs, class rosters, persistence and training labels all come in
//! through these async traits, implemented by the `skillscope-store` crate.

use async_trait::async_trait;

use crate::engagement::ActivityEvent;
use crate::model::{CompetencyReport, DifficultyParams, QuizAttempt};
use crate::risk::{LabelledSample, RiskFeatures};

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Source of recorded quiz attempts.
#[async_trait]
pub trait AttemptSource: Send + Sync {
    /// Every attempt recorded for a student, in any order.
    async fn quiz_history(&self, student_id: &str) -> anyhow::Result<Vec<QuizAttempt>>;
}

/// Source of activity logs and risk inputs.
#[async_trait]
pub trait EngagementSource: Send + Sync {
    /// Activity events from the last `days` days.
    async fn activity(&self, student_id: &str, days: u32) -> anyhow::Result<Vec<ActivityEvent>>;

    /// Precomputed risk features, or `None` when the student has no record.
    async fn risk_features(&self, student_id: &str) -> anyhow::Result<Option<RiskFeatures>>;
}

/// Source of class membership.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn class_roster(&self, teacher_id: &str, class_id: &str) -> anyhow::Result<Vec<String>>;
}

/// Labelled outcomes for training the risk model.
#[async_trait]
pub trait TrainingDataSource: Send + Sync {
    async fn labelled_samples(&self) -> anyhow::Result<Vec<LabelledSample>>;
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

/// Persistence hook for computed analytics. Failures are logged by the
/// engine and never fail the computation that produced the value.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn store_competency(
        &self,
        student_id: &str,
        report: &CompetencyReport,
    ) -> anyhow::Result<()>;

    async fn store_difficulty(&self, params: &DifficultyParams) -> anyhow::Result<()>;
}

/// A store that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl AnalyticsStore for NullStore {
    async fn store_competency(&self, _: &str, _: &CompetencyReport) -> anyhow::Result<()> {
        Ok(())
    }

    async fn store_difficulty(&self, _: &DifficultyParams) -> anyhow::Result<()> {
        Ok(())
    }
}
