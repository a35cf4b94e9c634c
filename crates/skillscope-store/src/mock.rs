//! In-memory store for testing the engine without a dataset file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use skillscope_core::engagement::ActivityEvent;
use skillscope_core::model::{CompetencyReport, DifficultyParams, QuizAttempt};
use skillscope_core::risk::{LabelledSample, RiskFeatures};
use skillscope_core::traits::{
    AnalyticsStore, AttemptSource, EngagementSource, RosterSource, TrainingDataSource,
};

/// A configurable store that records what the engine asked for and wrote.
#[derive(Debug, Default)]
pub struct MockStore {
    history: HashMap<String, Vec<QuizAttempt>>,
    activity: HashMap<String, Vec<ActivityEvent>>,
    features: HashMap<String, RiskFeatures>,
    rosters: HashMap<(String, String), Vec<String>>,
    samples: Vec<LabelledSample>,
    fail_writes: bool,
    history_calls: AtomicU32,
    competency: Mutex<Vec<CompetencyReport>>,
    difficulty: Mutex<Vec<DifficultyParams>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add attempts; each is filed under its own student id.
    pub fn with_attempts(mut self, attempts: impl IntoIterator<Item = QuizAttempt>) -> Self {
        for attempt in attempts {
            self.history
                .entry(attempt.student_id.clone())
                .or_default()
                .push(attempt);
        }
        self
    }

    pub fn with_activity(mut self, student_id: &str, events: Vec<ActivityEvent>) -> Self {
        self.activity.insert(student_id.to_string(), events);
        self
    }

    pub fn with_risk_features(mut self, student_id: &str, features: RiskFeatures) -> Self {
        self.features.insert(student_id.to_string(), features);
        self
    }

    pub fn with_roster(mut self, teacher_id: &str, class_id: &str, students: &[&str]) -> Self {
        self.rosters.insert(
            (teacher_id.to_string(), class_id.to_string()),
            students.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_samples(mut self, samples: Vec<LabelledSample>) -> Self {
        self.samples = samples;
        self
    }

    /// Make every persistence call fail.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Number of quiz-history lookups made so far.
    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::Relaxed)
    }

    pub fn stored_competency(&self) -> Vec<CompetencyReport> {
        self.competency.lock().clone()
    }

    pub fn stored_difficulty(&self) -> Vec<DifficultyParams> {
        self.difficulty.lock().clone()
    }
}

#[async_trait]
impl AttemptSource for MockStore {
    async fn quiz_history(&self, student_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
        self.history_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.history.get(student_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EngagementSource for MockStore {
    async fn activity(&self, student_id: &str, _days: u32) -> anyhow::Result<Vec<ActivityEvent>> {
        Ok(self.activity.get(student_id).cloned().unwrap_or_default())
    }

    async fn risk_features(&self, student_id: &str) -> anyhow::Result<Option<RiskFeatures>> {
        Ok(self.features.get(student_id).cloned())
    }
}

#[async_trait]
impl RosterSource for MockStore {
    async fn class_roster(&self, teacher_id: &str, class_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .rosters
            .get(&(teacher_id.to_string(), class_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TrainingDataSource for MockStore {
    async fn labelled_samples(&self) -> anyhow::Result<Vec<LabelledSample>> {
        Ok(self.samples.clone())
    }
}

#[async_trait]
impl AnalyticsStore for MockStore {
    async fn store_competency(
        &self,
        _student_id: &str,
        report: &CompetencyReport,
    ) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("mock store rejects writes");
        }
        self.competency.lock().push(report.clone());
        Ok(())
    }

    async fn store_difficulty(&self, params: &DifficultyParams) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("mock store rejects writes");
        }
        self.difficulty.lock().push(params.clone());
        Ok(())
    }
}
