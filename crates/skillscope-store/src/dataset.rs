//! JSON dataset file and the store backed by it.
//!
//! A dataset holds students, their quiz history and activity, optional
//! labelled training samples, and whatever the engine has persisted
//! (competency reports and calibrated difficulty parameters).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use skillscope_core::engagement::ActivityEvent;
use skillscope_core::model::{CompetencyReport, DifficultyParams, QuizAttempt};
use skillscope_core::risk::{LabelledSample, RiskFeatures};
use skillscope_core::traits::{
    AnalyticsStore, AttemptSource, EngagementSource, RosterSource, TrainingDataSource,
};

use crate::error::StoreError;

/// One student and their class membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub archetype: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub risk_features: Option<RiskFeatures>,
}

/// Provenance of a generated dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub num_students: usize,
    pub quizzes_per_student: usize,
    pub archetype_distribution: HashMap<String, usize>,
    pub topics_covered: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Everything the file store knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub quiz_history: Vec<QuizAttempt>,
    #[serde(default)]
    pub activity: Vec<ActivityEvent>,
    #[serde(default)]
    pub training_samples: Vec<LabelledSample>,
    #[serde(default)]
    pub difficulty: Vec<DifficultyParams>,
    #[serde(default)]
    pub competency: Vec<CompetencyReport>,
    #[serde(default)]
    pub metadata: Option<DatasetMetadata>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.student_id == student_id)
    }

    pub fn history(&self, student_id: &str) -> Vec<QuizAttempt> {
        self.quiz_history
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect()
    }

    /// Students enrolled with the teacher in the class, in dataset order.
    pub fn roster(&self, teacher_id: &str, class_id: &str) -> Vec<String> {
        self.students
            .iter()
            .filter(|s| {
                s.teacher_id.as_deref() == Some(teacher_id) && s.class_id.as_deref() == Some(class_id)
            })
            .map(|s| s.student_id.clone())
            .collect()
    }

    /// Replace or add calibrated parameters for a question.
    pub fn upsert_difficulty(&mut self, params: DifficultyParams) {
        match self
            .difficulty
            .iter_mut()
            .find(|p| p.question_id == params.question_id)
        {
            Some(existing) => *existing = params,
            None => self.difficulty.push(params),
        }
    }

    pub fn upsert_competency(&mut self, report: CompetencyReport) {
        match self
            .competency
            .iter_mut()
            .find(|r| r.student_id == report.student_id)
        {
            Some(existing) => *existing = report,
            None => self.competency.push(report),
        }
    }
}

/// A store over a JSON dataset file. Writes go to memory and, when the
/// store was opened from a path, back to that file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: Option<PathBuf>,
    dataset: RwLock<Dataset>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let dataset = Dataset::load(path)?;
        debug!(
            "loaded dataset {} ({} students, {} attempts)",
            path.display(),
            dataset.students.len(),
            dataset.quiz_history.len()
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            dataset: RwLock::new(dataset),
        })
    }

    pub fn in_memory(dataset: Dataset) -> Self {
        Self {
            path: None,
            dataset: RwLock::new(dataset),
        }
    }

    /// A copy of the current dataset.
    pub fn snapshot(&self) -> Dataset {
        self.dataset.read().clone()
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.dataset.read())?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl AttemptSource for JsonFileStore {
    async fn quiz_history(&self, student_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
        Ok(self.dataset.read().history(student_id))
    }
}

#[async_trait]
impl EngagementSource for JsonFileStore {
    async fn activity(&self, student_id: &str, days: u32) -> anyhow::Result<Vec<ActivityEvent>> {
        let since = Utc::now() - Duration::days(i64::from(days));
        Ok(self
            .dataset
            .read()
            .activity
            .iter()
            .filter(|e| e.student_id.as_deref() == Some(student_id) && e.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn risk_features(&self, student_id: &str) -> anyhow::Result<Option<RiskFeatures>> {
        Ok(self
            .dataset
            .read()
            .student(student_id)
            .and_then(|s| s.risk_features.clone()))
    }
}

#[async_trait]
impl RosterSource for JsonFileStore {
    async fn class_roster(&self, teacher_id: &str, class_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.dataset.read().roster(teacher_id, class_id))
    }
}

#[async_trait]
impl TrainingDataSource for JsonFileStore {
    async fn labelled_samples(&self) -> anyhow::Result<Vec<LabelledSample>> {
        Ok(self.dataset.read().training_samples.clone())
    }
}

#[async_trait]
impl AnalyticsStore for JsonFileStore {
    async fn store_competency(
        &self,
        _student_id: &str,
        report: &CompetencyReport,
    ) -> anyhow::Result<()> {
        self.dataset.write().upsert_competency(report.clone());
        self.flush().await
    }

    async fn store_difficulty(&self, params: &DifficultyParams) -> anyhow::Result<()> {
        self.dataset.write().upsert_difficulty(params.clone());
        self.flush().await
    }
}
