//! Central analytics engine.
//!
//! Fetches inputs from the collaborators, runs the pure analytics
//! components, and owns the cache namespaces and the lazily loaded risk
//! classifier.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::adaptive::{topic_observations, AdaptiveQuizRequest, AdaptiveSelector, DistributionTable};
use crate::cache::{AnalyticsCache, RefreshReport};
use crate::engagement::{aggregate_engagement, EngagementMetrics};
use crate::graph::TopicGraph;
use crate::irt::{calibrate, AbilityEstimator};
use crate::model::{
    AdaptiveQuiz, AnalysisStatus, CompetencyReport, DifficultyParams, ItemParams, ItemResponse,
    QuizAttempt, RecommendationReport, RecommendationStatus, TopicRecommendation,
};
use crate::competency::CompetencyAggregator;
use crate::recommend::{cold_start, RecommendationRequest, TopicRecommender};
use crate::report::{predict_next_score, ClassInsights, StudentSummary};
use crate::risk::training::train;
use crate::risk::{RiskClassifier, RiskFeatures, RiskPrediction, TrainingOptions, TrainingReport};
use crate::traits::{
    AnalyticsStore, AttemptSource, EngagementSource, RosterSource, TrainingDataSource,
};

/// Every tunable constant of the analytics components.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Attempts required before competency is analysed.
    pub min_attempts: usize,
    pub cache_ttl: Duration,
    /// Item parameters for uncalibrated questions.
    pub item_defaults: ItemParams,
    pub velocity_decay: f64,
    pub efficiency_cap: f64,
    pub recency_cap_days: i64,
    pub never_attempted_days: i64,
    pub distribution: DistributionTable,
    pub risk_model_path: PathBuf,
    pub min_real_samples: usize,
    pub synthetic_samples: usize,
    pub allow_synthetic_data: bool,
    pub training_seed: u64,
    /// Days of activity included in a student summary.
    pub activity_window_days: u32,
    /// Students sampled from a roster for class insights.
    pub class_sample_limit: usize,
    /// Recommendations included in a student summary.
    pub summary_recommendations: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_attempts: 3,
            cache_ttl: Duration::from_secs(3600),
            item_defaults: ItemParams::default(),
            velocity_decay: 0.05,
            efficiency_cap: 150.0,
            recency_cap_days: 60,
            never_attempted_days: 30,
            distribution: DistributionTable::default(),
            risk_model_path: PathBuf::from("models/risk_model.json"),
            min_real_samples: 50,
            synthetic_samples: 500,
            allow_synthetic_data: false,
            training_seed: 42,
            activity_window_days: 30,
            class_sample_limit: 50,
            summary_recommendations: 5,
        }
    }
}

impl AnalyticsConfig {
    pub fn estimator(&self) -> AbilityEstimator {
        AbilityEstimator::new(self.item_defaults)
    }

    pub fn aggregator(&self) -> CompetencyAggregator {
        CompetencyAggregator {
            min_attempts: self.min_attempts,
            velocity_decay: self.velocity_decay,
            efficiency_cap: self.efficiency_cap,
            estimator: self.estimator(),
        }
    }

    pub fn recommender(&self) -> TopicRecommender {
        TopicRecommender {
            recency_cap_days: self.recency_cap_days,
            never_attempted_days: self.never_attempted_days,
            ..TopicRecommender::default()
        }
    }

    pub fn selector(&self) -> AdaptiveSelector {
        AdaptiveSelector {
            table: self.distribution,
            item: ItemParams {
                b: 0.0,
                ..self.item_defaults
            },
            ..AdaptiveSelector::default()
        }
    }

    /// Training options for one run. `allow_synthetic` overrides the
    /// configured flag when given.
    pub fn training_options(&self, force_retrain: bool, allow_synthetic: Option<bool>) -> TrainingOptions {
        TrainingOptions {
            model_path: self.risk_model_path.clone(),
            force_retrain,
            allow_synthetic_data: allow_synthetic.unwrap_or(self.allow_synthetic_data),
            min_real_samples: self.min_real_samples,
            synthetic_samples: self.synthetic_samples,
            seed: self.training_seed,
            ..TrainingOptions::default()
        }
    }
}

/// The engine's view of the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub attempts: Arc<dyn AttemptSource>,
    pub engagement: Arc<dyn EngagementSource>,
    pub roster: Arc<dyn RosterSource>,
    pub store: Arc<dyn AnalyticsStore>,
    pub training: Arc<dyn TrainingDataSource>,
}

impl Collaborators {
    /// Use one backend for every seam.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: AttemptSource
            + EngagementSource
            + RosterSource
            + AnalyticsStore
            + TrainingDataSource
            + 'static,
    {
        Self {
            attempts: backend.clone(),
            engagement: backend.clone(),
            roster: backend.clone(),
            store: backend.clone(),
            training: backend,
        }
    }
}

/// The analytics engine.
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    graph: TopicGraph,
    cache: Arc<AnalyticsCache>,
    collaborators: Collaborators,
    classifier: RwLock<Option<RiskClassifier>>,
}

impl AnalyticsEngine {
    pub fn new(
        config: AnalyticsConfig,
        graph: TopicGraph,
        cache: Arc<AnalyticsCache>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            graph,
            cache,
            collaborators,
            classifier: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn graph(&self) -> &TopicGraph {
        &self.graph
    }

    // -----------------------------------------------------------------------
    // Competency and recommendations
    // -----------------------------------------------------------------------

    /// Analyse a student's competency and persist a successful result.
    pub async fn analyze_competency(
        &self,
        student_id: &str,
        topic_filter: Option<&str>,
    ) -> Result<CompetencyReport> {
        let history = self.collaborators.attempts.quiz_history(student_id).await?;
        let report = self.competency_for(student_id, &history, topic_filter);

        if report.status == AnalysisStatus::Success {
            if let Err(e) = self
                .collaborators
                .store
                .store_competency(student_id, &report)
                .await
            {
                warn!("failed to store competency for {student_id}: {e:#}");
            }
        }
        Ok(report)
    }

    /// Ranked topics to study next.
    pub async fn recommend_topics(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationReport> {
        request.validate()?;
        let history = self
            .collaborators
            .attempts
            .quiz_history(&request.student_id)
            .await?;
        Ok(self.recommend_from(&request.student_id, &history, request.num_recommendations))
    }

    fn recommend_from(&self, student_id: &str, history: &[QuizAttempt], limit: usize) -> RecommendationReport {
        if history.is_empty() {
            debug!("no history for {student_id}; using cold-start recommendations");
            return cold_start(student_id, limit);
        }
        let competency = self.competency_for(student_id, history, None);
        let mut recommendations = self.config.recommender().rank(&competency, &self.graph, Utc::now());
        recommendations.truncate(limit);
        RecommendationReport {
            student_id: student_id.to_string(),
            recommendations,
            status: RecommendationStatus::Success,
        }
    }

    fn competency_for(
        &self,
        student_id: &str,
        history: &[QuizAttempt],
        topic_filter: Option<&str>,
    ) -> CompetencyReport {
        let params = self.item_params(history);
        self.config
            .aggregator()
            .analyze(student_id, history, topic_filter, &params)
    }

    /// Calibrated parameters from the difficulty cache for the question ids
    /// present in `history`.
    fn item_params(&self, history: &[QuizAttempt]) -> HashMap<String, ItemParams> {
        history
            .iter()
            .filter_map(|a| a.question_id.as_deref())
            .filter_map(|id| {
                self.cache
                    .difficulty
                    .get(id)
                    .map(|p| (id.to_string(), p.item()))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Items and quizzes
    // -----------------------------------------------------------------------

    /// Build an adaptive quiz from the student's ability on the topic.
    pub async fn select_adaptive_quiz(&self, request: &AdaptiveQuizRequest) -> Result<AdaptiveQuiz> {
        request.validate()?;
        let history = self
            .collaborators
            .attempts
            .quiz_history(&request.student_id)
            .await?;
        let observations = topic_observations(&history, &request.topic_id);
        let theta = self
            .config
            .estimator()
            .estimate_raw(&observations, &self.item_params(&history));
        Ok(self.config.selector().select(request, theta))
    }

    /// Calibrate a question, cache the parameters for ability estimation and
    /// hand them to the persistence hook.
    pub async fn calibrate_difficulty(
        &self,
        question_id: &str,
        responses: &[ItemResponse],
    ) -> Result<DifficultyParams> {
        let params = calibrate(question_id, responses, self.config.item_defaults.c)?;
        self.cache.difficulty.set(question_id, params.clone());
        if let Err(e) = self.collaborators.store.store_difficulty(&params).await {
            warn!("failed to store difficulty for {question_id}: {e:#}");
        }
        Ok(params)
    }

    // -----------------------------------------------------------------------
    // Risk
    // -----------------------------------------------------------------------

    /// Classify risk for explicit features. Only invalid features fail.
    pub fn predict_risk(&self, features: &RiskFeatures) -> Result<RiskPrediction> {
        features.validate()?;
        Ok(self.classifier().predict(features))
    }

    /// Classify risk from the features the engagement source holds.
    pub async fn predict_student_risk(&self, student_id: &str) -> Result<Option<RiskPrediction>> {
        match self.collaborators.engagement.risk_features(student_id).await? {
            Some(features) => self.predict_risk(&features).map(Some),
            None => Ok(None),
        }
    }

    fn classifier(&self) -> RiskClassifier {
        if let Some(classifier) = self.classifier.read().as_ref() {
            return classifier.clone();
        }
        let loaded = RiskClassifier::load_or_rules(&self.config.risk_model_path);
        *self.classifier.write() = Some(loaded.clone());
        loaded
    }

    /// Train and persist the risk model, then drop the loaded classifier so
    /// the next prediction picks up the new artifact.
    pub async fn train_risk_model(
        &self,
        force_retrain: bool,
        allow_synthetic: Option<bool>,
    ) -> Result<TrainingReport> {
        let samples = self.collaborators.training.labelled_samples().await?;
        let options = self.config.training_options(force_retrain, allow_synthetic);
        info!("training risk model from {} labelled samples", samples.len());

        let report = tokio::task::spawn_blocking(move || train(samples, &options)).await??;
        *self.classifier.write() = None;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    /// Dashboard summary for one student, cached per student.
    pub async fn student_summary(&self, student_id: &str) -> Result<StudentSummary> {
        let key = format!("summary_{student_id}");
        if let Some(summary) = self.cache.summary.get(&key) {
            debug!("summary cache hit for {student_id}");
            return Ok(summary);
        }

        let history = self.collaborators.attempts.quiz_history(student_id).await?;
        let competency = self.competency_for(student_id, &history, None);
        let recommendations: Vec<TopicRecommendation> = self
            .recommend_from(student_id, &history, self.config.summary_recommendations)
            .recommendations;

        let engagement = match self
            .collaborators
            .engagement
            .activity(student_id, self.config.activity_window_days)
            .await
        {
            Ok(events) => aggregate_engagement(&events),
            Err(e) => {
                warn!("activity unavailable for {student_id}: {e:#}");
                EngagementMetrics::default()
            }
        };

        let risk = match self.predict_student_risk(student_id).await {
            Ok(risk) => risk,
            Err(e) => {
                warn!("risk assessment unavailable for {student_id}: {e:#}");
                None
            }
        };

        let summary = StudentSummary::from_parts(
            &competency,
            &recommendations,
            predict_next_score(&history),
            engagement,
            risk,
            Utc::now(),
        );
        self.cache.summary.set(key, summary.clone());
        Ok(summary)
    }

    /// Aggregated insights for a teacher's class, cached per class.
    pub async fn class_insights(&self, teacher_id: &str, class_id: &str) -> Result<ClassInsights> {
        let key = format!("class_{teacher_id}_{class_id}");
        if let Some(insights) = self.cache.class_stats.get(&key) {
            debug!("class cache hit for {teacher_id}/{class_id}");
            return Ok(insights);
        }

        let roster = self
            .collaborators
            .roster
            .class_roster(teacher_id, class_id)
            .await?;

        let mut pending: FuturesUnordered<_> = roster
            .iter()
            .take(self.config.class_sample_limit)
            .enumerate()
            .map(|(i, id)| async move { (i, id, self.student_summary(id).await) })
            .collect();

        let mut summaries = Vec::new();
        while let Some((i, id, result)) = pending.next().await {
            match result {
                Ok(summary) => summaries.push((i, summary)),
                Err(e) => warn!("skipping {id} in class insights: {e:#}"),
            }
        }
        summaries.sort_by_key(|(i, _)| *i);
        let summaries: Vec<StudentSummary> = summaries.into_iter().map(|(_, s)| s).collect();

        let insights =
            ClassInsights::from_summaries(teacher_id, class_id, roster.len(), &summaries, Utc::now());
        self.cache.class_stats.set(key, insights.clone());
        Ok(insights)
    }

    /// Clear every cache namespace and the loaded risk classifier.
    pub fn refresh_caches(&self) -> RefreshReport {
        *self.classifier.write() = None;
        self.cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};

    use crate::engagement::ActivityEvent;
    use crate::model::DifficultyLabel;
    use crate::report::{ClassStatus, SummaryStatus};
    use crate::risk::{LabelledSample, ModelUsed, TrainingStatus};

    #[derive(Default)]
    struct Fixture {
        history: HashMap<String, Vec<QuizAttempt>>,
        features: HashMap<String, RiskFeatures>,
        roster: Vec<String>,
        fail_store: bool,
        history_calls: AtomicUsize,
        stored: AtomicUsize,
    }

    #[async_trait]
    impl AttemptSource for Fixture {
        async fn quiz_history(&self, student_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.history.get(student_id).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl EngagementSource for Fixture {
        async fn activity(&self, _: &str, _: u32) -> anyhow::Result<Vec<ActivityEvent>> {
            Ok(vec![ActivityEvent {
                student_id: None,
                timestamp: Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap(),
                activity_type: "quiz".into(),
                xp_earned: 10.0,
            }])
        }

        async fn risk_features(&self, student_id: &str) -> anyhow::Result<Option<RiskFeatures>> {
            Ok(self.features.get(student_id).cloned())
        }
    }

    #[async_trait]
    impl RosterSource for Fixture {
        async fn class_roster(&self, _: &str, _: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.roster.clone())
        }
    }

    #[async_trait]
    impl AnalyticsStore for Fixture {
        async fn store_competency(&self, _: &str, _: &CompetencyReport) -> anyhow::Result<()> {
            self.stored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn store_difficulty(&self, _: &DifficultyParams) -> anyhow::Result<()> {
            if self.fail_store {
                anyhow::bail!("database offline");
            }
            self.stored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl TrainingDataSource for Fixture {
        async fn labelled_samples(&self) -> anyhow::Result<Vec<LabelledSample>> {
            Ok(Vec::new())
        }
    }

    fn attempt(student: &str, topic: &str, pct: f64, days_ago: i64) -> QuizAttempt {
        QuizAttempt {
            student_id: student.into(),
            topic_id: topic.into(),
            question_id: None,
            score: pct,
            total: 100.0,
            correct: None,
            attempts_count: 1,
            time_spent_seconds: Some(60.0),
            timestamp: Some(Utc::now() - ChronoDuration::days(days_ago)),
        }
    }

    fn features(quiz: f64) -> RiskFeatures {
        RiskFeatures {
            engagement_score: 80.0,
            avg_quiz_score: quiz,
            attendance: 90.0,
            assignment_completion: 85.0,
            streak: 3,
            xp_growth_rate: 0.0,
            time_on_platform: 4.0,
            engagement_trend_7d: None,
            quiz_score_variance: None,
            consecutive_absences: 0,
            days_since_last_activity: 1,
        }
    }

    fn fixture() -> Fixture {
        let mut f = Fixture::default();
        f.history.insert(
            "s1".into(),
            vec![
                attempt("s1", "Linear Equations", 40.0, 10),
                attempt("s1", "Linear Equations", 60.0, 5),
                attempt("s1", "Integers", 90.0, 3),
                attempt("s1", "Integers", 95.0, 1),
            ],
        );
        f.history.insert(
            "s2".into(),
            vec![
                attempt("s2", "Fractions & Decimals", 20.0, 4),
                attempt("s2", "Fractions & Decimals", 10.0, 2),
                attempt("s2", "Integers", 30.0, 1),
            ],
        );
        f.features.insert("s1".into(), features(75.0));
        f.roster = vec!["s1".into(), "s2".into(), "ghost".into()];
        f
    }

    fn engine_with(fixture: Fixture, config: AnalyticsConfig) -> (AnalyticsEngine, Arc<Fixture>) {
        let backend = Arc::new(fixture);
        let engine = AnalyticsEngine::new(
            config,
            TopicGraph::mathematics(),
            Arc::new(AnalyticsCache::default()),
            Collaborators::from_backend(backend.clone()),
        );
        (engine, backend)
    }

    fn engine() -> (AnalyticsEngine, Arc<Fixture>) {
        engine_with(fixture(), AnalyticsConfig::default())
    }

    #[tokio::test]
    async fn competency_is_persisted_on_success() {
        let (engine, backend) = engine();
        let report = engine.analyze_competency("s1", None).await.unwrap();
        assert_eq!(report.status, AnalysisStatus::Success);
        assert_eq!(report.analyses.len(), 2);
        assert_eq!(backend.stored.load(Ordering::SeqCst), 1);

        let empty = engine.analyze_competency("nobody", None).await.unwrap();
        assert_eq!(empty.status, AnalysisStatus::InsufficientData);
        assert_eq!(backend.stored.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recommendations_truncate_and_cold_start() {
        let (engine, _) = engine();
        let mut request = RecommendationRequest::new("s1");
        request.num_recommendations = 3;
        let report = engine.recommend_topics(&request).await.unwrap();
        assert_eq!(report.status, RecommendationStatus::Success);
        assert_eq!(report.recommendations.len(), 3);

        let cold = engine
            .recommend_topics(&RecommendationRequest::new("new-student"))
            .await
            .unwrap();
        assert_eq!(cold.status, RecommendationStatus::ColdStart);
        assert_eq!(cold.recommendations[0].topic_id, "Variables & Expressions");

        request.num_recommendations = 0;
        assert!(engine.recommend_topics(&request).await.is_err());
    }

    #[tokio::test]
    async fn adaptive_quiz_uses_topic_history() {
        let (engine, _) = engine();
        let request = AdaptiveQuizRequest::new("s1", "Integers");
        let quiz = engine.select_adaptive_quiz(&request).await.unwrap();
        assert_eq!(quiz.selected_questions.len(), 10);
        assert!(quiz.student_ability_estimate > 0.0);
        assert_eq!(quiz.selected_questions[0].question_id, "Integers_q1");
    }

    #[tokio::test]
    async fn calibration_is_cached_even_when_store_fails() {
        let (engine, _) = engine_with(
            Fixture {
                fail_store: true,
                ..fixture()
            },
            AnalyticsConfig::default(),
        );
        let responses: Vec<ItemResponse> = (0..10)
            .map(|_| ItemResponse {
                student_id: None,
                correct: true,
                time_spent: 30.0,
            })
            .collect();
        let params = engine.calibrate_difficulty("q-easy", &responses).await.unwrap();
        assert_eq!(params.difficulty_label, DifficultyLabel::Easy);
        assert!(engine.cache.difficulty.get("q-easy").is_some());

        assert!(engine.calibrate_difficulty("q-none", &[]).await.is_err());
    }

    #[tokio::test]
    async fn risk_without_artifact_uses_rules() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyticsConfig {
            risk_model_path: dir.path().join("missing.json"),
            ..AnalyticsConfig::default()
        };
        let (engine, _) = engine_with(fixture(), config);
        let prediction = engine.predict_risk(&features(75.0)).unwrap();
        assert_eq!(prediction.model_used, ModelUsed::RuleBased);
        assert!(engine.predict_risk(&features(140.0)).is_err());
        assert!(engine.predict_student_risk("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn training_switches_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyticsConfig {
            risk_model_path: dir.path().join("risk.json"),
            ..AnalyticsConfig::default()
        };
        let (engine, _) = engine_with(fixture(), config);
        assert_eq!(
            engine.predict_risk(&features(75.0)).unwrap().model_used,
            ModelUsed::RuleBased
        );

        assert!(engine.train_risk_model(false, None).await.is_err());
        let report = engine.train_risk_model(false, Some(true)).await.unwrap();
        assert_eq!(report.status, TrainingStatus::Trained);
        assert_eq!(
            engine.predict_risk(&features(75.0)).unwrap().model_used,
            ModelUsed::MlModel
        );

        let again = engine.train_risk_model(false, Some(true)).await.unwrap();
        assert_eq!(again.status, TrainingStatus::ModelExists);
    }

    #[tokio::test]
    async fn summary_is_cached() {
        let (engine, backend) = engine();
        let summary = engine.student_summary("s1").await.unwrap();
        assert_eq!(summary.status, SummaryStatus::Success);
        assert_eq!(summary.recommended_topics.len(), 5);
        assert!(summary.risk_assessment.is_some());
        assert_eq!(summary.engagement_patterns.total_activities, 1);
        assert!(summary.predicted_next_score.is_some());

        let calls = backend.history_calls.load(Ordering::SeqCst);
        engine.student_summary("s1").await.unwrap();
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), calls);

        engine.refresh_caches();
        engine.student_summary("s1").await.unwrap();
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn class_insights_over_roster() {
        let (engine, _) = engine();
        let insights = engine.class_insights("t1", "c1").await.unwrap();
        assert_eq!(insights.status, ClassStatus::Success);
        assert_eq!(insights.total_students, 3);
        assert_eq!(insights.risk_distribution.low, 1);
        assert_eq!(insights.hourly_engagement[&9], 3);
        assert!(insights
            .interventions_needed
            .iter()
            .any(|f| f.student_id == "s2"));
    }

    #[tokio::test]
    async fn empty_class() {
        let (engine, _) = engine_with(
            Fixture {
                roster: Vec::new(),
                ..fixture()
            },
            AnalyticsConfig::default(),
        );
        let insights = engine.class_insights("t1", "empty").await.unwrap();
        assert_eq!(insights.status, ClassStatus::NoStudents);
    }

    #[test]
    fn refresh_reports_zero_items() {
        let (engine, _) = engine();
        let report = engine.refresh_caches();
        assert_eq!(report.status, "caches_cleared");
        assert_eq!(report.cached_items, 0);
    }
}
