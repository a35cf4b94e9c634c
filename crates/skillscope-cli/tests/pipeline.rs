//! End-to-end pipeline tests: mock dataset -> store -> engine -> reports.

use std::sync::Arc;
use std::time::Duration;

use skillscope_core::cache::AnalyticsCache;
use skillscope_core::engine::{AnalyticsConfig, AnalyticsEngine, Collaborators};
use skillscope_core::graph::TopicGraph;
use skillscope_core::model::{AnalysisStatus, ItemResponse};
use skillscope_core::report::{ClassStatus, SummaryStatus};
use skillscope_core::risk::{ModelUsed, TrainingStatus};
use skillscope_report::html::{generate_class_html, generate_summary_html};
use skillscope_store::{generate_mock_data, JsonFileStore, MockDataOptions};

fn make_engine(dir: &tempfile::TempDir, students: usize) -> (Arc<JsonFileStore>, AnalyticsEngine) {
    let dataset = generate_mock_data(&MockDataOptions {
        students,
        quizzes_per_student: 12,
        seed: Some(42),
        ..MockDataOptions::default()
    });
    let store = Arc::new(JsonFileStore::in_memory(dataset));
    let config = AnalyticsConfig {
        risk_model_path: dir.path().join("models").join("risk.json"),
        ..AnalyticsConfig::default()
    };
    let cache = Arc::new(AnalyticsCache::new(Duration::from_secs(60)));
    let engine = AnalyticsEngine::new(
        config,
        TopicGraph::mathematics(),
        cache,
        Collaborators::from_backend(store.clone()),
    );
    (store, engine)
}

#[tokio::test]
async fn competency_is_persisted_to_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = make_engine(&dir, 4);

    let report = engine
        .analyze_competency("mock_student_001", None)
        .await
        .unwrap();
    assert_eq!(report.status, AnalysisStatus::Success);
    assert!(report.theta_estimate.is_some());

    let snapshot = store.snapshot();
    assert_eq!(snapshot.competency.len(), 1);
    assert_eq!(snapshot.competency[0].student_id, "mock_student_001");
}

#[tokio::test]
async fn calibration_feeds_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = make_engine(&dir, 2);

    let responses: Vec<ItemResponse> = (0..12)
        .map(|i| ItemResponse {
            student_id: Some(format!("s{i}")),
            correct: i % 3 != 0,
            time_spent: 30.0 + i as f64 * 5.0,
        })
        .collect();
    let params = engine
        .calibrate_difficulty("q_integers_0", &responses)
        .await
        .unwrap();
    assert_eq!(params.total_responses, 12);
    assert_eq!(store.snapshot().difficulty[0].question_id, "q_integers_0");
}

#[tokio::test]
async fn summary_and_class_reports() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = make_engine(&dir, 8);

    let summary = engine.student_summary("mock_student_001").await.unwrap();
    assert_eq!(summary.status, SummaryStatus::Success);
    assert!(summary.recommended_topics.len() <= 5);
    let risk = summary.risk_assessment.as_ref().unwrap();
    assert_eq!(risk.model_used, ModelUsed::RuleBased);

    let insights = engine
        .class_insights("teacher_001", "class_a")
        .await
        .unwrap();
    assert_eq!(insights.status, ClassStatus::Success);
    assert_eq!(insights.total_students, 8);
    assert!(!insights.hourly_engagement.is_empty());

    let html = generate_class_html(&insights);
    assert!(html.contains("class_a"));
    let html = generate_summary_html(&summary);
    assert!(html.contains("mock_student_001"));
}

#[tokio::test]
async fn training_switches_predictions_to_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = make_engine(&dir, 6);

    let before = engine
        .predict_student_risk("mock_student_001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.model_used, ModelUsed::RuleBased);

    let report = engine.train_risk_model(false, Some(true)).await.unwrap();
    assert_eq!(report.status, TrainingStatus::Trained);
    assert_eq!(report.real_samples, 6);
    assert!(report.used_synthetic_data);
    assert!(report.model_path.exists());

    let after = engine
        .predict_student_risk("mock_student_001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.model_used, ModelUsed::MlModel);
    let total = after.probabilities.high + after.probabilities.medium + after.probabilities.low;
    assert!((total - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn refresh_clears_cached_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = make_engine(&dir, 2);

    let first = engine.student_summary("mock_student_002").await.unwrap();
    let cached = engine.student_summary("mock_student_002").await.unwrap();
    assert_eq!(first.generated_at, cached.generated_at);

    let refresh = engine.refresh_caches();
    assert_eq!(refresh.status, "caches_cleared");
    assert_eq!(refresh.cached_items, 0);

    let fresh = engine.student_summary("mock_student_002").await.unwrap();
    assert!(fresh.generated_at >= first.generated_at);
}
