//! The `skillscope risk` and `skillscope train` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use skillscope_core::risk::{
    ModelUsed, RiskFeatures, RiskLevel, RiskPrediction, TrainingReport, TrainingStatus,
};

use super::{print_json, Session};

pub async fn predict(
    config_path: Option<PathBuf>,
    student: Option<String>,
    features_path: Option<PathBuf>,
) -> Result<()> {
    let session = Session::open(config_path.as_deref())?;

    let prediction = match (student, features_path) {
        (_, Some(path)) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read features: {}", path.display()))?;
            let features: RiskFeatures = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse features: {}", path.display()))?;
            session.engine.predict_risk(&features)?
        }
        (Some(student), None) => session
            .engine
            .predict_student_risk(&student)
            .await?
            .with_context(|| format!("no risk features recorded for {student}"))?,
        (None, None) => anyhow::bail!("either --student or --features is required"),
    };

    print_prediction(&prediction);
    Ok(())
}

fn print_prediction(prediction: &RiskPrediction) {
    let source = match prediction.model_used {
        ModelUsed::MlModel => "trained model",
        ModelUsed::RuleBased => "rule-based",
    };
    println!(
        "Risk level: {} ({:.1}% confidence, {source})",
        prediction.risk_level,
        prediction.confidence * 100.0
    );

    let mut table = Table::new();
    table.set_header(vec!["Level", "Probability"]);
    for level in RiskLevel::ALL {
        table.add_row(vec![
            Cell::new(level),
            Cell::new(format!("{:.4}", prediction.probabilities.get(level))),
        ]);
    }
    println!("{table}");

    if !prediction.contributing_factors.is_empty() {
        println!("\nContributing factors:");
        for factor in &prediction.contributing_factors {
            println!("  {}", factor.detail);
        }
    }
    if !prediction.recommendations.is_empty() {
        println!("\nRecommendations:");
        for text in &prediction.recommendations {
            println!("  - {text}");
        }
    }
}

pub async fn train(config_path: Option<PathBuf>, force: bool, allow_synthetic: bool) -> Result<()> {
    let session = Session::open(config_path.as_deref())?;
    // Only override the configured flag when asked on the command line.
    let allow_synthetic = allow_synthetic.then_some(true);
    let report = session
        .engine
        .train_risk_model(force, allow_synthetic)
        .await?;

    print_training(&report);
    print_json(&report)
}

fn print_training(report: &TrainingReport) {
    match report.status {
        TrainingStatus::ModelExists => eprintln!(
            "Model already exists at {} (use --force to retrain)",
            report.model_path.display()
        ),
        TrainingStatus::Trained => eprintln!(
            "Trained on {} samples ({} real, {} synthetic): accuracy {:.1}%, F1 {:.3}",
            report.samples_used,
            report.real_samples,
            report.synthetic_samples,
            report.accuracy * 100.0,
            report.f1_score
        ),
    }
}
