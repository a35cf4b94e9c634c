//! The `skillscope competency`, `recommend` and `quiz` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use skillscope_core::adaptive::AdaptiveQuizRequest;
use skillscope_core::model::{
    AdaptiveQuiz, AnalysisStatus, CompetencyReport, RecommendationReport, RecommendationStatus,
};
use skillscope_core::recommend::RecommendationRequest;

use super::{check_format, print_json, Session};

const FORMATS: &[&str] = &["table", "json"];

pub async fn competency(
    config_path: Option<PathBuf>,
    student: String,
    topic: Option<String>,
    format: String,
) -> Result<()> {
    check_format(&format, FORMATS)?;
    let session = Session::open(config_path.as_deref())?;
    let report = session
        .engine
        .analyze_competency(&student, topic.as_deref())
        .await?;

    if format == "json" {
        return print_json(&report);
    }
    print_competency(&report);
    Ok(())
}

fn print_competency(report: &CompetencyReport) {
    if report.status == AnalysisStatus::InsufficientData {
        println!(
            "Not enough quiz attempts to analyse {} yet.",
            report.student_id
        );
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Topic",
        "Level",
        "Efficiency",
        "Mastery %",
        "Velocity",
        "Attempts",
    ]);
    for a in &report.analyses {
        table.add_row(vec![
            Cell::new(&a.topic_name),
            Cell::new(a.competency_level),
            Cell::new(format!("{:.1}", a.efficiency_score)),
            Cell::new(format!("{:.1}", a.mastery_percentage)),
            Cell::new(format!("{:+.3}", a.learning_velocity)),
            Cell::new(a.total_attempts),
        ]);
    }
    println!("{table}");

    if let Some(overall) = report.overall_competency {
        println!("Overall: {overall}");
    }
    if let Some(theta) = report.theta_estimate {
        println!("Ability (theta): {theta:.3}");
    }
}

pub async fn recommend(
    config_path: Option<PathBuf>,
    student: String,
    count: usize,
    format: String,
) -> Result<()> {
    check_format(&format, FORMATS)?;
    let session = Session::open(config_path.as_deref())?;
    let request = RecommendationRequest {
        student_id: student,
        num_recommendations: count,
    };
    let report = session.engine.recommend_topics(&request).await?;

    if format == "json" {
        return print_json(&report);
    }
    print_recommendations(&report);
    Ok(())
}

fn print_recommendations(report: &RecommendationReport) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Topic", "Score", "Current", "Hours", "Reasoning"]);
    for (i, r) in report.recommendations.iter().enumerate() {
        let topic = if r.prerequisites_met {
            r.topic_name.clone()
        } else {
            format!("{} (prerequisites pending)", r.topic_name)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(topic),
            Cell::new(format!("{:.1}", r.recommendation_score)),
            Cell::new(r.current_competency),
            Cell::new(r.estimated_time_to_mastery),
            Cell::new(&r.reasoning),
        ]);
    }
    println!("{table}");
    if report.status == RecommendationStatus::ColdStart {
        println!("No quiz history yet; showing starter topics.");
    }
}

pub async fn quiz(
    config_path: Option<PathBuf>,
    student: String,
    topic: String,
    questions: usize,
    target: f64,
    format: String,
) -> Result<()> {
    check_format(&format, FORMATS)?;
    let session = Session::open(config_path.as_deref())?;
    let request = AdaptiveQuizRequest {
        student_id: student,
        topic_id: topic,
        num_questions: questions,
        target_success_rate: target,
    };
    let quiz = session.engine.select_adaptive_quiz(&request).await?;

    if format == "json" {
        return print_json(&quiz);
    }
    print_quiz(&quiz);
    Ok(())
}

fn print_quiz(quiz: &AdaptiveQuiz) {
    println!(
        "Ability estimate: {:.3} | expected success {:.1}% (target {:.1}%)",
        quiz.student_ability_estimate,
        quiz.expected_success_rate * 100.0,
        quiz.target_success_rate * 100.0
    );

    let mut table = Table::new();
    table.set_header(vec!["Question", "Difficulty", "P(correct)", "Label"]);
    for q in &quiz.selected_questions {
        table.add_row(vec![
            Cell::new(&q.question_id),
            Cell::new(format!("{:+.3}", q.estimated_difficulty)),
            Cell::new(format!("{:.3}", q.predicted_success_probability)),
            Cell::new(q.difficulty_label),
        ]);
    }
    println!("{table}");

    let d = quiz.difficulty_distribution;
    println!("Mix: {} easy, {} medium, {} hard", d.easy, d.medium, d.hard);
}
