//! The `skillscope calibrate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use skillscope_core::model::ItemResponse;

use super::{print_json, Session};

pub async fn execute(
    config_path: Option<PathBuf>,
    question: String,
    responses_path: Option<PathBuf>,
) -> Result<()> {
    let session = Session::open(config_path.as_deref())?;

    let responses: Vec<ItemResponse> = match &responses_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read responses: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse responses: {}", path.display()))?
        }
        None => session
            .store
            .snapshot()
            .quiz_history
            .iter()
            .filter(|a| a.question_id.as_deref() == Some(question.as_str()))
            .map(|a| ItemResponse {
                student_id: Some(a.student_id.clone()),
                correct: a.is_correct(),
                time_spent: a.time_spent(),
            })
            .collect(),
    };
    eprintln!("Calibrating {question} from {} responses", responses.len());

    let params = session
        .engine
        .calibrate_difficulty(&question, &responses)
        .await?;
    print_json(&params)
}
