//! The `skillscope summary` and `skillscope class` commands.

use std::path::PathBuf;

use anyhow::Result;

use skillscope_report::html::{write_class_html, write_summary_html};

use super::{check_format, print_json, Session};

const FORMATS: &[&str] = &["json", "html"];

pub async fn summary(
    config_path: Option<PathBuf>,
    student: String,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    check_format(&format, FORMATS)?;
    let session = Session::open(config_path.as_deref())?;
    let summary = session.engine.student_summary(&student).await?;

    match format.as_str() {
        "html" => {
            let path = session
                .output_dir(output)
                .join(format!("summary-{student}.html"));
            write_summary_html(&summary, &path)?;
            eprintln!("HTML report: {}", path.display());
        }
        _ => match output {
            Some(dir) => {
                let path = dir.join(format!("summary-{student}.json"));
                summary.save_json(&path)?;
                eprintln!("Summary saved to: {}", path.display());
            }
            None => print_json(&summary)?,
        },
    }
    Ok(())
}

pub async fn class(
    config_path: Option<PathBuf>,
    teacher: String,
    class: String,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    check_format(&format, FORMATS)?;
    let session = Session::open(config_path.as_deref())?;
    let insights = session.engine.class_insights(&teacher, &class).await?;

    match format.as_str() {
        "html" => {
            let path = session
                .output_dir(output)
                .join(format!("class-{teacher}-{class}.html"));
            write_class_html(&insights, &path)?;
            eprintln!("HTML report: {}", path.display());
        }
        _ => match output {
            Some(dir) => {
                let path = dir.join(format!("class-{teacher}-{class}.json"));
                insights.save_json(&path)?;
                eprintln!("Class insights saved to: {}", path.display());
            }
            None => print_json(&insights)?,
        },
    }
    Ok(())
}
