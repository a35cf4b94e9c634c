//! HTML report generator.
//!
//! Produces self-contained HTML files with all CSS/JS inlined, one for a
//! student summary and one for class insights.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use skillscope_core::model::CompetencyLevel;
use skillscope_core::report::{ClassInsights, ClassStatus, StudentSummary, VELOCITY_THRESHOLD};
use skillscope_core::risk::{ModelUsed, RiskLevel, RiskPrediction};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report for one student.
pub fn generate_summary_html(summary: &StudentSummary) -> String {
    let mut html = String::new();
    open_document(
        &mut html,
        &format!("skillscope summary: {}", summary.student_id),
    );

    html.push_str("<header>\n");
    html.push_str(&format!(
        "<h1>Student {}</h1>\n",
        html_escape(&summary.student_id)
    ));
    html.push_str(&format!(
        "<p class=\"meta\">Overall: <strong>{}</strong> | theta {} | {} topics | {}</p>\n",
        summary
            .overall_competency
            .map(|c| c.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        summary
            .theta_estimate
            .map(|t| format!("{t:.3}"))
            .unwrap_or_else(|| "n/a".to_string()),
        summary.learning_velocity_trend.len(),
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if summary.learning_velocity_trend.is_empty() {
        html.push_str("<p class=\"meta\">Limited data: fewer attempts than needed for a full analysis.</p>\n");
    }
    html.push_str("</header>\n");

    // Competency distribution
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Competency</h2>\n");
    let bars: Vec<(String, f64)> = CompetencyLevel::ALL
        .iter()
        .map(|level| {
            (
                level.to_string(),
                summary.competency_distribution.get(*level) as f64,
            )
        })
        .collect();
    html.push_str(&generate_bar_chart(&bars));
    if let Some(next) = summary.predicted_next_score {
        html.push_str(&format!(
            "<p>Predicted next quiz score: <strong>{next:.1}%</strong></p>\n"
        ));
    }
    html.push_str(&format!(
        "<p>Activity: {} events over {} active days ({:.2}/day), {} XP</p>\n",
        summary.engagement_patterns.total_activities,
        summary.engagement_patterns.active_days,
        summary.engagement_patterns.avg_activities_per_day,
        summary.engagement_patterns.total_xp
    ));
    html.push_str("</section>\n");

    // Per-topic tables
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Topics</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Topic</th><th onclick=\"sortTable(1)\">Efficiency</th><th onclick=\"sortTable(2)\">Velocity</th><th onclick=\"sortTable(3)\">Accuracy</th><th onclick=\"sortTable(4)\">Attempts</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for row in &summary.learning_velocity_trend {
        let efficiency = summary
            .efficiency_scores
            .get(&row.topic)
            .copied()
            .unwrap_or(0.0);
        let class = velocity_class(row.velocity);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.1}</td><td class=\"{}\">{:+.3}</td><td>{:.1}%</td><td>{}</td></tr>\n",
            html_escape(&row.topic),
            efficiency,
            class,
            row.velocity,
            row.accuracy,
            row.attempts
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Recommendations
    html.push_str("<section class=\"recommendations\">\n");
    html.push_str("<h2>Recommended next</h2>\n");
    if summary.recommended_topics.is_empty() {
        html.push_str("<p class=\"meta\">No recommendations.</p>\n");
    } else {
        html.push_str("<ol>\n");
        for rec in &summary.recommended_topics {
            html.push_str(&format!(
                "<li><strong>{}</strong> ({:.1}){} <span class=\"meta\">{}</span></li>\n",
                html_escape(&rec.topic_name),
                rec.score,
                if rec.prerequisites_met {
                    ""
                } else {
                    " <em>prerequisites pending</em>"
                },
                html_escape(&rec.reasoning)
            ));
        }
        html.push_str("</ol>\n");
    }
    html.push_str("</section>\n");

    if let Some(risk) = &summary.risk_assessment {
        html.push_str(&risk_block(risk));
    }

    close_document(&mut html, summary);
    html
}

/// Generate an HTML report for a class.
pub fn generate_class_html(insights: &ClassInsights) -> String {
    let mut html = String::new();
    open_document(
        &mut html,
        &format!(
            "skillscope class: {} / {}",
            insights.teacher_id, insights.class_id
        ),
    );

    html.push_str("<header>\n");
    html.push_str(&format!(
        "<h1>Class {}</h1>\n",
        html_escape(&insights.class_id)
    ));
    html.push_str(&format!(
        "<p class=\"meta\">Teacher: <strong>{}</strong> | {} students | {}</p>\n",
        html_escape(&insights.teacher_id),
        insights.total_students,
        insights.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    if insights.status == ClassStatus::NoStudents {
        html.push_str("<p>No students enrolled in this class.</p>\n");
        close_document(&mut html, insights);
        return html;
    }

    // Risk
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Risk distribution</h2>\n");
    let bars: Vec<(String, f64)> = RiskLevel::ALL
        .iter()
        .map(|level| {
            (
                level.to_string(),
                insights.risk_distribution.get(*level) as f64,
            )
        })
        .collect();
    html.push_str(&generate_bar_chart(&bars));
    let velocity = &insights.velocity_distribution;
    html.push_str(&format!(
        "<p>Learning velocity: mean {:+.3}, median {:+.3} | {} improving, {} declining, {} plateaued</p>\n",
        velocity.mean, velocity.median, velocity.improving, velocity.declining, velocity.plateaued
    ));
    let predictions = &insights.success_predictions;
    html.push_str(&format!(
        "<p>Likely to struggle: <strong>{}</strong>{}</p>\n",
        predictions.students_likely_to_struggle,
        predictions
            .average_predicted_score
            .map(|s| format!(" | average predicted score {s:.1}%"))
            .unwrap_or_default()
    ));
    html.push_str("</section>\n");

    // Weak topics
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Common weak topics</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Topic</th><th onclick=\"sortTable(1)\">Students</th><th onclick=\"sortTable(2)\">% of class</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for topic in &insights.common_weak_topics {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
            html_escape(&topic.topic),
            topic.student_count,
            topic.percentage_of_class
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Interventions
    html.push_str("<section class=\"interventions\">\n");
    html.push_str("<h2>Interventions needed</h2>\n");
    html.push_str("<table>\n");
    html.push_str("<thead><tr><th>Student</th><th>Reasons</th><th>Action</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for flag in &insights.interventions_needed {
        html.push_str(&format!(
            "<tr class=\"fail\"><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&flag.student_id),
            html_escape(&flag.reasons.join("; ")),
            html_escape(&flag.recommended_action)
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Engagement by hour
    if !insights.hourly_engagement.is_empty() {
        html.push_str("<section class=\"engagement\">\n");
        html.push_str("<h2>Activity by hour (UTC)</h2>\n");
        let hours: Vec<(String, f64)> = insights
            .hourly_engagement
            .iter()
            .map(|(hour, count)| (format!("{hour:02}:00"), *count as f64))
            .collect();
        html.push_str(&generate_bar_chart(&hours));
        html.push_str("</section>\n");
    }

    close_document(&mut html, insights);
    html
}

/// Write a student summary report to a file.
pub fn write_summary_html(summary: &StudentSummary, path: &Path) -> Result<()> {
    write_file(&generate_summary_html(summary), path)
}

/// Write a class insights report to a file.
pub fn write_class_html(insights: &ClassInsights, path: &Path) -> Result<()> {
    write_file(&generate_class_html(insights), path)
}

fn write_file(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn open_document(html: &mut String, title: &str) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
}

fn close_document<T: Serialize>(html: &mut String, data: &T) {
    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(data)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
}

fn risk_block(risk: &RiskPrediction) -> String {
    let class = match risk.risk_level {
        RiskLevel::High => "fail",
        RiskLevel::Medium => "warn",
        RiskLevel::Low => "pass",
    };
    let mut out = String::new();
    out.push_str("<section class=\"risk\">\n");
    out.push_str("<h2>Risk assessment</h2>\n");
    out.push_str(&format!(
        "<p class=\"{}\">Risk level: <strong>{}</strong> ({:.0}% confidence, {})</p>\n",
        class,
        risk.risk_level,
        risk.confidence * 100.0,
        match risk.model_used {
            ModelUsed::MlModel => "trained model",
            ModelUsed::RuleBased => "rule based",
        }
    ));
    if !risk.contributing_factors.is_empty() {
        out.push_str("<ul>\n");
        for factor in &risk.contributing_factors {
            out.push_str(&format!("<li>{}</li>\n", html_escape(&factor.detail)));
        }
        out.push_str("</ul>\n");
    }
    if !risk.recommendations.is_empty() {
        out.push_str("<h3>Suggested actions</h3>\n<ul>\n");
        for text in &risk.recommendations {
            out.push_str(&format!("<li>{}</li>\n", html_escape(text)));
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</section>\n");
    out
}

fn velocity_class(velocity: f64) -> &'static str {
    if velocity > VELOCITY_THRESHOLD {
        "pass"
    } else if velocity < -VELOCITY_THRESHOLD {
        "fail"
    } else {
        "warn"
    }
}

/// Horizontal bars scaled to the largest value.
fn generate_bar_chart(bars: &[(String, f64)]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 160;

    let max_value = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let total_height = bars.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (label, value)) in bars.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let share = if max_value > 0.0 {
            value / max_value
        } else {
            0.0
        };
        let width = (share * max_width as f64) as usize;

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(label)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#3b82f6\" rx=\"4\"/>\n",
            label_width, y, width, bar_height
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            value
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --warn: #fef9c3; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --warn: #713f12; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.warn { background: var(--warn); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    if (!isNaN(na) && !isNaN(nb)) return asc ? na - nb : nb - na;
    return asc ? va.localeCompare(vb) : vb.localeCompare(va);
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
