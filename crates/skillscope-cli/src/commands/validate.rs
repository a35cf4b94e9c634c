//! The `skillscope validate` command.

use std::path::PathBuf;

use anyhow::Result;

use skillscope_core::parser::{parse_topic_graph, validate_topic_graph};

pub fn execute(graph_path: PathBuf) -> Result<()> {
    let graph = parse_topic_graph(&graph_path)?;
    println!(
        "Topic graph: {} ({} topics)",
        graph_path.display(),
        graph.len()
    );

    let warnings = validate_topic_graph(&graph);
    for w in &warnings {
        let prefix = w
            .topic
            .as_ref()
            .map(|topic| format!("  [{topic}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Topic graph valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
