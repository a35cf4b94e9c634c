//! The `skillscope init` command.

use std::path::Path;

use anyhow::Result;

use skillscope_core::graph::TopicGraph;
use skillscope_core::parser::topic_graph_to_toml;

pub fn execute() -> Result<()> {
    // Create skillscope.toml
    if Path::new("skillscope.toml").exists() {
        println!("skillscope.toml already exists, skipping.");
    } else {
        std::fs::write("skillscope.toml", SAMPLE_CONFIG)?;
        println!("Created skillscope.toml");
    }

    // Starter topic graph: the built-in mathematics curriculum
    let graph_path = Path::new("topics.toml");
    if graph_path.exists() {
        println!("topics.toml already exists, skipping.");
    } else {
        let graph = topic_graph_to_toml(&TopicGraph::mathematics())?;
        std::fs::write(graph_path, format!("{GRAPH_HEADER}{graph}"))?;
        println!("Created topics.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: skillscope mock-data --seed 42");
    println!("  2. Run: skillscope validate --graph topics.toml");
    println!("  3. Run: skillscope summary --student mock_student_001 --format html");

    Ok(())
}

const GRAPH_HEADER: &str = "# Topic prerequisite graph. Each topic lists the topics to master first.\n\n";

const SAMPLE_CONFIG: &str = r#"# skillscope configuration

data_path = "skillscope-data.json"
risk_model_path = "models/risk_model.json"
topic_graph = "topics.toml"
output_dir = "./skillscope-reports"

[analytics]
min_attempts = 3
cache_ttl_secs = 3600
irt_a = 1.0
irt_b = 0.0
irt_c = 0.25
velocity_decay = 0.05
efficiency_cap = 150.0
recency_cap_days = 60
never_attempted_days = 30
min_real_samples = 50
synthetic_samples = 500
allow_synthetic_data = false
training_seed = 42
activity_window_days = 30
class_sample_limit = 50

# Share of easy / medium / hard questions in adaptive quizzes, per level
[analytics.distribution.beginner]
easy = 0.7
medium = 0.2
hard = 0.1
"#;
