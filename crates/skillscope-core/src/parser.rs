//! TOML topic graph parser.
//!
//! Loads prerequisite graphs from TOML files and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::{TopicGraph, TopicNode};

/// Intermediate TOML structure for graph files.
#[derive(Debug, Deserialize)]
struct TomlGraphFile {
    #[serde(default)]
    topics: Vec<TomlTopic>,
}

#[derive(Debug, Deserialize)]
struct TomlTopic {
    name: String,
    #[serde(default)]
    prerequisites: Vec<String>,
}

/// Parse a single TOML file into a `TopicGraph`.
pub fn parse_topic_graph(path: &Path) -> Result<TopicGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read topic graph file: {}", path.display()))?;

    parse_topic_graph_str(&content, path)
}

/// Parse a TOML string into a `TopicGraph` (useful for testing).
pub fn parse_topic_graph_str(content: &str, source_path: &Path) -> Result<TopicGraph> {
    let parsed: TomlGraphFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let topics = parsed
        .topics
        .into_iter()
        .map(|t| TopicNode {
            name: t.name.trim().to_string(),
            prerequisites: t
                .prerequisites
                .into_iter()
                .map(|p| p.trim().to_string())
                .collect(),
        })
        .collect();

    Ok(TopicGraph::new(topics))
}

/// Render a graph back to the TOML layout `parse_topic_graph_str` reads.
pub fn topic_graph_to_toml(graph: &TopicGraph) -> Result<String> {
    toml::to_string_pretty(graph).context("failed to serialize topic graph")
}

/// A warning from topic graph validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The topic name (if applicable).
    pub topic: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a topic graph for common issues.
pub fn validate_topic_graph(graph: &TopicGraph) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if graph.is_empty() {
        warnings.push(ValidationWarning {
            topic: None,
            message: "graph declares no topics".into(),
        });
    }

    let mut seen = HashSet::new();
    for node in &graph.topics {
        if node.name.is_empty() {
            warnings.push(ValidationWarning {
                topic: None,
                message: "topic with empty name".into(),
            });
            continue;
        }
        if !seen.insert(node.name.as_str()) {
            warnings.push(ValidationWarning {
                topic: Some(node.name.clone()),
                message: format!("duplicate topic: {} (first declaration wins)", node.name),
            });
        }
        if node.prerequisites.iter().any(|p| p == &node.name) {
            warnings.push(ValidationWarning {
                topic: Some(node.name.clone()),
                message: "topic lists itself as a prerequisite".into(),
            });
        }
        let mut prereqs = HashSet::new();
        for prereq in &node.prerequisites {
            if prereq.is_empty() {
                warnings.push(ValidationWarning {
                    topic: Some(node.name.clone()),
                    message: "empty prerequisite name".into(),
                });
            } else if !prereqs.insert(prereq.as_str()) {
                warnings.push(ValidationWarning {
                    topic: Some(node.name.clone()),
                    message: format!("prerequisite {prereq} listed twice"),
                });
            }
        }
    }

    if let Some(cycle) = graph.find_cycle() {
        // Self-loops are already reported above.
        if cycle.len() > 2 {
            warnings.push(ValidationWarning {
                topic: cycle.first().cloned(),
                message: format!("prerequisite cycle: {}", cycle.join(" -> ")),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[[topics]]
name = "Quadratic Equations"
prerequisites = ["Linear Equations", "Variables & Expressions"]

[[topics]]
name = "Linear Equations"
prerequisites = ["Variables & Expressions"]

[[topics]]
name = "Variables & Expressions"
"#;

    #[test]
    fn parse_valid_toml() {
        let graph = parse_topic_graph_str(VALID_TOML, &PathBuf::from("graph.toml")).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(
            graph.prerequisites("Quadratic Equations"),
            &["Linear Equations".to_string(), "Variables & Expressions".to_string()]
        );
        assert!(graph.prerequisites("Variables & Expressions").is_empty());
        assert!(validate_topic_graph(&graph).is_empty());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_topic_graph_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn validate_duplicates_and_self_prerequisite() {
        let toml = r#"
[[topics]]
name = "Limits"
prerequisites = ["Limits", "Functions", "Functions"]

[[topics]]
name = "Limits"
"#;
        let graph = parse_topic_graph_str(toml, &PathBuf::from("graph.toml")).unwrap();
        let warnings = validate_topic_graph(&graph);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate topic")));
        assert!(warnings.iter().any(|w| w.message.contains("itself")));
        assert!(warnings.iter().any(|w| w.message.contains("listed twice")));
        assert!(!warnings.iter().any(|w| w.message.contains("cycle")));
    }

    #[test]
    fn validate_cycle() {
        let toml = r#"
[[topics]]
name = "A"
prerequisites = ["B"]

[[topics]]
name = "B"
prerequisites = ["A"]
"#;
        let graph = parse_topic_graph_str(toml, &PathBuf::from("graph.toml")).unwrap();
        let warnings = validate_topic_graph(&graph);
        assert!(warnings
            .iter()
            .any(|w| w.message == "prerequisite cycle: A -> B -> A"));
    }

    #[test]
    fn default_graph_round_trips_through_toml() {
        let graph = TopicGraph::mathematics();
        let text = topic_graph_to_toml(&graph).unwrap();
        let parsed = parse_topic_graph_str(&text, &PathBuf::from("default.toml")).unwrap();
        assert_eq!(parsed, graph);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.toml");
        std::fs::write(&path, VALID_TOML).unwrap();
        let graph = parse_topic_graph(&path).unwrap();
        assert_eq!(graph.len(), 3);
    }
}
