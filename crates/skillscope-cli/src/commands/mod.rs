//! Subcommand implementations.

pub mod calibrate;
pub mod init;
pub mod mock_data;
pub mod report;
pub mod risk;
pub mod student;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use skillscope_core::cache::AnalyticsCache;
use skillscope_core::engine::{AnalyticsEngine, Collaborators};
use skillscope_core::graph::TopicGraph;
use skillscope_core::parser::parse_topic_graph;
use skillscope_store::{load_config_from, JsonFileStore, SkillscopeConfig};

/// An engine wired to the configured dataset.
pub struct Session {
    pub config: SkillscopeConfig,
    pub store: Arc<JsonFileStore>,
    pub engine: AnalyticsEngine,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;
        let store = JsonFileStore::open(&config.data_path).with_context(|| {
            format!(
                "cannot open dataset {} (run `skillscope mock-data` to create one)",
                config.data_path.display()
            )
        })?;
        let store = Arc::new(store);

        let graph = match &config.topic_graph {
            Some(path) => parse_topic_graph(path)?,
            None => TopicGraph::mathematics(),
        };

        let analytics = config.analytics();
        let cache = Arc::new(AnalyticsCache::new(analytics.cache_ttl));
        let calibrated = store.snapshot().difficulty;
        debug!("priming {} calibrated questions", calibrated.len());
        for params in calibrated {
            cache.difficulty.set(params.question_id.clone(), params);
        }

        let engine = AnalyticsEngine::new(
            analytics,
            graph,
            cache,
            Collaborators::from_backend(store.clone()),
        );
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Where rendered reports go: the explicit directory or the configured one.
    pub fn output_dir(&self, output: Option<PathBuf>) -> PathBuf {
        output.unwrap_or_else(|| self.config.output_dir.clone())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Reject formats other than the ones a command supports.
pub fn check_format(format: &str, allowed: &[&str]) -> Result<()> {
    anyhow::ensure!(
        allowed.contains(&format),
        "unknown format '{format}' (expected one of: {})",
        allowed.join(", ")
    );
    Ok(())
}
