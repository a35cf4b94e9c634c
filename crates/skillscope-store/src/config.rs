//! skillscope configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use skillscope_core::adaptive::DistributionTable;
use skillscope_core::engine::AnalyticsConfig;
use skillscope_core::model::ItemParams;

/// Tunable analytics constants, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub min_attempts: usize,
    pub cache_ttl_secs: u64,
    /// Default discrimination for uncalibrated questions.
    pub irt_a: f64,
    pub irt_b: f64,
    /// Guessing probability.
    pub irt_c: f64,
    pub velocity_decay: f64,
    pub efficiency_cap: f64,
    pub recency_cap_days: i64,
    pub never_attempted_days: i64,
    pub min_real_samples: usize,
    pub synthetic_samples: usize,
    pub allow_synthetic_data: bool,
    pub training_seed: u64,
    pub activity_window_days: u32,
    pub class_sample_limit: usize,
    pub distribution: DistributionTable,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        let defaults = AnalyticsConfig::default();
        Self {
            min_attempts: defaults.min_attempts,
            cache_ttl_secs: defaults.cache_ttl.as_secs(),
            irt_a: defaults.item_defaults.a,
            irt_b: defaults.item_defaults.b,
            irt_c: defaults.item_defaults.c,
            velocity_decay: defaults.velocity_decay,
            efficiency_cap: defaults.efficiency_cap,
            recency_cap_days: defaults.recency_cap_days,
            never_attempted_days: defaults.never_attempted_days,
            min_real_samples: defaults.min_real_samples,
            synthetic_samples: defaults.synthetic_samples,
            allow_synthetic_data: defaults.allow_synthetic_data,
            training_seed: defaults.training_seed,
            activity_window_days: defaults.activity_window_days,
            class_sample_limit: defaults.class_sample_limit,
            distribution: defaults.distribution,
        }
    }
}

/// Top-level skillscope configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillscopeConfig {
    /// JSON dataset read by the file store.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Trained risk model artifact.
    #[serde(default = "default_risk_model_path")]
    pub risk_model_path: PathBuf,
    /// Topic prerequisite graph; the built-in mathematics graph when unset.
    #[serde(default)]
    pub topic_graph: Option<PathBuf>,
    /// Where rendered reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("skillscope-data.json")
}
fn default_risk_model_path() -> PathBuf {
    PathBuf::from("models/risk_model.json")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./skillscope-reports")
}

impl Default for SkillscopeConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            risk_model_path: default_risk_model_path(),
            topic_graph: None,
            output_dir: default_output_dir(),
            analytics: AnalyticsSettings::default(),
        }
    }
}

impl SkillscopeConfig {
    /// The engine configuration these settings describe.
    pub fn analytics(&self) -> AnalyticsConfig {
        let s = &self.analytics;
        AnalyticsConfig {
            min_attempts: s.min_attempts,
            cache_ttl: Duration::from_secs(s.cache_ttl_secs),
            item_defaults: ItemParams {
                a: s.irt_a,
                b: s.irt_b,
                c: s.irt_c,
            },
            velocity_decay: s.velocity_decay,
            efficiency_cap: s.efficiency_cap,
            recency_cap_days: s.recency_cap_days,
            never_attempted_days: s.never_attempted_days,
            distribution: s.distribution,
            risk_model_path: self.risk_model_path.clone(),
            min_real_samples: s.min_real_samples,
            synthetic_samples: s.synthetic_samples,
            allow_synthetic_data: s.allow_synthetic_data,
            training_seed: s.training_seed,
            activity_window_days: s.activity_window_days,
            class_sample_limit: s.class_sample_limit,
            ..AnalyticsConfig::default()
        }
    }

    fn resolve_env(&mut self) {
        self.data_path = resolve_path(&self.data_path);
        self.risk_model_path = resolve_path(&self.risk_model_path);
        self.output_dir = resolve_path(&self.output_dir);
        self.topic_graph = self.topic_graph.as_deref().map(resolve_path);
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `skillscope.toml` in the current directory
/// 2. `~/.config/skillscope/config.toml`
///
/// Environment variable overrides: `SKILLSCOPE_DATA`, `SKILLSCOPE_RISK_MODEL`.
pub fn load_config() -> Result<SkillscopeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SkillscopeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("skillscope.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<SkillscopeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SkillscopeConfig::default(),
    };

    if let Ok(data) = std::env::var("SKILLSCOPE_DATA") {
        config.data_path = PathBuf::from(data);
    }
    if let Ok(model) = std::env::var("SKILLSCOPE_RISK_MODEL") {
        config.risk_model_path = PathBuf::from(model);
    }

    config.resolve_env();
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("skillscope"))
}
