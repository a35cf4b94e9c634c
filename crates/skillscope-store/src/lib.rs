//! skillscope-store: collaborator implementations for skillscope.
//!
//! A JSON-dataset-backed store, an in-memory mock store for tests, a seeded
//! mock dataset generator, and TOML configuration loading.

pub mod config;
pub mod dataset;
pub mod error;
pub mod mock;
pub mod mockdata;

pub use config::{load_config, load_config_from, AnalyticsSettings, SkillscopeConfig};
pub use dataset::{Dataset, JsonFileStore, StudentRecord};
pub use error::StoreError;
pub use mock::MockStore;
pub use mockdata::{generate as generate_mock_data, MockDataOptions};
