//! Student analytics for skillscope: IRT ability estimation, competency
//! aggregation, topic recommendation, adaptive quizzes and risk
//! classification.
//!
//! The components are pure computations over already fetched inputs.
//! [`engine::AnalyticsEngine`] wires them to the collaborator traits in
//! [`traits`] and to the shared caches.

pub mod adaptive;
pub mod cache;
pub mod competency;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod graph;
pub mod irt;
pub mod model;
pub mod parser;
pub mod recommend;
pub mod report;
pub mod risk;
pub mod statistics;
pub mod traits;

pub use error::{AnalyticsError, Result};
