//! Analytics error types.
//!
//! Too few attempts is not an error: it is reported as
//! [`AnalysisStatus::InsufficientData`](crate::model::AnalysisStatus) on the
//! result, since it is the normal state for a new student.

use thiserror::Error;

/// Errors that can occur while computing analytics.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A required input was empty or out of range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The trained risk classifier is missing, corrupt, or failed at inference.
    #[error("risk model unavailable: {0}")]
    ModelUnavailable(String),

    /// Feature attribution could not be computed for a prediction.
    #[error("explanation unavailable: {0}")]
    ExplainabilityUnavailable(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON artifact could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// Shorthand for a [`AnalyticsError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        AnalyticsError::Validation(message.into())
    }

    /// Returns `true` if the engine recovers from this error locally instead
    /// of surfacing it to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::ModelUnavailable(_) | AnalyticsError::ExplainabilityUnavailable(_)
        )
    }
}

/// Result alias used throughout the analytics core.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_are_recoverable() {
        assert!(AnalyticsError::ModelUnavailable("missing".into()).is_recoverable());
        assert!(AnalyticsError::ExplainabilityUnavailable("nan".into()).is_recoverable());
        assert!(!AnalyticsError::validation("empty").is_recoverable());
    }

    #[test]
    fn validation_message() {
        let err = AnalyticsError::validation("no student responses provided");
        assert_eq!(
            err.to_string(),
            "validation failed: no student responses provided"
        );
    }
}
