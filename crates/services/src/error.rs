//! Shared error types for the services crate.

use thiserror::Error;

use planner_core::model::MalformedPlanError;
use planner_core::{AssembleError, FeedbackError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failures talking to the plan service over HTTP.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("plan service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("plan service returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("plan service sent an unreadable response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors emitted by `PlannerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlannerError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("plan service reported an error: {message}")]
    Service { message: String },
    #[error(transparent)]
    MalformedPlan(#[from] MalformedPlanError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error("plan service did not accept the status update")]
    Rejected { message: Option<String> },
    #[error("could not reach the plan service")]
    Transport(#[source] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PlannerError {
    /// Text suitable for showing to the learner. Transport causes stay in
    /// `source()` for logging.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::Transport(_) => {
                "Failed to reach the study planner. Please try again.".to_owned()
            }
            PlannerError::Rejected { .. } => {
                "Your progress could not be saved. Please try again.".to_owned()
            }
            PlannerError::Service { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True when retrying the same call may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlannerError::Transport(_) | PlannerError::Rejected { .. } | PlannerError::Service { .. }
        )
    }
}

impl From<TransportError> for PlannerError {
    fn from(value: TransportError) -> Self {
        PlannerError::Transport(value)
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_errors_keep_their_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PlannerError::from(TransportError::from(cause));
        assert!(err.is_recoverable());
        assert_eq!(
            err.user_message(),
            "Failed to reach the study planner. Please try again."
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn data_integrity_errors_are_not_recoverable() {
        let err = PlannerError::from(AssembleError::EmptySubjectList);
        assert!(!err.is_recoverable());
        assert_eq!(err.user_message(), err.to_string());
    }
}
