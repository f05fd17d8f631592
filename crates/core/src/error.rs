use thiserror::Error;

use crate::feedback::FeedbackError;
use crate::handoff::HandoffError;
use crate::model::{InputValidationError, MalformedPlanError};
use crate::request::AssembleError;

/// Umbrella error for callers that do not care which core step failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputValidationError),
    #[error(transparent)]
    MalformedPlan(#[from] MalformedPlanError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
}
