#![forbid(unsafe_code)]

pub mod error;
pub mod feedback;
pub mod handoff;
pub mod model;
pub mod request;
pub mod time;

pub use error::Error;
pub use feedback::{FeedbackError, FeedbackEvent, FeedbackVote, SessionStatusReducer};
pub use handoff::HandoffError;
pub use request::{AssembleError, PlanRequest, PlanRequestAssembler};
pub use time::Clock;
