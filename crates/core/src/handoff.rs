//! JSON encoding used when a plan crosses a screen or process boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::plan::{parse_current_date, parse_slots};
use crate::model::{MalformedPlanError, PlanDocument, ProgressStats, SlotMap};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HandoffError {
    #[error("no plan data available")]
    Missing,

    #[error("failed to parse plan data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid plan data: {0}")]
    Malformed(#[from] MalformedPlanError),

    #[error("progress counters {carried:?} do not match the sessions {actual:?}")]
    CounterMismatch {
        carried: ProgressStats,
        actual: ProgressStats,
    },
}

#[derive(Serialize)]
struct Outgoing<'a> {
    current_date: String,
    plan: &'a SlotMap,
    progress_stats: ProgressStats,
    tips: &'a [String],
}

#[derive(Deserialize)]
struct Incoming {
    current_date: String,
    plan: Value,
    progress_stats: ProgressStats,
    tips: Vec<String>,
}

/// Serialize a document for handoff.
///
/// # Errors
///
/// Returns `HandoffError::Json` if serialization fails.
pub fn encode(document: &PlanDocument) -> Result<String, HandoffError> {
    let payload = Outgoing {
        current_date: document.current_date().format("%Y-%m-%d").to_string(),
        plan: document.plan(),
        progress_stats: document.progress(),
        tips: document.tips(),
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Parse a handed-off document, rejecting anything incomplete.
///
/// Sessions go through the same validation as a fresh generator response and
/// the carried counters must agree with the recomputed ones.
///
/// # Errors
///
/// Returns `HandoffError::Missing` for absent or blank input, `Json` for
/// unparsable or incomplete JSON, `Malformed` for invalid sessions and
/// `CounterMismatch` when the counters drifted.
pub fn decode(raw: Option<&str>) -> Result<PlanDocument, HandoffError> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(HandoffError::Missing)?;
    let incoming: Incoming = serde_json::from_str(raw)?;

    let current_date = parse_current_date(&incoming.current_date)?;
    let plan = parse_slots(&incoming.plan)?;
    let document = PlanDocument::from_parts(current_date, plan, incoming.tips);

    if document.progress() != incoming.progress_stats {
        tracing::warn!(
            carried = ?incoming.progress_stats,
            actual = ?document.progress(),
            "rejecting handoff with drifted counters"
        );
        return Err(HandoffError::CounterMismatch {
            carried: incoming.progress_stats,
            actual: document.progress(),
        });
    }
    Ok(document)
}
