use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::input::Subject;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Progress state of a single study session.
///
/// Any state may move to any other; sessions can be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 3] = [
        SessionStatus::NotStarted,
        SessionStatus::InProgress,
        SessionStatus::Completed,
    ];

    /// Wire name used by the plan service.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Error returned when a status string is not one of the three known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    raw: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session status {:?}", self.raw)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for SessionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(SessionStatus::NotStarted),
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(ParseStatusError {
                raw: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One block of study inside a plan slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Length in hours, always positive and finite.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    /// True when this session is the one addressed by `(subject, topic)`.
    #[must_use]
    pub fn matches(&self, subject: &Subject, topic: Option<&str>) -> bool {
        self.subject == *subject && self.topic.as_deref() == topic
    }

    /// Time-of-day label, falling back to the plan slot the session lives in.
    #[must_use]
    pub fn time_slot_or<'a>(&'a self, slot_key: &'a str) -> &'a str {
        self.time_slot.as_deref().unwrap_or(slot_key)
    }
}

/// Parse a duration in hours from either a bare number (`1.5`) or an
/// `"Nh"` string as produced by the plan service.
#[must_use]
pub fn parse_hours(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed
        .strip_suffix(['h', 'H'])
        .map_or(trimmed, str::trim_end);
    number
        .parse::<f64>()
        .ok()
        .filter(|hours| hours.is_finite() && *hours > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in SessionStatus::ALL {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn hours_accept_numbers_and_suffix() {
        assert_eq!(parse_hours("2h"), Some(2.0));
        assert_eq!(parse_hours(" 1.5 H"), Some(1.5));
        assert_eq!(parse_hours("3"), Some(3.0));
        assert_eq!(parse_hours("0h"), None);
        assert_eq!(parse_hours("-1"), None);
        assert_eq!(parse_hours("soon"), None);
        assert_eq!(parse_hours("NaN"), None);
    }

    #[test]
    fn matching_uses_subject_and_optional_topic() {
        let session = Session {
            subject: Subject::parse("Maths").unwrap(),
            topic: Some("Algebra".into()),
            task: None,
            duration: 1.0,
            time_slot: None,
            status: SessionStatus::NotStarted,
        };
        let maths = Subject::parse("Maths").unwrap();
        assert!(session.matches(&maths, Some("Algebra")));
        assert!(!session.matches(&maths, None));
        assert_eq!(session.time_slot_or("Morning"), "Morning");
    }
}
