use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::model::input::Subject;
use crate::model::session::{Session, SessionStatus, parse_hours};
use crate::time::Clock;

/// Slot key → ordered sessions for that slot.
pub type SlotMap = BTreeMap<String, Vec<Session>>;

/// Time-of-day labels rendered first, in this order.
pub const TIME_OF_DAY_SLOTS: [&str; 3] = ["Morning", "Afternoon", "Evening"];

/// Tips shown when the generator does not supply any.
pub const DEFAULT_TIPS: [&str; 3] = [
    "Stay focused and take a 5-min break every 30 mins!",
    "You've got this! Keep pushing forward.",
    "Remember to review your notes after each session.",
];

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// What exactly was wrong with a plan record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedReason {
    #[error("plan is not a mapping of slot to sessions")]
    NotAMapping,

    #[error("slot value is not a list of sessions")]
    NotAList,

    #[error("session is not an object")]
    NotAnObject,

    #[error("session is missing `subject`")]
    MissingSubject,

    #[error("session is missing `duration`")]
    MissingDuration,

    #[error("invalid duration {raw}")]
    InvalidDuration { raw: String },

    #[error("unknown status {raw:?}")]
    UnknownStatus { raw: String },

    #[error("field `{field}` has the wrong type")]
    InvalidField { field: &'static str },

    #[error("invalid current_date {raw:?}")]
    InvalidCurrentDate { raw: String },
}

/// A generated plan failed validation. `slot`/`index` point at the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPlanError {
    pub slot: Option<String>,
    pub index: Option<usize>,
    pub reason: MalformedReason,
}

impl MalformedPlanError {
    #[must_use]
    pub fn root(reason: MalformedReason) -> Self {
        Self {
            slot: None,
            index: None,
            reason,
        }
    }

    #[must_use]
    pub fn at(slot: &str, index: Option<usize>, reason: MalformedReason) -> Self {
        Self {
            slot: Some(slot.to_owned()),
            index,
            reason,
        }
    }
}

impl fmt::Display for MalformedPlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed plan")?;
        if let Some(slot) = &self.slot {
            write!(f, " at slot {slot:?}")?;
        }
        if let Some(index) = self.index {
            write!(f, " index {index}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

impl std::error::Error for MalformedPlanError {}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Per-status session counters.
///
/// Invariant: `completed + in_progress + not_started == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub in_progress_sessions: usize,
    pub not_started_sessions: usize,
}

impl ProgressStats {
    /// Count every session exactly once.
    pub fn tally<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut stats = Self::default();
        for session in sessions {
            stats.total_sessions += 1;
            *stats.counter_mut(session.status) += 1;
        }
        stats
    }

    #[must_use]
    pub fn count(&self, status: SessionStatus) -> usize {
        match status {
            SessionStatus::NotStarted => self.not_started_sessions,
            SessionStatus::InProgress => self.in_progress_sessions,
            SessionStatus::Completed => self.completed_sessions,
        }
    }

    /// Move one session from `from` to `to`. `total_sessions` never changes.
    #[must_use]
    pub fn transition(mut self, from: SessionStatus, to: SessionStatus) -> Self {
        if from == to {
            return self;
        }
        let source = self.counter_mut(from);
        debug_assert!(*source > 0, "no session counted as {from}");
        *source = source.saturating_sub(1);
        *self.counter_mut(to) += 1;
        self
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.completed_sessions + self.in_progress_sessions + self.not_started_sessions
            == self.total_sessions
    }

    /// Share of completed sessions, rounded to a whole percent. 0 for an empty plan.
    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        if self.total_sessions == 0 {
            return 0;
        }
        let pct = (self.completed_sessions * 100 + self.total_sessions / 2) / self.total_sessions;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    fn counter_mut(&mut self, status: SessionStatus) -> &mut usize {
        match status {
            SessionStatus::NotStarted => &mut self.not_started_sessions,
            SessionStatus::InProgress => &mut self.in_progress_sessions,
            SessionStatus::Completed => &mut self.completed_sessions,
        }
    }
}

//
// ─── DOCUMENT ──────────────────────────────────────────────────────────────────
//

/// A generated study plan plus its progress counters.
///
/// Values are replaced, never mutated: every status change yields a new
/// document, which keeps handoff across screens safe.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDocument {
    current_date: NaiveDate,
    plan: SlotMap,
    progress: ProgressStats,
    tips: Vec<String>,
}

/// Location of a session inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub slot: String,
    pub index: usize,
}

impl PlanDocument {
    /// Build a document from the generator's raw `plan` value.
    ///
    /// Counters are always recomputed from the session list; any counters the
    /// service sent alongside are ignored. `current_date` defaults to today
    /// according to `clock`, and missing tips fall back to [`DEFAULT_TIPS`].
    ///
    /// # Errors
    ///
    /// Returns `MalformedPlanError` naming the slot and index of the first
    /// invalid record.
    pub fn from_generation_response(
        raw_plan: &Value,
        tips: Option<Vec<String>>,
        current_date: Option<&str>,
        clock: &Clock,
    ) -> Result<Self, MalformedPlanError> {
        let plan = parse_slots(raw_plan)?;
        let current_date = match current_date {
            Some(raw) => parse_current_date(raw)?,
            None => clock.today(),
        };
        let tips = tips.unwrap_or_else(|| DEFAULT_TIPS.iter().map(|t| (*t).to_owned()).collect());
        Ok(Self::from_parts(current_date, plan, tips))
    }

    /// Assemble a document from already validated parts.
    #[must_use]
    pub fn from_parts(current_date: NaiveDate, plan: SlotMap, tips: Vec<String>) -> Self {
        let progress = ProgressStats::tally(plan.values().flatten());
        Self {
            current_date,
            plan,
            progress,
            tips,
        }
    }

    #[must_use]
    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    #[must_use]
    pub fn plan(&self) -> &SlotMap {
        &self.plan
    }

    #[must_use]
    pub fn progress(&self) -> ProgressStats {
        self.progress
    }

    #[must_use]
    pub fn tips(&self) -> &[String] {
        &self.tips
    }

    /// Every session with its slot key and index, in slot order.
    pub fn sessions(&self) -> impl Iterator<Item = (&str, usize, &Session)> {
        self.plan.iter().flat_map(|(slot, sessions)| {
            sessions
                .iter()
                .enumerate()
                .map(move |(index, session)| (slot.as_str(), index, session))
        })
    }

    /// All sessions addressed by `(subject, topic)`.
    #[must_use]
    pub fn find_sessions(&self, subject: &Subject, topic: Option<&str>) -> Vec<SessionRef> {
        self.sessions()
            .filter(|(_, _, session)| session.matches(subject, topic))
            .map(|(slot, index, _)| SessionRef {
                slot: slot.to_owned(),
                index,
            })
            .collect()
    }

    #[must_use]
    pub fn session(&self, at: &SessionRef) -> Option<&Session> {
        self.plan.get(&at.slot)?.get(at.index)
    }

    /// Sessions grouped by time of day: Morning, Afternoon, Evening, then any
    /// other label alphabetically. Sessions without a label use their slot key.
    #[must_use]
    pub fn sessions_by_time_slot(&self) -> Vec<(String, Vec<&Session>)> {
        let mut groups: BTreeMap<&str, Vec<&Session>> = BTreeMap::new();
        for (slot, _, session) in self.sessions() {
            groups
                .entry(session.time_slot_or(slot))
                .or_default()
                .push(session);
        }

        let mut ordered = Vec::with_capacity(groups.len());
        for label in TIME_OF_DAY_SLOTS {
            if let Some(sessions) = groups.remove(label) {
                ordered.push((label.to_owned(), sessions));
            }
        }
        ordered.extend(
            groups
                .into_iter()
                .map(|(label, sessions)| (label.to_owned(), sessions)),
        );
        ordered
    }

    /// Copy of this document with one session's status replaced and the
    /// counters moved by one. `None` if `at` does not name a session.
    pub(crate) fn with_status(
        &self,
        at: &SessionRef,
        previous: SessionStatus,
        status: SessionStatus,
    ) -> Option<Self> {
        let mut next = self.clone();
        let session = next
            .plan
            .get_mut(&at.slot)
            .and_then(|sessions| sessions.get_mut(at.index))?;
        session.status = status;
        next.progress = self.progress.transition(previous, status);
        Some(next)
    }
}

//
// ─── PARSING ───────────────────────────────────────────────────────────────────
//

pub(crate) fn parse_current_date(raw: &str) -> Result<NaiveDate, MalformedPlanError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        MalformedPlanError::root(MalformedReason::InvalidCurrentDate {
            raw: raw.to_owned(),
        })
    })
}

pub(crate) fn parse_slots(raw_plan: &Value) -> Result<SlotMap, MalformedPlanError> {
    let slots = raw_plan
        .as_object()
        .ok_or_else(|| MalformedPlanError::root(MalformedReason::NotAMapping))?;

    let mut plan = SlotMap::new();
    for (slot, value) in slots {
        let records = value
            .as_array()
            .ok_or_else(|| MalformedPlanError::at(slot, None, MalformedReason::NotAList))?;
        let mut sessions = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let session = parse_session(record)
                .map_err(|reason| MalformedPlanError::at(slot, Some(index), reason))?;
            sessions.push(session);
        }
        plan.insert(slot.clone(), sessions);
    }
    Ok(plan)
}

fn parse_session(record: &Value) -> Result<Session, MalformedReason> {
    let fields = record.as_object().ok_or(MalformedReason::NotAnObject)?;

    let subject = match fields.get("subject") {
        None | Some(Value::Null) => return Err(MalformedReason::MissingSubject),
        Some(Value::String(raw)) => {
            Subject::parse(raw).map_err(|_| MalformedReason::MissingSubject)?
        }
        Some(_) => return Err(MalformedReason::InvalidField { field: "subject" }),
    };

    let duration = match fields.get("duration") {
        None | Some(Value::Null) => return Err(MalformedReason::MissingDuration),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|hours| hours.is_finite() && *hours > 0.0)
            .ok_or_else(|| MalformedReason::InvalidDuration { raw: n.to_string() })?,
        Some(Value::String(raw)) => {
            parse_hours(raw).ok_or_else(|| MalformedReason::InvalidDuration { raw: raw.clone() })?
        }
        Some(other) => {
            return Err(MalformedReason::InvalidDuration {
                raw: other.to_string(),
            });
        }
    };

    let status = match fields.get("status") {
        None | Some(Value::Null) => SessionStatus::NotStarted,
        Some(Value::String(raw)) => raw
            .parse()
            .map_err(|_| MalformedReason::UnknownStatus { raw: raw.clone() })?,
        Some(other) => {
            return Err(MalformedReason::UnknownStatus {
                raw: other.to_string(),
            });
        }
    };

    Ok(Session {
        subject,
        topic: optional_text(fields, "topic")?,
        task: optional_text(fields, "task")?,
        duration,
        time_slot: optional_text(fields, "time_slot")?,
        status,
    })
}

fn optional_text(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, MalformedReason> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Some(_) => Err(MalformedReason::InvalidField { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_clock;
    use serde_json::json;

    fn build(raw: &Value) -> Result<PlanDocument, MalformedPlanError> {
        PlanDocument::from_generation_response(raw, None, None, &fixed_clock())
    }

    #[test]
    fn counters_come_from_the_session_list() {
        let doc = build(&json!({
            "Morning": [
                {"subject": "Maths", "topic": "Algebra", "duration": 1, "status": "not_started"},
                {"subject": "Maths", "topic": "Calculus", "duration": "2h", "status": "completed"}
            ],
            "Evening": [
                {"subject": "Physics", "topic": "Optics", "duration": 1.5, "status": "in_progress"}
            ]
        }))
        .unwrap();

        let stats = doc.progress();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.not_started_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.in_progress_sessions, 1);
        assert!(stats.is_consistent());
        assert_eq!(stats.completion_percent(), 33);
        assert_eq!(doc.current_date(), fixed_clock().today());
        assert_eq!(doc.tips().len(), DEFAULT_TIPS.len());
    }

    #[test]
    fn status_change_on_unknown_ref_leaves_counters_alone() {
        let doc = build(&json!({
            "Morning": [{"subject": "Maths", "topic": "Algebra", "duration": 1}]
        }))
        .unwrap();
        let dangling = SessionRef {
            slot: "Morning".into(),
            index: 4,
        };
        assert!(
            doc.with_status(&dangling, SessionStatus::NotStarted, SessionStatus::Completed)
                .is_none()
        );

        let at = SessionRef {
            slot: "Morning".into(),
            index: 0,
        };
        let next = doc
            .with_status(&at, SessionStatus::NotStarted, SessionStatus::Completed)
            .unwrap();
        assert_eq!(next.progress().completed_sessions, 1);
        assert!(next.progress().is_consistent());
    }

    #[test]
    fn missing_status_defaults_to_not_started() {
        let doc = build(&json!({
            "2023-11-14": [{"subject": "Maths", "topic": "Algebra", "duration": "1h"}]
        }))
        .unwrap();
        assert_eq!(doc.progress().not_started_sessions, 1);
    }

    #[test]
    fn missing_subject_names_slot_and_index() {
        let err = build(&json!({
            "Morning": [
                {"subject": "Maths", "duration": 1},
                {"topic": "Algebra", "duration": 1}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.slot.as_deref(), Some("Morning"));
        assert_eq!(err.index, Some(1));
        assert_eq!(err.reason, MalformedReason::MissingSubject);
        assert_eq!(
            err.to_string(),
            "malformed plan at slot \"Morning\" index 1: session is missing `subject`"
        );
    }

    #[test]
    fn unknown_status_and_bad_duration_are_rejected() {
        let err = build(&json!({
            "Morning": [{"subject": "Maths", "duration": 1, "status": "done"}]
        }))
        .unwrap_err();
        assert_eq!(
            err.reason,
            MalformedReason::UnknownStatus { raw: "done".into() }
        );

        let err = build(&json!({
            "Morning": [{"subject": "Maths", "duration": 0}]
        }))
        .unwrap_err();
        assert!(matches!(err.reason, MalformedReason::InvalidDuration { .. }));

        let err = build(&json!({"Morning": [{"subject": "Maths"}]})).unwrap_err();
        assert_eq!(err.reason, MalformedReason::MissingDuration);
    }

    #[test]
    fn non_list_slot_and_non_object_plan_are_rejected() {
        let err = build(&json!({"Morning": "study"})).unwrap_err();
        assert_eq!(err.slot.as_deref(), Some("Morning"));
        assert_eq!(err.index, None);
        assert_eq!(err.reason, MalformedReason::NotAList);

        let err = build(&json!(["Maths"])).unwrap_err();
        assert_eq!(err.reason, MalformedReason::NotAMapping);
    }

    #[test]
    fn supplied_date_and_tips_are_kept() {
        let doc = PlanDocument::from_generation_response(
            &json!({}),
            Some(vec!["Sleep well".into()]),
            Some("2024-05-01"),
            &fixed_clock(),
        )
        .unwrap();
        assert_eq!(doc.current_date().to_string(), "2024-05-01");
        assert_eq!(doc.tips(), ["Sleep well".to_owned()]);
        assert_eq!(doc.progress(), ProgressStats::default());
        assert_eq!(doc.progress().completion_percent(), 0);

        let err = PlanDocument::from_generation_response(
            &json!({}),
            None,
            Some("tomorrow"),
            &fixed_clock(),
        )
        .unwrap_err();
        assert!(matches!(
            err.reason,
            MalformedReason::InvalidCurrentDate { .. }
        ));
    }

    #[test]
    fn groups_by_time_of_day_first() {
        let doc = build(&json!({
            "2023-11-14": [
                {"subject": "Maths", "topic": "A", "duration": 1, "time_slot": "Evening"},
                {"subject": "Maths", "topic": "B", "duration": 1, "time_slot": "Morning"},
                {"subject": "Maths", "topic": "C", "duration": 1}
            ]
        }))
        .unwrap();
        let labels: Vec<_> = doc
            .sessions_by_time_slot()
            .into_iter()
            .map(|(label, sessions)| (label, sessions.len()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Morning".to_owned(), 1),
                ("Evening".to_owned(), 1),
                ("2023-11-14".to_owned(), 1),
            ]
        );
    }

    #[test]
    fn transition_moves_one_session() {
        let stats = ProgressStats {
            total_sessions: 2,
            completed_sessions: 0,
            in_progress_sessions: 0,
            not_started_sessions: 2,
        };
        let next = stats.transition(SessionStatus::NotStarted, SessionStatus::Completed);
        assert_eq!(next.completed_sessions, 1);
        assert_eq!(next.not_started_sessions, 1);
        assert_eq!(next.total_sessions, 2);
        assert_eq!(
            next.transition(SessionStatus::Completed, SessionStatus::Completed),
            next
        );
    }
}
