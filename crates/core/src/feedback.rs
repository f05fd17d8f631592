//! Applying learner feedback to a plan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{PlanDocument, SessionStatus, Subject};

/// Errors raised while locating the session a feedback event addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("no session for {subject} / {topic:?}")]
    SessionNotFound {
        subject: Subject,
        topic: Option<String>,
    },

    #[error("{matches} sessions match {subject} / {topic:?}; the plan contains duplicates")]
    AmbiguousSession {
        subject: Subject,
        topic: Option<String>,
        matches: usize,
    },
}

/// A learner marking one session with a new status.
///
/// The topic is always trimmed, with blank topics stored as `None`, whether
/// the event is built with [`FeedbackEvent::new`] or deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFeedbackEvent")]
pub struct FeedbackEvent {
    subject: Subject,
    topic: Option<String>,
    new_status: SessionStatus,
}

#[derive(Deserialize)]
struct RawFeedbackEvent {
    subject: Subject,
    #[serde(default)]
    topic: Option<String>,
    new_status: SessionStatus,
}

impl From<RawFeedbackEvent> for FeedbackEvent {
    fn from(raw: RawFeedbackEvent) -> Self {
        Self::new(raw.subject, raw.topic.as_deref(), raw.new_status)
    }
}

impl FeedbackEvent {
    #[must_use]
    pub fn new(subject: Subject, topic: Option<&str>, new_status: SessionStatus) -> Self {
        Self {
            subject,
            topic: topic.map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned),
            new_status,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn new_status(&self) -> SessionStatus {
        self.new_status
    }

    fn not_found(&self) -> FeedbackError {
        FeedbackError::SessionNotFound {
            subject: self.subject.clone(),
            topic: self.topic.clone(),
        }
    }
}

/// Thumbs up / thumbs down controls shown next to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackVote {
    Up,
    Down,
}

impl FeedbackVote {
    #[must_use]
    pub fn status(self) -> SessionStatus {
        match self {
            FeedbackVote::Up => SessionStatus::Completed,
            FeedbackVote::Down => SessionStatus::NotStarted,
        }
    }
}

/// Pure reducer from `(document, event)` to the next document.
pub struct SessionStatusReducer;

impl SessionStatusReducer {
    /// Apply one feedback event.
    ///
    /// The matched session's status is replaced and the counters are moved by
    /// one (decrement old status, increment new). Setting a status a session
    /// already has returns an equal document.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::SessionNotFound` when nothing matches and
    /// `FeedbackError::AmbiguousSession` when more than one session does. The
    /// input document is untouched in both cases.
    pub fn apply(
        document: &PlanDocument,
        event: &FeedbackEvent,
    ) -> Result<PlanDocument, FeedbackError> {
        let topic = event.topic.as_deref();
        let mut matches = document.find_sessions(&event.subject, topic);
        let at = match matches.len() {
            0 => return Err(event.not_found()),
            1 => matches.remove(0),
            n => {
                tracing::error!(subject = %event.subject, ?topic, matches = n, "duplicate sessions in plan");
                return Err(FeedbackError::AmbiguousSession {
                    subject: event.subject.clone(),
                    topic: event.topic.clone(),
                    matches: n,
                });
            }
        };

        let Some(previous) = document.session(&at).map(|session| session.status) else {
            return Err(event.not_found());
        };
        tracing::debug!(
            subject = %event.subject,
            ?topic,
            slot = %at.slot,
            from = %previous,
            to = %event.new_status,
            "session status changed"
        );
        document
            .with_status(&at, previous, event.new_status)
            .ok_or_else(|| event.not_found())
    }
}

impl PlanDocument {
    /// Convenience wrapper around [`SessionStatusReducer::apply`].
    ///
    /// # Errors
    ///
    /// See [`SessionStatusReducer::apply`].
    pub fn apply_feedback(&self, event: &FeedbackEvent) -> Result<PlanDocument, FeedbackError> {
        SessionStatusReducer::apply(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_clock;
    use serde_json::json;

    fn maths() -> Subject {
        Subject::parse("Maths").unwrap()
    }

    fn single_session_plan() -> PlanDocument {
        PlanDocument::from_generation_response(
            &json!({
                "Morning": [{"subject": "Maths", "topic": "Algebra", "duration": 1, "status": "not_started"}]
            }),
            None,
            None,
            &fixed_clock(),
        )
        .unwrap()
    }

    #[test]
    fn completing_a_session_moves_counters() {
        let doc = single_session_plan();
        let event = FeedbackEvent::new(maths(), Some("Algebra"), SessionStatus::Completed);
        let next = SessionStatusReducer::apply(&doc, &event).unwrap();

        assert_eq!(next.progress().completed_sessions, 1);
        assert_eq!(next.progress().not_started_sessions, 0);
        assert_eq!(next.progress().total_sessions, 1);
        assert_eq!(doc.progress().not_started_sessions, 1, "input untouched");
    }

    #[test]
    fn repeating_an_event_is_a_no_op() {
        let doc = single_session_plan();
        let event = FeedbackEvent::new(maths(), Some("Algebra"), SessionStatus::Completed);
        let once = doc.apply_feedback(&event).unwrap();
        let twice = once.apply_feedback(&event).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn sessions_can_be_reopened() {
        let doc = single_session_plan();
        let done = doc
            .apply_feedback(&FeedbackEvent::new(maths(), Some("Algebra"), FeedbackVote::Up.status()))
            .unwrap();
        let reopened = done
            .apply_feedback(&FeedbackEvent::new(maths(), Some("Algebra"), FeedbackVote::Down.status()))
            .unwrap();
        assert_eq!(reopened.progress(), doc.progress());
    }

    #[test]
    fn unknown_session_is_reported() {
        let doc = single_session_plan();
        let event = FeedbackEvent::new(maths(), Some("Geometry"), SessionStatus::Completed);
        let err = doc.apply_feedback(&event).unwrap_err();
        assert!(matches!(err, FeedbackError::SessionNotFound { .. }));
    }

    #[test]
    fn duplicate_sessions_are_not_guessed() {
        let doc = PlanDocument::from_generation_response(
            &json!({
                "Morning": [{"subject": "Maths", "topic": "Algebra", "duration": 1}],
                "Evening": [{"subject": "Maths", "topic": "Algebra", "duration": 2}]
            }),
            None,
            None,
            &fixed_clock(),
        )
        .unwrap();
        let event = FeedbackEvent::new(maths(), Some("Algebra"), SessionStatus::InProgress);
        let err = doc.apply_feedback(&event).unwrap_err();
        assert_eq!(
            err,
            FeedbackError::AmbiguousSession {
                subject: maths(),
                topic: Some("Algebra".into()),
                matches: 2,
            }
        );
    }

    #[test]
    fn deserialized_events_are_trimmed() {
        let doc = single_session_plan();
        let event: FeedbackEvent = serde_json::from_value(json!({
            "subject": "Maths",
            "topic": " Algebra ",
            "new_status": "completed"
        }))
        .unwrap();
        assert_eq!(event.topic(), Some("Algebra"));
        let next = doc.apply_feedback(&event).unwrap();
        assert_eq!(next.progress().completed_sessions, 1);

        let blank: FeedbackEvent = serde_json::from_value(json!({
            "subject": "Maths",
            "topic": "   ",
            "new_status": "in_progress"
        }))
        .unwrap();
        assert_eq!(blank.topic(), None);
    }

    #[test]
    fn topicless_sessions_match_topicless_events() {
        let doc = PlanDocument::from_generation_response(
            &json!({"Morning": [{"subject": "Maths", "task": "Past paper", "duration": 2}]}),
            None,
            None,
            &fixed_clock(),
        )
        .unwrap();
        let next = doc
            .apply_feedback(&FeedbackEvent::new(maths(), Some("  "), SessionStatus::InProgress))
            .unwrap();
        assert_eq!(next.progress().in_progress_sessions, 1);
    }
}
