use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Field-level input errors. These are handled where the input enters and
/// never reach the plan/session layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputValidationError {
    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("severity must be between 1 and 5, got {value}")]
    SeverityOutOfRange { value: i64 },

    #[error("severity is not an integer: {raw:?}")]
    InvalidSeverity { raw: String },

    #[error("invalid exam date {raw:?}, expected YYYY-MM-DD")]
    InvalidDate { raw: String },
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// A trimmed, non-empty subject name such as `Maths`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Parses a subject from raw user input.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::EmptySubject` if the trimmed input is empty.
    pub fn parse(raw: &str) -> Result<Self, InputValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputValidationError::EmptySubject);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = InputValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.0
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subject({:?})", self.0)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered list of subjects in the order the learner added them.
///
/// Re-adding a subject that is already present is a silent no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectList {
    subjects: Vec<Subject>,
}

impl SubjectList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subject from raw input.
    ///
    /// Returns `false` when the subject was already present.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::EmptySubject` for blank input.
    pub fn add(&mut self, raw: &str) -> Result<bool, InputValidationError> {
        let subject = Subject::parse(raw)?;
        Ok(self.insert(subject))
    }

    /// Adds an already validated subject, returning `false` on a duplicate.
    pub fn insert(&mut self, subject: Subject) -> bool {
        if self.subjects.contains(&subject) {
            tracing::debug!(subject = %subject, "subject already listed");
            return false;
        }
        self.subjects.push(subject);
        true
    }

    #[must_use]
    pub fn contains(&self, subject: &Subject) -> bool {
        self.subjects.contains(subject)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Subject] {
        &self.subjects
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

//
// ─── SEVERITY ──────────────────────────────────────────────────────────────────
//

/// How weak the learner feels on a topic, from 1 (mild) to 5 (severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: Severity = Severity(1);
    pub const MAX: Severity = Severity(5);

    /// Strict constructor.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::SeverityOutOfRange` outside `1..=5`.
    pub fn try_new(value: i64) -> Result<Self, InputValidationError> {
        match u8::try_from(value) {
            Ok(v) if (1..=5).contains(&v) => Ok(Self(v)),
            _ => Err(InputValidationError::SeverityOutOfRange { value }),
        }
    }

    /// Strict parse of a form value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeverity` when the input is not an integer and
    /// `SeverityOutOfRange` when it is outside `1..=5`.
    pub fn parse(raw: &str) -> Result<Self, InputValidationError> {
        let value = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| InputValidationError::InvalidSeverity {
                raw: raw.to_owned(),
            })?;
        Self::try_new(value)
    }

    /// Lenient parse used by the input form: anything unusable becomes `MIN`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "severity defaulted to 1");
            Self::MIN
        })
    }

    /// Lenient numeric variant of [`Severity::from_raw`].
    #[must_use]
    pub fn from_level(level: i64) -> Self {
        Self::try_new(level).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "severity defaulted to 1");
            Self::MIN
        })
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<i64> for Severity {
    type Error = InputValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── EXAM DATES ────────────────────────────────────────────────────────────────
//

/// Subject → exam date. At most one date per subject; later writes replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamDateMap(BTreeMap<Subject, NaiveDate>);

impl ExamDateMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exam date for a subject from an ISO 8601 `YYYY-MM-DD` string.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::InvalidDate` and leaves the map untouched
    /// when the date cannot be parsed.
    pub fn set(&mut self, subject: Subject, raw_date: &str) -> Result<NaiveDate, InputValidationError> {
        let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d").map_err(|_| {
            InputValidationError::InvalidDate {
                raw: raw_date.to_owned(),
            }
        })?;
        self.insert(subject, date);
        Ok(date)
    }

    pub fn insert(&mut self, subject: Subject, date: NaiveDate) -> Option<NaiveDate> {
        self.0.insert(subject, date)
    }

    pub fn remove(&mut self, subject: &Subject) -> Option<NaiveDate> {
        self.0.remove(subject)
    }

    #[must_use]
    pub fn get(&self, subject: &Subject) -> Option<NaiveDate> {
        self.0.get(subject).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Subject, &NaiveDate)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
