use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::input::{InputValidationError, Severity, Subject};
use crate::time::Clock;

/// Default quiet period before a typed topic is committed.
pub const DEFAULT_DEBOUNCE_MS: i64 = 500;

//
// ─── WEAKNESS MAP ──────────────────────────────────────────────────────────────
//

/// Normalized subject → topic → severity mapping sent to the plan generator.
///
/// Topic keys are trimmed, non-empty and unique per subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaknessMap(BTreeMap<Subject, BTreeMap<String, Severity>>);

impl WeaknessMap {
    #[must_use]
    pub fn get(&self, subject: &Subject, topic: &str) -> Option<Severity> {
        self.0.get(subject).and_then(|topics| topics.get(topic.trim())).copied()
    }

    #[must_use]
    pub fn topics(&self, subject: &Subject) -> Option<&BTreeMap<String, Severity>> {
        self.0.get(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Subject, &BTreeMap<String, Severity>)> {
        self.0.iter()
    }

    /// Number of (subject, topic) entries.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//
// ─── REGISTRY ──────────────────────────────────────────────────────────────────
//

/// Key for a pending debounced topic draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub subject: Subject,
    pub topic: String,
}

#[derive(Debug, Clone)]
struct PendingDraft {
    due_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TopicEntry {
    raw: String,
    severity: Severity,
    seq: u64,
}

/// Accumulates weakness ratings as the learner types.
///
/// Topic drafts are debounced per `(subject, trimmed topic)`: each call pushes
/// the deadline out by the debounce window and replaces the pending draft, so a
/// key never has more than one pending commit. Severity writes are immediate.
///
/// Dropping the registry or calling [`WeaknessRegistry::discard_pending`]
/// before a deadline passes loses that draft. This matches leaving the input
/// screen mid-edit and is accepted.
#[derive(Debug, Clone)]
pub struct WeaknessRegistry {
    clock: Clock,
    window: Duration,
    entries: BTreeMap<Subject, Vec<TopicEntry>>,
    pending: HashMap<DraftKey, PendingDraft>,
    next_seq: u64,
}

impl Default for WeaknessRegistry {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl WeaknessRegistry {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            window: Duration::milliseconds(DEFAULT_DEBOUNCE_MS),
            entries: BTreeMap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Mutable access for tests that drive a fixed clock forward.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Schedule a debounced commit of a typed topic.
    ///
    /// Blank topics are ignored. Returns `true` when a commit was scheduled.
    pub fn record_topic_draft(&mut self, subject: &Subject, raw_topic: &str) -> bool {
        let topic = raw_topic.trim();
        if topic.is_empty() {
            return false;
        }
        let key = DraftKey {
            subject: subject.clone(),
            topic: topic.to_owned(),
        };
        let due_at = self.clock.now() + self.window;
        if self.pending.insert(key, PendingDraft { due_at }).is_some() {
            tracing::trace!(subject = %subject, topic, "pending draft rescheduled");
        }
        true
    }

    /// Commit every pending draft whose quiet period has elapsed.
    ///
    /// Returns the number of drafts committed.
    pub fn commit_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<DraftKey> = self
            .pending
            .iter()
            .filter(|(_, draft)| draft.due_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        // Stable commit order regardless of hash iteration.
        due.sort_by_key(|key| self.pending.get(key).map(|d| d.due_at));

        for key in &due {
            self.pending.remove(key);
            let severity = self.current_severity(&key.subject, &key.topic);
            self.write(&key.subject, &key.topic, severity.unwrap_or_default());
            tracing::debug!(subject = %key.subject, topic = %key.topic, "topic draft committed");
        }
        due.len()
    }

    /// Earliest deadline among pending drafts.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|draft| draft.due_at).min()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending draft without committing it.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            tracing::debug!(dropped, "pending topic drafts discarded");
        }
        self.pending.clear();
        dropped
    }

    /// Immediate severity write from a form value; unusable values become 1.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::EmptyTopic` when the topic is blank.
    pub fn set_severity(
        &mut self,
        subject: &Subject,
        topic: &str,
        raw_level: &str,
    ) -> Result<Severity, InputValidationError> {
        self.set_severity_value(subject, topic, Severity::from_raw(raw_level))
    }

    /// Numeric variant of [`WeaknessRegistry::set_severity`].
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::EmptyTopic` when the topic is blank.
    pub fn set_severity_level(
        &mut self,
        subject: &Subject,
        topic: &str,
        level: i64,
    ) -> Result<Severity, InputValidationError> {
        self.set_severity_value(subject, topic, Severity::from_level(level))
    }

    fn set_severity_value(
        &mut self,
        subject: &Subject,
        topic: &str,
        severity: Severity,
    ) -> Result<Severity, InputValidationError> {
        if topic.trim().is_empty() {
            return Err(InputValidationError::EmptyTopic);
        }
        self.write(subject, topic, severity);
        Ok(severity)
    }

    /// Remove a topic and all of its whitespace variants. Returns `true` if anything was removed.
    pub fn remove_topic(&mut self, subject: &Subject, topic: &str) -> bool {
        let key = topic.trim();
        self.pending.retain(|k, _| !(k.subject == *subject && k.topic == key));
        let Some(topics) = self.entries.get_mut(subject) else {
            return false;
        };
        let before = topics.len();
        topics.retain(|entry| entry.raw.trim() != key);
        let removed = topics.len() != before;
        if topics.is_empty() {
            self.entries.remove(subject);
        }
        removed
    }

    /// Collapse whitespace variants of each topic, keeping the last write.
    ///
    /// Pending drafts are not included; commit them first.
    #[must_use]
    pub fn normalize(&self) -> WeaknessMap {
        let mut map = BTreeMap::new();
        for (subject, topics) in &self.entries {
            let mut latest: BTreeMap<String, (u64, Severity)> = BTreeMap::new();
            for entry in topics {
                let key = entry.raw.trim();
                if key.is_empty() {
                    continue;
                }
                match latest.get(key) {
                    Some((seq, _)) if *seq > entry.seq => {}
                    _ => {
                        latest.insert(key.to_owned(), (entry.seq, entry.severity));
                    }
                }
            }
            if !latest.is_empty() {
                map.insert(
                    subject.clone(),
                    latest.into_iter().map(|(k, (_, s))| (k, s)).collect(),
                );
            }
        }
        WeaknessMap(map)
    }

    fn current_severity(&self, subject: &Subject, topic: &str) -> Option<Severity> {
        self.entries
            .get(subject)?
            .iter()
            .filter(|entry| entry.raw.trim() == topic)
            .max_by_key(|entry| entry.seq)
            .map(|entry| entry.severity)
    }

    fn write(&mut self, subject: &Subject, raw_topic: &str, severity: Severity) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let topics = self.entries.entry(subject.clone()).or_default();
        match topics.iter_mut().find(|entry| entry.raw == raw_topic) {
            Some(entry) => {
                entry.severity = severity;
                entry.seq = seq;
            }
            None => topics.push(TopicEntry {
                raw: raw_topic.to_owned(),
                severity,
                seq,
            }),
        }
    }
}
