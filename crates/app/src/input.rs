//! The `generate` input file.

use std::collections::BTreeMap;

use planner_core::model::{
    ExamDateMap, InputValidationError, Subject, SubjectList, WeaknessRegistry,
};
use serde::Deserialize;

/// Weak topics for one subject: either a list of topic names (severity 1)
/// or a `topic -> severity` mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicInput {
    Names(Vec<String>),
    Rated(BTreeMap<String, i64>),
}

#[derive(Debug, Deserialize)]
pub struct PlanInput {
    subjects: Vec<String>,
    #[serde(default)]
    weaknesses: BTreeMap<String, TopicInput>,
    #[serde(default)]
    exams: BTreeMap<String, String>,
}

/// Form state rebuilt from a [`PlanInput`].
pub struct PlanForm {
    pub subjects: SubjectList,
    pub registry: WeaknessRegistry,
    pub exams: ExamDateMap,
    /// Fields that were skipped, in input order.
    pub rejected: Vec<InputValidationError>,
}

impl PlanForm {
    fn reject(&mut self, field: &str, err: InputValidationError) {
        tracing::warn!(field, error = %err, "input field rejected");
        self.rejected.push(err);
    }
}

impl PlanInput {
    /// Replay the file into a form the way a learner would fill it in.
    ///
    /// Named topics are typed as drafts and settle on generation; rated
    /// topics are written immediately. A bad subject, topic or exam date only
    /// drops that field; it is listed in [`PlanForm::rejected`].
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError::EmptySubject` when no usable subject is left.
    pub fn into_form(self, registry: WeaknessRegistry) -> Result<PlanForm, InputValidationError> {
        let mut form = PlanForm {
            subjects: SubjectList::new(),
            registry,
            exams: ExamDateMap::new(),
            rejected: Vec::new(),
        };

        for raw in &self.subjects {
            match form.subjects.add(raw) {
                Ok(true) => {}
                Ok(false) => tracing::debug!(subject = raw.as_str(), "duplicate subject ignored"),
                Err(err) => form.reject("subjects", err),
            }
        }
        if form.subjects.is_empty() {
            return Err(InputValidationError::EmptySubject);
        }

        for (raw_subject, topics) in self.weaknesses {
            let subject = match Subject::parse(&raw_subject) {
                Ok(subject) => subject,
                Err(err) => {
                    form.reject("weaknesses", err);
                    continue;
                }
            };
            match topics {
                TopicInput::Names(names) => {
                    for name in names {
                        form.registry.record_topic_draft(&subject, &name);
                    }
                }
                TopicInput::Rated(rated) => {
                    for (topic, level) in rated {
                        if let Err(err) = form.registry.set_severity_level(&subject, &topic, level) {
                            form.reject("weaknesses", err);
                        }
                    }
                }
            }
        }

        for (raw_subject, raw_date) in self.exams {
            let result =
                Subject::parse(&raw_subject).and_then(|subject| form.exams.set(subject, &raw_date));
            if let Err(err) = result {
                form.reject("exams", err);
            }
        }

        Ok(form)
    }
}
