//! Building the payload sent to the plan generator.

use serde::Serialize;
use thiserror::Error;

use crate::model::{ExamDateMap, Subject, WeaknessMap, WeaknessRegistry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssembleError {
    #[error("at least one subject is required to generate a plan")]
    EmptySubjectList,
}

/// Body of a plan generation request. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRequest {
    subjects: Vec<Subject>,
    weaknesses: WeaknessMap,
    exams: ExamDateMap,
}

impl PlanRequest {
    #[must_use]
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    #[must_use]
    pub fn weaknesses(&self) -> &WeaknessMap {
        &self.weaknesses
    }

    #[must_use]
    pub fn exams(&self) -> &ExamDateMap {
        &self.exams
    }
}

pub struct PlanRequestAssembler;

impl PlanRequestAssembler {
    /// Normalize the registry and bundle it with subjects and exam dates.
    ///
    /// Only committed topics are included; settle pending drafts first.
    ///
    /// # Errors
    ///
    /// Returns `AssembleError::EmptySubjectList` if `subjects` is empty.
    pub fn assemble(
        subjects: &[Subject],
        registry: &WeaknessRegistry,
        exams: &ExamDateMap,
    ) -> Result<PlanRequest, AssembleError> {
        if subjects.is_empty() {
            return Err(AssembleError::EmptySubjectList);
        }
        if registry.pending_count() > 0 {
            tracing::warn!(
                pending = registry.pending_count(),
                "assembling plan request with uncommitted topic drafts"
            );
        }
        let weaknesses = registry.normalize();
        tracing::info!(
            subjects = subjects.len(),
            topics = weaknesses.topic_count(),
            exams = exams.len(),
            "plan request assembled"
        );
        Ok(PlanRequest {
            subjects: subjects.to_vec(),
            weaknesses,
            exams: exams.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectList;
    use crate::time::fixed_clock;

    #[test]
    fn empty_subjects_are_rejected() {
        let registry = WeaknessRegistry::new(fixed_clock());
        let err = PlanRequestAssembler::assemble(&[], &registry, &ExamDateMap::new()).unwrap_err();
        assert_eq!(err, AssembleError::EmptySubjectList);
    }

    #[test]
    fn payload_matches_service_shape() {
        let mut subjects = SubjectList::new();
        subjects.add("Maths").unwrap();
        subjects.add("Physics").unwrap();
        let maths = subjects.as_slice()[0].clone();

        let mut registry = WeaknessRegistry::new(fixed_clock());
        registry.set_severity(&maths, "Algebra ", "3").unwrap();
        registry.set_severity(&maths, "Algebra", "4").unwrap();

        let mut exams = ExamDateMap::new();
        exams.set(maths, "2023-11-20").unwrap();

        let request =
            PlanRequestAssembler::assemble(subjects.as_slice(), &registry, &exams).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subjects": ["Maths", "Physics"],
                "weaknesses": {"Maths": {"Algebra": 4}},
                "exams": {"Maths": "2023-11-20"}
            })
        );
    }
}
