use std::sync::Arc;

use planner_core::Clock;
use planner_core::model::{
    ExamDateMap, MalformedPlanError, MalformedReason, PlanDocument, Subject, WeaknessRegistry,
};
use planner_core::{FeedbackEvent, PlanRequestAssembler, SessionStatusReducer};
use storage::repository::{PlanSnapshotRepository, PlanSnapshotRow, SnapshotId};

use crate::api::{PlannerApi, RemotePlanRecord, StatusUpdateRequest};
use crate::drafts::settle_drafts;
use crate::error::PlannerError;

/// A freshly generated plan and, when storage is configured, where it was saved.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub document: PlanDocument,
    pub snapshot_id: Option<SnapshotId>,
}

/// Orchestrates plan generation and session feedback against the remote planner.
#[derive(Clone)]
pub struct PlannerService {
    clock: Clock,
    api: Arc<dyn PlannerApi>,
    snapshots: Option<Arc<dyn PlanSnapshotRepository>>,
}

impl PlannerService {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn PlannerApi>) -> Self {
        Self {
            clock,
            api,
            snapshots: None,
        }
    }

    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<dyn PlanSnapshotRepository>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Settle drafts, assemble the request and turn the response into a document.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Assemble` for an empty subject list,
    /// `Transport` when the service cannot be reached, `Service` when it
    /// reports an error, `MalformedPlan` for an invalid plan, and `Storage`
    /// if saving the snapshot fails.
    pub async fn generate(
        &self,
        subjects: &[Subject],
        registry: &mut WeaknessRegistry,
        exams: &ExamDateMap,
    ) -> Result<GeneratedPlan, PlannerError> {
        settle_drafts(registry).await;
        let request = PlanRequestAssembler::assemble(subjects, registry, exams)?;

        let response = self.api.generate_plan(&request).await.map_err(|err| {
            tracing::error!(error = %err, "plan generation request failed");
            PlannerError::from(err)
        })?;
        if let Some(message) = response.error_message() {
            tracing::warn!(%message, "plan service rejected the request");
            return Err(PlannerError::Service {
                message: message.to_owned(),
            });
        }

        let raw_plan = response
            .plan
            .as_ref()
            .ok_or_else(|| MalformedPlanError::root(MalformedReason::NotAMapping))?;
        let document = PlanDocument::from_generation_response(
            raw_plan,
            response.tips.clone(),
            response.current_date.as_deref(),
            &self.clock,
        )
        .inspect_err(|err| tracing::error!(error = %err, "plan service returned a malformed plan"))?;

        let snapshot_id = match &self.snapshots {
            Some(repo) => Some(repo.save_snapshot(&document, self.clock.now()).await?),
            None => None,
        };
        tracing::info!(
            total = document.progress().total_sessions,
            slots = document.plan().len(),
            ?snapshot_id,
            "plan generated"
        );
        Ok(GeneratedPlan {
            document,
            snapshot_id,
        })
    }

    /// Report a status change and return the updated document once the service accepts it.
    ///
    /// The event is checked against `document` before anything is sent. On any
    /// error the caller keeps showing `document`.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Feedback` if the session cannot be located,
    /// `Transport` for network failures and `Rejected` when the service answers
    /// `success: false`.
    pub async fn submit_feedback(
        &self,
        document: &PlanDocument,
        event: &FeedbackEvent,
    ) -> Result<PlanDocument, PlannerError> {
        let next = SessionStatusReducer::apply(document, event)?;

        let request = StatusUpdateRequest {
            date: document.current_date().format("%Y-%m-%d").to_string(),
            subject: event.subject().to_string(),
            topic: event.topic().map(str::to_owned),
            status: event.new_status(),
        };
        let response = self.api.update_session(&request).await.map_err(|err| {
            tracing::warn!(error = %err, subject = %event.subject(), "status update failed");
            PlannerError::from(err)
        })?;
        if !response.success {
            tracing::warn!(subject = %event.subject(), error = ?response.error, "status update rejected");
            return Err(PlannerError::Rejected {
                message: response.error,
            });
        }
        Ok(next)
    }

    /// Save a document, replacing `existing` when given.
    ///
    /// Returns `None` when no snapshot storage is configured.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Storage` on storage failures.
    pub async fn persist(
        &self,
        existing: Option<SnapshotId>,
        document: &PlanDocument,
    ) -> Result<Option<SnapshotId>, PlannerError> {
        let Some(repo) = &self.snapshots else {
            return Ok(None);
        };
        let now = self.clock.now();
        let id = match existing {
            Some(id) => {
                repo.replace_snapshot(id, document, now).await?;
                id
            }
            None => repo.save_snapshot(document, now).await?,
        };
        Ok(Some(id))
    }

    /// Most recently saved plan, if storage is configured and not empty.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Storage` on storage failures.
    pub async fn latest(&self) -> Result<Option<(SnapshotId, PlanDocument)>, PlannerError> {
        match &self.snapshots {
            Some(repo) => Ok(repo.latest_snapshot().await?),
            None => Ok(None),
        }
    }

    /// Locally saved plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Storage` on storage failures.
    pub async fn history(&self, limit: u32) -> Result<Vec<PlanSnapshotRow>, PlannerError> {
        match &self.snapshots {
            Some(repo) => Ok(repo.list_snapshots(limit).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Plans stored by the remote service.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Transport` when the service cannot be reached.
    pub async fn remote_plans(&self) -> Result<Vec<RemotePlanRecord>, PlannerError> {
        Ok(self.api.list_plans().await?)
    }
}
