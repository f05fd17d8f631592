use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use planner_core::model::PlanDocument;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted plan snapshot.
///
/// NOTE: This is `i64` to match `SQLite` row IDs.
pub type SnapshotId = i64;

/// Listing entry for a stored snapshot, without the session payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSnapshotRow {
    pub id: SnapshotId,
    pub plan_date: NaiveDate,
    pub saved_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
}

impl PlanSnapshotRow {
    #[must_use]
    pub fn from_document(id: SnapshotId, saved_at: DateTime<Utc>, document: &PlanDocument) -> Self {
        let progress = document.progress();
        Self {
            id,
            plan_date: document.current_date(),
            saved_at,
            total: progress.total_sessions,
            completed: progress.completed_sessions,
        }
    }
}

/// Repository contract for plan snapshots kept between runs.
#[async_trait]
pub trait PlanSnapshotRepository: Send + Sync {
    /// Persist a new snapshot and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(
        &self,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<SnapshotId, StorageError>;

    /// Overwrite an existing snapshot, e.g. after a status change.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn replace_snapshot(
        &self,
        id: SnapshotId,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Fetch a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<PlanDocument, StorageError>;

    /// Most recently saved snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn latest_snapshot(&self) -> Result<Option<(SnapshotId, PlanDocument)>, StorageError>;

    /// Newest-first listing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_snapshots(&self, limit: u32) -> Result<Vec<PlanSnapshotRow>, StorageError>;
}

#[derive(Debug, Clone)]
struct StoredSnapshot {
    id: SnapshotId,
    saved_at: DateTime<Utc>,
    document: PlanDocument,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshots: Arc<Mutex<Vec<StoredSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &StoredSnapshot, b: &StoredSnapshot) -> std::cmp::Ordering {
    b.saved_at.cmp(&a.saved_at).then(b.id.cmp(&a.id))
}

#[async_trait]
impl PlanSnapshotRepository for InMemoryRepository {
    async fn save_snapshot(
        &self,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<SnapshotId, StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = guard.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        guard.push(StoredSnapshot {
            id,
            saved_at,
            document: document.clone(),
        });
        Ok(id)
    }

    async fn replace_snapshot(
        &self,
        id: SnapshotId,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let stored = guard
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StorageError::NotFound)?;
        stored.document = document.clone();
        stored.saved_at = saved_at;
        Ok(())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<PlanDocument, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.document.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn latest_snapshot(&self) -> Result<Option<(SnapshotId, PlanDocument)>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .min_by(|a, b| newest_first(a, b))
            .map(|s| (s.id, s.document.clone())))
    }

    async fn list_snapshots(&self, limit: u32) -> Result<Vec<PlanSnapshotRow>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut stored: Vec<&StoredSnapshot> = guard.iter().collect();
        stored.sort_by(|a, b| newest_first(a, b));
        Ok(stored
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|s| PlanSnapshotRow::from_document(s.id, s.saved_at, &s.document))
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn PlanSnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let snapshots: Arc<dyn PlanSnapshotRepository> = Arc::new(InMemoryRepository::new());
        Self { snapshots }
    }
}
