#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, PlanSnapshotRepository, PlanSnapshotRow, SnapshotId, Storage,
    StorageError,
};
