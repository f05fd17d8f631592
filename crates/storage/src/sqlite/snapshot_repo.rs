use chrono::{DateTime, NaiveDate, Utc};
use planner_core::handoff;
use planner_core::model::PlanDocument;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{PlanSnapshotRepository, PlanSnapshotRow, SnapshotId, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn count_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn count_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn decode_payload(row: &sqlx::sqlite::SqliteRow) -> Result<PlanDocument, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    handoff::decode(Some(&payload)).map_err(ser)
}

fn map_snapshot_row(row: &sqlx::sqlite::SqliteRow) -> Result<PlanSnapshotRow, StorageError> {
    let plan_date: String = row.try_get("plan_date").map_err(ser)?;
    let plan_date = NaiveDate::parse_from_str(&plan_date, "%Y-%m-%d").map_err(ser)?;
    Ok(PlanSnapshotRow {
        id: row.try_get("id").map_err(ser)?,
        plan_date,
        saved_at: row.try_get("saved_at").map_err(ser)?,
        total: count_from_i64(
            "total_sessions",
            row.try_get::<i64, _>("total_sessions").map_err(ser)?,
        )?,
        completed: count_from_i64(
            "completed_sessions",
            row.try_get::<i64, _>("completed_sessions").map_err(ser)?,
        )?,
    })
}

#[async_trait::async_trait]
impl PlanSnapshotRepository for SqliteRepository {
    async fn save_snapshot(
        &self,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<SnapshotId, StorageError> {
        let payload = handoff::encode(document).map_err(ser)?;
        let progress = document.progress();

        let res = sqlx::query(
            r"
                INSERT INTO plan_snapshots (
                    plan_date, saved_at, total_sessions, completed_sessions, payload
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(document.current_date().format("%Y-%m-%d").to_string())
        .bind(saved_at)
        .bind(count_i64("total_sessions", progress.total_sessions)?)
        .bind(count_i64("completed_sessions", progress.completed_sessions)?)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn replace_snapshot(
        &self,
        id: SnapshotId,
        document: &PlanDocument,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let payload = handoff::encode(document).map_err(ser)?;
        let progress = document.progress();

        let res = sqlx::query(
            r"
                UPDATE plan_snapshots
                SET plan_date = ?2, saved_at = ?3, total_sessions = ?4,
                    completed_sessions = ?5, payload = ?6
                WHERE id = ?1
            ",
        )
        .bind(id)
        .bind(document.current_date().format("%Y-%m-%d").to_string())
        .bind(saved_at)
        .bind(count_i64("total_sessions", progress.total_sessions)?)
        .bind(count_i64("completed_sessions", progress.completed_sessions)?)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<PlanDocument, StorageError> {
        let row = sqlx::query("SELECT payload FROM plan_snapshots WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        decode_payload(&row)
    }

    async fn latest_snapshot(&self) -> Result<Option<(SnapshotId, PlanDocument)>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, payload
                FROM plan_snapshots
                ORDER BY saved_at DESC, id DESC
                LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => {
                let id: i64 = row.try_get("id").map_err(ser)?;
                Ok(Some((id, decode_payload(&row)?)))
            }
            None => Ok(None),
        }
    }

    async fn list_snapshots(&self, limit: u32) -> Result<Vec<PlanSnapshotRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, plan_date, saved_at, total_sessions, completed_sessions
                FROM plan_snapshots
                ORDER BY saved_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_snapshot_row(&row)?);
        }
        Ok(out)
    }
}
