use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Ordered schema steps. A version is applied at most once.
const MIGRATIONS: &[(i64, &str, &[&str])] = &[(
    1,
    "plan snapshots",
    &[
        r"
        CREATE TABLE IF NOT EXISTS plan_snapshots (
            id INTEGER PRIMARY KEY,
            plan_date TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            total_sessions INTEGER NOT NULL CHECK (total_sessions >= 0),
            completed_sessions INTEGER NOT NULL CHECK (completed_sessions >= 0),
            payload TEXT NOT NULL
        );
        ",
        r"
        CREATE INDEX IF NOT EXISTS idx_plan_snapshots_saved_at
            ON plan_snapshots (saved_at, id);
        ",
    ],
)];

async fn applied_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(latest.unwrap_or(0))
}

/// Brings the schema up to the newest version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;

    let current = applied_version(pool).await?;
    for &(version, label, statements) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)
             ON CONFLICT(version) DO NOTHING",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(version, label, "applied storage migration");
    }

    Ok(())
}
