//! Versioned schema creation.
//!
//! The schema version lives in `PRAGMA user_version`. Opening a database with
//! an older version creates whatever tables and indexes are missing and then
//! stamps [`SCHEMA_VERSION`]; rows already present are never touched. A
//! database stamped by a newer build is refused.

use bidvault_core::error::{Error, Result};
use sqlx::SqlitePool;

use crate::sqlite_store::map_sqlx;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 3;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;

    if current > SCHEMA_VERSION {
        return Err(Error::StoreUnavailable(format!(
            "database schema v{} is newer than supported v{}",
            current, SCHEMA_VERSION
        )));
    }
    if current == SCHEMA_VERSION {
        return Ok(());
    }

    tracing::info!(from = current, to = SCHEMA_VERSION, "upgrading store schema");

    let mut tx = pool.begin().await.map_err(map_sqlx)?;

    // Create vault table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vault (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            category TEXT NOT NULL,
            size TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            kind TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx)?;

    // Create activity table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            size TEXT NOT NULL,
            date TEXT NOT NULL,
            created_ts INTEGER NOT NULL,
            status TEXT NOT NULL,
            results_json TEXT
        )
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx)?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vault_category ON vault(category)")
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_activity_created_ts ON activity(created_ts)")
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

    tx.commit().await.map_err(map_sqlx)?;
    Ok(())
}

/// Read the stamped schema version.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)
}
