//! SQLite connection setup for the local store file.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

/// Wait this long for a write lock held by another `bidvault` process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Open the store file at `db_path`, creating it and its directory if needed.
///
/// Call once at process start; every component shares the resulting pool
/// through the store handle.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create data directory {}", dir.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(connect_options(db_path))
        .await
        .with_context(|| format!("Cannot open store file {}", db_path.display()))?;

    tracing::debug!(path = %db_path.display(), "store file opened");
    Ok(pool)
}
