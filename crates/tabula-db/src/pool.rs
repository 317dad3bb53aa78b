//! SQLite connection pool management.

use std::path::Path;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use tabula_core::defaults::{DB_BUSY_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use tabula_core::{Error, Result};

/// Create a connection pool for the on-disk store, creating the database
/// file (and its parent directory) when missing.
///
/// Open failures (disk, quota, corruption) surface as
/// [`Error::StoreUnavailable`] so callers can degrade to an in-memory store
/// instead of crashing.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    let start = Instant::now();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::StoreUnavailable(format!(
                "failed to create database parent directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(|e| Error::StoreUnavailable(format!("{}: {e}", db_path.display())))?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        path = %db_path.display(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Local store opened"
    );
    Ok(pool)
}

/// Create an in-memory pool, used as the degraded fallback when the on-disk
/// engine cannot open, and by tests.
///
/// A single connection with no idle reaping: each SQLite `:memory:`
/// connection is its own database, and an idle-closed connection would drop
/// the data.
pub async fn create_pool_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| Error::StoreUnavailable(format!("in-memory store: {e}")))
}
