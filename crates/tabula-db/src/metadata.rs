//! Auxiliary key-value metadata table for cursors and flags.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use tabula_core::{Error, Result};

use crate::to_ms;

/// Small key-value table for sync cursors and flags (e.g. the last full
/// sync timestamp).
#[derive(Clone, Debug)]
pub struct SqliteMetadataRepository {
    pool: SqlitePool,
}

impl SqliteMetadataRepository {
    /// Create a new SqliteMetadataRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a metadata value.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO metadata (key, value, updated_at_ms)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at_ms = excluded.updated_at_ms"#,
        )
        .bind(key)
        .bind(value)
        .bind(to_ms(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Fetch a metadata value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("value")))
    }
}
