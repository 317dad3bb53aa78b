//! Blob record repository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use tabula_core::{BlobRecord, Error, Result};

use crate::{from_ms, to_ms};

/// SQLite-backed storage for content-addressed blob records. Keys are
/// SHA-256 digests computed by the attachment store; writing an
/// already-present hash is a no-op.
#[derive(Clone, Debug)]
pub struct SqliteBlobRepository {
    pool: SqlitePool,
}

impl SqliteBlobRepository {
    /// Create a new SqliteBlobRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a blob record. Content addressing makes re-inserting the same
    /// hash a no-op; returns whether a new row was written.
    pub async fn put(&self, record: &BlobRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO blob (hash, bytes, mime_type, size_bytes, created_at_ms)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
        )
        .bind(&record.hash)
        .bind(record.bytes.as_slice())
        .bind(&record.mime_type)
        .bind(record.size_bytes)
        .bind(to_ms(record.created_at))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch a blob record by hash.
    pub async fn get(&self, hash: &str) -> Result<BlobRecord> {
        let row = sqlx::query(
            "SELECT hash, bytes, mime_type, size_bytes, created_at_ms FROM blob WHERE hash = ?1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(blob_from_row)
            .transpose()?
            .ok_or_else(|| Error::NotFound(format!("blob {hash}")))
    }

    /// Whether a blob with this hash exists.
    pub async fn exists(&self, hash: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM blob WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.is_some())
    }

    /// Delete a blob. Idempotent.
    pub async fn delete(&self, hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM blob WHERE hash = ?1")
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// All stored hashes, used for orphan reachability.
    pub async fn list_hashes(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT hash FROM blob")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|r| r.get("hash")).collect())
    }

    /// Number of stored blobs.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blob")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("n"))
    }
}

fn blob_from_row(row: SqliteRow) -> Result<BlobRecord> {
    Ok(BlobRecord {
        hash: row.get("hash"),
        bytes: row.get("bytes"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        created_at: from_ms(row.get("created_at_ms"))?,
    })
}
