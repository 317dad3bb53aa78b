//! Note repository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use tabula_core::{Error, Note, Result};

use crate::{from_ms, to_ms};

/// SQLite-backed note repository: durable CRUD with no knowledge of remote
/// state.
#[derive(Clone, Debug)]
pub struct SqliteNoteRepository {
    pool: SqlitePool,
}

impl SqliteNoteRepository {
    /// Create a new SqliteNoteRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a note by id, persisted immediately (no write-behind).
    pub async fn put(&self, note: &Note) -> Result<()> {
        let body = serde_json::to_string(&note.body)?;
        sqlx::query(
            r#"INSERT INTO note (id, title, body, created_at_ms, updated_at_ms)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   body = excluded.body,
                   created_at_ms = excluded.created_at_ms,
                   updated_at_ms = excluded.updated_at_ms"#,
        )
        .bind(&note.id)
        .bind(&note.title)
        .bind(body)
        .bind(to_ms(note.created_at))
        .bind(to_ms(note.updated_at))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Fetch a note by id.
    pub async fn get(&self, id: &str) -> Result<Note> {
        let row = sqlx::query(
            "SELECT id, title, body, created_at_ms, updated_at_ms FROM note WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(note_from_row)
            .transpose()?
            .ok_or_else(|| Error::NotFound(format!("note {id}")))
    }

    /// List every note, newest first. The ordering rides the
    /// `idx_note_updated_at` index rather than an in-memory sort.
    pub async fn list_all(&self) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            "SELECT id, title, body, created_at_ms, updated_at_ms FROM note
             ORDER BY updated_at_ms DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(note_from_row).collect()
    }

    /// Delete a note. Idempotent: deleting a missing id is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM note WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Number of stored notes.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM note")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("n"))
    }
}

fn note_from_row(row: SqliteRow) -> Result<Note> {
    let id: String = row.get("id");
    let body: String = row.get("body");
    let body = serde_json::from_str(&body)
        .map_err(|e| Error::Corrupt(format!("note {id} body failed to decode: {e}")))?;
    Ok(Note {
        id,
        title: row.get("title"),
        body,
        created_at: from_ms(row.get("created_at_ms"))?,
        updated_at: from_ms(row.get("updated_at_ms"))?,
    })
}
