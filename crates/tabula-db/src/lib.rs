//! # tabula-db
//!
//! SQLite storage layer for the Tabula note engine.
//!
//! This crate provides:
//! - Connection pool management for the device-local store
//! - Note, blob, and metadata repositories
//! - The content-addressed attachment store with body rewriting
//! - Bearer credential persistence
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabula_db::Database;
//! use tabula_core::Note;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("tabula.db".as_ref()).await?;
//!     let note = Note::new("Groceries", vec![]);
//!     db.notes.put(&note).await?;
//!     Ok(())
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use tabula_core::{Error, Result};

pub mod attachments;
pub mod blobs;
pub mod credentials;
pub mod metadata;
pub mod notes;
pub mod pool;

// Re-export core types
pub use tabula_core::*;

// Re-export repository implementations
pub use attachments::{compute_content_hash, AttachmentStore};
pub use blobs::SqliteBlobRepository;
pub use credentials::SqliteCredentialStore;
pub use metadata::SqliteMetadataRepository;
pub use notes::SqliteNoteRepository;
pub use pool::{create_pool, create_pool_in_memory};

/// Convert a timestamp to the epoch-ms representation stored in SQLite.
pub(crate) fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert a stored epoch-ms value back to a timestamp.
pub(crate) fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Corrupt(format!("timestamp out of range: {ms}")))
}

/// Combined local store with all repositories.
#[derive(Clone, Debug)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::SqlitePool,
    /// Note repository for CRUD operations.
    pub notes: SqliteNoteRepository,
    /// Blob record repository.
    pub blobs: SqliteBlobRepository,
    /// Auxiliary key-value metadata table.
    pub metadata: SqliteMetadataRepository,
    /// Bearer credential persistence.
    pub credentials: SqliteCredentialStore,
    /// Content-addressed attachment store.
    pub attachments: AttachmentStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            notes: SqliteNoteRepository::new(pool.clone()),
            blobs: SqliteBlobRepository::new(pool.clone()),
            metadata: SqliteMetadataRepository::new(pool.clone()),
            credentials: SqliteCredentialStore::new(pool.clone()),
            attachments: AttachmentStore::new(pool.clone()),
            pool,
        }
    }

    /// Open (or create) the on-disk store at `path` and apply migrations.
    pub async fn connect(path: &Path) -> Result<Self> {
        let pool = create_pool(path).await?;
        Self::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Open an in-memory store (tests, and the degraded fallback).
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = create_pool_in_memory().await?;
        Self::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Open the on-disk store, degrading to in-memory-only operation with a
    /// surfaced warning when the storage engine is unavailable. Data written
    /// in degraded mode does not survive the process.
    pub async fn connect_or_memory(path: &Path) -> Result<Self> {
        match Self::connect(path).await {
            Ok(db) => Ok(db),
            Err(Error::StoreUnavailable(reason)) => {
                warn!(
                    subsystem = "db",
                    op = "connect",
                    error = %reason,
                    "Local store unavailable, degrading to in-memory operation"
                );
                Self::connect_in_memory().await
            }
            Err(e) => Err(e),
        }
    }

    async fn migrate(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("migration failed: {e}")))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}
