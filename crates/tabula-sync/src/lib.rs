//! # tabula-sync
//!
//! Remote synchronization engine for the Tabula note engine.
//!
//! This crate provides:
//! - The HTTP drive client behind the narrow [`RemoteDrive`] boundary
//! - Container resolution with a time-boxed object-name map
//! - The synchronization engine: locking, throttling, merge, and retry
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabula_db::Database;
//! use tabula_sync::{HttpDrive, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("tabula.db".as_ref()).await?;
//!     let credentials = Arc::new(db.credentials.clone());
//!     let drive = Arc::new(HttpDrive::new(credentials.clone()));
//!     let engine = SyncEngine::new(db, drive, credentials);
//!     engine.full_sync_with_retry().await?;
//!     Ok(())
//! }
//! ```

pub mod drive;
pub mod engine;
pub mod resolver;
pub mod retry;

// Re-export core types
pub use tabula_core::{RemoteDrive, SyncOutcome, SyncReport, SyncStatus};

pub use drive::HttpDrive;
pub use engine::{SyncConfig, SyncEngine};
pub use resolver::ContainerResolver;
pub use retry::{with_backoff, with_default_backoff};
