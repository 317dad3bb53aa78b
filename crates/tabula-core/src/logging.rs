//! Structured logging schema and field name constants for Tabula.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Data at risk, requires user attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, sync completions |
//! | DEBUG | Decision points, cache hits/misses, config choices |
//! | TRACE | Per-object iteration during sync |

use tracing_subscriber::EnvFilter;

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "attachments", "sync", "drive", "credentials"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "resolver", "engine", "pool", "display_registry"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "full_sync", "upload_only", "store", "resolve_container"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note id being operated on.
pub const NOTE_ID: &str = "note_id";

/// Content hash of a blob.
pub const BLOB_HASH: &str = "blob_hash";

/// Remote container id.
pub const CONTAINER_ID: &str = "container_id";

/// Remote object id.
pub const OBJECT_ID: &str = "object_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items processed by an operation.
pub const RESULT_COUNT: &str = "result_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Initialize the global tracing subscriber from `RUST_LOG` (defaulting to
/// `info`). Safe to call once per process; embedding applications that
/// install their own subscriber should skip this.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
