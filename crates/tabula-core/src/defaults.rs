//! Centralized default constants for the Tabula engine.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates should reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// REMOTE CONTAINER
// =============================================================================

/// Name of the remote container holding all synced notes.
/// Configurable via `TABULA_CONTAINER_NAME` env var.
pub const CONTAINER_NAME: &str = "Tabula Notes";

/// Lifetime of the resolved container id and the object-name map, in seconds.
/// After this window the next access triggers a fresh remote listing.
pub const OBJECT_MAP_TTL_SECS: u64 = 60;

// =============================================================================
// SYNC ENGINE
// =============================================================================

/// Minimum interval between two successful full syncs, in seconds. A call
/// arriving inside the window is a no-op, not a queued execution.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 30;

/// Number of remote objects fetched concurrently during the download phase.
pub const DOWNLOAD_CONCURRENCY: usize = 4;

/// Base delay for the caller-facing retry wrapper (doubles per attempt).
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Maximum attempts for the caller-facing retry wrapper.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Rate-limited responses back off at this multiple of the transient delay.
pub const RATE_LIMITED_BACKOFF_MULTIPLIER: u32 = 2;

/// Metadata key recording the epoch-ms timestamp of the last successful
/// full sync. Consumed by the (external) UI to nag about staleness.
pub const LAST_FULL_SYNC_KEY: &str = "tabula-last-full-sync";

/// Version stamped into the sync envelope.
pub const ENVELOPE_VERSION: &str = "1.0";

// =============================================================================
// REMOTE NAMING
// =============================================================================

/// Maximum length of the sanitized title prefix in a remote object name.
pub const REMOTE_NAME_TITLE_MAX: usize = 50;

// =============================================================================
// DRIVE API
// =============================================================================

/// Default drive API base URL (metadata and listing calls).
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Default drive upload base URL (content upload calls).
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Per-request HTTP timeout in seconds. There is no explicit per-sync
/// deadline; this bounds each remote call instead.
pub const DRIVE_HTTP_TIMEOUT_SECS: u64 = 30;

/// Page size for remote object listings.
pub const DRIVE_LIST_PAGE_SIZE: u32 = 1000;

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Maximum attachment size in bytes (10 MB).
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted by the attachment store. Everything else is rejected
/// as an invalid attachment.
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// URL scheme of a durable hash-reference inside a note body.
pub const HASH_REF_SCHEME: &str = "tabula-blob:";

/// URL scheme of an ephemeral display handle inside a note body.
pub const DISPLAY_SCHEME: &str = "tabula-display://";

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Seconds subtracted from the advertised token lifetime, so a token is
/// treated as expired slightly before the remote service would reject it.
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 300;

// =============================================================================
// LOCAL STORE
// =============================================================================

/// SQLite busy timeout in seconds.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Maximum connections in the local store pool.
pub const DB_MAX_CONNECTIONS: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_schedule_is_bounded() {
        const {
            assert!(RETRY_MAX_ATTEMPTS >= 1);
            assert!(RATE_LIMITED_BACKOFF_MULTIPLIER > 1);
        }
    }

    #[test]
    fn allowed_types_are_images() {
        for mime in ALLOWED_IMAGE_TYPES {
            assert!(mime.starts_with("image/"), "unexpected type {mime}");
        }
    }

    #[test]
    fn schemes_are_distinct() {
        assert_ne!(HASH_REF_SCHEME, DISPLAY_SCHEME);
        assert!(!HASH_REF_SCHEME.starts_with(DISPLAY_SCHEME));
        assert!(!DISPLAY_SCHEME.starts_with(HASH_REF_SCHEME));
    }
}
