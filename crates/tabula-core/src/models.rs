//! Core data models for the Tabula note engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::body::NoteBody;
use crate::defaults;

// =============================================================================
// LOCAL MODELS
// =============================================================================

/// A note as held in the local store. The body is a block tree owned by the
/// editing surface; the engine only inspects it through the rewrite
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Opaque id, assigned at creation and never reused.
    pub id: String,
    pub title: String,
    pub body: NoteBody,
    pub created_at: DateTime<Utc>,
    /// Strictly increases on every local mutation; the sole
    /// conflict-resolution signal during merge.
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a new note with a fresh time-ordered id.
    pub fn new(title: impl Into<String>, body: NoteBody) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at` for a local mutation, keeping it strictly increasing
    /// even under coarse clocks.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::milliseconds(1)
        };
    }
}

/// A content-addressed binary attachment. The key is always the SHA-256 of
/// the bytes, never assigned externally. Blobs are local-only: nothing ever
/// marks one as remote.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRecord {
    /// SHA-256 hex digest (64 chars) of `bytes`.
    pub hash: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Process-local handle for rendering a blob. Not persisted; must be
/// explicitly released. One handle is cached per hash for the process
/// lifetime.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    /// The `tabula-display://` URI substituted into note bodies for render.
    pub uri: String,
    /// Hash of the blob this handle resolves to.
    pub hash: String,
    pub mime_type: String,
    pub bytes: Arc<Vec<u8>>,
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Token object handed over by the (external) authorization flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Advertised lifetime in seconds.
    pub expires_in: i64,
    pub scope: String,
    pub token_type: String,
}

/// A persisted bearer credential. `expires_at` already includes the expiry
/// buffer, so `is_expired` is a plain comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub scope: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    /// SHA-256 of the access token; never the raw user identity.
    pub subject_hash: String,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// =============================================================================
// REMOTE WIRE MODELS
// =============================================================================

/// A remote object as reported by the drive listing. Every drive call that
/// returns object metadata returns this one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveObject {
    pub id: String,
    pub name: String,
    pub modified_time: Option<DateTime<Utc>>,
}

/// Wire form of a note inside the sync envelope. Field names and epoch-ms
/// timestamps are a compatibility contract with previously stored data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    pub id: String,
    pub name: String,
    pub content: NoteBody,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated_at: DateTime<Utc>,
}

impl From<&Note> for RemoteNote {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            name: note.title.clone(),
            content: note.body.clone(),
            created_at: note.created_at,
            last_updated_at: note.updated_at,
        }
    }
}

impl From<RemoteNote> for Note {
    fn from(remote: RemoteNote) -> Self {
        Self {
            id: remote.id,
            title: remote.name,
            body: remote.content,
            created_at: remote.created_at,
            updated_at: remote.last_updated_at,
        }
    }
}

/// Sync bookkeeping stamped alongside every uploaded note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_sync: DateTime<Utc>,
    pub version: String,
    pub app_version: String,
}

impl SyncMetadata {
    pub fn stamp() -> Self {
        Self {
            last_sync: Utc::now(),
            version: defaults::ENVELOPE_VERSION.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The envelope persisted remotely. Older versions stored a bare
/// [`RemoteNote`] at the top level; [`RemoteEnvelope::decode`] accepts both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEnvelope {
    pub note: RemoteNote,
    pub sync_metadata: SyncMetadata,
}

impl RemoteEnvelope {
    pub fn wrap(note: &Note) -> Self {
        Self {
            note: RemoteNote::from(note),
            sync_metadata: SyncMetadata::stamp(),
        }
    }

    /// Decode remote object content, falling back to the legacy bare-note
    /// format. The legacy path is a permanent read-compatibility shim.
    pub fn decode(bytes: &[u8]) -> crate::error::Result<RemoteNote> {
        if let Ok(envelope) = serde_json::from_slice::<RemoteEnvelope>(bytes) {
            return Ok(envelope.note);
        }
        serde_json::from_slice::<RemoteNote>(bytes).map_err(|e| {
            crate::error::Error::Corrupt(format!("remote object decodes as neither envelope nor bare note: {e}"))
        })
    }
}

// =============================================================================
// SYNC OUTCOMES & PROGRESS
// =============================================================================

/// Per-document status reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Complete,
    Error,
}

/// Callback invoked per document during the download and upload phases, so a
/// UI can render progress. Arguments: document id, human label, status.
pub type ProgressSink = Arc<dyn Fn(&str, &str, SyncStatus) + Send + Sync>;

/// Summary of a completed full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote objects successfully downloaded and decoded.
    pub downloaded: usize,
    /// Remote objects that failed to download or decode (fail-soft).
    pub failed_downloads: usize,
    /// Notes where the remote version won the merge.
    pub merged_remote: usize,
    /// Notes uploaded (created or updated) this cycle.
    pub uploaded: usize,
}

/// Outcome of a sync attempt. Lock-busy and rate-gate returns are no-ops to
/// the caller, not errors: a later periodic or user-triggered call retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another sync of the same kind was already in flight.
    SkippedLockBusy,
    /// The minimum inter-sync interval has not elapsed.
    SkippedThrottled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyNode;
    use chrono::TimeZone;

    #[test]
    fn touch_is_strictly_increasing() {
        let mut note = Note::new("t", vec![]);
        let first = note.updated_at;
        note.touch();
        assert!(note.updated_at > first);
    }

    #[test]
    fn envelope_round_trip() {
        let note = Note {
            id: "note-1".into(),
            title: "Groceries".into(),
            body: vec![BodyNode::text("milk")],
            created_at: Utc.timestamp_millis_opt(1_000).unwrap(),
            updated_at: Utc.timestamp_millis_opt(2_000).unwrap(),
        };
        let bytes = serde_json::to_vec(&RemoteEnvelope::wrap(&note)).unwrap();
        let decoded = RemoteEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded.id, "note-1");
        assert_eq!(decoded.name, "Groceries");
        assert_eq!(decoded.last_updated_at, note.updated_at);
    }

    #[test]
    fn envelope_wire_uses_epoch_ms() {
        let note = Note {
            id: "note-1".into(),
            title: "t".into(),
            body: vec![],
            created_at: Utc.timestamp_millis_opt(1_000).unwrap(),
            updated_at: Utc.timestamp_millis_opt(2_000).unwrap(),
        };
        let value = serde_json::to_value(RemoteEnvelope::wrap(&note)).unwrap();
        assert_eq!(value["note"]["createdAt"], 1_000);
        assert_eq!(value["note"]["lastUpdatedAt"], 2_000);
        assert_eq!(value["syncMetadata"]["version"], defaults::ENVELOPE_VERSION);
    }

    #[test]
    fn decode_accepts_legacy_bare_note() {
        let legacy = serde_json::json!({
            "id": "note-7",
            "name": "Old note",
            "content": [],
            "createdAt": 1_000,
            "lastUpdatedAt": 2_000
        });
        let decoded = RemoteEnvelope::decode(legacy.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.id, "note-7");
    }

    #[test]
    fn decode_rejects_garbage_as_corrupt() {
        let err = RemoteEnvelope::decode(b"{\"nope\": true}").unwrap_err();
        assert!(matches!(err, crate::error::Error::Corrupt(_)));
    }

    #[test]
    fn credential_expiry_comparison() {
        let cred = Credential {
            access_token: "t".into(),
            scope: "drive.file".into(),
            token_type: "Bearer".into(),
            expires_at: Utc.timestamp_millis_opt(10_000).unwrap(),
            subject_hash: "h".into(),
        };
        assert!(!cred.is_expired(Utc.timestamp_millis_opt(9_999).unwrap()));
        assert!(cred.is_expired(Utc.timestamp_millis_opt(10_001).unwrap()));
    }
}
