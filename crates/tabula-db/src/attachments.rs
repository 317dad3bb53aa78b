//! Content-addressed attachment store with SHA-256 deduplication.
//!
//! Turns binary attachments into hash-keyed blob records and rewrites note
//! bodies between their three representations: inline binary (input-only),
//! hash-reference (storage form), and display handle (render form). The
//! separation is what keeps images strictly local: the sync layer only ever
//! sees hash-references, never raw bytes or ephemeral handles.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use hex;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use tabula_core::body::{
    collect_urls, extract_references, hash_from_reference, is_display_url, make_reference,
    map_urls, parse_data_uri,
};
use tabula_core::defaults::{ALLOWED_IMAGE_TYPES, DISPLAY_SCHEME, MAX_ATTACHMENT_BYTES};
use tabula_core::{BlobRecord, DisplayHandle, Error, NoteBody, Result};

use crate::blobs::SqliteBlobRepository;
use crate::notes::SqliteNoteRepository;

/// Compute the SHA-256 hex digest of data.
pub fn compute_content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Process-local 1:1 mapping between blob hashes and display handles.
/// Nothing here is persisted; handles die with the process or on release.
#[derive(Default, Debug)]
struct DisplayRegistry {
    by_hash: HashMap<String, DisplayHandle>,
    hash_by_uri: HashMap<String, String>,
}

/// Attachment store: validation, dedup-on-write, and body rewriting.
#[derive(Clone, Debug)]
pub struct AttachmentStore {
    blobs: SqliteBlobRepository,
    notes: SqliteNoteRepository,
    registry: Arc<Mutex<DisplayRegistry>>,
}

impl AttachmentStore {
    /// Create a new AttachmentStore over the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            blobs: SqliteBlobRepository::new(pool.clone()),
            notes: SqliteNoteRepository::new(pool),
            registry: Arc::new(Mutex::new(DisplayRegistry::default())),
        }
    }

    /// Store an attachment, deduplicating by content hash.
    ///
    /// The claimed MIME type is checked against magic bytes first: a
    /// detectable type overrides the claim, and an image claim without
    /// recognizable magic bytes is rejected rather than trusted. The
    /// effective type must be on the allow-list and the payload under the
    /// size cap, or the call fails with `InvalidAttachment`.
    pub async fn store(&self, bytes: &[u8], claimed_mime: &str) -> Result<String> {
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(Error::InvalidAttachment(format!(
                "attachment of {} bytes exceeds maximum of {} bytes",
                bytes.len(),
                MAX_ATTACHMENT_BYTES
            )));
        }

        let effective_mime = match infer::get(bytes) {
            Some(kind) => kind.mime_type().to_string(),
            None if claimed_mime.starts_with("image/") => {
                return Err(Error::InvalidAttachment(format!(
                    "content does not match claimed type {claimed_mime}"
                )));
            }
            None => claimed_mime.to_string(),
        };

        if !ALLOWED_IMAGE_TYPES.contains(&effective_mime.as_str()) {
            return Err(Error::InvalidAttachment(format!(
                "type {effective_mime} is not allowed"
            )));
        }

        let hash = compute_content_hash(bytes);
        let record = BlobRecord {
            hash: hash.clone(),
            bytes: bytes.to_vec(),
            mime_type: effective_mime,
            size_bytes: bytes.len() as i64,
            created_at: Utc::now(),
        };

        let inserted = self.blobs.put(&record).await?;
        if !inserted {
            debug!(
                subsystem = "attachments",
                op = "store",
                blob_hash = %hash,
                "Identical content already stored, reusing record"
            );
        }
        Ok(hash)
    }

    /// Resolve a blob hash to a display handle, reusing the cached handle
    /// for repeated lookups within this process.
    pub async fn resolve_to_display(&self, hash: &str) -> Result<DisplayHandle> {
        if let Some(handle) = self.registry.lock().expect("display registry poisoned").by_hash.get(hash) {
            return Ok(handle.clone());
        }

        let record = self.blobs.get(hash).await?;
        let handle = DisplayHandle {
            uri: format!("{DISPLAY_SCHEME}{}", Uuid::new_v4().simple()),
            hash: hash.to_string(),
            mime_type: record.mime_type,
            bytes: Arc::new(record.bytes),
        };

        let mut registry = self.registry.lock().expect("display registry poisoned");
        // A concurrent resolve may have raced us here; keep the first handle
        // so the 1:1 mapping holds.
        if let Some(existing) = registry.by_hash.get(hash) {
            return Ok(existing.clone());
        }
        registry
            .hash_by_uri
            .insert(handle.uri.clone(), hash.to_string());
        registry.by_hash.insert(hash.to_string(), handle.clone());
        Ok(handle)
    }

    /// Release display handles. Safe to call repeatedly on the same handle.
    pub fn release_display(&self, handles: &[DisplayHandle]) {
        let mut registry = self.registry.lock().expect("display registry poisoned");
        for handle in handles {
            registry.by_hash.remove(&handle.hash);
            registry.hash_by_uri.remove(&handle.uri);
        }
    }

    /// Replace inline binary attachments with hash-references, storing each
    /// payload. Runs on content arriving from the editing surface before
    /// local persistence. Validation failures propagate.
    pub async fn rewrite_inline_to_reference(&self, body: NoteBody) -> Result<NoteBody> {
        let mut mapping: HashMap<String, String> = HashMap::new();
        for url in collect_urls(&body) {
            if mapping.contains_key(&url) {
                continue;
            }
            if let Some((mime, bytes)) = parse_data_uri(&url) {
                let hash = self.store(&bytes, &mime).await?;
                mapping.insert(url, make_reference(&hash));
            }
        }
        Ok(map_urls(body, &|url| mapping.get(url).cloned()))
    }

    /// Replace hash-references with display handles for rendering. A
    /// reference that fails to resolve is logged and left in place: one
    /// broken image must not fail the whole note.
    pub async fn rewrite_reference_to_display(&self, body: NoteBody) -> Result<NoteBody> {
        let mut mapping: HashMap<String, String> = HashMap::new();
        for url in collect_urls(&body) {
            if mapping.contains_key(&url) {
                continue;
            }
            let Some(hash) = hash_from_reference(&url) else {
                continue;
            };
            match self.resolve_to_display(hash).await {
                Ok(handle) => {
                    mapping.insert(url, handle.uri);
                }
                Err(e) => {
                    warn!(
                        subsystem = "attachments",
                        op = "rewrite_reference_to_display",
                        blob_hash = %hash,
                        error = %e,
                        "Reference failed to resolve, leaving in place"
                    );
                }
            }
        }
        Ok(map_urls(body, &|url| mapping.get(url).cloned()))
    }

    /// Replace display handles with hash-references before persisting edits
    /// back to the local store. Inline payloads encountered here are stored
    /// as new blobs so content is never silently dropped; a display handle
    /// this store did not produce is logged and left in place.
    pub async fn rewrite_display_to_reference(&self, body: NoteBody) -> Result<NoteBody> {
        let mut mapping: HashMap<String, String> = HashMap::new();
        for url in collect_urls(&body) {
            if mapping.contains_key(&url) {
                continue;
            }
            if is_display_url(&url) {
                let known = self
                    .registry
                    .lock()
                    .expect("display registry poisoned")
                    .hash_by_uri
                    .get(&url)
                    .cloned();
                match known {
                    Some(hash) => {
                        mapping.insert(url, make_reference(&hash));
                    }
                    None => {
                        warn!(
                            subsystem = "attachments",
                            op = "rewrite_display_to_reference",
                            url = %url,
                            "Display handle not produced by this store, leaving in place"
                        );
                    }
                }
            } else if let Some((mime, bytes)) = parse_data_uri(&url) {
                let hash = self.store(&bytes, &mime).await?;
                mapping.insert(url, make_reference(&hash));
            }
        }
        Ok(map_urls(body, &|url| mapping.get(url).cloned()))
    }

    /// Stored hashes that no note references: the set difference between
    /// all blob hashes and the union of references across all notes.
    pub async fn find_orphans(&self) -> Result<HashSet<String>> {
        let stored: HashSet<String> = self.blobs.list_hashes().await?.into_iter().collect();
        let mut referenced: HashSet<String> = HashSet::new();
        for note in self.notes.list_all().await? {
            referenced.extend(extract_references(&note.body));
        }
        Ok(stored.difference(&referenced).cloned().collect())
    }

    /// Delete every orphaned blob and report how many were removed.
    pub async fn collect_garbage(&self) -> Result<usize> {
        let orphans = self.find_orphans().await?;
        for hash in &orphans {
            self.blobs.delete(hash).await?;
        }
        if !orphans.is_empty() {
            debug!(
                subsystem = "attachments",
                op = "collect_garbage",
                result_count = orphans.len(),
                "Removed orphaned blobs"
            );
        }
        Ok(orphans.len())
    }
}
