//! The synchronization engine.
//!
//! The only component that talks to both the local store and the remote
//! drive. One engine instance per process owns the sync locks, the
//! throttle, and the container resolver as explicit fields; callers share
//! it by reference.
//!
//! Failure asymmetry is deliberate: a download failure is recoverable next
//! sync, so the download fan-out fails soft per object, while a partial
//! upload would let the caller believe local changes are synced when they
//! are not, so the upload loop fails fast and loud.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tabula_core::body::strip_images;
use tabula_core::defaults::{
    CONTAINER_NAME, DOWNLOAD_CONCURRENCY, LAST_FULL_SYNC_KEY, MIN_SYNC_INTERVAL_SECS,
    OBJECT_MAP_TTL_SECS,
};
use tabula_core::{
    remote_object_name, CredentialStore, Error, Note, ProgressSink, RemoteDrive, RemoteEnvelope,
    RemoteNote, Result, SyncOutcome, SyncReport, SyncStatus,
};
use tabula_db::Database;

use crate::resolver::ContainerResolver;
use crate::retry::with_default_backoff;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Name of the remote container holding all synced notes.
    pub container_name: String,
    /// Minimum interval between two successful full syncs.
    pub min_sync_interval: Duration,
    /// TTL of the container and object-map caches.
    pub cache_ttl: Duration,
    /// Bounded fan-out width for the download phase.
    pub download_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            container_name: CONTAINER_NAME.to_string(),
            min_sync_interval: Duration::from_secs(MIN_SYNC_INTERVAL_SECS),
            cache_ttl: Duration::from_secs(OBJECT_MAP_TTL_SECS),
            download_concurrency: DOWNLOAD_CONCURRENCY,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TABULA_CONTAINER_NAME` | `Tabula Notes` | Remote container name |
    /// | `TABULA_MIN_SYNC_INTERVAL_SECS` | `30` | Full-sync rate gate |
    /// | `TABULA_CACHE_TTL_SECS` | `60` | Resolver cache TTL |
    /// | `TABULA_DOWNLOAD_CONCURRENCY` | `4` | Download fan-out width |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            container_name: std::env::var("TABULA_CONTAINER_NAME")
                .unwrap_or(defaults.container_name),
            min_sync_interval: std::env::var("TABULA_MIN_SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.min_sync_interval),
            cache_ttl: std::env::var("TABULA_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            download_concurrency: std::env::var("TABULA_DOWNLOAD_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.download_concurrency)
                .max(1),
        }
    }
}

/// State guarded by the full-sync lock. The throttle arms only on success:
/// a failed attempt must stay retryable through the backoff wrapper.
#[derive(Default)]
struct Throttle {
    last_success: Option<Instant>,
}

/// Orchestrates upload, download, and merge between the local store and
/// the remote drive.
pub struct SyncEngine {
    db: Database,
    drive: Arc<dyn RemoteDrive>,
    credentials: Arc<dyn CredentialStore>,
    resolver: Mutex<ContainerResolver>,
    full_lock: Mutex<Throttle>,
    upload_lock: Mutex<()>,
    config: SyncConfig,
    progress: Option<ProgressSink>,
}

impl SyncEngine {
    /// Create an engine with default configuration.
    pub fn new(
        db: Database,
        drive: Arc<dyn RemoteDrive>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::with_config(db, drive, credentials, SyncConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(
        db: Database,
        drive: Arc<dyn RemoteDrive>,
        credentials: Arc<dyn CredentialStore>,
        config: SyncConfig,
    ) -> Self {
        let resolver = ContainerResolver::new(
            Arc::clone(&drive),
            config.container_name.clone(),
            config.cache_ttl,
        );
        Self {
            db,
            drive,
            credentials,
            resolver: Mutex::new(resolver),
            full_lock: Mutex::new(Throttle::default()),
            upload_lock: Mutex::new(()),
            config,
            progress: None,
        }
    }

    /// Attach a per-document progress callback, invoked during both the
    /// download and upload phases.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    fn emit(&self, note_id: &str, label: &str, status: SyncStatus) {
        if let Some(sink) = &self.progress {
            sink(note_id, label, status);
        }
    }

    /// Full reconciliation: download every remote note, merge by recency,
    /// persist, and upload the merged set.
    ///
    /// Returns a no-op outcome (never queues) when another full sync holds
    /// the lock or the minimum inter-sync interval has not elapsed.
    pub async fn full_sync(&self) -> Result<SyncOutcome> {
        let mut throttle = match self.full_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(
                    subsystem = "sync",
                    op = "full_sync",
                    "Sync already in flight, skipping"
                );
                return Ok(SyncOutcome::SkippedLockBusy);
            }
        };
        if let Some(last) = throttle.last_success {
            if last.elapsed() < self.config.min_sync_interval {
                debug!(
                    subsystem = "sync",
                    op = "full_sync",
                    "Inside minimum sync interval, skipping"
                );
                return Ok(SyncOutcome::SkippedThrottled);
            }
        }
        let started = Instant::now();

        if self.credentials.get_valid().await?.is_none() {
            return Err(Error::NotSignedIn);
        }

        let container_id = self.resolve_or_create_container().await?;
        let object_map = self
            .resolver
            .lock()
            .await
            .object_map(&container_id)
            .await?;

        // Download fan-out: bounded concurrency, every fetch completes
        // (success or failure) before the merge proceeds.
        let (downloaded, failed_downloads) = self.download_remote(&object_map).await;
        let downloaded_count = downloaded.len();

        // Merge: seed with local notes, remote wins only on strictly newer
        // updated_at. The tie keeps local.
        let locals = self.db.notes.list_all().await?;
        let mut merged: HashMap<String, Note> =
            locals.into_iter().map(|n| (n.id.clone(), n)).collect();
        let mut merged_remote = 0usize;
        for remote in downloaded {
            let candidate: Note = remote.into();
            let keep_local = merged
                .get(&candidate.id)
                .is_some_and(|local| candidate.updated_at <= local.updated_at);
            if !keep_local {
                merged.insert(candidate.id.clone(), candidate);
                merged_remote += 1;
            }
        }

        for note in merged.values() {
            self.db.notes.put(note).await?;
        }

        // Upload: newest first, fail fast. A single failure aborts the rest
        // of the batch and propagates.
        let mut ordered: Vec<&Note> = merged.values().collect();
        ordered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));

        let mut uploaded = 0usize;
        let mut upload_error: Option<Error> = None;
        for note in ordered {
            self.emit(&note.id, &note.title, SyncStatus::Syncing);
            match self.upload_note(&container_id, &object_map, note).await {
                Ok(()) => {
                    uploaded += 1;
                    self.emit(&note.id, &note.title, SyncStatus::Complete);
                }
                Err(e) => {
                    self.emit(&note.id, &note.title, SyncStatus::Error);
                    upload_error = Some(e);
                    break;
                }
            }
        }
        if uploaded > 0 || upload_error.is_some() {
            // The listing no longer reflects reality after any remote
            // mutation attempt.
            self.resolver.lock().await.invalidate();
        }
        if let Some(e) = upload_error {
            return Err(e);
        }

        self.db
            .metadata
            .set(LAST_FULL_SYNC_KEY, &Utc::now().timestamp_millis().to_string())
            .await?;
        throttle.last_success = Some(Instant::now());

        let report = SyncReport {
            downloaded: downloaded_count,
            failed_downloads,
            merged_remote,
            uploaded,
        };
        info!(
            subsystem = "sync",
            op = "full_sync",
            duration_ms = started.elapsed().as_millis() as u64,
            downloaded = report.downloaded,
            failed_downloads = report.failed_downloads,
            merged_remote = report.merged_remote,
            uploaded = report.uploaded,
            "Full sync complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// Full sync behind the backoff wrapper. Each attempt re-enters the
    /// same lock and throttle gate.
    pub async fn full_sync_with_retry(&self) -> Result<SyncOutcome> {
        with_default_backoff("full_sync", || self.full_sync()).await
    }

    /// Autosave path: straight create-or-update for the given notes, no
    /// download or merge, so a concurrent full reconciliation cannot
    /// clobber an in-progress edit. Holds its own lock, independent of
    /// `full_sync`'s.
    pub async fn upload_only(&self, notes: &[Note]) -> Result<SyncOutcome> {
        let _guard = match self.upload_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(
                    subsystem = "sync",
                    op = "upload_only",
                    "Upload already in flight, skipping"
                );
                return Ok(SyncOutcome::SkippedLockBusy);
            }
        };

        if self.credentials.get_valid().await?.is_none() {
            return Err(Error::NotSignedIn);
        }

        let container_id = self.resolve_or_create_container().await?;
        let object_map = self
            .resolver
            .lock()
            .await
            .object_map(&container_id)
            .await?;

        let mut uploaded = 0usize;
        let mut upload_error: Option<Error> = None;
        for note in notes {
            self.emit(&note.id, &note.title, SyncStatus::Syncing);
            match self.upload_note(&container_id, &object_map, note).await {
                Ok(()) => {
                    uploaded += 1;
                    self.emit(&note.id, &note.title, SyncStatus::Complete);
                }
                Err(e) => {
                    self.emit(&note.id, &note.title, SyncStatus::Error);
                    upload_error = Some(e);
                    break;
                }
            }
        }
        if uploaded > 0 || upload_error.is_some() {
            self.resolver.lock().await.invalidate();
        }
        if let Some(e) = upload_error {
            return Err(e);
        }

        Ok(SyncOutcome::Completed(SyncReport {
            uploaded,
            ..SyncReport::default()
        }))
    }

    async fn resolve_or_create_container(&self) -> Result<String> {
        let mut resolver = self.resolver.lock().await;
        match resolver.resolve_container().await {
            Ok(id) => Ok(id),
            Err(Error::NotFound(_)) => {
                info!(
                    subsystem = "sync",
                    op = "resolve_container",
                    "Remote container missing, creating"
                );
                resolver.create_container().await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch and decode every mapped remote object. Per-object failures are
    /// logged, reported through the progress sink, and excluded from the
    /// merge; the batch always continues.
    async fn download_remote(
        &self,
        object_map: &HashMap<String, String>,
    ) -> (Vec<RemoteNote>, usize) {
        let mut fetches = Vec::with_capacity(object_map.len());
        for (local_id, remote_id) in object_map {
            self.emit(local_id, local_id, SyncStatus::Syncing);
            let drive = Arc::clone(&self.drive);
            let local_id = local_id.clone();
            let remote_id = remote_id.clone();
            fetches.push(async move {
                let result = match drive.get_object_content(&remote_id).await {
                    Ok(bytes) => RemoteEnvelope::decode(&bytes),
                    Err(e) => Err(e),
                };
                (local_id, result)
            });
        }

        let results: Vec<(String, Result<RemoteNote>)> = stream::iter(fetches)
            .buffer_unordered(self.config.download_concurrency.max(1))
            .collect()
            .await;

        let mut notes = Vec::new();
        let mut failed = 0usize;
        for (local_id, result) in results {
            match result {
                Ok(note) => {
                    self.emit(&local_id, &note.name, SyncStatus::Complete);
                    notes.push(note);
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        subsystem = "sync",
                        op = "download",
                        note_id = %local_id,
                        error = %e,
                        "Remote object failed, continuing with the rest"
                    );
                    self.emit(&local_id, &local_id, SyncStatus::Error);
                }
            }
        }
        (notes, failed)
    }

    /// Upload one note: strip local images, wrap in a fresh envelope, then
    /// create or update depending on the object map. Updates rename the
    /// object so remote names track the latest title.
    async fn upload_note(
        &self,
        container_id: &str,
        object_map: &HashMap<String, String>,
        note: &Note,
    ) -> Result<()> {
        let outbound = Note {
            body: strip_images(note.body.clone()),
            ..note.clone()
        };
        let payload = serde_json::to_vec(&RemoteEnvelope::wrap(&outbound))?;
        let name = remote_object_name(&note.title, &note.id);

        match object_map.get(&note.id) {
            Some(remote_id) => {
                self.drive.update_object(remote_id, &name, &payload).await?;
            }
            None => {
                self.drive
                    .create_object(container_id, &name, &payload)
                    .await?;
            }
        }
        Ok(())
    }
}
