//! Boundary traits for the Tabula engine.
//!
//! These traits define the seams between the engine and its collaborators,
//! enabling pluggable backends and testability: the credential backing store
//! is chosen transparently, and the remote drive is one narrow interface
//! with one typed response shape.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Credential, DriveObject, TokenResponse};

/// Persists a bearer token across process restarts with expiry semantics.
///
/// Implementations provide their own single-record atomicity: the store is
/// read and written outside the sync locks (e.g. on sign-in).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a freshly issued token. The stored expiry is
    /// `now + expires_in - buffer`, so the token reads as expired slightly
    /// before the remote service would reject it.
    async fn save(&self, token: TokenResponse) -> Result<Credential>;

    /// Return the stored credential, or `None` (clearing storage) once it
    /// has passed its buffered expiry.
    async fn get_valid(&self) -> Result<Option<Credential>>;

    /// Delete the persisted record. Idempotent.
    async fn clear(&self) -> Result<()>;
}

/// The remote drive boundary. One concrete implementation issues HTTP
/// requests directly; tests substitute an in-memory drive.
///
/// Every call that returns object metadata returns [`DriveObject`] —
/// callers never branch on response shape.
#[async_trait]
pub trait RemoteDrive: Send + Sync {
    /// List containers whose name matches exactly.
    async fn list_containers(&self, name: &str) -> Result<Vec<DriveObject>>;

    /// Create the container. Creation is explicit: resolution never
    /// auto-creates.
    async fn create_container(&self, name: &str) -> Result<DriveObject>;

    /// One paginated listing of the container's objects.
    async fn list_objects(&self, container_id: &str) -> Result<Vec<DriveObject>>;

    /// Create an object and upload its content. The metadata create and the
    /// content upload are a single logical write: if the content upload
    /// fails after creation, the next listing finds the object and retries
    /// as an update, never a duplicate create.
    async fn create_object(
        &self,
        container_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveObject>;

    /// Update an object's content and rename it in the same operation, so
    /// remote names track the latest title.
    async fn update_object(&self, object_id: &str, name: &str, content: &[u8])
        -> Result<DriveObject>;

    /// Download an object's content.
    async fn get_object_content(&self, object_id: &str) -> Result<Vec<u8>>;

    /// Delete an object. Used for orphan cleanup, never during a normal sync.
    async fn delete_object(&self, object_id: &str) -> Result<()>;
}
