//! # tabula-core
//!
//! Core types, traits, and abstractions for the Tabula note engine.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the storage and sync crates depend on.

pub mod body;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod naming;
pub mod traits;

// Re-export commonly used types at crate root
pub use body::{
    collect_urls, extract_references, hash_from_reference, is_display_url, is_local_image_url,
    make_reference, map_urls, parse_data_uri, strip_images, BodyNode, NoteBody,
};
pub use error::{Error, Result};
pub use models::{
    BlobRecord, Credential, DisplayHandle, DriveObject, Note, ProgressSink, RemoteEnvelope,
    RemoteNote, SyncMetadata, SyncOutcome, SyncReport, SyncStatus, TokenResponse,
};
pub use naming::{parse_object_name, remote_object_name};
pub use traits::{CredentialStore, RemoteDrive};
