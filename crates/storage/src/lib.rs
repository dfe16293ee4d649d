//! Object storage for product media.
//!
//! Two backends implement the same [`ObjectStorage`] trait: a local
//! filesystem backend for development and a Supabase Storage backend for
//! hosted deployments. Callers hold an `Arc<dyn ObjectStorage>` and never
//! branch on the backend.

use std::path::Path;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

pub mod local;
pub mod supabase;

pub use local::LocalStorage;
pub use supabase::SupabaseStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{name}` was not found")]
    NotFound { name: String },
    #[error("invalid object name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("storage I/O failure for `{name}`: {source}")]
    Io { name: String, source: std::io::Error },
    #[error("storage transport failure: {0}")]
    Transport(String),
    #[error("storage backend rejected the request: {status} {body}")]
    Backend { status: u16, body: String },
}

/// Listing result: directory names first, then file names, both sorted.
pub type Listing = (Vec<String>, Vec<String>);

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `content` under `name`, returning the name actually used.
    /// When `name` is already taken the backend picks a collision-free
    /// variant rather than overwriting.
    async fn save(&self, name: &str, content: &[u8]) -> Result<String, StorageError>;

    /// Fetch the full content of the object.
    async fn open(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the object. Deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Whether an object exists. Transport failures report `false`.
    async fn exists(&self, name: &str) -> bool;

    /// List direct children of a prefix as (directories, files).
    /// Transport failures report an empty listing.
    async fn list(&self, prefix: &str) -> Listing;

    /// Object size in bytes, or 0 when it cannot be determined.
    async fn size(&self, name: &str) -> u64;

    /// Public URL for the object. Construction never fails.
    fn url(&self, name: &str) -> String;
}

/// Reject names that could escape the storage root.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName { name: name.to_string(), reason: "empty name" });
    }
    if name.starts_with('/') {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
            reason: "absolute paths are not allowed",
        });
    }
    let has_traversal = name.split('/').any(|segment| segment == "..");
    if has_traversal {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
            reason: "path traversal is not allowed",
        });
    }
    Ok(())
}

/// Derive a collision-free variant of `name` by appending `_` plus eight
/// random hex characters before the extension, e.g. `img.png` becomes
/// `img_3fa9c201.png`.
pub(crate) fn collision_variant(name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    let path = Path::new(name);

    let stem = path.file_stem().and_then(|value| value.to_str()).unwrap_or(name);
    let parent = path.parent().and_then(|value| value.to_str()).filter(|value| !value.is_empty());

    let file_name = match path.extension().and_then(|value| value.to_str()) {
        Some(extension) => format!("{stem}_{suffix:08x}.{extension}"),
        None => format!("{stem}_{suffix:08x}"),
    };

    match parent {
        Some(parent) => format!("{parent}/{file_name}"),
        None => file_name,
    }
}

/// Best-effort content type from the file extension.
pub(crate) fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().essence_str().to_string()
}
