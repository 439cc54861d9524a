//! Pixel asset storage.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::store::StorageError;

/// A 1x1 fully transparent PNG.
pub const TRANSPARENT_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Read-only keyed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Serves the built-in transparent pixel for every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPixelStore;

#[async_trait]
impl BlobStore for BuiltinPixelStore {
    async fn fetch(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(TRANSPARENT_PIXEL_PNG.to_vec())
    }
}

/// Blobs stored as files directly inside one directory.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        // Keys name a file inside the root, never a path out of it
        if key.is_empty() || key == "." || key == ".." || key.contains(&['/', '\\'][..]) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let path = self.root.join(key);
        debug!(path = %path.display(), "blob_fetch");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::BlobNotFound(key.to_string()),
            _ => StorageError::BlobRead {
                key: key.to_string(),
                source: e,
            },
        })
    }
}
