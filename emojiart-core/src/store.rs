//! Key-value persistence for documents and palettes.
//!
//! The core only needs get/set of byte blobs by string key. [`MemoryStore`]
//! keeps blobs in memory; [`FileStore`] writes one file per key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::ArtResult;

const KEY_PREFIX: &str = "EmojiArtDocument.";

/// Key under which the palette registry is stored.
pub const PALETTES_KEY: &str = "EmojiArtDocument.Palettes";

/// Key under which the document with the given identifier is stored.
#[must_use]
pub fn document_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// The document identifier a key was built from, if it is a document key.
#[must_use]
pub fn document_id(key: &str) -> Option<Uuid> {
    key.strip_prefix(KEY_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Byte-blob storage addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> ArtResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &[u8]) -> ArtResult<()>;
}

/// In-memory store, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ArtResult<Option<Vec<u8>>> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> ArtResult<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Store that keeps each key in its own file under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ArtError::Io`](crate::ArtError::Io) if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> ArtResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// The directory blobs are written to.
    #[must_use]
    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", sanitize_filename(key)))
    }

    /// List the keys of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory can't be read.
    pub fn keys(&self) -> ArtResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> ArtResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> ArtResult<()> {
        let path = self.path_for(key);
        // Readers never observe a partially written blob
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!("Persisted {key} to {}", path.display());
        Ok(())
    }
}

/// Sanitize a key for use as a filename.
///
/// Replaces any character that is not alphanumeric, `-`, `_` or `.` with `_`.
fn sanitize_filename(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
