//! Object store collaborator
//!
//! The pipeline only ever talks to storage through [`ObjectStore`]. Two
//! implementations ship with the crate: an in-memory map for tests and
//! single-process deployments, and a directory-backed store that publishes
//! files with write-then-rename so a half-written artifact is never visible.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{DocumentId, SourceDocument};
use crate::validation::validate_pdf;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Corrupt store entry {id}: {reason}")]
    Corrupt { id: DocumentId, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub page_count: u32,
    pub byte_size: u64,
}

/// Persistent storage for uploaded and derived PDFs.
///
/// Implementations must be internally synchronized; every method takes
/// `&self` and may be called from many sessions at once.
pub trait ObjectStore: Send + Sync {
    /// Validate and persist a PDF, returning its new identifier
    fn put(&self, bytes: Vec<u8>) -> Result<DocumentId, StoreError>;

    fn get(&self, id: &DocumentId) -> Result<Vec<u8>, StoreError>;

    fn metadata(&self, id: &DocumentId) -> Result<ObjectMetadata, StoreError>;

    /// Resolve an id into a [`SourceDocument`] handle
    fn source(&self, id: &DocumentId) -> Result<SourceDocument, StoreError> {
        let meta = self.metadata(id)?;
        Ok(SourceDocument {
            id: id.clone(),
            page_count: meta.page_count,
            byte_size: meta.byte_size,
        })
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn put(&self, bytes: Vec<u8>) -> Result<DocumentId, StoreError> {
        (**self).put(bytes)
    }

    fn get(&self, id: &DocumentId) -> Result<Vec<u8>, StoreError> {
        (**self).get(id)
    }

    fn metadata(&self, id: &DocumentId) -> Result<ObjectMetadata, StoreError> {
        (**self).metadata(id)
    }
}

struct StoredObject {
    bytes: Arc<Vec<u8>>,
    metadata: ObjectMetadata,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<DocumentId, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, bytes: Vec<u8>) -> Result<DocumentId, StoreError> {
        let info = validate_pdf(&bytes)?;
        let id = DocumentId::generate();
        let stored = StoredObject {
            metadata: ObjectMetadata {
                page_count: info.page_count,
                byte_size: info.size_bytes,
            },
            bytes: Arc::new(bytes),
        };
        // Entries are insert-only, so a poisoned lock still guards consistent data
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), stored);
        tracing::debug!(%id, pages = info.page_count, "stored document in memory");
        Ok(id)
    }

    fn get(&self, id: &DocumentId) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|obj| obj.bytes.as_ref().clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn metadata(&self, id: &DocumentId) -> Result<ObjectMetadata, StoreError> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|obj| obj.metadata)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// Directory-backed store: `<root>/<id>.pdf` plus a `<id>.json` sidecar
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pdf_path(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("{}.pdf", checked_file_stem(id)?)))
    }

    fn meta_path(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("{}.json", checked_file_stem(id)?)))
    }

    /// Write to a temporary sibling, then rename into place
    fn publish(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("part");
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Ids become file names; refuse anything that could escape the root
fn checked_file_stem(id: &DocumentId) -> Result<&str, StoreError> {
    let stem = id.as_str();
    let valid = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(stem)
    } else {
        Err(StoreError::NotFound(id.clone()))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, bytes: Vec<u8>) -> Result<DocumentId, StoreError> {
        let info = validate_pdf(&bytes)?;
        let id = DocumentId::generate();
        let metadata = ObjectMetadata {
            page_count: info.page_count,
            byte_size: info.size_bytes,
        };
        let sidecar = serde_json::to_vec(&metadata).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        // The PDF lands last: its presence is what makes the id resolvable
        self.publish(&self.meta_path(&id)?, &sidecar)?;
        self.publish(&self.pdf_path(&id)?, &bytes)?;
        tracing::debug!(%id, root = %self.root.display(), "stored document on disk");
        Ok(id)
    }

    fn get(&self, id: &DocumentId) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.pdf_path(id)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn metadata(&self, id: &DocumentId) -> Result<ObjectMetadata, StoreError> {
        if !self.pdf_path(id)?.exists() {
            return Err(StoreError::NotFound(id.clone()));
        }
        match fs::read(self.meta_path(id)?) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                id: id.clone(),
                reason: e.to_string(),
            }),
            // Sidecar lost: recompute from the document itself
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let info = validate_pdf(&self.get(id)?)?;
                Ok(ObjectMetadata {
                    page_count: info.page_count,
                    byte_size: info.size_bytes,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
