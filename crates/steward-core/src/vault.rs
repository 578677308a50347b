//! Per-project keyed document store.
//!
//! The engine treats durable storage as a generic vault of per-project
//! documents with scoped read-modify-write access: acquire an item, read
//! and stage changes, commit to release. Changes staged on an item that is
//! dropped without [`Item::commit`] are discarded, so an abnormal exit
//! rolls the document back.
//!
//! Exclusivity is per `(project, key)` pair: while one caller holds an
//! acquired item, every other `acquire` of the same document blocks. This
//! is what makes the claim queue's select-and-remove atomic.
//!
//! Two implementations ship here: [`MemoryVault`] for tests and embedded
//! use, and [`FsVault`] which keeps each document as a JSON file under
//! `data_dir/<project>/<key>.json` with write-then-rename commits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a project namespace.
///
/// Ids are restricted to `[A-Za-z0-9._-]` so they can double as directory
/// names without any escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Wraps a raw id. Validation happens at the storage boundary, not
    /// here: an id that never touches an [`FsVault`] may be any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is safe to use as a single path component.
    #[must_use]
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
            && self.0 != "."
            && self.0 != ".."
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Errors surfaced by vault implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    /// Underlying storage I/O failed.
    #[error("storage i/o failure at {path}: {source}")]
    Io {
        /// Path (or logical location) of the failed operation.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The project id cannot be used as a storage path component.
    #[error("project id is not path-safe: {id:?}")]
    UnsafeProjectId {
        /// The offending id.
        id: String,
    },

    /// The document key cannot be used as a storage path component.
    #[error("document key is not path-safe: {key:?}")]
    UnsafeKey {
        /// The offending key.
        key: String,
    },
}

/// An exclusively acquired document.
///
/// Reads observe staged writes. [`Item::commit`] makes staged writes
/// durable and releases the document; dropping without commit releases it
/// with staged writes discarded.
pub trait Item: Send {
    /// Current document body, or `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] if the underlying storage read fails.
    fn read(&self) -> Result<Option<String>, VaultError>;

    /// Stages a replacement body. Not durable until [`Item::commit`].
    fn write(&mut self, body: String);

    /// Durably commits staged writes and releases the document.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] if the commit cannot be made durable; the
    /// document is released either way and the previous body survives.
    fn commit(self: Box<Self>) -> Result<(), VaultError>;
}

/// A per-project keyed document store with scoped acquire/release access.
pub trait Vault: Send + Sync {
    /// Acquires exclusive access to one project-scoped document.
    ///
    /// Blocks while another caller holds the same `(project, key)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] if the document cannot be made accessible.
    fn acquire(&self, project: &ProjectId, key: &str) -> Result<Box<dyn Item>, VaultError>;
}

/// Enumeration of the projects a vault knows about.
///
/// The dispatch loop re-queries this once per scheduling tick, so projects
/// created between ticks are picked up automatically and deleted ones drop
/// out.
pub trait ProjectRoster: Send + Sync {
    /// Known project ids, in stable (sorted) order.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] if the underlying enumeration fails.
    fn projects(&self) -> Result<Vec<ProjectId>, VaultError>;
}

// =============================================================================
// MemoryVault
// =============================================================================

type Slot = Arc<Mutex<Option<String>>>;

/// In-memory vault. Documents live in a keyed map of mutex-guarded slots;
/// the per-slot mutex provides the acquire/release exclusivity.
#[derive(Default)]
pub struct MemoryVault {
    slots: Mutex<BTreeMap<(ProjectId, String), Slot>>,
    projects: Mutex<BTreeSet<ProjectId>>,
}

impl MemoryVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project so the roster reports it even before any
    /// document is written.
    pub fn add_project(&self, project: &ProjectId) {
        self.projects.lock().insert(project.clone());
    }

    fn slot(&self, project: &ProjectId, key: &str) -> Slot {
        self.projects.lock().insert(project.clone());
        Arc::clone(
            self.slots
                .lock()
                .entry((project.clone(), key.to_string()))
                .or_default(),
        )
    }
}

impl Vault for MemoryVault {
    fn acquire(&self, project: &ProjectId, key: &str) -> Result<Box<dyn Item>, VaultError> {
        let slot = self.slot(project, key);
        let guard = slot.lock_arc();
        Ok(Box::new(MemoryItem {
            guard,
            staged: None,
        }))
    }
}

impl ProjectRoster for MemoryVault {
    fn projects(&self) -> Result<Vec<ProjectId>, VaultError> {
        Ok(self.projects.lock().iter().cloned().collect())
    }
}

struct MemoryItem {
    guard: ArcMutexGuard<RawMutex, Option<String>>,
    staged: Option<String>,
}

impl Item for MemoryItem {
    fn read(&self) -> Result<Option<String>, VaultError> {
        Ok(self.staged.clone().or_else(|| self.guard.clone()))
    }

    fn write(&mut self, body: String) {
        self.staged = Some(body);
    }

    fn commit(mut self: Box<Self>) -> Result<(), VaultError> {
        if let Some(body) = self.staged.take() {
            *self.guard = Some(body);
        }
        Ok(())
    }
}

// =============================================================================
// FsVault
// =============================================================================

/// Filesystem vault. Each document is `data_dir/<project>/<key>.json`;
/// commits go through a temporary file in the same directory followed by
/// an atomic rename, so a crash mid-commit leaves the previous body
/// intact.
///
/// Exclusivity is an in-process lock per `(project, key)`; the vault is
/// built for a single engine process owning the data directory.
pub struct FsVault {
    root: PathBuf,
    locks: Mutex<BTreeMap<(ProjectId, String), Arc<Mutex<()>>>>,
}

impl FsVault {
    /// Opens (creating if needed) a vault rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| VaultError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self {
            root,
            locks: Mutex::new(BTreeMap::new()),
        })
    }

    fn document_path(&self, project: &ProjectId, key: &str) -> Result<PathBuf, VaultError> {
        if !project.is_path_safe() {
            return Err(VaultError::UnsafeProjectId {
                id: project.as_str().to_string(),
            });
        }
        if key.is_empty()
            || !key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
        {
            return Err(VaultError::UnsafeKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(project.as_str()).join(format!("{key}.json")))
    }

    fn lock_for(&self, project: &ProjectId, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry((project.clone(), key.to_string()))
                .or_default(),
        )
    }
}

impl Vault for FsVault {
    fn acquire(&self, project: &ProjectId, key: &str) -> Result<Box<dyn Item>, VaultError> {
        let path = self.document_path(project, key)?;
        let parent = path
            .parent()
            .expect("document path always has a project directory")
            .to_path_buf();
        let lock = self.lock_for(project, key);
        let guard = lock.lock_arc();
        Ok(Box::new(FsItem {
            _guard: guard,
            path,
            parent,
            staged: None,
        }))
    }
}

impl ProjectRoster for FsVault {
    fn projects(&self) -> Result<Vec<ProjectId>, VaultError> {
        let entries = fs::read_dir(&self.root).map_err(|source| VaultError::Io {
            path: self.root.display().to_string(),
            source,
        })?;
        let mut ids = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| VaultError::Io {
                path: self.root.display().to_string(),
                source,
            })?;
            let is_dir = entry
                .file_type()
                .map_err(|source| VaultError::Io {
                    path: entry.path().display().to_string(),
                    source,
                })?
                .is_dir();
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let id = ProjectId::new(name);
                if id.is_path_safe() {
                    ids.insert(id);
                }
            }
        }
        Ok(ids.into_iter().collect())
    }
}

struct FsItem {
    _guard: ArcMutexGuard<RawMutex, ()>,
    path: PathBuf,
    parent: PathBuf,
    staged: Option<String>,
}

impl Item for FsItem {
    fn read(&self) -> Result<Option<String>, VaultError> {
        if let Some(staged) = &self.staged {
            return Ok(Some(staged.clone()));
        }
        match fs::read_to_string(&self.path) {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(VaultError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    fn write(&mut self, body: String) {
        self.staged = Some(body);
    }

    fn commit(mut self: Box<Self>) -> Result<(), VaultError> {
        let Some(body) = self.staged.take() else {
            return Ok(());
        };
        let io_err = |source: std::io::Error, path: &Path| VaultError::Io {
            path: path.display().to_string(),
            source,
        };
        // The project directory only comes into existence on the first
        // committed write, so read-only access never materializes it.
        fs::create_dir_all(&self.parent).map_err(|e| io_err(e, &self.parent))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.parent).map_err(|e| io_err(e, &self.parent))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| io_err(e, tmp.path()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| io_err(e, tmp.path()))?;
        tmp.persist(&self.path)
            .map_err(|e| io_err(e.error, &self.path))?;
        Ok(())
    }
}
