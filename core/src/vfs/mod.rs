//! Narrow virtual filesystem contract consumed by the engine.
//!
//! The executor only needs to create folders, write files and resolve
//! entries; auto-enable detection additionally needs glob lookups. A
//! disk-backed implementation lives in `morph-plugins`; [`MemoryVfs`] is a
//! self-contained tree used by tests and dry tooling.

mod memory;
mod path;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::VfsError;

pub use memory::MemoryVfs;
pub use path::VPath;

/// Mount name used by [`Vfs::writer`].
pub const DEFAULT_MOUNT: &str = "workspace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Create missing parent folders.
    pub mkdir_parents: bool,
    /// Replace an existing file.
    pub overwrite: bool,
}

impl WriteOptions {
    pub fn parents() -> Self {
        Self {
            mkdir_parents: true,
            overwrite: false,
        }
    }

    pub fn replace() -> Self {
        Self {
            mkdir_parents: true,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: VPath,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

impl Entry {
    pub fn folder(path: VPath) -> Self {
        Self {
            path,
            kind: EntryKind::Folder,
            size: None,
        }
    }

    pub fn file(path: VPath, size: u64) -> Self {
        Self {
            path,
            kind: EntryKind::File,
            size: Some(size),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

pub trait VfsWriter: Send + Sync {
    fn create_folder(&self, path: &VPath, opts: WriteOptions) -> Result<Entry, VfsError>;
    fn create_file(&self, path: &VPath, data: &[u8], opts: WriteOptions)
        -> Result<Entry, VfsError>;
}

pub trait Vfs: Send + Sync {
    /// Writer for the default mount.
    fn writer(&self) -> Result<Arc<dyn VfsWriter>, VfsError> {
        self.writer_for_mount(DEFAULT_MOUNT)
    }

    fn writer_for_mount(&self, name: &str) -> Result<Arc<dyn VfsWriter>, VfsError>;

    fn resolve(&self, path: &VPath) -> Result<Entry, VfsError>;

    fn read(&self, path: &VPath) -> Result<Vec<u8>, VfsError>;

    /// Files matching a glob written against absolute virtual paths
    /// (`/project/**/*.elm`).
    fn find(&self, pattern: &str) -> Result<Vec<Entry>, VfsError>;

    /// Real location of `path` when the filesystem is disk-backed.
    fn host_path(&self, _path: &VPath) -> Option<PathBuf> {
        None
    }
}
