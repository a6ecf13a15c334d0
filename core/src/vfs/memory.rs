use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::VfsError;

use super::{Entry, VPath, Vfs, VfsWriter, WriteOptions, DEFAULT_MOUNT};

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File(Vec<u8>),
}

type Tree = BTreeMap<VPath, Node>;

/// In-memory filesystem. Cloning shares the same tree.
#[derive(Debug, Clone)]
pub struct MemoryVfs {
    tree: Arc<Mutex<Tree>>,
    mounts: BTreeSet<String>,
    files_writable: bool,
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVfs {
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(VPath::root(), Node::Folder);
        Self {
            tree: Arc::new(Mutex::new(tree)),
            mounts: BTreeSet::from([DEFAULT_MOUNT.to_string()]),
            files_writable: true,
        }
    }

    pub fn with_mount(mut self, name: impl Into<String>) -> Self {
        self.mounts.insert(name.into());
        self
    }

    /// Folders can still be created but every file write fails.
    pub fn with_file_writes_disabled(mut self) -> Self {
        self.files_writable = false;
        self
    }

    /// Seeds a file, creating parents. Intended for test fixtures.
    pub fn insert_file(&self, path: &str, data: impl AsRef<[u8]>) -> Result<(), VfsError> {
        let path = VPath::parse(path)?;
        let mut tree = lock(&self.tree);
        ensure_parents(&mut tree, &path, true)?;
        tree.insert(path, Node::File(data.as_ref().to_vec()));
        Ok(())
    }

    pub fn read_to_string(&self, path: &str) -> Result<String, VfsError> {
        let path = VPath::parse(path)?;
        let bytes = self.read(&path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn paths(&self) -> Vec<VPath> {
        lock(&self.tree).keys().cloned().collect()
    }
}

fn lock(tree: &Mutex<Tree>) -> MutexGuard<'_, Tree> {
    tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn ensure_parents(tree: &mut Tree, path: &VPath, mkdir_parents: bool) -> Result<(), VfsError> {
    let mut missing = Vec::new();
    let mut cursor = path.parent();
    while let Some(parent) = cursor {
        match tree.get(&parent) {
            Some(Node::Folder) => break,
            Some(Node::File(_)) => return Err(VfsError::NotAFolder(parent.to_string())),
            None => {
                if !mkdir_parents {
                    return Err(VfsError::ParentMissing(parent.to_string()));
                }
                cursor = parent.parent();
                missing.push(parent);
            }
        }
    }
    for folder in missing {
        tree.insert(folder, Node::Folder);
    }
    Ok(())
}

struct MemoryWriter {
    tree: Arc<Mutex<Tree>>,
    files_writable: bool,
}

impl VfsWriter for MemoryWriter {
    fn create_folder(&self, path: &VPath, opts: WriteOptions) -> Result<Entry, VfsError> {
        let mut tree = lock(&self.tree);
        match tree.get(path) {
            Some(Node::Folder) => return Ok(Entry::folder(path.clone())),
            Some(Node::File(_)) => return Err(VfsError::AlreadyExists(path.to_string())),
            None => {}
        }
        ensure_parents(&mut tree, path, opts.mkdir_parents)?;
        tree.insert(path.clone(), Node::Folder);
        Ok(Entry::folder(path.clone()))
    }

    fn create_file(
        &self,
        path: &VPath,
        data: &[u8],
        opts: WriteOptions,
    ) -> Result<Entry, VfsError> {
        if !self.files_writable {
            return Err(VfsError::ReadOnly(path.to_string()));
        }
        let mut tree = lock(&self.tree);
        match tree.get(path) {
            Some(Node::Folder) => return Err(VfsError::AlreadyExists(path.to_string())),
            Some(Node::File(_)) if !opts.overwrite => {
                return Err(VfsError::AlreadyExists(path.to_string()))
            }
            _ => {}
        }
        ensure_parents(&mut tree, path, opts.mkdir_parents)?;
        tree.insert(path.clone(), Node::File(data.to_vec()));
        Ok(Entry::file(path.clone(), data.len() as u64))
    }
}

impl Vfs for MemoryVfs {
    fn writer_for_mount(&self, name: &str) -> Result<Arc<dyn VfsWriter>, VfsError> {
        if !self.mounts.contains(name) {
            return Err(VfsError::UnknownMount(name.to_string()));
        }
        Ok(Arc::new(MemoryWriter {
            tree: self.tree.clone(),
            files_writable: self.files_writable,
        }))
    }

    fn resolve(&self, path: &VPath) -> Result<Entry, VfsError> {
        match lock(&self.tree).get(path) {
            Some(Node::Folder) => Ok(Entry::folder(path.clone())),
            Some(Node::File(data)) => Ok(Entry::file(path.clone(), data.len() as u64)),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    fn read(&self, path: &VPath) -> Result<Vec<u8>, VfsError> {
        match lock(&self.tree).get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Folder) => Err(VfsError::NotFound(format!("{path} is a folder"))),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    fn find(&self, pattern: &str) -> Result<Vec<Entry>, VfsError> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| VfsError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let tree = lock(&self.tree);
        Ok(tree
            .iter()
            .filter_map(|(path, node)| match node {
                Node::File(data) if matcher.matches(path.as_str()) => {
                    Some(Entry::file(path.clone(), data.len() as u64))
                }
                _ => None,
            })
            .collect())
    }
}
