use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use morph_core::error::VfsError;
use morph_core::vfs::{Entry, VPath, Vfs, VfsWriter, WriteOptions, DEFAULT_MOUNT};

/// Disk-backed filesystem. The virtual root `/` maps to `root` on the host.
#[derive(Debug, Clone)]
pub struct LocalVfs {
    root: PathBuf,
}

impl LocalVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_host(&self, path: &VPath) -> PathBuf {
        host_path(&self.root, path)
    }

    /// Virtual path of a host path below the root.
    fn to_virtual(&self, host: &Path) -> Option<VPath> {
        let rel = host.strip_prefix(&self.root).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        VPath::parse(&rel).ok()
    }
}

fn host_path(root: &Path, path: &VPath) -> PathBuf {
    path.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}

fn io_error(path: &VPath, err: io::Error) -> VfsError {
    if err.kind() == io::ErrorKind::NotFound {
        return VfsError::NotFound(path.to_string());
    }
    VfsError::Io {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

fn check_parent(root: &Path, path: &VPath, opts: WriteOptions) -> Result<(), VfsError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let host = host_path(root, &parent);
    if host.is_dir() {
        return Ok(());
    }
    if host.exists() {
        return Err(VfsError::NotAFolder(parent.to_string()));
    }
    if !opts.mkdir_parents {
        return Err(VfsError::ParentMissing(parent.to_string()));
    }
    fs::create_dir_all(&host).map_err(|e| io_error(&parent, e))
}

struct LocalWriter {
    root: PathBuf,
}

impl VfsWriter for LocalWriter {
    fn create_folder(&self, path: &VPath, opts: WriteOptions) -> Result<Entry, VfsError> {
        let host = host_path(&self.root, path);
        if host.is_dir() {
            return Ok(Entry::folder(path.clone()));
        }
        if host.exists() {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        check_parent(&self.root, path, opts)?;
        fs::create_dir(&host).map_err(|e| io_error(path, e))?;
        Ok(Entry::folder(path.clone()))
    }

    fn create_file(
        &self,
        path: &VPath,
        data: &[u8],
        opts: WriteOptions,
    ) -> Result<Entry, VfsError> {
        let host = host_path(&self.root, path);
        if host.is_dir() || (host.exists() && !opts.overwrite) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        check_parent(&self.root, path, opts)?;
        fs::write(&host, data).map_err(|e| io_error(path, e))?;
        Ok(Entry::file(path.clone(), data.len() as u64))
    }
}

impl Vfs for LocalVfs {
    fn writer_for_mount(&self, name: &str) -> Result<Arc<dyn VfsWriter>, VfsError> {
        if name != DEFAULT_MOUNT {
            return Err(VfsError::UnknownMount(name.to_string()));
        }
        Ok(Arc::new(LocalWriter {
            root: self.root.clone(),
        }))
    }

    fn resolve(&self, path: &VPath) -> Result<Entry, VfsError> {
        let meta = fs::metadata(self.to_host(path)).map_err(|e| io_error(path, e))?;
        if meta.is_dir() {
            Ok(Entry::folder(path.clone()))
        } else {
            Ok(Entry::file(path.clone(), meta.len()))
        }
    }

    fn read(&self, path: &VPath) -> Result<Vec<u8>, VfsError> {
        fs::read(self.to_host(path)).map_err(|e| io_error(path, e))
    }

    fn find(&self, pattern: &str) -> Result<Vec<Entry>, VfsError> {
        let invalid = |reason: String| VfsError::InvalidGlob {
            pattern: pattern.to_string(),
            reason,
        };
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let full = format!("{}/{}", root.trim_end_matches('/'), pattern.trim_start_matches('/'));

        let mut entries = Vec::new();
        for hit in glob::glob(&full).map_err(|e| invalid(e.to_string()))? {
            let host = match hit {
                Ok(host) => host,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable path during glob");
                    continue;
                }
            };
            let Ok(meta) = fs::metadata(&host) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            if let Some(path) = self.to_virtual(&host) {
                entries.push(Entry::file(path, meta.len()));
            }
        }
        Ok(entries)
    }

    fn host_path(&self, path: &VPath) -> Option<PathBuf> {
        Some(self.to_host(path))
    }
}
