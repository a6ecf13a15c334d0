use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("parent folder missing: {0}")]
    ParentMissing(String),
    #[error("not a folder: {0}")]
    NotAFolder(String),
    #[error("unknown mount: {0}")]
    UnknownMount(String),
    #[error("read-only: {0}")]
    ReadOnly(String),
    #[error("invalid glob {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },
    #[error("io error at {path}: {reason}")]
    Io { path: String, reason: String },
}
