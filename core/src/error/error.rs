use thiserror::Error;

use super::{ExecutorError, PlanError, VfsError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Plan(#[from] PlanError),
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHomeDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid auto_enable pattern for toolchain {toolchain}: {pattern}")]
    InvalidPattern { toolchain: String, pattern: String },
    #[error("invalid output root {value:?}: {source}")]
    InvalidOutputRoot { value: String, source: VfsError },
}

/// Reason a workflow run ended before walking every stage.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunError {
    #[error("workflow cancelled")]
    Cancelled,
    #[error("workflow deadline exceeded")]
    DeadlineExceeded,
    #[error("stage {0:?} failed")]
    StageFailed(String),
}
