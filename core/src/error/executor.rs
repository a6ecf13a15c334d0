use thiserror::Error;

use super::{ProcessError, VfsError};

/// Error codes surfaced to callers that need a stable numeric category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    GeneralError = 1,
    ValidationError = 3,
    NotFound = 10,
    ExecutableNotFound = 20,
    LaunchFailed = 21,
    FileAccess = 60,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Errors raised while preparing or launching a single task.
///
/// A task that runs and exits non-zero is not an error here; it is reported
/// through `TaskResult::error`.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("toolchain not found: {0}")]
    ToolchainNotFound(String),

    #[error("task not found: {task} in toolchain {toolchain}")]
    TaskNotFound { toolchain: String, task: String },

    #[error("variant {variant} not supported by task {task}")]
    VariantNotSupported { task: String, variant: String },

    #[error("native task {0} has no handler")]
    MissingHandler(String),

    #[error("external task {0} has no command")]
    MissingCommand(String),

    #[error("no executable specified for task {0}")]
    NoExecutable(String),

    #[error("{runner} not found in PATH (required for backend '{backend}')")]
    RunnerNotFound { runner: String, backend: String },

    #[error("package must be specified for {0} backend")]
    MissingPackage(String),

    #[error("acquisition backend {0} not yet implemented")]
    UnsupportedBackend(String),

    #[error("failed to create output directory: {0}")]
    OutputDir(#[source] VfsError),

    #[error("invalid output path for {output}: {source}")]
    OutputPath {
        output: String,
        #[source]
        source: VfsError,
    },

    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl ExecutorError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ToolchainNotFound(_) | Self::TaskNotFound { .. } => ErrorCode::NotFound,
            Self::VariantNotSupported { .. }
            | Self::MissingHandler(_)
            | Self::MissingCommand(_)
            | Self::NoExecutable(_)
            | Self::MissingPackage(_) => ErrorCode::ValidationError,
            Self::RunnerNotFound { .. } => ErrorCode::ExecutableNotFound,
            Self::UnsupportedBackend(_) => ErrorCode::GeneralError,
            Self::OutputDir(_) | Self::OutputPath { .. } => ErrorCode::FileAccess,
            Self::Process(ProcessError::NotFound { .. }) => ErrorCode::ExecutableNotFound,
            Self::Process(_) => ErrorCode::LaunchFailed,
        }
    }
}
