//! Process contract for external toolchains.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;

/// One external invocation. `env` is the complete environment of the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit status, or -1 when the process was killed or reported none.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Looks `program` up on PATH and returns its location.
    fn resolve_executable(&self, program: &str) -> Result<PathBuf, ProcessError>;

    /// Runs to completion, killing the child on timeout or cancellation.
    /// Only launch failures are errors.
    async fn run(
        &self,
        request: ProcessRequest,
        cancel: CancellationToken,
    ) -> Result<ProcessOutput, ProcessError>;
}
