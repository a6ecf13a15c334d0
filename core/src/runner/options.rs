use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::events::ProgressListener;

#[derive(Clone)]
pub struct RunOptions {
    /// Record every task as succeeded without executing anything.
    pub dry_run: bool,
    /// Stop after the first failing stage, and within a sequential stage
    /// after the first failing task.
    pub stop_on_error: bool,
    /// Concurrent tasks in a parallel stage; 0 means unlimited.
    pub max_parallel: usize,
    /// Deadline for the whole run.
    pub timeout: Option<Duration>,
    pub progress: Option<Arc<dyn ProgressListener>>,
    /// Caller-owned cancellation. A fresh token is used when absent.
    pub cancel: Option<CancellationToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            stop_on_error: true,
            max_parallel: 0,
            timeout: None,
            progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("dry_run", &self.dry_run)
            .field("stop_on_error", &self.stop_on_error)
            .field("max_parallel", &self.max_parallel)
            .field("timeout", &self.timeout)
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl RunOptions {
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn keep_going(mut self) -> Self {
        self.stop_on_error = false;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(listener);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
