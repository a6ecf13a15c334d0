//! Single-task execution.
//!
//! [`Executor`] runs one task from the registry: native tasks call their
//! handler in-process, external tasks are launched through a
//! [`ProcessRunner`](crate::process::ProcessRunner). Either way the task's
//! output directory is created first and `meta.json` / `diagnostics.jsonl`
//! are written afterwards.

pub mod command;
mod engine;
mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::plan::PlanTask;

pub use command::{Launcher, DEFAULT_TASK_TIMEOUT};
pub use engine::Executor;
pub use types::{TaskMetadata, TaskResult};

/// Seam between the workflow runner and whatever executes plan tasks.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        task: &PlanTask,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutorError>;
}
