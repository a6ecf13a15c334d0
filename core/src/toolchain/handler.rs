//! In-process task handlers for native toolchains.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::vfs::{VPath, Vfs};

use super::diagnostics::Diagnostic;

/// Named output produced by a task run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInput {
    /// Empty when the task was planned without a variant.
    pub variant: String,
    pub options: BTreeMap<String, Value>,
    pub input_artifacts: BTreeMap<String, Value>,
}

/// Everything a native handler may touch while it runs.
#[derive(Clone)]
pub struct HandlerContext {
    pub toolchain: String,
    pub task: String,
    pub output_dir: VPath,
    pub workspace_root: PathBuf,
    pub vfs: Arc<dyn Vfs>,
    /// Fires when the run is cancelled or times out. Handlers that do
    /// long work should poll it; nothing aborts them forcibly.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    pub outputs: BTreeMap<String, Value>,
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
}

impl HandlerOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, input: TaskInput) -> HandlerOutput;
}

/// Adapts a synchronous closure into a [`TaskHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(&HandlerContext, TaskInput) -> HandlerOutput + Send + Sync,
{
    async fn handle(&self, ctx: &HandlerContext, input: TaskInput) -> HandlerOutput {
        (self.0)(ctx, input)
    }
}

pub fn handler_fn<F>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(&HandlerContext, TaskInput) -> HandlerOutput + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
