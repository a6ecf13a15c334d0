use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::plan::PlanTask;
use crate::process::ProcessRunner;
use crate::toolchain::diagnostics::{parse_stderr, to_jsonl};
use crate::toolchain::{
    AcquireConfig, Diagnostic, HandlerContext, OutputDirStructure, Registry, TaskDef, TaskInput,
    TaskKey, TaskRun, Toolchain, ToolchainKind,
};
use crate::vfs::{VPath, Vfs, WriteOptions};

use super::command::{build_request, resolve_launcher, substitute_args};
use super::types::{TaskMetadata, TaskResult};
use super::TaskExecutor;

/// Runs single tasks from a [`Registry`], native or external, and persists
/// their metadata and diagnostics under the output root.
pub struct Executor {
    registry: Arc<Registry>,
    vfs: Arc<dyn Vfs>,
    process: Arc<dyn ProcessRunner>,
    output: OutputDirStructure,
    workspace_root: PathBuf,
}

impl Executor {
    pub fn new(
        registry: Arc<Registry>,
        vfs: Arc<dyn Vfs>,
        process: Arc<dyn ProcessRunner>,
        output_root: VPath,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            vfs,
            process,
            output: OutputDirStructure::new(output_root),
            workspace_root: workspace_root.into(),
        }
    }

    pub fn output_dirs(&self) -> &OutputDirStructure {
        &self.output
    }

    pub async fn execute_task(
        &self,
        toolchain: &str,
        task: &str,
        variant: &str,
    ) -> Result<TaskResult, ExecutorError> {
        self.execute_task_with_cancel(toolchain, task, variant, &CancellationToken::new())
            .await
    }

    pub async fn execute_task_with_cancel(
        &self,
        toolchain_name: &str,
        task_name: &str,
        variant: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutorError> {
        let toolchain = self
            .registry
            .get_toolchain(toolchain_name)
            .ok_or_else(|| ExecutorError::ToolchainNotFound(toolchain_name.to_string()))?;
        let task = toolchain
            .task(task_name)
            .ok_or_else(|| ExecutorError::TaskNotFound {
                toolchain: toolchain_name.to_string(),
                task: task_name.to_string(),
            })?;

        let variant = if variant.is_empty() || task.variants.is_empty() {
            variant.to_string()
        } else {
            task.match_variant(variant)
                .map(str::to_string)
                .ok_or_else(|| ExecutorError::VariantNotSupported {
                    task: task_name.to_string(),
                    variant: variant.to_string(),
                })?
        };
        let key = TaskKey::new(&toolchain.name, &task.name, variant);

        let task_dir = self
            .output
            .task_dir(&toolchain.name, &task.name)
            .map_err(ExecutorError::OutputDir)?;
        self.vfs
            .writer()
            .and_then(|w| w.create_folder(&task_dir, WriteOptions::parents()))
            .map_err(ExecutorError::OutputDir)?;

        tracing::debug!(task = %key, kind = toolchain.kind.label(), "executing task");
        let result = match (&toolchain.kind, &task.run) {
            (ToolchainKind::Native, TaskRun::Handler(handler)) => {
                let ctx = HandlerContext {
                    toolchain: toolchain.name.clone(),
                    task: task.name.clone(),
                    output_dir: task_dir,
                    workspace_root: self.workspace_root.clone(),
                    vfs: self.vfs.clone(),
                    cancel: cancel.clone(),
                };
                let input = TaskInput {
                    variant: key.variant.clone(),
                    ..TaskInput::default()
                };
                let mut metadata = TaskMetadata::started(&key);
                let output = handler.handle(&ctx, input).await;
                metadata.finish(0, output.error.is_none());
                TaskResult {
                    metadata,
                    outputs: output.outputs,
                    diagnostics: output.diagnostics,
                    artifacts: output.artifacts,
                    error: output.error,
                }
            }
            (ToolchainKind::Native, TaskRun::Command { .. }) => {
                return Err(ExecutorError::MissingHandler(task.name.clone()))
            }
            (ToolchainKind::External(acquire), TaskRun::Command { exec, args }) => {
                self.run_external(&key, toolchain, acquire, task, exec.as_deref(), args, cancel)
                    .await?
            }
            (ToolchainKind::External(_), TaskRun::Handler(_)) => {
                return Err(ExecutorError::MissingCommand(task.name.clone()))
            }
        };

        if let Some(error) = &result.error {
            tracing::error!(task = %key, error = %error, "task failed");
        }
        self.persist(&toolchain.name, &task.name, &result);
        Ok(result)
    }

    async fn run_external(
        &self,
        key: &TaskKey,
        toolchain: &Toolchain,
        acquire: &AcquireConfig,
        task: &TaskDef,
        exec: Option<&str>,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutorError> {
        let launcher = resolve_launcher(self.process.as_ref(), acquire, task, exec)?;
        let outputs = self.output_locations(toolchain, task)?;
        let args = substitute_args(args, &key.variant, &outputs);
        let request = build_request(launcher, args, toolchain, task, &self.workspace_root);

        tracing::debug!(
            task = %key,
            program = %request.program,
            args = ?request.args,
            timeout_ms = request.timeout.as_millis() as u64,
            "launching external task"
        );

        let mut metadata = TaskMetadata::started(key);
        let (exit_code, stderr) = match self.process.run(request, cancel.clone()).await {
            Ok(output) if output.success() => (0, output.stderr),
            Ok(output) if output.timed_out => (-1, output.stderr),
            Ok(output) => (output.exit_code, output.stderr),
            Err(err) => (-1, err.to_string()),
        };
        let success = exit_code == 0;
        metadata.finish(exit_code, success);

        let mut result = TaskResult::new(metadata);
        result.diagnostics = parse_stderr(&stderr);
        if !success {
            result.error = Some(format!("task failed with exit code {exit_code}: {stderr}"));
        }
        Ok(result)
    }

    /// Substitution values for `{outputs.<name>}`: host paths when the VFS is
    /// disk-backed, virtual paths otherwise.
    fn output_locations(
        &self,
        toolchain: &Toolchain,
        task: &TaskDef,
    ) -> Result<BTreeMap<String, String>, ExecutorError> {
        let mut locations = BTreeMap::new();
        for (name, spec) in &task.outputs {
            let path = self
                .output
                .output_path(&toolchain.name, &task.name, &spec.path)
                .map_err(|source| ExecutorError::OutputPath {
                    output: name.clone(),
                    source,
                })?;
            let location = match self.vfs.host_path(&path) {
                Some(host) => host.to_string_lossy().into_owned(),
                None => path.to_string(),
            };
            locations.insert(name.clone(), location);
        }
        Ok(locations)
    }

    /// Writes `meta.json` and `diagnostics.jsonl`. Failures are logged only.
    fn persist(&self, toolchain: &str, task: &str, result: &TaskResult) {
        if let Err(err) = self.write_metadata(toolchain, task, result) {
            tracing::warn!(toolchain, task, error = %err, "failed to write metadata");
        }
        if let Err(err) = self.write_diagnostics(toolchain, task, &result.diagnostics) {
            tracing::warn!(toolchain, task, error = %err, "failed to write diagnostics");
        }
    }

    fn write_metadata(&self, toolchain: &str, task: &str, result: &TaskResult) -> anyhow::Result<()> {
        let path = self.output.meta_path(toolchain, task)?;
        let data = serde_json::to_vec_pretty(&result.metadata)?;
        self.vfs
            .writer()?
            .create_file(&path, &data, WriteOptions::replace())?;
        Ok(())
    }

    fn write_diagnostics(
        &self,
        toolchain: &str,
        task: &str,
        diagnostics: &[Diagnostic],
    ) -> anyhow::Result<()> {
        if diagnostics.is_empty() {
            return Ok(());
        }
        let path = self.output.diagnostics_path(toolchain, task)?;
        self.vfs
            .writer()?
            .create_file(&path, to_jsonl(diagnostics).as_bytes(), WriteOptions::replace())?;
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for Executor {
    async fn execute(
        &self,
        task: &PlanTask,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutorError> {
        self.execute_task_with_cancel(task.toolchain(), task.task(), task.variant(), cancel)
            .await
    }
}
