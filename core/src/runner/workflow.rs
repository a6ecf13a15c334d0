use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::RunError;
use crate::executor::{TaskExecutor, TaskResult};
use crate::plan::{Plan, PlanStage, PlanTask};
use crate::toolchain::TaskKey;

use super::condition::evaluate_condition;
use super::events::ProgressEvent;
use super::options::RunOptions;
use super::result::{StageResult, WorkflowResult};
use super::scheduler::execute_stage_parallel;

/// Executes plans stage by stage.
pub struct WorkflowRunner {
    executor: Arc<dyn TaskExecutor>,
}

/// Per-run state shared by the stage and task helpers.
struct RunContext {
    run_id: String,
    /// Caller's token; cancelling it means the run was cancelled.
    caller: CancellationToken,
    /// Child of `caller`, also cancelled when the deadline passes.
    token: CancellationToken,
    options: RunOptions,
}

impl RunContext {
    fn emit(&self, event: ProgressEvent) {
        if let Some(listener) = &self.options.progress {
            listener.on_event(&event);
        }
    }

    fn cancellation(&self) -> RunError {
        if self.caller.is_cancelled() {
            RunError::Cancelled
        } else {
            RunError::DeadlineExceeded
        }
    }
}

impl WorkflowRunner {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self { executor }
    }

    /// Runs every stage of `plan` in order and reports what happened.
    ///
    /// The run stops early on cancellation, on the deadline in
    /// [`RunOptions::timeout`], or on a failed stage when `stop_on_error`
    /// is set. Results gathered up to that point are kept.
    pub async fn run(&self, plan: &Plan, options: RunOptions) -> WorkflowResult {
        let caller = options.cancel.clone().unwrap_or_default();
        let token = caller.child_token();
        let deadline = options.timeout.map(|timeout| spawn_deadline(token.clone(), timeout));
        let ctx = RunContext {
            run_id: Uuid::new_v4().to_string(),
            caller,
            token,
            options,
        };

        let mut result = WorkflowResult::begin(ctx.run_id.clone(), plan);
        tracing::info!(
            run_id = %ctx.run_id,
            workflow = %plan.workflow.name,
            stages = plan.stages.len(),
            tasks = plan.task_count(),
            dry_run = ctx.options.dry_run,
            "workflow started"
        );
        ctx.emit(ProgressEvent::WorkflowStarted {
            run_id: ctx.run_id.clone(),
            workflow: plan.workflow.name.clone(),
            total_stages: plan.stages.len(),
            total_tasks: plan.task_count(),
        });

        for (index, stage) in plan.stages.iter().enumerate() {
            if ctx.token.is_cancelled() {
                result.error = Some(ctx.cancellation());
                break;
            }

            let stage_result = self.run_stage(&ctx, plan, stage, index, &mut result).await;
            let failed = !stage_result.success && !stage_result.skipped;
            result.stages.push(stage_result);

            if ctx.token.is_cancelled() {
                result.error = Some(ctx.cancellation());
                break;
            }
            if failed {
                result.success = false;
                if ctx.options.stop_on_error {
                    result.error = Some(RunError::StageFailed(stage.name.clone()));
                    break;
                }
            }
        }

        if let Some(handle) = deadline {
            handle.abort();
        }
        result.end();

        if let Some(error) = &result.error {
            ctx.emit(ProgressEvent::Error {
                run_id: ctx.run_id.clone(),
                message: error.to_string(),
            });
        }
        tracing::info!(
            run_id = %ctx.run_id,
            success = result.success,
            failed = result.failed_tasks.len(),
            skipped = result.skipped_tasks.len(),
            duration_ms = result.duration.as_millis() as u64,
            "workflow completed"
        );
        ctx.emit(ProgressEvent::WorkflowCompleted {
            run_id: ctx.run_id.clone(),
            workflow: plan.workflow.name.clone(),
            success: result.success,
            duration_ms: result.duration.as_millis() as u64,
            failed: result.failed_tasks.len(),
            skipped: result.skipped_tasks.len(),
            error: result.error.clone(),
        });
        result
    }

    async fn run_stage(
        &self,
        ctx: &RunContext,
        plan: &Plan,
        stage: &PlanStage,
        index: usize,
        result: &mut WorkflowResult,
    ) -> StageResult {
        let mut stage_result = StageResult::begin(&stage.name, index);
        let tasks: Vec<&PlanTask> = plan.stage_tasks(index);

        if let Some(reason) = skip_reason(stage, &tasks, result) {
            tracing::info!(stage = %stage.name, reason = %reason, "stage skipped");
            for task in &tasks {
                result.skipped_tasks.push(task.key.clone());
                ctx.emit(ProgressEvent::TaskSkipped {
                    run_id: ctx.run_id.clone(),
                    stage_index: index,
                    key: task.key.clone(),
                    reason: reason.clone(),
                });
            }
            stage_result.skipped = true;
            stage_result.skip_reason = Some(reason.clone());
            stage_result.end();
            ctx.emit(ProgressEvent::StageSkipped {
                run_id: ctx.run_id.clone(),
                stage_index: index,
                name: stage.name.clone(),
                reason,
            });
            return stage_result;
        }

        tracing::info!(stage = %stage.name, index, tasks = tasks.len(), parallel = stage.parallel, "stage started");
        ctx.emit(ProgressEvent::StageStarted {
            run_id: ctx.run_id.clone(),
            stage_index: index,
            name: stage.name.clone(),
            parallel: stage.parallel,
            tasks: stage.tasks.clone(),
        });

        let results = if stage.parallel && tasks.len() > 1 && !ctx.options.dry_run {
            execute_stage_parallel(&tasks, ctx.options.max_parallel, &ctx.token, |task| {
                self.run_task(ctx, task)
            })
            .await
        } else {
            self.run_sequential(ctx, &tasks).await
        };

        for task_result in &results {
            result
                .task_results
                .insert(task_result.key(), task_result.clone());
        }
        stage_result.success = results.iter().all(TaskResult::is_success);
        stage_result.tasks = results;
        stage_result.end();

        tracing::info!(
            stage = %stage.name,
            success = stage_result.success,
            duration_ms = stage_result.duration.as_millis() as u64,
            "stage completed"
        );
        ctx.emit(ProgressEvent::StageCompleted {
            run_id: ctx.run_id.clone(),
            stage_index: index,
            name: stage.name.clone(),
            success: stage_result.success,
            duration_ms: stage_result.duration.as_millis() as u64,
        });
        stage_result
    }

    async fn run_sequential(&self, ctx: &RunContext, tasks: &[&PlanTask]) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            if ctx.token.is_cancelled() {
                break;
            }
            let task_result = self.run_task(ctx, task).await;
            let failed = !task_result.is_success();
            results.push(task_result);
            if failed && ctx.options.stop_on_error {
                break;
            }
        }
        results
    }

    async fn run_task(&self, ctx: &RunContext, task: &PlanTask) -> TaskResult {
        ctx.emit(ProgressEvent::TaskStarted {
            run_id: ctx.run_id.clone(),
            stage_index: task.stage_index,
            key: task.key.clone(),
        });

        let task_result = if ctx.options.dry_run {
            TaskResult::dry_run(&task.key)
        } else {
            match self.executor.execute(task, &ctx.token).await {
                Ok(mut task_result) => {
                    // results are keyed by the planned task, whatever the executor reported
                    task_result.metadata.toolchain_name = task.key.toolchain.clone();
                    task_result.metadata.task_name = task.key.task.clone();
                    task_result.metadata.variant = task.key.variant.clone();
                    task_result
                }
                Err(err) => {
                    tracing::error!(task = %task.key, error = %err, "task could not be executed");
                    ctx.emit(ProgressEvent::Error {
                        run_id: ctx.run_id.clone(),
                        message: format!("{}: {err}", task.key),
                    });
                    TaskResult::failed(&task.key, err.to_string())
                }
            }
        };

        ctx.emit(ProgressEvent::TaskCompleted {
            run_id: ctx.run_id.clone(),
            stage_index: task.stage_index,
            key: task.key.clone(),
            result: task_result.clone(),
        });
        task_result
    }
}

/// Why a stage must not run: a false condition, or a task depending on
/// something that already failed.
fn skip_reason(stage: &PlanStage, tasks: &[&PlanTask], result: &WorkflowResult) -> Option<String> {
    if !evaluate_condition(&stage.condition) {
        return Some(format!("condition {:?} is false", stage.condition));
    }
    tasks
        .iter()
        .flat_map(|task| task.depends_on.iter())
        .find(|dep| failed(result, dep))
        .map(|dep| format!("dependency {dep} failed"))
}

fn failed(result: &WorkflowResult, key: &TaskKey) -> bool {
    result
        .task_results
        .get(key)
        .is_some_and(|r| !r.is_success())
}

fn spawn_deadline(token: CancellationToken, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        tracing::warn!(timeout_ms = timeout.as_millis() as u64, "workflow deadline exceeded");
        token.cancel();
    })
}
