use crate::error::RunError;
use crate::executor::TaskResult;
use crate::toolchain::TaskKey;

/// Everything a run reports while it progresses, in emission order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    WorkflowStarted {
        run_id: String,
        workflow: String,
        total_stages: usize,
        total_tasks: usize,
    },
    StageStarted {
        run_id: String,
        stage_index: usize,
        name: String,
        parallel: bool,
        tasks: Vec<TaskKey>,
    },
    StageSkipped {
        run_id: String,
        stage_index: usize,
        name: String,
        reason: String,
    },
    StageCompleted {
        run_id: String,
        stage_index: usize,
        name: String,
        success: bool,
        duration_ms: u64,
    },
    TaskStarted {
        run_id: String,
        stage_index: usize,
        key: TaskKey,
    },
    TaskCompleted {
        run_id: String,
        stage_index: usize,
        key: TaskKey,
        result: TaskResult,
    },
    TaskSkipped {
        run_id: String,
        stage_index: usize,
        key: TaskKey,
        reason: String,
    },
    WorkflowCompleted {
        run_id: String,
        workflow: String,
        success: bool,
        duration_ms: u64,
        failed: usize,
        skipped: usize,
        error: Option<RunError>,
    },
    Error {
        run_id: String,
        message: String,
    },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow_started",
            Self::StageStarted { .. } => "stage_started",
            Self::StageSkipped { .. } => "stage_skipped",
            Self::StageCompleted { .. } => "stage_completed",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskSkipped { .. } => "task_skipped",
            Self::WorkflowCompleted { .. } => "workflow_completed",
            Self::Error { .. } => "error",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::WorkflowStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageSkipped { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::TaskStarted { run_id, .. }
            | Self::TaskCompleted { run_id, .. }
            | Self::TaskSkipped { run_id, .. }
            | Self::WorkflowCompleted { run_id, .. }
            | Self::Error { run_id, .. } => run_id,
        }
    }
}

/// Receives progress events synchronously from the runner.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}
