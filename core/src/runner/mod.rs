//! Staged workflow execution.
//!
//! ```text
//! Plan
//!   ↓
//! WorkflowRunner::run(plan, RunOptions)
//!   ↓  per stage: condition → dependency check → sequential | parallel
//!   ↓
//! WorkflowResult { stages, task_results, failed_tasks, skipped_tasks, error }
//! ```

mod condition;
mod events;
mod options;
mod result;
mod scheduler;
mod workflow;

pub use condition::evaluate_condition;
pub use events::{ProgressEvent, ProgressListener};
pub use options::RunOptions;
pub use result::{StageResult, WorkflowResult};
pub use scheduler::execute_stage_parallel;
pub use workflow::WorkflowRunner;
