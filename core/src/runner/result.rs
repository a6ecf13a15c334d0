use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RunError;
use crate::executor::TaskResult;
use crate::plan::Plan;
use crate::toolchain::{TaskKey, Workflow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub name: String,
    pub index: usize,
    /// Results of the tasks that actually ran, in stage order.
    pub tasks: Vec<TaskResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl StageResult {
    pub(crate) fn begin(name: &str, index: usize) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            index,
            tasks: Vec::new(),
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            success: true,
            skipped: false,
            skip_reason: None,
        }
    }

    pub(crate) fn end(&mut self) {
        self.end_time = Utc::now();
        self.duration = (self.end_time - self.start_time).to_std().unwrap_or_default();
    }
}

/// Outcome of a whole run. Always returned, even when the run was cut short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub run_id: String,
    pub workflow: Workflow,
    pub plan: Plan,
    pub stages: Vec<StageResult>,
    pub task_results: BTreeMap<TaskKey, TaskResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub failed_tasks: Vec<TaskKey>,
    pub skipped_tasks: Vec<TaskKey>,
}

impl WorkflowResult {
    pub(crate) fn begin(run_id: String, plan: &Plan) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            workflow: plan.workflow.clone(),
            plan: plan.clone(),
            stages: Vec::with_capacity(plan.stages.len()),
            task_results: BTreeMap::new(),
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            success: true,
            error: None,
            failed_tasks: Vec::new(),
            skipped_tasks: Vec::new(),
        }
    }

    pub(crate) fn end(&mut self) {
        self.end_time = Utc::now();
        self.duration = (self.end_time - self.start_time).to_std().unwrap_or_default();
        self.failed_tasks = self
            .task_results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(k, _)| k.clone())
            .collect();
        if !self.failed_tasks.is_empty() || self.error.is_some() {
            self.success = false;
        }
    }

    /// Number of tasks that produced a result.
    pub fn task_count(&self) -> usize {
        self.task_results.len()
    }

    pub fn successful_task_count(&self) -> usize {
        self.task_results.values().filter(|r| r.is_success()).count()
    }

    /// Human-readable report of the run.
    pub fn summary(&self) -> String {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        let mut out = format!(
            "Workflow: {}\nStatus: {}\nDuration: {:?}\n",
            self.workflow.name, status, self.duration
        );
        let _ = writeln!(
            out,
            "Tasks: {} total, {} failed, {} skipped",
            self.task_count(),
            self.failed_tasks.len(),
            self.skipped_tasks.len()
        );
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {error}");
        }
        if !self.failed_tasks.is_empty() {
            out.push_str("Failed tasks:\n");
            for key in &self.failed_tasks {
                let _ = writeln!(out, "  - {key}");
            }
        }
        if !self.skipped_tasks.is_empty() {
            out.push_str("Skipped tasks:\n");
            for key in &self.skipped_tasks {
                let _ = writeln!(out, "  - {key}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_failures_and_skips() {
        let plan = Plan::empty(Workflow::new("build"));
        let mut result = WorkflowResult::begin("run-1".into(), &plan);
        let ok = TaskKey::new("tc", "make", "");
        let bad = TaskKey::new("tc", "gen", "Scala");
        result.task_results.insert(ok.clone(), TaskResult::dry_run(&ok));
        result.task_results.insert(bad.clone(), TaskResult::failed(&bad, "boom"));
        result.skipped_tasks.push(TaskKey::new("tc", "pack", ""));
        result.error = Some(RunError::StageFailed("generate".into()));
        result.end();

        assert!(!result.success);
        assert_eq!(result.failed_tasks, vec![bad]);
        assert_eq!(result.task_count(), 2);
        assert_eq!(result.successful_task_count(), 1);

        let summary = result.summary();
        assert!(summary.starts_with("Workflow: build\nStatus: FAILED\nDuration: "));
        assert!(summary.contains("Tasks: 2 total, 1 failed, 1 skipped\n"));
        assert!(summary.contains("Failed tasks:\n  - tc/gen:Scala\n"));
        assert!(summary.contains("Skipped tasks:\n  - tc/pack\n"));
    }
}
