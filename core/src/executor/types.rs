use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::toolchain::{Artifact, Diagnostic, TaskKey};

/// Execution record persisted as `meta.json` next to a task's outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetadata {
    pub toolchain_name: String,
    pub task_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_hash: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: i32,
    pub success: bool,
}

impl TaskMetadata {
    /// Metadata for a task starting now.
    pub fn started(key: &TaskKey) -> Self {
        let now = Utc::now();
        Self {
            toolchain_name: key.toolchain.clone(),
            task_name: key.task.clone(),
            variant: key.variant.clone(),
            inputs_hash: None,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            exit_code: 0,
            success: true,
        }
    }

    /// Stamps the end time and outcome.
    pub fn finish(&mut self, exit_code: i32, success: bool) {
        self.end_time = Utc::now();
        self.duration_ms = (self.end_time - self.start_time)
            .num_milliseconds()
            .max(0) as u64;
        self.exit_code = exit_code;
        self.success = success;
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(&self.toolchain_name, &self.task_name, &self.variant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub metadata: TaskMetadata,
    pub outputs: BTreeMap<String, Value>,
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn new(metadata: TaskMetadata) -> Self {
        Self {
            metadata,
            outputs: BTreeMap::new(),
            diagnostics: Vec::new(),
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Result recorded for a task that was never really executed.
    pub fn dry_run(key: &TaskKey) -> Self {
        let mut metadata = TaskMetadata::started(key);
        metadata.finish(0, true);
        Self::new(metadata)
    }

    /// Failed result with exit code -1, used when a task could not be launched.
    pub fn failed(key: &TaskKey, error: impl Into<String>) -> Self {
        let mut metadata = TaskMetadata::started(key);
        metadata.finish(-1, false);
        Self {
            error: Some(error.into()),
            ..Self::new(metadata)
        }
    }

    pub fn key(&self) -> TaskKey {
        self.metadata.key()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.metadata.success
    }
}
