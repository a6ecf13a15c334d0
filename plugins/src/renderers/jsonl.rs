use chrono::Local;
use morph_core::runner::{ProgressEvent, ProgressListener};
use serde_json::{json, Value};

/// Versioned JSON object per event, one per line on stdout.
pub struct JsonlRenderer {
    pretty_print: bool,
}

impl JsonlRenderer {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    pub fn event_to_json(&self, event: &ProgressEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            ProgressEvent::WorkflowStarted {
                run_id,
                workflow,
                total_stages,
                total_tasks,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "workflow": workflow,
                    "total_stages": total_stages,
                    "total_tasks": total_tasks,
                }
            }),
            ProgressEvent::StageStarted {
                run_id,
                stage_index,
                name,
                parallel,
                tasks,
            } => json!({
                "v": 1,
                "event_type": "stage.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "stage_id": stage_index,
                    "name": name,
                    "parallel": parallel,
                    "tasks": tasks,
                }
            }),
            ProgressEvent::StageSkipped {
                run_id,
                stage_index,
                name,
                reason,
            } => json!({
                "v": 1,
                "event_type": "stage.skip",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "stage_id": stage_index,
                    "name": name,
                    "reason": reason,
                }
            }),
            ProgressEvent::StageCompleted {
                run_id,
                stage_index,
                name,
                success,
                duration_ms,
            } => json!({
                "v": 1,
                "event_type": "stage.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "stage_id": stage_index,
                    "name": name,
                    "success": success,
                    "duration_ms": duration_ms,
                }
            }),
            ProgressEvent::TaskStarted {
                run_id,
                stage_index,
                key,
            } => json!({
                "v": 1,
                "event_type": "task.start",
                "ts": ts,
                "run_id": run_id,
                "task_id": key.to_string(),
                "metadata": {
                    "stage_id": stage_index,
                }
            }),
            ProgressEvent::TaskCompleted {
                run_id,
                stage_index,
                key,
                result,
            } => json!({
                "v": 1,
                "event_type": "task.end",
                "ts": ts,
                "run_id": run_id,
                "task_id": key.to_string(),
                "code": result.metadata.exit_code,
                "metadata": {
                    "stage_id": stage_index,
                    "duration_ms": result.metadata.duration_ms,
                    "success": result.is_success(),
                    "error": result.error,
                    "diagnostics": result.diagnostics.len(),
                }
            }),
            ProgressEvent::TaskSkipped {
                run_id,
                stage_index,
                key,
                reason,
            } => json!({
                "v": 1,
                "event_type": "task.skip",
                "ts": ts,
                "run_id": run_id,
                "task_id": key.to_string(),
                "metadata": {
                    "stage_id": stage_index,
                    "reason": reason,
                }
            }),
            ProgressEvent::WorkflowCompleted {
                run_id,
                workflow,
                success,
                duration_ms,
                failed,
                skipped,
                error,
            } => json!({
                "v": 1,
                "event_type": "run.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "workflow": workflow,
                    "success": success,
                    "failed": failed,
                    "skipped": skipped,
                    "duration_ms": duration_ms,
                    "error": error.as_ref().map(ToString::to_string),
                }
            }),
            ProgressEvent::Error { run_id, message } => json!({
                "v": 1,
                "event_type": "run.error",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "message": message,
                }
            }),
        }
    }
}

impl ProgressListener for JsonlRenderer {
    fn on_event(&self, event: &ProgressEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use morph_core::error::RunError;
    use morph_core::executor::TaskResult;
    use morph_core::toolchain::TaskKey;

    #[test]
    fn test_run_start() {
        let renderer = JsonlRenderer::new(false);
        let value = renderer.event_to_json(&ProgressEvent::WorkflowStarted {
            run_id: "run".to_string(),
            workflow: "build".to_string(),
            total_stages: 2,
            total_tasks: 3,
        });
        assert_eq!(value["v"], 1);
        assert_eq!(value["event_type"], "run.start");
        assert_eq!(value["run_id"], "run");
        assert_eq!(value["metadata"]["total_tasks"], 3);
    }

    #[test]
    fn test_task_end_carries_key_and_code() {
        let renderer = JsonlRenderer::new(false);
        let key = TaskKey::new("morphir", "make", "");
        let value = renderer.event_to_json(&ProgressEvent::TaskCompleted {
            run_id: "run".to_string(),
            stage_index: 0,
            key: key.clone(),
            result: TaskResult::dry_run(&key),
        });
        assert_eq!(value["event_type"], "task.end");
        assert_eq!(value["task_id"], "morphir/make");
        assert_eq!(value["code"], 0);
        assert_eq!(value["metadata"]["success"], true);
        assert!(value["metadata"]["error"].is_null());
    }

    #[test]
    fn test_run_end_reports_error_text() {
        let renderer = JsonlRenderer::new(false);
        let value = renderer.event_to_json(&ProgressEvent::WorkflowCompleted {
            run_id: "run".to_string(),
            workflow: "build".to_string(),
            success: false,
            duration_ms: 12,
            failed: 1,
            skipped: 2,
            error: Some(RunError::StageFailed("compile".into())),
        });
        assert_eq!(value["event_type"], "run.end");
        assert_eq!(value["metadata"]["error"], "stage \"compile\" failed");
        assert_eq!(value["metadata"]["skipped"], 2);
    }
}
