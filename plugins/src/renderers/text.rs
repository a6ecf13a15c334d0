use morph_core::runner::{ProgressEvent, ProgressListener};

/// One plain line per event on stdout.
pub struct TextRenderer {
    ascii_only: bool,
}

impl TextRenderer {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn status(&self, success: bool) -> &'static str {
        match (success, self.ascii_only) {
            (true, true) => "OK",
            (true, false) => "SUCCESS",
            (false, true) => "FAIL",
            (false, false) => "FAILED",
        }
    }

    pub fn format_event(&self, event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::WorkflowStarted {
                run_id,
                workflow,
                total_stages,
                total_tasks,
            } => format!(
                "RUN START {} (workflow {}, stages: {}, tasks: {})",
                run_id, workflow, total_stages, total_tasks
            ),
            ProgressEvent::StageStarted {
                stage_index,
                name,
                parallel,
                tasks,
                ..
            } => format!(
                "STAGE START {} {} (tasks: {}{})",
                stage_index,
                name,
                tasks.len(),
                if *parallel { ", parallel" } else { "" }
            ),
            ProgressEvent::StageSkipped {
                stage_index,
                name,
                reason,
                ..
            } => format!("STAGE SKIP {} {}: {}", stage_index, name, reason),
            ProgressEvent::StageCompleted {
                stage_index,
                name,
                success,
                duration_ms,
                ..
            } => format!(
                "STAGE END {} {} (status {}, duration {}ms)",
                stage_index,
                name,
                self.status(*success),
                duration_ms
            ),
            ProgressEvent::TaskStarted { key, stage_index, .. } => {
                format!("TASK START {} (stage {})", key, stage_index)
            }
            ProgressEvent::TaskCompleted { key, result, .. } => {
                let mut line = format!(
                    "TASK END {} (status {}, exit {}, duration {}ms)",
                    key,
                    self.status(result.is_success()),
                    result.metadata.exit_code,
                    result.metadata.duration_ms
                );
                if let Some(err) = &result.error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            ProgressEvent::TaskSkipped { key, reason, .. } => {
                format!("TASK SKIP {}: {}", key, reason)
            }
            ProgressEvent::WorkflowCompleted {
                run_id,
                success,
                duration_ms,
                failed,
                skipped,
                ..
            } => format!(
                "RUN END {} (status {}, failed {}, skipped {}, duration {}ms)",
                run_id,
                self.status(*success),
                failed,
                skipped,
                duration_ms
            ),
            ProgressEvent::Error { message, .. } => format!("ERROR {}", message),
        }
    }
}

impl ProgressListener for TextRenderer {
    fn on_event(&self, event: &ProgressEvent) {
        println!("{}", self.format_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use morph_core::executor::TaskResult;
    use morph_core::toolchain::TaskKey;

    #[test]
    fn test_task_end_line() {
        let renderer = TextRenderer::new(true);
        let key = TaskKey::new("morphir", "gen", "Scala");
        let event = ProgressEvent::TaskCompleted {
            run_id: "run".to_string(),
            stage_index: 1,
            key: key.clone(),
            result: TaskResult::failed(&key, "boom"),
        };

        let line = renderer.format_event(&event);
        assert!(line.starts_with("TASK END morphir/gen:Scala"));
        assert!(line.contains("status FAIL"));
        assert!(line.contains("exit -1"));
        assert!(line.ends_with(": boom"));
    }

    #[test]
    fn test_stage_lines() {
        let renderer = TextRenderer::new(false);
        let started = ProgressEvent::StageStarted {
            run_id: "run".to_string(),
            stage_index: 0,
            name: "compile".to_string(),
            parallel: true,
            tasks: vec![TaskKey::new("a", "b", ""), TaskKey::new("c", "d", "")],
        };
        assert_eq!(
            renderer.format_event(&started),
            "STAGE START 0 compile (tasks: 2, parallel)"
        );

        let skipped = ProgressEvent::StageSkipped {
            run_id: "run".to_string(),
            stage_index: 2,
            name: "docs".to_string(),
            reason: "condition \"false\" is false".to_string(),
        };
        assert_eq!(
            renderer.format_event(&skipped),
            "STAGE SKIP 2 docs: condition \"false\" is false"
        );
    }
}
