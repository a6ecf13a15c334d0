use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use morph_core::runner::{ProgressEvent, ProgressListener};

/// Live progress bars on stderr.
///
/// One overall bar counts finished and skipped tasks; each running task
/// gets a spinner until it completes.
pub struct ProgressBarRenderer {
    multi: MultiProgress,
    state: Mutex<BarState>,
    enabled: bool,
}

struct BarState {
    overall: ProgressBar,
    total_stages: usize,
    task_bars: HashMap<String, ProgressBar>,
}

impl ProgressBarRenderer {
    /// # Arguments
    ///
    /// * `enabled` - Whether to draw anything (disabled when stderr is not a terminal)
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(BarState {
                overall: ProgressBar::hidden(),
                total_stages: 0,
                task_bars: HashMap::new(),
            }),
            enabled,
        }
    }

    fn state(&self) -> MutexGuard<'_, BarState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start(&self, total_tasks: usize, total_stages: usize) {
        let overall = self.multi.add(ProgressBar::new(total_tasks as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
        {
            overall.set_style(style.progress_chars("█▓▒░  "));
        }
        overall.set_message("Starting...");

        let mut state = self.state();
        state.overall = overall;
        state.total_stages = total_stages;
    }

    fn add_task(&self, task_id: String) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message(format!("⏳ {}", task_id));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.state().task_bars.insert(task_id, bar);
    }

    fn complete_task(&self, task_id: &str, success: bool, duration_ms: u64) {
        let mut state = self.state();
        if let Some(bar) = state.task_bars.remove(task_id) {
            let icon = if success { "✅" } else { "❌" };
            bar.finish_with_message(format!("{} {} ({}ms)", icon, task_id, duration_ms));
        }
        state.overall.inc(1);
    }
}

impl ProgressListener for ProgressBarRenderer {
    fn on_event(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        match event {
            ProgressEvent::WorkflowStarted {
                total_tasks,
                total_stages,
                ..
            } => self.start(*total_tasks, *total_stages),
            ProgressEvent::StageStarted {
                stage_index, name, ..
            } => {
                let state = self.state();
                state.overall.set_message(format!(
                    "Stage {}/{}: {}",
                    stage_index + 1,
                    state.total_stages,
                    name
                ));
            }
            ProgressEvent::TaskStarted { key, .. } => self.add_task(key.to_string()),
            ProgressEvent::TaskCompleted { key, result, .. } => self.complete_task(
                &key.to_string(),
                result.is_success(),
                result.metadata.duration_ms,
            ),
            ProgressEvent::TaskSkipped { .. } => self.state().overall.inc(1),
            ProgressEvent::WorkflowCompleted { success, .. } => {
                let msg = if *success {
                    "✅ All tasks completed"
                } else {
                    "❌ Execution failed"
                };
                let mut state = self.state();
                for (_, bar) in state.task_bars.drain() {
                    bar.finish_and_clear();
                }
                state.overall.finish_with_message(msg);
            }
            ProgressEvent::StageSkipped { .. }
            | ProgressEvent::StageCompleted { .. }
            | ProgressEvent::Error { .. } => {}
        }
    }
}

impl Drop for ProgressBarRenderer {
    fn drop(&mut self) {
        for (_, bar) in self.state().task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}
