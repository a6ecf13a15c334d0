#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use morph_core::error::ExecutorError;
use morph_core::executor::{TaskExecutor, TaskMetadata, TaskResult};
use morph_core::plan::{Plan, PlanBuilder, PlanTask};
use morph_core::runner::{ProgressEvent, ProgressListener};
use morph_core::toolchain::{Registry, TaskDef, TaskKey, Target, Toolchain, Workflow, WorkflowStage};
use tokio_util::sync::CancellationToken;

/// Two toolchains: `morphir` compiles and generates, `alt` only lints.
pub fn pipeline_registry() -> Registry {
    let mut reg = Registry::new();
    reg.register_target(Target::new("make").producing(["morphir-ir"]));
    reg.register_target(
        Target::new("gen")
            .requiring(["morphir-ir"])
            .producing(["source"]),
    );
    reg.register(
        Toolchain::native("morphir")
            .with_task(
                TaskDef::new("make")
                    .with_fulfills(["make"])
                    .with_output("ir", "morphir-ir.json", "morphir-ir"),
            )
            .with_task(
                TaskDef::new("gen")
                    .with_fulfills(["gen"])
                    .with_variants(["Scala", "TypeScript"])
                    .with_artifact_input("ir", "@morphir/make:ir"),
            )
            .with_task(TaskDef::new("lint").with_fulfills(["lint"])),
    );
    reg.register(Toolchain::native("alt").with_task(TaskDef::new("lint").with_fulfills(["lint"])));
    reg
}

pub fn builder(workflows: Vec<Workflow>) -> PlanBuilder {
    let workflows: BTreeMap<String, Workflow> =
        workflows.into_iter().map(|w| (w.name.clone(), w)).collect();
    PlanBuilder::new(Arc::new(pipeline_registry()), workflows)
}

pub fn workflow(name: &str, stages: Vec<WorkflowStage>) -> Workflow {
    stages
        .into_iter()
        .fold(Workflow::new(name), |wf, stage| wf.with_stage(stage))
}

pub fn plan(stages: Vec<WorkflowStage>) -> Plan {
    builder(vec![workflow("build", stages)])
        .build("build")
        .expect("plan should build")
}

pub fn key(raw: &str) -> TaskKey {
    raw.parse().expect("valid task key")
}

/// Executor that records calls, fails selected tasks and tracks how many
/// tasks were in flight at once.
#[derive(Default)]
pub struct FakeExecutor {
    pub fail: HashSet<TaskKey>,
    pub delay: Duration,
    pub calls: Mutex<Vec<TaskKey>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, key: TaskKey) -> Self {
        self.fail.insert(key);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<TaskKey> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn execute(
        &self,
        task: &PlanTask,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutorError> {
        self.calls.lock().unwrap().push(task.key.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let mut metadata = TaskMetadata::started(&task.key);
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(self.delay) => false,
            _ = cancel.cancelled() => true,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = interrupted || self.fail.contains(&task.key);
        metadata.finish(if failed { 1 } else { 0 }, !failed);
        let mut result = TaskResult::new(metadata);
        if failed {
            result.error = Some(format!("task failed with exit code 1: {}", task.key));
        }
        Ok(result)
    }
}

/// Progress listener that keeps every event.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ProgressEvent::kind).collect()
    }

    pub fn listener(self: &Arc<Self>) -> Arc<dyn ProgressListener> {
        let recorder = Arc::clone(self);
        Arc::new(move |event: &ProgressEvent| {
            recorder.events.lock().unwrap().push(event.clone());
        })
    }
}
