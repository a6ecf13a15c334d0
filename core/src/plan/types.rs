use std::collections::BTreeMap;

use serde::Serialize;

use crate::toolchain::{InputSpec, OutputSpec, TaskKey, Workflow};

/// One resolved occurrence of a task in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTask {
    pub key: TaskKey,
    /// Target name the task was resolved from (task name for direct refs).
    pub target: String,
    pub inputs: InputSpec,
    pub outputs: BTreeMap<String, OutputSpec>,
    pub depends_on: Vec<TaskKey>,
    pub stage_index: usize,
    /// Spec string as written in the workflow.
    pub target_source: String,
}

impl PlanTask {
    pub fn toolchain(&self) -> &str {
        &self.key.toolchain
    }

    pub fn task(&self) -> &str {
        &self.key.task
    }

    pub fn variant(&self) -> &str {
        &self.key.variant
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStage {
    pub name: String,
    pub parallel: bool,
    pub condition: String,
    /// Keys into [`Plan::tasks`], in resolution order.
    pub tasks: Vec<TaskKey>,
}

/// A workflow resolved against a registry, ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Workflow after inheritance was applied.
    pub workflow: Workflow,
    pub stages: Vec<PlanStage>,
    pub tasks: BTreeMap<TaskKey, PlanTask>,
}

impl Plan {
    pub fn empty(workflow: Workflow) -> Self {
        Self {
            workflow,
            stages: Vec::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn task(&self, key: &TaskKey) -> Option<&PlanTask> {
        self.tasks.get(key)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks of one stage, in stage order.
    pub fn stage_tasks(&self, index: usize) -> Vec<&PlanTask> {
        self.stages
            .get(index)
            .map(|stage| stage.tasks.iter().filter_map(|k| self.tasks.get(k)).collect())
            .unwrap_or_default()
    }
}
