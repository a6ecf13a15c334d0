//! Toolchains, tasks, targets and workflows, plus the registry that holds
//! them.

pub mod diagnostics;
pub mod enablement;
pub mod handler;
pub mod key;
pub mod output_dir;
pub mod registry;
pub mod spec;
pub mod types;

pub use diagnostics::{Diagnostic, Location, Severity};
pub use enablement::{AutoEnableContext, Enablement};
pub use handler::{
    handler_fn, Artifact, FnHandler, HandlerContext, HandlerOutput, TaskHandler, TaskInput,
};
pub use key::TaskKey;
pub use output_dir::OutputDirStructure;
pub use registry::Registry;
pub use spec::{ArtifactRef, TargetSpec};
pub use types::{
    AcquireBackend, AcquireConfig, AutoEnable, InputSpec, OutputSpec, TaskDef, TaskRun, Target,
    Toolchain, ToolchainKind, Workflow, WorkflowStage,
};
