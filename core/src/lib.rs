//! Toolchain orchestration engine for morph.
//!
//! Toolchains register tasks, targets describe the artifacts those tasks
//! produce, and workflows group targets into stages. [`plan::PlanBuilder`]
//! resolves a workflow into a [`plan::Plan`], [`runner::WorkflowRunner`]
//! executes it and [`executor::Executor`] runs the individual tasks.

pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod process;
pub mod runner;
pub mod toolchain;
pub mod vfs;
