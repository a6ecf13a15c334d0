//! Resolving workflows into execution plans.

pub mod builder;
pub mod mermaid;
pub mod types;

pub use builder::PlanBuilder;
pub use mermaid::{plan_to_mermaid, plan_to_mermaid_with_options, MermaidOptions};
pub use types::{Plan, PlanStage, PlanTask};
