use std::fmt;

use thiserror::Error;

/// Every problem found while building one plan.
///
/// Planning never stops at the first issue; all of them are collected and
/// reported together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanError {
    pub issues: Vec<String>,
}

impl PlanError {
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }

    pub fn single(issue: impl Into<String>) -> Self {
        Self {
            issues: vec![issue.into()],
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.issues.iter().any(|i| i.contains(needle))
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return f.write_str("plan: invalid workflow");
        }
        f.write_str("plan: invalid workflow:")?;
        for issue in &self.issues {
            write!(f, "\n- {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PlanError {}

/// Malformed target specs and artifact references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("empty target specification")]
    EmptyTarget,
    #[error("invalid target specification {0:?}: missing target name")]
    MissingTargetName(String),
    #[error("invalid target specification {0:?}: missing variant")]
    MissingVariant(String),

    #[error("empty task reference")]
    EmptyTaskRef,
    #[error("invalid task reference {0:?}: expected toolchain/task format")]
    NotTaskRef(String),
    #[error("invalid task reference {0:?}: missing toolchain name")]
    MissingToolchain(String),
    #[error("invalid task reference {0:?}: missing task name")]
    MissingTask(String),
    #[error("invalid task reference {0:?}: missing variant after ':'")]
    MissingTaskVariant(String),

    #[error("artifact ref must start with '@': {0}")]
    ArtifactMissingAt(String),
    #[error("artifact ref must include ':' separator: {0}")]
    ArtifactMissingSeparator(String),
    #[error("artifact ref must include toolchain/task: {0}")]
    ArtifactMissingTask(String),
    #[error("artifact ref must include toolchain and task: {0}")]
    ArtifactEmptyComponent(String),
    #[error("artifact ref must name an artifact: {0}")]
    ArtifactMissingName(String),
}
