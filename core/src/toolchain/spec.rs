//! Target-spec and artifact-reference grammars.
//!
//! ```text
//! target spec   := name | name ":" variant | toolchain "/" task [":" variant]
//! artifact ref  := "@" toolchain "/" task ":" artifact
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::SpecError;

/// One entry of a workflow stage's target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Capability lookup across every enabled toolchain.
    Target {
        name: String,
        variant: Option<String>,
    },
    /// Direct reference to one toolchain's task.
    Task {
        toolchain: String,
        task: String,
        variant: Option<String>,
    },
}

impl TargetSpec {
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        if is_direct_task_ref(spec) {
            let (toolchain, task, variant) = parse_task_ref(spec)?;
            return Ok(Self::Task {
                toolchain,
                task,
                variant,
            });
        }
        let (name, variant) = parse_target_name(spec)?;
        Ok(Self::Target { name, variant })
    }

    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::Target { variant, .. } | Self::Task { variant, .. } => variant.as_deref(),
        }
    }
}

impl FromStr for TargetSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target { name, variant } => {
                f.write_str(name)?;
                if let Some(v) = variant {
                    write!(f, ":{v}")?;
                }
                Ok(())
            }
            Self::Task {
                toolchain,
                task,
                variant,
            } => {
                write!(f, "{toolchain}/{task}")?;
                if let Some(v) = variant {
                    write!(f, ":{v}")?;
                }
                Ok(())
            }
        }
    }
}

/// A spec is a direct reference when it has a `/` past the first character
/// and before any `:`.
pub fn is_direct_task_ref(spec: &str) -> bool {
    match (spec.find('/'), spec.find(':')) {
        (Some(slash), None) => slash > 0,
        (Some(slash), Some(colon)) => slash > 0 && slash < colon,
        (None, _) => false,
    }
}

/// Parses `name` or `name:variant`.
pub fn parse_target_name(spec: &str) -> Result<(String, Option<String>), SpecError> {
    if spec.trim().is_empty() {
        return Err(SpecError::EmptyTarget);
    }
    match spec.split_once(':') {
        None => Ok((spec.to_string(), None)),
        Some(("", _)) => Err(SpecError::MissingTargetName(spec.to_string())),
        Some((_, "")) => Err(SpecError::MissingVariant(spec.to_string())),
        Some((name, variant)) => Ok((name.to_string(), Some(variant.to_string()))),
    }
}

/// Parses `toolchain/task` or `toolchain/task:variant`.
pub fn parse_task_ref(spec: &str) -> Result<(String, String, Option<String>), SpecError> {
    if spec.trim().is_empty() {
        return Err(SpecError::EmptyTaskRef);
    }
    let (path, variant) = match spec.split_once(':') {
        Some((_, "")) => return Err(SpecError::MissingTaskVariant(spec.to_string())),
        Some((path, variant)) => (path, Some(variant.to_string())),
        None => (spec, None),
    };
    let Some((toolchain, task)) = path.split_once('/') else {
        return Err(SpecError::NotTaskRef(path.to_string()));
    };
    if toolchain.is_empty() {
        return Err(SpecError::MissingToolchain(path.to_string()));
    }
    if task.is_empty() {
        return Err(SpecError::MissingTask(path.to_string()));
    }
    Ok((toolchain.to_string(), task.to_string(), variant))
}

/// `@toolchain/task:artifact`, the form used in `inputs.artifacts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub toolchain: String,
    pub task: String,
    pub artifact: String,
}

impl ArtifactRef {
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        let Some(body) = raw.strip_prefix('@') else {
            return Err(SpecError::ArtifactMissingAt(raw.to_string()));
        };
        let Some((task_part, artifact)) = body.split_once(':') else {
            return Err(SpecError::ArtifactMissingSeparator(body.to_string()));
        };
        let Some((toolchain, task)) = task_part.split_once('/') else {
            return Err(SpecError::ArtifactMissingTask(body.to_string()));
        };
        if task.contains('/') {
            return Err(SpecError::ArtifactMissingTask(body.to_string()));
        }
        if toolchain.is_empty() || task.is_empty() {
            return Err(SpecError::ArtifactEmptyComponent(body.to_string()));
        }
        if artifact.is_empty() || artifact.contains(':') {
            return Err(SpecError::ArtifactMissingName(body.to_string()));
        }
        Ok(Self {
            toolchain: toolchain.to_string(),
            task: task.to_string(),
            artifact: artifact.to_string(),
        })
    }
}

impl FromStr for ArtifactRef {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}:{}", self.toolchain, self.task, self.artifact)
    }
}
