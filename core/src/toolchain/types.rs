use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::enablement::AutoEnableContext;
use super::handler::TaskHandler;

/// How an external toolchain's executable is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AcquireBackend {
    /// Executable looked up on PATH.
    #[default]
    Path,
    Npx,
    Bunx,
    YarnDlx,
    PnpmDlx,
    DenoNpm,
    NpmExec,
    Other(String),
}

impl AcquireBackend {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "path" => Self::Path,
            "npx" => Self::Npx,
            "bunx" => Self::Bunx,
            "yarn-dlx" => Self::YarnDlx,
            "pnpm-dlx" => Self::PnpmDlx,
            "deno-npm" => Self::DenoNpm,
            "npm-exec" => Self::NpmExec,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Path => "path",
            Self::Npx => "npx",
            Self::Bunx => "bunx",
            Self::YarnDlx => "yarn-dlx",
            Self::PnpmDlx => "pnpm-dlx",
            Self::DenoNpm => "deno-npm",
            Self::NpmExec => "npm-exec",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcquireConfig {
    pub backend: AcquireBackend,
    pub package: String,
    pub version: String,
    pub executable: String,
}

impl AcquireConfig {
    pub fn path(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// `package` or `package@version`.
    pub fn package_spec(&self) -> String {
        if self.version.is_empty() {
            self.package.clone()
        } else {
            format!("{}@{}", self.package, self.version)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainKind {
    /// Tasks run in-process through their handlers.
    Native,
    /// Tasks run as child processes.
    External(AcquireConfig),
}

impl ToolchainKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::External(_) => "external",
        }
    }
}

pub type AutoEnable = Arc<dyn Fn(&AutoEnableContext) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Toolchain {
    pub name: String,
    pub version: String,
    pub description: String,
    pub kind: ToolchainKind,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub tasks: Vec<TaskDef>,
    /// Decides enablement when no explicit setting exists. `None` means the
    /// toolchain must be enabled explicitly.
    pub auto_enable: Option<AutoEnable>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("env", &self.env)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .field("tasks", &self.tasks)
            .field("auto_enable", &self.auto_enable.is_some())
            .finish()
    }
}

impl Toolchain {
    fn with_kind(name: impl Into<String>, kind: ToolchainKind) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            description: String::new(),
            kind,
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
            tasks: Vec::new(),
            auto_enable: None,
        }
    }

    pub fn native(name: impl Into<String>) -> Self {
        Self::with_kind(name, ToolchainKind::Native)
    }

    pub fn external(name: impl Into<String>, acquire: AcquireConfig) -> Self {
        Self::with_kind(name, ToolchainKind::External(acquire))
    }

    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn with_task(mut self, task: TaskDef) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_auto_enable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AutoEnableContext) -> bool + Send + Sync + 'static,
    {
        self.auto_enable = Some(Arc::new(predicate));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub files: Vec<String>,
    /// Local name -> `@toolchain/task:artifact`.
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
}

impl InputSpec {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.artifacts.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Relative to the task's output directory.
    pub path: String,
    #[serde(rename = "type", default)]
    pub artifact_type: String,
}

#[derive(Clone)]
pub enum TaskRun {
    Handler(Arc<dyn TaskHandler>),
    Command {
        /// Overrides the toolchain's acquired executable.
        exec: Option<String>,
        args: Vec<String>,
    },
}

impl fmt::Debug for TaskRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Command { exec, args } => f
                .debug_struct("Command")
                .field("exec", exec)
                .field("args", args)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
    pub run: TaskRun,
    pub inputs: InputSpec,
    pub outputs: BTreeMap<String, OutputSpec>,
    pub fulfills: Vec<String>,
    pub variants: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl TaskDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            run: TaskRun::Command {
                exec: None,
                args: Vec::new(),
            },
            inputs: InputSpec::default(),
            outputs: BTreeMap::new(),
            fulfills: Vec::new(),
            variants: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Canonical spelling of `wanted` among this task's variants.
    pub fn match_variant(&self, wanted: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    pub fn fulfills_target(&self, target: &str) -> bool {
        self.fulfills.iter().any(|f| f == target)
    }

    pub fn with_fulfills<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fulfills.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants.extend(variants.into_iter().map(Into::into));
        self
    }

    pub fn with_output(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        self.outputs.insert(
            name.into(),
            OutputSpec {
                path: path.into(),
                artifact_type: artifact_type.into(),
            },
        );
        self
    }

    pub fn with_artifact_input(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.inputs.artifacts.insert(name.into(), reference.into());
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.run = TaskRun::Handler(handler);
        self
    }

    pub fn with_command<I, S>(mut self, exec: Option<&str>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run = TaskRun::Command {
            exec: exec.map(str::to_string),
            args: args.into_iter().map(Into::into).collect(),
        };
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Toolchain-agnostic capability contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Artifact types this target yields.
    #[serde(default)]
    pub produces: Vec<String>,
    /// Artifact types that must come from exactly one task in the plan.
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub variants: Vec<String>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn producing<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn requiring<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(types.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    /// Empty means "always run".
    #[serde(default)]
    pub condition: String,
}

impl WorkflowStage {
    pub fn new<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            parallel: false,
            condition: String::new(),
        }
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub stages: Vec<WorkflowStage>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn extending(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    pub fn with_stage(mut self, stage: WorkflowStage) -> Self {
        self.stages.push(stage);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(AcquireBackend::parse(""), AcquireBackend::Path);
        assert_eq!(AcquireBackend::parse("yarn-dlx"), AcquireBackend::YarnDlx);
        assert_eq!(
            AcquireBackend::parse("cargo-binstall"),
            AcquireBackend::Other("cargo-binstall".into())
        );
        assert_eq!(AcquireBackend::NpmExec.as_str(), "npm-exec");
    }

    #[test]
    fn test_package_spec() {
        let mut acquire = AcquireConfig {
            backend: AcquireBackend::Npx,
            package: "morphir-elm".into(),
            ..AcquireConfig::default()
        };
        assert_eq!(acquire.package_spec(), "morphir-elm");
        acquire.version = "2.90.0".into();
        assert_eq!(acquire.package_spec(), "morphir-elm@2.90.0");
    }

    #[test]
    fn test_match_variant_keeps_task_spelling() {
        let task = TaskDef::new("gen").with_variants(["Scala", "TypeScript"]);
        assert_eq!(task.match_variant("scala"), Some("Scala"));
        assert_eq!(task.match_variant("TYPESCRIPT"), Some("TypeScript"));
        assert_eq!(task.match_variant("java"), None);
    }
}
