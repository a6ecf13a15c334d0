use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::toolchain::{InputSpec, OutputSpec, WorkflowStage};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Explicit on/off per toolchain. Wins over auto-enable detection.
    #[serde(default)]
    pub enablement: BTreeMap<String, bool>,

    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,

    #[serde(default)]
    pub toolchains: BTreeMap<String, ToolchainConfig>,

    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, also log to a daily file under `directory`.
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "morph_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Directory for log files. Defaults to `~/.morph/logs`.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,

    /// 0 = unlimited.
    #[serde(default)]
    pub max_parallel: usize,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_stop_on_error() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stop_on_error: default_stop_on_error(),
            max_parallel: 0,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output root, relative to the workspace.
    #[serde(default = "default_output_root")]
    pub root: String,
}

fn default_output_root() -> String {
    ".morph/out".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Duration string such as "30s", "5m" or "1h30m".
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub acquire: AcquireSection,
    #[serde(default)]
    pub auto_enable: Option<AutoEnableConfig>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquireSection {
    /// path (default), npx, bunx, yarn-dlx, pnpm-dlx, deno-npm, npm-exec.
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub executable: String,
}

/// Project detection rules. Every non-empty list must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoEnableConfig {
    #[serde(default)]
    pub all_files: Vec<String>,
    #[serde(default)]
    pub any_files: Vec<String>,
    /// Globs relative to the project root; any match is enough.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl AutoEnableConfig {
    pub fn is_empty(&self) -> bool {
        self.all_files.is_empty() && self.any_files.is_empty() && self.patterns.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exec: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub fulfills: Vec<String>,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub inputs: InputSpec,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub stages: Vec<WorkflowStage>,
}
