//! Turns parsed configuration into registry, workflow and enablement values.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::toolchain::{
    AcquireBackend, AcquireConfig, AutoEnable, AutoEnableContext, Enablement, Registry, Target,
    TaskDef, TaskRun, Toolchain, ToolchainKind, Workflow,
};
use crate::vfs::VPath;

use super::types::{
    AppConfig, AutoEnableConfig, OutputConfig, TargetConfig, TaskConfig, ToolchainConfig,
    WorkflowConfig,
};

/// Parses durations such as `250ms`, `30s`, `5m`, `1h` or `1h30m`.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let mut rest = raw.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        }
        .ok_or_else(invalid)?;
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

fn optional_duration(field: String, raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_duration(&field, raw).map(Some),
        None => Ok(None),
    }
}

/// Config-loaded toolchains are always external.
pub fn toolchain_from_config(name: &str, cfg: &ToolchainConfig) -> Result<Toolchain, ConfigError> {
    let acquire = AcquireConfig {
        backend: AcquireBackend::parse(&cfg.acquire.backend),
        package: cfg.acquire.package.clone(),
        version: cfg.acquire.version.clone(),
        executable: cfg.acquire.executable.clone(),
    };

    let tasks = cfg
        .tasks
        .iter()
        .map(|(task_name, task_cfg)| task_from_config(name, task_name, task_cfg))
        .collect::<Result<Vec<_>, _>>()?;

    let auto_enable = match &cfg.auto_enable {
        Some(rules) if !rules.is_empty() => Some(auto_enable_predicate(name, rules)?),
        _ => None,
    };

    Ok(Toolchain {
        name: name.to_string(),
        version: cfg.version.clone(),
        description: cfg.description.clone(),
        kind: ToolchainKind::External(acquire),
        env: cfg.env.clone(),
        working_dir: cfg.working_dir.as_ref().map(PathBuf::from),
        timeout: optional_duration(format!("toolchains.{name}.timeout"), cfg.timeout.as_deref())?,
        tasks,
        auto_enable,
    })
}

pub fn task_from_config(
    toolchain: &str,
    name: &str,
    cfg: &TaskConfig,
) -> Result<TaskDef, ConfigError> {
    Ok(TaskDef {
        name: name.to_string(),
        description: cfg.description.clone(),
        run: TaskRun::Command {
            exec: cfg.exec.clone().filter(|e| !e.is_empty()),
            args: cfg.args.clone(),
        },
        inputs: cfg.inputs.clone(),
        outputs: cfg.outputs.clone(),
        fulfills: cfg.fulfills.clone(),
        variants: cfg.variants.clone(),
        env: cfg.env.clone(),
        working_dir: cfg.working_dir.as_ref().map(PathBuf::from),
        timeout: optional_duration(
            format!("toolchains.{toolchain}.tasks.{name}.timeout"),
            cfg.timeout.as_deref(),
        )?,
    })
}

pub fn target_from_config(name: &str, cfg: &TargetConfig) -> Target {
    Target {
        name: name.to_string(),
        description: cfg.description.clone(),
        produces: cfg.produces.clone(),
        requires: cfg.requires.clone(),
        variants: cfg.variants.clone(),
    }
}

pub fn workflow_from_config(name: &str, cfg: &WorkflowConfig) -> Workflow {
    Workflow {
        name: name.to_string(),
        description: cfg.description.clone(),
        extends: cfg.extends.clone().filter(|e| !e.is_empty()),
        stages: cfg.stages.clone(),
    }
}

/// Registers every configured target and toolchain into `registry`.
/// Configured toolchains replace same-named ones already registered.
pub fn register_from_config(registry: &mut Registry, cfg: &AppConfig) -> Result<(), ConfigError> {
    for (name, target) in &cfg.targets {
        registry.register_target(target_from_config(name, target));
    }
    for (name, toolchain) in &cfg.toolchains {
        registry.register(toolchain_from_config(name, toolchain)?);
    }
    Ok(())
}

pub fn registry_from_config(cfg: &AppConfig) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new();
    register_from_config(&mut registry, cfg)?;
    Ok(registry)
}

pub fn workflows_from_config(cfg: &AppConfig) -> BTreeMap<String, Workflow> {
    cfg.workflows
        .iter()
        .map(|(name, wf)| (name.clone(), workflow_from_config(name, wf)))
        .collect()
}

pub fn enablement_from_config(cfg: &AppConfig, auto: Option<AutoEnableContext>) -> Enablement {
    let mut enablement = Enablement::new();
    enablement.explicit = cfg.enablement.clone();
    enablement.auto = auto;
    enablement
}

/// Output root as an absolute virtual path.
pub fn output_root(cfg: &OutputConfig) -> Result<VPath, ConfigError> {
    VPath::root()
        .join(&cfg.root)
        .map_err(|source| ConfigError::InvalidOutputRoot {
            value: cfg.root.clone(),
            source,
        })
}

fn auto_enable_predicate(toolchain: &str, rules: &AutoEnableConfig) -> Result<AutoEnable, ConfigError> {
    for pattern in &rules.patterns {
        if glob::Pattern::new(pattern).is_err() {
            return Err(ConfigError::InvalidPattern {
                toolchain: toolchain.to_string(),
                pattern: pattern.clone(),
            });
        }
    }
    let rules = rules.clone();
    Ok(Arc::new(move |ctx: &AutoEnableContext| {
        (rules.all_files.is_empty() || ctx.has_all_files(&rules.all_files))
            && (rules.any_files.is_empty() || ctx.has_any_file(&rules.any_files))
            && (rules.patterns.is_empty() || ctx.has_any_matching_files(&rules.patterns))
    }))
}
