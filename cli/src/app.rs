//! Command wiring: builds the registry and planner from config, then runs
//! the requested command. Commands return their stdout text so they can be
//! tested without a terminal.
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use morph_core::config::{
    enablement_from_config, registry_from_config, workflows_from_config, AppConfig,
};
use morph_core::error::CliError;
use morph_core::plan::{plan_to_mermaid_with_options, MermaidOptions, Plan, PlanBuilder};
use morph_core::runner::{RunOptions, WorkflowResult, WorkflowRunner};
use morph_core::toolchain::{Enablement, Registry, Workflow};
use morph_core::vfs::Vfs;
use morph_plugins::factory;
use tokio_util::sync::CancellationToken;

use crate::commands::cli::{GraphArgs, PlanArgs, PlanFormat, RunArgs, RunFormat};

/// Everything a command needs, assembled once from config.
pub struct Session {
    pub config: AppConfig,
    pub workspace: PathBuf,
    vfs: Arc<dyn Vfs>,
    registry: Arc<Registry>,
    enablement: Enablement,
    workflows: BTreeMap<String, Workflow>,
}

/// Text for stdout plus the process exit code.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: String,
    pub exit_code: i32,
}

impl Session {
    pub fn open(config: AppConfig, workspace: &Path) -> Result<Self, CliError> {
        let vfs = factory::build_vfs(workspace);
        let registry = Arc::new(registry_from_config(&config)?);
        let enablement = enablement_from_config(
            &config,
            Some(factory::build_auto_enable_context(vfs.clone())),
        );
        let workflows = workflows_from_config(&config);
        tracing::debug!(
            workspace = %workspace.display(),
            toolchains = registry.list_toolchains().len(),
            workflows = workflows.len(),
            "session opened"
        );
        Ok(Self {
            config,
            workspace: workspace.to_path_buf(),
            vfs,
            registry,
            enablement,
            workflows,
        })
    }

    fn planner(&self) -> PlanBuilder {
        PlanBuilder::with_enablement(
            self.registry.clone(),
            self.workflows.clone(),
            self.enablement.clone(),
        )
    }

    pub fn build_plan(&self, workflow: &str) -> Result<Plan, CliError> {
        Ok(self.planner().build(workflow)?)
    }
}

pub fn plan_cmd(session: &Session, args: &PlanArgs) -> Result<String, CliError> {
    let plan = session.build_plan(&args.workflow)?;
    match args.format {
        PlanFormat::Json => {
            serde_json::to_string_pretty(&plan).map_err(|e| CliError::Command(e.to_string()))
        }
        PlanFormat::Text => Ok(format_plan(&plan)),
    }
}

fn format_plan(plan: &Plan) -> String {
    let mut out = format!(
        "Workflow: {} ({} stages, {} tasks)\n",
        plan.workflow.name,
        plan.stages.len(),
        plan.task_count()
    );
    for (index, stage) in plan.stages.iter().enumerate() {
        let _ = write!(out, "Stage {index}: {}", stage.name);
        if stage.parallel {
            out.push_str(" (parallel)");
        }
        if !stage.condition.trim().is_empty() {
            let _ = write!(out, " [if {}]", stage.condition);
        }
        out.push('\n');
        for task in plan.stage_tasks(index) {
            let _ = write!(out, "  - {}", task.key);
            if !task.depends_on.is_empty() {
                let deps: Vec<String> = task.depends_on.iter().map(ToString::to_string).collect();
                let _ = write!(out, " <- {}", deps.join(", "));
            }
            out.push('\n');
        }
    }
    out
}

pub fn graph_cmd(session: &Session, args: &GraphArgs) -> Result<String, CliError> {
    let plan = session.build_plan(&args.workflow)?;
    Ok(plan_to_mermaid_with_options(
        &plan,
        MermaidOptions {
            show_inputs: args.show_inputs,
            show_outputs: args.show_outputs,
            task_results: None,
        },
    ))
}

pub fn toolchains_cmd(session: &Session) -> String {
    let mut out = String::new();
    for toolchain in session.registry.toolchains() {
        let enabled = session.registry.is_enabled(&toolchain.name, &session.enablement);
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{} tasks",
            toolchain.name,
            toolchain.kind.label(),
            if enabled { "enabled" } else { "disabled" },
            toolchain.tasks.len()
        );
    }
    out
}

pub fn targets_cmd(session: &Session) -> String {
    let mut out = String::new();
    for target in session.registry.targets() {
        let providers: Vec<String> = session
            .registry
            .providers_of(&target.name)
            .into_iter()
            .map(|(toolchain, task)| format!("{toolchain}/{task}"))
            .collect();
        let _ = writeln!(
            out,
            "{}\tproduces [{}]\trequires [{}]\tprovided by [{}]",
            target.name,
            target.produces.join(", "),
            target.requires.join(", "),
            providers.join(", ")
        );
    }
    out
}

pub fn workflows_cmd(session: &Session) -> String {
    let mut out = String::new();
    for workflow in session.workflows.values() {
        let _ = write!(out, "{}", workflow.name);
        if let Some(base) = &workflow.extends {
            let _ = write!(out, " (extends {base})");
        }
        let _ = writeln!(out, "\t{} stages", workflow.stages.len());
    }
    out
}

fn run_options(
    session: &Session,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<RunOptions, CliError> {
    let run_cfg = &session.config.run;
    let mut options = RunOptions::default()
        .with_max_parallel(args.max_parallel.unwrap_or(run_cfg.max_parallel))
        .with_cancel(cancel);
    options.stop_on_error = run_cfg.stop_on_error && !args.keep_going;
    options.dry_run = args.dry_run;
    if let Some(secs) = args.timeout.or(run_cfg.timeout_secs) {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    let progress = args.progress && atty::is(atty::Stream::Stderr);
    if let Some(listener) = factory::build_renderer(args.format.as_str(), progress, false)? {
        options = options.with_progress(listener);
    }
    Ok(options)
}

#[tracing::instrument(name = "cli.run_workflow", skip(session, args, cancel), fields(workflow = %args.workflow))]
pub async fn run_cmd(
    session: &Session,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<RunOutcome, CliError> {
    let plan = session.build_plan(&args.workflow)?;
    let executor = factory::build_executor(
        &session.config,
        session.registry.clone(),
        session.vfs.clone(),
        &session.workspace,
    )?;
    let runner = WorkflowRunner::new(Arc::new(executor));
    let options = run_options(session, args, cancel)?;

    let result = runner.run(&plan, options).await;
    Ok(RunOutcome {
        report: report(&result, args.format),
        exit_code: if result.success { 0 } else { 1 },
    })
}

/// JSONL output stays machine-readable: the report is the serialized result.
fn report(result: &WorkflowResult, format: RunFormat) -> String {
    match format {
        RunFormat::Jsonl => serde_json::to_string(result).unwrap_or_else(|_| "{}".into()),
        RunFormat::Text | RunFormat::Quiet => result.summary(),
    }
}
