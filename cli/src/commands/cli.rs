use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Text,
    Json,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFormat {
    Text,
    Jsonl,
    Quiet,
}

impl RunFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
            Self::Quiet => "quiet",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "morph", version, about = "Plan and run toolchain workflows")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of morph.toml lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory; defaults to the current directory.
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a workflow and print its plan.
    Plan(PlanArgs),
    /// Print a workflow's plan as a Mermaid flowchart.
    Graph(GraphArgs),
    /// Execute a workflow.
    Run(RunArgs),
    /// List registered toolchains.
    Toolchains,
    /// List registered targets and the tasks providing them.
    Targets,
    /// List configured workflows.
    Workflows,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    pub workflow: String,

    #[arg(long, value_enum, default_value_t = PlanFormat::Text)]
    pub format: PlanFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GraphArgs {
    pub workflow: String,

    #[arg(long)]
    pub show_inputs: bool,

    #[arg(long)]
    pub show_outputs: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    pub workflow: String,

    /// Record every task as succeeded without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running later stages after a failure.
    #[arg(long)]
    pub keep_going: bool,

    /// Concurrent tasks per parallel stage (0 = unlimited).
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Deadline for the whole run, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long, value_enum, default_value_t = RunFormat::Text)]
    pub format: RunFormat,

    /// Show progress bars on stderr.
    #[arg(long)]
    pub progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let args = Args::parse_from([
            "morph",
            "--workspace",
            "/tmp/project",
            "run",
            "build",
            "--dry-run",
            "--max-parallel",
            "4",
            "--format",
            "jsonl",
        ]);
        assert_eq!(args.workspace, Some(PathBuf::from("/tmp/project")));
        let Commands::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.workflow, "build");
        assert!(run.dry_run);
        assert!(!run.keep_going);
        assert_eq!(run.max_parallel, Some(4));
        assert_eq!(run.format, RunFormat::Jsonl);
    }

    #[test]
    fn test_parse_graph_and_global_config() {
        let args = Args::parse_from(["morph", "graph", "ci", "--show-inputs", "--config", "x.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            args.command,
            Commands::Graph(GraphArgs { show_inputs: true, show_outputs: false, .. })
        ));
    }
}
