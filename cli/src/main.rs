use std::path::PathBuf;

use clap::Parser;
use morph_cli::app::{self, Session};
use morph_cli::commands::cli;
use morph_core::config::{self, LoggingConfig};
use morph_core::error::{CliError, ExecutorError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let workspace = match &args.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let cfg = config::load(args.config.as_deref(), &workspace)?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    let session = Session::open(cfg, &workspace)?;
    dispatch(args.command, &session).await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 1: workflow failed (returned as a normal exit code, not as an error)
    // 11: config error
    // 12: plan error
    // 20: process / IO error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Plan(_) => 12,
        CliError::Executor(ee) => match ee {
            ExecutorError::Process(_) => 20,
            _ => 50,
        },
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

async fn dispatch(cmd: cli::Commands, session: &Session) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Plan(plan_args) => {
            print!("{}", ensure_newline(app::plan_cmd(session, &plan_args)?));
            Ok(0)
        }
        cli::Commands::Graph(graph_args) => {
            print!("{}", app::graph_cmd(session, &graph_args)?);
            Ok(0)
        }
        cli::Commands::Run(run_args) => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling run");
                    on_signal.cancel();
                }
            });

            let outcome = app::run_cmd(session, &run_args, cancel).await?;
            match run_args.format {
                cli::RunFormat::Jsonl => println!("{}", outcome.report),
                _ => eprint!("{}", outcome.report),
            }
            Ok(outcome.exit_code)
        }
        cli::Commands::Toolchains => {
            print!("{}", app::toolchains_cmd(session));
            Ok(0)
        }
        cli::Commands::Targets => {
            print!("{}", app::targets_cmd(session));
            Ok(0)
        }
        cli::Commands::Workflows => {
            print!("{}", app::workflows_cmd(session));
            Ok(0)
        }
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => PathBuf::from(d),
            None => std::env::temp_dir().join("morph"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let appender = tracing_appender::rolling::daily(dir, "morph.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
