//! Command-line assembly for external toolchain tasks.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};

use crate::error::ExecutorError;
use crate::process::{ProcessRequest, ProcessRunner};
use crate::toolchain::{AcquireBackend, AcquireConfig, TaskDef, Toolchain};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\{(variant|outputs\.([A-Za-z0-9_.\-]+))\}").expect("placeholder regex is valid")
    })
}

/// Program to launch plus the arguments its backend puts before the task's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub program: String,
    pub prefix: Vec<String>,
}

/// Runner binary and argument prefix for package-runner backends.
fn package_runner(backend: &AcquireBackend, spec: &str) -> Option<(&'static str, Vec<String>)> {
    let (runner, prefix): (&'static str, Vec<String>) = match backend {
        AcquireBackend::Npx => ("npx", vec!["-y".into(), spec.into()]),
        AcquireBackend::Bunx => ("bunx", vec![spec.into()]),
        AcquireBackend::YarnDlx => ("yarn", vec!["dlx".into(), spec.into()]),
        AcquireBackend::PnpmDlx => ("pnpm", vec!["dlx".into(), spec.into()]),
        AcquireBackend::DenoNpm => (
            "deno",
            vec!["run".into(), "-A".into(), format!("npm:{spec}")],
        ),
        AcquireBackend::NpmExec => (
            "npm",
            vec!["exec".into(), "--yes".into(), "--".into(), spec.into()],
        ),
        AcquireBackend::Path | AcquireBackend::Other(_) => return None,
    };
    Some((runner, prefix))
}

/// Resolves how `task` is launched under `acquire`.
///
/// `path` uses the task's `exec` override, falling back to the acquired
/// executable, and checks it on PATH. Package runners check the runner
/// binary and require a package name.
pub fn resolve_launcher(
    process: &dyn ProcessRunner,
    acquire: &AcquireConfig,
    task: &TaskDef,
    exec: Option<&str>,
) -> Result<Launcher, ExecutorError> {
    match &acquire.backend {
        AcquireBackend::Path => {
            let program = exec
                .filter(|e| !e.is_empty())
                .or_else(|| Some(acquire.executable.as_str()).filter(|e| !e.is_empty()))
                .ok_or_else(|| ExecutorError::NoExecutable(task.name.clone()))?;
            let resolved = process.resolve_executable(program)?;
            Ok(Launcher {
                program: resolved.to_string_lossy().into_owned(),
                prefix: Vec::new(),
            })
        }
        AcquireBackend::Other(name) => Err(ExecutorError::UnsupportedBackend(name.clone())),
        backend => {
            let spec = acquire.package_spec();
            let Some((runner, prefix)) = package_runner(backend, &spec) else {
                return Err(ExecutorError::UnsupportedBackend(backend.as_str().to_string()));
            };
            let resolved = process.resolve_executable(runner).map_err(|_| {
                ExecutorError::RunnerNotFound {
                    runner: runner.to_string(),
                    backend: backend.as_str().to_string(),
                }
            })?;
            if acquire.package.is_empty() {
                return Err(ExecutorError::MissingPackage(backend.as_str().to_string()));
            }
            Ok(Launcher {
                program: resolved.to_string_lossy().into_owned(),
                prefix,
            })
        }
    }
}

/// Replaces `{variant}` and `{outputs.<name>}`. Unknown outputs are left
/// untouched, as is `{variant}` when the task runs without one.
pub fn substitute_args(
    args: &[String],
    variant: &str,
    outputs: &BTreeMap<String, String>,
) -> Vec<String> {
    let re = placeholder_regex();
    args.iter()
        .map(|arg| {
            re.replace_all(arg, |caps: &Captures<'_>| {
                let whole = caps[0].to_string();
                match caps.get(2) {
                    Some(name) => outputs.get(name.as_str()).cloned().unwrap_or(whole),
                    None if !variant.is_empty() => variant.to_string(),
                    None => whole,
                }
            })
            .into_owned()
        })
        .collect()
}

/// Process environment, then toolchain env, then task env. Later wins.
pub fn merge_env<I>(base: I, toolchain: &Toolchain, task: &TaskDef) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: BTreeMap<String, String> = base.into_iter().collect();
    env.extend(toolchain.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.extend(task.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

pub fn working_dir(toolchain: &Toolchain, task: &TaskDef, workspace_root: &std::path::Path) -> PathBuf {
    task.working_dir
        .clone()
        .or_else(|| toolchain.working_dir.clone())
        .unwrap_or_else(|| workspace_root.to_path_buf())
}

pub fn timeout(toolchain: &Toolchain, task: &TaskDef) -> Duration {
    task.timeout
        .filter(|t| !t.is_zero())
        .or_else(|| toolchain.timeout.filter(|t| !t.is_zero()))
        .unwrap_or(DEFAULT_TASK_TIMEOUT)
}

/// Full request for one external task run.
pub fn build_request(
    launcher: Launcher,
    args: Vec<String>,
    toolchain: &Toolchain,
    task: &TaskDef,
    workspace_root: &std::path::Path,
) -> ProcessRequest {
    let mut full_args = launcher.prefix;
    full_args.extend(args);
    ProcessRequest {
        program: launcher.program,
        args: full_args,
        env: merge_env(std::env::vars(), toolchain, task),
        working_dir: Some(working_dir(toolchain, task, workspace_root)),
        timeout: timeout(toolchain, task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::process::ProcessOutput;
    use async_trait::async_trait;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    /// Only knows the binaries it was given.
    struct KnownBinaries(Vec<&'static str>);

    #[async_trait]
    impl ProcessRunner for KnownBinaries {
        fn name(&self) -> &str {
            "known"
        }

        fn resolve_executable(&self, program: &str) -> Result<PathBuf, ProcessError> {
            if self.0.contains(&program) {
                Ok(PathBuf::from("/usr/bin").join(program))
            } else {
                Err(ProcessError::NotFound {
                    name: program.to_string(),
                    reason: "cannot find binary path".into(),
                })
            }
        }

        async fn run(
            &self,
            _request: ProcessRequest,
            _cancel: CancellationToken,
        ) -> Result<ProcessOutput, ProcessError> {
            Ok(ProcessOutput::default())
        }
    }

    fn package(backend: &str) -> AcquireConfig {
        AcquireConfig {
            backend: AcquireBackend::parse(backend),
            package: "morphir-elm".into(),
            version: "2.90.0".into(),
            executable: String::new(),
        }
    }

    #[test]
    fn test_path_backend_prefers_task_exec() {
        let process = KnownBinaries(vec!["elm", "morphir"]);
        let task = TaskDef::new("make");
        let acquire = AcquireConfig::path("morphir");

        let l = resolve_launcher(&process, &acquire, &task, Some("elm")).unwrap();
        assert_eq!(l.program, "/usr/bin/elm");
        let l = resolve_launcher(&process, &acquire, &task, None).unwrap();
        assert_eq!(l.program, "/usr/bin/morphir");
        assert!(l.prefix.is_empty());

        let err = resolve_launcher(&process, &AcquireConfig::default(), &task, None).unwrap_err();
        assert_eq!(err.to_string(), "no executable specified for task make");

        let err = resolve_launcher(&process, &AcquireConfig::path("gone"), &task, None).unwrap_err();
        assert!(matches!(err, ExecutorError::Process(ProcessError::NotFound { .. })));
    }

    #[test]
    fn test_package_backend_prefixes() {
        let process = KnownBinaries(vec!["npx", "bunx", "yarn", "pnpm", "deno", "npm"]);
        let task = TaskDef::new("make");
        let cases = [
            ("npx", vec!["-y", "morphir-elm@2.90.0"]),
            ("bunx", vec!["morphir-elm@2.90.0"]),
            ("yarn-dlx", vec!["dlx", "morphir-elm@2.90.0"]),
            ("pnpm-dlx", vec!["dlx", "morphir-elm@2.90.0"]),
            ("deno-npm", vec!["run", "-A", "npm:morphir-elm@2.90.0"]),
            ("npm-exec", vec!["exec", "--yes", "--", "morphir-elm@2.90.0"]),
        ];
        for (backend, prefix) in cases {
            let l = resolve_launcher(&process, &package(backend), &task, None).unwrap();
            assert_eq!(l.prefix, prefix, "backend {backend}");
        }
    }

    #[test]
    fn test_package_backend_errors() {
        let task = TaskDef::new("make");
        let err = resolve_launcher(&KnownBinaries(vec![]), &package("npx"), &task, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "npx not found in PATH (required for backend 'npx')"
        );

        let mut no_pkg = package("bunx");
        no_pkg.package.clear();
        let err = resolve_launcher(&KnownBinaries(vec!["bunx"]), &no_pkg, &task, None).unwrap_err();
        assert_eq!(err.to_string(), "package must be specified for bunx backend");

        let err = resolve_launcher(&KnownBinaries(vec![]), &package("nix"), &task, None).unwrap_err();
        assert_eq!(err.to_string(), "acquisition backend nix not yet implemented");
    }

    #[test]
    fn test_substitute_args() {
        let mut outputs = BTreeMap::new();
        outputs.insert("ir".to_string(), "/out/tc/make/morphir-ir.json".to_string());
        let args: Vec<String> = ["--target={variant}", "-o", "{outputs.ir}", "{outputs.nope}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            substitute_args(&args, "Scala", &outputs),
            vec![
                "--target=Scala",
                "-o",
                "/out/tc/make/morphir-ir.json",
                "{outputs.nope}"
            ]
        );
        assert_eq!(substitute_args(&args, "", &outputs)[0], "--target={variant}");
    }

    #[test]
    fn test_env_dir_and_timeout_precedence() {
        let toolchain = Toolchain::native("tc")
            .with_env("SHARED", "toolchain")
            .with_env("TC_ONLY", "1")
            .with_working_dir("/tc")
            .with_timeout(Duration::from_secs(30));
        let task = TaskDef::new("make").with_env("SHARED", "task");

        let env = merge_env(
            vec![("SHARED".to_string(), "process".to_string()), ("HOME".into(), "/home/u".into())],
            &toolchain,
            &task,
        );
        assert_eq!(env["SHARED"], "task");
        assert_eq!(env["TC_ONLY"], "1");
        assert_eq!(env["HOME"], "/home/u");

        assert_eq!(working_dir(&toolchain, &task, Path::new("/ws")), PathBuf::from("/tc"));
        assert_eq!(timeout(&toolchain, &task), Duration::from_secs(30));

        let bare = Toolchain::native("tc");
        assert_eq!(working_dir(&bare, &task, Path::new("/ws")), PathBuf::from("/ws"));
        assert_eq!(timeout(&bare, &task), DEFAULT_TASK_TIMEOUT);
        let quick = TaskDef::new("make").with_timeout(Duration::from_millis(250));
        assert_eq!(timeout(&toolchain, &quick), Duration::from_millis(250));
    }
}
