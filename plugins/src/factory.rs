use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use morph_core::config::{output_root, AppConfig};
use morph_core::error::ConfigError;
use morph_core::executor::Executor;
use morph_core::process::ProcessRunner;
use morph_core::runner::ProgressListener;
use morph_core::toolchain::{AutoEnableContext, Registry};
use morph_core::vfs::{VPath, Vfs};

use crate::process::TokioProcessRunner;
use crate::renderers::{FanoutListener, JsonlRenderer, ProgressBarRenderer, TextRenderer};
use crate::vfs::LocalVfs;

/// Disk filesystem rooted at the workspace directory.
pub fn build_vfs(workspace: &Path) -> Arc<dyn Vfs> {
    Arc::new(LocalVfs::new(workspace))
}

pub fn build_process_runner() -> Arc<dyn ProcessRunner> {
    Arc::new(TokioProcessRunner::new())
}

/// Auto-enable detection looks at the whole workspace.
pub fn build_auto_enable_context(vfs: Arc<dyn Vfs>) -> AutoEnableContext {
    AutoEnableContext::new(vfs, VPath::root())
}

pub fn build_executor(
    cfg: &AppConfig,
    registry: Arc<Registry>,
    vfs: Arc<dyn Vfs>,
    workspace: &Path,
) -> Result<Executor, ConfigError> {
    let root = output_root(&cfg.output)?;
    Ok(Executor::new(
        registry,
        vfs,
        build_process_runner(),
        root,
        workspace,
    ))
}

/// Listener for `morph run`.
///
/// `format` is `text`, `jsonl` or `quiet`. With `progress` the text lines
/// are replaced by progress bars; JSONL output is kept alongside them.
pub fn build_renderer(
    format: &str,
    progress: bool,
    ascii_only: bool,
) -> Result<Option<Arc<dyn ProgressListener>>> {
    let mut fanout = FanoutListener::new();
    match format {
        "text" if progress => {}
        "text" => fanout = fanout.with(Arc::new(TextRenderer::new(ascii_only))),
        "jsonl" => fanout = fanout.with(Arc::new(JsonlRenderer::new(false))),
        "quiet" => {}
        other => bail!("unknown output format: {other}"),
    }
    if progress {
        fanout = fanout.with(Arc::new(ProgressBarRenderer::new(true)));
    }

    if fanout.is_empty() {
        return Ok(None);
    }
    let listener: Arc<dyn ProgressListener> = Arc::new(fanout);
    Ok(Some(listener))
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_core::config::parse_config;

    #[test]
    fn test_build_renderer_formats() {
        assert!(build_renderer("text", false, true).unwrap().is_some());
        assert!(build_renderer("jsonl", false, true).unwrap().is_some());
        assert!(build_renderer("quiet", false, true).unwrap().is_none());
        assert!(build_renderer("quiet", true, true).unwrap().is_some());
        match build_renderer("xml", false, true) {
            Err(err) => assert_eq!(err.to_string(), "unknown output format: xml"),
            Ok(_) => panic!("xml is not a renderer format"),
        }
    }

    #[test]
    fn test_executor_output_root_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = build_vfs(dir.path());
        let cfg = parse_config("[output]\nroot = \"build/morph\"\n").unwrap();
        let executor = build_executor(&cfg, Arc::new(Registry::new()), vfs, dir.path()).unwrap();
        assert_eq!(
            executor.output_dirs().task_dir("tc", "make").unwrap().as_str(),
            "/build/morph/tc/make"
        );

        let bad = parse_config("[output]\nroot = \"../escape\"\n").unwrap();
        assert!(matches!(
            build_executor(&bad, Arc::new(Registry::new()), build_vfs(dir.path()), dir.path()),
            Err(ConfigError::InvalidOutputRoot { .. })
        ));
    }

    #[test]
    fn test_auto_enable_context_sees_workspace_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("morphir.json"), "{}").unwrap();
        let ctx = build_auto_enable_context(build_vfs(dir.path()));
        assert!(ctx.file_exists("morphir.json"));
        assert!(!ctx.file_exists("elm.json"));
    }
}
