use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use morph_core::error::ProcessError;
use morph_core::process::{ProcessOutput, ProcessRequest, ProcessRunner};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs external toolchain commands as tokio child processes.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self {}
    }
}

enum Ending {
    Exited(i32),
    TimedOut,
    Cancelled,
}

/// How long stream readers may keep draining once the direct child is gone.
/// Grandchildren that inherited the pipes can hold them open indefinitely.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

type SharedBuf = Arc<Mutex<Vec<u8>>>;

async fn read_stream<R>(
    stream: Option<R>,
    name: &'static str,
    sink: SharedBuf,
) -> Result<(), ProcessError>
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|source| ProcessError::StreamIo {
                stream: name,
                source,
            })?;
        if n == 0 {
            return Ok(());
        }
        if let Ok(mut buf) = sink.lock() {
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Waits for a reader up to `limit`, then aborts it and keeps what it read.
async fn collect_stream(
    mut reader: JoinHandle<Result<(), ProcessError>>,
    sink: SharedBuf,
    limit: Duration,
    program: &str,
    name: &'static str,
) -> Result<String, ProcessError> {
    match tokio::time::timeout(limit, &mut reader).await {
        Ok(Ok(result)) => result?,
        Ok(Err(_)) => {}
        Err(_) => {
            reader.abort();
            tracing::warn!(
                program = %program,
                stream = name,
                "stream still open after exit, truncating"
            );
        }
    }
    let bytes = sink.lock().map(|buf| buf.clone()).unwrap_or_default();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    fn name(&self) -> &str {
        "tokio"
    }

    fn resolve_executable(&self, program: &str) -> Result<PathBuf, ProcessError> {
        which::which(program).map_err(|e| ProcessError::NotFound {
            name: program.to_string(),
            reason: e.to_string(),
        })
    }

    async fn run(
        &self,
        request: ProcessRequest,
        cancel: CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .env_clear()
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = %request.program, args = ?request.args, "spawning process");
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: request.program.clone(),
            source,
        })?;

        let out_buf = SharedBuf::default();
        let err_buf = SharedBuf::default();
        let stdout = tokio::spawn(read_stream(child.stdout.take(), "stdout", out_buf.clone()));
        let stderr = tokio::spawn(read_stream(child.stderr.take(), "stderr", err_buf.clone()));

        let ending = tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| ProcessError::Spawn {
                    program: request.program.clone(),
                    source,
                })?;
                Ending::Exited(status.code().unwrap_or(-1))
            }
            _ = tokio::time::sleep(request.timeout) => Ending::TimedOut,
            _ = cancel.cancelled() => Ending::Cancelled,
        };

        if !matches!(ending, Ending::Exited(_)) {
            if let Err(err) = child.kill().await {
                tracing::warn!(program = %request.program, error = %err, "failed to kill process");
            }
        }

        let (stdout, stderr) = tokio::join!(
            collect_stream(stdout, out_buf, PIPE_DRAIN_GRACE, &request.program, "stdout"),
            collect_stream(stderr, err_buf, PIPE_DRAIN_GRACE, &request.program, "stderr"),
        );
        let (stdout, stderr) = (stdout?, stderr?);

        let (exit_code, timed_out) = match ending {
            Ending::Exited(code) => (code, false),
            Ending::TimedOut => {
                tracing::warn!(
                    program = %request.program,
                    timeout_ms = request.timeout.as_millis() as u64,
                    "process timed out"
                );
                (-1, true)
            }
            Ending::Cancelled => (-1, false),
        };

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::time::Instant;

    fn sh(script: &str, timeout: Duration) -> ProcessRequest {
        let env: BTreeMap<String, String> = std::env::vars().collect();
        ProcessRequest {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            env,
            working_dir: None,
            timeout,
        }
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = TokioProcessRunner::new();
        let out = runner
            .run(
                sh("echo hello; echo oops >&2; exit 3", Duration::from_secs(10)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_environment_is_exactly_the_request() {
        let runner = TokioProcessRunner::new();
        let mut request = sh("echo \"$MORPH_TEST_VALUE\"", Duration::from_secs(10));
        request
            .env
            .insert("MORPH_TEST_VALUE".into(), "from-request".into());
        let out = runner.run(request, CancellationToken::new()).await.unwrap();
        assert_eq!(out.stdout.trim(), "from-request");
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let runner = TokioProcessRunner::new();
        let out = runner
            .run(sh("exec sleep 5", Duration::from_millis(100)), CancellationToken::new())
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, -1);
    }

    #[tokio::test]
    async fn test_timeout_is_not_held_up_by_grandchildren() {
        let runner = TokioProcessRunner::new();
        let started = Instant::now();
        let out = runner
            .run(
                sh("echo before; sleep 4; true", Duration::from_millis(100)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, -1);
        assert_eq!(out.stdout.trim(), "before");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_held_up_by_grandchildren() {
        let runner = TokioProcessRunner::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let out = runner
            .run(sh("sleep 4; true", Duration::from_secs(10)), cancel)
            .await
            .unwrap();
        assert_eq!(out.exit_code, -1);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_background_process_does_not_delay_exit() {
        let runner = TokioProcessRunner::new();
        let started = Instant::now();
        let out = runner
            .run(sh("sleep 4 & echo done", Duration::from_secs(10)), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "done");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_child() {
        let runner = TokioProcessRunner::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let out = runner
            .run(sh("exec sleep 5", Duration::from_secs(10)), cancel)
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.exit_code, -1);
    }

    #[tokio::test]
    async fn test_spawn_failure_and_lookup() {
        let runner = TokioProcessRunner::new();
        let mut request = sh("true", Duration::from_secs(1));
        request.program = "/definitely/not/here".into();
        let err = runner.run(request, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));

        assert!(runner.resolve_executable("sh").is_ok());
        assert!(matches!(
            runner.resolve_executable("morph-no-such-binary"),
            Err(ProcessError::NotFound { .. })
        ));
    }
}
