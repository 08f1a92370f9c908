//! Child process execution with timeout and cancellation.
//!
//! Every external invocation goes through [`ProcessRunner::run`], which
//! captures stdout/stderr and classifies the outcome. On timeout or
//! cancellation the child's whole process group is killed before the result
//! is returned, so no orphaned containers keep holding ports the allocator
//! believes are free.

use crate::error::{CloudifyError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// A process execution request.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Program to execute.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Optional working directory.
    pub working_dir: Option<PathBuf>,
    /// Optional wall-clock deadline.
    pub timeout: Option<Duration>,
}

/// Classification of a process execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Exit code zero.
    Success,
    /// Exited with a non-zero code.
    NonZeroExit,
    /// The executable could not be launched.
    StartFailed,
    /// The caller-supplied timeout elapsed first.
    Timeout,
    /// The caller's cancellation signal fired first.
    Cancelled,
}

/// Outcome of a process execution, with output collected up to the point
/// the process ended or was killed.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub outcome: ExecOutcome,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    /// Whether the process exited successfully.
    pub fn is_success(&self) -> bool {
        self.outcome == ExecOutcome::Success
    }

    /// Raise a domain-distinguishable error for each non-success outcome.
    pub fn ensure_success(&self, command: &str) -> Result<()> {
        match self.outcome {
            ExecOutcome::Success => Ok(()),
            ExecOutcome::Cancelled => {
                Err(CloudifyError::ProcessCancelled { command: command.to_string() })
            }
            ExecOutcome::Timeout => {
                Err(CloudifyError::ProcessTimeout { command: command.to_string() })
            }
            ExecOutcome::StartFailed => {
                Err(CloudifyError::ProcessStartFailed { command: command.to_string() })
            }
            ExecOutcome::NonZeroExit => Err(CloudifyError::ProcessFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            }),
        }
    }
}

/// Executes external programs with output capture.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run a process to completion, timeout, or cancellation.
    #[instrument(skip(self, request, cancel), fields(program = %request.program))]
    pub async fn run(&self, request: ExecRequest, cancel: &CancellationToken) -> Result<ExecResult> {
        if request.program.trim().is_empty() {
            return Err(CloudifyError::validation("Program name is required."));
        }

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        // Own process group so the entire tree can be killed at once.
        #[cfg(unix)]
        command.process_group(0);

        debug!(args = ?request.args, "Spawning process");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to start process");
                return Ok(ExecResult {
                    outcome: ExecOutcome::StartFailed,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                });
            }
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let deadline = async {
            match request.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let (outcome, exit_code) = tokio::select! {
            status = child.wait() => {
                let status = status
                    .map_err(|e| CloudifyError::Internal(format!("Failed to wait for process: {}", e)))?;
                if status.success() {
                    (ExecOutcome::Success, status.code())
                } else {
                    (ExecOutcome::NonZeroExit, status.code())
                }
            }
            _ = cancel.cancelled() => {
                kill_process_group(&mut child).await;
                (ExecOutcome::Cancelled, None)
            }
            _ = deadline => {
                kill_process_group(&mut child).await;
                (ExecOutcome::Timeout, None)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecResult { outcome, exit_code, stdout, stderr })
    }
}

/// Kill the child's entire process group and reap it.
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child was spawned as its own group leader, so the group id is
        // the child pid.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str, timeout: Option<Duration>) -> ExecRequest {
        ExecRequest {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: None,
            timeout,
        }
    }

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let runner = ProcessRunner::new();
        let result = runner.run(sh("echo hello", None), &CancellationToken::new()).await.unwrap();

        assert_eq!(result.outcome, ExecOutcome::Success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(result.ensure_success("sh").is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_classified() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(sh("echo oops >&2; exit 3", None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, ExecOutcome::NonZeroExit);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.stderr.contains("oops"));

        let err = result.ensure_success("sh").unwrap_err();
        assert!(matches!(err, CloudifyError::ProcessFailed { exit_code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_start_failure() {
        let runner = ProcessRunner::new();
        let request = ExecRequest {
            program: "cloudify-test-no-such-binary".to_string(),
            args: vec![],
            working_dir: None,
            timeout: None,
        };
        let result = runner.run(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(result.outcome, ExecOutcome::StartFailed);
        let err = result.ensure_success("cloudify-test-no-such-binary").unwrap_err();
        assert!(matches!(err, CloudifyError::ProcessStartFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_returns_partial_output() {
        let runner = ProcessRunner::new();
        let start = Instant::now();
        let result = runner
            .run(
                sh("echo partial; sleep 30", Some(Duration::from_millis(300))),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.outcome, ExecOutcome::Timeout);
        assert!(result.stdout.contains("partial"));
        assert!(start.elapsed() < Duration::from_secs(10));

        let err = result.ensure_success("sh").unwrap_err();
        assert!(matches!(err, CloudifyError::ProcessTimeout { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_is_distinguishable_from_timeout() {
        let runner = ProcessRunner::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = runner.run(sh("sleep 30", None), &cancel).await.unwrap();

        assert_eq!(result.outcome, ExecOutcome::Cancelled);
        let err = result.ensure_success("sh").unwrap_err();
        assert!(matches!(err, CloudifyError::ProcessCancelled { .. }));
    }

    #[tokio::test]
    async fn test_empty_program_fails_validation() {
        let runner = ProcessRunner::new();
        let request = ExecRequest {
            program: "  ".to_string(),
            args: vec![],
            working_dir: None,
            timeout: None,
        };
        let err = runner.run(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }
}
