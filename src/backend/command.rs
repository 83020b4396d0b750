//! # Command Runner
//!
//! Runs backend commands with a fixed-delay retry budget.
//!
//! A command is retried while it exits non-zero, sleeping a fixed delay
//! between attempts. Once the budget is exhausted the last attempt's exit
//! status, stdout and stderr are returned unchanged in
//! [`BackendError::CommandFailed`]. Failing to spawn the process at all is not
//! retried.

use crate::error::BackendError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Fixed-delay retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    /// Sleep between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt, used for read-only probes
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Worst-case time spent sleeping
    #[must_use]
    pub fn max_sleep(&self) -> Duration {
        self.delay * (self.attempts - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::constants::{DEFAULT_COMMAND_ATTEMPTS, DEFAULT_COMMAND_RETRY_SLEEP_SECS};
        Self::new(
            DEFAULT_COMMAND_ATTEMPTS,
            Duration::from_secs(DEFAULT_COMMAND_RETRY_SLEEP_SECS),
        )
    }
}

/// Captured result of one command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Attempts used to get here
    pub attempts: u32,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Executes commands, optionally feeding stdin, under a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner {
    retry: RetryPolicy,
}

impl CommandRunner {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run until the command succeeds or the budget is exhausted
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Spawn`] if the process cannot be started and
    /// [`BackendError::CommandFailed`] with the last attempt's output once
    /// every attempt exited non-zero.
    pub async fn run(
        &self,
        program: &Path,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, BackendError> {
        let command_line = display_command(program, args);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut output = execute(program, args, stdin, &command_line).await?;
            output.attempts = attempt;

            if output.success() {
                debug!(command = %command_line, attempt, "Command succeeded");
                return Ok(output);
            }

            if attempt >= self.retry.attempts {
                return Err(BackendError::CommandFailed {
                    command: command_line,
                    attempts: attempt,
                    status: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }

            warn!(
                command = %command_line,
                attempt,
                attempts = self.retry.attempts,
                status = ?output.status,
                "Command failed, retrying in {:?}",
                self.retry.delay
            );
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    /// Run exactly once and return the output whatever the exit status
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Spawn`] if the process cannot be started.
    pub async fn run_once(
        &self,
        program: &Path,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, BackendError> {
        let command_line = display_command(program, args);
        let mut output = execute(program, args, stdin, &command_line).await?;
        output.attempts = 1;
        Ok(output)
    }
}

/// Shell-quoted command line for logs and errors
#[must_use]
pub fn display_command(program: &Path, args: &[String]) -> String {
    let program = program.display().to_string();
    shell_words::join(std::iter::once(program.as_str()).chain(args.iter().map(String::as_str)))
}

async fn execute(
    program: &Path,
    args: &[String],
    stdin: Option<&[u8]>,
    command_line: &str,
) -> Result<CommandOutput, BackendError> {
    let spawn_error = |source| BackendError::Spawn {
        command: command_line.to_string(),
        source,
    };

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(spawn_error)?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A command that exits without reading stdin closes the pipe early;
        // its exit status decides the outcome, not the broken pipe.
        if let Err(e) = pipe.write_all(input).await {
            debug!(command = %command_line, error = %e, "Could not write stdin");
        }
        if let Err(e) = pipe.shutdown().await {
            debug!(command = %command_line, error = %e, "Could not close stdin");
        }
    }

    let output = child.wait_with_output().await.map_err(spawn_error)?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        attempts: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("sh")
    }

    fn script(s: &str) -> Vec<String> {
        vec!["-c".to_string(), s.to_string()]
    }

    fn fast(attempts: u32) -> CommandRunner {
        CommandRunner::new(RetryPolicy::new(attempts, Duration::ZERO))
    }

    #[test]
    fn test_retry_policy_bounds() {
        let policy = RetryPolicy::new(0, Duration::from_secs(3));
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.max_sleep(), Duration::ZERO);

        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.max_sleep(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_run_succeeds_first_time() {
        let output = fast(3).run(&sh(), &script("echo ok"), None).await.unwrap();
        assert_eq!(output.stdout.trim(), "ok");
        assert_eq!(output.attempts, 1);
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let output = fast(1)
            .run(&sh(), &script("cat -"), Some(b"from stdin"))
            .await
            .unwrap();
        assert_eq!(output.stdout, "from stdin");
    }

    #[tokio::test]
    async fn test_run_exhausts_attempts_and_preserves_output() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("count");
        let cmd = format!(
            "echo x >> {}; echo out; echo err >&2; exit 4",
            counter.display()
        );

        let err = fast(3).run(&sh(), &script(&cmd), None).await.unwrap_err();
        match err {
            BackendError::CommandFailed {
                attempts,
                status,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, Some(4));
                assert_eq!(stdout, "out\n");
                assert_eq!(stderr, "err\n");
            }
            other => panic!("expected CommandFailed, got {other}"),
        }

        let runs = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_run_recovers_on_later_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        // Fails the first time, succeeds once the marker exists
        let cmd = format!(
            "if [ -f {m} ]; then exit 0; else touch {m}; exit 1; fi",
            m = marker.display()
        );

        let output = fast(3).run(&sh(), &script(&cmd), None).await.unwrap();
        assert_eq!(output.attempts, 2);
    }

    #[tokio::test]
    async fn test_run_once_returns_failed_output() {
        let output = fast(3).run_once(&sh(), &script("exit 2"), None).await.unwrap();
        assert_eq!(output.status, Some(2));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = fast(3)
            .run(Path::new("/nonexistent/binary"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[test]
    fn test_display_command_quotes_script() {
        let args = vec!["exec".to_string(), "sh -c 'vault status'".to_string()];
        let line = display_command(Path::new("oc"), &args);
        assert_eq!(
            shell_words::split(&line).unwrap(),
            vec!["oc", "exec", "sh -c 'vault status'"]
        );
    }
}
