//! Subprocess execution for the local CLI backends.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One subprocess call.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    pub env_remove: Vec<String>,
    pub env_set: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Stderr, or stdout when the tool reports errors there.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs subprocesses. Swapped for a recording fake in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A timeout is reported as `io::ErrorKind::TimedOut`
    /// and the child is killed.
    async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

/// Real subprocesses via `tokio::process`.
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in &invocation.env_remove {
            command.env_remove(key);
        }
        for (key, value) in &invocation.env_set {
            command.env(key, value);
        }
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let input = invocation.stdin.clone();

        let feed = async move {
            if let (Some(mut pipe), Some(input)) = (stdin, input) {
                // Broken pipes are ignored; the exit status reports the failure.
                let _ = pipe.write_all(input.as_bytes()).await;
                let _ = pipe.shutdown().await;
            }
        };

        let run = async move {
            let (_, output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(invocation.timeout, run)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out", invocation.program),
                )
            })??;

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let invocation = Invocation::new("definitely-not-a-real-binary-xyz", Duration::from_secs(5));
        let err = TokioRunner.run(&invocation).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_delivered() {
        let invocation = Invocation::new("cat", Duration::from_secs(5)).stdin("hello from stdin");
        let output = TokioRunner.run(&invocation).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello from stdin");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let invocation = Invocation::new("sleep", Duration::from_millis(100)).arg("5");
        let err = TokioRunner.run(&invocation).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_error_text_prefers_stderr() {
        let out = ProcessOutput {
            stdout: "partial".into(),
            stderr: "boom".into(),
            ..Default::default()
        };
        assert_eq!(out.error_text(), "boom");

        let out = ProcessOutput {
            stdout: "limit reached".into(),
            stderr: "  ".into(),
            ..Default::default()
        };
        assert_eq!(out.error_text(), "limit reached");
    }
}
