//! Local command-line providers.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, warn};

use super::{BackendKind, CallLimits, CommandRunner, Invocation, ProcessOutput, QuotaBreaker};
use crate::error::GenerationError;

fn run_error(backend: &'static str, binary: &str, limits: CallLimits, e: io::Error) -> GenerationError {
    if e.kind() == io::ErrorKind::TimedOut {
        GenerationError::Timeout {
            backend,
            timeout: limits.timeout,
        }
    } else {
        GenerationError::Spawn {
            binary: binary.to_string(),
            source: e,
        }
    }
}

fn exit_error(backend: &'static str, output: &ProcessOutput) -> GenerationError {
    let text = output.error_text();
    GenerationError::NonZeroExit {
        backend,
        code: output.code,
        stderr: text.chars().take(500).collect(),
    }
}

/// `claude --print` with the prompt on stdin.
///
/// Guarded by a [`QuotaBreaker`]: after the first quota error every call fails
/// without spawning the tool.
pub struct ClaudeCli {
    binary: String,
    breaker: Arc<QuotaBreaker>,
    runner: Arc<dyn CommandRunner>,
}

impl ClaudeCli {
    pub fn new(binary: &str, breaker: Arc<QuotaBreaker>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.to_string(),
            breaker,
            runner,
        }
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        limits: CallLimits,
    ) -> Result<String, GenerationError> {
        let backend = BackendKind::Claude.as_str();
        if self.breaker.is_tripped() {
            warn!(
                backend,
                "Quota already exhausted this run; switch backends with `jobscout model codex`"
            );
            return Err(GenerationError::QuotaExhausted { backend });
        }

        let mut invocation = Invocation::new(&self.binary, limits.timeout)
            .arg("--dangerously-skip-permissions")
            .arg("--print")
            .stdin(prompt);
        // The CLI bills the API key instead of the subscription when it is set.
        invocation.env_remove.push("ANTHROPIC_API_KEY".to_string());

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| run_error(backend, &self.binary, limits, e))?;

        if !output.success {
            if self.breaker.is_quota_error(output.error_text()) {
                if self.breaker.trip() {
                    error!(
                        backend,
                        "Usage quota hit; remaining calls will fail fast. Run `jobscout model codex` (or another backend) to continue"
                    );
                }
                return Err(GenerationError::QuotaExhausted { backend });
            }
            return Err(exit_error(backend, &output));
        }

        Ok(output.stdout)
    }
}

/// `codex exec` reading the prompt from stdin and writing its final message
/// to a file.
pub struct CodexCli {
    binary: String,
    model: String,
    runner: Arc<dyn CommandRunner>,
}

impl CodexCli {
    pub fn new(binary: &str, model: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.to_string(),
            model: model.to_string(),
            runner,
        }
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        limits: CallLimits,
    ) -> Result<String, GenerationError> {
        let backend = BackendKind::Codex.as_str();
        let scratch = tempfile::tempdir().map_err(|e| GenerationError::Spawn {
            binary: self.binary.clone(),
            source: e,
        })?;
        let output_file = scratch.path().join("last_message.txt");

        let mut invocation = Invocation::new(&self.binary, limits.timeout)
            .arg("exec")
            .arg("--model")
            .arg(&self.model)
            .arg("--sandbox")
            .arg("read-only")
            .arg("--skip-git-repo-check")
            .arg("--output-last-message")
            .arg(output_file.to_string_lossy())
            .arg("-")
            .stdin(prompt);
        invocation.cwd = Some(scratch.path().to_path_buf());

        // Node-installed CLIs need their own bin dir on PATH under cron.
        if let Some(bin_dir) = Path::new(&self.binary).parent().filter(|p| !p.as_os_str().is_empty()) {
            let current = std::env::var_os("PATH").unwrap_or_default();
            let dirs = std::iter::once(bin_dir.to_path_buf()).chain(std::env::split_paths(&current));
            if let Ok(joined) = std::env::join_paths(dirs) {
                invocation
                    .env_set
                    .push(("PATH".to_string(), joined.to_string_lossy().into_owned()));
            }
        }

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| run_error(backend, &self.binary, limits, e))?;

        if !output.success {
            return Err(exit_error(backend, &output));
        }

        match tokio::fs::read_to_string(&output_file).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            _ => Ok(output.stdout),
        }
    }
}

/// `openclaw agent --local` with the prompt as an argument.
///
/// The tool cannot run two sessions at once, so calls queue on a lock.
pub struct OpenClawCli {
    binary: String,
    agent: String,
    runner: Arc<dyn CommandRunner>,
    lock: Mutex<()>,
}

impl OpenClawCli {
    pub fn new(binary: &str, agent: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.to_string(),
            agent: agent.to_string(),
            runner,
            lock: Mutex::new(()),
        }
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        limits: CallLimits,
    ) -> Result<String, GenerationError> {
        let backend = BackendKind::OpenClaw.as_str();
        let invocation = Invocation::new(&self.binary, limits.timeout)
            .arg("agent")
            .arg("--local")
            .arg("--agent")
            .arg(&self.agent)
            .arg("--message")
            .arg(prompt);

        let output = {
            let _guard = self.lock.lock().await;
            self.runner.run(&invocation).await
        }
        .map_err(|e| run_error(backend, &self.binary, limits, e))?;

        if !output.success {
            return Err(exit_error(backend, &output));
        }
        Ok(output.stdout)
    }
}
