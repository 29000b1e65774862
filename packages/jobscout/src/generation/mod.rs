//! Text generation backends.
//!
//! Every provider, hosted or local, sits behind [`Generator::generate`]: a
//! prompt goes in, text or a [`GenerationError`] comes out. [`Backend`] is the
//! closed set of providers; the active one is picked by `LLM_MODE`.

mod breaker;
mod cli;
mod hosted;
mod process;

pub use breaker::QuotaBreaker;
pub use cli::{ClaudeCli, CodexCli, OpenClawCli};
pub use hosted::{AnthropicBackend, ChatBackend};
pub use process::{CommandRunner, Invocation, ProcessOutput, TokioRunner};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::GenerationError;

/// Phrases some providers put in front of the actual answer.
const PREAMBLES: &[&str] = &[
    "Here's the answer:",
    "Here is the answer:",
    "Here's the cover letter body:",
    "Here's the cover letter:",
    "Here is the cover letter:",
];

/// Which provider serves generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
    Ollama,
    Claude,
    Codex,
    OpenClaw,
}

impl BackendKind {
    pub const ALL: [BackendKind; 8] = [
        BackendKind::OpenAi,
        BackendKind::Anthropic,
        BackendKind::Gemini,
        BackendKind::Groq,
        BackendKind::Ollama,
        BackendKind::Claude,
        BackendKind::Codex,
        BackendKind::OpenClaw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Anthropic => "anthropic",
            BackendKind::Gemini => "gemini",
            BackendKind::Groq => "groq",
            BackendKind::Ollama => "ollama",
            BackendKind::Claude => "claude",
            BackendKind::Codex => "codex",
            BackendKind::OpenClaw => "openclaw",
        }
    }

    /// False for tools that break when two calls overlap.
    pub fn concurrency_safe(&self) -> bool {
        !matches!(self, BackendKind::OpenClaw)
    }

    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BackendKind::Claude | BackendKind::Codex | BackendKind::OpenClaw
        )
    }

    /// Timeout and output cap for one call.
    pub fn limits(&self, role: Role) -> CallLimits {
        let (tailor_secs, aux_secs) = match self {
            BackendKind::OpenAi
            | BackendKind::Anthropic
            | BackendKind::Gemini
            | BackendKind::Groq => (120, 60),
            BackendKind::Ollama => (300, 120),
            BackendKind::Claude => (360, 180),
            BackendKind::Codex => (480, 300),
            BackendKind::OpenClaw => (360, 240),
        };
        match role {
            Role::Tailor => CallLimits {
                timeout: Duration::from_secs(tailor_secs),
                max_tokens: 4096,
            },
            Role::Auxiliary => CallLimits {
                timeout: Duration::from_secs(aux_secs),
                max_tokens: 1500,
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = BackendKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown backend '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// What a call is for. Decides timeout and output cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full document tailoring: long output, generous timeout.
    Tailor,
    /// Cover letter and short answers.
    Auxiliary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    pub timeout: Duration,
    pub max_tokens: u32,
}

/// Uniform generation contract.
///
/// No caching: every call reaches the provider (or fails fast on a tripped
/// breaker). `label` only shows up in logs.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        role: Role,
        label: &str,
    ) -> Result<String, GenerationError>;
}

/// Provider credentials and model names, read from the environment.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub kind: BackendKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub claude_bin: String,
    pub codex_bin: String,
    pub codex_model: String,
    pub openclaw_bin: String,
    pub openclaw_agent: String,
}

impl GenerationSettings {
    /// Build from a key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secret = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            kind: get("LLM_MODE", "claude").parse()?,
            openai_api_key: secret("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL", "gpt-4o"),
            anthropic_api_key: secret("ANTHROPIC_API_KEY"),
            anthropic_model: get("ANTHROPIC_MODEL", "claude-3-5-sonnet-20241022"),
            gemini_api_key: secret("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL", "gemini-1.5-flash"),
            groq_api_key: secret("GROQ_API_KEY"),
            groq_model: get("GROQ_MODEL", "llama-3.1-70b-versatile"),
            ollama_base_url: get("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: get("OLLAMA_MODEL", "llama3.1"),
            claude_bin: get("CLAUDE_BIN", "claude"),
            codex_bin: get("CODEX_BIN", "codex"),
            codex_model: get("CODEX_MODEL", "gpt-5.3-codex"),
            openclaw_bin: get("OPENCLAW_BIN", "openclaw"),
            openclaw_agent: get("OPENCLAW_AGENT", "coding"),
        })
    }
}

/// The configured provider.
pub enum Backend {
    Chat(ChatBackend),
    Anthropic(AnthropicBackend),
    Claude(ClaudeCli),
    Codex(CodexCli),
    OpenClaw(OpenClawCli),
}

impl Backend {
    /// Build the backend named in `settings`.
    ///
    /// The breaker handle is shared by every caller in the process so a quota
    /// hit seen by one worker stops all others.
    pub fn from_settings(
        settings: &GenerationSettings,
        breaker: Arc<QuotaBreaker>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, GenerationError> {
        let backend = match settings.kind {
            BackendKind::OpenAi => Backend::Chat(ChatBackend::openai(
                settings
                    .openai_api_key
                    .clone()
                    .ok_or(GenerationError::MissingCredential("OPENAI_API_KEY"))?,
                &settings.openai_model,
            )),
            BackendKind::Gemini => Backend::Chat(ChatBackend::gemini(
                settings
                    .gemini_api_key
                    .clone()
                    .ok_or(GenerationError::MissingCredential("GEMINI_API_KEY"))?,
                &settings.gemini_model,
            )),
            BackendKind::Groq => Backend::Chat(ChatBackend::groq(
                settings
                    .groq_api_key
                    .clone()
                    .ok_or(GenerationError::MissingCredential("GROQ_API_KEY"))?,
                &settings.groq_model,
            )),
            BackendKind::Ollama => Backend::Chat(ChatBackend::ollama(
                &settings.ollama_base_url,
                &settings.ollama_model,
            )),
            BackendKind::Anthropic => Backend::Anthropic(AnthropicBackend::new(
                settings
                    .anthropic_api_key
                    .clone()
                    .ok_or(GenerationError::MissingCredential("ANTHROPIC_API_KEY"))?,
                &settings.anthropic_model,
            )),
            BackendKind::Claude => {
                Backend::Claude(ClaudeCli::new(&settings.claude_bin, breaker, runner))
            }
            BackendKind::Codex => Backend::Codex(CodexCli::new(
                &settings.codex_bin,
                &settings.codex_model,
                runner,
            )),
            BackendKind::OpenClaw => Backend::OpenClaw(OpenClawCli::new(
                &settings.openclaw_bin,
                &settings.openclaw_agent,
                runner,
            )),
        };
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Chat(chat) => chat.kind(),
            Backend::Anthropic(_) => BackendKind::Anthropic,
            Backend::Claude(_) => BackendKind::Claude,
            Backend::Codex(_) => BackendKind::Codex,
            Backend::OpenClaw(_) => BackendKind::OpenClaw,
        }
    }

    async fn complete(&self, prompt: &str, role: Role) -> Result<String, GenerationError> {
        let limits = self.kind().limits(role);
        match self {
            Backend::Chat(chat) => chat.complete(prompt, limits).await,
            Backend::Anthropic(anthropic) => anthropic.complete(prompt, limits).await,
            Backend::Claude(claude) => claude.complete(prompt, limits).await,
            Backend::Codex(codex) => codex.complete(prompt, limits).await,
            Backend::OpenClaw(openclaw) => openclaw.complete(prompt, limits).await,
        }
    }
}

#[async_trait]
impl Generator for Backend {
    async fn generate(
        &self,
        prompt: &str,
        role: Role,
        label: &str,
    ) -> Result<String, GenerationError> {
        let backend = self.kind().as_str();
        info!(backend, label, prompt_chars = prompt.len(), "Generating");
        let start = std::time::Instant::now();

        let raw = self.complete(prompt, role).await.map_err(|e| {
            error!(backend, label, error = %e, "Generation failed");
            e
        })?;

        let text = normalize_output(&raw);
        if text.is_empty() {
            error!(backend, label, "Generation returned empty output");
            return Err(GenerationError::Empty { backend });
        }

        debug!(
            backend,
            label,
            output_chars = text.len(),
            duration_ms = start.elapsed().as_millis(),
            "Generation finished"
        );
        Ok(text)
    }
}

/// Trim the output and drop a known leading preamble.
pub fn normalize_output(raw: &str) -> String {
    let mut text = raw.trim();
    for preamble in PREAMBLES {
        if let Some(rest) = text.strip_prefix(preamble) {
            text = rest.trim_start();
            break;
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<GenerationSettings, String> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GenerationSettings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_backend_names_round_trip() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!(" Codex ".parse::<BackendKind>().unwrap(), BackendKind::Codex);
        assert!("gpt".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_only_openclaw_is_concurrency_unsafe() {
        let unsafe_kinds: Vec<_> = BackendKind::ALL
            .into_iter()
            .filter(|k| !k.concurrency_safe())
            .collect();
        assert_eq!(unsafe_kinds, vec![BackendKind::OpenClaw]);
    }

    #[test]
    fn test_limits_by_role() {
        let tailor = BackendKind::Claude.limits(Role::Tailor);
        let aux = BackendKind::Claude.limits(Role::Auxiliary);
        assert_eq!(tailor.timeout, Duration::from_secs(360));
        assert_eq!(aux.timeout, Duration::from_secs(180));
        assert_eq!(tailor.max_tokens, 4096);
        assert_eq!(aux.max_tokens, 1500);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.kind, BackendKind::Claude);
        assert_eq!(settings.openai_model, "gpt-4o");
        assert_eq!(settings.ollama_base_url, "http://localhost:11434");
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_settings_reject_unknown_mode() {
        assert!(settings(&[("LLM_MODE", "bard")]).is_err());
    }

    #[test]
    fn test_hosted_backend_requires_credential() {
        let settings = settings(&[("LLM_MODE", "groq"), ("GROQ_API_KEY", "  ")]).unwrap();
        let result = Backend::from_settings(
            &settings,
            Arc::new(QuotaBreaker::default()),
            Arc::new(TokioRunner),
        );
        assert!(matches!(
            result,
            Err(GenerationError::MissingCredential("GROQ_API_KEY"))
        ));
    }

    #[test]
    fn test_ollama_needs_no_credential() {
        let settings = settings(&[("LLM_MODE", "ollama")]).unwrap();
        let backend = Backend::from_settings(
            &settings,
            Arc::new(QuotaBreaker::default()),
            Arc::new(TokioRunner),
        )
        .unwrap();
        assert_eq!(backend.kind(), BackendKind::Ollama);
    }

    #[test]
    fn test_normalize_strips_known_preamble() {
        assert_eq!(
            normalize_output("  Here's the cover letter:\n\nDear team, ..."),
            "Dear team, ..."
        );
        assert_eq!(normalize_output("Here is the answer: 42"), "42");
        assert_eq!(normalize_output("No preamble here\n"), "No preamble here");
    }

    #[test]
    fn test_normalize_only_strips_leading_preamble() {
        let text = "Intro.\nHere is the answer: inline";
        assert_eq!(normalize_output(text), text);
    }
}
