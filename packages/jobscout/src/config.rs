//! Configuration: environment variables plus `config/search_config.json`.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dotenvy::dotenv;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::generation::{BackendKind, GenerationSettings};

/// Experience level the listings source uses for entry-level roles.
pub const ENTRY_LEVEL: u8 = 2;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for data/, config/, resume/ and logs/
    pub home: PathBuf,
    pub generation: GenerationSettings,
    pub webhook_url: Option<String>,
    pub candidate: CandidateProfile,
    /// Overrides `job_workers` from the search config
    pub job_workers: Option<usize>,
    pub node_bin: String,
}

/// Who the documents are written for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateProfile {
    pub name: String,
    pub email: String,
    pub portfolio: String,
    pub linkedin: String,
    pub bio: String,
}

impl CandidateProfile {
    /// Non-empty contact fields joined for a signature line.
    pub fn contact_line(&self) -> String {
        [&self.email, &self.portfolio, &self.linkedin]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        load_env_file();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Tests pass a map here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let home = home_from_lookup(&lookup);

        let generation = GenerationSettings::from_lookup(&lookup)
            .map_err(anyhow::Error::msg)
            .context("LLM_MODE is invalid")?;

        let job_workers = match get("JOB_WORKERS") {
            Some(raw) => Some(
                raw.parse::<usize>()
                    .context("JOB_WORKERS must be a positive number")?,
            ),
            None => None,
        };

        let bio_file = home.join("config").join("candidate.txt");
        let name = get("CANDIDATE_NAME").unwrap_or_else(|| "Your Name".to_string());
        let bio = match get("CANDIDATE_BIO") {
            Some(bio) => bio,
            None => match std::fs::read_to_string(&bio_file) {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => format!("Candidate: {}\n(Add your background to config/candidate.txt)", name),
            },
        };

        Ok(Self {
            generation,
            webhook_url: get("DISCORD_WEBHOOK_URL"),
            candidate: CandidateProfile {
                email: get("CANDIDATE_EMAIL").unwrap_or_default(),
                portfolio: get("CANDIDATE_PORTFOLIO").unwrap_or_default(),
                linkedin: get("CANDIDATE_LINKEDIN").unwrap_or_default(),
                name,
                bio,
            },
            job_workers,
            node_bin: get("NODE_BIN").unwrap_or_else(|| "node".to_string()),
            home,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.join("data")
    }

    pub fn seen_path(&self) -> PathBuf {
        self.data_dir().join("seen_jobs.json")
    }

    pub fn search_config_path(&self) -> PathBuf {
        self.home.join("config").join("search_config.json")
    }

    pub fn primary_template_path(&self) -> PathBuf {
        self.home.join("resume").join("base_resume_ai.html")
    }

    pub fn secondary_template_path(&self) -> PathBuf {
        self.home.join("resume").join("base_resume.html")
    }

    /// Output root for one run day.
    pub fn output_dir(&self, date: NaiveDate) -> PathBuf {
        self.home
            .join("resume")
            .join("output")
            .join(date.format("%Y-%m-%d").to_string())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn env_file(&self) -> PathBuf {
        self.home.join(".env")
    }
}

/// Root for data/, config/, resume/ and logs/: `JOBSCOUT_HOME` or the
/// current directory.
pub fn home_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("JOBSCOUT_HOME")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load `<home>/.env` into the process environment, the same file
/// [`write_llm_mode`] edits. Falls back to the usual `.env` lookup from the
/// current directory, which may itself point `JOBSCOUT_HOME` elsewhere.
/// Variables already set in the environment win. Returns the home directory.
pub fn load_env_file() -> PathBuf {
    let home = home_from_lookup(|key| env::var(key).ok());
    if dotenvy::from_path(home.join(".env")).is_ok() {
        return home;
    }

    let _ = dotenv();
    let resolved = home_from_lookup(|key| env::var(key).ok());
    if resolved != home {
        let _ = dotenvy::from_path(resolved.join(".env"));
    }
    resolved
}

/// Search behavior, edited by hand in `config/search_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub locations: Vec<String>,

    #[serde(default = "default_sort_by")]
    pub sort_by: String,

    /// Recency ceiling in days; 0 means any age.
    #[serde(default)]
    pub max_days_old: u32,

    /// Run-wide cap on cards collected in one engine pass.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_job_workers")]
    pub job_workers: usize,

    /// In file order; that order is the report and dispatch order.
    pub categories: IndexMap<String, CategoryConfig>,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub keywords: Vec<String>,

    /// Added to the search only when the entry level is requested.
    #[serde(default)]
    pub boost_keywords: Vec<String>,

    #[serde(default = "default_experience_levels")]
    pub experience_levels: Vec<u8>,

    #[serde(default = "default_target_count")]
    pub target_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub stages: Vec<FallbackStage>,
}

/// One relaxation step, tried only for categories still short of target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackStage {
    #[serde(default = "default_stage_label")]
    pub label: String,

    /// Recency ceiling for this stage; 0 means any age.
    #[serde(default)]
    pub max_days_old: u32,

    #[serde(default)]
    pub category_exp_overrides: HashMap<String, Vec<u8>>,
}

fn default_sort_by() -> String {
    "DD".to_string()
}

fn default_max_candidates() -> usize {
    30
}

fn default_job_workers() -> usize {
    2
}

fn default_experience_levels() -> Vec<u8> {
    vec![ENTRY_LEVEL]
}

fn default_target_count() -> usize {
    10
}

fn default_stage_label() -> String {
    "fallback".to_string()
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search config {}", path.display()))?;
        let config: SearchConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid search config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            bail!("search config needs at least one location");
        }
        if self.categories.is_empty() {
            bail!("search config needs at least one category");
        }
        for (name, category) in &self.categories {
            if category.keywords.is_empty() && category.boost_keywords.is_empty() {
                bail!("category '{}' has no keywords", name);
            }
        }
        for stage in &self.fallback.stages {
            if let Some(unknown) = stage
                .category_exp_overrides
                .keys()
                .find(|name| !self.categories.contains_key(*name))
            {
                bail!(
                    "fallback stage '{}' overrides unknown category '{}'",
                    stage.label,
                    unknown
                );
            }
        }
        Ok(())
    }

    /// Per-category targets in configured order.
    pub fn targets(&self) -> IndexMap<String, usize> {
        self.categories
            .iter()
            .map(|(name, c)| (name.clone(), c.target_count))
            .collect()
    }

    /// Worker count after applying an override.
    pub fn workers(&self, override_workers: Option<usize>) -> usize {
        override_workers.unwrap_or(self.job_workers).max(1)
    }
}

/// Point `LLM_MODE` in a dotenv file at `kind`, appending the line if absent.
/// Other lines are kept as they are.
pub fn write_llm_mode(env_file: &Path, kind: BackendKind) -> Result<()> {
    let existing = match std::fs::read_to_string(env_file) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", env_file.display()));
        }
    };

    let setting = format!("LLM_MODE={}", kind);
    let mut replaced = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("LLM_MODE=") {
                replaced = true;
                setting.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(setting);
    }

    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(env_file, body)
        .with_context(|| format!("Failed to write {}", env_file.display()))
}
