//! Per-item processing: tailor, write auxiliary documents, render.

mod extract;
mod prompts;
mod render;

pub use extract::{doctype_block, extract_document, html_block, labeled_section, section};
pub use prompts::{cover_letter_prompt, format_cover_letter, tailor_prompt, why_company_prompt};
pub use render::{PlaywrightRenderer, Renderer, PAGE_HEIGHT_PX, PAGE_WIDTH_PX};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

use crate::config::CandidateProfile;
use crate::generation::{Generator, Role};
use crate::types::{AuxiliaryDocs, CandidateItem, PipelineResult};

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn company_slug(company: &str) -> String {
    company
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Source documents the tailoring step works from.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub primary: String,
    pub secondary: Option<String>,
}

impl Templates {
    /// Read both templates. Only the primary one is required.
    pub async fn load(primary: &Path, secondary: &Path) -> Result<Self> {
        let primary_html = tokio::fs::read_to_string(primary)
            .await
            .with_context(|| format!("Failed to read resume template {}", primary.display()))?;
        let secondary_html = match tokio::fs::read_to_string(secondary).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(path = %secondary.display(), error = %e, "Secondary template unavailable");
                None
            }
        };
        Ok(Self {
            primary: primary_html,
            secondary: secondary_html,
        })
    }
}

/// Runs one candidate from description to rendered artifact.
///
/// Holds no per-item state, so one instance serves every worker.
pub struct ItemPipeline {
    generator: Arc<dyn Generator>,
    renderer: Arc<dyn Renderer>,
    templates: Templates,
    candidate: CandidateProfile,
    date: NaiveDate,
}

impl ItemPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        renderer: Arc<dyn Renderer>,
        templates: Templates,
        candidate: CandidateProfile,
    ) -> Self {
        Self {
            generator,
            renderer,
            templates,
            candidate,
            date: Local::now().date_naive(),
        }
    }

    /// Date printed on cover letters.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Where `item`'s files go under `output_root`.
    pub fn destination(output_root: &Path, item: &CandidateItem) -> PathBuf {
        output_root.join(company_slug(&item.company))
    }

    fn file_name(&self, kind: &str, slug: &str, ext: &str) -> String {
        format!("{}-{}{}.{}", self.candidate.name, kind, slug, ext)
    }

    /// Run the whole item. Never fails: problems end up in the result.
    ///
    /// Running the same item twice overwrites the same files.
    pub async fn process(&self, item: &CandidateItem, output_root: &Path) -> PipelineResult {
        let dir = Self::destination(output_root, item);
        let label = format!("{} @ {}", item.title, item.company);
        info!(job_id = %item.job_id, %label, "▶ Starting");

        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            error!(dir = %dir.display(), error = %e, "❌ Could not create output directory");
            return PipelineResult::failed(item.clone(), format!("output directory: {}", e));
        }

        // A rendered file from an earlier run would read as success.
        let pdf_path = dir.join(self.file_name("Resume-", &company_slug(&item.company), "pdf"));
        match tokio::fs::remove_file(&pdf_path).await {
            Ok(()) => info!(file = %pdf_path.display(), "Removed earlier PDF"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %pdf_path.display(), error = %e, "Could not remove earlier PDF"),
        }

        let description = item.description_or_fallback();
        if item.description.trim().is_empty() {
            warn!(job_id = %item.job_id, "Empty description, using title and company as a hint");
        }

        let (tailored, auxiliary) = tokio::join!(
            self.tailor(item, &description, &dir),
            self.auxiliary(item, &description, &dir),
        );

        let mut result = PipelineResult {
            item: item.clone(),
            tailored: None,
            rendered: None,
            auxiliary,
            failure: None,
        };

        match tailored {
            Ok(html_path) => {
                match self.renderer.render(&html_path, &pdf_path).await {
                    Ok(()) => {
                        info!(file = %pdf_path.display(), "PDF saved");
                        result.rendered = Some(pdf_path);
                    }
                    Err(e) => {
                        error!(job_id = %item.job_id, error = %e, "Rendering failed");
                        result.failure = Some(format!("render: {}", e));
                    }
                }
                result.tailored = Some(html_path);
            }
            Err(reason) => result.failure = Some(reason),
        }

        if result.success() {
            info!(job_id = %item.job_id, %label, output = %dir.display(), "✅ Done");
        } else {
            error!(
                job_id = %item.job_id,
                %label,
                reason = result.failure.as_deref().unwrap_or("unknown"),
                "❌ Done"
            );
        }
        result
    }

    /// Generate, extract and save the tailored document.
    async fn tailor(&self, item: &CandidateItem, description: &str, dir: &Path) -> Result<PathBuf, String> {
        let prompt = tailor_prompt(
            description,
            &self.templates.primary,
            self.templates.secondary.as_deref(),
        );
        let label = format!("tailor:{}", item.company);
        let raw = self
            .generator
            .generate(&prompt, Role::Tailor, &label)
            .await
            .map_err(|e| format!("tailor: {}", e))?;

        let Some((strategy, html)) = extract_document(&raw) else {
            error!(
                job_id = %item.job_id,
                head = openai_client::truncate_chars(&raw, 200),
                "Could not find an HTML document in the output"
            );
            return Err("tailor: no HTML document in output".to_string());
        };

        let changelog = section(&raw, "CHANGELOG");
        if !changelog.is_empty() {
            info!(changelog = openai_client::truncate_chars(&changelog, 600), "📝 Changelog");
        }
        let coverage = section(&raw, "KEYWORD_COVERAGE");
        if !coverage.is_empty() {
            info!(coverage = openai_client::truncate_chars(&coverage, 400), "🔑 Keyword coverage");
        }

        let path = dir.join(format!("{}_{}.html", item.job_id, company_slug(&item.company)));
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| format!("tailor: write {}: {}", path.display(), e))?;
        info!(strategy, file = %path.display(), "Tailored HTML saved");
        Ok(path)
    }

    /// Cover letter, then the "why this company" answer. Either may fail alone.
    async fn auxiliary(&self, item: &CandidateItem, description: &str, dir: &Path) -> AuxiliaryDocs {
        let slug = company_slug(&item.company);
        let mut docs = AuxiliaryDocs::default();

        let prompt = cover_letter_prompt(item, description, &self.candidate);
        let label = format!("cover_letter:{}", item.company);
        match self.generator.generate(&prompt, Role::Auxiliary, &label).await {
            Ok(body) => {
                let letter = format_cover_letter(&body, item, &self.candidate, self.date);
                let path = dir.join(self.file_name("CoverLetter-", &slug, "txt"));
                docs.cover_letter = self.save(&path, &letter).await;
            }
            Err(e) => warn!(job_id = %item.job_id, error = %e, "Cover letter generation failed"),
        }

        let prompt = why_company_prompt(item, description, &self.candidate);
        let label = format!("why:{}", item.company);
        match self.generator.generate(&prompt, Role::Auxiliary, &label).await {
            Ok(answer) => {
                let path = dir.join(self.file_name("Why", &slug, "txt"));
                docs.why_company = self.save(&path, &answer).await;
            }
            Err(e) => warn!(job_id = %item.job_id, error = %e, "Why-company generation failed"),
        }

        docs
    }

    async fn save(&self, path: &Path, contents: &str) -> Option<PathBuf> {
        match tokio::fs::write(path, contents).await {
            Ok(()) => {
                info!(file = %path.display(), "Saved");
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Write failed");
                None
            }
        }
    }
}
