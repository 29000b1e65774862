//! Rendering a tailored HTML document to a one-page PDF.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::RenderError;
use crate::generation::{CommandRunner, Invocation};

/// Letter page height in CSS pixels at 96 dpi.
pub const PAGE_HEIGHT_PX: u32 = 1056;
pub const PAGE_WIDTH_PX: u32 = 816;

const RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Playwright script run through `node -e`. Paths arrive in the environment.
const PLAYWRIGHT_SCRIPT: &str = r#"
const { chromium } = require('playwright');
(async () => {
    const htmlPath = process.env.JOBSCOUT_RENDER_HTML;
    const pdfPath = process.env.JOBSCOUT_RENDER_PDF;
    const pageHeight = Number(process.env.JOBSCOUT_PAGE_HEIGHT);
    const pageWidth = Number(process.env.JOBSCOUT_PAGE_WIDTH);
    const browser = await chromium.launch({ headless: true });
    try {
        const page = await browser.newPage({ viewport: { width: pageWidth, height: pageHeight } });
        await page.goto('file://' + htmlPath, { waitUntil: 'networkidle' });
        await page.emulateMedia({ media: 'print' });

        const contentHeight = await page.evaluate(() => document.body.scrollHeight);
        if (contentHeight > pageHeight) {
            const scale = Math.round((pageHeight / contentHeight) * 0.98 * 10000) / 10000;
            await page.evaluate((s) => {
                document.body.style.transformOrigin = 'top left';
                document.body.style.transform = 'scale(' + s + ')';
                document.body.style.width = (Math.round(10000 / s) / 100) + '%';
                document.body.style.overflow = 'visible';
            }, scale);
            console.log('scaled ' + contentHeight + 'px by ' + scale);
        }

        await page.pdf({
            path: pdfPath,
            format: 'Letter',
            printBackground: true,
            margin: { top: '0', bottom: '0', left: '0', right: '0' },
            pageRanges: '1',
        });
    } finally {
        await browser.close();
    }
})().catch((e) => {
    console.error((e && e.stack) || String(e));
    process.exit(1);
});
"#;

/// Turns a saved HTML document into the final artifact.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, html: &Path, output: &Path) -> Result<(), RenderError>;
}

/// Headless Chromium through Playwright, launched with `node -e`.
pub struct PlaywrightRenderer {
    node_bin: String,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl PlaywrightRenderer {
    pub fn new(node_bin: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            node_bin: node_bin.into(),
            runner,
            timeout: RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

async fn absolute(path: &Path) -> Result<PathBuf, RenderError> {
    let (dir, name) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => (dir, name),
        _ => return Err(RenderError::Failed(format!("bad path {}", path.display()))),
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| RenderError::Failed(format!("{}: {}", dir.display(), e)))?;
    Ok(dir.join(name))
}

#[async_trait]
impl Renderer for PlaywrightRenderer {
    async fn render(&self, html: &Path, output: &Path) -> Result<(), RenderError> {
        let html = absolute(html).await?;
        let output = absolute(output).await?;
        debug!(html = %html.display(), pdf = %output.display(), "Rendering");

        let mut invocation = Invocation::new(&self.node_bin, self.timeout)
            .arg("-e")
            .arg(PLAYWRIGHT_SCRIPT);
        invocation.env_set = vec![
            ("JOBSCOUT_RENDER_HTML".to_string(), html.display().to_string()),
            ("JOBSCOUT_RENDER_PDF".to_string(), output.display().to_string()),
            ("JOBSCOUT_PAGE_HEIGHT".to_string(), PAGE_HEIGHT_PX.to_string()),
            ("JOBSCOUT_PAGE_WIDTH".to_string(), PAGE_WIDTH_PX.to_string()),
        ];

        let out = self.runner.run(&invocation).await.map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => RenderError::Timeout(self.timeout),
            _ => RenderError::Spawn(e),
        })?;

        if !out.success {
            return Err(RenderError::Failed(
                openai_client::truncate_chars(out.error_text().trim(), 400).to_string(),
            ));
        }
        if let Some(note) = out.stdout.lines().find(|l| l.starts_with("scaled")) {
            info!(note, "Content taller than one page");
        }
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(RenderError::MissingOutput(output));
        }
        Ok(())
    }
}
