//! Command-line entry point.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use jobscout::browser::HttpBrowser;
use jobscout::config::{load_env_file, write_llm_mode, Config, SearchConfig};
use jobscout::generation::{Backend, BackendKind, CommandRunner, Generator, QuotaBreaker, TokioRunner};
use jobscout::notify::notifier_for;
use jobscout::orchestrator::{DailyRun, Dispatcher};
use jobscout::pipeline::{ItemPipeline, PlaywrightRenderer, Templates};
use jobscout::retry::{retry_day, retry_one, RetryRequest};
use jobscout::store::{RunManifest, SeenStore};
use jobscout::{logging, status, AcquisitionEngine, ListingSource};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "Find new job postings, tailor documents for each, report the results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full daily run: search, tailor, render, report
    Run,

    /// Run one posting through the pipeline
    Retry {
        /// Posting detail page URL
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },

    /// Retry every posting of a day that has not succeeded
    RetryDay {
        /// YYYY-MM-DD, defaults to today
        date: Option<NaiveDate>,
    },

    /// Print today's output and manifest status as JSON
    Status,

    /// Show or switch the generation backend
    Model { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `model` must work even when the current LLM_MODE is unusable.
    if let Commands::Model { name } = &cli.command {
        let home = load_env_file();
        let _log_guard = logging::init(&home.join("logs"))?;
        return model(&home.join(".env"), name.as_deref());
    }

    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.log_dir())?;

    let outcome = match cli.command {
        Commands::Run => run(&config).await,
        Commands::Retry {
            url,
            title,
            company,
            location,
            category,
        } => {
            let request = RetryRequest {
                url,
                title,
                company,
                location,
                category,
            };
            retry(&config, &request).await
        }
        Commands::RetryDay { date } => {
            retry_whole_day(&config, date.unwrap_or_else(today)).await
        }
        Commands::Status => print_status(&config).await,
        // Handled before the full config is loaded.
        Commands::Model { .. } => Ok(()),
    };

    if let Err(e) = &outcome {
        error!(error = %format!("{:#}", e), "Command failed");
    }
    outcome
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn browser() -> Result<HttpBrowser> {
    HttpBrowser::new(NonZeroU32::MIN).context("Failed to set up HTTP client")
}

/// Generation backend, renderer and templates wired into a worker pool.
async fn dispatcher(config: &Config, requested_workers: usize) -> Result<Dispatcher> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioRunner);
    let breaker = Arc::new(QuotaBreaker::default());
    let backend = Backend::from_settings(&config.generation, breaker, runner.clone())
        .context("Failed to set up generation backend")?;
    let kind = backend.kind();
    let generator: Arc<dyn Generator> = Arc::new(backend);

    let templates = Templates::load(
        &config.primary_template_path(),
        &config.secondary_template_path(),
    )
    .await?;
    let renderer = Arc::new(PlaywrightRenderer::new(config.node_bin.clone(), runner));
    let pipeline = ItemPipeline::new(generator, renderer, templates, config.candidate.clone())
        .with_date(today());

    info!(backend = %kind, "Generation backend ready");
    Ok(Dispatcher::new(Arc::new(pipeline), requested_workers, kind))
}

async fn run(config: &Config) -> Result<()> {
    let search = SearchConfig::load(&config.search_config_path())?;
    let date = today();
    let dispatcher = dispatcher(config, search.workers(config.job_workers)).await?;

    info!(
        categories = search.categories.len(),
        targets = ?search.targets(),
        workers = dispatcher.workers(),
        backend = %config.generation.kind,
        "Starting daily run"
    );

    let search = Arc::new(search);
    let engine = AcquisitionEngine::new(browser()?, search.clone(), ListingSource::default());
    let seen_store = SeenStore::new(config.seen_path());
    let notifier = notifier_for(config.webhook_url.as_deref());

    let summary = DailyRun {
        source: &engine,
        search: &search,
        seen_store: &seen_store,
        manifest_path: RunManifest::path_for(&config.data_dir(), date),
        output_root: config.output_dir(date),
        notifier: notifier.as_ref(),
        date,
    }
    .execute(&dispatcher)
    .await?;

    println!("{}/{} succeeded", summary.succeeded(), summary.results.len());
    Ok(())
}

async fn retry(config: &Config, request: &RetryRequest) -> Result<()> {
    let date = today();
    let dispatcher = dispatcher(config, 1).await?;
    let manifest = RunManifest::open(RunManifest::path_for(&config.data_dir(), date)).await?;

    let result = retry_one(
        &browser()?,
        &ListingSource::default(),
        request,
        &dispatcher,
        &config.output_dir(date),
        &manifest,
    )
    .await?;

    println!("{} {} @ {}", result.marker(), result.item.title, result.item.company);
    if let Some(pdf) = &result.rendered {
        println!("{}", pdf.display());
    }
    Ok(())
}

async fn retry_whole_day(config: &Config, date: NaiveDate) -> Result<()> {
    let manifest = RunManifest::open_existing(RunManifest::path_for(&config.data_dir(), date))
        .await
        .with_context(|| format!("No manifest for {}", date))?;
    let search_workers = SearchConfig::load(&config.search_config_path())
        .map(|s| s.workers(config.job_workers))
        .unwrap_or_else(|_| config.job_workers.unwrap_or(1));
    let dispatcher = dispatcher(config, search_workers).await?;

    let outcome = retry_day(
        &browser()?,
        &ListingSource::default(),
        &manifest,
        &dispatcher,
        &config.output_dir(date),
    )
    .await?;

    println!(
        "{}/{} retried postings succeeded ({} already done)",
        outcome.succeeded, outcome.attempted, outcome.already_done
    );
    Ok(())
}

async fn print_status(config: &Config) -> Result<()> {
    let date = today();
    let summary = status::summarize(
        date,
        &config.output_dir(date),
        &RunManifest::path_for(&config.data_dir(), date),
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn model(env_file: &Path, name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        let current = std::env::var("LLM_MODE").unwrap_or_else(|_| "claude".to_string());
        println!("{}", current.trim());
        return Ok(());
    };

    let kind: BackendKind = name.parse().map_err(anyhow::Error::msg)?;
    write_llm_mode(env_file, kind)?;
    info!(backend = %kind, file = %env_file.display(), "Generation backend switched");
    println!("LLM_MODE={}", kind);
    Ok(())
}
