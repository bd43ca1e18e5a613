use anyhow::Context;
use btcbrief_core::config::{PipelineConfig, Settings};
use btcbrief_core::error::PipelineError;
use btcbrief_core::pipeline::{Pipeline, DEFAULT_QUERY};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

#[derive(Debug, Parser)]
#[command(name = "btcbrief_worker")]
struct Args {
    /// Free-text search query for the news search stage.
    #[arg(long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Maximum number of articles to analyze (1..=10). Overrides MAX_ARTICLES.
    #[arg(long)]
    max_articles: Option<usize>,

    /// Recency window in hours. Overrides RECENCY_HOURS.
    #[arg(long)]
    recency_hours: Option<u32>,

    /// Read article pages in addition to search snippets. Overrides FETCH_PAGES.
    #[arg(long)]
    fetch_pages: bool,

    /// Write the full run report as JSON to this path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Validate configuration and print it without calling any API.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let config = resolve_config(&settings, &args)?;

    if args.dry_run {
        tracing::info!(query = %args.query, dry_run = true, "configuration valid");
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config)?;

    match pipeline.run(&args.query).await {
        Ok(report) => {
            print!("{}", output::render_summary(&report));
            if let Some(path) = args.out.as_deref() {
                output::write_report(path, &report)?;
                tracing::info!(path = %path.display(), run_id = %report.run_id, "wrote run report");
            }
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            if let Some(raw) = err
                .downcast_ref::<PipelineError>()
                .and_then(PipelineError::raw_output)
            {
                eprintln!("--- raw model output ---\n{raw}\n------------------------");
            }
            tracing::error!(error = %format!("{err:#}"), "run failed");
            Err(err)
        }
    }
}

fn resolve_config(settings: &Settings, args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config =
        PipelineConfig::from_settings(settings).context("startup configuration is incomplete")?;
    if let Some(n) = args.max_articles {
        config = config.with_max_articles(n);
    }
    if let Some(h) = args.recency_hours {
        config = config.with_recency_hours(h);
    }
    if args.fetch_pages {
        config = config.with_fetch_pages(true);
    }
    Ok(config)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
