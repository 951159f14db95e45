//! Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use harvester::{
    error::Result,
    models::{Config, SearchCriteria, parse_date, parse_operator},
    pipeline::{self, CrawlOptions, export},
    services::{Fetcher, RateLimiter, RetryPolicy},
    sites::SiteKind,
    storage,
    utils::{Shutdown, http},
};

/// Harvester - public filing search crawler
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvest filing records and attachments from public search sites"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a site, read details and download attachments
    Crawl(CrawlArgs),

    /// Validate the configuration file
    Validate,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Target site (ocd or rrc)
    #[arg(long)]
    site: SiteKind,

    /// Start of the filing date range (mm/dd/yyyy)
    #[arg(short, long = "from", value_parser = parse_date)]
    from_date: String,

    /// End of the filing date range (mm/dd/yyyy)
    #[arg(short, long = "to", value_parser = parse_date)]
    to_date: String,

    /// Operator number
    #[arg(short, long, value_parser = parse_operator)]
    operator: String,

    /// Write the record table as CSV
    #[arg(long)]
    records: Option<PathBuf>,

    /// Write records with operator and attachments as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip attachment downloads
    #[arg(long)]
    no_download: bool,

    /// Download attachments even if the file already exists
    #[arg(long)]
    redownload: bool,

    /// Bypass the detail page cache
    #[arg(long)]
    no_cache: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the run on Ctrl-C.
fn spawn_interrupt_handler() -> Shutdown {
    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling in-flight requests");
            trigger.cancel();
        }
    });
    shutdown
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command. `Ok(false)` means it finished with failures.
async fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Crawl(args) => {
            config.validate()?;
            if args.no_cache {
                config.cache.enabled = false;
            }
            if args.redownload {
                config.download.skip_already_downloaded = false;
            }
            crawl(&config, args).await
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK");
            Ok(true)
        }
    }
}

async fn crawl(config: &Config, args: CrawlArgs) -> Result<bool> {
    let criteria = SearchCriteria::new(&args.from_date, &args.to_date, &args.operator)?;
    let site = args.site.build(&config.sites)?;

    let client = http::create_client(&config.crawler)?;
    let cache = storage::open_cache(&config.cache).await;
    let fetcher = Arc::new(Fetcher::new(
        client,
        cache,
        RateLimiter::from_config(&config.rate_limit),
        RetryPolicy::from_config(&config.crawler),
        spawn_interrupt_handler(),
    ));

    let mut options = CrawlOptions::from_config(config);
    options.download = !args.no_download;

    log::info!(
        "Crawling {} from {} to {} for operator {}",
        site.name(),
        criteria.from_date(),
        criteria.to_date(),
        criteria.operator_id()
    );
    let outcome = pipeline::run_crawl(site.as_ref(), fetcher, criteria, &options).await?;

    if let Some(path) = &args.records {
        export::write_csv(path, &outcome.records).await?;
    }
    if let Some(path) = &args.json {
        export::write_json(path, &outcome.records).await?;
    }

    log::info!(
        "Crawl complete: {} records from {} pages",
        outcome.records.len(),
        outcome.pages
    );

    let Some(report) = outcome.report else {
        return Ok(true);
    };
    log::info!(
        "Attachments: {} downloaded, {} skipped, {} records failed",
        report.downloaded,
        report.skipped,
        report.failures.len()
    );
    for (id, error) in &report.failures {
        log::error!("Record {id}: {error}");
    }
    Ok(report.failures.is_empty())
}
