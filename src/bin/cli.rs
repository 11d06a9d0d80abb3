//! stockwatch CLI
//!
//! Local execution entry point. `check` runs one cycle (suitable for
//! cron or CI schedules); `watch` polls continuously.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use stockwatch::{
    detector::ChangeDetector,
    error::Result,
    fetch::{Fetcher, build_renderer},
    models::Config,
    notify::WebhookNotifier,
    pipeline,
    storage::FingerprintStore,
};

/// stockwatch - product page stock watcher
#[derive(Parser, Debug)]
#[command(
    name = "stockwatch",
    version,
    about = "Watches product pages for stock changes"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "stockwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single check cycle and exit
    Check,

    /// Poll continuously, sleeping between cycles
    Watch {
        /// Override the configured interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Validate the configuration file
    Validate,

    /// Show persisted fingerprint records
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the per-run components from configuration.
fn build_components(config: &Config) -> Result<(Fetcher, ChangeDetector, WebhookNotifier)> {
    let renderer = build_renderer(&config.fetcher);
    let fetcher = Fetcher::new(&config.fetcher, renderer)?;
    let detector = ChangeDetector::new(&config.detector)?;
    let notifier = WebhookNotifier::new(&config.notify)?;
    Ok((fetcher, detector, notifier))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("stockwatch starting...");

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();

    match cli.command {
        Command::Check => {
            config.validate()?;
            let (fetcher, detector, notifier) = build_components(&config)?;
            let mut store = FingerprintStore::load(&config.store.state_path).await;

            pipeline::run_cycle(&config, &fetcher, &detector, &notifier, &mut store).await;
            log::info!("Single run complete.");
        }

        Command::Watch { interval } => {
            config.validate()?;
            let interval_secs = interval.unwrap_or(config.watch.interval_secs);
            let (fetcher, detector, notifier) = build_components(&config)?;
            let mut store = FingerprintStore::load(&config.store.state_path).await;

            log::info!(
                "Watching {} target(s) every {} seconds",
                config.watch.targets.len(),
                interval_secs
            );

            loop {
                pipeline::run_cycle(&config, &fetcher, &detector, &notifier, &mut store).await;
                log::info!("Sleeping for {} seconds...", interval_secs);
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} targets, fallback {})",
                config.watch.targets.len(),
                if config.fetcher.renderer_command.is_empty() {
                    "absent"
                } else {
                    "configured"
                }
            );
        }

        Command::Info => {
            let store = FingerprintStore::load(&config.store.state_path).await;
            log::info!("State file: {}", store.path().display());
            log::info!("Records: {}", store.len());

            let mut records: Vec<_> = store.iter().collect();
            records.sort();
            for (url, digest) in records {
                log::info!("  {} {}", url, digest);
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
