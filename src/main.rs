//! feed-relay: migrate feed posts into a publishing site.
//!
//! Runs the pipeline once against the configured source and destination. SIGINT or
//! SIGTERM stops the run after the current item.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use feed_relay::{Config, Error, build_pipeline, cancel_on_signal};

/// Relay posts from a paginated feed into a WordPress-style site.
#[derive(Parser, Debug)]
#[command(name = "feed-relay", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "FEED_RELAY_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(
        path = %cli.config.display(),
        ids = config.source.ids.len(),
        "loaded config"
    );

    let mut driver = build_pipeline(&config).context("building pipeline")?;
    tokio::spawn(cancel_on_signal(driver.cancellation_token()));

    match driver.run().await {
        Ok(summary) => {
            info!(
                ids = summary.ids_fetched,
                fetched = summary.posts_fetched,
                published = summary.posts_published,
                "done"
            );
            Ok(())
        }
        Err(Error::Cancelled) => {
            let summary = driver.summary();
            warn!(
                published = summary.posts_published,
                remaining = summary.posts_fetched.saturating_sub(summary.posts_published),
                "stopped by signal"
            );
            Ok(())
        }
        Err(e) => Err(e).context("relay run failed"),
    }
}
