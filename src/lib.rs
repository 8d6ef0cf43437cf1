//! # feed-relay
//!
//! Resumable migration of social-feed posts into a WordPress-style publishing site.
//!
//! A run has two phases. It first walks the paginated feed of every configured source
//! account and buffers the posts in order. It then republishes each buffered post: the
//! post's media are staged locally, re-uploaded, and embedded in a new post whose tags
//! are resolved (and created when missing) on the destination.
//!
//! Failures are retried in place with exponential backoff. Work that already succeeded
//! is never repeated, so a run that stopped early can be resumed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use feed_relay::{Config, build_pipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let mut driver = build_pipeline(&config)?;
//!
//!     // Subscribe to events
//!     let mut events = driver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = driver.run().await?;
//!     println!("published {} posts", summary.posts_published);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Publishing to the destination
pub mod destination;
/// Error types
pub mod error;
/// Shared HTTP client plumbing
pub mod http;
/// The resumable pipeline driver
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Source feed retrieval
pub mod source;
/// Local media staging
pub mod staging;
/// Core types and events
pub mod types;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::{Config, DestinationConfig, RetryConfig, SourceConfig};
pub use destination::{DestinationClient, PublishReceipt, Publisher, TagResolver};
pub use error::{Error, Result};
pub use pipeline::{Phase, PipelineDriver, PostSink, PostSource};
pub use source::FeedFetcher;
pub use staging::{MediaStager, StagingArea};
pub use types::{Event, MediaKind, MediaReference, PageRange, Post, RunSummary, WorkItem};

use tokio_util::sync::CancellationToken;

/// Build a driver wired to the real feed and destination described by `config`
///
/// One HTTP client is shared by every component.
pub fn build_pipeline(config: &Config) -> Result<PipelineDriver<FeedFetcher, Publisher>> {
    let client = http::client_for(config)?;
    let fetcher = FeedFetcher::from_config(client.clone(), &config.source);
    let publisher = Publisher::from_config(client, config)?;

    Ok(PipelineDriver::new(
        fetcher,
        publisher,
        config.source.ids.clone(),
        config.page_range()?,
        config.retry.clone(),
    ))
}

/// Cancel `token` once the process is asked to stop.
///
/// On Unix that is SIGTERM or SIGINT, whichever could be registered, falling back to
/// Ctrl+C when neither could. Elsewhere only Ctrl+C is observed.
///
/// The driver notices the cancellation between items or while waiting to retry.
///
/// # Example
///
/// ```no_run
/// use feed_relay::{Config, build_pipeline, cancel_on_signal};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::load(Path::new("config.toml"))?;
///     let mut driver = build_pipeline(&config)?;
///     tokio::spawn(cancel_on_signal(driver.cancellation_token()));
///     driver.run().await?;
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        signal = wait_for_signal() => {
            tracing::info!(signal, "stop requested, finishing after the current item");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

/// SIGTERM and SIGINT streams, either of which may be unavailable in sandboxed runs
#[cfg(unix)]
struct StopSignals {
    term: Option<tokio::signal::unix::Signal>,
    interrupt: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl StopSignals {
    fn register() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let term = signal(SignalKind::terminate())
            .inspect_err(|e| tracing::warn!(error = %e, "SIGTERM unavailable, relay will not stop on it"))
            .ok();
        let interrupt = signal(SignalKind::interrupt())
            .inspect_err(|e| tracing::warn!(error = %e, "SIGINT unavailable, relay will not stop on it"))
            .ok();
        Self { term, interrupt }
    }

    /// Wait for the first stop signal and name it
    async fn recv(&mut self) -> &'static str {
        match (self.term.as_mut(), self.interrupt.as_mut()) {
            (Some(term), Some(interrupt)) => tokio::select! {
                _ = term.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
            },
            (Some(term), None) => {
                term.recv().await;
                "SIGTERM"
            }
            (None, Some(interrupt)) => {
                interrupt.recv().await;
                "SIGINT"
            }
            (None, None) => ctrl_c().await,
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    StopSignals::register().recv().await
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

/// Last resort listener; never resolves if Ctrl+C cannot be observed
async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "no stop signal can be observed, relay runs to completion");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
