//! The resumable fetch-then-publish driver
//!
//! [`PipelineDriver`] owns two cursors: the index of the next source id to fetch and the
//! index of the next buffered post to publish. A run fetches every remaining id, then
//! publishes every remaining post. A failed item is retried in place, so items before
//! the cursor are never repeated. When a run stops early (retry budget spent, an error
//! that cannot be retried, or cancellation) the cursors stay where they were and
//! calling [`run`](PipelineDriver::run) again resumes from them.

mod traits;


pub use traits::{PostSink, PostSource};

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::{Backoff, RetryDecision};
use crate::types::{Event, PageRange, Post, RunSummary, WorkItem};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Buffer size of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Where a driver currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Source ids remain to be fetched
    Fetching,
    /// Every id is fetched; buffered posts remain to be published
    Publishing,
    /// Nothing left to do
    Done,
}

/// Drives a relay run from a [`PostSource`] into a [`PostSink`]
pub struct PipelineDriver<S, P> {
    source: S,
    sink: P,
    ids: Vec<String>,
    range: PageRange,
    retry: RetryConfig,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<Event>,
    posts: Vec<Post>,
    next_id_index: usize,
    next_post_index: usize,
}

impl<S, P> std::fmt::Debug for PipelineDriver<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDriver")
            .field("ids", &self.ids)
            .field("range", &self.range)
            .field("posts", &self.posts.len())
            .field("next_id_index", &self.next_id_index)
            .field("next_post_index", &self.next_post_index)
            .finish_non_exhaustive()
    }
}

impl<S: PostSource, P: PostSink> PipelineDriver<S, P> {
    /// Create a driver at the start of both cursors
    pub fn new(source: S, sink: P, ids: Vec<String>, range: PageRange, retry: RetryConfig) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            sink,
            ids,
            range,
            retry,
            cancel: CancellationToken::new(),
            event_tx,
            posts: Vec::new(),
            next_id_index: 0,
            next_post_index: 0,
        }
    }

    /// Use `token` to stop the driver from the outside
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the cancellation token
    ///
    /// A cancelled token stays cancelled; install a fresh one before resuming a run that
    /// was stopped by cancellation.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// The token that cancels this driver
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to progress events
    ///
    /// Each subscriber receives every event sent after it subscribed. A subscriber that
    /// falls more than the channel capacity behind loses the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current phase, derived from the cursors
    pub fn phase(&self) -> Phase {
        if self.next_id_index < self.ids.len() {
            Phase::Fetching
        } else if self.next_post_index < self.posts.len() {
            Phase::Publishing
        } else {
            Phase::Done
        }
    }

    /// Index of the next source id to fetch
    pub fn next_id_index(&self) -> usize {
        self.next_id_index
    }

    /// Index of the next buffered post to publish
    pub fn next_post_index(&self) -> usize {
        self.next_post_index
    }

    /// Posts collected so far, in fetch order
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// The post source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The post sink
    pub fn sink(&self) -> &P {
        &self.sink
    }

    /// Counts for the work done so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ids_fetched: self.next_id_index,
            posts_fetched: self.posts.len(),
            posts_published: self.next_post_index,
        }
    }

    /// Fetch every remaining id, then publish every remaining post
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the cancellation token fired
    /// - [`Error::RetriesExhausted`] if one item used up its retry budget
    /// - any error that cannot be retried, as returned by the source or sink
    ///
    /// The cursors are left in place on error and a later call resumes from them.
    pub async fn run(&mut self) -> Result<RunSummary> {
        info!(
            ids = self.ids.len(),
            next_id = self.next_id_index,
            next_post = self.next_post_index,
            unlimited_retries = self.retry.is_unbounded(),
            "starting relay run"
        );

        self.fetch_remaining().await?;
        self.publish_remaining().await?;

        let summary = self.summary();
        info!(
            ids = summary.ids_fetched,
            posts = summary.posts_published,
            "relay run finished"
        );
        self.emit_event(Event::Finished { summary });
        Ok(summary)
    }

    async fn fetch_remaining(&mut self) -> Result<()> {
        let total = self.ids.len();
        while self.next_id_index < total {
            self.check_cancelled()?;

            let index = self.next_id_index;
            let source_id = self.ids[index].clone();
            let item = WorkItem::Fetch {
                index,
                source_id: source_id.clone(),
            };

            let mut backoff = Backoff::new(&self.retry);
            let posts = loop {
                match self.source.fetch(&source_id, self.range).await {
                    Ok(posts) => break posts,
                    Err(e) => self.wait_before_retry(&item, &mut backoff, e).await?,
                }
            };

            let count = posts.len();
            self.posts.extend(posts);
            self.next_id_index += 1;

            info!(source_id = %source_id, posts = count, "Fetched: {}/{}", self.next_id_index, total);
            self.emit_event(Event::Fetched {
                source_id,
                posts: count,
                completed: self.next_id_index,
                total,
            });
        }
        Ok(())
    }

    async fn publish_remaining(&mut self) -> Result<()> {
        let total = self.posts.len();
        while self.next_post_index < total {
            self.check_cancelled()?;

            let index = self.next_post_index;
            let item = WorkItem::Publish { index };
            info!("Post {}/{}\n{}", index + 1, total, self.posts[index]);

            let mut backoff = Backoff::new(&self.retry);
            loop {
                match self.sink.publish(&self.posts[index]).await {
                    Ok(()) => break,
                    Err(e) => self.wait_before_retry(&item, &mut backoff, e).await?,
                }
            }

            self.next_post_index += 1;

            info!("Published: {}/{}", self.next_post_index, total);
            self.emit_event(Event::Published {
                index,
                completed: self.next_post_index,
                total,
            });
        }
        Ok(())
    }

    /// Decide how to continue after `error` failed `item`
    ///
    /// Returns `Ok(())` once the backoff delay has passed and the item should be retried.
    async fn wait_before_retry(
        &self,
        item: &WorkItem,
        backoff: &mut Backoff,
        error: Error,
    ) -> Result<()> {
        match backoff.next(&error) {
            RetryDecision::Retry { attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    item = %item,
                    attempt,
                    delay_ms,
                    status = ?error.status(),
                    error = %error,
                    "item failed, retrying"
                );
                self.emit_event(Event::Retrying {
                    item: item.clone(),
                    attempt,
                    error: error.to_string(),
                    delay_ms,
                });

                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!(item = %item, "run cancelled during backoff");
                        Err(Error::Cancelled)
                    }
                    _ = tokio::time::sleep(delay) => Ok(()),
                }
            }
            RetryDecision::Exhausted { attempts } => {
                let error = Error::RetriesExhausted {
                    attempts,
                    source: Box::new(error),
                };
                Err(self.abort(item, error))
            }
            RetryDecision::Fatal => Err(self.abort(item, error)),
        }
    }

    fn abort(&self, item: &WorkItem, error: Error) -> Error {
        error!(item = %item, status = ?error.status(), error = %error, "item failed, stopping run");
        self.emit_event(Event::Aborted {
            item: item.clone(),
            error: error.to_string(),
        });
        error
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            info!(
                next_id = self.next_id_index,
                next_post = self.next_post_index,
                "run cancelled"
            );
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    // send() returns Err if there are no receivers, which is fine
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
