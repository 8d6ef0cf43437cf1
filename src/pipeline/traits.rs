//! Seams between the pipeline driver and the outside world

use crate::error::Result;
use crate::types::{PageRange, Post};
use async_trait::async_trait;

/// Somewhere posts are read from
///
/// The driver calls [`fetch`](PostSource::fetch) once per source id and retries the whole
/// call on transient failures, so an implementation must not keep partial results
/// between calls.
#[async_trait]
pub trait PostSource: Send {
    /// Fetch every post of `source_id` within `range`, in feed order
    ///
    /// # Errors
    ///
    /// Any error aborts the whole id; the driver decides whether to retry.
    async fn fetch(&mut self, source_id: &str, range: PageRange) -> Result<Vec<Post>>;
}

/// Somewhere posts are published to
///
/// A failed [`publish`](PostSink::publish) is retried with the same post, so an
/// implementation must clean up after itself before returning an error.
#[async_trait]
pub trait PostSink: Send {
    /// Publish one post
    async fn publish(&mut self, post: &Post) -> Result<()>;
}
