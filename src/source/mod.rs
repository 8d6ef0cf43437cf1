//! Paginated retrieval from the source feed
//!
//! [`FeedFetcher`] walks the pages of one source account and turns each raw record into
//! a [`Post`]. Pagination ends when:
//! - a bounded [`PageRange`] reaches its end page (that page is never requested), or
//! - any page other than page 1 answers 404, which the feed uses to signal "no more pages".
//!
//! Any other non-200 answer is an error. Page 1 of a feed must always exist; a 404 on a
//! later start page just means the account has fewer pages.

mod decode;


use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::http::{decode_json, join_url, read_body};
use crate::pipeline::PostSource;
use crate::types::{MediaReference, PageRange, Post};
use async_trait::async_trait;
use decode::FeedPage;
use reqwest::StatusCode;
use tracing::{debug, info};

/// Every account has at least this page
const FIRST_PAGE: u32 = 1;

/// Result of requesting a single page
enum PageOutcome {
    /// The page existed and decoded into posts
    Posts(Vec<Post>),
    /// The feed reported that there are no more pages
    End,
}

/// Fetches posts from the source feed, page by page
#[derive(Clone, Debug)]
pub struct FeedFetcher {
    client: reqwest::Client,
    server: String,
    download_server: String,
    user_agent: String,
}

impl FeedFetcher {
    /// Create a fetcher for `server`, routing media URLs through `download_server`
    pub fn new(
        client: reqwest::Client,
        server: impl Into<String>,
        download_server: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            server: server.into(),
            download_server: download_server.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Create a fetcher from the `[source]` config section
    pub fn from_config(client: reqwest::Client, config: &SourceConfig) -> Self {
        Self::new(
            client,
            config.server.clone(),
            config.download_server.clone(),
            config.user_agent.clone(),
        )
    }

    /// URL of one page of `source_id`'s feed
    pub fn page_url(&self, source_id: &str, page: u32) -> String {
        format!(
            "{}/?after={}&page={}",
            join_url(&self.server, &format!("v2/user/{}", source_id)),
            page,
            page
        )
    }

    /// Rewrite a media URL so the download goes through the proxy
    pub fn proxied_url(&self, url: &str) -> String {
        format!(
            "{}?url={}",
            join_url(&self.download_server, "download"),
            urlencoding::encode(url)
        )
    }

    /// Fetch every page of `source_id` within `range`
    ///
    /// Returns posts in feed order. Fails without returning any posts if a page cannot be
    /// fetched or decoded; the caller is expected to redo the whole id.
    pub async fn fetch(&self, source_id: &str, range: PageRange) -> Result<Vec<Post>> {
        if source_id.is_empty() {
            return Err(Error::Precondition("source id must not be empty".into()));
        }

        let mut posts = Vec::new();
        let mut page = range.start();
        loop {
            if range.is_past_end(page) {
                debug!(source_id, page, "reached end of page range");
                break;
            }

            info!(source_id, page, "fetching page");
            match self.fetch_page(source_id, page, page == FIRST_PAGE).await? {
                PageOutcome::Posts(batch) => {
                    debug!(source_id, page, count = batch.len(), "page decoded");
                    posts.extend(batch);
                }
                PageOutcome::End => {
                    debug!(source_id, page, "feed reported no more pages");
                    break;
                }
            }
            page += 1;
        }

        info!(source_id, posts = posts.len(), "fetched all pages");
        Ok(posts)
    }

    async fn fetch_page(&self, source_id: &str, page: u32, first: bool) -> Result<PageOutcome> {
        let response = self
            .client
            .get(self.page_url(source_id, page))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let (status, body) = read_body(response).await?;

        if status != StatusCode::OK.as_u16() {
            // Page 1 must exist; 404 anywhere else marks the end of the feed
            if !first && status == StatusCode::NOT_FOUND.as_u16() {
                return Ok(PageOutcome::End);
            }
            return Err(Error::unexpected(
                format!("feed page {} of {}", page, source_id),
                status,
                body,
            ));
        }

        let page: FeedPage = decode_json("feed page", &body)?;
        self.convert(source_id, page).map(PageOutcome::Posts)
    }

    fn convert(&self, source_id: &str, page: FeedPage) -> Result<Vec<Post>> {
        page.data
            .into_iter()
            .map(|item| -> Result<Post> {
                let author = item.author_or(source_id);
                let tags = item.tag_entities.into_iter().map(|t| t.text).collect();
                let media = item
                    .media_entities
                    .into_iter()
                    .map(|raw| {
                        raw.classify().map(|entity| {
                            MediaReference::new(entity.kind, self.proxied_url(&entity.url))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Post::new(
                    author,
                    source_id,
                    item.text.unwrap_or_default(),
                    tags,
                    media,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl PostSource for FeedFetcher {
    async fn fetch(&mut self, source_id: &str, range: PageRange) -> Result<Vec<Post>> {
        FeedFetcher::fetch(self, source_id, range).await
    }
}
