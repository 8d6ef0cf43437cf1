//! Publishing to the destination content-management API
//!
//! The destination is a WordPress-style REST API reached through `?rest_route=` URLs
//! with HTTP Basic credentials. [`TagResolver`] maps tag texts to destination ids and
//! [`Publisher`] turns a [`Post`](crate::types::Post) into uploaded media plus a
//! published post.

mod publisher;
mod responses;
mod tags;


pub use publisher::{PublishReceipt, Publisher};
pub use responses::{ErrorData, ErrorEnvelope, TagCreation, UploadedMedia};
pub use tags::TagResolver;

use crate::config::DestinationConfig;
use reqwest::{Method, RequestBuilder};

/// Route for tag creation
pub const TAGS_ROUTE: &str = "/wp/v2/tags";
/// Route for media uploads
pub const MEDIA_ROUTE: &str = "/wp/v2/media";
/// Route for post creation
pub const POSTS_ROUTE: &str = "/wp/v2/posts";

/// Authenticated access to the destination API
#[derive(Clone)]
pub struct DestinationClient {
    client: reqwest::Client,
    server: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for DestinationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationClient")
            .field("server", &self.server)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl DestinationClient {
    /// Create a client for `server` authenticating as `username`
    pub fn new(
        client: reqwest::Client,
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            server: server.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a client from the `[destination]` config section
    pub fn from_config(client: reqwest::Client, config: &DestinationConfig) -> Self {
        Self::new(
            client,
            config.server.clone(),
            config.username.clone(),
            config.password.clone(),
        )
    }

    /// URL of a REST route
    pub fn route_url(&self, route: &str) -> String {
        format!("{}/?rest_route={}", self.server.trim_end_matches('/'), route)
    }

    /// Start an authenticated request to `route`
    pub(crate) fn request(&self, method: Method, route: &str) -> RequestBuilder {
        self.client
            .request(method, self.route_url(route))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Start an authenticated multipart POST to `route`
    pub(crate) fn post_form(&self, route: &str, form: reqwest::multipart::Form) -> RequestBuilder {
        self.request(Method::POST, route).multipart(form)
    }
}
