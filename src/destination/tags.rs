//! Tag text to destination tag-id resolution

use super::responses::TagCreation;
use super::{DestinationClient, TAGS_ROUTE};
use crate::error::Result;
use crate::http::read_body;
use std::collections::HashMap;
use tracing::debug;

/// Memoizing resolver from tag text to destination tag id
///
/// Ids are cached for the lifetime of the resolver and never invalidated. Creating a tag
/// that already exists is safe: the destination reports the existing id.
#[derive(Debug)]
pub struct TagResolver {
    api: DestinationClient,
    cache: HashMap<String, i64>,
}

impl TagResolver {
    /// Create a resolver with an empty cache
    pub fn new(api: DestinationClient) -> Self {
        Self {
            api,
            cache: HashMap::new(),
        }
    }

    /// Cached id for `tag`, if resolved before
    pub fn cached(&self, tag: &str) -> Option<i64> {
        self.cache.get(tag).copied()
    }

    /// Number of cached tags
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Resolve `tag` to its destination id, creating the tag if needed
    pub async fn resolve(&mut self, tag: &str) -> Result<i64> {
        if let Some(id) = self.cached(tag) {
            return Ok(id);
        }

        let form = reqwest::multipart::Form::new().text("name", tag.to_string());
        let response = self.api.post_form(TAGS_ROUTE, form).send().await?;
        let (status, body) = read_body(response).await?;

        let outcome = TagCreation::decode(status, &body)?;
        match &outcome {
            TagCreation::Created(id) => debug!(tag, id, "created tag"),
            TagCreation::AlreadyExists(id) => debug!(tag, id, "tag already exists"),
        }

        let id = outcome.id();
        self.cache.insert(tag.to_string(), id);
        Ok(id)
    }
}
