//! Republishing one post on the destination

use super::responses::{ErrorEnvelope, UploadedMedia};
use super::tags::TagResolver;
use super::{DestinationClient, MEDIA_ROUTE, POSTS_ROUTE};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::read_body;
use crate::pipeline::PostSink;
use crate::staging::{MediaStager, StagingArea};
use crate::types::{MediaKind, Post};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use tracing::{debug, info, warn};

/// What a successful publish produced on the destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Id of the created post, when the destination reported one
    pub post_id: Option<i64>,
    /// Uploaded media ids, in post order
    pub media_ids: Vec<i64>,
    /// Featured media id (the first upload)
    pub featured_media: Option<i64>,
    /// Tag ids attached to the post
    pub tag_ids: Vec<i64>,
}

/// Publishes posts to the destination
///
/// A publish is all-or-nothing from the caller's point of view: any failure aborts the
/// whole call, and the caller retries the whole post. The staging area is always purged
/// before `publish` returns.
#[derive(Debug)]
pub struct Publisher {
    api: DestinationClient,
    stager: MediaStager,
    tags: TagResolver,
    delete_orphaned_media: bool,
}

impl Publisher {
    /// Create a publisher
    pub fn new(api: DestinationClient, stager: MediaStager) -> Self {
        Self {
            tags: TagResolver::new(api.clone()),
            api,
            stager,
            delete_orphaned_media: true,
        }
    }

    /// Create a publisher from the run configuration
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self> {
        let api = DestinationClient::from_config(client.clone(), &config.destination);
        let stager = MediaStager::new(client, config.staging_root()?);
        Ok(Self::new(api, stager).with_orphan_cleanup(config.destination.delete_orphaned_media))
    }

    /// Choose whether media uploaded by a failed attempt are deleted again
    pub fn with_orphan_cleanup(mut self, enabled: bool) -> Self {
        self.delete_orphaned_media = enabled;
        self
    }

    /// The tag resolver, with its cache
    pub fn tags(&self) -> &TagResolver {
        &self.tags
    }

    /// The media stager
    pub fn stager(&self) -> &MediaStager {
        &self.stager
    }

    /// Stage, upload and publish `post`
    pub async fn publish(&mut self, post: &Post) -> Result<PublishReceipt> {
        let mut uploaded = Vec::new();
        match self.publish_attempt(post, &mut uploaded).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                if self.delete_orphaned_media && !uploaded.is_empty() {
                    self.delete_orphans(&uploaded).await;
                }
                Err(e)
            }
        }
    }

    async fn publish_attempt(
        &mut self,
        post: &Post,
        uploaded: &mut Vec<UploadedMedia>,
    ) -> Result<PublishReceipt> {
        if post.has_media() {
            let area = self.stager.open_area().await?;
            match self.stage_and_upload(&area, post, uploaded).await {
                Ok(()) => self.stager.purge(&area).await?,
                Err(e) => {
                    if let Err(purge_err) = self.stager.purge(&area).await {
                        warn!(dir = ?area.path(), error = %purge_err, "failed to purge staging area");
                    }
                    return Err(e);
                }
            }
        }

        info!("Uploading");
        let tag_ids = self.resolve_tags(post).await?;
        let featured_media = uploaded.first().map(|m| m.id);

        let mut form = Form::new()
            .text("title", format!("{}-{}", post.author(), timestamp_millis()))
            .text("content", compose_content(post.body(), uploaded))
            .text("status", "publish")
            .text("tags", join_ids(&tag_ids));
        if let Some(id) = featured_media {
            form = form.text("featured_media", id.to_string());
        }

        let response = self.api.post_form(POSTS_ROUTE, form).send().await?;
        let (status, body) = read_body(response).await?;
        if ErrorEnvelope::detect(&body).is_some() || !(200..300).contains(&status) {
            return Err(Error::unexpected("create post", status, body));
        }

        let post_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_i64()));
        debug!(?post_id, ?featured_media, "post created");

        Ok(PublishReceipt {
            post_id,
            media_ids: uploaded.iter().map(|m| m.id).collect(),
            featured_media,
            tag_ids,
        })
    }

    async fn stage_and_upload(
        &self,
        area: &StagingArea,
        post: &Post,
        uploaded: &mut Vec<UploadedMedia>,
    ) -> Result<()> {
        let paths = self.stager.stage(area, post).await?;
        for (path, media) in paths.iter().zip(post.media()) {
            let item = self.upload(area, path, media.kind()).await?;
            debug!(id = item.id, ?path, "uploaded media");
            uploaded.push(item);
        }
        Ok(())
    }

    async fn upload(&self, area: &StagingArea, path: &Path, kind: MediaKind) -> Result<UploadedMedia> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Precondition(format!("staged path has no file name: {:?}", path)))?
            .to_string();
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();

        let part = Part::stream_with_length(file, length)
            .file_name(file_name.clone())
            .mime_str(mime_type(kind))?;
        let form = Form::new()
            .text("title", format!("{}-{}", area.timestamp(), file_name))
            .part("file", part);

        let response = self
            .api
            .post_form(MEDIA_ROUTE, form)
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment;filename={}", file_name),
            )
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        UploadedMedia::decode(status, &body)
    }

    async fn resolve_tags(&mut self, post: &Post) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(post.tags().len() + 1);
        let texts = post
            .tags()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(post.author_id()));
        for text in texts {
            let id = self.tags.resolve(text).await?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn delete_orphans(&self, uploaded: &[UploadedMedia]) {
        for media in uploaded {
            let result = self
                .api
                .request(Method::DELETE, &format!("{}/{}", MEDIA_ROUTE, media.id))
                .query(&[("force", "true")])
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(id = media.id, "deleted orphaned media");
                }
                Ok(response) => {
                    warn!(id = media.id, status = response.status().as_u16(), "failed to delete orphaned media");
                }
                Err(e) => {
                    warn!(id = media.id, error = %e, "failed to delete orphaned media");
                }
            }
        }
    }
}

#[async_trait]
impl PostSink for Publisher {
    async fn publish(&mut self, post: &Post) -> Result<()> {
        Publisher::publish(self, post).await.map(|_| ())
    }
}

/// Post body: original text followed by the uploaded media embeds
fn compose_content(body: &str, uploaded: &[UploadedMedia]) -> String {
    if uploaded.is_empty() {
        return body.to_string();
    }
    let embeds: Vec<&str> = uploaded.iter().map(|m| m.description.as_str()).collect();
    format!("{}\n{}", body, embeds.join("\n"))
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn mime_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image/jpeg",
        MediaKind::Video => "video/mp4",
        MediaKind::Text => "application/octet-stream",
    }
}

fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
