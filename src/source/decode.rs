//! Wire shapes of the source feed
//!
//! A page looks like `{"data": [item, ...]}`. Items carry optional `user`, `tagEntities`
//! and `mediaEntities` members. Media entities come in two shapes (video with variants,
//! image with a direct URL); anything else is rejected at this boundary.

use crate::error::{Error, Result};
use crate::types::MediaKind;
use serde::Deserialize;

/// One page of the feed
#[derive(Debug, Deserialize)]
pub(crate) struct FeedPage {
    pub(crate) data: Vec<FeedItem>,
}

/// One raw post record
#[derive(Debug, Deserialize)]
pub(crate) struct FeedItem {
    #[serde(default)]
    pub(crate) user: Option<FeedUser>,
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(rename = "tagEntities", default)]
    pub(crate) tag_entities: Vec<TagEntity>,
    #[serde(rename = "mediaEntities", default)]
    pub(crate) media_entities: Vec<RawMediaEntity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedUser {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagEntity {
    pub(crate) text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMediaEntity {
    #[serde(rename = "videoInfo", default)]
    video_info: Option<VideoInfo>,
    #[serde(rename = "mediaURL", default)]
    media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    variants: Vec<VideoVariant>,
}

#[derive(Debug, Deserialize)]
struct VideoVariant {
    url: String,
    #[serde(default)]
    bitrate: Option<u64>,
}

/// A media entity after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaEntity {
    pub(crate) kind: MediaKind,
    pub(crate) url: String,
}

impl RawMediaEntity {
    /// Classify the entity as video or image
    ///
    /// Video wins when both members are present. For video, the highest-bitrate variant
    /// is chosen; variants without a bitrate (playlists) are only used when none has one.
    pub(crate) fn classify(self) -> Result<MediaEntity> {
        if let Some(info) = self.video_info {
            let best = info
                .variants
                .iter()
                .filter(|v| v.bitrate.is_some())
                .max_by_key(|v| v.bitrate)
                .or_else(|| info.variants.first())
                .ok_or_else(|| Error::Unreachable("video entity without variants".into()))?;
            return Ok(MediaEntity {
                kind: MediaKind::Video,
                url: best.url.clone(),
            });
        }
        if let Some(url) = self.media_url {
            return Ok(MediaEntity {
                kind: MediaKind::Image,
                url,
            });
        }
        Err(Error::Unreachable(
            "media entity carries neither videoInfo nor mediaURL".into(),
        ))
    }
}

impl FeedItem {
    /// Author display name, falling back to the account id being fetched
    pub(crate) fn author_or(&self, source_id: &str) -> String {
        self.user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| source_id.to_string())
    }
}
