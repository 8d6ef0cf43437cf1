//! Core types for feed-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a remote media asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image, staged as `.jpg`
    Image,
    /// Video, staged as `.mp4`
    Video,
    /// Text attachment, staged without an extension
    Text,
}

impl MediaKind {
    /// File extension used when staging media of this kind (empty for none)
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Text => "",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Text => "Text",
        };
        f.write_str(name)
    }
}

/// Pointer to one remote media asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    kind: MediaKind,
    remote_url: String,
}

impl MediaReference {
    /// Create a media reference
    pub fn new(kind: MediaKind, remote_url: impl Into<String>) -> Self {
        Self {
            kind,
            remote_url: remote_url.into(),
        }
    }

    /// Kind of the asset
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// URL the asset is downloaded from
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }
}

/// One item from the source feed
///
/// Built once from a source record and read-only afterwards. `media` keeps the source
/// order: the first entry becomes the featured media on the destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    author: String,
    author_id: String,
    body: String,
    tags: Vec<String>,
    media: Vec<MediaReference>,
}

impl Post {
    /// Create a post
    pub fn new(
        author: impl Into<String>,
        author_id: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
        media: Vec<MediaReference>,
    ) -> Self {
        Self {
            author: author.into(),
            author_id: author_id.into(),
            body: body.into(),
            tags,
            media,
        }
    }

    /// Display name of the author
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Source account id the post was fetched under
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Post text
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Tag texts, in source order
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Attached media, in source order
    pub fn media(&self) -> &[MediaReference] {
        &self.media
    }

    /// Whether the post carries any media
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User: {}", self.author)?;
        if !self.body.is_empty() {
            writeln!(f, "Text: \n{}", self.body)?;
        }
        if !self.tags.is_empty() {
            writeln!(f, "Tags: \n{}", self.tags.join(" | "))?;
        }
        if !self.media.is_empty() {
            writeln!(f, "Url: ")?;
            for media in &self.media {
                writeln!(f, "{}  |  {}", media.kind, media.remote_url)?;
            }
        }
        Ok(())
    }
}

/// Range of feed pages to fetch: `start` inclusive, `end` exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: Option<u32>,
}

impl PageRange {
    /// Create a validated page range
    ///
    /// Pages are numbered from 1. A bounded range must contain at least one page.
    pub fn new(start: u32, end: Option<u32>) -> Result<Self> {
        if start < 1 {
            return Err(Error::Precondition(format!(
                "page range must start at 1 or later (got {})",
                start
            )));
        }
        if let Some(end) = end {
            if end <= start {
                return Err(Error::Precondition(format!(
                    "page range end {} must be greater than start {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Range starting at `start` with no upper bound
    pub fn from_page(start: u32) -> Result<Self> {
        Self::new(start, None)
    }

    /// First page to request
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Page at which fetching stops (exclusive), if bounded
    pub fn end(&self) -> Option<u32> {
        self.end
    }

    /// Whether `page` lies past the end of a bounded range
    pub fn is_past_end(&self, page: u32) -> bool {
        self.end.is_some_and(|end| page >= end)
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

/// Counts reported by a completed pipeline run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of source ids fully fetched
    pub ids_fetched: usize,
    /// Number of posts collected from the source
    pub posts_fetched: usize,
    /// Number of posts published to the destination
    pub posts_published: usize,
}

/// Which unit of work an event or failure refers to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    /// Fetching every page of one source id
    Fetch {
        /// Position of the id in the configured list
        index: usize,
        /// The source id
        source_id: String,
    },
    /// Publishing one buffered post
    Publish {
        /// Position of the post in the buffer
        index: usize,
    },
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Fetch { index, source_id } => write!(f, "fetch #{} ({})", index, source_id),
            WorkItem::Publish { index } => write!(f, "publish #{}", index),
        }
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// All pages of a source id were fetched
    Fetched {
        /// The source id
        source_id: String,
        /// Number of posts the id produced
        posts: usize,
        /// Number of ids completed so far
        completed: usize,
        /// Total number of ids
        total: usize,
    },

    /// A post was published
    Published {
        /// Position of the post in the buffer
        index: usize,
        /// Number of posts completed so far
        completed: usize,
        /// Total number of buffered posts
        total: usize,
    },

    /// An item failed and will be retried
    Retrying {
        /// The failed item
        item: WorkItem,
        /// Retry number for this item (1 = first retry)
        attempt: u32,
        /// Error message
        error: String,
        /// Delay before the retry, in milliseconds
        delay_ms: u64,
    },

    /// An item failed and the run stopped
    Aborted {
        /// The failed item
        item: WorkItem,
        /// Error message
        error: String,
    },

    /// Every id was fetched and every post published
    Finished {
        /// Final counts
        summary: RunSummary,
    },
}
