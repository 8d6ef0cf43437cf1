//! Response shapes of the destination REST API
//!
//! The destination answers either with the requested resource or with an error envelope
//! `{"code": "...", "message": "...", "data": {...}}`. Each call decodes its body once
//! here into a tagged union; callers never poke at raw JSON.

use crate::error::{Error, Result};
use crate::http::decode_json;
use serde::Deserialize;

/// Error envelope returned by the destination
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Machine-readable error code (e.g., "term_exists")
    pub code: String,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Extra data attached to the error
    #[serde(default)]
    pub data: Option<ErrorData>,
}

/// Extra data attached to an error envelope
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorData {
    /// HTTP status the destination meant to report
    #[serde(default)]
    pub status: Option<u16>,
    /// Id of an existing term, present when a tag already exists
    #[serde(default)]
    pub term_id: Option<i64>,
}

impl ErrorEnvelope {
    /// Detect an error envelope in an arbitrary body
    ///
    /// Only JSON objects with a top-level string `code` qualify.
    pub fn detect(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        if !value.get("code").is_some_and(|c| c.is_string()) {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTagResponse {
    Error(ErrorEnvelope),
    Created { id: i64 },
}

/// Outcome of a tag-creation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCreation {
    /// A new tag was created
    Created(i64),
    /// The tag existed already; the destination reported its id
    AlreadyExists(i64),
}

impl TagCreation {
    /// Tag id, whether new or existing
    pub fn id(&self) -> i64 {
        match self {
            TagCreation::Created(id) | TagCreation::AlreadyExists(id) => *id,
        }
    }

    /// Decode a tag-creation response
    pub fn decode(status: u16, body: &str) -> Result<Self> {
        match decode_json::<RawTagResponse>("tag creation response", body)? {
            RawTagResponse::Created { id } => Ok(TagCreation::Created(id)),
            RawTagResponse::Error(ErrorEnvelope {
                data: Some(ErrorData {
                    term_id: Some(id), ..
                }),
                ..
            }) => Ok(TagCreation::AlreadyExists(id)),
            RawTagResponse::Error(_) => Err(Error::unexpected("tag creation", status, body)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Rendered {
    rendered: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMediaResponse {
    Error(ErrorEnvelope),
    Uploaded { id: i64, description: Rendered },
}

/// A media item accepted by the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Destination media id
    pub id: i64,
    /// Rendered description; holds the destination-hosted embed for the media
    pub description: String,
}

impl UploadedMedia {
    /// Decode a media-upload response
    pub fn decode(status: u16, body: &str) -> Result<Self> {
        match decode_json::<RawMediaResponse>("media upload response", body)? {
            RawMediaResponse::Uploaded { id, description } => Ok(UploadedMedia {
                id,
                description: description.rendered,
            }),
            RawMediaResponse::Error(envelope) => Err(Error::unexpected(
                format!("media upload ({})", envelope.code),
                status,
                body,
            )),
        }
    }
}
