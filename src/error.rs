//! Error types for feed-relay
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map onto the
//! failure classes the pipeline distinguishes when deciding whether to retry an item:
//! - transport failures ([`Error::Network`], [`Error::Io`])
//! - responses the caller did not expect ([`Error::UnexpectedResponse`], [`Error::Decode`])
//! - caller mistakes ([`Error::Precondition`], [`Error::Config`])
//! - response shapes the decoder has no case for ([`Error::Unreachable`])
//!
//! Retry classification lives in [`crate::retry`].

use thiserror::Error;

/// Result type alias for feed-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for feed-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "source.ids")
        key: Option<String>,
    },

    /// Network or transport failure reported by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (staging directory, media files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response arrived with a status or body the caller cannot accept
    #[error("unexpected response from {context}: status {status}, body: {body}")]
    UnexpectedResponse {
        /// Which call produced the response (e.g., "create post")
        context: String,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A response body could not be decoded as JSON of the expected shape
    #[error("failed to decode {context}: {source}")]
    Decode {
        /// Which call produced the body
        context: String,
        /// Underlying decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid caller-supplied input (page ranges, empty media lists)
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A response shape the decoder has no case for
    #[error("unreachable state: {0}")]
    Unreachable(String),

    /// The retry budget for a single item ran out
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first
        attempts: u32,
        /// The error returned by the final attempt
        #[source]
        source: Box<Error>,
    },

    /// The run was cancelled between items
    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create an unexpected-response error
    pub fn unexpected(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Error::UnexpectedResponse {
            context: context.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Decode {
            context: context.into(),
            source,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UnexpectedResponse { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            Error::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}
