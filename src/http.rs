//! Shared HTTP plumbing
//!
//! One [`reqwest::Client`] is built per run and cloned into every component (clones share
//! the connection pool). Helpers here read bodies and decode JSON so that every caller
//! reports status and raw body the same way on failure.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use std::time::Duration;

/// Build the HTTP client used for every request in a run
///
/// `timeout` of `None` lets requests block indefinitely.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| Error::Config {
        message: format!("failed to create HTTP client: {}", e),
        key: None,
    })
}

/// Build the HTTP client described by `config`
pub fn client_for(config: &Config) -> Result<reqwest::Client> {
    build_client(config.timeout)
}

/// Read a response into its status code and body text
pub(crate) async fn read_body(response: reqwest::Response) -> Result<(u16, String)> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}

/// Decode a JSON body into `T`
///
/// Bodies that are not JSON at all become [`Error::Decode`]. Well-formed JSON that does
/// not match any known shape becomes [`Error::Unreachable`], carrying the raw body.
pub(crate) fn decode_json<T: DeserializeOwned>(context: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| match e.classify() {
        Category::Data => Error::Unreachable(format!(
            "unrecognised {} ({}), body: {}",
            context, e, body
        )),
        _ => Error::decode(context, e),
    })
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Shape {
        id: i64,
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://a.example/", "/v2"), "https://a.example/v2");
        assert_eq!(join_url("https://a.example", "v2"), "https://a.example/v2");
    }

    #[test]
    fn decode_json_accepts_matching_shape() {
        let shape: Shape = decode_json("thing", r#"{"id": 7}"#).unwrap();
        assert_eq!(shape.id, 7);
    }

    #[test]
    fn decode_json_maps_wrong_shape_to_unreachable() {
        match decode_json::<Shape>("thing", r#"{"name": "x"}"#) {
            Err(Error::Unreachable(msg)) => {
                assert!(msg.contains("thing"));
                assert!(msg.contains(r#"{"name": "x"}"#));
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[test]
    fn decode_json_maps_garbage_to_decode_error() {
        assert!(matches!(
            decode_json::<Shape>("thing", "<html>502</html>"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn client_builds_with_and_without_timeout() {
        assert!(build_client(None).is_ok());
        assert!(build_client(Some(Duration::from_secs(5))).is_ok());
    }
}
