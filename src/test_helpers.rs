//! Shared test helpers for building feed payloads and mounting mock endpoints.

use crate::source::FeedFetcher;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Feed item JSON with optional embedded user, tags and media entities
pub(crate) fn feed_item(text: &str, user: Option<&str>, tags: &[&str], media: Vec<Value>) -> Value {
    let mut item = json!({ "text": text });
    if let Some(name) = user {
        item["user"] = json!({ "name": name });
    }
    if !tags.is_empty() {
        item["tagEntities"] = Value::Array(tags.iter().map(|t| json!({ "text": t })).collect());
    }
    if !media.is_empty() {
        item["mediaEntities"] = Value::Array(media);
    }
    item
}

/// Image media entity
pub(crate) fn image_entity(url: &str) -> Value {
    json!({ "mediaURL": url })
}

/// Video media entity with a single variant
pub(crate) fn video_entity(url: &str) -> Value {
    json!({ "videoInfo": { "variants": [ { "url": url, "bitrate": 832000 } ] } })
}

/// Feed page JSON wrapping `items`
pub(crate) fn feed_page(items: Vec<Value>) -> Value {
    json!({ "data": items })
}

/// Mount a response for one page of `source_id`'s feed
pub(crate) async fn mount_feed_page(
    server: &MockServer,
    source_id: &str,
    page: u32,
    response: ResponseTemplate,
) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/user/{}/", source_id)))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Fetcher pointed at `server` for both the feed and the download proxy
pub(crate) fn fetcher_for(server: &MockServer) -> FeedFetcher {
    FeedFetcher::new(
        reqwest::Client::new(),
        server.uri(),
        server.uri(),
        "feed-relay-tests",
    )
}

/// Number of requests `server` received for a given page of `source_id`
pub(crate) async fn page_requests(server: &MockServer, source_id: &str, page: u32) -> usize {
    let wanted_path = format!("/v2/user/{}/", source_id);
    let wanted_page = page.to_string();
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| {
            r.url.path() == wanted_path
                && r.url
                    .query_pairs()
                    .any(|(k, v)| k == "page" && v == wanted_page.as_str())
        })
        .count()
}
