//! Feed payloads and destination responses served by the mock server

use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Feed item posted by `user` with the given tags and media entities
pub fn feed_item(text: &str, user: Option<&str>, tags: &[&str], media: Vec<Value>) -> Value {
    let mut item = json!({
        "text": text,
        "tagEntities": tags.iter().map(|t| json!({ "text": t })).collect::<Vec<_>>(),
        "mediaEntities": media,
    });
    if let Some(name) = user {
        item["user"] = json!({ "name": name });
    }
    item
}

pub fn image_entity(url: &str) -> Value {
    json!({ "mediaURL": url })
}

pub fn video_entity(url: &str) -> Value {
    json!({
        "videoInfo": {
            "variants": [
                { "url": format!("{}?low", url), "bitrate": 256000 },
                { "url": url, "bitrate": 2176000 }
            ]
        }
    })
}

/// Serve `items` as page `page` of `source_id`'s feed
pub async fn mount_page(server: &MockServer, source_id: &str, page: u32, items: Vec<Value>) {
    mount_page_response(
        server,
        source_id,
        page,
        ResponseTemplate::new(200).set_body_json(json!({ "data": items })),
    )
    .await;
}

/// Answer page `page` of `source_id`'s feed with `response`
pub async fn mount_page_response(
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

/// Serve every proxied media download with fixed bytes
pub async fn mount_proxy(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"media-bytes".to_vec()))
        .mount(server)
        .await;
}

/// Answer tag creation for `name` with `id`
pub async fn mount_tag(server: &MockServer, name: &str, id: i64) {
    Mock::given(method("POST"))
        .and(query_param("rest_route", "/wp/v2/tags"))
        .and(body_string_contains(format!("\r\n\r\n{}\r\n", name)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": id, "name": name })))
        .mount(server)
        .await;
}

/// Accept every media upload as `id`
pub async fn mount_media_upload(server: &MockServer, id: i64) {
    Mock::given(method("POST"))
        .and(query_param("rest_route", "/wp/v2/media"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": id,
            "description": { "rendered": format!("<p><img src=\"https://blog.example/{}.jpg\"></p>", id) }
        })))
        .mount(server)
        .await;
}

/// Accept every post creation as `id`
pub async fn mount_post_creation(server: &MockServer, id: i64) {
    Mock::given(method("POST"))
        .and(query_param("rest_route", "/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": id })))
        .mount(server)
        .await;
}

/// Requests the server received whose `rest_route` is `route`
pub async fn route_requests(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.query_pairs().any(|(k, v)| k == "rest_route" && v == route))
        .collect()
}

/// Requests the server received for page `page` of `source_id`
pub async fn page_requests(server: &MockServer, source_id: &str, page: u32) -> usize {
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

/// Value of a text field in a multipart body
pub fn form_field(request: &Request, name: &str) -> Option<String> {
    let body = String::from_utf8_lossy(&request.body);
    let marker = format!("name=\"{}\"", name);
    let start = body.find(&marker)? + marker.len();
    let rest = &body[start..];
    let value_start = rest.find("\r\n\r\n")? + 4;
    let value = &rest[value_start..];
    let value_end = value.find("\r\n--")?;
    Some(value[..value_end].to_string())
}
