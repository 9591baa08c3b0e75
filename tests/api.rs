//! HTTP-level tests for paths that are answered before any query reaches PostgreSQL:
//! routing, method checks, list parameter parsing, request validation and uploads.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use image::ImageFormat;
use medcms::service::LocalStore;
use medcms::{app, cms_catalog, resolve, AppState, Settings};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "medcms-test-boundary";

fn state_with(uploads: &TempDir, extra: &[(&str, &str)]) -> AppState {
    let mut env: HashMap<String, String> = extra.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    env.insert("MEDCMS_UPLOAD_DIR".into(), uploads.path().display().to_string());
    let settings = Settings::from_lookup(|k| env.get(k).cloned()).expect("settings");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy(&settings.database_url)
        .expect("lazy pool");
    let catalog = resolve(&cms_catalog(), &settings.schema).expect("catalog");
    let store = Arc::new(LocalStore::new(uploads.path()));
    AppState::new(pool, catalog, settings, store)
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
    let res = app(state).oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn multipart(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .expect("request")
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

#[tokio::test]
async fn health_is_ok() {
    let dir = TempDir::new().expect("tempdir");
    let (status, body) = send(state_with(&dir, &[]), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn route_table_lists_named_routes() {
    let dir = TempDir::new().expect("tempdir");
    let (status, body) = send(state_with(&dir, &[]), get("/api/v1/routes")).await;
    assert_eq!(status, StatusCode::OK);
    let routes = body["data"].as_array().expect("array");
    let check = routes.iter().find(|r| r["name"] == "tags.check").expect("tags.check");
    assert_eq!(check["method"], "GET");
    assert_eq!(check["uri"], "/api/v1/tags/check");
    assert!(routes.iter().any(|r| r["name"] == "episodes.upload"));
}

#[tokio::test]
async fn unknown_segment_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let (status, body) = send(state_with(&dir, &[]), get("/api/v1/widgets")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn read_only_entity_rejects_writes() {
    let dir = TempDir::new().expect("tempdir");
    let req = json_request(Method::POST, "/api/v1/page-views", json!({ "viewable_type": "post" }));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "method_not_allowed");
}

#[tokio::test]
async fn list_rejects_unsortable_column_and_bad_direction() {
    let dir = TempDir::new().expect("tempdir");
    let (status, body) = send(state_with(&dir, &[]), get("/api/v1/posts?sort=content")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(state_with(&dir, &[]), get("/api/v1/posts?direction=sideways")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_reports_every_missing_required_field() {
    let dir = TempDir::new().expect("tempdir");
    let req = json_request(Method::POST, "/api/v1/posts", json!({ "views": 100 }));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let details = &body["error"]["details"];
    assert_eq!(details["title"], "title is required");
    assert_eq!(details["content"], "content is required");
    assert!(details.get("views").is_none());
}

#[tokio::test]
async fn create_rejects_malformed_contact_fields() {
    let dir = TempDir::new().expect("tempdir");
    let req = json_request(
        Method::POST,
        "/api/v1/conferences",
        json!({
            "title": "Cardiology Summit",
            "start_date": "2026-13-40",
            "contact_email": "not-an-email",
            "contact_phone": "12345",
        }),
    );
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let details = body["error"]["details"].as_object().expect("details");
    assert!(details.contains_key("start_date"));
    assert!(details.contains_key("contact_email"));
    assert!(details.contains_key("contact_phone"));
    assert!(!details.contains_key("title"));
}

#[tokio::test]
async fn status_change_requires_a_known_value() {
    let dir = TempDir::new().expect("tempdir");
    let req = json_request(Method::PATCH, "/api/v1/posts/1/status", json!({ "status": "archived-forever" }));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let msg = body["error"]["details"]["status"].as_str().expect("message");
    assert!(msg.starts_with("status must be one of:"), "{}", msg);
}

#[tokio::test]
async fn check_requires_field() {
    let dir = TempDir::new().expect("tempdir");
    let (status, _) = send(state_with(&dir, &[]), get("/api/v1/tags/check?value=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(state_with(&dir, &[]), get("/api/v1/tags/check?field=color&value=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_non_images() {
    let dir = TempDir::new().expect("tempdir");
    let req = multipart("/api/v1/uploads/episodes/thumbnail", "notes.txt", b"plain text, not pixels");
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["file"], "file must be an image");
}

#[tokio::test]
async fn upload_enforces_exact_dimensions() {
    let dir = TempDir::new().expect("tempdir");
    let req = multipart("/api/v1/uploads/episodes/thumbnail", "thumb.png", &png(640, 360));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let msg = body["error"]["details"]["file"].as_str().expect("message");
    assert!(msg.contains("1280x720"), "{}", msg);
}

#[tokio::test]
async fn upload_stores_valid_image() {
    let dir = TempDir::new().expect("tempdir");
    let req = multipart("/api/v1/uploads/episodes/thumbnail", "thumb.png", &png(1280, 720));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["width"], 1280);
    assert_eq!(data["height"], 720);
    let path = data["path"].as_str().expect("path");
    assert!(path.starts_with("episodes/thumbnail/") && path.ends_with(".png"), "{}", path);
    assert_eq!(data["url"], format!("/storage/uploads/{}", path));
    assert!(dir.path().join(path).is_file());
}

#[tokio::test]
async fn upload_to_field_without_image_rule_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let req = multipart("/api/v1/uploads/episodes/title", "thumb.png", &png(8, 8));
    let (status, _) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_with(&dir, &[("MEDCMS_MAX_UPLOAD_BYTES", "256")]);
    let body = json!({ "title": "x".repeat(1024), "content": "y" }).to_string();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/posts")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .expect("request");
    let (status, _) = send(state, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_json_uses_error_envelope() {
    let dir = TempDir::new().expect("tempdir");
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/posts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .expect("request");
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let req = json_request(Method::PATCH, "/api/v1/posts/1/status", json!({ "status": 5 }));
    let (status, body) = send(state_with(&dir, &[]), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
