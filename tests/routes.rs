use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use regen_console::{
    routes::{router, AppState},
    ConsoleConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_for(server: &MockServer) -> (Router, AppState) {
    let config = ConsoleConfig::for_backend(&server.uri()).unwrap();
    let state = AppState::new(config).unwrap();
    (router(state.clone()), state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn img1() -> Value {
    json!({"filename": "img1.png", "type": "image", "target": "images", "width": 1080, "height": 1080})
}

#[tokio::test]
async fn health_reports_ok() {
    let server = MockServer::start().await;
    let (app, _) = app_for(&server).await;
    let (status, body) = call(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn workflow_round_trip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/images/regenerate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let (app, state) = app_for(&server).await;

    let (status, opened) = call(&app, "POST", "/api/workflows", Some(img1())).await;
    assert_eq!(status, StatusCode::OK);
    let id = opened["id"].as_str().unwrap().to_string();
    assert_eq!(opened["view"]["outcome"], json!({"state": "idle"}));

    let (status, added) = call(&app, "POST", &format!("/api/workflows/{id}/overlays"), Some(json!({"text": "SALE", "position": "top", "font_size": 48}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["added"], true);

    let (_, blank) = call(&app, "POST", &format!("/api/workflows/{id}/overlays"), Some(json!({"text": "  "}))).await;
    assert_eq!(blank["added"], false);
    assert_eq!(blank["view"]["text_overlays"].as_array().unwrap().len(), 1);

    let (status, err) = call(&app, "POST", &format!("/api/workflows/{id}/overlays"), Some(json!({"text": "huge", "font_size": 300}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["detail"].as_str().unwrap().contains("300"));

    let (status, _) = call(&app, "POST", &format!("/api/workflows/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(&app, "PUT", &format!("/api/workflows/{id}/prompt"), Some(json!({"prompt": "studio lighting product shot"}))).await;
    let (status, view) = call(&app, "POST", &format!("/api/workflows/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["outcome"], json!({"state": "accepted", "delay_ms": 8000}));

    let (status, _) = call(&app, "POST", &format!("/api/workflows/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "DELETE", &format!("/api/workflows/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.workflows.read().is_empty());

    let (status, _) = call(&app, "GET", &format!("/api/workflows/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.verify().await;
}

#[tokio::test]
async fn invalid_target_is_rejected() {
    let server = MockServer::start().await;
    let (app, _) = app_for(&server).await;
    let mut target = img1();
    target["width"] = json!(0);

    let (status, body) = call(&app, "POST", "/api/workflows", Some(target)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "target dimensions must be positive, got 0x1080");
}

#[tokio::test]
async fn out_of_range_overlay_removal_is_harmless() {
    let server = MockServer::start().await;
    let (app, _) = app_for(&server).await;
    let (_, opened) = call(&app, "POST", "/api/workflows", Some(img1())).await;
    let id = opened["id"].as_str().unwrap();

    let (status, view) = call(&app, "DELETE", &format!("/api/workflows/{id}/overlays/7"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["text_overlays"], json!([]));
}

#[tokio::test]
async fn listing_is_refetched_on_every_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null, "message": "No images data found"})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/content/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"images_generated": [{"filename": "ig_1.png", "type": "story", "dimensions": "1080x1920"}]}
        })))
        .expect(2)
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, empty) = call(&app, "GET", "/api/listing/images", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!({"collection": "images", "data": null}));

    let (status, listing) = call(&app, "GET", "/api/listing/images", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["data"]["images_generated"][0]["filename"], "ig_1.png");

    let (status, targets) = call(&app, "GET", "/api/listing/images/targets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(targets, json!([{"filename": "ig_1.png", "type": "story", "target": "images", "width": 1080, "height": 1920}]));

    let (status, _) = call(&app, "GET", "/api/listing/videos", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.verify().await;
}

#[tokio::test]
async fn listing_falls_back_to_last_snapshot_when_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/carousels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"carousels": [{"slot_id": "S3", "slides": [{"slide_number": 1, "filename": "S3_1.png"}]}]}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/content/carousels"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "engine busy"})))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, first) = call(&app, "GET", "/api/listing/carousels", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = call(&app, "GET", "/api/listing/carousels", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);
}

#[tokio::test]
async fn listing_failure_without_snapshot_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/images"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, body) = call(&app, "GET", "/api/listing/images", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn seo_export_downloads_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/seo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"optimizations": [{"slot_id": "S1", "platform": "linkedin", "keywords": ["b2b"]}]}
        })))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let request = Request::builder().uri("/api/export/seo").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"seo_optimizations.csv\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(csv.lines().nth(1), Some("\"S1\",\"linkedin\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"b2b\""));
}

#[tokio::test]
async fn missing_script_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/scripts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"scripts": [{"slot_id": "S1"}]}})))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, _) = call(&app, "GET", "/api/export/scripts/S9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = download(&app, "/api/export/scripts/S1").await;
    assert_eq!(status, StatusCode::OK);
}

async fn download(app: &Router, uri: &str) -> (StatusCode, String, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, disposition, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn all_scripts_export_joins_every_script() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/scripts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"scripts": [
            {"slot_id": "S1", "platform": "instagram", "content_type": "reel", "language": "es", "hook": "Mira esto"},
            {"slot_id": "S2", "platform": "tiktok", "content_type": "short", "language": "en", "cta": "Follow"}
        ]}})))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, disposition, body) = download(&app, "/api/export/scripts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disposition, "attachment; filename=\"all_scripts.txt\"");
    assert_eq!(
        body,
        "═══ S1 - instagram reel (es) ═══\n\nHOOK: Mira esto\n\n\n\n═══ S2 - tiktok short (en) ═══\n\nCTA: Follow\n\n"
    );
}

#[tokio::test]
async fn images_report_export_is_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"total_images": 1, "images_generated": [{"filename": "ig_1.png", "dimensions": "1080x1350"}]}
        })))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, disposition, body) = download(&app, "/api/export/images").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disposition, "attachment; filename=\"images_report.json\"");
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["total_images"], 1);
    assert_eq!(report["images_generated"][0]["filename"], "ig_1.png");
}

#[tokio::test]
async fn exports_without_content_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, _, _) = download(&app, "/api/export/images").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_library_is_listed_with_size_labels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "templates": [{"name": "story_bg.png", "size": 20480, "type": "image/png", "url": "/api/templates/file/story_bg.png"}],
            "brand_assets": [{"name": "logo.svg", "size": 512}],
            "fonts": [{"name": "Inter-Bold.ttf", "size": 2097152}]
        })))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, library) = call(&app, "GET", "/api/templates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(library["templates"][0]["size_label"], "20.0 KB");
    assert_eq!(library["templates"][0]["type"], "image/png");
    assert_eq!(library["brand_assets"][0], json!({"name": "logo.svg", "size": 512, "size_label": "512 B"}));
    assert_eq!(library["fonts"][0]["size_label"], "2.0 MB");
}

fn multipart_body(boundary: &str, category: Option<&str>, files: &[(&str, &str)]) -> String {
    let mut body = String::new();
    if let Some(category) = category {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\n{category}\r\n"
        ));
    }
    for (name, content) in files {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

async fn post_multipart(app: &Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/templates/upload")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn template_upload_runs_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/templates/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "uploaded"})))
        .expect(1)
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let body = multipart_body("XBOUNDARY", Some("logo"), &[("brand.svg", "<svg/>"), ("notes.txt", "hello")]);
    let (status, report) = post_multipart(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({"succeeded": 1, "failed": 1, "summary": "1 succeeded, 1 failed"}));

    let (status, err) = post_multipart(&app, multipart_body("XBOUNDARY", None, &[("brand.svg", "<svg/>")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["detail"], "missing category field");
    server.verify().await;
}

#[tokio::test]
async fn template_delete_requires_a_category() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/templates/old_logo.png"))
        .and(query_param("category", "logo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;
    let (app, _) = app_for(&server).await;

    let (status, _) = call(&app, "DELETE", "/api/templates/old_logo.png?category=logo", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, err) = call(&app, "DELETE", "/api/templates/old_logo.png", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["detail"], "missing category query parameter");

    let (status, _) = call(&app, "DELETE", "/api/templates/old_logo.png?category=banner", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.verify().await;
}
