//! Integration tests for the emotion analysis routes, driven through the
//! axum router with the mock backend — no socket, no model files.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::util::ServiceExt;

use palitra_bot::emotion::service::backend::{build, EmotionBackend};
use palitra_bot::emotion::service::router;
use palitra_bot::emotion::Emotion;
use palitra_bot::config::EmotionApiConfig;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn mock_backend() -> Arc<EmotionBackend> {
    let config = EmotionApiConfig {
        bind: "127.0.0.1:0".into(),
        backend: "mock".into(),
        detector_model: "models/face-detector.onnx".into(),
        classifier_model: "models/emotion-ferplus.onnx".into(),
    };
    Arc::new(build(&config).expect("mock backend builds without model files"))
}

/// Hand-built multipart body with a single field.
fn multipart_body(field_name: &str, content_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"photo.jpg\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_request(field_name: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze_emotion")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field_name, content_type, payload)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn root_reports_healthy() {
    let app = router(mock_backend());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn health_reports_model_loaded() {
    let app = router(mock_backend());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["backend"], "mock");
}

#[tokio::test]
async fn analyze_returns_full_score_map() {
    let app = router(mock_backend());
    let response = app
        .oneshot(analyze_request("file", "image/jpeg", b"fake image bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");

    // The dominant label is one of the seven and its confidence matches the map.
    let dominant = json["dominant_emotion"].as_str().unwrap();
    assert!(dominant.parse::<Emotion>().is_ok());
    let confidence = json["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert_eq!(json["emotions"][dominant].as_f64().unwrap(), confidence);

    // All labels present, probabilities normalized.
    let emotions = json["emotions"].as_object().unwrap();
    assert_eq!(emotions.len(), Emotion::ALL.len());
    let total: f64 = emotions.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn analyze_rejects_non_image_upload() {
    let app = router(mock_backend());
    let response = app
        .oneshot(analyze_request("file", "text/plain", b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "File must be an image");
}

#[tokio::test]
async fn analyze_rejects_empty_file() {
    let app = router(mock_backend());
    let response = app
        .oneshot(analyze_request("file", "image/png", b""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Empty image file");
}

#[tokio::test]
async fn analyze_requires_file_field() {
    let app = router(mock_backend());
    let response = app
        .oneshot(analyze_request("attachment", "image/png", b"bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = router(mock_backend());
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
