//! Web front-end for the recognition pipeline.
//!
//! Serves a single page where a user picks an image, previews it, runs
//! recognition and watches progress. One pipeline and one selected image
//! are shared by every client.

mod handlers;
mod routes;
mod templates;

pub use routes::create_router;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::payload::ImagePayload;
use crate::pipeline::RecognitionPipeline;
use crate::upload::UploadPolicy;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RecognitionPipeline>,
    pub policy: Arc<UploadPolicy>,
    /// Currently selected image (replaced on every upload).
    pub image: Arc<RwLock<Option<ImagePayload>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<RecognitionPipeline>, policy: UploadPolicy) -> Self {
        Self {
            pipeline,
            policy: Arc::new(policy),
            image: Arc::new(RwLock::new(None)),
        }
    }
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let pipeline = Arc::new(RecognitionPipeline::from_config(config)?);
    let state = AppState::new(pipeline.clone(), UploadPolicy::from_config(&config.upload));

    if config.ocr.eager_init {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.ensure_ready().await {
                tracing::warn!("Eager OCR engine start failed: {}", e);
            }
        });
    }

    let app = create_router(state);

    let listener = bind_listener(host, port).await?;
    tracing::info!(
        "Starting server at http://{} ({} backend)",
        listener.local_addr()?,
        pipeline.backend().backend_type()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    pipeline.teardown().await;
    Ok(())
}

/// Bind to a host name or IP address (IPv6 with or without brackets).
async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}:{}: {}", host, port, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::ocr::testing::ScriptedBackend;
    use crate::ocr::EngineOptions;

    fn setup_test_app() -> (axum::Router, AppState, ScriptedBackend) {
        let backend = ScriptedBackend::new();
        let pipeline = RecognitionPipeline::new(Arc::new(backend.clone()), EngineOptions::default());
        let state = AppState::new(Arc::new(pipeline), UploadPolicy::default());
        (create_router(state.clone()), state, backend)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn put_image(mime: &str, body: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/api/image")
            .header(header::CONTENT_TYPE, mime)
            .body(Body::from(body))
            .unwrap()
    }

    fn post_recognize() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/recognize")
            .body(Body::empty())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _, _) = setup_test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_page() {
        let (app, _, _) = setup_test_app();
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Process Image"));
        assert!(html.contains("up to 5MB"));
    }

    #[tokio::test]
    async fn test_initial_status() {
        let (app, _, backend) = setup_test_app();
        let response = app.oneshot(get("/api/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["state"], "uninitialized");
        assert_eq!(json["progress"]["fraction"], 0.0);
        assert_eq!(json["progress"]["display_label"], "Idle");
        assert_eq!(json["text"], "");
        assert_eq!(json["has_image"], false);
        assert_eq!(backend.created(), 0);
    }

    #[tokio::test]
    async fn test_upload_preview_and_recognize() {
        let (app, state, backend) = setup_test_app();

        let response = app
            .clone()
            .oneshot(put_image("image/png", b"HELLO"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["mime"], "image/png");
        assert_eq!(json["size"], 5);

        let response = app.clone().oneshot(get("/api/image")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let response = app.clone().oneshot(post_recognize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["text"], "HELLO\n");

        let json = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["progress"]["fraction"], 1.0);
        assert_eq!(json["progress"]["label"], "Done");
        assert_eq!(json["text"], "HELLO\n");
        assert_eq!(json["has_image"], true);

        assert_eq!(backend.created(), 1);
        assert_eq!(state.pipeline.result_text(), "HELLO\n");
    }

    #[tokio::test]
    async fn test_preview_without_image() {
        let (app, _, _) = setup_test_app();
        let response = app.oneshot(get("/api/image")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recognize_without_image() {
        let (app, _, backend) = setup_test_app();
        let response = app.oneshot(post_recognize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.created(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (app, _, _) = setup_test_app();

        let response = app
            .clone()
            .oneshot(put_image("application/pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app
            .clone()
            .oneshot(put_image("image/png", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // GIF content behind a PNG label
        let response = app
            .oneshot(put_image("image/png", b"GIF89a\x01\x00\x01\x00"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let backend = ScriptedBackend::new();
        let pipeline = RecognitionPipeline::new(Arc::new(backend), EngineOptions::default());
        let policy = UploadPolicy::from_config(&crate::config::UploadConfig {
            max_bytes: 4,
            ..Default::default()
        });
        let app = create_router(AppState::new(Arc::new(pipeline), policy));

        let response = app.oneshot(put_image("image/png", b"HELLO")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_huge_upload_limit_does_not_overflow() {
        let backend = ScriptedBackend::new();
        let pipeline = RecognitionPipeline::new(Arc::new(backend), EngineOptions::default());
        let policy = UploadPolicy::from_config(&crate::config::UploadConfig {
            max_bytes: u64::MAX,
            ..Default::default()
        });
        let app = create_router(AppState::new(Arc::new(pipeline), policy));

        let response = app.oneshot(put_image("image/png", b"HELLO")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_listener_accepts_host_names() {
        let listener = bind_listener("localhost", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());

        let listener = bind_listener("127.0.0.1", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_recognition_error_keeps_text() {
        let (app, _, _) = setup_test_app();

        app.clone()
            .oneshot(put_image("image/png", b"HELLO"))
            .await
            .unwrap();
        app.clone().oneshot(post_recognize()).await.unwrap();

        app.clone()
            .oneshot(put_image("image/png", b"corrupt data"))
            .await
            .unwrap();
        let response = app.clone().oneshot(post_recognize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["text"], "HELLO\n");
        assert!(json["error"].as_str().unwrap().contains("corrupt image"));
    }

    #[tokio::test]
    async fn test_engine_init_failure() {
        let (app, _, backend) = setup_test_app();
        backend.fail_init(true);

        app.clone()
            .oneshot(put_image("image/png", b"HELLO"))
            .await
            .unwrap();
        let response = app.clone().oneshot(post_recognize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
        assert_eq!(json["state"], "uninitialized");
    }

    #[tokio::test]
    async fn test_overlapping_recognize_is_busy() {
        let (app, state, backend) = setup_test_app();
        backend.delay(Duration::from_millis(300));

        app.clone()
            .oneshot(put_image("image/png", b"HELLO"))
            .await
            .unwrap();

        let mut rx = state.pipeline.subscribe();
        let first = tokio::spawn(app.clone().oneshot(post_recognize()));
        rx.wait_for(|s| s.state == crate::pipeline::PipelineState::Busy)
            .await
            .unwrap();

        let response = app.clone().oneshot(post_recognize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = first.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.created(), 1);
    }
}
