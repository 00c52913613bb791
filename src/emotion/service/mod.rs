//! Emotion analysis HTTP service.
//!
//! Wraps a classification backend behind three routes:
//!
//! ```text
//! GET  /                 — liveness
//! GET  /health           — backend self-test
//! POST /analyze_emotion  — multipart image upload → score map
//! ```
//!
//! Implements [`Component`] so the service binary drives it through the same
//! runtime as the bot's channels: `run()` serves until the shared
//! [`CancellationToken`] is cancelled, wired to axum's graceful shutdown.

pub mod backend;

mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::AppError;
use crate::runtime::{Component, ComponentFuture};

use backend::EmotionBackend;

/// Photos relayed from chat clients stay well under this.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ── State ─────────────────────────────────────────────────────────────────────

/// Axum router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub(crate) struct ServiceState {
    pub backend: Arc<EmotionBackend>,
}

// ── EmotionService ────────────────────────────────────────────────────────────

pub struct EmotionService {
    service_id: String,
    bind_addr: String,
    backend: Arc<EmotionBackend>,
}

impl EmotionService {
    pub fn new(
        service_id: impl Into<String>,
        bind_addr: impl Into<String>,
        backend: Arc<EmotionBackend>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            bind_addr: bind_addr.into(),
            backend,
        }
    }
}

impl Component for EmotionService {
    fn id(&self) -> &str {
        &self.service_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_service(self.service_id, self.bind_addr, self.backend, shutdown))
    }
}

async fn run_service(
    service_id: String,
    bind_addr: String,
    backend: Arc<EmotionBackend>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let app = router(backend);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Emotion(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%service_id, %bind_addr, "emotion service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Emotion(format!("server error: {e}")))?;

    info!(%service_id, "emotion service shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the service router. Public so integration tests can drive it with
/// `tower::ServiceExt::oneshot` without binding a socket.
pub fn router(backend: Arc<EmotionBackend>) -> Router {
    let state = ServiceState { backend };

    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/analyze_emotion", post(api::analyze_emotion))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
