//! Palitra emotion analysis service — HTTP process entry point.
//!
//! Runs the configured classification backend (`onnx` or `mock`) behind the
//! analysis routes until ctrl-c.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use palitra_bot::config;
use palitra_bot::emotion::service::{backend, EmotionService};
use palitra_bot::error::AppError;
use palitra_bot::logger;
use palitra_bot::runtime::{spawn_components, Component};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    let backend = backend::build(&config.emotion_api)
        .map_err(|e| AppError::Emotion(e.to_string()))?;

    info!(
        backend = backend.name(),
        bind = %config.emotion_api.bind,
        "starting emotion analysis service"
    );

    let service = EmotionService::new(
        "emotion-api0",
        config.emotion_api.bind.clone(),
        Arc::new(backend),
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received — shutting down");
                shutdown.cancel();
            }
        });
    }

    let components: Vec<Box<dyn Component>> = vec![Box::new(service)];
    spawn_components(components, shutdown).join().await
}
