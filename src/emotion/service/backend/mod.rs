//! Classification backends for the emotion analysis service.
//!
//! `build(config)` is the factory — called at startup by the service binary.
//! Adding a backend = new module + new variant + new match arms.

pub mod mock;
#[cfg(feature = "backend-onnx")]
pub mod onnx;

use std::path::PathBuf;

use crate::config::EmotionApiConfig;
use crate::emotion::Analysis;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
    #[error("model file not found: {0} — place the ONNX models under models/")]
    ModelNotFound(PathBuf),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[cfg(feature = "backend-onnx")]
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

// ── Backend enum ──────────────────────────────────────────────────────────────

/// All available classification backends.
///
/// Enum dispatch avoids `dyn` trait objects; the async methods delegate to
/// the concrete backend.
#[derive(Debug)]
pub enum EmotionBackend {
    Mock(mock::MockBackend),
    #[cfg(feature = "backend-onnx")]
    Onnx(onnx::OnnxBackend),
}

impl EmotionBackend {
    /// Stable name used in logs and the health response.
    pub fn name(&self) -> &'static str {
        match self {
            EmotionBackend::Mock(_) => "mock",
            #[cfg(feature = "backend-onnx")]
            EmotionBackend::Onnx(_) => "onnx",
        }
    }

    /// Classify one encoded image.
    pub async fn analyze(&self, image: Vec<u8>) -> Result<Analysis, BackendError> {
        match self {
            EmotionBackend::Mock(b) => b.analyze(image).await,
            #[cfg(feature = "backend-onnx")]
            EmotionBackend::Onnx(b) => b.analyze(image).await,
        }
    }

    /// Backend self-test for `GET /health` — a throwaway inference pass.
    pub async fn health(&self) -> Result<(), BackendError> {
        match self {
            EmotionBackend::Mock(_) => Ok(()),
            #[cfg(feature = "backend-onnx")]
            EmotionBackend::Onnx(b) => b.self_test().await,
        }
    }
}

/// Construct an [`EmotionBackend`] from config.
pub fn build(config: &EmotionApiConfig) -> Result<EmotionBackend, BackendError> {
    match config.backend.as_str() {
        "mock" => Ok(EmotionBackend::Mock(mock::MockBackend)),
        #[cfg(feature = "backend-onnx")]
        "onnx" => {
            let backend =
                onnx::OnnxBackend::load(&config.detector_model, &config.classifier_model)?;
            Ok(EmotionBackend::Onnx(backend))
        }
        other => Err(BackendError::UnknownBackend(other.to_string())),
    }
}
