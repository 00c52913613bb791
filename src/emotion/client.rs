//! HTTP client for the emotion analysis service.
//!
//! The bot process talks to `palitra-emotion-api` exclusively through this
//! client. Constructed once at startup, then cheaply cloned because
//! `reqwest::Client` is an `Arc` internally.

use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, error};

use super::{Emotion, EmotionScores};
use crate::config::EmotionConfig;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("emotion service request failed: {0}")]
    Request(String),
    #[error("emotion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected emotion service response: {0}")]
    Decode(String),
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// What the service said about one photo.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    Detected {
        dominant: Emotion,
        confidence: f32,
        scores: EmotionScores,
    },
    NoFace,
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EmotionClient {
    client: reqwest::Client,
    base_url: String,
}

impl EmotionClient {
    pub fn new(config: &EmotionConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url: config.api_base_url.clone() })
    }

    /// Upload image bytes for classification.
    ///
    /// The payload is a multipart form with a single `file` field — the wire
    /// contract of `POST /analyze_emotion`.
    pub async fn analyze(&self, image: Vec<u8>) -> Result<AnalyzeOutcome, ClientError> {
        let part = multipart::Part::bytes(image)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ClientError::Request(format!("invalid mime type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}/analyze_emotion", self.base_url);
        debug!(%url, "sending image for emotion analysis");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(%url, error = %e, "emotion service request failed (transport)");
                ClientError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            error!(%status, %body, "emotion service returned HTTP error");
            return Err(ClientError::Status { status: status.as_u16(), body });
        }

        let parsed = response
            .json::<AnalyzeResponse>()
            .await
            .map_err(|e| ClientError::Decode(format!("failed to parse response body: {e}")))?;

        parsed.into_outcome()
    }

    /// Probe `GET /health`. `Ok` means the service is up and its model is
    /// loaded; used at bot startup to log availability.
    pub async fn health(&self) -> Result<(), ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: "health check failed".into(),
            });
        }

        let health = response
            .json::<HealthResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if health.status == "healthy" {
            Ok(())
        } else {
            Err(ClientError::Request(format!(
                "service reports status '{}'",
                health.status
            )))
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    status: String,
    #[serde(default)]
    dominant_emotion: Option<String>,
    #[serde(default)]
    emotions: EmotionScores,
    #[serde(default)]
    confidence: Option<f32>,
}

impl AnalyzeResponse {
    fn into_outcome(self) -> Result<AnalyzeOutcome, ClientError> {
        match self.status.as_str() {
            "success" => {
                let label = self
                    .dominant_emotion
                    .ok_or_else(|| ClientError::Decode("missing dominant_emotion".into()))?;
                let dominant = label
                    .parse::<Emotion>()
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                let confidence = self
                    .confidence
                    .or_else(|| self.emotions.get(dominant))
                    .ok_or_else(|| ClientError::Decode("missing confidence".into()))?;
                Ok(AnalyzeOutcome::Detected { dominant, confidence, scores: self.emotions })
            }
            "no_face_detected" => Ok(AnalyzeOutcome::NoFace),
            other => Err(ClientError::Decode(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_parses() {
        let raw = r#"{
            "status": "success",
            "dominant_emotion": "happy",
            "emotions": {"happy": 0.8, "neutral": 0.2},
            "confidence": 0.8
        }"#;
        let parsed: AnalyzeResponse = serde_json::from_str(raw).unwrap();
        match parsed.into_outcome().unwrap() {
            AnalyzeOutcome::Detected { dominant, confidence, scores } => {
                assert_eq!(dominant, Emotion::Happy);
                assert!((confidence - 0.8).abs() < 1e-6);
                assert!((scores.get(Emotion::Neutral).unwrap() - 0.2).abs() < 1e-6);
            }
            other => panic!("expected Detected, got {other:?}"),
        }
    }

    #[test]
    fn missing_confidence_falls_back_to_score_map() {
        let raw = r#"{
            "status": "success",
            "dominant_emotion": "sad",
            "emotions": {"sad": 0.9}
        }"#;
        let parsed: AnalyzeResponse = serde_json::from_str(raw).unwrap();
        match parsed.into_outcome().unwrap() {
            AnalyzeOutcome::Detected { confidence, .. } => {
                assert!((confidence - 0.9).abs() < 1e-6)
            }
            other => panic!("expected Detected, got {other:?}"),
        }
    }

    #[test]
    fn no_face_response_parses() {
        let raw = r#"{
            "status": "no_face_detected",
            "message": "No face detected in the image",
            "dominant_emotion": "neutral",
            "emotions": {}
        }"#;
        let parsed: AnalyzeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_outcome().unwrap(), AnalyzeOutcome::NoFace);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let raw = r#"{"status": "weird", "emotions": {}}"#;
        let parsed: AnalyzeResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.into_outcome().is_err());
    }

    #[test]
    fn unknown_dominant_label_is_an_error() {
        let raw = r#"{
            "status": "success",
            "dominant_emotion": "bored",
            "emotions": {},
            "confidence": 0.5
        }"#;
        let parsed: AnalyzeResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.into_outcome().is_err());
    }
}
