//! Shared state for the comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below. The raw HTTP clients are private; channels cannot hit
//! arbitrary endpoints or bypass the recommendation fallback logic.

use crate::emotion::client::{AnalyzeOutcome, EmotionClient};
use crate::emotion::Emotion;
use crate::error::AppError;
use crate::therapy::Recommender;

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    emotion: EmotionClient,
    recommender: Recommender,
}

impl CommsState {
    pub fn new(emotion: EmotionClient, recommender: Recommender) -> Self {
        Self { emotion, recommender }
    }

    /// Send photo bytes to the emotion analysis service.
    pub async fn analyze_photo(&self, image: Vec<u8>) -> Result<AnalyzeOutcome, AppError> {
        self.emotion
            .analyze(image)
            .await
            .map_err(|e| AppError::Emotion(e.to_string()))
    }

    /// Recommendation text for a detected emotion. Never fails — the
    /// recommender degrades to built-in texts.
    pub async fn recommend(&self, emotion: Emotion) -> String {
        self.recommender.recommend(emotion).await
    }

    /// Startup probe of the emotion analysis service.
    pub async fn emotion_service_health(&self) -> Result<(), AppError> {
        self.emotion
            .health()
            .await
            .map_err(|e| AppError::Emotion(e.to_string()))
    }
}
