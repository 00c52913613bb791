//! Art-therapy recommendation layer.
//!
//! Maps a detected emotion to an LLM prompt and returns the generated
//! recommendation, degrading to built-in texts whenever the LLM is not
//! configured or fails. The bot always has something to say.

pub mod texts;

use tracing::warn;

use crate::emotion::Emotion;
use crate::llm::LlmProvider;

/// Produces recommendation texts for detected emotions.
#[derive(Debug, Clone)]
pub struct Recommender {
    /// `None` means "no LLM configured" — built-in fallbacks only.
    provider: Option<LlmProvider>,
}

impl Recommender {
    pub fn new(provider: Option<LlmProvider>) -> Self {
        Self { provider }
    }

    /// Returns `true` when recommendations come from an LLM rather than the
    /// built-in texts.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Recommendation text for `emotion`. Never fails: any provider error
    /// degrades to the built-in fallback for that emotion.
    pub async fn recommend(&self, emotion: Emotion) -> String {
        let Some(provider) = &self.provider else {
            return texts::fallback_for(emotion).to_string();
        };

        match provider.complete(texts::prompt_for(emotion), Some(texts::SYSTEM_PROMPT)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%emotion, error = %e, "LLM request failed, using builtin recommendation");
                texts::fallback_for(emotion).to_string()
            }
        }
    }
}
