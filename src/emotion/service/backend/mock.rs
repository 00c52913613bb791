//! Mock classification backend — randomized scores for testing.
//!
//! Lets the bot be exercised end-to-end without model files: one emotion is
//! picked at random and given 0.6–0.9, the rest get 0.0–0.3, and the map is
//! normalized to sum to 1.

use rand::Rng;

use super::BackendError;
use crate::emotion::{Analysis, Emotion, EmotionScores};

#[derive(Debug)]
pub struct MockBackend;

impl MockBackend {
    pub async fn analyze(&self, image: Vec<u8>) -> Result<Analysis, BackendError> {
        if image.is_empty() {
            return Err(BackendError::InvalidImage("empty image file".into()));
        }

        let mut rng = rand::thread_rng();
        let dominant = Emotion::ALL[rng.gen_range(0..Emotion::ALL.len())];

        let mut scores = EmotionScores::new();
        for emotion in Emotion::ALL {
            let score = if emotion == dominant {
                rng.gen_range(0.6..0.9)
            } else {
                rng.gen_range(0.0..0.3)
            };
            scores.insert(emotion, score);
        }
        scores.normalize();

        Ok(Analysis::Detected { scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let err = MockBackend.analyze(Vec::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn scores_cover_all_labels_and_sum_to_one() {
        let analysis = MockBackend.analyze(vec![0u8; 16]).await.unwrap();
        let Analysis::Detected { scores } = analysis else {
            panic!("mock backend always detects a face");
        };
        for emotion in Emotion::ALL {
            assert!(scores.get(emotion).is_some(), "missing {emotion}");
        }
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn dominant_outscores_the_rest() {
        // The dominant draw (0.6–0.9) beats any other draw (0.0–0.3) even
        // after normalization, so a dominant label must exist.
        let analysis = MockBackend.analyze(vec![1u8; 16]).await.unwrap();
        let Analysis::Detected { scores } = analysis else { unreachable!() };
        let (_, confidence) = scores.dominant().unwrap();
        assert!(confidence > 0.2);
    }
}
