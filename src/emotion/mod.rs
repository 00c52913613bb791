//! Emotion domain types shared by the bot and the analysis service.
//!
//! The wire vocabulary is the seven labels the classifier emits; both sides
//! of the HTTP boundary speak these lowercase strings.

pub mod client;
pub mod service;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Emotion ───────────────────────────────────────────────────────────────────

/// One of the seven emotion labels produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All labels, in wire order.
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Lowercase wire form of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownEmotion(s.to_string()))
    }
}

/// Error for unrecognised emotion labels on the wire.
#[derive(Debug, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

// ── EmotionScores ─────────────────────────────────────────────────────────────

/// Label → probability map for one classified face.
///
/// `BTreeMap` keeps the JSON key order stable, which makes responses
/// reproducible in tests and logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<Emotion, f32>);

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, emotion: Emotion, score: f32) {
        self.0.insert(emotion, score);
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        self.0.get(&emotion).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        self.0.iter().map(|(e, s)| (*e, *s))
    }

    /// Highest-scoring label and its confidence. `None` when no scores.
    ///
    /// Ties resolve to the first label in map order, which is stable.
    pub fn dominant(&self) -> Option<(Emotion, f32)> {
        self.0
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(e, s)| (*e, *s))
    }

    /// Scale all scores so they sum to 1. No-op when the sum is zero.
    pub fn normalize(&mut self) {
        let total: f32 = self.0.values().sum();
        if total > 0.0 {
            for v in self.0.values_mut() {
                *v /= total;
            }
        }
    }
}

impl FromIterator<(Emotion, f32)> for EmotionScores {
    fn from_iter<T: IntoIterator<Item = (Emotion, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Analysis ──────────────────────────────────────────────────────────────────

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// A face was found; `scores` covers all seven labels.
    Detected { scores: EmotionScores },
    /// No face in the image — the caller decides how to degrade.
    NoFace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_str() {
        for e in Emotion::ALL {
            assert_eq!(e.as_str().parse::<Emotion>().unwrap(), e);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!("bored".parse::<Emotion>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_wire_form() {
        assert_eq!(serde_json::to_string(&Emotion::Happy).unwrap(), "\"happy\"");
        let e: Emotion = serde_json::from_str("\"surprise\"").unwrap();
        assert_eq!(e, Emotion::Surprise);
    }

    #[test]
    fn scores_serialize_as_flat_object() {
        let scores: EmotionScores =
            [(Emotion::Happy, 0.7), (Emotion::Sad, 0.3)].into_iter().collect();
        let json = serde_json::to_value(&scores).unwrap();
        assert_eq!(json["happy"], 0.7);
        assert_eq!(json["sad"], 0.3);
    }

    #[test]
    fn dominant_picks_highest_score() {
        let scores: EmotionScores = [
            (Emotion::Angry, 0.1),
            (Emotion::Happy, 0.6),
            (Emotion::Neutral, 0.3),
        ]
        .into_iter()
        .collect();
        let (e, conf) = scores.dominant().unwrap();
        assert_eq!(e, Emotion::Happy);
        assert!((conf - 0.6).abs() < 1e-6);
    }

    #[test]
    fn dominant_of_empty_is_none() {
        assert!(EmotionScores::new().dominant().is_none());
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut scores: EmotionScores =
            [(Emotion::Fear, 2.0), (Emotion::Happy, 6.0)].into_iter().collect();
        scores.normalize();
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((scores.get(Emotion::Happy).unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_sum_is_noop() {
        let mut scores: EmotionScores = [(Emotion::Fear, 0.0)].into_iter().collect();
        scores.normalize();
        assert_eq!(scores.get(Emotion::Fear).unwrap(), 0.0);
    }
}
