//! ONNX classification backend — face detection + FER+ emotion scoring.
//!
//! Two ONNX Runtime sessions: an UltraFace-style detector finds faces in the
//! full frame, then a FER+ classifier scores a 64×64 grayscale crop of the
//! most confident one. Only that face is classified; additional faces in the
//! frame are ignored.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{GrayImage, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{debug, info};

use super::BackendError;
use crate::emotion::{Analysis, Emotion, EmotionScores};

// --- Detector (UltraFace version-RFB-320) ---
const DETECT_INPUT_WIDTH: usize = 320;
const DETECT_INPUT_HEIGHT: usize = 240;
const DETECT_MEAN: f32 = 127.0;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DETECT_NMS_IOU: f32 = 0.3;

// --- Classifier (FER+) ---
const CLASSIFY_INPUT_SIZE: usize = 64;

/// FER+ emits eight probabilities in this fixed order. `contempt` (index 7)
/// has no wire label of its own and is folded into `disgust`.
const FERPLUS_ORDER: [Emotion; 8] = [
    Emotion::Neutral,
    Emotion::Happy,
    Emotion::Surprise,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Disgust,
    Emotion::Fear,
    Emotion::Disgust,
];

// ── FaceBox ───────────────────────────────────────────────────────────────────

/// A detected face in pixel corner coordinates.
#[derive(Debug, Clone, PartialEq)]
struct FaceBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

// ── OnnxBackend ───────────────────────────────────────────────────────────────

/// ONNX-backed classifier. Cloning shares the underlying sessions.
///
/// `Session::run` needs `&mut self`, so the sessions live behind a mutex and
/// inference runs on the blocking thread pool; one request classifies at a
/// time, which matches the single-model setup of the original service.
#[derive(Clone, Debug)]
pub struct OnnxBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    detector: Session,
    classifier: Session,
    /// (scores, boxes) output indices of the detector, discovered at load.
    detector_outputs: (usize, usize),
}

impl OnnxBackend {
    /// Load both ONNX models from the given paths.
    pub fn load(detector_model: &Path, classifier_model: &Path) -> Result<Self, BackendError> {
        let detector = load_session(detector_model)?;
        let classifier = load_session(classifier_model)?;

        let output_names: Vec<String> =
            detector.outputs().iter().map(|o| o.name().to_string()).collect();
        let detector_outputs = detector_output_indices(&output_names);

        info!(
            detector = %detector_model.display(),
            classifier = %classifier_model.display(),
            "emotion models loaded"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { detector, classifier, detector_outputs })),
        })
    }

    /// Decode and classify one encoded image on the blocking pool.
    pub async fn analyze(&self, image: Vec<u8>) -> Result<Analysis, BackendError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| BackendError::Inference("backend mutex poisoned".into()))?;
            guard.analyze_bytes(&image)
        })
        .await
        .map_err(|e| BackendError::Inference(format!("inference task failed: {e}")))?
    }

    /// Health probe: run the detector over a synthetic black frame.
    pub async fn self_test(&self) -> Result<(), BackendError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| BackendError::Inference("backend mutex poisoned".into()))?;
            let frame = RgbImage::new(100, 100);
            guard.detect(&frame).map(|_| ())
        })
        .await
        .map_err(|e| BackendError::Inference(format!("inference task failed: {e}")))?
    }
}

impl Inner {
    fn analyze_bytes(&mut self, bytes: &[u8]) -> Result<Analysis, BackendError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| BackendError::InvalidImage(e.to_string()))?;
        let rgb = decoded.to_rgb8();
        let gray = decoded.to_luma8();

        let faces = self.detect(&rgb)?;
        let Some(face) = faces.into_iter().next() else {
            return Ok(Analysis::NoFace);
        };

        debug!(
            confidence = face.confidence,
            area = face.area(),
            "classifying most confident face"
        );
        let scores = self.classify(&gray, &face)?;
        Ok(Analysis::Detected { scores })
    }

    /// Run the detector and return surviving faces, most confident first.
    fn detect(&mut self, rgb: &RgbImage) -> Result<Vec<FaceBox>, BackendError> {
        let input = detector_tensor(rgb);
        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (score_idx, box_idx) = self.detector_outputs;
        let (_, scores) = outputs[score_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::Inference(format!("detector scores: {e}")))?;
        let (_, boxes) = outputs[box_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::Inference(format!("detector boxes: {e}")))?;

        let (width, height) = rgb.dimensions();
        let candidates = decode_detections(
            scores,
            boxes,
            width as f32,
            height as f32,
            DETECT_CONFIDENCE_THRESHOLD,
        );
        Ok(nms(candidates, DETECT_NMS_IOU))
    }

    /// Crop the face, resize to the classifier input, softmax the logits.
    fn classify(&mut self, gray: &GrayImage, face: &FaceBox) -> Result<EmotionScores, BackendError> {
        let input = classifier_tensor(gray, face);
        let outputs = self
            .classifier
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::Inference(format!("emotion logits: {e}")))?;

        if logits.len() < FERPLUS_ORDER.len() {
            return Err(BackendError::Inference(format!(
                "expected {} emotion logits, got {}",
                FERPLUS_ORDER.len(),
                logits.len()
            )));
        }

        let probs = softmax(&logits[..FERPLUS_ORDER.len()]);
        Ok(fold_scores(&probs))
    }
}

fn load_session(path: &Path) -> Result<Session, BackendError> {
    if !path.exists() {
        return Err(BackendError::ModelNotFound(path.to_path_buf()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(path)?;

    debug!(
        path = %path.display(),
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded ONNX model"
    );

    Ok(session)
}

/// UltraFace exports name their outputs `scores` and `boxes`; fall back to
/// positional `[0]`/`[1]` when the names are not recognized.
fn detector_output_indices(names: &[String]) -> (usize, usize) {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");
    match (scores, boxes) {
        (Some(s), Some(b)) => (s, b),
        _ => {
            info!(?names, "detector output names not recognized, using positional mapping");
            (0, 1)
        }
    }
}

// ── Tensor builders ───────────────────────────────────────────────────────────

/// Stretch-resize the frame to the detector input and normalize to its
/// expected distribution.
fn detector_tensor(rgb: &RgbImage) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, DETECT_INPUT_HEIGHT, DETECT_INPUT_WIDTH));

    for y in 0..DETECT_INPUT_HEIGHT {
        let src_y = (y as f32 + 0.5) * height as f32 / DETECT_INPUT_HEIGHT as f32 - 0.5;
        for x in 0..DETECT_INPUT_WIDTH {
            let src_x = (x as f32 + 0.5) * width as f32 / DETECT_INPUT_WIDTH as f32 - 0.5;
            let rgb_value = sample_rgb(rgb, src_x, src_y);
            for (channel, value) in rgb_value.into_iter().enumerate() {
                tensor[[0, channel, y, x]] = (value - DETECT_MEAN) / DETECT_STD;
            }
        }
    }

    tensor
}

/// Crop the detected face (clamped to the frame) and resize to the 64×64
/// grayscale input. FER+ takes raw 0–255 values, no normalization.
fn classifier_tensor(gray: &GrayImage, face: &FaceBox) -> Array4<f32> {
    let (width, height) = gray.dimensions();
    let x1 = face.x1.clamp(0.0, width as f32 - 1.0);
    let y1 = face.y1.clamp(0.0, height as f32 - 1.0);
    let x2 = face.x2.clamp(0.0, width as f32 - 1.0);
    let y2 = face.y2.clamp(0.0, height as f32 - 1.0);
    let box_w = (x2 - x1).max(1.0);
    let box_h = (y2 - y1).max(1.0);

    let size = CLASSIFY_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 1, size, size));

    for y in 0..size {
        let src_y = y1 + (y as f32 + 0.5) * box_h / size as f32 - 0.5;
        for x in 0..size {
            let src_x = x1 + (x as f32 + 0.5) * box_w / size as f32 - 0.5;
            tensor[[0, 0, y, x]] = sample_gray(gray, src_x, src_y);
        }
    }

    tensor
}

/// Bilinear sample with edge clamping.
fn sample_gray(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let tl = img.get_pixel(x0, y0).0[0] as f32;
    let tr = img.get_pixel(x1, y0).0[0] as f32;
    let bl = img.get_pixel(x0, y1).0[0] as f32;
    let br = img.get_pixel(x1, y1).0[0] as f32;

    tl * (1.0 - fx) * (1.0 - fy) + tr * fx * (1.0 - fy) + bl * (1.0 - fx) * fy + br * fx * fy
}

/// Bilinear sample with edge clamping, per channel.
fn sample_rgb(img: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let (w, h) = img.dimensions();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    for (channel, value) in out.iter_mut().enumerate() {
        let tl = img.get_pixel(x0, y0).0[channel] as f32;
        let tr = img.get_pixel(x1, y0).0[channel] as f32;
        let bl = img.get_pixel(x0, y1).0[channel] as f32;
        let br = img.get_pixel(x1, y1).0[channel] as f32;
        *value =
            tl * (1.0 - fx) * (1.0 - fy) + tr * fx * (1.0 - fy) + bl * (1.0 - fx) * fy + br * fx * fy;
    }
    out
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode UltraFace outputs. `scores` is `[1, N, 2]` (background, face) and
/// `boxes` is `[1, N, 4]` corner coordinates normalized to `[0, 1]`.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    width: f32,
    height: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    let count = scores.len() / 2;
    let mut detections = Vec::new();

    for i in 0..count {
        let confidence = scores[i * 2 + 1];
        if confidence <= threshold {
            continue;
        }
        let off = i * 4;
        if off + 3 >= boxes.len() {
            break;
        }
        detections.push(FaceBox {
            x1: boxes[off] * width,
            y1: boxes[off + 1] * height,
            x2: boxes[off + 2] * width,
            y2: boxes[off + 3] * height,
            confidence,
        });
    }

    detections
}

/// Non-maximum suppression. Returns survivors, most confident first.
fn nms(mut candidates: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::new();
    'candidates: for candidate in candidates {
        for survivor in &kept {
            if iou(survivor, &candidate) > iou_threshold {
                continue 'candidates;
            }
        }
        kept.push(candidate);
    }
    kept
}

/// Intersection-over-union for corner-coordinate boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Numerically-stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Accumulate the eight FER+ probabilities onto the seven wire labels.
fn fold_scores(probs: &[f32]) -> EmotionScores {
    let mut scores: EmotionScores = Emotion::ALL.into_iter().map(|e| (e, 0.0)).collect();
    for (i, emotion) in FERPLUS_ORDER.iter().enumerate() {
        let prev = scores.get(*emotion).unwrap_or(0.0);
        scores.insert(*emotion, prev + probs[i]);
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence: conf }
    }

    #[test]
    fn decode_applies_threshold_and_scales_to_pixels() {
        // Two anchors: first below threshold, second above.
        let scores = [0.9, 0.1, 0.2, 0.8];
        let boxes = [0.0, 0.0, 0.5, 0.5, 0.25, 0.25, 0.75, 0.75];
        let dets = decode_detections(&scores, &boxes, 320.0, 240.0, 0.7);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x1 - 80.0).abs() < 1e-4);
        assert!((dets[0].y1 - 60.0).abs() < 1e-4);
        assert!((dets[0].x2 - 240.0).abs() < 1e-4);
        assert!((dets[0].y2 - 180.0).abs() < 1e-4);
    }

    #[test]
    fn decode_tolerates_truncated_boxes() {
        let scores = [0.1, 0.9, 0.1, 0.9];
        let boxes = [0.0, 0.0, 1.0, 1.0]; // only one box for two anchors
        let dets = decode_detections(&scores, &boxes, 100.0, 100.0, 0.5);
        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(20.0, 20.0, 30.0, 30.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn iou_half_overlap() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(5.0, 0.0, 15.0, 10.0, 1.0);
        // Intersection 50, union 150.
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_best_of_overlapping_cluster() {
        let dets = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.8),
            face(5.0, 5.0, 105.0, 105.0, 0.9),
            face(200.0, 200.0, 250.0, 250.0, 0.7),
        ];
        let kept = nms(dets, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn nms_empty_input() {
        assert!(nms(vec![], 0.3).is_empty());
    }

    #[test]
    fn softmax_sums_to_one_and_preserves_argmax() {
        let probs = softmax(&[1.0, 3.0, 2.0]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs[1] > probs[0] && probs[1] > probs[2]);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[1.0, 2.0]);
        let b = softmax(&[101.0, 102.0]);
        assert!((a[0] - b[0]).abs() < 1e-6);
    }

    #[test]
    fn fold_merges_contempt_into_disgust() {
        // All mass on disgust (index 5) and contempt (index 7).
        let probs = [0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6];
        let scores = fold_scores(&probs);
        assert!((scores.get(Emotion::Disgust).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(scores.get(Emotion::Neutral).unwrap(), 0.0);
    }

    #[test]
    fn fold_covers_all_seven_labels() {
        let probs = [0.125f32; 8];
        let scores = fold_scores(&probs);
        for emotion in Emotion::ALL {
            assert!(scores.get(emotion).is_some(), "missing {emotion}");
        }
        assert!((scores.get(Emotion::Disgust).unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn output_indices_discovered_by_name() {
        let names: Vec<String> = ["boxes", "scores"].iter().map(|s| s.to_string()).collect();
        assert_eq!(detector_output_indices(&names), (1, 0));
    }

    #[test]
    fn output_indices_positional_fallback() {
        let names: Vec<String> = ["517", "518"].iter().map(|s| s.to_string()).collect();
        assert_eq!(detector_output_indices(&names), (0, 1));
    }

    #[test]
    fn sample_gray_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(10, 10, image::Luma([128u8]));
        assert!((sample_gray(&img, 4.3, 7.8) - 128.0).abs() < 1e-4);
        // Out-of-range coordinates clamp to the edge.
        assert!((sample_gray(&img, -5.0, 50.0) - 128.0).abs() < 1e-4);
    }

    #[test]
    fn classifier_tensor_has_expected_shape_and_range() {
        let img = GrayImage::from_pixel(100, 100, image::Luma([200u8]));
        let tensor = classifier_tensor(&img, &face(10.0, 10.0, 90.0, 90.0, 0.9));
        assert_eq!(tensor.shape(), &[1, 1, CLASSIFY_INPUT_SIZE, CLASSIFY_INPUT_SIZE]);
        assert!((tensor[[0, 0, 0, 0]] - 200.0).abs() < 1e-3);
    }

    #[test]
    fn detector_tensor_normalizes_black_to_negative_mean() {
        let img = RgbImage::new(64, 48);
        let tensor = detector_tensor(&img);
        assert_eq!(tensor.shape(), &[1, 3, DETECT_INPUT_HEIGHT, DETECT_INPUT_WIDTH]);
        let expected = (0.0 - DETECT_MEAN) / DETECT_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }
}
