//! RFB-320 face detector via ONNX Runtime.
//!
//! Single-pass detector producing per-anchor face scores and normalized
//! corner boxes; post-processing is confidence filtering plus NMS.

use crate::VisionError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_hw::Frame;
use std::path::Path;

const DET_INPUT_WIDTH: usize = 320;
const DET_INPUT_HEIGHT: usize = 240;
const DET_MEAN: f32 = 127.0;
const DET_STD: f32 = 128.0;
const DET_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DET_NMS_THRESHOLD: f32 = 0.3;

/// A detected face in original-frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// RFB-320 based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    pub fn load(model_path: &Path) -> Result<Self, VisionError> {
        if !model_path.exists() {
            return Err(VisionError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            "loaded face detector"
        );

        Ok(Self { session })
    }

    /// Detect faces in an RGB frame, sorted by descending confidence.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, VisionError> {
        let input = preprocess(frame);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output 0: scores [1, N, 2] (background, face).
        // Output 1: boxes  [1, N, 4] normalized [x1, y1, x2, y2].
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("boxes: {e}")))?;

        let detections = decode_detections(
            scores,
            boxes,
            frame.width as f32,
            frame.height as f32,
            DET_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(detections, DET_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(result)
    }
}

/// Resize the RGB frame to the detector input and normalize to NCHW.
fn preprocess(frame: &Frame) -> Array4<f32> {
    let resized = resize_rgb(
        &frame.data,
        frame.width as usize,
        frame.height as usize,
        DET_INPUT_WIDTH,
        DET_INPUT_HEIGHT,
    );

    let mut tensor = Array4::<f32>::zeros((1, 3, DET_INPUT_HEIGHT, DET_INPUT_WIDTH));
    for y in 0..DET_INPUT_HEIGHT {
        for x in 0..DET_INPUT_WIDTH {
            let base = (y * DET_INPUT_WIDTH + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (resized[base + c] as f32 - DET_MEAN) / DET_STD;
            }
        }
    }
    tensor
}

/// Bilinear RGB resize. The detector uses a plain (non-letterboxed)
/// resize, so normalized output coordinates map straight back onto the
/// original frame.
pub(crate) fn resize_rgb(
    rgb: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; dst_w * dst_h * 3];
    if src_w == 0 || src_h == 0 {
        return out;
    }
    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;

    for y in 0..dst_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..3 {
                let tl = rgb[(y0 * src_w + x0) * 3 + c] as f32;
                let tr = rgb[(y0 * src_w + x1) * 3 + c] as f32;
                let bl = rgb[(y1 * src_w + x0) * 3 + c] as f32;
                let br = rgb[(y1 * src_w + x1) * 3 + c] as f32;
                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;
                out[(y * dst_w + x) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Turn raw score/box tensors into pixel-space detections above the
/// confidence threshold.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    let anchors = scores.len() / 2;
    let mut detections = Vec::new();

    for i in 0..anchors {
        let confidence = scores[i * 2 + 1];
        if confidence <= threshold {
            continue;
        }
        let off = i * 4;
        if off + 3 >= boxes.len() {
            break;
        }
        let x1 = boxes[off] * frame_w;
        let y1 = boxes[off + 1] * frame_h;
        let x2 = boxes[off + 2] * frame_w;
        let y2 = boxes[off + 3] * frame_h;

        detections.push(FaceBox {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
            confidence,
        });
    }
    detections
}

/// Non-Maximum Suppression: drop boxes overlapping a higher-confidence
/// detection.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
