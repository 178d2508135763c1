//! Face descriptor extraction via ONNX Runtime.
//!
//! Crops the detected face with a margin, resizes to the network input,
//! and produces the 128-dimensional descriptor the matcher consumes.

use crate::detector::{resize_rgb, FaceBox};
use crate::VisionError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::FaceDescriptor;
use rollcall_hw::Frame;
use std::path::Path;

const EMB_INPUT_SIZE: usize = 150;
const EMB_MEAN: f32 = 127.5;
const EMB_STD: f32 = 128.0;
const EMB_DESCRIPTOR_DIM: usize = 128;
/// Fraction of box size added on every side before cropping. The
/// embedding network expects some forehead/chin context around the
/// detector's tight box.
const EMB_CROP_MARGIN: f32 = 0.2;

/// Descriptor extraction network.
pub struct DescriptorExtractor {
    session: Session,
}

impl DescriptorExtractor {
    pub fn load(model_path: &Path) -> Result<Self, VisionError> {
        if !model_path.exists() {
            return Err(VisionError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded descriptor extractor");
        Ok(Self { session })
    }

    /// Extract the descriptor for one detected face.
    pub fn extract(&mut self, frame: &Frame, bbox: &FaceBox) -> Result<FaceDescriptor, VisionError> {
        let crop = crop_face(
            &frame.data,
            frame.width as usize,
            frame.height as usize,
            bbox,
        );
        let input = preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("descriptor: {e}")))?;

        if raw.len() != EMB_DESCRIPTOR_DIM {
            return Err(VisionError::InferenceFailed(format!(
                "expected {EMB_DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        Ok(FaceDescriptor::new(raw.to_vec()))
    }
}

/// Crop the face box (expanded by the margin, clamped to the frame) and
/// resize to the network input size.
fn crop_face(rgb: &[u8], frame_w: usize, frame_h: usize, bbox: &FaceBox) -> Vec<u8> {
    let margin_x = bbox.width * EMB_CROP_MARGIN;
    let margin_y = bbox.height * EMB_CROP_MARGIN;

    let x0 = ((bbox.x - margin_x).max(0.0) as usize).min(frame_w.saturating_sub(1));
    let y0 = ((bbox.y - margin_y).max(0.0) as usize).min(frame_h.saturating_sub(1));
    let x1 = ((bbox.x + bbox.width + margin_x) as usize).min(frame_w);
    let y1 = ((bbox.y + bbox.height + margin_y) as usize).min(frame_h);

    let crop_w = x1.saturating_sub(x0).max(1);
    let crop_h = y1.saturating_sub(y0).max(1);

    let mut crop = vec![0u8; crop_w * crop_h * 3];
    for y in 0..crop_h {
        let src_row = ((y0 + y) * frame_w + x0) * 3;
        let dst_row = y * crop_w * 3;
        crop[dst_row..dst_row + crop_w * 3]
            .copy_from_slice(&rgb[src_row..src_row + crop_w * 3]);
    }

    resize_rgb(&crop, crop_w, crop_h, EMB_INPUT_SIZE, EMB_INPUT_SIZE)
}

/// Normalize an RGB crop into the NCHW input tensor.
fn preprocess(crop: &[u8]) -> Array4<f32> {
    let size = EMB_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let base = (y * size + x) * 3;
            for c in 0..3 {
                let pixel = crop.get(base + c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - EMB_MEAN) / EMB_STD;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_shape_and_normalization() {
        let crop = vec![128u8; EMB_INPUT_SIZE * EMB_INPUT_SIZE * 3];
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, EMB_INPUT_SIZE, EMB_INPUT_SIZE]);
        let expected = (128.0 - EMB_MEAN) / EMB_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn preprocess_splits_channels() {
        // One pixel r=255 g=0 b=0 repeated: channel planes must differ.
        let mut crop = Vec::with_capacity(EMB_INPUT_SIZE * EMB_INPUT_SIZE * 3);
        for _ in 0..EMB_INPUT_SIZE * EMB_INPUT_SIZE {
            crop.extend_from_slice(&[255, 0, 0]);
        }
        let tensor = preprocess(&crop);
        assert!(tensor[[0, 0, 10, 10]] > 0.9);
        assert!(tensor[[0, 1, 10, 10]] < -0.9);
        assert!(tensor[[0, 2, 10, 10]] < -0.9);
    }

    #[test]
    fn crop_face_clamps_to_frame() {
        // Box hangs off the top-left corner; crop must stay in bounds.
        let frame = vec![50u8; 64 * 64 * 3];
        let bbox = FaceBox {
            x: -10.0,
            y: -10.0,
            width: 30.0,
            height: 30.0,
            confidence: 0.9,
        };
        let crop = crop_face(&frame, 64, 64, &bbox);
        assert_eq!(crop.len(), EMB_INPUT_SIZE * EMB_INPUT_SIZE * 3);
        assert!(crop.iter().all(|&p| p == 50));
    }

    #[test]
    fn crop_face_uniform_frame() {
        let frame = vec![90u8; 100 * 100 * 3];
        let bbox = FaceBox {
            x: 20.0,
            y: 20.0,
            width: 40.0,
            height: 40.0,
            confidence: 0.9,
        };
        let crop = crop_face(&frame, 100, 100, &bbox);
        assert!(crop.iter().all(|&p| p == 90));
    }
}
