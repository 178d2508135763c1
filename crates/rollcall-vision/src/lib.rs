//! rollcall-vision — Face detection and descriptor extraction.
//!
//! Runs an RFB-320 face detector and a 128-dimensional embedding network
//! via ONNX Runtime on the CPU. This crate is the concrete face of the
//! kiosk's external recognizer: the rest of the system only ever sees
//! `(bounding box, descriptor)` pairs.

pub mod detector;
pub mod embedder;

use rollcall_core::FaceDescriptor;
use rollcall_hw::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use detector::{FaceBox, FaceDetector};
pub use embedder::DescriptorExtractor;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("model file not found: {0} — place the ONNX models in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// One detected face with its descriptor attached.
#[derive(Debug, Clone)]
pub struct ScannedFace {
    pub bbox: FaceBox,
    pub descriptor: FaceDescriptor,
}

/// Detector + embedder, loaded together at kiosk startup (fail-fast).
pub struct FacePipeline {
    detector: FaceDetector,
    extractor: DescriptorExtractor,
}

impl FacePipeline {
    pub fn load(model_dir: &Path) -> Result<Self, VisionError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL))?;
        let extractor = DescriptorExtractor::load(&model_dir.join(EMBEDDER_MODEL))?;
        Ok(Self {
            detector,
            extractor,
        })
    }

    /// Detect every face in the frame and extract a descriptor for each.
    ///
    /// Descriptor extraction failures on individual faces drop that face
    /// rather than the whole frame.
    pub fn scan(&mut self, frame: &Frame) -> Result<Vec<ScannedFace>, VisionError> {
        let boxes = self.detector.detect(frame)?;
        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            match self.extractor.extract(frame, &bbox) {
                Ok(descriptor) => faces.push(ScannedFace { bbox, descriptor }),
                Err(e) => {
                    tracing::warn!(error = %e, "descriptor extraction failed for one face");
                }
            }
        }
        Ok(faces)
    }
}

const DETECTOR_MODEL: &str = "det_rfb320.onnx";
const EMBEDDER_MODEL: &str = "rec_fd128.onnx";

/// Default directory for the bundled ONNX models.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/rollcall/models")
}
