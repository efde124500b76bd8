// src/classifier.rs
//
// Adapter around the binary violation classifier (MobileNetV2 head
// exported to ONNX). Frames reaching this point already passed the
// vehicle gate.

use crate::config::InferenceConfig;
use crate::types::Frame;
use crate::vehicle_detection::resize_bilinear;
use anyhow::{Context, Result};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info};

pub const CLASSIFIER_INPUT_SIZE: usize = 128;
/// Scores strictly above this mark the frame as a violation.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Frame classification capability: violation score in [0, 1].
pub trait Classifier {
    fn classify(&mut self, frame: &Frame) -> Result<f32>;
}

/// Raw score plus its thresholded flag for one sampled frame.
#[derive(Debug, Clone, Copy)]
pub struct FramePrediction {
    pub score: f32,
    pub is_violation: bool,
}

/// Classify one frame and apply the fixed decision threshold.
pub fn predict<C: Classifier>(classifier: &mut C, frame: &Frame) -> Result<FramePrediction> {
    let score = classifier.classify(frame)?;
    Ok(FramePrediction {
        score,
        is_violation: score > DECISION_THRESHOLD,
    })
}

pub struct OnnxViolationClassifier {
    session: Session,
    input_name: String,
}

impl OnnxViolationClassifier {
    pub fn new(model_path: &str, inference: &InferenceConfig) -> Result<Self> {
        info!("Loading violation classifier: {}", model_path);

        let session = Session::builder()?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(inference.cuda_device_id)
                .build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(inference.num_threads)?
            .commit_from_file(model_path)
            .context("Failed to load classifier model")?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Classifier model has no inputs")?;

        info!("✓ Violation classifier initialized");
        Ok(Self {
            session,
            input_name,
        })
    }

    /// Resize to 128x128 RGB and scale to [0, 1]. The exported Keras model
    /// expects NHWC, so no channel transpose here.
    fn preprocess(&self, frame: &Frame) -> Vec<f32> {
        let target = CLASSIFIER_INPUT_SIZE;
        let resized = resize_bilinear(&frame.data, frame.width, frame.height, target, target);
        resized.iter().map(|&v| v as f32 / 255.0).collect()
    }
}

impl Classifier for OnnxViolationClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<f32> {
        let input = self.preprocess(frame);

        let shape = [1, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE, 3];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        let score = *data
            .first()
            .context("Classifier produced an empty output tensor")?;

        debug!("Frame {}: violation score {:.3}", frame.index, score);
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(f32);

    impl Classifier for FixedClassifier {
        fn classify(&mut self, _frame: &Frame) -> Result<f32> {
            Ok(self.0)
        }
    }

    fn frame() -> Frame {
        Frame {
            data: vec![0u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            index: 1,
        }
    }

    #[test]
    fn test_decision_threshold_is_strict() {
        let pred = predict(&mut FixedClassifier(0.5), &frame()).unwrap();
        assert!(!pred.is_violation);

        let pred = predict(&mut FixedClassifier(0.51), &frame()).unwrap();
        assert!(pred.is_violation);
        assert_eq!(pred.score, 0.51);
    }
}
