// src/vehicle_detection.rs

use crate::config::InferenceConfig;
use crate::gate::CONFIDENCE_THRESHOLD;
use crate::types::{Candidate, Frame};
use anyhow::{Context, Result};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info};

pub const YOLO_INPUT_SIZE: usize = 640;
const YOLO_CLASSES: usize = 80;
// YOLOv5 at 640x640 emits 25200 predictions of [cx, cy, w, h, obj, 80 scores].
const YOLO_ROWS: usize = 25200;
const YOLO_COLS: usize = 5 + YOLO_CLASSES;

/// Object detection capability: raw candidate boxes for one frame.
/// Thresholding and suppression belong to the vehicle gate.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Candidate>>;
}

pub struct YoloDetector {
    session: Session,
}

impl YoloDetector {
    pub fn new(model_path: &str, inference: &InferenceConfig) -> Result<Self> {
        info!("Loading YOLO model: {}", model_path);

        let session = Session::builder()?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(inference.cuda_device_id)
                .build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(inference.num_threads)?
            .commit_from_file(model_path)
            .context("Failed to load detector model")?;

        info!("✓ YOLO detector initialized");
        Ok(Self { session })
    }

    fn preprocess(&self, frame: &Frame) -> Vec<f32> {
        let target = YOLO_INPUT_SIZE;
        let resized = resize_bilinear(&frame.data, frame.width, frame.height, target, target);

        // Normalize [0, 255] -> [0, 1] and convert HWC -> CHW
        let mut input = vec![0.0f32; 3 * target * target];
        for c in 0..3 {
            for h in 0..target {
                for w in 0..target {
                    let hwc_idx = (h * target + w) * 3 + c;
                    let chw_idx = c * target * target + h * target + w;
                    input[chw_idx] = resized[hwc_idx] as f32 / 255.0;
                }
            }
        }
        input
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let shape = [1, 3, YOLO_INPUT_SIZE, YOLO_INPUT_SIZE];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.to_vec().into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }

    fn postprocess(&self, output: &[f32], frame: &Frame) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        // The frame was stretched to the square input, so boxes scale back
        // independently per axis.
        let x_factor = frame.width as f32 / YOLO_INPUT_SIZE as f32;
        let y_factor = frame.height as f32 / YOLO_INPUT_SIZE as f32;

        for r in 0..YOLO_ROWS {
            let row = &output[r * YOLO_COLS..(r + 1) * YOLO_COLS];
            let confidence = row[4];

            // Cheap early discard at the same floor the gate enforces.
            if confidence < CONFIDENCE_THRESHOLD {
                continue;
            }

            // Best class for this box.
            let mut class_score = 0.0f32;
            let mut class_id = 0;
            for (c, &score) in row[5..].iter().enumerate() {
                if score > class_score {
                    class_score = score;
                    class_id = c;
                }
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let x1 = (cx - w / 2.0) * x_factor;
            let y1 = (cy - h / 2.0) * y_factor;
            let x2 = (cx + w / 2.0) * x_factor;
            let y2 = (cy + h / 2.0) * y_factor;

            candidates.push(Candidate {
                bbox: [x1, y1, x2, y2],
                confidence,
                class_id,
                class_score,
            });
        }

        candidates
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Candidate>> {
        let input = self.preprocess(frame);
        let output = self.infer(&input)?;
        let candidates = self.postprocess(&output, frame);

        debug!(
            "Frame {}: {} candidate box(es) above floor",
            frame.index,
            candidates.len()
        );
        Ok(candidates)
    }
}

pub(crate) fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }
    dst
}
