// src/gate.rs
//
// Vehicle presence gate. Filters the detector's raw candidates by
// confidence and class score, suppresses overlapping boxes, and accepts
// the frame only if a vehicle class survives.

use crate::types::{Candidate, Detection};
use tracing::debug;

/// Minimum box objectness; inclusive.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;
/// Minimum best-class score; strict. The asymmetry with the confidence
/// bound is deliberate and load-bearing for borderline detections.
pub const SCORE_THRESHOLD: f32 = 0.7;
/// Boxes overlapping an accepted box at or above this IoU are dropped.
pub const NMS_THRESHOLD: f32 = 0.7;

// COCO class IDs for vehicles
pub const VEHICLE_CLASSES: [usize; 4] = [2, 3, 5, 7]; // car, motorcycle, bus, truck

#[derive(Debug)]
pub struct GateResult {
    pub accepted: bool,
    pub detections: Vec<Detection>,
}

/// Run the full gate: threshold filter, NMS, vehicle-class check.
pub fn check(candidates: Vec<Candidate>) -> GateResult {
    let detections = filter_detections(candidates);
    let accepted = detections
        .iter()
        .any(|d| VEHICLE_CLASSES.contains(&d.class_id));

    debug!(
        "Gate: {} detection(s) after NMS, vehicle present: {}",
        detections.len(),
        accepted
    );

    GateResult {
        accepted,
        detections,
    }
}

/// Apply both score thresholds, then greedy NMS with confidence as the
/// tie-break (highest-confidence box survives, overlapping lower ones go).
pub fn filter_detections(candidates: Vec<Candidate>) -> Vec<Detection> {
    let surviving: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.confidence >= CONFIDENCE_THRESHOLD && c.class_score > SCORE_THRESHOLD)
        .collect();

    nms(surviving, NMS_THRESHOLD)
        .into_iter()
        .map(|c| Detection {
            bbox: c.bbox,
            confidence: c.confidence,
            class_name: class_name(c.class_id),
            class_id: c.class_id,
        })
        .collect()
}

pub fn class_name(class_id: usize) -> String {
    match class_id {
        2 => "car",
        3 => "motorcycle",
        5 => "bus",
        7 => "truck",
        _ => "unknown",
    }
    .to_string()
}

fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();

    while !candidates.is_empty() {
        let current = candidates.remove(0);

        candidates.retain(|c| calculate_iou(&current.bbox, &c.bbox) < iou_threshold);
        keep.push(current);
    }

    keep
}

fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(bbox: [f32; 4], confidence: f32, class_id: usize, class_score: f32) -> Candidate {
        Candidate {
            bbox,
            confidence,
            class_id,
            class_score,
        }
    }

    #[test]
    fn test_confidence_bound_is_inclusive() {
        // Objectness exactly at the threshold passes.
        let result = check(vec![candidate([0.0, 0.0, 10.0, 10.0], 0.7, 2, 0.9)]);
        assert!(result.accepted);
    }

    #[test]
    fn test_class_score_bound_is_strict() {
        // Class score exactly at the threshold is rejected.
        let result = check(vec![candidate([0.0, 0.0, 10.0, 10.0], 0.9, 2, 0.7)]);
        assert!(!result.accepted);
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_no_candidates_is_a_valid_rejection() {
        let result = check(Vec::new());
        assert!(!result.accepted);
    }

    #[test]
    fn test_non_vehicle_class_rejected() {
        // Class 0 is "person" in COCO.
        let result = check(vec![candidate([0.0, 0.0, 10.0, 10.0], 0.9, 0, 0.9)]);
        assert!(!result.accepted);
    }

    #[test]
    fn test_nms_keeps_highest_confidence_of_overlapping_pair() {
        let result = check(vec![
            candidate([0.0, 0.0, 10.0, 10.0], 0.8, 2, 0.9),
            candidate([1.0, 0.0, 11.0, 10.0], 0.95, 7, 0.9),
        ]);
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].class_id, 7);
        assert_eq!(result.detections[0].confidence, 0.95);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let result = check(vec![
            candidate([0.0, 0.0, 10.0, 10.0], 0.8, 2, 0.9),
            candidate([100.0, 100.0, 110.0, 110.0], 0.9, 5, 0.9),
        ]);
        assert_eq!(result.detections.len(), 2);
    }
}
