use serde::{Deserialize, Serialize};

/// One decoded video frame, RGB interleaved, row-major.
/// Ephemeral: produced by the source, consumed by the gate/classifier/sink
/// within the same loop iteration.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// 1-based position in the decoded stream.
    pub index: u64,
}

/// Raw detector output for one candidate box, before any thresholding.
///
/// `confidence` is the box objectness, `class_score` the score of the best
/// class. The vehicle gate applies both thresholds, not the detector.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bbox: [f32; 4], // [x1, y1, x2, y2] in source image coordinates
    pub confidence: f32,
    pub class_id: usize,
    pub class_score: f32,
}

/// A detection that survived the vehicle gate, kept for annotation.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: String,
}

/// One video in the remote store, identified by its full object name
/// (e.g. `driver-id/clip_0412.mp4`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoTask {
    pub object_name: String,
}

/// A base filename starting with this marker means the video has already
/// been triaged in a previous run.
pub const PROCESSED_MARKER: char = '1';

impl VideoTask {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
        }
    }

    /// Final path component of the object name.
    pub fn base_name(&self) -> &str {
        self.object_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.object_name)
    }

    /// First path component: the owning driver's document id.
    pub fn driver_id(&self) -> &str {
        self.object_name
            .split('/')
            .next()
            .unwrap_or(&self.object_name)
    }

    /// True when the base filename carries the processed marker.
    pub fn is_processed(&self) -> bool {
        self.base_name().starts_with(PROCESSED_MARKER)
    }

    /// Object name the task gets on a positive verdict:
    /// `dir/name.mp4` -> `dir/1_name.mp4`.
    pub fn marked_name(&self) -> String {
        let base = self.base_name();
        match self.object_name.rfind('/') {
            Some(pos) => format!(
                "{}/{}_{}",
                &self.object_name[..pos],
                PROCESSED_MARKER,
                base
            ),
            None => format!("{}_{}", PROCESSED_MARKER, base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_name_components() {
        let task = VideoTask::new("driver42/trip_003.mp4");
        assert_eq!(task.base_name(), "trip_003.mp4");
        assert_eq!(task.driver_id(), "driver42");
        assert!(!task.is_processed());
    }

    #[test]
    fn test_marker_detection() {
        let task = VideoTask::new("driver42/1_trip_003.mp4");
        assert!(task.is_processed());
    }

    #[test]
    fn test_marked_name() {
        let task = VideoTask::new("driver42/trip_003.mp4");
        assert_eq!(task.marked_name(), "driver42/1_trip_003.mp4");

        let flat = VideoTask::new("trip_003.mp4");
        assert_eq!(flat.marked_name(), "1_trip_003.mp4");
    }
}
