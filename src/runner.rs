// src/runner.rs
//
// Per-video orchestration: cadence sampling -> vehicle gate -> frame
// classification -> bounded history + boolean sequence -> verdict.
// One runner owns the state for exactly one video and is consumed by
// `run`; nothing survives into the next video.

use crate::classifier::{self, Classifier};
use crate::gate;
use crate::history::PredictionHistory;
use crate::sampler::Sampler;
use crate::types::Frame;
use crate::vehicle_detection::Detector;
use crate::verdict::{self, AggregationPolicy};
use crate::video::{FrameSink, FrameSource};
use anyhow::Result;
use tracing::{debug, info};

/// What happened to one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Not a sampling point; dropped without touching the detector.
    Discarded,
    /// Sampled but no vehicle found; cadence counter restarted.
    GateRejected,
    /// Sampled, gated and classified.
    Classified { score: f32, is_violation: bool },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunnerStats {
    pub frames_decoded: u64,
    pub frames_sampled: u64,
    pub gate_rejections: u64,
    pub frames_classified: u64,
    pub positives: u64,
}

/// Final result for one video.
#[derive(Debug)]
pub struct VideoOutcome {
    pub verdict: bool,
    /// 1-based positions of positive samples in the classified sequence.
    pub true_indices: Vec<usize>,
    pub stats: RunnerStats,
}

pub struct VideoRunner<'a, D, C, K> {
    detector: &'a mut D,
    classifier: &'a mut C,
    sink: &'a mut K,
    sampler: Sampler,
    policy: AggregationPolicy,
    history: PredictionHistory,
    flags: Vec<bool>,
    stats: RunnerStats,
}

impl<'a, D, C, K> VideoRunner<'a, D, C, K>
where
    D: Detector,
    C: Classifier,
    K: FrameSink,
{
    pub fn new(
        detector: &'a mut D,
        classifier: &'a mut C,
        sink: &'a mut K,
        cadence: u32,
        policy: AggregationPolicy,
    ) -> Self {
        Self {
            detector,
            classifier,
            sink,
            sampler: Sampler::new(cadence),
            policy,
            history: PredictionHistory::new(),
            flags: Vec::new(),
            stats: RunnerStats::default(),
        }
    }

    /// Drain the source and produce the video verdict. A detector or
    /// classifier failure aborts this video only; the error carries up to
    /// the batch driver.
    pub fn run<S: FrameSource>(mut self, source: &mut S) -> Result<VideoOutcome> {
        while let Some(frame) = source.next_frame()? {
            self.step(&frame)?;
        }
        Ok(self.finish())
    }

    fn step(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        self.stats.frames_decoded += 1;

        if !self.sampler.observe() {
            return Ok(FrameOutcome::Discarded);
        }
        self.stats.frames_sampled += 1;

        let candidates = self.detector.detect(frame)?;
        let gated = gate::check(candidates);
        if !gated.accepted {
            self.sampler.reset();
            self.stats.gate_rejections += 1;
            debug!("Frame {}: no vehicle, sampler reset", frame.index);
            return Ok(FrameOutcome::GateRejected);
        }

        let prediction = classifier::predict(self.classifier, frame)?;
        self.flags.push(prediction.is_violation);
        self.history.push(prediction.score);
        if prediction.is_violation {
            self.stats.positives += 1;
        }
        self.stats.frames_classified += 1;

        debug!(
            "Frame {}: score={:.3}, violation={}, window mean={:.3}",
            frame.index,
            prediction.score,
            prediction.is_violation,
            self.history.mean()
        );

        self.sink.write(frame, &gated.detections, prediction.is_violation)?;

        Ok(FrameOutcome::Classified {
            score: prediction.score,
            is_violation: prediction.is_violation,
        })
    }

    fn finish(self) -> VideoOutcome {
        // No frame ever passed the gate: nothing to aggregate, not a
        // violation.
        let true_indices = verdict::true_indices(&self.flags);
        let verdict = self.policy.decide(&true_indices);

        info!(
            "Video done: {} classified sample(s), {} positive, verdict={}",
            self.flags.len(),
            true_indices.len(),
            verdict
        );

        VideoOutcome {
            verdict,
            true_indices,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, Detection};

    struct VecSource {
        frames: Vec<Frame>,
        pos: usize,
    }

    impl VecSource {
        fn with_frames(count: u64) -> Self {
            let frames = (1..=count)
                .map(|index| Frame {
                    data: vec![0u8; 12],
                    width: 2,
                    height: 2,
                    index,
                })
                .collect();
            Self { frames, pos: 0 }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let frame = self.frames.get(self.pos).cloned();
            self.pos += 1;
            Ok(frame)
        }
    }

    /// Detector returning one confident car box for frames whose index
    /// satisfies the predicate, nothing otherwise.
    struct ScriptedDetector<F: Fn(u64) -> bool> {
        vehicle_at: F,
    }

    impl<F: Fn(u64) -> bool> Detector for ScriptedDetector<F> {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Candidate>> {
            if (self.vehicle_at)(frame.index) {
                Ok(vec![Candidate {
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    confidence: 0.9,
                    class_id: 2,
                    class_score: 0.9,
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct ScriptedClassifier {
        scores: Vec<f32>,
        calls: usize,
    }

    impl Classifier for ScriptedClassifier {
        fn classify(&mut self, _frame: &Frame) -> Result<f32> {
            let score = self.scores[self.calls.min(self.scores.len() - 1)];
            self.calls += 1;
            Ok(score)
        }
    }

    #[derive(Default)]
    struct CountingSink {
        written: usize,
    }

    impl FrameSink for CountingSink {
        fn write(
            &mut self,
            _frame: &Frame,
            _detections: &[Detection],
            _violation: bool,
        ) -> Result<()> {
            self.written += 1;
            Ok(())
        }

        fn frames_written(&self) -> usize {
            self.written
        }
    }

    #[test]
    fn test_clustered_positives_yield_violation_verdict() {
        let mut source = VecSource::with_frames(100);
        let mut detector = ScriptedDetector {
            vehicle_at: |_| true,
        };
        let mut classifier = ScriptedClassifier {
            scores: vec![0.9; 10],
            calls: 0,
        };
        let mut sink = CountingSink::default();

        let runner = VideoRunner::new(
            &mut detector,
            &mut classifier,
            &mut sink,
            10,
            AggregationPolicy::default(),
        );
        let outcome = runner.run(&mut source).unwrap();

        assert!(outcome.verdict);
        assert_eq!(outcome.stats.frames_decoded, 100);
        assert_eq!(outcome.stats.frames_sampled, 10);
        assert_eq!(outcome.stats.frames_classified, 10);
        assert_eq!(outcome.true_indices, (1..=10).collect::<Vec<_>>());
        // One annotated frame per classified sample.
        assert_eq!(sink.frames_written(), 10);
    }

    #[test]
    fn test_no_vehicle_means_no_violation_and_no_output() {
        let mut source = VecSource::with_frames(100);
        let mut detector = ScriptedDetector {
            vehicle_at: |_| false,
        };
        let mut classifier = ScriptedClassifier {
            scores: vec![0.9],
            calls: 0,
        };
        let mut sink = CountingSink::default();

        let runner = VideoRunner::new(
            &mut detector,
            &mut classifier,
            &mut sink,
            10,
            AggregationPolicy::default(),
        );
        let outcome = runner.run(&mut source).unwrap();

        assert!(!outcome.verdict);
        assert!(outcome.true_indices.is_empty());
        assert_eq!(outcome.stats.frames_sampled, 10);
        assert_eq!(outcome.stats.gate_rejections, 10);
        assert_eq!(outcome.stats.frames_classified, 0);
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn test_gate_rejection_restarts_cadence() {
        // Cadence 30, vehicle absent at frame 30 only: samples land at
        // 30, 60, 90 and only 60 and 90 are classified.
        let mut source = VecSource::with_frames(90);
        let mut detector = ScriptedDetector {
            vehicle_at: |index| index != 30,
        };
        let mut classifier = ScriptedClassifier {
            scores: vec![0.2],
            calls: 0,
        };
        let mut sink = CountingSink::default();

        let runner = VideoRunner::new(
            &mut detector,
            &mut classifier,
            &mut sink,
            30,
            AggregationPolicy::default(),
        );
        let outcome = runner.run(&mut source).unwrap();

        assert_eq!(outcome.stats.frames_sampled, 3);
        assert_eq!(outcome.stats.gate_rejections, 1);
        assert_eq!(outcome.stats.frames_classified, 2);
        assert!(!outcome.verdict);
    }

    #[test]
    fn test_scattered_positives_rejected() {
        // 104 samples; positives at sample positions 1, 2, 3 and 100.
        let mut source = VecSource::with_frames(1040);
        let mut detector = ScriptedDetector {
            vehicle_at: |_| true,
        };
        let mut scores = vec![0.1; 104];
        scores[0] = 0.9;
        scores[1] = 0.9;
        scores[2] = 0.9;
        scores[99] = 0.9;
        let mut classifier = ScriptedClassifier { scores, calls: 0 };
        let mut sink = CountingSink::default();

        let runner = VideoRunner::new(
            &mut detector,
            &mut classifier,
            &mut sink,
            10,
            AggregationPolicy::default(),
        );
        let outcome = runner.run(&mut source).unwrap();

        assert_eq!(outcome.true_indices, vec![1, 2, 3, 100]);
        assert!(!outcome.verdict);
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Candidate>> {
            anyhow::bail!("detector backend unavailable")
        }
    }

    #[test]
    fn test_capability_failure_surfaces_as_error() {
        let mut source = VecSource::with_frames(20);
        let mut detector = FailingDetector;
        let mut classifier = ScriptedClassifier {
            scores: vec![0.0],
            calls: 0,
        };
        let mut sink = CountingSink::default();

        let runner = VideoRunner::new(
            &mut detector,
            &mut classifier,
            &mut sink,
            10,
            AggregationPolicy::default(),
        );
        assert!(runner.run(&mut source).is_err());
    }
}
