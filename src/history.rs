// src/history.rs

use std::collections::VecDeque;

/// Number of recent scores retained per video.
pub const HISTORY_CAPACITY: usize = 128;

/// Bounded FIFO window of raw classifier scores for one video.
///
/// The video-level verdict is computed from the full boolean sequence, not
/// from this window; the window exists for the running mean shown while
/// processing and for temporal smoothing.
pub struct PredictionHistory {
    scores: VecDeque<f32>,
    capacity: usize,
}

impl PredictionHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a score, evicting the oldest entry when at capacity.
    pub fn push(&mut self, score: f32) {
        if self.scores.len() == self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    /// Arithmetic mean of the currently held scores; 0.0 when empty.
    pub fn mean(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_last_128_in_order() {
        let mut history = PredictionHistory::new();
        for i in 0..130 {
            history.push(i as f32);
        }

        assert_eq!(history.len(), 128);
        let held: Vec<f32> = history.scores.iter().copied().collect();
        let expected: Vec<f32> = (2..130).map(|i| i as f32).collect();
        assert_eq!(held, expected);
    }

    #[test]
    fn test_mean_of_window() {
        let mut history = PredictionHistory::new();
        history.push(0.2);
        history.push(0.4);
        history.push(0.6);
        assert!((history.mean() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mean_of_empty_window() {
        let history = PredictionHistory::new();
        assert_eq!(history.mean(), 0.0);
    }

    #[test]
    fn test_mean_tracks_eviction() {
        let mut history = PredictionHistory::with_capacity(2);
        history.push(1.0);
        history.push(0.0);
        history.push(0.0);
        assert_eq!(history.mean(), 0.0);
    }
}
