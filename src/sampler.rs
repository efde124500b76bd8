// src/sampler.rs

/// Cadence gate for the frame stream: one candidate frame per `cadence`
/// decoded frames, counted from the last reset point rather than the
/// absolute stream position.
pub struct Sampler {
    cadence: u32,
    counter: u32,
}

impl Sampler {
    pub fn new(cadence: u32) -> Self {
        debug_assert!(cadence > 0, "sampling cadence must be at least 1");
        Self {
            cadence: cadence.max(1),
            counter: 0,
        }
    }

    /// Register one decoded frame. Returns true exactly when this frame is
    /// a sampling point; the internal counter restarts from zero on emit.
    pub fn observe(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.cadence {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Restart the cadence count. Called when the vehicle gate rejects a
    /// sampled frame, so the next sample lands a full cadence later.
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
