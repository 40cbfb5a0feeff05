//! # Temporal Smoothing Module
//!
//! Stabilises per-window estimates before they are shown.
//!
//! ## Policy
//! - Valid BPM estimates feed a rolling history of the last K values;
//!   the displayed BPM is their arithmetic mean.
//! - SpO2 is the most recent valid, positive estimate.
//! - An observation with invalid BPM changes nothing (held-last-good-value),
//!   so a single noisy window does not blank the display.
//! - The finger-detection gate zeroes only the published BPM. The raw
//!   estimate still enters the history.

use crate::display_buffer::DisplayBuffer;
use crate::estimator::RawEstimate;
use crate::gate::GateDecision;
use crate::ring_buffer::RingBuffer;

/// Externally visible reading. A zero field means "no reading".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub bpm: f64,
    pub spo2: f64,
}

#[derive(Debug)]
pub struct Smoother {
    bpm_history: RingBuffer<f64>,
    current: Reading,
}

impl Smoother {
    pub fn new(depth: usize) -> Self {
        Self {
            bpm_history: RingBuffer::new(depth),
            current: Reading::default(),
        }
    }

    /// Folds one gated estimate into the smoothed state.
    ///
    /// Returns true when the reading changed; accepted SpO2 values are also
    /// appended to `history`.
    pub fn observe(&mut self, estimate: &RawEstimate, gate: GateDecision, history: &mut DisplayBuffer) -> bool {
        let estimate = estimate.sanitized();
        if !estimate.bpm_valid {
            return false;
        }

        self.bpm_history.push(estimate.bpm);
        let mean = self.bpm_history.mean().unwrap_or(0.0);
        self.current.bpm = if gate.finger_present() { mean } else { 0.0 };

        if estimate.spo2_valid && estimate.spo2 > 0.0 {
            self.current.spo2 = estimate.spo2;
            history.push(self.current.bpm, estimate.spo2);
        }
        true
    }

    pub fn reading(&self) -> Reading {
        self.current
    }

    pub fn history_len(&self) -> usize {
        self.bpm_history.len()
    }
}
