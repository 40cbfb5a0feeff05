//! Finger-detection gate.
//!
//! Low mean intensity on both channels means nothing is covering the LEDs,
//! and whatever the estimator produced from that window is noise.

use crate::ring_buffer::Window;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Tissue present; the estimate passes through
    Pass(f64),
    /// No finger on the sensor; BPM forced to zero
    NoFinger,
}

impl GateDecision {
    pub fn adjusted_bpm(&self) -> f64 {
        match self {
            GateDecision::Pass(bpm) => *bpm,
            GateDecision::NoFinger => 0.0,
        }
    }

    pub fn finger_present(&self) -> bool {
        matches!(self, GateDecision::Pass(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidityGate {
    presence_threshold: f64,
}

impl ValidityGate {
    pub fn new(presence_threshold: u32) -> Self {
        Self {
            presence_threshold: f64::from(presence_threshold),
        }
    }

    pub fn apply(&self, bpm: f64, window: &Window<'_>) -> GateDecision {
        if window.mean_ir() < self.presence_threshold && window.mean_red() < self.presence_threshold {
            GateDecision::NoFinger
        } else {
            GateDecision::Pass(bpm)
        }
    }
}
