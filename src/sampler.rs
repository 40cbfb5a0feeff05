//! # Sensor Sampling Module
//!
//! Device-facing contract consumed by the acquisition loop, plus a simulated
//! pulse-oximeter used when no physical sensor driver is wired in.
//!
//! ## Key Types
//! - `Sampler`: Drains the sensor FIFO one sample at a time
//! - `SamplerFactory`: Opens a device; called by the controller on `start`
//! - `SyntheticSampler`: Deterministic dual-channel PPG generator
//!
//! ## Threading
//! A sampler is opened on the control thread and then moved into the
//! acquisition thread, which is the only place it is used afterwards.
//! `shutdown` is called exactly once, when the loop exits.

use crate::error::SamplerError;
use crate::ring_buffer::Sample;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Sampler: Send {
    /// Number of samples waiting in the device FIFO
    fn available_count(&mut self) -> Result<usize, SamplerError>;
    /// Pops the oldest waiting sample
    fn read_one(&mut self) -> Result<Sample, SamplerError>;
    /// Powers the device down
    fn shutdown(&mut self) -> Result<(), SamplerError>;
}

pub trait SamplerFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn Sampler>, SamplerError>;
}

impl<F> SamplerFactory for F
where
    F: Fn() -> Result<Box<dyn Sampler>, SamplerError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn Sampler>, SamplerError> {
        self()
    }
}

// MAX3010x-class parts buffer 32 samples before overwriting the oldest
const FIFO_DEPTH: u64 = 32;
const IR_DC: f64 = 100_000.0;
const RED_DC: f64 = 90_000.0;
const IR_PERFUSION: f64 = 0.02;
// Ambient light only, well under the finger-detection threshold
const NO_FINGER_DC: f64 = 2_000.0;

/// Simulated sensor producing a clean PPG at a fixed pulse rate and saturation
pub struct SyntheticSampler {
    sample_rate_hz: f64,
    bpm: f64,
    red_perfusion: f64,
    finger_present: Arc<AtomicBool>,
    started: Instant,
    emitted: u64,
    shut_down: bool,
}

impl SyntheticSampler {
    pub fn new(sample_rate_hz: u32, bpm: f64, spo2: f64) -> Self {
        // Invert SpO2 = 110 - 25R to pick the red perfusion that yields `spo2`
        let ratio = ((110.0 - spo2) / 25.0).max(0.0);
        Self {
            sample_rate_hz: f64::from(sample_rate_hz.max(1)),
            bpm,
            red_perfusion: IR_PERFUSION * ratio,
            finger_present: Arc::new(AtomicBool::new(true)),
            started: Instant::now(),
            emitted: 0,
            shut_down: false,
        }
    }

    /// Shares a finger-present switch with the caller
    pub fn with_finger(mut self, finger_present: Arc<AtomicBool>) -> Self {
        self.finger_present = finger_present;
        self
    }

    /// Sample `index` of the simulated stream
    pub fn sample_at(&self, index: u64) -> Sample {
        if !self.finger_present.load(Ordering::Relaxed) {
            return Sample::new(NO_FINGER_DC as u32, NO_FINGER_DC as u32);
        }
        let t = index as f64 / self.sample_rate_hz;
        let pulse = (2.0 * PI * self.bpm / 60.0 * t).sin();
        let red = RED_DC * (1.0 + self.red_perfusion * pulse);
        let ir = IR_DC * (1.0 + IR_PERFUSION * pulse);
        Sample::new(red.round() as u32, ir.round() as u32)
    }

    fn produced(&self) -> u64 {
        (self.started.elapsed().as_secs_f64() * self.sample_rate_hz) as u64
    }
}

impl Sampler for SyntheticSampler {
    fn available_count(&mut self) -> Result<usize, SamplerError> {
        if self.shut_down {
            return Err(SamplerError::Read("sensor is powered down".to_string()));
        }
        let produced = self.produced();
        if produced.saturating_sub(self.emitted) > FIFO_DEPTH {
            log::trace!("FIFO overflow, dropping {} samples", produced - self.emitted - FIFO_DEPTH);
            self.emitted = produced - FIFO_DEPTH;
        }
        Ok(produced.saturating_sub(self.emitted) as usize)
    }

    fn read_one(&mut self) -> Result<Sample, SamplerError> {
        if self.shut_down {
            return Err(SamplerError::Read("sensor is powered down".to_string()));
        }
        let sample = self.sample_at(self.emitted);
        self.emitted += 1;
        Ok(sample)
    }

    fn shutdown(&mut self) -> Result<(), SamplerError> {
        self.shut_down = true;
        Ok(())
    }
}
