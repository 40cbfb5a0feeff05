//! # Acquisition Loop Module
//!
//! The sampling/estimation pipeline run on the acquisition thread.
//!
//! ## Per-tick flow
//! ```text
//! Sampler ──drain──▶ RingBuffer ──(full)──▶ Estimator ──▶ ValidityGate ──▶ Smoother
//!                                                                          │
//!                                              Published (reading + display history)
//! ```
//!
//! ## Key Types
//! - `AcquisitionLoop`: Owns the device, window, gate and smoother for one session
//! - `Published`: Lock-guarded reading + display history shared with the UI
//! - `Diagnostics`: Non-blocking side channel for raw samples and results
//!
//! The loop targets a fixed period but never skips or doubles a tick: if
//! processing runs long, the next tick simply starts late.

use crate::config::Config;
use crate::display_buffer::DisplayBuffer;
use crate::error::{MonitorError, SamplerError};
use crate::estimator::Estimator;
use crate::gate::ValidityGate;
use crate::ring_buffer::{RingBuffer, Sample};
use crate::sampler::Sampler;
use crate::smoother::{Reading, Smoother};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Capacity of the diagnostic channel; events beyond it are dropped
const DIAGNOSTIC_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct SharedState {
    reading: Reading,
    history: DisplayBuffer,
}

/// Readings published by the acquisition thread.
///
/// BPM and SpO2 are always written together under one lock, so a reader
/// never sees a BPM paired with a SpO2 from a different window.
#[derive(Debug, Clone, Default)]
pub struct Published {
    inner: Arc<Mutex<SharedState>>,
}

impl Published {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        // Readings stay usable even if a writer panicked mid-update
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reading(&self) -> Reading {
        self.lock().reading
    }

    /// Number of readings recorded this session
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn spo2_history(&self) -> Vec<f64> {
        self.lock().history.spo2_series()
    }

    /// Blank the BPM display without touching SpO2 or history
    pub fn clear_bpm(&self) {
        self.lock().reading.bpm = 0.0;
    }

    pub fn clear_reading(&self) {
        self.lock().reading = Reading::default();
    }

    /// New session: reading and history both cleared
    pub fn reset(&self) {
        let mut state = self.lock();
        state.reading = Reading::default();
        state.history.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticEvent {
    RawSample(Sample),
    FingerNotDetected,
    WindowResult { bpm: f64, spo2: f64 },
}

/// Observational sink fed from the acquisition thread.
///
/// Sends never block: when the channel is full or nobody is listening the
/// event is dropped.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    sender: Option<Sender<DiagnosticEvent>>,
    raw: bool,
    results: bool,
}

impl Diagnostics {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates a sink and the receiver that drains it
    pub fn channel(raw: bool, results: bool) -> (Self, Receiver<DiagnosticEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(DIAGNOSTIC_CAPACITY);
        (
            Self {
                sender: Some(sender),
                raw,
                results,
            },
            receiver,
        )
    }

    fn emit(&self, event: DiagnosticEvent) {
        let wanted = match event {
            DiagnosticEvent::RawSample(_) => self.raw,
            _ => self.results,
        };
        if !wanted {
            return;
        }
        if let Some(sender) = &self.sender {
            match sender.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => log::trace!("Diagnostic channel full, dropping event"),
            }
        }
    }
}

/// Numeric policy for one acquisition session
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub window_size: usize,
    pub smoothing_depth: usize,
    pub presence_threshold: u32,
    pub period: Duration,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            window_size: config.window_size,
            smoothing_depth: config.smoothing_depth,
            presence_threshold: config.presence_threshold,
            period: config.loop_period(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    NotStarted,
    Sampling,
    Stopped,
}

pub struct AcquisitionLoop {
    sampler: Box<dyn Sampler>,
    estimator: Arc<dyn Estimator>,
    window: RingBuffer<Sample>,
    gate: ValidityGate,
    smoother: Smoother,
    published: Published,
    diagnostics: Diagnostics,
    period: Duration,
    stop: Arc<AtomicBool>,
    phase: LoopPhase,
}

impl AcquisitionLoop {
    pub fn new(
        sampler: Box<dyn Sampler>,
        estimator: Arc<dyn Estimator>,
        settings: &LoopSettings,
        published: Published,
        diagnostics: Diagnostics,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sampler,
            estimator,
            window: RingBuffer::new(settings.window_size),
            gate: ValidityGate::new(settings.presence_threshold),
            smoother: Smoother::new(settings.smoothing_depth),
            published,
            diagnostics,
            period: settings.period,
            stop,
            phase: LoopPhase::NotStarted,
        }
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Runs ticks until the stop flag is set or the sampler fails.
    ///
    /// The device is shut down before returning, on every path.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        self.phase = LoopPhase::Sampling;
        log::info!("Acquisition loop started ({:?} period)", self.period);

        let result = loop {
            if self.stop.load(Ordering::Acquire) {
                break Ok(());
            }
            let tick_started = Instant::now();
            if let Err(e) = self.tick() {
                break Err(e);
            }
            thread::sleep(self.period.saturating_sub(tick_started.elapsed()));
        };

        if let Err(e) = &result {
            log::error!("Acquisition loop aborted: {}", e);
            self.published.clear_reading();
        }
        self.release();
        log::info!("Acquisition loop stopped");
        result.map_err(MonitorError::SamplerFault)
    }

    /// One pass: drain the FIFO, then estimate if the window is full
    pub fn tick(&mut self) -> Result<(), SamplerError> {
        let available = self.sampler.available_count()?;
        if available == 0 {
            return Ok(());
        }

        for _ in 0..available {
            let sample = self.sampler.read_one()?;
            log::trace!("{}, {}", sample.ir, sample.red);
            self.window.push(sample);
            self.diagnostics.emit(DiagnosticEvent::RawSample(sample));
        }

        if self.window.is_full() {
            self.process_window();
        } else {
            log::trace!("Window filling: {}/{}", self.window.len(), self.window.capacity());
        }
        Ok(())
    }

    fn process_window(&mut self) {
        let window = self.window.snapshot();
        let estimate = self.estimator.estimate(&window);
        let decision = self.gate.apply(estimate.bpm, &window);
        log::trace!("Gate: {:.2} -> {:.2}", estimate.bpm, decision.adjusted_bpm());
        if !decision.finger_present() {
            log::debug!("Finger not detected");
            self.diagnostics.emit(DiagnosticEvent::FingerNotDetected);
        }

        let smoother = &mut self.smoother;
        let stop = &self.stop;
        let published = {
            let mut state = self.published.lock();
            if !smoother.observe(&estimate, decision, &mut state.history) {
                return;
            }
            state.reading = smoother.reading();
            // A stop that landed mid-tick has already blanked BPM; keep it blank
            if stop.load(Ordering::Acquire) {
                state.reading.bpm = 0.0;
            }
            state.reading
        };

        log::debug!(
            "BPM: {:.2}, SpO2: {:.2} ({} beats averaged)",
            published.bpm,
            published.spo2,
            self.smoother.history_len()
        );
        self.diagnostics.emit(DiagnosticEvent::WindowResult {
            bpm: published.bpm,
            spo2: published.spo2,
        });
    }

    fn release(&mut self) {
        if self.phase == LoopPhase::Stopped {
            return;
        }
        self.phase = LoopPhase::Stopped;
        if let Err(e) = self.sampler.shutdown() {
            log::warn!("{}", e);
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        // Covers a loop that was never run or whose thread panicked
        self.release();
    }
}
