//! # Monitor Lifecycle Module
//!
//! Starts and stops the acquisition thread on behalf of the control (UI)
//! thread. Encapsulates device hand-off and the cancellation handshake so
//! the caller only sees `start`, `stop` and the published readings.
//!
//! ## Key Components
//! - `Monitor`: Owns the loop state, stop flag and thread handle
//! - `LoopState`: Idle → Running → Stopping → Idle
//!
//! ## Stop protocol
//! `stop` raises an atomic flag that the loop checks once per tick, blanks
//! the BPM display right away, then waits up to the given timeout for the
//! loop to report its exit over a channel. On timeout the controller stays
//! in `Stopping` and never touches the device: the loop still owns it and
//! shuts it down itself when it finally exits.

use crate::acquisition::{AcquisitionLoop, Diagnostics, LoopSettings, Published};
use crate::config::Config;
use crate::error::MonitorError;
use crate::estimator::Estimator;
use crate::sampler::SamplerFactory;
use crate::smoother::Reading;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
}

/// Handles to the one live acquisition thread
struct ActiveLoop {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    done: Receiver<Result<(), MonitorError>>,
}

pub struct Monitor {
    factory: Box<dyn SamplerFactory>,
    estimator: Arc<dyn Estimator>,
    settings: LoopSettings,
    published: Published,
    diagnostics: Diagnostics,
    state: LoopState,
    active: Option<ActiveLoop>,
    pending_fault: Option<MonitorError>,
    drop_timeout: Duration,
}

impl Monitor {
    pub fn new(
        config: &Config,
        factory: impl SamplerFactory + 'static,
        estimator: impl Estimator + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            estimator: Arc::new(estimator),
            settings: LoopSettings::from(config),
            published: Published::new(),
            diagnostics: Diagnostics::disabled(),
            state: LoopState::Idle,
            active: None,
            pending_fault: None,
            drop_timeout: config.stop_timeout(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn reading(&self) -> Reading {
        self.published.reading()
    }

    /// Shared view of the readings, for readers on other threads
    pub fn published(&self) -> Published {
        self.published.clone()
    }

    /// Opens the device and spawns the acquisition thread.
    ///
    /// Fails with `AlreadyRunning` unless the monitor is idle; never spawns
    /// a second loop. Returns without waiting for the first sample.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        self.reap();
        if self.state != LoopState::Idle {
            return Err(MonitorError::AlreadyRunning);
        }
        // A fault nobody polled for belongs to the previous session
        if let Some(stale) = self.pending_fault.take() {
            log::debug!("Monitor: discarding fault from previous session: {}", stale);
        }

        let sampler = self.factory.open()?;
        self.published.reset();

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let mut acquisition = AcquisitionLoop::new(
            sampler,
            self.estimator.clone(),
            &self.settings,
            self.published.clone(),
            self.diagnostics.clone(),
            stop.clone(),
        );

        let handle = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                let result = acquisition.run();
                let _ = done_tx.send(result);
            })
            .map_err(MonitorError::Spawn)?;

        log::info!("Monitor: acquisition started");
        self.active = Some(ActiveLoop {
            handle,
            stop,
            done: done_rx,
        });
        self.state = LoopState::Running;
        Ok(())
    }

    /// Asks the loop to exit and waits up to `timeout` for it.
    ///
    /// A no-op when idle. On `StopTimeout` the state stays `Stopping`;
    /// calling `stop` again keeps waiting.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), MonitorError> {
        let Some(active) = &self.active else {
            return Ok(());
        };

        if self.state == LoopState::Running {
            log::info!("Monitor: stop requested");
            active.stop.store(true, Ordering::Release);
            self.published.clear_bpm();
            self.state = LoopState::Stopping;
        }

        match active.done.recv_timeout(timeout) {
            Ok(result) => {
                self.finish(result);
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.finish(Err(MonitorError::LoopPanicked));
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Monitor: loop still running after {:?}", timeout);
                Err(MonitorError::StopTimeout(timeout))
            }
        }
    }

    /// Picks up a loop that ended on its own and returns its fault, once.
    ///
    /// A loop that panicked is reported as `LoopPanicked`; either way the
    /// published reading is blanked.
    pub fn poll(&mut self) -> Option<MonitorError> {
        self.reap();
        self.pending_fault.take()
    }

    fn reap(&mut self) {
        let outcome = match &self.active {
            Some(active) => match active.done.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(MonitorError::LoopPanicked)),
            },
            None => None,
        };
        if let Some(result) = outcome {
            self.finish(result);
        }
    }

    fn finish(&mut self, result: Result<(), MonitorError>) {
        if let Some(active) = self.active.take() {
            if active.handle.join().is_err() {
                log::error!("Monitor: acquisition thread panicked");
            }
        }
        self.state = LoopState::Idle;
        log::info!("Monitor: acquisition stopped");

        if let Err(e) = result {
            log::error!("Monitor: {}", e);
            self.published.clear_reading();
            self.pending_fault = Some(e);
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Err(e) = self.stop(self.drop_timeout) {
            log::warn!("Monitor dropped with loop still running: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplerError;
    use crate::estimator::{FixedEstimator, RawEstimate};
    use crate::ring_buffer::Window;
    use crate::sampler::scripted::ScriptedSampler;
    use crate::sampler::Sampler;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn fast_config() -> Config {
        Config {
            loop_period_ms: 1,
            ..Config::default()
        }
    }

    fn fixed(bpm: f64, spo2: f64) -> FixedEstimator {
        FixedEstimator::valid(bpm, spo2)
    }

    /// Factory counting opens and sharing one shutdown counter across samplers
    fn factory<F>(
        opens: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
        build: F,
    ) -> impl SamplerFactory
    where
        F: Fn() -> ScriptedSampler + Send + Sync,
    {
        move || -> Result<Box<dyn Sampler>, SamplerError> {
            opens.fetch_add(1, Ordering::SeqCst);
            let mut sampler = build();
            sampler.shutdowns = shutdowns.clone();
            Ok(Box::new(sampler))
        }
    }

    /// Estimator that panics on its `panic_on`-th call (zero based)
    struct PanicsOnCall {
        calls: Arc<AtomicUsize>,
        panic_on: usize,
    }

    impl Estimator for PanicsOnCall {
        fn estimate(&self, _window: &Window<'_>) -> RawEstimate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.panic_on {
                panic!("estimator blew up");
            }
            RawEstimate {
                bpm: 72.0,
                bpm_valid: true,
                spo2: 98.0,
                spo2_valid: true,
            }
        }
    }

    fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens.clone(), shutdowns, || ScriptedSampler::constant(80_000, 80_000)),
            fixed(72.0, 98.0),
        );

        assert!(monitor.stop(Duration::from_millis(10)).is_ok());
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens.clone(), shutdowns.clone(), || ScriptedSampler::constant(80_000, 80_000)),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        assert!(matches!(monitor.start(), Err(MonitorError::AlreadyRunning)));
        assert_eq!(monitor.state(), LoopState::Running);
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        monitor.stop(Duration::from_secs(2)).unwrap();
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bright_signal_settles_on_estimate() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns, || {
                let mut sampler = ScriptedSampler::constant(80_000, 80_000);
                sampler.remaining = 100;
                sampler
            }),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || monitor.reading()
            == Reading { bpm: 72.0, spo2: 98.0 }));
        monitor.stop(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_dark_signal_never_shows_bpm() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns, || ScriptedSampler::constant(1_000, 1_000)),
            fixed(72.0, 98.0),
        );
        let published = monitor.published();

        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || published.history_len() >= 3));
        assert_eq!(monitor.reading().bpm, 0.0);
        monitor.stop(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_stop_blanks_bpm_and_keeps_spo2() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns, || ScriptedSampler::constant(80_000, 80_000)),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || monitor.reading().bpm > 0.0));
        monitor.stop(Duration::from_secs(2)).unwrap();

        assert_eq!(monitor.reading(), Reading { bpm: 0.0, spo2: 98.0 });
    }

    #[test]
    fn test_stop_timeout_leaves_stopping() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let (stalled_tx, stalled_rx) = crossbeam_channel::bounded(1);
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens.clone(), shutdowns.clone(), move || {
                let mut sampler = ScriptedSampler::constant(80_000, 80_000);
                sampler.stall = Some(Duration::from_millis(300));
                sampler.stalled = Some(stalled_tx.clone());
                sampler
            }),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        // The loop is inside the device call now, past its stop-flag check
        stalled_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let result = monitor.stop(Duration::from_millis(20));
        assert!(matches!(result, Err(MonitorError::StopTimeout(_))));
        assert_eq!(monitor.state(), LoopState::Stopping);
        assert_eq!(monitor.reading().bpm, 0.0);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);

        assert!(matches!(monitor.start(), Err(MonitorError::AlreadyRunning)));
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        monitor.stop(Duration::from_secs(2)).unwrap();
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sampler_fault_is_surfaced_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns.clone(), || {
                let mut sampler = ScriptedSampler::constant(80_000, 80_000);
                sampler.fail_after = Some(250);
                sampler
            }),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        let mut fault = None;
        assert!(wait_for(Duration::from_secs(2), || {
            fault = monitor.poll();
            fault.is_some()
        }));

        assert!(matches!(fault, Some(MonitorError::SamplerFault(_))));
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(monitor.reading(), Reading::default());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(monitor.poll().is_none());
    }

    #[test]
    fn test_panicked_loop_is_a_fault() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let estimator = PanicsOnCall {
            calls: calls.clone(),
            panic_on: 3,
        };
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns, || ScriptedSampler::constant(80_000, 80_000)),
            estimator,
        );

        monitor.start().unwrap();
        let mut fault = None;
        assert!(wait_for(Duration::from_secs(2), || {
            fault = monitor.poll();
            fault.is_some()
        }));

        assert!(matches!(fault, Some(MonitorError::LoopPanicked)));
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(monitor.reading(), Reading::default());
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[test]
    fn test_unpolled_fault_does_not_leak_into_next_session() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens, shutdowns.clone(), move || {
                let mut sampler = ScriptedSampler::constant(80_000, 80_000);
                // Only the first session's sensor fails
                if sessions.fetch_add(1, Ordering::SeqCst) == 0 {
                    sampler.fail_after = Some(250);
                }
                sampler
            }),
            fixed(72.0, 98.0),
        );

        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || shutdowns.load(Ordering::SeqCst) == 1));

        monitor.start().unwrap();
        assert_eq!(monitor.state(), LoopState::Running);
        assert!(monitor.poll().is_none());
        monitor.stop(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_open_failure_stays_idle() {
        let failing = || -> Result<Box<dyn Sampler>, SamplerError> {
            Err(SamplerError::Open("no device on bus".to_string()))
        };
        let mut monitor = Monitor::new(&fast_config(), failing, fixed(72.0, 98.0));

        assert!(matches!(
            monitor.start(),
            Err(MonitorError::SamplerFault(SamplerError::Open(_)))
        ));
        assert_eq!(monitor.state(), LoopState::Idle);
    }

    #[test]
    fn test_restart_begins_new_session() {
        let opens = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::new(
            &fast_config(),
            factory(opens.clone(), shutdowns.clone(), || {
                let mut sampler = ScriptedSampler::constant(80_000, 80_000);
                sampler.remaining = 100;
                sampler
            }),
            fixed(72.0, 98.0),
        );
        let published = monitor.published();

        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || published.history_len() == 1));
        monitor.stop(Duration::from_secs(2)).unwrap();

        // A fresh session starts from an empty history, so one window yields one entry
        monitor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || published.reading().bpm == 72.0));
        monitor.stop(Duration::from_secs(2)).unwrap();
        assert_eq!(published.history_len(), 1);

        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    }
}
