// Hide console window on Windows in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod acquisition;
mod app;
mod charts;
mod config;
mod display_buffer;
mod error;
mod estimator;
mod gate;
mod monitor;
mod review;
mod ring_buffer;
mod sampler;
mod smoother;
mod ui;

use acquisition::{DiagnosticEvent, Diagnostics};
use app::PulseMonitorApp;
use config::Config;
use crossbeam_channel::Receiver;
use error::SamplerError;
use estimator::RatioOfRatiosEstimator;
use iced::Theme;
use monitor::Monitor;
use sampler::{Sampler, SyntheticSampler};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// Simulated subject shown when no hardware driver is linked in
const SIMULATED_BPM: f64 = 72.0;
const SIMULATED_SPO2: f64 = 97.0;

fn main() -> iced::Result {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}; falling back to defaults", e);
            Config::default()
        }
    };

    // Diagnostics are drained on their own thread so a slow logger never stalls sampling
    let (diagnostics, events) = Diagnostics::channel(config.print_raw, config.print_result);
    if config.print_raw {
        log::info!("IR, Red");
    }
    if let Err(e) = std::thread::Builder::new()
        .name("diagnostics".to_string())
        .spawn(move || drain_diagnostics(events))
    {
        log::warn!("Diagnostics disabled: {}", e);
    }

    let finger_present = Arc::new(AtomicBool::new(true));
    let sample_rate = config.sample_rate_hz;
    let finger_switch = finger_present.clone();
    let factory = move || -> Result<Box<dyn Sampler>, SamplerError> {
        Ok(Box::new(
            SyntheticSampler::new(sample_rate, SIMULATED_BPM, SIMULATED_SPO2).with_finger(finger_switch.clone()),
        ))
    };

    let monitor = Monitor::new(&config, factory, RatioOfRatiosEstimator::new(sample_rate))
        .with_diagnostics(diagnostics);

    iced::application(
        "Heart Rate and SpO2 Monitor",
        PulseMonitorApp::update,
        PulseMonitorApp::view,
    )
    .subscription(PulseMonitorApp::subscription)
    .theme(|_| Theme::Light)
    .window_size((360.0, 560.0))
    .run_with(move || PulseMonitorApp::new(monitor, finger_present, config))
}

fn drain_diagnostics(events: Receiver<DiagnosticEvent>) {
    for event in events {
        match event {
            DiagnosticEvent::RawSample(sample) => log::info!("{}, {}", sample.ir, sample.red),
            DiagnosticEvent::FingerNotDetected => log::info!("Finger not detected"),
            DiagnosticEvent::WindowResult { bpm, spo2 } => {
                log::info!("BPM: {:.2}, SpO2: {:.2}", bpm, spo2)
            }
        }
    }
    log::info!("Diagnostics channel closed");
}
