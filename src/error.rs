//! # Error Types Module
//!
//! Centralized error handling for the pulse monitor.
//! Provides custom error types for each concern with proper context and error chaining.
//!
//! ## Error Types
//! - `SamplerError`: Sensor device open/read/shutdown failures
//! - `MonitorError`: Lifecycle failures surfaced to the control context
//! - `ConfigError`: Configuration file I/O and parsing errors
//!
//! ## Usage Examples
//! ```rust
//! // Monitor module uses MonitorError
//! pub fn start(&mut self) -> Result<(), MonitorError> { ... }
//! pub fn stop(&mut self, timeout: Duration) -> Result<(), MonitorError> { ... }
//!
//! // Sampler implementations use SamplerError
//! fn read_one(&mut self) -> Result<Sample, SamplerError> { ... }
//! ```
//!
//! Estimation problems (NaN, degenerate windows) are not errors: they surface
//! as invalid `RawEstimate`s and are absorbed by the smoother.

use std::fmt;
use std::time::Duration;

/// Errors raised by a sensor device behind the `Sampler` contract
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerError {
    /// Device could not be opened or initialised
    Open(String),
    /// Reading the sample count or a sample failed
    Read(String),
    /// Powering the device down failed
    Shutdown(String),
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerError::Open(msg) => write!(f, "Failed to open sensor: {}", msg),
            SamplerError::Read(msg) => write!(f, "Failed to read from sensor: {}", msg),
            SamplerError::Shutdown(msg) => write!(f, "Failed to shut down sensor: {}", msg),
        }
    }
}

impl std::error::Error for SamplerError {}

/// Errors surfaced by the lifecycle controller
#[derive(Debug)]
pub enum MonitorError {
    /// `start()` called while a loop is running or stopping
    AlreadyRunning,
    /// The acquisition loop did not exit within the stop bound
    StopTimeout(Duration),
    /// The sensor failed; the session is over
    SamplerFault(SamplerError),
    /// The acquisition thread could not be spawned
    Spawn(std::io::Error),
    /// The acquisition thread died without reporting how it exited
    LoopPanicked,
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::AlreadyRunning => {
                write!(f, "Monitor is already running")
            }
            MonitorError::StopTimeout(timeout) => {
                write!(f, "Acquisition loop did not stop within {:?}", timeout)
            }
            MonitorError::SamplerFault(e) => {
                write!(f, "Sensor fault: {}", e)
            }
            MonitorError::Spawn(e) => {
                write!(f, "Failed to spawn acquisition thread: {}", e)
            }
            MonitorError::LoopPanicked => {
                write!(f, "Acquisition thread panicked")
            }
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::SamplerFault(e) => Some(e),
            MonitorError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SamplerError> for MonitorError {
    fn from(e: SamplerError) -> Self {
        MonitorError::SamplerFault(e)
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}
