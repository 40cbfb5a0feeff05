//! # Configuration Management Module
//!
//! Persistent monitor settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for the pipeline's numeric policy.
//!
//! ## Settings
//! - `window_size`: Samples per estimation window (one estimate per full window)
//! - `smoothing_depth`: Number of recent valid BPM estimates averaged for display
//! - `presence_threshold`: Mean raw intensity below which no finger is assumed.
//!   Both channels must fall below it; 50000 sits well under the ADC level seen
//!   with tissue on the sensor at default LED current.
//! - `loop_period_ms`: Target acquisition tick period
//! - `stop_timeout_ms`: How long `stop` waits for the loop to exit
//! - `display_refresh_ms`: UI refresh cadence for the readings
//! - `sample_rate_hz`: Sensor output rate, used by the estimator. Together with
//!   `window_size` it fixes the window duration, which must span two beats at
//!   the slowest rate the estimator accepts or slow pulses never read.
//! - `print_raw` / `print_result`: Diagnostic sink switches
//! - `review_window` / `review_order`: Offline smoothing filter shape
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/pulse-monitor/config.toml
//! - Linux: ~/.config/pulse-monitor/config.toml
//! - Windows: %APPDATA%\pulse-monitor\config.toml

use crate::error::ConfigError;
use crate::estimator::MIN_BPM;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WINDOW_SIZE: usize = 100;
pub const DEFAULT_SMOOTHING_DEPTH: usize = 4;
pub const DEFAULT_PRESENCE_THRESHOLD: u32 = 50_000;
// 100 samples at 25 Hz: a 4 s window
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window_size: usize,
    pub smoothing_depth: usize,
    pub presence_threshold: u32,
    pub loop_period_ms: u64,
    pub stop_timeout_ms: u64,
    pub display_refresh_ms: u64,
    pub sample_rate_hz: u32,
    pub print_raw: bool,
    pub print_result: bool,
    pub review_window: usize,
    pub review_order: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            smoothing_depth: DEFAULT_SMOOTHING_DEPTH,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
            loop_period_ms: 10,
            stop_timeout_ms: 2000,
            display_refresh_ms: 500,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            print_raw: false,
            print_result: true,
            review_window: 51,
            review_order: 3,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulse-monitor")
            .join("config.toml")
    }

    /// Load config from the default location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Load config from `path`, writing defaults there if the file is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config.sanitized())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Clamp hand-edited values into ranges the pipeline can run with
    pub fn sanitized(mut self) -> Self {
        self.window_size = self.window_size.max(1);
        self.smoothing_depth = self.smoothing_depth.max(1);
        self.loop_period_ms = self.loop_period_ms.max(1);
        self.sample_rate_hz = self.sample_rate_hz.max(1);
        self.display_refresh_ms = self.display_refresh_ms.max(16);
        if self.review_window % 2 == 0 {
            self.review_window += 1;
        }
        if self.review_order >= self.review_window {
            self.review_order = self.review_window - 1;
        }
        if self.window_duration() < Self::min_window_duration() {
            log::warn!(
                "Window of {} samples at {} Hz is shorter than {:?}; pulses below {} BPM will not read",
                self.window_size,
                self.sample_rate_hz,
                Self::min_window_duration(),
                (120.0 / self.window_duration().as_secs_f64()).round()
            );
        }
        self
    }

    /// Time covered by one full estimation window
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs_f64(self.window_size as f64 / f64::from(self.sample_rate_hz.max(1)))
    }

    /// Two beats at the slowest accepted pulse
    fn min_window_duration() -> Duration {
        Duration::from_secs_f64(2.0 * 60.0 / MIN_BPM)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn display_refresh(&self) -> Duration {
        Duration::from_millis(self.display_refresh_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_size, 100);
        assert_eq!(config.smoothing_depth, 4);
        assert_eq!(config.presence_threshold, 50_000);
        assert_eq!(config.loop_period(), Duration::from_millis(10));
        assert_eq!(config.stop_timeout(), Duration::from_secs(2));
        assert_eq!(config.sample_rate_hz, 25);
    }

    #[test]
    fn test_default_window_spans_two_slow_beats() {
        let config = Config::default();
        assert_eq!(config.window_duration(), Duration::from_secs(4));
        assert!(config.window_duration() >= Config::min_window_duration());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            print_raw: true,
            smoothing_depth: 8,
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("print_raw = true"));
        assert!(toml_str.contains("smoothing_depth = 8"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            presence_threshold = 30000
            print_result = false
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.presence_threshold, 30_000);
        assert!(!config.print_result);
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            stop_timeout_ms: 500,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.stop_timeout_ms, 500);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "window_size = \"lots\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_sanitized_clamps_degenerate_values() {
        let config = Config {
            window_size: 0,
            smoothing_depth: 0,
            review_window: 4,
            review_order: 9,
            ..Config::default()
        }
        .sanitized();

        assert_eq!(config.window_size, 1);
        assert_eq!(config.smoothing_depth, 1);
        assert_eq!(config.review_window, 5);
        assert_eq!(config.review_order, 4);
    }
}
