//! # Estimation Module
//!
//! Converts a full window of dual-channel intensity into raw BPM and SpO2
//! candidates. The pipeline only depends on the `Estimator` trait; the
//! ratio-of-ratios implementation here is the default used by the binary.
//!
//! ## Algorithm (`RatioOfRatiosEstimator`)
//! 1. Remove the DC level (window mean) from each channel
//! 2. Smooth the IR channel with a short moving average
//! 3. Find IR peaks above zero separated by a refractory gap
//! 4. BPM = 60 * sample_rate / mean peak-to-peak interval
//! 5. R = (AC_red / DC_red) / (AC_ir / DC_ir), SpO2 = 110 - 25R
//!
//! Anything non-finite or outside physiological range is reported as invalid.

use crate::ring_buffer::Window;

/// Output of one estimation pass over a full window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEstimate {
    pub bpm: f64,
    pub bpm_valid: bool,
    pub spo2: f64,
    pub spo2_valid: bool,
}

impl RawEstimate {
    pub fn invalid() -> Self {
        Self {
            bpm: 0.0,
            bpm_valid: false,
            spo2: 0.0,
            spo2_valid: false,
        }
    }

    /// Downgrades NaN/infinite values to invalid so they never reach the smoother
    pub fn sanitized(self) -> Self {
        Self {
            bpm_valid: self.bpm_valid && self.bpm.is_finite(),
            spo2_valid: self.spo2_valid && self.spo2.is_finite(),
            ..self
        }
    }
}

/// Pure window -> estimate mapping, called from the acquisition thread
pub trait Estimator: Send + Sync {
    fn estimate(&self, window: &Window<'_>) -> RawEstimate;
}

impl<F> Estimator for F
where
    F: Fn(&Window<'_>) -> RawEstimate + Send + Sync,
{
    fn estimate(&self, window: &Window<'_>) -> RawEstimate {
        self(window)
    }
}

pub const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 220.0;
const MIN_SPO2: f64 = 70.0;
const MAX_SPO2: f64 = 100.0;
// Short enough to keep the pulse shape at any supported sample rate
const SMOOTHING_TAPS: usize = 4;

#[derive(Debug, Clone)]
pub struct RatioOfRatiosEstimator {
    sample_rate_hz: f64,
}

impl RatioOfRatiosEstimator {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: f64::from(sample_rate_hz.max(1)),
        }
    }

    fn heart_rate(&self, ir_ac: &[f64]) -> Option<f64> {
        let smoothed = moving_average(ir_ac, SMOOTHING_TAPS);
        // Refractory gap: no two beats closer than the fastest plausible rate
        let min_gap = (self.sample_rate_hz * 60.0 / MAX_BPM).ceil() as usize;
        let peaks = detect_peaks(&smoothed, min_gap.max(1));
        if peaks.len() < 2 {
            return None;
        }

        let span = (peaks[peaks.len() - 1] - peaks[0]) as f64;
        let interval = span / (peaks.len() - 1) as f64;
        let bpm = 60.0 * self.sample_rate_hz / interval;
        (MIN_BPM..=MAX_BPM).contains(&bpm).then_some(bpm)
    }
}

impl Estimator for RatioOfRatiosEstimator {
    fn estimate(&self, window: &Window<'_>) -> RawEstimate {
        if window.len() < 2 {
            return RawEstimate::invalid();
        }

        let red: Vec<f64> = window.red().map(f64::from).collect();
        let ir: Vec<f64> = window.ir().map(f64::from).collect();
        let (red_ac, red_dc) = ac_dc(&red);
        let (ir_ac, ir_dc) = ac_dc(&ir);

        let bpm = self.heart_rate(&remove_dc(&ir, ir_dc));
        let spo2 = ratio_of_ratios(red_ac, red_dc, ir_ac, ir_dc)
            .map(|r| 110.0 - 25.0 * r)
            .filter(|spo2| (MIN_SPO2..=MAX_SPO2 + 5.0).contains(spo2))
            .map(|spo2| spo2.min(MAX_SPO2));

        RawEstimate {
            bpm: bpm.unwrap_or(0.0),
            bpm_valid: bpm.is_some(),
            spo2: spo2.unwrap_or(0.0),
            spo2_valid: spo2.is_some(),
        }
        .sanitized()
    }
}

/// RMS of the mean-removed signal and the mean itself
fn ac_dc(signal: &[f64]) -> (f64, f64) {
    let n = signal.len() as f64;
    let dc = signal.iter().sum::<f64>() / n;
    let ac = (signal.iter().map(|x| (x - dc) * (x - dc)).sum::<f64>() / n).sqrt();
    (ac, dc)
}

fn remove_dc(signal: &[f64], dc: f64) -> Vec<f64> {
    signal.iter().map(|x| x - dc).collect()
}

fn ratio_of_ratios(red_ac: f64, red_dc: f64, ir_ac: f64, ir_dc: f64) -> Option<f64> {
    if red_dc < 1.0 || ir_dc < 1.0 || red_ac < 1e-3 || ir_ac < 1e-3 {
        return None;
    }
    Some((red_ac / red_dc) / (ir_ac / ir_dc))
}

fn moving_average(signal: &[f64], taps: usize) -> Vec<f64> {
    let taps = taps.max(1);
    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(taps - 1);
            let slice = &signal[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Indices of local maxima above zero, at least `min_gap` samples apart
fn detect_peaks(signal: &[f64], min_gap: usize) -> Vec<usize> {
    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..signal.len().saturating_sub(1) {
        let is_peak = signal[i] > 0.0 && signal[i] > signal[i - 1] && signal[i] >= signal[i + 1];
        if !is_peak {
            continue;
        }
        match peaks.last() {
            Some(&last) if i - last < min_gap => {
                if signal[i] > signal[last] {
                    if let Some(slot) = peaks.last_mut() {
                        *slot = i;
                    }
                }
            }
            _ => peaks.push(i),
        }
    }
    peaks
}

/// Estimator returning one canned result, for pipeline tests
#[cfg(test)]
pub(crate) struct FixedEstimator(pub RawEstimate);

#[cfg(test)]
impl FixedEstimator {
    pub fn valid(bpm: f64, spo2: f64) -> Self {
        Self(RawEstimate {
            bpm,
            bpm_valid: true,
            spo2,
            spo2_valid: true,
        })
    }
}

#[cfg(test)]
impl Estimator for FixedEstimator {
    fn estimate(&self, _window: &Window<'_>) -> RawEstimate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::Sample;
    use std::f64::consts::PI;

    /// Synthetic PPG with the given pulse rate and perfusion on each channel
    fn ppg(bpm: f64, seconds: f64, rate: f64, red_pi: f64, ir_pi: f64) -> Vec<Sample> {
        let n = (seconds * rate) as usize;
        (0..n)
            .map(|i| {
                let phase = (2.0 * PI * bpm / 60.0 * i as f64 / rate).sin();
                let red = 90_000.0 * (1.0 + red_pi * phase);
                let ir = 100_000.0 * (1.0 + ir_pi * phase);
                Sample::new(red as u32, ir as u32)
            })
            .collect()
    }

    #[test]
    fn test_estimates_heart_rate_from_ir_peaks() {
        let samples = ppg(72.0, 4.0, 100.0, 0.01, 0.02);
        let estimator = RatioOfRatiosEstimator::new(100);

        let estimate = estimator.estimate(&Window::from_slice(&samples));
        assert!(estimate.bpm_valid);
        assert!((estimate.bpm - 72.0).abs() < 3.0, "bpm was {}", estimate.bpm);
    }

    #[test]
    fn test_estimates_spo2_from_ratio_of_ratios() {
        // R = 0.5 -> 97.5%
        let samples = ppg(60.0, 4.0, 100.0, 0.01, 0.02);
        let estimator = RatioOfRatiosEstimator::new(100);

        let estimate = estimator.estimate(&Window::from_slice(&samples));
        assert!(estimate.spo2_valid);
        assert!((estimate.spo2 - 97.5).abs() < 1.0, "spo2 was {}", estimate.spo2);
    }

    #[test]
    fn test_flat_signal_is_invalid() {
        let samples = vec![Sample::new(80_000, 80_000); 100];
        let estimator = RatioOfRatiosEstimator::new(100);

        let estimate = estimator.estimate(&Window::from_slice(&samples));
        assert!(!estimate.bpm_valid);
        assert!(!estimate.spo2_valid);
    }

    #[test]
    fn test_nan_estimate_is_downgraded() {
        let estimate = RawEstimate {
            bpm: f64::NAN,
            bpm_valid: true,
            spo2: f64::INFINITY,
            spo2_valid: true,
        }
        .sanitized();

        assert!(!estimate.bpm_valid);
        assert!(!estimate.spo2_valid);
    }

    #[test]
    fn test_closure_estimator() {
        let fixed = |_: &Window<'_>| RawEstimate {
            bpm: 72.0,
            bpm_valid: true,
            spo2: 98.0,
            spo2_valid: true,
        };
        let samples = [Sample::new(1, 1)];
        assert_eq!(fixed.estimate(&Window::from_slice(&samples)).bpm, 72.0);
    }

    #[test]
    fn test_detect_peaks_respects_gap() {
        let signal = [0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(detect_peaks(&signal, 4), vec![3, 8]);
    }
}
