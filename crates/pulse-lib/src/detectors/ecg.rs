use crate::{
    detectors::adaptive::{self, AdaptiveThresholdConfig, Detection},
    error::Result,
    events::EventSeries,
    filters::{five_point_derivative, moving_average, square},
    signal::TimeSeries,
};
use serde::{Deserialize, Serialize};

/// Configurable parameters for R-peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcgDetectorConfig {
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    pub threshold: AdaptiveThresholdConfig,
}

impl Default for EcgDetectorConfig {
    fn default() -> Self {
        Self {
            integration_window_s: 0.150,
            threshold: AdaptiveThresholdConfig::r_peak(),
        }
    }
}

/// Derivative, squared, then integrated over `integration_window_s`.
pub fn r_peak_feature(data: &[f64], sample_length: f64, integration_window_s: f64) -> Vec<f64> {
    let derivative = five_point_derivative(data, sample_length);
    let squared = square(&derivative);
    let win = ((integration_window_s / sample_length).round() as usize).max(1);
    moving_average(&squared, win)
}

/// Detect R-peaks in raw ECG samples starting at `begin_time`.
pub fn detect_r_peaks_in(
    data: &[f64],
    sample_length: f64,
    begin_time: f64,
    cfg: &EcgDetectorConfig,
) -> Result<Detection> {
    let feature = r_peak_feature(data, sample_length, cfg.integration_window_s);
    adaptive::detect(data, &feature, sample_length, begin_time, cfg.threshold)
}

/// Detect R-peaks over a whole ECG series.
pub fn detect_r_peaks(ts: &TimeSeries, cfg: &EcgDetectorConfig) -> Result<EventSeries> {
    detect_r_peaks_in(ts.data(), ts.sample_length(), ts.offset(), cfg)?.into_events("R")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn detects_regular_beats() {
        let fs = 250.0;
        let rr = [0.82, 0.78, 0.8, 0.79, 0.81, 0.77, 0.84, 0.88];
        let (ts, beats) = synthetic_timeseries(fs, &rr, 0.0);
        let events = detect_r_peaks(&ts, &EcgDetectorConfig::default()).unwrap();
        assert_eq!(events.len(), rr.len() + 1);
        assert_eq!(events.kind(), "R");
        for (found, expected) in events.times().iter().zip(&beats) {
            assert!((found - expected).abs() <= 1.0 / fs + 1e-9);
        }
    }

    #[test]
    fn tolerates_noise_and_amplitude_drift() {
        let fs = 250.0;
        let rr = [0.9, 0.85, 0.88, 0.86, 0.82, 0.81, 0.8, 0.83, 0.85, 0.9, 0.87];
        let (mut ts, beats) = synthetic_timeseries(fs, &rr, 0.02);
        // Halve the amplitude over the second half of the recording.
        let half = ts.len() / 2;
        let scaled: Vec<f64> = ts
            .data()
            .iter()
            .enumerate()
            .map(|(i, v)| if i >= half { v * 0.5 } else { *v })
            .collect();
        ts = TimeSeries::from_sample_rate(scaled, fs, 0.0, "ECG").unwrap();

        let events = detect_r_peaks(&ts, &EcgDetectorConfig::default()).unwrap();
        assert_eq!(events.len(), beats.len());
        let cfg = EcgDetectorConfig::default();
        for w in events.times().windows(2) {
            assert!(w[1] - w[0] >= cfg.threshold.safe_period_s);
        }
    }

    #[test]
    fn honours_offset() {
        let fs = 250.0;
        let rr = [0.8, 0.8, 0.8];
        let (ts, beats) = synthetic_timeseries(fs, &rr, 0.0);
        let shifted =
            TimeSeries::from_sample_rate(ts.data().to_vec(), fs, 100.0, "ECG").unwrap();
        let events = detect_r_peaks(&shifted, &EcgDetectorConfig::default()).unwrap();
        assert_eq!(events.len(), beats.len());
        assert!((events.times()[0] - (100.0 + beats[0])).abs() <= 1.0 / fs + 1e-9);
    }

    fn synthetic_timeseries(fs: f64, rr: &[f64], noise: f64) -> (TimeSeries, Vec<f64>) {
        use std::f64::consts::PI;
        let mut rng = StdRng::seed_from_u64(7);
        let mut beats = Vec::with_capacity(rr.len() + 1);
        let mut t = 0.5;
        beats.push(t);
        for &interval in rr {
            t += interval;
            beats.push(t);
        }
        let duration = beats.last().copied().unwrap_or(1.0) + 1.0;
        let samples = (duration * fs) as usize;
        let mut data = Vec::with_capacity(samples);
        for i in 0..samples {
            let time = i as f64 / fs;
            let mut v = 0.05 * (2.0 * PI * 1.0 * time).sin();
            for &bt in &beats {
                let width = 0.02;
                let amp = (-0.5 * ((time - bt) / width).powi(2)).exp();
                v += 1.2 * amp;
            }
            if noise > 0.0 {
                v += rng.gen_range(-noise..noise);
            }
            data.push(v);
        }
        let ts = TimeSeries::from_sample_rate(data, fs, 0.0, "ECG").unwrap();
        (ts, beats)
    }
}
