use crate::{
    detectors::adaptive::{self, AdaptiveThresholdConfig, Detection, Extremum},
    error::Result,
    filters::normalize_unit,
};

/// Systolic peaks: the normalised amplitude is tracked directly.
pub fn detect_systolic(
    data: &[f64],
    sample_length: f64,
    begin_time: f64,
    cfg: AdaptiveThresholdConfig,
) -> Result<Detection> {
    let feature = normalize_unit(data);
    adaptive::detect(
        data,
        &feature,
        sample_length,
        begin_time,
        AdaptiveThresholdConfig {
            extremum: Extremum::Maximum,
            ..cfg
        },
    )
}

/// Diastolic troughs: the normalised amplitude is inverted so troughs rise above the
/// threshold, and the minimum of the original samples marks the landmark.
pub fn detect_diastolic(
    data: &[f64],
    sample_length: f64,
    begin_time: f64,
    cfg: AdaptiveThresholdConfig,
) -> Result<Detection> {
    let feature: Vec<f64> = normalize_unit(data).into_iter().map(|v| 1.0 - v).collect();
    adaptive::detect(
        data,
        &feature,
        sample_length,
        begin_time,
        AdaptiveThresholdConfig {
            extremum: Extremum::Minimum,
            ..cfg
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const FS: f64 = 125.0;

    /// Arterial-like pulse: systolic upstroke, small dicrotic bump, slow baseline drift.
    fn pressure_wave(beats: usize, period: f64) -> Vec<f64> {
        let n = (beats as f64 * period * FS).round() as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / FS;
                let phase = (t % period) / period;
                let systole = (-0.5 * ((phase - 0.2) / 0.06).powi(2)).exp();
                let dicrotic = 0.15 * (-0.5 * ((phase - 0.45) / 0.04).powi(2)).exp();
                let drift = 2.0 * (2.0 * PI * 0.05 * t).sin();
                80.0 + 40.0 * (systole + dicrotic) + drift
            })
            .collect()
    }

    #[test]
    fn finds_one_systolic_peak_per_beat() {
        let period = 0.9;
        let data = pressure_wave(10, period);
        let detection =
            detect_systolic(&data, 1.0 / FS, 0.0, AdaptiveThresholdConfig::systolic()).unwrap();
        assert_eq!(detection.len(), 10);
        for (k, t) in detection.times.iter().enumerate() {
            let expected = k as f64 * period + 0.2 * period;
            assert!((t - expected).abs() < 2.0 / FS, "beat {k}: {t} vs {expected}");
        }
        assert!(detection.values.iter().all(|v| *v > 115.0));
    }

    #[test]
    fn finds_diastolic_troughs_between_peaks() {
        let period = 0.9;
        let data = pressure_wave(10, period);
        let sbp =
            detect_systolic(&data, 1.0 / FS, 0.0, AdaptiveThresholdConfig::systolic()).unwrap();
        let dbp =
            detect_diastolic(&data, 1.0 / FS, 0.0, AdaptiveThresholdConfig::diastolic()).unwrap();
        assert!(dbp.len() >= 9);
        for w in dbp.times.windows(2) {
            assert!(w[1] - w[0] >= AdaptiveThresholdConfig::diastolic().safe_period_s);
        }
        assert!(dbp.values.iter().all(|v| *v < 85.0));
        // Every trough sits before the systolic peak of its beat.
        for t in &dbp.times {
            assert!(sbp.times.iter().any(|s| *s > *t && s - t < period));
        }
    }
}
