//! Sample-array primitives shared by the feature transforms and the Modify procedures.

use crate::error::{Error, Result};
use realfft::RealFftPlanner;

/// First-order RC high-pass; removes baseline wander below `cutoff` Hz.
pub fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    for &x in data {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

/// Zero every spectral bin above `cutoff` Hz and transform back.
pub fn spectral_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Result<Vec<f64>> {
    let n = data.len();
    if n < 2 {
        return Ok(data.to_vec());
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);

    let mut buffer = data.to_vec();
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut spectrum)
        .map_err(|e| Error::invalid_argument("data", e.to_string()))?;

    let bin_width = fs / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k as f64 * bin_width > cutoff {
            bin.re = 0.0;
            bin.im = 0.0;
        }
    }
    // The inverse transform rejects imaginary parts on the DC and Nyquist bins.
    spectrum[0].im = 0.0;
    if n % 2 == 0 {
        if let Some(last) = spectrum.last_mut() {
            last.im = 0.0;
        }
    }

    let mut out = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut out)
        .map_err(|e| Error::invalid_argument("data", e.to_string()))?;
    let scale = 1.0 / n as f64;
    Ok(out.into_iter().map(|x| x * scale).collect())
}

/// Five-point central difference, in signal units per second. The two samples at
/// each edge are left at zero.
pub fn five_point_derivative(data: &[f64], sample_length: f64) -> Vec<f64> {
    let n = data.len();
    let mut out = vec![0.0; n];
    if n < 5 {
        return out;
    }
    let scale = 1.0 / (12.0 * sample_length);
    for i in 2..n - 2 {
        out[i] = (data[i - 2] - 8.0 * data[i - 1] + 8.0 * data[i + 1] - data[i + 2]) * scale;
    }
    out
}

pub fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

/// Moving average over `win` samples centred on each sample, shrinking at the edges.
pub fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    let mut prefix = Vec::with_capacity(data.len() + 1);
    let mut acc = 0.0;
    prefix.push(acc);
    for &sample in data {
        acc += sample;
        prefix.push(acc);
    }
    let half = win / 2;
    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + win - half).min(data.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Rescale to `[0, 1]`; a flat signal maps to all zeros.
pub fn normalize_unit(data: &[f64]) -> Vec<f64> {
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return vec![0.0; data.len()];
    }
    data.iter().map(|x| (x - min) / range).collect()
}
