use serde::{Deserialize, Serialize};

/// Beat-to-beat intervals in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    /// Successive differences of sorted landmark times.
    pub fn from_times(times: &[f64]) -> Self {
        let rr = times.windows(2).map(|w| w[1] - w[0]).collect();
        Self { rr }
    }

    pub fn len(&self) -> usize {
        self.rr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rr.is_empty()
    }

    pub fn mean_interval(&self) -> Option<f64> {
        (!self.rr.is_empty()).then(|| self.rr.iter().sum::<f64>() / self.rr.len() as f64)
    }

    /// Beats per minute implied by the mean interval.
    pub fn heart_rate(&self) -> Option<f64> {
        self.mean_interval().filter(|m| *m > 0.0).map(|m| 60.0 / m)
    }

    /// Root mean square of successive differences, normalised by the interval count
    /// minus one. Needs at least two intervals.
    pub fn rmssd(&self) -> Option<f64> {
        let n = self.rr.len();
        if n < 2 {
            return None;
        }
        let squares: f64 = self.rr.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        Some((squares / (n as f64 - 1.0)).sqrt())
    }
}
