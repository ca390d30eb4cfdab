use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Relative tolerance used when comparing sample lengths or rates.
pub const RATE_TOLERANCE: f64 = 1e-4;

/// Slack, in samples, tolerated when a time lands a rounding error past the last sample.
const INDEX_EPSILON: f64 = 1e-9;

/// Fixed-rate sampled waveform anchored at `offset` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimeSeriesRecord")]
pub struct TimeSeries {
    data: Vec<f64>,
    sample_length: f64,
    offset: f64,
    kind: String,
}

/// Wire form of [`TimeSeries`]; decoding goes through [`TimeSeries::with_sample_length`].
#[derive(Deserialize)]
struct TimeSeriesRecord {
    data: Vec<f64>,
    sample_length: f64,
    offset: f64,
    kind: String,
}

impl TryFrom<TimeSeriesRecord> for TimeSeries {
    type Error = Error;

    fn try_from(record: TimeSeriesRecord) -> Result<Self> {
        TimeSeries::with_sample_length(record.data, record.sample_length, record.offset, record.kind)
    }
}

/// Output grid requested from [`TimeSeries::slice_resampled`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resampling {
    /// Keep the native samples.
    Native,
    /// Interpolate onto a grid with this many samples per second.
    Rate(f64),
    /// Interpolate onto exactly this many evenly spaced samples.
    Count(usize),
}

impl TimeSeries {
    /// Build a series from raw samples spanning `duration` seconds.
    pub fn new(data: Vec<f64>, duration: f64, offset: f64, kind: impl Into<String>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid_argument("data", "at least one sample is required"));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(Error::invalid_argument(
                "duration",
                format!("must be a positive number of seconds, got {duration}"),
            ));
        }
        let sample_length = duration / data.len() as f64;
        Self::with_sample_length(data, sample_length, offset, kind)
    }

    /// Build a series from raw samples taken at `sample_rate` Hz.
    pub fn from_sample_rate(
        data: Vec<f64>,
        sample_rate: f64,
        offset: f64,
        kind: impl Into<String>,
    ) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::invalid_argument(
                "sample_rate",
                format!("must be positive, got {sample_rate}"),
            ));
        }
        Self::with_sample_length(data, 1.0 / sample_rate, offset, kind)
    }

    pub fn with_sample_length(
        data: Vec<f64>,
        sample_length: f64,
        offset: f64,
        kind: impl Into<String>,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid_argument("data", "at least one sample is required"));
        }
        if !(sample_length.is_finite() && sample_length > 0.0) {
            return Err(Error::invalid_argument(
                "sample_length",
                format!("must be positive, got {sample_length}"),
            ));
        }
        if !offset.is_finite() {
            return Err(Error::invalid_argument("offset", "must be finite"));
        }
        Ok(Self {
            data,
            sample_length,
            offset,
            kind: kind.into(),
        })
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_length(&self) -> f64 {
        self.sample_length
    }

    pub fn sample_rate(&self) -> f64 {
        1.0 / self.sample_length
    }

    /// Time of the first sample.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn duration(&self) -> f64 {
        self.data.len() as f64 * self.sample_length
    }

    /// Exclusive end of the covered span, `offset + duration`.
    pub fn end(&self) -> f64 {
        self.offset + self.duration()
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Time stamp of sample `index`.
    pub fn time_of(&self, index: usize) -> f64 {
        self.offset + index as f64 * self.sample_length
    }

    /// True when `other` samples at the same rate within [`RATE_TOLERANCE`].
    pub fn same_rate(&self, other: &TimeSeries) -> bool {
        (other.sample_length - self.sample_length).abs() <= RATE_TOLERANCE * self.sample_length
    }

    fn out_of_range(&self, time: f64) -> Error {
        Error::OutOfRange {
            time,
            begin: self.offset,
            end: self.end(),
        }
    }

    /// Rounded sample position of `time`, allowed to reach `len()` (one past the last sample).
    fn boundary_index(&self, time: f64) -> Result<usize> {
        let pos = ((time - self.offset) / self.sample_length).round();
        if !pos.is_finite() || pos < 0.0 || pos > self.data.len() as f64 {
            return Err(self.out_of_range(time));
        }
        Ok(pos as usize)
    }

    /// Nearest-sample index of `time`. The exact end of the span maps to the last sample.
    pub fn sample_index(&self, time: f64) -> Result<usize> {
        let index = self.boundary_index(time)?;
        Ok(index.min(self.data.len() - 1))
    }

    /// Linearly interpolated value at `time`.
    ///
    /// Valid between the first and the last sample time inclusive.
    pub fn value_at(&self, time: f64) -> Result<f64> {
        let last = (self.data.len() - 1) as f64;
        let pos = (time - self.offset) / self.sample_length;
        if !pos.is_finite() || pos < -INDEX_EPSILON || pos > last + INDEX_EPSILON {
            return Err(self.out_of_range(time));
        }
        Ok(lerp_at(&self.data, pos.clamp(0.0, last)))
    }

    /// Native samples whose nearest-sample indices fall in `[begin, end)`.
    pub fn slice(&self, begin: f64, end: f64) -> Result<&[f64]> {
        let first = self.boundary_index(begin)?;
        let last = self.boundary_index(end)?;
        if last <= first {
            return Ok(&[]);
        }
        Ok(&self.data[first..last])
    }

    /// Samples covering `[begin, end)` on the requested grid.
    ///
    /// Any grid other than the native one is produced by linear interpolation of the
    /// native samples, never by dropping samples. `Count` wins over a rate because it
    /// fixes the spacing to `(end - begin) / count`.
    pub fn slice_resampled(&self, begin: f64, end: f64, resampling: Resampling) -> Result<Vec<f64>> {
        let (spacing, count) = match resampling {
            Resampling::Native => return Ok(self.slice(begin, end)?.to_vec()),
            Resampling::Rate(rate) => {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(Error::invalid_argument(
                        "target_rate",
                        format!("must be positive, got {rate}"),
                    ));
                }
                if (rate * self.sample_length - 1.0).abs() <= RATE_TOLERANCE {
                    return Ok(self.slice(begin, end)?.to_vec());
                }
                let spacing = 1.0 / rate;
                let count = ((end - begin) / spacing - INDEX_EPSILON).ceil().max(0.0) as usize;
                (spacing, count)
            }
            Resampling::Count(count) => {
                if count == 0 {
                    return Ok(Vec::new());
                }
                ((end - begin) / count as f64, count)
            }
        };

        let first = self.boundary_index(begin)?;
        let last = self.boundary_index(end)?;
        if last <= first || count == 0 {
            return Ok(Vec::new());
        }
        // Grid points are placed on the full record so the first one keeps its left neighbour.
        let last_pos = (self.data.len() - 1) as f64;
        let resampled = (0..count)
            .map(|j| {
                let t = begin + j as f64 * spacing;
                let pos = ((t - self.offset) / self.sample_length).clamp(0.0, last_pos);
                lerp_at(&self.data, pos)
            })
            .collect();
        Ok(resampled)
    }

    /// New series holding the native samples of `[begin, end)`.
    pub fn window(&self, begin: f64, end: f64) -> Result<TimeSeries> {
        let first = self.boundary_index(begin)?;
        let samples = self.slice(begin, end)?;
        if samples.is_empty() {
            return Err(Error::EmptySpan { begin, end });
        }
        Self::with_sample_length(
            samples.to_vec(),
            self.sample_length,
            self.time_of(first),
            self.kind.clone(),
        )
    }

    /// Overwrite the samples of `[begin, end)` with the leading samples of `other`.
    pub fn replace_window(&mut self, begin: f64, end: f64, other: &TimeSeries) -> Result<()> {
        if !self.same_rate(other) {
            return Err(Error::IncompatibleRate {
                expected: self.sample_length,
                found: other.sample_length,
            });
        }
        if end - begin > other.duration() + 0.5 * self.sample_length {
            return Err(Error::IncompatibleRate {
                expected: end - begin,
                found: other.duration(),
            });
        }
        let first = self.boundary_index(begin)?;
        let last = self.boundary_index(end)?;
        let count = last.saturating_sub(first).min(other.len());
        self.data[first..first + count].copy_from_slice(&other.data[..count]);
        Ok(())
    }

    /// Parallel `(x, y)` arrays for `[begin, end)` with `x[i] = origin_x + i * sample_length`.
    pub fn coordinates(&self, begin: f64, end: f64, origin_x: f64) -> Result<(Vec<f64>, Vec<f64>)> {
        let y = self.slice(begin, end)?.to_vec();
        let x = (0..y.len())
            .map(|i| origin_x + i as f64 * self.sample_length)
            .collect();
        Ok((x, y))
    }
}

/// Linear interpolation at fractional position `pos` (already clamped to the slice).
fn lerp_at(data: &[f64], pos: f64) -> f64 {
    let lower = pos.floor() as usize;
    if lower + 1 >= data.len() {
        return data[data.len() - 1];
    }
    let frac = pos - lower as f64;
    data[lower] + frac * (data[lower + 1] - data[lower])
}
