use crate::error::{Error, Result};
use crate::signal::TimeSeries;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sparse landmark events (e.g. R-peaks) kept sorted by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord")]
pub struct EventSeries {
    times: Vec<f64>,
    values: Vec<f64>,
    kind: String,
}

/// Wire form of [`EventSeries`]; decoding goes through [`EventSeries::new`].
#[derive(Deserialize)]
struct EventRecord {
    times: Vec<f64>,
    values: Vec<f64>,
    kind: String,
}

impl TryFrom<EventRecord> for EventSeries {
    type Error = Error;

    fn try_from(record: EventRecord) -> Result<Self> {
        EventSeries::new(record.times, record.values, record.kind)
    }
}

impl EventSeries {
    pub fn empty(kind: impl Into<String>) -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            kind: kind.into(),
        }
    }

    /// Build from parallel arrays; the pairs are sorted by time.
    pub fn new(times: Vec<f64>, values: Vec<f64>, kind: impl Into<String>) -> Result<Self> {
        if times.len() != values.len() {
            return Err(Error::invalid_argument(
                "values",
                format!(
                    "{} values do not match {} event times",
                    values.len(),
                    times.len()
                ),
            ));
        }
        if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
            return Err(Error::invalid_argument(
                "times",
                format!("event time {bad} is not finite"),
            ));
        }
        let mut pairs: Vec<(f64, f64)> = times.into_iter().zip(values).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (times, values) = pairs.into_iter().unzip();
        Ok(Self {
            times,
            values,
            kind: kind.into(),
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// First and last event time.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((*self.times.first()?, *self.times.last()?))
    }

    /// Indices of the events whose time lies in `[begin, end)`.
    pub fn range_indices(&self, begin: f64, end: f64) -> Option<Range<usize>> {
        let lo = self.times.partition_point(|t| *t < begin);
        let hi = self.times.partition_point(|t| *t < end);
        (lo < hi).then_some(lo..hi)
    }

    /// Times and values in `[begin, end)`, extended `left_pad` events to the left.
    pub fn slice(&self, begin: f64, end: f64, left_pad: usize) -> (&[f64], &[f64]) {
        match self.range_indices(begin, end) {
            Some(range) => {
                let start = range.start.saturating_sub(left_pad);
                (&self.times[start..range.end], &self.values[start..range.end])
            }
            None => (&[], &[]),
        }
    }

    /// Remove the events in `[begin, end)`, returning how many were dropped.
    pub fn delete_range(&mut self, begin: f64, end: f64) -> usize {
        match self.range_indices(begin, end) {
            Some(range) => {
                let removed = range.len();
                self.times.drain(range.clone());
                self.values.drain(range);
                removed
            }
            None => 0,
        }
    }

    /// Insert one event after any existing events with the same time.
    pub fn insert(&mut self, time: f64, value: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(Error::invalid_argument(
                "time",
                format!("event time {time} is not finite"),
            ));
        }
        let idx = self.times.partition_point(|t| *t <= time);
        self.times.insert(idx, time);
        self.values.insert(idx, value);
        Ok(())
    }

    /// Merge every event of `other`, shifted by `time_shift` seconds.
    ///
    /// Nothing is merged when the shift or any shifted time is not finite.
    pub fn insert_all(&mut self, other: &EventSeries, time_shift: f64) -> Result<()> {
        if !time_shift.is_finite() {
            return Err(Error::invalid_argument(
                "time_shift",
                format!("must be finite, got {time_shift}"),
            ));
        }
        if let Some(bad) = other.times.iter().map(|t| t + time_shift).find(|t| !t.is_finite()) {
            return Err(Error::invalid_argument(
                "time_shift",
                format!("shifted event time {bad} is not finite"),
            ));
        }
        if other.is_empty() {
            return Ok(());
        }
        let mine_times = std::mem::take(&mut self.times);
        let mine_values = std::mem::take(&mut self.values);
        let mut times = Vec::with_capacity(mine_times.len() + other.len());
        let mut values = Vec::with_capacity(mine_values.len() + other.len());
        let mut mine = mine_times.into_iter().zip(mine_values).peekable();
        let mut theirs = other.iter().map(|(t, v)| (t + time_shift, v)).peekable();
        loop {
            let take_mine = match (mine.peek(), theirs.peek()) {
                (Some(a), Some(b)) => a.0 <= b.0,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_mine { mine.next() } else { theirs.next() };
            if let Some((t, v)) = next {
                times.push(t);
                values.push(v);
            }
        }
        self.times = times;
        self.values = values;
        Ok(())
    }

    /// Replace the events of `[begin, end)` with the events of `other` in that range.
    pub fn replace_range(&mut self, begin: f64, end: f64, other: &EventSeries) -> Result<()> {
        self.delete_range(begin, end);
        let (times, values) = other.slice(begin, end, 0);
        let incoming = EventSeries {
            times: times.to_vec(),
            values: values.to_vec(),
            kind: other.kind.clone(),
        };
        self.insert_all(&incoming, 0.0)
    }

    /// Remove the event nearest to `time`, or nearest to `(time, value)` in the plane
    /// when a value is given. Ties keep the earliest event.
    pub fn delete_nearest(&mut self, time: f64, value: Option<f64>) -> Option<(f64, f64)> {
        let idx = match value {
            Some(value) => self.nearest_in_plane(time, value)?,
            None => self.nearest_in_time(time)?,
        };
        let removed = (self.times.remove(idx), self.values.remove(idx));
        Some(removed)
    }

    fn nearest_in_time(&self, time: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let idx = self.times.partition_point(|t| *t < time);
        if idx == 0 {
            return Some(0);
        }
        if idx == self.times.len() {
            return Some(idx - 1);
        }
        let before = time - self.times[idx - 1];
        let after = self.times[idx] - time;
        Some(if before <= after { idx - 1 } else { idx })
    }

    fn nearest_in_plane(&self, time: f64, value: f64) -> Option<usize> {
        self.iter()
            .map(|(t, v)| (t - time).hypot(v - value))
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((i, d)),
            })
            .map(|(i, _)| i)
    }

    /// Snap every value onto `series` at the event's time.
    ///
    /// Leaves the events untouched when any time falls outside the series.
    pub fn align_to(&mut self, series: &TimeSeries) -> Result<()> {
        let values = self
            .times
            .iter()
            .map(|t| series.value_at(*t))
            .collect::<Result<Vec<f64>>>()?;
        self.values = values;
        Ok(())
    }
}
