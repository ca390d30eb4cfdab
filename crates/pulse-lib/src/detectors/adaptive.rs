//! Self-tuning threshold tracker shared by the landmark detectors.
//!
//! The scan compares a detector-specific feature signal against a threshold that is
//! re-derived from the local feature amplitude after every accepted event. Each
//! crossing interval yields at most one landmark, placed on the extremum of the
//! original signal inside the interval. Candidates closer than `safe_period_s` to the
//! previous landmark are dropped. When no landmark shows up for `stall_factor` times
//! the running beat period, the threshold is relaxed by `decay_factor` and the scan
//! rewinds to just after the last landmark.

use crate::error::{Error, Result};
use crate::events::EventSeries;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Which extremum of the original signal marks a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extremum {
    Maximum,
    Minimum,
}

/// Tunables of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThresholdConfig {
    /// Fraction of the local feature maximum used as threshold, in `(0, 1]`.
    pub threshold_fraction: f64,
    /// Length (seconds) of the window the feature maximum is taken over.
    pub threshold_period_s: f64,
    /// Minimum spacing (seconds) between two accepted landmarks.
    pub safe_period_s: f64,
    /// Gap, in multiples of the average period, after which the threshold is relaxed.
    pub stall_factor: f64,
    /// Factor applied to the threshold on every relaxation.
    pub decay_factor: f64,
    /// Relaxations allowed between two accepted landmarks.
    pub max_widenings: u32,
    pub extremum: Extremum,
}

impl AdaptiveThresholdConfig {
    /// R-peak variant.
    pub fn r_peak() -> Self {
        Self {
            threshold_fraction: 0.3,
            threshold_period_s: 2.0,
            safe_period_s: 0.25,
            stall_factor: 1.7,
            decay_factor: 0.6,
            max_widenings: 4,
            extremum: Extremum::Maximum,
        }
    }

    /// Systolic pressure variant.
    pub fn systolic() -> Self {
        Self {
            threshold_fraction: 0.7,
            threshold_period_s: 2.0,
            safe_period_s: 0.3,
            stall_factor: 2.0,
            decay_factor: 0.6,
            max_widenings: 4,
            extremum: Extremum::Maximum,
        }
    }

    /// Diastolic pressure variant, tracking troughs.
    pub fn diastolic() -> Self {
        Self {
            extremum: Extremum::Minimum,
            ..Self::systolic()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold_fraction > 0.0 && self.threshold_fraction <= 1.0) {
            return Err(Error::invalid_argument(
                "threshold_fraction",
                format!("must lie in (0, 1], got {}", self.threshold_fraction),
            ));
        }
        if !(self.threshold_period_s.is_finite() && self.threshold_period_s > 0.0) {
            return Err(Error::invalid_argument(
                "threshold_period",
                format!("must be positive, got {}", self.threshold_period_s),
            ));
        }
        if !(self.safe_period_s.is_finite() && self.safe_period_s >= 0.0) {
            return Err(Error::invalid_argument(
                "safe_period",
                format!("must be non-negative, got {}", self.safe_period_s),
            ));
        }
        if !(self.stall_factor.is_finite() && self.stall_factor > 1.0) {
            return Err(Error::invalid_argument(
                "stall_factor",
                format!("must be greater than 1, got {}", self.stall_factor),
            ));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(Error::invalid_argument(
                "decay_factor",
                format!("must lie in (0, 1), got {}", self.decay_factor),
            ));
        }
        Ok(())
    }
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self::r_peak()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Feature below threshold, waiting for a rising edge.
    Searching,
    /// Inside a crossing interval that started at `begin`.
    AboveThreshold { begin: usize },
}

/// Observable outcome of one [`AdaptiveThresholdDetector::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Rising { index: usize },
    Accepted { index: usize, time: f64, value: f64 },
    /// Crossing interval `[begin, end)` fell inside the safe period.
    Rejected { begin: usize, end: usize },
    /// Threshold relaxed; scanning resumes at `resume`.
    Widened { threshold: f64, resume: usize },
}

/// Landmarks found by one pass, as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub indices: Vec<usize>,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Detection {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn into_events(self, kind: impl Into<String>) -> Result<EventSeries> {
        EventSeries::new(self.times, self.values, kind)
    }
}

/// Explicit state machine over one contiguous window.
#[derive(Debug, Clone)]
pub struct AdaptiveThresholdDetector<'a> {
    config: AdaptiveThresholdConfig,
    signal: &'a [f64],
    feature: &'a [f64],
    sample_length: f64,
    begin_time: f64,
    period_samples: usize,
    safe_samples: usize,
    state: ScanState,
    position: usize,
    threshold: f64,
    average_period: Option<f64>,
    widenings: u32,
    exhausted: bool,
    events: Vec<usize>,
}

impl<'a> AdaptiveThresholdDetector<'a> {
    /// `signal` holds the original samples, `feature` their transform; sample 0 sits at
    /// `begin_time`.
    pub fn new(
        signal: &'a [f64],
        feature: &'a [f64],
        sample_length: f64,
        begin_time: f64,
        config: AdaptiveThresholdConfig,
    ) -> Result<Self> {
        config.validate()?;
        if signal.len() != feature.len() {
            return Err(Error::invalid_argument(
                "feature",
                format!(
                    "{} feature samples for {} signal samples",
                    feature.len(),
                    signal.len()
                ),
            ));
        }
        if !(sample_length.is_finite() && sample_length > 0.0) {
            return Err(Error::invalid_argument(
                "sample_length",
                format!("must be positive, got {sample_length}"),
            ));
        }
        let period_samples = ((config.threshold_period_s / sample_length).round() as usize).max(1);
        let safe_samples = (config.safe_period_s / sample_length).ceil() as usize;
        let threshold = window_max(feature, 0, period_samples) * config.threshold_fraction;
        Ok(Self {
            config,
            signal,
            feature,
            sample_length,
            begin_time,
            period_samples,
            safe_samples,
            state: ScanState::Searching,
            position: 0,
            threshold,
            average_period: None,
            widenings: 0,
            exhausted: false,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Mean of the last three gaps (seconds), once four landmarks are accepted.
    pub fn average_period(&self) -> Option<f64> {
        self.average_period
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn last_event_time(&self) -> Option<f64> {
        self.events.last().map(|&i| self.time_of(i))
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.feature.len()
    }

    fn time_of(&self, index: usize) -> f64 {
        self.begin_time + self.sample_length * index as f64
    }

    /// Advance by one sample.
    pub fn step(&mut self) -> Option<Transition> {
        if self.is_finished() {
            return None;
        }
        if let Some(widened) = self.check_stall() {
            return Some(widened);
        }

        let index = self.position;
        let above = self.feature[index] > self.threshold;
        let transition = match self.state {
            ScanState::Searching if above => {
                self.state = ScanState::AboveThreshold { begin: index };
                Some(Transition::Rising { index })
            }
            ScanState::AboveThreshold { begin } if !above => {
                self.state = ScanState::Searching;
                Some(self.close_candidate(begin, index))
            }
            _ => None,
        };
        self.position += 1;
        transition
    }

    fn check_stall(&mut self) -> Option<Transition> {
        let average = self.average_period?;
        let last = *self.events.last()?;
        let elapsed = self.position.saturating_sub(last) as f64 * self.sample_length;
        if elapsed <= self.config.stall_factor * average {
            return None;
        }
        if self.widenings >= self.config.max_widenings {
            if !self.exhausted {
                warn!(
                    "no landmark within {:.3}s after {:.3}s; widening budget of {} spent",
                    elapsed,
                    self.time_of(last),
                    self.config.max_widenings
                );
                self.exhausted = true;
            }
            return None;
        }
        self.widenings += 1;
        self.threshold *= self.config.decay_factor;
        let resume = (last + self.safe_samples).min(self.feature.len());
        debug!(
            "stalled {:.3}s after landmark at {:.3}s; threshold relaxed to {}",
            elapsed,
            self.time_of(last),
            self.threshold
        );
        self.position = resume;
        self.state = ScanState::Searching;
        Some(Transition::Widened {
            threshold: self.threshold,
            resume,
        })
    }

    fn close_candidate(&mut self, begin: usize, end: usize) -> Transition {
        let index = begin + extremum_index(&self.signal[begin..end], self.config.extremum);
        let clear = match self.events.last() {
            None => true,
            Some(&last) => {
                index > last && (index - last) as f64 * self.sample_length > self.config.safe_period_s
            }
        };
        if !clear {
            return Transition::Rejected { begin, end };
        }

        self.events.push(index);
        self.widenings = 0;
        self.exhausted = false;
        self.threshold =
            window_max(self.feature, index, self.period_samples) * self.config.threshold_fraction;
        if self.events.len() >= 4 {
            let k = self.events.len() - 1;
            let span = (self.events[k] - self.events[k - 3]) as f64 * self.sample_length;
            self.average_period = Some(span / 3.0);
        }
        Transition::Accepted {
            index,
            time: self.time_of(index),
            value: self.signal[index],
        }
    }

    /// Scan to the end of the window. An interval still open at the end is dropped.
    pub fn run(mut self) -> Detection {
        while !self.is_finished() {
            self.step();
        }
        let times = self.events.iter().map(|&i| self.time_of(i)).collect();
        let values = self.events.iter().map(|&i| self.signal[i]).collect();
        Detection {
            indices: self.events,
            times,
            values,
        }
    }
}

/// One detection pass; an empty window yields no landmarks.
pub fn detect(
    signal: &[f64],
    feature: &[f64],
    sample_length: f64,
    begin_time: f64,
    config: AdaptiveThresholdConfig,
) -> Result<Detection> {
    if signal.is_empty() {
        config.validate()?;
        return Ok(Detection::default());
    }
    Ok(AdaptiveThresholdDetector::new(signal, feature, sample_length, begin_time, config)?.run())
}

fn window_max(data: &[f64], start: usize, len: usize) -> f64 {
    let end = start.saturating_add(len).min(data.len());
    data.get(start..end)
        .unwrap_or(&[])
        .iter()
        .copied()
        .fold(0.0, f64::max)
}

/// First index attaining the extremum.
fn extremum_index(data: &[f64], extremum: Extremum) -> usize {
    let mut best = 0;
    for (i, &value) in data.iter().enumerate().skip(1) {
        let better = match extremum {
            Extremum::Maximum => value > data[best],
            Extremum::Minimum => value < data[best],
        };
        if better {
            best = i;
        }
    }
    best
}
