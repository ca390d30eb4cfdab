use crate::error::{Error, Result};
use crate::events::EventSeries;
use crate::parameter::IntervalParameter;
use crate::signal::TimeSeries;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do when a name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Fail with [`Error::DuplicateKey`].
    #[default]
    Reject,
    /// Drop the existing entry.
    Replace,
    /// Fold the new data into the existing entry.
    Merge,
}

/// Named waves, landmark series and parameters of one recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    waves: BTreeMap<String, TimeSeries>,
    points: BTreeMap<String, EventSeries>,
    parameters: BTreeMap<String, IntervalParameter>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty() && self.points.is_empty() && self.parameters.is_empty()
    }

    pub fn wave(&self, name: &str) -> Option<&TimeSeries> {
        self.waves.get(name)
    }

    pub fn wave_mut(&mut self, name: &str) -> Option<&mut TimeSeries> {
        self.waves.get_mut(name)
    }

    pub fn points(&self, name: &str) -> Option<&EventSeries> {
        self.points.get(name)
    }

    pub fn points_mut(&mut self, name: &str) -> Option<&mut EventSeries> {
        self.points.get_mut(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&IntervalParameter> {
        self.parameters.get(name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut IntervalParameter> {
        self.parameters.get_mut(name)
    }

    pub fn waves(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.waves.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn point_series(&self) -> impl Iterator<Item = (&str, &EventSeries)> {
        self.points.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &IntervalParameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add a wave; fails with [`Error::DuplicateKey`] if the name is taken.
    pub fn add_wave(&mut self, name: impl Into<String>, wave: TimeSeries) -> Result<()> {
        self.insert_wave(name, wave, InsertMode::Reject)
    }

    pub fn add_points(&mut self, name: impl Into<String>, points: EventSeries) -> Result<()> {
        self.insert_points(name, points, InsertMode::Reject)
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        parameter: IntervalParameter,
    ) -> Result<()> {
        self.insert_parameter(name, parameter, InsertMode::Reject)
    }

    /// Insert a wave; merging overwrites the existing samples over the new wave's span.
    pub fn insert_wave(
        &mut self,
        name: impl Into<String>,
        wave: TimeSeries,
        mode: InsertMode,
    ) -> Result<()> {
        let name = name.into();
        match (self.waves.get_mut(&name), mode) {
            (None, _) | (Some(_), InsertMode::Replace) => {
                self.waves.insert(name, wave);
                Ok(())
            }
            (Some(existing), InsertMode::Merge) => {
                existing.replace_window(wave.offset(), wave.end(), &wave)
            }
            (Some(_), InsertMode::Reject) => Err(Error::DuplicateKey {
                collection: "wave",
                name,
            }),
        }
    }

    pub fn insert_points(
        &mut self,
        name: impl Into<String>,
        points: EventSeries,
        mode: InsertMode,
    ) -> Result<()> {
        let name = name.into();
        match (self.points.get_mut(&name), mode) {
            (None, _) | (Some(_), InsertMode::Replace) => {
                self.points.insert(name, points);
                Ok(())
            }
            (Some(existing), InsertMode::Merge) => existing.insert_all(&points, 0.0),
            (Some(_), InsertMode::Reject) => Err(Error::DuplicateKey {
                collection: "points",
                name,
            }),
        }
    }

    pub fn insert_parameter(
        &mut self,
        name: impl Into<String>,
        parameter: IntervalParameter,
        mode: InsertMode,
    ) -> Result<()> {
        let name = name.into();
        match (self.parameters.get_mut(&name), mode) {
            (None, _) | (Some(_), InsertMode::Replace) => {
                self.parameters.insert(name, parameter);
                Ok(())
            }
            (Some(existing), InsertMode::Merge) => {
                for (begin, end, value) in parameter.iter() {
                    existing.add_value(begin, end, value)?;
                }
                Ok(())
            }
            (Some(_), InsertMode::Reject) => Err(Error::DuplicateKey {
                collection: "parameter",
                name,
            }),
        }
    }

    pub fn remove_wave(&mut self, name: &str) -> Option<TimeSeries> {
        self.waves.remove(name)
    }

    pub fn remove_points(&mut self, name: &str) -> Option<EventSeries> {
        self.points.remove(name)
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<IntervalParameter> {
        self.parameters.remove(name)
    }

    /// Union of every wave's span; event times are used only when there are no waves.
    pub fn full_span(&self) -> Option<(f64, f64)> {
        let spans: Vec<(f64, f64)> = if self.waves.is_empty() {
            self.points.values().filter_map(EventSeries::time_span).collect()
        } else {
            self.waves.values().map(|w| (w.offset(), w.end())).collect()
        };
        spans
            .into_iter()
            .reduce(|(b0, e0), (b1, e1)| (b0.min(b1), e0.max(e1)))
    }

    /// Window `[max(offset), min(end))` where every named wave has data.
    ///
    /// An empty name list falls back to [`Dataset::full_span`].
    pub fn common_span<S: AsRef<str>>(&self, names: &[S]) -> Result<(f64, f64)> {
        if names.is_empty() {
            return self.full_span().ok_or(Error::EmptySpan {
                begin: f64::NAN,
                end: f64::NAN,
            });
        }
        let mut begin = f64::NEG_INFINITY;
        let mut end = f64::INFINITY;
        let mut missing = Vec::new();
        for name in names {
            let name: &str = name.as_ref();
            match self.waves.get(name) {
                Some(wave) => {
                    begin = begin.max(wave.offset());
                    end = end.min(wave.end());
                }
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingInput {
                procedure: "common_span".into(),
                waves: missing,
                points: Vec::new(),
            });
        }
        if begin >= end {
            return Err(Error::EmptySpan { begin, end });
        }
        Ok((begin, end))
    }
}
