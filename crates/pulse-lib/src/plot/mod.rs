//! Backend-neutral plot description built from the data model.
//!
//! Rendering lives with whoever consumes a [`Figure`]; this module only turns waves,
//! landmarks and parameters into decimated point lists.

use crate::{
    dataset::Dataset, error::Result, events::EventSeries, parameter::IntervalParameter,
    signal::TimeSeries,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

const PALETTE: [u32; 6] = [0x1F77B4, 0xFF0077, 0x2CA02C, 0xFF7F0E, 0x9467BD, 0x8C564B];

impl Color {
    /// Cycles through a fixed palette.
    pub fn nth(index: usize) -> Self {
        Color(PALETTE[index % PALETTE.len()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: f32,
    pub color: Color,
}

/// Horizontal segments `[begin, end, value]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSeries {
    pub name: String,
    pub segments: Vec<[f64; 3]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Scatter(ScatterSeries),
    Steps(StepSeries),
}

impl Series {
    pub fn name(&self) -> &str {
        match self {
            Series::Line(s) => &s.name,
            Series::Scatter(s) => &s.name,
            Series::Steps(s) => &s.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Series::Line(s) => s.points.len(),
            Series::Scatter(s) => s.points.len(),
            Series::Steps(s) => s.segments.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Every wave, landmark series and parameter of `dataset` over `[begin, end)`.
    pub fn from_dataset(dataset: &Dataset, begin: f64, end: f64, max_points: usize) -> Result<Self> {
        let mut fig = Figure::new(None);
        fig.x.label = Some("time (s)".into());
        let plottables = dataset
            .waves()
            .map(|(name, w)| (name, w as &dyn Plottable))
            .chain(dataset.point_series().map(|(name, p)| (name, p as &dyn Plottable)))
            .chain(dataset.parameters().map(|(name, p)| (name, p as &dyn Plottable)));
        for (index, (name, item)) in plottables.enumerate() {
            fig.add_series(item.plot_series(name, begin, end, max_points, Color::nth(index))?);
        }
        Ok(fig)
    }
}

/// Anything that can be drawn over a time window.
pub trait Plottable {
    fn plot_series(
        &self,
        name: &str,
        begin: f64,
        end: f64,
        max_points: usize,
        color: Color,
    ) -> Result<Series>;
}

impl Plottable for TimeSeries {
    fn plot_series(
        &self,
        name: &str,
        begin: f64,
        end: f64,
        max_points: usize,
        color: Color,
    ) -> Result<Series> {
        let lo = begin.max(self.offset());
        let hi = end.min(self.end());
        let points = if lo < hi {
            let first = self.sample_index(lo)?;
            let (x, y) = self.coordinates(lo, hi, self.time_of(first))?;
            let points: Vec<[f64; 2]> = x.into_iter().zip(y).map(|(x, y)| [x, y]).collect();
            decimate_points(&points, max_points)
        } else {
            Vec::new()
        };
        Ok(Series::Line(LineSeries {
            name: name.into(),
            points,
            style: Style {
                width: 1.4,
                dash: None,
                color,
            },
        }))
    }
}

impl Plottable for EventSeries {
    fn plot_series(
        &self,
        name: &str,
        begin: f64,
        end: f64,
        max_points: usize,
        color: Color,
    ) -> Result<Series> {
        let (times, values) = self.slice(begin, end, 0);
        let points: Vec<[f64; 2]> = times.iter().zip(values).map(|(t, v)| [*t, *v]).collect();
        Ok(Series::Scatter(ScatterSeries {
            name: name.into(),
            points: decimate_points(&points, max_points),
            radius: 3.0,
            color,
        }))
    }
}

impl Plottable for IntervalParameter {
    fn plot_series(
        &self,
        name: &str,
        begin: f64,
        end: f64,
        max_points: usize,
        color: Color,
    ) -> Result<Series> {
        let segments: Vec<[f64; 3]> = self.intervals_in(begin, end).map(|(b, e, v)| [b, e, v]).collect();
        Ok(Series::Steps(StepSeries {
            name: name.into(),
            segments: decimate_points(&segments, max_points),
            style: Style {
                width: 2.0,
                dash: Some([4.0, 2.0]),
                color,
            },
        }))
    }
}

/// Keep at most `max_points` evenly spaced items.
pub fn decimate_points<T: Copy>(points: &[T], max_points: usize) -> Vec<T> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_keeps_budget() {
        let points: Vec<[f64; 2]> = (0..1000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 100);
        assert_eq!(out.len(), 100);
        assert_eq!(out[1][0], 10.0);
        assert_eq!(decimate_points(&points[..5], 100).len(), 5);
    }

    #[test]
    fn wave_is_clipped_to_its_span() {
        let ts = TimeSeries::from_sample_rate(vec![1.0, 2.0, 3.0, 4.0], 2.0, 1.0, "ECG").unwrap();
        let Series::Line(line) = ts.plot_series("ECG", 0.0, 10.0, 100, Color::nth(0)).unwrap() else {
            panic!("expected a line");
        };
        assert_eq!(line.points, vec![[1.0, 1.0], [1.5, 2.0], [2.0, 3.0], [2.5, 4.0]]);
        assert!(ts.plot_series("ECG", 5.0, 6.0, 100, Color::nth(0)).unwrap().is_empty());
    }

    #[test]
    fn dataset_figure_has_one_series_per_item() {
        let mut ds = Dataset::new();
        ds.add_wave("ECG", TimeSeries::from_sample_rate(vec![0.0; 20], 10.0, 0.0, "ECG").unwrap())
            .unwrap();
        ds.add_points("R", EventSeries::new(vec![0.5, 1.5], vec![1.0, 1.0], "R").unwrap())
            .unwrap();
        let mut hr = IntervalParameter::new("HR");
        hr.add_value(0.0, 1.0, 60.0).unwrap();
        ds.add_parameter("HR", hr).unwrap();

        let fig = Figure::from_dataset(&ds, 0.0, 1.0, 1000).unwrap();
        let names: Vec<&str> = fig.series.iter().map(Series::name).collect();
        assert_eq!(names, vec!["ECG", "R", "HR"]);
        assert_eq!(fig.series[0].len(), 10);
        assert_eq!(fig.series[1].len(), 1);
        assert!(matches!(fig.series[2], Series::Steps(_)));
    }
}
