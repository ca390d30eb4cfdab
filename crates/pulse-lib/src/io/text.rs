use crate::{events::EventSeries, signal::TimeSeries};
use anyhow::{Context, Result};
use std::path::Path;

/// Non-blank, non-comment lines with their 1-based line numbers.
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (line_no, line) in data_lines(text) {
        let val: f64 = line
            .parse()
            .with_context(|| format!("line {line_no} is not f64: {line}"))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Parse `time value` pairs, separated by whitespace or a comma, one pair per line.
pub fn parse_two_column(text: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut times = Vec::new();
    let mut values = Vec::new();
    for (line_no, line) in data_lines(text) {
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let [time, value] = fields.as_slice() else {
            anyhow::bail!("line {line_no} does not hold two columns: {line}");
        };
        let time: f64 = time
            .parse()
            .with_context(|| format!("line {line_no} has a bad time: {time}"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("line {line_no} has a bad value: {value}"))?;
        times.push(time);
        values.push(value);
    }
    if times.is_empty() {
        anyhow::bail!("no time/value pairs found");
    }
    Ok((times, values))
}

pub fn read_two_column(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_two_column(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load a single-column file as a wave sampled at `fs` Hz.
pub fn load_wave(path: &Path, fs: f64, offset: f64, kind: &str) -> Result<TimeSeries> {
    let data = read_f64_series(path)?;
    TimeSeries::from_sample_rate(data, fs, offset, kind)
        .with_context(|| format!("invalid wave in {}", path.display()))
}

/// Load a two-column file as landmarks.
pub fn load_points(path: &Path, kind: &str) -> Result<EventSeries> {
    let (times, values) = read_two_column(path)?;
    EventSeries::new(times, values, kind)
        .with_context(|| format!("invalid landmarks in {}", path.display()))
}
