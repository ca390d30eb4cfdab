//! Built-in filters that rewrite a window of one wave.

use crate::{
    error::{Error, Result},
    filters::{moving_average, single_pole_highpass, spectral_lowpass},
    procedures::{
        args::{parse_positive, parse_f64},
        ModifyProcedure, ProcedureDescriptor, RawArguments,
    },
    signal::TimeSeries,
};

const AUTHOR: &str = "Pulse Contributors";

/// `cutoff_hz` must stay below the Nyquist frequency of the wave it runs on.
fn check_nyquist(cutoff: f64, series: &TimeSeries) -> Result<()> {
    let nyquist = 0.5 * series.sample_rate();
    if cutoff >= nyquist {
        return Err(Error::invalid_argument(
            "cutoff_hz",
            format!("{cutoff} Hz is not below the Nyquist frequency {nyquist} Hz"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HighPass;

impl ModifyProcedure for HighPass {
    type Args = f64;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<f64> {
        parse_positive(raw, "cutoff_hz")
    }

    fn compute(&self, series: &TimeSeries, begin: f64, end: f64, cutoff: &f64) -> Result<Vec<f64>> {
        check_nyquist(*cutoff, series)?;
        let samples = series.slice(begin, end)?;
        Ok(single_pole_highpass(samples, series.sample_rate(), *cutoff))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LowPass;

impl ModifyProcedure for LowPass {
    type Args = f64;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<f64> {
        parse_positive(raw, "cutoff_hz")
    }

    fn compute(&self, series: &TimeSeries, begin: f64, end: f64, cutoff: &f64) -> Result<Vec<f64>> {
        check_nyquist(*cutoff, series)?;
        let samples = series.slice(begin, end)?;
        spectral_lowpass(samples, series.sample_rate(), *cutoff)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Smooth;

impl ModifyProcedure for Smooth {
    type Args = f64;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<f64> {
        parse_positive(raw, "window_s")
    }

    fn compute(&self, series: &TimeSeries, begin: f64, end: f64, window_s: &f64) -> Result<Vec<f64>> {
        let samples = series.slice(begin, end)?;
        let win = ((window_s / series.sample_length()).round() as usize).max(1);
        Ok(moving_average(samples, win))
    }
}

/// Offset (in signal units) added to every sample; mostly useful for tests and demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shift;

impl ModifyProcedure for Shift {
    type Args = f64;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<f64> {
        parse_f64(raw, "amount")
    }

    fn compute(&self, series: &TimeSeries, begin: f64, end: f64, amount: &f64) -> Result<Vec<f64>> {
        Ok(series.slice(begin, end)?.iter().map(|v| v + amount).collect())
    }
}

pub fn descriptors() -> Vec<ProcedureDescriptor> {
    vec![
        ProcedureDescriptor::modify("highpass", HighPass)
            .with_description("Single-pole high-pass filter for baseline wander removal")
            .with_author(AUTHOR)
            .with_argument("cutoff_hz", "Cutoff frequency (Hz), below Nyquist", "0.5"),
        ProcedureDescriptor::modify("lowpass", LowPass)
            .with_description("Spectral low-pass filter that zeroes every bin above the cutoff")
            .with_author(AUTHOR)
            .with_argument("cutoff_hz", "Cutoff frequency (Hz), below Nyquist", "40"),
        ProcedureDescriptor::modify("smooth", Smooth)
            .with_description("Centred moving average")
            .with_author(AUTHOR)
            .with_argument("window_s", "Averaging window (seconds)", "0.05"),
        ProcedureDescriptor::modify("shift", Shift)
            .with_description("Add a constant to every sample")
            .with_author(AUTHOR)
            .with_argument("amount", "Value added to each sample", "0"),
    ]
}
