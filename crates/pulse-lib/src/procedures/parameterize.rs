//! Built-in per-window parameters.

use crate::{
    error::{Error, Result},
    metrics::hrv::RRSeries,
    procedures::{
        args::parse_usize, Inputs, ParameterizeProcedure, ProcedureDescriptor, RawArguments,
    },
};

const AUTHOR: &str = "Pulse Contributors";

/// RR intervals ending inside `[begin, end)`; the beat before the window is kept as context.
fn rr_in(inputs: &Inputs<'_>, points: &str, begin: f64, end: f64) -> Result<RRSeries> {
    let (times, _) = inputs.points(points)?.slice(begin, end, 1);
    Ok(RRSeries::from_times(times))
}

fn parse_min_intervals(raw: &RawArguments, floor: usize) -> Result<usize> {
    let min = parse_usize(raw, "min_intervals")?;
    if min < floor {
        return Err(Error::invalid_argument(
            "min_intervals",
            format!("must be at least {floor}, got {min}"),
        ));
    }
    Ok(min)
}

#[derive(Debug, Clone, Copy)]
pub struct HeartRate {
    pub points: &'static str,
}

impl ParameterizeProcedure for HeartRate {
    type Args = usize;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<usize> {
        parse_min_intervals(raw, 1)
    }

    fn compute(&self, inputs: &Inputs<'_>, begin: f64, end: f64, min: &usize) -> Result<Option<f64>> {
        let rr = rr_in(inputs, self.points, begin, end)?;
        if rr.len() < *min {
            return Ok(None);
        }
        Ok(rr.heart_rate())
    }
}

/// Root mean square of successive RR differences, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct Rmssd {
    pub points: &'static str,
}

impl ParameterizeProcedure for Rmssd {
    type Args = usize;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<usize> {
        parse_min_intervals(raw, 2)
    }

    fn compute(&self, inputs: &Inputs<'_>, begin: f64, end: f64, min: &usize) -> Result<Option<f64>> {
        let rr = rr_in(inputs, self.points, begin, end)?;
        if rr.len() < *min {
            return Ok(None);
        }
        Ok(rr.rmssd().map(|s| s * 1000.0))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MeanPressure {
    pub wave: &'static str,
}

impl ParameterizeProcedure for MeanPressure {
    type Args = ();

    fn interpret_arguments(&self, _raw: &RawArguments) -> Result<()> {
        Ok(())
    }

    fn compute(&self, inputs: &Inputs<'_>, begin: f64, end: f64, _: &()) -> Result<Option<f64>> {
        let samples = inputs.wave(self.wave)?.slice(begin, end)?;
        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(samples.iter().sum::<f64>() / samples.len() as f64))
    }
}

pub fn descriptors() -> Vec<ProcedureDescriptor> {
    vec![
        ProcedureDescriptor::parameterize("heart_rate", HeartRate { points: "R" })
            .with_description("Heart rate (beats/min) from the mean RR interval")
            .with_author(AUTHOR)
            .with_required_points(&["R"])
            .with_output_kind("HR")
            .with_argument("min_intervals", "RR intervals needed for a value", "1"),
        ProcedureDescriptor::parameterize("rmssd", Rmssd { points: "R" })
            .with_description("RMSSD (ms) of the RR intervals")
            .with_author(AUTHOR)
            .with_required_points(&["R"])
            .with_output_kind("RMSSD")
            .with_argument("min_intervals", "RR intervals needed for a value", "2"),
        ProcedureDescriptor::parameterize("mean_pressure", MeanPressure { wave: "BP" })
            .with_description("Mean arterial pressure over the window")
            .with_author(AUTHOR)
            .with_required_waves(&["BP"])
            .with_output_kind("MAP"),
    ]
}
