//! Pluggable computation units and the dispatcher that runs them against a [`Dataset`].
//!
//! A procedure is one of three kinds:
//!
//! * **Modify** turns the samples of one wave over `[begin, end)` into new samples at
//!   the same rate.
//! * **Detect** reads named waves/points and yields landmark times and values.
//! * **Parameterize** reads named waves/points and yields one scalar per window.
//!
//! Implementations provide a typed [`ModifyProcedure`], [`DetectProcedure`] or
//! [`ParameterizeProcedure`]; a [`ProcedureDescriptor`] wraps one together with the
//! metadata the registry validates at registration time. Arguments always arrive as
//! strings and are parsed by the procedure's `interpret_arguments`.

pub mod args;
pub mod detect;
pub mod modify;
pub mod parameterize;
mod registry;

pub use registry::ProcedureRegistry;

use crate::{
    dataset::{Dataset, InsertMode},
    error::{Error, Result},
    events::EventSeries,
    parameter::IntervalParameter,
    signal::TimeSeries,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Upper bound on the windows [`Request::with_tiled_windows`] will build.
pub const MAX_WINDOWS: usize = 1_000_000;

/// Raw argument values keyed by argument name.
pub type RawArguments = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcedureKind {
    Modify,
    Detect,
    Parameterize,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcedureKind::Modify => "modify",
            ProcedureKind::Detect => "detect",
            ProcedureKind::Parameterize => "parameterize",
        };
        f.write_str(name)
    }
}

/// Waves and points handed to Detect/Parameterize procedures, limited to the names
/// the descriptor declares.
#[derive(Debug, Clone, Default)]
pub struct Inputs<'a> {
    procedure: &'a str,
    waves: BTreeMap<&'a str, &'a TimeSeries>,
    points: BTreeMap<&'a str, &'a EventSeries>,
}

impl<'a> Inputs<'a> {
    pub fn wave(&self, name: &str) -> Result<&'a TimeSeries> {
        self.waves
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingInput {
                procedure: self.procedure.to_string(),
                waves: vec![name.to_string()],
                points: Vec::new(),
            })
    }

    pub fn points(&self, name: &str) -> Result<&'a EventSeries> {
        self.points
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingInput {
                procedure: self.procedure.to_string(),
                waves: Vec::new(),
                points: vec![name.to_string()],
            })
    }
}

pub trait ModifyProcedure: Send + Sync + 'static {
    type Args: 'static;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<Self::Args>;

    /// New samples for `[begin, end)` of `series`, one per native sample.
    fn compute(&self, series: &TimeSeries, begin: f64, end: f64, args: &Self::Args)
        -> Result<Vec<f64>>;
}

pub trait DetectProcedure: Send + Sync + 'static {
    type Args: 'static;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<Self::Args>;

    /// Landmark `(times, values)` found in `[begin, end)`.
    fn compute(
        &self,
        inputs: &Inputs<'_>,
        begin: f64,
        end: f64,
        args: &Self::Args,
    ) -> Result<(Vec<f64>, Vec<f64>)>;
}

pub trait ParameterizeProcedure: Send + Sync + 'static {
    type Args: 'static;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<Self::Args>;

    /// The parameter value over `[begin, end)`, or `None` when the window holds too
    /// little data to define one.
    fn compute(
        &self,
        inputs: &Inputs<'_>,
        begin: f64,
        end: f64,
        args: &Self::Args,
    ) -> Result<Option<f64>>;
}

// Object-safe views over the typed traits. `bind` runs `interpret_arguments` once and
// keeps the typed arguments for the call that follows.

struct Bound<'p, P, A> {
    procedure: &'p P,
    args: A,
}

trait ModifyCall {
    fn run(&self, series: &TimeSeries, begin: f64, end: f64) -> Result<Vec<f64>>;
}

trait ModifyObject: Send + Sync {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn ModifyCall + 'p>>;
}

impl<P: ModifyProcedure> ModifyCall for Bound<'_, P, P::Args> {
    fn run(&self, series: &TimeSeries, begin: f64, end: f64) -> Result<Vec<f64>> {
        self.procedure.compute(series, begin, end, &self.args)
    }
}

impl<P: ModifyProcedure> ModifyObject for P {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn ModifyCall + 'p>> {
        let args = self.interpret_arguments(raw)?;
        Ok(Box::new(Bound { procedure: self, args }))
    }
}

trait DetectCall {
    fn run(&self, inputs: &Inputs<'_>, begin: f64, end: f64) -> Result<(Vec<f64>, Vec<f64>)>;
}

trait DetectObject: Send + Sync {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn DetectCall + 'p>>;
}

impl<P: DetectProcedure> DetectCall for Bound<'_, P, P::Args> {
    fn run(&self, inputs: &Inputs<'_>, begin: f64, end: f64) -> Result<(Vec<f64>, Vec<f64>)> {
        self.procedure.compute(inputs, begin, end, &self.args)
    }
}

impl<P: DetectProcedure> DetectObject for P {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn DetectCall + 'p>> {
        let args = self.interpret_arguments(raw)?;
        Ok(Box::new(Bound { procedure: self, args }))
    }
}

trait ParameterizeCall {
    fn run_windows(&self, inputs: &Inputs<'_>, windows: &[(f64, f64)]) -> Result<Vec<Option<f64>>>;
}

trait ParameterizeObject: Send + Sync {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn ParameterizeCall + 'p>>;
}

impl<P: ParameterizeProcedure> ParameterizeCall for Bound<'_, P, P::Args> {
    fn run_windows(&self, inputs: &Inputs<'_>, windows: &[(f64, f64)]) -> Result<Vec<Option<f64>>> {
        windows
            .iter()
            .map(|&(begin, end)| self.procedure.compute(inputs, begin, end, &self.args))
            .collect()
    }
}

impl<P: ParameterizeProcedure> ParameterizeObject for P {
    fn bind<'p>(&'p self, raw: &RawArguments) -> Result<Box<dyn ParameterizeCall + 'p>> {
        let args = self.interpret_arguments(raw)?;
        Ok(Box::new(Bound { procedure: self, args }))
    }
}

enum Compute {
    Modify(Box<dyn ModifyObject>),
    Detect(Box<dyn DetectObject>),
    Parameterize(Box<dyn ParameterizeObject>),
}

/// One invocation of a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Wave a Modify procedure runs on.
    pub wave: Option<String>,
    pub begin: f64,
    pub end: f64,
    /// Parameterize windows; empty means the single window `[begin, end)`.
    pub windows: Vec<(f64, f64)>,
    pub arguments: RawArguments,
}

impl Request {
    pub fn new(begin: f64, end: f64) -> Self {
        Self {
            wave: None,
            begin,
            end,
            windows: Vec::new(),
            arguments: RawArguments::new(),
        }
    }

    pub fn on_wave(mut self, name: impl Into<String>) -> Self {
        self.wave = Some(name.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_windows(mut self, windows: Vec<(f64, f64)>) -> Self {
        self.windows = windows;
        self
    }

    /// Consecutive windows of `length` seconds tiling `[begin, end)`; the last one may be shorter.
    ///
    /// Fails unless the bounds and `length` are finite, `length` is positive, and every
    /// window starts strictly after the previous one.
    pub fn with_tiled_windows(mut self, length: f64) -> Result<Self> {
        if !(length.is_finite() && length > 0.0) {
            return Err(Error::invalid_argument(
                "window_s",
                format!("must be a positive number of seconds, got {length}"),
            ));
        }
        if !(self.begin.is_finite() && self.end.is_finite()) {
            return Err(Error::invalid_argument(
                "window_s",
                format!("cannot tile the unbounded range [{}, {})", self.begin, self.end),
            ));
        }
        let count = ((self.end - self.begin) / length).ceil().max(0.0);
        if count > MAX_WINDOWS as f64 {
            return Err(Error::invalid_argument(
                "window_s",
                format!(
                    "{length} s windows over [{}, {}) exceed {MAX_WINDOWS} windows",
                    self.begin, self.end
                ),
            ));
        }
        let mut windows = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let start = self.begin + i as f64 * length;
            let stop = (self.begin + (i + 1) as f64 * length).min(self.end);
            if stop <= start {
                return Err(Error::invalid_argument(
                    "window_s",
                    format!("{length} s is below the time resolution at {start}"),
                ));
            }
            windows.push((start, stop));
        }
        self.windows = windows;
        Ok(self)
    }
}

/// Result of a successful procedure call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Wave(TimeSeries),
    Points(EventSeries),
    Parameter(IntervalParameter),
}

impl Dataset {
    /// Write an outcome back under `name`.
    pub fn store(&mut self, name: impl Into<String>, outcome: Outcome, mode: InsertMode) -> Result<()> {
        match outcome {
            Outcome::Wave(wave) => self.insert_wave(name, wave, mode),
            Outcome::Points(points) => self.insert_points(name, points, mode),
            Outcome::Parameter(parameter) => self.insert_parameter(name, parameter, mode),
        }
    }
}

/// A procedure with its metadata.
pub struct ProcedureDescriptor {
    name: String,
    description: String,
    author: String,
    argument_spec: BTreeMap<String, String>,
    default_arguments: BTreeMap<String, String>,
    required_waves: Vec<String>,
    required_points: Vec<String>,
    output_kind: Option<String>,
    compute: Compute,
}

impl fmt::Debug for ProcedureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("argument_spec", &self.argument_spec)
            .field("default_arguments", &self.default_arguments)
            .field("required_waves", &self.required_waves)
            .field("required_points", &self.required_points)
            .field("output_kind", &self.output_kind)
            .finish_non_exhaustive()
    }
}

impl ProcedureDescriptor {
    fn with_compute(name: impl Into<String>, compute: Compute) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            author: String::new(),
            argument_spec: BTreeMap::new(),
            default_arguments: BTreeMap::new(),
            required_waves: Vec::new(),
            required_points: Vec::new(),
            output_kind: None,
            compute,
        }
    }

    pub fn modify(name: impl Into<String>, procedure: impl ModifyProcedure) -> Self {
        Self::with_compute(name, Compute::Modify(Box::new(procedure)))
    }

    pub fn detect(name: impl Into<String>, procedure: impl DetectProcedure) -> Self {
        Self::with_compute(name, Compute::Detect(Box::new(procedure)))
    }

    pub fn parameterize(name: impl Into<String>, procedure: impl ParameterizeProcedure) -> Self {
        Self::with_compute(name, Compute::Parameterize(Box::new(procedure)))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Declare an argument with its help text and default value.
    pub fn with_argument(
        mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.argument_spec.insert(name.clone(), help.into());
        self.default_arguments.insert(name, default.into());
        self
    }

    pub fn with_required_waves(mut self, names: &[&str]) -> Self {
        self.required_waves = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_required_points(mut self, names: &[&str]) -> Self {
        self.required_points = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_output_kind(mut self, kind: impl Into<String>) -> Self {
        self.output_kind = Some(kind.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProcedureKind {
        match self.compute {
            Compute::Modify(_) => ProcedureKind::Modify,
            Compute::Detect(_) => ProcedureKind::Detect,
            Compute::Parameterize(_) => ProcedureKind::Parameterize,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn argument_spec(&self) -> &BTreeMap<String, String> {
        &self.argument_spec
    }

    pub fn default_arguments(&self) -> &BTreeMap<String, String> {
        &self.default_arguments
    }

    pub fn required_waves(&self) -> &[String] {
        &self.required_waves
    }

    pub fn required_points(&self) -> &[String] {
        &self.required_points
    }

    pub fn output_kind(&self) -> Option<&str> {
        self.output_kind.as_deref()
    }

    /// Load-time contract check; [`ProcedureRegistry::register`] runs it.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::contract(self.name.clone(), reason));
        if self.name.trim().is_empty() {
            return fail("name is empty".into());
        }
        if self.description.trim().is_empty() {
            return fail("description is missing".into());
        }
        if self.author.trim().is_empty() {
            return fail("author is missing".into());
        }
        if let Some(arg) = self.argument_spec.keys().find(|k| k.trim().is_empty()) {
            return fail(format!("argument name '{arg}' is empty"));
        }
        if let Some(arg) = self
            .default_arguments
            .keys()
            .find(|k| !self.argument_spec.contains_key(*k))
        {
            return fail(format!("default given for undeclared argument '{arg}'"));
        }
        if let Some(arg) = self
            .argument_spec
            .keys()
            .find(|k| !self.default_arguments.contains_key(*k))
        {
            return fail(format!("argument '{arg}' has no default"));
        }
        match self.kind() {
            ProcedureKind::Modify => {
                if !self.required_waves.is_empty() || !self.required_points.is_empty() {
                    return fail("modify procedures run on the caller's wave and take no required inputs".into());
                }
            }
            ProcedureKind::Detect | ProcedureKind::Parameterize => {
                match self.output_kind.as_deref() {
                    Some(kind) if !kind.trim().is_empty() => {}
                    _ => return fail("output_kind is missing".into()),
                }
                if self
                    .required_waves
                    .iter()
                    .chain(&self.required_points)
                    .any(|n| n.trim().is_empty())
                {
                    return fail("required input names must not be empty".into());
                }
            }
        }
        let checked = match &self.compute {
            Compute::Modify(p) => p.bind(&self.default_arguments).map(drop),
            Compute::Detect(p) => p.bind(&self.default_arguments).map(drop),
            Compute::Parameterize(p) => p.bind(&self.default_arguments).map(drop),
        };
        checked.map_err(|e| Error::contract(self.name.clone(), format!("default arguments rejected: {e}")))
    }

    /// Defaults overlaid with `raw`; unknown names are rejected.
    pub fn merged_arguments(&self, raw: &RawArguments) -> Result<RawArguments> {
        let mut merged = self.default_arguments.clone();
        for (name, value) in raw {
            if !self.argument_spec.contains_key(name) {
                return Err(Error::invalid_argument(
                    name.clone(),
                    format!("'{}' takes no such argument", self.name),
                ));
            }
            merged.insert(name.clone(), value.clone());
        }
        Ok(merged)
    }

    /// Parse and validate `raw` without running the procedure.
    pub fn interpret_arguments(&self, raw: &RawArguments) -> Result<RawArguments> {
        let merged = self.merged_arguments(raw)?;
        match &self.compute {
            Compute::Modify(p) => p.bind(&merged).map(drop)?,
            Compute::Detect(p) => p.bind(&merged).map(drop)?,
            Compute::Parameterize(p) => p.bind(&merged).map(drop)?,
        }
        Ok(merged)
    }

    /// Required waves and points absent from `dataset`, as a [`Error::MissingInput`].
    pub fn check_inputs(&self, dataset: &Dataset) -> Result<()> {
        let waves: Vec<String> = self
            .required_waves
            .iter()
            .filter(|n| dataset.wave(n).is_none())
            .cloned()
            .collect();
        let points: Vec<String> = self
            .required_points
            .iter()
            .filter(|n| dataset.points(n).is_none())
            .cloned()
            .collect();
        if waves.is_empty() && points.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingInput {
                procedure: self.name.clone(),
                waves,
                points,
            })
        }
    }

    pub fn inputs_available(&self, dataset: &Dataset) -> bool {
        self.check_inputs(dataset).is_ok()
    }

    fn gather<'a>(&'a self, dataset: &'a Dataset) -> Inputs<'a> {
        Inputs {
            procedure: &self.name,
            waves: self
                .required_waves
                .iter()
                .filter_map(|n| dataset.wave(n).map(|w| (n.as_str(), w)))
                .collect(),
            points: self
                .required_points
                .iter()
                .filter_map(|n| dataset.points(n).map(|p| (n.as_str(), p)))
                .collect(),
        }
    }

    /// `[begin, end)` narrowed to where every required wave has data.
    fn operating_range(&self, dataset: &Dataset, begin: f64, end: f64) -> Result<(f64, f64)> {
        let (lo, hi) = if self.required_waves.is_empty() {
            (begin, end)
        } else {
            let (span_begin, span_end) = dataset.common_span(&self.required_waves)?;
            (begin.max(span_begin), end.min(span_end))
        };
        if lo.is_nan() || hi.is_nan() || hi <= lo {
            return Err(Error::EmptySpan { begin: lo, end: hi });
        }
        Ok((lo, hi))
    }

    /// Run the procedure. The dataset is only read; use [`Dataset::store`] to keep the result.
    pub fn execute(&self, dataset: &Dataset, request: &Request) -> Result<Outcome> {
        debug!(
            "executing {} procedure '{}' over [{}, {})",
            self.kind(),
            self.name,
            request.begin,
            request.end
        );
        match &self.compute {
            Compute::Modify(procedure) => self.execute_modify(procedure.as_ref(), dataset, request),
            Compute::Detect(procedure) => self.execute_detect(procedure.as_ref(), dataset, request),
            Compute::Parameterize(procedure) => {
                let parameter = self.execute_parameterize(procedure.as_ref(), dataset, request)?;
                Ok(Outcome::Parameter(parameter))
            }
        }
    }

    /// Run a Parameterize procedure and append its values to `target`. `target` is
    /// only touched once every window has been computed.
    pub fn execute_into(
        &self,
        dataset: &Dataset,
        request: &Request,
        target: &mut IntervalParameter,
    ) -> Result<()> {
        let Compute::Parameterize(procedure) = &self.compute else {
            return Err(Error::contract(
                self.name.clone(),
                format!("{} procedures produce no parameter values", self.kind()),
            ));
        };
        let computed = self.execute_parameterize(procedure.as_ref(), dataset, request)?;
        for (begin, end, value) in computed.iter() {
            target.add_value(begin, end, value)?;
        }
        Ok(())
    }

    fn execute_modify(
        &self,
        procedure: &dyn ModifyObject,
        dataset: &Dataset,
        request: &Request,
    ) -> Result<Outcome> {
        let name = request
            .wave
            .as_deref()
            .ok_or_else(|| Error::invalid_argument("wave", "modify procedures need a target wave"))?;
        let series = dataset.wave(name).ok_or_else(|| Error::MissingInput {
            procedure: self.name.clone(),
            waves: vec![name.to_string()],
            points: Vec::new(),
        })?;
        let arguments = self.merged_arguments(&request.arguments)?;
        let call = procedure.bind(&arguments)?;

        let window = series.window(request.begin, request.end)?;
        let data = call.run(series, request.begin, request.end)?;
        if data.len() != window.len() {
            return Err(Error::contract(
                self.name.clone(),
                format!("returned {} samples for a {}-sample window", data.len(), window.len()),
            ));
        }
        let wave = TimeSeries::with_sample_length(
            data,
            series.sample_length(),
            window.offset(),
            series.kind(),
        )?;
        Ok(Outcome::Wave(wave))
    }

    fn execute_detect(
        &self,
        procedure: &dyn DetectObject,
        dataset: &Dataset,
        request: &Request,
    ) -> Result<Outcome> {
        self.check_inputs(dataset)?;
        let arguments = self.merged_arguments(&request.arguments)?;
        let call = procedure.bind(&arguments)?;

        let (begin, end) = self.operating_range(dataset, request.begin, request.end)?;
        let inputs = self.gather(dataset);
        let (times, values) = call.run(&inputs, begin, end)?;
        if times.len() != values.len() {
            return Err(Error::contract(
                self.name.clone(),
                format!("returned {} times but {} values", times.len(), values.len()),
            ));
        }
        let kind = self.output_kind.clone().unwrap_or_default();
        let events = EventSeries::new(times, values, kind)?;
        debug!("'{}' found {} events", self.name, events.len());
        Ok(Outcome::Points(events))
    }

    fn execute_parameterize(
        &self,
        procedure: &dyn ParameterizeObject,
        dataset: &Dataset,
        request: &Request,
    ) -> Result<IntervalParameter> {
        self.check_inputs(dataset)?;
        let arguments = self.merged_arguments(&request.arguments)?;
        let call = procedure.bind(&arguments)?;

        let requested = if request.windows.is_empty() {
            vec![(request.begin, request.end)]
        } else {
            request.windows.clone()
        };
        // Windows outside the common span contribute nothing.
        let windows: Vec<(f64, f64)> = requested
            .into_iter()
            .filter_map(|(b, e)| self.operating_range(dataset, b, e).ok())
            .collect();
        let inputs = self.gather(dataset);
        let values = call.run_windows(&inputs, &windows)?;

        let mut parameter = IntervalParameter::new(self.output_kind.clone().unwrap_or_default());
        for ((begin, end), value) in windows.into_iter().zip(values) {
            if let Some(value) = value {
                parameter.add_value(begin, end, value)?;
            }
        }
        Ok(parameter)
    }
}
