use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{debug, info};
use pulse_lib::{
    dataset::{Dataset, InsertMode},
    io::text as text_io,
    plot::Figure,
    procedures::{Outcome, ProcedureKind, ProcedureRegistry, RawArguments, Request},
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse: physiological waveform analysis tools"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindFilter {
    Modify,
    Detect,
    Parameterize,
}

impl From<KindFilter> for ProcedureKind {
    fn from(kind: KindFilter) -> Self {
        match kind {
            KindFilter::Modify => ProcedureKind::Modify,
            KindFilter::Detect => ProcedureKind::Detect,
            KindFilter::Parameterize => ProcedureKind::Parameterize,
        }
    }
}

/// Files making up one recording.
#[derive(clap::Args, Debug)]
struct Inputs {
    /// Single-column wave file, as NAME=PATH (repeatable)
    #[arg(long = "wave", value_name = "NAME=PATH")]
    waves: Vec<String>,
    /// Two-column (time value) landmark file, as NAME=PATH (repeatable)
    #[arg(long = "points", value_name = "NAME=PATH")]
    points: Vec<String>,
    /// Sample rate of every wave file (Hz)
    #[arg(long, default_value_t = 250.0)]
    fs: f64,
    /// Time of the first sample of every wave file (s)
    #[arg(long, default_value_t = 0.0)]
    offset: f64,
    /// Start of the analysed range (s); defaults to the start of the data
    #[arg(long)]
    begin: Option<f64>,
    /// End of the analysed range (s); defaults to the end of the data
    #[arg(long)]
    end: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered procedures as JSON
    List {
        #[arg(long)]
        kind: Option<KindFilter>,
    },
    /// Run one procedure against the given recording and print its outcome as JSON
    Run {
        #[arg(long)]
        procedure: String,
        #[command(flatten)]
        inputs: Inputs,
        /// Wave a modify procedure runs on
        #[arg(long)]
        target: Option<String>,
        /// Split the range into windows of this length (parameterize only)
        #[arg(long)]
        window_s: Option<f64>,
        /// Procedure argument, as KEY=VALUE (repeatable; wins over --args-file)
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// TOML file of procedure arguments
        #[arg(long)]
        args_file: Option<PathBuf>,
        /// Print the whole dataset with the outcome stored under this name
        #[arg(long)]
        store_as: Option<String>,
    },
    /// Describe the recording as a backend-neutral figure (JSON)
    Plot {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value_t = 2000)]
        max_points: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let registry = ProcedureRegistry::with_builtins()?;
    info!("{} procedures registered", registry.len());
    match cli.command {
        Commands::List { kind } => cmd_list(&registry, kind)?,
        Commands::Run {
            procedure,
            inputs,
            target,
            window_s,
            args,
            args_file,
            store_as,
        } => cmd_run(
            &registry,
            &procedure,
            &inputs,
            target,
            window_s,
            &args,
            args_file.as_deref(),
            store_as,
        )?,
        Commands::Plot { inputs, max_points } => cmd_plot(&inputs, max_points)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct ArgumentInfo<'a> {
    help: &'a str,
    default: &'a str,
}

#[derive(Serialize)]
struct ProcedureInfo<'a> {
    name: &'a str,
    kind: ProcedureKind,
    description: &'a str,
    author: &'a str,
    arguments: BTreeMap<&'a str, ArgumentInfo<'a>>,
    required_waves: &'a [String],
    required_points: &'a [String],
    output_kind: Option<&'a str>,
}

fn cmd_list(registry: &ProcedureRegistry, kind: Option<KindFilter>) -> Result<()> {
    let kind = kind.map(ProcedureKind::from);
    let infos: Vec<ProcedureInfo<'_>> = registry
        .iter()
        .filter(|d| kind.map_or(true, |k| d.kind() == k))
        .map(|d| ProcedureInfo {
            name: d.name(),
            kind: d.kind(),
            description: d.description(),
            author: d.author(),
            arguments: d
                .argument_spec()
                .iter()
                .map(|(name, help)| {
                    let default = d.default_arguments().get(name).map_or("", String::as_str);
                    (name.as_str(), ArgumentInfo { help, default })
                })
                .collect(),
            required_waves: d.required_waves(),
            required_points: d.required_points(),
            output_kind: d.output_kind(),
        })
        .collect();
    println!("{}", serde_json::to_string(&infos)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    registry: &ProcedureRegistry,
    procedure: &str,
    inputs: &Inputs,
    target: Option<String>,
    window_s: Option<f64>,
    args: &[String],
    args_file: Option<&Path>,
    store_as: Option<String>,
) -> Result<()> {
    let descriptor = registry
        .get(procedure)
        .ok_or_else(|| anyhow!("unknown procedure '{procedure}' (see `pulse list`)"))?;
    let mut dataset = load_dataset(inputs)?;
    let (begin, end) = analysis_range(&dataset, inputs)?;

    let mut arguments = match args_file {
        Some(path) => read_args_file(path)?,
        None => RawArguments::new(),
    };
    for pair in args {
        let (key, value) = split_pair(pair, "--arg")?;
        arguments.insert(key.to_string(), value.to_string());
    }

    let mut request = Request::new(begin, end);
    request.arguments = arguments;
    if let Some(name) = target {
        request = request.on_wave(name);
    }
    if let Some(length) = window_s {
        if descriptor.kind() != ProcedureKind::Parameterize {
            bail!("--window-s only applies to parameterize procedures");
        }
        request = request.with_tiled_windows(length)?;
    }
    debug!("request: {request:?}");

    let outcome = descriptor
        .execute(&dataset, &request)
        .with_context(|| format!("running '{procedure}'"))?;
    match store_as {
        Some(name) => {
            let mode = match outcome {
                Outcome::Wave(_) => InsertMode::Merge,
                _ => InsertMode::Replace,
            };
            dataset.store(name, outcome, mode)?;
            println!("{}", serde_json::to_string(&dataset)?);
        }
        None => println!("{}", serde_json::to_string(&outcome)?),
    }
    Ok(())
}

fn cmd_plot(inputs: &Inputs, max_points: usize) -> Result<()> {
    let dataset = load_dataset(inputs)?;
    let (begin, end) = analysis_range(&dataset, inputs)?;
    let fig = Figure::from_dataset(&dataset, begin, end, max_points)?;
    println!("{}", serde_json::to_string(&fig)?);
    Ok(())
}

fn split_pair<'a>(pair: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("{flag} expects NAME=VALUE, got '{pair}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("{flag} expects NAME=VALUE, got '{pair}'");
    }
    Ok((key, value.trim()))
}

fn load_dataset(inputs: &Inputs) -> Result<Dataset> {
    let mut dataset = Dataset::new();
    for pair in &inputs.waves {
        let (name, path) = split_pair(pair, "--wave")?;
        let wave = text_io::load_wave(Path::new(path), inputs.fs, inputs.offset, name)?;
        dataset.add_wave(name, wave)?;
    }
    for pair in &inputs.points {
        let (name, path) = split_pair(pair, "--points")?;
        let points = text_io::load_points(Path::new(path), name)?;
        dataset.add_points(name, points)?;
    }
    Ok(dataset)
}

fn analysis_range(dataset: &Dataset, inputs: &Inputs) -> Result<(f64, f64)> {
    let full = dataset.full_span();
    let begin = inputs.begin.or(full.map(|(b, _)| b));
    let end = inputs.end.or(full.map(|(_, e)| e));
    match (begin, end) {
        (Some(b), Some(e)) if b < e => Ok((b, e)),
        (Some(b), Some(e)) => bail!("empty analysis range [{b}, {e})"),
        _ => bail!("no data loaded; pass --begin and --end or at least one --wave/--points"),
    }
}

/// Flat TOML table of scalars; every value is handed over as a string.
fn read_args_file(path: &Path) -> Result<RawArguments> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&text).with_context(|| format!("parsing arguments {}", path.display()))?;
    let mut arguments = RawArguments::new();
    for (key, value) in table {
        let text = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => bail!("argument '{key}' must be a scalar, got {}", other.type_str()),
        };
        arguments.insert(key, text);
    }
    Ok(arguments)
}
