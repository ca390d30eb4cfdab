pub mod dataset;
pub mod detectors;
pub mod error;
pub mod events;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod parameter;
pub mod plot;
pub mod procedures;
pub mod signal;

pub use dataset::*;
pub use detectors::*;
pub use error::{Error, Result};
pub use events::*;
pub use metrics::*;
pub use parameter::*;
pub use procedures::{
    Inputs, Outcome, ProcedureDescriptor, ProcedureKind, ProcedureRegistry, RawArguments,
    Request,
};
pub use signal::*;
