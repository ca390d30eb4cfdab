use thiserror::Error;

/// Failures raised by the data model, the dataset and the procedure dispatcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("time {time} lies outside the valid span [{begin}, {end})")]
    OutOfRange { time: f64, begin: f64, end: f64 },

    #[error("incompatible replacement series: expected {expected}, found {found}")]
    IncompatibleRate { expected: f64, found: f64 },

    #[error("procedure '{procedure}' is missing inputs (waves: {waves:?}, points: {points:?})")]
    MissingInput {
        procedure: String,
        waves: Vec<String>,
        points: Vec<String>,
    },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("procedure '{procedure}' violates the procedure contract: {reason}")]
    InvalidProcedureContract { procedure: String, reason: String },

    #[error("{collection} '{name}' already exists")]
    DuplicateKey { collection: &'static str, name: String },

    #[error("empty time span [{begin}, {end})")]
    EmptySpan { begin: f64, end: f64 },
}

impl Error {
    pub(crate) fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn contract(procedure: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidProcedureContract {
            procedure: procedure.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
