use thiserror::Error;

/// Main error type for the Hyperlab system
#[derive(Error, Debug)]
pub enum HlError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),

    #[error("Invalid status: {status} (expected one of finished, working, pausing)")]
    InvalidStatus { status: String },

    #[error("Experiment not found: {experiment_id}")]
    NotFound { experiment_id: String },

    #[error("Experiment already registered: {experiment_id}")]
    DuplicateExperiment { experiment_id: String },

    #[error("Unknown optimizer: {name}")]
    UnknownOptimizer { name: String },

    #[error("Parameter definition error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Experiment assistant is no longer accepting requests: {experiment}")]
    AssistantClosed { experiment: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while constructing or querying a parameter definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Value list is empty")]
    EmptyValues,

    #[error("Value {value} is listed more than once")]
    DuplicateValue { value: String },

    #[error("Bounds are not ordered: lower {lower} must be below upper {upper}")]
    UnorderedBounds { lower: f64, upper: f64 },

    #[error("Bounds must be finite: {lower}, {upper}")]
    NonFiniteBounds { lower: f64, upper: f64 },

    #[error("Got {values} values but {positions} positions")]
    PositionCountMismatch { values: usize, positions: usize },

    #[error("Positions must be finite and strictly increasing")]
    UnorderedPositions,

    #[error("Value {value} is not part of the parameter domain")]
    NotInDomain { value: String },

    #[error("Value {value} has the wrong kind for a {definition} parameter")]
    WrongKind { value: String, definition: &'static str },

    #[error("{definition} parameters have no value ordering")]
    NotComparable { definition: &'static str },
}

/// Result type alias for Hyperlab operations
pub type HlResult<T> = Result<T, HlError>;

/// Macro for creating invalid-candidate errors
#[macro_export]
macro_rules! invalid_candidate {
    ($($arg:tt)*) => {
        $crate::HlError::InvalidCandidate(format!($($arg)*))
    };
}

/// Macro for creating invalid-argument errors
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        $crate::HlError::InvalidArgument(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HlError::Config(format!($($arg)*))
    };
}
