use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Coarse classification of [`DbError`], for callers that branch on the
/// failure family without caring about the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvalidArgument,
    UnknownCommand,
    Cardinality,
    Assertion,
    Guard,
    Backend,
    Stream,
    Io,
}

// Foreign errors are kept by message so a construction error recorded on a
// query can be reported again on every resolution attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Expected {expected} document{}, but matched {actual}", if *.expected == 1 { "" } else { "s" })]
    Cardinality { expected: u64, actual: u64 },

    #[error("Assertion failure: {0}")]
    Assertion(String),

    #[error("Guard error: {0}")]
    Guard(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DbError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::Cardinality { .. } => ErrorKind::Cardinality,
            Self::Assertion(_) => ErrorKind::Assertion,
            Self::Guard(_) => ErrorKind::Guard,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Stream(_) => ErrorKind::Stream,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArgument(format!("JSON: {e}"))
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        Self::Configuration(format!("TOML: {e}"))
    }
}
