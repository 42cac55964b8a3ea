//! Error types for the RingStream CLI.

use thiserror::Error;

use ringstream::error::StreamError;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// Error from the benchmark library.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// IO error while writing results.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Result serialization error.
    #[error("Output error: {0}")]
    Output(String),
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

impl CliError {
    /// Whether this is a device runtime fault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CliError::Stream(e) if e.is_fatal())
    }
}
