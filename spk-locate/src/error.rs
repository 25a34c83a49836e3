/// Error types for the location adapters
use std::path::PathBuf;
use thiserror::Error;

/// A location run that failed; the pick store is left untouched.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Reading, writing or removing a solver file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The solver program could not be started
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The solver did not write its output file
    #[error("Solver output not found: {}", .0.display())]
    MissingOutput(PathBuf),

    /// The solver wrote an empty output file
    #[error("Solver output is empty: {}", .0.display())]
    EmptyOutput(PathBuf),

    /// A required report section is absent
    #[error("No location in solver output: {0}")]
    NoLocation(String),

    /// A report line could not be parsed
    #[error("Malformed solver output at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl LocateError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> LocateError {
        LocateError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Type alias for Results using LocateError
pub type Result<T> = std::result::Result<T, LocateError>;
