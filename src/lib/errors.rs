//! Custom error types for pkgq operations.

use std::io;

use thiserror::Error;

/// Result type alias for pkgq operations
pub type Result<T> = std::result::Result<T, PkgqError>;

/// Boxed error produced by a decoder or formatter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Exit status for usage and argument errors.
pub const USAGE_EXIT_CODE: i32 = 1;

/// Exit status for operational failures (decode, format, I/O, threading).
pub const FAILURE_EXIT_CODE: i32 = 2;

/// Error type for pkgq operations
#[derive(Error, Debug)]
pub enum PkgqError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Malformed input stream
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "pkglist")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Reading an input failed
    #[error("Failed to read '{path}'")]
    Read {
        /// Path of the input ("-" for stdin)
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A record blob could not be decoded
    #[error("Failed to decode record #{}", .index + 1)]
    Decode {
        /// Zero-based arrival position of the record
        index: u64,
        /// Underlying decoder error
        #[source]
        source: BoxError,
    },

    /// A decoded record could not be formatted
    #[error("Failed to format record #{}", .index + 1)]
    Format {
        /// Zero-based arrival position of the record
        index: u64,
        /// Underlying formatter error
        #[source]
        source: BoxError,
    },

    /// Writing formatted output failed
    #[error("Failed to write output")]
    Sink(#[source] io::Error),

    /// The other pipeline actor failed and the pipeline was torn down
    #[error("Pipeline aborted after a failure in the other thread")]
    Aborted,

    /// The worker thread panicked
    #[error("Worker thread panicked")]
    WorkerPanicked,

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread")]
    Spawn(#[source] io::Error),

    /// Queue bookkeeping no longer matches its contents
    #[error("Work queue invariant violated: {0}")]
    Invariant(String),
}

impl PkgqError {
    /// Exit status the command line should terminate with for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            PkgqError::InvalidParameter { .. } => USAGE_EXIT_CODE,
            _ => FAILURE_EXIT_CODE,
        }
    }
}
