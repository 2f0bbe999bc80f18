//! Error types for venvscan.
//!
//! Only setup failures surface through [`ScanError`]. Failures that belong to a
//! single job (an unreadable directory, a broken manifest line, a version check that
//! times out) are absorbed by the job handler and never reach the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the scanning library.
#[derive(Error, Debug)]
pub enum ScanError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A subprocess could not be started
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess ran past its deadline and was killed
    #[error("'{program}' did not finish within {after:?}")]
    Timeout { program: PathBuf, after: Duration },

    /// A subprocess exited unsuccessfully
    #[error("'{program}' exited with {code:?}: {output}")]
    Exit {
        program: PathBuf,
        code: Option<i32>,
        output: String,
    },

    /// Structured output from a collaborator could not be decoded
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The environment's package-install directory could not be determined
    #[error("Could not resolve library root: {0}")]
    LibraryRoot(String),

    /// None of the expected executables exist in a directory
    #[error("No executable among {candidates:?} in {}", dir.display())]
    MissingExecutable {
        dir: PathBuf,
        candidates: Vec<String>,
    },

    /// HTTP errors while talking to PyPI
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ScanError>;
