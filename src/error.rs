//! Error handling module for the Jadwal orchestration layer
//!
//! Every operation the presentation layer can call reports failure through
//! [`JadwalError`]. Messages carry enough context (candidate paths, captured
//! engine output) to diagnose a missing or misconfigured engine without
//! reading the source.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the orchestration layer
#[derive(Error, Debug)]
pub enum JadwalError {
    /// Missing or malformed month/year; never reaches the engine
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bootstrap exhausted every source for the input workbook
    #[error("Data file missing: {0}")]
    MissingDataFile(String),

    /// No engine artifact exists at any candidate location
    #[error("Engine not found. Checked:\n{}", format_candidates(.candidates))]
    EngineNotFound { candidates: Vec<PathBuf> },

    /// No presentation asset exists at any candidate location
    #[error("Presentation asset not found. Checked:\n{}", format_candidates(.candidates))]
    AssetNotFound { candidates: Vec<PathBuf> },

    /// The OS refused to start the engine process
    #[error("Spawn failed for {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and exited unsuccessfully
    #[error("{message}")]
    EngineExecution {
        message: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Settings could not be written
    #[error("Failed to persist settings to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output location could not be shown in the file manager
    #[error("Cannot reveal output: {0}")]
    Reveal(String),

    /// IO errors outside the categories above (copying, directory creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, JadwalError>;

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

// Convenient error constructors
impl JadwalError {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a missing data file error
    pub fn missing_data_file(msg: impl Into<String>) -> Self {
        Self::MissingDataFile(msg.into())
    }

    /// Create a reveal error
    pub fn reveal(msg: impl Into<String>) -> Self {
        Self::Reveal(msg.into())
    }

    /// Build the failure for a non-zero engine exit.
    ///
    /// The message prefers stderr, then stdout, then a generic exit-code line.
    /// Captured text is used verbatim.
    pub fn engine_execution(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let message = if !stderr.trim().is_empty() {
            stderr.clone()
        } else if !stdout.trim().is_empty() {
            stdout.clone()
        } else {
            match exit_code {
                Some(code) => format!("Engine exited with code {}", code),
                None => "Engine was terminated by a signal".to_string(),
            }
        };
        Self::EngineExecution {
            message,
            exit_code,
            stdout,
            stderr,
        }
    }
}
