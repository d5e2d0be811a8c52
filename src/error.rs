//! Error taxonomy for mcpmend.
//!
//! Library functions return these; the operations that build reports catch
//! them and fold them into the report. [`MendError::IoFailure`] aborts a
//! repair and lands in its `errors`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MendError {
    #[error("Manifest not found at: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("JSON syntax error: {0}")]
    SyntaxError(String),

    #[error("Server \"{server}\": {message}")]
    SchemaViolation { server: String, message: String },

    #[error("Probe {probe} unavailable: {reason}")]
    ProbeUnavailable { probe: String, reason: String },

    #[error("Failed to {action} {}", .path.display())]
    IoFailure {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MendError {
    pub fn probe_unavailable(probe: impl Into<String>, reason: impl Into<String>) -> Self {
        MendError::ProbeUnavailable {
            probe: probe.into(),
            reason: reason.into(),
        }
    }

    pub fn io_failure(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MendError::IoFailure {
            action,
            path: path.into(),
            source,
        }
    }

    /// Exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            MendError::ConfigMissing(_) => 2,
            MendError::IoFailure { .. } => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, MendError>;
