//! Error types shared across vidstack crates.

use std::path::PathBuf;

/// Top-level error type for vidstack operations.
#[derive(Debug, thiserror::Error)]
pub enum VidstackError {
    /// Empty, zero-sized, or zero-duration inputs.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A media file could not be read or is not a recognized container.
    #[error("Probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    /// Sources, descriptors and plan disagree with each other.
    #[error("Plan mismatch: {message}")]
    PlanMismatch { message: String },

    /// Literal text that cannot be represented in a filter description.
    #[error("Cannot escape text {text:?}: {message}")]
    Escape { text: String, message: String },

    /// The external encoder exited unsuccessfully or was cancelled.
    #[error("Encoder failed ({status}): {stderr}")]
    EncodeFailure { status: String, stderr: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Remote cache error: {message}")]
    Cache { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidstackError.
pub type VidstackResult<T> = Result<T, VidstackError>;

impl VidstackError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn plan_mismatch(msg: impl Into<String>) -> Self {
        Self::PlanMismatch {
            message: msg.into(),
        }
    }

    pub fn escape(text: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Escape {
            text: text.into(),
            message: msg.into(),
        }
    }

    pub fn encode_failure(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::EncodeFailure {
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
