//! Error types for tsprep-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsprepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid time pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The server answered, but reported a failure (`ok: false` or an `error` field).
    #[error("{endpoint} failed: {message}")]
    Api { endpoint: String, message: String },

    /// The request never produced a usable body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An action needs a target column and none is selected.
    #[error("select a target first")]
    NoTarget,

    #[error("Render target not found: #{0}")]
    MissingTarget(String),

    #[error("Snapshot not found for project: {0}")]
    SnapshotNotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TsprepError>;
