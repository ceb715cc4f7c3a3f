//! Error types shared by the triage and memory pipelines.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiftError {
    /// An address or timestamp could not be parsed.
    #[error("Parse failure: {0}")]
    Parse(String),

    /// The AI backend kept failing until the retry policy gave up.
    #[error("AI unavailable after {attempts} attempt(s): {reason}")]
    AiUnavailable { attempts: u32, reason: String },

    /// The AI answered, but not with the JSON shape the call site expects.
    #[error("Malformed AI response: {0}")]
    MalformedAiResponse(String),

    /// A persisted store could not be read back.
    #[error("Store '{path}' is unreadable: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SiftError>;

impl SiftError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
