// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the sequence modeling library.

use std::fmt;

/// Result type alias for sequence modeling operations.
pub type Result<T> = std::result::Result<T, SequenceError>;

/// Main error type for the sequence modeling library.
///
/// Per-frame and per-sample anomalies (unknown joint names, missing record
/// fields, degenerate normalization scales) are repaired locally and never
/// surface here; this type covers the fatal conditions only.
#[derive(Debug)]
pub enum SequenceError {
    /// A required input file or directory is missing.
    NotFound(String),
    /// A video could not be opened or decoded by the extraction capability.
    /// Fatal for that item, non-fatal for a batch of items.
    Extraction(String),
    /// Annotation key sets differ across samples that should share one axis.
    Annotation(String),
    /// Error loading an exported inference artifact.
    ModelLoad(String),
    /// Error running inference on an exported artifact.
    Inference(String),
    /// Invalid configuration or input shape provided.
    Config(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Wrapped `serde_json::Error`.
    Json(serde_json::Error),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Extraction(msg) => write!(f, "Extraction error: {msg}"),
            Self::Annotation(msg) => write!(f, "Annotation error: {msg}"),
            Self::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            Self::Inference(msg) => write!(f, "Inference error: {msg}"),
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for SequenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SequenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SequenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
