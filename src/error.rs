//! Error taxonomy shared by the calibration loaders and the pose reader.

use std::path::PathBuf;

/// Failure returned by every loader and reader in this crate.
///
/// Each variant carries the offending path (where one exists) so that the
/// boundary log line and the returned error tell the same story.
#[derive(thiserror::Error, Debug)]
pub enum PerceptionIoError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid document {}: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },
    #[error("Missing field(s) {fields:?} in {}", path.display())]
    MissingField { path: PathBuf, fields: Vec<String> },
    #[error("Failed to parse {}: {message}", path.display())]
    ParseError { path: PathBuf, message: String },
    #[error("Truncated record in {}: expected {expected} tokens, found {found}", path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for PerceptionIoError {
    fn from(err: std::io::Error) -> Self {
        PerceptionIoError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PerceptionIoError {
    fn from(err: serde_yaml::Error) -> Self {
        PerceptionIoError::IOError(format!("YAML serialization failed: {err}"))
    }
}

impl PerceptionIoError {
    /// Builds a [`PerceptionIoError::ParseError`] for `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PerceptionIoError::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }
}
