//! Error types for the Vantage pipeline.
//!
//! Only [`Error::CaptureUnavailable`] ends a pipeline run. Empty detection
//! batches and filtered-out candidates are not errors at all; they are
//! represented as empty batches and `None` selections.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The capture mechanism can no longer produce frames
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The detector failed on a frame
    #[error("detection failed: {0}")]
    Detection(String),

    /// Sending a target vector to the peer failed
    #[error("delivery failed: {0}")]
    Delivery(#[source] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends a pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CaptureUnavailable(_))
    }
}

/// Result type alias using the Vantage error.
pub type Result<T> = std::result::Result<T, Error>;
