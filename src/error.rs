//! Error types for colour quantisation.
use std::fmt;

/// Error returned by the quantiser, remapper, or frame driver.
#[derive(Debug)]
pub enum QuantizeError {
    /// `k` was less than 2, or greater than the number of distinct
    /// colour-key bins present in the image.
    InvalidK {
        /// The `k` the caller asked for.
        requested: usize,
        /// The number of distinct colour-key bins actually present.
        available: usize,
    },
    /// The source image had zero pixels.
    EmptyImage,
    /// Writing a remapped image or a composited frame to its sink failed.
    SinkFailure(String),
    /// A lower-level I/O error occurred (image decode/encode, file access).
    Io(std::io::Error),
}

impl fmt::Display for QuantizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidK { requested, available } => write!(
                f,
                "invalid palette size {requested}: must be between 2 and {available} (the number of distinct colours found)"
            ),
            Self::EmptyImage => write!(f, "image has zero pixels"),
            Self::SinkFailure(msg) => write!(f, "sink failure: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for QuantizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidK { .. } | Self::EmptyImage | Self::SinkFailure(_) => None,
        }
    }
}

impl From<std::io::Error> for QuantizeError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}
