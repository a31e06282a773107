//! Error types for Splice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Splice operations.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for Splice operations.
pub type Result<T> = std::result::Result<T, SpliceError>;

/// Why an edit was refused. Rejections are recoverable: the timeline is
/// left exactly as it was.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    #[error("clips would overlap")]
    Overlap,

    #[error("clip kind does not match track kind")]
    KindMismatch,

    #[error("clip would be shorter than the minimum duration")]
    BelowMinDuration,

    #[error("value out of range")]
    OutOfRange,

    #[error("no such clip, track or marker")]
    NotFound,

    #[error("track is locked")]
    TrackLocked,
}

impl RejectReason {
    /// Stable reason code surfaced to the host UI.
    pub fn code(self) -> &'static str {
        match self {
            Self::Overlap => "overlap",
            Self::KindMismatch => "kind-mismatch",
            Self::BelowMinDuration => "below-min-duration",
            Self::OutOfRange => "out-of-range",
            Self::NotFound => "not-found",
            Self::TrackLocked => "track-locked",
        }
    }
}
