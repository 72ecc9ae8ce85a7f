use thiserror::Error;

use crate::shared::{PatternGroupId, PerformanceTrackId, TrackId};

/// Errors from editing the stores or touching the project file. Playback
/// itself never fails: missing references play as silence.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("unknown pattern group {0}")]
    UnknownPatternGroup(PatternGroupId),

    #[error("unknown performance track {0}")]
    UnknownPerformanceTrack(PerformanceTrackId),

    #[error("step {index} out of range (pattern has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("song row {0} out of range")]
    RowOutOfRange(usize),

    #[error("invalid tempo {0}")]
    InvalidTempo(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SequencerError>;
