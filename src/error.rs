//! Error types for the timeline engine and its file/device adapters.
//!
//! Malformed numeric data inside a song (NaN tempos, zero denominators, odd
//! velocities) is never an error: it is coerced during normalization. Only
//! things a caller can act on show up here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    MidiParse(#[from] midly::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Loop-bound text that is neither `ss`, `m:ss` nor `h:mm:ss`.
    #[error("Invalid time '{0}'. Use m:ss or seconds")]
    InvalidTimeInput(String),

    #[error("No song loaded")]
    NoSongLoaded,

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("MIDI output error: {0}")]
    MidiOutput(String),

    #[error("No MIDI output port available")]
    NoOutputPort,
}

pub type Result<T> = std::result::Result<T, TimelineError>;
