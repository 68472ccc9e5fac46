//! Playback timeline and musical analysis for a falling-notes piano player.
//!
//! [`Engine`] owns a loaded song together with its derived tempo grid, key,
//! hand split, loop marks and playback cursor. Callers feed it their clock and
//! read back a [`Frame`] per tick; note events are polled from the engine and
//! sent to a [`NoteSink`] by the driver.

use std::sync::atomic::{AtomicBool, Ordering};

// Global shutdown flag for graceful Ctrl+C handling
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn set_shutdown_flag() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

pub fn should_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod hands;
pub mod key;
pub mod marks;
pub mod midi;
pub mod output;
pub mod playback;
pub mod schedule;
pub mod seek;
pub mod song;
pub mod time_format;
pub mod transport;
pub mod types;

pub use config::EngineConfig;
pub use engine::{Engine, Frame, GhostBar, LoadSummary, LoadedSong, Notice};
pub use error::{Result, TimelineError};
pub use grid::TempoGrid;
pub use hands::{HandMode, HandSplit};
pub use key::{infer_key, KeyHypothesis, Scale};
pub use marks::MarkSet;
pub use output::{MidirSink, NoteSink};
pub use schedule::{EventKind, NoteEvent, ScheduleQueue};
pub use song::{RawNote, RawSong, RawTempo, RawTimeSignature};
pub use types::{GridLine, Hand, LoopSegment, Note, TempoPoint, TimeSigPoint, TimeSignature};
