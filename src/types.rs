//! Core value types shared by every part of the engine.
//!
//! All of these are constructed by the normalization step in [`crate::song`]
//! or derived from its output, so downstream code can rely on their
//! invariants without re-validating.

use serde::{Deserialize, Serialize};

/// Which performer hand a note was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
    #[default]
    Unassigned,
}

/// A single note of the loaded song.
///
/// `id` is the note's index in start-time order and stays stable for the
/// lifetime of one load; the hand-filtered caches keep the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: usize,
    pub start_time: f64,
    pub duration: f64,
    pub pitch: u8,
    pub velocity: f32,
    pub track_index: usize,
    pub hand: Hand,
}

impl Note {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn pitch_class(&self) -> usize {
        (self.pitch % 12) as usize
    }

    /// True while `time` falls inside `[start, end)`.
    pub fn is_sounding_at(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoPoint {
    pub time: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSigPoint {
    pub time: f64,
    pub signature: TimeSignature,
}

/// One beat line of the tempo grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLine {
    pub time: f64,
    pub is_bar_start: bool,
}

/// A half-open stretch of song time used for looping. Always `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopSegment {
    pub start: f64,
    pub end: f64,
}

impl LoopSegment {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}
