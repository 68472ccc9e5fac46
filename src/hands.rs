//! Left/right hand assignment.
//!
//! A one-dimensional 2-means over pitch finds the split point; notes are then
//! walked in chord groups so a compact chord stays in one hand even when it
//! straddles the split.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Hand, Note};

/// Middle C, used when there is nothing to cluster.
pub const DEFAULT_SPLIT_POINT: f64 = 60.0;

const LOW_SEED: f64 = 40.0;
const HIGH_SEED: f64 = 72.0;
const ITERATIONS: usize = 8;

/// Notes starting this close to a group's first note join the group.
pub const CHORD_WINDOW_SECS: f64 = 0.06;
const CHORD_MIN_NOTES: usize = 3;
const CHORD_MAX_SPAN: u8 = 10;

/// Which notes the engine plays and displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HandMode {
    #[default]
    Both,
    Left,
    Right,
}

impl HandMode {
    /// Both -> Left -> Right -> Both
    pub fn next(self) -> Self {
        match self {
            HandMode::Both => HandMode::Left,
            HandMode::Left => HandMode::Right,
            HandMode::Right => HandMode::Both,
        }
    }
}

impl fmt::Display for HandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandMode::Both => write!(f, "both hands"),
            HandMode::Left => write!(f, "left hand"),
            HandMode::Right => write!(f, "right hand"),
        }
    }
}

/// 2-means split point over note pitches.
pub fn compute_split_point(notes: &[Note]) -> f64 {
    if notes.is_empty() {
        return DEFAULT_SPLIT_POINT;
    }

    let mut low = LOW_SEED;
    let mut high = HIGH_SEED;
    for _ in 0..ITERATIONS {
        let (mut low_sum, mut low_count) = (0.0, 0usize);
        let (mut high_sum, mut high_count) = (0.0, 0usize);
        for note in notes {
            let pitch = note.pitch as f64;
            if (pitch - low).abs() <= (pitch - high).abs() {
                low_sum += pitch;
                low_count += 1;
            } else {
                high_sum += pitch;
                high_count += 1;
            }
        }
        if low_count > 0 {
            low = low_sum / low_count as f64;
        }
        if high_count > 0 {
            high = high_sum / high_count as f64;
        }
    }

    (low + high) / 2.0
}

fn hand_for(pitch: u8, split_point: f64) -> Hand {
    if (pitch as f64) < split_point {
        Hand::Left
    } else {
        Hand::Right
    }
}

/// Set `hand` on every note. `notes` must be sorted by start time.
pub fn assign_hands(notes: &mut [Note], split_point: f64) {
    let mut i = 0;
    while i < notes.len() {
        let group_start = notes[i].start_time;
        let len = notes[i..]
            .iter()
            .take_while(|n| n.start_time <= group_start + CHORD_WINDOW_SECS)
            .count();
        let group = &mut notes[i..i + len];

        let mut pitches: Vec<u8> = group.iter().map(|n| n.pitch).collect();
        pitches.sort_unstable();
        let span = pitches[pitches.len() - 1] - pitches[0];

        if group.len() >= CHORD_MIN_NOTES && span <= CHORD_MAX_SPAN {
            let hand = hand_for(pitches[pitches.len() / 2], split_point);
            group.iter_mut().for_each(|n| n.hand = hand);
        } else {
            group.iter_mut().for_each(|n| n.hand = hand_for(n.pitch, split_point));
        }

        i += len;
    }
}

/// Result of hand assignment for one song.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandSplit {
    pub split_point: f64,
}

impl Default for HandSplit {
    fn default() -> Self {
        HandSplit {
            split_point: DEFAULT_SPLIT_POINT,
        }
    }
}

impl HandSplit {
    /// Compute the split point and tag every note with its hand.
    pub fn assign(notes: &mut [Note]) -> Self {
        let split_point = compute_split_point(notes);
        assign_hands(notes, split_point);
        log::debug!("hand split at pitch {:.2} over {} notes", split_point, notes.len());
        HandSplit { split_point }
    }

    /// Left and right caches, both keeping start order and note ids.
    pub fn partition(notes: &[Note]) -> (Vec<Note>, Vec<Note>) {
        notes
            .iter()
            .filter(|n| n.hand != Hand::Unassigned)
            .partition(|n| n.hand == Hand::Left)
    }
}
