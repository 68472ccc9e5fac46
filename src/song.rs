//! Raw song data as handed over by a decoder, and its normalization into
//! validated [`Note`]s.
//!
//! The raw types deliberately use wide numeric types so that whatever a
//! decoder or a hand-written JSON file produces can be represented; the
//! normalization functions decide what survives.

use serde::{Deserialize, Serialize};

use crate::types::{Hand, Note};

/// Velocity used when a note carries a non-finite value.
pub const DEFAULT_VELOCITY: f32 = 0.7;

/// Shortest duration a note may have after normalization.
pub const MIN_NOTE_DURATION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNote {
    pub start_time: f64,
    pub duration: f64,
    pub pitch: i64,
    #[serde(default = "default_raw_velocity")]
    pub velocity: f64,
    #[serde(default)]
    pub track_index: usize,
}

fn default_raw_velocity() -> f64 {
    DEFAULT_VELOCITY as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTempo {
    pub time: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTimeSignature {
    pub time: f64,
    pub numerator: i64,
    pub denominator: i64,
}

/// Everything the engine needs from one decoded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSong {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: Vec<RawNote>,
    #[serde(default)]
    pub tempos: Vec<RawTempo>,
    #[serde(default)]
    pub time_signatures: Vec<RawTimeSignature>,
    /// Declared length in seconds. Falls back to the last note end.
    #[serde(default)]
    pub total_duration: Option<f64>,
}

impl RawSong {
    /// Validate and sort the raw notes. Ids are assigned in start-time order.
    pub fn normalize_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter_map(|raw| {
                if !raw.start_time.is_finite() || raw.start_time < 0.0 || !raw.duration.is_finite() {
                    log::debug!("dropping note with invalid timing: {:?}", raw);
                    return None;
                }
                let velocity = if raw.velocity.is_finite() {
                    raw.velocity.clamp(0.0, 1.0) as f32
                } else {
                    DEFAULT_VELOCITY
                };
                Some(Note {
                    id: 0,
                    start_time: raw.start_time,
                    duration: raw.duration.max(MIN_NOTE_DURATION),
                    pitch: raw.pitch.clamp(0, 127) as u8,
                    velocity,
                    track_index: raw.track_index,
                    hand: Hand::Unassigned,
                })
            })
            .collect();

        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        for (id, note) in notes.iter_mut().enumerate() {
            note.id = id;
        }
        notes
    }

    /// The declared duration when usable, otherwise the latest note end.
    pub fn resolve_total_duration(&self, notes: &[Note]) -> f64 {
        match self.total_duration {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => notes.iter().map(Note::end_time).fold(0.0, f64::max),
        }
    }
}
