//! Key inference from note statistics.
//!
//! Krumhansl-Kessler template correlation over a duration/velocity weighted
//! pitch-class histogram, plus a tonic salience bonus taken from the bass
//! register and from the closing stretch of the piece, where cadences tend to
//! land on the tonic.

use serde::Serialize;
use std::fmt;

use crate::types::Note;

/// Krumhansl-Kessler major key profile (tonic at index 0)
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor key profile (tonic at index 0)
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

const MAJOR_SCALE: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Notes below this pitch feed the bass histogram.
const BASS_PITCH_LIMIT: u8 = 60;
const BASS_WEIGHT: f64 = 1.45;
/// Notes starting in the last 14% of the piece feed the ending histogram.
const ENDING_FRACTION: f64 = 0.86;
const ENDING_WEIGHT: f64 = 1.7;

const SALIENCE_OVERALL: f64 = 0.14;
const SALIENCE_BASS: f64 = 0.28;
const SALIENCE_ENDING: f64 = 0.36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    fn profile(self) -> &'static [f64; 12] {
        match self {
            Scale::Major => &MAJOR_PROFILE,
            Scale::Minor => &MINOR_PROFILE,
        }
    }

    fn degrees(self) -> &'static [usize; 7] {
        match self {
            Scale::Major => &MAJOR_SCALE,
            Scale::Minor => &MINOR_SCALE,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Major => write!(f, "major"),
            Scale::Minor => write!(f, "minor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyHypothesis {
    pub tonic_pitch_class: usize,
    pub scale: Scale,
    pub score: f64,
}

impl KeyHypothesis {
    pub fn tonic_name(&self) -> &'static str {
        PITCH_CLASS_NAMES[self.tonic_pitch_class % 12]
    }

    /// e.g. `"Bb minor"`
    pub fn name(&self) -> String {
        format!("{} {}", self.tonic_name(), self.scale)
    }

    /// Whether `pitch` is a degree of this key's scale.
    pub fn contains(&self, pitch: u8) -> bool {
        let degree = (pitch as usize + 12 - self.tonic_pitch_class % 12) % 12;
        self.scale.degrees().contains(&degree)
    }
}

impl fmt::Display for KeyHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic_name(), self.scale)
    }
}

/// L1-normalize. An all-zero vector stays all-zero.
fn normalize(values: &[f64; 12]) -> [f64; 12] {
    let sum: f64 = values.iter().sum();
    let sum = if sum > 0.0 { sum } else { 1.0 };
    values.map(|v| v / sum)
}

/// Correlate a histogram against a profile whose tonic is moved to `tonic`.
fn rotated_dot(histogram: &[f64; 12], profile: &[f64; 12], tonic: usize) -> f64 {
    (0..12)
        .map(|pc| histogram[pc] * profile[(pc + 12 - tonic) % 12])
        .sum()
}

/// Infer the most likely key. `None` for an empty note list.
///
/// Candidates are enumerated tonic 0..11, major before minor for each tonic;
/// on equal scores the earlier candidate is kept.
pub fn infer_key(notes: &[Note]) -> Option<KeyHypothesis> {
    if notes.is_empty() {
        return None;
    }

    let total_span = notes.iter().map(Note::end_time).fold(0.0, f64::max);
    let ending_threshold = ENDING_FRACTION * total_span;

    let mut overall = [0.0; 12];
    let mut bass = [0.0; 12];
    let mut ending = [0.0; 12];
    for note in notes {
        let pc = note.pitch_class();
        let weight = note.duration.max(0.02) * (note.velocity as f64).max(0.2);
        overall[pc] += weight;
        if note.pitch < BASS_PITCH_LIMIT {
            bass[pc] += weight * BASS_WEIGHT;
        }
        if note.start_time >= ending_threshold {
            ending[pc] += weight * ENDING_WEIGHT;
        }
    }

    let overall = normalize(&overall);
    let bass = normalize(&bass);
    let ending = normalize(&ending);
    let major = normalize(Scale::Major.profile());
    let minor = normalize(Scale::Minor.profile());

    let mut best: Option<KeyHypothesis> = None;
    for tonic in 0..12 {
        let salience = SALIENCE_OVERALL * overall[tonic]
            + SALIENCE_BASS * bass[tonic]
            + SALIENCE_ENDING * ending[tonic];
        for (scale, profile) in [(Scale::Major, &major), (Scale::Minor, &minor)] {
            let score = rotated_dot(&overall, profile, tonic) + salience;
            if best.map_or(true, |b| score > b.score) {
                best = Some(KeyHypothesis {
                    tonic_pitch_class: tonic,
                    scale,
                    score,
                });
            }
        }
    }

    if let Some(key) = best {
        log::debug!("inferred key {} (score {:.4})", key, key.score);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hand;

    fn note(start: f64, duration: f64, pitch: u8, velocity: f32) -> Note {
        Note {
            id: 0,
            start_time: start,
            duration,
            pitch,
            velocity,
            track_index: 0,
            hand: Hand::Unassigned,
        }
    }

    #[test]
    fn test_empty_has_no_key() {
        assert!(infer_key(&[]).is_none());
    }

    #[test]
    fn test_c_major_triad_with_bass_c() {
        let mut notes = Vec::new();
        for bar in 0..8 {
            let t = bar as f64 * 2.0;
            notes.push(note(t, 2.0, 48, 0.9)); // C3 bass
            notes.push(note(t, 1.0, 60, 0.7)); // C4
            notes.push(note(t, 1.0, 64, 0.7)); // E4
            notes.push(note(t, 1.0, 67, 0.7)); // G4
        }
        let key = infer_key(&notes).unwrap();
        assert_eq!(key.tonic_pitch_class, 0);
        assert_eq!(key.scale, Scale::Major);
        assert_eq!(key.name(), "C major");
    }

    #[test]
    fn test_relative_minor_wins_with_bass_tonic() {
        let mut notes = Vec::new();
        // balanced A minor triad, A only in the bass
        for bar in 0..8 {
            let t = bar as f64 * 2.0;
            notes.push(note(t, 1.0, 45, 0.8)); // A2
            notes.push(note(t, 1.0, 60, 0.8)); // C4
            notes.push(note(t, 1.0, 64, 0.8)); // E4
        }
        let key = infer_key(&notes).unwrap();
        assert_eq!(key.tonic_pitch_class, 9);
        assert_eq!(key.scale, Scale::Minor);
    }

    #[test]
    fn test_g_major_triad_with_bass_g() {
        let notes: Vec<Note> = (0..8)
            .flat_map(|bar| {
                let t = bar as f64;
                [
                    note(t, 1.0, 43, 0.9),
                    note(t, 0.5, 67, 0.7),
                    note(t, 0.5, 71, 0.7),
                    note(t, 0.5, 74, 0.7),
                ]
            })
            .collect();
        let key = infer_key(&notes).unwrap();
        assert_eq!(key.tonic_name(), "G");
        assert_eq!(key.scale, Scale::Major);
    }

    #[test]
    fn test_scale_membership() {
        let c_major = KeyHypothesis {
            tonic_pitch_class: 0,
            scale: Scale::Major,
            score: 0.0,
        };
        assert!(c_major.contains(60));
        assert!(c_major.contains(71));
        assert!(!c_major.contains(61));

        let d_minor = KeyHypothesis {
            tonic_pitch_class: 2,
            scale: Scale::Minor,
            score: 0.0,
        };
        assert!(d_minor.contains(65)); // F
        assert!(d_minor.contains(70)); // Bb
        assert!(!d_minor.contains(66)); // F#
        assert_eq!(d_minor.to_string(), "D minor");
    }
}
