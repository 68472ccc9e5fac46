//! Decoding song files into [`RawSong`].
//!
//! Standard MIDI files go through `midly`; `.json` files are deserialized
//! directly into the raw song shape.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use crate::error::{Result, TimelineError};
use crate::song::{RawNote, RawSong, RawTempo, RawTimeSignature};

/// SMF default: 120 BPM
const DEFAULT_USEC_PER_QUARTER: u32 = 500_000;

/// Load a song from disk, choosing the decoder by extension.
pub fn load_song<P: AsRef<Path>>(path: P) -> Result<RawSong> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "mid" | "midi" => {
            let bytes = std::fs::read(path)?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown");
            parse_smf(&bytes, stem)
        }
        "json" => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        _ => Err(TimelineError::UnsupportedFile(path.display().to_string())),
    }
}

/// Tempo map for metrical files, or a fixed rate for timecode files.
enum TickClock {
    Metrical {
        ticks_per_quarter: f64,
        /// (tick, seconds at tick, microseconds per quarter) from tick 0 on
        segments: Vec<(u64, f64, u32)>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl TickClock {
    fn new(timing: Timing, tempo_changes: &[(u64, u32)]) -> Self {
        match timing {
            Timing::Metrical(tpq) => {
                let ticks_per_quarter = tpq.as_int().max(1) as f64;
                let mut segments = vec![(0u64, 0.0, DEFAULT_USEC_PER_QUARTER)];
                for &(tick, usec) in tempo_changes {
                    let seconds = Self::metrical_seconds(&segments, ticks_per_quarter, tick);
                    match segments.last_mut() {
                        // a change at the same tick replaces the previous one
                        Some(last) if last.0 == tick => last.2 = usec,
                        _ => segments.push((tick, seconds, usec)),
                    }
                }
                TickClock::Metrical {
                    ticks_per_quarter,
                    segments,
                }
            }
            Timing::Timecode(fps, subframes) => TickClock::Timecode {
                ticks_per_second: (fps.as_f32() as f64 * subframes as f64).max(1.0),
            },
        }
    }

    fn metrical_seconds(segments: &[(u64, f64, u32)], ticks_per_quarter: f64, tick: u64) -> f64 {
        let index = segments.partition_point(|s| s.0 <= tick).saturating_sub(1);
        let (start_tick, start_secs, usec) = segments[index];
        start_secs + (tick - start_tick) as f64 * usec as f64 / 1_000_000.0 / ticks_per_quarter
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            TickClock::Metrical {
                ticks_per_quarter,
                segments,
            } => Self::metrical_seconds(segments, *ticks_per_quarter, tick),
            TickClock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }
}

/// Decode a standard MIDI file. `fallback_title` is used when no track is named.
pub fn parse_smf(bytes: &[u8], fallback_title: &str) -> Result<RawSong> {
    let smf = Smf::parse(bytes)?;

    // Gather meta events first: the tempo map must be complete before any
    // tick can be converted.
    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut signature_changes: Vec<(u64, u8, u8)> = Vec::new();
    let mut title: Option<String> = None;
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(meta) = event.kind {
                match meta {
                    MetaMessage::Tempo(usec) => tempo_changes.push((tick, usec.as_int())),
                    MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                        signature_changes.push((tick, numerator, denominator_pow))
                    }
                    MetaMessage::TrackName(name) if title.is_none() => {
                        let name = String::from_utf8_lossy(name).trim().to_string();
                        if !name.is_empty() {
                            title = Some(name);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    tempo_changes.sort_by_key(|&(tick, _)| tick);
    signature_changes.sort_by_key(|&(tick, _, _)| tick);

    let clock = TickClock::new(smf.header.timing, &tempo_changes);

    let mut notes = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();
        for event in track {
            tick += event.delta.as_int() as u64;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let (key, on_velocity) = match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => (key.as_int(), Some(vel.as_int())),
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => (key.as_int(), None),
                _ => continue,
            };
            let slot = open.entry((channel.as_int(), key)).or_default();
            match on_velocity {
                Some(vel) => slot.push_back((tick, vel)),
                None => {
                    if let Some((start, vel)) = slot.pop_front() {
                        notes.push(raw_note(&clock, start, tick, key, vel, track_index));
                    }
                }
            }
        }

        // close anything left hanging at the end of the track
        let mut hanging: Vec<(u8, u64, u8)> = open
            .into_iter()
            .flat_map(|((_, key), starts)| starts.into_iter().map(move |(start, vel)| (key, start, vel)))
            .collect();
        hanging.sort_unstable();
        for (key, start, vel) in hanging {
            log::debug!("track {} key {} has no note-off", track_index, key);
            notes.push(raw_note(&clock, start, tick, key, vel, track_index));
        }
    }

    let tempos = tempo_changes
        .iter()
        .map(|&(tick, usec)| RawTempo {
            time: clock.seconds(tick),
            bpm: 60_000_000.0 / usec.max(1) as f64,
        })
        .collect();
    let time_signatures = signature_changes
        .iter()
        .map(|&(tick, numerator, denominator_pow)| RawTimeSignature {
            time: clock.seconds(tick),
            numerator: numerator as i64,
            // an absurd power is left for normalization to replace
            denominator: if denominator_pow < 16 { 1 << denominator_pow } else { 0 },
        })
        .collect();
    let total_duration = notes
        .iter()
        .map(|n: &RawNote| n.start_time + n.duration)
        .reduce(f64::max);

    log::debug!(
        "decoded {} notes, {} tempo changes, {} signature changes",
        notes.len(),
        tempo_changes.len(),
        signature_changes.len()
    );

    Ok(RawSong {
        title: title.unwrap_or_else(|| fallback_title.to_string()),
        notes,
        tempos,
        time_signatures,
        total_duration,
    })
}

fn raw_note(clock: &TickClock, start: u64, end: u64, key: u8, vel: u8, track_index: usize) -> RawNote {
    let start_time = clock.seconds(start);
    RawNote {
        start_time,
        duration: clock.seconds(end) - start_time,
        pitch: key as i64,
        velocity: vel as f64 / 127.0,
        track_index,
    }
}
