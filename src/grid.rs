//! Beat and bar grid derived from the tempo and time-signature maps.
//!
//! The two maps change independently, so the grid is built by a single
//! forward sweep that keeps an index into each and clamps to whichever
//! change comes first. A change landing mid-beat restarts the beat walk
//! from the change itself; a time-signature change also restarts the bar.

use serde::Serialize;

use crate::song::{RawTempo, RawTimeSignature};
use crate::types::{GridLine, TempoPoint, TimeSigPoint, TimeSignature};

pub const DEFAULT_BPM: f64 = 120.0;
/// Faster tempos are clamped to this.
pub const MAX_BPM: f64 = 1000.0;
/// Largest accepted time-signature denominator (a 64th-note beat).
pub const MAX_DENOMINATOR: u32 = 64;
/// Hard ceiling on emitted grid lines.
pub const MAX_GRID_LINES: usize = 500_000;

/// Entries closer than this are the same instant.
pub const TIME_EPSILON: f64 = 1e-6;

trait Timed {
    fn time(&self) -> f64;
    fn set_time(&mut self, time: f64);
}

impl Timed for TempoPoint {
    fn time(&self) -> f64 {
        self.time
    }
    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

impl Timed for TimeSigPoint {
    fn time(&self) -> f64 {
        self.time
    }
    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

/// Sort, collapse near-equal times (last write wins) and anchor at time 0.
fn compact<T: Timed>(mut entries: Vec<T>, default_at_zero: T) -> Vec<T> {
    entries.sort_by(|a, b| a.time().total_cmp(&b.time()));

    let mut out: Vec<T> = Vec::with_capacity(entries.len() + 1);
    for entry in entries {
        match out.last_mut() {
            Some(last) if (entry.time() - last.time()).abs() <= TIME_EPSILON => *last = entry,
            _ => out.push(entry),
        }
    }

    match out.first_mut() {
        Some(first) if first.time() <= TIME_EPSILON => first.set_time(0.0),
        _ => out.insert(0, default_at_zero),
    }
    out
}

/// Tempo changes as a compact map: sorted, unique times, first entry at 0.
///
/// Non-finite or negative times are dropped; a non-finite or non-positive bpm
/// becomes 120 and anything above [`MAX_BPM`] is clamped to it.
pub fn normalize_tempos(entries: &[RawTempo]) -> Vec<TempoPoint> {
    let points = entries
        .iter()
        .filter_map(|e| {
            if !e.time.is_finite() || e.time < 0.0 {
                log::debug!("dropping tempo entry with invalid time: {:?}", e);
                return None;
            }
            let bpm = if e.bpm.is_finite() && e.bpm > 0.0 {
                e.bpm.min(MAX_BPM)
            } else {
                DEFAULT_BPM
            };
            Some(TempoPoint { time: e.time, bpm })
        })
        .collect();

    compact(
        points,
        TempoPoint {
            time: 0.0,
            bpm: DEFAULT_BPM,
        },
    )
}

/// Time-signature changes as a compact map. Invalid fields fall back to 4/4;
/// a denominator above [`MAX_DENOMINATOR`] counts as invalid.
pub fn normalize_time_signatures(entries: &[RawTimeSignature]) -> Vec<TimeSigPoint> {
    let points = entries
        .iter()
        .filter_map(|e| {
            if !e.time.is_finite() || e.time < 0.0 {
                log::debug!("dropping time signature with invalid time: {:?}", e);
                return None;
            }
            Some(TimeSigPoint {
                time: e.time,
                signature: TimeSignature {
                    numerator: positive_or(e.numerator, 4),
                    denominator: match positive_or(e.denominator, 4) {
                        d if d > MAX_DENOMINATOR => 4,
                        d => d,
                    },
                },
            })
        })
        .collect();

    compact(
        points,
        TimeSigPoint {
            time: 0.0,
            signature: TimeSignature::default(),
        },
    )
}

fn positive_or(value: i64, fallback: u32) -> u32 {
    if value >= 1 {
        value.min(u32::MAX as i64) as u32
    } else {
        fallback
    }
}

/// Seconds per beat, where the beat is the signature's denominator note.
pub fn beat_seconds(bpm: f64, signature: TimeSignature) -> f64 {
    let bpm = if bpm.is_finite() && bpm > 0.0 { bpm.min(MAX_BPM) } else { DEFAULT_BPM };
    let denominator = signature.denominator.clamp(1, MAX_DENOMINATOR);
    (60.0 / bpm) * (4.0 / denominator as f64)
}

/// Walk both maps forward and emit one line per beat over `[0, total_duration]`.
///
/// Stops early after [`MAX_GRID_LINES`] lines or if a beat no longer moves `t`.
pub fn build_grid(
    tempos: &[TempoPoint],
    time_signatures: &[TimeSigPoint],
    total_duration: f64,
) -> Vec<GridLine> {
    let mut lines = Vec::new();
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return lines;
    }

    let mut tempo_idx = 0;
    let mut sig_idx = 0;
    let mut t = 0.0;
    let mut beat_in_bar: u32 = 0;

    while t <= total_duration + TIME_EPSILON {
        if lines.len() >= MAX_GRID_LINES {
            log::warn!("grid truncated at {} lines ({:.3}s)", lines.len(), t);
            break;
        }
        while tempos.get(tempo_idx + 1).is_some_and(|next| next.time <= t + TIME_EPSILON) {
            tempo_idx += 1;
        }
        while time_signatures
            .get(sig_idx + 1)
            .is_some_and(|next| next.time <= t + TIME_EPSILON)
        {
            sig_idx += 1;
            beat_in_bar = 0;
        }

        lines.push(GridLine {
            time: t,
            is_bar_start: beat_in_bar == 0,
        });

        let bpm = tempos.get(tempo_idx).map_or(DEFAULT_BPM, |p| p.bpm);
        let signature = time_signatures
            .get(sig_idx)
            .map_or_else(TimeSignature::default, |p| p.signature);
        let beats_per_bar = signature.numerator.max(1);
        let beat_secs = beat_seconds(bpm, signature);

        let next_tempo = tempos.get(tempo_idx + 1).map_or(f64::INFINITY, |p| p.time);
        let next_sig = time_signatures.get(sig_idx + 1).map_or(f64::INFINITY, |p| p.time);
        let next_change = next_tempo.min(next_sig);

        if t + beat_secs > next_change + TIME_EPSILON {
            t = next_change;
            continue;
        }

        if t + beat_secs <= t {
            log::warn!("beat of {:e}s does not advance the grid at {:.3}s", beat_secs, t);
            break;
        }
        t += beat_secs;
        beat_in_bar = (beat_in_bar + 1) % beats_per_bar;
    }

    lines
}

/// Normalized maps plus the grid built from them, for one loaded song.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoGrid {
    pub tempos: Vec<TempoPoint>,
    pub time_signatures: Vec<TimeSigPoint>,
    pub lines: Vec<GridLine>,
}

impl Default for TempoGrid {
    fn default() -> Self {
        Self::build(&[], &[], 0.0)
    }
}

impl TempoGrid {
    pub fn build(tempos: &[RawTempo], time_signatures: &[RawTimeSignature], total_duration: f64) -> Self {
        let tempos = normalize_tempos(tempos);
        let time_signatures = normalize_time_signatures(time_signatures);
        let lines = build_grid(&tempos, &time_signatures, total_duration);
        TempoGrid {
            tempos,
            time_signatures,
            lines,
        }
    }

    pub fn initial_bpm(&self) -> f64 {
        self.tempos.first().map_or(DEFAULT_BPM, |p| p.bpm)
    }

    pub fn initial_signature(&self) -> TimeSignature {
        self.time_signatures
            .first()
            .map_or_else(TimeSignature::default, |p| p.signature)
    }

    pub fn bar_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_bar_start).count()
    }

    /// First line at or after `time`.
    pub fn lower_bound(&self, time: f64) -> usize {
        self.lines.partition_point(|line| line.time < time)
    }

    /// Lines whose time falls inside `[start, end]`.
    pub fn lines_between(&self, start: f64, end: f64) -> &[GridLine] {
        let from = self.lower_bound(start);
        let to = self.lines.partition_point(|line| line.time <= end);
        &self.lines[from..to.max(from)]
    }

    /// Index of the beat the playhead is in, for the metronome indicator. A
    /// playhead sitting on a line is in the beat that line starts.
    pub fn beat_index(&self, time: f64) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let upto = self.lines.partition_point(|line| line.time <= time + TIME_EPSILON);
        Some(upto.saturating_sub(1))
    }

    /// Start of the bar containing `time`. Falls back to `time` without a grid.
    pub fn bar_start(&self, time: f64) -> f64 {
        let upto = self.lines.partition_point(|line| line.time <= time + TIME_EPSILON);
        self.lines[..upto]
            .iter()
            .rev()
            .find(|line| line.is_bar_start)
            .map_or(time, |line| line.time)
    }

    /// The grid line `direction` steps away from the beat containing `time`,
    /// clamped to `0` and `total_duration`.
    pub fn adjacent_line(&self, time: f64, direction: isize, total_duration: f64) -> f64 {
        let Some(current) = self.beat_index(time) else {
            return time;
        };
        let target = current as isize + direction;
        if target < 0 {
            return 0.0;
        }
        self.lines
            .get(target as usize)
            .map_or(total_duration, |line| line.time)
    }

    /// Span of the first complete bar starting at or after `time`.
    pub fn next_bar_span(&self, time: f64) -> Option<(f64, f64)> {
        let from = self.lower_bound(time);
        let mut bars = self.lines[from..].iter().filter(|line| line.is_bar_start);
        let start = bars.next()?.time;
        let end = bars.next()?.time;
        Some((start, end))
    }
}
