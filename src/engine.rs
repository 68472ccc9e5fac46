//! The timeline engine: one context object owning the loaded song and every
//! piece of derived playback state.
//!
//! All operations are synchronous and take the caller's monotonic clock as
//! `now` (seconds). Nothing here blocks or spawns; a driver calls [`Engine::tick`]
//! once per frame and forwards the returned events to its audio sink.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::grid::TempoGrid;
use crate::hands::{HandMode, HandSplit};
use crate::key::{infer_key, KeyHypothesis};
use crate::marks::MarkSet;
use crate::playback::{lower_bound, PlaybackCursor};
use crate::schedule::{NoteEvent, ScheduleQueue};
use crate::seek::SeekCoordinator;
use crate::song::RawSong;
use crate::time_format::{format_time, parse_time_input};
use crate::transport::Transport;
use crate::types::{GridLine, Hand, LoopSegment, Note, TimeSignature};

/// Everything derived from one decoded file.
#[derive(Debug, Clone)]
pub struct LoadedSong {
    pub title: String,
    pub notes: Vec<Note>,
    pub left: Vec<Note>,
    pub right: Vec<Note>,
    pub grid: TempoGrid,
    pub key: Option<KeyHypothesis>,
    pub hand_split: HandSplit,
    pub total_duration: f64,
}

impl LoadedSong {
    pub fn from_raw(raw: &RawSong) -> Self {
        let mut notes = raw.normalize_notes();
        let total_duration = raw.resolve_total_duration(&notes);
        let grid = TempoGrid::build(&raw.tempos, &raw.time_signatures, total_duration);
        let key = infer_key(&notes);
        let hand_split = HandSplit::assign(&mut notes);
        let (left, right) = HandSplit::partition(&notes);
        LoadedSong {
            title: raw.title.clone(),
            notes,
            left,
            right,
            grid,
            key,
            hand_split,
            total_duration,
        }
    }

    pub fn notes_for(&self, mode: HandMode) -> &[Note] {
        match mode {
            HandMode::Both => &self.notes,
            HandMode::Left => &self.left,
            HandMode::Right => &self.right,
        }
    }

    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            title: self.title.clone(),
            note_count: self.notes.len(),
            left_count: self.left.len(),
            right_count: self.right.len(),
            total_duration: self.total_duration,
            initial_bpm: self.grid.initial_bpm(),
            initial_signature: self.grid.initial_signature(),
            bar_count: self.grid.bar_count(),
            key: self.key.map(|k| k.name()),
            split_point: self.hand_split.split_point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub title: String,
    pub note_count: usize,
    pub left_count: usize,
    pub right_count: usize,
    pub total_duration: f64,
    pub initial_bpm: f64,
    pub initial_signature: TimeSignature,
    pub bar_count: usize,
    pub key: Option<String>,
    pub split_point: f64,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title:     {}", self.title)?;
        writeln!(f, "Duration:  {}", format_time(self.total_duration))?;
        writeln!(
            f,
            "Notes:     {} ({} left, {} right)",
            self.note_count, self.left_count, self.right_count
        )?;
        writeln!(
            f,
            "Tempo:     {:.1} BPM, {}/{}",
            self.initial_bpm, self.initial_signature.numerator, self.initial_signature.denominator
        )?;
        writeln!(f, "Bars:      {}", self.bar_count)?;
        writeln!(f, "Key:       {}", self.key.as_deref().unwrap_or("unknown"))?;
        write!(f, "Split:     {:.1}", self.split_point)
    }
}

/// User-facing, non-fatal feedback from an engine operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    MarkAdded(f64),
    MarkExists(f64),
    LoopOn(LoopSegment),
    LoopOff,
    LoopUpdated(LoopSegment),
    NoMarks,
    EmptySong,
    JumpedToMark(f64),
    MarksCleared,
    Speed(f64),
    Hands(HandMode),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MarkAdded(t) => write!(f, "Loop mark set at {}.", format_time(*t)),
            Notice::MarkExists(t) => write!(f, "Loop mark already exists at {}.", format_time(*t)),
            Notice::LoopOn(s) => write!(f, "Loop on: {} - {}.", format_time(s.start), format_time(s.end)),
            Notice::LoopOff => write!(f, "Loop off."),
            Notice::LoopUpdated(s) => {
                write!(f, "Loop updated: {} - {}.", format_time(s.start), format_time(s.end))
            }
            Notice::NoMarks => write!(f, "No loop marks set."),
            Notice::EmptySong => write!(f, "Nothing to loop in an empty song."),
            Notice::JumpedToMark(t) => write!(f, "Jumped to mark {}.", format_time(*t)),
            Notice::MarksCleared => write!(f, "Loop marks cleared."),
            Notice::Speed(s) => write!(f, "Speed: {:.2}x", s),
            Notice::Hands(HandMode::Both) => write!(f, "Hands: both"),
            Notice::Hands(HandMode::Left) => write!(f, "Hand: left"),
            Notice::Hands(HandMode::Right) => write!(f, "Hand: right"),
        }
    }
}

/// Preview of the next full bar beyond the visible window.
#[derive(Debug, Clone, Copy)]
pub struct GhostBar<'a> {
    pub start: f64,
    pub end: f64,
    pub notes: &'a [Note],
}

/// Read-only view of one tick, borrowing the engine's note and grid storage.
#[derive(Debug)]
pub struct Frame<'a> {
    pub song_time: f64,
    pub total_duration: f64,
    pub playing: bool,
    pub speed: f64,
    pub window_start: f64,
    pub window_end: f64,
    /// Active-hand notes overlapping the window, in start order.
    pub notes: &'a [Note],
    pub grid_lines: &'a [GridLine],
    /// Releases from discontinuities first, then events due this tick.
    pub events: Vec<NoteEvent>,
    /// Pitches held at `song_time`, ascending, with the hand that holds them.
    pub sounding: Vec<(u8, Hand)>,
    pub beat_index: Option<usize>,
    pub beat_changed: bool,
    pub ghost: Option<GhostBar<'a>>,
    pub loop_segment: Option<LoopSegment>,
}

pub struct Engine {
    config: EngineConfig,
    song: Option<LoadedSong>,
    marks: MarkSet,
    looping: bool,
    /// Last loop bounds, kept while looping is off.
    loop_segment: LoopSegment,
    hand_mode: HandMode,
    transport: Transport,
    cursor: PlaybackCursor,
    seek: SeekCoordinator,
    queue: ScheduleQueue,
    outbox: Vec<NoteEvent>,
    last_beat: Option<usize>,
    snap_until: Option<f64>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            marks: MarkSet::new(),
            looping: false,
            loop_segment: LoopSegment { start: 0.0, end: 0.0 },
            hand_mode: HandMode::Both,
            transport: Transport::new(config.default_speed),
            cursor: PlaybackCursor::new(config.backward_jump_secs),
            seek: SeekCoordinator::new(config.seek_debounce_secs),
            queue: ScheduleQueue::new(),
            outbox: Vec::new(),
            last_beat: None,
            snap_until: None,
            song: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn song(&self) -> Option<&LoadedSong> {
        self.song.as_ref()
    }

    fn loaded(&self) -> Result<&LoadedSong> {
        self.song.as_ref().ok_or(TimelineError::NoSongLoaded)
    }

    pub fn total_duration(&self) -> f64 {
        self.song.as_ref().map_or(0.0, |s| s.total_duration)
    }

    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn loop_segment(&self) -> Option<LoopSegment> {
        self.looping.then_some(self.loop_segment)
    }

    pub fn hand_mode(&self) -> HandMode {
        self.hand_mode
    }

    pub fn speed(&self) -> f64 {
        self.transport.speed()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn is_scrubbing(&self) -> bool {
        self.seek.is_dragging()
    }

    pub fn has_pending_seek(&self) -> bool {
        self.seek.has_pending()
    }

    pub fn active_notes(&self) -> &[Note] {
        self.song.as_ref().map_or(&[][..], |s| s.notes_for(self.hand_mode))
    }

    /// Current playhead, clamped to the song.
    pub fn song_time(&self, now: f64) -> f64 {
        self.transport
            .song_time(now)
            .clamp(0.0, self.total_duration())
    }

    /// Seconds until the next tick should run.
    pub fn frame_interval(&self) -> f64 {
        let fps = if self.is_playing() {
            self.config.active_fps
        } else {
            self.config.idle_fps
        };
        1.0 / fps.max(1.0)
    }

    /// Replace the current song. The new song is fully built before any state
    /// is touched, then every derived value is reset.
    pub fn load(&mut self, raw: &RawSong) -> LoadSummary {
        let song = LoadedSong::from_raw(raw);
        let summary = song.summary();

        let speed = self.transport.speed();
        self.outbox.extend(self.queue.release_all(speed));
        self.marks.clear();
        self.looping = false;
        self.loop_segment = LoopSegment {
            start: 0.0,
            end: song.total_duration,
        };
        self.hand_mode = HandMode::Both;
        self.transport = Transport::new(self.config.default_speed);
        self.cursor.reset();
        self.seek.cancel();
        self.queue = ScheduleQueue::new();
        self.queue.rebuild(&song.notes, 0.0);
        self.last_beat = None;
        self.snap_until = None;
        self.song = Some(song);

        log::info!(
            "loaded '{}': {} notes, {}, key {}",
            summary.title,
            summary.note_count,
            format_time(summary.total_duration),
            summary.key.as_deref().unwrap_or("unknown")
        );
        summary
    }

    /// Decode a `.mid`/`.midi`/`.json` file and load it.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadSummary> {
        let raw = crate::midi::load_song(path)?;
        Ok(self.load(&raw))
    }

    /// Move the playhead and rebuild everything that depends on it.
    fn resync(&mut self, time: f64, now: f64) {
        let Some(song) = self.song.as_ref() else {
            return;
        };
        let time = time.clamp(0.0, song.total_duration);
        self.transport.seek(time, now);
        self.outbox.extend(self.queue.release_all(self.transport.speed()));
        let notes = song.notes_for(self.hand_mode);
        self.queue.rebuild(notes, time);
        self.cursor.resync(notes, time, self.config.look_behind_secs);
        self.last_beat = None;
        log::debug!("resync at {:.3}s", time);
    }

    /// A resync caused by a seek, which also re-derives the loop from marks.
    ///
    /// The playhead stays at the seek target even while playing; it is not
    /// pulled back to the start of the re-derived segment.
    fn apply_seek(&mut self, time: f64, now: f64) {
        self.resync(time, now);
        if !self.looping {
            return;
        }
        let time = self.song_time(now);
        if let Some(segment) = self.marks.resolve_segment(time, self.total_duration()) {
            self.loop_segment = segment;
        }
    }

    pub fn play(&mut self, now: f64) -> Result<()> {
        let total = self.loaded()?.total_duration;
        if self.transport.is_running() {
            return Ok(());
        }
        let mut time = self.song_time(now);
        if time >= total {
            time = if self.looping { self.loop_segment.start } else { 0.0 };
        }
        self.resync(time, now);
        self.transport.start(now);
        log::debug!("play from {}", format_time(time));
        Ok(())
    }

    pub fn pause(&mut self, now: f64) {
        if !self.transport.is_running() {
            return;
        }
        self.transport.pause(now);
        let time = self.song_time(now);
        self.resync(time, now);
        log::debug!("paused at {}", format_time(time));
    }

    /// Pause and return to the loop start (when looping) or the beginning.
    pub fn stop(&mut self, now: f64) {
        self.transport.pause(now);
        let target = if self.looping { self.loop_segment.start } else { 0.0 };
        self.resync(target, now);
    }

    /// Returns whether playback is running afterwards.
    pub fn toggle_play(&mut self, now: f64) -> Result<bool> {
        if self.transport.is_running() {
            self.pause(now);
            Ok(false)
        } else {
            self.play(now)?;
            Ok(true)
        }
    }

    /// Seek to an absolute song time. During a scrub gesture the resync is
    /// coalesced; the playhead itself always moves immediately.
    pub fn seek(&mut self, time: f64, now: f64) -> Result<()> {
        let total = self.loaded()?.total_duration;
        if !time.is_finite() {
            return Ok(());
        }
        let time = time.clamp(0.0, total);
        self.transport.seek(time, now);
        if let Some(time) = self.seek.request(time, now) {
            self.apply_seek(time, now);
        }
        Ok(())
    }

    pub fn begin_scrub(&mut self) {
        self.seek.begin_gesture();
        self.snap_until = None;
    }

    /// Seek while dragging, snapping to nearby marks. Returns the time used.
    pub fn scrub(&mut self, time: f64, now: f64) -> Result<f64> {
        let total = self.loaded()?.total_duration;
        let mut time = if time.is_finite() { time.clamp(0.0, total) } else { 0.0 };

        if self.seek.is_dragging() {
            if let Some((mark, distance)) = self.marks.nearest(time) {
                let sticky = self.snap_until.is_some_and(|until| now < until);
                if distance <= self.config.scrub_snap_secs || sticky {
                    time = mark;
                    self.snap_until = Some(now + self.config.scrub_snap_hold_secs);
                } else {
                    self.snap_until = None;
                }
            }
        }

        self.seek(time, now)?;
        Ok(time)
    }

    pub fn end_scrub(&mut self, now: f64) {
        self.snap_until = None;
        if let Some(time) = self.seek.end_gesture() {
            self.apply_seek(time, now);
        }
    }

    pub fn seek_by(&mut self, delta: f64, now: f64) -> Result<()> {
        if !delta.is_finite() || delta == 0.0 {
            return Ok(());
        }
        let time = self.song_time(now) + delta;
        self.seek(time, now)
    }

    /// Jump by the configured small or large step.
    pub fn step_seconds(&mut self, forward: bool, large: bool, now: f64) -> Result<()> {
        let step = if large {
            self.config.seek_step_large_secs
        } else {
            self.config.seek_step_secs
        };
        self.seek_by(if forward { step } else { -step }, now)
    }

    /// Move to a neighbouring grid line. Returns the new playhead.
    pub fn step_beat(&mut self, direction: isize, now: f64) -> Result<f64> {
        let time = self.song_time(now);
        let song = self.loaded()?;
        let target = song.grid.adjacent_line(time, direction, song.total_duration);
        self.seek(target, now)?;
        Ok(self.song_time(now))
    }

    pub fn set_speed(&mut self, speed: f64, now: f64) -> Notice {
        let speed = self.config.clamp_speed(speed);
        let time = self.song_time(now);
        self.transport.set_speed(speed, now);
        self.resync(time, now);
        log::debug!("speed {:.2}", speed);
        Notice::Speed(speed)
    }

    /// Nudge the speed by `delta`, snapped to the configured step. `None` when
    /// the snapped value would not change anything.
    pub fn adjust_speed(&mut self, delta: f64, now: f64) -> Option<Notice> {
        let current = self.transport.speed();
        let next = self.config.clamp_speed(current + delta);
        let step = self.config.speed_step;
        let snapped = if step > 0.0 { (next / step).round() * step } else { next };
        let snapped = (snapped * 100.0).round() / 100.0;
        if (snapped - current).abs() < 1e-6 {
            return None;
        }
        Some(self.set_speed(snapped, now))
    }

    pub fn reset_speed(&mut self, now: f64) -> Notice {
        self.set_speed(self.config.default_speed, now)
    }

    pub fn set_hand_mode(&mut self, mode: HandMode, now: f64) -> Notice {
        self.hand_mode = mode;
        self.cursor.reset();
        let time = self.song_time(now);
        self.resync(time, now);
        log::debug!("hand mode: {}", mode);
        Notice::Hands(mode)
    }

    pub fn cycle_hand_mode(&mut self, now: f64) -> Notice {
        self.set_hand_mode(self.hand_mode.next(), now)
    }

    /// Drop a mark at the start of the current bar. Turns looping off.
    pub fn mark_at_bar_start(&mut self, now: f64) -> Result<Notice> {
        let time = self.song_time(now);
        let mark = self.loaded()?.grid.bar_start(time);
        let added = self.marks.insert_unique(mark, self.config.mark_epsilon_secs);
        self.looping = false;
        Ok(if added {
            Notice::MarkAdded(mark)
        } else {
            Notice::MarkExists(mark)
        })
    }

    pub fn toggle_loop(&mut self, now: f64) -> Result<Notice> {
        let total = self.loaded()?.total_duration;
        if self.looping {
            self.looping = false;
            log::debug!("loop off");
            return Ok(Notice::LoopOff);
        }
        let time = self.song_time(now);
        match self.marks.resolve_segment(time, total) {
            Some(segment) => {
                self.loop_segment = segment;
                self.looping = true;
                log::debug!("loop on {:.3}-{:.3}", segment.start, segment.end);
                Ok(Notice::LoopOn(segment))
            }
            None => Ok(Notice::NoMarks),
        }
    }

    /// Set explicit loop bounds, moving the boundary marks with them.
    pub fn set_loop_bounds(&mut self, start: f64, end: f64, now: f64) -> Result<Notice> {
        let total = self.loaded()?.total_duration;
        if total <= 0.0 {
            return Ok(Notice::EmptySong);
        }
        if !start.is_finite() {
            return Err(TimelineError::InvalidTimeInput(start.to_string()));
        }
        if !end.is_finite() {
            return Err(TimelineError::InvalidTimeInput(end.to_string()));
        }

        let eps = self.config.mark_epsilon_secs;
        let min_loop = self.config.min_loop_secs;
        let mut start = start.clamp(0.0, total);
        let mut end = end.clamp(0.0, total);
        if end - start < min_loop {
            if start >= total {
                start = (total - min_loop).max(0.0);
                end = total;
            } else {
                end = (start + min_loop).min(total);
            }
        }

        let previous = self.loop_segment;
        if previous.start > eps {
            self.marks.remove_near(previous.start, eps);
        }
        if previous.end < total - eps {
            self.marks.remove_near(previous.end, eps);
        }
        if start > eps {
            self.marks.insert_unique(start, eps);
        }
        if end < total - eps {
            self.marks.insert_unique(end, eps);
        }

        let segment = LoopSegment { start, end };
        self.loop_segment = segment;
        self.looping = true;

        if !segment.contains(self.song_time(now)) {
            self.resync(start, now);
        }
        log::debug!("loop bounds {:.3}-{:.3}, {} marks", start, end, self.marks.len());
        Ok(Notice::LoopUpdated(segment))
    }

    /// Parse edited loop bound text. Nothing changes when either side is invalid.
    pub fn commit_loop_text(&mut self, start_text: &str, end_text: &str, now: f64) -> Result<Notice> {
        self.loaded()?;
        let start = parse_time_input(start_text)
            .ok_or_else(|| TimelineError::InvalidTimeInput(start_text.trim().to_string()))?;
        let end = parse_time_input(end_text)
            .ok_or_else(|| TimelineError::InvalidTimeInput(end_text.trim().to_string()))?;
        self.set_loop_bounds(start, end, now)
    }

    pub fn jump_to_next_mark(&mut self, now: f64) -> Result<Notice> {
        self.loaded()?;
        let time = self.song_time(now);
        match self.marks.next_after(time, self.config.mark_epsilon_secs) {
            Some(mark) => {
                self.seek.cancel();
                self.resync(mark, now);
                Ok(Notice::JumpedToMark(mark))
            }
            None => Ok(Notice::NoMarks),
        }
    }

    /// Remove every mark, turn looping off and drop any pending scrub.
    pub fn clear_marks(&mut self, now: f64) -> Notice {
        self.marks.clear();
        self.looping = false;
        self.loop_segment = LoopSegment {
            start: 0.0,
            end: self.total_duration(),
        };
        self.seek.cancel();
        self.snap_until = None;
        let time = self.song_time(now);
        self.resync(time, now);
        Notice::MarksCleared
    }

    /// Advance one frame. `None` until a song is loaded.
    pub fn tick(&mut self, now: f64) -> Option<Frame<'_>> {
        let total = self.song.as_ref()?.total_duration;

        if let Some(time) = self.seek.poll(now) {
            self.apply_seek(time, now);
        }

        if self.transport.is_running() {
            let time = self.transport.song_time(now);
            let segment = self.loop_segment;
            if self.looping && segment.length() >= self.config.min_loop_secs && time >= segment.end {
                log::debug!("loop wrap to {}", format_time(segment.start));
                self.resync(segment.start, now);
            } else if time >= total {
                log::debug!("end of song");
                self.stop(now);
            }
        }

        let time = self.song_time(now);
        let playing = self.transport.is_running();
        let speed = self.transport.speed();
        let look_behind = self.config.look_behind_secs;
        let look_ahead = self.config.look_ahead_secs;
        let mut events = std::mem::take(&mut self.outbox);

        let song = self.song.as_ref()?;
        let notes = song.notes_for(self.hand_mode);

        if playing && !self.seek.has_pending() {
            let horizon_end = if self.looping {
                self.loop_segment.end.min(total)
            } else {
                total
            };
            let ahead = (self.config.schedule_ahead_secs * speed)
                .min(horizon_end - time)
                .max(0.0);
            events.extend(self.queue.poll(notes, time, speed, ahead));
        }

        if !events.is_empty() {
            log::trace!("{} events at {:.3}s", events.len(), time);
        }

        let range = self.cursor.window(notes, time, look_behind, look_ahead);
        let window_notes = &notes[range];
        let window_start = (time - look_behind).max(0.0);
        let window_end = time + look_ahead;

        let mut held: BTreeMap<u8, Hand> = BTreeMap::new();
        for note in window_notes.iter().filter(|n| n.is_sounding_at(time)) {
            held.entry(note.pitch).or_insert(note.hand);
        }

        let beat_index = song.grid.beat_index(time);
        let beat_changed = playing && beat_index.is_some() && beat_index != self.last_beat;
        self.last_beat = beat_index;

        let ghost = song.grid.next_bar_span(time).and_then(|(bar_start, bar_end)| {
            let start = bar_start.max(window_end);
            (bar_end > start).then(|| {
                let from = lower_bound(notes, start);
                let to = from + notes[from..].partition_point(|n| n.start_time <= bar_end);
                GhostBar {
                    start,
                    end: bar_end,
                    notes: &notes[from..to],
                }
            })
        });

        Some(Frame {
            song_time: time,
            total_duration: total,
            playing,
            speed,
            window_start,
            window_end,
            notes: window_notes,
            grid_lines: song.grid.lines_between(window_start, window_end),
            events,
            sounding: held.into_iter().collect(),
            beat_index,
            beat_changed,
            ghost,
            loop_segment: self.looping.then_some(self.loop_segment),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{RawNote, RawTempo};

    fn scale_song() -> RawSong {
        RawSong {
            title: "Scale".to_string(),
            notes: (0..16usize)
                .map(|i| RawNote {
                    start_time: i as f64 * 0.5,
                    duration: 0.4,
                    pitch: [60, 62, 64, 65, 67, 69, 71, 72][i % 8],
                    velocity: 0.8,
                    track_index: 0,
                })
                .collect(),
            tempos: vec![RawTempo { time: 0.0, bpm: 120.0 }],
            time_signatures: Vec::new(),
            total_duration: Some(8.0),
        }
    }

    #[test]
    fn test_operations_need_a_song() {
        let mut engine = Engine::default();
        assert!(engine.tick(0.0).is_none());
        assert!(matches!(engine.play(0.0), Err(TimelineError::NoSongLoaded)));
        assert!(matches!(engine.seek(1.0, 0.0), Err(TimelineError::NoSongLoaded)));
        assert!(matches!(engine.mark_at_bar_start(0.0), Err(TimelineError::NoSongLoaded)));
        assert_eq!(engine.song_time(5.0), 0.0);
    }

    #[test]
    fn test_load_summary() {
        let mut engine = Engine::default();
        let summary = engine.load(&scale_song());
        assert_eq!(summary.title, "Scale");
        assert_eq!(summary.note_count, 16);
        assert_eq!(summary.total_duration, 8.0);
        assert_eq!(summary.initial_bpm, 120.0);
        // 17 lines over 8 s at 0.5 s per beat
        assert_eq!(summary.bar_count, 5);
        assert_eq!(summary.key.as_deref(), Some("C major"));
        assert!(summary.to_string().contains("Duration:  0:08"));
    }

    #[test]
    fn test_frame_interval_follows_play_state() {
        let mut engine = Engine::default();
        engine.load(&scale_song());
        assert_eq!(engine.frame_interval(), 1.0 / 8.0);
        engine.play(0.0).unwrap();
        assert_eq!(engine.frame_interval(), 1.0 / 30.0);
    }

    #[test]
    fn test_adjust_speed_snaps_to_step() {
        let mut engine = Engine::default();
        engine.load(&scale_song());
        assert_eq!(engine.adjust_speed(0.07, 0.0), Some(Notice::Speed(1.05)));
        assert_eq!(engine.adjust_speed(0.01, 0.0), None);
        engine.adjust_speed(5.0, 0.0);
        assert_eq!(engine.speed(), 2.0);
        assert_eq!(engine.reset_speed(0.0), Notice::Speed(1.0));
    }

    #[test]
    fn test_step_beat_from_lines() {
        let mut engine = Engine::default();
        engine.load(&scale_song());
        engine.seek(1.2, 0.0).unwrap();
        assert_eq!(engine.step_beat(1, 0.0).unwrap(), 1.5);
        assert_eq!(engine.step_beat(1, 0.0).unwrap(), 2.0);
        assert_eq!(engine.step_beat(-1, 0.0).unwrap(), 1.5);

        engine.seek(1.0, 0.0).unwrap();
        assert_eq!(engine.step_beat(-1, 0.0).unwrap(), 0.5);
        engine.seek(0.0, 0.0).unwrap();
        assert_eq!(engine.step_beat(-1, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_beat_changes_on_a_line() {
        let mut engine = Engine::default();
        engine.load(&scale_song());
        engine.play(0.0).unwrap();
        assert_eq!(engine.tick(0.0).map(|f| f.beat_index), Some(Some(0)));
        let frame = engine.tick(0.5).unwrap();
        assert_eq!(frame.beat_index, Some(1));
        assert!(frame.beat_changed);
    }

    #[test]
    fn test_loop_bounds_keep_playhead_inside() {
        let mut engine = Engine::default();
        engine.load(&scale_song());
        engine.seek(3.0, 0.0).unwrap();
        engine.set_loop_bounds(2.0, 4.0, 0.0).unwrap();
        assert_eq!(engine.song_time(0.0), 3.0);
        engine.set_loop_bounds(5.0, 6.0, 0.0).unwrap();
        assert_eq!(engine.song_time(0.0), 5.0);
    }

    #[test]
    fn test_notice_text() {
        assert_eq!(Notice::MarkAdded(65.0).to_string(), "Loop mark set at 1:05.");
        assert_eq!(
            Notice::LoopOn(LoopSegment { start: 2.0, end: 5.0 }).to_string(),
            "Loop on: 0:02 - 0:05."
        );
        assert_eq!(Notice::Hands(HandMode::Left).to_string(), "Hand: left");
    }
}
