//! Note lookup for the render and scheduling windows.

use std::ops::Range;

use crate::types::Note;

/// A tick this far behind the previous one is treated as a jump.
pub const DEFAULT_BACKWARD_JUMP_SECS: f64 = 0.2;

/// First index whose note starts at or after `time`.
pub fn lower_bound(notes: &[Note], time: f64) -> usize {
    notes.partition_point(|note| note.start_time < time)
}

/// Cached scan position into a start-sorted note list.
///
/// During forward playback the cursor only ever moves forward, so each frame
/// costs a handful of comparisons. A backward jump larger than the threshold
/// falls back to a binary search.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    index: usize,
    last_time: f64,
    backward_jump_secs: f64,
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::new(DEFAULT_BACKWARD_JUMP_SECS)
    }
}

impl PlaybackCursor {
    pub fn new(backward_jump_secs: f64) -> Self {
        PlaybackCursor {
            index: 0,
            last_time: 0.0,
            backward_jump_secs,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Forget the cached position. The next `window` call starts from the top.
    pub fn reset(&mut self) {
        self.index = 0;
        self.last_time = 0.0;
    }

    /// Re-seat the cursor for `time` without scanning from zero.
    pub fn resync(&mut self, notes: &[Note], time: f64, look_behind: f64) {
        self.index = lower_bound(notes, (time - look_behind).max(0.0));
        self.last_time = time;
    }

    /// Index range of notes overlapping `[time - look_behind, time + look_ahead]`.
    ///
    /// Notes that started before the window but are still held are kept, as
    /// long as nothing earlier in start order has already been passed.
    pub fn window(&mut self, notes: &[Note], time: f64, look_behind: f64, look_ahead: f64) -> Range<usize> {
        let window_start = (time - look_behind).max(0.0);
        let window_end = time + look_ahead;

        if time < self.last_time - self.backward_jump_secs || self.index > notes.len() {
            self.index = lower_bound(notes, window_start);
        }
        while self.index < notes.len() && notes[self.index].end_time() < window_start {
            self.index += 1;
        }
        self.last_time = time;

        let end = self.index
            + notes[self.index..].partition_point(|note| note.start_time <= window_end);
        self.index..end
    }
}
