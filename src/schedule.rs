//! Polled note-event queue feeding the audio driver.
//!
//! Nothing here calls into audio. The driver asks for the events due within a
//! short horizon every tick and plays them at their offsets.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::playback::lower_bound;
use crate::types::{Hand, Note};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    On,
    Off,
}

/// One note trigger or release, relative to the song time it was polled at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub kind: EventKind,
    pub note_id: usize,
    pub pitch: u8,
    pub velocity: f32,
    pub hand: Hand,
    /// Wall-clock seconds from now, already divided by the playback speed.
    pub offset_secs: f64,
    /// Wall-clock length of the note at the current speed.
    pub duration_secs: f64,
}

/// (song time in microseconds, note id, kind)
type EventKey = (u64, usize, EventKind);

fn to_micros(time: f64) -> u64 {
    (time.max(0.0) * 1_000_000.0).round() as u64
}

#[derive(Debug, Default, Clone)]
pub struct ScheduleQueue {
    pending: BTreeMap<EventKey, Note>,
    sounding: BTreeMap<usize, Note>,
    next_note: usize,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Notes whose on event went out and whose off event has not.
    pub fn sounding(&self) -> impl Iterator<Item = &Note> {
        self.sounding.values()
    }

    /// Drop everything pending and restart at the first note starting at or
    /// after `song_time`. Sounding notes must be released first.
    pub fn rebuild(&mut self, notes: &[Note], song_time: f64) {
        self.pending.clear();
        self.next_note = lower_bound(notes, song_time);
    }

    /// Events due before `song_time + ahead`, in time order.
    pub fn poll(&mut self, notes: &[Note], song_time: f64, speed: f64, ahead: f64) -> Vec<NoteEvent> {
        let horizon = song_time + ahead.max(0.0);
        while let Some(note) = notes.get(self.next_note) {
            if note.start_time >= horizon {
                break;
            }
            self.pending.insert((to_micros(note.start_time), note.id, EventKind::On), *note);
            self.pending.insert((to_micros(note.end_time()), note.id, EventKind::Off), *note);
            self.next_note += 1;
        }

        let later = self.pending.split_off(&(to_micros(horizon), 0, EventKind::On));
        let due = std::mem::replace(&mut self.pending, later);

        due.into_iter()
            .map(|((_, _, kind), note)| {
                let at = match kind {
                    EventKind::On => {
                        self.sounding.insert(note.id, note);
                        note.start_time
                    }
                    EventKind::Off => {
                        self.sounding.remove(&note.id);
                        note.end_time()
                    }
                };
                event(kind, &note, ((at - song_time) / speed).max(0.0), speed)
            })
            .collect()
    }

    /// Immediate offs for every sounding note. Empties the queue.
    pub fn release_all(&mut self, speed: f64) -> Vec<NoteEvent> {
        self.pending.clear();
        let sounding = std::mem::take(&mut self.sounding);
        sounding
            .into_values()
            .map(|note| event(EventKind::Off, &note, 0.0, speed))
            .collect()
    }
}

fn event(kind: EventKind, note: &Note, offset_secs: f64, speed: f64) -> NoteEvent {
    NoteEvent {
        kind,
        note_id: note.id,
        pitch: note.pitch,
        velocity: note.velocity,
        hand: note.hand,
        offset_secs,
        duration_secs: note.duration / speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn notes() -> Vec<Note> {
        [(0.0, 0.5, 60), (0.05, 1.0, 64), (1.0, 0.5, 67), (2.0, 2.0, 72)]
            .iter()
            .enumerate()
            .map(|(id, &(start, duration, pitch))| Note {
                id,
                start_time: start,
                duration,
                pitch,
                velocity: 0.8,
                track_index: 0,
                hand: Hand::Right,
            })
            .collect()
    }

    #[test]
    fn test_poll_emits_due_events_in_order() {
        let notes = notes();
        let mut queue = ScheduleQueue::new();
        queue.rebuild(&notes, 0.0);

        let events = queue.poll(&notes, 0.0, 1.0, 0.1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].note_id, 0);
        assert_eq!(events[1].note_id, 1);
        assert!(events.iter().all(|e| e.kind == EventKind::On));
        assert_abs_diff_eq!(events[1].offset_secs, 0.05, epsilon = 1e-9);
        assert_eq!(queue.sounding().count(), 2);

        let events = queue.poll(&notes, 0.45, 1.0, 0.1);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].kind, events[0].note_id), (EventKind::Off, 0));
        assert_eq!(queue.sounding().count(), 1);
    }

    #[test]
    fn test_speed_scales_offsets_and_durations() {
        let notes = notes();
        let mut queue = ScheduleQueue::new();
        queue.rebuild(&notes, 0.9);
        let events = queue.poll(&notes, 0.9, 2.0, 0.2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].note_id, 2);
        assert_abs_diff_eq!(events[0].offset_secs, 0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(events[0].duration_secs, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_rebuild_skips_started_notes() {
        let notes = notes();
        let mut queue = ScheduleQueue::new();
        queue.rebuild(&notes, 0.5);
        let events = queue.poll(&notes, 0.5, 1.0, 3.0);
        let on_ids: Vec<usize> = events
            .iter()
            .filter(|e| e.kind == EventKind::On)
            .map(|e| e.note_id)
            .collect();
        assert_eq!(on_ids, vec![2, 3]);
    }

    #[test]
    fn test_release_all_turns_off_sounding_notes() {
        let notes = notes();
        let mut queue = ScheduleQueue::new();
        queue.rebuild(&notes, 2.0);
        queue.poll(&notes, 2.0, 1.0, 0.1);
        assert_eq!(queue.pending_len(), 1);

        let offs = queue.release_all(1.0);
        assert_eq!(offs.len(), 1);
        assert_eq!(offs[0].kind, EventKind::Off);
        assert_eq!(offs[0].pitch, 72);
        assert_eq!(offs[0].offset_secs, 0.0);
        assert_eq!(queue.pending_len(), 0);
        assert!(queue.release_all(1.0).is_empty());
    }
}
