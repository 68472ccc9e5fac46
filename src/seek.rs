//! Coalescing of rapid seek requests during a scrub gesture.
//!
//! The coordinator owns no timer. Callers pass their clock into `request` and
//! `poll`, which keeps the debounce deterministic under test.

pub const DEFAULT_SEEK_DEBOUNCE_SECS: f64 = 0.048;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SeekState {
    Idle,
    /// Latest requested time and when it is due.
    Pending { time: f64, deadline: f64 },
}

#[derive(Debug, Clone)]
pub struct SeekCoordinator {
    state: SeekState,
    dragging: bool,
    debounce_secs: f64,
}

impl Default for SeekCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SEEK_DEBOUNCE_SECS)
    }
}

impl SeekCoordinator {
    pub fn new(debounce_secs: f64) -> Self {
        SeekCoordinator {
            state: SeekState::Idle,
            dragging: false,
            debounce_secs,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.state, SeekState::Pending { .. })
    }

    pub fn begin_gesture(&mut self) {
        self.dragging = true;
    }

    /// End the gesture and hand back anything still pending.
    pub fn end_gesture(&mut self) -> Option<f64> {
        self.dragging = false;
        self.flush()
    }

    /// Outside a gesture the time is returned for immediate use. During one it
    /// is stored, replacing any earlier pending time, and `None` is returned.
    pub fn request(&mut self, time: f64, now: f64) -> Option<f64> {
        if !self.dragging {
            self.state = SeekState::Idle;
            return Some(time);
        }
        self.state = match self.state {
            SeekState::Idle => SeekState::Pending {
                time,
                deadline: now + self.debounce_secs,
            },
            // keep the first deadline so a steady drag still resyncs
            SeekState::Pending { deadline, .. } => SeekState::Pending { time, deadline },
        };
        None
    }

    /// Release the pending time once its deadline has passed.
    pub fn poll(&mut self, now: f64) -> Option<f64> {
        match self.state {
            SeekState::Pending { deadline, .. } if now >= deadline => self.flush(),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<f64> {
        match std::mem::replace(&mut self.state, SeekState::Idle) {
            SeekState::Pending { time, .. } => Some(time),
            SeekState::Idle => None,
        }
    }

    /// Drop any pending time and leave the gesture.
    pub fn cancel(&mut self) {
        self.state = SeekState::Idle;
        self.dragging = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_outside_gesture_is_immediate() {
        let mut seek = SeekCoordinator::default();
        assert_eq!(seek.request(3.0, 0.0), Some(3.0));
        assert!(!seek.has_pending());
        assert_eq!(seek.flush(), None);
    }

    #[test]
    fn test_gesture_coalesces_last_write_wins() {
        let mut seek = SeekCoordinator::default();
        seek.begin_gesture();
        assert_eq!(seek.request(1.0, 10.0), None);
        assert_eq!(seek.request(2.0, 10.01), None);
        assert_eq!(seek.request(3.0, 10.02), None);
        assert_eq!(seek.poll(10.03), None);
        assert_eq!(seek.poll(10.05), Some(3.0));
        assert_eq!(seek.poll(10.2), None);
    }

    #[test]
    fn test_end_gesture_flushes() {
        let mut seek = SeekCoordinator::default();
        seek.begin_gesture();
        seek.request(4.5, 1.0);
        assert_eq!(seek.end_gesture(), Some(4.5));
        assert!(!seek.is_dragging());
        assert_eq!(seek.end_gesture(), None);
    }

    #[test]
    fn test_deadline_is_kept_across_requests() {
        let mut seek = SeekCoordinator::new(0.05);
        seek.begin_gesture();
        seek.request(1.0, 0.0);
        seek.request(1.5, 0.04);
        // due at 0.05 from the first request, not 0.09
        assert_eq!(seek.poll(0.06), Some(1.5));
        seek.request(2.0, 0.07);
        assert_eq!(seek.poll(0.1), None);
        assert_eq!(seek.poll(0.13), Some(2.0));
    }

    #[test]
    fn test_cancel_discards_pending() {
        let mut seek = SeekCoordinator::default();
        seek.begin_gesture();
        seek.request(7.0, 0.0);
        seek.cancel();
        assert!(!seek.has_pending());
        assert_eq!(seek.poll(1.0), None);
    }
}
