//! Variable-speed song clock.

/// Maps a caller-supplied monotonic clock (seconds) onto song time.
///
/// Every state change re-anchors, so song time stays continuous across
/// speed changes and pauses.
#[derive(Debug, Clone)]
pub struct Transport {
    running: bool,
    anchor_song: f64,
    anchor_clock: f64,
    speed: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Transport {
    /// Stopped at song time 0.
    pub fn new(speed: f64) -> Self {
        Transport {
            running: false,
            anchor_song: 0.0,
            anchor_clock: 0.0,
            speed,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn song_time(&self, now: f64) -> f64 {
        if self.running {
            self.anchor_song + (now - self.anchor_clock).max(0.0) * self.speed
        } else {
            self.anchor_song
        }
    }

    pub fn start(&mut self, now: f64) {
        if !self.running {
            self.anchor_clock = now;
            self.running = true;
        }
    }

    pub fn pause(&mut self, now: f64) {
        if self.running {
            self.anchor_song = self.song_time(now);
            self.anchor_clock = now;
            self.running = false;
        }
    }

    /// Jump to `song_time`, keeping the running state.
    pub fn seek(&mut self, song_time: f64, now: f64) {
        self.anchor_song = song_time;
        self.anchor_clock = now;
    }

    /// Change speed, preserving the current song position.
    pub fn set_speed(&mut self, speed: f64, now: f64) {
        self.anchor_song = self.song_time(now);
        self.anchor_clock = now;
        self.speed = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_stopped_transport_holds_position() {
        let transport = Transport::default();
        assert!(!transport.is_running());
        assert_eq!(transport.song_time(100.0), 0.0);
    }

    #[test]
    fn test_runs_at_speed() {
        let mut transport = Transport::new(1.0);
        transport.start(10.0);
        assert_abs_diff_eq!(transport.song_time(12.5), 2.5, epsilon = 1e-9);

        transport.set_speed(0.5, 12.5);
        assert_abs_diff_eq!(transport.song_time(12.5), 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(transport.song_time(14.5), 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut transport = Transport::new(2.0);
        transport.start(0.0);
        transport.pause(1.0);
        assert_abs_diff_eq!(transport.song_time(50.0), 2.0, epsilon = 1e-9);
        transport.start(50.0);
        assert_abs_diff_eq!(transport.song_time(51.0), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_keeps_running_state() {
        let mut transport = Transport::new(1.0);
        transport.start(0.0);
        transport.seek(30.0, 5.0);
        assert!(transport.is_running());
        assert_abs_diff_eq!(transport.song_time(6.0), 31.0, epsilon = 1e-9);
    }
}
