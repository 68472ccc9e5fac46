use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Tunables for windowing, seeking, looping and pacing
pub struct EngineConfig {
    /// Seconds of already-played notes kept in the render window
    pub look_behind_secs: f64,
    /// Seconds of upcoming notes in the render window
    pub look_ahead_secs: f64,
    /// A tick this far behind the previous one counts as a backward jump
    pub backward_jump_secs: f64,
    /// Delay before a coalesced scrub is applied
    pub seek_debounce_secs: f64,
    /// Marks closer than this are considered the same mark
    pub mark_epsilon_secs: f64,
    /// While scrubbing, snap to a mark within this distance
    pub scrub_snap_secs: f64,
    /// After a snap, keep snapping for this long
    pub scrub_snap_hold_secs: f64,
    /// How far ahead note events are handed to the audio driver
    pub schedule_ahead_secs: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub speed_step: f64,
    pub default_speed: f64,
    pub active_fps: f64,
    pub idle_fps: f64,
    /// Shortest loop the bound editor accepts
    pub min_loop_secs: f64,
    pub seek_step_secs: f64,
    pub seek_step_large_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            look_behind_secs: 1.2,
            look_ahead_secs: 3.5,
            backward_jump_secs: 0.2,
            seek_debounce_secs: 0.048,
            mark_epsilon_secs: 0.001,
            scrub_snap_secs: 0.12,
            scrub_snap_hold_secs: 1.0,
            schedule_ahead_secs: 0.1,
            min_speed: 0.5,
            max_speed: 2.0,
            speed_step: 0.05,
            default_speed: 1.0,
            active_fps: 30.0,
            idle_fps: 8.0,
            min_loop_secs: 0.01,
            seek_step_secs: 2.0,
            seek_step_large_secs: 5.0,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if !speed.is_finite() {
            return self.default_speed;
        }
        speed.clamp(self.min_speed, self.max_speed)
    }
}
