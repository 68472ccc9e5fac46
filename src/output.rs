use midir::{MidiOutput, MidiOutputConnection};

use crate::error::{Result, TimelineError};
use crate::schedule::{EventKind, NoteEvent};

const CLIENT_NAME: &str = "piano_timeline";

/// Anything that can sound notes.
pub trait NoteSink {
    fn note_on(&mut self, pitch: u8, velocity: f32) -> Result<()>;
    fn note_off(&mut self, pitch: u8) -> Result<()>;
    fn all_notes_off(&mut self) -> Result<()>;

    /// Forward one scheduled event, ignoring its offset.
    fn send_event(&mut self, event: &NoteEvent) -> Result<()> {
        match event.kind {
            EventKind::On => self.note_on(event.pitch, event.velocity),
            EventKind::Off => self.note_off(event.pitch),
        }
    }
}

/// Scale a 0..1 velocity to MIDI. Never 0, which would read as note-off.
pub fn midi_velocity(velocity: f32) -> u8 {
    (velocity.clamp(0.0, 1.0) * 127.0).round().max(1.0) as u8
}

/// Names of the available MIDI output ports, in port order.
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TimelineError::MidiOutput(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .map(|port| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| "<Unknown>".to_string())
        })
        .collect())
}

pub struct MidirSink {
    conn: MidiOutputConnection,
    channel: u8,
    port_name: String,
}

impl MidirSink {
    /// Connect to output port `port_index` (the first port when `None`).
    pub fn connect(port_index: Option<usize>, channel: u8) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TimelineError::MidiOutput(e.to_string()))?;
        let ports = midi_out.ports();
        let port = ports
            .get(port_index.unwrap_or(0))
            .ok_or(TimelineError::NoOutputPort)?;
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());
        let conn = midi_out
            .connect(port, CLIENT_NAME)
            .map_err(|e| TimelineError::MidiOutput(e.to_string()))?;
        log::info!("connected to MIDI port: {}", port_name);
        Ok(MidirSink {
            conn,
            channel: channel & 0x0F,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.conn
            .send(message)
            .map_err(|e| TimelineError::MidiOutput(e.to_string()))
    }
}

impl NoteSink for MidirSink {
    fn note_on(&mut self, pitch: u8, velocity: f32) -> Result<()> {
        self.send(&[0x90 | self.channel, pitch & 0x7F, midi_velocity(velocity)])
    }

    fn note_off(&mut self, pitch: u8) -> Result<()> {
        self.send(&[0x80 | self.channel, pitch & 0x7F, 0])
    }

    fn all_notes_off(&mut self) -> Result<()> {
        self.send(&[0xB0 | self.channel, 123, 0])
    }
}

impl Drop for MidirSink {
    fn drop(&mut self) {
        let _ = self.all_notes_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hand;

    #[derive(Default)]
    struct Recorder {
        messages: Vec<(bool, u8, u8)>,
    }

    impl NoteSink for Recorder {
        fn note_on(&mut self, pitch: u8, velocity: f32) -> Result<()> {
            self.messages.push((true, pitch, midi_velocity(velocity)));
            Ok(())
        }

        fn note_off(&mut self, pitch: u8) -> Result<()> {
            self.messages.push((false, pitch, 0));
            Ok(())
        }

        fn all_notes_off(&mut self) -> Result<()> {
            self.messages.clear();
            Ok(())
        }
    }

    #[test]
    fn test_velocity_scaling() {
        assert_eq!(midi_velocity(1.0), 127);
        assert_eq!(midi_velocity(0.5), 64);
        assert_eq!(midi_velocity(0.0), 1);
        assert_eq!(midi_velocity(3.0), 127);
    }

    #[test]
    fn test_send_event_dispatches_by_kind() {
        let mut sink = Recorder::default();
        let mut event = NoteEvent {
            kind: EventKind::On,
            note_id: 0,
            pitch: 60,
            velocity: 1.0,
            hand: Hand::Right,
            offset_secs: 0.0,
            duration_secs: 0.5,
        };
        sink.send_event(&event).unwrap();
        event.kind = EventKind::Off;
        sink.send_event(&event).unwrap();
        assert_eq!(sink.messages, vec![(true, 60, 127), (false, 60, 0)]);
    }
}
