use clap::{Parser, Subcommand};
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::engine::{Engine, LoadSummary};
use crate::hands::HandMode;
use crate::key::KeyHypothesis;
use crate::output::{list_output_ports, MidirSink, NoteSink};
use crate::schedule::{EventKind, NoteEvent};
use crate::time_format::{format_time, parse_time_input};
use crate::types::{TempoPoint, TimeSigPoint};
use crate::{set_shutdown_flag, should_shutdown};

#[derive(Parser)]
#[command(name = "piano_timeline")]
#[command(about = "Analyze MIDI piano pieces and play them back through a MIDI output")]
#[command(version = "0.2.0")]
#[command(author = "David Horner <david.horner@example.com>")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON file with engine settings (missing fields keep their defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print tempo, meter, key and hand split of a song
    Analyze {
        /// .mid, .midi or .json song file
        file: PathBuf,

        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the beat grid of a song
    Grid {
        file: PathBuf,

        /// First time to list (m:ss or seconds)
        #[arg(long, value_parser = parse_time_arg)]
        from: Option<f64>,

        /// Last time to list (m:ss or seconds)
        #[arg(long, value_parser = parse_time_arg)]
        to: Option<f64>,

        /// Only list bar starts
        #[arg(long)]
        bars_only: bool,
    },

    /// Play a song through a MIDI output port
    Play {
        file: PathBuf,

        /// Output port index (see `ports`)
        #[arg(long)]
        port: Option<usize>,

        /// MIDI channel, 0-15
        #[arg(long, default_value = "0")]
        channel: u8,

        /// Playback speed factor
        #[arg(long)]
        speed: Option<f64>,

        /// Which hand to play
        #[arg(long, value_enum, default_value_t = HandMode::Both)]
        hand: HandMode,

        /// Start position (m:ss or seconds)
        #[arg(long, value_parser = parse_time_arg)]
        start: Option<f64>,

        /// Loop start (m:ss or seconds)
        #[arg(long, value_parser = parse_time_arg, requires = "loop_end")]
        loop_start: Option<f64>,

        /// Loop end (m:ss or seconds)
        #[arg(long, value_parser = parse_time_arg, requires = "loop_start")]
        loop_end: Option<f64>,
    },

    /// List MIDI output ports
    Ports,
}

fn parse_time_arg(value: &str) -> Result<f64, String> {
    parse_time_input(value).ok_or_else(|| format!("invalid time '{}', use m:ss or seconds", value))
}

/// Everything `analyze --json` prints.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport<'a> {
    pub summary: LoadSummary,
    pub key: Option<KeyHypothesis>,
    pub tempos: &'a [TempoPoint],
    pub time_signatures: &'a [TimeSigPoint],
}

pub fn run_cli() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Analyze { file, json } => {
            let mut engine = Engine::new(config);
            let summary = engine.load_file(&file)?;
            if json {
                let song = engine.song().ok_or("song did not load")?;
                let report = AnalysisReport {
                    summary,
                    key: song.key,
                    tempos: &song.grid.tempos,
                    time_signatures: &song.grid.time_signatures,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", summary);
            }
        }
        Commands::Grid {
            file,
            from,
            to,
            bars_only,
        } => {
            let mut engine = Engine::new(config);
            let summary = engine.load_file(&file)?;
            let song = engine.song().ok_or("song did not load")?;
            let from = from.unwrap_or(0.0);
            let to = to.unwrap_or(summary.total_duration);
            let mut bar = song.grid.lines[..song.grid.lower_bound(from)]
                .iter()
                .filter(|l| l.is_bar_start)
                .count();
            for line in song.grid.lines_between(from, to) {
                if line.is_bar_start {
                    bar += 1;
                    println!("{:>10.3}  {:>6}  bar {}", line.time, format_time(line.time), bar);
                } else if !bars_only {
                    println!("{:>10.3}  {:>6}    beat", line.time, format_time(line.time));
                }
            }
        }
        Commands::Play {
            file,
            port,
            channel,
            speed,
            hand,
            start,
            loop_start,
            loop_end,
        } => {
            if let Some(speed) = speed {
                config.default_speed = config.clamp_speed(speed);
            }
            let mut engine = Engine::new(config);
            let summary = engine.load_file(&file)?;
            println!("{}", summary);

            let mut sink = MidirSink::connect(port, channel)?;
            println!("🔌 Output: {}", sink.port_name());

            ctrlc::set_handler(set_shutdown_flag)?;

            let clock = Instant::now();
            let now = || clock.elapsed().as_secs_f64();
            if hand != HandMode::Both {
                println!("{}", engine.set_hand_mode(hand, now()));
            }
            if let (Some(loop_start), Some(loop_end)) = (loop_start, loop_end) {
                println!("{}", engine.set_loop_bounds(loop_start, loop_end, now())?);
            }
            if let Some(start) = start {
                engine.seek(start, now())?;
            }

            run_play(&mut engine, &mut sink, now)?;
            println!();
        }
        Commands::Ports => {
            let ports = list_output_ports()?;
            if ports.is_empty() {
                println!("❌ No MIDI output ports found!");
            }
            for (i, name) in ports.iter().enumerate() {
                println!("  {}: {}", i, name);
            }
        }
    }

    Ok(())
}

/// Drive the engine in real time until the song ends or Ctrl+C.
pub fn run_play(
    engine: &mut Engine,
    sink: &mut dyn NoteSink,
    now: impl Fn() -> f64,
) -> Result<(), Box<dyn Error>> {
    engine.play(now())?;
    let mut pending: Vec<(f64, NoteEvent)> = Vec::new();
    let mut last_second = None;

    loop {
        let tick_at = now();
        let Some(frame) = engine.tick(tick_at) else {
            break;
        };
        pending.extend(frame.events.iter().map(|e| (tick_at + e.offset_secs, *e)));
        pending.sort_by(|a, b| a.0.total_cmp(&b.0));

        let second = frame.song_time as u64;
        if last_second != Some(second) {
            last_second = Some(second);
            print!(
                "\r▶ {} / {}",
                format_time(frame.song_time),
                format_time(frame.total_duration)
            );
            std::io::stdout().flush()?;
        }
        if !frame.playing || should_shutdown() {
            break;
        }

        let next_tick = tick_at + engine.frame_interval();
        loop {
            let current = now();
            drain_due(&mut pending, current, sink)?;
            if current >= next_tick {
                break;
            }
            let wake = pending.first().map_or(next_tick, |p| p.0.min(next_tick));
            std::thread::sleep(Duration::from_secs_f64((wake - current).max(0.0)));
        }
    }

    engine.stop(now());
    if let Some(frame) = engine.tick(now()) {
        pending.extend(frame.events.iter().map(|e| (0.0, *e)));
    }
    for (_, event) in pending.iter().filter(|(_, e)| e.kind == EventKind::Off) {
        sink.send_event(event)?;
    }
    sink.all_notes_off()?;
    Ok(())
}

/// Send every event due at or before `now`. `pending` must be sorted by due time.
pub fn drain_due(pending: &mut Vec<(f64, NoteEvent)>, now: f64, sink: &mut dyn NoteSink) -> crate::Result<usize> {
    let due = pending.partition_point(|(at, _)| *at <= now);
    for (_, event) in pending.drain(..due) {
        sink.send_event(&event)?;
    }
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hand;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(EventKind, u8)>,
    }

    impl NoteSink for Recorder {
        fn note_on(&mut self, pitch: u8, _velocity: f32) -> crate::Result<()> {
            self.sent.push((EventKind::On, pitch));
            Ok(())
        }

        fn note_off(&mut self, pitch: u8) -> crate::Result<()> {
            self.sent.push((EventKind::Off, pitch));
            Ok(())
        }

        fn all_notes_off(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    fn event(kind: EventKind, pitch: u8) -> NoteEvent {
        NoteEvent {
            kind,
            note_id: pitch as usize,
            pitch,
            velocity: 0.8,
            hand: Hand::Right,
            offset_secs: 0.0,
            duration_secs: 0.5,
        }
    }

    #[test]
    fn test_drain_due_sends_in_order() {
        let mut sink = Recorder::default();
        let mut pending = vec![
            (1.0, event(EventKind::On, 60)),
            (1.5, event(EventKind::Off, 60)),
            (2.0, event(EventKind::On, 62)),
        ];
        assert_eq!(drain_due(&mut pending, 1.5, &mut sink).unwrap(), 2);
        assert_eq!(sink.sent, vec![(EventKind::On, 60), (EventKind::Off, 60)]);
        assert_eq!(pending.len(), 1);
        assert_eq!(drain_due(&mut pending, 1.9, &mut sink).unwrap(), 0);
    }

    #[test]
    fn test_parse_play_arguments() {
        let cli = Cli::try_parse_from([
            "piano_timeline",
            "play",
            "song.mid",
            "--speed",
            "0.75",
            "--hand",
            "left",
            "--loop-start",
            "0:04",
            "--loop-end",
            "12.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Play {
                speed,
                hand,
                loop_start,
                loop_end,
                start,
                ..
            } => {
                assert_eq!(speed, Some(0.75));
                assert_eq!(hand, HandMode::Left);
                assert_eq!(loop_start, Some(4.0));
                assert_eq!(loop_end, Some(12.5));
                assert_eq!(start, None);
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_loop_bounds_come_in_pairs() {
        assert!(Cli::try_parse_from(["piano_timeline", "play", "a.mid", "--loop-start", "1"]).is_err());
    }

    #[test]
    fn test_bad_time_argument_is_rejected() {
        assert!(Cli::try_parse_from(["piano_timeline", "grid", "a.mid", "--from", "abc"]).is_err());
        let cli = Cli::try_parse_from(["piano_timeline", "--config", "c.json", "grid", "a.mid", "--bars-only"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
    }
}
