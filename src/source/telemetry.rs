use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;

use serde::Deserialize;

use super::{PositionSource, SourceError};
use crate::tracking::{TargetSample, Velocity};

/// Sign of the vertical velocity component in incoming telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalConvention {
    /// North/east/down autopilots: positive `y` means descending.
    #[default]
    Down,
    Up,
}

impl VerticalConvention {
    pub fn to_up(self, vy: f64) -> f64 {
        match self {
            VerticalConvention::Down => -vy,
            VerticalConvention::Up => vy,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Message {
    position: Position,
    velocity: RawVelocity,
}

#[derive(Debug, Deserialize)]
struct Position {
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

/// `x` east, `y` vertical (see [`VerticalConvention`]), `z` north.
#[derive(Debug, Deserialize)]
struct RawVelocity {
    x: f64,
    y: f64,
    z: f64,
}

pub fn parse_message(
    line: &str,
    convention: VerticalConvention,
) -> Result<TargetSample, SourceError> {
    let message: Message =
        serde_json::from_str(line).map_err(|e| SourceError::Malformed(e.to_string()))?;
    Ok(TargetSample::new(
        message.position.latitude,
        message.position.longitude,
        message.position.altitude,
        Velocity {
            east: message.velocity.x,
            north: message.velocity.z,
            up: convention.to_up(message.velocity.y),
        },
    ))
}

/// Reads newline-delimited JSON telemetry on a background thread.
pub struct JsonLinesSource {
    rx: mpsc::Receiver<TargetSample>,
}

impl JsonLinesSource {
    pub fn spawn<R>(reader: R, convention: VerticalConvention) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (index, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("telemetry read error: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_message(&line, convention) {
                    Ok(sample) => {
                        if tx.send(sample).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("skipping telemetry line {}: {}", index + 1, e),
                }
            }
            log::info!("telemetry stream ended");
        });
        Self { rx }
    }

    /// Opens a file, or stdin for `-`.
    pub fn open(path: &Path, convention: VerticalConvention) -> Result<Self, SourceError> {
        if path.as_os_str() == "-" {
            return Ok(Self::spawn(BufReader::new(io::stdin()), convention));
        }
        let file = File::open(path)?;
        Ok(Self::spawn(BufReader::new(file), convention))
    }
}

impl PositionSource for JsonLinesSource {
    fn poll(&mut self) -> Result<Option<TargetSample>, SourceError> {
        let mut latest = None;
        let mut ended = false;
        loop {
            match self.rx.try_recv() {
                Ok(sample) => latest = Some(sample),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    ended = true;
                    break;
                }
            }
        }

        match latest {
            Some(sample) => Ok(Some(sample)),
            None if ended => Err(SourceError::Unavailable("telemetry stream ended".into())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    const LINE: &str = r#"{"position":{"latitude":47.1,"longitude":8.2,"altitude":512.0},"velocity":{"x":1.5,"y":-2.0,"z":3.0}}"#;

    #[test]
    fn down_positive_velocity_is_flipped() {
        let sample = parse_message(LINE, VerticalConvention::Down).unwrap();
        assert_eq!(sample.latitude_deg, 47.1);
        assert_eq!(sample.altitude_m, 512.0);
        assert_eq!(
            sample.velocity,
            Velocity {
                east: 1.5,
                north: 3.0,
                up: 2.0,
            }
        );

        let sample = parse_message(LINE, VerticalConvention::Up).unwrap();
        assert_eq!(sample.velocity.up, -2.0);
    }

    #[test]
    fn missing_fields_are_malformed() {
        let result = parse_message(r#"{"position":{"latitude":1.0}}"#, VerticalConvention::Down);
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[test]
    fn poll_returns_latest_then_reports_end() {
        let input = format!("{}\nnot json\n\n{}\n", LINE, LINE.replace("47.1", "47.2"));
        let mut source = JsonLinesSource::spawn(Cursor::new(input), VerticalConvention::Down);

        // Wait for the reader thread to finish so both samples are queued
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        loop {
            match source.poll() {
                Ok(Some(sample)) => seen.push(sample.latitude_deg),
                Ok(None) => {}
                Err(SourceError::Unavailable(_)) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
            assert!(Instant::now() < deadline, "stream never ended");
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(seen.last(), Some(&47.2));
        assert!(matches!(source.poll(), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn opens_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        std::fs::write(&path, format!("{}\n", LINE)).unwrap();

        let mut source = JsonLinesSource::open(&path, VerticalConvention::Down).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let sample = loop {
            if let Some(sample) = source.poll().unwrap() {
                break sample;
            }
            assert!(Instant::now() < deadline, "no sample read");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(sample.longitude_deg, 8.2);

        let missing = dir.path().join("missing");
        assert!(JsonLinesSource::open(&missing, VerticalConvention::Down).is_err());
    }
}
