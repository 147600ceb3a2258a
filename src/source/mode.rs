use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::{ModeSource, SourceError, TrackingMode};

#[derive(Debug)]
struct ModeCell {
    mode: TrackingMode,
    version: u64,
}

/// Mode set in-process (e.g. by the HTTP API). Clones share the mode but
/// each tracks which change it has seen.
#[derive(Debug, Clone)]
pub struct SharedMode {
    cell: Arc<(Mutex<ModeCell>, Condvar)>,
    seen: u64,
}

impl SharedMode {
    pub fn new(initial: TrackingMode) -> Self {
        Self {
            cell: Arc::new((
                Mutex::new(ModeCell {
                    mode: initial,
                    version: 0,
                }),
                Condvar::new(),
            )),
            seen: 0,
        }
    }

    pub fn get(&self) -> TrackingMode {
        self.cell.0.lock().unwrap().mode
    }

    pub fn set(&self, mode: TrackingMode) {
        let (lock, changed) = &*self.cell;
        let mut cell = lock.lock().unwrap();
        if cell.mode != mode {
            log::info!("tracking mode {} -> {}", cell.mode, mode);
            cell.mode = mode;
            cell.version += 1;
            changed.notify_all();
        }
    }
}

impl ModeSource for SharedMode {
    fn current(&mut self) -> Result<TrackingMode, SourceError> {
        let cell = self.cell.0.lock().unwrap();
        self.seen = cell.version;
        Ok(cell.mode)
    }

    fn wait_for_change(&mut self, timeout: Duration) -> Result<Option<TrackingMode>, SourceError> {
        let (lock, changed) = &*self.cell;
        let seen = self.seen;
        let (cell, _) = changed
            .wait_timeout_while(lock.lock().unwrap(), timeout, |cell| cell.version == seen)
            .unwrap();
        if cell.version == seen {
            return Ok(None);
        }
        self.seen = cell.version;
        Ok(Some(cell.mode))
    }
}

/// Mode read from the first line of a file. A missing file means `off`;
/// unreadable or invalid contents keep the previous mode.
#[derive(Debug)]
pub struct FileMode {
    path: PathBuf,
    poll_hz: u32,
    last: TrackingMode,
}

impl FileMode {
    /// `poll_hz` bounds how often `wait_for_change` rereads the file; 0
    /// rereads as fast as possible.
    pub fn new(path: PathBuf, poll_hz: u32) -> Self {
        Self {
            path,
            poll_hz,
            last: TrackingMode::Off,
        }
    }

    fn read(&mut self) -> TrackingMode {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let first = content.lines().next().unwrap_or("");
                match first.parse() {
                    Ok(mode) => self.last = mode,
                    Err(e) => log::warn!(
                        "ignoring mode file {}: {}",
                        self.path.display(),
                        e
                    ),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("mode file {} does not exist", self.path.display());
                self.last = TrackingMode::Off;
            }
            Err(e) => log::warn!("failed to read mode file {}: {}", self.path.display(), e),
        }
        self.last
    }

    fn period(&self) -> Duration {
        if self.poll_hz == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(self.poll_hz))
        }
    }
}

impl ModeSource for FileMode {
    fn current(&mut self) -> Result<TrackingMode, SourceError> {
        Ok(self.read())
    }

    fn wait_for_change(&mut self, timeout: Duration) -> Result<Option<TrackingMode>, SourceError> {
        let previous = self.last;
        let deadline = Instant::now() + timeout;
        loop {
            let cycle_start = Instant::now();
            let mode = self.read();
            if mode != previous {
                return Ok(Some(mode));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let next = (cycle_start + self.period()).min(deadline);
            if next > now {
                thread::sleep(next - now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_mode_wakes_waiter_on_change() {
        let mut reader = SharedMode::new(TrackingMode::Off);
        let writer = reader.clone();
        assert_eq!(reader.current().unwrap(), TrackingMode::Off);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.set(TrackingMode::On);
        });

        let changed = reader.wait_for_change(Duration::from_secs(5)).unwrap();
        assert_eq!(changed, Some(TrackingMode::On));
        handle.join().unwrap();

        // Nothing new since
        assert_eq!(reader.wait_for_change(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn setting_the_same_mode_is_not_a_change() {
        let mut reader = SharedMode::new(TrackingMode::Auto);
        reader.current().unwrap();
        reader.set(TrackingMode::Auto);
        assert_eq!(reader.wait_for_change(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn file_mode_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode");
        let mut source = FileMode::new(path.clone(), 100);

        assert_eq!(source.current().unwrap(), TrackingMode::Off);

        fs::write(&path, "on\nignored\n").unwrap();
        assert_eq!(source.current().unwrap(), TrackingMode::On);

        fs::write(&path, "bogus\n").unwrap();
        assert_eq!(source.current().unwrap(), TrackingMode::On);

        fs::write(&path, "auto").unwrap();
        let changed = source.wait_for_change(Duration::from_millis(200)).unwrap();
        assert_eq!(changed, Some(TrackingMode::Auto));
        assert_eq!(source.wait_for_change(Duration::from_millis(30)).unwrap(), None);
    }
}
