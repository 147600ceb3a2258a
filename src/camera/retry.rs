use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::actuator::ActuatorError;
use super::error::ActivationError;

/// What the last (or current) retry loop for one operation has seen.
#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct RetryStats {
    /// Attempts made by the most recent loop, including the successful one.
    pub attempts: u64,
    /// Failures across all loops since startup.
    pub total_failures: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct RecordingRetries {
    pub start: RetryStats,
    pub stop: RetryStats,
}

#[derive(Debug, Clone, Copy)]
pub enum RecordingOp {
    Start,
    Stop,
}

impl RecordingOp {
    fn name(self) -> &'static str {
        match self {
            RecordingOp::Start => "start recording",
            RecordingOp::Stop => "stop recording",
        }
    }

    fn stats(self, retries: &mut RecordingRetries) -> &mut RetryStats {
        match self {
            RecordingOp::Start => &mut retries.start,
            RecordingOp::Stop => &mut retries.stop,
        }
    }
}

/// Retries forever unless aborted. The abort flag lives outside any lock
/// so it can be raised while a loop is running.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub abort: Arc<AtomicBool>,
}

impl RetryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Calls `op` until it succeeds, recording every attempt in `retries`.
    pub fn run<T>(
        &self,
        which: RecordingOp,
        retries: &Mutex<RecordingRetries>,
        mut op: impl FnMut() -> Result<T, ActuatorError>,
    ) -> Result<T, ActivationError> {
        {
            let mut locked = retries.lock().unwrap();
            let stats = which.stats(&mut locked);
            stats.attempts = 0;
            stats.in_progress = true;
        }

        loop {
            if self.is_aborted() {
                which.stats(&mut retries.lock().unwrap()).in_progress = false;
                log::warn!("{} aborted", which.name());
                return Err(ActivationError::Aborted(which.name()));
            }

            let result = op();

            let mut locked = retries.lock().unwrap();
            let stats = which.stats(&mut locked);
            stats.attempts += 1;
            match result {
                Ok(value) => {
                    stats.in_progress = false;
                    stats.last_success_at = Some(Utc::now());
                    if stats.attempts > 1 {
                        log::info!("{} succeeded after {} attempts", which.name(), stats.attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    stats.total_failures += 1;
                    stats.last_error = Some(e.to_string());
                    log::error!(
                        "failed to {} (attempt {}): {}, retrying",
                        which.name(),
                        stats.attempts,
                        e
                    );
                }
            }
            drop(locked);

            if !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
    }
}
