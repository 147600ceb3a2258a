use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::actuator::ActuatorDriver;
use super::error::ActivationError;
use super::retry::{RecordingOp, RecordingRetries, RetryPolicy};
use crate::tracking::{ActuatorState, AimSolution, MoveCommand, TargetSample, TrackingEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivationState {
    Inactive,
    Active,
    Deactivating,
}

#[derive(Debug, Clone)]
pub struct ActivationSettings {
    pub disk_name: String,
    pub profile: Option<String>,
    /// Park angles in camera coordinates; a missing axis holds its position.
    pub park_pan_deg: Option<f64>,
    pub park_tilt_deg: Option<f64>,
    pub retry_interval: Duration,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CameraStatus {
    pub state: ActivationState,
    pub recording_id: Option<String>,
    pub actuator: ActuatorState,
    pub camera_pan_deg: f64,
    pub camera_tilt_deg: f64,
    pub last_solution: Option<AimSolution>,
    pub moves_sent: u64,
    pub since: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingDeactivation {
    generation: u64,
    // Dropping the sender wakes the timer thread as canceled.
    _cancel_tx: mpsc::Sender<()>,
}

struct Inner {
    engine: TrackingEngine,
    driver: Box<dyn ActuatorDriver>,
    state: ActivationState,
    recording_id: Option<String>,
    pending: Option<PendingDeactivation>,
    next_generation: u64,
    since: DateTime<Utc>,
}

impl Inner {
    fn transition(&mut self, state: ActivationState) {
        if self.state != state {
            log::info!("camera {} -> {}", self.state, state);
            self.state = state;
            self.since = Utc::now();
        }
    }

    fn status(&self) -> CameraStatus {
        let (camera_pan_deg, camera_tilt_deg) = self.engine.camera_position();
        CameraStatus {
            state: self.state,
            recording_id: self.recording_id.clone(),
            actuator: self.engine.state(),
            camera_pan_deg,
            camera_tilt_deg,
            last_solution: self.engine.last_solution(),
            moves_sent: self.engine.moves_sent(),
            since: self.since,
        }
    }

    fn cancel_pending(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        log::info!("canceled pending deactivation #{}", pending.generation);
        if self.state == ActivationState::Deactivating {
            self.transition(ActivationState::Active);
        }
        true
    }
}

/// Result of [`ActivationStateMachine::deactivate`].
pub enum Deactivation {
    Completed,
    Scheduled(DeactivationHandle),
}

/// Cancels one scheduled deactivation. Stale once that deactivation has
/// fired or been replaced.
pub struct DeactivationHandle {
    machine: ActivationStateMachine,
    generation: u64,
}

impl DeactivationHandle {
    pub fn is_pending(&self) -> bool {
        self.machine.pending_generation() == Some(self.generation)
    }

    /// Returns false if the deactivation already ran (or is running).
    pub fn cancel(&self) -> bool {
        let mut inner = self.machine.lock();
        if inner.pending.as_ref().map(|p| p.generation) != Some(self.generation) {
            return false;
        }
        let canceled = inner.cancel_pending();
        self.machine.publish(&inner);
        canceled
    }
}

/// Owns the recording lifecycle around a [`TrackingEngine`].
///
/// Clones share the same camera. All state sits behind one mutex, which
/// the deferred deactivation timer also takes, so a deactivation that has
/// started always completes before anyone else sees the camera. A copy of
/// the status is published before every recording retry loop and after
/// every operation, so status reads never wait on the camera.
#[derive(Clone)]
pub struct ActivationStateMachine {
    inner: Arc<Mutex<Inner>>,
    published: Arc<Mutex<CameraStatus>>,
    settings: Arc<ActivationSettings>,
    retry: RetryPolicy,
    retries: Arc<Mutex<RecordingRetries>>,
}

impl ActivationStateMachine {
    pub fn new(
        engine: TrackingEngine,
        driver: Box<dyn ActuatorDriver>,
        settings: ActivationSettings,
    ) -> Self {
        let retry = RetryPolicy::new(settings.retry_interval);
        let inner = Inner {
            engine,
            driver,
            state: ActivationState::Inactive,
            recording_id: None,
            pending: None,
            next_generation: 0,
            since: Utc::now(),
        };
        Self {
            published: Arc::new(Mutex::new(inner.status())),
            inner: Arc::new(Mutex::new(inner)),
            settings: Arc::new(settings),
            retry,
            retries: Arc::new(Mutex::new(RecordingRetries::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn publish(&self, inner: &Inner) {
        *self.published.lock().unwrap() = inner.status();
    }

    fn pending_generation(&self) -> Option<u64> {
        self.lock().pending.as_ref().map(|p| p.generation)
    }

    pub fn state(&self) -> ActivationState {
        self.lock().state
    }

    pub fn recording_id(&self) -> Option<String> {
        self.lock().recording_id.clone()
    }

    /// Current status, or the last published one while the camera is busy
    /// (e.g. inside a recording retry loop).
    pub fn status(&self) -> CameraStatus {
        match self.inner.try_lock() {
            Ok(inner) => inner.status(),
            Err(TryLockError::WouldBlock) => self.published.lock().unwrap().clone(),
            Err(TryLockError::Poisoned(e)) => e.into_inner().status(),
        }
    }

    /// Readable while a retry loop holds the camera lock.
    pub fn retries(&self) -> RecordingRetries {
        self.retries.lock().unwrap().clone()
    }

    /// Makes any running or future recording retry loop give up.
    pub fn abort_retries(&self) {
        self.retry.abort();
    }

    /// Tracks a sample, starting a recording first if the camera is inactive.
    ///
    /// A pending deactivation is not canceled here; call
    /// [`cancel_pending_deactivation`](Self::cancel_pending_deactivation)
    /// first if tracking should resume.
    pub fn on_trackable(
        &self,
        sample: &TargetSample,
    ) -> Result<Option<MoveCommand>, ActivationError> {
        sample.validate()?;

        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.state {
            ActivationState::Inactive => {
                let disk = self.settings.disk_name.as_str();
                let profile = self.settings.profile.as_deref();
                self.publish(inner);
                let id = self.retry.run(RecordingOp::Start, &self.retries, || {
                    inner.driver.start_recording(disk, profile)
                })?;
                log::info!("successfully started recording! id: {}", id);
                inner.recording_id = Some(id);
                inner.transition(ActivationState::Active);
            }
            ActivationState::Deactivating => {
                log::warn!("tracking while a deactivation is pending; it will still fire");
            }
            ActivationState::Active => {}
        }

        let command = inner.engine.update(sample, inner.driver.as_mut());
        self.publish(inner);
        Ok(command?)
    }

    /// Cancels the outstanding deferred deactivation, if any, and returns
    /// to `Active`. Returns false when there was nothing left to cancel.
    pub fn cancel_pending_deactivation(&self) -> bool {
        let mut inner = self.lock();
        let canceled = inner.cancel_pending();
        self.publish(&inner);
        canceled
    }

    /// Stops recording and parks the camera, now or after `delay`.
    ///
    /// With a delay the camera goes to `Deactivating` and a timer finishes
    /// the job unless canceled first. An inactive camera is parked at once.
    pub fn deactivate(&self, delay: Duration) -> Result<Deactivation, ActivationError> {
        let mut inner = self.lock();
        inner.cancel_pending();

        if delay.is_zero() || inner.state == ActivationState::Inactive {
            let finished = self.finish_deactivation(&mut inner);
            self.publish(&inner);
            finished?;
            return Ok(Deactivation::Completed);
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        inner.pending = Some(PendingDeactivation {
            generation,
            _cancel_tx: cancel_tx,
        });
        inner.transition(ActivationState::Deactivating);
        self.publish(&inner);
        drop(inner);

        log::info!(
            "deactivation #{} scheduled in {}",
            generation,
            humantime::format_duration(delay)
        );

        let machine = self.clone();
        thread::spawn(move || match cancel_rx.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => machine.fire(generation),
            _ => log::debug!("deactivation #{} timer stopped", generation),
        });

        Ok(Deactivation::Scheduled(DeactivationHandle {
            machine: self.clone(),
            generation,
        }))
    }

    fn fire(&self, generation: u64) {
        let mut inner = self.lock();
        // Canceled or replaced while the timer was waking up
        if inner.pending.as_ref().map(|p| p.generation) != Some(generation) {
            return;
        }
        inner.pending = None;
        log::info!("deactivation #{} firing", generation);
        if let Err(e) = self.finish_deactivation(&mut inner) {
            log::error!("deferred deactivation failed: {}", e);
        }
        self.publish(&inner);
    }

    fn finish_deactivation(&self, inner: &mut Inner) -> Result<(), ActivationError> {
        if let Some(id) = inner.recording_id.clone() {
            log::info!("stopping the recording... (name={})", id);
            self.publish(inner);
            let driver = &mut inner.driver;
            if let Err(e) = self
                .retry
                .run(RecordingOp::Stop, &self.retries, || driver.stop_recording(&id))
            {
                // Still recording, so still active
                inner.transition(ActivationState::Active);
                return Err(e);
            }
            log::info!("success stopping recording!");
            inner.recording_id = None;
        }

        let (current_pan, current_tilt) = inner.engine.camera_position();
        let pan = self.settings.park_pan_deg.unwrap_or(current_pan);
        let tilt = self.settings.park_tilt_deg.unwrap_or(current_tilt);
        log::info!("deactivating to (p, t) {:.2}, {:.2}", pan, tilt);
        let parked = inner
            .engine
            .move_to_camera_position(pan, tilt, inner.driver.as_mut());

        inner.transition(ActivationState::Inactive);

        if let Err(e) = parked {
            log::error!("failed to park camera: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
