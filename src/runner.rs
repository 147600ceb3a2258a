use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::{
    ActivationError, ActivationState, ActivationStateMachine, Deactivation, DeactivationHandle,
};
use crate::config::Config;
use crate::source::{ModeSource, PositionSource, SourceError, TrackingMode};
use crate::tracking::TargetSample;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub poll_interval: Duration,
    /// No sample for longer than this counts as a lost track.
    pub sample_timeout: Duration,
    pub deactivation_delay: Duration,
    pub auto_min_relative_altitude_m: f64,
    pub observer_altitude_m: f64,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.telemetry.poll_interval,
            sample_timeout: config.telemetry.sample_timeout,
            deactivation_delay: config.activation.deactivation_delay,
            auto_min_relative_altitude_m: config.activation.auto_min_relative_altitude_m,
            observer_altitude_m: config.observer.altitude_m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The sample was tracked (a move may or may not have been sent).
    Tracked,
    /// The sample could not be tracked this cycle.
    Skipped,
    /// No trackable target; deactivation requested if the camera was active.
    Lost,
    /// No new sample yet, still within the sample timeout.
    Waiting,
    /// Mode is off and the camera is parked.
    Idle,
    Finished,
}

/// Drives an [`ActivationStateMachine`] from a position source and a mode
/// source.
pub struct Runner<P, M> {
    camera: ActivationStateMachine,
    positions: P,
    mode: M,
    settings: RunnerSettings,
    last_mode: TrackingMode,
    last_sample_at: Option<Instant>,
    pending_deactivation: Option<DeactivationHandle>,
    shutdown: Arc<AtomicBool>,
}

impl<P, M> Runner<P, M>
where
    P: PositionSource,
    M: ModeSource,
{
    pub fn new(
        camera: ActivationStateMachine,
        positions: P,
        mode: M,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            camera,
            positions,
            mode,
            settings,
            last_mode: TrackingMode::Off,
            last_sample_at: None,
            pending_deactivation: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag makes [`run`](Self::run) deactivate and return.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn camera(&self) -> &ActivationStateMachine {
        &self.camera
    }

    /// Runs until the position source goes away, shutdown is requested or
    /// retries are aborted.
    pub fn run(&mut self) {
        log::info!(
            "control loop started, polling every {}",
            humantime::format_duration(self.settings.poll_interval)
        );
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                log::info!("shutdown requested");
                self.shut_down();
                break;
            }
            let cycle_start = Instant::now();
            match self.step() {
                StepOutcome::Finished => break,
                // Already blocked on the mode source for a poll interval
                StepOutcome::Idle => continue,
                _ => {}
            }
            let elapsed = cycle_start.elapsed();
            if elapsed < self.settings.poll_interval {
                thread::sleep(self.settings.poll_interval - elapsed);
            }
        }
        log::info!("control loop finished");
    }

    pub fn step(&mut self) -> StepOutcome {
        let mode = self.read_mode();

        let sample = match self.positions.poll() {
            Ok(sample) => sample,
            Err(SourceError::Unavailable(reason)) => {
                log::info!("position source unavailable: {}", reason);
                return self.shut_down();
            }
            Err(e) => {
                log::warn!("position source error: {}", e);
                None
            }
        };
        if sample.is_some() {
            self.last_sample_at = Some(Instant::now());
        }

        if mode == TrackingMode::Off {
            if self.camera.state() == ActivationState::Inactive {
                match self.mode.wait_for_change(self.settings.poll_interval) {
                    Ok(Some(mode)) => log::debug!("mode changed to {}", mode),
                    Ok(None) => {}
                    Err(e) => log::warn!("mode source error: {}", e),
                }
                return StepOutcome::Idle;
            }
            return self.lose_track();
        }

        match sample {
            Some(sample) if self.is_trackable(mode, &sample) => self.track(&sample),
            Some(sample) => {
                log::debug!(
                    "target at {:.1} m not trackable in {} mode",
                    sample.altitude_m,
                    mode
                );
                self.lose_track()
            }
            None if self.sample_timed_out() => self.lose_track(),
            None => StepOutcome::Waiting,
        }
    }

    fn read_mode(&mut self) -> TrackingMode {
        match self.mode.current() {
            Ok(mode) => {
                if mode != self.last_mode {
                    log::info!("tracking mode is {}", mode);
                    self.last_mode = mode;
                }
                mode
            }
            Err(e) => {
                log::warn!("mode source error, keeping {}: {}", self.last_mode, e);
                self.last_mode
            }
        }
    }

    fn is_trackable(&self, mode: TrackingMode, sample: &TargetSample) -> bool {
        match mode {
            TrackingMode::Off => false,
            TrackingMode::On => true,
            TrackingMode::Auto => {
                sample.altitude_m - self.settings.observer_altitude_m
                    > self.settings.auto_min_relative_altitude_m
            }
        }
    }

    fn sample_timed_out(&self) -> bool {
        match self.last_sample_at {
            Some(at) => at.elapsed() > self.settings.sample_timeout,
            None => true,
        }
    }

    fn track(&mut self, sample: &TargetSample) -> StepOutcome {
        let scheduled = self.pending_deactivation.take();
        if self.camera.state() == ActivationState::Deactivating {
            let canceled = match scheduled {
                Some(handle) => handle.cancel(),
                None => self.camera.cancel_pending_deactivation(),
            };
            if canceled {
                log::info!("target reacquired, staying active");
            }
        }

        match self.camera.on_trackable(sample) {
            Ok(Some(command)) => {
                log::debug!(
                    "moved to (p, t, z) {:.2}, {:.2}, {}",
                    command.pan_deg,
                    command.tilt_deg,
                    command.zoom_step
                );
                StepOutcome::Tracked
            }
            Ok(None) => StepOutcome::Tracked,
            Err(ActivationError::Aborted(op)) => {
                log::warn!("{} aborted, stopping", op);
                StepOutcome::Finished
            }
            Err(e) => {
                log::warn!("skipping cycle: {}", e);
                StepOutcome::Skipped
            }
        }
    }

    fn lose_track(&mut self) -> StepOutcome {
        if self
            .pending_deactivation
            .as_ref()
            .is_some_and(DeactivationHandle::is_pending)
        {
            return StepOutcome::Lost;
        }
        if self.camera.state() != ActivationState::Active {
            return StepOutcome::Lost;
        }
        log::info!(
            "lost track of target, recording {}",
            self.camera.recording_id().as_deref().unwrap_or("none")
        );
        match self.camera.deactivate(self.settings.deactivation_delay) {
            Ok(Deactivation::Scheduled(handle)) => {
                self.pending_deactivation = Some(handle);
                StepOutcome::Lost
            }
            Ok(Deactivation::Completed) => StepOutcome::Lost,
            Err(ActivationError::Aborted(op)) => {
                log::warn!("{} aborted, stopping", op);
                StepOutcome::Finished
            }
            Err(e) => {
                log::error!("deactivation failed: {}", e);
                StepOutcome::Lost
            }
        }
    }

    fn shut_down(&mut self) -> StepOutcome {
        self.pending_deactivation = None;
        if self.camera.state() != ActivationState::Inactive {
            if let Err(e) = self.camera.deactivate(Duration::ZERO) {
                log::error!("final deactivation failed: {}", e);
            }
        }
        StepOutcome::Finished
    }
}
