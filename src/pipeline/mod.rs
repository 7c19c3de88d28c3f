//! Pipeline coordinator: capture, calibration/mapping and MIDI dispatch.
//!
//! Two threads per run. The capture thread reads the pose source and posts
//! samples into a single-slot drop-latest mailbox; the worker thread takes
//! the newest sample and hands it to exactly one consumer, the calibration
//! wizard while a session is open or the three axis mappers otherwise. The
//! coordinator exposes the control surface and a torn-free snapshot.
//!
//! ```text
//! Stopped --start--> Running --start_calibration--> Calibrating
//!    ^                  ^                                |
//!    |                  +------(complete | cancel)-------+
//!    +------stop (cancels any session first)------------ *
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};

use tokio::sync::broadcast;

use crate::axis::{Axis, PerAxis, RangeBound};
use crate::calibration::{AxisCalibration, CalibrationProgress, WizardInput};
use crate::config::{calibration_of, AppConfig, AxesConfig, AxisRuntimeConfig};
use crate::error::{
    log_calibration_error, log_pipeline_error, CalibrationError, PipelineError,
};
use crate::managers::{BroadcastChannelManager, CalibrationManager};
use crate::mapping::{MappedValue, SmoothingAlpha};
use crate::midi::MidiEmitter;
use crate::pose::{PoseSample, PoseSource};
use crate::telemetry::{self, LifecyclePhase};

pub mod capture;
pub mod config_store;
pub mod mailbox;
pub mod snapshot;
pub mod time;
pub mod worker;

pub use config_store::ConfigStore;
pub use mailbox::{LatestMailbox, Take};
pub use snapshot::{PipelineMode, PipelineSnapshot};
pub use time::{StubTimeSource, SystemTimeSource, TimeSource};

use capture::{CaptureLoop, SourceSlot};
use worker::{apply_outcome, PipelineWorker};

/// State shared between the coordinator and its threads.
pub(crate) struct PipelineShared {
    pub(crate) store: ConfigStore,
    pub(crate) calibration: CalibrationManager,
    pub(crate) broadcasts: BroadcastChannelManager,
    pub(crate) emitter: Mutex<Box<dyn MidiEmitter>>,
    pub(crate) time: Arc<dyn TimeSource>,
    snapshot: RwLock<PipelineSnapshot>,
}

impl PipelineShared {
    /// Mutate the snapshot under its single write lock.
    pub(crate) fn update_snapshot(&self, update: impl FnOnce(&mut PipelineSnapshot)) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut guard);
    }

    fn read_snapshot(&self) -> PipelineSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Threads and channels of one run.
struct RunHandles {
    shutdown: Arc<AtomicBool>,
    mailbox: Arc<LatestMailbox<PoseSample>>,
    capture: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl RunHandles {
    fn join(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.mailbox.close();
        if self.worker.join().is_err() {
            tracing::error!("[Coordinator] Worker thread panicked");
        }
        if self.capture.join().is_err() {
            tracing::error!("[Coordinator] Capture thread panicked");
        }
    }
}

/// Owns the pipeline and exposes the control surface to the UI layer.
pub struct Coordinator {
    shared: Arc<PipelineShared>,
    source: SourceSlot,
    settings: RwLock<AppConfig>,
    run: Mutex<Option<RunHandles>>,
}

impl Coordinator {
    /// Create a stopped coordinator.
    ///
    /// # Errors
    /// `PipelineError::Config` if `config` does not validate.
    pub fn new(
        config: AppConfig,
        source: Box<dyn PoseSource>,
        emitter: Box<dyn MidiEmitter>,
    ) -> Result<Self, PipelineError> {
        Self::with_time_source(config, source, emitter, Arc::new(SystemTimeSource::default()))
    }

    /// Like [`Coordinator::new`] with an explicit clock for wizard deadlines.
    pub fn with_time_source(
        config: AppConfig,
        source: Box<dyn PoseSource>,
        emitter: Box<dyn MidiEmitter>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, PipelineError> {
        config.validate().inspect_err(|err| {
            tracing::error!("[Coordinator] Rejected configuration: {}", err);
        })?;

        tracing::info!(
            "[Coordinator] Created with source '{}' and emitter '{}'",
            source.name(),
            emitter.name()
        );

        let shared = PipelineShared {
            store: ConfigStore::new(config.axes),
            calibration: CalibrationManager::new(config.calibration.step_durations()),
            broadcasts: BroadcastChannelManager::new(),
            emitter: Mutex::new(emitter),
            time,
            snapshot: RwLock::new(PipelineSnapshot::default()),
        };

        Ok(Self {
            shared: Arc::new(shared),
            source: Arc::new(Mutex::new(Some(source))),
            settings: RwLock::new(config),
            run: Mutex::new(None),
        })
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Open the pose source and spawn the capture and worker threads.
    ///
    /// # Errors
    /// - `AlreadyRunning` if a run is active
    /// - `CameraUnavailable` if the source cannot be opened; stays Stopped
    /// - `WorkerSpawnFailed` if a thread cannot be spawned
    pub fn start(&self) -> Result<(), PipelineError> {
        let mut run = self.lock_run()?;
        self.reap_faulted(&mut run);
        if run.is_some() {
            let err = PipelineError::AlreadyRunning;
            log_pipeline_error(&err, "start");
            return Err(err);
        }

        let settings = self.config()?;
        self.open_source()?;

        let alpha = SmoothingAlpha::new(settings.pipeline.smoothing_alpha).unwrap_or_default();
        if let Err(err) = self
            .shared
            .calibration
            .set_durations(settings.calibration.step_durations())
        {
            log_calibration_error(&err, "start");
        }

        telemetry::hub().reset_frame_drops();
        self.shared.update_snapshot(|snapshot| {
            *snapshot = PipelineSnapshot {
                mode: PipelineMode::Running,
                ..PipelineSnapshot::default()
            };
        });

        let mailbox = Arc::new(LatestMailbox::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = PipelineWorker::new(
            Arc::clone(&self.shared),
            Arc::clone(&mailbox),
            Arc::clone(&shutdown),
            alpha,
            settings.pipeline.idle_tick(),
        );
        let worker_handle = match thread::Builder::new()
            .name("face-midi-worker".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.abort_start(err.to_string())),
        };

        let capture = CaptureLoop {
            shared: Arc::clone(&self.shared),
            source: Arc::clone(&self.source),
            mailbox: Arc::clone(&mailbox),
            shutdown: Arc::clone(&shutdown),
            timeout: settings.pipeline.capture_timeout(),
            max_consecutive_errors: settings.pipeline.max_consecutive_capture_errors,
        };
        let capture_handle = match thread::Builder::new()
            .name("face-midi-capture".to_string())
            .spawn(move || capture.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                shutdown.store(true, Ordering::SeqCst);
                mailbox.close();
                let _ = worker_handle.join();
                return Err(self.abort_start(err.to_string()));
            }
        };

        *run = Some(RunHandles {
            shutdown,
            mailbox,
            capture: capture_handle,
            worker: worker_handle,
        });

        telemetry::hub().record_lifecycle(LifecyclePhase::PipelineStarted);
        tracing::info!("[Coordinator] Pipeline started");
        Ok(())
    }

    /// Cancel any calibration session, then stop and join both threads.
    ///
    /// Stopping a stopped pipeline is a no-op.
    pub fn stop(&self) -> Result<(), PipelineError> {
        let mut run = self.lock_run()?;
        let Some(handles) = run.take() else {
            tracing::debug!("[Coordinator] stop() while already stopped");
            return Ok(());
        };

        let shared = &self.shared;
        if let Err(err) = shared
            .calibration
            .cancel(shared.time.now(), |outcome| apply_outcome(shared, outcome))
        {
            log_calibration_error(&err, "stop");
        }

        handles.join();

        self.shared.update_snapshot(|snapshot| {
            snapshot.mode = PipelineMode::Stopped;
            snapshot.angles = None;
            snapshot.midi_values = PerAxis::default();
            snapshot.calibration = None;
        });

        telemetry::hub().record_lifecycle(LifecyclePhase::PipelineStopped);
        tracing::info!("[Coordinator] Pipeline stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        match self.run.lock() {
            Ok(mut run) => {
                self.reap_faulted(&mut run);
                run.is_some()
            }
            Err(_) => false,
        }
    }

    pub fn mode(&self) -> PipelineMode {
        self.snapshot().mode
    }

    /// Current state for display. A run that ended on a capture fault is
    /// reaped here, so the returned mode is `Stopped` with `last_fault` set.
    pub fn snapshot(&self) -> PipelineSnapshot {
        if let Ok(mut run) = self.run.lock() {
            self.reap_faulted(&mut run);
        }
        let mut snapshot = self.shared.read_snapshot();
        if let Some(progress) = self.shared.calibration.progress(self.shared.time.now()) {
            snapshot.calibration = Some(progress);
        }
        snapshot
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Open a wizard session seeded with the published calibration.
    ///
    /// # Errors
    /// - `NotRunning` while Stopped
    /// - `AlreadyCalibrating` if a session is open
    pub fn start_calibration(&self) -> Result<(), CalibrationError> {
        let mut run = self.run.lock().map_err(|_| CalibrationError::StatePoisoned)?;
        self.reap_faulted(&mut run);
        if run.is_none() {
            let err = CalibrationError::NotRunning;
            log_calibration_error(&err, "start_calibration");
            return Err(err);
        }

        let axes = self
            .shared
            .store
            .load()
            .map_err(|_| CalibrationError::StatePoisoned)?;
        let shared = &self.shared;
        shared
            .calibration
            .start(calibration_of(&axes), shared.time.now(), |outcome| {
                shared.update_snapshot(|snapshot| snapshot.mode = PipelineMode::Calibrating);
                telemetry::hub().record_lifecycle(LifecyclePhase::CalibrationStarted);
                apply_outcome(shared, outcome);
            })
    }

    /// Cancel the open session; steps already committed stay applied.
    pub fn cancel_calibration(&self) -> Result<(), CalibrationError> {
        let shared = &self.shared;
        match shared
            .calibration
            .cancel(shared.time.now(), |outcome| apply_outcome(shared, outcome))?
        {
            Some(()) => Ok(()),
            None => {
                let err = CalibrationError::NotCalibrating;
                log_calibration_error(&err, "cancel_calibration");
                Err(err)
            }
        }
    }

    /// Leave the current step without committing it.
    pub fn skip_calibration_step(&self) -> Result<(), CalibrationError> {
        let now = self.shared.time.now();
        self.drive_wizard(WizardInput::Skip(now), "skip_calibration_step")
    }

    /// Commit the current step early and advance.
    pub fn next_calibration_step(&self) -> Result<(), CalibrationError> {
        let now = self.shared.time.now();
        self.drive_wizard(WizardInput::Next(now), "next_calibration_step")
    }

    // ========================================================================
    // AXIS EDITS
    // ========================================================================

    /// Set one bound of an axis range (neutral-relative degrees).
    ///
    /// # Errors
    /// `InvalidExtent` if the edit would break `min < max`; nothing changes.
    pub fn set_axis_range(
        &self,
        axis: Axis,
        bound: RangeBound,
        value: f64,
    ) -> Result<(), CalibrationError> {
        self.edit_calibration("set_axis_range", |axes| {
            let mut next = *axes;
            next[axis].calibration = axes[axis].calibration.with_extent(bound, value)?;
            Ok(next)
        })
    }

    /// Use the current neutral-relative angle of `axis` as its min or max.
    pub fn set_axis_range_from_current(
        &self,
        axis: Axis,
        bound: RangeBound,
    ) -> Result<(), CalibrationError> {
        let raw = self.current_angles("set_axis_range_from_current")?[axis];
        self.edit_calibration("set_axis_range_from_current", |axes| {
            let calibration = axes[axis].calibration;
            let mut next = *axes;
            next[axis].calibration = calibration.with_extent(bound, calibration.relative(raw))?;
            Ok(next)
        })
    }

    /// Make the current raw pose the neutral offset of every axis.
    pub fn set_zero_position(&self) -> Result<(), CalibrationError> {
        let raw = self.current_angles("set_zero_position")?;
        self.edit_calibration("set_zero_position", |axes| {
            Ok(axes.map(|axis, config| AxisRuntimeConfig {
                calibration: AxisCalibration {
                    neutral_offset: raw[axis],
                    ..config.calibration
                },
                ..*config
            }))
        })
    }

    /// Replace one axis's configuration; takes effect on the next sample.
    pub fn update_axis_config(
        &self,
        axis: Axis,
        config: AxisRuntimeConfig,
    ) -> Result<(), PipelineError> {
        config.validate().inspect_err(|err| {
            tracing::warn!("[Coordinator] Rejected {} config: {}", axis, err);
        })?;
        self.edit_axes(|axes| axes[axis] = config)?;
        tracing::info!("[Coordinator] Updated {} config", axis);
        Ok(())
    }

    /// Restore factory defaults for one axis, including its calibration.
    pub fn reset_axis(&self, axis: Axis) -> Result<(), PipelineError> {
        self.update_axis_config(axis, AxisRuntimeConfig::default_for(axis))
    }

    pub fn axes_config(&self) -> Result<Arc<AxesConfig>, PipelineError> {
        self.shared.store.load()
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Full configuration with the currently published axes.
    pub fn config(&self) -> Result<AppConfig, PipelineError> {
        let mut config = self
            .settings
            .read()
            .map_err(|_| PipelineError::LockPoisoned {
                component: "Settings".to_string(),
            })?
            .clone();
        config.axes = *self.shared.store.load()?;
        Ok(config)
    }

    /// Apply a whole configuration. Axes take effect immediately; pipeline
    /// and camera settings on the next `start()`.
    pub fn apply_config(&self, config: AppConfig) -> Result<(), PipelineError> {
        config.validate()?;
        let axes = config.axes;
        self.edit_axes(|current| *current = axes)?;
        if let Err(err) = self
            .shared
            .calibration
            .set_durations(config.calibration.step_durations())
        {
            log_calibration_error(&err, "apply_config");
        }
        let mut settings = self
            .settings
            .write()
            .map_err(|_| PipelineError::LockPoisoned {
                component: "Settings".to_string(),
            })?;
        *settings = config;
        Ok(())
    }

    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let config = AppConfig::try_load_from_file(&path).inspect_err(|err| {
            tracing::warn!("[Coordinator] Could not load {:?}: {}", path.as_ref(), err);
        })?;
        self.apply_config(config)
    }

    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        self.config()?.save_to_file(path)?;
        Ok(())
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_calibration(&self) -> broadcast::Receiver<CalibrationProgress> {
        self.shared.broadcasts.subscribe_calibration()
    }

    pub fn subscribe_mapped(&self) -> broadcast::Receiver<MappedValue> {
        self.shared.broadcasts.subscribe_mapped()
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn lock_run(&self) -> Result<MutexGuard<'_, Option<RunHandles>>, PipelineError> {
        self.run.lock().map_err(|_| PipelineError::LockPoisoned {
            component: "Coordinator".to_string(),
        })
    }

    /// Join the threads of a run whose capture stage ended on its own.
    fn reap_faulted(&self, run: &mut Option<RunHandles>) {
        let finished = run
            .as_ref()
            .map(|handles| handles.capture.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }
        if let Some(handles) = run.take() {
            handles.join();
            self.shared.update_snapshot(|snapshot| {
                snapshot.mode = PipelineMode::Stopped;
                snapshot.angles = None;
            });
            telemetry::hub().record_lifecycle(LifecyclePhase::PipelineStopped);
            tracing::warn!("[Coordinator] Pipeline stopped after capture fault");
        }
    }

    fn open_source(&self) -> Result<(), PipelineError> {
        let mut slot = self.source.lock().map_err(|_| PipelineError::LockPoisoned {
            component: "PoseSource".to_string(),
        })?;
        let source = slot.as_mut().ok_or_else(|| PipelineError::CameraUnavailable {
            reason: "pose source lost after a capture thread panic".to_string(),
        })?;
        source.open().map_err(|err| {
            let err = PipelineError::CameraUnavailable {
                reason: err.to_string(),
            };
            log_pipeline_error(&err, "start");
            err
        })
    }

    fn abort_start(&self, reason: String) -> PipelineError {
        if let Ok(mut slot) = self.source.lock() {
            if let Some(source) = slot.as_mut() {
                source.close();
            }
        }
        self.shared
            .update_snapshot(|snapshot| snapshot.mode = PipelineMode::Stopped);
        let err = PipelineError::WorkerSpawnFailed { reason };
        log_pipeline_error(&err, "start");
        err
    }

    fn drive_wizard(&self, input: WizardInput, context: &str) -> Result<(), CalibrationError> {
        let shared = &self.shared;
        shared
            .calibration
            .handle(input, shared.time.now(), |outcome| apply_outcome(shared, outcome))
            .inspect_err(|err| log_calibration_error(err, context))
    }

    /// Latest raw pose, required by the "use current pose" edits.
    fn current_angles(&self, context: &str) -> Result<PerAxis<f64>, CalibrationError> {
        self.shared.read_snapshot().angles.ok_or_else(|| {
            let err = CalibrationError::NotRunning;
            log_calibration_error(&err, context);
            err
        })
    }

    /// Calibration edit under the session lock, so an open wizard rebases
    /// onto the result instead of overwriting it with a later commit.
    fn edit_calibration(
        &self,
        context: &str,
        edit: impl FnOnce(&AxesConfig) -> Result<AxesConfig, CalibrationError>,
    ) -> Result<(), CalibrationError> {
        let store = &self.shared.store;
        self.shared
            .calibration
            .rebase_with(|| {
                let current = store.load().map_err(|_| CalibrationError::StatePoisoned)?;
                let next = edit(current.as_ref())?;
                store.publish(next).map_err(|err| {
                    log_pipeline_error(&err, context);
                    CalibrationError::StatePoisoned
                })?;
                Ok(calibration_of(&next))
            })?
            .map(|_| ())
            .inspect_err(|err| log_calibration_error(err, context))
    }

    fn edit_axes(&self, edit: impl FnOnce(&mut AxesConfig)) -> Result<(), PipelineError> {
        let store = &self.shared.store;
        self.shared
            .calibration
            .rebase_with(|| {
                store
                    .update(|axes| {
                        edit(axes);
                        Ok(())
                    })
                    .map(|axes| calibration_of(&axes))
            })
            .map_err(|_| PipelineError::LockPoisoned {
                component: "CalibrationManager".to_string(),
            })??;
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log_pipeline_error(&err, "drop");
        }
        if let Ok(mut emitter) = self.shared.emitter.lock() {
            emitter.close();
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
