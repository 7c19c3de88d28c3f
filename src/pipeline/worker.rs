// Worker stage - calibration or mapping for every sample, MIDI dispatch
//
// Each sample goes to exactly one consumer: the wizard while a session is
// open, otherwise the three mappers. The worker also ticks the wizard when the
// mailbox stays empty so step deadlines fire without samples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::calibration::{WizardEvent, WizardInput};
use crate::error::log_pipeline_error;
use crate::managers::WizardOutcome;
use crate::mapping::{MapperBank, MappedValue, SmoothingAlpha};
use crate::pipeline::mailbox::{LatestMailbox, Take};
use crate::pipeline::snapshot::PipelineMode;
use crate::pipeline::PipelineShared;
use crate::pose::PoseSample;
use crate::telemetry::{self, CalibrationWarningKind, LifecyclePhase};

pub(crate) struct PipelineWorker {
    shared: Arc<PipelineShared>,
    mailbox: Arc<LatestMailbox<PoseSample>>,
    shutdown: Arc<AtomicBool>,
    mappers: MapperBank,
    alpha: SmoothingAlpha,
    idle_tick: Duration,
    samples_processed: u64,
}

impl PipelineWorker {
    pub(crate) fn new(
        shared: Arc<PipelineShared>,
        mailbox: Arc<LatestMailbox<PoseSample>>,
        shutdown: Arc<AtomicBool>,
        alpha: SmoothingAlpha,
        idle_tick: Duration,
    ) -> Self {
        Self {
            shared,
            mailbox,
            shutdown,
            mappers: MapperBank::new(),
            alpha,
            idle_tick,
            samples_processed: 0,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::info!(
            "[Worker] Starting (alpha {:.2}, idle tick {:?})",
            self.alpha.value(),
            self.idle_tick
        );

        loop {
            match self.mailbox.take_timeout(self.idle_tick) {
                Take::Item(sample) => self.process_sample(sample),
                Take::Timeout => self.tick(),
                Take::Closed => break,
            }
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
        }

        // Capture faulted (or stop raced us): no step may stay half-collected
        let now = self.shared.time.now();
        let shared = Arc::clone(&self.shared);
        if let Err(err) = self
            .shared
            .calibration
            .cancel(now, |outcome| apply_outcome(&shared, outcome))
        {
            tracing::warn!("[Worker] Failed to cancel calibration on exit: {}", err);
        }

        tracing::info!(
            "[Worker] Exiting after {} samples",
            self.samples_processed
        );
    }

    fn process_sample(&mut self, sample: PoseSample) {
        self.samples_processed += 1;

        // Expire the current step first; a late sample belongs to the next one
        let now = self.shared.time.now();
        self.drive(WizardInput::Tick(now), now);
        if !self.drive(WizardInput::Sample(sample), now) {
            self.map_and_send(&sample);
        }

        let dropped = self.mailbox.dropped();
        let values = self.mappers.values();
        let samples_processed = self.samples_processed;
        self.shared.update_snapshot(|snapshot| {
            snapshot.angles = Some(sample.angles());
            snapshot.midi_values = values;
            snapshot.samples_processed = samples_processed;
            snapshot.frames_dropped = dropped;
        });

        let hub = telemetry::hub();
        hub.record_frames_dropped(dropped);
        hub.record_latency(Instant::now().saturating_duration_since(sample.timestamp));
    }

    fn tick(&mut self) {
        let now = self.shared.time.now();
        self.drive(WizardInput::Tick(now), now);
    }

    /// Feed the wizard; returns whether a session consumed the input.
    fn drive(&self, input: WizardInput, now: Instant) -> bool {
        let shared = &self.shared;
        match shared.calibration.handle(input, now, |outcome| {
            apply_outcome(shared, outcome);
            outcome.progress.is_some()
        }) {
            Ok(consumed) => consumed,
            Err(err) => {
                tracing::warn!("[Worker] Wizard rejected {:?}: {}", input, err);
                false
            }
        }
    }

    fn map_and_send(&mut self, sample: &PoseSample) {
        let axes = match self.shared.store.load() {
            Ok(axes) => axes,
            Err(err) => {
                log_pipeline_error(&err, "map_sample");
                return;
            }
        };

        let values = self.mappers.process(sample, &axes, self.alpha);
        if values.is_empty() {
            return;
        }

        let mut emitter = match self.shared.emitter.lock() {
            Ok(emitter) => emitter,
            Err(_) => {
                tracing::error!("[Worker] MIDI emitter lock poisoned");
                return;
            }
        };

        for value in values {
            match emitter.send_cc(value.channel, value.cc_number, value.value) {
                Ok(()) => self.publish(value),
                Err(err) => {
                    self.mappers.mark_send_failed(value.axis);
                    tracing::warn!(
                        "[Worker] {} send failed on {}: {}",
                        value.axis,
                        emitter.name(),
                        err
                    );
                    telemetry::hub().record_midi_send_failed(value.axis, err.to_string());
                }
            }
        }
    }

    fn publish(&self, value: MappedValue) {
        tracing::trace!(
            "[Worker] CC ch{} #{} = {} ({})",
            value.channel,
            value.cc_number,
            value.value,
            value.axis
        );
        self.shared.broadcasts.publish_mapped(value);
    }
}

/// Apply a wizard transition to the rest of the pipeline.
///
/// Runs under the calibration session lock: commits are written to the config
/// store in order, progress is published, and the mode follows the session.
pub(crate) fn apply_outcome(shared: &PipelineShared, outcome: &WizardOutcome) {
    let hub = telemetry::hub();

    for event in &outcome.events {
        match event {
            WizardEvent::Advanced { step } => {
                tracing::info!("[Calibration] Step {}: {}", step.index() + 1, step.instruction());
            }
            WizardEvent::StepCommitted(commit) => {
                let result = shared.store.update(|axes| {
                    for &axis in &commit.changed {
                        axes[axis].calibration = commit.calibration[axis];
                    }
                    Ok(())
                });
                match result {
                    Ok(_) => tracing::info!(
                        "[Calibration] {} committed for {:?}",
                        commit.step.display_name(),
                        commit.changed
                    ),
                    Err(err) => log_pipeline_error(&err, "commit_calibration_step"),
                }
            }
            WizardEvent::StepSkipped { step } => {
                tracing::info!("[Calibration] {} skipped", step.display_name());
            }
            WizardEvent::NoSamplesCollected { step } => {
                tracing::warn!(
                    "[Calibration] No samples collected during {}",
                    step.display_name()
                );
                hub.record_calibration_warning(*step, CalibrationWarningKind::NoSamplesCollected);
            }
            WizardEvent::ExtentRejected { step, error } => {
                tracing::warn!(
                    "[Calibration] {} rejected: {}",
                    step.display_name(),
                    error
                );
                hub.record_calibration_warning(*step, CalibrationWarningKind::InvalidExtent);
            }
            WizardEvent::Completed => {
                tracing::info!("[Calibration] Complete");
                hub.record_lifecycle(LifecyclePhase::CalibrationCompleted);
            }
            WizardEvent::Cancelled => {
                tracing::info!("[Calibration] Cancelled");
                hub.record_lifecycle(LifecyclePhase::CalibrationCancelled);
            }
        }
    }

    let progress = outcome.progress.clone();
    let finished = outcome.finished;
    shared.update_snapshot(|snapshot| {
        if progress.is_some() {
            snapshot.calibration = progress.clone();
        }
        if finished && snapshot.mode == PipelineMode::Calibrating {
            snapshot.mode = PipelineMode::Running;
        }
    });

    if !outcome.events.is_empty() {
        if let Some(progress) = outcome.progress.clone() {
            shared.broadcasts.publish_calibration(progress);
        }
    }
}
