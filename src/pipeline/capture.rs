// Capture stage - pulls readings from the pose source into the mailbox
//
// Runs on its own thread. Each read is bounded by the capture timeout so the
// shutdown flag is observed promptly. Consecutive timeouts/bad frames are
// absorbed until `max_consecutive_capture_errors`; a disconnect is fatal at
// once. A fatal fault records itself in the snapshot and closes the mailbox,
// which stops the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{log_pipeline_error, PipelineError};
use crate::pipeline::mailbox::LatestMailbox;
use crate::pipeline::snapshot::PipelineMode;
use crate::pipeline::PipelineShared;
use crate::pose::{PoseReading, PoseSample, PoseSource, PoseSourceError};
use crate::telemetry;

pub(crate) type SourceSlot = Arc<Mutex<Option<Box<dyn PoseSource>>>>;

pub(crate) struct CaptureLoop {
    pub(crate) shared: Arc<PipelineShared>,
    pub(crate) source: SourceSlot,
    pub(crate) mailbox: Arc<LatestMailbox<PoseSample>>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) timeout: Duration,
    pub(crate) max_consecutive_errors: u32,
}

/// What the loop should do after one reading.
#[derive(Debug, PartialEq)]
enum Step {
    Continue,
    Fault(String),
}

/// Consecutive-error bookkeeping, kept apart from the thread for testing.
#[derive(Debug, Default)]
struct ErrorCounter {
    consecutive: u32,
}

impl ErrorCounter {
    fn observe(&mut self, reading: &Result<PoseReading, PoseSourceError>, max: u32) -> Step {
        match reading {
            Ok(PoseReading::Face(sample)) if sample.is_finite() => {
                self.consecutive = 0;
                Step::Continue
            }
            Ok(PoseReading::NoFace) => {
                self.consecutive = 0;
                Step::Continue
            }
            Ok(PoseReading::Face(_)) => self.bump("non-finite pose".to_string(), max),
            Err(PoseSourceError::Disconnected { reason }) => Step::Fault(reason.clone()),
            Err(PoseSourceError::OpenFailed { reason }) => Step::Fault(reason.clone()),
            Err(err) => self.bump(err.to_string(), max),
        }
    }

    fn bump(&mut self, reason: String, max: u32) -> Step {
        self.consecutive += 1;
        if self.consecutive >= max.max(1) {
            Step::Fault(format!(
                "{} consecutive capture failures, last: {}",
                self.consecutive, reason
            ))
        } else {
            Step::Continue
        }
    }
}

impl CaptureLoop {
    pub(crate) fn run(self) {
        let mut source = match self.source.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };

        match source.as_mut() {
            Some(active) => {
                tracing::info!("[Capture] Reading from pose source '{}'", active.name());
                self.read_loop(active.as_mut());
                active.close();
            }
            None => self.fault("pose source missing".to_string(), 0),
        }

        self.mailbox.close();

        if let Some(source) = source {
            match self.source.lock() {
                Ok(mut slot) => *slot = Some(source),
                Err(_) => tracing::error!("[Capture] Source slot poisoned; pose source dropped"),
            }
        }
        tracing::info!("[Capture] Thread exiting");
    }

    fn read_loop(&self, source: &mut dyn PoseSource) {
        let mut errors = ErrorCounter::default();

        while !self.shutdown.load(Ordering::SeqCst) {
            let reading = source.next_reading(self.timeout);

            // Errors raced with stop() are expected
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match errors.observe(&reading, self.max_consecutive_errors) {
                Step::Continue => {}
                Step::Fault(reason) => {
                    self.fault(reason, errors.consecutive);
                    return;
                }
            }

            match reading {
                Ok(PoseReading::Face(sample)) if sample.is_finite() => {
                    self.mailbox.post(sample);
                }
                Ok(PoseReading::NoFace) => tracing::trace!("[Capture] No face"),
                Ok(PoseReading::Face(_)) => tracing::debug!("[Capture] Dropped non-finite pose"),
                Err(err) => tracing::debug!(
                    "[Capture] Transient failure {}/{}: {}",
                    errors.consecutive,
                    self.max_consecutive_errors,
                    err
                ),
            }
        }
    }

    fn fault(&self, reason: String, consecutive: u32) {
        let err = PipelineError::CameraUnavailable {
            reason: reason.clone(),
        };
        log_pipeline_error(&err, "capture");
        telemetry::hub().record_capture_fault(consecutive, reason.clone());

        self.shared.update_snapshot(|snapshot| {
            snapshot.mode = PipelineMode::Stopped;
            snapshot.angles = None;
            snapshot.last_fault = Some(reason);
        });
    }
}
