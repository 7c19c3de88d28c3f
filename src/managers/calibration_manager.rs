// CalibrationManager: Focused manager for the calibration wizard session
//
// Single Responsibility: owning the optional wizard and serializing every
// transition so commits reach the config store in the order they were made.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::calibration::{
    CalibrationProgress, CalibrationSet, CalibrationWizard, StepDurations, WizardEvent,
    WizardInput,
};
use crate::error::{log_calibration_error, CalibrationError};

/// Result of feeding one input to the wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardOutcome {
    pub events: Vec<WizardEvent>,
    /// Progress after the transition, `None` if no session exists
    pub progress: Option<CalibrationProgress>,
    /// The session reached `Complete` or `Cancelled` and was released
    pub finished: bool,
}

impl WizardOutcome {
    fn idle() -> Self {
        Self {
            events: Vec::new(),
            progress: None,
            finished: false,
        }
    }
}

/// Manages the calibration wizard lifecycle
///
/// The wizard lives in `Some` only while a session is active. Callers pass an
/// `apply` closure that runs while the session lock is still held; the worker
/// thread and the control surface both drive the wizard, and applying inside
/// the lock keeps commit order intact.
///
/// # Example
/// ```ignore
/// let manager = CalibrationManager::new(StepDurations::default());
/// manager.start(current_calibration, now, |outcome| publish(outcome))?;
/// manager.handle(WizardInput::Sample(sample), now, |outcome| publish(outcome))?;
/// ```
pub struct CalibrationManager {
    session: Arc<Mutex<Option<CalibrationWizard>>>,
    durations: Mutex<StepDurations>,
}

impl CalibrationManager {
    pub fn new(durations: StepDurations) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            durations: Mutex::new(durations),
        }
    }

    /// Step durations used by the next session.
    pub fn set_durations(&self, durations: StepDurations) -> Result<(), CalibrationError> {
        let mut guard = self
            .durations
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)?;
        *guard = durations;
        Ok(())
    }

    /// Start a session seeded with the currently published calibration.
    ///
    /// # Errors
    /// - `AlreadyCalibrating` if a session is active
    /// - `StatePoisoned` on lock poisoning
    pub fn start<R>(
        &self,
        initial: CalibrationSet,
        now: Instant,
        apply: impl FnOnce(&WizardOutcome) -> R,
    ) -> Result<R, CalibrationError> {
        let durations = *self
            .durations
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)?;
        let mut session = self.lock_session()?;

        if session.is_some() {
            let err = CalibrationError::AlreadyCalibrating;
            log_calibration_error(&err, "start_calibration");
            return Err(err);
        }

        let mut wizard = CalibrationWizard::new(durations, initial);
        let events = wizard.handle(WizardInput::Start(now))?;
        *session = Some(wizard);

        let outcome = Self::settle(&mut session, events, now);
        Ok(apply(&outcome))
    }

    /// Feed one input to the active session.
    ///
    /// Samples and ticks without a session are ignored; `Next`/`Skip`
    /// without a session fail with `NotCalibrating`.
    pub fn handle<R>(
        &self,
        input: WizardInput,
        now: Instant,
        apply: impl FnOnce(&WizardOutcome) -> R,
    ) -> Result<R, CalibrationError> {
        let mut session = self.lock_session()?;

        let events = match session.as_mut() {
            Some(wizard) => wizard.handle(input)?,
            None => match input {
                WizardInput::Next(_) | WizardInput::Skip(_) => {
                    return Err(CalibrationError::NotCalibrating)
                }
                _ => return Ok(apply(&WizardOutcome::idle())),
            },
        };

        let outcome = Self::settle(&mut session, events, now);
        Ok(apply(&outcome))
    }

    /// Cancel the active session, if any.
    ///
    /// # Returns
    /// `Ok(None)` when nothing was running.
    pub fn cancel<R>(
        &self,
        now: Instant,
        apply: impl FnOnce(&WizardOutcome) -> R,
    ) -> Result<Option<R>, CalibrationError> {
        let mut session = self.lock_session()?;
        let events = match session.as_mut() {
            Some(wizard) => wizard.handle(WizardInput::Cancel)?,
            None => return Ok(None),
        };
        let outcome = Self::settle(&mut session, events, now);
        Ok(Some(apply(&outcome)))
    }

    /// Run `edit` with the session locked, then rebase the wizard's working
    /// copy onto the calibration it returns. Keeps manual edits from being
    /// overwritten by later wizard commits.
    pub fn rebase_with<E>(
        &self,
        edit: impl FnOnce() -> Result<CalibrationSet, E>,
    ) -> Result<Result<CalibrationSet, E>, CalibrationError> {
        let mut session = self.lock_session()?;
        let result = edit();
        if let (Ok(calibration), Some(wizard)) = (&result, session.as_mut()) {
            wizard.rebase(*calibration);
        }
        Ok(result)
    }

    pub fn is_active(&self) -> bool {
        self.lock_session()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    pub fn progress(&self, now: Instant) -> Option<CalibrationProgress> {
        self.lock_session()
            .ok()
            .and_then(|session| session.as_ref().and_then(|wizard| wizard.progress(now)))
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn lock_session(
        &self,
    ) -> Result<MutexGuard<'_, Option<CalibrationWizard>>, CalibrationError> {
        self.session
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    /// Compute progress and release the wizard once it has finished.
    fn settle(
        session: &mut Option<CalibrationWizard>,
        events: Vec<WizardEvent>,
        now: Instant,
    ) -> WizardOutcome {
        let progress = session.as_ref().and_then(|wizard| wizard.progress(now));
        let finished = session
            .as_ref()
            .map(|wizard| !wizard.is_active())
            .unwrap_or(false);
        if finished {
            *session = None;
        }
        WizardOutcome {
            events,
            progress,
            finished,
        }
    }
}

impl Default for CalibrationManager {
    fn default() -> Self {
        Self::new(StepDurations::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{AxisCalibration, CalibrationStep};
    use crate::pose::PoseSample;
    use std::time::Duration;

    fn default_set() -> CalibrationSet {
        CalibrationSet::new(
            AxisCalibration::default(),
            AxisCalibration::default(),
            AxisCalibration::default(),
        )
    }

    #[test]
    fn test_start_opens_session_at_neutral() {
        let manager = CalibrationManager::default();
        let now = Instant::now();

        let progress = manager
            .start(default_set(), now, |outcome| outcome.progress.clone())
            .unwrap()
            .unwrap();

        assert!(manager.is_active());
        assert_eq!(progress.current_step, Some(CalibrationStep::Neutral));
        assert_eq!(progress.remaining_ms, 6000);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let manager = CalibrationManager::default();
        let now = Instant::now();
        manager.start(default_set(), now, |_| ()).unwrap();

        let result = manager.start(default_set(), now, |_| ());
        assert_eq!(result, Err(CalibrationError::AlreadyCalibrating));
    }

    #[test]
    fn test_next_without_session() {
        let manager = CalibrationManager::default();
        let result = manager.handle(WizardInput::Next(Instant::now()), Instant::now(), |_| ());
        assert_eq!(result, Err(CalibrationError::NotCalibrating));
    }

    #[test]
    fn test_samples_without_session_are_ignored() {
        let manager = CalibrationManager::default();
        let sample = PoseSample::now(1.0, 2.0, 3.0);
        let events = manager
            .handle(WizardInput::Sample(sample), Instant::now(), |outcome| {
                outcome.events.len()
            })
            .unwrap();
        assert_eq!(events, 0);
    }

    #[test]
    fn test_cancel_releases_session() {
        let manager = CalibrationManager::default();
        let now = Instant::now();
        manager.start(default_set(), now, |_| ()).unwrap();

        let finished = manager.cancel(now, |outcome| outcome.finished).unwrap();
        assert_eq!(finished, Some(true));
        assert!(!manager.is_active());
        assert_eq!(manager.cancel(now, |_| ()).unwrap(), None);
    }

    #[test]
    fn test_session_released_after_last_step() {
        let manager = CalibrationManager::new(StepDurations {
            neutral: Duration::from_millis(10),
            directional: Duration::from_millis(10),
        });
        let now = Instant::now();
        manager.start(default_set(), now, |_| ()).unwrap();

        let mut finished = false;
        for _ in 0..CalibrationStep::COUNT {
            finished = manager
                .handle(WizardInput::Skip(now), now, |outcome| outcome.finished)
                .unwrap();
        }

        assert!(finished);
        assert!(!manager.is_active());
        assert!(manager.progress(now).is_none());
    }

    #[test]
    fn test_rebase_updates_working_copy() {
        let manager = CalibrationManager::default();
        let now = Instant::now();
        manager.start(default_set(), now, |_| ()).unwrap();

        let mut edited = default_set();
        edited.pitch = AxisCalibration::new(0.0, -10.0, 10.0).unwrap();
        let result = manager
            .rebase_with(|| Ok::<_, CalibrationError>(edited))
            .unwrap();
        assert!(result.is_ok());

        let session = manager.lock_session().unwrap();
        let pitch_max = session.as_ref().map(|wizard| wizard.calibration().pitch.max_extent);
        assert_eq!(pitch_max, Some(10.0));
    }
}
