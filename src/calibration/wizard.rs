// CalibrationWizard - timed, skippable calibration script
//
// Explicit tagged state driven by one transition function:
//
//   Idle --Start--> Step(0) --Tick(deadline)|Next--> commit, Step(1) ... Step(6)
//   Step(6) --Tick(deadline)|Next--> Complete
//   Step(i) --Skip--> Step(i+1) (no commit)
//   any --Cancel--> Cancelled (in-progress accumulator discarded)
//
// The wizard keeps its own working copy of the calibration set. Directional
// steps measure deviation from the neutral committed by step 0 in the same
// run. Every commit is reported as a `WizardEvent` so the owner can publish
// it immediately; prior commits survive a later cancel.

use std::time::{Duration, Instant};

use crate::axis::{Axis, PerAxis, RangeBound};
use crate::calibration::progress::{CalibrationProgress, CalibrationStep};
use crate::calibration::state::{changed_axes, with_neutral, CalibrationSet};
use crate::error::CalibrationError;
use crate::pose::PoseSample;

/// Default duration of the neutral step.
pub const DEFAULT_NEUTRAL_STEP: Duration = Duration::from_secs(6);
/// Default duration of each directional step.
pub const DEFAULT_DIRECTIONAL_STEP: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDurations {
    pub neutral: Duration,
    pub directional: Duration,
}

impl Default for StepDurations {
    fn default() -> Self {
        Self {
            neutral: DEFAULT_NEUTRAL_STEP,
            directional: DEFAULT_DIRECTIONAL_STEP,
        }
    }
}

impl StepDurations {
    pub fn for_step(&self, step: CalibrationStep) -> Duration {
        if step.is_neutral() {
            self.neutral
        } else {
            self.directional
        }
    }
}

/// Samples gathered during the current step.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Running sum per axis for the neutral mean
    Mean { sum: PerAxis<f64>, count: u32 },
    /// Largest-magnitude neutral-relative deviation on one axis
    Extreme {
        axis: Axis,
        best: Option<f64>,
        count: u32,
    },
}

impl Accumulator {
    fn for_step(step: CalibrationStep) -> Self {
        match step.target() {
            None => Accumulator::Mean {
                sum: PerAxis::default(),
                count: 0,
            },
            Some((axis, _)) => Accumulator::Extreme {
                axis,
                best: None,
                count: 0,
            },
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Accumulator::Mean { count, .. } | Accumulator::Extreme { count, .. } => *count,
        }
    }

    fn add(&mut self, sample: &PoseSample, calibration: &CalibrationSet) {
        match self {
            Accumulator::Mean { sum, count } => {
                sum.pitch += sample.pitch;
                sum.yaw += sample.yaw;
                sum.roll += sample.roll;
                *count += 1;
            }
            Accumulator::Extreme { axis, best, count } => {
                let deviation = calibration[*axis].relative(sample.angle(*axis));
                // Hold the largest magnitude seen; sign is kept
                if best.map_or(true, |current| deviation.abs() > current.abs()) {
                    *best = Some(deviation);
                }
                *count += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    Idle,
    Step {
        index: usize,
        deadline: Instant,
        accumulator: Accumulator,
    },
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WizardInput {
    Start(Instant),
    Sample(PoseSample),
    Tick(Instant),
    Next(Instant),
    Skip(Instant),
    Cancel,
}

/// A committed step: the full working calibration set plus the axes it changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCommit {
    pub step: CalibrationStep,
    pub calibration: CalibrationSet,
    pub changed: Vec<Axis>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    /// A step entered collection
    Advanced { step: CalibrationStep },
    StepCommitted(CalibrationCommit),
    StepSkipped { step: CalibrationStep },
    /// Deadline or "next" reached with nothing collected; treated as a skip
    NoSamplesCollected { step: CalibrationStep },
    /// Learned value would collapse the range; step commits nothing
    ExtentRejected {
        step: CalibrationStep,
        error: CalibrationError,
    },
    Completed,
    Cancelled,
}

pub struct CalibrationWizard {
    state: WizardState,
    durations: StepDurations,
    working: CalibrationSet,
    skipped: Vec<CalibrationStep>,
    /// Directional extents committed in this run
    learned_bounds: Vec<(Axis, RangeBound, f64)>,
}

impl CalibrationWizard {
    /// Create an idle wizard seeded with the currently published calibration.
    pub fn new(durations: StepDurations, initial: CalibrationSet) -> Self {
        Self {
            state: WizardState::Idle,
            durations,
            working: initial,
            skipped: Vec::new(),
            learned_bounds: Vec::new(),
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WizardState::Step { .. })
    }

    pub fn current_step(&self) -> Option<CalibrationStep> {
        match &self.state {
            WizardState::Step { index, .. } => CalibrationStep::from_index(*index),
            _ => None,
        }
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.working
    }

    pub fn skipped_steps(&self) -> &[CalibrationStep] {
        &self.skipped
    }

    /// Replace the working copy for axes edited outside the wizard.
    pub fn rebase(&mut self, calibration: CalibrationSet) {
        self.working = calibration;
    }

    /// Progress snapshot; `None` while idle.
    pub fn progress(&self, now: Instant) -> Option<CalibrationProgress> {
        match &self.state {
            WizardState::Idle => None,
            WizardState::Step {
                index,
                deadline,
                accumulator,
            } => CalibrationStep::from_index(*index).map(|step| {
                CalibrationProgress::in_step(
                    step,
                    accumulator.count(),
                    deadline.saturating_duration_since(now),
                    self.skipped.clone(),
                )
            }),
            WizardState::Complete => Some(CalibrationProgress::finished(self.skipped.clone(), false)),
            WizardState::Cancelled => Some(CalibrationProgress::finished(self.skipped.clone(), true)),
        }
    }

    /// The single transition function.
    ///
    /// # Errors
    /// * `AlreadyCalibrating` - `Start` while a step is active
    /// * `NotCalibrating` - `Next`/`Skip` with no active step
    ///
    /// Samples and ticks outside a step are ignored.
    pub fn handle(&mut self, input: WizardInput) -> Result<Vec<WizardEvent>, CalibrationError> {
        let mut events = Vec::new();

        match input {
            WizardInput::Start(now) => {
                if self.is_active() {
                    return Err(CalibrationError::AlreadyCalibrating);
                }
                self.skipped.clear();
                self.learned_bounds.clear();
                self.enter_step(0, now, &mut events);
            }
            WizardInput::Sample(sample) => {
                if !sample.is_finite() {
                    return Ok(events);
                }
                if let WizardState::Step { accumulator, .. } = &mut self.state {
                    accumulator.add(&sample, &self.working);
                }
            }
            WizardInput::Tick(now) => {
                let expired = matches!(&self.state, WizardState::Step { deadline, .. } if now >= *deadline);
                if expired {
                    self.commit_and_advance(now, &mut events);
                }
            }
            WizardInput::Next(now) => {
                if !self.is_active() {
                    return Err(CalibrationError::NotCalibrating);
                }
                self.commit_and_advance(now, &mut events);
            }
            WizardInput::Skip(now) => {
                let index = match &self.state {
                    WizardState::Step { index, .. } => *index,
                    _ => return Err(CalibrationError::NotCalibrating),
                };
                if let Some(step) = CalibrationStep::from_index(index) {
                    self.mark_skipped(step);
                    events.push(WizardEvent::StepSkipped { step });
                }
                self.enter_step(index + 1, now, &mut events);
            }
            WizardInput::Cancel => {
                self.state = WizardState::Cancelled;
                events.push(WizardEvent::Cancelled);
            }
        }

        Ok(events)
    }

    fn commit_and_advance(&mut self, now: Instant, events: &mut Vec<WizardEvent>) {
        let previous = std::mem::replace(&mut self.state, WizardState::Idle);
        let (index, accumulator) = match previous {
            WizardState::Step {
                index, accumulator, ..
            } => (index, accumulator),
            other => {
                self.state = other;
                return;
            }
        };
        let Some(step) = CalibrationStep::from_index(index) else {
            self.state = WizardState::Complete;
            return;
        };

        if accumulator.count() == 0 {
            self.mark_skipped(step);
            events.push(WizardEvent::NoSamplesCollected { step });
            events.push(WizardEvent::StepSkipped { step });
        } else {
            match self.learned(step, &accumulator) {
                Ok(updated) => {
                    if let (Accumulator::Extreme { best: Some(value), .. }, Some((axis, bound))) =
                        (&accumulator, step.target())
                    {
                        self.learned_bounds.push((axis, bound, *value));
                    }
                    let changed = changed_axes(&self.working, &updated);
                    self.working = updated;
                    events.push(WizardEvent::StepCommitted(CalibrationCommit {
                        step,
                        calibration: self.working,
                        changed,
                    }));
                }
                Err(error) => events.push(WizardEvent::ExtentRejected { step, error }),
            }
        }

        self.enter_step(index + 1, now, events);
    }

    fn learned(
        &self,
        step: CalibrationStep,
        accumulator: &Accumulator,
    ) -> Result<CalibrationSet, CalibrationError> {
        match (accumulator, step.target()) {
            (Accumulator::Mean { sum, count }, None) => {
                let n = f64::from(*count);
                let mean = sum.map(|_, total| total / n);
                Ok(with_neutral(&self.working, mean))
            }
            (Accumulator::Extreme { best: Some(value), .. }, Some((axis, bound))) => {
                let mut updated = self.working;
                let opposite = self.learned_bound(axis, bound.opposite());
                updated[axis] = self.working[axis].with_learned_extent(bound, *value, opposite)?;
                Ok(updated)
            }
            _ => Ok(self.working),
        }
    }

    fn learned_bound(&self, axis: Axis, bound: RangeBound) -> Option<f64> {
        self.learned_bounds
            .iter()
            .rev()
            .find(|(a, b, _)| *a == axis && *b == bound)
            .map(|(_, _, value)| *value)
    }

    fn enter_step(&mut self, index: usize, now: Instant, events: &mut Vec<WizardEvent>) {
        match CalibrationStep::from_index(index) {
            Some(step) => {
                self.state = WizardState::Step {
                    index,
                    deadline: now + self.durations.for_step(step),
                    accumulator: Accumulator::for_step(step),
                };
                events.push(WizardEvent::Advanced { step });
            }
            None => {
                self.state = WizardState::Complete;
                events.push(WizardEvent::Completed);
            }
        }
    }

    fn mark_skipped(&mut self, step: CalibrationStep) {
        if !self.skipped.contains(&step) {
            self.skipped.push(step);
        }
    }
}

#[cfg(test)]
#[path = "wizard_tests.rs"]
mod tests;
