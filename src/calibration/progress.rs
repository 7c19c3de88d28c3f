// Progress tracking for the calibration wizard
//
// The wizard walks a fixed seven-step script. Each step targets either all
// three axes (neutral) or one bound of one axis (directional).

use std::time::Duration;

use crate::axis::{Axis, RangeBound};

/// One step of the calibration script, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    /// Step 0: hold a natural, relaxed head position
    Neutral,
    /// Step 1: tilt head up
    PitchUp,
    /// Step 2: tilt head down
    PitchDown,
    /// Step 3: turn head right
    YawRight,
    /// Step 4: turn head left
    YawLeft,
    /// Step 5: tilt head toward the right shoulder
    RollRight,
    /// Step 6: tilt head toward the left shoulder
    RollLeft,
}

impl CalibrationStep {
    pub const ALL: [CalibrationStep; 7] = [
        CalibrationStep::Neutral,
        CalibrationStep::PitchUp,
        CalibrationStep::PitchDown,
        CalibrationStep::YawRight,
        CalibrationStep::YawLeft,
        CalibrationStep::RollRight,
        CalibrationStep::RollLeft,
    ];

    pub const COUNT: usize = 7;

    pub fn from_index(index: usize) -> Option<CalibrationStep> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            CalibrationStep::Neutral => 0,
            CalibrationStep::PitchUp => 1,
            CalibrationStep::PitchDown => 2,
            CalibrationStep::YawRight => 3,
            CalibrationStep::YawLeft => 4,
            CalibrationStep::RollRight => 5,
            CalibrationStep::RollLeft => 6,
        }
    }

    /// Get the next step in the script
    ///
    /// # Returns
    /// * `Some(CalibrationStep)` - Next step
    /// * `None` - Script complete
    pub fn next(&self) -> Option<CalibrationStep> {
        Self::from_index(self.index() + 1)
    }

    /// Axis and bound learned by a directional step; `None` for neutral.
    pub fn target(&self) -> Option<(Axis, RangeBound)> {
        match self {
            CalibrationStep::Neutral => None,
            CalibrationStep::PitchUp => Some((Axis::Pitch, RangeBound::Max)),
            CalibrationStep::PitchDown => Some((Axis::Pitch, RangeBound::Min)),
            CalibrationStep::YawRight => Some((Axis::Yaw, RangeBound::Max)),
            CalibrationStep::YawLeft => Some((Axis::Yaw, RangeBound::Min)),
            CalibrationStep::RollRight => Some((Axis::Roll, RangeBound::Max)),
            CalibrationStep::RollLeft => Some((Axis::Roll, RangeBound::Min)),
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, CalibrationStep::Neutral)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CalibrationStep::Neutral => "Neutral Position",
            CalibrationStep::PitchUp => "Pitch Up",
            CalibrationStep::PitchDown => "Pitch Down",
            CalibrationStep::YawRight => "Yaw Right",
            CalibrationStep::YawLeft => "Yaw Left",
            CalibrationStep::RollRight => "Roll Right",
            CalibrationStep::RollLeft => "Roll Left",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            CalibrationStep::Neutral => "Look straight at the camera and hold still",
            CalibrationStep::PitchUp => "Slowly tilt your head up as far as comfortable",
            CalibrationStep::PitchDown => "Slowly tilt your head down as far as comfortable",
            CalibrationStep::YawRight => "Slowly turn your head to the right",
            CalibrationStep::YawLeft => "Slowly turn your head to the left",
            CalibrationStep::RollRight => "Tilt your head toward your right shoulder",
            CalibrationStep::RollLeft => "Tilt your head toward your left shoulder",
        }
    }
}

/// Snapshot of wizard progress sent to the UI on every step change
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Step currently collecting samples (`None` once finished)
    pub current_step: Option<CalibrationStep>,
    /// Index of the current step (0-6), or 7 when finished
    pub step_index: usize,
    /// Samples accumulated in the current step
    pub samples_collected: u32,
    /// Milliseconds until the current step auto-commits
    pub remaining_ms: u64,
    /// Steps the user skipped, including implicit skips with no samples
    pub skipped_steps: Vec<CalibrationStep>,
    /// Whether the wizard ran through every step
    pub complete: bool,
    /// Whether the wizard was cancelled
    pub cancelled: bool,
}

impl CalibrationProgress {
    pub fn in_step(
        step: CalibrationStep,
        samples_collected: u32,
        remaining: Duration,
        skipped_steps: Vec<CalibrationStep>,
    ) -> Self {
        Self {
            current_step: Some(step),
            step_index: step.index(),
            samples_collected,
            remaining_ms: remaining.as_millis() as u64,
            skipped_steps,
            complete: false,
            cancelled: false,
        }
    }

    pub fn finished(skipped_steps: Vec<CalibrationStep>, cancelled: bool) -> Self {
        Self {
            current_step: None,
            step_index: CalibrationStep::COUNT,
            samples_collected: 0,
            remaining_ms: 0,
            skipped_steps,
            complete: !cancelled,
            cancelled,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.current_step {
            Some(step) => step.display_name(),
            None if self.cancelled => "Calibration Cancelled",
            None => "Calibration Complete",
        }
    }

    /// Get progress percentage (0-100) by completed steps
    pub fn percentage(&self) -> u8 {
        ((self.step_index.min(CalibrationStep::COUNT) * 100) / CalibrationStep::COUNT) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequence() {
        let mut step = CalibrationStep::Neutral;
        let mut visited = vec![step];
        while let Some(next) = step.next() {
            visited.push(next);
            step = next;
        }
        assert_eq!(visited, CalibrationStep::ALL.to_vec());
        assert_eq!(CalibrationStep::RollLeft.next(), None);
    }

    #[test]
    fn test_step_targets() {
        assert_eq!(CalibrationStep::Neutral.target(), None);
        assert_eq!(
            CalibrationStep::PitchUp.target(),
            Some((Axis::Pitch, RangeBound::Max))
        );
        assert_eq!(
            CalibrationStep::YawLeft.target(),
            Some((Axis::Yaw, RangeBound::Min))
        );
        assert_eq!(
            CalibrationStep::RollRight.target(),
            Some((Axis::Roll, RangeBound::Max))
        );
    }

    #[test]
    fn test_progress_percentage() {
        let progress =
            CalibrationProgress::in_step(CalibrationStep::Neutral, 0, Duration::ZERO, vec![]);
        assert_eq!(progress.percentage(), 0);

        let progress =
            CalibrationProgress::in_step(CalibrationStep::YawRight, 3, Duration::ZERO, vec![]);
        assert_eq!(progress.percentage(), 42);

        let progress = CalibrationProgress::finished(vec![], false);
        assert_eq!(progress.percentage(), 100);
        assert!(progress.complete);
    }

    #[test]
    fn test_progress_titles() {
        let progress = CalibrationProgress::in_step(
            CalibrationStep::PitchDown,
            2,
            Duration::from_millis(1500),
            vec![],
        );
        assert_eq!(progress.title(), "Pitch Down");
        assert_eq!(progress.remaining_ms, 1500);

        let cancelled = CalibrationProgress::finished(vec![CalibrationStep::YawLeft], true);
        assert_eq!(cancelled.title(), "Calibration Cancelled");
        assert!(!cancelled.complete);
    }

    #[test]
    fn test_step_serializes_snake_case() {
        let json = serde_json::to_string(&CalibrationStep::RollRight).unwrap();
        assert_eq!(json, "\"roll_right\"");
    }
}
