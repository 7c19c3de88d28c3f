// Calibration module - per-axis range learning
//
// This module provides three components:
// 1. AxisCalibration: learned neutral offset and [min, max] extent per axis
// 2. CalibrationStep / CalibrationProgress: the fixed seven-step script
// 3. CalibrationWizard: tagged state machine turning pose samples into
//    committed calibration values
//
// The calibration workflow:
// 1. Start the wizard with the currently published calibration
// 2. Feed samples and ticks; each step commits on deadline or "next"
// 3. Publish every commit as it happens; cancel keeps earlier commits

pub mod progress;
pub mod state;
pub mod wizard;

pub use progress::{CalibrationProgress, CalibrationStep};
pub use state::{AxisCalibration, CalibrationSet};
pub use wizard::{
    CalibrationCommit, CalibrationWizard, StepDurations, WizardEvent, WizardInput, WizardState,
};
