// Managers Module
//
// Focused manager classes used by the pipeline coordinator.
//
// Each manager handles one specific concern:
// - CalibrationManager: Calibration wizard session and transition ordering
// - BroadcastChannelManager: Tokio broadcast channel management

pub mod broadcast_manager;
pub mod calibration_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use calibration_manager::{CalibrationManager, WizardOutcome};
