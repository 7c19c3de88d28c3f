use super::*;
use crate::calibration::CalibrationStep;
use crate::error::ConfigError;
use crate::midi::{RecordingEmitter, RecordingHandle};
use crate::pose::{ChannelPoseSource, PoseFeeder, PoseSourceError};
use std::time::{Duration, Instant};

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.pipeline.capture_timeout_ms = 20;
    config.pipeline.idle_tick_ms = 10;
    config.pipeline.smoothing_alpha = 1.0;
    // An idle feeder times out every capture; keep the run alive in tests
    config.pipeline.max_consecutive_capture_errors = 10_000;
    config
}

struct Rig {
    coordinator: Coordinator,
    feeder: PoseFeeder,
    midi: RecordingHandle,
    clock: Arc<StubTimeSource>,
}

fn rig() -> Rig {
    rig_with(fast_config())
}

fn rig_with(config: AppConfig) -> Rig {
    let (source, feeder) = ChannelPoseSource::new();
    let (emitter, midi) = RecordingEmitter::new();
    let clock = Arc::new(StubTimeSource::frozen());
    let coordinator = Coordinator::with_time_source(
        config,
        Box::new(source),
        Box::new(emitter),
        clock.clone(),
    )
    .unwrap();
    Rig {
        coordinator,
        feeder,
        midi,
        clock,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_start_and_stop_lifecycle() {
    let rig = rig();
    assert_eq!(rig.coordinator.mode(), PipelineMode::Stopped);

    rig.coordinator.start().unwrap();
    assert_eq!(rig.coordinator.mode(), PipelineMode::Running);
    assert_eq!(rig.coordinator.start(), Err(PipelineError::AlreadyRunning));

    rig.coordinator.stop().unwrap();
    assert_eq!(rig.coordinator.mode(), PipelineMode::Stopped);
    assert!(!rig.coordinator.is_running());

    // Idempotent
    rig.coordinator.stop().unwrap();
}

#[test]
fn test_restart_after_stop() {
    let rig = rig();
    rig.coordinator.start().unwrap();
    rig.coordinator.stop().unwrap();
    rig.coordinator.start().unwrap();

    rig.feeder.send_sample(PoseSample::now(0.0, 0.0, 0.0));
    assert!(wait_until(|| rig.midi.len() == 3));
}

#[test]
fn test_start_calibration_requires_running() {
    let rig = rig();
    assert_eq!(
        rig.coordinator.start_calibration(),
        Err(CalibrationError::NotRunning)
    );
}

#[test]
fn test_camera_unavailable_keeps_stopped() {
    let (source, _feeder) = ChannelPoseSource::unavailable("no camera 0");
    let (emitter, _midi) = RecordingEmitter::new();
    let coordinator =
        Coordinator::new(fast_config(), Box::new(source), Box::new(emitter)).unwrap();

    match coordinator.start() {
        Err(PipelineError::CameraUnavailable { reason }) => assert!(reason.contains("no camera 0")),
        other => panic!("unexpected start result: {:?}", other),
    }
    assert_eq!(coordinator.mode(), PipelineMode::Stopped);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let (source, _feeder) = ChannelPoseSource::new();
    let (emitter, _midi) = RecordingEmitter::new();
    let mut config = fast_config();
    config.axes.roll.channel = 17;

    let result = Coordinator::new(config, Box::new(source), Box::new(emitter));
    assert!(matches!(
        result,
        Err(PipelineError::Config(ConfigError::ChannelOutOfRange { value: 17 }))
    ));
}

#[test]
fn test_calibration_consumes_samples_instead_of_mappers() {
    let rig = rig();
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();
    assert_eq!(rig.coordinator.mode(), PipelineMode::Calibrating);
    assert_eq!(
        rig.coordinator.start_calibration(),
        Err(CalibrationError::AlreadyCalibrating)
    );

    rig.feeder.send_sample(PoseSample::now(5.0, 5.0, 5.0));
    assert!(wait_until(|| {
        rig.coordinator
            .snapshot()
            .calibration
            .map(|progress| progress.samples_collected >= 1)
            .unwrap_or(false)
    }));
    assert!(rig.midi.is_empty());
}

#[test]
fn test_skipping_every_step_returns_to_running() {
    let rig = rig();
    let mut progress_rx = rig.coordinator.subscribe_calibration();
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();

    for _ in 0..CalibrationStep::COUNT {
        rig.coordinator.skip_calibration_step().unwrap();
    }

    assert_eq!(rig.coordinator.mode(), PipelineMode::Running);
    assert_eq!(
        rig.coordinator.skip_calibration_step(),
        Err(CalibrationError::NotCalibrating)
    );
    assert_eq!(*rig.coordinator.axes_config().unwrap(), fast_config().axes);

    let mut last = None;
    while let Ok(progress) = progress_rx.try_recv() {
        last = Some(progress);
    }
    let last = last.unwrap();
    assert!(last.complete);
    assert_eq!(last.skipped_steps.len(), CalibrationStep::COUNT);
}

#[test]
fn test_neutral_step_commits_on_deadline() {
    let rig = rig();
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();

    rig.feeder.send_sample(PoseSample::now(2.0, 4.0, -1.0));
    assert!(wait_until(|| {
        rig.coordinator
            .snapshot()
            .calibration
            .map(|progress| progress.samples_collected >= 1)
            .unwrap_or(false)
    }));

    rig.clock.advance(Duration::from_secs(6));
    assert!(wait_until(|| {
        rig.coordinator.axes_config().unwrap().pitch.calibration.neutral_offset == 2.0
    }));

    let axes = rig.coordinator.axes_config().unwrap();
    assert_eq!(axes.yaw.calibration.neutral_offset, 4.0);
    assert_eq!(axes.roll.calibration.neutral_offset, -1.0);
    assert_eq!(
        rig.coordinator.snapshot().calibration.unwrap().current_step,
        Some(CalibrationStep::PitchUp)
    );
}

#[test]
fn test_sample_after_deadline_goes_to_next_step() {
    // Idle ticks never fire here; only the sample itself can expire the step
    let mut config = fast_config();
    config.pipeline.idle_tick_ms = 60_000;
    let rig = rig_with(config);
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();

    rig.clock.advance(Duration::from_secs(7));
    rig.feeder.send_sample(PoseSample::now(3.0, 3.0, 3.0));
    assert!(wait_until(|| rig.coordinator.snapshot().samples_processed >= 1));

    let axes = rig.coordinator.axes_config().unwrap();
    assert_eq!(axes.pitch.calibration.neutral_offset, 0.0);
    assert_eq!(axes.roll.calibration.neutral_offset, 0.0);

    let progress = rig.coordinator.snapshot().calibration.unwrap();
    assert_eq!(progress.current_step, Some(CalibrationStep::PitchUp));
    assert_eq!(progress.skipped_steps, vec![CalibrationStep::Neutral]);
    assert_eq!(progress.samples_collected, 1);
}

#[test]
fn test_cancel_calibration_keeps_commits() {
    let rig = rig();
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();

    rig.feeder.send_sample(PoseSample::now(3.0, 0.0, 0.0));
    assert!(wait_until(|| {
        rig.coordinator
            .snapshot()
            .calibration
            .map(|progress| progress.samples_collected >= 1)
            .unwrap_or(false)
    }));
    rig.coordinator.next_calibration_step().unwrap();
    rig.coordinator.cancel_calibration().unwrap();

    assert_eq!(rig.coordinator.mode(), PipelineMode::Running);
    assert_eq!(
        rig.coordinator.axes_config().unwrap().pitch.calibration.neutral_offset,
        3.0
    );
    assert_eq!(
        rig.coordinator.cancel_calibration(),
        Err(CalibrationError::NotCalibrating)
    );
}

#[test]
fn test_set_axis_range_rejects_crossing_bounds() {
    let rig = rig();

    let result = rig
        .coordinator
        .set_axis_range(Axis::Yaw, RangeBound::Max, -40.0);
    assert!(matches!(result, Err(CalibrationError::InvalidExtent { .. })));
    assert_eq!(rig.coordinator.axes_config().unwrap().yaw.calibration.max_extent, 30.0);

    rig.coordinator
        .set_axis_range(Axis::Yaw, RangeBound::Max, 45.0)
        .unwrap();
    assert_eq!(rig.coordinator.axes_config().unwrap().yaw.calibration.max_extent, 45.0);
}

#[test]
fn test_current_pose_edits() {
    let rig = rig();
    assert_eq!(
        rig.coordinator.set_zero_position(),
        Err(CalibrationError::NotRunning)
    );

    rig.coordinator.start().unwrap();
    rig.feeder.send_sample(PoseSample::now(10.0, -5.0, 1.0));
    assert!(wait_until(|| rig.coordinator.snapshot().angles.is_some()));

    rig.coordinator.set_zero_position().unwrap();
    let axes = rig.coordinator.axes_config().unwrap();
    assert_eq!(axes.pitch.calibration.neutral_offset, 10.0);
    assert_eq!(axes.yaw.calibration.neutral_offset, -5.0);

    rig.feeder.send_sample(PoseSample::now(25.0, -5.0, 1.0));
    assert!(wait_until(|| {
        rig.coordinator
            .snapshot()
            .angles
            .map(|angles| angles.pitch == 25.0)
            .unwrap_or(false)
    }));
    rig.coordinator
        .set_axis_range_from_current(Axis::Pitch, RangeBound::Max)
        .unwrap();
    assert_eq!(
        rig.coordinator.axes_config().unwrap().pitch.calibration.max_extent,
        15.0
    );
}

#[test]
fn test_update_and_reset_axis() {
    let rig = rig();

    let mut config = AxisRuntimeConfig::default_for(Axis::Roll);
    config.cc_number = 74;
    config.channel = 16;
    rig.coordinator.update_axis_config(Axis::Roll, config).unwrap();
    assert_eq!(rig.coordinator.axes_config().unwrap().roll.cc_number, 74);

    config.channel = 0;
    assert!(rig.coordinator.update_axis_config(Axis::Roll, config).is_err());
    assert_eq!(rig.coordinator.axes_config().unwrap().roll.channel, 16);

    rig.coordinator.reset_axis(Axis::Roll).unwrap();
    assert_eq!(
        rig.coordinator.axes_config().unwrap().roll,
        AxisRuntimeConfig::default_for(Axis::Roll)
    );
}

#[test]
fn test_save_and_load_config() {
    let rig = rig();
    let path = std::env::temp_dir().join(format!(
        "face_midi_coordinator_{}.json",
        std::process::id()
    ));

    rig.coordinator
        .set_axis_range(Axis::Pitch, RangeBound::Min, -12.0)
        .unwrap();
    rig.coordinator.save_config(&path).unwrap();

    rig.coordinator.reset_axis(Axis::Pitch).unwrap();
    assert_eq!(rig.coordinator.axes_config().unwrap().pitch.calibration.min_extent, -30.0);

    rig.coordinator.load_config(&path).unwrap();
    assert_eq!(rig.coordinator.axes_config().unwrap().pitch.calibration.min_extent, -12.0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_load_missing_config_is_an_error() {
    let rig = rig();
    let result = rig
        .coordinator
        .load_config("/nonexistent/face_midi_config.json");
    assert!(matches!(
        result,
        Err(PipelineError::Config(ConfigError::Io { .. }))
    ));
}

#[test]
fn test_disconnect_stops_pipeline_with_fault() {
    let rig = rig();
    rig.coordinator.start().unwrap();
    rig.coordinator.start_calibration().unwrap();

    rig.feeder.send_error(PoseSourceError::Disconnected {
        reason: "usb unplugged".to_string(),
    });

    assert!(wait_until(|| rig.coordinator.mode() == PipelineMode::Stopped));
    let snapshot = rig.coordinator.snapshot();
    assert_eq!(snapshot.last_fault.as_deref(), Some("usb unplugged"));
    assert!(!rig.coordinator.is_running());
    assert_eq!(
        rig.coordinator.start_calibration(),
        Err(CalibrationError::NotRunning)
    );
}

#[test]
fn test_consecutive_timeouts_declare_camera_unavailable() {
    let (source, _feeder) = ChannelPoseSource::new();
    let (emitter, _midi) = RecordingEmitter::new();
    let mut config = fast_config();
    config.pipeline.max_consecutive_capture_errors = 3;
    let coordinator = Coordinator::new(config, Box::new(source), Box::new(emitter)).unwrap();

    coordinator.start().unwrap();
    assert!(wait_until(|| coordinator.mode() == PipelineMode::Stopped));

    let fault = coordinator.snapshot().last_fault.unwrap();
    assert!(fault.contains("3 consecutive capture failures"));
}
