use super::*;
use crate::calibration::state::AxisCalibration;

/// Helper: sample with all three angles stamped at `at`
fn sample_at(at: Instant, pitch: f64, yaw: f64, roll: f64) -> WizardInput {
    WizardInput::Sample(PoseSample::new(pitch, yaw, roll, at))
}

fn started_wizard(t0: Instant) -> CalibrationWizard {
    let mut wizard = CalibrationWizard::new(StepDurations::default(), CalibrationSet::default());
    let events = wizard.handle(WizardInput::Start(t0)).unwrap();
    assert_eq!(
        events,
        vec![WizardEvent::Advanced {
            step: CalibrationStep::Neutral
        }]
    );
    wizard
}

fn committed(events: &[WizardEvent]) -> Option<&CalibrationCommit> {
    events.iter().find_map(|event| match event {
        WizardEvent::StepCommitted(commit) => Some(commit),
        _ => None,
    })
}

#[test]
fn test_neutral_step_commits_mean() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);

    for value in [0.5, -0.5, 0.2] {
        wizard.handle(sample_at(t0, value, value, value)).unwrap();
    }
    let events = wizard.handle(WizardInput::Next(t0)).unwrap();

    let commit = committed(&events).expect("neutral step should commit");
    assert_eq!(commit.step, CalibrationStep::Neutral);
    assert!((commit.calibration.pitch.neutral_offset - 0.0667).abs() < 1e-3);
    assert!((wizard.calibration().roll.neutral_offset - 0.0667).abs() < 1e-3);
    assert_eq!(commit.changed, Axis::ALL.to_vec());
    assert_eq!(wizard.current_step(), Some(CalibrationStep::PitchUp));
}

#[test]
fn test_deadline_expiry_commits_and_advances() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(sample_at(t0, 1.0, 2.0, 3.0)).unwrap();

    // Not yet expired
    let events = wizard
        .handle(WizardInput::Tick(t0 + Duration::from_secs(5)))
        .unwrap();
    assert!(events.is_empty());
    assert_eq!(wizard.current_step(), Some(CalibrationStep::Neutral));

    let events = wizard
        .handle(WizardInput::Tick(t0 + DEFAULT_NEUTRAL_STEP))
        .unwrap();
    assert!(committed(&events).is_some());
    assert!(events.contains(&WizardEvent::Advanced {
        step: CalibrationStep::PitchUp
    }));
}

#[test]
fn test_directional_step_holds_largest_magnitude() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(sample_at(t0, 2.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    // Pitch up: deviation from neutral 2.0
    for pitch in [10.0, 27.0, 24.0, -5.0] {
        wizard.handle(sample_at(t0, pitch, 0.0, 0.0)).unwrap();
    }
    let events = wizard.handle(WizardInput::Next(t0)).unwrap();

    let commit = committed(&events).unwrap();
    assert_eq!(commit.step, CalibrationStep::PitchUp);
    assert_eq!(commit.changed, vec![Axis::Pitch]);
    assert!((commit.calibration.pitch.max_extent - 25.0).abs() < 1e-9);
    assert_eq!(commit.calibration.pitch.min_extent, -30.0);
}

#[test]
fn test_directional_min_step_learns_negative_extent() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(WizardInput::Skip(t0)).unwrap(); // neutral
    wizard.handle(WizardInput::Skip(t0)).unwrap(); // pitch up

    assert_eq!(wizard.current_step(), Some(CalibrationStep::PitchDown));
    wizard.handle(sample_at(t0, -18.0, 0.0, 0.0)).unwrap();
    wizard.handle(sample_at(t0, -22.5, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    assert_eq!(wizard.calibration().pitch.min_extent, -22.5);
    assert_eq!(wizard.calibration().pitch.max_extent, 30.0);
}

#[test]
fn test_skip_with_zero_samples_leaves_extents_unchanged() {
    let t0 = Instant::now();
    let initial = PerAxis::new(
        AxisCalibration::new(0.0, -12.0, 18.0).unwrap(),
        AxisCalibration::default(),
        AxisCalibration::default(),
    );
    let mut wizard = CalibrationWizard::new(StepDurations::default(), initial);
    wizard.handle(WizardInput::Start(t0)).unwrap();
    wizard.handle(WizardInput::Skip(t0)).unwrap();

    // Pitch-up step expires without any sample
    let events = wizard
        .handle(WizardInput::Tick(t0 + DEFAULT_DIRECTIONAL_STEP))
        .unwrap();

    assert!(events.contains(&WizardEvent::NoSamplesCollected {
        step: CalibrationStep::PitchUp
    }));
    assert!(committed(&events).is_none());
    assert_eq!(wizard.calibration().pitch, initial.pitch);
    assert_eq!(
        wizard.skipped_steps(),
        &[CalibrationStep::Neutral, CalibrationStep::PitchUp]
    );
}

#[test]
fn test_explicit_skip_discards_samples() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(sample_at(t0, 9.0, 9.0, 9.0)).unwrap();

    let events = wizard.handle(WizardInput::Skip(t0)).unwrap();
    assert_eq!(
        events[0],
        WizardEvent::StepSkipped {
            step: CalibrationStep::Neutral
        }
    );
    assert_eq!(wizard.calibration().yaw.neutral_offset, 0.0);
}

#[test]
fn test_inverted_learned_extent_swaps_bounds() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(WizardInput::Skip(t0)).unwrap();

    // Wrong way during "pitch up"
    wizard.handle(sample_at(t0, -40.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    let pitch = wizard.calibration().pitch;
    assert_eq!(pitch.min_extent, -40.0);
    assert_eq!(pitch.max_extent, -30.0);
    assert!(pitch.validate().is_ok());
}

#[test]
fn test_wrong_way_then_right_way_orders_both_learned_extents() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(WizardInput::Skip(t0)).unwrap();

    // Pitch up, turned down instead
    wizard.handle(sample_at(t0, -35.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();
    // Pitch down, turned less far down
    wizard.handle(sample_at(t0, -20.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    let pitch = wizard.calibration().pitch;
    assert_eq!(pitch.min_extent, -35.0);
    assert_eq!(pitch.max_extent, -20.0);
}

#[test]
fn test_learned_extents_do_not_carry_into_next_run() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(WizardInput::Skip(t0)).unwrap();
    wizard.handle(sample_at(t0, 25.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();
    wizard.handle(WizardInput::Cancel).unwrap();

    // Manual edit between runs
    let mut edited = *wizard.calibration();
    edited.pitch = AxisCalibration::new(0.0, -30.0, 15.0).unwrap();
    wizard.rebase(edited);

    wizard.handle(WizardInput::Start(t0)).unwrap();
    wizard.handle(WizardInput::Skip(t0)).unwrap(); // neutral
    wizard.handle(WizardInput::Skip(t0)).unwrap(); // pitch up
    wizard.handle(sample_at(t0, -10.0, 0.0, 0.0)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    // Paired with the stored max, not the one learned in the first run
    let pitch = wizard.calibration().pitch;
    assert_eq!(pitch.min_extent, -10.0);
    assert_eq!(pitch.max_extent, 15.0);
}

#[test]
fn test_zero_width_extent_is_rejected() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(WizardInput::Skip(t0)).unwrap();

    wizard.handle(sample_at(t0, -30.0, 0.0, 0.0)).unwrap();
    let events = wizard.handle(WizardInput::Next(t0)).unwrap();

    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::ExtentRejected {
            step: CalibrationStep::PitchUp,
            error: CalibrationError::InvalidExtent { .. }
        }
    )));
    assert_eq!(wizard.calibration().pitch, AxisCalibration::default());
}

#[test]
fn test_cancel_keeps_prior_commits() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(sample_at(t0, 3.0, -1.0, 0.5)).unwrap();
    wizard.handle(WizardInput::Next(t0)).unwrap();

    // Partially collected pitch-up step
    wizard.handle(sample_at(t0, 20.0, 0.0, 0.0)).unwrap();
    let events = wizard.handle(WizardInput::Cancel).unwrap();

    assert_eq!(events, vec![WizardEvent::Cancelled]);
    assert_eq!(wizard.state(), &WizardState::Cancelled);
    assert_eq!(wizard.calibration().pitch.neutral_offset, 3.0);
    assert_eq!(wizard.calibration().pitch.max_extent, 30.0);
}

#[test]
fn test_start_while_active_fails() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    assert_eq!(
        wizard.handle(WizardInput::Start(t0)),
        Err(CalibrationError::AlreadyCalibrating)
    );
    assert_eq!(wizard.current_step(), Some(CalibrationStep::Neutral));
}

#[test]
fn test_next_without_active_step_fails() {
    let mut wizard = CalibrationWizard::new(StepDurations::default(), CalibrationSet::default());
    assert_eq!(
        wizard.handle(WizardInput::Next(Instant::now())),
        Err(CalibrationError::NotCalibrating)
    );
    assert_eq!(
        wizard.handle(WizardInput::Skip(Instant::now())),
        Err(CalibrationError::NotCalibrating)
    );
    // Samples and ticks outside a step are ignored
    assert_eq!(
        wizard.handle(WizardInput::Tick(Instant::now())),
        Ok(vec![])
    );
}

#[test]
fn test_full_run_completes_after_seven_steps() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    let mut now = t0;

    for _ in 0..CalibrationStep::COUNT {
        wizard.handle(sample_at(now, 5.0, 5.0, 5.0)).unwrap();
        now += Duration::from_secs(10);
        wizard.handle(WizardInput::Tick(now)).unwrap();
    }

    assert_eq!(wizard.state(), &WizardState::Complete);
    let progress = wizard.progress(now).unwrap();
    assert!(progress.complete);
    assert_eq!(progress.percentage(), 100);
    // Every directional sample sits exactly on neutral. The "max" steps learn
    // 0.0; the following "min" steps would then collapse the range and are
    // rejected.
    let yaw = wizard.calibration().yaw;
    assert_eq!(yaw.neutral_offset, 5.0);
    assert_eq!(yaw.min_extent, -30.0);
    assert_eq!(yaw.max_extent, 0.0);
}

#[test]
fn test_non_finite_samples_are_ignored() {
    let t0 = Instant::now();
    let mut wizard = started_wizard(t0);
    wizard.handle(sample_at(t0, f64::NAN, 0.0, 0.0)).unwrap();

    let progress = wizard.progress(t0).unwrap();
    assert_eq!(progress.samples_collected, 0);
    assert_eq!(progress.remaining_ms, DEFAULT_NEUTRAL_STEP.as_millis() as u64);
}
