//! Channel-fed pose source.
//!
//! Lets another capture loop (or a test) push readings into the pipeline.
//! The feeder side is cheap to clone; dropping every feeder disconnects the
//! source, which the capture thread reports as a device loss.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::{PoseReading, PoseSample, PoseSource, PoseSourceError};

/// Sending half handed to whoever produces pose estimates.
#[derive(Clone)]
pub struct PoseFeeder {
    tx: Sender<Result<PoseReading, PoseSourceError>>,
}

impl PoseFeeder {
    /// Push a detected pose. Returns `false` once the source is gone.
    pub fn send_sample(&self, sample: PoseSample) -> bool {
        self.tx.send(Ok(PoseReading::Face(sample))).is_ok()
    }

    pub fn send_no_face(&self) -> bool {
        self.tx.send(Ok(PoseReading::NoFace)).is_ok()
    }

    pub fn send_error(&self, err: PoseSourceError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }
}

pub struct ChannelPoseSource {
    rx: Receiver<Result<PoseReading, PoseSourceError>>,
    fail_open: Option<String>,
}

impl ChannelPoseSource {
    pub fn new() -> (Self, PoseFeeder) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx,
                fail_open: None,
            },
            PoseFeeder { tx },
        )
    }

    /// Source whose `open()` always fails, standing in for a missing camera.
    pub fn unavailable(reason: impl Into<String>) -> (Self, PoseFeeder) {
        let (mut source, feeder) = Self::new();
        source.fail_open = Some(reason.into());
        (source, feeder)
    }
}

impl PoseSource for ChannelPoseSource {
    fn open(&mut self) -> Result<(), PoseSourceError> {
        match &self.fail_open {
            Some(reason) => Err(PoseSourceError::OpenFailed {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_reading(&mut self, timeout: Duration) -> Result<PoseReading, PoseSourceError> {
        match self.rx.recv_timeout(timeout) {
            Ok(reading) => reading,
            Err(RecvTimeoutError::Timeout) => Err(PoseSourceError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(PoseSourceError::Disconnected {
                reason: "pose feeder dropped".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feeder_delivers_readings_in_order() {
        let (mut source, feeder) = ChannelPoseSource::new();
        assert!(source.open().is_ok());

        assert!(feeder.send_sample(PoseSample::now(1.0, 2.0, 3.0)));
        assert!(feeder.send_no_face());

        let first = source.next_reading(Duration::from_millis(10)).unwrap();
        assert!(matches!(first, PoseReading::Face(s) if s.pitch == 1.0));
        let second = source.next_reading(Duration::from_millis(10)).unwrap();
        assert_eq!(second, PoseReading::NoFace);
    }

    #[test]
    fn test_empty_source_times_out() {
        let (mut source, _feeder) = ChannelPoseSource::new();
        let result = source.next_reading(Duration::from_millis(5));
        assert_eq!(result, Err(PoseSourceError::Timeout));
    }

    #[test]
    fn test_dropped_feeder_disconnects() {
        let (mut source, feeder) = ChannelPoseSource::new();
        drop(feeder);
        let result = source.next_reading(Duration::from_millis(5));
        assert!(matches!(result, Err(PoseSourceError::Disconnected { .. })));
    }

    #[test]
    fn test_unavailable_source_fails_open() {
        let (mut source, _feeder) = ChannelPoseSource::unavailable("no camera");
        assert!(matches!(
            source.open(),
            Err(PoseSourceError::OpenFailed { reason }) if reason == "no camera"
        ));
    }
}
