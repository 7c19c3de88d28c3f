//! Emitter that records every message for inspection.
//!
//! The emitter itself moves into the pipeline; a cloned [`RecordingHandle`]
//! stays with the caller to read back what was sent and to inject send
//! failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::PipelineError;

use super::{cc_message_bytes, MidiEmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedCc {
    pub channel: u8,
    pub cc_number: u8,
    pub value: u8,
}

#[derive(Default)]
struct Shared {
    messages: Mutex<Vec<RecordedCc>>,
    failures_pending: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct RecordingHandle {
    shared: Arc<Shared>,
}

impl RecordingHandle {
    /// Snapshot of everything sent so far, in send order.
    pub fn messages(&self) -> Vec<RecordedCc> {
        self.shared
            .messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.shared
            .messages
            .lock()
            .map(|messages| messages.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.shared.messages.lock() {
            messages.clear();
        }
    }

    /// Make the next `count` sends fail without recording.
    pub fn fail_next(&self, count: usize) {
        self.shared.failures_pending.store(count, Ordering::SeqCst);
    }
}

pub struct RecordingEmitter {
    handle: RecordingHandle,
}

impl RecordingEmitter {
    pub fn new() -> (Self, RecordingHandle) {
        let handle = RecordingHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl MidiEmitter for RecordingEmitter {
    fn send_cc(&mut self, channel: u8, cc_number: u8, value: u8) -> Result<(), PipelineError> {
        cc_message_bytes(channel, cc_number, value)?;

        let shared = &self.handle.shared;
        let injected_failure = shared
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(PipelineError::MidiSendFailed {
                reason: "injected failure".to_string(),
            });
        }

        let mut messages = shared
            .messages
            .lock()
            .map_err(|_| PipelineError::LockPoisoned {
                component: "RecordingEmitter".to_string(),
            })?;
        messages.push(RecordedCc {
            channel,
            cc_number,
            value,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
