//! Pipeline telemetry collector and helpers.
//!
//! The collector multiplexes latency, frame-drop, capture-fault, MIDI and
//! lifecycle events into a bounded history plus a broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::axis::Axis;
use crate::calibration::CalibrationStep;

pub mod events;

pub use events::{CalibrationWarningKind, LifecyclePhase, MetricEvent};

/// Minimum growth of the dropped-frame counter before another event is sent.
const FRAME_DROP_REPORT_STEP: u64 = 10;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock_recovering(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = lock_recovering(&self.history);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of sample-to-emit latencies.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        (sum / count as f32, max, count)
    }
}

/// Top-level hub wrapping the collector plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
    latency_report_every: usize,
    last_reported_drops: AtomicU64,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
            latency_report_every: latency_window.max(1),
            last_reported_drops: AtomicU64::new(0),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    /// Observe one sample's processing latency; a `Latency` event goes out
    /// once per full window.
    pub fn record_latency(&self, latency: Duration) {
        let report = {
            let mut tracker = lock_recovering(&self.latency);
            let (avg, max, count) = tracker.observe(latency.as_secs_f32() * 1000.0);
            if count == self.latency_report_every {
                tracker.samples.clear();
                Some((avg, max, count))
            } else {
                None
            }
        };
        if let Some((avg_ms, max_ms, sample_count)) = report {
            self.collector.publish(MetricEvent::Latency {
                avg_ms,
                max_ms,
                sample_count,
            });
        }
    }

    /// Report the running dropped-frame total, debounced.
    pub fn record_frames_dropped(&self, total: u64) {
        let last = self.last_reported_drops.load(Ordering::Relaxed);
        let should_emit = (last == 0 && total > 0) || total >= last + FRAME_DROP_REPORT_STEP;
        if should_emit
            && self
                .last_reported_drops
                .compare_exchange(last, total, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            self.collector.publish(MetricEvent::FramesDropped { total });
        }
    }

    /// Restart drop debouncing for a new pipeline run.
    pub fn reset_frame_drops(&self) {
        self.last_reported_drops.store(0, Ordering::Relaxed);
    }

    pub fn record_capture_fault(&self, consecutive_errors: u32, reason: impl Into<String>) {
        self.collector.publish(MetricEvent::CaptureFault {
            consecutive_errors,
            reason: reason.into(),
        });
    }

    pub fn record_midi_send_failed(&self, axis: Axis, reason: impl Into<String>) {
        self.collector.publish(MetricEvent::MidiSendFailed {
            axis,
            reason: reason.into(),
        });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_calibration_warning(&self, step: CalibrationStep, kind: CalibrationWarningKind) {
        self.collector
            .publish(MetricEvent::CalibrationWarning { step, kind });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 30)
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::FramesDropped { total: 1 });
        collector.publish(MetricEvent::CaptureFault {
            consecutive_errors: 2,
            reason: "timeout".to_string(),
        });
        collector.publish(MetricEvent::Lifecycle {
            phase: LifecyclePhase::PipelineStarted,
            timestamp_ms: 0,
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0], MetricEvent::FramesDropped { total: 1 });
        assert!(matches!(snapshot.recent[2], MetricEvent::Lifecycle { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for total in 1..=3 {
            collector.publish(MetricEvent::FramesDropped { total });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.recent[0], MetricEvent::FramesDropped { total: 2 });
    }

    #[test]
    fn hub_reports_latency_once_per_window() {
        let hub = TelemetryHub::new(8, 8, 4);
        for ms in [2, 4, 6, 8] {
            hub.record_latency(Duration::from_millis(ms));
        }
        hub.record_latency(Duration::from_millis(100));

        let latency: Vec<_> = hub
            .snapshot()
            .recent
            .into_iter()
            .filter(|event| matches!(event, MetricEvent::Latency { .. }))
            .collect();
        assert_eq!(latency.len(), 1);
        assert!(matches!(
            latency[0],
            MetricEvent::Latency { avg_ms, max_ms, sample_count: 4 }
                if (avg_ms - 5.0).abs() < 0.01 && (max_ms - 8.0).abs() < 0.01
        ));
    }

    #[test]
    fn frame_drops_are_debounced() {
        let hub = TelemetryHub::new(8, 16, 4);
        for total in 1..=12 {
            hub.record_frames_dropped(total);
        }

        let reported: Vec<u64> = hub
            .snapshot()
            .recent
            .into_iter()
            .filter_map(|event| match event {
                MetricEvent::FramesDropped { total } => Some(total),
                _ => None,
            })
            .collect();
        assert_eq!(reported, vec![1, 11]);
    }

    #[test]
    fn subscribers_receive_events() {
        let hub = TelemetryHub::new(8, 8, 4);
        let mut rx = hub.collector().subscribe();
        hub.record_midi_send_failed(Axis::Yaw, "port gone");

        match rx.try_recv() {
            Ok(MetricEvent::MidiSendFailed { axis, reason }) => {
                assert_eq!(axis, Axis::Yaw);
                assert_eq!(reason, "port gone");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
