// LatestMailbox - single-slot drop-latest handoff between capture and worker
//
// The producer never blocks: posting while an item is still pending replaces
// it and counts one dropped frame. The consumer waits with a timeout so it can
// run periodic work (calibration deadlines) when nothing arrives. Closing the
// mailbox wakes the consumer immediately.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
pub enum Take<T> {
    Item(T),
    Timeout,
    Closed,
}

struct Slot<T> {
    pending: Option<T>,
    closed: bool,
    posted: u64,
    dropped: u64,
}

pub struct LatestMailbox<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for LatestMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestMailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                closed: false,
                posted: 0,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Post an item, replacing any pending one.
    ///
    /// # Returns
    /// `false` once the mailbox is closed (item discarded).
    pub fn post(&self, item: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        if slot.pending.replace(item).is_some() {
            slot.dropped += 1;
        }
        slot.posted += 1;
        drop(slot);
        self.ready.notify_one();
        true
    }

    /// Wait up to `timeout` for the latest item.
    pub fn take_timeout(&self, timeout: Duration) -> Take<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if slot.closed {
                return Take::Closed;
            }
            if let Some(item) = slot.pending.take() {
                return Take::Item(item);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Take::Timeout;
            }
            slot = match self.ready.wait_timeout(slot, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Non-blocking take.
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.lock();
        if slot.closed {
            return None;
        }
        slot.pending.take()
    }

    pub fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        slot.pending = None;
        drop(slot);
        self.ready.notify_all();
    }

    /// Items overwritten before the consumer took them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn posted(&self) -> u64 {
        self.lock().posted
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // Slot holds plain data; a panic mid-update cannot leave it inconsistent
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
