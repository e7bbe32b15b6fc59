//! Shared bounded event buffer: a single mutex protecting a FIFO of pending
//! events, drained into batches under a size-or-time trigger.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use crate::event::{Batch, Event};

struct Inner {
    events: VecDeque<Event>,
    last_flush: Instant,
}

/// The buffer has no hard size cap in the original source; this soft cap
/// (10x batch size) bounds memory growth when the network is down and the
/// spool is saturated, dropping oldest-first with a logged warning. This is
/// the only permitted place where events may be lost (spec §4.C).
const SOFT_CAP_MULTIPLE: usize = 10;

pub struct SharedBuffer {
    inner: Mutex<Inner>,
    batch_size: usize,
}

impl SharedBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                last_flush: Instant::now(),
            }),
            batch_size,
        }
    }

    /// Appends an event; O(1); never blocks beyond mutex acquisition.
    pub fn enqueue(&self, event: Event) {
        let mut inner = self.inner.lock().expect("buffer mutex poisoned");
        let cap = self.batch_size.saturating_mul(SOFT_CAP_MULTIPLE).max(1);
        if inner.events.len() >= cap {
            inner.events.pop_front();
            tracing::warn!(cap, "buffer soft cap reached; dropped oldest event");
        }
        inner.events.push_back(event);
    }

    /// Under the mutex, extracts all current events as a batch and resets
    /// `last_flush` iff `count >= min_size` or `now - last_flush >= max_age`.
    /// Returns `None` otherwise (including when the buffer is empty).
    pub fn drain_if_ready(&self, min_size: usize, max_age_secs: f64, now: Instant) -> Option<Batch> {
        let mut inner = self.inner.lock().expect("buffer mutex poisoned");
        if inner.events.is_empty() {
            return None;
        }
        let age = now.saturating_duration_since(inner.last_flush).as_secs_f64();
        if inner.events.len() < min_size && age < max_age_secs {
            return None;
        }
        let drained: Vec<Event> = inner.events.drain(..).collect();
        inner.last_flush = now;
        Some(Batch::new(drained))
    }

    /// Unconditional extraction, used during shutdown.
    pub fn drain_all(&self) -> Batch {
        let mut inner = self.inner.lock().expect("buffer mutex poisoned");
        let drained: Vec<Event> = inner.events.drain(..).collect();
        inner.last_flush = Instant::now();
        Batch::new(drained)
    }
}
