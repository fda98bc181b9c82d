//! Single-slot "latest value wins" handoff between threads.
//!
//! `Handoff` is deliberately not a queue. A send overwrites whatever value is
//! still waiting, so a slow receiver always sees the freshest status and never
//! a backlog. This mirrors the bounded(1) drain-then-send pattern used for
//! render snapshots, but makes the overwrite atomic under one lock so it also
//! holds with several receivers racing for the slot.
//!
//! - `send` never blocks and never fails.
//! - `receive` parks the thread on a condition variable until a value is
//!   present, then takes it. Each sent value reaches at most one receiver.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{Error, Result};

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

#[derive(Debug)]
pub struct Handoff<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    // The slot is a plain Option plus a flag; a panic while holding the
    // lock cannot leave it half-written, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` as the pending value and wake one receiver.
    ///
    /// Any value that was still pending is dropped. After [`close`](Self::close)
    /// the value is discarded.
    pub fn send(&self, value: T) {
        {
            let mut slot = self.lock();
            if slot.closed {
                return;
            }
            slot.value = Some(value);
        }
        self.ready.notify_one();
    }

    /// Block until a value is available and take it.
    ///
    /// Returns [`Error::ChannelClosed`] once the handoff is closed and no
    /// value is left.
    pub fn receive(&self) -> Result<T> {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return Ok(value);
            }
            if slot.closed {
                return Err(Error::ChannelClosed);
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`receive`](Self::receive), giving up with [`Error::Timeout`]
    /// after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return Ok(value);
            }
            if slot.closed {
                return Err(Error::ChannelClosed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            slot = self
                .ready
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Take the pending value without blocking.
    pub fn try_receive(&self) -> Option<T> {
        self.lock().value.take()
    }

    /// Whether a value is waiting to be received.
    pub fn has_pending(&self) -> bool {
        self.lock().value.is_some()
    }

    /// Stop accepting values and wake every blocked receiver.
    ///
    /// A value already pending can still be received once.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}
