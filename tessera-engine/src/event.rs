//! Event bit groups
//!
//! A small bitset that one side sets and another side blocks on. Setting is
//! an atomic `fetch_or` followed by a wake-up, so flush-done notifications
//! can come from any thread, including driver completion handlers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tessera_core::Error;

/// Render thread must exit
pub const NEED_DELETE: u32 = 1 << 0;
/// Render thread has exited its loop
pub const DELETE_DONE: u32 = 1 << 1;

/// Panel driver finished the last band
pub const FLUSH_DONE: u32 = 1 << 0;

#[derive(Debug, Default)]
pub struct EventBits {
    bits: AtomicU32,
    gate: Mutex<()>,
    changed: Condvar,
}

impl EventBits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `bits` and wake every waiter
    pub fn set(&self, bits: u32) {
        self.bits.fetch_or(bits, Ordering::AcqRel);
        // Taking the gate orders the wake-up after any waiter's check
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.changed.notify_all();
    }

    pub fn clear(&self, bits: u32) {
        self.bits.fetch_and(!bits, Ordering::AcqRel);
    }

    pub fn get(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    /// Block until any of `bits` is set
    ///
    /// Returns the matching bits, clearing them first if `clear` is true.
    /// `None` waits forever.
    pub fn wait(&self, bits: u32, clear: bool, timeout: Option<Duration>) -> Result<u32, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let hit = if clear {
                self.bits.fetch_and(!bits, Ordering::AcqRel) & bits
            } else {
                self.get() & bits
            };
            if hit != 0 {
                return Ok(hit);
            }

            gate = match deadline {
                None => self.changed.wait(gate).unwrap_or_else(PoisonError::into_inner),
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(Error::Timeout);
                    }
                    self.changed
                        .wait_timeout(gate, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}
