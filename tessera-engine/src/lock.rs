//! Re-entrant scene lock
//!
//! The scene is guarded twice: an outer [`RecursiveLock`] that the owning
//! thread may take any number of times, and an inner data mutex held only
//! for the duration of a single operation. Application callbacks run with
//! the outer lock held but the inner one released, so they may call back
//! into the scene API.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::error;
use tessera_core::Error;

#[derive(Debug, Default)]
struct Owner {
    thread: Option<ThreadId>,
    depth: u32,
}

/// Mutex that its owning thread may lock again without deadlocking
#[derive(Debug, Default)]
pub struct RecursiveLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

/// Holds one level of a [`RecursiveLock`]; unlocks on drop
///
/// Not `Send`: it must be dropped by the thread that took it.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RecursiveGuard<'a> {
    lock: &'a RecursiveLock,
    _not_send: PhantomData<*const ()>,
}

impl RecursiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, Owner>, Error> {
        self.owner.lock().map_err(|_| {
            error!("scene lock poisoned");
            Error::InvalidState
        })
    }

    /// Block until the lock is held by the calling thread
    pub fn lock(&self) -> Result<RecursiveGuard<'_>, Error> {
        self.acquire(None)
    }

    /// Like [`lock`](Self::lock) but give up after `timeout`
    pub fn try_lock_for(&self, timeout: Duration) -> Result<RecursiveGuard<'_>, Error> {
        self.acquire(Some(timeout))
    }

    fn acquire(&self, timeout: Option<Duration>) -> Result<RecursiveGuard<'_>, Error> {
        let me = thread::current().id();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.state()?;

        loop {
            match st.thread {
                None => {
                    st.thread = Some(me);
                    st.depth = 1;
                    break;
                }
                Some(t) if t == me => {
                    st.depth += 1;
                    break;
                }
                Some(_) => {}
            }

            st = match deadline {
                None => self.released.wait(st).map_err(|_| Error::InvalidState)?,
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(Error::Timeout);
                    }
                    self.released
                        .wait_timeout(st, left)
                        .map_err(|_| Error::InvalidState)?
                        .0
                }
            };
        }

        Ok(RecursiveGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    fn release(&self) {
        let Ok(mut st) = self.owner.lock() else {
            return;
        };
        st.depth = st.depth.saturating_sub(1);
        if st.depth == 0 {
            st.thread = None;
            self.released.notify_one();
        }
    }

    /// Whether the calling thread currently holds the lock
    pub fn is_held_by_current(&self) -> bool {
        let me = thread::current().id();
        self.owner.lock().map(|st| st.thread == Some(me)).unwrap_or(false)
    }

    /// Nesting depth, 0 when unlocked
    pub fn depth(&self) -> u32 {
        self.owner.lock().map(|st| st.depth).unwrap_or(0)
    }
}

impl Drop for RecursiveGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
