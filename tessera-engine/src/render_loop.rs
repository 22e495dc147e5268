//! The render thread
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!  lock ─► NEED_DELETE? ─yes─► DELETE_DONE, exit        │
//!        │ no                                           │
//!        ▼                                              │
//!  run timers ─► render displays ─► fire callbacks ─► unlock ─► sleep
//! ```
//!
//! The sleep waits on `NEED_DELETE`, so a shutdown request cuts it short.

use std::thread;
use std::time::Duration;

use log::{error, info, trace};

use crate::context::Shared;
use crate::event::{DELETE_DONE, NEED_DELETE};

/// How long to wait for the scene lock before logging and retrying
const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed lock attempt
const LOCK_RETRY: Duration = Duration::from_millis(1);

/// Idle delay when no timer is pending
const IDLE_DELAY_MS: u32 = 5;

/// Milliseconds to sleep before the next iteration
///
/// Never less than one scheduler tick plus a millisecond, and at least
/// [`IDLE_DELAY_MS`] when no timer is pending.
pub(crate) fn task_delay(timer_delay: Option<u32>, tick_hz: u32) -> u32 {
    let min = 1000 / tick_hz.max(1) + 1;
    match timer_delay {
        None => min.max(IDLE_DELAY_MS),
        Some(d) => d.max(min),
    }
}

pub(crate) fn run(shared: &Shared) {
    info!("render thread running");
    let flush_timeout = Duration::from_millis(shared.config.flush_timeout_ms as u64);
    let tick_hz = shared.config.tick_hz;
    let mut pending = Vec::new();

    loop {
        let guard = match shared.lock.try_lock_for(LOCK_TIMEOUT) {
            Ok(g) => g,
            Err(e) => {
                error!("render thread could not take the scene lock: {}", e);
                thread::sleep(LOCK_RETRY);
                continue;
            }
        };

        if shared.events.get() & NEED_DELETE != 0 {
            shared.events.set(DELETE_DONE);
            drop(guard);
            break;
        }

        let now = shared.now_ms();
        {
            let mut scene = shared.scene();
            scene.run_timers(now, &mut pending);
            let stats = scene.render(now, flush_timeout, &mut pending);
            if !stats.is_idle() {
                trace!("frame at {} ms: {} px", now, stats.pixels);
            }
        }

        // Data mutex released; callbacks may use the scene API
        for cb in pending.drain(..) {
            cb.fire();
        }
        // Callbacks may have added or rearmed timers
        let timer_delay = shared.scene().timers.next_delay(shared.now_ms());
        drop(guard);

        let delay = task_delay(timer_delay, tick_hz);
        // Timing out is the normal wake-up; NEED_DELETE is handled under the lock
        shared
            .events
            .wait(NEED_DELETE, false, Some(Duration::from_millis(delay as u64)))
            .ok();
    }

    info!("render thread stopped");
}
