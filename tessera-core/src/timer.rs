//! Cooperative timers and frame-rate statistics
//!
//! Timers never run on their own: the render thread calls
//! [`TimerManager::next_expired`] in a loop each iteration and dispatches on
//! the returned payload. All arithmetic is on wrapping millisecond ticks.

use log::trace;
use tessera_hal::clock::elapsed_ms;

use crate::arena::{handle_type, Arena};
use crate::error::Error;
use crate::object::ObjectRef;
use crate::touch::TouchId;

handle_type! {
    /// Handle to a timer owned by a [`TimerManager`]
    TimerId
}

/// Repeat forever
pub const REPEAT_INFINITE: i32 = -1;

/// Number of frames averaged for the FPS estimate
pub const FPS_SAMPLES: u32 = 100;

/// What an expired timer should drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerTarget {
    /// Advance an animation by one frame
    Animation(ObjectRef),
    /// Scroll a label by one step
    LabelScroll(ObjectRef),
    /// Snap a label to the next word
    LabelSnap(ObjectRef),
    /// Sample a touch controller
    TouchPoll(TouchId),
    /// Application callback, looked up by timer id
    App,
}

#[derive(Debug)]
struct Timer<T> {
    period_ms: u32,
    last_run_ms: u32,
    repeat_count: i32,
    paused: bool,
    payload: T,
}

impl<T> Timer<T> {
    fn remaining(&self, now: u32) -> u32 {
        self.period_ms.saturating_sub(elapsed_ms(now, self.last_run_ms))
    }
}

/// Frame-rate bookkeeping
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct FpsStats {
    target_fps: u32,
    actual_fps: u32,
    samples: u32,
    total_ms: u32,
}

/// Timer list plus FPS statistics for one graphics context
#[derive(Debug)]
pub struct TimerManager<T = TimerTarget> {
    timers: Arena<Timer<T>>,
    fps: FpsStats,
}

impl<T: Copy> TimerManager<T> {
    pub fn new(target_fps: u32) -> Self {
        Self {
            timers: Arena::new(),
            fps: FpsStats {
                target_fps,
                actual_fps: 0,
                samples: 0,
                total_ms: 0,
            },
        }
    }

    /// Register a running timer that first fires `period_ms` after `now`
    pub fn create(&mut self, period_ms: u32, payload: T, now: u32) -> Result<TimerId, Error> {
        let timer = Timer {
            period_ms,
            last_run_ms: now,
            repeat_count: REPEAT_INFINITE,
            paused: false,
            payload,
        };
        self.timers
            .try_insert(timer)
            .map(TimerId)
            .map_err(|_| Error::NoMem)
    }

    pub fn delete(&mut self, id: TimerId) -> Result<(), Error> {
        self.timers.remove(id.0).map(|_| ()).ok_or(Error::NotFound)
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn timer_mut(&mut self, id: TimerId) -> Result<&mut Timer<T>, Error> {
        self.timers.get_mut(id.0).ok_or(Error::NotFound)
    }

    pub fn pause(&mut self, id: TimerId) -> Result<(), Error> {
        self.timer_mut(id)?.paused = true;
        Ok(())
    }

    pub fn resume(&mut self, id: TimerId) -> Result<(), Error> {
        self.timer_mut(id)?.paused = false;
        Ok(())
    }

    pub fn is_paused(&self, id: TimerId) -> Option<bool> {
        self.timers.get(id.0).map(|t| t.paused)
    }

    /// Restart the period from `now`
    pub fn reset(&mut self, id: TimerId, now: u32) -> Result<(), Error> {
        self.timer_mut(id)?.last_run_ms = now;
        Ok(())
    }

    pub fn set_period(&mut self, id: TimerId, period_ms: u32) -> Result<(), Error> {
        self.timer_mut(id)?.period_ms = period_ms;
        Ok(())
    }

    pub fn period(&self, id: TimerId) -> Option<u32> {
        self.timers.get(id.0).map(|t| t.period_ms)
    }

    /// Number of times left to fire, [`REPEAT_INFINITE`] for no limit
    pub fn set_repeat_count(&mut self, id: TimerId, count: i32) -> Result<(), Error> {
        self.timer_mut(id)?.repeat_count = count;
        Ok(())
    }

    /// Pop the next due timer
    ///
    /// The timer's period restarts at `now`. A timer whose repeat count runs
    /// out is removed before its payload is returned, so the caller sees it
    /// fire exactly once more.
    pub fn next_expired(&mut self, now: u32) -> Option<(TimerId, T)> {
        let key = self
            .timers
            .iter()
            .find(|(_, t)| !t.paused && elapsed_ms(now, t.last_run_ms) >= t.period_ms)
            .map(|(k, _)| k)?;

        let timer = self.timers.get_mut(key)?;
        timer.last_run_ms = now;
        let payload = timer.payload;

        if timer.repeat_count > 0 {
            timer.repeat_count -= 1;
        }
        if timer.repeat_count == 0 {
            trace!("timer {} finished", key.index);
            self.timers.remove(key);
        }

        Some((TimerId(key), payload))
    }

    /// Milliseconds until the next unpaused timer is due, `None` if none is
    pub fn next_delay(&self, now: u32) -> Option<u32> {
        self.timers
            .iter()
            .filter(|(_, t)| !t.paused)
            .map(|(_, t)| t.remaining(now))
            .min()
    }

    /// Account one rendered frame that took `elapsed_ms`
    ///
    /// The estimate is refreshed every [`FPS_SAMPLES`] frames.
    pub fn record_frame(&mut self, elapsed_ms: u32) {
        let s = &mut self.fps;
        s.samples += 1;
        s.total_ms = s.total_ms.saturating_add(elapsed_ms);

        if s.samples >= FPS_SAMPLES {
            if s.total_ms > 0 {
                s.actual_fps = s.samples * 1000 / s.total_ms;
            }
            s.samples = 0;
            s.total_ms = 0;
        }
    }

    /// Measured frames per second, 0 until the first window completes
    pub fn actual_fps(&self) -> u32 {
        self.fps.actual_fps
    }

    pub fn target_fps(&self) -> u32 {
        self.fps.target_fps
    }

    pub fn set_target_fps(&mut self, fps: u32) {
        self.fps.target_fps = fps;
    }
}
