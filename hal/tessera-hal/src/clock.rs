//! Monotonic time base
//!
//! Timers, touch timestamps and FPS statistics all run off a wrapping
//! millisecond counter.

/// Monotonic millisecond clock
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary epoch, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;
}

/// Milliseconds elapsed since `since`, tolerant of counter wrap-around
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
