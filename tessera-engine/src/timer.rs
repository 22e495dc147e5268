//! Application timer handles

use std::sync::Arc;

use tessera_core::{Error, TimerId};

use crate::context::Shared;

/// Handle to an application timer
///
/// The timer repeats forever unless limited with
/// [`set_repeat_count`](Self::set_repeat_count). A timer that used up its
/// repeats is gone and every method then fails with [`Error::NotFound`].
pub struct TimerHandle {
    id: TimerId,
    shared: Arc<Shared>,
}

impl TimerHandle {
    pub(crate) fn new(id: TimerId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn pause(&self) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| scene.timers.pause(self.id))
    }

    pub fn resume(&self) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| scene.timers.resume(self.id))
    }

    /// Restart the current period from now
    pub fn reset(&self) -> Result<(), Error> {
        self.shared.try_scene(|scene, now| scene.timers.reset(self.id, now))
    }

    pub fn set_period(&self, period_ms: u32) -> Result<(), Error> {
        if period_ms == 0 {
            return Err(Error::InvalidArg);
        }
        self.shared
            .try_scene(|scene, _| scene.timers.set_period(self.id, period_ms))
    }

    /// Fire `count` more times, -1 for no limit
    pub fn set_repeat_count(&self, count: i32) -> Result<(), Error> {
        self.shared
            .try_scene(|scene, _| scene.timers.set_repeat_count(self.id, count))
    }

    pub fn is_active(&self) -> bool {
        self.shared
            .try_scene(|scene, _| Ok(scene.timers.contains(self.id)))
            .unwrap_or(false)
    }

    pub fn delete(self) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| {
            scene.app_timers.remove(&self.id);
            scene.timers.delete(self.id)
        })
    }
}
