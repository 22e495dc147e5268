//! Touch device handles

use std::sync::Arc;

use log::debug;
use tessera_core::{Error, TouchEvent, TouchId};
use tessera_hal::{InterruptError, IrqNotifier, TouchController, TouchPoint};

use crate::context::Shared;
use crate::display::Display;

/// Object-safe view of a [`TouchController`]
pub(crate) trait ErasedTouch: Send {
    /// Latch a report and return the first contact, if any
    fn sample(&mut self) -> Result<Option<TouchPoint>, String>;

    fn enable_interrupt(&mut self, notifier: IrqNotifier) -> Result<(), InterruptError>;

    fn disable_interrupt(&mut self);
}

impl<T: TouchController> ErasedTouch for T {
    fn sample(&mut self) -> Result<Option<TouchPoint>, String> {
        self.read().map_err(|e| format!("{:?}", e))?;
        let mut points = [TouchPoint::default(); 1];
        let n = self.points(&mut points).map_err(|e| format!("{:?}", e))?;
        Ok((n > 0).then_some(points[0]))
    }

    fn enable_interrupt(&mut self, notifier: IrqNotifier) -> Result<(), InterruptError> {
        TouchController::enable_interrupt(self, notifier)
    }

    fn disable_interrupt(&mut self) {
        TouchController::disable_interrupt(self)
    }
}

/// Handle to a touch device registered with a [`GraphicsContext`](crate::GraphicsContext)
pub struct TouchDevice {
    id: TouchId,
    shared: Arc<Shared>,
}

impl TouchDevice {
    pub(crate) fn new(id: TouchId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> TouchId {
        self.id
    }

    /// Route hits to objects on `display`
    ///
    /// A contact in progress is dropped so it cannot be routed to an object
    /// on the old display.
    pub fn set_display(&self, display: &Display) -> Result<(), Error> {
        let did = display.id();
        self.shared.try_scene(|scene, _| {
            if !scene.displays.contains(did.0) {
                return Err(Error::NotFound);
            }
            let dev = scene.touch_mut(self.id)?;
            dev.display = Some(did);
            dev.tracker.unbind();
            Ok(())
        })?;
        debug!("touch {} bound to display {}", self.id.0.index, did.0.index);
        Ok(())
    }

    /// Receive every event the device produces, routed or not
    pub fn set_event_cb(&self, cb: impl Fn(&TouchEvent) + Send + Sync + 'static) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| {
            scene.touch_mut(self.id)?.event_cb = Some(Arc::new(cb));
            Ok(())
        })
    }

    /// Whether reads are gated on the controller interrupt
    pub fn uses_interrupt(&self) -> Result<bool, Error> {
        self.shared
            .try_scene(|scene, _| Ok(scene.touch_mut(self.id)?.irq.is_some()))
    }

    pub fn is_pressed(&self) -> Result<bool, Error> {
        self.shared
            .try_scene(|scene, _| Ok(scene.touch_mut(self.id)?.tracker.is_pressed()))
    }

    /// Detach the interrupt, stop polling and drop the controller
    pub fn delete(self) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| scene.delete_touch(self.id))
    }
}
