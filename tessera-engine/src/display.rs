//! Display handles and flush acknowledgement

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tessera_core::widget::{self, Widget};
use tessera_core::{Color, DisplayEvent, DisplayId, Error, FlushArea, FlushSink, ObjectId, ObjectRef, Rect};

use crate::context::Shared;
use crate::event::{EventBits, FLUSH_DONE};
use crate::object::{Animation, Image, Label, Object, QrCode};
use crate::scene::{FlushCb, Scene};

#[derive(Debug)]
struct FlushState {
    events: EventBits,
    swap: AtomicBool,
}

/// Acknowledges flushed bands for one display
///
/// Cheap to clone and usable from any thread, including a DMA completion
/// handler. It never touches the scene lock.
#[derive(Debug, Clone)]
pub struct FlushNotifier {
    inner: Arc<FlushState>,
}

impl FlushNotifier {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(FlushState {
                events: EventBits::new(),
                swap: AtomicBool::new(true),
            }),
        }
    }

    /// The last band handed to the flush callback is on the panel
    ///
    /// `swap_act_buf` asks for the buffers to be swapped at the end of the
    /// current pass when the display is double buffered.
    pub fn ready(&self, swap_act_buf: bool) {
        self.inner.swap.store(swap_act_buf, Ordering::Release);
        self.inner.events.set(FLUSH_DONE);
    }

    fn swap_requested(&self) -> bool {
        self.inner.swap.load(Ordering::Acquire)
    }
}

/// Connects a render pass to the application's flush callback
pub(crate) struct EngineSink<'a> {
    cb: &'a mut FlushCb,
    notifier: &'a FlushNotifier,
    timeout: Duration,
}

impl<'a> EngineSink<'a> {
    pub fn new(cb: &'a mut FlushCb, notifier: &'a FlushNotifier, timeout: Duration) -> Self {
        Self { cb, notifier, timeout }
    }
}

impl FlushSink for EngineSink<'_> {
    fn begin(&mut self) {
        self.notifier.inner.events.clear(FLUSH_DONE);
    }

    fn flush(&mut self, display: DisplayId, area: &FlushArea, pixels: &[u16]) {
        (self.cb)(display, area, pixels);
    }

    fn wait(&mut self) -> Result<(), Error> {
        self.notifier
            .inner
            .events
            .wait(FLUSH_DONE, true, Some(self.timeout))
            .map(|_| ())
    }

    fn swap_requested(&self) -> bool {
        self.notifier.swap_requested()
    }
}

/// Caller-provided buffers returned when a display is deleted
pub type ReturnedBuffers = (Vec<u16>, Option<Vec<u16>>);

/// Handle to a display registered with a [`GraphicsContext`](crate::GraphicsContext)
#[derive(Clone)]
pub struct Display {
    id: DisplayId,
    shared: Arc<Shared>,
    notifier: FlushNotifier,
}

impl Display {
    pub(crate) fn new(id: DisplayId, shared: Arc<Shared>, notifier: FlushNotifier) -> Self {
        Self { id, shared, notifier }
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    /// Acknowledge the band passed to the flush callback
    ///
    /// This is the only display method a flush callback may call.
    pub fn flush_ready(&self, swap_act_buf: bool) {
        self.notifier.ready(swap_act_buf);
    }

    /// Handle for acknowledging flushes from another thread
    pub fn notifier(&self) -> FlushNotifier {
        self.notifier.clone()
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut crate::scene::DisplayEntry) -> Result<R, Error>) -> Result<R, Error> {
        self.shared.try_scene(|scene, _| f(scene.display_mut(self.id)?))
    }

    pub fn set_update_cb(&self, cb: impl Fn(DisplayEvent, ObjectId) + Send + Sync + 'static) -> Result<(), Error> {
        self.with_entry(|e| {
            e.update_cb = Some(Arc::new(cb));
            Ok(())
        })
    }

    pub fn set_user_data(&self, data: Box<dyn Any + Send>) -> Result<(), Error> {
        self.with_entry(|e| {
            e.user_data = Some(data);
            Ok(())
        })
    }

    /// Run `f` on the user data, if any was set
    ///
    /// The data is lifted out of the scene while `f` runs, so `f` may call
    /// other handle methods. Data set from inside `f` wins over the old value.
    pub fn with_user_data<R>(&self, f: impl FnOnce(Option<&mut (dyn Any + Send)>) -> R) -> Result<R, Error> {
        let _guard = self.shared.lock.lock()?;
        let mut data = self.with_entry(|e| Ok(e.user_data.take()))?;
        let out = f(data.as_deref_mut());
        // The display may have been deleted by `f`
        let _ = self.with_entry(|e| {
            if e.user_data.is_none() {
                e.user_data = data;
            }
            Ok(())
        });
        Ok(out)
    }

    pub fn set_bg_color(&self, color: Color) -> Result<(), Error> {
        self.with_entry(|e| {
            e.state.set_bg_color(color);
            Ok(())
        })
    }

    pub fn bg_color(&self) -> Result<Color, Error> {
        self.with_entry(|e| Ok(e.state.bg_color()))
    }

    /// Queue an area for repaint; `None` drops every pending area
    pub fn invalidate(&self, area: Option<Rect>) -> Result<(), Error> {
        self.with_entry(|e| {
            e.state.invalidate(area);
            Ok(())
        })
    }

    /// Queue the whole screen for repaint
    pub fn invalidate_all(&self) -> Result<(), Error> {
        self.with_entry(|e| {
            e.state.invalidate_all();
            Ok(())
        })
    }

    pub fn resolution(&self) -> Result<(u32, u32), Error> {
        self.with_entry(|e| Ok(e.state.resolution()))
    }

    pub fn object_count(&self) -> Result<usize, Error> {
        self.with_entry(|e| Ok(e.state.object_count()))
    }

    fn create(&self, widget: Widget) -> Result<Object, Error> {
        let object = self.shared.try_scene(|scene, now| {
            let Scene { displays, timers, .. } = scene;
            let entry = displays.get_mut(self.id.0).ok_or(Error::NotFound)?;
            entry.state.create_object(widget, timers, now)
        })?;
        Ok(Object::new(
            Arc::clone(&self.shared),
            ObjectRef {
                display: self.id,
                object,
            },
        ))
    }

    pub fn create_label(&self) -> Result<Label, Error> {
        self.create(Widget::Label(widget::Label::new())).map(Label::from_object)
    }

    pub fn create_image(&self) -> Result<Image, Error> {
        self.create(Widget::Image(widget::Image::new())).map(Image::from_object)
    }

    pub fn create_animation(&self) -> Result<Animation, Error> {
        self.create(Widget::Animation(widget::Animation::new()))
            .map(Animation::from_object)
    }

    pub fn create_qrcode(&self) -> Result<QrCode, Error> {
        self.create(Widget::QrCode(widget::QrCode::new())).map(QrCode::from_object)
    }

    /// Remove the display and every object on it
    ///
    /// Buffers the caller supplied at creation are handed back.
    pub fn delete(self) -> Result<Option<ReturnedBuffers>, Error> {
        let entry = self.shared.try_scene(|scene, now| scene.delete_display(self.id, now))?;
        let returned = entry.state.into_buffers().into_external();
        if returned.is_some() {
            debug!("handing back caller buffers of display {}", self.id.0.index);
        }
        info!("display {} deleted", self.id.0.index);
        Ok(returned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sink_waits_for_ack() {
        let notifier = FlushNotifier::new();
        let ack = notifier.clone();
        let mut cb: FlushCb = Box::new(move |_, _, _| {
            let ack = ack.clone();
            thread::spawn(move || ack.ready(false));
        });

        let mut sink = EngineSink::new(&mut cb, &notifier, Duration::from_secs(5));
        sink.begin();
        sink.flush(
            DisplayId(tessera_core::arena::Key {
                index: 0,
                generation: 0,
            }),
            &FlushArea::new(0, 0, 1, 1),
            &[0],
        );
        assert_eq!(sink.wait(), Ok(()));
        assert!(!sink.swap_requested());
    }

    #[test]
    fn test_sink_times_out_without_ack() {
        let notifier = FlushNotifier::new();
        let mut cb: FlushCb = Box::new(|_, _, _| {});
        let mut sink = EngineSink::new(&mut cb, &notifier, Duration::from_millis(5));

        // A stale acknowledgement from the previous band must not count
        notifier.ready(true);
        sink.begin();
        assert_eq!(sink.wait(), Err(Error::Timeout));
        assert!(sink.swap_requested());
    }
}
