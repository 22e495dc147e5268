//! Per-display scene state
//!
//! A [`DisplayState`] owns everything one panel needs between frames: its
//! frame buffers, dirty list, object arena and paint order. It knows nothing
//! about threads; the engine wraps it behind its lock and drives
//! [`render_pass`](crate::render::render_pass) on it.

use alloc::vec::Vec;

use log::{debug, warn};

use crate::area::Rect;
use crate::arena::{handle_type, Arena};
use crate::blend::Color;
use crate::buffer::FrameBufferSet;
use crate::dirty::DirtyTracker;
use crate::error::Error;
use crate::object::{Align, Drawable, ObjCtx, ObjectCommon, ObjectId, ObjectRef, SceneObject};
use crate::timer::{TimerManager, TimerTarget};
use crate::touch::TouchEvent;
use crate::widget::Widget;

handle_type! {
    /// Handle to a display within a graphics context
    DisplayId
}

/// Panel and buffer placement options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplayFlags {
    /// Store pixels byte-swapped
    pub swap: bool,
    /// Buffers must be DMA capable
    pub buff_dma: bool,
    /// Buffers may live in external RAM
    pub buff_spiram: bool,
    /// Allocate a second buffer and alternate between them
    pub double_buffer: bool,
}

impl DisplayFlags {
    pub fn validate(&self) -> Result<(), Error> {
        if self.buff_dma && self.buff_spiram {
            warn!("dma and spiram buffers are mutually exclusive");
            return Err(Error::NotSupported);
        }
        Ok(())
    }
}

/// Notification passed to the application's update callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayEvent {
    Idle,
    /// An animation advanced one frame
    OneFrameDone,
    /// An animation reached the end of its segment
    AllFrameDone,
}

pub struct DisplayState {
    pub(crate) id: DisplayId,
    pub(crate) h_res: u32,
    pub(crate) v_res: u32,
    pub(crate) bg_color: Color,
    pub(crate) flags: DisplayFlags,
    pub(crate) buffers: FrameBufferSet,
    pub(crate) dirty: DirtyTracker,
    pub(crate) objects: Arena<SceneObject>,
    /// Paint order, back to front
    pub(crate) order: Vec<ObjectId>,
    pub(crate) events: Vec<(DisplayEvent, ObjectId)>,
}

impl DisplayState {
    pub fn new(
        id: DisplayId,
        h_res: u32,
        v_res: u32,
        flags: DisplayFlags,
        buffers: FrameBufferSet,
    ) -> Result<Self, Error> {
        if h_res == 0 || v_res == 0 {
            return Err(Error::InvalidArg);
        }
        flags.validate()?;
        if flags.double_buffer && !buffers.is_double_buffered() {
            return Err(Error::InvalidArg);
        }

        debug!("display {}x{}, {} px per buffer", h_res, v_res, buffers.buf_pixels());
        Ok(Self {
            id,
            h_res,
            v_res,
            bg_color: Color::BLACK,
            flags,
            buffers,
            dirty: DirtyTracker::new(h_res, v_res),
            objects: Arena::new(),
            order: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.h_res, self.v_res)
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    pub fn bg_color(&self) -> Color {
        self.bg_color
    }

    /// Change the colour chunks are cleared to; repaints everything
    pub fn set_bg_color(&mut self, color: Color) {
        self.bg_color = color;
        self.dirty.invalidate_all();
    }

    pub fn buffers(&self) -> &FrameBufferSet {
        &self.buffers
    }

    /// Tear down, returning the buffers
    pub fn into_buffers(self) -> FrameBufferSet {
        self.buffers
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// Queue a region for repaint; `None` drops every pending region
    pub fn invalidate(&mut self, area: Option<Rect>) {
        self.dirty.invalidate(area);
    }

    pub fn invalidate_all(&mut self) {
        self.dirty.invalidate_all();
    }

    /// Update events queued since the last call
    pub fn take_events(&mut self) -> Vec<(DisplayEvent, ObjectId)> {
        core::mem::take(&mut self.events)
    }

    pub fn object_count(&self) -> usize {
        self.order.len()
    }

    /// Objects back to front
    pub fn order(&self) -> &[ObjectId] {
        &self.order
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(id.0)
    }

    /// Add an object on top of the paint order
    pub fn create_object(&mut self, widget: Widget, timers: &mut TimerManager, now_ms: u32) -> Result<ObjectId, Error> {
        self.order.try_reserve(1)?;
        let key = self
            .objects
            .try_insert(SceneObject::new(widget))
            .map_err(|_| Error::NoMem)?;
        let id = ObjectId(key);

        let attached = self.with_object(id, timers, now_ms, |obj, widget, ctx| widget.attach(obj, ctx));
        if let Err(e) = attached.and_then(|r| r) {
            self.objects.remove(key);
            return Err(e);
        }

        self.order.push(id);
        if let Some(obj) = self.objects.get(key) {
            mark(&mut self.dirty, obj.common.bounds());
        }
        debug!("object {} created", key.index);
        Ok(id)
    }

    /// Remove an object, cancelling its timers
    pub fn delete_object(&mut self, id: ObjectId, timers: &mut TimerManager, now_ms: u32) -> Result<(), Error> {
        let pos = self.order.iter().position(|o| *o == id).ok_or(Error::NotFound)?;
        self.order.remove(pos);

        let mut obj = self.objects.remove(id.0).ok_or(Error::NotFound)?;
        mark(&mut self.dirty, obj.common.bounds());

        let mut ctx = ObjCtx {
            dirty: &mut self.dirty,
            timers,
            events: &mut self.events,
            me: ObjectRef {
                display: self.id,
                object: id,
            },
            now_ms,
            screen: (self.h_res, self.v_res),
        };
        obj.widget.delete(&mut ctx);
        Ok(())
    }

    /// Delete every object, back to front
    pub fn clear_objects(&mut self, timers: &mut TimerManager, now_ms: u32) {
        while let Some(&id) = self.order.last() {
            if self.delete_object(id, timers, now_ms).is_err() {
                self.order.pop();
            }
        }
    }

    /// Run `f` with an object's state and a context for invalidation and timers
    pub fn with_object<R>(
        &mut self,
        id: ObjectId,
        timers: &mut TimerManager,
        now_ms: u32,
        f: impl FnOnce(&mut ObjectCommon, &mut Widget, &mut ObjCtx<'_>) -> R,
    ) -> Result<R, Error> {
        let obj = self.objects.get_mut(id.0).ok_or(Error::NotFound)?;
        let mut ctx = ObjCtx {
            dirty: &mut self.dirty,
            timers,
            events: &mut self.events,
            me: ObjectRef {
                display: self.id,
                object: id,
            },
            now_ms,
            screen: (self.h_res, self.v_res),
        };
        Ok(f(&mut obj.common, &mut obj.widget, &mut ctx))
    }

    /// Deliver an expired widget timer to its object
    pub fn dispatch_timer(
        &mut self,
        id: ObjectId,
        target: TimerTarget,
        timers: &mut TimerManager,
        now_ms: u32,
    ) -> Result<(), Error> {
        self.with_object(id, timers, now_ms, |obj, widget, ctx| widget.on_timer(target, obj, ctx))
    }

    fn common_mut(&mut self, id: ObjectId) -> Result<&mut ObjectCommon, Error> {
        self.objects
            .get_mut(id.0)
            .map(|o| &mut o.common)
            .ok_or(Error::NotFound)
    }

    fn common(&self, id: ObjectId) -> Result<&ObjectCommon, Error> {
        self.objects.get(id.0).map(|o| &o.common).ok_or(Error::NotFound)
    }

    /// Move an object; explicit placement turns alignment off
    pub fn set_pos(&mut self, id: ObjectId, x: i32, y: i32) -> Result<(), Error> {
        let obj = self.objects.get_mut(id.0).ok_or(Error::NotFound)?;
        let c = &mut obj.common;
        mark(&mut self.dirty, c.bounds());
        c.x = x;
        c.y = y;
        c.align.enabled = false;
        mark(&mut self.dirty, c.bounds());
        Ok(())
    }

    pub fn pos(&self, id: ObjectId) -> Result<(i32, i32), Error> {
        self.common(id).map(|c| (c.x, c.y))
    }

    /// Resize an object; images and animations keep their source size
    pub fn set_size(&mut self, id: ObjectId, w: u32, h: u32) -> Result<(), Error> {
        let obj = self.objects.get_mut(id.0).ok_or(Error::NotFound)?;
        if obj.widget.intrinsic_size() {
            warn!("{:?} takes its size from its source", obj.widget);
            return Ok(());
        }

        let c = &mut obj.common;
        mark(&mut self.dirty, c.bounds());
        c.w = w;
        c.h = h;
        c.dirty = true;
        if c.align.enabled {
            c.layout_dirty = true;
        }
        mark(&mut self.dirty, c.bounds());
        Ok(())
    }

    pub fn size(&self, id: ObjectId) -> Result<(u32, u32), Error> {
        self.common(id).map(|c| (c.w, c.h))
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<(), Error> {
        let c = self.common_mut(id)?;
        c.visible = visible;
        let bounds = c.bounds();
        mark(&mut self.dirty, bounds);
        Ok(())
    }

    pub fn visible(&self, id: ObjectId) -> Result<bool, Error> {
        self.common(id).map(|c| c.visible)
    }

    /// Place an object relative to the screen and keep it there on resize
    pub fn align(&mut self, id: ObjectId, kind: Align, x_ofs: i32, y_ofs: i32) -> Result<(), Error> {
        let (pw, ph) = (self.h_res, self.v_res);
        let obj = self.objects.get_mut(id.0).ok_or(Error::NotFound)?;
        let c = &mut obj.common;

        mark(&mut self.dirty, c.bounds());
        c.align.kind = kind;
        c.align.x_ofs = x_ofs;
        c.align.y_ofs = y_ofs;
        c.align.enabled = true;
        c.apply_alignment(pw, ph);
        mark(&mut self.dirty, c.bounds());
        c.layout_dirty = true;
        Ok(())
    }

    /// Topmost visible object containing the point
    pub fn hit_test(&self, x: i32, y: i32) -> Option<ObjectId> {
        self.order.iter().rev().copied().find(|id| {
            self.objects
                .get(id.0)
                .is_some_and(|o| o.common.visible && o.common.hit(x, y))
        })
    }

    /// Feed a touch event to an object's widget
    pub fn touch_object(&mut self, id: ObjectId, event: &TouchEvent) -> Result<(), Error> {
        let obj = self.objects.get_mut(id.0).ok_or(Error::NotFound)?;
        obj.widget.touch(&mut obj.common, event);
        Ok(())
    }
}

/// Invalidate bounds if the object has any
fn mark(dirty: &mut DirtyTracker, bounds: Option<Rect>) {
    if let Some(r) = bounds {
        dirty.invalidate(Some(r));
    }
}
