//! Scene objects and the drawing interface
//!
//! Every object shares [`ObjectCommon`] geometry and state; the per-type
//! behaviour lives in a [`Widget`] payload that implements [`Drawable`].
//! Objects are stored in their display's arena and painted in the display's
//! `order`, back to front.

pub mod align;

use alloc::vec::Vec;

pub use align::{Align, Alignment};

use crate::area::{FlushArea, Rect};
use crate::arena::handle_type;
use crate::dirty::DirtyTracker;
use crate::display::{DisplayEvent, DisplayId};
use crate::error::Error;
use crate::timer::TimerManager;
use crate::touch::TouchEvent;
use crate::widget::Widget;

handle_type! {
    /// Handle to an object within its display
    ObjectId
}

/// Fully qualified object handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectRef {
    pub display: DisplayId,
    pub object: ObjectId,
}

/// State every object carries regardless of type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectCommon {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub align: Alignment,
    pub visible: bool,
    /// Content changed; `update` must rebuild cached pixels
    pub dirty: bool,
    /// Alignment must be re-resolved before the next paint
    pub layout_dirty: bool,
}

impl Default for ObjectCommon {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            align: Alignment::default(),
            visible: true,
            dirty: true,
            layout_dirty: false,
        }
    }
}

impl ObjectCommon {
    /// Screen bounds, `None` while the object has no size
    pub fn bounds(&self) -> Option<Rect> {
        let r = Rect::from_size(self.x, self.y, self.w, self.h);
        r.is_valid().then_some(r)
    }

    /// Whether a point falls inside `[x, x+w) × [y, y+h)`
    pub fn hit(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x + self.w as i32 && py >= self.y && py < self.y + self.h as i32
    }

    /// Resolve alignment against a parent; returns whether the position moved
    pub fn apply_alignment(&mut self, pw: u32, ph: u32) -> bool {
        if !self.align.enabled {
            return false;
        }
        let a = self.align;
        let (x, y) = a.kind.compute(pw, ph, self.w, self.h, a.x_ofs, a.y_ofs);
        let moved = (x, y) != (self.x, self.y);
        self.x = x;
        self.y = y;
        moved
    }
}

/// A scene object: common state plus its widget payload
#[derive(Debug)]
pub struct SceneObject {
    pub common: ObjectCommon,
    pub widget: Widget,
}

impl SceneObject {
    pub fn new(widget: Widget) -> Self {
        let mut common = ObjectCommon::default();
        if let Some((w, h)) = widget.initial_size() {
            common.w = w;
            common.h = h;
        }
        Self { common, widget }
    }
}

/// Pixel window an object draws into
///
/// `buf` holds exactly `area.pixels()` raw pixels, row stride `area.width()`.
pub struct DrawTarget<'a> {
    pub area: FlushArea,
    pub buf: &'a mut [u16],
    pub swap: bool,
}

impl DrawTarget<'_> {
    /// Index of the pixel at screen coordinates `(x, y)`
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> usize {
        (y - self.area.y1) as usize * self.area.width() + (x - self.area.x1) as usize
    }

    pub fn stride(&self) -> usize {
        self.area.width()
    }
}

/// Everything a widget may touch besides its own object
pub struct ObjCtx<'a> {
    pub dirty: &'a mut DirtyTracker,
    pub timers: &'a mut TimerManager,
    pub events: &'a mut Vec<(DisplayEvent, ObjectId)>,
    pub me: ObjectRef,
    pub now_ms: u32,
    /// Parent size used for alignment
    pub screen: (u32, u32),
}

impl ObjCtx<'_> {
    /// Queue the object's current bounds for repaint
    pub fn invalidate(&mut self, obj: &ObjectCommon) {
        if let Some(r) = obj.bounds() {
            self.dirty.invalidate(Some(r));
        }
    }

    /// Queue an update event for the application
    pub fn emit(&mut self, event: DisplayEvent) {
        self.events.push((event, self.me.object));
    }

    /// Change size, re-resolve alignment and repaint old and new bounds
    pub fn resize(&mut self, obj: &mut ObjectCommon, w: u32, h: u32) {
        if (obj.w, obj.h) == (w, h) {
            return;
        }
        self.invalidate(obj);
        obj.w = w;
        obj.h = h;
        let (pw, ph) = self.screen;
        obj.apply_alignment(pw, ph);
        self.invalidate(obj);
    }
}

/// Per-type object behaviour
pub trait Drawable {
    /// Called once right after the object is added to its display
    fn attach(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) -> Result<(), Error> {
        let _ = (obj, ctx);
        Ok(())
    }

    /// Paint the part of the object inside `target.area`
    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>);

    /// Rebuild cached content before painting
    fn update(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        let _ = (obj, ctx);
    }

    /// Release timers and other resources
    fn delete(&mut self, ctx: &mut ObjCtx<'_>) {
        let _ = ctx;
    }

    /// React to a touch event routed to this object
    fn touch(&mut self, obj: &mut ObjectCommon, event: &TouchEvent) {
        let _ = (obj, event);
    }

    /// Size comes from the content and cannot be set directly
    fn intrinsic_size(&self) -> bool {
        false
    }
}
