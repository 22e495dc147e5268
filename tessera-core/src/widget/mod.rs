//! Widget payloads
//!
//! Each object type keeps its own state next to the shared
//! [`ObjectCommon`](crate::object::ObjectCommon). [`Widget`] is the closed
//! set of payloads a display can hold; it forwards [`Drawable`] calls and
//! routes expired timers to the widget that owns them.

pub mod anim;
pub mod image;
pub mod label;
pub mod qrcode;

use core::fmt;

use log::debug;

pub use anim::{Animation, Mirror};
pub use image::Image;
pub use label::{Label, LongMode, TextAlign};
pub use qrcode::QrCode;

use crate::error::Error;
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectCommon};
use crate::timer::TimerTarget;
use crate::touch::TouchEvent;

/// Object type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WidgetKind {
    Label,
    Image,
    Animation,
    QrCode,
}

pub enum Widget {
    Label(Label),
    Image(Image),
    Animation(Animation),
    QrCode(QrCode),
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Widget::{:?}", self.kind())
    }
}

impl Widget {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Widget::Label(_) => WidgetKind::Label,
            Widget::Image(_) => WidgetKind::Image,
            Widget::Animation(_) => WidgetKind::Animation,
            Widget::QrCode(_) => WidgetKind::QrCode,
        }
    }

    /// Size a freshly created object starts with
    pub fn initial_size(&self) -> Option<(u32, u32)> {
        match self {
            Widget::QrCode(q) => Some((q.size(), q.size())),
            _ => None,
        }
    }

    pub fn as_label_mut(&mut self) -> Option<&mut Label> {
        match self {
            Widget::Label(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut Image> {
        match self {
            Widget::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_animation_mut(&mut self) -> Option<&mut Animation> {
        match self {
            Widget::Animation(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_qrcode_mut(&mut self) -> Option<&mut QrCode> {
        match self {
            Widget::QrCode(q) => Some(q),
            _ => None,
        }
    }

    /// Deliver an expired widget timer
    pub fn on_timer(&mut self, target: TimerTarget, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        match (self, target) {
            (Widget::Animation(a), TimerTarget::Animation(_)) => a.on_timer(obj, ctx),
            (Widget::Label(l), TimerTarget::LabelScroll(_)) => l.on_scroll_timer(obj, ctx),
            (Widget::Label(l), TimerTarget::LabelSnap(_)) => l.on_snap_timer(obj, ctx),
            (w, t) => debug!("timer {:?} does not belong to {:?}", t, w),
        }
    }

    fn as_drawable(&mut self) -> &mut dyn Drawable {
        match self {
            Widget::Label(l) => l,
            Widget::Image(i) => i,
            Widget::Animation(a) => a,
            Widget::QrCode(q) => q,
        }
    }
}

impl Drawable for Widget {
    fn attach(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) -> Result<(), Error> {
        self.as_drawable().attach(obj, ctx)
    }

    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>) {
        self.as_drawable().draw(obj, target)
    }

    fn update(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        self.as_drawable().update(obj, ctx)
    }

    fn delete(&mut self, ctx: &mut ObjCtx<'_>) {
        self.as_drawable().delete(ctx)
    }

    fn touch(&mut self, obj: &mut ObjectCommon, event: &TouchEvent) {
        self.as_drawable().touch(obj, event)
    }

    fn intrinsic_size(&self) -> bool {
        matches!(self, Widget::Image(_) | Widget::Animation(_))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;

    #[test]
    fn test_qrcode_starts_square() {
        let w = Widget::QrCode(QrCode::new());
        assert_eq!(w.initial_size(), Some((100, 100)));
        assert_eq!(Widget::Label(Label::new()).initial_size(), None);
    }

    #[test]
    fn test_intrinsic_size_kinds() {
        assert!(Widget::Image(Image::new()).intrinsic_size());
        assert!(Widget::Animation(Animation::new()).intrinsic_size());
        assert!(!Widget::Label(Label::new()).intrinsic_size());
    }

    #[test]
    fn test_foreign_timer_is_ignored() {
        let mut h = Harness::new(100, 100);
        let mut w = Widget::Image(Image::new());
        let mut obj = ObjectCommon::default();
        w.on_timer(TimerTarget::LabelScroll(Harness::me()), &mut obj, &mut h.ctx());
        assert!(h.dirty.is_empty());
    }
}
