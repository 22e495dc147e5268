//! Object handles
//!
//! [`Object`] carries the operations every object supports. The typed
//! handles ([`Label`], [`Image`], [`Animation`], [`QrCode`]) add the
//! per-widget setters and dereference to [`Object`] for the rest. Every call
//! takes the scene lock; a handle to a deleted object fails with
//! [`Error::NotFound`].

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tessera_core::blend::Opa;
use tessera_core::object::{ObjCtx, ObjectCommon};
use tessera_core::traits::{AnimationDecoder, Ecc, Font, ImageSource, QrEncoder};
use tessera_core::widget::{self, LongMode, Mirror, TextAlign, Widget};
use tessera_core::{Align, Color, DisplayId, Error, ObjectId, ObjectRef, TouchEvent};

use crate::context::Shared;
use crate::scene::Scene;

/// Handle to any object
#[derive(Clone)]
pub struct Object {
    shared: Arc<Shared>,
    oref: ObjectRef,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.oref).finish()
    }
}

impl Object {
    pub(crate) fn new(shared: Arc<Shared>, oref: ObjectRef) -> Self {
        Self { shared, oref }
    }

    pub fn id(&self) -> ObjectId {
        self.oref.object
    }

    pub fn display_id(&self) -> DisplayId {
        self.oref.display
    }

    pub fn object_ref(&self) -> ObjectRef {
        self.oref
    }

    fn with_display<R>(&self, f: impl FnOnce(&mut tessera_core::DisplayState) -> Result<R, Error>) -> Result<R, Error> {
        self.shared
            .try_scene(|scene, _| f(&mut scene.display_mut(self.oref.display)?.state))
    }

    /// Run `f` with the widget payload and an invalidation context
    pub(crate) fn with_widget<R>(
        &self,
        f: impl FnOnce(&mut ObjectCommon, &mut Widget, &mut ObjCtx<'_>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.shared.try_scene(|scene, now| {
            let Scene { displays, timers, .. } = scene;
            let entry = displays.get_mut(self.oref.display.0).ok_or(Error::NotFound)?;
            entry.state.with_object(self.oref.object, timers, now, f)?
        })
    }

    /// Move the object; this turns alignment off
    pub fn set_pos(&self, x: i32, y: i32) -> Result<(), Error> {
        self.with_display(|d| d.set_pos(self.oref.object, x, y))
    }

    pub fn pos(&self) -> Result<(i32, i32), Error> {
        self.with_display(|d| d.pos(self.oref.object))
    }

    /// Resize the object
    ///
    /// Ignored for images and animations, which take their size from the
    /// source.
    pub fn set_size(&self, w: u32, h: u32) -> Result<(), Error> {
        self.with_display(|d| d.set_size(self.oref.object, w, h))
    }

    pub fn size(&self) -> Result<(u32, u32), Error> {
        self.with_display(|d| d.size(self.oref.object))
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), Error> {
        self.with_display(|d| d.set_visible(self.oref.object, visible))
    }

    pub fn visible(&self) -> Result<bool, Error> {
        self.with_display(|d| d.visible(self.oref.object))
    }

    /// Position relative to the screen, kept when the object is resized
    pub fn align(&self, kind: Align, x_ofs: i32, y_ofs: i32) -> Result<(), Error> {
        self.with_display(|d| d.align(self.oref.object, kind, x_ofs, y_ofs))
    }

    /// Called for touch events routed to this object
    pub fn set_touch_cb(&self, cb: impl Fn(&TouchEvent) + Send + Sync + 'static) -> Result<(), Error> {
        self.shared.try_scene(|scene, _| {
            if !scene.display_mut(self.oref.display)?.state.contains(self.oref.object) {
                return Err(Error::NotFound);
            }
            scene.object_touch.insert(self.oref, Arc::new(cb));
            Ok(())
        })
    }

    /// Remove the object from its display and stop its timers
    pub fn delete(&self) -> Result<(), Error> {
        self.shared
            .try_scene(|scene, now| scene.delete_object(self.oref, now))
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $widget:ty, $as_mut:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(Object);

        impl $name {
            pub(crate) fn from_object(obj: Object) -> Self {
                Self(obj)
            }

            pub fn into_object(self) -> Object {
                self.0
            }

            fn with<R>(
                &self,
                f: impl FnOnce(&mut $widget, &mut ObjectCommon, &mut ObjCtx<'_>) -> Result<R, Error>,
            ) -> Result<R, Error> {
                self.0.with_widget(|obj, w, ctx| {
                    let inner = w.$as_mut().ok_or(Error::InvalidArg)?;
                    f(inner, obj, ctx)
                })
            }
        }

        impl Deref for $name {
            type Target = Object;

            fn deref(&self) -> &Object {
                &self.0
            }
        }
    };
}

typed_handle! {
    /// Text object
    Label, widget::Label, as_label_mut
}

typed_handle! {
    /// Static RGB565 + alpha image
    Image, widget::Image, as_image_mut
}

typed_handle! {
    /// Frame-by-frame animation
    Animation, widget::Animation, as_animation_mut
}

typed_handle! {
    /// QR code rendered from text
    QrCode, widget::QrCode, as_qrcode_mut
}

impl Label {
    pub fn set_font(&self, font: Arc<dyn Font>) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_font(obj, ctx, font);
            Ok(())
        })
    }

    pub fn set_text(&self, text: &str) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_text(obj, ctx, text))
    }

    /// `label.set_text_fmt(format_args!("{} %", level))`
    pub fn set_text_fmt(&self, args: fmt::Arguments<'_>) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_text_fmt(obj, ctx, args))
    }

    pub fn text(&self) -> Result<Option<String>, Error> {
        self.with(|l, _, _| Ok(l.text().map(str::to_owned)))
    }

    pub fn set_color(&self, color: Color) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_color(obj, ctx, color);
            Ok(())
        })
    }

    pub fn set_opa(&self, opa: Opa) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_opa(obj, ctx, opa);
            Ok(())
        })
    }

    pub fn set_bg_color(&self, color: Color) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_bg_color(obj, ctx, color);
            Ok(())
        })
    }

    pub fn set_bg_enable(&self, enable: bool) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_bg_enable(obj, ctx, enable);
            Ok(())
        })
    }

    pub fn set_text_align(&self, align: TextAlign) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_text_align(obj, ctx, align);
            Ok(())
        })
    }

    pub fn set_line_spacing(&self, spacing: u16) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_line_spacing(obj, ctx, spacing);
            Ok(())
        })
    }

    pub fn set_long_mode(&self, mode: LongMode) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_long_mode(obj, ctx, mode))
    }

    pub fn long_mode(&self) -> Result<LongMode, Error> {
        self.with(|l, _, _| Ok(l.long_mode()))
    }

    pub fn set_scroll_speed(&self, speed_ms: u32) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_scroll_speed(obj, ctx, speed_ms))
    }

    pub fn set_scroll_loop(&self, looping: bool) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_scroll_loop(obj, ctx, looping);
            Ok(())
        })
    }

    pub fn set_scroll_step(&self, step: i32) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_scroll_step(obj, ctx, step))
    }

    pub fn set_snap_interval(&self, interval_ms: u32) -> Result<(), Error> {
        self.with(|l, obj, ctx| l.set_snap_interval(obj, ctx, interval_ms))
    }

    pub fn set_snap_loop(&self, looping: bool) -> Result<(), Error> {
        self.with(|l, obj, ctx| {
            l.set_snap_loop(obj, ctx, looping);
            Ok(())
        })
    }

    pub fn is_scrolling(&self) -> Result<bool, Error> {
        self.with(|l, _, _| Ok(l.is_scrolling()))
    }

    /// Rendered width of the first line, valid after the next frame
    pub fn text_width(&self) -> Result<i32, Error> {
        self.with(|l, _, _| Ok(l.text_width()))
    }
}

impl Image {
    pub fn set_src(&self, src: Box<dyn ImageSource>) -> Result<(), Error> {
        self.with(|i, obj, ctx| i.set_src(obj, ctx, src))
    }
}

impl Animation {
    pub fn set_src(&self, src: Box<dyn AnimationDecoder>) -> Result<(), Error> {
        self.with(|a, obj, ctx| a.set_src(obj, ctx, src))
    }

    /// Play frames `start..=end` at `fps`, looping if `repeat`
    pub fn set_segment(&self, start: u32, end: u32, fps: u32, repeat: bool) -> Result<(), Error> {
        self.with(|a, obj, ctx| a.set_segment(obj, ctx, start, end, fps, repeat))
    }

    pub fn start(&self) -> Result<(), Error> {
        self.with(|a, _, ctx| a.start(ctx))
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.with(|a, _, ctx| {
            a.stop(ctx);
            Ok(())
        })
    }

    pub fn set_mirror(&self, enabled: bool, offset: i16) -> Result<(), Error> {
        self.with(|a, obj, ctx| {
            a.set_mirror(obj, ctx, enabled, offset);
            Ok(())
        })
    }

    pub fn set_auto_mirror(&self, enabled: bool) -> Result<(), Error> {
        self.with(|a, obj, ctx| {
            a.set_auto_mirror(obj, ctx, enabled);
            Ok(())
        })
    }

    pub fn mirror(&self) -> Result<Mirror, Error> {
        self.with(|a, _, _| Ok(a.mirror()))
    }

    pub fn is_playing(&self) -> Result<bool, Error> {
        self.with(|a, _, _| Ok(a.is_playing()))
    }

    pub fn current_frame(&self) -> Result<u32, Error> {
        self.with(|a, _, _| Ok(a.current_frame()))
    }
}

impl QrCode {
    pub fn set_encoder(&self, encoder: Arc<dyn QrEncoder>) -> Result<(), Error> {
        self.with(|q, obj, ctx| {
            q.set_encoder(obj, ctx, encoder);
            Ok(())
        })
    }

    pub fn set_data(&self, data: &str) -> Result<(), Error> {
        self.with(|q, obj, ctx| q.set_data(obj, ctx, data))
    }

    /// Side length in pixels; the object becomes `size` x `size`
    pub fn set_size(&self, size: u32) -> Result<(), Error> {
        self.with(|q, obj, ctx| q.set_size(obj, ctx, size))
    }

    pub fn set_ecc(&self, ecc: Ecc) -> Result<(), Error> {
        self.with(|q, obj, ctx| {
            q.set_ecc(obj, ctx, ecc);
            Ok(())
        })
    }

    pub fn set_color(&self, fg: Color) -> Result<(), Error> {
        self.with(|q, obj, ctx| {
            q.set_color(obj, ctx, fg);
            Ok(())
        })
    }

    pub fn set_bg_color(&self, bg: Color) -> Result<(), Error> {
        self.with(|q, obj, ctx| {
            q.set_bg_color(obj, ctx, bg);
            Ok(())
        })
    }

    /// Modules per side of the last generated symbol
    pub fn modules(&self) -> Result<Option<u16>, Error> {
        self.with(|q, _, _| Ok(q.modules()))
    }
}
