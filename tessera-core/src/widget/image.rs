//! Static image widget

use alloc::boxed::Box;

use log::{debug, error, warn};

use crate::blend::{blend_pixel, Color};
use crate::error::Error;
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectCommon};
use crate::traits::{ColorFormat, ImageSource};

/// Image object payload
#[derive(Default)]
pub struct Image {
    src: Option<Box<dyn ImageSource>>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_src(&self) -> bool {
        self.src.is_some()
    }

    /// Replace the source; the object takes the image's size
    pub fn set_src(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        src: Box<dyn ImageSource>,
    ) -> Result<(), Error> {
        ctx.invalidate(obj);

        match src.header() {
            Ok(h) => {
                obj.w = h.width as u32;
                obj.h = h.height as u32;
                let (pw, ph) = ctx.screen;
                obj.apply_alignment(pw, ph);
                debug!("image source set, {}x{}", h.width, h.height);
            }
            Err(e) => error!("image header unreadable: {}", e),
        }
        self.src = Some(src);

        ctx.invalidate(obj);
        Ok(())
    }
}

impl Drawable for Image {
    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>) {
        let Some(src) = self.src.as_ref() else {
            return;
        };

        let header = match src.header() {
            Ok(h) => h,
            Err(e) => {
                error!("image header unreadable: {}", e);
                return;
            }
        };
        if header.color_format != ColorFormat::Rgb565A8 {
            warn!("unsupported image format {:?}, only RGB565A8 is drawn", header.color_format);
            return;
        }

        let data = src.data();
        if data.len() < header.rgb565a8_len() {
            warn!("image payload shorter than its header says");
            return;
        }

        let (w, h) = (header.width as u32, header.height as u32);
        let Some(clip) = target.area.clip(obj.x, obj.y, w, h) else {
            return;
        };

        let img_w = w as usize;
        let alpha_base = img_w * h as usize * 2;
        let swap = target.swap;

        for y in clip.y1..clip.y2 {
            let sy = (y - obj.y) as usize;
            for x in clip.x1..clip.x2 {
                let sx = (x - obj.x) as usize;
                let i = sy * img_w + sx;
                let color = Color(u16::from_le_bytes([data[i * 2], data[i * 2 + 1]]));
                let alpha = data[alpha_base + i];
                let di = target.index(x, y);
                blend_pixel(&mut target.buf[di], color, alpha, swap);
            }
        }
    }

    fn intrinsic_size(&self) -> bool {
        true
    }
}
