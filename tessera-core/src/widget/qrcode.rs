//! QR code widget
//!
//! The symbol is regenerated lazily on the next paint after the data or
//! error-correction level changes, then scaled up by an integer factor.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, error};

use crate::blend::{blend_image, Color, OPA_COVER};
use crate::error::{try_alloc, Error};
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectCommon};
use crate::traits::{Ecc, QrEncoder, QrMatrix};

pub const DEFAULT_SIZE: u32 = 100;

/// QR code object payload
pub struct QrCode {
    encoder: Option<Arc<dyn QrEncoder>>,
    data: Option<String>,
    size: u32,
    ecc: Ecc,
    fg: Color,
    bg: Color,
    matrix: Option<QrMatrix>,
    needs_regen: bool,
}

impl Default for QrCode {
    fn default() -> Self {
        Self {
            encoder: None,
            data: None,
            size: DEFAULT_SIZE,
            ecc: Ecc::Low,
            fg: Color::BLACK,
            bg: Color::WHITE,
            matrix: None,
            needs_regen: false,
        }
    }
}

impl QrCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Modules per side of the last generated symbol
    pub fn modules(&self) -> Option<u16> {
        self.matrix.as_ref().map(|m| m.size)
    }

    pub fn set_encoder(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, encoder: Arc<dyn QrEncoder>) {
        self.encoder = Some(encoder);
        self.needs_regen = self.data.is_some();
        ctx.invalidate(obj);
    }

    pub fn set_data(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, data: &str) -> Result<(), Error> {
        if data.is_empty() {
            return Err(Error::InvalidArg);
        }
        let mut s = String::new();
        s.try_reserve_exact(data.len())?;
        s.push_str(data);
        self.data = Some(s);
        self.needs_regen = true;
        ctx.invalidate(obj);
        Ok(())
    }

    /// Side length in pixels; the object is square
    pub fn set_size(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, size: u32) -> Result<(), Error> {
        if size == 0 {
            return Err(Error::InvalidArg);
        }
        self.size = size;
        ctx.resize(obj, size, size);
        Ok(())
    }

    pub fn set_ecc(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, ecc: Ecc) {
        if self.ecc != ecc {
            self.ecc = ecc;
            self.needs_regen = self.data.is_some();
        }
        ctx.invalidate(obj);
    }

    /// Dark module colour
    pub fn set_color(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, fg: Color) {
        self.fg = fg;
        ctx.invalidate(obj);
    }

    pub fn set_bg_color(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, bg: Color) {
        self.bg = bg;
        ctx.invalidate(obj);
    }

    fn regenerate(&mut self) {
        let (Some(encoder), Some(data)) = (self.encoder.as_deref(), self.data.as_deref()) else {
            return;
        };
        self.needs_regen = false;
        match encoder.encode(data, self.ecc) {
            Ok(m) => {
                debug!("qr symbol {}x{}", m.size, m.size);
                self.matrix = Some(m);
            }
            Err(e) => {
                error!("qr encode failed: {}", e);
                self.matrix = None;
            }
        }
    }

    /// Scaled symbol as logical colours, `side`×`side`
    fn raster(&self, matrix: &QrMatrix) -> Result<(Vec<u16>, usize), Error> {
        let scale = (self.size / matrix.size as u32).max(1) as usize;
        let side = matrix.size as usize * scale;
        let mut pixels = try_alloc::<u16>(side * side)?;

        for (y, row) in pixels.chunks_exact_mut(side).enumerate() {
            let my = (y / scale) as u16;
            for (x, px) in row.iter_mut().enumerate() {
                let dark = matrix.module((x / scale) as u16, my);
                *px = if dark { self.fg.0 } else { self.bg.0 };
            }
        }
        Ok((pixels, side))
    }
}

impl Drawable for QrCode {
    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>) {
        if self.needs_regen {
            self.regenerate();
        }
        let Some(matrix) = self.matrix.as_ref() else {
            return;
        };
        if matrix.size == 0 {
            return;
        }

        let (pixels, side) = match self.raster(matrix) {
            Ok(r) => r,
            Err(e) => {
                error!("qr raster: {}", e);
                return;
            }
        };

        let Some(clip) = target.area.clip(obj.x, obj.y, side as u32, side as u32) else {
            return;
        };
        let src_start = (clip.y1 - obj.y) as usize * side + (clip.x1 - obj.x) as usize;
        let dest_start = target.index(clip.x1, clip.y1);
        let stride = target.stride();

        blend_image(
            &mut target.buf[dest_start..],
            stride,
            &pixels[src_start..],
            side,
            None,
            clip.width(),
            clip.height(),
            OPA_COVER,
            target.swap,
        );
    }

    fn delete(&mut self, _ctx: &mut ObjCtx<'_>) {
        self.matrix = None;
    }
}
