//! RGB565 colour handling and software blending
//!
//! Frame buffers hold raw `u16` pixels. When a display has the `swap` flag
//! set, every pixel is stored byte-swapped (big-endian panels on a
//! little-endian bus); the helpers here take logical colours and apply the
//! swap on store.

/// Opacity, 0 = transparent, 255 = opaque
pub type Opa = u8;

/// Fully opaque
pub const OPA_COVER: Opa = 0xFF;

/// Fully transparent
pub const OPA_TRANSP: Opa = 0x00;

/// An RGB565 colour in logical (unswapped) byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color(pub u16);

impl Color {
    pub const BLACK: Color = Color(0x0000);
    pub const WHITE: Color = Color(0xFFFF);
    pub const RED: Color = Color(0xF800);
    pub const GREEN: Color = Color(0x07E0);
    pub const BLUE: Color = Color(0x001F);

    /// Build from 8-bit channels, dropping the low bits
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3))
    }

    /// Build from a `0xRRGGBB` value
    pub const fn hex(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Raw value as stored in a frame buffer
    #[inline]
    pub const fn to_raw(self, swap: bool) -> u16 {
        if swap {
            self.0.swap_bytes()
        } else {
            self.0
        }
    }

    /// Decode a raw frame-buffer pixel
    #[inline]
    pub const fn from_raw(raw: u16, swap: bool) -> Self {
        if swap {
            Color(raw.swap_bytes())
        } else {
            Color(raw)
        }
    }

    /// Mix `self` over `bg`; `mix` = 255 yields `self`, 0 yields `bg`
    pub fn mix(self, bg: Color, mix: u8) -> Color {
        match mix {
            OPA_COVER => return self,
            OPA_TRANSP => return bg,
            _ => {}
        }

        let m = mix as u32;
        let inv = 255 - m;
        let ch = |shift: u32, mask: u32| -> u16 {
            let f = (self.0 as u32 >> shift) & mask;
            let b = (bg.0 as u32 >> shift) & mask;
            (((f * m + b * inv + 127) / 255) << shift) as u16
        };

        Color(ch(11, 0x1F) | ch(5, 0x3F) | ch(0, 0x1F))
    }
}

/// Fill a pixel buffer with one raw value
///
/// When both bytes of the value are equal the fill is a plain byte fill;
/// otherwise pixels are written in pairs with a scalar tail.
pub fn fill(buf: &mut [u16], raw: u16) {
    let [hi, lo] = raw.to_be_bytes();
    if hi == lo {
        buf.fill(raw);
        return;
    }

    let pair = [raw, raw];
    let mut chunks = buf.chunks_exact_mut(2);
    for c in &mut chunks {
        c.copy_from_slice(&pair);
    }
    for px in chunks.into_remainder() {
        *px = raw;
    }
}

/// Blend one logical colour into a raw destination pixel
#[inline]
pub fn blend_pixel(dst: &mut u16, color: Color, alpha: Opa, swap: bool) {
    match alpha {
        OPA_TRANSP => {}
        OPA_COVER => *dst = color.to_raw(swap),
        a => {
            let bg = Color::from_raw(*dst, swap);
            *dst = color.mix(bg, a).to_raw(swap);
        }
    }
}

#[inline]
fn scale_opa(mask: Opa, opa: Opa) -> Opa {
    if opa == OPA_COVER {
        mask
    } else {
        ((mask as u16 * opa as u16) / 255) as u8
    }
}

/// Paint a solid colour through an 8-bit coverage mask
///
/// `dest` and `mask` start at the top-left of the `w`×`h` clip window.
#[allow(clippy::too_many_arguments)]
pub fn blend_mask(
    dest: &mut [u16],
    dest_stride: usize,
    mask: &[Opa],
    mask_stride: usize,
    w: usize,
    h: usize,
    color: Color,
    opa: Opa,
    swap: bool,
) {
    for y in 0..h {
        let d = &mut dest[y * dest_stride..y * dest_stride + w];
        let m = &mask[y * mask_stride..y * mask_stride + w];
        for (px, &cov) in d.iter_mut().zip(m) {
            blend_pixel(px, color, scale_opa(cov, opa), swap);
        }
    }
}

/// Copy an image window into the destination, optionally through a mask
///
/// Source pixels are logical colours.
#[allow(clippy::too_many_arguments)]
pub fn blend_image(
    dest: &mut [u16],
    dest_stride: usize,
    src: &[u16],
    src_stride: usize,
    mask: Option<(&[Opa], usize)>,
    w: usize,
    h: usize,
    opa: Opa,
    swap: bool,
) {
    for y in 0..h {
        let d = &mut dest[y * dest_stride..y * dest_stride + w];
        let s = &src[y * src_stride..y * src_stride + w];
        match mask {
            Some((m, m_stride)) => {
                let m = &m[y * m_stride..y * m_stride + w];
                for ((px, &c), &cov) in d.iter_mut().zip(s).zip(m) {
                    blend_pixel(px, Color(c), scale_opa(cov, opa), swap);
                }
            }
            None => {
                for (px, &c) in d.iter_mut().zip(s) {
                    blend_pixel(px, Color(c), opa, swap);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_packing() {
        assert_eq!(Color::rgb(255, 0, 0), Color::RED);
        assert_eq!(Color::rgb(0, 255, 0), Color::GREEN);
        assert_eq!(Color::hex(0x0000FF), Color::BLUE);
        assert_eq!(Color::hex(0xFFFFFF), Color::WHITE);
    }

    #[test]
    fn test_raw_swap() {
        assert_eq!(Color(0x1234).to_raw(true), 0x3412);
        assert_eq!(Color::from_raw(0x3412, true), Color(0x1234));
        assert_eq!(Color(0x1234).to_raw(false), 0x1234);
    }

    #[test]
    fn test_mix_endpoints() {
        assert_eq!(Color::WHITE.mix(Color::BLACK, 255), Color::WHITE);
        assert_eq!(Color::WHITE.mix(Color::BLACK, 0), Color::BLACK);
    }

    #[test]
    fn test_mix_half() {
        let c = Color::WHITE.mix(Color::BLACK, 128);
        assert_eq!(c.0 >> 11, 16);
        assert_eq!((c.0 >> 5) & 0x3F, 32);
        assert_eq!(c.0 & 0x1F, 16);
    }

    #[test]
    fn test_fill_byte_doubled() {
        let mut buf = [0u16; 7];
        fill(&mut buf, 0xABAB);
        assert!(buf.iter().all(|&p| p == 0xABAB));
    }

    #[test]
    fn test_fill_paired_with_tail() {
        let mut buf = [0u16; 7];
        fill(&mut buf, 0x1234);
        assert!(buf.iter().all(|&p| p == 0x1234));
    }

    #[test]
    fn test_blend_mask_transparent_and_opaque() {
        let mut dest = [0u16; 4];
        let mask = [0u8, 255, 0, 255];
        blend_mask(&mut dest, 4, &mask, 4, 4, 1, Color::RED, OPA_COVER, false);
        assert_eq!(dest, [0, 0xF800, 0, 0xF800]);
    }

    #[test]
    fn test_blend_mask_swapped() {
        let mut dest = [0u16; 2];
        let mask = [255u8, 255];
        blend_mask(&mut dest, 2, &mask, 2, 2, 1, Color::RED, OPA_COVER, true);
        assert_eq!(dest, [0x00F8, 0x00F8]);
    }

    #[test]
    fn test_blend_image_window() {
        // 2x2 window out of a 4-wide destination
        let mut dest = [0u16; 8];
        let src = [1u16, 2, 3, 4];
        blend_image(&mut dest[1..], 4, &src, 2, None, 2, 2, OPA_COVER, false);
        assert_eq!(dest, [0, 1, 2, 0, 0, 3, 4, 0]);
    }
}
