//! Glyph source for labels

/// Placement and metrics of one glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlyphInfo {
    /// Horizontal advance in pixels
    pub adv_w: u16,
    /// Bitmap width
    pub box_w: u16,
    /// Bitmap height
    pub box_h: u16,
    /// Bitmap offset from the pen position
    pub ofs_x: i16,
    pub ofs_y: i16,
}

/// A bitmap font
pub trait Font: Send + Sync {
    /// Distance between baselines, without extra spacing
    fn line_height(&self) -> u16;

    /// Distance from the bottom of the line to the baseline
    fn base_line(&self) -> u16;

    /// Metrics for a code point, `None` if the font lacks it
    fn glyph(&self, unicode: char) -> Option<GlyphInfo>;

    /// Encoded bitmap for a glyph
    fn glyph_bitmap(&self, unicode: char, glyph: &GlyphInfo) -> Option<&[u8]>;

    /// Coverage of one bitmap pixel, 0..=255
    fn pixel(&self, bitmap: &[u8], x: u16, y: u16, box_w: u16) -> u8;

    /// Row at which the glyph's bitmap starts within its line
    fn baseline_offset(&self, glyph: &GlyphInfo) -> i32 {
        self.line_height() as i32
            - self.base_line() as i32
            - glyph.box_h as i32
            - glyph.ofs_y as i32
    }

    /// Advance for a code point, 0 if missing
    fn advance(&self, unicode: char) -> i32 {
        self.glyph(unicode).map_or(0, |g| g.adv_w as i32)
    }
}
