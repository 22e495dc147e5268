//! Frame-sequence animation decoder

use alloc::vec::Vec;

use super::DecodeError;

/// Pixel depth of a decoded block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitDepth {
    /// Two palette indices per byte, high nibble first
    Four,
    /// One palette index per byte
    Eight,
    /// RGB565 pixels, two bytes each, already converted by the decoder
    TwentyFour,
}

impl BitDepth {
    /// Palette entries needed for this depth
    pub const fn palette_len(self) -> usize {
        match self {
            BitDepth::Four => 16,
            BitDepth::Eight => 256,
            BitDepth::TwentyFour => 0,
        }
    }

    /// Bytes needed to hold one decoded block
    pub const fn block_bytes(self, width: usize, block_height: usize) -> usize {
        match self {
            BitDepth::Four => width * (block_height + block_height % 2) / 2,
            BitDepth::Eight => width * block_height,
            BitDepth::TwentyFour => width * block_height * 2,
        }
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = DecodeError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            4 => Ok(BitDepth::Four),
            8 => Ok(BitDepth::Eight),
            24 => Ok(BitDepth::TwentyFour),
            _ => Err(DecodeError::Unsupported),
        }
    }
}

/// Parsed header of one animation frame
///
/// A frame is split into horizontal blocks of `block_height` rows (the last
/// one may be shorter) that are decoded independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub bit_depth: BitDepth,
    pub width: u16,
    pub height: u16,
    pub block_height: u16,
    /// Encoded length of every block
    pub block_len: Vec<u32>,
    /// Offset of the first block within the frame
    pub data_offset: u32,
    /// Decoder-specific palette bytes
    pub palette: Vec<u8>,
}

impl FrameHeader {
    pub fn blocks(&self) -> usize {
        self.block_len.len()
    }

    /// Byte range of block `index` within the frame
    pub fn block_range(&self, index: usize) -> Option<core::ops::Range<usize>> {
        let len = *self.block_len.get(index)? as usize;
        let start = self.data_offset as usize
            + self.block_len[..index].iter().map(|&l| l as usize).sum::<usize>();
        Some(start..start + len)
    }

    /// Row span `[start, end)` covered by block `index`, relative to the frame
    pub fn block_rows(&self, index: usize) -> (i32, i32) {
        let bh = self.block_height as i32;
        let start = index as i32 * bh;
        let end = if index + 1 == self.blocks() {
            self.height as i32
        } else {
            start + bh
        };
        (start, end)
    }
}

/// Decoder for a multi-frame animation container
pub trait AnimationDecoder: Send {
    /// Number of frames in the container
    fn frame_count(&self) -> usize;

    /// Raw bytes of frame `index`
    fn frame(&self, index: usize) -> Option<&[u8]>;

    /// Parse the header at the start of a frame
    fn parse_header(&self, frame: &[u8]) -> Result<FrameHeader, DecodeError>;

    /// Decode one block into `out`
    ///
    /// `out` holds [`BitDepth::block_bytes`] bytes. For 24-bit frames the
    /// decoder writes little-endian RGB565, byte-swapped when `swap` is set.
    fn decode_block(
        &self,
        header: &FrameHeader,
        raw: &[u8],
        out: &mut [u8],
        swap: bool,
    ) -> Result<(), DecodeError>;

    /// Resolve a palette index to a raw frame-buffer pixel
    fn palette_color(&self, header: &FrameHeader, index: u8, swap: bool) -> u16;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn header() -> FrameHeader {
        FrameHeader {
            bit_depth: BitDepth::Eight,
            width: 10,
            height: 25,
            block_height: 10,
            block_len: vec![4, 6, 2],
            data_offset: 16,
            palette: Vec::new(),
        }
    }

    #[test]
    fn test_block_ranges_follow_lengths() {
        let h = header();
        assert_eq!(h.block_range(0), Some(16..20));
        assert_eq!(h.block_range(1), Some(20..26));
        assert_eq!(h.block_range(2), Some(26..28));
        assert_eq!(h.block_range(3), None);
    }

    #[test]
    fn test_last_block_is_short() {
        let h = header();
        assert_eq!(h.block_rows(0), (0, 10));
        assert_eq!(h.block_rows(2), (20, 25));
    }

    #[test]
    fn test_depth_sizes() {
        assert_eq!(BitDepth::Four.block_bytes(10, 3), 20);
        assert_eq!(BitDepth::Eight.block_bytes(10, 3), 30);
        assert_eq!(BitDepth::TwentyFour.block_bytes(10, 3), 60);
        assert_eq!(BitDepth::try_from(16), Err(DecodeError::Unsupported));
    }
}
