//! Static image source

use super::DecodeError;

/// Pixel layout of an image payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorFormat {
    /// `w*h` little-endian RGB565 pixels followed by `w*h` alpha bytes
    Rgb565A8,
    /// Plain RGB565
    Rgb565,
    /// Anything else, by raw format code
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageHeader {
    pub color_format: ColorFormat,
    pub width: u16,
    pub height: u16,
}

impl ImageHeader {
    /// Payload length an `Rgb565A8` image of this size needs
    pub const fn rgb565a8_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// A decoded (or directly addressable) image
pub trait ImageSource: Send {
    fn header(&self) -> Result<ImageHeader, DecodeError>;

    /// Pixel payload in the layout named by the header
    fn data(&self) -> &[u8];
}
