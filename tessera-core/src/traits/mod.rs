//! Collaborator traits
//!
//! The engine never parses asset containers, rasterises fonts or builds QR
//! symbols itself. These traits are the narrow seams through which those
//! collaborators plug in.

pub mod anim;
pub mod font;
pub mod image;
pub mod qrcode;

pub use anim::{AnimationDecoder, BitDepth, FrameHeader};
pub use font::{Font, GlyphInfo};
pub use image::{ColorFormat, ImageHeader, ImageSource};
pub use qrcode::{Ecc, QrEncoder, QrMatrix};

/// Errors reported by decoders and encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Magic number or layout not recognised
    BadFormat,
    /// Data ends before the declared length
    Truncated,
    /// Well-formed but uses a feature this decoder lacks
    Unsupported,
    /// Payload failed to decode (bad checksum, bad code stream)
    Corrupt,
    /// Input is too large for the encoder
    Overflow,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            DecodeError::BadFormat => "unrecognised format",
            DecodeError::Truncated => "truncated data",
            DecodeError::Unsupported => "unsupported feature",
            DecodeError::Corrupt => "corrupt data",
            DecodeError::Overflow => "input too large",
        };
        f.write_str(msg)
    }
}
