//! QR symbol generator

use alloc::vec::Vec;

use super::DecodeError;

/// Error-correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ecc {
    #[default]
    Low,
    Medium,
    Quartile,
    High,
}

/// Square module grid produced by an encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    /// Modules per side
    pub size: u16,
    /// Row-major, `true` = dark
    pub modules: Vec<bool>,
}

impl QrMatrix {
    pub fn module(&self, x: u16, y: u16) -> bool {
        self.modules
            .get(y as usize * self.size as usize + x as usize)
            .copied()
            .unwrap_or(false)
    }
}

pub trait QrEncoder: Send + Sync {
    fn encode(&self, text: &str, ecc: Ecc) -> Result<QrMatrix, DecodeError>;
}
