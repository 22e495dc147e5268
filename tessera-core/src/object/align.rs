//! Fixed alignment kinds
//!
//! Alignment places an object relative to its display. The first nine kinds
//! keep the object inside the parent; the `Out*` kinds park it just outside
//! an edge, which is handy for slide-in effects.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Align {
    #[default]
    TopLeft = 0,
    TopMid,
    TopRight,
    LeftMid,
    Center,
    RightMid,
    BottomLeft,
    BottomMid,
    BottomRight,
    OutTopLeft,
    OutTopMid,
    OutTopRight,
    OutLeftTop,
    OutLeftMid,
    OutLeftBottom,
    OutRightTop,
    OutRightMid,
    OutRightBottom,
    OutBottomLeft,
    OutBottomMid,
    OutBottomRight,
}

impl Align {
    const ALL: [Align; 21] = [
        Align::TopLeft,
        Align::TopMid,
        Align::TopRight,
        Align::LeftMid,
        Align::Center,
        Align::RightMid,
        Align::BottomLeft,
        Align::BottomMid,
        Align::BottomRight,
        Align::OutTopLeft,
        Align::OutTopMid,
        Align::OutTopRight,
        Align::OutLeftTop,
        Align::OutLeftMid,
        Align::OutLeftBottom,
        Align::OutRightTop,
        Align::OutRightMid,
        Align::OutRightBottom,
        Align::OutBottomLeft,
        Align::OutBottomMid,
        Align::OutBottomRight,
    ];

    /// Top-left corner for a `w`×`h` object in a `pw`×`ph` parent
    pub fn compute(self, pw: u32, ph: u32, w: u32, h: u32, x_ofs: i32, y_ofs: i32) -> (i32, i32) {
        let (pw, ph, w, h) = (pw as i32, ph as i32, w as i32, h as i32);
        let mid_x = (pw - w) / 2;
        let mid_y = (ph - h) / 2;

        let (x, y) = match self {
            Align::TopLeft => (0, 0),
            Align::TopMid => (mid_x, 0),
            Align::TopRight => (pw - w, 0),
            Align::LeftMid => (0, mid_y),
            Align::Center => (mid_x, mid_y),
            Align::RightMid => (pw - w, mid_y),
            Align::BottomLeft => (0, ph - h),
            Align::BottomMid => (mid_x, ph - h),
            Align::BottomRight => (pw - w, ph - h),
            Align::OutTopLeft => (0, -h),
            Align::OutTopMid => (mid_x, -h),
            Align::OutTopRight => (pw, -h),
            Align::OutLeftTop => (-w, 0),
            Align::OutLeftMid => (-w, mid_y),
            Align::OutLeftBottom => (-w, ph),
            Align::OutRightTop => (pw, 0),
            Align::OutRightMid => (pw, mid_y),
            Align::OutRightBottom => (pw, ph),
            Align::OutBottomLeft => (0, ph),
            Align::OutBottomMid => (mid_x, ph),
            Align::OutBottomRight => (pw, ph),
        };

        (x + x_ofs, y + y_ofs)
    }
}

impl TryFrom<u8> for Align {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(raw as usize).copied().ok_or(Error::InvalidArg)
    }
}

/// Alignment parameters stored on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alignment {
    pub kind: Align,
    pub x_ofs: i32,
    pub y_ofs: i32,
    /// Cleared by an explicit `set_pos`
    pub enabled: bool,
}
