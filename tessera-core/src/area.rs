//! Rectangle geometry
//!
//! [`Rect`] uses inclusive bounds and is what the dirty tracker stores.
//! [`FlushArea`] uses exclusive right/bottom edges and is what draw and
//! flush callbacks receive, so `x2 - x1` is directly the row stride.

/// Axis-aligned rectangle with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Create a rectangle from inclusive corners
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rectangle covering `w`×`h` pixels starting at `(x, y)`
    ///
    /// A zero width or height yields an invalid rectangle.
    pub const fn from_size(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + w as i32 - 1,
            y2: y + h as i32 - 1,
        }
    }

    /// Full-screen rectangle for a `h_res`×`v_res` panel
    pub const fn screen(h_res: u32, v_res: u32) -> Self {
        Self::from_size(0, 0, h_res, v_res)
    }

    /// Whether the bounds describe at least one pixel
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        (self.x2 - self.x1 + 1) as u32
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        (self.y2 - self.y1 + 1) as u32
    }

    /// Pixel count, zero for invalid rectangles
    #[inline]
    pub fn area(&self) -> u32 {
        if self.is_valid() {
            self.width() * self.height()
        } else {
            0
        }
    }

    /// Common part of two rectangles
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };
        r.is_valid().then_some(r)
    }

    /// Bounding box of two rectangles
    pub fn join(&self, other: &Rect) -> Rect {
        Rect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Whether `self` lies completely inside `parent`
    pub fn is_in(&self, parent: &Rect) -> bool {
        self.x1 >= parent.x1 && self.y1 >= parent.y1 && self.x2 <= parent.x2 && self.y2 <= parent.y2
    }

    /// Whether two rectangles overlap or share an edge with no gap between them
    ///
    /// `(0,0,10,10)` and `(11,0,20,10)` are "on" each other; `(12,0,20,10)` is not.
    pub fn is_on(&self, other: &Rect) -> bool {
        !(self.x1 > other.x2 + 1
            || other.x1 > self.x2 + 1
            || self.y1 > other.y2 + 1
            || other.y1 > self.y2 + 1)
    }

    /// Whether the point lies inside the rectangle
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }
}

/// Rectangle with exclusive right/bottom edges handed to draw and flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlushArea {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl FlushArea {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Row stride in pixels
    #[inline]
    pub const fn width(&self) -> usize {
        (self.x2 - self.x1) as usize
    }

    #[inline]
    pub const fn height(&self) -> usize {
        (self.y2 - self.y1) as usize
    }

    #[inline]
    pub const fn pixels(&self) -> usize {
        self.width() * self.height()
    }

    /// Clip an exclusive-bounds box `(x, y, x + w, y + h)` to this area
    pub fn clip(&self, x: i32, y: i32, w: u32, h: u32) -> Option<FlushArea> {
        let c = FlushArea {
            x1: self.x1.max(x),
            y1: self.y1.max(y),
            x2: self.x2.min(x + w as i32),
            y2: self.y2.min(y + h as i32),
        };
        (c.x1 < c.x2 && c.y1 < c.y2).then_some(c)
    }

    /// Inclusive equivalent
    pub const fn to_rect(&self) -> Rect {
        Rect::new(self.x1, self.y1, self.x2 - 1, self.y2 - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_inclusive() {
        assert_eq!(Rect::new(0, 0, 9, 9).area(), 100);
        assert_eq!(Rect::new(5, 5, 5, 5).area(), 1);
        assert_eq!(Rect::new(5, 5, 4, 5).area(), 0);
    }

    #[test]
    fn test_from_size_zero_is_invalid() {
        assert!(!Rect::from_size(10, 10, 0, 5).is_valid());
        assert_eq!(Rect::from_size(10, 10, 3, 2), Rect::new(10, 10, 12, 11));
    }

    #[test]
    fn test_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 20, 20);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 10, 10)));
        assert_eq!(a.intersect(&Rect::new(11, 0, 12, 1)), None);
    }

    #[test]
    fn test_is_on_touching_and_gap() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.is_on(&Rect::new(11, 0, 20, 10)));
        assert!(a.is_on(&Rect::new(0, 11, 10, 20)));
        assert!(a.is_on(&Rect::new(5, 5, 6, 6)));
        assert!(!a.is_on(&Rect::new(12, 0, 20, 10)));
        assert!(!a.is_on(&Rect::new(0, 12, 10, 20)));
    }

    #[test]
    fn test_is_in() {
        let outer = Rect::new(10, 10, 20, 20);
        assert!(Rect::new(12, 12, 15, 15).is_in(&outer));
        assert!(outer.is_in(&outer));
        assert!(!Rect::new(9, 12, 15, 15).is_in(&outer));
    }

    #[test]
    fn test_flush_area_clip() {
        let chunk = FlushArea::new(0, 0, 100, 10);
        assert_eq!(chunk.clip(90, 5, 20, 20), Some(FlushArea::new(90, 5, 100, 10)));
        assert_eq!(chunk.clip(100, 0, 5, 5), None);
        assert_eq!(chunk.to_rect(), Rect::new(0, 0, 99, 9));
    }
}
