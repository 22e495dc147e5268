//! Frame buffer sets
//!
//! A display renders into one or two pixel buffers. Buffers may be smaller
//! than the screen; the render pass then flushes each dirty rectangle in
//! horizontal bands of `buf_pixels / width` rows.

use alloc::vec::Vec;

use crate::error::{try_alloc, Error};

/// Who allocated the buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferOwnership {
    /// Allocated by the engine, freed on teardown
    Internal,
    /// Supplied by the caller, handed back on teardown
    External,
}

/// One or two frame buffers plus the active-buffer selector
#[derive(Debug)]
pub struct FrameBufferSet {
    bufs: [Option<Vec<u16>>; 2],
    active: usize,
    buf_pixels: usize,
    ownership: BufferOwnership,
    flushing_last: bool,
}

impl FrameBufferSet {
    /// Allocate `count` (1 or 2) buffers of `buf_pixels` each
    ///
    /// Nothing is kept if any allocation fails.
    pub fn allocate(buf_pixels: usize, double_buffer: bool) -> Result<Self, Error> {
        if buf_pixels == 0 {
            return Err(Error::InvalidArg);
        }

        let buf1 = try_alloc::<u16>(buf_pixels)?;
        let buf2 = if double_buffer {
            Some(try_alloc::<u16>(buf_pixels)?)
        } else {
            None
        };

        Ok(Self {
            bufs: [Some(buf1), buf2],
            active: 0,
            buf_pixels,
            ownership: BufferOwnership::Internal,
            flushing_last: false,
        })
    }

    /// Wrap caller-supplied buffers
    ///
    /// Both buffers must hold at least `buf_pixels` pixels.
    pub fn external(buf1: Vec<u16>, buf2: Option<Vec<u16>>, buf_pixels: usize) -> Result<Self, Error> {
        if buf_pixels == 0 || buf1.len() < buf_pixels {
            return Err(Error::InvalidArg);
        }
        if let Some(b) = &buf2 {
            if b.len() < buf_pixels {
                return Err(Error::InvalidArg);
            }
        }

        Ok(Self {
            bufs: [Some(buf1), buf2],
            active: 0,
            buf_pixels,
            ownership: BufferOwnership::External,
            flushing_last: false,
        })
    }

    /// Pixels per buffer used for rendering
    pub fn buf_pixels(&self) -> usize {
        self.buf_pixels
    }

    pub fn ownership(&self) -> BufferOwnership {
        self.ownership
    }

    pub fn is_double_buffered(&self) -> bool {
        self.bufs[1].is_some()
    }

    /// Index of the buffer currently rendered into (0 or 1)
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Whether the last render pass has completed its final chunk
    pub fn flushing_last(&self) -> bool {
        self.flushing_last
    }

    /// The buffer the render pass paints into, trimmed to `buf_pixels`
    pub fn active_mut(&mut self) -> &mut [u16] {
        let n = self.buf_pixels;
        match self.bufs[self.active].as_mut() {
            Some(b) => &mut b[..n],
            None => &mut [],
        }
    }

    pub fn active(&self) -> &[u16] {
        match self.bufs[self.active].as_ref() {
            Some(b) => &b[..self.buf_pixels],
            None => &[],
        }
    }

    /// A render pass is starting
    pub fn begin_frame(&mut self) {
        self.flushing_last = false;
    }

    /// Every chunk of the pass has been flushed
    ///
    /// Marks the last chunk as done and, on double-buffered sets where the
    /// flush side asked for it, makes the other buffer active.
    pub fn finish_frame(&mut self, swap_requested: bool) {
        self.flushing_last = true;
        if swap_requested && self.is_double_buffered() {
            self.active ^= 1;
        }
    }

    /// Give external buffers back to the caller
    pub fn into_external(self) -> Option<(Vec<u16>, Option<Vec<u16>>)> {
        match self.ownership {
            BufferOwnership::External => {
                let [b1, b2] = self.bufs;
                b1.map(|b| (b, b2))
            }
            BufferOwnership::Internal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_allocate_single() {
        let set = FrameBufferSet::allocate(320 * 10, false).unwrap();
        assert_eq!(set.buf_pixels(), 3200);
        assert!(!set.is_double_buffered());
        assert_eq!(set.active().len(), 3200);
        assert_eq!(set.ownership(), BufferOwnership::Internal);
    }

    #[test]
    fn test_allocate_zero_rejected() {
        assert_eq!(FrameBufferSet::allocate(0, true).unwrap_err(), Error::InvalidArg);
    }

    #[test]
    fn test_external_too_short() {
        let err = FrameBufferSet::external(vec![0; 10], None, 20).unwrap_err();
        assert_eq!(err, Error::InvalidArg);
        let err = FrameBufferSet::external(vec![0; 20], Some(vec![0; 5]), 20).unwrap_err();
        assert_eq!(err, Error::InvalidArg);
    }

    #[test]
    fn test_swap_only_after_finish() {
        let mut set = FrameBufferSet::allocate(100, true).unwrap();
        set.begin_frame();
        assert!(!set.flushing_last());
        assert_eq!(set.active_index(), 0);

        set.finish_frame(true);
        assert!(set.flushing_last());
        assert_eq!(set.active_index(), 1);

        set.begin_frame();
        set.finish_frame(false);
        assert_eq!(set.active_index(), 1);
    }

    #[test]
    fn test_single_buffer_never_swaps() {
        let mut set = FrameBufferSet::allocate(100, false).unwrap();
        set.finish_frame(true);
        assert_eq!(set.active_index(), 0);
    }

    #[test]
    fn test_external_handed_back() {
        let set = FrameBufferSet::external(vec![7; 64], Some(vec![9; 64]), 32).unwrap();
        assert_eq!(set.active().len(), 32);
        let (b1, b2) = set.into_external().unwrap();
        assert_eq!(b1.len(), 64);
        assert_eq!(b2.map(|b| b[0]), Some(9));

        let internal = FrameBufferSet::allocate(4, false).unwrap();
        assert!(internal.into_external().is_none());
    }
}
