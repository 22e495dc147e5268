//! Frame-sequence animation widget
//!
//! Frames come from an [`AnimationDecoder`]. Each frame is split into
//! horizontal blocks that are decoded on demand while painting; the most
//! recently decoded block is kept so consecutive chunks of the same block do
//! not decode it twice. Palette colours are resolved lazily and cached per
//! frame.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, error, trace};

use crate::area::FlushArea;
use crate::display::DisplayEvent;
use crate::error::{try_alloc, Error};
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectCommon};
use crate::timer::{TimerId, TimerTarget};
use crate::traits::{AnimationDecoder, BitDepth, FrameHeader};

/// Default playback rate
pub const DEFAULT_FPS: u32 = 30;

/// Horizontal mirroring of the decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mirror {
    #[default]
    Disabled,
    /// Mirror copy shifted by a fixed offset
    Manual(i16),
    /// Offset chosen so the pair is centred in the chunk
    Auto,
}

/// Decode state of the frame currently shown
struct FrameCache {
    index: usize,
    header: FrameHeader,
    block: Vec<u8>,
    palette: Vec<Option<u16>>,
    last_block: Option<usize>,
}

/// Animation object payload
pub struct Animation {
    src: Option<Box<dyn AnimationDecoder>>,
    start: u32,
    end: u32,
    current: u32,
    fps: u32,
    repeat: bool,
    playing: bool,
    mirror: Mirror,
    timer: Option<TimerId>,
    frame: Option<FrameCache>,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            src: None,
            start: 0,
            end: 0,
            current: 0,
            fps: DEFAULT_FPS,
            repeat: true,
            playing: false,
            mirror: Mirror::Disabled,
            timer: None,
            frame: None,
        }
    }
}

impl Animation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_frame(&self) -> u32 {
        self.current
    }

    /// `(start, end)` of the playing segment
    pub fn segment(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn mirror(&self) -> Mirror {
        self.mirror
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    fn frame_count(&self) -> u32 {
        self.src.as_ref().map_or(0, |s| s.frame_count() as u32)
    }

    /// Install a new decoder and rewind to its first frame
    ///
    /// The last frame of a container is a terminator and is never shown.
    pub fn set_src(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        src: Box<dyn AnimationDecoder>,
    ) -> Result<(), Error> {
        if self.playing {
            self.stop(ctx);
        }

        self.src = Some(src);
        self.frame = None;
        self.start = 0;
        self.current = 0;
        self.end = self.frame_count().saturating_sub(2);
        debug!("animation source set, frames 0..={}", self.end);

        obj.dirty = true;
        ctx.invalidate(obj);
        Ok(())
    }

    /// Restrict playback to `start..=end` at `fps`
    pub fn set_segment(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        start: u32,
        end: u32,
        fps: u32,
        repeat: bool,
    ) -> Result<(), Error> {
        if fps == 0 {
            return Err(Error::InvalidArg);
        }

        self.start = start;
        self.end = end.min(self.frame_count().saturating_sub(2));
        self.current = start;
        self.repeat = repeat;

        if fps != self.fps {
            self.fps = fps;
            if let Some(t) = self.timer {
                ctx.timers.set_period(t, 1000 / fps)?;
            }
            debug!("animation fps now {}", fps);
        }

        obj.dirty = true;
        ctx.invalidate(obj);
        Ok(())
    }

    /// Begin playback from the segment start
    pub fn start(&mut self, ctx: &mut ObjCtx<'_>) -> Result<(), Error> {
        if self.src.is_none() {
            error!("animation started without a source");
            return Err(Error::InvalidState);
        }
        if self.playing {
            return Ok(());
        }

        self.playing = true;
        self.current = self.start;
        if let Some(t) = self.timer {
            ctx.timers.reset(t, ctx.now_ms)?;
            ctx.timers.resume(t)?;
        }
        Ok(())
    }

    pub fn stop(&mut self, ctx: &mut ObjCtx<'_>) {
        if !self.playing {
            return;
        }
        self.playing = false;
        if let Some(t) = self.timer {
            let _ = ctx.timers.pause(t);
        }
    }

    pub fn set_mirror(&mut self, obj: &ObjectCommon, ctx: &mut ObjCtx<'_>, enabled: bool, offset: i16) {
        self.mirror = if enabled {
            Mirror::Manual(offset)
        } else {
            Mirror::Disabled
        };
        ctx.invalidate(obj);
    }

    pub fn set_auto_mirror(&mut self, obj: &ObjectCommon, ctx: &mut ObjCtx<'_>, enabled: bool) {
        self.mirror = if enabled { Mirror::Auto } else { Mirror::Disabled };
        ctx.invalidate(obj);
    }

    /// Frame timer expired
    pub fn on_timer(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        if !self.playing {
            return;
        }

        if self.current >= self.end {
            if self.repeat {
                ctx.emit(DisplayEvent::AllFrameDone);
                self.current = self.start;
            } else {
                self.stop(ctx);
                ctx.emit(DisplayEvent::AllFrameDone);
                return;
            }
        } else {
            self.current += 1;
            ctx.emit(DisplayEvent::OneFrameDone);
            trace!("frame {} ({}..={})", self.current, self.start, self.end);
        }

        obj.dirty = true;
        ctx.invalidate(obj);
    }

    fn load_frame(&self) -> Result<FrameCache, Error> {
        let src = self.src.as_ref().ok_or(Error::InvalidState)?;
        let index = self.current as usize;
        let raw = src.frame(index).ok_or(Error::NotFound)?;
        let header = src.parse_header(raw).map_err(|e| {
            error!("frame {} header: {}", index, e);
            Error::InvalidArg
        })?;

        let block = try_alloc::<u8>(
            header
                .bit_depth
                .block_bytes(header.width as usize, header.block_height as usize),
        )?;
        let palette = try_alloc::<Option<u16>>(header.bit_depth.palette_len())?;

        Ok(FrameCache {
            index,
            header,
            block,
            palette,
            last_block: None,
        })
    }
}

impl Drawable for Animation {
    fn attach(&mut self, _obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) -> Result<(), Error> {
        let id = ctx
            .timers
            .create(1000 / self.fps, TimerTarget::Animation(ctx.me), ctx.now_ms)?;
        ctx.timers.pause(id)?;
        self.timer = Some(id);
        Ok(())
    }

    fn update(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        if !obj.dirty || self.src.is_none() {
            return;
        }

        match self.load_frame() {
            Ok(frame) => {
                let (w, h) = (frame.header.width as u32, frame.header.height as u32);
                self.frame = Some(frame);
                ctx.resize(obj, w, h);
            }
            Err(e) => {
                debug!("frame {} skipped: {}", self.current, e);
                self.frame = None;
            }
        }
        obj.dirty = false;
    }

    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>) {
        let Self {
            src, frame, mirror, ..
        } = self;
        let (Some(src), Some(frame)) = (src.as_ref(), frame.as_mut()) else {
            return;
        };
        let Some(raw_frame) = src.frame(frame.index) else {
            return;
        };

        let width = frame.header.width as u32;
        let Some(clip_obj) = target.area.clip(obj.x, obj.y, width, frame.header.height as u32) else {
            return;
        };

        for b in 0..frame.header.blocks() {
            let (row_start, row_end) = frame.header.block_rows(b);
            let block_top = obj.y + row_start;
            let Some(clip) = clip_obj.clip(obj.x, block_top, width, (row_end - row_start) as u32) else {
                continue;
            };

            if frame.last_block != Some(b) {
                let Some(raw) = frame.header.block_range(b).and_then(|r| raw_frame.get(r)) else {
                    error!("block {} outside frame data", b);
                    continue;
                };
                if let Err(e) = src.decode_block(&frame.header, raw, &mut frame.block, target.swap) {
                    debug!("block {} decode failed: {}", b, e);
                    frame.last_block = None;
                    continue;
                }
                frame.last_block = Some(b);
            }

            render_block(&**src, frame, *mirror, obj.x, block_top, clip, target);
        }
    }

    fn delete(&mut self, ctx: &mut ObjCtx<'_>) {
        self.playing = false;
        if let Some(t) = self.timer.take() {
            let _ = ctx.timers.delete(t);
        }
        self.frame = None;
        self.src = None;
    }

    fn intrinsic_size(&self) -> bool {
        true
    }
}

/// Expand one decoded block into the chunk, with optional mirror copy
fn render_block(
    src: &dyn AnimationDecoder,
    frame: &mut FrameCache,
    mirror: Mirror,
    obj_x: i32,
    block_top: i32,
    clip: FlushArea,
    target: &mut DrawTarget<'_>,
) {
    let width = frame.header.width as usize;
    let stride = target.stride() as i32;
    let dest_x_offset = clip.x1 - target.area.x1;
    let swap = target.swap;

    let mirror_offset = match mirror {
        Mirror::Disabled => None,
        Mirror::Manual(o) => Some(o as i32),
        Mirror::Auto => Some(stride - 2 * (width as i32 + dest_x_offset)),
    };

    for y in clip.y1..clip.y2 {
        let sy = (y - block_top) as usize;
        let row_base = (y - target.area.y1) as usize * stride as usize;

        for x in clip.x1..clip.x2 {
            let i = sy * width + (x - obj_x) as usize;
            let px = match frame.header.bit_depth {
                BitDepth::Four => {
                    let byte = frame.block.get(i / 2).copied().unwrap_or(0);
                    let index = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
                    palette_lookup(src, frame, index, swap)
                }
                BitDepth::Eight => {
                    let index = frame.block.get(i).copied().unwrap_or(0);
                    palette_lookup(src, frame, index, swap)
                }
                BitDepth::TwentyFour => match frame.block.get(i * 2..i * 2 + 2) {
                    Some(b) => u16::from_le_bytes([b[0], b[1]]),
                    None => 0,
                },
            };

            let rel_x = x - clip.x1;
            target.buf[row_base + (dest_x_offset + rel_x) as usize] = px;

            if let Some(offset) = mirror_offset {
                let mirror_x = 2 * width as i32 + offset - 1 - rel_x;
                if mirror_x >= 0 && dest_x_offset + mirror_x < stride {
                    target.buf[row_base + (dest_x_offset + mirror_x) as usize] = px;
                }
            }
        }
    }
}

fn palette_lookup(src: &dyn AnimationDecoder, frame: &mut FrameCache, index: u8, swap: bool) -> u16 {
    let header = &frame.header;
    match frame.palette.get_mut(index as usize) {
        Some(slot) => *slot.get_or_insert_with(|| src.palette_color(header, index, swap)),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::DecodeError;
    use crate::widget::testing::Harness;
    use alloc::vec;

    /// Frames are `[width, height, depth, pixels...]`, one row per block
    struct Strip {
        frames: Vec<Vec<u8>>,
    }

    impl Strip {
        fn new(frames: usize, width: u8, pixels: &[u8]) -> Box<Self> {
            let mut f = vec![width, (pixels.len() / width as usize) as u8, 8];
            f.extend_from_slice(pixels);
            Box::new(Self {
                frames: vec![f; frames],
            })
        }
    }

    impl AnimationDecoder for Strip {
        fn frame_count(&self) -> usize {
            self.frames.len()
        }

        fn frame(&self, index: usize) -> Option<&[u8]> {
            self.frames.get(index).map(|f| f.as_slice())
        }

        fn parse_header(&self, frame: &[u8]) -> Result<FrameHeader, DecodeError> {
            let (w, h) = (frame[0] as u16, frame[1] as u16);
            Ok(FrameHeader {
                bit_depth: BitDepth::try_from(frame[2])?,
                width: w,
                height: h,
                block_height: 1,
                block_len: vec![w as u32; h as usize],
                data_offset: 3,
                palette: Vec::new(),
            })
        }

        fn decode_block(
            &self,
            _header: &FrameHeader,
            raw: &[u8],
            out: &mut [u8],
            _swap: bool,
        ) -> Result<(), DecodeError> {
            out[..raw.len()].copy_from_slice(raw);
            Ok(())
        }

        fn palette_color(&self, _header: &FrameHeader, index: u8, swap: bool) -> u16 {
            let c = 0x1000 | index as u16;
            if swap {
                c.swap_bytes()
            } else {
                c
            }
        }
    }

    fn attached(h: &mut Harness) -> (Animation, ObjectCommon) {
        let mut a = Animation::new();
        let mut obj = ObjectCommon::default();
        a.attach(&mut obj, &mut h.ctx()).unwrap();
        (a, obj)
    }

    #[test]
    fn test_defaults_and_paused_timer() {
        let mut h = Harness::new(100, 100);
        let (a, _) = attached(&mut h);
        assert_eq!(a.fps(), 30);
        assert!(!a.is_playing());
        let t = a.timer().unwrap();
        assert_eq!(h.timers.period(t), Some(33));
        assert_eq!(h.timers.is_paused(t), Some(true));
    }

    #[test]
    fn test_start_without_source() {
        let mut h = Harness::new(100, 100);
        let (mut a, _) = attached(&mut h);
        assert_eq!(a.start(&mut h.ctx()), Err(Error::InvalidState));
    }

    #[test]
    fn test_end_excludes_terminator_frame() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(5, 1, &[0])).unwrap();
        assert_eq!(a.segment(), (0, 3));

        a.set_segment(&mut obj, &mut h.ctx(), 1, 100, 30, true).unwrap();
        assert_eq!(a.segment(), (1, 3));
        assert_eq!(a.current_frame(), 1);
    }

    #[test]
    fn test_frame_stepping_with_repeat() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(4, 1, &[0])).unwrap();
        a.start(&mut h.ctx()).unwrap();
        assert_eq!(h.timers.is_paused(a.timer().unwrap()), Some(false));

        a.on_timer(&mut obj, &mut h.ctx());
        a.on_timer(&mut obj, &mut h.ctx());
        assert_eq!(a.current_frame(), 2);

        // End reached: wraps to start
        a.on_timer(&mut obj, &mut h.ctx());
        assert_eq!(a.current_frame(), 0);

        let kinds: Vec<DisplayEvent> = h.events.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            kinds,
            [
                DisplayEvent::OneFrameDone,
                DisplayEvent::OneFrameDone,
                DisplayEvent::AllFrameDone
            ]
        );
        assert!(a.is_playing());
    }

    #[test]
    fn test_stops_without_repeat() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(3, 1, &[0])).unwrap();
        a.set_segment(&mut obj, &mut h.ctx(), 0, 1, 30, false).unwrap();
        a.start(&mut h.ctx()).unwrap();

        a.on_timer(&mut obj, &mut h.ctx());
        a.on_timer(&mut obj, &mut h.ctx());
        assert!(!a.is_playing());
        assert_eq!(h.timers.is_paused(a.timer().unwrap()), Some(true));
        assert_eq!(h.events.last().map(|(e, _)| *e), Some(DisplayEvent::AllFrameDone));

        // Further ticks are ignored
        a.on_timer(&mut obj, &mut h.ctx());
        assert_eq!(a.current_frame(), 1);
    }

    #[test]
    fn test_fps_change_updates_period() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(3, 1, &[0])).unwrap();
        assert_eq!(
            a.set_segment(&mut obj, &mut h.ctx(), 0, 1, 0, true),
            Err(Error::InvalidArg)
        );
        a.set_segment(&mut obj, &mut h.ctx(), 0, 1, 10, true).unwrap();
        assert_eq!(h.timers.period(a.timer().unwrap()), Some(100));
    }

    #[test]
    fn test_update_sizes_object_and_draws_palette() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(3, 2, &[1, 2, 3, 4])).unwrap();
        a.update(&mut obj, &mut h.ctx());
        assert_eq!((obj.w, obj.h), (2, 2));

        let mut buf = vec![0u16; 6];
        let mut target = DrawTarget {
            area: FlushArea::new(0, 0, 3, 2),
            buf: &mut buf,
            swap: false,
        };
        a.draw(&obj, &mut target);
        assert_eq!(buf, [0x1001, 0x1002, 0, 0x1003, 0x1004, 0]);
    }

    #[test]
    fn test_auto_mirror_centres_pair() {
        let mut h = Harness::new(100, 100);
        let (mut a, mut obj) = attached(&mut h);
        a.set_src(&mut obj, &mut h.ctx(), Strip::new(3, 2, &[1, 2])).unwrap();
        a.set_auto_mirror(&obj, &mut h.ctx(), true);
        a.update(&mut obj, &mut h.ctx());

        let mut buf = vec![0u16; 4];
        let mut target = DrawTarget {
            area: FlushArea::new(0, 0, 4, 1),
            buf: &mut buf,
            swap: false,
        };
        a.draw(&obj, &mut target);
        assert_eq!(buf, [0x1001, 0x1002, 0x1002, 0x1001]);
    }
}
