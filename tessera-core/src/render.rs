//! The chunked render pass
//!
//! ```text
//!  layout ─► merge ─► update ─► for each dirty rect
//!                                 for each band of buf_pixels/width rows
//!                                   clear ─► draw objects ─► flush ─► wait
//!                               ─► finish frame (maybe swap) ─► clear dirty
//! ```
//!
//! The frame buffer may be much smaller than the screen, so each dirty
//! rectangle is painted and flushed in horizontal bands. A band is handed to
//! the [`FlushSink`] only after the previous one was acknowledged (or timed
//! out), which lets a single buffer be reused for the whole pass.

use heapless::Vec as HVec;
use log::{debug, error, trace};

use crate::area::{FlushArea, Rect};
use crate::blend::fill;
use crate::dirty::DIRTY_CAPACITY;
use crate::display::{DisplayId, DisplayState};
use crate::error::Error;
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectRef};
use crate::timer::TimerManager;

/// Where finished bands go
pub trait FlushSink {
    /// A band is about to be flushed; forget any previous acknowledgement
    fn begin(&mut self);

    /// Hand a band to the panel driver
    fn flush(&mut self, display: DisplayId, area: &FlushArea, pixels: &[u16]);

    /// Block until the driver acknowledged the band
    fn wait(&mut self) -> Result<(), Error>;

    /// Whether the last acknowledgement asked for a buffer swap
    fn swap_requested(&self) -> bool {
        true
    }
}

/// What one pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PassStats {
    /// Dirty rectangles painted
    pub areas: u32,
    /// Bands flushed
    pub chunks: u32,
    /// Pixels flushed
    pub pixels: u32,
}

impl PassStats {
    /// Nothing was dirty
    pub const fn idle() -> Self {
        Self {
            areas: 0,
            chunks: 0,
            pixels: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.areas == 0
    }
}

/// Re-resolve alignment for objects whose size changed
fn update_layout(display: &mut DisplayState) {
    let (pw, ph) = (display.h_res, display.v_res);
    for id in display.order.iter() {
        let Some(obj) = display.objects.get_mut(id.0) else {
            continue;
        };
        let c = &mut obj.common;
        if !c.layout_dirty {
            continue;
        }
        c.layout_dirty = false;

        let old = c.bounds();
        if c.apply_alignment(pw, ph) {
            for r in [old, c.bounds()].into_iter().flatten() {
                display.dirty.invalidate(Some(r));
            }
        }
    }
}

fn update_objects(display: &mut DisplayState, timers: &mut TimerManager, now_ms: u32) {
    let screen = (display.h_res, display.v_res);
    for id in display.order.iter() {
        let Some(obj) = display.objects.get_mut(id.0) else {
            continue;
        };
        if !obj.common.visible {
            continue;
        }
        let mut ctx = ObjCtx {
            dirty: &mut display.dirty,
            timers: &mut *timers,
            events: &mut display.events,
            me: ObjectRef {
                display: display.id,
                object: *id,
            },
            now_ms,
            screen,
        };
        obj.widget.update(&mut obj.common, &mut ctx);
    }
}

/// Clear, draw and flush one band
fn paint_chunk(display: &mut DisplayState, chunk: FlushArea, sink: &mut Option<&mut dyn FlushSink>) {
    let swap = display.flags.swap;
    let bg = display.bg_color.to_raw(swap);
    let id = display.id;

    let buf = &mut display.buffers.active_mut()[..chunk.pixels()];
    fill(buf, bg);

    let mut target = DrawTarget { area: chunk, buf, swap };
    for oid in display.order.iter() {
        if let Some(obj) = display.objects.get_mut(oid.0) {
            if obj.common.visible {
                obj.widget.draw(&obj.common, &mut target);
            }
        }
    }

    if let Some(sink) = sink.as_mut() {
        trace!(
            "flush {},{} -> {},{}",
            chunk.x1,
            chunk.y1,
            chunk.x2,
            chunk.y2
        );
        sink.begin();
        sink.flush(id, &chunk, target.buf);
        if let Err(e) = sink.wait() {
            error!("flush not acknowledged: {}", e);
        }
    }
}

/// Repaint and flush everything dirty on one display
///
/// Returns [`PassStats::idle`] without touching the buffers when nothing is
/// dirty.
pub fn render_pass(
    display: &mut DisplayState,
    timers: &mut TimerManager,
    now_ms: u32,
    mut sink: Option<&mut dyn FlushSink>,
) -> PassStats {
    update_layout(display);

    if display.dirty.len() > 1 {
        display.dirty.merge();
    }
    if display.dirty.is_empty() {
        return PassStats::idle();
    }

    update_objects(display, timers, now_ms);

    // Capacity matches the tracker, so collecting cannot overflow
    let rects: HVec<Rect, DIRTY_CAPACITY> = display.dirty.areas().collect();
    let buf_pixels = display.buffers.buf_pixels();
    let mut stats = PassStats::idle();

    display.buffers.begin_frame();
    for r in rects.iter() {
        let width = r.width() as usize;
        let per_flush = buf_pixels / width;
        if per_flush == 0 {
            error!("dirty rect {} px wide exceeds the {} px buffer", width, buf_pixels);
            continue;
        }
        stats.areas += 1;

        let mut y = r.y1;
        while y <= r.y2 {
            let y_end = (y + per_flush as i32).min(r.y2 + 1);
            let chunk = FlushArea::new(r.x1, y, r.x2 + 1, y_end);
            paint_chunk(display, chunk, &mut sink);
            stats.chunks += 1;
            stats.pixels += chunk.pixels() as u32;
            y = y_end;
        }
    }

    let swap = sink.as_ref().map_or(true, |s| s.swap_requested());
    display.buffers.finish_frame(swap);
    display.dirty.clear();
    for (_, obj) in display.objects.iter_mut() {
        obj.common.dirty = false;
    }

    debug!(
        "pass: {} areas, {} chunks, {} px",
        stats.areas, stats.chunks, stats.pixels
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Key;
    use crate::blend::Color;
    use crate::buffer::FrameBufferSet;
    use crate::display::DisplayFlags;
    use crate::object::{Align, ObjectId};
    use crate::widget::testing::MonoFont;
    use crate::widget::{Label, Widget};
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        begins: usize,
        flushes: Vec<(FlushArea, Vec<u16>)>,
        /// Address of the buffer behind each flush
        sources: Vec<*const u16>,
        fail_wait: bool,
        swap: bool,
    }

    impl FlushSink for Recorder {
        fn begin(&mut self) {
            self.begins += 1;
        }

        fn flush(&mut self, _display: DisplayId, area: &FlushArea, pixels: &[u16]) {
            self.flushes.push((*area, pixels.to_vec()));
            self.sources.push(pixels.as_ptr());
        }

        fn wait(&mut self) -> Result<(), Error> {
            if self.fail_wait {
                Err(Error::Timeout)
            } else {
                Ok(())
            }
        }

        fn swap_requested(&self) -> bool {
            self.swap
        }
    }

    fn display(w: u32, h: u32, buf_pixels: usize, flags: DisplayFlags) -> DisplayState {
        let buffers = FrameBufferSet::allocate(buf_pixels, flags.double_buffer).unwrap();
        let id = DisplayId(Key {
            index: 0,
            generation: 0,
        });
        DisplayState::new(id, w, h, flags, buffers).unwrap()
    }

    fn label(d: &mut DisplayState, t: &mut TimerManager, text: &str) -> ObjectId {
        let id = d.create_object(Widget::Label(Label::new()), t, 0).unwrap();
        d.set_size(id, 10, 8).unwrap();
        d.with_object(id, t, 0, |o, w, ctx| {
            let l = w.as_label_mut().unwrap();
            l.set_font(o, ctx, Arc::new(MonoFont));
            l.set_color(o, ctx, Color::WHITE);
            l.set_text(o, ctx, text).unwrap();
        })
        .unwrap();
        id
    }

    #[test]
    fn test_idle_when_clean() {
        let mut d = display(4, 4, 16, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        let mut rec = Recorder::default();
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert!(stats.is_idle());
        assert!(rec.flushes.is_empty());
    }

    #[test]
    fn test_full_screen_in_bands() {
        let mut d = display(4, 4, 8, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        d.set_bg_color(Color::RED);

        let mut rec = Recorder::default();
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(
            stats,
            PassStats {
                areas: 1,
                chunks: 2,
                pixels: 16
            }
        );
        assert_eq!(rec.begins, 2);
        assert_eq!(rec.flushes[0].0, FlushArea::new(0, 0, 4, 2));
        assert_eq!(rec.flushes[1].0, FlushArea::new(0, 2, 4, 4));
        assert!(rec.flushes[1].1.iter().all(|&p| p == 0xF800));
        assert!(d.dirty().is_empty());
    }

    #[test]
    fn test_swapped_background() {
        let flags = DisplayFlags {
            swap: true,
            ..Default::default()
        };
        let mut d = display(2, 2, 4, flags);
        let mut t = TimerManager::new(30);
        d.set_bg_color(Color::RED);

        let mut rec = Recorder::default();
        render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(rec.flushes[0].1, [0x00F8; 4]);
    }

    #[test]
    fn test_rect_wider_than_buffer_is_skipped() {
        let mut d = display(4, 4, 2, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        d.invalidate_all();

        let mut rec = Recorder::default();
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(stats.chunks, 0);
        assert!(rec.flushes.is_empty());
        assert!(d.dirty().is_empty());
    }

    #[test]
    fn test_timeout_does_not_stop_the_pass() {
        let mut d = display(4, 4, 4, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        d.invalidate_all();

        let mut rec = Recorder {
            fail_wait: true,
            ..Default::default()
        };
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(stats.chunks, 4);
        assert_eq!(rec.flushes.len(), 4);
    }

    #[test]
    fn test_swap_after_last_flush_only_when_requested() {
        let flags = DisplayFlags {
            double_buffer: true,
            ..Default::default()
        };
        let mut d = display(4, 4, 16, flags);
        let mut t = TimerManager::new(30);

        d.invalidate_all();
        let mut rec = Recorder::default();
        render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert!(d.buffers().flushing_last());
        assert_eq!(d.buffers().active_index(), 0);

        d.invalidate_all();
        rec.swap = true;
        render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(d.buffers().active_index(), 1);
    }

    #[test]
    fn test_swap_waits_for_the_last_band() {
        let flags = DisplayFlags {
            double_buffer: true,
            ..Default::default()
        };
        // 4 rows per band on an 8-row screen
        let mut d = display(8, 8, 32, flags);
        let mut t = TimerManager::new(30);
        let mut rec = Recorder {
            swap: true,
            ..Default::default()
        };

        d.invalidate_all();
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(stats.chunks, 2);
        assert_eq!(rec.sources[0], rec.sources[1]);
        assert_eq!(d.buffers().active_index(), 1);

        d.invalidate_all();
        render_pass(&mut d, &mut t, 10, Some(&mut rec));
        assert_eq!(rec.sources.len(), 4);
        assert_eq!(rec.sources[2], rec.sources[3]);
        assert_ne!(rec.sources[1], rec.sources[2]);
        assert_eq!(d.buffers().active_index(), 0);
    }

    #[test]
    fn test_objects_drawn_over_background() {
        let mut d = display(10, 8, 80, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        label(&mut d, &mut t, "a");

        let mut rec = Recorder::default();
        let stats = render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert_eq!(stats.chunks, 1);
        let px = &rec.flushes[0].1;
        assert_eq!(&px[0..5], &[0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0]);
        assert_eq!(px[79], 0);
    }

    #[test]
    fn test_hidden_objects_are_skipped() {
        let mut d = display(10, 8, 80, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        let id = label(&mut d, &mut t, "a");
        d.set_visible(id, false).unwrap();

        let mut rec = Recorder::default();
        render_pass(&mut d, &mut t, 0, Some(&mut rec));
        assert!(rec.flushes[0].1.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_layout_follows_resize() {
        let mut d = display(100, 100, 1000, DisplayFlags::default());
        let mut t = TimerManager::new(30);
        let id = d.create_object(Widget::Label(Label::new()), &mut t, 0).unwrap();
        d.set_size(id, 10, 10).unwrap();
        d.align(id, Align::Center, 0, 0).unwrap();
        render_pass(&mut d, &mut t, 0, None);
        assert_eq!(d.pos(id), Ok((45, 45)));

        d.set_size(id, 20, 20).unwrap();
        render_pass(&mut d, &mut t, 0, None);
        assert_eq!(d.pos(id), Ok((40, 40)));
    }
}
