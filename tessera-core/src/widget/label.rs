//! Text label widget
//!
//! Text is rasterised once into an 8-bit coverage mask the size of the
//! object; painting only blends that mask. The mask is rebuilt in `update`
//! whenever the text, style or scroll position changed.
//!
//! Long text can wrap, be clipped, scroll smoothly one step per timer tick,
//! or snap forward a word-aligned section at a time.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, error};

use crate::blend::{blend_mask, fill, Color, Opa, OPA_COVER};
use crate::error::{try_alloc, Error};
use crate::object::{Drawable, DrawTarget, ObjCtx, ObjectCommon};
use crate::timer::{TimerId, TimerTarget, REPEAT_INFINITE};
use crate::traits::Font;

/// Horizontal placement of each line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    /// Left for now; reserved for bidi-aware placement
    Auto,
}

/// What to do with text wider than the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LongMode {
    /// Break into lines at spaces
    Wrap,
    /// Scroll continuously
    Scroll,
    /// Jump a word-aligned section per interval
    ScrollSnap,
    /// Cut at the right edge
    #[default]
    Clip,
}

#[derive(Debug, Clone, Copy)]
struct ScrollState {
    offset: i32,
    step: i32,
    speed_ms: u32,
    looping: bool,
    scrolling: bool,
    timer: Option<TimerId>,
}

#[derive(Debug, Clone, Copy)]
struct SnapState {
    offset: i32,
    interval_ms: u32,
    looping: bool,
    timer: Option<TimerId>,
}

/// Label object payload
pub struct Label {
    font: Option<Arc<dyn Font>>,
    text: Option<String>,
    color: Color,
    opa: Opa,
    bg_color: Color,
    bg_enable: bool,
    text_align: TextAlign,
    long_mode: LongMode,
    line_spacing: u16,
    /// Width of the first line, in pixels
    text_width: i32,
    scroll: ScrollState,
    snap: SnapState,
    render_offset: i32,
    mask: Vec<Opa>,
    mask_w: u32,
    mask_h: u32,
}

impl Default for Label {
    fn default() -> Self {
        Self {
            font: None,
            text: None,
            color: Color::BLACK,
            opa: OPA_COVER,
            bg_color: Color::BLACK,
            bg_enable: false,
            text_align: TextAlign::Left,
            long_mode: LongMode::Clip,
            line_spacing: 2,
            text_width: 0,
            scroll: ScrollState {
                offset: 0,
                step: 1,
                speed_ms: 50,
                looping: true,
                scrolling: false,
                timer: None,
            },
            snap: SnapState {
                offset: 0,
                interval_ms: 2000,
                looping: true,
                timer: None,
            },
            render_offset: 0,
            mask: Vec::new(),
            mask_w: 0,
            mask_h: 0,
        }
    }
}

fn touch(obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
    obj.dirty = true;
    ctx.invalidate(obj);
}

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn long_mode(&self) -> LongMode {
        self.long_mode
    }

    pub fn text_width(&self) -> i32 {
        self.text_width
    }

    pub fn scroll_offset(&self) -> i32 {
        self.scroll.offset
    }

    pub fn snap_offset(&self) -> i32 {
        self.snap.offset
    }

    pub fn is_scrolling(&self) -> bool {
        self.scroll.scrolling
    }

    pub fn set_font(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, font: Arc<dyn Font>) {
        self.font = Some(font);
        touch(obj, ctx);
    }

    pub fn set_text(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, text: &str) -> Result<(), Error> {
        let mut s = String::new();
        s.try_reserve_exact(text.len())?;
        s.push_str(text);
        self.text = Some(s);

        match self.long_mode {
            LongMode::Scroll => {
                if self.scroll.scrolling {
                    self.scroll.scrolling = false;
                    pause(ctx, self.scroll.timer);
                }
                self.scroll.offset = 0;
                self.text_width = 0;
            }
            LongMode::ScrollSnap => {
                pause(ctx, self.snap.timer);
                self.snap.offset = 0;
                self.text_width = 0;
            }
            LongMode::Wrap | LongMode::Clip => {}
        }

        touch(obj, ctx);
        Ok(())
    }

    /// Set the text from format arguments, e.g. `format_args!("{} %", v)`
    pub fn set_text_fmt(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        args: fmt::Arguments<'_>,
    ) -> Result<(), Error> {
        let text = alloc::fmt::format(args);
        self.set_text(obj, ctx, &text)
    }

    pub fn set_color(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, color: Color) {
        self.color = color;
        touch(obj, ctx);
    }

    pub fn set_opa(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, opa: Opa) {
        self.opa = opa;
        touch(obj, ctx);
    }

    pub fn set_bg_color(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, color: Color) {
        self.bg_color = color;
        touch(obj, ctx);
    }

    pub fn set_bg_enable(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, enable: bool) {
        self.bg_enable = enable;
        touch(obj, ctx);
    }

    pub fn set_text_align(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, align: TextAlign) {
        self.text_align = align;
        touch(obj, ctx);
    }

    pub fn set_line_spacing(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, spacing: u16) {
        self.line_spacing = spacing;
        touch(obj, ctx);
    }

    /// Switch long mode, creating or deleting the scroll and snap timers
    pub fn set_long_mode(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        mode: LongMode,
    ) -> Result<(), Error> {
        let old = self.long_mode;
        self.long_mode = mode;
        if old == mode {
            return Ok(());
        }

        if self.scroll.scrolling {
            self.scroll.scrolling = false;
            pause(ctx, self.scroll.timer);
        }
        if old == LongMode::ScrollSnap {
            pause(ctx, self.snap.timer);
        }
        self.scroll.offset = 0;
        self.snap.offset = 0;
        self.text_width = 0;

        let me = ctx.me;
        match (mode == LongMode::Scroll, self.scroll.timer) {
            (true, None) => {
                let t = paused_timer(ctx, self.scroll.speed_ms, TimerTarget::LabelScroll(me))?;
                self.scroll.timer = Some(t);
            }
            (false, Some(t)) => {
                let _ = ctx.timers.delete(t);
                self.scroll.timer = None;
            }
            _ => {}
        }

        match (mode == LongMode::ScrollSnap, self.snap.timer) {
            (true, None) => {
                let t = paused_timer(ctx, self.snap.interval_ms, TimerTarget::LabelSnap(me))?;
                self.snap.timer = Some(t);
            }
            (false, Some(t)) => {
                let _ = ctx.timers.delete(t);
                self.snap.timer = None;
            }
            _ => {}
        }

        debug!("label long mode {:?}", mode);
        touch(obj, ctx);
        Ok(())
    }

    /// Milliseconds between scroll steps
    pub fn set_scroll_speed(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, speed_ms: u32) -> Result<(), Error> {
        if speed_ms == 0 {
            return Err(Error::InvalidArg);
        }
        self.scroll.speed_ms = speed_ms;
        if let Some(t) = self.scroll.timer {
            ctx.timers.set_period(t, speed_ms)?;
        }
        touch(obj, ctx);
        Ok(())
    }

    pub fn set_scroll_loop(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, looping: bool) {
        self.scroll.looping = looping;
        touch(obj, ctx);
    }

    /// Pixels moved per scroll tick; may be negative, never zero
    pub fn set_scroll_step(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, step: i32) -> Result<(), Error> {
        if step == 0 {
            return Err(Error::InvalidArg);
        }
        self.scroll.step = step;
        touch(obj, ctx);
        Ok(())
    }

    pub fn set_snap_interval(
        &mut self,
        obj: &mut ObjectCommon,
        ctx: &mut ObjCtx<'_>,
        interval_ms: u32,
    ) -> Result<(), Error> {
        if interval_ms == 0 {
            return Err(Error::InvalidArg);
        }
        self.snap.interval_ms = interval_ms;
        if let Some(t) = self.snap.timer {
            ctx.timers.set_period(t, interval_ms)?;
        }
        touch(obj, ctx);
        Ok(())
    }

    pub fn set_snap_loop(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>, looping: bool) {
        self.snap.looping = looping;
        touch(obj, ctx);
    }

    /// Scroll timer expired
    pub fn on_scroll_timer(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        if !self.scroll.scrolling || self.long_mode != LongMode::Scroll {
            return;
        }
        // The previous step has not been rendered yet
        if self.scroll.offset != self.render_offset {
            return;
        }

        self.scroll.offset += self.scroll.step;
        if self.scroll.offset > self.text_width {
            if self.scroll.looping {
                self.scroll.offset = -(obj.w as i32);
            } else {
                self.scroll.scrolling = false;
                pause(ctx, self.scroll.timer);
                return;
            }
        }

        touch(obj, ctx);
    }

    /// Snap timer expired
    pub fn on_snap_timer(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        if self.long_mode != LongMode::ScrollSnap {
            return;
        }
        let (Some(font), Some(text)) = (self.font.as_deref(), self.text.as_deref()) else {
            return;
        };

        let w = obj.w as i32;
        let mut step = snap_width(font, text, self.snap.offset, w);
        if step == 0 {
            step = w;
        }
        self.snap.offset += step;

        if self.snap.offset >= self.text_width {
            if self.snap.looping {
                self.snap.offset = 0;
            } else {
                self.snap.offset = (self.text_width - w).max(0);
                pause(ctx, self.snap.timer);
            }
        }

        touch(obj, ctx);
    }

    fn update_scroll_state(&mut self, obj: &ObjectCommon, ctx: &mut ObjCtx<'_>) {
        let overflow = self.text_width > obj.w as i32;

        if self.long_mode == LongMode::Scroll && overflow {
            if !self.scroll.scrolling {
                self.scroll.scrolling = true;
                restart(ctx, self.scroll.timer);
            }
        } else if self.scroll.scrolling {
            self.scroll.scrolling = false;
            pause(ctx, self.scroll.timer);
            self.scroll.offset = 0;
        }

        if self.long_mode == LongMode::ScrollSnap {
            if overflow {
                restart(ctx, self.snap.timer);
            } else {
                pause(ctx, self.snap.timer);
                self.snap.offset = 0;
            }
        }
    }

    /// Rasterise the text into a fresh coverage mask
    fn build_mask(&mut self, obj: &ObjectCommon) -> Result<(), Error> {
        let (Some(font), Some(text)) = (self.font.as_deref(), self.text.as_deref()) else {
            return Ok(());
        };
        let (w, h) = (obj.w as i32, obj.h as i32);

        let mut mask = try_alloc::<Opa>(obj.w as usize * obj.h as usize)?;

        self.text_width = text
            .split('\n')
            .next()
            .map_or(0, |first| line_width(font, first));

        let line_height = font.line_height() as i32;
        let pitch = line_height + self.line_spacing as i32;
        let max_lines = if pitch > 0 { (h / pitch).max(1) as usize } else { 1 };
        let lines = split_lines(font, text, self.long_mode, w, max_lines);

        let offset = match self.long_mode {
            LongMode::Scroll if self.scroll.scrolling => self.render_offset,
            LongMode::ScrollSnap => self.render_offset,
            _ => 0,
        };

        let mut y = 0;
        for line in lines {
            if y + line_height > h {
                break;
            }
            let start_x = line_start_x(self.text_align, w, line_width(font, line)) - offset;
            let line = if self.long_mode == LongMode::ScrollSnap {
                &line[..snap_render_end(font, line, start_x, w)]
            } else {
                line
            };
            render_line(font, &mut mask, w, h, line, start_x, y);
            y += pitch;
        }

        self.mask = mask;
        self.mask_w = obj.w;
        self.mask_h = obj.h;
        Ok(())
    }
}

fn pause(ctx: &mut ObjCtx<'_>, timer: Option<TimerId>) {
    if let Some(t) = timer {
        let _ = ctx.timers.pause(t);
    }
}

fn restart(ctx: &mut ObjCtx<'_>, timer: Option<TimerId>) {
    if let Some(t) = timer {
        let now = ctx.now_ms;
        let _ = ctx.timers.reset(t, now);
        let _ = ctx.timers.resume(t);
    }
}

fn paused_timer(ctx: &mut ObjCtx<'_>, period_ms: u32, target: TimerTarget) -> Result<TimerId, Error> {
    let t = ctx.timers.create(period_ms, target, ctx.now_ms)?;
    ctx.timers.set_repeat_count(t, REPEAT_INFINITE)?;
    ctx.timers.pause(t)?;
    Ok(t)
}

fn line_width(font: &dyn Font, line: &str) -> i32 {
    line.chars().map(|c| font.advance(c)).sum()
}

fn line_start_x(align: TextAlign, w: i32, line_w: i32) -> i32 {
    let x = match align {
        TextAlign::Left | TextAlign::Auto => 0,
        TextAlign::Center => (w - line_w) / 2,
        TextAlign::Right => w - line_w,
    };
    x.max(0)
}

/// Break text into at most `max_lines` visible lines
///
/// Empty lines are dropped. In wrap mode a line ends at the last space that
/// fits, or before the first glyph that does not; a single glyph wider than
/// the label still gets its own line.
pub(crate) fn split_lines<'t>(
    font: &dyn Font,
    text: &'t str,
    mode: LongMode,
    width: i32,
    max_lines: usize,
) -> Vec<&'t str> {
    let mut lines = Vec::new();

    if mode != LongMode::Wrap {
        lines.extend(text.split('\n').filter(|l| !l.is_empty()).take(max_lines));
        return lines;
    }

    let mut rest = text;
    while !rest.is_empty() && lines.len() < max_lines {
        let mut line_w = 0;
        let mut last_space = None;
        let (mut end, mut next) = (rest.len(), rest.len());

        for (i, c) in rest.char_indices() {
            if c == '\n' {
                end = i;
                next = i + 1;
                break;
            }

            let cw = font.advance(c);
            if line_w + cw > width {
                match last_space {
                    Some(s) if s > 0 => {
                        end = s;
                        next = s + 1;
                    }
                    _ if i == 0 => {
                        end = c.len_utf8();
                        next = end;
                    }
                    _ => {
                        end = i;
                        next = i;
                    }
                }
                break;
            }

            line_w += cw;
            if c == ' ' {
                last_space = Some(i);
            }
        }

        if end > 0 {
            lines.push(&rest[..end]);
        }
        rest = &rest[next..];
    }

    lines
}

/// Width of whole characters to advance by in snap mode
///
/// Starts at `offset` pixels into the text and prefers ending on a word
/// boundary. Returns `w` if nothing fits.
pub(crate) fn snap_width(font: &dyn Font, text: &str, offset: i32, w: i32) -> i32 {
    let mut chars = text.chars().peekable();

    let mut skipped = 0;
    while skipped < offset {
        match chars.next() {
            Some(c) => skipped += font.advance(c),
            None => break,
        }
    }

    let mut section = 0;
    let mut last_valid = 0;
    let mut last_space = 0;
    for c in chars {
        if c == '\n' {
            break;
        }
        let cw = font.advance(c);
        if section + cw > w {
            if last_space > 0 {
                last_valid = last_space;
            }
            break;
        }
        section += cw;
        last_valid = section;
        if c == ' ' {
            last_space = section;
        }
    }

    if last_valid > 0 {
        last_valid
    } else {
        w
    }
}

/// Byte length of the line prefix that fits when snapping
fn snap_render_end(font: &dyn Font, line: &str, start_x: i32, w: i32) -> usize {
    let mut x = start_x;
    let mut last_valid = 0;
    let mut last_space = None;

    for (i, c) in line.char_indices() {
        let Some(g) = font.glyph(c) else {
            continue;
        };
        let cw = g.adv_w as i32;
        if x + cw > w {
            return last_space.unwrap_or(last_valid);
        }
        x += cw;
        last_valid = i + c.len_utf8();
        if c == ' ' {
            last_space = Some(last_valid);
        }
    }

    line.len()
}

fn render_line(font: &dyn Font, mask: &mut [Opa], w: i32, h: i32, line: &str, start_x: i32, y: i32) {
    let mut x = start_x;

    for c in line.chars() {
        let Some(g) = font.glyph(c) else {
            continue;
        };
        let Some(bitmap) = font.glyph_bitmap(c, &g) else {
            continue;
        };

        let ofs_y = font.baseline_offset(&g);
        for iy in 0..g.box_h {
            let py = y + ofs_y + iy as i32;
            if py < 0 || py >= h {
                continue;
            }
            for ix in 0..g.box_w {
                let px = x + g.ofs_x as i32 + ix as i32;
                if px < 0 || px >= w {
                    continue;
                }
                mask[(py * w + px) as usize] = font.pixel(bitmap, ix, iy, g.box_w);
            }
        }

        x += g.adv_w as i32;
        if x >= w {
            break;
        }
    }
}

impl Drawable for Label {
    fn update(&mut self, obj: &mut ObjectCommon, ctx: &mut ObjCtx<'_>) {
        if self.text.is_none() {
            return;
        }

        self.render_offset = match self.long_mode {
            LongMode::Scroll => self.scroll.offset,
            LongMode::ScrollSnap => self.snap.offset,
            LongMode::Wrap | LongMode::Clip => 0,
        };

        if !obj.dirty {
            return;
        }
        if self.font.is_none() {
            debug!("label has no font");
            return;
        }

        if let Err(e) = self.build_mask(obj) {
            error!("label mask: {}", e);
            return;
        }
        obj.dirty = false;
        self.update_scroll_state(obj, ctx);
    }

    fn draw(&mut self, obj: &ObjectCommon, target: &mut DrawTarget<'_>) {
        if self.text.is_none() {
            return;
        }
        let Some(clip) = target.area.clip(obj.x, obj.y, obj.w, obj.h) else {
            return;
        };
        let stride = target.stride();
        let swap = target.swap;

        if self.bg_enable {
            let raw = self.bg_color.to_raw(swap);
            for y in clip.y1..clip.y2 {
                let start = target.index(clip.x1, y);
                fill(&mut target.buf[start..start + clip.width()], raw);
            }
        }

        // Mask may lag a resize until the next update
        let Some(clip) = clip.clip(obj.x, obj.y, self.mask_w, self.mask_h) else {
            return;
        };
        let mask_stride = self.mask_w as usize;
        let mask_start = (clip.y1 - obj.y) as usize * mask_stride + (clip.x1 - obj.x) as usize;
        let dest_start = target.index(clip.x1, clip.y1);

        blend_mask(
            &mut target.buf[dest_start..],
            stride,
            &self.mask[mask_start..],
            mask_stride,
            clip.width(),
            clip.height(),
            self.color,
            self.opa,
            swap,
        );
    }

    fn delete(&mut self, ctx: &mut ObjCtx<'_>) {
        for t in [self.scroll.timer.take(), self.snap.timer.take()].into_iter().flatten() {
            let _ = ctx.timers.delete(t);
        }
        self.mask = Vec::new();
    }
}
