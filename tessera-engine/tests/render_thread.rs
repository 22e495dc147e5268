//! End-to-end tests against a running render thread
//!
//! The flush callback copies every band into an in-memory panel and
//! acknowledges it, so the tests can look at what actually reached the
//! screen.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tessera_core::traits::{Font, GlyphInfo};
use tessera_engine::{
    Color, Display, DisplayBuffers, DisplayConfig, DisplayId, EngineConfig, FlushArea, FlushNotifier,
    GraphicsContext, SystemClock, TouchConfig, TouchEvent, TouchEventKind,
};
use tessera_hal::{Clock, TouchController, TouchPoint};

const W: u32 = 32;
const H: u32 = 16;

struct Rig {
    ctx: GraphicsContext,
    display: Display,
    panel: Arc<Mutex<Vec<u16>>>,
    flushes: Arc<AtomicUsize>,
}

impl Rig {
    fn new(buffers: DisplayBuffers) -> Self {
        let ctx = GraphicsContext::init(EngineConfig {
            flush_timeout_ms: 200,
            ..Default::default()
        })
        .unwrap();

        let panel = Arc::new(Mutex::new(vec![0xAAAA_u16; (W * H) as usize]));
        let flushes = Arc::new(AtomicUsize::new(0));
        let ack: Arc<Mutex<Option<FlushNotifier>>> = Arc::default();

        let (p, f, a) = (Arc::clone(&panel), Arc::clone(&flushes), Arc::clone(&ack));
        let flush = move |_: DisplayId, area: &FlushArea, px: &[u16]| {
            let mut panel = p.lock().unwrap();
            let stride = area.width();
            for (row, y) in (area.y1..area.y2).enumerate() {
                let dst = y as usize * W as usize + area.x1 as usize;
                panel[dst..dst + stride].copy_from_slice(&px[row * stride..(row + 1) * stride]);
            }
            f.fetch_add(1, Ordering::SeqCst);
            if let Some(n) = a.lock().unwrap().as_ref() {
                n.ready(true);
            }
        };

        // Keep the render thread out until the notifier is in place
        let display = {
            let _guard = ctx.lock().unwrap();
            let display = ctx
                .add_display(DisplayConfig::new(W, H, (W * 4) as usize), buffers, flush)
                .unwrap();
            *ack.lock().unwrap() = Some(display.notifier());
            display
        };

        Self {
            ctx,
            display,
            panel,
            flushes,
        }
    }

    fn px(&self, x: u32, y: u32) -> u16 {
        self.panel.lock().unwrap()[(y * W + x) as usize]
    }

    fn all(&self, raw: u16) -> bool {
        self.panel.lock().unwrap().iter().all(|&p| p == raw)
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

static SOLID: [u8; 32] = [0xFF; 32];

/// 4x8 solid boxes on a 5 px advance
struct BoxFont;

impl Font for BoxFont {
    fn line_height(&self) -> u16 {
        8
    }

    fn base_line(&self) -> u16 {
        0
    }

    fn glyph(&self, unicode: char) -> Option<GlyphInfo> {
        unicode.is_ascii_graphic().then_some(GlyphInfo {
            adv_w: 5,
            box_w: 4,
            box_h: 8,
            ofs_x: 0,
            ofs_y: 0,
        })
    }

    fn glyph_bitmap(&self, _unicode: char, _glyph: &GlyphInfo) -> Option<&[u8]> {
        Some(&SOLID)
    }

    fn pixel(&self, bitmap: &[u8], x: u16, y: u16, box_w: u16) -> u8 {
        bitmap[y as usize * box_w as usize + x as usize]
    }
}

/// Controller fed from a shared queue; an empty queue means no contact
struct Scripted(Arc<Mutex<VecDeque<TouchPoint>>>);

impl TouchController for Scripted {
    type Error = ();

    fn read(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn points(&mut self, out: &mut [TouchPoint]) -> Result<usize, ()> {
        match self.0.lock().unwrap().pop_front() {
            Some(p) => {
                out[0] = p;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[test]
fn test_background_reaches_panel() {
    let rig = Rig::new(DisplayBuffers::Internal);
    rig.display.set_bg_color(Color::RED).unwrap();
    assert!(wait_until(Duration::from_secs(2), || rig.all(Color::RED.0)));
    // 16 rows through a 4-row buffer
    assert!(rig.flushes.load(Ordering::SeqCst) >= 4);
    rig.ctx.deinit();
}

#[test]
fn test_label_text_is_drawn() {
    let rig = Rig::new(DisplayBuffers::Internal);
    let label = rig.display.create_label().unwrap();
    label.set_font(Arc::new(BoxFont)).unwrap();
    label.set_color(Color::WHITE).unwrap();
    label.set_pos(0, 0).unwrap();
    label.set_size(W, 8).unwrap();
    label.set_text("AB").unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        rig.px(0, 0) == Color::WHITE.0 && rig.px(5, 7) == Color::WHITE.0
    }));
    // Gap between the glyphs and the row below the line stay background
    assert_eq!(rig.px(4, 0), Color::BLACK.0);
    assert_eq!(rig.px(0, 8), Color::BLACK.0);
    assert_eq!(label.text().unwrap().as_deref(), Some("AB"));
}

#[test]
fn test_timer_callback_can_use_handles() {
    let rig = Rig::new(DisplayBuffers::Internal);
    let hits = Arc::new(AtomicUsize::new(0));

    let (h, display) = (Arc::clone(&hits), rig.display.clone());
    let timer = {
        let _guard = rig.ctx.lock().unwrap();
        let timer = rig
            .ctx
            .timer_create(10, move || {
                h.fetch_add(1, Ordering::SeqCst);
                display.set_bg_color(Color::BLUE).unwrap();
            })
            .unwrap();
        timer.set_repeat_count(3).unwrap();
        timer
    };

    assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 3));
    assert!(wait_until(Duration::from_secs(2), || rig.all(Color::BLUE.0)));
    assert!(!timer.is_active());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn test_touch_is_routed_to_object() {
    let rig = Rig::new(DisplayBuffers::Internal);
    let queue: Arc<Mutex<VecDeque<TouchPoint>>> = Arc::default();
    let touch = rig
        .ctx
        .add_touch(
            TouchConfig {
                poll_ms: 5,
                use_interrupt: true,
            },
            Scripted(Arc::clone(&queue)),
        )
        .unwrap();
    // No interrupt line: falls back to polling
    assert!(!touch.uses_interrupt().unwrap());
    touch.set_display(&rig.display).unwrap();

    let button = rig.display.create_label().unwrap();
    button.set_pos(0, 0).unwrap();
    button.set_size(16, 16).unwrap();

    let on_object: Arc<Mutex<Vec<TouchEventKind>>> = Arc::default();
    let on_device = Arc::new(AtomicUsize::new(0));
    let (o, d) = (Arc::clone(&on_object), Arc::clone(&on_device));
    button
        .set_touch_cb(move |e: &TouchEvent| o.lock().unwrap().push(e.kind))
        .unwrap();
    touch
        .set_event_cb(move |_: &TouchEvent| {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    queue.lock().unwrap().push_back(TouchPoint::new(5, 5));
    assert!(wait_until(Duration::from_secs(2), || on_object.lock().unwrap().len() == 2));
    assert_eq!(
        *on_object.lock().unwrap(),
        vec![TouchEventKind::Press, TouchEventKind::Release]
    );
    assert_eq!(on_device.load(Ordering::SeqCst), 2);

    // A press outside the object only reaches the device callback
    queue.lock().unwrap().push_back(TouchPoint::new(20, 5));
    assert!(wait_until(Duration::from_secs(2), || on_device.load(Ordering::SeqCst) == 4));
    assert_eq!(on_object.lock().unwrap().len(), 2);

    touch.delete().unwrap();
}

#[test]
fn test_held_lock_pauses_rendering() {
    let rig = Rig::new(DisplayBuffers::Internal);
    assert!(wait_until(Duration::from_secs(2), || rig.all(Color::BLACK.0)));

    let before = {
        let _guard = rig.ctx.lock().unwrap();
        rig.display.set_bg_color(Color::GREEN).unwrap();
        let before = rig.flushes.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(rig.flushes.load(Ordering::SeqCst), before);
        before
    };

    assert!(wait_until(Duration::from_secs(2), || rig.all(Color::GREEN.0)));
    assert!(rig.flushes.load(Ordering::SeqCst) > before);
}

#[test]
fn test_deleted_object_handle_fails() {
    let rig = Rig::new(DisplayBuffers::Internal);
    let qr = rig.display.create_qrcode().unwrap();
    assert_eq!(qr.size().unwrap(), (100, 100));
    qr.delete().unwrap();
    assert_eq!(qr.pos(), Err(tessera_engine::Error::NotFound));
    assert_eq!(rig.display.object_count().unwrap(), 0);
}

#[test]
fn test_display_delete_returns_caller_buffers() {
    let rig = Rig::new(DisplayBuffers::External {
        buf1: vec![0; (W * 4) as usize],
        buf2: None,
    });
    assert!(wait_until(Duration::from_secs(2), || rig.all(Color::BLACK.0)));

    let Rig {
        ctx,
        display,
        flushes,
        ..
    } = rig;
    let (buf1, buf2) = display.delete().unwrap().expect("external buffers");
    assert_eq!(buf1.len(), (W * 4) as usize);
    assert!(buf2.is_none());
    // The flush callback went with the display
    assert_eq!(Arc::strong_count(&flushes), 1);
    ctx.deinit();
}

#[test]
fn test_drop_tears_down_scene() {
    let rig = Rig::new(DisplayBuffers::Internal);
    let Rig { ctx, flushes, .. } = rig;
    assert!(wait_until(Duration::from_secs(2), || flushes.load(Ordering::SeqCst) > 0));
    drop(ctx);
    assert_eq!(Arc::strong_count(&flushes), 1);
}

#[test]
fn test_fps_is_measured() {
    let rig = Rig::new(DisplayBuffers::Internal);
    assert_eq!(rig.ctx.target_fps().unwrap(), 30);
    assert!(wait_until(Duration::from_secs(5), || rig.ctx.fps().unwrap() > 0));
}

#[test]
fn test_user_data_closure_can_call_display() {
    let rig = Rig::new(DisplayBuffers::Internal);
    rig.display.set_user_data(Box::new(7u32)).unwrap();

    // Run on another thread so a lock-up fails the test instead of hanging it
    let (tx, rx) = mpsc::channel();
    let display = rig.display.clone();
    thread::spawn(move || {
        let res = display.with_user_data(|data| {
            let value = data.and_then(|d| d.downcast_ref::<u32>().copied());
            (value, display.resolution())
        });
        let _ = tx.send(res);
    });

    let (value, resolution) = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("with_user_data blocked")
        .unwrap();
    assert_eq!(value, Some(7));
    assert_eq!(resolution, Ok((W, H)));
    // Put back afterwards
    assert_eq!(rig.display.with_user_data(|d| d.is_some()), Ok(true));
}

#[test]
fn test_shutdown_waits_out_a_slow_pass() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let ctx = GraphicsContext::init_with_clock(
        EngineConfig {
            flush_timeout_ms: 1500,
            ..Default::default()
        },
        Arc::clone(&clock),
    )
    .unwrap();

    // Never acknowledged, so the single band sits in the flush wait
    let started = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&started);
    let display = ctx
        .add_display(
            DisplayConfig::new(W, H, (W * H) as usize),
            DisplayBuffers::Internal,
            move |_: DisplayId, _: &FlushArea, _: &[u16]| {
                s.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
    drop(display);
    assert!(wait_until(Duration::from_secs(2), || started.load(Ordering::SeqCst) > 0));

    ctx.deinit();
    // The render thread was joined, so nothing else holds the shared state
    assert_eq!(Arc::strong_count(&clock), 1);
}

#[test]
fn test_narrow_buffer_is_accepted_and_skipped() {
    let ctx = GraphicsContext::init(EngineConfig::default()).unwrap();
    let flushes = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&flushes);
    let display = ctx
        .add_display(
            DisplayConfig::new(W, H, (W / 2) as usize),
            DisplayBuffers::Internal,
            move |_: DisplayId, _: &FlushArea, _: &[u16]| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    // Every area is a full-width row or more, wider than the buffer
    thread::sleep(Duration::from_millis(100));
    assert_eq!(flushes.load(Ordering::SeqCst), 0);
    assert_eq!(display.resolution().unwrap(), (W, H));
}
