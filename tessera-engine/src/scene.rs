//! Scene state behind the context lock
//!
//! Everything the render thread mutates lives in one [`Scene`]: the shared
//! timer list and the display and touch arenas. Each method runs with the
//! data mutex held. Application callbacks are never called from here;
//! they are queued as [`Callback`]s and fired by the caller once the mutex
//! is released.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tessera_core::arena::Arena;
use tessera_core::render::{render_pass, FlushSink, PassStats};
use tessera_core::{
    DisplayEvent, DisplayId, DisplayState, Error, FlushArea, ObjectId, ObjectRef, TimerId, TimerManager,
    TimerTarget, TouchEvent, TouchId, TouchTracker,
};
use tessera_hal::clock::elapsed_ms;
use tessera_hal::IrqNotifier;

use crate::display::{EngineSink, FlushNotifier};
use crate::touch::ErasedTouch;

/// Panel driver hook; receives each finished band
pub type FlushCb = Box<dyn FnMut(DisplayId, &FlushArea, &[u16]) + Send>;
/// Animation progress notifications
pub type UpdateCb = Arc<dyn Fn(DisplayEvent, ObjectId) + Send + Sync>;
/// Touch events, either per device or per object
pub type TouchCb = Arc<dyn Fn(&TouchEvent) + Send + Sync>;
/// Application timer expiry
pub type TimerCb = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct DisplayEntry {
    pub state: DisplayState,
    pub flush_cb: FlushCb,
    pub update_cb: Option<UpdateCb>,
    pub user_data: Option<Box<dyn Any + Send>>,
    pub notifier: FlushNotifier,
}

pub(crate) struct TouchEntry {
    pub controller: Box<dyn ErasedTouch>,
    pub tracker: TouchTracker,
    pub display: Option<DisplayId>,
    /// Set when reads are gated on the controller interrupt
    pub irq: Option<IrqNotifier>,
    pub poll_timer: TimerId,
    pub event_cb: Option<TouchCb>,
}

/// An application callback waiting to be fired
pub(crate) enum Callback {
    Update(UpdateCb, DisplayEvent, ObjectId),
    Touch(TouchCb, TouchEvent),
    Timer(TimerCb),
}

impl Callback {
    pub fn fire(self) {
        match self {
            Callback::Update(cb, event, obj) => cb(event, obj),
            Callback::Touch(cb, event) => cb(&event),
            Callback::Timer(cb) => cb(),
        }
    }
}

pub(crate) struct Scene {
    pub timers: TimerManager,
    pub displays: Arena<DisplayEntry>,
    pub touches: Arena<TouchEntry>,
    pub app_timers: HashMap<TimerId, TimerCb>,
    pub object_touch: HashMap<ObjectRef, TouchCb>,
    last_frame_ms: Option<u32>,
}

impl Scene {
    pub fn new(target_fps: u32) -> Self {
        Self {
            timers: TimerManager::new(target_fps),
            displays: Arena::new(),
            touches: Arena::new(),
            app_timers: HashMap::new(),
            object_touch: HashMap::new(),
            last_frame_ms: None,
        }
    }

    pub fn display_mut(&mut self, id: DisplayId) -> Result<&mut DisplayEntry, Error> {
        self.displays.get_mut(id.0).ok_or(Error::NotFound)
    }

    pub fn touch_mut(&mut self, id: TouchId) -> Result<&mut TouchEntry, Error> {
        self.touches.get_mut(id.0).ok_or(Error::NotFound)
    }

    /// Fire every due timer and return the delay until the next one
    pub fn run_timers(&mut self, now: u32, out: &mut Vec<Callback>) -> Option<u32> {
        // Each timer restarts at `now` when it fires, so this bounds the loop
        // even for zero-period timers
        let budget = self.timers.len();
        for _ in 0..budget {
            let Some((id, target)) = self.timers.next_expired(now) else {
                break;
            };
            match target {
                TimerTarget::Animation(o) | TimerTarget::LabelScroll(o) | TimerTarget::LabelSnap(o) => {
                    let res = match self.displays.get_mut(o.display.0) {
                        Some(e) => e.state.dispatch_timer(o.object, target, &mut self.timers, now),
                        None => Err(Error::NotFound),
                    };
                    if res.is_err() {
                        debug!("timer {} outlived its object", id.0.index);
                        let _ = self.timers.delete(id);
                    }
                }
                TimerTarget::TouchPoll(t) => self.poll_touch(t, now, out),
                TimerTarget::App => {
                    // A timer whose repeat count ran out is already gone
                    let cb = if self.timers.contains(id) {
                        self.app_timers.get(&id).cloned()
                    } else {
                        self.app_timers.remove(&id)
                    };
                    if let Some(cb) = cb {
                        out.push(Callback::Timer(cb));
                    }
                }
            }
        }
        self.timers.next_delay(now)
    }

    /// Sample one touch device and route the resulting event
    fn poll_touch(&mut self, id: TouchId, now: u32, out: &mut Vec<Callback>) {
        let Some(dev) = self.touches.get_mut(id.0) else {
            return;
        };
        if let Some(irq) = &dev.irq {
            if !irq.take() {
                return;
            }
        }

        let sample = match dev.controller.sample() {
            Ok(s) => s,
            Err(e) => {
                warn!("touch read failed: {}", e);
                return;
            }
        };
        let Some(event) = dev.tracker.process(sample, now) else {
            return;
        };

        let target = dev.display.and_then(|did| {
            let entry = self.displays.get_mut(did.0)?;
            let object = dev.tracker.route(&entry.state, &event)?;
            let _ = entry.state.touch_object(object, &event);
            Some(ObjectRef { display: did, object })
        });

        if let Some(cb) = target.and_then(|o| self.object_touch.get(&o)) {
            out.push(Callback::Touch(Arc::clone(cb), event));
        }
        if let Some(cb) = &dev.event_cb {
            out.push(Callback::Touch(Arc::clone(cb), event));
        }
    }

    /// Run one render pass on every display
    pub fn render(&mut self, now: u32, flush_timeout: Duration, out: &mut Vec<Callback>) -> PassStats {
        let mut total = PassStats::idle();

        for (_, entry) in self.displays.iter_mut() {
            let DisplayEntry {
                state,
                flush_cb,
                update_cb,
                notifier,
                ..
            } = entry;

            let mut sink = EngineSink::new(flush_cb, notifier, flush_timeout);
            let stats = render_pass(state, &mut self.timers, now, Some(&mut sink as &mut dyn FlushSink));
            total.areas += stats.areas;
            total.chunks += stats.chunks;
            total.pixels += stats.pixels;

            for (event, obj) in state.take_events() {
                if let Some(cb) = update_cb {
                    out.push(Callback::Update(Arc::clone(cb), event, obj));
                }
            }
        }

        if let Some(last) = self.last_frame_ms {
            self.timers.record_frame(elapsed_ms(now, last));
        }
        self.last_frame_ms = Some(now);
        total
    }

    /// Delete an object along with its timers and touch bindings
    pub fn delete_object(&mut self, oref: ObjectRef, now: u32) -> Result<(), Error> {
        let entry = self.displays.get_mut(oref.display.0).ok_or(Error::NotFound)?;
        entry.state.delete_object(oref.object, &mut self.timers, now)?;

        self.object_touch.remove(&oref);
        for (_, dev) in self.touches.iter_mut() {
            if dev.display == Some(oref.display) && dev.tracker.pressed_object() == Some(oref.object) {
                dev.tracker.unbind();
            }
        }
        Ok(())
    }

    /// Remove a display and everything on it
    pub fn delete_display(&mut self, id: DisplayId, now: u32) -> Result<DisplayEntry, Error> {
        let mut entry = self.displays.remove(id.0).ok_or(Error::NotFound)?;
        entry.state.clear_objects(&mut self.timers, now);

        self.object_touch.retain(|o, _| o.display != id);
        for (_, dev) in self.touches.iter_mut() {
            if dev.display == Some(id) {
                dev.display = None;
                dev.tracker.unbind();
            }
        }
        debug!("display {} removed", id.0.index);
        Ok(entry)
    }

    /// Remove a touch device, detaching its interrupt and poll timer
    pub fn delete_touch(&mut self, id: TouchId) -> Result<(), Error> {
        let mut dev = self.touches.remove(id.0).ok_or(Error::NotFound)?;
        if dev.irq.is_some() {
            dev.controller.disable_interrupt();
        }
        let _ = self.timers.delete(dev.poll_timer);
        debug!("touch {} removed", id.0.index);
        Ok(())
    }

    /// Drop every touch device and display
    pub fn teardown(&mut self, now: u32) {
        for key in self.touches.keys() {
            let _ = self.delete_touch(TouchId(key));
        }
        for key in self.displays.keys() {
            if let Ok(entry) = self.delete_display(DisplayId(key), now) {
                if entry.state.into_buffers().into_external().is_some() {
                    warn!("display {} still owned caller buffers at teardown", key.index);
                }
            }
        }
        for id in self.app_timers.keys().copied().collect::<Vec<_>>() {
            let _ = self.timers.delete(id);
        }
        self.app_timers.clear();
        info!("scene torn down, {} timers left", self.timers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tessera_core::buffer::FrameBufferSet;
    use tessera_core::widget::{Label, Widget};
    use tessera_core::{DisplayFlags, TouchEventKind};
    use tessera_hal::{TouchController, TouchPoint};

    fn add_display(scene: &mut Scene, w: u32, h: u32) -> DisplayId {
        let id = DisplayId(scene.displays.next_key().unwrap());
        let buffers = FrameBufferSet::allocate(w as usize * 8, false).unwrap();
        let state = DisplayState::new(id, w, h, DisplayFlags::default(), buffers).unwrap();
        let notifier = FlushNotifier::new();
        let ack = notifier.clone();
        let entry = DisplayEntry {
            state,
            flush_cb: Box::new(move |_, _, _| ack.ready(true)),
            update_cb: None,
            user_data: None,
            notifier,
        };
        assert!(scene.displays.try_insert(entry).is_ok());
        id
    }

    /// Replays a fixed list of samples, one per read
    struct Script(Vec<Option<TouchPoint>>);

    impl TouchController for Script {
        type Error = ();

        fn read(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn points(&mut self, out: &mut [TouchPoint]) -> Result<usize, ()> {
            if self.0.is_empty() {
                return Ok(0);
            }
            match self.0.remove(0) {
                Some(p) => {
                    out[0] = p;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_app_timer_fires_and_expires() {
        let mut scene = Scene::new(30);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);

        let id = scene.timers.create(10, TimerTarget::App, 0).unwrap();
        scene.timers.set_repeat_count(id, 2).unwrap();
        scene.app_timers.insert(id, Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        let mut out = Vec::new();
        assert_eq!(scene.run_timers(5, &mut out), Some(5));
        assert!(out.is_empty());

        scene.run_timers(10, &mut out);
        scene.run_timers(20, &mut out);
        assert_eq!(out.len(), 2);
        out.into_iter().for_each(Callback::fire);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(scene.app_timers.is_empty());
        assert!(!scene.timers.contains(id));
    }

    #[test]
    fn test_zero_period_timer_does_not_spin() {
        let mut scene = Scene::new(30);
        let id = scene.timers.create(0, TimerTarget::App, 0).unwrap();
        scene.app_timers.insert(id, Arc::new(|| {}));

        let mut out = Vec::new();
        assert_eq!(scene.run_timers(0, &mut out), Some(0));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_render_flushes_and_records_frames() {
        let mut scene = Scene::new(30);
        let d = add_display(&mut scene, 16, 16);
        scene.display_mut(d).unwrap().state.invalidate_all();

        let mut out = Vec::new();
        let stats = scene.render(0, Duration::from_millis(20), &mut out);
        assert_eq!(stats.areas, 1);
        assert_eq!(stats.pixels, 256);
        assert_eq!(stats.chunks, 2);

        assert!(scene.render(10, Duration::from_millis(20), &mut out).is_idle());
        assert!(out.is_empty());
    }

    #[test]
    fn test_touch_poll_routes_to_object_and_app() {
        let mut scene = Scene::new(30);
        let d = add_display(&mut scene, 100, 100);
        let obj = {
            let Scene { displays, timers, .. } = &mut scene;
            let state = &mut displays.get_mut(d.0).unwrap().state;
            let obj = state.create_object(Widget::Label(Label::new()), timers, 0).unwrap();
            state.set_pos(obj, 10, 10).unwrap();
            state.set_size(obj, 20, 20).unwrap();
            obj
        };
        let oref = ObjectRef { display: d, object: obj };

        let seen: Arc<Mutex<Vec<(TouchEventKind, bool)>>> = Arc::default();
        let (s1, s2) = (Arc::clone(&seen), Arc::clone(&seen));
        scene.object_touch.insert(oref, Arc::new(move |e: &TouchEvent| {
            s1.lock().unwrap().push((e.kind, true));
        }));

        let tid = TouchId(scene.touches.next_key().unwrap());
        let poll_timer = scene.timers.create(5, TimerTarget::TouchPoll(tid), 0).unwrap();
        let script = Script(vec![Some(TouchPoint::new(15, 15)), Some(TouchPoint::new(90, 90)), None]);
        let entry = TouchEntry {
            controller: Box::new(script),
            tracker: TouchTracker::new(),
            display: Some(d),
            irq: None,
            poll_timer,
            event_cb: Some(Arc::new(move |e: &TouchEvent| {
                s2.lock().unwrap().push((e.kind, false));
            })),
        };
        assert!(scene.touches.try_insert(entry).is_ok());

        let mut out = Vec::new();
        for now in [5, 10, 15] {
            scene.run_timers(now, &mut out);
        }
        out.into_iter().for_each(Callback::fire);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (TouchEventKind::Press, true),
                (TouchEventKind::Press, false),
                (TouchEventKind::Move, true),
                (TouchEventKind::Move, false),
                (TouchEventKind::Release, true),
                (TouchEventKind::Release, false),
            ]
        );
    }

    #[test]
    fn test_irq_gates_reads() {
        let mut scene = Scene::new(30);
        let tid = TouchId(scene.touches.next_key().unwrap());
        let poll_timer = scene.timers.create(5, TimerTarget::TouchPoll(tid), 0).unwrap();
        let irq = IrqNotifier::new();
        let entry = TouchEntry {
            controller: Box::new(Script(vec![Some(TouchPoint::new(1, 1))])),
            tracker: TouchTracker::new(),
            display: None,
            irq: Some(irq.clone()),
            poll_timer,
            event_cb: Some(Arc::new(|_: &TouchEvent| {})),
        };
        assert!(scene.touches.try_insert(entry).is_ok());

        let mut out = Vec::new();
        scene.run_timers(5, &mut out);
        assert!(out.is_empty());

        irq.notify();
        scene.run_timers(10, &mut out);
        assert_eq!(out.len(), 1);
        assert!(!irq.is_pending());
    }

    #[test]
    fn test_delete_display_unbinds_touch() {
        let mut scene = Scene::new(30);
        let d = add_display(&mut scene, 32, 32);
        let tid = TouchId(scene.touches.next_key().unwrap());
        let poll_timer = scene.timers.create(5, TimerTarget::TouchPoll(tid), 0).unwrap();
        let entry = TouchEntry {
            controller: Box::new(Script(Vec::new())),
            tracker: TouchTracker::new(),
            display: Some(d),
            irq: None,
            poll_timer,
            event_cb: None,
        };
        assert!(scene.touches.try_insert(entry).is_ok());

        assert!(scene.delete_display(d, 0).is_ok());
        assert_eq!(scene.touch_mut(tid).unwrap().display, None);
        assert!(matches!(scene.delete_display(d, 0), Err(Error::NotFound)));

        scene.delete_touch(tid).unwrap();
        assert!(!scene.timers.contains(poll_timer));
    }
}
