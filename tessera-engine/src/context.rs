//! Graphics context: owner of the render thread and the scene

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use tessera_core::buffer::FrameBufferSet;
use tessera_core::touch::{POLL_MS_DEFAULT, POLL_MS_IRQ_DEFAULT};
use tessera_core::{DisplayId, DisplayState, Error, FlushArea, TimerTarget, TouchId, TouchTracker};
use tessera_hal::{Clock, IrqNotifier, TouchController};

use crate::clock::SystemClock;
use crate::config::{DisplayBuffers, DisplayConfig, EngineConfig, TouchConfig};
use crate::display::{Display, FlushNotifier};
use crate::event::{EventBits, DELETE_DONE, NEED_DELETE};
use crate::lock::{RecursiveGuard, RecursiveLock};
use crate::render_loop;
use crate::scene::{DisplayEntry, Scene, TouchEntry};
use crate::timer::TimerHandle;
use crate::touch::{ErasedTouch, TouchDevice};

/// How often shutdown reports a render thread that has not stopped yet
const DELETE_WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Smallest stack handed to the render thread on hosted targets
const MIN_HOST_STACK: usize = 64 * 1024;

/// Guard returned by [`GraphicsContext::lock`]
pub type LockGuard<'a> = RecursiveGuard<'a>;

/// State shared by the context, its handles and the render thread
pub(crate) struct Shared {
    pub lock: RecursiveLock,
    scene: Mutex<Scene>,
    pub events: EventBits,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
}

impl Shared {
    fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            lock: RecursiveLock::new(),
            scene: Mutex::new(Scene::new(config.fps)),
            events: EventBits::new(),
            clock,
            config,
        }
    }

    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    /// The scene data; caller must hold `lock`
    pub fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the recursive lock and run `f` on the scene
    pub fn try_scene<R>(&self, f: impl FnOnce(&mut Scene, u32) -> Result<R, Error>) -> Result<R, Error> {
        let _guard = self.lock.lock()?;
        let now = self.now_ms();
        let mut scene = self.scene();
        f(&mut scene, now)
    }
}

/// A running rendering engine
///
/// Owns the render thread. Displays, touch devices and timers are added
/// through it and then driven through their own handles.
pub struct GraphicsContext {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl GraphicsContext {
    /// Start the render thread with the system clock
    pub fn init(config: EngineConfig) -> Result<Self, Error> {
        Self::init_with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn init_with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        if let Err(e) = config.validate() {
            error!("{}", e);
            return Err(e.into());
        }

        let task = config.task;
        debug!(
            "render task priority {}, affinity {}, caps {:#x} (advisory)",
            task.priority, task.affinity, task.stack_caps
        );

        let shared = Arc::new(Shared::new(config, clock));
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("tessera-render".into())
            .stack_size(task.stack_size.max(MIN_HOST_STACK))
            .spawn(move || render_loop::run(&worker))
            .map_err(|e| {
                error!("render thread spawn failed: {}", e);
                Error::NoMem
            })?;

        info!("graphics context started, target {} fps", config.fps);
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Stop the render thread and release every display and touch device
    pub fn deinit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.events.set(NEED_DELETE);
        // A pass stuck on unacknowledged flushes can take several seconds
        loop {
            match self.shared.events.wait(DELETE_DONE, false, Some(DELETE_WARN_INTERVAL)) {
                Ok(_) => break,
                Err(_) if thread.is_finished() => break,
                Err(_) => warn!("render thread still busy, waiting for it to stop"),
            }
        }
        if thread.join().is_err() {
            error!("render thread panicked");
        }

        match self.shared.lock.lock() {
            Ok(_guard) => {
                let now = self.shared.now_ms();
                self.shared.scene().teardown(now);
            }
            Err(e) => error!("teardown skipped: {}", e),
        }
        info!("graphics context stopped");
    }

    /// Hold the scene lock across several calls
    ///
    /// Re-entrant on the calling thread. The render thread pauses until the
    /// guard is dropped.
    pub fn lock(&self) -> Result<LockGuard<'_>, Error> {
        self.shared.lock.lock()
    }

    /// Register a panel
    ///
    /// `flush_cb` receives each finished band and must acknowledge it with
    /// [`Display::flush_ready`] or a [`FlushNotifier`]. It runs on the render
    /// thread with the scene borrowed and must not call any other engine
    /// API.
    pub fn add_display(
        &self,
        cfg: DisplayConfig,
        buffers: DisplayBuffers,
        flush_cb: impl FnMut(DisplayId, &FlushArea, &[u16]) + Send + 'static,
    ) -> Result<Display, Error> {
        cfg.flags.validate()?;
        if let Err(e) = cfg.validate() {
            warn!("{}", e);
            return Err(e.into());
        }

        let buf_pixels = cfg.buffers.buf_pixels;
        if buf_pixels < cfg.h_res as usize {
            warn!(
                "{} px buffer is narrower than a {} px row, wider areas will be skipped",
                buf_pixels, cfg.h_res
            );
        }
        let set = match buffers {
            DisplayBuffers::Internal => FrameBufferSet::allocate(buf_pixels, cfg.flags.double_buffer)?,
            DisplayBuffers::External { buf1, buf2 } => FrameBufferSet::external(buf1, buf2, buf_pixels)?,
        };

        let notifier = FlushNotifier::new();
        let id = self.shared.try_scene(|scene, _| {
            let id = DisplayId(scene.displays.next_key().ok_or(Error::NoMem)?);
            let mut state = DisplayState::new(id, cfg.h_res, cfg.v_res, cfg.flags, set)?;
            // First pass paints the background over the whole panel
            state.invalidate_all();

            let entry = DisplayEntry {
                state,
                flush_cb: Box::new(flush_cb),
                update_cb: None,
                user_data: None,
                notifier: notifier.clone(),
            };
            scene.displays.try_insert(entry).map_err(|_| Error::NoMem)?;
            Ok(id)
        })?;

        info!("display {} added, {}x{}", id.0.index, cfg.h_res, cfg.v_res);
        Ok(Display::new(id, Arc::clone(&self.shared), notifier))
    }

    /// Register a touch controller
    ///
    /// The device reports to the application callback only until it is bound
    /// to a display with [`TouchDevice::set_display`].
    pub fn add_touch<C>(&self, cfg: TouchConfig, controller: C) -> Result<TouchDevice, Error>
    where
        C: TouchController + 'static,
    {
        let mut controller: Box<dyn ErasedTouch> = Box::new(controller);

        let irq = if cfg.use_interrupt {
            let notifier = IrqNotifier::new();
            match controller.enable_interrupt(notifier.clone()) {
                Ok(()) => Some(notifier),
                Err(e) => {
                    warn!("touch interrupt unavailable ({:?}), polling instead", e);
                    None
                }
            }
        } else {
            None
        };

        let poll_ms = match (cfg.poll_ms, irq.is_some()) {
            (0, true) => POLL_MS_IRQ_DEFAULT,
            (0, false) => POLL_MS_DEFAULT,
            (ms, _) => ms,
        };

        let res = self.shared.try_scene(|scene, now| {
            let id = TouchId(scene.touches.next_key().ok_or(Error::NoMem)?);
            let poll_timer = match scene.timers.create(poll_ms, TimerTarget::TouchPoll(id), now) {
                Ok(t) => t,
                Err(e) => {
                    if irq.is_some() {
                        controller.disable_interrupt();
                    }
                    return Err(e);
                }
            };
            let entry = TouchEntry {
                controller,
                tracker: TouchTracker::new(),
                display: None,
                irq,
                poll_timer,
                event_cb: None,
            };
            if let Err(mut entry) = scene.touches.try_insert(entry) {
                let _ = scene.timers.delete(poll_timer);
                if entry.irq.is_some() {
                    entry.controller.disable_interrupt();
                }
                return Err(Error::NoMem);
            }
            Ok(id)
        });

        let id = res?;
        debug!("touch {} polling every {} ms", id.0.index, poll_ms);
        Ok(TouchDevice::new(id, Arc::clone(&self.shared)))
    }

    /// Create a repeating application timer
    pub fn timer_create(&self, period_ms: u32, cb: impl Fn() + Send + Sync + 'static) -> Result<TimerHandle, Error> {
        if period_ms == 0 {
            return Err(Error::InvalidArg);
        }
        let id = self.shared.try_scene(|scene, now| {
            let id = scene.timers.create(period_ms, TimerTarget::App, now)?;
            scene.app_timers.insert(id, Arc::new(cb));
            Ok(id)
        })?;
        Ok(TimerHandle::new(id, Arc::clone(&self.shared)))
    }

    /// Measured frame rate, 0 until enough frames were rendered
    pub fn fps(&self) -> Result<u32, Error> {
        self.shared.try_scene(|scene, _| Ok(scene.timers.actual_fps()))
    }

    pub fn target_fps(&self) -> Result<u32, Error> {
        self.shared.try_scene(|scene, _| Ok(scene.timers.target_fps()))
    }

    pub fn set_target_fps(&self, fps: u32) -> Result<(), Error> {
        if fps == 0 {
            return Err(Error::InvalidArg);
        }
        self.shared.try_scene(|scene, _| {
            scene.timers.set_target_fps(fps);
            Ok(())
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
