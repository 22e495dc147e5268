//! Hosted runtime for the Tessera rendering engine
//!
//! `tessera-core` knows how to paint a scene; this crate decides when. A
//! [`GraphicsContext`] owns one render thread that runs timers, repaints
//! dirty areas and hands finished bands to the panel driver's flush
//! callback. Everything else talks to the scene through handles
//! ([`Display`], [`Label`], [`TouchDevice`], ...) that take the context's
//! re-entrant lock for the duration of each call.
//!
//! ```no_run
//! use tessera_engine::{DisplayBuffers, DisplayConfig, EngineConfig, GraphicsContext};
//!
//! # fn main() -> Result<(), tessera_engine::Error> {
//! let ctx = GraphicsContext::init(EngineConfig::default())?;
//! let display = ctx.add_display(
//!     DisplayConfig::new(320, 240, 320 * 20),
//!     DisplayBuffers::Internal,
//!     |_id, _area, _pixels| { /* start the panel transfer */ },
//! )?;
//! let ack = display.notifier();
//! // ...and from the transfer-complete handler:
//! ack.ready(true);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod display;
pub mod event;
pub mod lock;
pub mod object;
mod render_loop;
mod scene;
pub mod timer;
pub mod touch;

pub use clock::SystemClock;
pub use config::{
    BufferConfig, ConfigError, DisplayBuffers, DisplayConfig, EngineConfig, Settings, TaskConfig, TouchConfig,
};
pub use context::{GraphicsContext, LockGuard};
pub use display::{Display, FlushNotifier, ReturnedBuffers};
pub use object::{Animation, Image, Label, Object, QrCode};
pub use scene::{FlushCb, TimerCb, TouchCb, UpdateCb};
pub use timer::TimerHandle;
pub use touch::TouchDevice;

pub use tessera_core::{
    Align, Color, DisplayEvent, DisplayFlags, DisplayId, Error, FlushArea, ObjectId, Rect, TouchEvent,
    TouchEventKind,
};
