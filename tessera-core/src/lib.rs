//! Board-agnostic core of the Tessera rendering engine
//!
//! This crate contains everything that does not depend on threads or an
//! operating system:
//!
//! - Rectangle geometry and the per-display dirty-rectangle tracker
//! - Frame buffer sets and software blending (RGB565)
//! - Scene objects, alignment and widget implementations
//! - Cooperative timer manager and FPS statistics
//! - Touch state machine and hit-testing
//! - The chunked render pass that drives a flush sink
//!
//! Heap allocation is used for frame buffers and object storage, so the
//! crate requires `alloc`.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod arena;
pub mod area;
pub mod blend;
pub mod buffer;
pub mod dirty;
pub mod display;
pub mod error;
pub mod object;
pub mod render;
pub mod timer;
pub mod touch;
pub mod traits;
pub mod widget;

pub use area::{FlushArea, Rect};
pub use blend::Color;
pub use dirty::DirtyTracker;
pub use display::{DisplayEvent, DisplayFlags, DisplayId, DisplayState};
pub use error::Error;
pub use object::{Align, ObjectId, ObjectRef};
pub use render::{render_pass, FlushSink, PassStats};
pub use timer::{TimerId, TimerManager, TimerTarget};
pub use touch::{TouchEvent, TouchEventKind, TouchId, TouchTracker};
pub use widget::{Widget, WidgetKind};
