//! Tessera Hardware Abstraction Layer
//!
//! This crate defines the traits the rendering engine needs from the board:
//! a touch controller and a monotonic millisecond clock. Board support
//! crates implement them; the engine only ever talks to the traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (panel driver, UI code)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tessera-engine (render thread)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tessera-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ touch driver  │       │  board clock  │
//! │ (GT911, FT5x) │       │               │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`touch::TouchController`] - Touch panel sampling and interrupt hookup
//! - [`clock::Clock`] - Monotonic millisecond time base

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod clock;
pub mod touch;

pub use clock::Clock;
pub use touch::{InterruptError, IrqNotifier, TouchController, TouchPoint};
