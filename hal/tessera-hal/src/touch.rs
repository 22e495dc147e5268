//! Touch controller abstractions
//!
//! A touch controller is sampled in two steps, mirroring how most capacitive
//! controllers work over I2C: `read` latches a fresh report from the chip,
//! then `points` copies the latched contacts out.
//!
//! Interrupt-capable controllers get an [`IrqNotifier`]. The interrupt
//! handler must only call [`IrqNotifier::notify`]; the actual bus I/O is
//! done later from the poll timer.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// A single touch contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
    /// X coordinate in panel pixels
    pub x: u16,
    /// Y coordinate in panel pixels
    pub y: u16,
    /// Contact strength / pressure (controller specific scale)
    pub strength: u16,
    /// Multi-touch slot identifier
    pub track_id: u8,
}

impl TouchPoint {
    /// Create a touch point with zero strength on track 0
    pub const fn new(x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            strength: 0,
            track_id: 0,
        }
    }

    /// Same point on a different track
    pub const fn with_track(mut self, track_id: u8) -> Self {
        self.track_id = track_id;
        self
    }
}

/// Reasons an interrupt could not be wired up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptError {
    /// Controller has no interrupt line
    Unsupported,
    /// Interrupt line exists but registration failed
    RegistrationFailed,
}

/// Pending-interrupt flag shared between an ISR and the poll timer
///
/// Cloning yields another handle to the same flag. `notify` is a single
/// atomic store and is safe to call from interrupt context.
#[derive(Debug, Clone, Default)]
pub struct IrqNotifier {
    pending: Arc<AtomicBool>,
}

impl IrqNotifier {
    /// Create a new, non-pending notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an interrupt as pending
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Check whether an interrupt is pending without clearing it
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consume the pending flag, returning whether it was set
    #[inline]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Drop any pending interrupt
    #[inline]
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Touch panel controller
pub trait TouchController: Send {
    /// Error type for bus operations
    type Error: core::fmt::Debug;

    /// Latch a fresh report from the controller
    fn read(&mut self) -> Result<(), Self::Error>;

    /// Copy the latched contacts into `out`
    ///
    /// Returns the number of points written, at most `out.len()`.
    fn points(&mut self, out: &mut [TouchPoint]) -> Result<usize, Self::Error>;

    /// Route the controller's interrupt line to `notifier`
    fn enable_interrupt(&mut self, notifier: IrqNotifier) -> Result<(), InterruptError> {
        let _ = notifier;
        Err(InterruptError::Unsupported)
    }

    /// Detach the interrupt handler installed by `enable_interrupt`
    fn disable_interrupt(&mut self) {}
}
