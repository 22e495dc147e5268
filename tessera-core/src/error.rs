//! Error taxonomy shared by every crate in the workspace

use core::fmt;

/// Errors returned by engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bad handle, zero size, empty data or out-of-range value
    InvalidArg,
    /// Allocation failed
    NoMem,
    /// Handle does not refer to a live item
    NotFound,
    /// Operation needs a resource that is absent (e.g. no decoder set)
    InvalidState,
    /// Requested combination cannot be satisfied on this target
    NotSupported,
    /// Bounded wait expired
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArg => "invalid argument",
            Error::NoMem => "out of memory",
            Error::NotFound => "not found",
            Error::InvalidState => "invalid state",
            Error::NotSupported => "not supported",
            Error::Timeout => "timed out",
        };
        f.write_str(msg)
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Error::NoMem
    }
}

/// Allocate a zero-filled vector, reporting allocation failure as [`Error::NoMem`]
pub(crate) fn try_alloc<T: Clone + Default>(len: usize) -> Result<alloc::vec::Vec<T>, Error> {
    let mut v = alloc::vec::Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::default());
    Ok(v)
}
