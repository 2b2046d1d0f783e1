//! Crate-internal logging macros.
//!
//! With the `logging` feature these forward to `tracing`; without it they
//! expand to nothing, so the engine carries no logging cost. Consumers
//! install their own subscriber.
//!
//! ```rust,ignore
//! use crate::logging::{debug, trace};
//!
//! debug!(types = table.len(), "measured type table");
//! trace!(ptr, size = layout.size, "parameters passed through memory");
//! ```

/// Per-call detail: core arguments, allocations.
#[cfg(feature = "logging")]
macro_rules! canon_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! canon_trace {
    ($($arg:tt)*) => {};
}

/// Engine construction, call dispatch and lift failures.
#[cfg(feature = "logging")]
macro_rules! canon_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! canon_debug {
    ($($arg:tt)*) => {};
}

/// Module instantiation.
#[cfg(feature = "logging")]
macro_rules! canon_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! canon_info {
    ($($arg:tt)*) => {};
}

/// Input that was accepted with a loss, such as a renamed WIT type.
#[cfg(feature = "logging")]
macro_rules! canon_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! canon_warn {
    ($($arg:tt)*) => {};
}

/// Guest traps.
#[cfg(feature = "logging")]
macro_rules! canon_error {
    ($($arg:tt)*) => { tracing::error!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! canon_error {
    ($($arg:tt)*) => {};
}

pub(crate) use canon_debug as debug;
#[allow(unused_imports)]
pub(crate) use canon_error as error;
#[allow(unused_imports)]
pub(crate) use canon_info as info;
pub(crate) use canon_trace as trace;
pub(crate) use canon_warn as warn;
