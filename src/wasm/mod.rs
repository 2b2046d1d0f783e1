//! Running the calling convention against real core WebAssembly modules.
//!
//! [`CoreInstance`] instantiates a core module with wasmtime and exposes its
//! exported `memory` and `cabi_realloc` as the [`Memory`](crate::abi::Memory)
//! and [`Realloc`](crate::abi::Realloc) capabilities, so component values can
//! be passed to and returned from its exports.

mod error;
mod instance;

pub use error::WasmError;
pub use instance::CoreInstance;
