//! Canonical ABI layout and value marshalling for WebAssembly components.
//!
//! This library computes the canonical ABI representation of component-level
//! types and converts values between their high-level form and the core
//! representation: bytes in a linear memory, or a flat sequence of
//! `i32`/`i64`/`f32`/`f64` values.
//!
//! # Quick Start
//!
//! ```
//! use wit_canon::prelude::*;
//!
//! let mut table = TypeTable::new();
//! let flags = table.define(TypeDefKind::flags(["a", "b", "c"]))?;
//! let abi = CanonicalAbi::new(&table);
//!
//! let value = Value::flags(["a", "c"]);
//! let mut memory = LinearMemory::new();
//! let flat = abi.lower_flat(&value, &flags, &mut memory)?;
//! assert_eq!(flat, vec![FlatValue::I32(0b101)]);
//!
//! let mut cursor = FlatValues::new(&flat);
//! assert_eq!(abi.lift_flat(&flags, &memory, &mut cursor)?, value);
//! # Ok::<(), wit_canon::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`types`] - The immutable type table and function signatures
//! - [`value`] - Component-level values
//! - [`abi`] - Layout, flattening, lowering, lifting and call adaptation
//! - [`config`] - Engine options
//! - [`wit`] - Importing types from WIT sources
//! - [`wave`] - Reading and writing values as WAVE text
//! - [`wasm`] - Running core modules with wasmtime (requires `wasm` feature)
//!
//! # Feature Flags
//!
//! - `wasm` - Enable the wasmtime-backed core instance
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the command-line interface binary and TOML configuration
//! - `full` - Enable all features

pub mod abi;
pub mod config;
mod error;
mod logging;
pub mod prelude;
pub mod types;
pub mod value;
#[cfg(feature = "wasm")]
pub mod wasm;
pub mod wave;
pub mod wit;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export ABI types
pub use abi::{
    CanonicalAbi, CanonicalAbiError, Convention, EncodedValue, FlatType, FlatValue, FlatValues,
    Layout, LinearMemory, Memory, Realloc, Signature,
};

pub use config::CanonicalOptions;
pub use types::{Function, FuncId, Type, TypeDef, TypeDefKind, TypeId, TypeTable, TypeTableError};
pub use value::Value;

#[cfg(feature = "wasm")]
pub use wasm::{CoreInstance, WasmError};
