//! Convenient re-exports for common usage patterns.
//!
//! # Example
//!
//! ```
//! use wit_canon::prelude::*;
//!
//! let mut table = TypeTable::new();
//! let pair = table.define(TypeDefKind::tuple([Type::U8, Type::U32]))?;
//! let abi = CanonicalAbi::new(&table);
//! assert_eq!(abi.layout(&pair), Layout::new(8, 4));
//! # Ok::<(), wit_canon::Error>(())
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Engine and capabilities
pub use crate::abi::{
    CanonicalAbi, CanonicalAbiError, Convention, EncodedValue, FlatType, FlatValue, FlatValues,
    Layout, LinearMemory, Memory, Realloc, Signature,
};
pub use crate::config::CanonicalOptions;

// Types and values
pub use crate::types::{Function, FuncId, Type, TypeDef, TypeDefKind, TypeId, TypeTable};
pub use crate::value::Value;

// WIT and WAVE bridges
pub use crate::wave::{format_value, parse_value};
pub use crate::wit::{load_wit, load_wit_type};

// Core module execution (requires "wasm" feature)
#[cfg(feature = "wasm")]
pub use crate::wasm::{CoreInstance, WasmError};
