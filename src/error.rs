//! Unified error type for the wit-canon library.
//!
//! Each module reports its own error enum; [`Error`] wraps all of them so
//! application code can use a single error type.

use thiserror::Error;

use crate::abi::CanonicalAbiError;
#[cfg(feature = "cli")]
use crate::config::ConfigError;
use crate::types::TypeTableError;
#[cfg(feature = "wasm")]
use crate::wasm::WasmError;
use crate::wave::WaveError;
use crate::wit::WitError;

/// Unified error type for all wit-canon operations.
///
/// # Example
///
/// ```
/// use wit_canon::{CanonicalAbi, Result, Type, TypeDefKind, TypeTable, Value};
///
/// fn encoded_len() -> Result<usize> {
///     let mut table = TypeTable::new();
///     let names = table.define(TypeDefKind::List(Type::String))?;
///     let abi = CanonicalAbi::new(&table);
///     let value = Value::List(vec![Value::String("a".into())]);
///     Ok(abi.encode(&value, &names)?.memory.len())
/// }
/// assert!(encoded_len().is_ok());
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Error from canonical ABI lowering, lifting or calls.
    #[error(transparent)]
    Abi(#[from] CanonicalAbiError),

    /// Error building a type table.
    #[error(transparent)]
    Types(#[from] TypeTableError),

    /// Error importing WIT types.
    #[error(transparent)]
    Wit(#[from] WitError),

    /// Error converting or parsing WAVE values.
    #[error(transparent)]
    Wave(#[from] WaveError),

    /// Error from core WebAssembly execution.
    #[cfg(feature = "wasm")]
    #[error(transparent)]
    Wasm(#[from] WasmError),

    /// Error loading engine configuration.
    #[cfg(feature = "cli")]
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this is an ABI error.
    pub fn is_abi(&self) -> bool {
        matches!(self, Self::Abi(_))
    }

    /// Returns `true` if this is a WASM execution error.
    #[cfg(feature = "wasm")]
    pub fn is_wasm(&self) -> bool {
        matches!(self, Self::Wasm(_))
    }

    /// Returns `true` if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
