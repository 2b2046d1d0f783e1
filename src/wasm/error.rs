//! Error types for core WebAssembly execution.

use thiserror::Error;

use crate::abi::CanonicalAbiError;

/// Errors that can occur while running a core WebAssembly module.
#[derive(Error, Debug)]
pub enum WasmError {
    /// Failed to load the WebAssembly module file.
    #[error("Failed to load wasm module: {0}")]
    ModuleLoad(#[from] std::io::Error),

    /// Wasmtime engine, compilation or instantiation error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),

    /// Required export not found in the module.
    #[error("Export not found in module: {0}")]
    ExportNotFound(String),

    /// Export signature does not match the canonical core signature.
    #[error("Invalid function signature for '{name}': expected {expected}, got {actual}")]
    InvalidSignature {
        name: String,
        expected: String,
        actual: String,
    },

    /// WebAssembly execution trapped.
    #[error("Wasm execution trapped: {0}")]
    Trap(String),

    /// Canonical ABI error while lowering or lifting.
    #[error("Canonical ABI error: {0}")]
    CanonicalAbi(#[from] CanonicalAbiError),
}
