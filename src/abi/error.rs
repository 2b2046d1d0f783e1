//! Error types for canonical ABI operations.

use thiserror::Error;

/// Errors that can occur during canonical ABI lowering, lifting and calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalAbiError {
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("Out of bounds: {ptr} with length {len} exceeds memory size {memory_size}")]
    OutOfBounds {
        ptr: u32,
        len: u64,
        memory_size: usize,
    },

    #[error("Misaligned pointer {ptr}: required alignment is {align}")]
    MisalignedPointer { ptr: u32, align: u32 },

    #[error("Invalid discriminant {discriminant} for variant with {num_cases} cases")]
    InvalidDiscriminant { discriminant: u32, num_cases: usize },

    #[error("Invalid flags bits {bits:#x} for flags with {num_flags} names")]
    InvalidFlagsBits { bits: u32, num_flags: usize },

    #[error("Invalid char value: {0:#x}")]
    InvalidChar(u32),

    #[error("Allocation of {size} bytes at alignment {align} failed")]
    AllocationFailed { size: u32, align: u32 },

    #[error("Too many flat values: expected {expected}, got {got}")]
    TooManyFlatValues { expected: usize, got: usize },

    #[error("Flat value mismatch: expected {expected}, got {got}")]
    FlatValueMismatch { expected: String, got: String },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),
}

impl CanonicalAbiError {
    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
