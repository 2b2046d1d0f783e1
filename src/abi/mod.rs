//! Canonical ABI layout, lowering, lifting and calls.
//!
//! [`CanonicalAbi`] borrows an immutable [`TypeTable`], measures it once, and
//! then converts [`Value`]s to and from their canonical form, either in a
//! linear memory or as a flat sequence of core values.
//!
//! # Module Organization
//!
//! - `error`: Error types for ABI operations
//! - [`memory`]: Memory and allocator capabilities, plus a simulated linear memory
//! - [`buffer`]: Low-level read/write helpers
//! - [`flat`]: Core value types and flat values
//! - [`layout`]: Size, alignment and flattening
//! - `lower`: Component values to memory and flat values
//! - `lift`: Memory and flat values back to component values
//! - `signature`: Per-function calling conventions
//! - `call`: Adapting calls between component and core signatures

pub mod buffer;
mod call;
mod cases;
mod error;
pub mod flat;
pub mod layout;
mod lift;
mod lower;
pub mod memory;
mod signature;

pub use error::CanonicalAbiError;
pub use flat::{FlatType, FlatValue, FlatValues};
pub use layout::{
    FlagsRepr, Layout, Layouts, MIN_DISCRIMINANT_SIZE, Placement, TypeInfo, discriminant_size,
};
pub use memory::{LinearMemory, Memory, PAGE_SIZE, Realloc};
pub use signature::{Convention, Signature};

use crate::config::CanonicalOptions;
use crate::logging::debug;
use crate::types::{FuncId, Type, TypeDef, TypeId, TypeTable};
use crate::value::Value;

/// A value encoded into its own linear memory image.
///
/// `pointer` is the address of the value's fixed-size part; strings and lists
/// it refers to live elsewhere in `memory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub pointer: u32,
    pub memory: Vec<u8>,
}

/// Canonical ABI engine over a type table.
///
/// # Example
///
/// ```
/// use wit_canon::{CanonicalAbi, LinearMemory, Type, TypeDefKind, TypeTable, Value};
///
/// let mut table = TypeTable::new();
/// let point = table.define(TypeDefKind::record([("x", Type::S32), ("y", Type::S32)]))?;
/// let abi = CanonicalAbi::new(&table);
///
/// let value = Value::record([("x", Value::S32(1)), ("y", Value::S32(-2))]);
/// let mut memory = LinearMemory::new();
/// let flat = abi.lower_flat(&value, &point, &mut memory)?;
/// assert_eq!(flat.len(), 2);
///
/// let encoded = abi.encode(&value, &point)?;
/// assert_eq!(abi.decode(&encoded, &point)?, value);
/// # Ok::<(), wit_canon::Error>(())
/// ```
pub struct CanonicalAbi<'a> {
    pub(crate) table: &'a TypeTable,
    pub(crate) layouts: Layouts,
    pub(crate) options: CanonicalOptions,
    signatures: Vec<Signature>,
}

impl<'a> CanonicalAbi<'a> {
    /// Create an engine with default options.
    ///
    /// This measures every type and computes every function's calling
    /// convention up front; nothing is recomputed per call.
    pub fn new(table: &'a TypeTable) -> Self {
        Self::with_options(table, CanonicalOptions::default())
    }

    pub fn with_options(table: &'a TypeTable, options: CanonicalOptions) -> Self {
        let layouts = Layouts::new(table);
        let signatures = table
            .functions()
            .map(|(_, func)| Signature::new(func, &layouts, &options))
            .collect::<Vec<_>>();
        debug!(
            types = table.len(),
            functions = signatures.len(),
            "measured type table"
        );
        Self {
            table,
            layouts,
            options,
            signatures,
        }
    }

    pub fn table(&self) -> &'a TypeTable {
        self.table
    }

    pub fn options(&self) -> &CanonicalOptions {
        &self.options
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    /// Size and alignment of `ty`.
    pub fn layout(&self, ty: &Type) -> Layout {
        self.layouts.layout(ty)
    }

    /// Core types `ty` flattens to.
    pub fn flatten(&self, ty: &Type) -> &[FlatType] {
        self.layouts.flat(ty)
    }

    /// Field offsets of a record or tuple type.
    pub fn field_offsets(&self, ty: &Type) -> Option<&[u32]> {
        let Type::Id(id) = self.table.resolve_alias(*ty) else {
            return None;
        };
        match &self.layouts.info(id)?.placement {
            Placement::Fields(offsets) => Some(offsets),
            _ => None,
        }
    }

    /// Calling convention of `func`.
    pub fn signature(&self, func: FuncId) -> Option<&Signature> {
        self.signatures.get(func.index())
    }

    /// Lower `value` into a fresh memory image.
    pub fn encode(&self, value: &Value, ty: &Type) -> Result<EncodedValue, CanonicalAbiError> {
        let layout = self.layout(ty);
        let mut memory = LinearMemory::new();
        let pointer = memory.alloc(layout.size, layout.align)?;
        self.store(value, ty, &mut memory, pointer)?;
        Ok(EncodedValue {
            pointer,
            memory: memory.into_bytes(),
        })
    }

    /// Lift a value back out of an image produced by [`CanonicalAbi::encode`].
    pub fn decode(&self, encoded: &EncodedValue, ty: &Type) -> Result<Value, CanonicalAbiError> {
        let memory = LinearMemory::from_bytes(encoded.memory.clone());
        self.load(ty, &memory, encoded.pointer).inspect_err(|_err| {
            debug!(error = %_err, ty = %ty.name(), "failed to decode value");
        })
    }

    /// Definition and memoized layout of a table entry.
    pub(crate) fn entry(&self, id: TypeId) -> Result<(&'a TypeDef, &TypeInfo), CanonicalAbiError> {
        match (self.table.get(id), self.layouts.info(id)) {
            (Some(def), Some(info)) => Ok((def, info)),
            _ => Err(CanonicalAbiError::mismatch("defined type", id.to_string())),
        }
    }

    pub(crate) fn canonical_f32(&self, v: f32) -> f32 {
        if self.options.canonicalize_nan && v.is_nan() {
            f32::from_bits(CANONICAL_NAN32)
        } else {
            v
        }
    }

    pub(crate) fn canonical_f64(&self, v: f64) -> f64 {
        if self.options.canonicalize_nan && v.is_nan() {
            f64::from_bits(CANONICAL_NAN64)
        } else {
            v
        }
    }
}

const CANONICAL_NAN32: u32 = 0x7fc0_0000;
const CANONICAL_NAN64: u64 = 0x7ff8_0000_0000_0000;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Function, TypeDefKind};

    #[test]
    fn test_field_offsets_through_alias() {
        let mut table = TypeTable::new();
        let rec = table
            .define(TypeDefKind::record([("a", Type::U8), ("b", Type::U32)]))
            .unwrap();
        let alias = table.define_named("rec", TypeDefKind::Type(rec)).unwrap();
        let abi = CanonicalAbi::new(&table);
        assert_eq!(abi.field_offsets(&alias), Some(&[0, 4][..]));
        assert_eq!(abi.field_offsets(&Type::U8), None);
    }

    #[test]
    fn test_signatures_are_precomputed() {
        let mut table = TypeTable::new();
        let f = table
            .push_function(Function::new("add", [("a", Type::U32), ("b", Type::U32)], Some(Type::U32)))
            .unwrap();
        let abi = CanonicalAbi::new(&table);
        let sig = abi.signature(f).unwrap();
        assert_eq!(sig.convention(), Convention::Flat);
        assert_eq!(sig.params(), &[FlatType::I32, FlatType::I32]);
    }

    #[test]
    fn test_nan_canonicalization_option() {
        let table = TypeTable::new();
        let nan = f32::from_bits(0x7fc0_1234);
        let abi = CanonicalAbi::new(&table);
        assert_eq!(abi.canonical_f32(nan).to_bits(), CANONICAL_NAN32);
        assert_eq!(abi.canonical_f32(1.5), 1.5);

        let options = CanonicalOptions {
            canonicalize_nan: false,
            ..CanonicalOptions::default()
        };
        let abi = CanonicalAbi::with_options(&table, options);
        assert_eq!(abi.canonical_f32(nan).to_bits(), 0x7fc0_1234);
    }

    #[test]
    fn test_encode_scalar() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let encoded = abi.encode(&Value::U32(0x0102_0304), &Type::U32).unwrap();
        assert_eq!(encoded.pointer, 0);
        assert_eq!(encoded.memory, vec![4, 3, 2, 1]);
    }
}
