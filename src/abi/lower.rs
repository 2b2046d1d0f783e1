//! Lowering component values into linear memory and flat values.

use crate::types::{Flags, Type, TypeDefKind};
use crate::value::Value;

use super::buffer::{check_aligned, check_range, write_uint};
use super::cases::Cases;
use super::layout::{FlagsRepr, Placement, TypeInfo};
use super::memory::Realloc;
use super::{CanonicalAbi, CanonicalAbiError, FlatValue};

impl CanonicalAbi<'_> {
    /// Store `value` of type `ty` at `ptr`.
    ///
    /// `ptr` must point to `size(ty)` bytes aligned to `align(ty)`. Strings
    /// and lists are copied into fresh allocations obtained from `cx`.
    pub fn store<C: Realloc + ?Sized>(
        &self,
        value: &Value,
        ty: &Type,
        cx: &mut C,
        ptr: u32,
    ) -> Result<(), CanonicalAbiError> {
        match (ty, value) {
            (Type::Bool, Value::Bool(v)) => cx.write(ptr, &[u8::from(*v)]),
            (Type::S8, Value::S8(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::U8, Value::U8(v)) => cx.write(ptr, &[*v]),
            (Type::S16, Value::S16(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::U16, Value::U16(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::S32, Value::S32(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::U32, Value::U32(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::S64, Value::S64(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::U64, Value::U64(v)) => cx.write(ptr, &v.to_le_bytes()),
            (Type::F32, Value::F32(v)) => cx.write(ptr, &v.to_bits().to_le_bytes()),
            (Type::F64, Value::F64(v)) => cx.write(ptr, &v.to_bits().to_le_bytes()),
            (Type::Char, Value::Char(c)) => cx.write(ptr, &u32::from(*c).to_le_bytes()),
            (Type::String, Value::String(s)) => {
                let (data, len) = self.store_string(s, cx)?;
                store_pair(cx, ptr, data, len)
            }
            (Type::Id(id), _) => {
                let (def, info) = self.entry(*id)?;
                self.store_def(value, &def.kind, info, cx, ptr)
            }
            (ty, value) => Err(CanonicalAbiError::mismatch(ty.name(), value.kind())),
        }
    }

    fn store_def<C: Realloc + ?Sized>(
        &self,
        value: &Value,
        kind: &TypeDefKind,
        info: &TypeInfo,
        cx: &mut C,
        ptr: u32,
    ) -> Result<(), CanonicalAbiError> {
        match (kind, value) {
            (TypeDefKind::Type(t), _) => self.store(value, t, cx, ptr),
            (TypeDefKind::List(elem), Value::List(items)) => {
                let (data, len) = self.store_list(items, elem, cx)?;
                store_pair(cx, ptr, data, len)
            }
            (TypeDefKind::Record(r), Value::Record(fields)) => {
                if fields.len() != r.fields.len() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("record with {} fields", r.fields.len()),
                        format!("record with {} fields", fields.len()),
                    ));
                }
                let offsets = field_offsets(info)?;
                for (field, offset) in r.fields.iter().zip(offsets) {
                    let v = fields
                        .iter()
                        .find(|(name, _)| name == &field.name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| {
                            CanonicalAbiError::mismatch(format!("field '{}'", field.name), "missing")
                        })?;
                    self.store(v, &field.ty, cx, ptr + offset)?;
                }
                Ok(())
            }
            (TypeDefKind::Tuple(t), Value::Tuple(items)) => {
                check_arity(t.types.len(), items.len())?;
                let offsets = field_offsets(info)?;
                for ((ty, v), offset) in t.types.iter().zip(items).zip(offsets) {
                    self.store(v, ty, cx, ptr + offset)?;
                }
                Ok(())
            }
            (TypeDefKind::Flags(f), Value::Flags(names)) => {
                let words = flag_words(f, names)?;
                match info.placement {
                    Placement::Flags(FlagsRepr::Empty) => Ok(()),
                    Placement::Flags(FlagsRepr::U8) => write_uint(cx, ptr, 1, first_word(&words)),
                    Placement::Flags(FlagsRepr::U16) => write_uint(cx, ptr, 2, first_word(&words)),
                    _ => {
                        for (i, word) in words.iter().enumerate() {
                            write_uint(cx, ptr + 4 * i as u32, 4, *word)?;
                        }
                        Ok(())
                    }
                }
            }
            (kind, value) => {
                let Some(cases) = Cases::of(kind) else {
                    return Err(CanonicalAbiError::mismatch(kind.describe(), value.kind()));
                };
                let Placement::Variant {
                    discriminant_size,
                    payload_offset,
                } = info.placement
                else {
                    return Err(CanonicalAbiError::mismatch(kind.describe(), "non-variant layout"));
                };
                let (index, payload) = cases.select(value)?;
                write_uint(cx, ptr, discriminant_size, index)?;
                if let Some((ty, v)) = payload {
                    self.store(v, &ty, cx, ptr + payload_offset)?;
                }
                Ok(())
            }
        }
    }

    /// Lower `value` of type `ty` into flat core values.
    pub fn lower_flat<C: Realloc + ?Sized>(
        &self,
        value: &Value,
        ty: &Type,
        cx: &mut C,
    ) -> Result<Vec<FlatValue>, CanonicalAbiError> {
        let mut out = Vec::with_capacity(self.layouts.flat(ty).len());
        self.lower_flat_into(value, ty, cx, &mut out)?;
        Ok(out)
    }

    pub(crate) fn lower_flat_into<C: Realloc + ?Sized>(
        &self,
        value: &Value,
        ty: &Type,
        cx: &mut C,
        out: &mut Vec<FlatValue>,
    ) -> Result<(), CanonicalAbiError> {
        let flat = match (ty, value) {
            (Type::Bool, Value::Bool(v)) => FlatValue::I32(i32::from(*v)),
            (Type::S8, Value::S8(v)) => FlatValue::I32(i32::from(*v)),
            (Type::U8, Value::U8(v)) => FlatValue::I32(i32::from(*v)),
            (Type::S16, Value::S16(v)) => FlatValue::I32(i32::from(*v)),
            (Type::U16, Value::U16(v)) => FlatValue::I32(i32::from(*v)),
            (Type::S32, Value::S32(v)) => FlatValue::I32(*v),
            (Type::U32, Value::U32(v)) => FlatValue::I32(*v as i32),
            (Type::S64, Value::S64(v)) => FlatValue::I64(*v),
            (Type::U64, Value::U64(v)) => FlatValue::I64(*v as i64),
            (Type::F32, Value::F32(v)) => FlatValue::F32(*v),
            (Type::F64, Value::F64(v)) => FlatValue::F64(*v),
            (Type::Char, Value::Char(c)) => FlatValue::I32(u32::from(*c) as i32),
            (Type::String, Value::String(s)) => {
                let (data, len) = self.store_string(s, cx)?;
                out.push(FlatValue::I32(data as i32));
                FlatValue::I32(len as i32)
            }
            (Type::Id(id), _) => {
                let (def, info) = self.entry(*id)?;
                return self.lower_flat_def(value, &def.kind, info, cx, out);
            }
            (ty, value) => return Err(CanonicalAbiError::mismatch(ty.name(), value.kind())),
        };
        out.push(flat);
        Ok(())
    }

    fn lower_flat_def<C: Realloc + ?Sized>(
        &self,
        value: &Value,
        kind: &TypeDefKind,
        info: &TypeInfo,
        cx: &mut C,
        out: &mut Vec<FlatValue>,
    ) -> Result<(), CanonicalAbiError> {
        match (kind, value) {
            (TypeDefKind::Type(t), _) => self.lower_flat_into(value, t, cx, out),
            (TypeDefKind::List(elem), Value::List(items)) => {
                let (data, len) = self.store_list(items, elem, cx)?;
                out.push(FlatValue::I32(data as i32));
                out.push(FlatValue::I32(len as i32));
                Ok(())
            }
            (TypeDefKind::Record(r), Value::Record(fields)) => {
                check_arity(r.fields.len(), fields.len())?;
                for field in &r.fields {
                    let v = fields
                        .iter()
                        .find(|(name, _)| name == &field.name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| {
                            CanonicalAbiError::mismatch(format!("field '{}'", field.name), "missing")
                        })?;
                    self.lower_flat_into(v, &field.ty, cx, out)?;
                }
                Ok(())
            }
            (TypeDefKind::Tuple(t), Value::Tuple(items)) => {
                check_arity(t.types.len(), items.len())?;
                for (ty, v) in t.types.iter().zip(items) {
                    self.lower_flat_into(v, ty, cx, out)?;
                }
                Ok(())
            }
            (TypeDefKind::Flags(f), Value::Flags(names)) => {
                let words = flag_words(f, names)?;
                out.extend(words.into_iter().map(|w| FlatValue::I32(w as i32)));
                Ok(())
            }
            (kind, value) => {
                let Some(cases) = Cases::of(kind) else {
                    return Err(CanonicalAbiError::mismatch(kind.describe(), value.kind()));
                };
                let (index, payload) = cases.select(value)?;
                out.push(FlatValue::I32(index as i32));

                let slots = info.flat.get(1..).unwrap_or_default();
                let mut case_values = Vec::with_capacity(slots.len());
                if let Some((ty, v)) = payload {
                    self.lower_flat_into(v, &ty, cx, &mut case_values)?;
                }
                if case_values.len() > slots.len() {
                    return Err(CanonicalAbiError::TooManyFlatValues {
                        expected: slots.len(),
                        got: case_values.len(),
                    });
                }
                for (i, slot) in slots.iter().enumerate() {
                    let v = match case_values.get(i) {
                        Some(v) => v.coerce_to(*slot)?,
                        None => slot.zero(),
                    };
                    out.push(v);
                }
                Ok(())
            }
        }
    }

    /// Copy a string into a fresh allocation and return `(ptr, len)`.
    pub(crate) fn store_string<C: Realloc + ?Sized>(
        &self,
        s: &str,
        cx: &mut C,
    ) -> Result<(u32, u32), CanonicalAbiError> {
        let len = u32::try_from(s.len()).map_err(|_| CanonicalAbiError::AllocationFailed {
            size: u32::MAX,
            align: 1,
        })?;
        let ptr = self.allocate(cx, 1, len)?;
        cx.write(ptr, s.as_bytes())?;
        Ok((ptr, len))
    }

    /// Store the elements of a list into a fresh allocation and return
    /// `(ptr, len)`.
    pub(crate) fn store_list<C: Realloc + ?Sized>(
        &self,
        items: &[Value],
        elem: &Type,
        cx: &mut C,
    ) -> Result<(u32, u32), CanonicalAbiError> {
        let layout = self.layouts.layout(elem);
        let too_large = || CanonicalAbiError::AllocationFailed {
            size: u32::MAX,
            align: layout.align,
        };
        let len = u32::try_from(items.len()).map_err(|_| too_large())?;
        // One byte per zero-sized element, matching the bound applied when lifting.
        let byte_len = len.checked_mul(layout.size.max(1)).ok_or_else(too_large)?;
        let ptr = self.allocate(cx, layout.align, byte_len)?;
        for (i, item) in items.iter().enumerate() {
            self.store(item, elem, cx, ptr + i as u32 * layout.size)?;
        }
        Ok((ptr, len))
    }

    /// Allocate through `cx` and check the returned block.
    pub(crate) fn allocate<C: Realloc + ?Sized>(
        &self,
        cx: &mut C,
        align: u32,
        size: u32,
    ) -> Result<u32, CanonicalAbiError> {
        let ptr = cx.realloc(0, 0, align, size)?;
        check_aligned(ptr, align)?;
        check_range(&*cx, ptr, u64::from(size))?;
        Ok(ptr)
    }
}

fn store_pair<C: Realloc + ?Sized>(
    cx: &mut C,
    ptr: u32,
    data: u32,
    len: u32,
) -> Result<(), CanonicalAbiError> {
    cx.write(ptr, &data.to_le_bytes())?;
    cx.write(ptr + 4, &len.to_le_bytes())
}

fn field_offsets(info: &TypeInfo) -> Result<&[u32], CanonicalAbiError> {
    match &info.placement {
        Placement::Fields(offsets) => Ok(offsets),
        _ => Err(CanonicalAbiError::mismatch("record layout", "non-record layout")),
    }
}

fn check_arity(expected: usize, got: usize) -> Result<(), CanonicalAbiError> {
    if expected == got {
        Ok(())
    } else {
        Err(CanonicalAbiError::mismatch(
            format!("{} elements", expected),
            format!("{} elements", got),
        ))
    }
}

fn first_word(words: &[u32]) -> u32 {
    words.first().copied().unwrap_or(0)
}

/// Pack set flag names into 32-bit words, bit `i` for the `i`-th name.
fn flag_words(flags: &Flags, set: &[String]) -> Result<Vec<u32>, CanonicalAbiError> {
    let mut words = vec![0u32; flags.names.len().div_ceil(32)];
    for name in set {
        let index = flags
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CanonicalAbiError::mismatch("flag name", format!("unknown flag '{}'", name)))?;
        if let Some(word) = words.get_mut(index / 32) {
            *word |= 1 << (index % 32);
        }
    }
    Ok(words)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::abi::{FlatType, LinearMemory, Memory};
    use crate::types::TypeTable;

    #[test]
    fn test_store_record_bytes() {
        let mut table = TypeTable::new();
        let ty = table
            .define(TypeDefKind::record([("a", Type::U8), ("b", Type::U32)]))
            .unwrap();
        let abi = CanonicalAbi::new(&table);
        let value = Value::record([("b", Value::U32(0xaabbccdd)), ("a", Value::U8(7))]);
        let encoded = abi.encode(&value, &ty).unwrap();
        assert_eq!(encoded.memory, vec![7, 0, 0, 0, 0xdd, 0xcc, 0xbb, 0xaa]);
    }

    #[test]
    fn test_store_string_allocates() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let encoded = abi.encode(&Value::String("hi".into()), &Type::String).unwrap();
        assert_eq!(encoded.pointer, 0);
        assert_eq!(&encoded.memory[0..4], &8u32.to_le_bytes());
        assert_eq!(&encoded.memory[4..8], &2u32.to_le_bytes());
        assert_eq!(&encoded.memory[8..10], b"hi");
    }

    #[test]
    fn test_empty_list_and_string() {
        let mut table = TypeTable::new();
        let list = table.define(TypeDefKind::List(Type::U64)).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mut mem = LinearMemory::new();
        let flat = abi.lower_flat(&Value::List(vec![]), &list, &mut mem).unwrap();
        assert_eq!(flat[1], FlatValue::I32(0));
        let flat = abi
            .lower_flat(&Value::String(String::new()), &Type::String, &mut mem)
            .unwrap();
        assert_eq!(flat[1], FlatValue::I32(0));
    }

    #[test]
    fn test_flags_bits() {
        let mut table = TypeTable::new();
        let ty = table.define(TypeDefKind::flags(["a", "b", "c"])).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mut mem = LinearMemory::new();
        let flat = abi.lower_flat(&Value::flags(["a", "c"]), &ty, &mut mem).unwrap();
        assert_eq!(flat, vec![FlatValue::I32(0b101)]);

        let encoded = abi.encode(&Value::flags(["b"]), &ty).unwrap();
        assert_eq!(encoded.memory, vec![0b010]);

        assert!(matches!(
            abi.lower_flat(&Value::flags(["z"]), &ty, &mut mem),
            Err(CanonicalAbiError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_variant_slots_are_coerced_and_padded() {
        let mut table = TypeTable::new();
        let ty = table
            .define(TypeDefKind::variant([
                ("f", Some(Type::F32)),
                ("big", Some(Type::U64)),
                ("none", None),
            ]))
            .unwrap();
        let abi = CanonicalAbi::new(&table);
        assert_eq!(abi.flatten(&ty), &[FlatType::I32, FlatType::I64]);
        let mut mem = LinearMemory::new();

        let flat = abi
            .lower_flat(&Value::variant("f", Some(Value::F32(1.0))), &ty, &mut mem)
            .unwrap();
        assert_eq!(
            flat,
            vec![FlatValue::I32(0), FlatValue::I64(i64::from(1.0f32.to_bits()))]
        );

        let flat = abi.lower_flat(&Value::variant("none", None), &ty, &mut mem).unwrap();
        assert_eq!(flat, vec![FlatValue::I32(2), FlatValue::I64(0)]);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mut mem = LinearMemory::new();
        assert_eq!(
            abi.lower_flat(&Value::U8(1), &Type::String, &mut mem),
            Err(CanonicalAbiError::mismatch("string", "u8"))
        );
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mut mem = LinearMemory::new().with_max_size(2);
        let result = abi.lower_flat(&Value::String("hello".into()), &Type::String, &mut mem);
        assert!(matches!(result, Err(CanonicalAbiError::AllocationFailed { .. })));
        assert_eq!(mem.size(), 0);
    }
}
