//! Lifting component values out of linear memory and flat values.

use crate::types::{Flags, Type, TypeDefKind};
use crate::value::Value;

use super::buffer::{check_aligned, check_range, read_array, read_u32, read_u8, read_uint};
use super::cases::Cases;
use super::layout::{FlagsRepr, Placement, TypeInfo};
use super::memory::Memory;
use super::{CanonicalAbi, CanonicalAbiError, FlatValues};

impl CanonicalAbi<'_> {
    /// Load a value of type `ty` stored at `ptr`.
    ///
    /// The pointer is checked for alignment and the whole fixed-size part
    /// must lie inside memory.
    pub fn load<M: Memory + ?Sized>(
        &self,
        ty: &Type,
        memory: &M,
        ptr: u32,
    ) -> Result<Value, CanonicalAbiError> {
        let layout = self.layouts.layout(ty);
        check_aligned(ptr, layout.align)?;
        check_range(memory, ptr, u64::from(layout.size))?;
        self.load_at(ty, memory, ptr)
    }

    fn load_at<M: Memory + ?Sized>(
        &self,
        ty: &Type,
        memory: &M,
        ptr: u32,
    ) -> Result<Value, CanonicalAbiError> {
        Ok(match ty {
            Type::Bool => Value::Bool(read_u8(memory, ptr)? != 0),
            Type::S8 => Value::S8(i8::from_le_bytes(read_array(memory, ptr)?)),
            Type::U8 => Value::U8(read_u8(memory, ptr)?),
            Type::S16 => Value::S16(i16::from_le_bytes(read_array(memory, ptr)?)),
            Type::U16 => Value::U16(u16::from_le_bytes(read_array(memory, ptr)?)),
            Type::S32 => Value::S32(i32::from_le_bytes(read_array(memory, ptr)?)),
            Type::U32 => Value::U32(read_u32(memory, ptr)?),
            Type::S64 => Value::S64(i64::from_le_bytes(read_array(memory, ptr)?)),
            Type::U64 => Value::U64(u64::from_le_bytes(read_array(memory, ptr)?)),
            Type::F32 => {
                let bits = read_u32(memory, ptr)?;
                Value::F32(self.canonical_f32(f32::from_bits(bits)))
            }
            Type::F64 => {
                let bits = u64::from_le_bytes(read_array(memory, ptr)?);
                Value::F64(self.canonical_f64(f64::from_bits(bits)))
            }
            Type::Char => Value::Char(to_char(read_u32(memory, ptr)?)?),
            Type::String => {
                let data = read_u32(memory, ptr)?;
                let len = read_u32(memory, ptr + 4)?;
                Value::String(load_string(memory, data, len)?)
            }
            Type::Id(id) => {
                let (def, info) = self.entry(*id)?;
                return self.load_def(&def.kind, info, memory, ptr);
            }
        })
    }

    fn load_def<M: Memory + ?Sized>(
        &self,
        kind: &TypeDefKind,
        info: &TypeInfo,
        memory: &M,
        ptr: u32,
    ) -> Result<Value, CanonicalAbiError> {
        match kind {
            TypeDefKind::Type(t) => self.load_at(t, memory, ptr),
            TypeDefKind::List(elem) => {
                let data = read_u32(memory, ptr)?;
                let len = read_u32(memory, ptr + 4)?;
                self.load_list(elem, memory, data, len)
            }
            TypeDefKind::Record(r) => {
                let offsets = field_offsets(info)?;
                let mut fields = Vec::with_capacity(r.fields.len());
                for (field, offset) in r.fields.iter().zip(offsets) {
                    let v = self.load_at(&field.ty, memory, ptr + offset)?;
                    fields.push((field.name.clone(), v));
                }
                Ok(Value::Record(fields))
            }
            TypeDefKind::Tuple(t) => {
                let offsets = field_offsets(info)?;
                let items = t
                    .types
                    .iter()
                    .zip(offsets)
                    .map(|(ty, offset)| self.load_at(ty, memory, ptr + offset))
                    .collect::<Result<_, _>>()?;
                Ok(Value::Tuple(items))
            }
            TypeDefKind::Flags(f) => {
                let words = match info.placement {
                    Placement::Flags(FlagsRepr::Empty) => Vec::new(),
                    Placement::Flags(FlagsRepr::U8) => vec![read_uint(memory, ptr, 1)?],
                    Placement::Flags(FlagsRepr::U16) => vec![read_uint(memory, ptr, 2)?],
                    Placement::Flags(FlagsRepr::U32(n)) => (0..n)
                        .map(|i| read_u32(memory, ptr + 4 * i))
                        .collect::<Result<_, _>>()?,
                    _ => return Err(CanonicalAbiError::mismatch("flags layout", "non-flags layout")),
                };
                flags_value(f, &words)
            }
            kind => {
                let (cases, discriminant_size, payload_offset) = variant_parts(kind, info)?;
                let index = read_uint(memory, ptr, discriminant_size)?;
                let payload_ty = cases.payload(index).ok_or_else(|| cases.invalid(index))?;
                let payload = match payload_ty {
                    Some(ty) => Some(self.load_at(&ty, memory, ptr + payload_offset)?),
                    None => None,
                };
                cases.build(index, payload)
            }
        }
    }

    /// Lift a value of type `ty` from flat core values, consuming exactly the
    /// slots `ty` flattens to.
    pub fn lift_flat<M: Memory + ?Sized>(
        &self,
        ty: &Type,
        memory: &M,
        values: &mut FlatValues<'_>,
    ) -> Result<Value, CanonicalAbiError> {
        Ok(match ty {
            Type::Bool => Value::Bool(values.next_i32()? != 0),
            Type::S8 => Value::S8(values.next_i32()? as i8),
            Type::U8 => Value::U8(values.next_i32()? as u8),
            Type::S16 => Value::S16(values.next_i32()? as i16),
            Type::U16 => Value::U16(values.next_i32()? as u16),
            Type::S32 => Value::S32(values.next_i32()?),
            Type::U32 => Value::U32(values.next_i32()? as u32),
            Type::S64 => Value::S64(values.next_i64()?),
            Type::U64 => Value::U64(values.next_i64()? as u64),
            Type::F32 => Value::F32(self.canonical_f32(values.next_f32()?)),
            Type::F64 => Value::F64(self.canonical_f64(values.next_f64()?)),
            Type::Char => Value::Char(to_char(values.next_i32()? as u32)?),
            Type::String => {
                let data = values.next_i32()? as u32;
                let len = values.next_i32()? as u32;
                Value::String(load_string(memory, data, len)?)
            }
            Type::Id(id) => {
                let (def, info) = self.entry(*id)?;
                return self.lift_flat_def(&def.kind, info, memory, values);
            }
        })
    }

    fn lift_flat_def<M: Memory + ?Sized>(
        &self,
        kind: &TypeDefKind,
        info: &TypeInfo,
        memory: &M,
        values: &mut FlatValues<'_>,
    ) -> Result<Value, CanonicalAbiError> {
        match kind {
            TypeDefKind::Type(t) => self.lift_flat(t, memory, values),
            TypeDefKind::List(elem) => {
                let data = values.next_i32()? as u32;
                let len = values.next_i32()? as u32;
                self.load_list(elem, memory, data, len)
            }
            TypeDefKind::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields.len());
                for field in &r.fields {
                    let v = self.lift_flat(&field.ty, memory, values)?;
                    fields.push((field.name.clone(), v));
                }
                Ok(Value::Record(fields))
            }
            TypeDefKind::Tuple(t) => {
                let items = t
                    .types
                    .iter()
                    .map(|ty| self.lift_flat(ty, memory, values))
                    .collect::<Result<_, _>>()?;
                Ok(Value::Tuple(items))
            }
            TypeDefKind::Flags(f) => {
                let words = (0..info.flat.len())
                    .map(|_| values.next_i32().map(|w| w as u32))
                    .collect::<Result<Vec<_>, _>>()?;
                flags_value(f, &words)
            }
            kind => {
                let (cases, _, _) = variant_parts(kind, info)?;
                let index = values.next_i32()? as u32;
                let slots = info.flat.get(1..).unwrap_or_default();
                let joined = slots
                    .iter()
                    .map(|slot| values.next(*slot))
                    .collect::<Result<Vec<_>, _>>()?;
                let payload_ty = cases.payload(index).ok_or_else(|| cases.invalid(index))?;
                let payload = match payload_ty {
                    Some(ty) => {
                        let coerced = self
                            .layouts
                            .flat(&ty)
                            .iter()
                            .zip(&joined)
                            .map(|(want, slot)| slot.coerce_from(*want))
                            .collect::<Result<Vec<_>, _>>()?;
                        let mut case_values = FlatValues::new(&coerced);
                        Some(self.lift_flat(&ty, memory, &mut case_values)?)
                    }
                    None => None,
                };
                cases.build(index, payload)
            }
        }
    }

    /// Load `len` elements of type `elem` starting at `data`.
    pub(crate) fn load_list<M: Memory + ?Sized>(
        &self,
        elem: &Type,
        memory: &M,
        data: u32,
        len: u32,
    ) -> Result<Value, CanonicalAbiError> {
        let layout = self.layouts.layout(elem);
        check_aligned(data, layout.align)?;
        // Zero-sized elements are counted as one byte each so `len` stays
        // bounded by the memory size.
        check_range(memory, data, u64::from(len) * u64::from(layout.size.max(1)))?;
        let items = (0..len)
            .map(|i| self.load_at(elem, memory, data + i * layout.size))
            .collect::<Result<_, _>>()?;
        Ok(Value::List(items))
    }
}

fn load_string<M: Memory + ?Sized>(
    memory: &M,
    data: u32,
    len: u32,
) -> Result<String, CanonicalAbiError> {
    check_range(memory, data, u64::from(len))?;
    let bytes = memory.read(data, len)?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| CanonicalAbiError::InvalidUtf8)
}

fn to_char(code: u32) -> Result<char, CanonicalAbiError> {
    char::from_u32(code).ok_or(CanonicalAbiError::InvalidChar(code))
}

fn field_offsets(info: &TypeInfo) -> Result<&[u32], CanonicalAbiError> {
    match &info.placement {
        Placement::Fields(offsets) => Ok(offsets),
        _ => Err(CanonicalAbiError::mismatch("record layout", "non-record layout")),
    }
}

fn variant_parts<'t>(
    kind: &'t TypeDefKind,
    info: &TypeInfo,
) -> Result<(Cases<'t>, u32, u32), CanonicalAbiError> {
    match (Cases::of(kind), &info.placement) {
        (
            Some(cases),
            Placement::Variant {
                discriminant_size,
                payload_offset,
            },
        ) => Ok((cases, *discriminant_size, *payload_offset)),
        _ => Err(CanonicalAbiError::mismatch("variant-like type", kind.describe())),
    }
}

/// Decode flag words, rejecting bits past the last declared name.
fn flags_value(flags: &Flags, words: &[u32]) -> Result<Value, CanonicalAbiError> {
    let count = flags.names.len();
    for (i, word) in words.iter().enumerate() {
        let used = count.saturating_sub(i * 32).min(32);
        let mask = if used == 32 { u32::MAX } else { (1u32 << used) - 1 };
        if word & !mask != 0 {
            return Err(CanonicalAbiError::InvalidFlagsBits {
                bits: *word,
                num_flags: count,
            });
        }
    }
    let set = flags
        .names
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            words
                .get(i / 32)
                .is_some_and(|w| *w & (1u32 << (i % 32)) != 0)
        })
        .map(|(_, name)| name.clone())
        .collect();
    Ok(Value::Flags(set))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::abi::{FlatValue, LinearMemory};
    use crate::types::TypeTable;

    #[test]
    fn test_load_rejects_misaligned_and_out_of_bounds() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::with_size(8);
        assert_eq!(
            abi.load(&Type::U32, &mem, 2),
            Err(CanonicalAbiError::MisalignedPointer { ptr: 2, align: 4 })
        );
        assert!(matches!(
            abi.load(&Type::U64, &mem, 8),
            Err(CanonicalAbiError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_bool_is_nonzero() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::from_bytes(vec![2]);
        assert_eq!(abi.load(&Type::Bool, &mem, 0).unwrap(), Value::Bool(true));
        let flat = [FlatValue::I32(0)];
        let v = abi.lift_flat(&Type::Bool, &mem, &mut FlatValues::new(&flat)).unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn test_flat_integers_truncate() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::new();
        let flat = [FlatValue::I32(0x1ff)];
        let v = abi.lift_flat(&Type::U8, &mem, &mut FlatValues::new(&flat)).unwrap();
        assert_eq!(v, Value::U8(0xff));
        let flat = [FlatValue::I32(-1)];
        let v = abi.lift_flat(&Type::U32, &mem, &mut FlatValues::new(&flat)).unwrap();
        assert_eq!(v, Value::U32(u32::MAX));
    }

    #[test]
    fn test_invalid_char() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::from_bytes(0xd800u32.to_le_bytes().to_vec());
        assert_eq!(
            abi.load(&Type::Char, &mem, 0),
            Err(CanonicalAbiError::InvalidChar(0xd800))
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let table = TypeTable::new();
        let abi = CanonicalAbi::new(&table);
        let mut bytes = vec![8, 0, 0, 0, 2, 0, 0, 0];
        bytes.extend([0xc3, 0x28]);
        let mem = LinearMemory::from_bytes(bytes);
        assert_eq!(
            abi.load(&Type::String, &mem, 0),
            Err(CanonicalAbiError::InvalidUtf8)
        );
    }

    #[test]
    fn test_stray_flag_bits() {
        let mut table = TypeTable::new();
        let ty = table.define(TypeDefKind::flags(["a", "b", "c"])).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::from_bytes(vec![0b1010]);
        assert_eq!(
            abi.load(&ty, &mem, 0),
            Err(CanonicalAbiError::InvalidFlagsBits {
                bits: 0b1010,
                num_flags: 3
            })
        );
        let mem = LinearMemory::from_bytes(vec![0b110]);
        assert_eq!(abi.load(&ty, &mem, 0).unwrap(), Value::flags(["b", "c"]));
    }

    #[test]
    fn test_multi_word_flags() {
        let names: Vec<String> = (0..40).map(|i| format!("f{}", i)).collect();
        let mut table = TypeTable::new();
        let ty = table.define(TypeDefKind::flags(names)).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::new();
        let flat = [FlatValue::I32(1), FlatValue::I32(1 << 7)];
        let v = abi.lift_flat(&ty, &mem, &mut FlatValues::new(&flat)).unwrap();
        assert_eq!(v, Value::flags(["f0", "f39"]));

        let flat = [FlatValue::I32(0), FlatValue::I32(1 << 8)];
        assert!(matches!(
            abi.lift_flat(&ty, &mem, &mut FlatValues::new(&flat)),
            Err(CanonicalAbiError::InvalidFlagsBits { .. })
        ));
    }

    #[test]
    fn test_invalid_discriminant() {
        let mut table = TypeTable::new();
        let ty = table.define(TypeDefKind::enumeration(["a", "b", "c"])).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::from_bytes(vec![3]);
        assert_eq!(
            abi.load(&ty, &mem, 0),
            Err(CanonicalAbiError::InvalidDiscriminant {
                discriminant: 3,
                num_cases: 3
            })
        );
        let mem = LinearMemory::from_bytes(vec![1]);
        assert_eq!(abi.load(&ty, &mem, 0).unwrap(), Value::Enum("b".into()));
    }

    #[test]
    fn test_list_bounds_checked_before_reading() {
        let mut table = TypeTable::new();
        let list = table.define(TypeDefKind::List(Type::U32)).unwrap();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::with_size(16);
        let flat = [FlatValue::I32(8), FlatValue::I32(1_000_000)];
        assert!(matches!(
            abi.lift_flat(&list, &mem, &mut FlatValues::new(&flat)),
            Err(CanonicalAbiError::OutOfBounds { .. })
        ));
        let flat = [FlatValue::I32(2), FlatValue::I32(1)];
        assert_eq!(
            abi.lift_flat(&list, &mem, &mut FlatValues::new(&flat)),
            Err(CanonicalAbiError::MisalignedPointer { ptr: 2, align: 4 })
        );
    }

    #[test]
    fn test_zero_sized_list_bounded_by_memory() {
        let mut table = TypeTable::new();
        let unit = table.define(TypeDefKind::tuple(Vec::<Type>::new())).unwrap();
        let list = table.define(TypeDefKind::List(unit)).unwrap();
        let abi = CanonicalAbi::new(&table);

        let mem = LinearMemory::new();
        let flat = [FlatValue::I32(0), FlatValue::I32(20_000_000)];
        assert_eq!(
            abi.lift_flat(&list, &mem, &mut FlatValues::new(&flat)),
            Err(CanonicalAbiError::OutOfBounds {
                ptr: 0,
                len: 20_000_000,
                memory_size: 0
            })
        );

        let mem = LinearMemory::with_size(4);
        let flat = [FlatValue::I32(0), FlatValue::I32(3)];
        assert_eq!(
            abi.lift_flat(&list, &mem, &mut FlatValues::new(&flat)).unwrap(),
            Value::List(vec![Value::Tuple(vec![]); 3])
        );
    }

    #[test]
    fn test_variant_from_joined_slots() {
        let mut table = TypeTable::new();
        let ty = table
            .define(TypeDefKind::variant([("f", Some(Type::F32)), ("n", Some(Type::U64))]))
            .unwrap();
        let abi = CanonicalAbi::new(&table);
        let mem = LinearMemory::new();
        let flat = [FlatValue::I32(0), FlatValue::I64(i64::from(2.5f32.to_bits()))];
        let v = abi.lift_flat(&ty, &mem, &mut FlatValues::new(&flat)).unwrap();
        assert_eq!(v, Value::variant("f", Some(Value::F32(2.5))));

        let flat = [FlatValue::I32(5), FlatValue::I64(0)];
        assert!(matches!(
            abi.lift_flat(&ty, &mem, &mut FlatValues::new(&flat)),
            Err(CanonicalAbiError::InvalidDiscriminant { .. })
        ));
    }
}
