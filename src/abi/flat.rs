//! Core value types and flat values.
//!
//! Component values crossing into a core function are flattened into a
//! sequence of `i32`/`i64`/`f32`/`f64` slots. Variant-like types share their
//! payload slots between cases; when two cases put different core types in the
//! same slot the slot is widened with [`FlatType::join`] and the values are
//! reinterpreted with [`FlatValue::coerce_to`] / [`FlatValue::coerce_from`].
//!
//! The reinterpretation is a bit-pattern reuse, not a numeric conversion: an
//! `f32` payload stored in an `i32` slot is carried as its IEEE bits. This is
//! the canonical convention and is preserved as-is.

use std::fmt;

use super::CanonicalAbiError;

/// A core WebAssembly value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatType {
    I32,
    I64,
    F32,
    F64,
}

impl FlatType {
    /// The narrowest type able to carry both `self` and `other`.
    pub fn join(self, other: FlatType) -> FlatType {
        match (self, other) {
            (a, b) if a == b => a,
            (FlatType::I32, FlatType::F32) | (FlatType::F32, FlatType::I32) => FlatType::I32,
            _ => FlatType::I64,
        }
    }

    /// Zero value of this type, used to pad unused variant slots.
    pub fn zero(self) -> FlatValue {
        match self {
            FlatType::I32 => FlatValue::I32(0),
            FlatType::I64 => FlatValue::I64(0),
            FlatType::F32 => FlatValue::F32(0.0),
            FlatType::F64 => FlatValue::F64(0.0),
        }
    }
}

impl fmt::Display for FlatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlatType::I32 => "i32",
            FlatType::I64 => "i64",
            FlatType::F32 => "f32",
            FlatType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A core WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl FlatValue {
    pub fn ty(&self) -> FlatType {
        match self {
            FlatValue::I32(_) => FlatType::I32,
            FlatValue::I64(_) => FlatType::I64,
            FlatValue::F32(_) => FlatType::F32,
            FlatValue::F64(_) => FlatType::F64,
        }
    }

    /// Widen a case's value into a joined variant slot of type `want`.
    ///
    /// Integers are zero-extended and floats are carried by bit pattern.
    pub fn coerce_to(self, want: FlatType) -> Result<FlatValue, CanonicalAbiError> {
        Ok(match (self, want) {
            (v, want) if v.ty() == want => v,
            (FlatValue::F32(f), FlatType::I32) => FlatValue::I32(f.to_bits() as i32),
            (FlatValue::I32(i), FlatType::I64) => FlatValue::I64(i64::from(i as u32)),
            (FlatValue::F32(f), FlatType::I64) => FlatValue::I64(i64::from(f.to_bits())),
            (FlatValue::F64(f), FlatType::I64) => FlatValue::I64(f.to_bits() as i64),
            (v, want) => {
                return Err(CanonicalAbiError::FlatValueMismatch {
                    expected: want.to_string(),
                    got: v.ty().to_string(),
                });
            }
        })
    }

    /// Narrow a joined variant slot back into the case's own type `want`.
    ///
    /// Inverse of [`FlatValue::coerce_to`]; `i64` slots are wrapped to their
    /// low 32 bits when the case expects a 32-bit value.
    pub fn coerce_from(self, want: FlatType) -> Result<FlatValue, CanonicalAbiError> {
        Ok(match (self, want) {
            (v, want) if v.ty() == want => v,
            (FlatValue::I32(i), FlatType::F32) => FlatValue::F32(f32::from_bits(i as u32)),
            (FlatValue::I64(i), FlatType::I32) => FlatValue::I32(i as i32),
            (FlatValue::I64(i), FlatType::F32) => FlatValue::F32(f32::from_bits(i as u32)),
            (FlatValue::I64(i), FlatType::F64) => FlatValue::F64(f64::from_bits(i as u64)),
            (v, want) => {
                return Err(CanonicalAbiError::FlatValueMismatch {
                    expected: want.to_string(),
                    got: v.ty().to_string(),
                });
            }
        })
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatValue::I32(v) => write!(f, "i32:{}", v),
            FlatValue::I64(v) => write!(f, "i64:{}", v),
            FlatValue::F32(v) => write!(f, "f32:{}", v),
            FlatValue::F64(v) => write!(f, "f64:{}", v),
        }
    }
}

/// Cursor over a slice of flat values, consumed while lifting.
pub struct FlatValues<'a> {
    values: &'a [FlatValue],
    pos: usize,
}

impl<'a> FlatValues<'a> {
    pub fn new(values: &'a [FlatValue]) -> Self {
        Self { values, pos: 0 }
    }

    fn next_value(&mut self, want: FlatType) -> Result<FlatValue, CanonicalAbiError> {
        let value = self
            .values
            .get(self.pos)
            .copied()
            .ok_or_else(|| CanonicalAbiError::FlatValueMismatch {
                expected: want.to_string(),
                got: "end of values".to_string(),
            })?;
        self.pos += 1;
        Ok(value)
    }

    /// Take the next value, which must have type `want`.
    pub fn next(&mut self, want: FlatType) -> Result<FlatValue, CanonicalAbiError> {
        let value = self.next_value(want)?;
        if value.ty() != want {
            return Err(CanonicalAbiError::FlatValueMismatch {
                expected: want.to_string(),
                got: value.ty().to_string(),
            });
        }
        Ok(value)
    }

    pub fn next_i32(&mut self) -> Result<i32, CanonicalAbiError> {
        match self.next(FlatType::I32)? {
            FlatValue::I32(v) => Ok(v),
            other => Err(mismatch(FlatType::I32, other)),
        }
    }

    pub fn next_i64(&mut self) -> Result<i64, CanonicalAbiError> {
        match self.next(FlatType::I64)? {
            FlatValue::I64(v) => Ok(v),
            other => Err(mismatch(FlatType::I64, other)),
        }
    }

    pub fn next_f32(&mut self) -> Result<f32, CanonicalAbiError> {
        match self.next(FlatType::F32)? {
            FlatValue::F32(v) => Ok(v),
            other => Err(mismatch(FlatType::F32, other)),
        }
    }

    pub fn next_f64(&mut self) -> Result<f64, CanonicalAbiError> {
        match self.next(FlatType::F64)? {
            FlatValue::F64(v) => Ok(v),
            other => Err(mismatch(FlatType::F64, other)),
        }
    }

    /// Number of values not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.pos)
    }
}

fn mismatch(expected: FlatType, got: FlatValue) -> CanonicalAbiError {
    CanonicalAbiError::FlatValueMismatch {
        expected: expected.to_string(),
        got: got.ty().to_string(),
    }
}

/// Join `case` into the accumulated payload slots of a variant.
pub(crate) fn join_into(slots: &mut Vec<FlatType>, case: &[FlatType]) {
    for (i, ty) in case.iter().enumerate() {
        match slots.get_mut(i) {
            Some(slot) => *slot = slot.join(*ty),
            None => slots.push(*ty),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        use FlatType::*;
        assert_eq!(I32.join(I32), I32);
        assert_eq!(F32.join(I32), I32);
        assert_eq!(I32.join(F32), I32);
        assert_eq!(I32.join(I64), I64);
        assert_eq!(F64.join(I32), I64);
        assert_eq!(F32.join(F64), I64);
        assert_eq!(F64.join(F64), F64);
    }

    #[test]
    fn test_join_into() {
        let mut slots = vec![FlatType::F32];
        join_into(&mut slots, &[FlatType::I32, FlatType::F64]);
        assert_eq!(slots, vec![FlatType::I32, FlatType::F64]);
        join_into(&mut slots, &[FlatType::F32, FlatType::I32, FlatType::I32]);
        assert_eq!(slots, vec![FlatType::I32, FlatType::I64, FlatType::I32]);
    }

    #[test]
    fn test_coercion_reinterprets_bits() {
        let f = FlatValue::F32(1.5);
        let slot = f.coerce_to(FlatType::I32).unwrap();
        assert_eq!(slot, FlatValue::I32(1.5f32.to_bits() as i32));
        assert_eq!(slot.coerce_from(FlatType::F32).unwrap(), f);

        let neg = FlatValue::I32(-1);
        let wide = neg.coerce_to(FlatType::I64).unwrap();
        assert_eq!(wide, FlatValue::I64(0xffff_ffff));
        assert_eq!(wide.coerce_from(FlatType::I32).unwrap(), neg);

        let d = FlatValue::F64(-2.25);
        let wide = d.coerce_to(FlatType::I64).unwrap();
        assert_eq!(wide.coerce_from(FlatType::F64).unwrap(), d);

        assert!(FlatValue::I64(1).coerce_to(FlatType::I32).is_err());
    }

    #[test]
    fn test_cursor() {
        let values = [FlatValue::I32(7), FlatValue::F64(0.5)];
        let mut cursor = FlatValues::new(&values);
        assert_eq!(cursor.next_i32().unwrap(), 7);
        assert!(cursor.next_i32().is_err());
        let mut cursor = FlatValues::new(&values);
        cursor.next_i32().unwrap();
        assert_eq!(cursor.next_f64().unwrap(), 0.5);
        assert_eq!(cursor.remaining(), 0);
        assert!(matches!(
            cursor.next_i64(),
            Err(CanonicalAbiError::FlatValueMismatch { .. })
        ));
    }
}
