//! Uniform view over variant-like types.
//!
//! `enum`, `variant`, `union`, `option` and `result` all share one encoding: a
//! discriminant followed by the payload of the selected case. [`Cases`] maps
//! between a [`Value`] and `(discriminant, payload)` for each of them so the
//! lowering and lifting code only has to handle the encoding once.

use crate::types::{Type, TypeDefKind};
use crate::value::Value;

use super::CanonicalAbiError;

/// A case selected from a value: its discriminant and, when the case carries
/// one, the payload type together with the payload value.
pub(crate) type SelectedCase<'v> = (u32, Option<(Type, &'v Value)>);

#[derive(Clone, Copy)]
pub(crate) struct Cases<'t> {
    kind: &'t TypeDefKind,
}

impl<'t> Cases<'t> {
    /// View `kind` as a variant-like type, if it is one.
    pub(crate) fn of(kind: &'t TypeDefKind) -> Option<Self> {
        match kind {
            TypeDefKind::Enum(_)
            | TypeDefKind::Variant(_)
            | TypeDefKind::Union(_)
            | TypeDefKind::Option(_)
            | TypeDefKind::Result(_) => Some(Self { kind }),
            _ => None,
        }
    }

    pub(crate) fn count(&self) -> usize {
        match self.kind {
            TypeDefKind::Enum(e) => e.cases.len(),
            TypeDefKind::Variant(v) => v.cases.len(),
            TypeDefKind::Union(u) => u.types.len(),
            _ => 2,
        }
    }

    /// Payload type of case `index`; `None` when the index is out of range.
    pub(crate) fn payload(&self, index: u32) -> Option<Option<Type>> {
        let index = index as usize;
        match self.kind {
            TypeDefKind::Enum(e) => e.cases.get(index).map(|_| None),
            TypeDefKind::Variant(v) => v.cases.get(index).map(|c| c.ty),
            TypeDefKind::Union(u) => u.types.get(index).map(|t| Some(*t)),
            TypeDefKind::Option(t) => match index {
                0 => Some(None),
                1 => Some(Some(*t)),
                _ => None,
            },
            TypeDefKind::Result(r) => match index {
                0 => Some(r.ok),
                1 => Some(r.err),
                _ => None,
            },
            _ => None,
        }
    }

    /// Find the case `value` selects.
    pub(crate) fn select<'v>(&self, value: &'v Value) -> Result<SelectedCase<'v>, CanonicalAbiError> {
        let (index, payload) = match (self.kind, value) {
            (TypeDefKind::Enum(e), Value::Enum(name)) => {
                let index = e
                    .cases
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| unknown_case("enum", name))?;
                (index as u32, None)
            }
            (TypeDefKind::Variant(v), Value::Variant(name, payload)) => {
                let index = v
                    .cases
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| unknown_case("variant", name))?;
                (index as u32, payload.as_deref())
            }
            (TypeDefKind::Union(u), Value::Union(index, payload)) => {
                if *index as usize >= u.types.len() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("union alternative below {}", u.types.len()),
                        index.to_string(),
                    ));
                }
                (*index, Some(payload.as_ref()))
            }
            (TypeDefKind::Option(_), Value::Option(None)) => (0, None),
            (TypeDefKind::Option(_), Value::Option(Some(v))) => (1, Some(v.as_ref())),
            (TypeDefKind::Result(_), Value::Result(Ok(v))) => (0, v.as_deref()),
            (TypeDefKind::Result(_), Value::Result(Err(v))) => (1, v.as_deref()),
            (kind, value) => {
                return Err(CanonicalAbiError::mismatch(kind.describe(), value.kind()));
            }
        };

        let payload_ty = self.payload(index).flatten();
        match (payload_ty, payload) {
            (Some(ty), Some(v)) => Ok((index, Some((ty, v)))),
            (None, None) => Ok((index, None)),
            (Some(_), None) => Err(CanonicalAbiError::mismatch("case payload", "none")),
            (None, Some(v)) => Err(CanonicalAbiError::mismatch("no payload", v.kind())),
        }
    }

    /// Rebuild a value from a validated discriminant and lifted payload.
    pub(crate) fn build(&self, index: u32, payload: Option<Value>) -> Result<Value, CanonicalAbiError> {
        let boxed = payload.map(Box::new);
        Ok(match self.kind {
            TypeDefKind::Enum(e) => {
                let name = e.cases.get(index as usize).ok_or(self.invalid(index))?;
                Value::Enum(name.clone())
            }
            TypeDefKind::Variant(v) => {
                let case = v.cases.get(index as usize).ok_or(self.invalid(index))?;
                Value::Variant(case.name.clone(), boxed)
            }
            TypeDefKind::Union(_) => {
                let payload = boxed.ok_or_else(|| CanonicalAbiError::mismatch("union payload", "none"))?;
                Value::Union(index, payload)
            }
            TypeDefKind::Option(_) => match index {
                0 => Value::Option(None),
                _ => Value::Option(boxed),
            },
            TypeDefKind::Result(_) => match index {
                0 => Value::Result(Ok(boxed)),
                _ => Value::Result(Err(boxed)),
            },
            other => return Err(CanonicalAbiError::mismatch("variant-like type", other.describe())),
        })
    }

    /// The error for a discriminant that selects no case.
    pub(crate) fn invalid(&self, discriminant: u32) -> CanonicalAbiError {
        CanonicalAbiError::InvalidDiscriminant {
            discriminant,
            num_cases: self.count(),
        }
    }
}

fn unknown_case(kind: &str, name: &str) -> CanonicalAbiError {
    CanonicalAbiError::mismatch(format!("{} case", kind), format!("unknown case '{}'", name))
}
