//! Bridge between [`Value`] and the WAVE text format.
//!
//! WAVE gives values a human-readable syntax (`{x: 1, y: 2}`, `some("a")`,
//! `[1, 2, 3]`). The bridge builds a `wasm_wave` type for any table type and
//! converts values in both directions, so the command line can read and print
//! values without a second value model.
//!
//! Unions and empty records or tuples have no WAVE equivalent.

use std::borrow::Cow;

use thiserror::Error;
use wasm_wave::value::{Type as WaveType, Value as WaveValue};
use wasm_wave::wasm::{WasmTypeKind, WasmValue};

use crate::types::{Type, TypeDefKind, TypeTable};
use crate::value::Value;

/// Errors raised while converting to or from WAVE.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaveError {
    #[error("Type '{0}' has no WAVE representation")]
    Unsupported(String),

    #[error("WAVE value kind mismatch: expected {expected}, got {got}")]
    KindMismatch { expected: String, got: String },

    #[error("Failed to build WAVE value: {0}")]
    Build(String),

    #[error("WAVE parsing error: {0}")]
    Parse(String),

    #[error("WAVE writing error: {0}")]
    Write(String),
}

/// Build the WAVE type of `ty`.
pub fn wave_type(table: &TypeTable, ty: &Type) -> Result<WaveType, WaveError> {
    Ok(match ty {
        Type::Bool => WaveType::BOOL,
        Type::S8 => WaveType::S8,
        Type::U8 => WaveType::U8,
        Type::S16 => WaveType::S16,
        Type::U16 => WaveType::U16,
        Type::S32 => WaveType::S32,
        Type::U32 => WaveType::U32,
        Type::S64 => WaveType::S64,
        Type::U64 => WaveType::U64,
        Type::F32 => WaveType::F32,
        Type::F64 => WaveType::F64,
        Type::Char => WaveType::CHAR,
        Type::String => WaveType::STRING,
        Type::Id(id) => {
            let def = table
                .get(*id)
                .ok_or_else(|| WaveError::Unsupported(id.to_string()))?;
            let unsupported = || WaveError::Unsupported(def.kind.describe().to_string());
            match &def.kind {
                TypeDefKind::Type(t) => wave_type(table, t)?,
                TypeDefKind::List(elem) => WaveType::list(wave_type(table, elem)?),
                TypeDefKind::Record(r) => {
                    let fields = r
                        .fields
                        .iter()
                        .map(|f| Ok((f.name.clone(), wave_type(table, &f.ty)?)))
                        .collect::<Result<Vec<_>, WaveError>>()?;
                    WaveType::record(fields).ok_or_else(unsupported)?
                }
                TypeDefKind::Tuple(t) => {
                    let types = t
                        .types
                        .iter()
                        .map(|t| wave_type(table, t))
                        .collect::<Result<Vec<_>, _>>()?;
                    WaveType::tuple(types).ok_or_else(unsupported)?
                }
                TypeDefKind::Flags(f) => WaveType::flags(f.names.clone()).ok_or_else(unsupported)?,
                TypeDefKind::Enum(e) => WaveType::enum_ty(e.cases.clone()).ok_or_else(unsupported)?,
                TypeDefKind::Variant(v) => {
                    let cases = v
                        .cases
                        .iter()
                        .map(|c| {
                            let payload = c.ty.as_ref().map(|t| wave_type(table, t)).transpose()?;
                            Ok((c.name.clone(), payload))
                        })
                        .collect::<Result<Vec<_>, WaveError>>()?;
                    WaveType::variant(cases).ok_or_else(unsupported)?
                }
                TypeDefKind::Option(t) => WaveType::option(wave_type(table, t)?),
                TypeDefKind::Result(r) => {
                    let ok = r.ok.as_ref().map(|t| wave_type(table, t)).transpose()?;
                    let err = r.err.as_ref().map(|t| wave_type(table, t)).transpose()?;
                    WaveType::result(ok, err)
                }
                TypeDefKind::Union(_) => return Err(unsupported()),
            }
        }
    })
}

/// Convert a value of type `ty` into a WAVE value.
pub fn to_wave(table: &TypeTable, value: &Value, ty: &Type) -> Result<WaveValue, WaveError> {
    let mismatch = || WaveError::KindMismatch {
        expected: type_label(table, ty),
        got: value.kind().to_string(),
    };
    let wave_ty = wave_type(table, ty)?;
    let resolved = table.resolve_alias(*ty);

    let Type::Id(id) = resolved else {
        return Ok(match (resolved, value) {
            (Type::Bool, Value::Bool(v)) => WaveValue::make_bool(*v),
            (Type::S8, Value::S8(v)) => WaveValue::make_s8(*v),
            (Type::U8, Value::U8(v)) => WaveValue::make_u8(*v),
            (Type::S16, Value::S16(v)) => WaveValue::make_s16(*v),
            (Type::U16, Value::U16(v)) => WaveValue::make_u16(*v),
            (Type::S32, Value::S32(v)) => WaveValue::make_s32(*v),
            (Type::U32, Value::U32(v)) => WaveValue::make_u32(*v),
            (Type::S64, Value::S64(v)) => WaveValue::make_s64(*v),
            (Type::U64, Value::U64(v)) => WaveValue::make_u64(*v),
            (Type::F32, Value::F32(v)) => WaveValue::make_f32(*v),
            (Type::F64, Value::F64(v)) => WaveValue::make_f64(*v),
            (Type::Char, Value::Char(c)) => WaveValue::make_char(*c),
            (Type::String, Value::String(s)) => WaveValue::make_string(Cow::Owned(s.clone())),
            _ => return Err(mismatch()),
        });
    };
    let def = table
        .get(id)
        .ok_or_else(|| WaveError::Unsupported(id.to_string()))?;

    let built = match (&def.kind, value) {
        (TypeDefKind::List(elem), Value::List(items)) => {
            let items = items
                .iter()
                .map(|v| to_wave(table, v, elem))
                .collect::<Result<Vec<_>, _>>()?;
            WaveValue::make_list(&wave_ty, items)
        }
        (TypeDefKind::Record(r), Value::Record(fields)) => {
            let mut wave_fields = Vec::with_capacity(r.fields.len());
            for field in &r.fields {
                let v = fields
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .map(|(_, v)| v)
                    .ok_or_else(mismatch)?;
                wave_fields.push((field.name.as_str(), to_wave(table, v, &field.ty)?));
            }
            WaveValue::make_record(&wave_ty, wave_fields)
        }
        (TypeDefKind::Tuple(t), Value::Tuple(items)) if items.len() == t.types.len() => {
            let items = t
                .types
                .iter()
                .zip(items)
                .map(|(ty, v)| to_wave(table, v, ty))
                .collect::<Result<Vec<_>, _>>()?;
            WaveValue::make_tuple(&wave_ty, items)
        }
        (TypeDefKind::Flags(_), Value::Flags(names)) => {
            WaveValue::make_flags(&wave_ty, names.iter().map(String::as_str))
        }
        (TypeDefKind::Enum(_), Value::Enum(name)) => WaveValue::make_enum(&wave_ty, name),
        (TypeDefKind::Variant(v), Value::Variant(name, payload)) => {
            let case = v
                .cases
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(mismatch)?;
            let payload = match (&case.ty, payload) {
                (Some(ty), Some(p)) => Some(to_wave(table, p, ty)?),
                (None, None) => None,
                _ => return Err(mismatch()),
            };
            WaveValue::make_variant(&wave_ty, name, payload)
        }
        (TypeDefKind::Option(inner), Value::Option(v)) => {
            let v = v.as_deref().map(|v| to_wave(table, v, inner)).transpose()?;
            WaveValue::make_option(&wave_ty, v)
        }
        (TypeDefKind::Result(r), Value::Result(v)) => {
            let payload = |ty: Option<Type>, p: &Option<Box<Value>>| match (ty, p) {
                (Some(ty), Some(p)) => to_wave(table, p, &ty).map(Some),
                (None, None) => Ok(None),
                _ => Err(mismatch()),
            };
            let v = match v {
                Ok(p) => Ok(payload(r.ok, p)?),
                Err(p) => Err(payload(r.err, p)?),
            };
            WaveValue::make_result(&wave_ty, v)
        }
        _ => return Err(mismatch()),
    };
    built.map_err(|e| WaveError::Build(e.to_string()))
}

/// Convert a WAVE value into a value of type `ty`.
pub fn from_wave(table: &TypeTable, wave: &WaveValue, ty: &Type) -> Result<Value, WaveError> {
    let resolved = table.resolve_alias(*ty);
    let kind = match resolved {
        Type::Id(id) => Some(
            &table
                .get(id)
                .ok_or_else(|| WaveError::Unsupported(id.to_string()))?
                .kind,
        ),
        _ => None,
    };
    let expected = expected_kind(&resolved, kind)
        .ok_or_else(|| WaveError::Unsupported(type_label(table, ty)))?;
    if wave.kind() != expected {
        return Err(WaveError::KindMismatch {
            expected: format!("{:?}", expected),
            got: format!("{:?}", wave.kind()),
        });
    }
    let Some(kind) = kind else {
        return primitive_from_wave(wave, resolved);
    };

    Ok(match kind {
        TypeDefKind::List(elem) => Value::List(
            wave.unwrap_list()
                .map(|v| from_wave(table, &v, elem))
                .collect::<Result<_, _>>()?,
        ),
        TypeDefKind::Record(r) => {
            let wave_fields: Vec<_> = wave.unwrap_record().collect();
            let mut fields = Vec::with_capacity(r.fields.len());
            for field in &r.fields {
                let (_, v) = wave_fields
                    .iter()
                    .find(|(name, _)| &**name == field.name.as_str())
                    .ok_or_else(|| WaveError::KindMismatch {
                        expected: format!("field '{}'", field.name),
                        got: "missing".to_string(),
                    })?;
                fields.push((field.name.clone(), from_wave(table, v, &field.ty)?));
            }
            Value::Record(fields)
        }
        TypeDefKind::Tuple(t) => Value::Tuple(
            t.types
                .iter()
                .zip(wave.unwrap_tuple())
                .map(|(ty, v)| from_wave(table, &v, ty))
                .collect::<Result<_, _>>()?,
        ),
        TypeDefKind::Flags(_) => {
            Value::Flags(wave.unwrap_flags().map(|n| n.into_owned()).collect())
        }
        TypeDefKind::Enum(_) => Value::Enum(wave.unwrap_enum().into_owned()),
        TypeDefKind::Variant(v) => {
            let (name, payload) = wave.unwrap_variant();
            let case = v
                .cases
                .iter()
                .find(|c| c.name == *name)
                .ok_or_else(|| WaveError::KindMismatch {
                    expected: "variant case".to_string(),
                    got: name.to_string(),
                })?;
            let payload = match (case.ty, payload) {
                (Some(ty), Some(p)) => Some(Box::new(from_wave(table, &p, &ty)?)),
                _ => None,
            };
            Value::Variant(case.name.clone(), payload)
        }
        TypeDefKind::Option(inner) => Value::Option(
            wave.unwrap_option()
                .map(|v| from_wave(table, &v, inner).map(Box::new))
                .transpose()?,
        ),
        TypeDefKind::Result(r) => {
            let payload = |ty: Option<Type>, p: Option<Cow<'_, WaveValue>>| match (ty, p) {
                (Some(ty), Some(p)) => from_wave(table, &p, &ty).map(|v| Some(Box::new(v))),
                _ => Ok(None),
            };
            Value::Result(match wave.unwrap_result() {
                Ok(p) => Ok(payload(r.ok, p)?),
                Err(p) => Err(payload(r.err, p)?),
            })
        }
        TypeDefKind::Type(_) | TypeDefKind::Union(_) => {
            return Err(WaveError::Unsupported(kind.describe().to_string()));
        }
    })
}

fn primitive_from_wave(wave: &WaveValue, ty: Type) -> Result<Value, WaveError> {
    Ok(match ty {
        Type::Bool => Value::Bool(wave.unwrap_bool()),
        Type::S8 => Value::S8(wave.unwrap_s8()),
        Type::U8 => Value::U8(wave.unwrap_u8()),
        Type::S16 => Value::S16(wave.unwrap_s16()),
        Type::U16 => Value::U16(wave.unwrap_u16()),
        Type::S32 => Value::S32(wave.unwrap_s32()),
        Type::U32 => Value::U32(wave.unwrap_u32()),
        Type::S64 => Value::S64(wave.unwrap_s64()),
        Type::U64 => Value::U64(wave.unwrap_u64()),
        Type::F32 => Value::F32(wave.unwrap_f32()),
        Type::F64 => Value::F64(wave.unwrap_f64()),
        Type::Char => Value::Char(wave.unwrap_char()),
        Type::String => Value::String(wave.unwrap_string().into_owned()),
        Type::Id(id) => return Err(WaveError::Unsupported(id.to_string())),
    })
}

/// Parse WAVE text as a value of type `ty`.
pub fn parse_value(table: &TypeTable, text: &str, ty: &Type) -> Result<Value, WaveError> {
    let wave_ty = wave_type(table, ty)?;
    let wave: WaveValue =
        wasm_wave::from_str(&wave_ty, text).map_err(|e| WaveError::Parse(e.to_string()))?;
    from_wave(table, &wave, ty)
}

/// Render a value of type `ty` as WAVE text.
pub fn format_value(table: &TypeTable, value: &Value, ty: &Type) -> Result<String, WaveError> {
    let wave = to_wave(table, value, ty)?;
    wasm_wave::to_string(&wave).map_err(|e| WaveError::Write(e.to_string()))
}

fn expected_kind(ty: &Type, kind: Option<&TypeDefKind>) -> Option<WasmTypeKind> {
    Some(match (ty, kind) {
        (Type::Bool, _) => WasmTypeKind::Bool,
        (Type::S8, _) => WasmTypeKind::S8,
        (Type::U8, _) => WasmTypeKind::U8,
        (Type::S16, _) => WasmTypeKind::S16,
        (Type::U16, _) => WasmTypeKind::U16,
        (Type::S32, _) => WasmTypeKind::S32,
        (Type::U32, _) => WasmTypeKind::U32,
        (Type::S64, _) => WasmTypeKind::S64,
        (Type::U64, _) => WasmTypeKind::U64,
        (Type::F32, _) => WasmTypeKind::F32,
        (Type::F64, _) => WasmTypeKind::F64,
        (Type::Char, _) => WasmTypeKind::Char,
        (Type::String, _) => WasmTypeKind::String,
        (Type::Id(_), Some(TypeDefKind::List(_))) => WasmTypeKind::List,
        (Type::Id(_), Some(TypeDefKind::Record(_))) => WasmTypeKind::Record,
        (Type::Id(_), Some(TypeDefKind::Tuple(_))) => WasmTypeKind::Tuple,
        (Type::Id(_), Some(TypeDefKind::Flags(_))) => WasmTypeKind::Flags,
        (Type::Id(_), Some(TypeDefKind::Enum(_))) => WasmTypeKind::Enum,
        (Type::Id(_), Some(TypeDefKind::Variant(_))) => WasmTypeKind::Variant,
        (Type::Id(_), Some(TypeDefKind::Option(_))) => WasmTypeKind::Option,
        (Type::Id(_), Some(TypeDefKind::Result(_))) => WasmTypeKind::Result,
        _ => return None,
    })
}

fn type_label(table: &TypeTable, ty: &Type) -> String {
    match table.resolve_alias(*ty) {
        Type::Id(id) => table
            .get(id)
            .map(|def| def.kind.describe().to_string())
            .unwrap_or_else(|| id.to_string()),
        other => other.name(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> (TypeTable, Type, Type) {
        let mut table = TypeTable::new();
        let point = table
            .define_named("point", TypeDefKind::record([("x", Type::S32), ("y", Type::S32)]))
            .unwrap();
        let shape = table
            .define_named(
                "shape",
                TypeDefKind::variant([("dot", Some(point)), ("empty", None)]),
            )
            .unwrap();
        (table, point, shape)
    }

    #[test]
    fn test_parse_and_format_record() {
        let (table, point, _) = table();
        let value = parse_value(&table, "{x: 1, y: -2}", &point).unwrap();
        assert_eq!(
            value,
            Value::record([("x", Value::S32(1)), ("y", Value::S32(-2))])
        );
        assert_eq!(format_value(&table, &value, &point).unwrap(), "{x: 1, y: -2}");
    }

    #[test]
    fn test_variant_round_trip() {
        let (table, _, shape) = table();
        let value = parse_value(&table, "dot({x: 3, y: 4})", &shape).unwrap();
        let text = format_value(&table, &value, &shape).unwrap();
        assert_eq!(parse_value(&table, &text, &shape).unwrap(), value);
        assert_eq!(
            parse_value(&table, "empty", &shape).unwrap(),
            Value::variant("empty", None)
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let (table, point, _) = table();
        let wave = WaveValue::make_u32(5);
        assert!(matches!(
            from_wave(&table, &wave, &point),
            Err(WaveError::KindMismatch { .. })
        ));
        assert!(matches!(
            to_wave(&table, &Value::U8(1), &point),
            Err(WaveError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_union_is_unsupported() {
        let mut table = TypeTable::new();
        let u = table.define(TypeDefKind::union([Type::U8, Type::String])).unwrap();
        assert!(matches!(wave_type(&table, &u), Err(WaveError::Unsupported(_))));
    }

    #[test]
    fn test_option_and_result() {
        let mut table = TypeTable::new();
        let opt = table.define(TypeDefKind::Option(Type::String)).unwrap();
        let res = table.define(TypeDefKind::result(Some(Type::U8), None)).unwrap();
        assert_eq!(
            parse_value(&table, "some(\"hi\")", &opt).unwrap(),
            Value::some(Value::String("hi".into()))
        );
        assert_eq!(parse_value(&table, "none", &opt).unwrap(), Value::none());
        assert_eq!(
            parse_value(&table, "ok(7)", &res).unwrap(),
            Value::ok(Some(Value::U8(7)))
        );
        assert_eq!(parse_value(&table, "err", &res).unwrap(), Value::err(None));
    }

    #[test]
    fn test_float_kinds() {
        let mut table = TypeTable::new();
        let pair = table.define(TypeDefKind::tuple([Type::F32, Type::F64])).unwrap();
        let value = parse_value(&table, "(1.5, -0.25)", &pair).unwrap();
        assert_eq!(value, Value::Tuple(vec![Value::F32(1.5), Value::F64(-0.25)]));
        assert_eq!(
            from_wave(&table, &WaveValue::make_f64(2.0), &Type::F64).unwrap(),
            Value::F64(2.0)
        );
        assert!(matches!(
            from_wave(&table, &WaveValue::make_f32(2.0), &Type::F64),
            Err(WaveError::KindMismatch { .. })
        ));
    }
}
