//! Component-level values.

use std::fmt;

/// A structured value of some component-level [`Type`](crate::Type).
///
/// Values carry no type information of their own beyond their shape; the
/// engine always pairs a value with the type it is lowered or lifted as.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Record fields in declaration order.
    Record(Vec<(String, Value)>),
    /// Names of the flags that are set.
    Flags(Vec<String>),
    Enum(String),
    Variant(String, Option<Box<Value>>),
    /// Union alternative by position.
    Union(u32, Box<Value>),
    Option(Option<Box<Value>>),
    Result(Result<Option<Box<Value>>, Option<Box<Value>>>),
}

impl Value {
    /// Convenience constructor for records.
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Value)>) -> Self {
        Value::Record(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }

    pub fn flags<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        Value::Flags(names.into_iter().map(Into::into).collect())
    }

    pub fn some(value: Value) -> Self {
        Value::Option(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Value::Option(None)
    }

    pub fn variant(case: impl Into<String>, payload: Option<Value>) -> Self {
        Value::Variant(case.into(), payload.map(Box::new))
    }

    pub fn ok(payload: Option<Value>) -> Self {
        Value::Result(Ok(payload.map(Box::new)))
    }

    pub fn err(payload: Option<Value>) -> Self {
        Value::Result(Err(payload.map(Box::new)))
    }

    /// Name of the value's shape, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::S8(_) => "s8",
            Value::U8(_) => "u8",
            Value::S16(_) => "s16",
            Value::U16(_) => "u16",
            Value::S32(_) => "s32",
            Value::U32(_) => "u32",
            Value::S64(_) => "s64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Record(_) => "record",
            Value::Flags(_) => "flags",
            Value::Enum(_) => "enum",
            Value::Variant(_, _) => "variant",
            Value::Union(_, _) => "union",
            Value::Option(_) => "option",
            Value::Result(_) => "result",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::S8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::S16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::S32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::S64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                write_separated(f, items.iter())?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_separated(f, items.iter())?;
                write!(f, ")")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Flags(names) => write!(f, "{{{}}}", names.join(", ")),
            Value::Enum(name) => write!(f, "{}", name),
            Value::Variant(name, None) => write!(f, "{}", name),
            Value::Variant(name, Some(payload)) => write!(f, "{}({})", name, payload),
            Value::Union(index, payload) => write!(f, "<{}>({})", index, payload),
            Value::Option(None) => write!(f, "none"),
            Value::Option(Some(v)) => write!(f, "some({})", v),
            Value::Result(Ok(None)) => write!(f, "ok"),
            Value::Result(Ok(Some(v))) => write!(f, "ok({})", v),
            Value::Result(Err(None)) => write!(f, "err"),
            Value::Result(Err(Some(v))) => write!(f, "err({})", v),
        }
    }
}

fn write_separated<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
