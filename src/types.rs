//! The component-level type table.
//!
//! A [`TypeTable`] is an append-only arena of type definitions and function
//! signatures. Every compound type refers to its children through [`Type`],
//! which is either an inline primitive or a [`TypeId`] pointing at an entry
//! that was pushed earlier. Because references can only point backwards the
//! graph is acyclic by construction, and every reference is checked when the
//! entry is inserted.
//!
//! # Example
//!
//! ```
//! use wit_canon::{Type, TypeDefKind, TypeTable};
//!
//! let mut table = TypeTable::new();
//! let point = table.define_named(
//!     "point",
//!     TypeDefKind::record([("x", Type::U32), ("y", Type::U32)]),
//! )?;
//! let points = table.define(TypeDefKind::List(point))?;
//! assert!(table.find("point").is_some());
//! # let _ = points;
//! # Ok::<(), wit_canon::TypeTableError>(())
//! ```

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Index of a type definition inside a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Position of the definition in its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a function signature inside a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(u32);

impl FuncId {
    /// Position of the signature in its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reference to a component-level type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    Char,
    String,
    Id(TypeId),
}

impl Type {
    /// Name of the type as it would appear in WIT.
    pub fn name(&self) -> String {
        match self {
            Type::Bool => "bool".to_string(),
            Type::S8 => "s8".to_string(),
            Type::U8 => "u8".to_string(),
            Type::S16 => "s16".to_string(),
            Type::U16 => "u16".to_string(),
            Type::S32 => "s32".to_string(),
            Type::U32 => "u32".to_string(),
            Type::S64 => "s64".to_string(),
            Type::U64 => "u64".to_string(),
            Type::F32 => "f32".to_string(),
            Type::F64 => "f64".to_string(),
            Type::Char => "char".to_string(),
            Type::String => "string".to_string(),
            Type::Id(id) => format!("type{}", id),
        }
    }
}

/// A named record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// A variant case with an optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub types: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub cases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union {
    pub types: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultType {
    pub ok: Option<Type>,
    pub err: Option<Type>,
}

/// The shape of a type table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefKind {
    /// A named alias for another type.
    Type(Type),
    List(Type),
    Tuple(Tuple),
    Record(Record),
    Flags(Flags),
    Enum(Enum),
    Variant(Variant),
    Union(Union),
    Option(Type),
    Result(ResultType),
}

impl TypeDefKind {
    /// Build a record from `(name, type)` pairs.
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Type)>) -> Self {
        TypeDefKind::Record(Record {
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.into(),
                    ty,
                })
                .collect(),
        })
    }

    pub fn tuple(types: impl IntoIterator<Item = Type>) -> Self {
        TypeDefKind::Tuple(Tuple {
            types: types.into_iter().collect(),
        })
    }

    pub fn flags<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        TypeDefKind::Flags(Flags {
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn enumeration<N: Into<String>>(cases: impl IntoIterator<Item = N>) -> Self {
        TypeDefKind::Enum(Enum {
            cases: cases.into_iter().map(Into::into).collect(),
        })
    }

    /// Build a variant from `(case name, optional payload)` pairs.
    pub fn variant<N: Into<String>>(cases: impl IntoIterator<Item = (N, Option<Type>)>) -> Self {
        TypeDefKind::Variant(Variant {
            cases: cases
                .into_iter()
                .map(|(name, ty)| Case {
                    name: name.into(),
                    ty,
                })
                .collect(),
        })
    }

    pub fn union(types: impl IntoIterator<Item = Type>) -> Self {
        TypeDefKind::Union(Union {
            types: types.into_iter().collect(),
        })
    }

    pub fn result(ok: Option<Type>, err: Option<Type>) -> Self {
        TypeDefKind::Result(ResultType { ok, err })
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TypeDefKind::Type(_) => "alias",
            TypeDefKind::List(_) => "list",
            TypeDefKind::Tuple(_) => "tuple",
            TypeDefKind::Record(_) => "record",
            TypeDefKind::Flags(_) => "flags",
            TypeDefKind::Enum(_) => "enum",
            TypeDefKind::Variant(_) => "variant",
            TypeDefKind::Union(_) => "union",
            TypeDefKind::Option(_) => "option",
            TypeDefKind::Result(_) => "result",
        }
    }

    /// Every type directly referenced by this definition.
    fn children(&self) -> Vec<Type> {
        match self {
            TypeDefKind::Type(t) | TypeDefKind::List(t) | TypeDefKind::Option(t) => vec![*t],
            TypeDefKind::Tuple(t) => t.types.clone(),
            TypeDefKind::Union(u) => u.types.clone(),
            TypeDefKind::Record(r) => r.fields.iter().map(|f| f.ty).collect(),
            TypeDefKind::Variant(v) => v.cases.iter().filter_map(|c| c.ty).collect(),
            TypeDefKind::Result(r) => r.ok.iter().chain(r.err.iter()).copied().collect(),
            TypeDefKind::Flags(_) | TypeDefKind::Enum(_) => Vec::new(),
        }
    }
}

/// A type table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: Option<String>,
    pub kind: TypeDefKind,
}

/// A component-level function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub result: Option<Type>,
}

impl Function {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = (N, Type)>,
        result: Option<Type>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            result,
        }
    }

    /// Parameter types in declaration order.
    pub fn param_types(&self) -> impl Iterator<Item = &Type> {
        self.params.iter().map(|(_, ty)| ty)
    }
}

/// Errors raised while building a [`TypeTable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeTableError {
    #[error("Type {reference} referenced by {owner} is not defined before it")]
    DanglingReference { owner: String, reference: TypeId },

    #[error("{kind} must declare at least one case")]
    EmptyCases { kind: &'static str },

    #[error("Duplicate name '{name}' in {kind}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Type name '{0}' is already defined")]
    DuplicateTypeName(String),

    #[error("Function '{0}' is already defined")]
    DuplicateFunction(String),
}

/// Append-only registry of type definitions and function signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    functions: Vec<Function>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of type definitions.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Append an anonymous definition and return a reference to it.
    pub fn define(&mut self, kind: TypeDefKind) -> Result<Type, TypeTableError> {
        self.push(TypeDef { name: None, kind }).map(Type::Id)
    }

    /// Append a named definition and return a reference to it.
    pub fn define_named(
        &mut self,
        name: impl Into<String>,
        kind: TypeDefKind,
    ) -> Result<Type, TypeTableError> {
        self.push(TypeDef {
            name: Some(name.into()),
            kind,
        })
        .map(Type::Id)
    }

    /// Validate and append a definition.
    pub fn push(&mut self, def: TypeDef) -> Result<TypeId, TypeTableError> {
        if let Some(name) = &def.name {
            if self.find(name).is_some() {
                return Err(TypeTableError::DuplicateTypeName(name.clone()));
            }
        }
        let owner = def.name.clone().unwrap_or_else(|| def.kind.describe().to_string());
        for child in def.kind.children() {
            self.check_reference(&owner, child)?;
        }
        validate_kind(&def.kind)?;

        let id = TypeId(self.types.len() as u32);
        self.types.push(def);
        Ok(id)
    }

    /// Validate and append a function signature.
    pub fn push_function(&mut self, func: Function) -> Result<FuncId, TypeTableError> {
        if self.function_by_name(&func.name).is_some() {
            return Err(TypeTableError::DuplicateFunction(func.name));
        }
        check_unique("function parameters", func.params.iter().map(|(n, _)| n.as_str()))?;
        for ty in func.param_types().chain(func.result.iter()) {
            self.check_reference(&func.name, *ty)?;
        }
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(func);
        Ok(id)
    }

    fn check_reference(&self, owner: &str, ty: Type) -> Result<(), TypeTableError> {
        match ty {
            Type::Id(id) if id.index() >= self.types.len() => {
                Err(TypeTableError::DanglingReference {
                    owner: owner.to_string(),
                    reference: id,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.index())
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }

    /// Find a named type definition.
    pub fn find(&self, name: &str) -> Option<Type> {
        self.types
            .iter()
            .position(|t| t.name.as_deref() == Some(name))
            .map(|i| Type::Id(TypeId(i as u32)))
    }

    /// Iterate over all definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, def)| (TypeId(i as u32), def))
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    /// Follow aliases until a primitive or a non-alias definition is reached.
    pub fn resolve_alias(&self, mut ty: Type) -> Type {
        while let Type::Id(id) = ty {
            match self.get(id).map(|def| &def.kind) {
                Some(TypeDefKind::Type(inner)) => ty = *inner,
                _ => break,
            }
        }
        ty
    }
}

fn validate_kind(kind: &TypeDefKind) -> Result<(), TypeTableError> {
    match kind {
        TypeDefKind::Record(r) => {
            check_unique("record", r.fields.iter().map(|f| f.name.as_str()))
        }
        TypeDefKind::Flags(f) => check_unique("flags", f.names.iter().map(String::as_str)),
        TypeDefKind::Enum(e) => {
            if e.cases.is_empty() {
                return Err(TypeTableError::EmptyCases { kind: "enum" });
            }
            check_unique("enum", e.cases.iter().map(String::as_str))
        }
        TypeDefKind::Variant(v) => {
            if v.cases.is_empty() {
                return Err(TypeTableError::EmptyCases { kind: "variant" });
            }
            check_unique("variant", v.cases.iter().map(|c| c.name.as_str()))
        }
        TypeDefKind::Union(u) if u.types.is_empty() => {
            Err(TypeTableError::EmptyCases { kind: "union" })
        }
        _ => Ok(()),
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), TypeTableError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(TypeTableError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
