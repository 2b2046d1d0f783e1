//! Building a [`TypeTable`] from WIT sources.
//!
//! WIT definitions are parsed with `wit_parser` and their value types are
//! copied into a table in dependency order. Resources, handles, futures,
//! streams and other types without a plain value encoding are rejected.
//!
//! # Example
//!
//! ```
//! use wit_canon::wit::load_wit_type;
//!
//! let wit = r#"
//!     package test:types;
//!     interface types {
//!         record point { x: u32, y: u32 }
//!     }
//! "#;
//! let (table, point) = load_wit_type(wit, Some("point"))?;
//! assert_eq!(table.find("point"), Some(point));
//! # Ok::<(), wit_canon::Error>(())
//! ```

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use wit_parser::Resolve;

use crate::logging::{debug, warn};
use crate::types::{Type, TypeDef, TypeDefKind, TypeTable, TypeTableError};

/// Errors raised while importing WIT types.
#[derive(Error, Debug)]
pub enum WitError {
    #[error("WIT parsing error: {0}")]
    Parse(#[from] anyhow::Error),

    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("No named types found in WIT definition")]
    NoTypes,

    #[error("WIT type '{0}' has no canonical value encoding")]
    Unsupported(String),

    #[error(transparent)]
    Table(#[from] TypeTableError),
}

/// Copies types out of a [`Resolve`] into a [`TypeTable`].
pub struct WitImporter<'r> {
    resolve: &'r Resolve,
    table: TypeTable,
    imported: HashMap<wit_parser::TypeId, Type>,
}

impl<'r> WitImporter<'r> {
    pub fn new(resolve: &'r Resolve) -> Self {
        Self {
            resolve,
            table: TypeTable::new(),
            imported: HashMap::new(),
        }
    }

    /// Import a WIT type, together with everything it refers to.
    pub fn import(&mut self, ty: &wit_parser::Type) -> Result<Type, WitError> {
        Ok(match ty {
            wit_parser::Type::Bool => Type::Bool,
            wit_parser::Type::U8 => Type::U8,
            wit_parser::Type::U16 => Type::U16,
            wit_parser::Type::U32 => Type::U32,
            wit_parser::Type::U64 => Type::U64,
            wit_parser::Type::S8 => Type::S8,
            wit_parser::Type::S16 => Type::S16,
            wit_parser::Type::S32 => Type::S32,
            wit_parser::Type::S64 => Type::S64,
            wit_parser::Type::F32 => Type::F32,
            wit_parser::Type::F64 => Type::F64,
            wit_parser::Type::Char => Type::Char,
            wit_parser::Type::String => Type::String,
            wit_parser::Type::Id(id) => self.import_id(*id)?,
            wit_parser::Type::ErrorContext => {
                return Err(WitError::Unsupported("error-context".to_string()));
            }
        })
    }

    /// Import a WIT type definition by id.
    pub fn import_id(&mut self, id: wit_parser::TypeId) -> Result<Type, WitError> {
        if let Some(ty) = self.imported.get(&id) {
            return Ok(*ty);
        }
        let resolve = self.resolve;
        let def = resolve
            .types
            .get(id)
            .ok_or_else(|| WitError::TypeNotFound(format!("{:?}", id)))?;
        let label = def.name.clone().unwrap_or_else(|| def.kind.as_str().to_string());

        let kind = match &def.kind {
            wit_parser::TypeDefKind::Type(t) => TypeDefKind::Type(self.import(t)?),
            wit_parser::TypeDefKind::List(t) => TypeDefKind::List(self.import(t)?),
            wit_parser::TypeDefKind::Option(t) => TypeDefKind::Option(self.import(t)?),
            wit_parser::TypeDefKind::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields.len());
                for field in &r.fields {
                    fields.push((field.name.clone(), self.import(&field.ty)?));
                }
                TypeDefKind::record(fields)
            }
            wit_parser::TypeDefKind::Tuple(t) => {
                let types = t
                    .types
                    .iter()
                    .map(|t| self.import(t))
                    .collect::<Result<Vec<_>, _>>()?;
                TypeDefKind::tuple(types)
            }
            wit_parser::TypeDefKind::Flags(f) => {
                TypeDefKind::flags(f.flags.iter().map(|flag| flag.name.clone()))
            }
            wit_parser::TypeDefKind::Enum(e) => {
                TypeDefKind::enumeration(e.cases.iter().map(|c| c.name.clone()))
            }
            wit_parser::TypeDefKind::Variant(v) => {
                let mut cases = Vec::with_capacity(v.cases.len());
                for case in &v.cases {
                    let payload = case.ty.as_ref().map(|t| self.import(t)).transpose()?;
                    cases.push((case.name.clone(), payload));
                }
                TypeDefKind::variant(cases)
            }
            wit_parser::TypeDefKind::Result(r) => {
                let ok = r.ok.as_ref().map(|t| self.import(t)).transpose()?;
                let err = r.err.as_ref().map(|t| self.import(t)).transpose()?;
                TypeDefKind::result(ok, err)
            }
            other => return Err(WitError::Unsupported(format!("{} ({})", label, other.as_str()))),
        };

        // Names are unique in the table; a clash across interfaces leaves the
        // later definition anonymous.
        let name = match &def.name {
            Some(name) if self.table.find(name).is_some() => {
                warn!(wit_type = %name, "duplicate WIT type name, importing anonymously");
                None
            }
            other => other.clone(),
        };
        let ty = Type::Id(self.table.push(TypeDef { name, kind })?);
        debug!(wit_type = %label, id = ?ty, "imported WIT type");
        self.imported.insert(id, ty);
        Ok(ty)
    }

    /// Import every named type, skipping those without a value encoding.
    pub fn import_all(&mut self) -> Result<usize, WitError> {
        let resolve = self.resolve;
        let mut count = 0;
        for (id, def) in resolve.types.iter() {
            if def.name.is_none() {
                continue;
            }
            match self.import_id(id) {
                Ok(_) => count += 1,
                Err(WitError::Unsupported(_reason)) => {
                    debug!(reason = %_reason, "skipping WIT type");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// The imported type for a WIT type id, if it was imported.
    pub fn get(&self, id: wit_parser::TypeId) -> Option<Type> {
        self.imported.get(&id).copied()
    }

    pub fn finish(self) -> TypeTable {
        self.table
    }
}

/// Find a named type in a resolve.
pub fn find_type_by_name(resolve: &Resolve, name: &str) -> Option<wit_parser::TypeId> {
    resolve
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some(name))
        .map(|(id, _)| id)
}

/// Find the first named type in a resolve.
pub fn find_first_named_type(resolve: &Resolve) -> Option<wit_parser::TypeId> {
    resolve
        .types
        .iter()
        .find(|(_, ty)| ty.name.is_some())
        .map(|(id, _)| id)
}

/// Parse a WIT definition and import every named value type.
pub fn load_wit(wit_definition: &str) -> Result<TypeTable, WitError> {
    let mut resolve = Resolve::new();
    resolve.push_str("input.wit", wit_definition)?;
    let mut importer = WitImporter::new(&resolve);
    importer.import_all()?;
    Ok(importer.finish())
}

/// Parse a WIT definition and import one type.
///
/// If `type_name` is `None`, the first named type is used.
pub fn load_wit_type(
    wit_definition: &str,
    type_name: Option<&str>,
) -> Result<(TypeTable, Type), WitError> {
    let mut resolve = Resolve::new();
    resolve.push_str("input.wit", wit_definition)?;
    import_selected(&resolve, type_name)
}

/// Load a WIT file or package directory and import one type.
pub fn load_wit_path(
    path: impl AsRef<Path>,
    type_name: Option<&str>,
) -> Result<(TypeTable, Type), WitError> {
    let mut resolve = Resolve::new();
    resolve.push_path(path.as_ref())?;
    import_selected(&resolve, type_name)
}

fn import_selected(resolve: &Resolve, type_name: Option<&str>) -> Result<(TypeTable, Type), WitError> {
    let id = match type_name {
        Some(name) => find_type_by_name(resolve, name)
            .ok_or_else(|| WitError::TypeNotFound(name.to_string()))?,
        None => find_first_named_type(resolve).ok_or(WitError::NoTypes)?,
    };

    let mut importer = WitImporter::new(resolve);
    let ty = importer.import_id(id)?;
    Ok((importer.finish(), ty))
}
