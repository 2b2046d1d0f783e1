//! Size, alignment and flattening of component-level types.
//!
//! Every table entry is measured once when the engine is built. Because type
//! references always point backwards, a single forward pass over the table
//! sees every child before its parent, so the memo never has holes.

use crate::types::{Type, TypeDefKind, TypeId, TypeTable};

use super::buffer::align_to;
use super::flat::{FlatType, join_into};

/// Smallest discriminant, in bytes, of any variant-like type, including
/// single-case variants.
pub const MIN_DISCRIMINANT_SIZE: u32 = 1;

/// Byte size and alignment of a type in linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub size: u32,
    pub align: u32,
}

impl Layout {
    pub const fn new(size: u32, align: u32) -> Self {
        Self { size, align }
    }
}

/// Packed representation of a flags type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsRepr {
    /// No flags: zero-sized.
    Empty,
    U8,
    U16,
    /// One or more 32-bit words.
    U32(u32),
}

impl FlagsRepr {
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => FlagsRepr::Empty,
            n if n <= 8 => FlagsRepr::U8,
            n if n <= 16 => FlagsRepr::U16,
            n => FlagsRepr::U32(n.div_ceil(32) as u32),
        }
    }

    pub fn layout(self) -> Layout {
        match self {
            FlagsRepr::Empty => Layout::new(0, 1),
            FlagsRepr::U8 => Layout::new(1, 1),
            FlagsRepr::U16 => Layout::new(2, 2),
            FlagsRepr::U32(n) => Layout::new(4 * n, 4),
        }
    }

    /// Number of i32 slots when flattened.
    pub fn words(self) -> usize {
        match self {
            FlagsRepr::Empty => 0,
            FlagsRepr::U8 | FlagsRepr::U16 => 1,
            FlagsRepr::U32(n) => n as usize,
        }
    }
}

/// Byte size of the discriminant for a variant-like type with `cases` cases.
pub fn discriminant_size(cases: usize) -> u32 {
    let size = match cases {
        0..=256 => 1,
        257..=65536 => 2,
        _ => 4,
    };
    size.max(MIN_DISCRIMINANT_SIZE)
}

/// Placement details that depend on the kind of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Primitive, list or string: nothing beyond the layout.
    Scalar,
    /// Record or tuple: byte offset of each field.
    Fields(Vec<u32>),
    Flags(FlagsRepr),
    /// Variant-like: discriminant width and shared payload offset.
    Variant {
        discriminant_size: u32,
        payload_offset: u32,
    },
}

/// Memoized layout information for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub layout: Layout,
    pub placement: Placement,
    pub flat: Vec<FlatType>,
}

/// Layout memo for every entry of a [`TypeTable`].
#[derive(Debug, Clone, Default)]
pub struct Layouts {
    infos: Vec<TypeInfo>,
}

const SCALAR_I32: &[FlatType] = &[FlatType::I32];
const SCALAR_I64: &[FlatType] = &[FlatType::I64];
const SCALAR_F32: &[FlatType] = &[FlatType::F32];
const SCALAR_F64: &[FlatType] = &[FlatType::F64];
const POINTER_PAIR: &[FlatType] = &[FlatType::I32, FlatType::I32];

impl Layouts {
    /// Measure every entry of `table`.
    pub fn new(table: &TypeTable) -> Self {
        let mut layouts = Self {
            infos: Vec::with_capacity(table.len()),
        };
        for (_, def) in table.iter() {
            let info = layouts.measure(&def.kind);
            layouts.infos.push(info);
        }
        layouts
    }

    pub fn info(&self, id: TypeId) -> Option<&TypeInfo> {
        self.infos.get(id.index())
    }

    /// Size and alignment of `ty`.
    pub fn layout(&self, ty: &Type) -> Layout {
        match ty {
            Type::Bool | Type::S8 | Type::U8 => Layout::new(1, 1),
            Type::S16 | Type::U16 => Layout::new(2, 2),
            Type::S32 | Type::U32 | Type::F32 | Type::Char => Layout::new(4, 4),
            Type::S64 | Type::U64 | Type::F64 => Layout::new(8, 8),
            Type::String => Layout::new(8, 4),
            Type::Id(id) => self
                .info(*id)
                .map(|info| info.layout)
                .unwrap_or(Layout::new(0, 1)),
        }
    }

    pub fn size(&self, ty: &Type) -> u32 {
        self.layout(ty).size
    }

    pub fn align(&self, ty: &Type) -> u32 {
        self.layout(ty).align
    }

    /// Flattened core types of `ty`.
    pub fn flat(&self, ty: &Type) -> &[FlatType] {
        match ty {
            Type::Bool
            | Type::S8
            | Type::U8
            | Type::S16
            | Type::U16
            | Type::S32
            | Type::U32
            | Type::Char => SCALAR_I32,
            Type::S64 | Type::U64 => SCALAR_I64,
            Type::F32 => SCALAR_F32,
            Type::F64 => SCALAR_F64,
            Type::String => POINTER_PAIR,
            Type::Id(id) => self.info(*id).map(|info| info.flat.as_slice()).unwrap_or(&[]),
        }
    }

    /// Flattened core types of a sequence of types, concatenated.
    pub fn flat_all<'a>(&self, types: impl IntoIterator<Item = &'a Type>) -> Vec<FlatType> {
        types
            .into_iter()
            .flat_map(|ty| self.flat(ty).iter().copied())
            .collect()
    }

    /// Offsets of a sequence of fields laid out like a record.
    pub fn field_offsets<'a>(&self, types: impl IntoIterator<Item = &'a Type>) -> Vec<u32> {
        self.record_layout(types).1
    }

    /// Layout of a sequence of fields laid out like a record, plus offsets.
    pub fn record_layout<'a>(
        &self,
        types: impl IntoIterator<Item = &'a Type>,
    ) -> (Layout, Vec<u32>) {
        let mut offsets = Vec::new();
        let mut size = 0;
        let mut align = 1;
        for ty in types {
            let field = self.layout(ty);
            size = align_to(size, field.align);
            offsets.push(size);
            size += field.size;
            align = align.max(field.align);
        }
        (Layout::new(align_to(size, align), align), offsets)
    }

    fn measure(&self, kind: &TypeDefKind) -> TypeInfo {
        match kind {
            TypeDefKind::Type(t) => match t {
                Type::Id(id) => self.info(*id).cloned().unwrap_or_else(|| TypeInfo {
                    layout: Layout::new(0, 1),
                    placement: Placement::Scalar,
                    flat: Vec::new(),
                }),
                _ => TypeInfo {
                    layout: self.layout(t),
                    placement: Placement::Scalar,
                    flat: self.flat(t).to_vec(),
                },
            },
            TypeDefKind::List(_) => TypeInfo {
                layout: Layout::new(8, 4),
                placement: Placement::Scalar,
                flat: POINTER_PAIR.to_vec(),
            },
            TypeDefKind::Record(r) => self.measure_fields(r.fields.iter().map(|f| &f.ty)),
            TypeDefKind::Tuple(t) => self.measure_fields(t.types.iter()),
            TypeDefKind::Flags(f) => {
                let repr = FlagsRepr::for_count(f.names.len());
                TypeInfo {
                    layout: repr.layout(),
                    placement: Placement::Flags(repr),
                    flat: vec![FlatType::I32; repr.words()],
                }
            }
            TypeDefKind::Enum(e) => self.measure_variant(e.cases.iter().map(|_| None)),
            TypeDefKind::Variant(v) => self.measure_variant(v.cases.iter().map(|c| c.ty.as_ref())),
            TypeDefKind::Union(u) => self.measure_variant(u.types.iter().map(Some)),
            TypeDefKind::Option(t) => self.measure_variant([None, Some(t)]),
            TypeDefKind::Result(r) => self.measure_variant([r.ok.as_ref(), r.err.as_ref()]),
        }
    }

    fn measure_fields<'a>(&self, types: impl Iterator<Item = &'a Type> + Clone) -> TypeInfo {
        let (layout, offsets) = self.record_layout(types.clone());
        TypeInfo {
            layout,
            placement: Placement::Fields(offsets),
            flat: self.flat_all(types),
        }
    }

    fn measure_variant<'a>(
        &self,
        cases: impl IntoIterator<Item = Option<&'a Type>>,
    ) -> TypeInfo {
        let mut count = 0;
        let mut payload_size = 0;
        let mut payload_align = 1;
        let mut payload_flat = Vec::new();
        for case in cases {
            count += 1;
            if let Some(ty) = case {
                let layout = self.layout(ty);
                payload_size = payload_size.max(layout.size);
                payload_align = payload_align.max(layout.align);
                join_into(&mut payload_flat, self.flat(ty));
            }
        }

        let discriminant_size = discriminant_size(count);
        let payload_offset = align_to(discriminant_size, payload_align);
        let align = discriminant_size.max(payload_align);
        let size = align_to(payload_offset + payload_size, align);

        let mut flat = Vec::with_capacity(payload_flat.len() + 1);
        flat.push(FlatType::I32);
        flat.extend(payload_flat);

        TypeInfo {
            layout: Layout::new(size, align),
            placement: Placement::Variant {
                discriminant_size,
                payload_offset,
            },
            flat,
        }
    }
}
