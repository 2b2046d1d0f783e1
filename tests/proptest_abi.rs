//! Property-based tests for canonical ABI roundtrip correctness.
//!
//! These tests verify that lift(lower(x)) == x for random inputs, both
//! through a memory image and through flat values.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use wit_canon::{CanonicalAbi, FlatValues, LinearMemory, Type, TypeDefKind, TypeTable, Value};

/// Lower `value` into memory and flat form and lift both back.
fn roundtrip(table: &TypeTable, value: &Value, ty: &Type) -> Result<(Value, Value), anyhow::Error> {
    let abi = CanonicalAbi::new(table);

    let encoded = abi.encode(value, ty)?;
    let from_memory = abi.decode(&encoded, ty)?;

    let mut memory = LinearMemory::new();
    let flat = abi.lower_flat(value, ty, &mut memory)?;
    anyhow::ensure!(flat.len() == abi.flatten(ty).len(), "flat length");
    let mut cursor = FlatValues::new(&flat);
    let from_flat = abi.lift_flat(ty, &memory, &mut cursor)?;
    anyhow::ensure!(cursor.remaining() == 0, "unconsumed flat values");

    Ok((from_memory, from_flat))
}

fn point_table() -> Result<(TypeTable, Type), anyhow::Error> {
    let mut table = TypeTable::new();
    let point = table.define_named(
        "point",
        TypeDefKind::record([("x", Type::U32), ("y", Type::S64), ("tag", Type::Char)]),
    )?;
    Ok((table, point))
}

fn message_table() -> Result<(TypeTable, Type), anyhow::Error> {
    let mut table = TypeTable::new();
    let tags = table.define(TypeDefKind::List(Type::String))?;
    let payload = table.define(TypeDefKind::variant([
        ("text", Some(Type::String)),
        ("number", Some(Type::F64)),
        ("small", Some(Type::U8)),
        ("empty", None),
    ]))?;
    let message = table.define_named(
        "message",
        TypeDefKind::record([("tags", tags), ("payload", payload)]),
    )?;
    Ok((table, message))
}

fn payload_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        ".{0,16}".prop_map(|s| Value::variant("text", Some(Value::String(s)))),
        any::<f64>()
            .prop_filter("NaN is canonicalized", |f| !f.is_nan())
            .prop_map(|f| Value::variant("number", Some(Value::F64(f)))),
        any::<u8>().prop_map(|n| Value::variant("small", Some(Value::U8(n)))),
        Just(Value::variant("empty", None)),
    ]
}

fn union_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f32>()
            .prop_filter("NaN is canonicalized", |f| !f.is_nan())
            .prop_map(|f| Value::Union(0, Box::new(Value::F32(f)))),
        any::<u64>().prop_map(|n| Value::Union(1, Box::new(Value::U64(n)))),
        ".{0,16}".prop_map(|s| Value::Union(2, Box::new(Value::String(s)))),
    ]
}

fn outcome_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u32>().prop_map(|n| Value::ok(Some(Value::U32(n)))),
        "[a-z ]{0,12}".prop_map(|s| Value::err(Some(Value::String(s)))),
    ]
}

proptest! {
    #[test]
    fn roundtrip_u8(val in any::<u8>()) {
        let table = TypeTable::new();
        let (a, b) = roundtrip(&table, &Value::U8(val), &Type::U8).unwrap();
        prop_assert_eq!(&a, &Value::U8(val));
        prop_assert_eq!(&b, &Value::U8(val));
    }

    #[test]
    fn roundtrip_s16(val in any::<i16>()) {
        let table = TypeTable::new();
        let (a, b) = roundtrip(&table, &Value::S16(val), &Type::S16).unwrap();
        prop_assert_eq!(&a, &Value::S16(val));
        prop_assert_eq!(&b, &Value::S16(val));
    }

    #[test]
    fn roundtrip_u64(val in any::<u64>()) {
        let table = TypeTable::new();
        let (a, b) = roundtrip(&table, &Value::U64(val), &Type::U64).unwrap();
        prop_assert_eq!(&a, &Value::U64(val));
        prop_assert_eq!(&b, &Value::U64(val));
    }

    #[test]
    fn roundtrip_f32(val in any::<f32>().prop_filter("NaN is canonicalized", |f| !f.is_nan())) {
        let table = TypeTable::new();
        let (a, b) = roundtrip(&table, &Value::F32(val), &Type::F32).unwrap();
        prop_assert_eq!(&a, &Value::F32(val));
        prop_assert_eq!(&b, &Value::F32(val));
    }

    #[test]
    fn roundtrip_string(val in ".{0,64}") {
        let table = TypeTable::new();
        let value = Value::String(val);
        let (a, b) = roundtrip(&table, &value, &Type::String).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_point(x in any::<u32>(), y in any::<i64>(), tag in any::<char>()) {
        let (table, point) = point_table().unwrap();
        let value = Value::record([
            ("x", Value::U32(x)),
            ("y", Value::S64(y)),
            ("tag", Value::Char(tag)),
        ]);
        let (a, b) = roundtrip(&table, &value, &point).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_message(
        tags in prop::collection::vec("[a-z]{0,8}", 0..6),
        payload in payload_strategy(),
    ) {
        let (table, message) = message_table().unwrap();
        let value = Value::record([
            ("tags", Value::List(tags.into_iter().map(Value::String).collect())),
            ("payload", payload),
        ]);
        let (a, b) = roundtrip(&table, &value, &message).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_flags(bits in prop::collection::vec(any::<bool>(), 40)) {
        let mut table = TypeTable::new();
        let names: Vec<String> = (0..40).map(|i| format!("f{}", i)).collect();
        let flags = table.define(TypeDefKind::flags(names.clone())).unwrap();
        let set: Vec<String> = names
            .into_iter()
            .zip(bits)
            .filter_map(|(name, on)| on.then_some(name))
            .collect();
        let value = Value::flags(set);
        let (a, b) = roundtrip(&table, &value, &flags).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn field_offsets_are_aligned(sizes in prop::collection::vec(0usize..6, 1..8)) {
        let prims = [Type::U8, Type::U16, Type::U32, Type::U64, Type::String, Type::Bool];
        let types: Vec<Type> = sizes.iter().filter_map(|i| prims.get(*i).copied()).collect();
        let mut table = TypeTable::new();
        let tuple = table.define(TypeDefKind::tuple(types.clone())).unwrap();
        let abi = CanonicalAbi::new(&table);
        let offsets = abi.field_offsets(&tuple).unwrap();
        let layout = abi.layout(&tuple);
        prop_assert_eq!(layout.size % layout.align, 0);
        for (ty, offset) in types.iter().zip(offsets) {
            prop_assert_eq!(offset % abi.layout(ty).align, 0);
        }
    }

    #[test]
    fn roundtrip_union(value in union_strategy()) {
        let mut table = TypeTable::new();
        let union = table
            .define(TypeDefKind::union([Type::F32, Type::U64, Type::String]))
            .unwrap();
        let (a, b) = roundtrip(&table, &value, &union).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_enum(index in 0usize..5) {
        let names = ["north", "east", "south", "west", "up"];
        let mut table = TypeTable::new();
        let direction = table.define(TypeDefKind::enumeration(names)).unwrap();
        let value = Value::Enum(names.get(index).copied().unwrap_or("north").to_string());
        let (a, b) = roundtrip(&table, &value, &direction).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_tuple(
        flag in any::<bool>(),
        small in any::<i8>(),
        wide in any::<i64>(),
        ratio in any::<f64>().prop_filter("NaN is canonicalized", |f| !f.is_nan()),
        name in ".{0,16}",
    ) {
        let mut table = TypeTable::new();
        let tuple = table
            .define(TypeDefKind::tuple([Type::Bool, Type::S8, Type::S64, Type::F64, Type::String]))
            .unwrap();
        let value = Value::Tuple(vec![
            Value::Bool(flag),
            Value::S8(small),
            Value::S64(wide),
            Value::F64(ratio),
            Value::String(name),
        ]);
        let (a, b) = roundtrip(&table, &value, &tuple).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }

    #[test]
    fn roundtrip_result(value in outcome_strategy()) {
        let mut table = TypeTable::new();
        let outcome = table
            .define(TypeDefKind::result(Some(Type::U32), Some(Type::String)))
            .unwrap();
        let (a, b) = roundtrip(&table, &value, &outcome).unwrap();
        prop_assert_eq!(&a, &value);
        prop_assert_eq!(&b, &value);
    }
}
