//! Call adapter tests running both halves of the convention against each other.
//!
//! `CanonicalAbi::call` plays the caller and lowers component values to core
//! arguments; the callee forwards those core arguments to
//! `CanonicalAbi::call_host`, which lifts them again and runs a host closure.
//! Whatever the host returns must arrive unchanged at the caller.

use wit_canon::{
    CanonicalAbi, CanonicalAbiError, CanonicalOptions, Convention, FuncId, Function, LinearMemory,
    Type, TypeDefKind, TypeTable, Value,
};

/// Call `func` through the core convention and serve it with `host`.
fn call_through<H>(
    abi: &CanonicalAbi<'_>,
    func: FuncId,
    args: &[Value],
    host: H,
) -> Result<Option<Value>, CanonicalAbiError>
where
    H: FnOnce(Vec<Value>) -> Result<Option<Value>, CanonicalAbiError>,
{
    let mut memory = LinearMemory::new();
    abi.call(func, args, &mut memory, |mem, core_args| {
        abi.call_host(func, core_args, mem, host)
    })
}

#[test]
fn test_flat_add() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let add = table.push_function(Function::new(
        "add",
        [("a", Type::S32), ("b", Type::S32)],
        Some(Type::S32),
    ))?;
    let abi = CanonicalAbi::new(&table);

    let result = call_through(&abi, add, &[Value::S32(-5), Value::S32(12)], |args| {
        match args.as_slice() {
            [Value::S32(a), Value::S32(b)] => Ok(Some(Value::S32(a + b))),
            _ => Err(CanonicalAbiError::TypeMismatch {
                expected: "two s32".to_string(),
                got: format!("{:?}", args),
            }),
        }
    })?;
    assert_eq!(result, Some(Value::S32(7)));
    Ok(())
}

#[test]
fn test_string_concat_through_out_pointer() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let concat = table.push_function(Function::new(
        "concat",
        [("a", Type::String), ("b", Type::String)],
        Some(Type::String),
    ))?;
    let abi = CanonicalAbi::new(&table);
    assert_eq!(
        abi.signature(concat).map(|s| s.convention()),
        Some(Convention::ResultInMemory)
    );

    let args = [
        Value::String("canon".to_string()),
        Value::String("ical".to_string()),
    ];
    let result = call_through(&abi, concat, &args, |args| {
        let joined: String = args
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        Ok(Some(Value::String(joined)))
    })?;
    assert_eq!(result, Some(Value::String("canonical".to_string())));
    Ok(())
}

#[test]
fn test_many_params_through_memory() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let params: Vec<_> = (0..20).map(|i| (format!("p{}", i), Type::U64)).collect();
    let sum = table.push_function(Function::new("sum", params, Some(Type::U64)))?;
    let abi = CanonicalAbi::new(&table);
    assert_eq!(
        abi.signature(sum).map(|s| s.convention()),
        Some(Convention::ParamsInMemory)
    );

    let args: Vec<Value> = (0..20u64).map(|i| Value::U64(i * 1_000_000_000)).collect();
    let result = call_through(&abi, sum, &args, |args| {
        let total = args
            .iter()
            .map(|v| match v {
                Value::U64(n) => *n,
                _ => 0,
            })
            .sum();
        Ok(Some(Value::U64(total)))
    })?;
    assert_eq!(result, Some(Value::U64(190_000_000_000)));
    Ok(())
}

#[test]
fn test_structured_values_both_in_memory() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let entry = table.define_named(
        "entry",
        TypeDefKind::record([("key", Type::String), ("hits", Type::U32)]),
    )?;
    let entries = table.define(TypeDefKind::List(entry))?;
    let outcome = table.define(TypeDefKind::result(Some(entries), Some(Type::String)))?;
    let params: Vec<_> = (0..9).map(|i| (format!("e{}", i), entry)).collect();
    let merge = table.push_function(Function::new("merge", params, Some(outcome)))?;
    let abi = CanonicalAbi::new(&table);
    assert_eq!(
        abi.signature(merge).map(|s| s.convention()),
        Some(Convention::BothInMemory)
    );

    let args: Vec<Value> = (0..9u32)
        .map(|i| {
            Value::record([
                ("key", Value::String(format!("k{}", i))),
                ("hits", Value::U32(i)),
            ])
        })
        .collect();
    let expected = args.clone();
    let result = call_through(&abi, merge, &args, |args| {
        Ok(Some(Value::ok(Some(Value::List(args)))))
    })?;
    assert_eq!(result, Some(Value::ok(Some(Value::List(expected)))));
    Ok(())
}

#[test]
fn test_no_result() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let log = table.push_function(Function::new("log", [("msg", Type::String)], None))?;
    let abi = CanonicalAbi::new(&table);

    let mut seen = Vec::new();
    let result = call_through(&abi, log, &[Value::String("hello".to_string())], |args| {
        seen = args;
        Ok(None)
    })?;
    assert_eq!(result, None);
    assert_eq!(seen, vec![Value::String("hello".to_string())]);
    Ok(())
}

#[test]
fn test_host_result_must_match_type() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let get = table.push_function(Function::new("get", Vec::<(String, Type)>::new(), Some(Type::U32)))?;
    let abi = CanonicalAbi::new(&table);

    let result = call_through(&abi, get, &[], |_| Ok(None));
    assert!(matches!(result, Err(CanonicalAbiError::TypeMismatch { .. })));

    let result = call_through(&abi, get, &[], |_| Ok(Some(Value::String("x".to_string()))));
    assert!(matches!(result, Err(CanonicalAbiError::TypeMismatch { .. })));
    Ok(())
}

#[test]
fn test_custom_flat_limits() -> Result<(), anyhow::Error> {
    let mut table = TypeTable::new();
    let params: Vec<_> = (0..4).map(|i| (format!("p{}", i), Type::U8)).collect();
    let f = table.push_function(Function::new("f", params, Some(Type::U8)))?;
    let options = CanonicalOptions {
        max_flat_params: 2,
        ..CanonicalOptions::default()
    };
    let abi = CanonicalAbi::with_options(&table, options);
    assert_eq!(
        abi.signature(f).map(|s| s.convention()),
        Some(Convention::ParamsInMemory)
    );

    let args: Vec<Value> = (1..=4).map(Value::U8).collect();
    let result = call_through(&abi, f, &args, |args| {
        Ok(args.into_iter().max_by_key(|v| match v {
            Value::U8(n) => *n,
            _ => 0,
        }))
    })?;
    assert_eq!(result, Some(Value::U8(4)));
    Ok(())
}
