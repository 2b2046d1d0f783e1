//! A core WebAssembly instance driven through the canonical calling convention.

use std::path::Path;

use wasmtime::{Engine, Func, Instance, Module, Store, TypedFunc, Val, ValType};

use crate::abi::{CanonicalAbi, CanonicalAbiError, FlatType, FlatValue, Memory, PAGE_SIZE, Realloc};
use crate::logging::{debug, error, info, trace};
use crate::value::Value;

use super::error::WasmError;

/// Name of the exported linear memory.
const MEMORY_EXPORT: &str = "memory";

/// Name of the exported allocator.
const REALLOC_EXPORT: &str = "cabi_realloc";

/// An instantiated core module exposing `memory` and, optionally, `cabi_realloc`.
///
/// The instance implements [`Memory`] over its exported memory and
/// [`Realloc`] over its exported allocator, so it can be handed directly to
/// the lowering and lifting operations of [`CanonicalAbi`].
///
/// # Example
///
/// ```no_run
/// use wit_canon::wasm::CoreInstance;
/// use wit_canon::{CanonicalAbi, Function, Type, TypeTable, Value};
///
/// let mut table = TypeTable::new();
/// table.push_function(Function::new("add", [("a", Type::U32), ("b", Type::U32)], Some(Type::U32)))?;
/// let abi = CanonicalAbi::new(&table);
///
/// let mut instance = CoreInstance::from_file("add.wasm")?;
/// let sum = instance.call(&abi, "add", &[Value::U32(1), Value::U32(2)])?;
/// assert_eq!(sum, Some(Value::U32(3)));
/// # Ok::<(), wit_canon::Error>(())
/// ```
pub struct CoreInstance {
    store: Store<()>,
    instance: Instance,
    memory: wasmtime::Memory,
    realloc: Option<TypedFunc<(i32, i32, i32, i32), i32>>,
}

impl CoreInstance {
    /// Compile and instantiate a module from binary or WAT text.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, WasmError> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)?;
        let mut store = Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[])?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| WasmError::ExportNotFound(MEMORY_EXPORT.to_string()))?;
        let realloc = match instance.get_func(&mut store, REALLOC_EXPORT) {
            Some(func) => Some(func.typed::<(i32, i32, i32, i32), i32>(&store).map_err(|_| {
                WasmError::InvalidSignature {
                    name: REALLOC_EXPORT.to_string(),
                    expected: "(i32, i32, i32, i32) -> (i32)".to_string(),
                    actual: describe(&func, &store),
                }
            })?),
            None => None,
        };

        info!(
            memory_size = memory.data_size(&store),
            has_realloc = realloc.is_some(),
            "instantiated core module"
        );
        Ok(Self {
            store,
            instance,
            memory,
            realloc,
        })
    }

    /// Load a module from a `.wasm` or `.wat` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WasmError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::new(bytes)
    }

    pub fn has_realloc(&self) -> bool {
        self.realloc.is_some()
    }

    /// The current contents of the exported memory.
    pub fn memory_bytes(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn get_func(&mut self, name: &str) -> Result<Func, WasmError> {
        self.instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| WasmError::ExportNotFound(name.to_string()))
    }

    /// Call an export with flat core values.
    ///
    /// The export's core signature must match the types of `args`; the
    /// results are returned in order.
    pub fn invoke(&mut self, name: &str, args: &[FlatValue]) -> Result<Vec<FlatValue>, WasmError> {
        let func = self.get_func(name)?;
        let ty = func.ty(&self.store);

        let expected: Vec<FlatType> = args.iter().map(FlatValue::ty).collect();
        let params: Option<Vec<FlatType>> = ty.params().map(|t| flat_type(&t)).collect();
        let results: Option<Vec<FlatType>> = ty.results().map(|t| flat_type(&t)).collect();
        let results = match (params, results) {
            (Some(params), Some(results)) if params == expected => results,
            _ => {
                return Err(WasmError::InvalidSignature {
                    name: name.to_string(),
                    expected: format!("({}) -> (..)", join(&expected)),
                    actual: describe(&func, &self.store),
                });
            }
        };

        let params: Vec<Val> = args.iter().map(to_val).collect();
        let mut out: Vec<Val> = results.iter().map(|t| to_val(&t.zero())).collect();
        trace!(function = %name, args = params.len(), "invoking core export");
        func.call(&mut self.store, &params, &mut out).map_err(|e| {
            error!(function = %name, error = %e, "core export trapped");
            WasmError::Trap(e.to_string())
        })?;

        out.iter()
            .map(|val| from_val(val).ok_or_else(|| WasmError::Trap(format!("unexpected result value {:?}", val))))
            .collect()
    }

    /// Call the export named after a table function with component values.
    pub fn call(&mut self, abi: &CanonicalAbi<'_>, name: &str, args: &[Value]) -> Result<Option<Value>, WasmError> {
        debug!(function = %name, "calling core export with component values");
        abi.call_by_name(name, args, self, |instance, core_args| {
            instance.invoke(name, core_args)
        })
    }
}

impl Memory for CoreInstance {
    fn size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    fn read(&self, offset: u32, len: u32) -> Result<&[u8], CanonicalAbiError> {
        let data = self.memory.data(&self.store);
        let start = offset as usize;
        let end = start + len as usize;
        data.get(start..end).ok_or(CanonicalAbiError::OutOfBounds {
            ptr: offset,
            len: u64::from(len),
            memory_size: data.len(),
        })
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), CanonicalAbiError> {
        let data = self.memory.data_mut(&mut self.store);
        let memory_size = data.len();
        let start = offset as usize;
        let end = start + bytes.len();
        data.get_mut(start..end)
            .ok_or(CanonicalAbiError::OutOfBounds {
                ptr: offset,
                len: bytes.len() as u64,
                memory_size,
            })?
            .copy_from_slice(bytes);
        Ok(())
    }

    fn grow(&mut self, delta_pages: u32) -> Result<u32, CanonicalAbiError> {
        let old = self
            .memory
            .grow(&mut self.store, u64::from(delta_pages))
            .map_err(|_| CanonicalAbiError::AllocationFailed {
                size: delta_pages.saturating_mul(PAGE_SIZE as u32),
                align: 1,
            })?;
        u32::try_from(old).map_err(|_| CanonicalAbiError::AllocationFailed {
            size: delta_pages.saturating_mul(PAGE_SIZE as u32),
            align: 1,
        })
    }
}

impl Realloc for CoreInstance {
    fn realloc(
        &mut self,
        old_ptr: u32,
        old_size: u32,
        align: u32,
        new_size: u32,
    ) -> Result<u32, CanonicalAbiError> {
        let failed = CanonicalAbiError::AllocationFailed {
            size: new_size,
            align,
        };
        let Some(realloc) = self.realloc.as_ref() else {
            debug!("module exports no {}", REALLOC_EXPORT);
            return Err(failed);
        };
        let ptr = realloc
            .call(
                &mut self.store,
                (old_ptr as i32, old_size as i32, align as i32, new_size as i32),
            )
            .map_err(|_err| {
                debug!(error = %_err, "cabi_realloc trapped");
                failed
            })?;
        trace!(ptr = ptr, size = new_size, align = align, "cabi_realloc");
        Ok(ptr as u32)
    }
}

fn flat_type(ty: &ValType) -> Option<FlatType> {
    match ty {
        ValType::I32 => Some(FlatType::I32),
        ValType::I64 => Some(FlatType::I64),
        ValType::F32 => Some(FlatType::F32),
        ValType::F64 => Some(FlatType::F64),
        _ => None,
    }
}

fn to_val(value: &FlatValue) -> Val {
    match *value {
        FlatValue::I32(v) => Val::I32(v),
        FlatValue::I64(v) => Val::I64(v),
        FlatValue::F32(v) => Val::F32(v.to_bits()),
        FlatValue::F64(v) => Val::F64(v.to_bits()),
    }
}

fn from_val(val: &Val) -> Option<FlatValue> {
    match *val {
        Val::I32(v) => Some(FlatValue::I32(v)),
        Val::I64(v) => Some(FlatValue::I64(v)),
        Val::F32(bits) => Some(FlatValue::F32(f32::from_bits(bits))),
        Val::F64(bits) => Some(FlatValue::F64(f64::from_bits(bits))),
        _ => None,
    }
}

fn join(types: &[FlatType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(func: &Func, store: &Store<()>) -> String {
    let ty = func.ty(store);
    let params: Vec<String> = ty.params().map(|t| format!("{:?}", t)).collect();
    let results: Vec<String> = ty.results().map(|t| format!("{:?}", t)).collect();
    format!("({}) -> ({})", params.join(", "), results.join(", "))
}
