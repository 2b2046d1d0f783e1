//! Adapting calls between component-level and core signatures.
//!
//! [`CanonicalAbi::call`] drives a core callee from component values: it
//! lowers the arguments, invokes the callee with flat values and lifts the
//! result. [`CanonicalAbi::call_host`] is the mirror image, used when core
//! code calls into a host function implemented over component values.

use crate::logging::{debug, trace};
use crate::types::{FuncId, Function};
use crate::value::Value;

use super::buffer::{check_aligned, check_range};
use super::memory::{Memory, Realloc};
use super::signature::Signature;
use super::{CanonicalAbi, CanonicalAbiError, FlatValue, FlatValues};

impl CanonicalAbi<'_> {
    /// Call a core function through the canonical calling convention.
    ///
    /// `callee` receives the core arguments and returns the core results.
    /// When the parameters exceed the flat limit they are stored as one tuple
    /// allocated through `cx` and a single pointer is passed. When the result
    /// exceeds the flat limit a result area is allocated through `cx`, its
    /// address is passed as the first argument, and the callee returns
    /// nothing.
    pub fn call<C, F, E>(
        &self,
        func: FuncId,
        args: &[Value],
        cx: &mut C,
        callee: F,
    ) -> Result<Option<Value>, E>
    where
        C: Realloc + ?Sized,
        F: FnOnce(&mut C, &[FlatValue]) -> Result<Vec<FlatValue>, E>,
        E: From<CanonicalAbiError>,
    {
        let (function, sig) = self.function(func)?;
        if args.len() != function.params.len() {
            return Err(CanonicalAbiError::mismatch(
                format!("{} arguments", function.params.len()),
                format!("{} arguments", args.len()),
            )
            .into());
        }

        let mut core_args = self.lower_params(function, sig, args, cx)?;
        let result_ptr = match (function.result, sig.results_indirect()) {
            (Some(ty), true) => {
                let layout = self.layouts.layout(&ty);
                let ptr = self.allocate(cx, layout.align, layout.size)?;
                core_args.insert(0, FlatValue::I32(ptr as i32));
                Some(ptr)
            }
            _ => None,
        };

        debug!(
            function = %function.name,
            convention = ?sig.convention(),
            args = core_args.len(),
            "calling core function"
        );
        let results = callee(&mut *cx, &core_args)?;
        trace!(function = %function.name, results = results.len(), "core function returned");

        let value = self.lift_results(function, sig, &*cx, &results, result_ptr)?;
        Ok(value)
    }

    /// [`CanonicalAbi::call`] with the function looked up by name.
    pub fn call_by_name<C, F, E>(
        &self,
        name: &str,
        args: &[Value],
        cx: &mut C,
        callee: F,
    ) -> Result<Option<Value>, E>
    where
        C: Realloc + ?Sized,
        F: FnOnce(&mut C, &[FlatValue]) -> Result<Vec<FlatValue>, E>,
        E: From<CanonicalAbiError>,
    {
        let func = self
            .table
            .function_by_name(name)
            .ok_or_else(|| CanonicalAbiError::UnknownFunction(name.to_string()))?;
        self.call(func, args, cx, callee)
    }

    /// Serve a core call with a host function over component values.
    ///
    /// `core_args` must match the core parameter list of `func`, including
    /// the leading out-pointer when the result goes through memory. The
    /// returned vector holds the core results.
    pub fn call_host<C, H>(
        &self,
        func: FuncId,
        core_args: &[FlatValue],
        cx: &mut C,
        host: H,
    ) -> Result<Vec<FlatValue>, CanonicalAbiError>
    where
        C: Realloc + ?Sized,
        H: FnOnce(Vec<Value>) -> Result<Option<Value>, CanonicalAbiError>,
    {
        let (function, sig) = self.function(func)?;
        check_count(sig.params().len(), core_args.len())?;

        let mut cursor = FlatValues::new(core_args);
        let result_ptr = if sig.results_indirect() {
            Some(cursor.next_i32()? as u32)
        } else {
            None
        };
        let args = if sig.params_indirect() {
            let ptr = cursor.next_i32()? as u32;
            self.load_params(function, sig, &*cx, ptr)?
        } else {
            function
                .param_types()
                .map(|ty| self.lift_flat(ty, &*cx, &mut cursor))
                .collect::<Result<Vec<_>, _>>()?
        };

        debug!(function = %function.name, args = args.len(), "calling host function");
        let result = host(args)?;

        match (function.result, result, result_ptr) {
            (None, None, _) => Ok(Vec::new()),
            (Some(ty), Some(value), Some(ptr)) => {
                let layout = self.layouts.layout(&ty);
                check_aligned(ptr, layout.align)?;
                check_range(&*cx, ptr, u64::from(layout.size))?;
                self.store(&value, &ty, cx, ptr)?;
                Ok(Vec::new())
            }
            (Some(ty), Some(value), None) => self.lower_flat(&value, &ty, cx),
            (Some(ty), None, _) => Err(CanonicalAbiError::mismatch(ty.name(), "no result")),
            (None, Some(value), _) => Err(CanonicalAbiError::mismatch("no result", value.kind())),
        }
    }

    fn function(&self, func: FuncId) -> Result<(&Function, &Signature), CanonicalAbiError> {
        match (self.table.function(func), self.signature(func)) {
            (Some(function), Some(sig)) => Ok((function, sig)),
            _ => Err(CanonicalAbiError::UnknownFunction(format!("#{}", func.index()))),
        }
    }

    fn lower_params<C: Realloc + ?Sized>(
        &self,
        function: &Function,
        sig: &Signature,
        args: &[Value],
        cx: &mut C,
    ) -> Result<Vec<FlatValue>, CanonicalAbiError> {
        if !sig.params_indirect() {
            let mut out = Vec::with_capacity(sig.params().len());
            for (arg, ty) in args.iter().zip(function.param_types()) {
                self.lower_flat_into(arg, ty, cx, &mut out)?;
            }
            return Ok(out);
        }

        let layout = sig.params_layout();
        let ptr = self.allocate(cx, layout.align, layout.size)?;
        trace!(ptr, size = layout.size, "parameters passed through memory");
        for ((arg, ty), offset) in args
            .iter()
            .zip(function.param_types())
            .zip(sig.param_offsets())
        {
            self.store(arg, ty, cx, ptr + offset)?;
        }
        Ok(vec![FlatValue::I32(ptr as i32)])
    }

    fn load_params<M: Memory + ?Sized>(
        &self,
        function: &Function,
        sig: &Signature,
        memory: &M,
        ptr: u32,
    ) -> Result<Vec<Value>, CanonicalAbiError> {
        let layout = sig.params_layout();
        check_aligned(ptr, layout.align)?;
        check_range(memory, ptr, u64::from(layout.size))?;
        function
            .param_types()
            .zip(sig.param_offsets())
            .map(|(ty, offset)| self.load(ty, memory, ptr + offset))
            .collect()
    }

    fn lift_results<M: Memory + ?Sized>(
        &self,
        function: &Function,
        sig: &Signature,
        memory: &M,
        results: &[FlatValue],
        result_ptr: Option<u32>,
    ) -> Result<Option<Value>, CanonicalAbiError> {
        check_count(sig.results().len(), results.len())?;
        match (function.result, result_ptr) {
            (None, _) => Ok(None),
            (Some(ty), Some(ptr)) => self.load(&ty, memory, ptr).map(Some),
            (Some(ty), None) => self.lift_flat(&ty, memory, &mut FlatValues::new(results)).map(Some),
        }
    }
}

/// The core side supplied a different number of flat values than the signature has.
fn check_count(expected: usize, got: usize) -> Result<(), CanonicalAbiError> {
    if expected == got {
        return Ok(());
    }
    Err(CanonicalAbiError::FlatValueMismatch {
        expected: format!("{} flat values", expected),
        got: format!("{} flat values", got),
    })
}
