//! Per-function calling conventions.

use crate::config::CanonicalOptions;
use crate::types::Function;

use super::flat::FlatType;
use super::layout::{Layout, Layouts};

/// How a function's values cross the core boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Parameters and result travel as flat values.
    Flat,
    /// Parameters are stored as one tuple in memory; a single pointer is passed.
    ParamsInMemory,
    /// The result is written through a caller-supplied out-pointer.
    ResultInMemory,
    /// Both of the above.
    BothInMemory,
}

/// Core signature of a component function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<FlatType>,
    results: Vec<FlatType>,
    params_indirect: bool,
    results_indirect: bool,
    params_layout: Layout,
    param_offsets: Vec<u32>,
}

impl Signature {
    pub fn new(func: &Function, layouts: &Layouts, options: &CanonicalOptions) -> Self {
        let flat_params = layouts.flat_all(func.param_types());
        let flat_results = func
            .result
            .map(|ty| layouts.flat(&ty).to_vec())
            .unwrap_or_default();
        let (params_layout, param_offsets) = layouts.record_layout(func.param_types());

        let params_indirect = flat_params.len() > options.max_flat_params;
        let results_indirect = flat_results.len() > options.max_flat_results;

        let mut params = if params_indirect {
            vec![FlatType::I32]
        } else {
            flat_params
        };
        let results = if results_indirect {
            params.insert(0, FlatType::I32);
            Vec::new()
        } else {
            flat_results
        };

        Self {
            params,
            results,
            params_indirect,
            results_indirect,
            params_layout,
            param_offsets,
        }
    }

    /// Core parameter types, starting with the out-pointer when the result
    /// is returned through memory.
    pub fn params(&self) -> &[FlatType] {
        &self.params
    }

    /// Core result types; empty when the result is returned through memory.
    pub fn results(&self) -> &[FlatType] {
        &self.results
    }

    pub fn params_indirect(&self) -> bool {
        self.params_indirect
    }

    pub fn results_indirect(&self) -> bool {
        self.results_indirect
    }

    pub fn convention(&self) -> Convention {
        match (self.params_indirect, self.results_indirect) {
            (false, false) => Convention::Flat,
            (true, false) => Convention::ParamsInMemory,
            (false, true) => Convention::ResultInMemory,
            (true, true) => Convention::BothInMemory,
        }
    }

    /// Layout of the parameter tuple when passed through memory.
    pub fn params_layout(&self) -> Layout {
        self.params_layout
    }

    pub(crate) fn param_offsets(&self) -> &[u32] {
        &self.param_offsets
    }
}
