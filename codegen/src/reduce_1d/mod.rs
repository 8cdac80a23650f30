//! Two-phase 1-D reduction template.
//!
//! Kernel 1 (`reduce_1d_partial{suffix}`) runs G*K threads: each scans the
//! input with a grid stride, the group tree-reduces in shared memory, and lane
//! 0 stores one partial per group into scratch. Kernel 2
//! (`reduce_1d_final{suffix}`) runs a single group that folds the K partials,
//! tree-reduces again and writes every assignment target.
//!
//! Several reductions over the same extent are fused into one pair of kernels.

pub mod descriptor;
pub mod emit;
pub mod layout;
pub mod params;
pub mod plan;

use std::sync::Arc;

use reductor_dtype::{DeviceSpec, ScalarDType};
use reductor_ir::{ExpressionTree, SymbolTable};
use snafu::{ResultExt, ensure};

pub use descriptor::{EmitParams, ReductionDescriptor, ReductionSet};
pub use layout::{REGION_ALIGN, Region, ScratchLayout};
pub use params::TuningParams;
pub use plan::{ArgumentKind, DataSource, KernelArgument, KernelBody, KernelRole, OutputAction, ReducePlan};

use crate::dialect::dialect_for;
use crate::{
    GeneratedSource, IrSnafu, Result, Template, UnsupportedDTypeSnafu, UnsupportedVectorWidthSnafu,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduce1d {
    params: TuningParams,
}

impl Reduce1d {
    pub fn new(params: TuningParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TuningParams {
        &self.params
    }

    /// Typed plan for `tree`, independent of the backend.
    pub fn plan(&self, suffix: &str, tree: &Arc<ExpressionTree>) -> Result<ReducePlan> {
        ReducePlan::new(tree.clone(), self.params, suffix)
    }

    /// Element count N scanned by the partial kernel.
    pub fn input_extent(&self, tree: &ExpressionTree) -> Result<usize> {
        tree.input_extent().context(IrSnafu)
    }

    fn descriptors(tree: &ExpressionTree) -> Result<Vec<ReductionDescriptor>> {
        let symbols = SymbolTable::new(tree);
        Ok(ReductionSet::extract(tree, &symbols)?.descriptors)
    }
}

impl Template for Reduce1d {
    #[tracing::instrument(skip_all, fields(kernel.suffix = suffix, device = %device))]
    fn generate(&self, suffix: &str, tree: &Arc<ExpressionTree>, device: &DeviceSpec) -> Result<GeneratedSource> {
        let dialect = dialect_for(device)?;
        let plan = self.plan(suffix, tree)?;

        // The host device executes the plan directly and has no half arithmetic.
        ensure!(
            !(matches!(device, DeviceSpec::Host) && plan.dtype == ScalarDType::Float16),
            UnsupportedDTypeSnafu { dtype: plan.dtype, device: device.clone() }
        );
        ensure!(
            dialect.supports_vector_width(plan.dtype, self.params.vector_width),
            UnsupportedVectorWidthSnafu { backend: dialect.name(), width: self.params.vector_width, dtype: plan.dtype }
        );

        let code = emit::emit_source(dialect, &plan)?;
        tracing::debug!(
            kernel.suffix = suffix,
            reductions = plan.descriptors.len(),
            source.bytes = code.len(),
            "generated reduce_1d source"
        );

        Ok(GeneratedSource {
            code,
            partial: plan.partial_entry(),
            final_: plan.final_entry(),
            arguments: plan.arguments.iter().map(|a| a.node).collect(),
            plan: Arc::new(plan),
        })
    }

    /// Layout total for every K >= 1, including K = 1: the partial kernel
    /// always stores its group result and the final kernel always reads it.
    fn workspace_size(&self, tree: &ExpressionTree) -> Result<usize> {
        let descriptors = Self::descriptors(tree)?;
        Ok(ScratchLayout::compute(&descriptors, self.params.group_count).total_bytes())
    }

    fn lmem_usage(&self, tree: &ExpressionTree) -> Result<usize> {
        let descriptors = Self::descriptors(tree)?;
        Ok(plan::lmem_usage(&descriptors, self.params.group_size))
    }
}
