//! Typed kernel plan shared by source emission and the host reference device.

use std::sync::Arc;

use reductor_dtype::{INDEX_DTYPE, ScalarDType};
use reductor_ir::{ExpressionTree, Node, NodeId, SymbolTable};
use snafu::ResultExt;

use super::descriptor::{ReductionDescriptor, ReductionSet};
use super::layout::ScratchLayout;
use super::params::TuningParams;
use crate::{EntryPoint, IrSnafu, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelRole {
    Partial,
    Final,
}

/// Where a kernel's private accumulators draw values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Strided scan of the N input elements, `vector_width` per load.
    Input { vector_width: usize },
    /// Fold of `count` per-group partials from scratch.
    Scratch { count: usize },
}

/// What lane 0 does with the group result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputAction {
    /// Store into the group's scratch slot.
    Scratch,
    /// Evaluate every assignment statement.
    Assignments,
}

/// One kernel of the pair. Both are rendered by the same routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelBody {
    pub name: String,
    pub role: KernelRole,
    pub source: DataSource,
    pub output: OutputAction,
    pub layout: ScratchLayout,
    pub group_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    /// Global pointer.
    Array,
    /// Passed by value.
    Scalar,
}

/// Kernel parameter following `N` and the scratch pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArgument {
    pub node: NodeId,
    pub name: String,
    pub dtype: ScalarDType,
    pub kind: ArgumentKind,
}

#[derive(Debug, Clone)]
pub struct ReducePlan {
    pub tree: Arc<ExpressionTree>,
    pub symbols: SymbolTable,
    pub params: TuningParams,
    /// Element type of all reduce operands.
    pub dtype: ScalarDType,
    pub descriptors: Vec<ReductionDescriptor>,
    pub assignments: Vec<NodeId>,
    pub arguments: Vec<KernelArgument>,
    pub partial: KernelBody,
    pub final_: KernelBody,
}

impl ReducePlan {
    pub fn new(tree: Arc<ExpressionTree>, params: TuningParams, suffix: &str) -> Result<Self> {
        params.validate()?;

        let symbols = SymbolTable::new(&tree);
        let set = ReductionSet::extract(&tree, &symbols)?;
        let dtype = tree.dtype().context(IrSnafu)?;

        let mut arguments = Vec::with_capacity(symbols.arguments().len());
        for &node in symbols.arguments() {
            let (dtype, kind) = match tree.node(node).context(IrSnafu)? {
                Node::Array { dtype, .. } => (*dtype, ArgumentKind::Array),
                Node::Scalar { dtype, .. } => (*dtype, ArgumentKind::Scalar),
                _ => return crate::MissingSnafu { what: format!("argument leaf at {node}") }.fail(),
            };
            let name = symbols
                .name(node)
                .ok_or_else(|| crate::Error::Missing { what: format!("symbol for argument {node}") })?
                .to_string();
            arguments.push(KernelArgument { node, name, dtype, kind });
        }

        let partial = KernelBody {
            name: format!("reduce_1d_partial{suffix}"),
            role: KernelRole::Partial,
            source: DataSource::Input { vector_width: params.vector_width },
            output: OutputAction::Scratch,
            layout: ScratchLayout::compute(&set.descriptors, params.group_count),
            group_size: params.group_size,
        };
        let final_ = KernelBody {
            name: format!("reduce_1d_final{suffix}"),
            role: KernelRole::Final,
            source: DataSource::Scratch { count: params.group_count },
            output: OutputAction::Assignments,
            layout: ScratchLayout::compute(&set.descriptors, params.group_count),
            group_size: params.group_size,
        };

        Ok(Self {
            tree,
            symbols,
            params,
            dtype,
            descriptors: set.descriptors,
            assignments: set.assignments,
            arguments,
            partial,
            final_,
        })
    }

    /// Scratch bytes for one launch.
    pub fn workspace_size(&self) -> usize {
        ScratchLayout::compute(&self.descriptors, self.params.group_count).total_bytes()
    }

    /// Group-shared bytes per group.
    pub fn lmem_usage(&self) -> usize {
        lmem_usage(&self.descriptors, self.params.group_size)
    }

    /// Partial kernel: G*K threads in groups of G.
    pub fn partial_entry(&self) -> EntryPoint {
        EntryPoint {
            name: self.partial.name.clone(),
            global_size: self.params.partial_threads(),
            local_size: self.params.group_size,
        }
    }

    /// Final kernel: exactly one group of G threads.
    pub fn final_entry(&self) -> EntryPoint {
        EntryPoint {
            name: self.final_.name.clone(),
            global_size: self.params.group_size,
            local_size: self.params.group_size,
        }
    }
}

pub(crate) fn lmem_usage(descriptors: &[ReductionDescriptor], group_size: usize) -> usize {
    descriptors
        .iter()
        .map(|rd| {
            let index = if rd.is_indexing() { INDEX_DTYPE.bytes() } else { 0 };
            group_size * (rd.params.dtype.bytes() + index)
        })
        .sum()
}
