//! Launch orchestration for the two-kernel 1-D reduction.
//!
//! Both kernels share one argument list: the extent `N`, the scratch pointer,
//! then the tree's canonical arguments. The final kernel reads what the
//! partial kernel wrote, which is only guaranteed because both go to the same
//! in-order queue before the terminal `synchronize`.

use std::collections::HashMap;
use std::sync::Arc;

use reductor_codegen::reduce_1d::{ArgumentKind, ReducePlan};
use reductor_device::{CommandQueue, ExecParams, Kernel, KernelArg, KernelEntry, WorkspacePool};
use reductor_ir::{Node, NodeId};
use snafu::{OptionExt, ResultExt};

use crate::error::{DeviceSnafu, ExtentOverflowSnafu, IrSnafu, MissingBindingSnafu, Result};

/// Values for the argument leaves of an expression tree, keyed by node.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    args: HashMap<NodeId, KernelArg>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, node: NodeId, arg: impl Into<KernelArg>) -> &mut Self {
        self.args.insert(node, arg.into());
        self
    }

    /// Builder-style [`bind`](Self::bind).
    pub fn with(mut self, node: NodeId, arg: impl Into<KernelArg>) -> Self {
        self.bind(node, arg);
        self
    }

    pub fn get(&self, node: NodeId) -> Option<&KernelArg> {
        self.args.get(&node)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Arguments in the plan's canonical order.
    ///
    /// Scalars are recast to the leaf's dtype so a literal bound as `Int(2)`
    /// can feed a float parameter.
    pub fn resolve(&self, plan: &ReducePlan) -> Result<Vec<KernelArg>> {
        plan.arguments
            .iter()
            .map(|argument| {
                let Some(arg) = self.args.get(&argument.node) else {
                    let name = match plan.tree.node(argument.node).context(IrSnafu)? {
                        Node::Array { label, .. } | Node::Scalar { label, .. } => label.clone(),
                        _ => argument.name.clone(),
                    };
                    return MissingBindingSnafu { name }.fail();
                };
                Ok(match (argument.kind, arg) {
                    (ArgumentKind::Scalar, KernelArg::Scalar(value, _)) => KernelArg::scalar(*value, argument.dtype),
                    _ => arg.clone(),
                })
            })
            .collect()
    }
}

/// Compiled entry points of one reduction, with the plan they were generated from.
#[derive(Debug, Clone)]
pub struct Reduce1dKernels {
    pub partial: Arc<dyn KernelEntry>,
    pub final_: Arc<dyn KernelEntry>,
    pub plan: Arc<ReducePlan>,
}

/// Bind, enqueue both kernels and wait for them.
///
/// The scratch workspace is acquired from `pool` for this call only and is
/// released once the queue has drained.
#[tracing::instrument(skip_all, fields(kernel.partial = kernels.partial.name(), kernel.final_ = kernels.final_.name()))]
pub fn enqueue(
    queue: &mut dyn CommandQueue,
    pool: &WorkspacePool,
    kernels: &Reduce1dKernels,
    bindings: &Bindings,
) -> Result<()> {
    let plan = &kernels.plan;
    let extent = plan.tree.input_extent().context(IrSnafu)?;
    let max = plan.params.max_extent();
    let n = u32::try_from(extent).ok().filter(|_| extent <= max).context(ExtentOverflowSnafu { extent, max })?;

    let workspace = pool.acquire(plan.workspace_size()).context(DeviceSnafu)?;
    let args = bindings.resolve(plan)?;

    let mut partial = Kernel::new(kernels.partial.clone());
    let mut final_ = Kernel::new(kernels.final_.clone());
    for kernel in [&mut partial, &mut final_] {
        kernel.set_size_arg(0, n).context(DeviceSnafu)?;
        kernel.set_arg(1, workspace.buffer()).context(DeviceSnafu)?;
        for (index, arg) in args.iter().enumerate() {
            kernel.set_arg(2 + index, arg.clone()).context(DeviceSnafu)?;
        }
    }

    let (p, f) = (plan.partial_entry(), plan.final_entry());
    let partial_params = ExecParams::new_1d(p.global_size, p.local_size);
    let final_params = ExecParams::new_1d(f.global_size, f.local_size);

    tracing::debug!(
        extent,
        workspace.bytes = workspace.bytes(),
        partial.global = p.global_size,
        final_.global = f.global_size,
        local = p.local_size,
        "enqueue reduce_1d"
    );

    queue.enqueue(&partial, &partial_params).context(DeviceSnafu)?;
    queue.enqueue(&final_, &final_params).context(DeviceSnafu)?;
    queue.synchronize().context(DeviceSnafu)?;
    Ok(())
}
