//! Types for code generation.

use std::sync::Arc;

use reductor_ir::NodeId;

use crate::reduce_1d::ReducePlan;

/// Launch entry of one generated kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Function name in the generated source.
    pub name: String,

    /// Total threads to launch.
    pub global_size: usize,

    /// Threads per group.
    pub local_size: usize,
}

/// Source text for both kernels of a reduction, plus the plan it was emitted from.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub code: String,

    pub partial: EntryPoint,

    pub final_: EntryPoint,

    /// Canonical argument list following `N` and the scratch pointer.
    pub arguments: Vec<NodeId>,

    pub plan: Arc<ReducePlan>,
}
