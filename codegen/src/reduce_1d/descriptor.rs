//! Reduction descriptor set.

use reductor_dtype::ScalarDType;
use reductor_ir::{ExpressionTree, Node, NodeId, ReduceOp, SymbolTable};
use snafu::ResultExt;

use crate::dialect::Dialect;
use crate::{IrSnafu, Result};

/// Typed emission parameters of one reduction.
///
/// Every temporary identifier is derived from `name`, so two fused reductions
/// never share a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitParams {
    pub name: String,
    pub op: ReduceOp,
    /// Element type of the scanned values.
    pub dtype: ScalarDType,
    /// Root of the subtree supplying values.
    pub operand: NodeId,
}

impl EmitParams {
    pub fn is_indexing(&self) -> bool {
        self.op.is_indexing()
    }

    /// Private accumulator. Holds the position for indexing reductions.
    pub fn acc(&self) -> String {
        format!("{}_acc", self.name)
    }

    pub fn acc_value(&self) -> String {
        format!("{}_acc_value", self.name)
    }

    /// Group-shared array, one slot per lane.
    pub fn buf(&self) -> String {
        format!("{}_buf", self.name)
    }

    pub fn buf_value(&self) -> String {
        format!("{}_buf_value", self.name)
    }

    /// Scratch region, one slot per group.
    pub fn temp(&self) -> String {
        format!("{}_temp", self.name)
    }

    pub fn temp_value(&self) -> String {
        format!("{}_temp_value", self.name)
    }

    /// Neutral element literal of the value part.
    pub fn neutral(&self, dialect: &dyn Dialect) -> String {
        dialect.literal(self.op.identity(self.dtype), self.dtype)
    }

    /// Combined value of two partials.
    pub fn combine(&self, dialect: &dyn Dialect, a: &str, b: &str) -> String {
        match self.op {
            ReduceOp::Add => format!("{a} + {b}"),
            ReduceOp::Mul => format!("{a} * {b}"),
            ReduceOp::Max | ReduceOp::ArgMax => dialect.max(self.dtype, a, b),
            ReduceOp::Min | ReduceOp::ArgMin => dialect.min(self.dtype, a, b),
        }
    }

    /// Condition under which `candidate` displaces `incumbent`.
    ///
    /// Strict, so the incumbent keeps ties.
    pub fn displaces(&self, candidate: &str, incumbent: &str) -> String {
        match self.op {
            ReduceOp::Min | ReduceOp::ArgMin => format!("{candidate} < {incumbent}"),
            _ => format!("{candidate} > {incumbent}"),
        }
    }
}

/// One reduce node of the tree, classified for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionDescriptor {
    pub node: NodeId,
    pub params: EmitParams,
}

impl ReductionDescriptor {
    pub fn is_indexing(&self) -> bool {
        self.params.is_indexing()
    }
}

/// Fused reductions sharing one input scan, plus the statements consuming them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionSet {
    pub descriptors: Vec<ReductionDescriptor>,
    pub assignments: Vec<NodeId>,
}

impl ReductionSet {
    /// Extract descriptors in first-visit order.
    ///
    /// Scratch offsets are assigned positionally from this order, so repeated
    /// calls on one tree must agree.
    pub fn extract(tree: &ExpressionTree, symbols: &SymbolTable) -> Result<Self> {
        let mut descriptors = Vec::with_capacity(symbols.reductions().len());
        for &node in symbols.reductions() {
            let Node::Reduce { op, operand } = *tree.node(node).context(IrSnafu)? else {
                return crate::MissingSnafu { what: format!("reduce node at {node}") }.fail();
            };
            let name = symbols
                .name(node)
                .ok_or_else(|| crate::Error::Missing { what: format!("symbol for reduction {node}") })?
                .to_string();
            let dtype = tree.node_dtype(operand).context(IrSnafu)?;
            descriptors.push(ReductionDescriptor { node, params: EmitParams { name, op, dtype, operand } });
        }
        if descriptors.is_empty() {
            return Err(crate::Error::Ir { source: reductor_ir::Error::NoReduction });
        }

        Ok(Self { descriptors, assignments: tree.assignments().to_vec() })
    }
}
