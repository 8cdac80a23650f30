//! Structural queries over expression trees.
//!
//! Every query walks statements in program order, target before value and lhs
//! before rhs, and reports each node once at its first visit. Kernel argument
//! order and scratch layout are derived positionally from these results, so
//! the order must never depend on hashing or allocation.

use std::collections::HashSet;

use reductor_dtype::ScalarDType;
use snafu::ensure;

use crate::error::*;
use crate::tree::{ExpressionTree, Node, NodeId};

impl ExpressionTree {
    fn collect(&self, roots: &[NodeId], pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &root in roots {
            self.walk(root, &mut |id, node| {
                if pred(node) && seen.insert(id) {
                    out.push(id);
                }
            });
        }
        out
    }

    /// Reduce nodes in first-visit order.
    pub fn reductions(&self) -> Vec<NodeId> {
        self.collect(self.statements(), |n| matches!(n, Node::Reduce { .. }))
    }

    /// Distinct array leaves of a subtree, first-appearance order.
    pub fn leaves(&self, root: NodeId) -> Vec<NodeId> {
        self.collect(&[root], |n| matches!(n, Node::Array { .. }))
    }

    /// Canonical kernel argument list: distinct array and scalar leaves of all statements.
    pub fn arguments(&self) -> Vec<NodeId> {
        self.collect(self.statements(), Node::is_argument)
    }

    pub fn assignments(&self) -> &[NodeId] {
        self.statements()
    }

    /// Element count scanned by a reduce node.
    pub fn extent(&self, reduce: NodeId) -> Result<usize> {
        let operand = match self.node(reduce)? {
            Node::Reduce { operand, .. } => *operand,
            _ => return NoReductionSnafu.fail(),
        };

        let leaves = self.leaves(operand);
        let Some((&first, rest)) = leaves.split_first() else {
            return NoArrayOperandSnafu { node: reduce }.fail();
        };
        let expected = self.numel(first)?;
        for &leaf in rest {
            let actual = self.numel(leaf)?;
            ensure!(actual == expected, ExtentMismatchSnafu { node: leaf, expected, actual });
        }
        Ok(expected)
    }

    /// The extent N shared by every fused reduction.
    pub fn input_extent(&self) -> Result<usize> {
        let reductions = self.reductions();
        let Some((&first, rest)) = reductions.split_first() else {
            return NoReductionSnafu.fail();
        };
        let expected = self.extent(first)?;
        for &reduce in rest {
            let actual = self.extent(reduce)?;
            ensure!(actual == expected, ExtentMismatchSnafu { node: reduce, expected, actual });
        }
        Ok(expected)
    }

    /// Element type of the reduce operands; all fused reductions must agree.
    pub fn dtype(&self) -> Result<ScalarDType> {
        let mut found: Option<ScalarDType> = None;
        for reduce in self.reductions() {
            let Node::Reduce { operand, .. } = self.node(reduce)? else { continue };
            let dtype = self.node_dtype(*operand)?;
            match found {
                Some(lhs) => ensure!(lhs == dtype, DTypeMismatchSnafu { node: reduce, lhs, rhs: dtype }),
                None => found = Some(dtype),
            }
        }
        found.ok_or(Error::NoReduction)
    }
}
