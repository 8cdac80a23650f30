use reductor_dtype::ScalarDType;
use snafu::Snafu;

use crate::{NodeId, UnaryOp};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The tree has no statements.
    #[snafu(display("expression tree has no statements"))]
    EmptyTree,

    /// No reduce node anywhere in the tree; the input extent cannot be derived.
    #[snafu(display("expression tree contains no reduction"))]
    NoReduction,

    /// A reduce node appears inside the operand of another reduce node.
    #[snafu(display("reduction {inner} is nested inside reduction {outer}"))]
    NestedReduction { outer: NodeId, inner: NodeId },

    /// Element counts disagree, either between leaves of one operand or between fused reductions.
    #[snafu(display("extent mismatch at {node}: expected {expected} elements, found {actual}"))]
    ExtentMismatch { node: NodeId, expected: usize, actual: usize },

    /// A reduce operand references no array, so it has no extent.
    #[snafu(display("reduction {node} has no array operand"))]
    NoArrayOperand { node: NodeId },

    #[snafu(display("dtype mismatch at {node}: {lhs} vs {rhs}"))]
    DTypeMismatch { node: NodeId, lhs: ScalarDType, rhs: ScalarDType },

    #[snafu(display("{op:?} requires a float operand, got {dtype}"))]
    InvalidUnaryDType { op: UnaryOp, dtype: ScalarDType },

    /// Assignment targets must be array leaves.
    #[snafu(display("assignment target {node} is not an array"))]
    InvalidAssignTarget { node: NodeId },

    /// An assignment was used as an operand of another node.
    #[snafu(display("assignment {node} used as an operand"))]
    MisplacedAssign { node: NodeId },

    /// A node id that is out of range or refers forward in the arena.
    #[snafu(display("unknown node {node}"))]
    UnknownNode { node: NodeId },
}
