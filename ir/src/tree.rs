//! Arena-backed expression trees.
//!
//! A tree is a list of assignment statements over an arena of nodes. Children
//! always precede their parents in the arena, so a node id doubles as a
//! topological position. Trees are immutable once built; all construction goes
//! through [`TreeBuilder`].

use reductor_dtype::{INDEX_DTYPE, ScalarDType};
use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use crate::error::*;
use crate::types::{BinaryOp, ConstValue, ReduceOp, UnaryOp};

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

pub type Shape = SmallVec<[usize; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Array leaf, passed to kernels as a global pointer.
    Array { label: String, dtype: ScalarDType, shape: Shape },
    /// Scalar leaf, passed to kernels by value.
    Scalar { label: String, dtype: ScalarDType },
    Const { value: ConstValue, dtype: ScalarDType },
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    /// 1-D reduction over the flattened operand.
    Reduce { op: ReduceOp, operand: NodeId },
    /// Statement: `target[0] = value`.
    Assign { target: NodeId, value: NodeId },
}

impl Node {
    /// Children in visiting order (lhs before rhs, target before value).
    pub fn children(&self) -> SmallVec<[NodeId; 2]> {
        match self {
            Node::Array { .. } | Node::Scalar { .. } | Node::Const { .. } => SmallVec::new(),
            Node::Unary { operand, .. } | Node::Reduce { operand, .. } => smallvec![*operand],
            Node::Binary { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Node::Assign { target, value } => smallvec![*target, *value],
        }
    }

    /// Array and scalar leaves become kernel arguments.
    pub fn is_argument(&self) -> bool {
        matches!(self, Node::Array { .. } | Node::Scalar { .. })
    }
}

/// Immutable expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionTree {
    nodes: Vec<Node>,
    statements: Vec<NodeId>,
}

impl ExpressionTree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode { node: id })
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Statement roots (`Assign` nodes) in program order.
    pub fn statements(&self) -> &[NodeId] {
        &self.statements
    }

    /// Element type produced by a node.
    ///
    /// Indexing reductions produce [`INDEX_DTYPE`]; every other node keeps the
    /// dtype of its operands.
    pub fn node_dtype(&self, id: NodeId) -> Result<ScalarDType> {
        match self.node(id)? {
            Node::Array { dtype, .. } | Node::Scalar { dtype, .. } | Node::Const { dtype, .. } => Ok(*dtype),
            Node::Unary { operand, .. } => self.node_dtype(*operand),
            Node::Binary { lhs, .. } => self.node_dtype(*lhs),
            Node::Reduce { op, .. } if op.is_indexing() => Ok(INDEX_DTYPE),
            Node::Reduce { operand, .. } => self.node_dtype(*operand),
            Node::Assign { target, .. } => self.node_dtype(*target),
        }
    }

    /// Number of elements of an array leaf.
    pub fn numel(&self, id: NodeId) -> Result<usize> {
        match self.node(id)? {
            Node::Array { shape, .. } => Ok(shape.iter().product()),
            _ => Ok(1),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.statements.is_empty(), EmptyTreeSnafu);

        for (id, node) in self.nodes() {
            for child in node.children() {
                ensure!(child < id, UnknownNodeSnafu { node: child });
                ensure!(!matches!(self.nodes[child.0], Node::Assign { .. }), MisplacedAssignSnafu { node: child });
            }

            match node {
                Node::Unary { op, operand } => {
                    let dtype = self.node_dtype(*operand)?;
                    ensure!(!op.requires_float() || dtype.is_float(), InvalidUnaryDTypeSnafu { op: *op, dtype });
                }
                Node::Binary { lhs, rhs, .. } => {
                    let (l, r) = (self.node_dtype(*lhs)?, self.node_dtype(*rhs)?);
                    ensure!(l == r, DTypeMismatchSnafu { node: id, lhs: l, rhs: r });
                }
                Node::Assign { target, value } => {
                    ensure!(
                        matches!(self.nodes[target.0], Node::Array { .. }),
                        InvalidAssignTargetSnafu { node: *target }
                    );
                    let (l, r) = (self.node_dtype(*target)?, self.node_dtype(*value)?);
                    ensure!(l == r, DTypeMismatchSnafu { node: id, lhs: l, rhs: r });
                }
                _ => {}
            }
        }

        for &reduce in &self.reductions() {
            let Node::Reduce { operand, .. } = self.nodes[reduce.0] else { continue };
            if let Some(inner) = self.first_reduce_in(operand) {
                return NestedReductionSnafu { outer: reduce, inner }.fail();
            }
        }

        self.input_extent()?;
        self.dtype()?;
        Ok(())
    }

    fn first_reduce_in(&self, root: NodeId) -> Option<NodeId> {
        let mut out = None;
        self.walk(root, &mut |id, node| {
            if out.is_none() && matches!(node, Node::Reduce { .. }) {
                out = Some(id);
            }
        });
        out
    }

    /// Pre-order walk of a subtree. Shared subtrees are visited once per use.
    pub(crate) fn walk(&self, root: NodeId, f: &mut impl FnMut(NodeId, &Node)) {
        let Some(node) = self.nodes.get(root.0) else { return };
        f(root, node);
        for child in node.children() {
            self.walk(child, f);
        }
    }
}

/// Incremental tree construction.
///
/// Node constructors never fail; structural checks run once in [`TreeBuilder::build`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    statements: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn array(&mut self, label: impl Into<String>, dtype: ScalarDType, shape: &[usize]) -> NodeId {
        self.push(Node::Array { label: label.into(), dtype, shape: Shape::from_slice(shape) })
    }

    pub fn scalar(&mut self, label: impl Into<String>, dtype: ScalarDType) -> NodeId {
        self.push(Node::Scalar { label: label.into(), dtype })
    }

    /// Literal, cast to `dtype` on the way in.
    pub fn constant(&mut self, value: ConstValue, dtype: ScalarDType) -> NodeId {
        self.push(Node::Const { value: value.cast(dtype), dtype })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.push(Node::Unary { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Binary { op, lhs, rhs })
    }

    pub fn reduce(&mut self, op: ReduceOp, operand: NodeId) -> NodeId {
        self.push(Node::Reduce { op, operand })
    }

    pub fn sum(&mut self, operand: NodeId) -> NodeId {
        self.reduce(ReduceOp::Add, operand)
    }

    pub fn max(&mut self, operand: NodeId) -> NodeId {
        self.reduce(ReduceOp::Max, operand)
    }

    pub fn min(&mut self, operand: NodeId) -> NodeId {
        self.reduce(ReduceOp::Min, operand)
    }

    pub fn argmax(&mut self, operand: NodeId) -> NodeId {
        self.reduce(ReduceOp::ArgMax, operand)
    }

    pub fn argmin(&mut self, operand: NodeId) -> NodeId {
        self.reduce(ReduceOp::ArgMin, operand)
    }

    /// Append the statement `target[0] = value`.
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let id = self.push(Node::Assign { target, value });
        self.statements.push(id);
        id
    }

    pub fn build(self) -> Result<ExpressionTree> {
        let tree = ExpressionTree { nodes: self.nodes, statements: self.statements };
        tree.validate()?;
        Ok(tree)
    }
}
