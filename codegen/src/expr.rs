//! Rendering of expression subtrees into dialect text.

use reductor_ir::{BinaryOp, ExpressionTree, Node, NodeId, SymbolTable};
use snafu::ResultExt;

use crate::dialect::Dialect;
use crate::{IrSnafu, Result};

/// Renders subtrees, delegating leaf access to the caller.
///
/// The same operand is rendered differently depending on where it appears:
/// `obj1_v.s2` inside a vector scan, `obj1[i]` in the remainder loop,
/// `obj1[0]` in a final write. Callers supply that mapping as a closure;
/// anything it declines falls back to structural rendering.
pub struct ExprRenderer<'a> {
    tree: &'a ExpressionTree,
    symbols: &'a SymbolTable,
    dialect: &'a dyn Dialect,
}

impl<'a> ExprRenderer<'a> {
    pub fn new(tree: &'a ExpressionTree, symbols: &'a SymbolTable, dialect: &'a dyn Dialect) -> Self {
        Self { tree, symbols, dialect }
    }

    pub fn render(&self, id: NodeId, leaf: &dyn Fn(NodeId, &Node) -> Option<String>) -> Result<String> {
        let node = self.tree.node(id).context(IrSnafu)?;
        if let Some(text) = leaf(id, node) {
            return Ok(text);
        }

        let dtype = self.tree.node_dtype(id).context(IrSnafu)?;
        match node {
            Node::Const { value, dtype } => Ok(self.dialect.literal(*value, *dtype)),
            Node::Scalar { .. } => self.name(id),
            Node::Unary { op, operand } => {
                let x = self.render(*operand, leaf)?;
                Ok(self.dialect.unary(*op, dtype, &x))
            }
            Node::Binary { op, lhs, rhs } => {
                let (a, b) = (self.render(*lhs, leaf)?, self.render(*rhs, leaf)?);
                Ok(match op {
                    BinaryOp::Add => format!("({a} + {b})"),
                    BinaryOp::Sub => format!("({a} - {b})"),
                    BinaryOp::Mul => format!("({a} * {b})"),
                    BinaryOp::Div => format!("({a} / {b})"),
                    BinaryOp::Max => self.dialect.max(dtype, &a, &b),
                    BinaryOp::Min => self.dialect.min(dtype, &a, &b),
                })
            }
            Node::Array { .. } | Node::Reduce { .. } | Node::Assign { .. } => {
                crate::MissingSnafu { what: format!("access rule for node {id}") }.fail()
            }
        }
    }

    fn name(&self, id: NodeId) -> Result<String> {
        self.symbols
            .name(id)
            .map(str::to_string)
            .ok_or_else(|| crate::Error::Missing { what: format!("symbol for node {id}") })
    }
}
