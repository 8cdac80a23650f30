//! Expression trees for fused 1-D reductions.
//!
//! # Module Organization
//!
//! - [`types`] - Operation enums and constant values
//! - [`tree`] - Node arena, builder and validation
//! - [`query`] - Deterministic structural queries (reductions, leaves, arguments, extent)
//! - [`symbols`] - Generated kernel identifiers
//! - [`error`] - Error types and result handling

pub mod error;
pub mod query;
pub mod symbols;
pub mod tree;
pub mod types;


pub use error::{Error, Result};
pub use symbols::SymbolTable;
pub use tree::{ExpressionTree, Node, NodeId, Shape, TreeBuilder};
pub use types::{BinaryOp, ConstValue, ReduceOp, UnaryOp};

pub use reductor_dtype::ScalarDType;
