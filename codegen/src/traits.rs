//! Core traits for code generation.

use std::sync::Arc;

use reductor_dtype::DeviceSpec;
use reductor_ir::ExpressionTree;

use crate::{GeneratedSource, Result};

/// A kernel template: turns an expression tree into launchable source.
pub trait Template {
    /// Generate the source for `device`.
    ///
    /// `suffix` disambiguates entry names when several instantiations share a program.
    fn generate(&self, suffix: &str, tree: &Arc<ExpressionTree>, device: &DeviceSpec) -> Result<GeneratedSource>;

    /// Bytes of scratch memory one launch needs.
    fn workspace_size(&self, tree: &ExpressionTree) -> Result<usize>;

    /// Bytes of group-shared memory used per group.
    fn lmem_usage(&self, tree: &ExpressionTree) -> Result<usize>;
}
