use crate::tree::{ExpressionTree, NodeId};

/// Generated identifiers for kernel arguments and reductions.
///
/// Arguments are named `obj{i}` in canonical argument order, reductions
/// `rd{j}` in extraction order. User labels never reach the generated source,
/// so names cannot collide with dialect keywords or with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    names: Vec<Option<String>>,
    arguments: Vec<NodeId>,
    reductions: Vec<NodeId>,
}

impl SymbolTable {
    pub fn new(tree: &ExpressionTree) -> Self {
        let arguments = tree.arguments();
        let reductions = tree.reductions();

        let mut names = vec![None; tree.len()];
        for (i, id) in arguments.iter().enumerate() {
            names[id.index()] = Some(format!("obj{i}"));
        }
        for (j, id) in reductions.iter().enumerate() {
            names[id.index()] = Some(format!("rd{j}"));
        }

        Self { names, arguments, reductions }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.names.get(id.index()).and_then(|n| n.as_deref())
    }

    pub fn arguments(&self) -> &[NodeId] {
        &self.arguments
    }

    pub fn reductions(&self) -> &[NodeId] {
        &self.reductions
    }
}
