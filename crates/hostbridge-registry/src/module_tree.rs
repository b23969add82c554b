//! Module Tree - the registration scope graph.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: [`ScopeNode`] (a module table or a class descriptor)
//! - Edges: `Contains(name)` from a scope to the modules and classes
//!   registered inside it
//!
//! Binding code registers members into the *current* scope, which is the top
//! of a stack driven by `begin`/`end` pairs. The root node is the host's
//! global table.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use hostbridge_core::{DescriptorId, RegistrationError, TableRef};

/// A registration scope.
#[derive(Debug, Clone)]
pub enum ScopeNode {
    /// A module table (the root is the global table).
    Module(TableRef),
    /// A class; members go into its descriptor.
    Class(DescriptorId),
}

/// Edge types in the scope graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEdge {
    /// Parent scope contains the child under this name.
    Contains(String),
}

/// The scope graph plus the open-scope stack.
pub struct ModuleTree {
    graph: DiGraph<ScopeNode, ScopeEdge>,
    root: NodeIndex,
    stack: Vec<NodeIndex>,
}

impl ModuleTree {
    /// Create a tree rooted at the host's global table.
    pub fn new(globals: TableRef) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ScopeNode::Module(globals));
        Self {
            graph,
            root,
            stack: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn globals(&self) -> Option<&TableRef> {
        match self.graph.node_weight(self.root) {
            Some(ScopeNode::Module(t)) => Some(t),
            _ => None,
        }
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&ScopeNode> {
        self.graph.node_weight(idx)
    }

    /// Find a child scope by name.
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.graph
            .edges(parent)
            .find(|edge| matches!(edge.weight(), ScopeEdge::Contains(n) if n == name))
            .map(|edge| edge.target())
    }

    /// Add (or replace) the child registered under `name`.
    pub fn set_child(&mut self, parent: NodeIndex, name: &str, node: ScopeNode) -> NodeIndex {
        if let Some(existing) = self.find_child(parent, name)
            && let Some(weight) = self.graph.node_weight_mut(existing)
        {
            *weight = node;
            return existing;
        }
        let child = self.graph.add_node(node);
        self.graph
            .add_edge(parent, child, ScopeEdge::Contains(name.to_string()));
        child
    }

    /// Names of the scopes directly inside `parent`.
    pub fn children(&self, parent: NodeIndex) -> Vec<(&str, NodeIndex)> {
        self.graph
            .edges(parent)
            .map(|edge| match edge.weight() {
                ScopeEdge::Contains(n) => (n.as_str(), edge.target()),
            })
            .collect()
    }

    // ==========================================================================
    // Scope stack
    // ==========================================================================

    /// The innermost open scope.
    pub fn current(&self) -> Result<NodeIndex, RegistrationError> {
        self.stack.last().copied().ok_or(RegistrationError::NoScope)
    }

    pub fn current_node(&self) -> Result<&ScopeNode, RegistrationError> {
        let idx = self.current()?;
        self.node(idx).ok_or(RegistrationError::NoScope)
    }

    /// Open the global scope.
    pub fn begin_root(&mut self) {
        self.stack.push(self.root);
    }

    /// Open the scope registered as `name` inside the current scope.
    pub fn begin(&mut self, name: &str) -> Result<NodeIndex, RegistrationError> {
        let parent = self.current()?;
        let child = self
            .find_child(parent, name)
            .ok_or_else(|| RegistrationError::NotAScope(name.to_string()))?;
        self.stack.push(child);
        Ok(child)
    }

    pub fn end(&mut self) -> Result<(), RegistrationError> {
        self.stack
            .pop()
            .map(|_| ())
            .ok_or(RegistrationError::ScopeUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl std::fmt::Debug for ModuleTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleTree")
            .field("node_count", &self.graph.node_count())
            .field("depth", &self.stack.len())
            .finish()
    }
}
