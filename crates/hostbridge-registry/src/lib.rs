//! Type registry for the hostbridge binding layer.
//!
//! - [`TypeRegistry`]: descriptors, dispatch chains and the super relation
//! - [`TypeDescriptor`]: per-type members, accessors, operators and collector
//! - [`ModuleTree`]: the module/class scope graph used during registration

mod descriptor;
mod module_tree;
mod registry;

pub use descriptor::TypeDescriptor;
pub use module_tree::{ModuleTree, ScopeEdge, ScopeNode};
pub use registry::{COMMON_CLASS, CONST_PREFIX, ChainIter, TypeRegistry};
