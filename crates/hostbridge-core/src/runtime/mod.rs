//! Host-side runtime primitives.
//!
//! ## Key Types
//!
//! - [`Value`]: Runtime value type for stack slots and table entries
//! - [`TableRef`]: Shared host table with bridge-managed behavior
//! - [`NativeFn`]: Type-erased callable wrapper for native callbacks
//! - [`CallContext`]: Bridge between the host and Rust for function calls
//! - [`HandleHeap`]: Generational arena for object handles
//! - [`ScriptHost`]: Host operations available to callbacks

mod call_context;
mod host;
mod native_fn;
mod object_heap;
mod table;
mod value;

pub use call_context::CallContext;
pub use host::ScriptHost;
pub use native_fn::{NativeCallable, NativeFn};
pub use object_heap::{HandleEntry, HandleHeap, HandleTag, ObjectHandle, Ownership};
pub use table::{
    Accessor, ArrayAccessor, Fallback, INSTANCE_KEY, Key, ModuleAccessors, SELF_KEY, Table,
    TableBehavior, TableRef,
};
pub use value::Value;
