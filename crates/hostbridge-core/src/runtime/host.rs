//! The host interface native callbacks see.

use crate::{DescriptorId, NativeError, NativePtr, ScriptError};

use super::{HandleHeap, ObjectHandle, Value, INSTANCE_KEY};

/// Operations a native callback may perform on the running host.
///
/// The bridge implements this trait; [`CallContext`](super::CallContext)
/// hands it to every callback so binding code can query types, push objects
/// and re-enter dispatch without knowing the bridge's concrete type.
pub trait ScriptHost {
    fn heap(&self) -> &HandleHeap;

    fn heap_mut(&mut self) -> &mut HandleHeap;

    /// Descriptor registered under `name`.
    fn find_type(&self, name: &str) -> Option<DescriptorId>;

    /// Name of a registered descriptor.
    fn descriptor_name(&self, id: DescriptorId) -> Option<&str>;

    /// The const shadow of `id`, or `id` itself if it is already const.
    fn const_variant(&self, id: DescriptorId) -> Option<DescriptorId>;

    /// O(1) subtype test over registered descriptors.
    fn is_a(&self, derived: DescriptorId, base: DescriptorId) -> bool;

    /// Runtime type name: the registered name for bridged objects and
    /// `class X` for class tables, the host type name otherwise.
    fn type_name_of(&self, value: &Value) -> String;

    /// Descriptor of a bridged value, following script tables that extend
    /// an object.
    fn descriptor_of(&self, value: &Value) -> Option<DescriptorId> {
        match value {
            Value::Class(id) => Some(*id),
            other => self
                .resolve_instance(other)
                .and_then(|h| self.heap().tag(h))
                .map(|tag| tag.descriptor),
        }
    }

    /// Push `ptr` as an object of type `type_name`, reusing its identity.
    fn push_usertype(
        &mut self,
        ptr: NativePtr,
        type_name: &str,
        add_to_root: bool,
    ) -> Result<Value, NativeError>;

    /// Hand destruction of the object to the bridge.
    fn take_ownership(&mut self, handle: ObjectHandle) -> bool;

    /// Hand destruction of the object back to native code.
    fn release_ownership(&mut self, handle: ObjectHandle) -> bool;

    /// Run the dispatch adapter for `target[key]`.
    fn index(&mut self, target: &Value, key: &Value) -> Result<Value, ScriptError>;

    /// Run the dispatch adapter for `target[key] = value`.
    fn new_index(&mut self, target: &Value, key: &Value, value: Value) -> Result<(), ScriptError>;

    /// Call a function or callable object.
    fn call(&mut self, target: &Value, args: Vec<Value>) -> Result<Value, ScriptError>;

    /// Object handle a value stands for.
    ///
    /// Script tables built with `inherit` carry their object under
    /// `.c_instance` and resolve to it.
    fn resolve_instance(&self, value: &Value) -> Option<ObjectHandle> {
        match value {
            Value::Object(h) => Some(*h),
            Value::Table(t) => match t.raw_get_str(INSTANCE_KEY) {
                Value::Object(h) => Some(h),
                _ => None,
            },
            _ => None,
        }
    }

    /// Native pointer a value stands for.
    fn pointer_of(&self, value: &Value) -> Option<NativePtr> {
        match value {
            Value::Object(h) => self.heap().ptr(*h),
            Value::Pointer(p) => Some(*p),
            Value::Table(t) => t
                .self_pointer()
                .or_else(|| self.resolve_instance(value).and_then(|h| self.heap().ptr(h))),
            _ => None,
        }
    }
}
