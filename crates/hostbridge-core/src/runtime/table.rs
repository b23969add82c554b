//! Host tables.
//!
//! A table is a key/value map plus a [`TableBehavior`] that replaces the
//! host's metatable for the cases the bridge cares about: module tables with
//! registered variables, array-member proxies, and tables that carried their
//! own read/write hooks before they were bridged.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{DescriptorId, NativePtr};

use super::{NativeFn, ObjectHandle, Value};

/// Raw key under which an array proxy stores its owner's native pointer.
pub const SELF_KEY: &str = ".self";

/// Raw key under which a script table stores the object it extends.
pub const INSTANCE_KEY: &str = ".c_instance";

/// A hashable table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    /// Integral numbers
    Int(i64),
    /// Non-integral numbers, stored by bit pattern
    Number(u64),
    Bool(bool),
    Object(ObjectHandle),
    Class(DescriptorId),
    Pointer(NativePtr),
}

impl Key {
    /// Convert a value to a key.
    ///
    /// Returns `None` for values that cannot index a table (`nil`, NaN,
    /// tables and functions).
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Number(n) => {
                if n.is_nan() {
                    None
                } else if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    Some(Key::Int(*n as i64))
                } else {
                    Some(Key::Number(n.to_bits()))
                }
            }
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Object(h) => Some(Key::Object(*h)),
            Value::Class(id) => Some(Key::Class(*id)),
            Value::Pointer(p) => Some(Key::Pointer(*p)),
            Value::Nil | Value::Table(_) | Value::Function(_) => None,
        }
    }

    pub fn str(s: &str) -> Key {
        Key::Str(Rc::from(s))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Key::Int(_) | Key::Number(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Str(s) => Value::String(s.clone()),
            Key::Int(i) => Value::Number(*i as f64),
            Key::Number(bits) => Value::Number(f64::from_bits(*bits)),
            Key::Bool(b) => Value::Bool(*b),
            Key::Object(h) => Value::Object(*h),
            Key::Class(id) => Value::Class(*id),
            Key::Pointer(p) => Value::Pointer(*p),
        }
    }
}

/// Accessor pair for an array-typed member.
///
/// Element reads call `get(proxy, index)`, element writes call
/// `set(proxy, index, value)`. Without a setter the array is read-only.
#[derive(Debug)]
pub struct ArrayAccessor {
    pub name: Rc<str>,
    pub get: NativeFn,
    pub set: Option<NativeFn>,
}

/// A registered getter.
#[derive(Debug, Clone)]
pub enum Accessor {
    /// Plain getter function.
    Function(NativeFn),
    /// Array-typed member, exposed through a proxy table.
    Array(Rc<ArrayAccessor>),
}

/// Read/write hooks a table had before the bridge took it over.
#[derive(Debug, Clone, Default)]
pub struct Fallback {
    /// Function called as `index(table, key)`, or a table consulted for the key.
    pub index: Option<Value>,
    /// Function called as `new_index(table, key, value)`.
    pub new_index: Option<NativeFn>,
}

impl Fallback {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.new_index.is_none()
    }
}

/// Variable accessors of a module table.
#[derive(Debug, Default)]
pub struct ModuleAccessors {
    pub getters: FxHashMap<Rc<str>, Accessor>,
    pub setters: FxHashMap<Rc<str>, NativeFn>,
    /// Hooks the table carried before it became a module.
    pub fallback: Option<Fallback>,
}

/// How the host treats a table on a raw-miss read or write.
#[derive(Debug, Default)]
pub enum TableBehavior {
    /// Raw storage only.
    #[default]
    Plain,
    /// Table with host-provided hooks.
    Hooked(Fallback),
    /// Module table with registered variables.
    Module(ModuleAccessors),
    /// Proxy returned for an array-typed member.
    ArrayProxy(Rc<ArrayAccessor>),
}

/// Host table storage.
#[derive(Debug, Default)]
pub struct Table {
    entries: FxHashMap<Key, Value>,
    behavior: TableBehavior,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: TableBehavior) -> Self {
        Self {
            entries: FxHashMap::default(),
            behavior,
        }
    }

    pub fn raw_get(&self, key: &Key) -> Value {
        self.entries.get(key).cloned().unwrap_or(Value::Nil)
    }

    pub fn raw_get_str(&self, key: &str) -> Value {
        self.raw_get(&Key::str(key))
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a value; storing `nil` removes the key.
    pub fn raw_set(&mut self, key: Key, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }

    pub fn behavior(&self) -> &TableBehavior {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut TableBehavior {
        &mut self.behavior
    }

    pub fn set_behavior(&mut self, behavior: TableBehavior) -> TableBehavior {
        std::mem::replace(&mut self.behavior, behavior)
    }
}

/// Shared reference to a host table.
#[derive(Debug, Clone, Default)]
pub struct TableRef(Rc<RefCell<Table>>);

impl TableRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        Self(Rc::new(RefCell::new(table)))
    }

    /// Plain table carrying host-level hooks.
    pub fn with_fallback(fallback: Fallback) -> Self {
        Self::from_table(Table::with_behavior(TableBehavior::Hooked(fallback)))
    }

    /// Proxy table for an array member of the object at `owner`.
    pub fn array_proxy(accessor: Rc<ArrayAccessor>, owner: Option<NativePtr>) -> Self {
        let mut table = Table::with_behavior(TableBehavior::ArrayProxy(accessor));
        if let Some(ptr) = owner {
            table.raw_set(Key::str(SELF_KEY), Value::Pointer(ptr));
        }
        Self::from_table(table)
    }

    pub fn borrow(&self) -> Ref<'_, Table> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Table> {
        self.0.borrow_mut()
    }

    pub fn raw_get(&self, key: &Key) -> Value {
        self.0.borrow().raw_get(key)
    }

    pub fn raw_get_str(&self, key: &str) -> Value {
        self.0.borrow().raw_get_str(key)
    }

    pub fn raw_set(&self, key: Key, value: Value) {
        self.0.borrow_mut().raw_set(key, value);
    }

    pub fn raw_set_str(&self, key: &str, value: impl Into<Value>) {
        self.raw_set(Key::str(key), value.into());
    }

    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const RefCell<Table> {
        Rc::as_ptr(&self.0)
    }

    /// Native pointer an array proxy refers back to.
    pub fn self_pointer(&self) -> Option<NativePtr> {
        match self.raw_get_str(SELF_KEY) {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }
}
