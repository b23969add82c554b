//! Runtime value type for host stack slots and table entries.

use std::fmt;
use std::rc::Rc;

use crate::{DescriptorId, NativePtr};

use super::{NativeFn, ObjectHandle, TableRef};

/// A value as the host runtime sees it.
///
/// Bridged objects appear as [`Value::Object`], bridged classes as
/// [`Value::Class`]. Everything else mirrors the host's own value domain.
/// Cloning is cheap: strings, tables and functions are shared.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Nil,
    /// Boolean value
    Bool(bool),
    /// Number (the host has a single numeric type)
    Number(f64),
    /// Interned string
    String(Rc<str>),
    /// Host table (plain, module, or array proxy)
    Table(TableRef),
    /// Handle to a bridged native object
    Object(ObjectHandle),
    /// A bridged class table
    Class(DescriptorId),
    /// Native function
    Function(NativeFn),
    /// Untyped native pointer (no descriptor, no identity tracking)
    Pointer(NativePtr),
}

impl Value {
    /// Host-level type name of this value.
    ///
    /// Bridged objects and raw pointers are both `userdata`; class tables are
    /// `table`. Registered type names are resolved by the bridge, not here.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) | Value::Class(_) => "table",
            Value::Object(_) | Value::Pointer(_) => "userdata",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness as the host defines it: only `nil` and `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Strings and numbers both satisfy a string check on the host.
    pub fn is_string_like(&self) -> bool {
        matches!(self, Value::String(_) | Value::Number(_))
    }

    /// Tables in the host sense, including class tables.
    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_) | Value::Class(_))
    }

    pub fn is_userdata(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Pointer(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFn> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Raw equality: identity for reference values, value equality otherwise.
    pub fn raw_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equal(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Number(v) => write!(f, "Number({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Table(t) => write!(f, "Table({:p})", t.as_ptr()),
            Value::Object(h) => write!(f, "Object({:?})", h),
            Value::Class(id) => write!(f, "Class({})", id),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Pointer(p) => write!(f, "Pointer({})", p),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<TableRef> for Value {
    fn from(v: TableRef) -> Self {
        Value::Table(v)
    }
}

impl From<ObjectHandle> for Value {
    fn from(v: ObjectHandle) -> Self {
        Value::Object(v)
    }
}

impl From<NativeFn> for Value {
    fn from(v: NativeFn) -> Self {
        Value::Function(v)
    }
}
