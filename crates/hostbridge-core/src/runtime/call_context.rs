//! Call context bridging the host and native Rust functions.

use std::fmt;

use crate::convert::{FromValue, IntoValue};
use crate::{NativeError, NativePtr};

use super::{HandleHeap, ObjectHandle, ScriptHost, Value};

/// Context for native function calls.
///
/// Holds the call's argument slots, the return slot, and a mutable borrow of
/// the host so callbacks can push objects, change ownership or re-enter
/// dispatch.
///
/// ## Stack Positions
///
/// Positions follow host conventions: `1` is the first argument and negative
/// positions count back from the top (`-1` is the last argument). For
/// methods and accessors, position 1 is the receiver.
///
/// ```ignore
/// let this = ctx.this_ptr()?;
/// let x: f64 = ctx.get(2)?;
/// ctx.set_return(x * 2.0);
/// ```
pub struct CallContext<'vm> {
    /// Argument slots, receiver first
    slots: Vec<Value>,
    /// Return value slot
    return_slot: Value,
    host: &'vm mut dyn ScriptHost,
}

impl<'vm> CallContext<'vm> {
    /// Create a new call context over `args`.
    pub fn new(host: &'vm mut dyn ScriptHost, args: Vec<Value>) -> Self {
        Self {
            slots: args,
            return_slot: Value::Nil,
            host,
        }
    }

    /// Number of slots in the call.
    pub fn top(&self) -> usize {
        self.slots.len()
    }

    fn resolve(&self, lo: i32) -> Option<usize> {
        let top = self.slots.len() as i64;
        let idx = if lo < 0 { top + lo as i64 } else { lo as i64 - 1 };
        (0..top).contains(&idx).then_some(idx as usize)
    }

    /// Value at `lo`, or `nil` past the top.
    pub fn slot(&self, lo: i32) -> Value {
        self.resolve(lo)
            .map(|idx| self.slots[idx].clone())
            .unwrap_or_default()
    }

    /// True when the call has fewer than `|lo|` slots.
    ///
    /// Checks with a default accept absent positions.
    pub fn is_absent(&self, lo: i32) -> bool {
        (self.slots.len() as u64) < lo.unsigned_abs() as u64
    }

    /// Get a raw reference to a slot, failing past the top.
    pub fn arg(&self, lo: i32) -> Result<&Value, NativeError> {
        self.resolve(lo)
            .map(|idx| &self.slots[idx])
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index: lo,
                count: self.slots.len(),
            })
    }

    /// Get a typed argument value.
    ///
    /// Absent positions convert from `nil`, so `Option<T>` arguments may be
    /// omitted.
    pub fn get<T: FromValue>(&self, lo: i32) -> Result<T, NativeError> {
        T::from_value(&self.slot(lo)).map_err(NativeError::Conversion)
    }

    /// Set a typed return value.
    pub fn set_return<T: IntoValue>(&mut self, value: T) {
        self.return_slot = value.into_value();
    }

    /// Set the return value from a raw value.
    pub fn set_return_value(&mut self, value: Value) {
        self.return_slot = value;
    }

    pub fn return_value(&self) -> &Value {
        &self.return_slot
    }

    /// Consume the context, yielding the return value.
    pub fn into_return(self) -> Value {
        self.return_slot
    }

    /// Handle of the receiver in position 1.
    pub fn this_handle(&self) -> Result<ObjectHandle, NativeError> {
        match self.slots.first() {
            None => Err(NativeError::invalid_this("no slots available")),
            Some(value) => self.host.resolve_instance(value).ok_or_else(|| {
                NativeError::invalid_this(format!(
                    "expected a bridged object, got {}",
                    self.host.type_name_of(value)
                ))
            }),
        }
    }

    /// Native pointer of the receiver in position 1.
    ///
    /// Accepts bridged objects, raw pointers, array proxies and script
    /// tables extending an object.
    pub fn this_ptr(&self) -> Result<NativePtr, NativeError> {
        let value = self
            .slots
            .first()
            .ok_or_else(|| NativeError::invalid_this("no slots available"))?;
        if let Value::Object(handle) = value
            && self.host.heap().get(*handle).is_none()
        {
            return Err(NativeError::StaleHandle {
                index: handle.index,
            });
        }
        self.host.pointer_of(value).ok_or_else(|| {
            NativeError::invalid_this(format!(
                "expected a native pointer, got {}",
                self.host.type_name_of(value)
            ))
        })
    }

    pub fn host(&self) -> &dyn ScriptHost {
        &*self.host
    }

    pub fn host_mut(&mut self) -> &mut dyn ScriptHost {
        &mut *self.host
    }

    pub fn heap(&self) -> &HandleHeap {
        self.host.heap()
    }

    pub fn args(&self) -> &[Value] {
        &self.slots
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("slots", &self.slots)
            .field("return_slot", &self.return_slot)
            .finish_non_exhaustive()
    }
}
