//! Dispatch adapter: reads, writes, calls and operators on bridged values.
//!
//! Lookups first resolve what to do while the registry and tables are
//! borrowed, then drop the borrows and run native code. Native callbacks may
//! re-enter the bridge, so no borrow is held across a call.

use std::rc::Rc;

use tracing::trace;

use hostbridge_core::{
    Accessor, ArrayAccessor, DescriptorId, Key, NativeFn, ObjectHandle, Operator, ScriptError,
    TableBehavior, TableRef, Value,
};

use crate::Bridge;

/// What a read resolved to.
enum Lookup {
    Miss,
    Found(Value),
    /// Call with `(target, key)`.
    Keyed(NativeFn),
    /// Call with `(target)` for object getters, `()` for static ones.
    Getter(NativeFn),
    Array(Rc<ArrayAccessor>),
    /// Hooks of a table bridged after the fact.
    Fallback(Value),
}

/// What a write resolved to.
enum Store {
    Raw,
    /// Call with `(target, key, value)`.
    Keyed(NativeFn),
    /// Call with `(target, value)`.
    Setter(NativeFn),
    /// Call `(target, key, value)`, then store raw anyway.
    HookThenRaw(NativeFn),
    Peer,
    ConstArray,
}

fn key_of(bridge: &Bridge, key: &Value) -> Result<Key, ScriptError> {
    Key::from_value(key).ok_or_else(|| ScriptError::InvalidKey {
        type_name: bridge.type_name_of(key),
    })
}

impl Bridge {
    // ==========================================================================
    // Reads
    // ==========================================================================

    /// `target[key]`.
    ///
    /// A read that finds nothing yields `nil`; it never raises.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn index(&mut self, target: &Value, key: &Value) -> Result<Value, ScriptError> {
        let Some(k) = Key::from_value(key) else {
            return Ok(Value::Nil);
        };
        match target {
            Value::Object(h) => self.index_object(*h, k),
            Value::Class(id) => self.index_class(*id, k),
            Value::Table(t) => self.index_table(t, k),
            _ => Ok(Value::Nil),
        }
    }

    fn index_object(&mut self, handle: ObjectHandle, key: Key) -> Result<Value, ScriptError> {
        let entry = self
            .heap
            .get(handle)
            .ok_or(ScriptError::StaleHandle { index: handle.index })?;
        let (ptr, descriptor) = (entry.ptr, entry.tag.descriptor);

        // Script-side fields shadow everything registered.
        if let Some(peer) = &entry.peer {
            let value = peer.raw_get(&key);
            if !value.is_nil() {
                return Ok(value);
            }
        }

        let lookup = self.lookup_member(descriptor, &key, true);
        let this = Value::Object(handle);
        match lookup {
            Lookup::Miss | Lookup::Fallback(_) => Ok(Value::Nil),
            Lookup::Found(value) => Ok(value),
            Lookup::Keyed(get) => Ok(self.invoke(&get, vec![this, key.to_value()])?),
            Lookup::Getter(get) => Ok(self.invoke(&get, vec![this, key.to_value()])?),
            Lookup::Array(accessor) => {
                let proxy = TableRef::array_proxy(accessor, Some(ptr));
                if let Some(peer) = self.heap.ensure_peer(handle) {
                    peer.raw_set(key, Value::Table(proxy.clone()));
                }
                trace!(ptr = %ptr, "created array proxy");
                Ok(Value::Table(proxy))
            }
        }
    }

    fn index_class(&mut self, id: DescriptorId, key: Key) -> Result<Value, ScriptError> {
        match self.lookup_member(id, &key, false) {
            Lookup::Miss | Lookup::Fallback(_) | Lookup::Keyed(_) => Ok(Value::Nil),
            Lookup::Found(value) => Ok(value),
            Lookup::Getter(get) => Ok(self.invoke(&get, Vec::new())?),
            Lookup::Array(accessor) => {
                let proxy = Value::Table(TableRef::array_proxy(accessor, None));
                // Later reads find the proxy as a plain member.
                if let Some(descriptor) = self.registry.get_mut(id) {
                    descriptor.members.insert(key, proxy.clone());
                }
                Ok(proxy)
            }
        }
    }

    /// Walk the dispatch chain for a member.
    ///
    /// Numeric keys on objects only reach the index getters.
    fn lookup_member(&self, descriptor: DescriptorId, key: &Key, object: bool) -> Lookup {
        for d in self.registry.chain(descriptor) {
            if object && key.is_numeric() {
                if let Some(get) = &d.index_getter {
                    return Lookup::Keyed(get.clone());
                }
                continue;
            }
            if let Some(value) = d.member(key) {
                return Lookup::Found(value.clone());
            }
            if let Some(name) = key.as_str() {
                match d.getter(name) {
                    Some(Accessor::Function(get)) => return Lookup::Getter(get.clone()),
                    Some(Accessor::Array(accessor)) => return Lookup::Array(accessor.clone()),
                    None => {}
                }
            }
        }
        Lookup::Miss
    }

    fn index_table(&mut self, table: &TableRef, key: Key) -> Result<Value, ScriptError> {
        let lookup = {
            let t = table.borrow();
            let raw = t.raw_get(&key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            match t.behavior() {
                TableBehavior::Plain => Lookup::Miss,
                TableBehavior::Hooked(fallback) => {
                    fallback.index.clone().map_or(Lookup::Miss, Lookup::Fallback)
                }
                TableBehavior::Module(accessors) => {
                    match key.as_str().and_then(|name| accessors.getters.get(name)) {
                        Some(Accessor::Function(get)) => Lookup::Getter(get.clone()),
                        Some(Accessor::Array(accessor)) => Lookup::Array(accessor.clone()),
                        None => accessors
                            .fallback
                            .as_ref()
                            .and_then(|f| f.index.clone())
                            .map_or(Lookup::Miss, Lookup::Fallback),
                    }
                }
                TableBehavior::ArrayProxy(accessor) => Lookup::Keyed(accessor.get.clone()),
            }
        };

        match lookup {
            Lookup::Miss => Ok(Value::Nil),
            Lookup::Found(value) => Ok(value),
            Lookup::Keyed(get) => {
                Ok(self.invoke(&get, vec![Value::Table(table.clone()), key.to_value()])?)
            }
            Lookup::Getter(get) => Ok(self.invoke(&get, Vec::new())?),
            Lookup::Array(accessor) => {
                let proxy = Value::Table(TableRef::array_proxy(accessor, None));
                table.raw_set(key, proxy.clone());
                Ok(proxy)
            }
            Lookup::Fallback(Value::Function(f)) => {
                Ok(self.invoke(&f, vec![Value::Table(table.clone()), key.to_value()])?)
            }
            Lookup::Fallback(other) => self.index(&other, &key.to_value()),
        }
    }

    // ==========================================================================
    // Writes
    // ==========================================================================

    /// `target[key] = value`.
    ///
    /// A write no setter claims lands in the object's peer table (or the
    /// table itself) and shadows later reads.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn new_index(&mut self, target: &Value, key: &Value, value: Value) -> Result<(), ScriptError> {
        let k = key_of(self, key)?;
        match target {
            Value::Object(h) => self.new_index_object(*h, k, value),
            Value::Class(id) => self.new_index_class(*id, k, value),
            Value::Table(t) => self.new_index_table(t, k, value),
            other => Err(ScriptError::InvalidKey {
                type_name: self.type_name_of(other),
            }),
        }
    }

    fn new_index_object(&mut self, handle: ObjectHandle, key: Key, value: Value) -> Result<(), ScriptError> {
        let descriptor = self
            .heap
            .tag(handle)
            .ok_or(ScriptError::StaleHandle { index: handle.index })?
            .descriptor;

        let mut store = Store::Peer;
        for d in self.registry.chain(descriptor) {
            if key.is_numeric() {
                if let Some(set) = &d.index_setter {
                    store = Store::Keyed(set.clone());
                    break;
                }
            } else if let Some(set) = key.as_str().and_then(|name| d.setter(name)) {
                store = Store::Setter(set.clone());
                break;
            }
        }

        let this = Value::Object(handle);
        match store {
            Store::Keyed(set) => {
                self.invoke(&set, vec![this, key.to_value(), value])?;
            }
            Store::Setter(set) => {
                self.invoke(&set, vec![this, value])?;
            }
            _ => {
                if let Some(peer) = self.heap.ensure_peer(handle) {
                    peer.raw_set(key, value);
                }
            }
        }
        Ok(())
    }

    fn new_index_class(&mut self, id: DescriptorId, key: Key, value: Value) -> Result<(), ScriptError> {
        let setter = key
            .as_str()
            .and_then(|name| self.registry.get(id)?.setter(name).cloned());
        if let Some(set) = setter {
            self.invoke(&set, vec![Value::Class(id), value])?;
        } else if let Some(descriptor) = self.registry.get_mut(id) {
            if value.is_nil() {
                descriptor.members.remove(&key);
            } else {
                descriptor.members.insert(key, value);
            }
        }
        Ok(())
    }

    fn new_index_table(&mut self, table: &TableRef, key: Key, value: Value) -> Result<(), ScriptError> {
        let store = {
            let t = table.borrow();
            if t.contains(&key) {
                Store::Raw
            } else {
                match t.behavior() {
                    TableBehavior::Plain => Store::Raw,
                    TableBehavior::Hooked(fallback) => {
                        fallback.new_index.clone().map_or(Store::Raw, Store::Keyed)
                    }
                    TableBehavior::Module(accessors) => {
                        match key.as_str().and_then(|name| accessors.setters.get(name)) {
                            Some(set) => Store::Setter(set.clone()),
                            None => accessors
                                .fallback
                                .as_ref()
                                .and_then(|f| f.new_index.clone())
                                .map_or(Store::Raw, Store::HookThenRaw),
                        }
                    }
                    TableBehavior::ArrayProxy(accessor) => match &accessor.set {
                        Some(set) => Store::Keyed(set.clone()),
                        None => Store::ConstArray,
                    },
                }
            }
        };

        let this = Value::Table(table.clone());
        match store {
            Store::Raw | Store::Peer => table.raw_set(key, value),
            Store::Keyed(set) => {
                self.invoke(&set, vec![this, key.to_value(), value])?;
            }
            Store::Setter(set) => {
                self.invoke(&set, vec![this, value])?;
            }
            Store::HookThenRaw(hook) => {
                self.invoke(&hook, vec![this, key.to_value(), value.clone()])?;
                table.raw_set(key, value);
            }
            Store::ConstArray => return Err(ScriptError::ConstArray),
        }
        Ok(())
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// `target(args...)`.
    ///
    /// Class tables and objects are callable through a registered call
    /// handler, which receives the target as its first argument. A class
    /// only uses its own handler; objects search their dispatch chain.
    pub fn call(&mut self, target: &Value, mut args: Vec<Value>) -> Result<Value, ScriptError> {
        let handler = match target {
            Value::Function(f) => return Ok(self.invoke(f, args)?),
            Value::Class(id) => self.registry.get(*id).and_then(|d| d.call_handler.clone()),
            Value::Object(h) => self.heap.tag(*h).and_then(|tag| {
                self.registry
                    .chain(tag.descriptor)
                    .find_map(|d| d.call_handler.clone())
            }),
            _ => None,
        };
        let Some(handler) = handler else {
            return Err(ScriptError::NotCallable {
                type_name: self.type_name_of(target),
            });
        };
        args.insert(0, target.clone());
        Ok(self.invoke(&handler, args)?)
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    /// Apply a binary operator.
    ///
    /// The handler is looked up on the first operand's dispatch chain and
    /// called as `handler(lhs, rhs)`. Without one, `==` yields `false` and
    /// every other operator raises.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn operate(&mut self, op: Operator, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
        let handler = lhs
            .as_object()
            .and_then(|h| self.heap.tag(h))
            .and_then(|tag| {
                self.registry
                    .chain(tag.descriptor)
                    .find_map(|d| d.operator(op).cloned())
            });
        match handler {
            Some(f) => Ok(self.invoke(&f, vec![lhs.clone(), rhs.clone()])?),
            None if op.is_total() => Ok(Value::Bool(false)),
            None => Err(ScriptError::InvalidOperand {
                op,
                type_name: self.type_name_of(lhs),
            }),
        }
    }

    /// `lhs == rhs`.
    ///
    /// Raw-equal values are equal without consulting any handler. The `==`
    /// handler only runs when both operands are bridged objects; any other
    /// pairing compares unequal.
    pub fn equals(&mut self, lhs: &Value, rhs: &Value) -> Result<bool, ScriptError> {
        if lhs.raw_equal(rhs) {
            return Ok(true);
        }
        if !matches!((lhs, rhs), (Value::Object(_), Value::Object(_))) {
            return Ok(false);
        }
        Ok(self.operate(Operator::Eq, lhs, rhs)?.is_truthy())
    }

    pub fn less_than(&mut self, lhs: &Value, rhs: &Value) -> Result<bool, ScriptError> {
        Ok(self.operate(Operator::Lt, lhs, rhs)?.is_truthy())
    }

    pub fn less_equal(&mut self, lhs: &Value, rhs: &Value) -> Result<bool, ScriptError> {
        Ok(self.operate(Operator::Le, lhs, rhs)?.is_truthy())
    }
}
