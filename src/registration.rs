//! Registration API used by generated binding code.
//!
//! Registration is scope based: [`Bridge::begin_module`] opens a module or
//! class registered in the current scope, and member registrations land in
//! whatever scope is innermost.
//!
//! ```
//! use hostbridge::{Bridge, NativeFn, Value};
//!
//! let mut bridge = Bridge::new();
//! bridge.begin_module("").unwrap();
//! bridge.module("geo", true).unwrap();
//! bridge.begin_module("geo").unwrap();
//! bridge.constant("ORIGIN", 0).unwrap();
//! bridge.class("Point", "Point", None, None).unwrap();
//! bridge.begin_module("Point").unwrap();
//! bridge.function("new", NativeFn::new("Point.new", |_ctx: &mut hostbridge::CallContext| Ok(()))).unwrap();
//! bridge.end_module().unwrap();
//! bridge.end_module().unwrap();
//! bridge.end_module().unwrap();
//!
//! let geo = bridge.globals().raw_get_str("geo");
//! assert_eq!(bridge.index(&geo, &Value::from("ORIGIN")).unwrap(), Value::Number(0.0));
//! ```

use std::rc::Rc;

use tracing::debug;

use hostbridge_core::{
    Accessor, ArrayAccessor, BridgeError, DescriptorId, Key, ModuleAccessors, NativeFn, Operator,
    RegistrationError, TableBehavior, TableRef, Value,
};
use hostbridge_registry::{ScopeNode, TypeDescriptor};

use crate::{library, Bridge};

/// Turn a table into a module table, keeping any hooks it carried.
fn ensure_module(table: &TableRef, name: &str) -> Result<(), RegistrationError> {
    let mut t = table.borrow_mut();
    let fallback = match t.behavior() {
        TableBehavior::Module(_) => return Ok(()),
        TableBehavior::Plain => None,
        TableBehavior::Hooked(fallback) => Some(fallback.clone()),
        TableBehavior::ArrayProxy(_) => {
            return Err(RegistrationError::InvalidMember {
                name: name.to_string(),
                kind: "variable",
                reason: "array proxies cannot hold variables",
            });
        }
    };
    t.set_behavior(TableBehavior::Module(ModuleAccessors {
        fallback,
        ..ModuleAccessors::default()
    }));
    Ok(())
}

impl Bridge {
    /// Install the built-in library under the configured module name.
    ///
    /// Only the first call has an effect.
    pub fn open(&mut self) -> Result<(), BridgeError> {
        if self.opened {
            return Ok(());
        }
        self.opened = true;
        let Some(name) = self.config.library_module.clone() else {
            return Ok(());
        };
        self.modules.begin_root();
        self.module(&name, false)?;
        self.begin_module(&name)?;
        library::register(self)?;
        self.end_module()?;
        self.end_module()?;
        debug!(module = %name, "opened library");
        Ok(())
    }

    fn current_scope(&self) -> Result<ScopeNode, RegistrationError> {
        self.modules.current_node().cloned()
    }

    fn scope_get(&self, scope: &ScopeNode, name: &str) -> Value {
        match scope {
            ScopeNode::Module(table) => table.raw_get_str(name),
            ScopeNode::Class(id) => self
                .registry
                .get(*id)
                .and_then(|d| d.member(&Key::str(name)).cloned())
                .unwrap_or_default(),
        }
    }

    fn scope_set(&mut self, scope: &ScopeNode, name: &str, value: Value) -> Result<(), RegistrationError> {
        match scope {
            ScopeNode::Module(table) => table.raw_set_str(name, value),
            ScopeNode::Class(id) => self.class_mut(*id)?.set_member(name, value),
        }
        Ok(())
    }

    fn class_mut(&mut self, id: DescriptorId) -> Result<&mut TypeDescriptor, RegistrationError> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| RegistrationError::TypeNotFound(id.to_string()))
    }

    fn class_scope(&mut self, name: &str, kind: &'static str) -> Result<&mut TypeDescriptor, RegistrationError> {
        match self.current_scope()? {
            ScopeNode::Class(id) => self.class_mut(id),
            ScopeNode::Module(_) => Err(RegistrationError::InvalidMember {
                name: name.to_string(),
                kind,
                reason: "only classes can hold this member",
            }),
        }
    }

    // ==========================================================================
    // Scopes
    // ==========================================================================

    /// Create module `name` in the current scope, reusing an existing table.
    ///
    /// With `has_var` the table can hold variables. An empty name refers to
    /// the current scope itself.
    pub fn module(&mut self, name: &str, has_var: bool) -> Result<(), RegistrationError> {
        let scope = self.current_scope()?;
        if name.is_empty() {
            if has_var && let ScopeNode::Module(table) = &scope {
                ensure_module(table, name)?;
            }
            return Ok(());
        }

        let table = match self.scope_get(&scope, name) {
            Value::Table(existing) => existing,
            _ => {
                let table = TableRef::new();
                self.scope_set(&scope, name, Value::Table(table.clone()))?;
                table
            }
        };
        if has_var {
            ensure_module(&table, name)?;
        }
        let parent = self.modules.current()?;
        self.modules.set_child(parent, name, ScopeNode::Module(table));
        debug!(module = name, has_var, "registered module");
        Ok(())
    }

    /// Open scope `name`; an empty name opens the global scope.
    ///
    /// Tables and classes already stored in the current scope can be opened
    /// even if they were not created through this API.
    pub fn begin_module(&mut self, name: &str) -> Result<(), RegistrationError> {
        if name.is_empty() {
            self.modules.begin_root();
            return Ok(());
        }
        match self.modules.begin(name) {
            Err(RegistrationError::NotAScope(_)) => {
                let scope = self.current_scope()?;
                let node = match self.scope_get(&scope, name) {
                    Value::Table(table) => ScopeNode::Module(table),
                    Value::Class(id) => ScopeNode::Class(id),
                    _ => return Err(RegistrationError::NotAScope(name.to_string())),
                };
                let parent = self.modules.current()?;
                self.modules.set_child(parent, name, node);
                self.modules.begin(name)?;
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    pub fn end_module(&mut self) -> Result<(), RegistrationError> {
        self.modules.end()
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    /// Register class `name` as `lname` in the current scope.
    ///
    /// `base` of `None` (or `""`) roots the class at the common class. The
    /// collector destroys bridge-owned instances.
    pub fn class(
        &mut self,
        lname: &str,
        name: &str,
        base: Option<&str>,
        collector: Option<NativeFn>,
    ) -> Result<(), RegistrationError> {
        let scope = self.current_scope()?;
        self.registry.declare_inheritance(name, base, collector)?;
        let id = self.registry.require(name)?;
        self.scope_set(&scope, lname, Value::Class(id))?;
        let parent = self.modules.current()?;
        self.modules.set_child(parent, lname, ScopeNode::Class(id));
        Ok(())
    }

    /// Record an additional is-a relation without touching dispatch.
    pub fn add_base(&mut self, name: &str, base: &str) -> Result<(), RegistrationError> {
        self.registry.add_super(name, base)
    }

    /// Register a function (or method, inside a class scope).
    pub fn function(&mut self, name: &str, f: NativeFn) -> Result<(), RegistrationError> {
        let scope = self.current_scope()?;
        self.scope_set(&scope, name, Value::Function(f))
    }

    pub fn constant(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RegistrationError> {
        let scope = self.current_scope()?;
        self.scope_set(&scope, name, value.into())
    }

    /// Register a variable read through `get` and written through `set`.
    ///
    /// Module getters are called with no arguments and setters with
    /// `(module, value)`; class getters get `(obj, key)` and setters
    /// `(obj, value)`. Without a setter, writes land in the peer table (or
    /// the module table) and shadow the getter.
    pub fn variable(&mut self, name: &str, get: NativeFn, set: Option<NativeFn>) -> Result<(), RegistrationError> {
        match self.current_scope()? {
            ScopeNode::Module(table) => {
                ensure_module(&table, name)?;
                let mut t = table.borrow_mut();
                if let TableBehavior::Module(accessors) = t.behavior_mut() {
                    accessors.getters.insert(Rc::from(name), Accessor::Function(get));
                    if let Some(set) = set {
                        accessors.setters.insert(Rc::from(name), set);
                    }
                }
            }
            ScopeNode::Class(id) => {
                let descriptor = self.class_mut(id)?;
                descriptor.add_getter(name, get);
                if let Some(set) = set {
                    descriptor.add_setter(name, set);
                }
            }
        }
        Ok(())
    }

    /// Register an array-typed variable, read-only without `set`.
    pub fn array(&mut self, name: &str, get: NativeFn, set: Option<NativeFn>) -> Result<(), RegistrationError> {
        match self.current_scope()? {
            ScopeNode::Module(table) => {
                ensure_module(&table, name)?;
                let accessor = Rc::new(ArrayAccessor {
                    name: Rc::from(name),
                    get,
                    set,
                });
                if let TableBehavior::Module(accessors) = table.borrow_mut().behavior_mut() {
                    accessors.getters.insert(Rc::from(name), Accessor::Array(accessor));
                }
            }
            ScopeNode::Class(id) => self.class_mut(id)?.add_array(name, get, set),
        }
        Ok(())
    }

    /// Register a binary operator handler on the current class.
    pub fn operator(&mut self, op: Operator, f: NativeFn) -> Result<(), RegistrationError> {
        self.class_scope(op.member_name(), "operator")?
            .operators
            .insert(op, f);
        Ok(())
    }

    /// Register handlers for numeric keys on the current class.
    pub fn index_accessor(&mut self, get: NativeFn, set: Option<NativeFn>) -> Result<(), RegistrationError> {
        let descriptor = self.class_scope(".geti", "index accessor")?;
        descriptor.index_getter = Some(get);
        descriptor.index_setter = set;
        Ok(())
    }

    /// Make the current class table callable.
    pub fn set_call_handler(&mut self, f: NativeFn) -> Result<(), RegistrationError> {
        self.class_scope(".call", "call handler")?.call_handler = Some(f);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> NativeFn {
        NativeFn::new(name, |_ctx: &mut hostbridge_core::CallContext| Ok(()))
    }

    #[test]
    fn members_need_a_scope() {
        let mut bridge = Bridge::new();
        assert_eq!(
            bridge.function("f", noop("f")),
            Err(RegistrationError::NoScope)
        );
        assert_eq!(bridge.end_module(), Err(RegistrationError::ScopeUnderflow));
    }

    #[test]
    fn class_is_stored_in_scope() {
        let mut bridge = Bridge::new();
        bridge.begin_module("").unwrap();
        bridge.class("Vec", "Vector3", None, None).unwrap();
        let id = bridge.find_type("Vector3").unwrap();
        assert_eq!(bridge.globals().raw_get_str("Vec"), Value::Class(id));

        bridge.begin_module("Vec").unwrap();
        bridge.function("len", noop("len")).unwrap();
        bridge.end_module().unwrap();

        let descriptor = bridge.registry().get(id).unwrap();
        assert!(descriptor.member(&Key::str("len")).is_some());
    }

    #[test]
    fn operators_only_in_classes() {
        let mut bridge = Bridge::new();
        bridge.begin_module("").unwrap();
        assert!(matches!(
            bridge.operator(Operator::Add, noop("add")),
            Err(RegistrationError::InvalidMember { kind: "operator", .. })
        ));
    }

    #[test]
    fn module_reuses_existing_table_and_keeps_hooks() {
        let mut bridge = Bridge::new();
        let existing = TableRef::with_fallback(hostbridge_core::Fallback {
            index: Some(Value::from("fallback")),
            new_index: None,
        });
        bridge.globals().raw_set_str("m", existing.clone());

        bridge.begin_module("").unwrap();
        bridge.module("m", true).unwrap();
        let stored = bridge.globals().raw_get_str("m");
        assert!(stored.as_table().unwrap().ptr_eq(&existing));
        match existing.borrow().behavior() {
            TableBehavior::Module(accessors) => assert!(accessors.fallback.is_some()),
            other => panic!("expected module table, got {other:?}"),
        }
    }

    #[test]
    fn begin_unknown_scope_fails() {
        let mut bridge = Bridge::new();
        bridge.begin_module("").unwrap();
        assert_eq!(
            bridge.begin_module("nope"),
            Err(RegistrationError::NotAScope("nope".into()))
        );
    }
}
