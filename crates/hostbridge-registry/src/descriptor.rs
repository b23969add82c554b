//! Per-type metadata records.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use hostbridge_core::{
    Accessor, ArrayAccessor, DescriptorId, IdentityScope, Key, NativeFn, Operator, Value,
};

/// Metadata for one registered native type.
///
/// Every class name gets two descriptors: `T` and its `const T` shadow. The
/// non-const descriptor carries the class members; the const shadow reaches
/// them through its dispatch parent.
///
/// Two relations hang off a descriptor and are kept apart:
///
/// - `parent` is the dispatch chain, walked on member lookup
/// - `supers` is the transitively closed is-a row, consulted by type checks
#[derive(Debug)]
pub struct TypeDescriptor {
    id: DescriptorId,
    name: Rc<str>,
    is_const: bool,

    /// Next descriptor on the member lookup chain.
    pub(crate) parent: Option<DescriptorId>,
    /// Every type this one "is also a". Identity is not stored.
    pub(crate) supers: FxHashSet<DescriptorId>,
    /// Weak identity map partition shared by an inheritance chain.
    pub(crate) identity_scope: Option<IdentityScope>,

    /// Methods, constants and nested classes/modules, plus raw script writes.
    pub members: FxHashMap<Key, Value>,
    /// Named property getters.
    pub getters: FxHashMap<Rc<str>, Accessor>,
    /// Named property setters.
    pub setters: FxHashMap<Rc<str>, NativeFn>,
    /// Getter for numeric keys, called as `get(obj, index)`.
    pub index_getter: Option<NativeFn>,
    /// Setter for numeric keys, called as `set(obj, index, value)`.
    pub index_setter: Option<NativeFn>,
    pub operators: FxHashMap<Operator, NativeFn>,
    /// Destructor run by finalize for bridge-owned objects.
    pub collector: Option<NativeFn>,
    /// Handler for calling the class table or an instance.
    pub call_handler: Option<NativeFn>,
}

impl TypeDescriptor {
    pub(crate) fn new(id: DescriptorId, name: &str, is_const: bool) -> Self {
        Self {
            id,
            name: Rc::from(name),
            is_const,
            parent: None,
            supers: FxHashSet::default(),
            identity_scope: None,
            members: FxHashMap::default(),
            getters: FxHashMap::default(),
            setters: FxHashMap::default(),
            index_getter: None,
            index_setter: None,
            operators: FxHashMap::default(),
            collector: None,
            call_handler: None,
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    /// Dispatch parent, if inheritance was declared.
    pub fn parent(&self) -> Option<DescriptorId> {
        self.parent
    }

    pub fn supers(&self) -> impl Iterator<Item = DescriptorId> + '_ {
        self.supers.iter().copied()
    }

    /// Identity scope; types that never declared inheritance share the
    /// global one.
    pub fn identity_scope(&self) -> IdentityScope {
        self.identity_scope.unwrap_or(IdentityScope::GLOBAL)
    }

    pub fn member(&self, key: &Key) -> Option<&Value> {
        self.members.get(key)
    }

    pub fn set_member(&mut self, name: &str, value: impl Into<Value>) {
        self.members.insert(Key::str(name), value.into());
    }

    pub fn add_getter(&mut self, name: &str, getter: NativeFn) {
        self.getters.insert(Rc::from(name), Accessor::Function(getter));
    }

    pub fn add_setter(&mut self, name: &str, setter: NativeFn) {
        self.setters.insert(Rc::from(name), setter);
    }

    /// Register an array-typed member; without `set` it is read-only.
    pub fn add_array(&mut self, name: &str, get: NativeFn, set: Option<NativeFn>) {
        let accessor = ArrayAccessor {
            name: Rc::from(name),
            get,
            set,
        };
        self.getters
            .insert(Rc::from(name), Accessor::Array(Rc::new(accessor)));
    }

    pub fn getter(&self, name: &str) -> Option<&Accessor> {
        self.getters.get(name)
    }

    pub fn setter(&self, name: &str) -> Option<&NativeFn> {
        self.setters.get(name)
    }

    pub fn operator(&self, op: Operator) -> Option<&NativeFn> {
        self.operators.get(&op)
    }
}
