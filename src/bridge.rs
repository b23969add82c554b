//! The bridge service.
//!
//! [`Bridge`] owns the type registry, the handle heap, the identity map, the
//! ownership ledger and the registration scope tree. It is the only way to
//! reach them: native callbacks see it through [`ScriptHost`], binding code
//! through the registration API, and the host runtime through the dispatch
//! entry points.

use tracing::{debug, trace, warn};

use hostbridge_core::{
    CallContext, DescriptorId, HandleHeap, NativeError, NativeFn, NativePtr, ObjectHandle,
    Ownership, RegistrationError, ScriptError, ScriptHost, TableRef, Value,
};
use hostbridge_registry::{ModuleTree, TypeRegistry};

use crate::identity::Interned;
use crate::{BridgeConfig, IdentityMap, OwnershipLedger};

/// Process-wide binding state for one host runtime.
pub struct Bridge {
    pub(crate) config: BridgeConfig,
    pub(crate) registry: TypeRegistry,
    pub(crate) heap: HandleHeap,
    pub(crate) identity: IdentityMap,
    pub(crate) ledger: OwnershipLedger,
    pub(crate) modules: ModuleTree,
    collecting: bool,
    pub(crate) opened: bool,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    /// Create a bridge with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let registry = TypeRegistry::with_names(&config.common_class, &config.const_prefix);
        Self {
            config,
            registry,
            heap: HandleHeap::new(),
            identity: IdentityMap::new(),
            ledger: OwnershipLedger::new(),
            modules: ModuleTree::new(TableRef::new()),
            collecting: false,
            opened: false,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn heap(&self) -> &HandleHeap {
        &self.heap
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    /// The host's global table.
    pub fn globals(&self) -> TableRef {
        self.modules.globals().cloned().unwrap_or_default()
    }

    // ==========================================================================
    // Type Registry
    // ==========================================================================

    /// Register `name` and its const shadow. See [`TypeRegistry::register_type`].
    pub fn register_type(&mut self, name: &str) -> bool {
        self.registry.register_type(name)
    }

    /// See [`TypeRegistry::declare_inheritance`].
    pub fn declare_inheritance(
        &mut self,
        derived: &str,
        base: Option<&str>,
        collector: Option<NativeFn>,
    ) -> Result<bool, RegistrationError> {
        self.registry.declare_inheritance(derived, base, collector)
    }

    /// See [`TypeRegistry::add_super`].
    pub fn add_super(&mut self, derived: &str, base: &str) -> Result<(), RegistrationError> {
        self.registry.add_super(derived, base)
    }

    pub fn find_type(&self, name: &str) -> Option<DescriptorId> {
        self.registry.find(name)
    }

    /// Name-based subtype test.
    pub fn is_a(&self, derived: &str, base: &str) -> bool {
        self.registry.is_a_name(derived, base)
    }

    // ==========================================================================
    // Identity Map
    // ==========================================================================

    /// Intern `ptr` as `descriptor`; null pointers yield `nil`.
    pub fn intern(&mut self, ptr: NativePtr, descriptor: DescriptorId, add_to_root: bool) -> Value {
        match self.identity.intern(
            &mut self.heap,
            &self.registry,
            &self.ledger,
            ptr,
            descriptor,
            add_to_root,
        ) {
            Interned::Null => Value::Nil,
            Interned::Existing(h) | Interned::Created(h) => Value::Object(h),
        }
    }

    /// Push a native object, reusing its live handle if there is one.
    pub fn push_usertype(&mut self, ptr: NativePtr, type_name: &str) -> Result<Value, RegistrationError> {
        let descriptor = self.registry.require(type_name)?;
        Ok(self.intern(ptr, descriptor, false))
    }

    /// Push a native object and root it.
    pub fn push_usertype_and_add_to_root(
        &mut self,
        ptr: NativePtr,
        type_name: &str,
    ) -> Result<Value, RegistrationError> {
        let descriptor = self.registry.require(type_name)?;
        Ok(self.intern(ptr, descriptor, true))
    }

    /// Push a native object and hand its destruction to the bridge.
    ///
    /// Unlike [`take_ownership`](Self::take_ownership) this runs no
    /// collection cycle first.
    pub fn push_usertype_and_take_ownership(
        &mut self,
        ptr: NativePtr,
        type_name: &str,
    ) -> Result<Value, RegistrationError> {
        let value = self.push_usertype(ptr, type_name)?;
        if let Value::Object(h) = value {
            self.claim(h);
        }
        Ok(value)
    }

    /// Root the live handle of `ptr`; false if it has none or is already rooted.
    pub fn add_to_root(&mut self, ptr: NativePtr) -> bool {
        match self.identity.find(&self.heap, ptr) {
            Some(handle) => self.identity.add_to_root(&mut self.heap, ptr, handle),
            None => false,
        }
    }

    pub fn remove_from_root(&mut self, ptr: NativePtr) -> bool {
        self.identity.remove_from_root(&mut self.heap, ptr)
    }

    /// Record one more host reference to `value`.
    pub fn retain(&mut self, value: &Value) -> bool {
        match value {
            Value::Object(h) => self.heap.add_ref(*h),
            _ => false,
        }
    }

    /// Drop one host reference to `value`.
    ///
    /// Returns true when this made the handle unreachable; it is finalized
    /// by the next [`collect_garbage`](Self::collect_garbage).
    pub fn release(&mut self, value: &Value) -> bool {
        match value {
            Value::Object(h) => self.heap.release(*h),
            _ => false,
        }
    }

    /// Peer table of a handle, if one was created.
    pub fn peer(&self, handle: ObjectHandle) -> Option<TableRef> {
        self.heap.peer(handle)
    }

    pub fn set_peer(&mut self, handle: ObjectHandle, peer: Option<TableRef>) -> bool {
        self.heap.set_peer(handle, peer)
    }

    // ==========================================================================
    // Ownership Ledger
    // ==========================================================================

    fn claim(&mut self, handle: ObjectHandle) -> bool {
        let Some(entry) = self.heap.get_mut(handle) else {
            return false;
        };
        if !self.ledger.take(entry.ptr, entry.tag.descriptor) {
            debug!(ptr = %entry.ptr, "ownership already claimed");
            return false;
        }
        entry.tag.ownership = Ownership::Owned;
        debug!(ptr = %entry.ptr, descriptor = %entry.tag.descriptor, "took ownership");
        true
    }

    /// Make the bridge responsible for destroying the object.
    ///
    /// Fails if the handle is stale or its pointer is already owned.
    pub fn take_ownership(&mut self, handle: ObjectHandle) -> bool {
        if self.heap.get(handle).is_none() {
            return false;
        }
        if self.config.collect_on_ownership_change {
            self.collect_garbage();
        }
        self.claim(handle)
    }

    /// Return responsibility for the object to native code.
    ///
    /// Succeeds only if the ledger recorded exactly the handle's current
    /// descriptor.
    pub fn release_ownership(&mut self, handle: ObjectHandle) -> bool {
        if self.heap.get(handle).is_none() {
            return false;
        }
        if self.config.collect_on_ownership_change {
            self.collect_garbage();
        }
        let Some(entry) = self.heap.get_mut(handle) else {
            return false;
        };
        if !self.ledger.release(entry.ptr, entry.tag.descriptor) {
            return false;
        }
        entry.tag.ownership = Ownership::Borrowed;
        debug!(ptr = %entry.ptr, "released ownership");
        true
    }

    /// Run the collector for an unreachable handle the bridge owns.
    ///
    /// Returns true if the ledger entry was consumed. Objects the bridge
    /// does not own, and handles whose type no longer matches the ledger,
    /// are left to native code. So is a pointer that was interned again
    /// under a live handle while this one was pending.
    pub fn finalize(&mut self, handle: ObjectHandle) -> bool {
        let Some(entry) = self.heap.get(handle) else {
            return false;
        };
        let (ptr, current) = (entry.ptr, entry.tag.descriptor);
        let Some(recorded) = self.ledger.get(ptr) else {
            return false;
        };
        if !self.registry.is_a(current, recorded) {
            debug!(
                ptr = %ptr,
                current = self.registry.name(current).unwrap_or("?"),
                recorded = self.registry.name(recorded).unwrap_or("?"),
                "ledger type mismatch; not finalizing"
            );
            return false;
        }
        // the address came back while this handle was pending
        let scope = self.registry.identity_scope(current);
        if let Some(live) = self.identity.lookup(&self.heap, scope, ptr)
            && live != handle
        {
            debug!(ptr = %ptr, ?live, "pointer reused by a live handle; not finalizing");
            return false;
        }

        let collector = self
            .registry
            .collector(current)
            .cloned()
            .or_else(|| self.config.default_collector.clone());
        match collector {
            Some(collector) => {
                trace!(ptr = %ptr, collector = collector.name(), "running collector");
                if let Err(err) = self.invoke(&collector, vec![Value::Object(handle)]) {
                    warn!(ptr = %ptr, error = %err, "collector failed");
                }
            }
            None => warn!(
                ptr = %ptr,
                type_name = self.registry.name(current).unwrap_or("?"),
                "owned object has no collector; leaking"
            ),
        }
        self.ledger.remove(ptr);
        true
    }

    /// Sweep every handle that became unreachable.
    ///
    /// Owned objects are finalized, then their identity entries and slots
    /// are dropped. Collectors may release further handles; those are swept
    /// in the same call. Returns the number of handles freed.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn collect_garbage(&mut self) -> usize {
        if self.collecting {
            return 0;
        }
        self.collecting = true;

        let mut swept = 0;
        loop {
            let pending = self.heap.take_pending();
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                let Some(ptr) = self.heap.ptr(handle) else {
                    continue;
                };
                self.finalize(handle);
                self.identity.forget(ptr, handle);
                self.heap.free(handle);
                swept += 1;
            }
        }

        self.collecting = false;
        if swept > 0 {
            debug!(swept, "collected handles");
        }
        swept
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    /// Runtime type name of a value.
    ///
    /// Objects report their descriptor name, class tables `class <name>`,
    /// everything else the host type name.
    pub fn type_name_of(&self, value: &Value) -> String {
        match value {
            Value::Object(h) => self
                .heap
                .tag(*h)
                .and_then(|tag| self.registry.name(tag.descriptor))
                .unwrap_or("[undefined]")
                .to_string(),
            Value::Class(id) => match self.registry.name(*id) {
                Some(name) => format!("class {name}"),
                None => "table".to_string(),
            },
            other => other.type_name().to_string(),
        }
    }

    /// Call a native function with `args`, returning its result.
    pub fn invoke(&mut self, f: &NativeFn, args: Vec<Value>) -> Result<Value, NativeError> {
        let mut ctx = CallContext::new(self, args);
        f.call(&mut ctx)?;
        Ok(ctx.into_return())
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("heap", &self.heap)
            .field("identity_entries", &self.identity.len())
            .field("owned", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

impl ScriptHost for Bridge {
    fn heap(&self) -> &HandleHeap {
        &self.heap
    }

    fn heap_mut(&mut self) -> &mut HandleHeap {
        &mut self.heap
    }

    fn find_type(&self, name: &str) -> Option<DescriptorId> {
        self.registry.find(name)
    }

    fn descriptor_name(&self, id: DescriptorId) -> Option<&str> {
        self.registry.name(id)
    }

    fn const_variant(&self, id: DescriptorId) -> Option<DescriptorId> {
        let descriptor = self.registry.get(id)?;
        if descriptor.is_const() {
            return Some(id);
        }
        self.registry.find(&self.registry.const_name(descriptor.name()))
    }

    fn is_a(&self, derived: DescriptorId, base: DescriptorId) -> bool {
        self.registry.is_a(derived, base)
    }

    fn type_name_of(&self, value: &Value) -> String {
        Bridge::type_name_of(self, value)
    }

    fn push_usertype(
        &mut self,
        ptr: NativePtr,
        type_name: &str,
        add_to_root: bool,
    ) -> Result<Value, NativeError> {
        let descriptor = self.registry.require(type_name)?;
        Ok(self.intern(ptr, descriptor, add_to_root))
    }

    fn take_ownership(&mut self, handle: ObjectHandle) -> bool {
        Bridge::take_ownership(self, handle)
    }

    fn release_ownership(&mut self, handle: ObjectHandle) -> bool {
        Bridge::release_ownership(self, handle)
    }

    fn index(&mut self, target: &Value, key: &Value) -> Result<Value, ScriptError> {
        Bridge::index(self, target, key)
    }

    fn new_index(&mut self, target: &Value, key: &Value, value: Value) -> Result<(), ScriptError> {
        Bridge::new_index(self, target, key, value)
    }

    fn call(&mut self, target: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        Bridge::call(self, target, args)
    }
}
