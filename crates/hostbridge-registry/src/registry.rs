//! TypeRegistry - descriptors, dispatch chains and the super relation.
//!
//! # Storage Model
//!
//! - **Descriptors**: stored in a `Vec` indexed by [`DescriptorId`]; they are
//!   never removed, so ids stay valid for the registry's lifetime.
//! - **Names**: `name -> id` index. Each class name `T` owns two entries,
//!   `T` and `const T`.
//! - **Common class**: a sentinel root created with the registry. Classes
//!   declared without a base chain to it.
//!
//! # Super Relation
//!
//! Each descriptor keeps a set of every type it "is also a". Declaring
//! `derived : base` copies `base`'s row into `derived`'s row and adds the
//! direct edge. Rows are append-only. Rows added to a type later are pushed
//! down to every type that already lists it, so `is_a` stays a single set
//! probe regardless of the order declarations arrive in.
//!
//! # Example
//!
//! ```
//! use hostbridge_registry::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_type("Base");
//! registry.register_type("Derived");
//! registry.declare_inheritance("Derived", Some("Base"), None).unwrap();
//!
//! let derived = registry.find("Derived").unwrap();
//! let base = registry.find("const Base").unwrap();
//! assert!(registry.is_a(derived, base));
//! ```

use rustc_hash::FxHashMap;
use tracing::debug;

use hostbridge_core::{DescriptorId, IdentityScope, NativeFn, RegistrationError};

use crate::TypeDescriptor;

/// Default name of the sentinel root class.
pub const COMMON_CLASS: &str = "hostbridge_commonclass";

/// Default prefix of const shadow descriptors.
pub const CONST_PREFIX: &str = "const ";

/// Central storage for type descriptors.
///
/// Not thread-safe: registration and dispatch run on the host's single
/// thread.
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    by_name: FxHashMap<String, DescriptorId>,
    const_prefix: String,
    common_class: DescriptorId,
    next_scope: u32,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry with the default common class and const prefix.
    pub fn new() -> Self {
        Self::with_names(COMMON_CLASS, CONST_PREFIX)
    }

    pub fn with_names(common_class: &str, const_prefix: &str) -> Self {
        let mut registry = Self {
            descriptors: Vec::new(),
            by_name: FxHashMap::default(),
            const_prefix: const_prefix.to_string(),
            common_class: DescriptorId::new(0),
            next_scope: 1,
        };
        registry.common_class = registry.insert(common_class, false);
        registry
    }

    fn insert(&mut self, name: &str, is_const: bool) -> DescriptorId {
        let id = DescriptorId::new(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor::new(id, name, is_const));
        self.by_name.insert(name.to_string(), id);
        id
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn common_class(&self) -> DescriptorId {
        self.common_class
    }

    pub fn const_prefix(&self) -> &str {
        &self.const_prefix
    }

    pub fn get(&self, id: DescriptorId) -> Option<&TypeDescriptor> {
        self.descriptors.get(id.index() as usize)
    }

    pub fn get_mut(&mut self, id: DescriptorId) -> Option<&mut TypeDescriptor> {
        self.descriptors.get_mut(id.index() as usize)
    }

    /// Find a descriptor by name (`"T"` or `"const T"`).
    pub fn find(&self, name: &str) -> Option<DescriptorId> {
        self.by_name.get(name).copied()
    }

    /// Find a descriptor by name, failing with `TypeNotFound`.
    pub fn require(&self, name: &str) -> Result<DescriptorId, RegistrationError> {
        self.find(name)
            .ok_or_else(|| RegistrationError::TypeNotFound(name.to_string()))
    }

    pub fn name(&self, id: DescriptorId) -> Option<&str> {
        self.get(id).map(|d| d.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Name of the const shadow of `name`.
    pub fn const_name(&self, name: &str) -> String {
        format!("{}{}", self.const_prefix, name)
    }

    /// Number of descriptors, including const shadows and the common class.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter()
    }

    /// Walk the dispatch chain starting at `id` (inclusive).
    pub fn chain(&self, id: DescriptorId) -> ChainIter<'_> {
        ChainIter {
            registry: self,
            next: Some(id),
            remaining: self.descriptors.len(),
        }
    }

    pub fn identity_scope(&self, id: DescriptorId) -> IdentityScope {
        self.get(id)
            .map(|d| d.identity_scope())
            .unwrap_or(IdentityScope::GLOBAL)
    }

    pub fn collector(&self, id: DescriptorId) -> Option<&NativeFn> {
        self.get(id).and_then(|d| d.collector.as_ref())
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register `name` and its const shadow.
    ///
    /// Returns false if either already existed; existing descriptors are left
    /// untouched.
    pub fn register_type(&mut self, name: &str) -> bool {
        let const_name = self.const_name(name);
        let const_existed = self.contains(&const_name);
        let existed = self.contains(name);

        let const_id = match self.find(&const_name) {
            Some(id) => id,
            None => self.insert(&const_name, true),
        };
        let id = match self.find(name) {
            Some(id) => id,
            None => self.insert(name, false),
        };

        if const_existed || existed {
            return false;
        }

        // `T` is also a `const T`
        self.link_super(id, const_id);
        debug!(type_name = name, id = %id, "registered type");
        true
    }

    /// Declare `derived` as inheriting from `base` (or the common class).
    ///
    /// Sets the dispatch parent of `derived` and `const derived`, shares the
    /// base's identity scope (or allocates a fresh one), extends both super
    /// rows and stores the collector on both variants.
    ///
    /// `derived` is registered on demand. A type's dispatch parent is set
    /// once: a second declaration for the same type changes nothing and
    /// returns `Ok(false)`.
    pub fn declare_inheritance(
        &mut self,
        derived: &str,
        base: Option<&str>,
        collector: Option<NativeFn>,
    ) -> Result<bool, RegistrationError> {
        let base = base.filter(|b| !b.is_empty());
        let base_ids = match base {
            Some(b) => Some((self.require(b)?, self.require(&self.const_name(b))?)),
            None => None,
        };

        self.register_type(derived);
        let id = self.require(derived)?;
        let const_id = self.require(&self.const_name(derived))?;

        if let Some(existing) = self.descriptors[id.index() as usize].parent {
            debug!(
                type_name = derived,
                parent = self.name(existing).unwrap_or("?"),
                "inheritance already declared; ignoring redeclaration"
            );
            return Ok(false);
        }

        let scope = match base_ids.and_then(|(b, _)| self.descriptors[b.index() as usize].identity_scope) {
            Some(scope) => scope,
            None => {
                // a type first seen as an undeclared base keeps the scope it shares
                let scope = match self.descriptors[id.index() as usize].identity_scope {
                    Some(scope) => scope,
                    None => {
                        let scope = IdentityScope::new(self.next_scope);
                        self.next_scope += 1;
                        scope
                    }
                };
                // an undeclared base joins the scope
                if let Some((b, const_b)) = base_ids {
                    self.descriptors[b.index() as usize].identity_scope = Some(scope);
                    self.descriptors[const_b.index() as usize].identity_scope = Some(scope);
                }
                scope
            }
        };
        // types already sharing `derived`'s scope follow it into the base's
        if let Some(previous) = self.descriptors[id.index() as usize].identity_scope
            && previous != scope
        {
            for d in self.descriptors.iter_mut() {
                if d.identity_scope == Some(previous) {
                    d.identity_scope = Some(scope);
                }
            }
        }

        let parent = base_ids.map(|(b, _)| b).unwrap_or(self.common_class);
        {
            let d = &mut self.descriptors[id.index() as usize];
            d.parent = Some(parent);
            d.identity_scope = Some(scope);
            if collector.is_some() {
                d.collector = collector.clone();
            }
        }
        {
            let d = &mut self.descriptors[const_id.index() as usize];
            d.parent = Some(id);
            d.identity_scope = Some(scope);
            if collector.is_some() {
                d.collector = collector;
            }
        }

        if let Some((base_id, const_base_id)) = base_ids {
            self.link_super(const_id, const_base_id);
            self.link_super(id, base_id);
        }

        debug!(
            type_name = derived,
            base = base.unwrap_or(""),
            scope = %scope,
            "declared inheritance"
        );
        Ok(true)
    }

    /// Add an is-a edge without touching the dispatch chain.
    ///
    /// Applies to both variants: `derived : base` and
    /// `const derived : const base`.
    pub fn add_super(&mut self, derived: &str, base: &str) -> Result<(), RegistrationError> {
        let id = self.require(derived)?;
        let const_id = self.require(&self.const_name(derived))?;
        let base_id = self.require(base)?;
        let const_base_id = self.require(&self.const_name(base))?;

        self.link_super(const_id, const_base_id);
        self.link_super(id, base_id);
        debug!(type_name = derived, base, "added super");
        Ok(())
    }

    /// Copy `base`'s row plus the direct edge into `derived`'s row, and into
    /// the rows of every type that already is a `derived`.
    fn link_super(&mut self, derived: DescriptorId, base: DescriptorId) {
        let mut added: Vec<DescriptorId> = self.descriptors[base.index() as usize]
            .supers
            .iter()
            .copied()
            .collect();
        added.push(base);
        added.retain(|s| *s != derived);

        let descendants: Vec<usize> = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.supers.contains(&derived))
            .map(|(i, _)| i)
            .collect();

        self.descriptors[derived.index() as usize]
            .supers
            .extend(added.iter().copied());
        for idx in descendants {
            let row = &mut self.descriptors[idx].supers;
            row.extend(added.iter().copied().filter(|s| s.index() as usize != idx));
        }
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// True if `a` is `b` or lists `b` in its super row.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn is_a(&self, a: DescriptorId, b: DescriptorId) -> bool {
        a == b
            || self
                .get(a)
                .is_some_and(|d| d.supers.contains(&b))
    }

    /// Name-based [`is_a`](Self::is_a); unknown names are never related.
    pub fn is_a_name(&self, a: &str, b: &str) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(a), Some(b)) => self.is_a(a, b),
            _ => a == b,
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("descriptor_count", &self.descriptors.len())
            .field("common_class", &self.common_class)
            .field("const_prefix", &self.const_prefix)
            .finish()
    }
}

/// Iterator over a dispatch chain.
pub struct ChainIter<'a> {
    registry: &'a TypeRegistry,
    next: Option<DescriptorId>,
    /// Guards against a malformed cycle.
    remaining: usize,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a TypeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let descriptor = self.registry.get(self.next?)?;
        self.next = descriptor.parent;
        Some(descriptor)
    }
}
