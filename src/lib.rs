//! Type-identity and object-lifetime bridge between native objects and an
//! embedded dynamic scripting host.
//!
//! A [`Bridge`] owns every registry the binding layer needs:
//!
//! - the type registry (names, const shadows, dispatch chains, is-a rows)
//! - the identity map, so each native pointer has one script object
//! - the ownership ledger, recording which objects the bridge destroys
//! - the dispatch adapter behind reads, writes, calls and operators
//! - the marshalling checks used at every native function boundary
//!
//! ```
//! use hostbridge::prelude::*;
//!
//! let mut bridge = Bridge::new();
//! bridge.declare_inheritance("Base", None, None).unwrap();
//! bridge.declare_inheritance("Derived", Some("Base"), None).unwrap();
//!
//! let ptr = NativePtr::new(0x1000);
//! let a = bridge.push_usertype(ptr, "Base").unwrap();
//! let b = bridge.push_usertype(ptr, "Derived").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(bridge.type_name_of(&a), "Derived");
//! ```

mod bridge;
mod config;
mod dispatch;
mod identity;
mod library;
pub mod marshal;
mod ownership;
mod registration;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use identity::{IdentityMap, Interned};
pub use ownership::OwnershipLedger;

pub use hostbridge_core::*;
pub use hostbridge_registry::{
    COMMON_CLASS, CONST_PREFIX, ModuleTree, ScopeNode, TypeDescriptor, TypeRegistry,
};

pub mod prelude {
    pub use crate::marshal;
    pub use crate::{Bridge, BridgeConfig};
    pub use hostbridge_core::{
        BridgeError, CallContext, DescriptorId, FromValue, IntoValue, NativeError, NativeFn,
        NativePtr, ObjectHandle, Operator, RegistrationError, ScriptError, ScriptHost, TableRef,
        TypeCheckError, Value,
    };
}
