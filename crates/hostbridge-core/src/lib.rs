//! Core types shared by the hostbridge crates.
//!
//! This crate holds the host-side value model and the plumbing native
//! callbacks are written against:
//!
//! - [`Value`], [`TableRef`] and [`Key`]: what the host stores and passes
//! - [`HandleHeap`] and [`ObjectHandle`]: generational, reference-counted
//!   object handles
//! - [`NativeFn`] and [`CallContext`]: type-erased callbacks
//! - [`ScriptHost`]: the host operations a callback may use
//! - the error hierarchy rooted at [`BridgeError`]

pub mod convert;
mod error;
mod ids;
mod operator;
mod ptr;
pub mod runtime;

pub use convert::{FromValue, IntoValue};
pub use error::{
    BridgeError, ConversionError, NativeError, RegistrationError, ScriptError, TypeCheckError,
};
pub use ids::{DescriptorId, IdentityScope};
pub use operator::Operator;
pub use ptr::NativePtr;
pub use runtime::{
    Accessor, ArrayAccessor, CallContext, Fallback, HandleEntry, HandleHeap, HandleTag,
    INSTANCE_KEY, Key, ModuleAccessors, NativeCallable, NativeFn, ObjectHandle, Ownership,
    SELF_KEY, ScriptHost, Table, TableBehavior, TableRef, Value,
};
