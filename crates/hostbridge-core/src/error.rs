//! Unified error types for the bridge.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (top-level wrapper)
//! ├── RegistrationError - type/member registration errors
//! ├── ScriptError       - dispatch errors raised into the running script
//! └── NativeError       - errors returned by native callbacks
//!     └── ConversionError - value conversion failures
//! ```
//!
//! Argument checks do not fail eagerly: they produce a [`TypeCheckError`],
//! and binding code decides whether to escalate it with
//! [`TypeCheckError::raise`].

use thiserror::Error;

use crate::Operator;

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors that occur when converting between Rust and script values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A number did not fit the requested integer type.
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: f64,
        target_type: &'static str,
    },

    /// A number with a fractional part was requested as an integer.
    #[error("number {value} has no integer representation")]
    NotAnInteger { value: f64 },

    /// A null handle was converted to a non-nullable type.
    #[error("null handle cannot be converted to {target_type}")]
    NullHandle { target_type: &'static str },
}

// ============================================================================
// Type Check Errors
// ============================================================================

/// Structured result of a failed argument check.
///
/// Produced by the marshalling checks; the actual type name is captured at
/// check time so the error stays meaningful after the stack changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheckError {
    /// Stack position that failed (1-based, negative counts from the top).
    pub index: i32,
    /// Expected type name.
    pub expected: String,
    /// Whether an array of `expected` was required.
    pub array: bool,
    /// Runtime type name of the offending value.
    pub actual: String,
}

impl TypeCheckError {
    pub fn new(index: i32, expected: impl Into<String>, array: bool, actual: impl Into<String>) -> Self {
        Self {
            index,
            expected: expected.into(),
            array,
            actual: actual.into(),
        }
    }

    /// Format the diagnostic for `msg`.
    ///
    /// A message starting with `#f` describes a function argument, one
    /// starting with `#v` describes an assigned value. Any other message is
    /// used verbatim.
    pub fn format(&self, msg: &str) -> String {
        if let Some(rest) = msg.strip_prefix("#f") {
            if self.array {
                format!(
                    "{rest}\n     argument #{} is array of '{}'; array of '{}' expected.\n",
                    self.index, self.actual, self.expected
                )
            } else {
                format!(
                    "{rest}\n     argument #{} is '{}'; '{}' expected.\n",
                    self.index, self.actual, self.expected
                )
            }
        } else if let Some(rest) = msg.strip_prefix("#v") {
            if self.array {
                format!(
                    "{rest}\n     value is array of '{}'; array of '{}' expected.\n",
                    self.actual, self.expected
                )
            } else {
                format!(
                    "{rest}\n     value is '{}'; '{}' expected.\n",
                    self.actual, self.expected
                )
            }
        } else {
            msg.to_string()
        }
    }

    /// Escalate into a fatal native error.
    pub fn raise(self, msg: &str) -> NativeError {
        NativeError::TypeCheck {
            message: self.format(msg),
            check: self,
        }
    }
}

// ============================================================================
// Native Errors
// ============================================================================

/// Errors returned by native callbacks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting arguments or return values.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A failed argument check escalated by binding code.
    #[error("{message}")]
    TypeCheck {
        message: String,
        check: TypeCheckError,
    },

    /// Invalid `self` for a method call.
    #[error("invalid 'self' reference: {message}")]
    InvalidThis { message: String },

    /// Argument position outside the call's slots.
    #[error("argument #{index} out of bounds (call has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: i32, count: usize },

    /// The handle's slot was already collected.
    #[error("stale object handle: slot {index} has been collected")]
    StaleHandle { index: u32 },

    /// A registration request made from native code failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A script error raised while native code re-entered the host.
    #[error(transparent)]
    Script(Box<ScriptError>),

    /// Error raised explicitly by a native callback.
    #[error("{message}")]
    Raised { message: String },
}

impl NativeError {
    /// Create an "invalid self" error with a message.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Raise a plain script error from native code.
    pub fn raise(message: impl Into<String>) -> Self {
        NativeError::Raised {
            message: message.into(),
        }
    }
}

impl From<ScriptError> for NativeError {
    fn from(err: ScriptError) -> Self {
        NativeError::Script(Box::new(err))
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while registering types and members.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A referenced type was not registered.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// A registration call needs a current scope but none is open.
    #[error("no registration scope is open")]
    NoScope,

    /// `end_module` was called more often than `begin_module`.
    #[error("scope stack underflow")]
    ScopeUnderflow,

    /// `begin_module` named something that is neither a module nor a class.
    #[error("'{0}' is not a module or class in the current scope")]
    NotAScope(String),

    /// The member kind is not valid in the current scope.
    #[error("cannot register {kind} '{name}' here: {reason}")]
    InvalidMember {
        name: String,
        kind: &'static str,
        reason: &'static str,
    },
}

// ============================================================================
// Script Errors
// ============================================================================

/// Fatal errors raised into the running script by the dispatch adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The call target has no call handler.
    #[error("attempt to call a non-callable object ({type_name})")]
    NotCallable { type_name: String },

    /// No handler for an arithmetic or ordering operator.
    #[error("attempt to perform operation '{op}' on an invalid operand ({type_name})")]
    InvalidOperand { op: Operator, type_name: String },

    /// Write into an array member registered without setter.
    #[error("value of const array cannot be changed")]
    ConstArray,

    /// A value that cannot index a table.
    #[error("invalid table key of type {type_name}")]
    InvalidKey { type_name: String },

    /// The handle was already collected.
    #[error("stale object handle: slot {index} has been collected")]
    StaleHandle { index: u32 },

    /// A native callback failed.
    #[error(transparent)]
    Native(#[from] NativeError),
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// The unified error type for all bridge operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A script-level error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A native callback error outside of dispatch.
    #[error(transparent)]
    Native(#[from] NativeError),
}

impl BridgeError {
    pub fn is_registration(&self) -> bool {
        matches!(self, BridgeError::Registration(_))
    }

    pub fn is_script(&self) -> bool {
        matches!(self, BridgeError::Script(_))
    }
}
