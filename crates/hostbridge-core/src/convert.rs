//! Conversion traits for argument extraction and return value handling.
//!
//! - [`FromValue`]: Extract a Rust value from a host [`Value`]
//! - [`IntoValue`]: Convert a Rust value into a host [`Value`]
//!
//! The host has a single numeric type, so integer conversions check that the
//! number is integral and in range for the target type.
//!
//! ## Example
//!
//! ```ignore
//! let value: i32 = i32::from_value(&Value::Number(42.0))?;
//! let back: Value = value.into_value();
//! ```

use std::rc::Rc;

use crate::ConversionError;
use crate::runtime::{NativeFn, ObjectHandle, TableRef, Value};

/// Extract a Rust value from a host value.
pub trait FromValue: Sized {
    /// Returns a `ConversionError` if the value has an incompatible type.
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Convert a Rust value into a host value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn expect_number(value: &Value) -> Result<f64, ConversionError> {
    value.as_number().ok_or(ConversionError::TypeMismatch {
        expected: "number",
        actual: value.type_name(),
    })
}

/// Host rendering of a number used as a string.
pub fn number_to_string(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let n = expect_number(value)?;
                    if n.fract() != 0.0 || !n.is_finite() {
                        return Err(ConversionError::NotAnInteger { value: n });
                    }
                    if n >= Self::MIN as f64 && n <= Self::MAX as f64 {
                        Ok(n as Self)
                    } else {
                        Err(ConversionError::IntegerOverflow {
                            value: n,
                            target_type: stringify!($ty),
                        })
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Number(self as f64)
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

// ============================================================================
// Float implementations
// ============================================================================

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        expect_number(value)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        expect_number(value).map(|n| n as f32)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Number(self as f64)
    }
}

// ============================================================================
// Bool implementation
// ============================================================================

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "boolean",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

// ============================================================================
// String implementations
// ============================================================================

impl FromValue for Rc<str> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(Rc::from(number_to_string(*n))),
            _ => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: value.type_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Rc::<str>::from_value(value).map(|s| s.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl IntoValue for Rc<str> {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

// ============================================================================
// Reference values
// ============================================================================

impl FromValue for ObjectHandle {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Object(h) => Ok(*h),
            Value::Nil => Err(ConversionError::NullHandle {
                target_type: "object",
            }),
            _ => Err(ConversionError::TypeMismatch {
                expected: "userdata",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoValue for ObjectHandle {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl FromValue for TableRef {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Table(t) => Ok(t.clone()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "table",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoValue for TableRef {
    fn into_value(self) -> Value {
        Value::Table(self)
    }
}

impl IntoValue for NativeFn {
    fn into_value(self) -> Value {
        Value::Function(self)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

// ============================================================================
// Option and unit
// ============================================================================

/// `nil` converts to `None`.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Nil,
        }
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}
