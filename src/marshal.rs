//! Marshalling surface: argument checks and defaulted conversions.
//!
//! Checks never fail eagerly. Each returns `Ok(())` or a [`TypeCheckError`]
//! naming the position, the expected type and the actual runtime type;
//! binding code escalates it with [`raise`] when it decides the call cannot
//! proceed.
//!
//! `nil` stands in for optional booleans, strings, tables, userdata and
//! usertypes; numbers reject it. With `def` set, a position past the last
//! argument is accepted as omitted.
//!
//! ```
//! use hostbridge::{Bridge, CallContext, Value, marshal};
//!
//! let mut bridge = Bridge::new();
//! let ctx = CallContext::new(&mut bridge, vec![Value::from("3.5"), Value::Nil]);
//! assert!(marshal::is_number(&ctx, 1, false).is_ok());
//! assert!(marshal::is_number(&ctx, 2, false).is_err());
//! assert!(marshal::is_number(&ctx, 3, true).is_ok());
//! assert_eq!(marshal::to_number(&ctx, 1, 0.0), 3.5);
//! ```

use hostbridge_core::{
    CallContext, Key, NativeError, NativePtr, TypeCheckError, Value, convert::number_to_string,
};

/// Outcome of a check.
pub type CheckResult = Result<(), TypeCheckError>;

/// Runtime type name at `lo`, `[no object]` past the last argument.
pub fn type_name_at(ctx: &CallContext, lo: i32) -> String {
    if ctx.is_absent(lo) {
        "[no object]".to_string()
    } else {
        ctx.host().type_name_of(&ctx.slot(lo))
    }
}

fn failure(ctx: &CallContext, lo: i32, expected: &str) -> TypeCheckError {
    TypeCheckError::new(lo, expected, false, type_name_at(ctx, lo))
}

fn omitted(ctx: &CallContext, lo: i32, def: bool) -> bool {
    def && ctx.is_absent(lo)
}

fn check(ctx: &CallContext, lo: i32, def: bool, expected: &str, accept: impl Fn(&Value) -> bool) -> CheckResult {
    if omitted(ctx, lo, def) || accept(&ctx.slot(lo)) {
        Ok(())
    } else {
        Err(failure(ctx, lo, expected))
    }
}

fn parses_as_number(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok()
}

fn number_like(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => parses_as_number(s),
        _ => false,
    }
}

fn usertype_matches(ctx: &CallContext, value: &Value, type_name: &str) -> bool {
    let host = ctx.host();
    let Some(expected) = host.find_type(type_name) else {
        return false;
    };
    host.resolve_instance(value)
        .and_then(|h| host.heap().tag(h))
        .is_some_and(|tag| host.is_a(tag.descriptor, expected))
}

fn usertable_matches(ctx: &CallContext, value: &Value, type_name: &str) -> bool {
    let host = ctx.host();
    match (value, host.find_type(type_name)) {
        (Value::Class(id), Some(expected)) => {
            *id == expected || host.const_variant(*id) == Some(expected)
        }
        _ => false,
    }
}

// ==========================================================================
// Scalar checks
// ==========================================================================

/// Accepts only positions past the last argument.
pub fn is_no_object(ctx: &CallContext, lo: i32) -> CheckResult {
    if ctx.is_absent(lo) {
        Ok(())
    } else {
        Err(failure(ctx, lo, "[no object]"))
    }
}

/// Accepts any present value, or anything at all with `def`.
pub fn is_value(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    if def || !ctx.is_absent(lo) {
        Ok(())
    } else {
        Err(failure(ctx, lo, "value"))
    }
}

/// Rejects a present `nil`; absent positions are left to other checks.
pub fn is_value_nil(ctx: &CallContext, lo: i32) -> CheckResult {
    if !ctx.is_absent(lo) && ctx.slot(lo).is_nil() {
        Err(failure(ctx, lo, "value"))
    } else {
        Ok(())
    }
}

pub fn is_boolean(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    check(ctx, lo, def, "boolean", |v| matches!(v, Value::Nil | Value::Bool(_)))
}

/// Numbers and strings that parse as numbers.
pub fn is_number(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    check(ctx, lo, def, "number", number_like)
}

/// Strings and numbers.
pub fn is_string(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    check(ctx, lo, def, "string", |v| v.is_nil() || v.is_string_like())
}

pub fn is_table(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    check(ctx, lo, def, "table", |v| v.is_nil() || v.is_table())
}

/// A class table registered as `type_name` or its const shadow.
pub fn is_usertable(ctx: &CallContext, lo: i32, type_name: &str, def: bool) -> CheckResult {
    check(ctx, lo, def, type_name, |v| usertable_matches(ctx, v, type_name))
}

pub fn is_userdata(ctx: &CallContext, lo: i32, def: bool) -> CheckResult {
    check(ctx, lo, def, "userdata", |v| v.is_nil() || v.is_userdata())
}

/// A bridged object (or a table extending one) whose type is-a `type_name`.
pub fn is_usertype(ctx: &CallContext, lo: i32, type_name: &str, def: bool) -> CheckResult {
    check(ctx, lo, def, type_name, |v| {
        v.is_nil() || usertype_matches(ctx, v, type_name)
    })
}

// ==========================================================================
// Array checks
// ==========================================================================

/// Run an element check over `t[1..=dim]`.
///
/// Elements are read raw. With `def`, `nil` elements are accepted.
fn check_array(
    ctx: &CallContext,
    lo: i32,
    dim: usize,
    def: bool,
    expected: &str,
    accept: impl Fn(&Value) -> bool,
) -> CheckResult {
    is_table(ctx, lo, def)?;
    let Value::Table(table) = ctx.slot(lo) else {
        return Ok(());
    };
    for i in 1..=dim {
        let element = table.raw_get(&Key::Int(i as i64));
        if !accept(&element) && !(def && element.is_nil()) {
            let actual = ctx.host().type_name_of(&element);
            return Err(TypeCheckError::new(lo, expected, true, actual));
        }
    }
    Ok(())
}

/// Only the container is checked.
pub fn is_value_array(ctx: &CallContext, lo: i32, _dim: usize, def: bool) -> CheckResult {
    is_table(ctx, lo, def)
}

pub fn is_boolean_array(ctx: &CallContext, lo: i32, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, "boolean", |v| matches!(v, Value::Nil | Value::Bool(_)))
}

pub fn is_number_array(ctx: &CallContext, lo: i32, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, "number", number_like)
}

pub fn is_string_array(ctx: &CallContext, lo: i32, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, "string", |v| v.is_nil() || v.is_string_like())
}

pub fn is_table_array(ctx: &CallContext, lo: i32, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, "table", Value::is_table)
}

pub fn is_userdata_array(ctx: &CallContext, lo: i32, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, "userdata", |v| v.is_nil() || v.is_userdata())
}

pub fn is_usertype_array(ctx: &CallContext, lo: i32, type_name: &str, dim: usize, def: bool) -> CheckResult {
    check_array(ctx, lo, dim, def, type_name, |v| {
        v.is_nil() || usertype_matches(ctx, v, type_name)
    })
}

// ==========================================================================
// Conversions
// ==========================================================================

fn number_of(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string()),
        Value::Number(n) => Some(number_to_string(*n)),
        _ => None,
    }
}

fn userdata_of(ctx: &CallContext, value: &Value) -> Option<NativePtr> {
    match value {
        Value::Pointer(p) => Some(*p),
        other => usertype_of(ctx, other),
    }
}

fn usertype_of(ctx: &CallContext, value: &Value) -> Option<NativePtr> {
    let host = ctx.host();
    host.resolve_instance(value).and_then(|h| host.heap().ptr(h))
}

/// Number at `lo`; non-numbers convert to 0, omitted arguments to `def`.
pub fn to_number(ctx: &CallContext, lo: i32, def: f64) -> f64 {
    if ctx.is_absent(lo) { def } else { number_of(&ctx.slot(lo)) }
}

pub fn to_string(ctx: &CallContext, lo: i32, def: Option<&str>) -> Option<String> {
    if ctx.is_absent(lo) {
        def.map(str::to_string)
    } else {
        string_of(&ctx.slot(lo))
    }
}

pub fn to_boolean(ctx: &CallContext, lo: i32, def: bool) -> bool {
    if ctx.is_absent(lo) { def } else { ctx.slot(lo).is_truthy() }
}

/// Raw pointer or bridged object at `lo`, null for anything else.
pub fn to_userdata(ctx: &CallContext, lo: i32, def: NativePtr) -> NativePtr {
    if ctx.is_absent(lo) {
        return def;
    }
    userdata_of(ctx, &ctx.slot(lo)).unwrap_or(NativePtr::NULL)
}

/// Native pointer of the object (or extending table) at `lo`.
pub fn to_usertype(ctx: &CallContext, lo: i32, def: NativePtr) -> NativePtr {
    if ctx.is_absent(lo) {
        return def;
    }
    usertype_of(ctx, &ctx.slot(lo)).unwrap_or(NativePtr::NULL)
}

pub fn to_value(ctx: &CallContext, lo: i32, def: Value) -> Value {
    if ctx.is_absent(lo) { def } else { ctx.slot(lo) }
}

// ==========================================================================
// Field conversions
// ==========================================================================

/// `t[index]` through the dispatch adapter; `nil` when `lo` is not indexable.
fn field(ctx: &mut CallContext, lo: i32, index: i64) -> Result<Value, NativeError> {
    let target = ctx.slot(lo);
    if !(target.is_table() || target.is_userdata()) {
        return Ok(Value::Nil);
    }
    Ok(ctx.host_mut().index(&target, &Value::Number(index as f64))?)
}

pub fn to_field_number(ctx: &mut CallContext, lo: i32, index: i64, def: f64) -> Result<f64, NativeError> {
    let value = field(ctx, lo, index)?;
    Ok(if value.is_nil() { def } else { number_of(&value) })
}

pub fn to_field_string(
    ctx: &mut CallContext,
    lo: i32,
    index: i64,
    def: Option<&str>,
) -> Result<Option<String>, NativeError> {
    let value = field(ctx, lo, index)?;
    Ok(if value.is_nil() {
        def.map(str::to_string)
    } else {
        string_of(&value)
    })
}

/// A `nil` field reads as `false`, whatever `def` says.
pub fn to_field_boolean(ctx: &mut CallContext, lo: i32, index: i64) -> Result<bool, NativeError> {
    Ok(field(ctx, lo, index)?.is_truthy())
}

pub fn to_field_userdata(
    ctx: &mut CallContext,
    lo: i32,
    index: i64,
    def: NativePtr,
) -> Result<NativePtr, NativeError> {
    let value = field(ctx, lo, index)?;
    if value.is_nil() {
        return Ok(def);
    }
    Ok(userdata_of(ctx, &value).unwrap_or(NativePtr::NULL))
}

pub fn to_field_usertype(
    ctx: &mut CallContext,
    lo: i32,
    index: i64,
    def: NativePtr,
) -> Result<NativePtr, NativeError> {
    let value = field(ctx, lo, index)?;
    if value.is_nil() {
        return Ok(def);
    }
    Ok(usertype_of(ctx, &value).unwrap_or(NativePtr::NULL))
}

pub fn to_field_value(ctx: &mut CallContext, lo: i32, index: i64, def: Value) -> Result<Value, NativeError> {
    let value = field(ctx, lo, index)?;
    Ok(if value.is_nil() { def } else { value })
}

/// Escalate a failed check into a fatal error.
///
/// `msg` starting with `#f` formats an argument error, `#v` a value error.
pub fn raise(err: TypeCheckError, msg: &str) -> NativeError {
    err.raise(msg)
}
