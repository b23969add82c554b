//! Built-in script library.
//!
//! Installed by [`Bridge::open`](crate::Bridge::open) under the configured
//! module name (`hostbridge` by default).

use hostbridge_core::{
    CallContext, NativeError, NativeFn, RegistrationError, TableRef, Value, INSTANCE_KEY,
};

use crate::Bridge;

/// Register every library function into the current scope.
pub(crate) fn register(bridge: &mut Bridge) -> Result<(), RegistrationError> {
    bridge.function("type", NativeFn::new("type", type_of))?;
    bridge.function("takeownership", NativeFn::new("takeownership", take_ownership))?;
    bridge.function("releaseownership", NativeFn::new("releaseownership", release_ownership))?;
    bridge.function("cast", NativeFn::new("cast", cast))?;
    bridge.function("isnull", NativeFn::new("isnull", is_null))?;
    bridge.function("inherit", NativeFn::new("inherit", inherit))?;
    bridge.function("setpeer", NativeFn::new("setpeer", set_peer))?;
    bridge.function("getpeer", NativeFn::new("getpeer", get_peer))?;
    Ok(())
}

/// `type(value)`: runtime type name of the last argument.
fn type_of(ctx: &mut CallContext) -> Result<(), NativeError> {
    let name = if ctx.top() == 0 {
        "[no object]".to_string()
    } else {
        ctx.host().type_name_of(&ctx.slot(-1))
    };
    ctx.set_return(name);
    Ok(())
}

/// `takeownership(obj)`: true if the bridge now destroys the object.
fn take_ownership(ctx: &mut CallContext) -> Result<(), NativeError> {
    let taken = match ctx.slot(1) {
        Value::Object(h) => ctx.host_mut().take_ownership(h),
        _ => false,
    };
    ctx.set_return(taken);
    Ok(())
}

/// `releaseownership(obj)`: true if native code is responsible again.
fn release_ownership(ctx: &mut CallContext) -> Result<(), NativeError> {
    let released = match ctx.slot(1) {
        Value::Object(h) => ctx.host_mut().release_ownership(h),
        _ => false,
    };
    ctx.set_return(released);
    Ok(())
}

/// `cast(obj, type_name)`: push the same native pointer as another type.
fn cast(ctx: &mut CallContext) -> Result<(), NativeError> {
    let target = ctx.slot(1);
    let ptr = ctx.host().pointer_of(&target).filter(|p| !p.is_null());
    let type_name = match ctx.slot(2) {
        Value::String(s) => Some(s),
        _ => None,
    };
    let result = match (ptr, type_name) {
        (Some(ptr), Some(type_name)) => ctx.host_mut().push_usertype(ptr, &type_name, false)?,
        _ => Value::Nil,
    };
    ctx.set_return_value(result);
    Ok(())
}

/// `isnull(value)`: true unless the value refers to a non-null native pointer.
fn is_null(ctx: &mut CallContext) -> Result<(), NativeError> {
    let value = ctx.slot(-1);
    let null = match value {
        Value::Object(_) | Value::Pointer(_) => {
            ctx.host().pointer_of(&value).is_none_or(|p| p.is_null())
        }
        _ => true,
    };
    ctx.set_return(null);
    Ok(())
}

/// `inherit(table, obj)`: make a script table stand in for `obj`.
fn inherit(ctx: &mut CallContext) -> Result<(), NativeError> {
    let table: TableRef = ctx.get(1)?;
    table.raw_set_str(INSTANCE_KEY, ctx.slot(2));
    Ok(())
}

/// `setpeer(obj, table)`: replace the object's peer table; `nil` detaches it.
fn set_peer(ctx: &mut CallContext) -> Result<(), NativeError> {
    let Value::Object(handle) = ctx.slot(1) else {
        return Err(NativeError::raise(
            "Invalid argument #1 to setpeer: userdata expected.",
        ));
    };
    let peer = match ctx.slot(2) {
        Value::Table(t) => Some(t),
        Value::Nil => None,
        other => {
            return Err(NativeError::raise(format!(
                "Invalid argument #2 to setpeer: table expected, got {}.",
                other.type_name()
            )));
        }
    };
    ctx.host_mut().heap_mut().set_peer(handle, peer);
    Ok(())
}

/// `getpeer(obj)`: the peer table, or `nil` if none was created.
fn get_peer(ctx: &mut CallContext) -> Result<(), NativeError> {
    let peer = match ctx.slot(1) {
        Value::Object(handle) => ctx.heap().peer(handle).map(Value::Table),
        _ => None,
    };
    ctx.set_return_value(peer.unwrap_or_default());
    Ok(())
}
