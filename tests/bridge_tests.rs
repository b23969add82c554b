use std::cell::Cell;
use std::rc::Rc;
use std::sync::Once;

use hostbridge::prelude::*;
use hostbridge::{Fallback, Key, Ownership};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

/// `Base` plus `Derived : Base`, no collectors.
fn base_and_derived() -> Bridge {
    init_logging();
    let mut bridge = Bridge::new();
    bridge.declare_inheritance("Base", None, None).unwrap();
    bridge
        .declare_inheritance("Derived", Some("Base"), None)
        .unwrap();
    bridge
}

fn handle(value: &Value) -> ObjectHandle {
    value.as_object().expect("expected a bridged object")
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_identity_uniqueness() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x2000);

    let a = bridge.push_usertype(ptr, "Base").unwrap();
    let b = bridge.push_usertype(ptr, "Base").unwrap();
    assert_eq!(a, b);
    assert_eq!(bridge.heap().len(), 1);
}

#[test]
fn test_null_pointer_interns_to_nil() {
    let mut bridge = base_and_derived();
    let value = bridge.push_usertype(NativePtr::NULL, "Base").unwrap();
    assert!(value.is_nil());
    assert!(bridge.heap().is_empty());
}

#[test]
fn test_unknown_type_is_rejected() {
    let mut bridge = base_and_derived();
    assert_eq!(
        bridge.push_usertype(NativePtr::new(8), "Missing"),
        Err(RegistrationError::TypeNotFound("Missing".into()))
    );
}

#[test]
fn test_weak_collection_allocates_fresh_handle() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x2000);

    let first = bridge.push_usertype(ptr, "Base").unwrap();
    assert!(bridge.release(&first));
    assert_eq!(bridge.collect_garbage(), 1);
    assert!(bridge.heap().get(handle(&first)).is_none());

    let second = bridge.push_usertype(ptr, "Base").unwrap();
    assert_ne!(first, second);
    assert_eq!(bridge.heap().ptr(handle(&second)), Some(ptr));
}

#[test]
fn test_rooted_handle_survives_release() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x2000);

    let obj = bridge.push_usertype_and_add_to_root(ptr, "Base").unwrap();
    assert!(!bridge.release(&obj));
    assert_eq!(bridge.collect_garbage(), 0);
    assert_eq!(bridge.push_usertype(ptr, "Base").unwrap(), obj);

    bridge.release(&obj);
    assert!(bridge.remove_from_root(ptr));
    assert_eq!(bridge.collect_garbage(), 1);
}

#[test]
fn test_monotonic_specialization_base_first() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x3000);

    let obj = bridge.push_usertype(ptr, "Base").unwrap();
    bridge.push_usertype(ptr, "Derived").unwrap();
    assert_eq!(bridge.type_name_of(&obj), "Derived");
}

#[test]
fn test_monotonic_specialization_derived_first() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x3000);

    let obj = bridge.push_usertype(ptr, "Derived").unwrap();
    let again = bridge.push_usertype(ptr, "Base").unwrap();
    assert_eq!(obj, again);
    assert_eq!(bridge.type_name_of(&obj), "Derived");
}

#[test]
fn test_unrelated_types_get_separate_identities() {
    let mut bridge = base_and_derived();
    bridge.declare_inheritance("Other", None, None).unwrap();
    let ptr = NativePtr::new(0x3000);

    let base = bridge.push_usertype(ptr, "Base").unwrap();
    let other = bridge.push_usertype(ptr, "Other").unwrap();
    assert_ne!(base, other);
    assert_eq!(bridge.type_name_of(&base), "Base");
}

// ============================================================================
// Type registry
// ============================================================================

#[test]
fn test_super_row_transitivity() {
    init_logging();
    let mut bridge = Bridge::new();
    bridge.declare_inheritance("A", None, None).unwrap();
    bridge.declare_inheritance("B", Some("A"), None).unwrap();
    bridge.declare_inheritance("C", Some("B"), None).unwrap();

    assert!(bridge.is_a("C", "A"));
    assert!(!bridge.is_a("A", "C"));
    assert!(bridge.is_a("C", "const A"));
}

#[test]
fn test_first_inheritance_declaration_wins() {
    let mut bridge = base_and_derived();
    bridge.declare_inheritance("Other", None, None).unwrap();
    assert!(!bridge
        .declare_inheritance("Derived", Some("Other"), None)
        .unwrap());
    assert!(!bridge.is_a("Derived", "Other"));
}

#[test]
fn test_add_base_only_affects_type_checks() {
    let mut bridge = base_and_derived();
    bridge.declare_inheritance("Mixin", None, None).unwrap();
    bridge.begin_module("").unwrap();
    bridge.add_base("Derived", "Mixin").unwrap();
    assert!(bridge.is_a("Derived", "Mixin"));

    let derived = bridge.find_type("Derived").unwrap();
    let chain: Vec<&str> = bridge
        .registry()
        .chain(derived)
        .map(|d| d.name())
        .collect();
    assert!(!chain.contains(&"Mixin"));
}

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn test_ownership_idempotence() {
    let mut bridge = base_and_derived();
    let obj = bridge.push_usertype(NativePtr::new(0x4000), "Base").unwrap();
    let h = handle(&obj);

    assert!(bridge.take_ownership(h));
    assert!(!bridge.take_ownership(h));
    assert!(bridge.release_ownership(h));
    assert!(!bridge.release_ownership(h));
}

#[test]
fn test_release_requires_exact_descriptor() {
    let mut bridge = base_and_derived();
    let ptr = NativePtr::new(0x4000);
    let obj = bridge.push_usertype(ptr, "Base").unwrap();
    let h = handle(&obj);
    assert!(bridge.take_ownership(h));

    bridge.push_usertype(ptr, "Derived").unwrap();
    assert!(!bridge.release_ownership(h));
    assert!(bridge.ledger().contains(ptr));
}

#[test]
fn test_derived_destructor_runs_once() {
    init_logging();
    let (calls, seen) = counter();
    let collector = NativeFn::new("Derived.delete", move |ctx: &mut CallContext| {
        assert_eq!(ctx.this_ptr()?, NativePtr::new(0x1000));
        seen.set(seen.get() + 1);
        Ok(())
    });

    let mut bridge = Bridge::new();
    bridge.declare_inheritance("Base", None, None).unwrap();
    bridge
        .declare_inheritance("Derived", Some("Base"), Some(collector))
        .unwrap();

    let ptr = NativePtr::new(0x1000);
    let obj = bridge.push_usertype(ptr, "Derived").unwrap();
    assert!(bridge.take_ownership(handle(&obj)));
    assert!(bridge.ledger().contains(ptr));

    assert!(bridge.release(&obj));
    assert_eq!(bridge.collect_garbage(), 1);
    assert_eq!(calls.get(), 1);
    assert!(!bridge.ledger().contains(ptr));

    assert_eq!(bridge.collect_garbage(), 0);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_unowned_objects_are_not_finalized() {
    init_logging();
    let (calls, seen) = counter();
    let collector = NativeFn::new("delete", move |_ctx: &mut CallContext| {
        seen.set(seen.get() + 1);
        Ok(())
    });
    let mut bridge = Bridge::new();
    bridge.declare_inheritance("Base", None, Some(collector)).unwrap();

    let obj = bridge.push_usertype(NativePtr::new(0x10), "Base").unwrap();
    bridge.release(&obj);
    bridge.collect_garbage();
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_default_collector_from_config() {
    init_logging();
    let (calls, seen) = counter();
    let mut bridge = BridgeConfig::new()
        .with_default_collector(NativeFn::new("free", move |_ctx: &mut CallContext| {
            seen.set(seen.get() + 1);
            Ok(())
        }))
        .build();
    bridge.declare_inheritance("Base", None, None).unwrap();

    let obj = bridge
        .push_usertype_and_take_ownership(NativePtr::new(0x10), "Base")
        .unwrap();
    bridge.release(&obj);
    bridge.collect_garbage();
    assert_eq!(calls.get(), 1);
    assert!(bridge.ledger().is_empty());
}

#[test]
fn test_missing_collector_leaks_and_drops_claim() {
    init_logging();
    let mut bridge = Bridge::new();
    bridge.declare_inheritance("Base", None, None).unwrap();
    let ptr = NativePtr::new(0x20);

    let obj = bridge.push_usertype_and_take_ownership(ptr, "Base").unwrap();
    assert!(bridge.release(&obj));
    assert_eq!(bridge.collect_garbage(), 1);
    assert!(!bridge.ledger().contains(ptr));
}

#[test]
fn test_reused_pointer_is_not_finalized_under_live_handle() {
    init_logging();
    let (calls, seen) = counter();
    let collector = NativeFn::new("Base.delete", move |_ctx: &mut CallContext| {
        seen.set(seen.get() + 1);
        Ok(())
    });
    let mut bridge = Bridge::new();
    bridge.declare_inheritance("Base", None, Some(collector)).unwrap();
    let ptr = NativePtr::new(0x30);

    let obj = bridge.push_usertype(ptr, "Base").unwrap();
    assert!(bridge.take_ownership(handle(&obj)));
    assert!(bridge.release(&obj));

    // native code hands the same address back before the sweep
    let second = bridge.push_usertype(ptr, "Base").unwrap();
    assert_ne!(obj, second);

    assert_eq!(bridge.collect_garbage(), 1);
    assert_eq!(calls.get(), 0);
    assert!(bridge.ledger().contains(ptr));
    assert_eq!(
        bridge.heap().tag(handle(&second)).map(|t| t.ownership),
        Some(Ownership::Owned)
    );
    assert_eq!(bridge.push_usertype(ptr, "Base").unwrap(), second);

    bridge.release(&second);
    bridge.release(&second);
    assert_eq!(bridge.collect_garbage(), 1);
    assert_eq!(calls.get(), 1);
    assert!(bridge.ledger().is_empty());
}

#[test]
fn test_late_base_declaration_keeps_identity() {
    init_logging();
    let mut bridge = Bridge::new();
    bridge.register_type("Plain");
    bridge.declare_inheritance("Child", Some("Plain"), None).unwrap();
    bridge.declare_inheritance("Plain", None, None).unwrap();
    let ptr = NativePtr::new(0x700);

    let plain = bridge.push_usertype(ptr, "Plain").unwrap();
    let child = bridge.push_usertype(ptr, "Child").unwrap();
    assert_eq!(plain, child);
    assert_eq!(bridge.type_name_of(&plain), "Child");
}

// ============================================================================
// Dispatch
// ============================================================================

/// `Point` with a read/write `x` backed by a shared cell.
fn point_bridge(x: Rc<Cell<f64>>) -> Bridge {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Point", "Point", None, None).unwrap();
    bridge.begin_module("Point").unwrap();

    let read = x.clone();
    bridge
        .variable(
            "x",
            NativeFn::new("Point.x.get", move |ctx: &mut CallContext| {
                ctx.set_return(read.get());
                Ok(())
            }),
            Some(NativeFn::new("Point.x.set", move |ctx: &mut CallContext| {
                x.set(ctx.get::<f64>(2)? + 1.0);
                Ok(())
            })),
        )
        .unwrap();
    bridge
        .function(
            "norm",
            NativeFn::new("Point.norm", |ctx: &mut CallContext| {
                ctx.set_return(1.0);
                Ok(())
            }),
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();
    bridge
}

#[test]
fn test_write_bypass() {
    init_logging();
    let x = Rc::new(Cell::new(0.0));
    let mut bridge = point_bridge(x.clone());
    let obj = bridge.push_usertype(NativePtr::new(0x50), "Point").unwrap();

    bridge
        .new_index(&obj, &Value::from("x"), Value::from(5))
        .unwrap();
    assert_eq!(x.get(), 6.0);
    assert!(bridge.peer(handle(&obj)).is_none());
    assert_eq!(
        bridge.index(&obj, &Value::from("x")).unwrap(),
        Value::Number(6.0)
    );
}

#[test]
fn test_unclaimed_write_lands_in_peer() {
    let mut bridge = point_bridge(Rc::new(Cell::new(0.0)));
    let obj = bridge.push_usertype(NativePtr::new(0x50), "Point").unwrap();

    bridge
        .new_index(&obj, &Value::from("label"), Value::from("origin"))
        .unwrap();
    let peer = bridge.peer(handle(&obj)).unwrap();
    assert_eq!(peer.raw_get_str("label"), Value::from("origin"));
    assert_eq!(
        bridge.index(&obj, &Value::from("label")).unwrap(),
        Value::from("origin")
    );
}

#[test]
fn test_read_miss_silence() {
    let mut bridge = point_bridge(Rc::new(Cell::new(0.0)));
    let obj = bridge.push_usertype(NativePtr::new(0x50), "Point").unwrap();

    assert_eq!(bridge.index(&obj, &Value::from("nope")).unwrap(), Value::Nil);
    assert_eq!(bridge.index(&obj, &Value::from(3)).unwrap(), Value::Nil);
}

#[test]
fn test_methods_resolve_through_chain() {
    let mut bridge = point_bridge(Rc::new(Cell::new(0.0)));
    bridge.begin_module("").unwrap();
    bridge.class("Point3", "Point3", Some("Point"), None).unwrap();
    bridge.end_module().unwrap();

    let obj = bridge.push_usertype(NativePtr::new(0x60), "Point3").unwrap();
    let norm = bridge.index(&obj, &Value::from("norm")).unwrap();
    assert_eq!(bridge.call(&norm, vec![obj]).unwrap(), Value::Number(1.0));
}

#[test]
fn test_numeric_keys_use_index_accessors() {
    init_logging();
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Vec", "Vec", None, None).unwrap();
    bridge.begin_module("Vec").unwrap();
    bridge
        .index_accessor(
            NativeFn::new("Vec.geti", |ctx: &mut CallContext| {
                let i: f64 = ctx.get(2)?;
                ctx.set_return(i * 10.0);
                Ok(())
            }),
            None,
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let obj = bridge.push_usertype(NativePtr::new(0x70), "Vec").unwrap();
    assert_eq!(
        bridge.index(&obj, &Value::from(2)).unwrap(),
        Value::Number(20.0)
    );
    // no index setter: the write lands in the peer and shadows the getter
    bridge.new_index(&obj, &Value::from(2), Value::from(1)).unwrap();
    assert_eq!(
        bridge.index(&obj, &Value::from(2)).unwrap(),
        Value::Number(1.0)
    );
}

/// `Array3` with an array member `values` whose element getter counts calls.
fn array3_bridge(gets: Rc<Cell<u32>>, writable: bool) -> Bridge {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Array3", "Array3", None, None).unwrap();
    bridge.begin_module("Array3").unwrap();
    let set = writable.then(|| NativeFn::new("Array3.values.set", |_ctx: &mut CallContext| Ok(())));
    bridge
        .array(
            "values",
            NativeFn::new("Array3.values.get", move |ctx: &mut CallContext| {
                gets.set(gets.get() + 1);
                let owner = ctx.this_ptr()?;
                let i: f64 = ctx.get(2)?;
                ctx.set_return(owner.addr() as f64 + i);
                Ok(())
            }),
            set,
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();
    bridge
}

#[test]
fn test_array_member_proxy_is_cached() {
    init_logging();
    let (gets, getter_count) = counter();
    let mut bridge = array3_bridge(getter_count, true);
    let obj = bridge.push_usertype(NativePtr::new(0x100), "Array3").unwrap();
    let key = Value::from("values");

    let first = bridge.index(&obj, &key).unwrap();
    assert_eq!(gets.get(), 0);
    assert_eq!(
        bridge.index(&first, &Value::from(0)).unwrap(),
        Value::Number(256.0)
    );
    assert_eq!(gets.get(), 1);

    let second = bridge.index(&obj, &key).unwrap();
    assert_eq!(gets.get(), 1);
    assert_eq!(first, second);
    let peer = bridge.peer(handle(&obj)).unwrap();
    assert_eq!(peer.raw_get(&Key::str("values")), first);
    assert_eq!(first.as_table().unwrap().self_pointer(), Some(NativePtr::new(0x100)));
}

#[test]
fn test_const_array_rejects_writes() {
    let mut bridge = array3_bridge(Rc::new(Cell::new(0)), false);
    let obj = bridge.push_usertype(NativePtr::new(0x100), "Array3").unwrap();
    let proxy = bridge.index(&obj, &Value::from("values")).unwrap();

    assert_eq!(
        bridge.new_index(&proxy, &Value::from(1), Value::from(2)),
        Err(ScriptError::ConstArray)
    );
}

#[test]
fn test_class_call_handler_receives_class() {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Point", "Point", None, None).unwrap();
    bridge.begin_module("Point").unwrap();
    bridge
        .set_call_handler(NativeFn::new("Point.new", |ctx: &mut CallContext| {
            assert!(matches!(ctx.slot(1), Value::Class(_)));
            let ptr = NativePtr::new(ctx.get::<usize>(2)?);
            let obj = ctx.host_mut().push_usertype(ptr, "Point", false)?;
            ctx.set_return_value(obj);
            Ok(())
        }))
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let class = bridge.globals().raw_get_str("Point");
    let obj = bridge.call(&class, vec![Value::from(0x80)]).unwrap();
    assert_eq!(bridge.type_name_of(&obj), "Point");
    assert_eq!(bridge.type_name_of(&class), "class Point");
}

#[test]
fn test_non_callable_is_fatal() {
    let mut bridge = base_and_derived();
    let obj = bridge.push_usertype(NativePtr::new(0x10), "Base").unwrap();
    assert!(matches!(
        bridge.call(&obj, Vec::new()),
        Err(ScriptError::NotCallable { type_name }) if type_name == "Base"
    ));
    assert!(matches!(
        bridge.call(&Value::from(1), Vec::new()),
        Err(ScriptError::NotCallable { .. })
    ));
}

#[test]
fn test_operators_resolve_on_first_operand() {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Money", "Money", None, None).unwrap();
    bridge.begin_module("Money").unwrap();
    bridge
        .operator(
            Operator::Add,
            NativeFn::new("Money.add", |ctx: &mut CallContext| {
                let rhs: f64 = ctx.get(2)?;
                ctx.set_return(rhs + 100.0);
                Ok(())
            }),
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let obj = bridge.push_usertype(NativePtr::new(0x90), "Money").unwrap();
    assert_eq!(
        bridge.operate(Operator::Add, &obj, &Value::from(1)).unwrap(),
        Value::Number(101.0)
    );
    assert!(matches!(
        bridge.operate(Operator::Sub, &obj, &Value::from(1)),
        Err(ScriptError::InvalidOperand { op: Operator::Sub, .. })
    ));
    assert!(matches!(
        bridge.operate(Operator::Add, &Value::from(1), &obj),
        Err(ScriptError::InvalidOperand { .. })
    ));
    assert!(bridge.less_than(&obj, &obj).is_err());
}

#[test]
fn test_equality_totality() {
    let mut bridge = base_and_derived();
    let a = bridge.push_usertype(NativePtr::new(0xa0), "Base").unwrap();
    let b = bridge.push_usertype(NativePtr::new(0xb0), "Derived").unwrap();

    assert!(!bridge.equals(&a, &b).unwrap());
    assert!(!bridge.equals(&a, &Value::from(1)).unwrap());
    assert!(!bridge.equals(&Value::Nil, &a).unwrap());
    assert!(bridge.equals(&a, &a).unwrap());
}

#[test]
fn test_equality_handler() {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Id", "Id", None, None).unwrap();
    bridge.begin_module("Id").unwrap();
    bridge
        .operator(
            Operator::Eq,
            NativeFn::new("Id.eq", |ctx: &mut CallContext| {
                let lhs = ctx.this_ptr()?.addr() & 0xf0;
                let rhs = ctx.host().pointer_of(&ctx.slot(2)).map(|p| p.addr() & 0xf0);
                ctx.set_return(Some(lhs) == rhs);
                Ok(())
            }),
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let a = bridge.push_usertype(NativePtr::new(0x11), "Id").unwrap();
    let b = bridge.push_usertype(NativePtr::new(0x12), "Id").unwrap();
    assert!(bridge.equals(&a, &b).unwrap());
}

#[test]
fn test_equality_handler_skips_non_objects() {
    init_logging();
    let (calls, seen) = counter();
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Id", "Id", None, None).unwrap();
    bridge.begin_module("Id").unwrap();
    bridge
        .operator(
            Operator::Eq,
            NativeFn::new("Id.eq", move |ctx: &mut CallContext| {
                marshal::is_usertype(ctx, 2, "Id", false)
                    .map_err(|e| e.raise("#ferror in function 'eq'."))?;
                seen.set(seen.get() + 1);
                ctx.set_return(true);
                Ok(())
            }),
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let obj = bridge.push_usertype(NativePtr::new(0x21), "Id").unwrap();
    assert!(!bridge.equals(&obj, &Value::from(5)).unwrap());
    assert!(!bridge.equals(&obj, &Value::Nil).unwrap());
    assert!(!bridge.equals(&Value::from("id"), &obj).unwrap());
    assert_eq!(calls.get(), 0);

    let other = bridge.push_usertype(NativePtr::new(0x22), "Id").unwrap();
    assert!(bridge.equals(&obj, &other).unwrap());
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// Modules
// ============================================================================

#[test]
fn test_module_variables() {
    init_logging();
    let level = Rc::new(Cell::new(1.0));
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.module("settings", true).unwrap();
    bridge.begin_module("settings").unwrap();
    let read = level.clone();
    let write = level.clone();
    bridge
        .variable(
            "level",
            NativeFn::new("level.get", move |ctx: &mut CallContext| {
                ctx.set_return(read.get());
                Ok(())
            }),
            Some(NativeFn::new("level.set", move |ctx: &mut CallContext| {
                write.set(ctx.get(2)?);
                Ok(())
            })),
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let settings = bridge.globals().raw_get_str("settings");
    let key = Value::from("level");
    assert_eq!(bridge.index(&settings, &key).unwrap(), Value::Number(1.0));
    bridge.new_index(&settings, &key, Value::from(3)).unwrap();
    assert_eq!(level.get(), 3.0);
    assert!(settings.as_table().unwrap().raw_get_str("level").is_nil());

    bridge
        .new_index(&settings, &Value::from("other"), Value::from(true))
        .unwrap();
    assert_eq!(
        settings.as_table().unwrap().raw_get_str("other"),
        Value::Bool(true)
    );
}

#[test]
fn test_module_keeps_previous_hooks() {
    init_logging();
    let (hooked, seen) = counter();
    let table = TableRef::with_fallback(Fallback {
        index: Some(Value::Function(NativeFn::new("old.index", |ctx: &mut CallContext| {
            let key: String = ctx.get(2)?;
            ctx.set_return(format!("old:{key}"));
            Ok(())
        }))),
        new_index: Some(NativeFn::new("old.newindex", move |_ctx: &mut CallContext| {
            seen.set(seen.get() + 1);
            Ok(())
        })),
    });

    let mut bridge = Bridge::new();
    bridge.globals().raw_set_str("legacy", table.clone());
    bridge.begin_module("").unwrap();
    bridge.module("legacy", true).unwrap();
    bridge.end_module().unwrap();

    let legacy = Value::Table(table.clone());
    assert_eq!(
        bridge.index(&legacy, &Value::from("name")).unwrap(),
        Value::from("old:name")
    );
    bridge
        .new_index(&legacy, &Value::from("k"), Value::from(1))
        .unwrap();
    assert_eq!(hooked.get(), 1);
    assert_eq!(table.raw_get_str("k"), Value::Number(1.0));
}

#[test]
fn test_static_members_on_class_table() {
    let mut bridge = Bridge::new();
    bridge.begin_module("").unwrap();
    bridge.class("Config", "Config", None, None).unwrap();
    bridge.begin_module("Config").unwrap();
    bridge.constant("VERSION", 3).unwrap();
    bridge
        .variable(
            "instances",
            NativeFn::new("Config.instances", |ctx: &mut CallContext| {
                ctx.set_return(ctx.top() as f64);
                Ok(())
            }),
            None,
        )
        .unwrap();
    bridge.end_module().unwrap();
    bridge.end_module().unwrap();

    let class = bridge.globals().raw_get_str("Config");
    assert_eq!(
        bridge.index(&class, &Value::from("VERSION")).unwrap(),
        Value::Number(3.0)
    );
    assert_eq!(
        bridge.index(&class, &Value::from("instances")).unwrap(),
        Value::Number(0.0)
    );
}

// ============================================================================
// Library
// ============================================================================

fn library_fn(bridge: &Bridge, name: &str) -> Value {
    let lib = bridge.globals().raw_get_str("hostbridge");
    lib.as_table()
        .expect("library module is installed")
        .raw_get_str(name)
}

#[test]
fn test_library_type_and_ownership() {
    let mut bridge = base_and_derived();
    bridge.open().unwrap();
    let obj = bridge.push_usertype(NativePtr::new(0xc0), "Derived").unwrap();

    let type_fn = library_fn(&bridge, "type");
    assert_eq!(
        bridge.call(&type_fn, vec![obj.clone()]).unwrap(),
        Value::from("Derived")
    );
    assert_eq!(
        bridge.call(&type_fn, Vec::new()).unwrap(),
        Value::from("[no object]")
    );

    let take = library_fn(&bridge, "takeownership");
    assert_eq!(bridge.call(&take, vec![obj.clone()]).unwrap(), Value::Bool(true));
    assert_eq!(bridge.call(&take, vec![obj.clone()]).unwrap(), Value::Bool(false));
    let release = library_fn(&bridge, "releaseownership");
    assert_eq!(bridge.call(&release, vec![obj]).unwrap(), Value::Bool(true));
}

#[test]
fn test_library_cast_and_isnull() {
    let mut bridge = base_and_derived();
    bridge.open().unwrap();

    let cast = library_fn(&bridge, "cast");
    let obj = bridge
        .call(
            &cast,
            vec![Value::Pointer(NativePtr::new(0xd0)), Value::from("Base")],
        )
        .unwrap();
    assert_eq!(bridge.type_name_of(&obj), "Base");
    assert_eq!(
        bridge.call(&cast, vec![Value::Nil, Value::from("Base")]).unwrap(),
        Value::Nil
    );

    let isnull = library_fn(&bridge, "isnull");
    assert_eq!(bridge.call(&isnull, vec![obj]).unwrap(), Value::Bool(false));
    assert_eq!(
        bridge
            .call(&isnull, vec![Value::Pointer(NativePtr::NULL)])
            .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_library_peers_and_inherit() {
    let mut bridge = base_and_derived();
    bridge.open().unwrap();
    let obj = bridge.push_usertype(NativePtr::new(0xe0), "Derived").unwrap();

    let getpeer = library_fn(&bridge, "getpeer");
    assert_eq!(bridge.call(&getpeer, vec![obj.clone()]).unwrap(), Value::Nil);

    let peer = TableRef::new();
    peer.raw_set_str("tag", "x");
    let setpeer = library_fn(&bridge, "setpeer");
    bridge
        .call(&setpeer, vec![obj.clone(), Value::Table(peer.clone())])
        .unwrap();
    assert_eq!(
        bridge.index(&obj, &Value::from("tag")).unwrap(),
        Value::from("x")
    );
    assert!(bridge.call(&setpeer, vec![Value::from(1)]).is_err());

    let script_object = TableRef::new();
    let inherit = library_fn(&bridge, "inherit");
    bridge
        .call(&inherit, vec![Value::Table(script_object.clone()), obj.clone()])
        .unwrap();

    let ctx = CallContext::new(&mut bridge, vec![Value::Table(script_object)]);
    assert!(marshal::is_usertype(&ctx, 1, "Base", false).is_ok());
    assert_eq!(
        marshal::to_usertype(&ctx, 1, NativePtr::NULL),
        NativePtr::new(0xe0)
    );
}

#[test]
fn test_library_module_can_be_disabled() {
    let mut bridge = BridgeConfig::new()
        .with_library_module(None::<&str>)
        .build();
    bridge.open().unwrap();
    assert!(bridge.globals().raw_get_str("hostbridge").is_nil());
}

// ============================================================================
// Marshalling
// ============================================================================

#[test]
fn test_usertype_checks() {
    let mut bridge = base_and_derived();
    bridge.declare_inheritance("Other", None, None).unwrap();
    let obj = bridge.push_usertype(NativePtr::new(0xf0), "Derived").unwrap();

    let ctx = CallContext::new(&mut bridge, vec![obj, Value::Nil]);
    assert!(marshal::is_usertype(&ctx, 1, "Base", false).is_ok());
    assert!(marshal::is_usertype(&ctx, 1, "const Base", false).is_ok());
    assert!(marshal::is_usertype(&ctx, 2, "Base", false).is_ok());

    let err = marshal::is_usertype(&ctx, 1, "Other", false).unwrap_err();
    assert_eq!(err.expected, "Other");
    assert_eq!(err.actual, "Derived");
    let message = marshal::raise(err, "#ferror in function 'move'.").to_string();
    assert!(message.contains("argument #1 is 'Derived'; 'Other' expected."));
}

#[test]
fn test_usertable_checks() {
    let mut bridge = base_and_derived();
    let base = bridge.find_type("Base").unwrap();
    let ctx = CallContext::new(&mut bridge, vec![Value::Class(base)]);

    assert!(marshal::is_usertable(&ctx, 1, "Base", false).is_ok());
    assert!(marshal::is_usertable(&ctx, 1, "const Base", false).is_ok());
    assert!(marshal::is_usertable(&ctx, 1, "Derived", false).is_err());
    assert_eq!(marshal::type_name_at(&ctx, 1), "class Base");
}

#[test]
fn test_usertype_array_check() {
    let mut bridge = base_and_derived();
    let a = bridge.push_usertype(NativePtr::new(0x1a0), "Base").unwrap();
    let list = TableRef::new();
    list.raw_set(Key::Int(1), a);
    list.raw_set(Key::Int(2), Value::from(3));

    let ctx = CallContext::new(&mut bridge, vec![Value::Table(list)]);
    assert!(marshal::is_usertype_array(&ctx, 1, "Base", 1, false).is_ok());
    let err = marshal::is_usertype_array(&ctx, 1, "Base", 2, false).unwrap_err();
    assert!(err.array);
    assert_eq!(err.actual, "number");
}
