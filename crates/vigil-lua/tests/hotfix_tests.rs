//! Hotfix integration tests
//!
//! Patches are installed from Lua through `hotfix_func_with_name` and then
//! observed from both sides of the bridge: host callers via `invoke` and
//! script callers via `call_func_with_name`. The replacement body runs in an
//! isolated engine, so a broken patch shows up either at install time (in the
//! sink) or as a `ScriptRuntime` error at call time.

mod common;

use std::thread;

use vigil_core::access::{self, Number};
use vigil_core::{invoke, Error, ValueHandle};

fn as_i64(h: &ValueHandle) -> i64 {
    match access::get_number(h) {
        Ok(Number::Int64(n)) => n,
        other => panic!("expected i64, got {other:?}"),
    }
}

const PATCH_ADD_1000: &str = r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", [[
            local vigil = require("vigil")
            local a, b = ...
            local x = tonumber(vigil.get_number(a))
            local y = tonumber(vigil.get_number(b))
            return vigil.new_int64(x), vigil.new_int64(x + y + 1000)
        ]], {i64, i64}, {i64, i64})
        print("patched")
"#;

// ===== installation and visibility =====

#[test]
fn test_hotfix_visible_to_host_and_script_callers() {
    let h = common::build();
    h.run(PATCH_ADD_1000);
    assert_eq!(h.lines(), vec!["patched"]);

    // host-side call goes through the same dispatch slot
    let out = invoke::call_by_name(
        &h.symbols,
        "demo::add",
        &[ValueHandle::new_i64(1), ValueHandle::new_i64(2)],
    )
    .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(as_i64(&out[0]), 1);
    assert_eq!(as_i64(&out[1]), 1003);

    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        local a, b = vigil.call_func_with_name("demo::add",
            {vigil.new_int64(1), vigil.new_int64(2)}, {i64, i64})
        print(vigil.get_number(a), vigil.get_number(b))
    "#);
    assert_eq!(h.lines(), vec!["patched", "1\t1003"]);
}

#[test]
fn test_second_hotfix_wins() {
    let h = common::build();
    h.run(PATCH_ADD_1000);
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", [[
            local vigil = require("vigil")
            local a, b = ...
            local x = tonumber(vigil.get_number(a))
            local y = tonumber(vigil.get_number(b))
            return vigil.new_int64(x), vigil.new_int64(x * y)
        ]], {i64, i64}, {i64, i64})
    "#);

    let out = invoke::call_by_name(
        &h.symbols,
        "demo::add",
        &[ValueHandle::new_i64(6), ValueHandle::new_i64(7)],
    )
    .unwrap();
    assert_eq!(as_i64(&out[1]), 42);
}

// ===== rejected installs =====

#[test]
fn test_hotfix_unknown_function_reported_to_sink() {
    let h = common::build();
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::missing", "return ...", {i64}, {i64})
        print("unreached")
    "#);
    let lines = h.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("not found"), "got: {}", lines[0]);
}

#[test]
fn test_hotfix_signature_mismatch_leaves_original_in_place() {
    let h = common::build();
    // demo::add is registered with two outputs; declaring one must fail
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", "return ...", {i64, i64}, {i64})
    "#);
    let lines = h.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("type mismatch"), "got: {}", lines[0]);

    let out = invoke::call_by_name(
        &h.symbols,
        "demo::add",
        &[ValueHandle::new_i64(1), ValueHandle::new_i64(2)],
    )
    .unwrap();
    assert_eq!(as_i64(&out[1]), 3);
}

#[test]
fn test_hotfix_compile_error_reported_to_sink() {
    let h = common::build();
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", "return ((", {i64, i64}, {i64, i64})
    "#);
    let lines = h.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("script error"), "got: {}", lines[0]);
}

// ===== replacement failures at call time =====

#[test]
fn test_replacement_return_count_surfaces_as_runtime_error() {
    let h = common::build();
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", [[
            local vigil = require("vigil")
            return vigil.new_int64(0)
        ]], {i64, i64}, {i64, i64})
    "#);
    assert!(h.lines().is_empty());

    let err = invoke::call_by_name(
        &h.symbols,
        "demo::add",
        &[ValueHandle::new_i64(1), ValueHandle::new_i64(2)],
    )
    .unwrap_err();
    match err {
        Error::ScriptRuntime(msg) => {
            assert!(msg.contains("returned 1 values"), "got: {msg}");
        }
        other => panic!("expected ScriptRuntime, got {other:?}"),
    }
}

// ===== serialization =====

#[test]
fn test_concurrent_callers_are_serialized() {
    let h = common::build();
    // Non-atomic read-modify-write on a shared global: lost updates unless
    // calls into the replacement are one at a time.
    h.run(r#"
        local vigil = require("vigil")
        local i64 = vigil.get_type_with_name("i64", false)
        vigil.hotfix_func_with_name("demo::add", [[
            local vigil = require("vigil")
            local g = vigil.get_global_with_name("demo::counter")
            local n = tonumber(vigil.get_number(g))
            for _ = 1, 1000 do end
            vigil.set_number(g, tostring(n + 1))
            return vigil.new_int64(n), vigil.new_int64(n + 1)
        ]], {i64, i64}, {i64, i64})
    "#);
    assert!(h.lines().is_empty());

    let mut workers = Vec::new();
    for _ in 0..8 {
        let table = h.symbols.clone();
        workers.push(thread::spawn(move || {
            invoke::call_by_name(
                &table,
                "demo::add",
                &[ValueHandle::new_i64(0), ValueHandle::new_i64(0)],
            )
            .unwrap();
        }));
    }
    for w in workers {
        w.join().unwrap();
    }

    let counter = h.symbols.resolve_global("demo::counter").unwrap();
    assert_eq!(as_i64(&counter), 8);
}
