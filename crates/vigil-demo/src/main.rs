//! Example host embedding the Vigil bridge.
//!
//! A small game-like module (`demo::TestData` holding a map and a slice of
//! `demo::RoleInfo`) is described to the process symbol table, then two
//! operator sessions run against it: one inspects and mutates private state,
//! one live-patches a free function and a private method. The host prints its
//! own view of the data afterwards to show the scripts really touched it.

use std::sync::Arc;

use anyhow::{Context, Result};
use vigil_core::{
    access::{self, Access, Number},
    process_table, register_metadata, zero_value, DebugMetadata, FieldDef, FuncSig, HostValue,
    SymbolTableBuilder, TypeDescriptor, ValueHandle,
};
use vigil_lua::Engine;

fn arg_i64(h: &ValueHandle) -> i64 {
    match h.get() {
        HostValue::I64(n) => n,
        _ => 0,
    }
}

fn role_info_type() -> vigil_core::TypeRef {
    TypeDescriptor::named_struct(
        "demo::RoleInfo",
        vec![
            FieldDef {
                name: "name".into(),
                ty: TypeDescriptor::str(),
                exported: false,
            },
            FieldDef {
                name: "level".into(),
                ty: TypeDescriptor::i32(),
                exported: false,
            },
            FieldDef {
                name: "id".into(),
                ty: TypeDescriptor::i32(),
                exported: false,
            },
        ],
    )
}

struct DemoModule;

impl DebugMetadata for DemoModule {
    fn describe(&self, b: &mut SymbolTableBuilder) {
        let role_ty = role_info_type();
        let map_ty =
            TypeDescriptor::map_of(TypeDescriptor::i32(), TypeDescriptor::ptr_to(role_ty.clone()));
        let slice_ty = TypeDescriptor::slice_of(role_ty.clone());
        let data_ty = TypeDescriptor::named_struct(
            "demo::TestData",
            vec![
                FieldDef {
                    name: "name".into(),
                    ty: TypeDescriptor::str(),
                    exported: false,
                },
                FieldDef {
                    name: "map1".into(),
                    ty: map_ty.clone(),
                    exported: false,
                },
                FieldDef {
                    name: "slice1".into(),
                    ty: slice_ty.clone(),
                    exported: false,
                },
            ],
        );

        b.define_type(TypeDescriptor::i64());
        b.define_type(TypeDescriptor::i32());
        b.define_type(TypeDescriptor::str());
        b.define_type(role_ty.clone());
        b.define_type(map_ty);
        b.define_type(slice_ty);
        b.define_type(data_ty.clone());

        b.define_global("demo::data", data_ty.clone(), zero_value(&data_ty));

        b.define_function(
            "demo::test_add",
            FuncSig::new(
                vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
                vec![
                    TypeDescriptor::i64(),
                    TypeDescriptor::i64(),
                    TypeDescriptor::i64(),
                ],
            ),
            |args| {
                let a = arg_i64(&args[0]);
                let b = arg_i64(&args[1]);
                Ok(vec![
                    ValueHandle::new_i64(a),
                    ValueHandle::new_i64(b),
                    ValueHandle::new_i64(a + b),
                ])
            },
        );

        b.define_method(
            &role_ty,
            "set_name",
            false,
            FuncSig::new(
                vec![TypeDescriptor::ptr_to(role_ty.clone()), TypeDescriptor::str()],
                vec![],
            ),
            |args| {
                let recv = access::deref(&args[0])?;
                access::field_set(&recv, "name", &args[1], Access::Privileged)?;
                Ok(vec![])
            },
        );
    }
}

const INSPECT: &str = r#"
    local vigil = require("vigil")
    local root = vigil.root_get("data")

    print("private field TestData.name:",
        vigil.get_string(vigil.field_get_by_name(root, "name")))

    local map1 = vigil.field_get_by_name(root, "map1")
    for i = 1, 5 do
        local role = vigil.map_new_val(map1)
        vigil.field_set_by_name(role, "name", vigil.new_string("lua role " .. i))
        vigil.field_set_by_name(role, "level", vigil.new_int32(i))
        vigil.map_set(map1, vigil.new_int32(i), role)
    end

    local role1 = vigil.map_get(map1, vigil.new_int32(1))
    vigil.field_set_by_name(role1, "name", vigil.new_string("MODIFIED BY LUA role1"))

    vigil.map_foreach(map1, function(k, v)
        print("map entry", vigil.get_number(k),
            vigil.get_string(vigil.field_get_by_name(v, "name")))
        return 1
    end)

    local slice1 = vigil.field_get_by_name(root, "slice1")
    for i = 1, 3 do
        local role = vigil.array_new_elem(slice1)
        vigil.field_set_by_name(role, "name", vigil.new_string("role:" .. i))
        vigil.field_set_by_name(role, "level", vigil.new_int32(i))
        slice1 = vigil.slice_append(slice1, vigil.clone(role, false))
    end
    vigil.field_set_by_name(root, "slice1", slice1)
"#;

const HOTFIX: &str = r#"
    local vigil = require("vigil")
    local root = vigil.root_get("data")
    local i64 = vigil.get_type_with_name("i64", false)
    local str = vigil.get_type_with_name("string", false)
    local role_ptr = vigil.get_type_with_name("demo::RoleInfo", true)

    for _, name in pairs(vigil.search_func_name("demo::")) do
        print("function found:", name)
    end

    local r1, r2, r3 = vigil.call_func_with_name("demo::test_add",
        {vigil.new_int64(1), vigil.new_int64(2)}, {i64, i64, i64})
    print("test_add:", vigil.get_number(r1), vigil.get_number(r2), vigil.get_number(r3))

    vigil.hotfix_func_with_name("demo::test_add", [[
        local vigil = require("vigil")
        local a, b = ...
        local x = tonumber(vigil.get_number(a))
        local y = tonumber(vigil.get_number(b))
        return a, b, vigil.new_int64(x + y + 1000)
    ]], {i64, i64}, {i64, i64, i64})

    r1, r2, r3 = vigil.call_func_with_name("demo::test_add",
        {vigil.new_int64(1), vigil.new_int64(2)}, {i64, i64, i64})
    print("hotfixed test_add:", vigil.get_number(r1), vigil.get_number(r2), vigil.get_number(r3))

    local role1 = vigil.map_get(vigil.field_get_by_name(root, "map1"), vigil.new_int32(1))
    vigil.call_func_with_name("demo::RoleInfo::set_name",
        {role1, vigil.new_string("name by lua")}, {})
    print("after set_name:", vigil.get_string(vigil.field_get_by_name(role1, "name")))

    vigil.hotfix_func_with_name("demo::RoleInfo::set_name", [[
        local vigil = require("vigil")
        local role, name = ...
        vigil.field_set_by_name(role, "name",
            vigil.new_string("hotfix " .. vigil.get_string(name)))
    ]], {role_ptr, str}, {})

    vigil.call_func_with_name("demo::RoleInfo::set_name",
        {role1, vigil.new_string("name by lua")}, {})
    print("after hotfixed set_name:", vigil.get_string(vigil.field_get_by_name(role1, "name")))
"#;

fn fmt_number(n: Number) -> String {
    match n {
        Number::Float(f) => format!("{f}"),
        Number::Int64(i) => format!("{i}"),
        Number::Uint64(u) => format!("{u}"),
    }
}

fn dump_host_view(data: &ValueHandle) -> Result<()> {
    println!("-- host view --");
    let name = access::get_str(&access::field_get(data, "name", Access::Privileged)?)?;
    println!("data.name = {name:?}");

    let map1 = access::field_get(data, "map1", Access::Privileged)?;
    access::map_foreach(&map1, |k, v| {
        let role_name = access::get_str(&access::field_get(&v, "name", Access::Privileged)?)?;
        println!("data.map1[{}] = {role_name:?}", fmt_number(access::get_number(&k)?));
        Ok(true)
    })?;

    let slice1 = access::field_get(data, "slice1", Access::Privileged)?;
    access::array_foreach(&slice1, |i, v| {
        let role_name = access::get_str(&access::field_get(&v, "name", Access::Privileged)?)?;
        println!("data.slice1[{i}] = {role_name:?}");
        Ok(true)
    })?;
    Ok(())
}

fn main() -> Result<()> {
    register_metadata(Box::new(DemoModule)).context("registering demo metadata")?;
    let symbols = process_table();

    let data = symbols
        .resolve_global("demo::data")
        .context("resolving demo::data")?;
    access::field_set(
        &data,
        "name",
        &ValueHandle::new_str("TEST DATA NAME"),
        Access::Privileged,
    )?;

    let root_data = data.clone();
    let engine = Engine::new(
        symbols,
        Arc::new(move |name| match name {
            "data" => access::addr_of(&root_data).ok(),
            _ => None,
        }),
        Arc::new(|session, line| println!("[session {session}] {line}")),
    )?;

    engine.execute(INSPECT, 1).context("inspection session")?;
    engine.execute(HOTFIX, 2).context("hotfix session")?;

    dump_host_view(&data)
}
