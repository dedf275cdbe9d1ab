//! The script-callable bridge module
//!
//! Every function the scripting surface exposes, registered onto one table
//! that `Engine::new` drops into `package.loaded["vigil"]`. Names and
//! argument shapes follow the debug-console convention: values and types
//! cross as userdata, foreach callbacks return `1` to continue, and 64-bit
//! integers travel as decimal strings.

use mlua::{Function, Lua, Table, UserDataRef, Value, Variadic};
use vigil_core::{
    access::{self, Access, Number, NumberInput},
    invoke, Error, SymbolKind, TypeDescriptor, TypeRef, ValueHandle,
};

use crate::engine::context;
use crate::hotfix;
use crate::object::ScriptObject;

fn ext<T>(r: vigil_core::Result<T>) -> mlua::Result<T> {
    r.map_err(mlua::Error::external)
}

fn type_list(t: &Table) -> mlua::Result<Vec<TypeRef>> {
    let mut out = Vec::new();
    for v in t.sequence_values::<UserDataRef<ScriptObject>>() {
        out.push(v?.ty());
    }
    Ok(out)
}

fn value_list(t: &Table) -> mlua::Result<Vec<ValueHandle>> {
    let mut out = Vec::new();
    for v in t.sequence_values::<UserDataRef<ScriptObject>>() {
        out.push(v?.handle()?.clone());
    }
    Ok(out)
}

fn number_input(v: &Value) -> mlua::Result<NumberInput> {
    match v {
        Value::Integer(i) => Ok(NumberInput::Int(*i)),
        Value::Number(f) => Ok(NumberInput::Float(*f)),
        Value::String(s) => Ok(NumberInput::Decimal(s.to_str()?.to_string())),
        other => Err(mlua::Error::external(format!(
            "need number/string, got {}",
            other.type_name()
        ))),
    }
}

fn number_out(lua: &Lua, n: Number) -> mlua::Result<Value> {
    Ok(match n {
        // integral values surface as Lua integers so tostring() stays free of
        // the 5.4 float suffix
        Number::Float(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            Value::Integer(f as i64)
        }
        Number::Float(f) => Value::Number(f),
        Number::Int64(i) => Value::String(lua.create_string(i.to_string())?),
        Number::Uint64(u) => Value::String(lua.create_string(u.to_string())?),
    })
}

// foreach convention: the callback returns literal 1 to continue
fn wants_more(v: &Value) -> bool {
    matches!(v, Value::Integer(1)) || matches!(v, Value::Number(f) if *f == 1.0)
}

fn int64_from(v: &Value) -> mlua::Result<i64> {
    match v {
        Value::Integer(i) => Ok(*i),
        Value::Number(f) => Ok(*f as i64),
        Value::String(s) => s
            .to_str()?
            .parse::<i64>()
            .map_err(|_| mlua::Error::external("parse int error")),
        other => Err(mlua::Error::external(format!(
            "need number/string, got {}",
            other.type_name()
        ))),
    }
}

fn uint64_from(v: &Value) -> mlua::Result<u64> {
    match v {
        Value::Integer(i) => Ok(*i as u64),
        Value::Number(f) => Ok(*f as u64),
        Value::String(s) => s
            .to_str()?
            .parse::<u64>()
            .map_err(|_| mlua::Error::external("parse int error")),
        other => Err(mlua::Error::external(format!(
            "need number/string, got {}",
            other.type_name()
        ))),
    }
}

/// Build the bridge module table
pub(crate) fn register(lua: &Lua) -> mlua::Result<Table> {
    let m = lua.create_table()?;

    // -- host entry points ---------------------------------------------------

    m.set(
        "root_get",
        lua.create_function(|lua, name: String| {
            let ctx = context(lua)?;
            let h = (ctx.root)(&name).ok_or_else(|| {
                mlua::Error::external(format!("root object `{name}` not found"))
            })?;
            Ok(ScriptObject::Value(h))
        })?,
    )?;

    m.set(
        "print",
        lua.create_function(|lua, (session, text): (i64, String)| {
            let ctx = context(lua)?;
            (ctx.print)(session, &text);
            Ok(())
        })?,
    )?;

    // -- symbol resolution ---------------------------------------------------

    m.set(
        "search_type_name",
        lua.create_function(|lua, include: String| {
            Ok(context(lua)?.symbols.symbols(SymbolKind::Type, &include))
        })?,
    )?;

    m.set(
        "search_func_name",
        lua.create_function(|lua, include: String| {
            Ok(context(lua)?.symbols.symbols(SymbolKind::Function, &include))
        })?,
    )?;

    m.set(
        "search_global_name",
        lua.create_function(|lua, include: String| {
            Ok(context(lua)?.symbols.symbols(SymbolKind::Global, &include))
        })?,
    )?;

    m.set(
        "get_type_with_name",
        lua.create_function(|lua, (name, ptr): (String, bool)| {
            let t = ext(context(lua)?.symbols.resolve_type(&name))?;
            Ok(ScriptObject::Type(if ptr {
                TypeDescriptor::ptr_to(t)
            } else {
                t
            }))
        })?,
    )?;

    m.set(
        "get_obj_type",
        lua.create_function(|_, obj: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Type(obj.ty()))
        })?,
    )?;

    m.set(
        "get_global_with_name",
        lua.create_function(|lua, name: String| {
            let h = ext(context(lua)?.symbols.resolve_global(&name))?;
            Ok(ScriptObject::Value(h))
        })?,
    )?;

    // -- value plumbing ------------------------------------------------------

    m.set(
        "clone",
        lua.create_function(
            |_, (obj, use_ptr): (UserDataRef<ScriptObject>, Option<bool>)| {
                let fresh = access::clone_value(obj.handle()?);
                Ok(ScriptObject::Value(if use_ptr.unwrap_or(false) {
                    ext(access::addr_of(&fresh))?
                } else {
                    fresh
                }))
            },
        )?,
    )?;

    m.set(
        "ptr_to_val",
        lua.create_function(|_, obj: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::deref(obj.handle()?))?))
        })?,
    )?;

    m.set(
        "val_to_ptr",
        lua.create_function(|_, obj: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::addr_of(obj.handle()?))?))
        })?,
    )?;

    m.set(
        "convert_type_to",
        lua.create_function(
            |_, (obj, to): (UserDataRef<ScriptObject>, UserDataRef<ScriptObject>)| {
                Ok(ScriptObject::Value(ext(access::convert(
                    obj.handle()?,
                    &to.ty(),
                ))?))
            },
        )?,
    )?;

    m.set(
        "set_any",
        lua.create_function(
            |_, (dst, src): (UserDataRef<ScriptObject>, UserDataRef<ScriptObject>)| {
                ext(access::set_any(dst.handle()?, src.handle()?))
            },
        )?,
    )?;

    // -- invocation and hotfix -----------------------------------------------

    m.set(
        "call",
        lua.create_function(
            |lua,
             (f, args): (
                UserDataRef<ScriptObject>,
                Variadic<UserDataRef<ScriptObject>>,
            )| {
                let ctx = context(lua)?;
                let mut params = Vec::with_capacity(args.len());
                for a in args.iter() {
                    params.push(a.handle()?.clone());
                }
                let ret = ext(invoke::call_handle(&ctx.symbols, f.handle()?, &params))?;
                Ok(Variadic::from_iter(ret.into_iter().map(ScriptObject::Value)))
            },
        )?,
    )?;

    m.set(
        "call_func_with_name",
        lua.create_function(
            |lua, (name, in_t, out_t): (String, Table, Table)| {
                let ctx = context(lua)?;
                let args = value_list(&in_t)?;
                let outs = type_list(&out_t)?;

                let id = ext(ctx.symbols.resolve_function(&name))?;
                let sig = ctx.symbols.signature(id);
                if outs.len() != sig.outs.len() {
                    return Err(mlua::Error::external(Error::ArityMismatch {
                        expected: sig.outs.len(),
                        got: outs.len(),
                    }));
                }
                for (hint, want) in outs.iter().zip(&sig.outs) {
                    if hint.name != want.name {
                        return Err(mlua::Error::external(Error::TypeMismatch {
                            expected: want.name.clone(),
                            got: hint.name.clone(),
                        }));
                    }
                }

                let ret = ext(invoke::call_by_name(&ctx.symbols, &name, &args))?;
                Ok(Variadic::from_iter(ret.into_iter().map(ScriptObject::Value)))
            },
        )?,
    )?;

    m.set(
        "hotfix_func_with_name",
        lua.create_function(
            |lua, (name, script, in_t, out_t): (String, String, Table, Table)| {
                let ins = type_list(&in_t)?;
                let outs = type_list(&out_t)?;
                hotfix::install_scripted(lua, name, script, ins, outs)
            },
        )?,
    )?;

    // -- struct fields and methods -------------------------------------------

    m.set(
        "field_get_by_name",
        lua.create_function(
            |_, (obj, name): (UserDataRef<ScriptObject>, String)| {
                Ok(ScriptObject::Value(ext(access::field_get(
                    obj.handle()?,
                    &name,
                    Access::Privileged,
                ))?))
            },
        )?,
    )?;

    m.set(
        "field_set_by_name",
        lua.create_function(
            |_,
             (obj, name, val): (
                UserDataRef<ScriptObject>,
                String,
                UserDataRef<ScriptObject>,
            )| {
                ext(access::field_set(
                    obj.handle()?,
                    &name,
                    val.handle()?,
                    Access::Privileged,
                ))
            },
        )?,
    )?;

    m.set(
        "method_get_by_name",
        lua.create_function(
            |lua, (obj, name): (UserDataRef<ScriptObject>, String)| {
                let ctx = context(lua)?;
                Ok(ScriptObject::Value(ext(access::method_get(
                    &ctx.symbols,
                    obj.handle()?,
                    &name,
                    Access::Privileged,
                ))?))
            },
        )?,
    )?;

    // -- maps ----------------------------------------------------------------

    m.set(
        "map_get",
        lua.create_function(
            |_, (map, key): (UserDataRef<ScriptObject>, UserDataRef<ScriptObject>)| {
                let got = ext(access::map_get(map.handle()?, key.handle()?))?;
                Ok(got.map(ScriptObject::Value))
            },
        )?,
    )?;

    m.set(
        "map_set",
        lua.create_function(
            |_,
             (map, key, val): (
                UserDataRef<ScriptObject>,
                UserDataRef<ScriptObject>,
                UserDataRef<ScriptObject>,
            )| { ext(access::map_set(map.handle()?, key.handle()?, val.handle()?)) },
        )?,
    )?;

    m.set(
        "map_del",
        lua.create_function(
            |_, (map, key): (UserDataRef<ScriptObject>, UserDataRef<ScriptObject>)| {
                ext(access::map_del(map.handle()?, key.handle()?))
            },
        )?,
    )?;

    m.set(
        "map_foreach",
        lua.create_function(
            |_, (map, cb): (UserDataRef<ScriptObject>, Function)| {
                ext(access::map_foreach(map.handle()?, |k, v| {
                    let ret: Value = cb
                        .call((ScriptObject::Value(k), ScriptObject::Value(v)))
                        .map_err(|e| Error::ScriptRuntime(e.to_string()))?;
                    Ok(wants_more(&ret))
                }))
            },
        )?,
    )?;

    m.set(
        "map_new_key",
        lua.create_function(|_, map: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::map_new_key(map.handle()?))?))
        })?,
    )?;

    m.set(
        "map_new_val",
        lua.create_function(|_, map: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::map_new_val(map.handle()?))?))
        })?,
    )?;

    m.set(
        "map_make",
        lua.create_function(|_, ty: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::map_make(&ty.ty()))?))
        })?,
    )?;

    // -- slices and arrays ---------------------------------------------------

    m.set(
        "array_new_elem",
        lua.create_function(|_, seq: UserDataRef<ScriptObject>| {
            Ok(ScriptObject::Value(ext(access::array_new_elem(
                seq.handle()?,
            ))?))
        })?,
    )?;

    m.set(
        "array_foreach",
        lua.create_function(
            |_, (seq, cb): (UserDataRef<ScriptObject>, Function)| {
                ext(access::array_foreach(seq.handle()?, |i, v| {
                    let ret: Value = cb
                        .call((i, ScriptObject::Value(v)))
                        .map_err(|e| Error::ScriptRuntime(e.to_string()))?;
                    Ok(wants_more(&ret))
                }))
            },
        )?,
    )?;

    m.set(
        "array_get",
        lua.create_function(
            |_, (seq, i): (UserDataRef<ScriptObject>, usize)| {
                Ok(ScriptObject::Value(ext(access::array_get(seq.handle()?, i))?))
            },
        )?,
    )?;

    m.set(
        "array_set",
        lua.create_function(
            |_,
             (seq, i, val): (UserDataRef<ScriptObject>, usize, UserDataRef<ScriptObject>)| {
                ext(access::array_set(seq.handle()?, i, val.handle()?))
            },
        )?,
    )?;

    m.set(
        "array_slice",
        lua.create_function(
            |_, (seq, lo, hi): (UserDataRef<ScriptObject>, usize, usize)| {
                Ok(ScriptObject::Value(ext(access::array_slice(
                    seq.handle()?,
                    lo,
                    hi,
                ))?))
            },
        )?,
    )?;

    m.set(
        "slice_append",
        lua.create_function(
            |_, (seq, val): (UserDataRef<ScriptObject>, UserDataRef<ScriptObject>)| {
                Ok(ScriptObject::Value(ext(access::slice_append(
                    seq.handle()?,
                    val.handle()?,
                ))?))
            },
        )?,
    )?;

    m.set(
        "slice_make",
        lua.create_function(
            |_, (ty, len, cap): (UserDataRef<ScriptObject>, usize, usize)| {
                Ok(ScriptObject::Value(ext(access::slice_make(
                    &ty.ty(),
                    len,
                    cap,
                ))?))
            },
        )?,
    )?;

    // -- primitives ----------------------------------------------------------

    m.set(
        "get_string",
        lua.create_function(|_, obj: UserDataRef<ScriptObject>| {
            ext(access::get_str(obj.handle()?))
        })?,
    )?;

    m.set(
        "set_string",
        lua.create_function(
            |_, (obj, s): (UserDataRef<ScriptObject>, String)| {
                ext(access::set_str(obj.handle()?, &s))
            },
        )?,
    )?;

    m.set(
        "get_number",
        lua.create_function(|lua, obj: UserDataRef<ScriptObject>| {
            let n = ext(access::get_number(obj.handle()?))?;
            number_out(lua, n)
        })?,
    )?;

    m.set(
        "set_number",
        lua.create_function(|_, (obj, v): (UserDataRef<ScriptObject>, Value)| {
            ext(access::set_number(obj.handle()?, &number_input(&v)?))
        })?,
    )?;

    m.set(
        "get_boolean",
        lua.create_function(|_, obj: UserDataRef<ScriptObject>| {
            ext(access::get_bool(obj.handle()?))
        })?,
    )?;

    m.set(
        "set_boolean",
        lua.create_function(|_, (obj, b): (UserDataRef<ScriptObject>, bool)| {
            ext(access::set_bool(obj.handle()?, b))
        })?,
    )?;

    // -- constructors --------------------------------------------------------

    m.set(
        "new_boolean",
        lua.create_function(|_, v: bool| Ok(ScriptObject::Value(ValueHandle::new_bool(v))))?,
    )?;
    m.set(
        "new_int",
        lua.create_function(|_, v: f64| {
            Ok(ScriptObject::Value(ValueHandle::new_i64(v as i64)))
        })?,
    )?;
    m.set(
        "new_int8",
        lua.create_function(|_, v: f64| Ok(ScriptObject::Value(ValueHandle::new_i8(v as i8))))?,
    )?;
    m.set(
        "new_int16",
        lua.create_function(|_, v: f64| {
            Ok(ScriptObject::Value(ValueHandle::new_i16(v as i16)))
        })?,
    )?;
    m.set(
        "new_int32",
        lua.create_function(|_, v: f64| {
            Ok(ScriptObject::Value(ValueHandle::new_i32(v as i32)))
        })?,
    )?;
    m.set(
        "new_int64",
        lua.create_function(|_, v: Value| {
            Ok(ScriptObject::Value(ValueHandle::new_i64(int64_from(&v)?)))
        })?,
    )?;
    m.set(
        "new_uint8",
        lua.create_function(|_, v: f64| Ok(ScriptObject::Value(ValueHandle::new_u8(v as u8))))?,
    )?;
    m.set(
        "new_uint16",
        lua.create_function(|_, v: f64| {
            Ok(ScriptObject::Value(ValueHandle::new_u16(v as u16)))
        })?,
    )?;
    m.set(
        "new_uint32",
        lua.create_function(|_, v: f64| {
            Ok(ScriptObject::Value(ValueHandle::new_u32(v as u32)))
        })?,
    )?;
    m.set(
        "new_uint64",
        lua.create_function(|_, v: Value| {
            Ok(ScriptObject::Value(ValueHandle::new_u64(uint64_from(&v)?)))
        })?,
    )?;
    m.set(
        "new_string",
        lua.create_function(|_, v: String| Ok(ScriptObject::Value(ValueHandle::new_str(v))))?,
    )?;

    m.set(
        "new_with_name",
        lua.create_function(|lua, (name, use_ptr): (String, bool)| {
            let ty = ext(context(lua)?.symbols.resolve_type(&name))?;
            let fresh = ValueHandle::fresh(ty.clone(), vigil_core::zero_value(&ty));
            Ok(ScriptObject::Value(if use_ptr {
                ext(access::addr_of(&fresh))?
            } else {
                fresh
            }))
        })?,
    )?;

    m.set(
        "new_interface",
        lua.create_function(|_, ()| Ok(ScriptObject::Value(ValueHandle::new_interface())))?,
    )?;

    Ok(m)
}
