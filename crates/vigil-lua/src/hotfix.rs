//! Scripted hotfix installation
//!
//! The replacement body compiles in a fresh, isolated engine sharing the
//! caller's root and print callbacks, so a broken patch cannot corrupt the
//! session that installed it. The compiled chunk receives the live call's
//! arguments as varargs and must return one value handle per declared output.
//!
//! Once installed, a failure inside the replacement panics the binding; the
//! invoker contains the panic and reports the call as a `ScriptRuntime`
//! error. The call fails loudly, the host process keeps running.

use mlua::{Function, Lua, Variadic};
use parking_lot::Mutex;
use vigil_core::{hotfix, FuncSig, TypeRef, ValueHandle};

use crate::engine::{context, Engine};
use crate::object::ScriptObject;

fn run_replacement(
    func: &Function,
    name: &str,
    outs: &[TypeRef],
    args: &[ValueHandle],
) -> Result<Vec<ValueHandle>, String> {
    let call_args = Variadic::from_iter(args.iter().map(|h| ScriptObject::Value(h.clone())));
    let ret: mlua::MultiValue = func
        .call(call_args)
        .map_err(|e| format!("hotfix `{name}` script error: {e}"))?;

    if ret.len() != outs.len() {
        return Err(format!(
            "hotfix `{name}` returned {} values, declared {}",
            ret.len(),
            outs.len()
        ));
    }
    let mut out = Vec::with_capacity(outs.len());
    for (i, v) in ret.into_iter().enumerate() {
        let ud = v
            .as_userdata()
            .ok_or_else(|| format!("hotfix `{name}` return {} is not a value handle", i + 1))?;
        let obj = ud
            .borrow::<ScriptObject>()
            .map_err(|e| format!("hotfix `{name}` return {}: {e}", i + 1))?;
        let h = obj
            .handle()
            .map_err(|e| format!("hotfix `{name}` return {}: {e}", i + 1))?;
        out.push(h.clone());
    }
    Ok(out)
}

/// Compile `script` in an isolated engine and swap it in as the active
/// implementation of `name`
pub(crate) fn install_scripted(
    lua: &Lua,
    name: String,
    script: String,
    ins: Vec<TypeRef>,
    outs: Vec<TypeRef>,
) -> mlua::Result<()> {
    let ctx = context(lua)?;

    let engine = Engine::new(ctx.symbols.clone(), ctx.root.clone(), ctx.print.clone())
        .map_err(mlua::Error::external)?;
    let func: Function = engine
        .lua()
        .load(&script)
        .set_name(format!("@hotfix:{name}"))
        .into_function()
        .map_err(|e| mlua::Error::external(format!("script error: {e}")))?;

    let sig = FuncSig::new(ins.clone(), outs.clone());
    let bound_name = name.clone();
    // The binding owns the isolated engine; the mutex keeps the single-
    // threaded Lua state behind it to one caller at a time.
    let state = Mutex::new((engine, func));
    hotfix::install(&ctx.symbols, &name, &sig, move |args| {
        if args.len() != ins.len() {
            panic!(
                "hotfix `{bound_name}` called with {} args, declared {}",
                args.len(),
                ins.len()
            );
        }
        let guard = state.lock();
        match run_replacement(&guard.1, &bound_name, &outs, args) {
            Ok(ret) => Ok(ret),
            Err(msg) => panic!("{msg}"),
        }
    })
    .map_err(mlua::Error::external)
}
