//! Lua engine wrapper
//!
//! One [`Engine`] owns one `mlua::Lua` with the bridge module preloaded as
//! `require("vigil")`. Scripts run inside a sandbox environment whose `print`
//! is rebound to the session-tagged sink; everything else falls back to the
//! real globals.

use std::sync::Arc;

use mlua::{Function, Lua, Table, Value, Variadic};
use vigil_core::{Error, Result, SymbolTable, ValueHandle};

use crate::exports;

/// Resolves a root object by name; the host decides what scripts may reach
pub type RootFn = Arc<dyn Fn(&str) -> Option<ValueHandle> + Send + Sync>;

/// Receives script output and error reports, tagged with the session id
pub type PrintFn = Arc<dyn Fn(i64, &str) + Send + Sync>;

/// Shared state every bridge function reaches through the Lua app data
#[derive(Clone)]
pub(crate) struct ExecutionContext {
    pub root: RootFn,
    pub print: PrintFn,
    pub symbols: Arc<SymbolTable>,
}

pub(crate) fn context(lua: &Lua) -> mlua::Result<ExecutionContext> {
    lua.app_data_ref::<ExecutionContext>()
        .map(|ctx| ctx.clone())
        .ok_or_else(|| mlua::Error::external("vigil context missing from Lua state"))
}

fn setup_error(e: mlua::Error) -> Error {
    Error::ScriptRuntime(e.to_string())
}

/// A scripting engine bound to one symbol table and one pair of host
/// callbacks
pub struct Engine {
    lua: Lua,
}

impl Engine {
    /// Fresh Lua state with the bridge module registered under
    /// `package.loaded["vigil"]`
    pub fn new(symbols: Arc<SymbolTable>, root: RootFn, print: PrintFn) -> Result<Self> {
        let lua = Lua::new();
        lua.set_app_data(ExecutionContext {
            root,
            print,
            symbols,
        });

        let module = exports::register(&lua).map_err(setup_error)?;
        let loaded: Table = lua
            .globals()
            .get::<Table>("package")
            .and_then(|pkg| pkg.get("loaded"))
            .map_err(setup_error)?;
        loaded.set("vigil", module).map_err(setup_error)?;

        Ok(Engine { lua })
    }

    pub(crate) fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Run a script in a sandboxed environment.
    ///
    /// Compile errors come back as `ScriptCompile`. Runtime failures inside
    /// the script are reported through the print sink, traceback included,
    /// and do not become host errors.
    pub fn execute(&self, script: &str, session: i64) -> Result<()> {
        let ctx = context(&self.lua).map_err(setup_error)?;

        let env = self.lua.create_table().map_err(setup_error)?;
        let meta = self.lua.create_table().map_err(setup_error)?;
        meta.set("__index", self.lua.globals()).map_err(setup_error)?;
        env.set_metatable(Some(meta));

        let tostring: Function = self.lua.globals().get("tostring").map_err(setup_error)?;
        let sink = ctx.print.clone();
        let session_print = self
            .lua
            .create_function(move |_, args: Variadic<Value>| {
                let mut parts = Vec::with_capacity(args.len());
                for v in args {
                    parts.push(tostring.call::<String>(v)?);
                }
                sink(session, &parts.join("\t"));
                Ok(())
            })
            .map_err(setup_error)?;
        env.set("print", session_print).map_err(setup_error)?;

        let chunk = self
            .lua
            .load(script)
            .set_name(format!("@session:{session}"))
            .set_environment(env);

        match chunk.exec() {
            Ok(()) => Ok(()),
            Err(e @ mlua::Error::SyntaxError { .. }) => Err(Error::ScriptCompile(e.to_string())),
            Err(e) => {
                (ctx.print)(session, &e.to_string());
                Ok(())
            }
        }
    }
}
