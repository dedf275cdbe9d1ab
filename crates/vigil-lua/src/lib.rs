//! Vigil Lua Bridge
//!
//! Embeds a Lua engine over the `vigil-core` runtime so an operator can
//! inspect and patch a live process from scripts: walk structs (private
//! fields included), edit maps and slices, call host functions by name, and
//! hotfix a running function without restarting.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_lua::Engine;
//!
//! let engine = Engine::new(
//!     symbols,
//!     Arc::new(|name| host_roots(name)),
//!     Arc::new(|session, line| println!("[{session}] {line}")),
//! )?;
//! engine.execute(r#"
//!     local vigil = require("vigil")
//!     local counter = vigil.get_global_with_name("demo::counter")
//!     vigil.set_number(counter, 42)
//! "#, 1)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod engine;
mod exports;
mod hotfix;
mod object;

pub use engine::{Engine, PrintFn, RootFn};
pub use object::ScriptObject;
