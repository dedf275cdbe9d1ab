//! Vigil Core Runtime
//!
//! Engine-agnostic machinery for inspecting and patching a live host process:
//! - Tagged value model with live, aliasing handles onto host state
//! - Runtime type descriptors with interned primitives
//! - Symbol table resolving names to functions, types and globals
//! - Reflective accessors (fields, maps, slices, arrays, primitives)
//! - Dynamic invocation through swappable function identities
//! - Hotfix installation for live function replacement
//!
//! The scripting surface lives in `vigil-lua`; this crate has no opinion
//! about which engine drives it.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod error;
pub mod hotfix;
pub mod invoke;
pub mod symbols;
pub mod types;
pub mod value;

pub use access::{Access, Number, NumberInput};
pub use error::{Error, Result};
pub use symbols::{
    process_table, register_metadata, DebugMetadata, FuncId, HostFn, SymbolKind, SymbolTable,
    SymbolTableBuilder,
};
pub use types::{FieldDef, FuncSig, StructLayout, TypeDescriptor, TypeKind, TypeRef};
pub use value::{new_cell, zero_value, Cell, HostValue, ValueHandle};
