//! Symbol table and function identity registry
//!
//! The debug-information reader is an interface: host programs implement
//! [`DebugMetadata`] and register providers at startup. The process-wide
//! table is built at most once, on first resolution, under a mutex, and read
//! without locking afterwards. An explicit [`SymbolTable`] handle is threaded
//! through every component; tests build private tables directly.
//!
//! Function symbols double as the hotfix indirection layer: every resolved
//! function is a [`FuncId`] whose entry carries a swappable active
//! implementation, and every call site dispatches through that slot.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::types::{FuncSig, TypeRef};
use crate::value::{new_cell, Cell, HostValue, Place, ValueHandle};

/// Stable identity of a registered function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(u32);

/// Active implementation of a registered function
pub type HostFn = Arc<dyn Fn(&[ValueHandle]) -> Result<Vec<ValueHandle>> + Send + Sync>;

/// Symbol categories for discovery listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Type,
    Global,
}

/// Source of compiled symbol metadata.
///
/// Implementations enumerate the types, globals, functions and methods of one
/// host module into the builder. Providers run exactly once, when the process
/// table is first built.
pub trait DebugMetadata: Send + Sync {
    /// Describe this module's symbols
    fn describe(&self, table: &mut SymbolTableBuilder);
}

struct FuncEntry {
    name: String,
    sig: FuncSig,
    active: RwLock<HostFn>,
}

#[derive(Clone, Copy)]
struct MethodEntry {
    id: FuncId,
    exported: bool,
}

/// Accumulates symbol definitions before the table is frozen
#[derive(Default)]
pub struct SymbolTableBuilder {
    types: FxHashMap<String, TypeRef>,
    globals: FxHashMap<String, Place>,
    functions: FxHashMap<String, FuncId>,
    methods: FxHashMap<(String, String), MethodEntry>,
    entries: Vec<FuncEntry>,
}

impl SymbolTableBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named type descriptor (interned: later resolutions return
    /// this exact `Arc`)
    pub fn define_type(&mut self, ty: TypeRef) {
        self.types.insert(ty.name.clone(), ty);
    }

    /// Register a global variable with fresh storage. The returned cell is the
    /// global's live storage; the host keeps it to share the same memory.
    pub fn define_global(&mut self, name: &str, ty: TypeRef, value: HostValue) -> Cell {
        let cell = new_cell(value);
        self.define_global_cell(name, ty, cell.clone());
        cell
    }

    /// Register a global variable backed by existing storage
    pub fn define_global_cell(&mut self, name: &str, ty: TypeRef, cell: Cell) {
        self.globals.insert(name.to_string(), Place { ty, cell });
    }

    /// Register a free function under its fully-qualified name
    pub fn define_function<F>(&mut self, name: &str, sig: FuncSig, f: F) -> FuncId
    where
        F: Fn(&[ValueHandle]) -> Result<Vec<ValueHandle>> + Send + Sync + 'static,
    {
        let id = FuncId(self.entries.len() as u32);
        self.entries.push(FuncEntry {
            name: name.to_string(),
            sig,
            active: RwLock::new(Arc::new(f)),
        });
        self.functions.insert(name.to_string(), id);
        id
    }

    /// Register a method of a named type. The receiver is the first input of
    /// `sig`; the method also becomes a function symbol `<type>::<name>`.
    pub fn define_method<F>(
        &mut self,
        recv: &TypeRef,
        name: &str,
        exported: bool,
        sig: FuncSig,
        f: F,
    ) -> FuncId
    where
        F: Fn(&[ValueHandle]) -> Result<Vec<ValueHandle>> + Send + Sync + 'static,
    {
        let symbol = format!("{}::{}", recv.name, name);
        let id = self.define_function(&symbol, sig, f);
        self.methods
            .insert((recv.name.clone(), name.to_string()), MethodEntry {
                id,
                exported,
            });
        id
    }

    /// Freeze the accumulated symbols into an immutable shared table
    pub fn build(self) -> Arc<SymbolTable> {
        Arc::new(SymbolTable {
            types: self.types,
            globals: self.globals,
            functions: self.functions,
            methods: self.methods,
            entries: self.entries,
        })
    }
}

/// Immutable symbol table: name → descriptor/address maps plus the function
/// dispatch registry. Dispatch slots are the only mutable state (hotfix swaps
/// them).
pub struct SymbolTable {
    types: FxHashMap<String, TypeRef>,
    globals: FxHashMap<String, Place>,
    functions: FxHashMap<String, FuncId>,
    methods: FxHashMap<(String, String), MethodEntry>,
    entries: Vec<FuncEntry>,
}

impl SymbolTable {
    /// Resolve a function symbol. Data symbols never shadow functions: the
    /// function namespace is separate from globals.
    pub fn resolve_function(&self, name: &str) -> Result<FuncId> {
        self.functions
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("function `{name}`")))
    }

    /// Resolve a named type to its canonical runtime descriptor
    pub fn resolve_type(&self, name: &str) -> Result<TypeRef> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("type `{name}`")))
    }

    /// Resolve a global to a live, mutable reference to its storage
    pub fn resolve_global(&self, name: &str) -> Result<ValueHandle> {
        self.globals
            .get(name)
            .map(|p| ValueHandle::from_place(p.ty.clone(), p.cell.clone()))
            .ok_or_else(|| Error::NotFound(format!("global `{name}`")))
    }

    /// Names of one symbol kind containing `filter` (all names when the
    /// filter is empty). A snapshot computed at call time, sorted for
    /// deterministic listings.
    pub fn symbols(&self, kind: SymbolKind, filter: &str) -> Vec<String> {
        let names: Box<dyn Iterator<Item = &String>> = match kind {
            SymbolKind::Function => Box::new(self.functions.keys()),
            SymbolKind::Type => Box::new(self.types.keys()),
            SymbolKind::Global => Box::new(self.globals.keys()),
        };
        let mut out: Vec<String> = names
            .filter(|n| filter.is_empty() || n.contains(filter))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Signature of a registered function
    pub fn signature(&self, id: FuncId) -> &FuncSig {
        &self.entries[id.0 as usize].sig
    }

    /// Fully-qualified name of a registered function
    pub fn function_name(&self, id: FuncId) -> &str {
        &self.entries[id.0 as usize].name
    }

    /// Method lookup on a named type: `(function id, exported?)`
    pub fn method(&self, type_name: &str, method: &str) -> Option<(FuncId, bool)> {
        self.methods
            .get(&(type_name.to_string(), method.to_string()))
            .map(|m| (m.id, m.exported))
    }

    /// Dispatch a call through the function's active implementation. The
    /// implementation pointer is cloned out of the slot first, so a hotfix
    /// swap never blocks on an in-flight call.
    pub fn call(&self, id: FuncId, args: &[ValueHandle]) -> Result<Vec<ValueHandle>> {
        let f = self.entries[id.0 as usize].active.read().clone();
        f(args)
    }

    /// Atomically replace the active implementation of a function identity.
    /// All future calls, regardless of caller, dispatch to `f`.
    pub(crate) fn swap_impl(&self, id: FuncId, f: HostFn) {
        *self.entries[id.0 as usize].active.write() = f;
    }
}

struct ProviderRegistry {
    providers: Vec<Box<dyn DebugMetadata>>,
    sealed: bool,
}

static PROVIDERS: Mutex<ProviderRegistry> = Mutex::new(ProviderRegistry {
    providers: Vec::new(),
    sealed: false,
});
static PROCESS_TABLE: OnceCell<Arc<SymbolTable>> = OnceCell::new();

/// Register a metadata provider for the process-wide table. Fails with
/// [`Error::TableSealed`] once the table has been built. The seal is checked
/// under the same lock the build holds, so a registration racing the first
/// [`process_table`] call either lands in the table or is rejected, never
/// silently dropped.
pub fn register_metadata(provider: Box<dyn DebugMetadata>) -> Result<()> {
    let mut reg = PROVIDERS.lock();
    if reg.sealed {
        return Err(Error::TableSealed);
    }
    reg.providers.push(provider);
    Ok(())
}

/// The process-wide symbol table, built from all registered providers on
/// first use and cached for the process lifetime.
pub fn process_table() -> Arc<SymbolTable> {
    PROCESS_TABLE
        .get_or_init(|| {
            let mut reg = PROVIDERS.lock();
            reg.sealed = true;
            let mut builder = SymbolTableBuilder::new();
            for p in reg.providers.iter() {
                p.describe(&mut builder);
            }
            builder.build()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;

    fn table_with_add() -> Arc<SymbolTable> {
        let mut b = SymbolTableBuilder::new();
        b.define_function(
            "demo::add",
            FuncSig::new(
                vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
                vec![TypeDescriptor::i64()],
            ),
            |args| {
                let (HostValue::I64(a), HostValue::I64(b)) = (args[0].get(), args[1].get())
                else {
                    unreachable!("signature-checked call");
                };
                Ok(vec![ValueHandle::new_i64(a + b)])
            },
        );
        b.define_global("demo::counter", TypeDescriptor::i64(), HostValue::I64(0));
        b.define_type(TypeDescriptor::named_struct("demo::Role", vec![]));
        b.build()
    }

    #[test]
    fn test_resolution_hit_and_miss() {
        let t = table_with_add();
        assert!(t.resolve_function("demo::add").is_ok());
        assert!(matches!(
            t.resolve_function("demo::sub"),
            Err(Error::NotFound(_))
        ));
        assert!(t.resolve_type("demo::Role").is_ok());
        assert!(t.resolve_global("demo::counter").is_ok());
    }

    #[test]
    fn test_functions_do_not_shadow_globals() {
        let t = table_with_add();
        // `demo::counter` is a data symbol, not a function.
        assert!(t.resolve_function("demo::counter").is_err());
        assert!(t.resolve_global("demo::add").is_err());
    }

    #[test]
    fn test_symbol_listing_filter() {
        let t = table_with_add();
        assert_eq!(t.symbols(SymbolKind::Function, "add"), vec!["demo::add"]);
        assert_eq!(t.symbols(SymbolKind::Function, "zzz"), Vec::<String>::new());
        assert_eq!(t.symbols(SymbolKind::Type, ""), vec!["demo::Role"]);
    }

    #[test]
    fn test_type_interning_identity() {
        let mut b = SymbolTableBuilder::new();
        let ty = TypeDescriptor::named_struct("demo::Role", vec![]);
        b.define_type(ty.clone());
        let t = b.build();
        let resolved = t.resolve_type("demo::Role").unwrap();
        assert!(Arc::ptr_eq(&ty, &resolved));
    }

    #[test]
    fn test_dispatch_through_registry() {
        let t = table_with_add();
        let id = t.resolve_function("demo::add").unwrap();
        let out = t
            .call(id, &[ValueHandle::new_i64(1), ValueHandle::new_i64(2)])
            .unwrap();
        assert!(out[0].get().equals(&HostValue::I64(3)));
    }

    #[test]
    fn test_swap_impl_redirects_all_future_calls() {
        let t = table_with_add();
        let id = t.resolve_function("demo::add").unwrap();
        t.swap_impl(id, Arc::new(|_| Ok(vec![ValueHandle::new_i64(99)])));
        let out = t
            .call(id, &[ValueHandle::new_i64(1), ValueHandle::new_i64(2)])
            .unwrap();
        assert!(out[0].get().equals(&HostValue::I64(99)));
    }

    struct CounterModule;

    impl DebugMetadata for CounterModule {
        fn describe(&self, table: &mut SymbolTableBuilder) {
            table.define_global("reg::counter", TypeDescriptor::i64(), HostValue::I64(0));
        }
    }

    #[test]
    fn test_process_table_seals_registration() {
        register_metadata(Box::new(CounterModule)).unwrap();
        let t = process_table();
        assert!(t.resolve_global("reg::counter").is_ok());
        // the table is built once; late providers are rejected, not dropped
        assert!(matches!(
            register_metadata(Box::new(CounterModule)),
            Err(Error::TableSealed)
        ));
    }
}
