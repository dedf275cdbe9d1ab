//! Shared harness: a symbol table shaped like a small game host, an engine
//! wired to it, and a captured print sink.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vigil_core::{
    access::{self, Access},
    zero_value, Cell, FieldDef, FuncSig, HostValue, SymbolTable, SymbolTableBuilder,
    TypeDescriptor, TypeRef, ValueHandle,
};
use vigil_lua::Engine;

pub struct Harness {
    pub engine: Engine,
    pub symbols: Arc<SymbolTable>,
    pub output: Arc<Mutex<Vec<String>>>,
    pub role_ty: TypeRef,
    pub role_cell: Cell,
}

impl Harness {
    /// Run a script in session 1 and panic on compile errors
    pub fn run(&self, script: &str) {
        self.engine.execute(script, 1).unwrap();
    }

    pub fn lines(&self) -> Vec<String> {
        self.output.lock().unwrap().clone()
    }

    /// Live handle onto the `demo::role` global
    pub fn role(&self) -> ValueHandle {
        ValueHandle::from_place(self.role_ty.clone(), self.role_cell.clone())
    }
}

fn arg_i64(h: &ValueHandle) -> i64 {
    match h.get() {
        HostValue::I64(n) => n,
        _ => 0,
    }
}

pub fn build() -> Harness {
    let role_ty = TypeDescriptor::named_struct(
        "demo::Role",
        vec![
            FieldDef {
                name: "id".into(),
                ty: TypeDescriptor::i64(),
                exported: false,
            },
            FieldDef {
                name: "Name".into(),
                ty: TypeDescriptor::str(),
                exported: true,
            },
            FieldDef {
                name: "Level".into(),
                ty: TypeDescriptor::i32(),
                exported: true,
            },
        ],
    );
    let scores_ty = TypeDescriptor::map_of(TypeDescriptor::str(), TypeDescriptor::i32());
    let names_ty = TypeDescriptor::slice_of(TypeDescriptor::str());

    let mut b = SymbolTableBuilder::new();
    b.define_type(TypeDescriptor::i64());
    b.define_type(role_ty.clone());
    b.define_type(scores_ty.clone());
    b.define_type(names_ty);

    b.define_global("demo::counter", TypeDescriptor::i64(), HostValue::I64(0));
    b.define_global("demo::scores", scores_ty.clone(), zero_value(&scores_ty));
    let role_cell = b.define_global("demo::role", role_ty.clone(), zero_value(&role_ty));

    b.define_function(
        "demo::add",
        FuncSig::new(
            vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
            vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
        ),
        |args| {
            let a = arg_i64(&args[0]);
            let b = arg_i64(&args[1]);
            Ok(vec![ValueHandle::new_i64(a), ValueHandle::new_i64(a + b)])
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
            access::field_set(&recv, "Name", &args[1], Access::Privileged)?;
            Ok(vec![])
        },
    );

    let symbols = b.build();

    let output = Arc::new(Mutex::new(Vec::new()));
    let sink = output.clone();

    let root_ty = role_ty.clone();
    let root_cell = role_cell.clone();
    let engine = Engine::new(
        symbols.clone(),
        Arc::new(move |name| match name {
            "role" => {
                let h = ValueHandle::from_place(root_ty.clone(), root_cell.clone());
                access::addr_of(&h).ok()
            }
            _ => None,
        }),
        Arc::new(move |_session, line| {
            sink.lock().unwrap().push(line.to_string());
        }),
    )
    .unwrap();

    Harness {
        engine,
        symbols,
        output,
        role_ty,
        role_cell,
    }
}
