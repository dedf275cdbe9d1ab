//! Dynamic invocation of registered host functions
//!
//! Calls go through a function's *identity*, never a captured implementation,
//! so a hotfixed function is observed by every caller from the next call
//! onward. A panic inside the callee is caught and surfaced as a
//! `ScriptRuntime` error instead of unwinding through the embedding host.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::access;
use crate::error::{Error, Result};
use crate::symbols::{FuncId, SymbolTable};
use crate::types::FuncSig;
use crate::value::{HostValue, ValueHandle};

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in host function".to_string()
    }
}

fn dispatch(
    table: &SymbolTable,
    id: FuncId,
    sig: &FuncSig,
    receiver: Option<ValueHandle>,
    args: &[ValueHandle],
) -> Result<Vec<ValueHandle>> {
    let mut full: Vec<ValueHandle> = Vec::with_capacity(sig.ins.len());
    full.extend(receiver);
    full.extend(args.iter().cloned());

    if full.len() != sig.ins.len() {
        return Err(Error::ArityMismatch {
            expected: sig.ins.len(),
            got: full.len(),
        });
    }
    let coerced: Vec<ValueHandle> = full
        .iter()
        .zip(&sig.ins)
        .map(|(arg, want)| access::coerce_to(want, arg))
        .collect::<Result<_>>()?;

    catch_unwind(AssertUnwindSafe(|| table.call(id, &coerced)))
        .map_err(|payload| {
            Error::ScriptRuntime(format!(
                "`{}` panicked: {}",
                table.function_name(id),
                panic_message(payload)
            ))
        })?
}

/// Call a registered function by fully-qualified symbolic name
pub fn call_by_name(
    table: &SymbolTable,
    name: &str,
    args: &[ValueHandle],
) -> Result<Vec<ValueHandle>> {
    let id = table.resolve_function(name)?;
    let sig = table.signature(id).clone();
    dispatch(table, id, &sig, None, args)
}

/// Call a function-shaped handle, such as one produced by a method lookup.
/// A bound receiver is prepended to the argument list.
pub fn call_handle(
    table: &SymbolTable,
    h: &ValueHandle,
    args: &[ValueHandle],
) -> Result<Vec<ValueHandle>> {
    match h.get() {
        HostValue::Func(Some(f)) => {
            dispatch(table, f.id, &f.sig, f.receiver.map(|r| *r), args)
        }
        HostValue::Func(None) => Err(Error::NilPointer),
        other => Err(Error::TypeMismatch {
            expected: "function".into(),
            got: other.kind_name().into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{self, Access, Number};
    use crate::symbols::SymbolTableBuilder;
    use crate::types::{FieldDef, TypeDescriptor};
    use crate::value::zero_value;

    fn table_with_add() -> std::sync::Arc<SymbolTable> {
        let mut b = SymbolTableBuilder::new();
        let sig = FuncSig::new(
            vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
            vec![TypeDescriptor::i64()],
        );
        b.define_function("demo::add", sig, |args| {
            let a = match args[0].get() {
                HostValue::I64(n) => n,
                _ => 0,
            };
            let c = match args[1].get() {
                HostValue::I64(n) => n,
                _ => 0,
            };
            Ok(vec![ValueHandle::new_i64(a + c)])
        });
        b.build()
    }

    #[test]
    fn test_call_by_name() {
        let table = table_with_add();
        let out = call_by_name(
            &table,
            "demo::add",
            &[ValueHandle::new_i64(2), ValueHandle::new_i64(3)],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(access::get_number(&out[0]).unwrap(), Number::Int64(5));
    }

    #[test]
    fn test_arity_mismatch_is_loud() {
        let table = table_with_add();
        let err = call_by_name(&table, "demo::add", &[ValueHandle::new_i64(2)]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_unknown_name() {
        let table = table_with_add();
        assert!(matches!(
            call_by_name(&table, "demo::missing", &[]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_panic_becomes_runtime_error() {
        let mut b = SymbolTableBuilder::new();
        b.define_function("demo::boom", FuncSig::new(vec![], vec![]), |_| {
            panic!("kaboom")
        });
        let table = b.build();
        let err = call_by_name(&table, "demo::boom", &[]).unwrap_err();
        match err {
            Error::ScriptRuntime(msg) => assert!(msg.contains("kaboom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_method_call_through_handle() {
        let role_ty = TypeDescriptor::named_struct(
            "demo::Role",
            vec![FieldDef {
                name: "Level".into(),
                ty: TypeDescriptor::i32(),
                exported: true,
            }],
        );
        let ptr_ty = TypeDescriptor::ptr_to(role_ty.clone());

        let mut b = SymbolTableBuilder::new();
        b.define_type(role_ty.clone());
        b.define_method(
            &role_ty,
            "Promote",
            true,
            FuncSig::new(vec![ptr_ty], vec![]),
            |args| {
                let recv = access::deref(&args[0])?;
                let level = access::field_get(&recv, "Level", Access::Privileged)?;
                let Number::Float(n) = access::get_number(&level)? else {
                    unreachable!()
                };
                access::set_number(&level, &crate::access::NumberInput::Float(n + 1.0))?;
                Ok(vec![])
            },
        );
        let table = b.build();

        let role = ValueHandle::fresh(role_ty.clone(), zero_value(&role_ty));
        let m = access::method_get(&table, &role, "Promote", Access::Public).unwrap();
        call_handle(&table, &m, &[]).unwrap();
        call_handle(&table, &m, &[]).unwrap();

        let level = access::field_get(&role, "Level", Access::Public).unwrap();
        assert_eq!(access::get_number(&level).unwrap(), Number::Float(2.0));
    }

    #[test]
    fn test_method_call_on_interface_boxed_value() {
        let role_ty = TypeDescriptor::named_struct(
            "demo::Role",
            vec![FieldDef {
                name: "Level".into(),
                ty: TypeDescriptor::i32(),
                exported: true,
            }],
        );
        let ptr_ty = TypeDescriptor::ptr_to(role_ty.clone());

        let mut b = SymbolTableBuilder::new();
        b.define_type(role_ty.clone());
        b.define_method(
            &role_ty,
            "Promote",
            true,
            FuncSig::new(vec![ptr_ty], vec![TypeDescriptor::i32()]),
            |args| {
                let recv = access::deref(&args[0])?;
                let level = access::field_get(&recv, "Level", Access::Privileged)?;
                let Number::Float(n) = access::get_number(&level)? else {
                    unreachable!()
                };
                access::set_number(&level, &crate::access::NumberInput::Float(n + 1.0))?;
                Ok(vec![ValueHandle::new_i32(n as i32 + 1)])
            },
        );
        let table = b.build();

        let role = ValueHandle::fresh(role_ty.clone(), zero_value(&role_ty));
        let boxed = ValueHandle::new_interface();
        access::set_any(&boxed, &role).unwrap();

        // A pointer-receiver method binds through the box, and mutations land
        // in the boxed value, not a throwaway copy.
        let m = access::method_get(&table, &boxed, "Promote", Access::Public).unwrap();
        let first = call_handle(&table, &m, &[]).unwrap();
        let second = call_handle(&table, &m, &[]).unwrap();
        assert_eq!(access::get_number(&first[0]).unwrap(), Number::Float(1.0));
        assert_eq!(access::get_number(&second[0]).unwrap(), Number::Float(2.0));
    }
}
