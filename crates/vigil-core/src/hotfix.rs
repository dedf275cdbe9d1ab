//! Live replacement of registered functions
//!
//! A hotfix swaps the active implementation behind a function identity while
//! the process keeps running. Existing call sites dispatch through the
//! identity, so the replacement takes effect for every caller from the next
//! call onward. Replacement implementations are serialized behind a per-
//! binding lock: scripted fixes are rarely written with reentrancy in mind,
//! and one call at a time is the safe default.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::symbols::{HostFn, SymbolTable};
use crate::types::FuncSig;
use crate::value::ValueHandle;

fn sig_compatible(a: &FuncSig, b: &FuncSig) -> bool {
    a.ins.len() == b.ins.len()
        && a.outs.len() == b.outs.len()
        && a.ins.iter().zip(&b.ins).all(|(x, y)| x.name == y.name)
        && a.outs.iter().zip(&b.outs).all(|(x, y)| x.name == y.name)
}

/// Replace the active implementation of `name` with `f`.
///
/// `sig` is the signature the caller believes it is replacing; it must match
/// the registered one, which catches fixes written against a stale version of
/// the target. A patch is terminal for the process lifetime: there is no
/// reversion, and a second install on the same function simply wins.
///
/// Concurrent calls into the replacement are serialized.
pub fn install<F>(table: &SymbolTable, name: &str, sig: &FuncSig, f: F) -> Result<()>
where
    F: Fn(&[ValueHandle]) -> Result<Vec<ValueHandle>> + Send + Sync + 'static,
{
    let id = table.resolve_function(name)?;
    let registered = table.signature(id);
    if !sig_compatible(sig, registered) {
        return Err(Error::TypeMismatch {
            expected: format!("signature of `{name}`"),
            got: format!("{}-in/{}-out replacement", sig.ins.len(), sig.outs.len()),
        });
    }

    let gate = Mutex::new(());
    let wrapped: HostFn = Arc::new(move |args| {
        let _serialized = gate.lock();
        f(args)
    });
    table.swap_impl(id, wrapped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{self, Number};
    use crate::invoke::call_by_name;
    use crate::symbols::SymbolTableBuilder;
    use crate::types::TypeDescriptor;
    use crate::value::HostValue;

    fn sig() -> FuncSig {
        FuncSig::new(
            vec![TypeDescriptor::i64(), TypeDescriptor::i64()],
            vec![TypeDescriptor::i64()],
        )
    }

    fn arg(h: &ValueHandle) -> i64 {
        match h.get() {
            HostValue::I64(n) => n,
            _ => 0,
        }
    }

    fn table() -> Arc<SymbolTable> {
        let mut b = SymbolTableBuilder::new();
        b.define_function("demo::add", sig(), |args| {
            Ok(vec![ValueHandle::new_i64(arg(&args[0]) + arg(&args[1]))])
        });
        b.build()
    }

    fn add(table: &SymbolTable, a: i64, b: i64) -> Number {
        let out = call_by_name(
            table,
            "demo::add",
            &[ValueHandle::new_i64(a), ValueHandle::new_i64(b)],
        )
        .unwrap();
        access::get_number(&out[0]).unwrap()
    }

    #[test]
    fn test_hotfix_visible_to_every_caller() {
        let t = table();
        assert_eq!(add(&t, 2, 3), Number::Int64(5));

        install(&t, "demo::add", &sig(), |args| {
            Ok(vec![ValueHandle::new_i64(arg(&args[0]) * arg(&args[1]))])
        })
        .unwrap();
        assert_eq!(add(&t, 2, 3), Number::Int64(6));
    }

    #[test]
    fn test_second_hotfix_wins() {
        let t = table();
        install(&t, "demo::add", &sig(), |_| Ok(vec![ValueHandle::new_i64(1)])).unwrap();
        install(&t, "demo::add", &sig(), |_| Ok(vec![ValueHandle::new_i64(2)])).unwrap();
        assert_eq!(add(&t, 0, 0), Number::Int64(2));
    }

    #[test]
    fn test_signature_mismatch_rejected() {
        let t = table();
        let wrong = FuncSig::new(vec![TypeDescriptor::str()], vec![]);
        assert!(matches!(
            install(&t, "demo::add", &wrong, |_| Ok(vec![])),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_concurrent_callers_serialized() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let t = table();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        {
            let inside = inside.clone();
            let overlap = overlap.clone();
            install(&t, "demo::add", &sig(), move |args| {
                if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(10));
                inside.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![ValueHandle::new_i64(arg(&args[0]))])
            })
            .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let t = t.clone();
                std::thread::spawn(move || add(&t, i, 0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
