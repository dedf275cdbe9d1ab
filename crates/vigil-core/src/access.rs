//! Reflective accessors over value handles
//!
//! Generic field/map/slice/array/primitive get and set operations that work
//! on any [`ValueHandle`] regardless of the concrete host type. Every
//! operation fails with `TypeMismatch` when the handle's runtime kind does
//! not match, and with `NotAddressable` when a setter is applied to a
//! transient copy.
//!
//! Operations auto-dereference one pointer level in the same spots the host
//! language itself would (field access, primitive setters, generic
//! assignment), so a pointer-shaped handle onto a struct behaves like the
//! struct.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::symbols::SymbolTable;
use crate::types::{TypeDescriptor, TypeKind, TypeRef};
use crate::value::{
    new_cell, zero_value, FuncValue, HostValue, IfaceValue, MapKey, MapValue, Place, SliceValue,
    ValueHandle,
};

/// Accessor capability.
///
/// `Privileged` reaches unexported fields and methods; `Public` is limited to
/// exported ones. The script bridge runs privileged — reaching private state
/// is the point of the tool — but embedders composing their own views can opt
/// into the restricted surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Exported fields and methods only
    Public,
    /// All fields and methods, including unexported ones
    Privileged,
}

fn type_mismatch(expected: &str, got: &TypeDescriptor) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        got: got.name.clone(),
    }
}

/// Follow one pointer level, if any
fn auto_deref(h: &ValueHandle) -> Result<ValueHandle> {
    if matches!(h.ty().kind, TypeKind::Ptr { .. }) {
        deref(h)
    } else {
        Ok(h.clone())
    }
}

// ============================================================================
// Pointers, clones, conversion
// ============================================================================

/// Address of an addressable value: a pointer-shaped handle onto its storage
pub fn addr_of(h: &ValueHandle) -> Result<ValueHandle> {
    if !h.is_addressable() {
        return Err(Error::NotAddressable(h.ty().name.clone()));
    }
    Ok(ValueHandle::owned(
        TypeDescriptor::ptr_to(h.ty().clone()),
        HostValue::Ptr(Some(h.place())),
    ))
}

/// Dereference a pointer-shaped handle to a live view of its target
pub fn deref(h: &ValueHandle) -> Result<ValueHandle> {
    match h.get() {
        HostValue::Ptr(Some(place)) => Ok(ValueHandle::from_place(place.ty, place.cell)),
        HostValue::Ptr(None) => Err(Error::NilPointer),
        other => Err(Error::TypeMismatch {
            expected: "pointer".into(),
            got: other.kind_name().into(),
        }),
    }
}

/// Deep-copy the value into fresh, independently-owned addressable storage
/// (host assignment semantics: struct/array by value, containers by
/// reference)
pub fn clone_value(h: &ValueHandle) -> ValueHandle {
    ValueHandle::fresh(h.ty().clone(), h.get().deep_copy())
}

/// Representation-preserving conversion. Legal only on pointer- or
/// interface-shaped handles; the pointee (or boxed value) is reinterpreted as
/// `target`.
pub fn convert(h: &ValueHandle, target: &TypeRef) -> Result<ValueHandle> {
    let (src_ty, src_val) = match &h.ty().kind {
        TypeKind::Ptr { .. } => {
            let inner = deref(h)?;
            let v = inner.get();
            (inner.ty().clone(), v)
        }
        TypeKind::Interface => match h.get() {
            HostValue::Iface(Some(boxed)) => (boxed.ty.clone(), boxed.value.clone()),
            HostValue::Iface(None) => {
                return Err(Error::ConversionError {
                    src: "nil interface".into(),
                    target: target.name.clone(),
                })
            }
            other => return Err(type_mismatch("interface", &TypeDescriptor {
                name: other.kind_name().into(),
                kind: TypeKind::Interface,
            })),
        },
        _ => return Err(type_mismatch("pointer or interface", h.ty())),
    };
    let out = convert_value(&src_ty, &src_val, target)?;
    Ok(ValueHandle::owned(target.clone(), out))
}

fn conversion_error(src: &TypeRef, target: &TypeRef) -> Error {
    Error::ConversionError {
        src: src.name.clone(),
        target: target.name.clone(),
    }
}

fn convert_value(src_ty: &TypeRef, v: &HostValue, target: &TypeRef) -> Result<HostValue> {
    if src_ty.is_numeric() && target.is_numeric() {
        return convert_numeric(v, target).ok_or_else(|| conversion_error(src_ty, target));
    }
    match (&src_ty.kind, &target.kind) {
        (TypeKind::Bool, TypeKind::Bool) | (TypeKind::Str, TypeKind::Str) => {
            Ok(v.deep_copy())
        }
        (TypeKind::Struct(a), TypeKind::Struct(b)) => {
            let compatible = a.fields.len() == b.fields.len()
                && a.fields
                    .iter()
                    .zip(&b.fields)
                    .all(|(x, y)| x.ty.name == y.ty.name);
            if !compatible {
                return Err(conversion_error(src_ty, target));
            }
            let HostValue::Struct(s) = v.deep_copy() else {
                return Err(conversion_error(src_ty, target));
            };
            Ok(HostValue::Struct(crate::value::StructValue {
                ty: target.clone(),
                fields: s.fields,
            }))
        }
        (TypeKind::Slice { elem: a }, TypeKind::Slice { elem: b }) if a.name == b.name => {
            let HostValue::Slice(s) = v.clone() else {
                return Err(conversion_error(src_ty, target));
            };
            Ok(HostValue::Slice(SliceValue { ty: target.clone(), ..s }))
        }
        (
            TypeKind::Map { key: ka, value: va },
            TypeKind::Map { key: kb, value: vb },
        ) if ka.name == kb.name && va.name == vb.name => {
            let HostValue::Map(m) = v.clone() else {
                return Err(conversion_error(src_ty, target));
            };
            Ok(HostValue::Map(MapValue { ty: target.clone(), ..m }))
        }
        (TypeKind::Ptr { target: a }, TypeKind::Ptr { target: b }) if a.name == b.name => {
            Ok(v.clone())
        }
        _ => Err(conversion_error(src_ty, target)),
    }
}

fn convert_numeric(v: &HostValue, target: &TypeRef) -> Option<HostValue> {
    let wide: i128 = match v {
        HostValue::I8(n) => i128::from(*n),
        HostValue::I16(n) => i128::from(*n),
        HostValue::I32(n) => i128::from(*n),
        HostValue::I64(n) => i128::from(*n),
        HostValue::U8(n) => i128::from(*n),
        HostValue::U16(n) => i128::from(*n),
        HostValue::U32(n) => i128::from(*n),
        HostValue::U64(n) => i128::from(*n),
        HostValue::F32(f) => *f as i128,
        HostValue::F64(f) => *f as i128,
        _ => return None,
    };
    let float: f64 = match v {
        HostValue::F32(f) => f64::from(*f),
        HostValue::F64(f) => *f,
        _ => wide as f64,
    };
    Some(match target.kind {
        TypeKind::I8 => HostValue::I8(wide as i8),
        TypeKind::I16 => HostValue::I16(wide as i16),
        TypeKind::I32 => HostValue::I32(wide as i32),
        TypeKind::I64 => HostValue::I64(wide as i64),
        TypeKind::U8 => HostValue::U8(wide as u8),
        TypeKind::U16 => HostValue::U16(wide as u16),
        TypeKind::U32 => HostValue::U32(wide as u32),
        TypeKind::U64 => HostValue::U64(wide as u64),
        TypeKind::F32 => HostValue::F32(float as f32),
        TypeKind::F64 => HostValue::F64(float),
        _ => return None,
    })
}

// ============================================================================
// Generic assignment
// ============================================================================

/// Checked assignment into the destination's storage: the host assignability
/// rule (same named type, or interface destination), then a deep copy.
/// Interface destinations box the source value with its dynamic type.
pub(crate) fn assign(dst: &ValueHandle, src: &ValueHandle) -> Result<()> {
    if !dst.is_addressable() {
        return Err(Error::NotAddressable(dst.ty().name.clone()));
    }
    if !dst.ty().assignable_from(src.ty()) {
        return Err(Error::AssignError {
            dst: dst.ty().name.clone(),
            src: src.ty().name.clone(),
        });
    }
    let v = if matches!(dst.ty().kind, TypeKind::Interface)
        && !matches!(src.ty().kind, TypeKind::Interface)
    {
        HostValue::Iface(Some(Box::new(IfaceValue {
            ty: src.ty().clone(),
            value: src.get().deep_copy(),
        })))
    } else {
        src.get().deep_copy()
    };
    dst.set_raw(v);
    Ok(())
}

/// Generic assignment with one pointer auto-deref on the destination
pub fn set_any(dst: &ValueHandle, src: &ValueHandle) -> Result<()> {
    let target = auto_deref(dst)?;
    assign(&target, src)
}

/// Accept `h` where a value of type `want` is required, following one pointer
/// level if that makes the types line up
pub(crate) fn coerce_to(want: &TypeRef, h: &ValueHandle) -> Result<ValueHandle> {
    if want.assignable_from(h.ty()) {
        return Ok(h.clone());
    }
    if matches!(h.ty().kind, TypeKind::Ptr { .. }) {
        let inner = deref(h)?;
        if want.assignable_from(inner.ty()) {
            return Ok(inner);
        }
    }
    Err(Error::AssignError {
        dst: want.name.clone(),
        src: h.ty().name.clone(),
    })
}

// ============================================================================
// Struct fields and methods
// ============================================================================

fn struct_field(h: &ValueHandle, name: &str, access: Access) -> Result<ValueHandle> {
    let view = auto_deref(h)?;
    let TypeKind::Struct(layout) = &view.ty().kind else {
        return Err(type_mismatch("struct", view.ty()));
    };
    let HostValue::Struct(s) = view.get() else {
        return Err(type_mismatch("struct", view.ty()));
    };
    let idx = layout
        .index_of(name)
        .ok_or_else(|| Error::NotFound(format!("field `{}.{name}`", view.ty().name)))?;
    let def = &layout.fields[idx];
    if access == Access::Public && !def.exported {
        return Err(Error::Unexported(format!("{}.{name}", view.ty().name)));
    }
    Ok(ValueHandle::view(
        def.ty.clone(),
        s.fields[idx].clone(),
        view.is_addressable(),
    ))
}

/// Read a struct field by name. Privileged access reaches unexported fields
/// through the same read-write view; the result aliases the field's storage
/// when the struct itself is addressable.
pub fn field_get(h: &ValueHandle, name: &str, access: Access) -> Result<ValueHandle> {
    struct_field(h, name, access)
}

/// Write a struct field by name. Pointer-typed fields are written through
/// (the pointee is assigned, matching the host's field-set idiom).
pub fn field_set(h: &ValueHandle, name: &str, value: &ValueHandle, access: Access) -> Result<()> {
    let field = struct_field(h, name, access)?;
    if !field.is_addressable() {
        return Err(Error::NotAddressable(field.ty().name.clone()));
    }
    let target = auto_deref(&field)?;
    let src = coerce_to(target.ty(), value)?;
    assign(&target, &src)
}

/// Look up a method on a struct or interface value (directly or behind one
/// pointer) and bind the receiver. The result is function-shaped and callable
/// through the dynamic invoker.
pub fn method_get(
    table: &SymbolTable,
    h: &ValueHandle,
    name: &str,
    access: Access,
) -> Result<ValueHandle> {
    let view = auto_deref(h)?;
    // An interface handle is unboxed to a typed view first; the boxed struct
    // shares its field cells with the clone, so receiver mutations stick.
    let subject = match view.get() {
        HostValue::Struct(_) => view.clone(),
        HostValue::Iface(Some(boxed)) => ValueHandle::fresh(boxed.ty.clone(), boxed.value),
        HostValue::Iface(None) => return Err(Error::NilPointer),
        _ => return Err(type_mismatch("struct or interface", view.ty())),
    };
    let type_name = subject.ty().name.clone();
    let (id, exported) = table
        .method(&type_name, name)
        .ok_or_else(|| Error::NotFound(format!("method `{type_name}::{name}`")))?;
    if access == Access::Public && !exported {
        return Err(Error::Unexported(format!("{type_name}::{name}")));
    }
    let sig = table.signature(id).clone();

    // Bind whichever shape of the receiver the method declares.
    let receiver = match sig.ins.first() {
        Some(want) => {
            let candidates = [h.clone(), subject.clone()];
            let direct = candidates
                .iter()
                .find(|c| want.assignable_from(c.ty()))
                .cloned();
            match direct {
                Some(r) => r,
                None if subject.is_addressable()
                    && matches!(want.kind, TypeKind::Ptr { .. }) =>
                {
                    let ptr = addr_of(&subject)?;
                    if !want.assignable_from(ptr.ty()) {
                        return Err(type_mismatch(&want.name, subject.ty()));
                    }
                    ptr
                }
                None => return Err(type_mismatch(&want.name, subject.ty())),
            }
        }
        None => return Err(type_mismatch("method with receiver", subject.ty())),
    };

    Ok(ValueHandle::owned(
        TypeDescriptor::func_of(sig.clone()),
        HostValue::Func(Some(FuncValue {
            id,
            sig,
            receiver: Some(Box::new(receiver)),
        })),
    ))
}

// ============================================================================
// Maps
// ============================================================================

fn map_view(h: &ValueHandle) -> Result<(MapValue, TypeRef, TypeRef)> {
    let TypeKind::Map { key, value } = &h.ty().kind else {
        return Err(type_mismatch("map", h.ty()));
    };
    let HostValue::Map(m) = h.get() else {
        return Err(type_mismatch("map", h.ty()));
    };
    Ok((m, key.clone(), value.clone()))
}

fn map_key_of(key_ty: &TypeRef, k: &ValueHandle) -> Result<MapKey> {
    let kv = coerce_to(key_ty, k)?;
    MapKey::from_value(&kv.get())
}

/// Look up a map entry. `None` when the key is absent. The returned handle is
/// a live reference to the entry's value slot.
pub fn map_get(h: &ValueHandle, key: &ValueHandle) -> Result<Option<ValueHandle>> {
    let (m, key_ty, val_ty) = map_view(h)?;
    let k = map_key_of(&key_ty, key)?;
    let cell = m.entries.read().get(&k).cloned();
    Ok(cell.map(|cell| ValueHandle::from_place(val_ty, cell)))
}

/// Insert or overwrite a map entry. An existing entry is overwritten in place
/// so previously fetched value handles keep aliasing the slot.
pub fn map_set(h: &ValueHandle, key: &ValueHandle, value: &ValueHandle) -> Result<()> {
    let (m, key_ty, val_ty) = map_view(h)?;
    let k = map_key_of(&key_ty, key)?;
    let v = coerce_to(&val_ty, value)?;

    let existing = m.entries.read().get(&k).cloned();
    match existing {
        Some(cell) => assign(&ValueHandle::from_place(val_ty, cell), &v),
        None => {
            let slot = ValueHandle::fresh(val_ty.clone(), zero_value(&val_ty));
            assign(&slot, &v)?;
            m.entries.write().insert(k, slot.cell().clone());
            Ok(())
        }
    }
}

/// Delete a map entry (a miss is not an error)
pub fn map_del(h: &ValueHandle, key: &ValueHandle) -> Result<()> {
    let (m, key_ty, _) = map_view(h)?;
    let k = map_key_of(&key_ty, key)?;
    m.entries.write().remove(&k);
    Ok(())
}

/// Iterate map entries in implementation-defined order. The callback returns
/// `true` to continue; any other outcome stops iteration. Entries are
/// snapshotted up front, so mutation during iteration neither crashes nor is
/// guaranteed to be observed.
pub fn map_foreach<F>(h: &ValueHandle, mut f: F) -> Result<()>
where
    F: FnMut(ValueHandle, ValueHandle) -> Result<bool>,
{
    let (m, key_ty, val_ty) = map_view(h)?;
    let snapshot: Vec<(MapKey, crate::value::Cell)> = m
        .entries
        .read()
        .iter()
        .map(|(k, c)| (k.clone(), c.clone()))
        .collect();
    for (k, cell) in snapshot {
        let key = ValueHandle::owned(key_ty.clone(), k.to_value(&key_ty));
        let value = ValueHandle::from_place(val_ty.clone(), cell);
        if !f(key, value)? {
            break;
        }
    }
    Ok(())
}

fn new_ptr_to_zero(t: &TypeRef) -> ValueHandle {
    let inner = if let TypeKind::Ptr { target } = &t.kind {
        target.clone()
    } else {
        t.clone()
    };
    let cell = new_cell(zero_value(&inner));
    ValueHandle::owned(
        TypeDescriptor::ptr_to(inner.clone()),
        HostValue::Ptr(Some(Place { ty: inner, cell })),
    )
}

/// Allocate a zero value shaped like the map's key type (pointer-shaped, for
/// building keys before insertion)
pub fn map_new_key(h: &ValueHandle) -> Result<ValueHandle> {
    let (_, key_ty, _) = map_view(h)?;
    Ok(new_ptr_to_zero(&key_ty))
}

/// Allocate a zero value shaped like the map's element type
pub fn map_new_val(h: &ValueHandle) -> Result<ValueHandle> {
    let (_, _, val_ty) = map_view(h)?;
    Ok(new_ptr_to_zero(&val_ty))
}

/// Make an empty map of the given map type
pub fn map_make(ty: &TypeRef) -> Result<ValueHandle> {
    if !matches!(ty.kind, TypeKind::Map { .. }) {
        return Err(type_mismatch("map", ty));
    }
    Ok(ValueHandle::owned(ty.clone(), zero_value(ty)))
}

// ============================================================================
// Slices and arrays
// ============================================================================

fn elem_type(h: &ValueHandle) -> Result<TypeRef> {
    match &h.ty().kind {
        TypeKind::Slice { elem } | TypeKind::Array { elem, .. } => Ok(elem.clone()),
        _ => Err(type_mismatch("slice or array", h.ty())),
    }
}

fn seq_cells(h: &ValueHandle) -> Result<(Vec<crate::value::Cell>, bool)> {
    match h.get() {
        HostValue::Slice(s) => {
            let backing = s.backing.read();
            Ok((backing[s.offset..s.offset + s.len].to_vec(), true))
        }
        HostValue::Array(a) => Ok((a.cells, h.is_addressable())),
        _ => Err(type_mismatch("slice or array", h.ty())),
    }
}

/// Allocate a zero value shaped like the sequence's element type
pub fn array_new_elem(h: &ValueHandle) -> Result<ValueHandle> {
    let elem = elem_type(h)?;
    Ok(new_ptr_to_zero(&elem))
}

/// Element at `index`; a live reference for slices and addressable arrays
pub fn array_get(h: &ValueHandle, index: usize) -> Result<ValueHandle> {
    let elem = elem_type(h)?;
    let (cells, addressable) = seq_cells(h)?;
    let cell = cells
        .get(index)
        .cloned()
        .ok_or(Error::OutOfRange {
            index,
            len: cells.len(),
        })?;
    Ok(ValueHandle::view(elem, cell, addressable))
}

/// Overwrite the element at `index`
pub fn array_set(h: &ValueHandle, index: usize, value: &ValueHandle) -> Result<()> {
    let slot = array_get(h, index)?;
    if !slot.is_addressable() {
        return Err(Error::NotAddressable(h.ty().name.clone()));
    }
    let src = coerce_to(slot.ty(), value)?;
    assign(&slot, &src)
}

/// Iterate `(index, element)` pairs; same continue convention as
/// [`map_foreach`]
pub fn array_foreach<F>(h: &ValueHandle, mut f: F) -> Result<()>
where
    F: FnMut(usize, ValueHandle) -> Result<bool>,
{
    let elem = elem_type(h)?;
    let (cells, addressable) = seq_cells(h)?;
    for (i, cell) in cells.into_iter().enumerate() {
        if !f(i, ValueHandle::view(elem.clone(), cell, addressable))? {
            break;
        }
    }
    Ok(())
}

/// Half-open sub-slice `[lo, hi)`. Slicing a slice shares its backing
/// storage; slicing an addressable array aliases the array's elements.
pub fn array_slice(h: &ValueHandle, lo: usize, hi: usize) -> Result<ValueHandle> {
    let elem = elem_type(h)?;
    match h.get() {
        HostValue::Slice(s) => {
            let cap = s.cap();
            if lo > hi || hi > cap {
                return Err(Error::OutOfRange { index: hi, len: cap });
            }
            Ok(ValueHandle::owned(
                h.ty().clone(),
                HostValue::Slice(SliceValue {
                    ty: h.ty().clone(),
                    backing: s.backing.clone(),
                    offset: s.offset + lo,
                    len: hi - lo,
                }),
            ))
        }
        HostValue::Array(a) => {
            if lo > hi || hi > a.cells.len() {
                return Err(Error::OutOfRange {
                    index: hi,
                    len: a.cells.len(),
                });
            }
            let ty = TypeDescriptor::slice_of(elem);
            Ok(ValueHandle::owned(
                ty.clone(),
                HostValue::Slice(SliceValue {
                    ty,
                    backing: Arc::new(RwLock::new(a.cells[lo..].to_vec())),
                    offset: 0,
                    len: hi - lo,
                }),
            ))
        }
        _ => Err(type_mismatch("slice or array", h.ty())),
    }
}

/// Append to a slice, returning the authoritative new handle. Whether the
/// result shares the original backing storage follows host slice growth:
/// in-place while capacity remains, reallocation (copying the prefix)
/// otherwise.
pub fn slice_append(h: &ValueHandle, value: &ValueHandle) -> Result<ValueHandle> {
    let TypeKind::Slice { elem } = &h.ty().kind else {
        return Err(type_mismatch("slice", h.ty()));
    };
    let HostValue::Slice(s) = h.get() else {
        return Err(type_mismatch("slice", h.ty()));
    };
    let src = coerce_to(elem, value)?;

    let grown = if s.len < s.cap() {
        let cell = s.backing.read()[s.offset + s.len].clone();
        assign(&ValueHandle::from_place(elem.clone(), cell), &src)?;
        SliceValue {
            ty: s.ty.clone(),
            backing: s.backing.clone(),
            offset: s.offset,
            len: s.len + 1,
        }
    } else {
        let mut cells: Vec<crate::value::Cell> = s.backing.read()
            [s.offset..s.offset + s.len]
            .iter()
            .map(|c| new_cell(c.read().deep_copy()))
            .collect();
        let slot = ValueHandle::fresh(elem.clone(), zero_value(elem));
        assign(&slot, &src)?;
        cells.push(slot.cell().clone());
        SliceValue {
            ty: s.ty.clone(),
            backing: Arc::new(RwLock::new(cells)),
            offset: 0,
            len: s.len + 1,
        }
    };
    Ok(ValueHandle::owned(h.ty().clone(), HostValue::Slice(grown)))
}

/// Make a slice of the given slice type with `len` zero elements and capacity
/// `cap`
pub fn slice_make(ty: &TypeRef, len: usize, cap: usize) -> Result<ValueHandle> {
    let TypeKind::Slice { elem } = &ty.kind else {
        return Err(type_mismatch("slice", ty));
    };
    if len > cap {
        return Err(Error::OutOfRange { index: len, len: cap });
    }
    let backing: Vec<crate::value::Cell> =
        (0..cap).map(|_| new_cell(zero_value(elem))).collect();
    Ok(ValueHandle::owned(
        ty.clone(),
        HostValue::Slice(SliceValue {
            ty: ty.clone(),
            backing: Arc::new(RwLock::new(backing)),
            offset: 0,
            len,
        }),
    ))
}

// ============================================================================
// Primitives
// ============================================================================

/// A numeric value crossing the script boundary. 64-bit integer kinds travel
/// as their own variants so the bridge can carry them as decimal strings
/// instead of lossy floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Exactly representable as a script number
    Float(f64),
    /// `i64` kind, full precision
    Int64(i64),
    /// `u64` kind, full precision
    Uint64(u64),
}

/// A numeric value supplied by the script: a native float, a script integer,
/// or a decimal string (for lossless 64-bit values)
#[derive(Debug, Clone)]
pub enum NumberInput {
    /// Native script float
    Float(f64),
    /// Native script integer
    Int(i64),
    /// Decimal string, parsed against the destination kind
    Decimal(String),
}

impl NumberInput {
    fn to_i64(&self) -> Result<i64> {
        match self {
            Self::Float(f) => Ok(*f as i64),
            Self::Int(i) => Ok(*i),
            Self::Decimal(s) => s.parse::<i64>().map_err(|_| Error::ConversionError {
                src: s.clone(),
                target: "i64".into(),
            }),
        }
    }

    fn to_u64(&self) -> Result<u64> {
        match self {
            Self::Float(f) => Ok(*f as u64),
            Self::Int(i) => Ok(*i as u64),
            Self::Decimal(s) => s.parse::<u64>().map_err(|_| Error::ConversionError {
                src: s.clone(),
                target: "u64".into(),
            }),
        }
    }

    fn to_f64(&self) -> Result<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            Self::Decimal(s) => Err(Error::TypeMismatch {
                expected: "number".into(),
                got: format!("string \"{s}\""),
            }),
        }
    }
}

/// Read a boolean-kinded handle (one pointer auto-deref)
pub fn get_bool(h: &ValueHandle) -> Result<bool> {
    let view = auto_deref(h)?;
    match view.get() {
        HostValue::Bool(b) => Ok(b),
        _ => Err(type_mismatch("bool", view.ty())),
    }
}

/// Write a boolean-kinded handle
pub fn set_bool(h: &ValueHandle, v: bool) -> Result<()> {
    let view = auto_deref(h)?;
    if !view.is_addressable() {
        return Err(Error::NotAddressable(view.ty().name.clone()));
    }
    match view.get() {
        HostValue::Bool(_) => {
            view.set_raw(HostValue::Bool(v));
            Ok(())
        }
        _ => Err(type_mismatch("bool", view.ty())),
    }
}

/// Read a string-kinded handle
pub fn get_str(h: &ValueHandle) -> Result<String> {
    let view = auto_deref(h)?;
    match view.get() {
        HostValue::Str(s) => Ok(s),
        _ => Err(type_mismatch("string", view.ty())),
    }
}

/// Write a string-kinded handle
pub fn set_str(h: &ValueHandle, v: &str) -> Result<()> {
    let view = auto_deref(h)?;
    if !view.is_addressable() {
        return Err(Error::NotAddressable(view.ty().name.clone()));
    }
    match view.get() {
        HostValue::Str(_) => {
            view.set_raw(HostValue::Str(v.to_string()));
            Ok(())
        }
        _ => Err(type_mismatch("string", view.ty())),
    }
}

/// Read a numeric handle. `i64`/`u64` kinds come back as their own variants
/// so callers can preserve full 64-bit precision.
pub fn get_number(h: &ValueHandle) -> Result<Number> {
    let view = auto_deref(h)?;
    Ok(match view.get() {
        HostValue::I8(n) => Number::Float(f64::from(n)),
        HostValue::I16(n) => Number::Float(f64::from(n)),
        HostValue::I32(n) => Number::Float(f64::from(n)),
        HostValue::I64(n) => Number::Int64(n),
        HostValue::U8(n) => Number::Float(f64::from(n)),
        HostValue::U16(n) => Number::Float(f64::from(n)),
        HostValue::U32(n) => Number::Float(f64::from(n)),
        HostValue::U64(n) => Number::Uint64(n),
        HostValue::F32(f) => Number::Float(f64::from(f)),
        HostValue::F64(f) => Number::Float(f),
        _ => return Err(type_mismatch("number", view.ty())),
    })
}

/// Write a numeric handle. 64-bit integer kinds accept a decimal string and
/// parse it losslessly; float kinds require a native number.
pub fn set_number(h: &ValueHandle, input: &NumberInput) -> Result<()> {
    let view = auto_deref(h)?;
    if !view.is_addressable() {
        return Err(Error::NotAddressable(view.ty().name.clone()));
    }
    let out = match view.get() {
        HostValue::I8(_) => HostValue::I8(input.to_i64()? as i8),
        HostValue::I16(_) => HostValue::I16(input.to_i64()? as i16),
        HostValue::I32(_) => HostValue::I32(input.to_i64()? as i32),
        HostValue::I64(_) => HostValue::I64(input.to_i64()?),
        HostValue::U8(_) => HostValue::U8(input.to_u64()? as u8),
        HostValue::U16(_) => HostValue::U16(input.to_u64()? as u16),
        HostValue::U32(_) => HostValue::U32(input.to_u64()? as u32),
        HostValue::U64(_) => HostValue::U64(input.to_u64()?),
        HostValue::F32(_) => HostValue::F32(input.to_f64()? as f32),
        HostValue::F64(_) => HostValue::F64(input.to_f64()?),
        _ => return Err(type_mismatch("number", view.ty())),
    };
    view.set_raw(out);
    Ok(())
}
