//! Host values and value handles
//!
//! Host state lives in shared storage cells. A [`ValueHandle`] pairs a cell
//! with its runtime type descriptor and an addressability flag: handles over
//! live host storage (globals, struct fields, map-value slots, slice elements)
//! alias that storage and mutate it in place, while handles produced by the
//! primitive constructors are transient copies that refuse `addr_of` and the
//! typed setters.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::symbols::FuncId;
use crate::types::{FuncSig, TypeDescriptor, TypeKind, TypeRef};

/// Shared storage cell holding one host value
pub type Cell = Arc<RwLock<HostValue>>;

/// Allocate a fresh cell
pub fn new_cell(v: HostValue) -> Cell {
    Arc::new(RwLock::new(v))
}

/// Closed tagged set of host runtime values.
///
/// `Clone` produces an aliasing view: struct/array clones share their field
/// cells, maps and slices share their backing storage. Host *assignment*
/// semantics (struct/array by value, containers by reference) are provided by
/// [`HostValue::deep_copy`].
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum HostValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Struct(StructValue),
    Map(MapValue),
    Slice(SliceValue),
    Array(ArrayValue),
    Ptr(Option<Place>),
    Func(Option<FuncValue>),
    Iface(Option<Box<IfaceValue>>),
}

/// Struct instance: one cell per declared field
#[derive(Debug, Clone)]
pub struct StructValue {
    /// Struct type (carries the field layout)
    pub ty: TypeRef,
    /// Field cells, in declaration order
    pub fields: Vec<Cell>,
}

/// Map instance with shared entry table
#[derive(Debug, Clone)]
pub struct MapValue {
    /// Map type
    pub ty: TypeRef,
    /// Shared entries; values are live cells
    pub entries: Arc<RwLock<FxHashMap<MapKey, Cell>>>,
}

/// Slice: a `[offset, offset+len)` window over shared backing storage
#[derive(Debug, Clone)]
pub struct SliceValue {
    /// Slice type
    pub ty: TypeRef,
    /// Shared backing cells; capacity runs to the end of the backing
    pub backing: Arc<RwLock<Vec<Cell>>>,
    /// Window start
    pub offset: usize,
    /// Window length
    pub len: usize,
}

impl SliceValue {
    /// Remaining capacity from the window start to the end of the backing
    pub fn cap(&self) -> usize {
        self.backing.read().len() - self.offset
    }
}

/// Fixed-length array instance
#[derive(Debug, Clone)]
pub struct ArrayValue {
    /// Array type
    pub ty: TypeRef,
    /// Element cells
    pub cells: Vec<Cell>,
}

/// Typed reference to a storage cell (a pointer target)
#[derive(Debug, Clone)]
pub struct Place {
    /// Pointee type
    pub ty: TypeRef,
    /// Referenced cell
    pub cell: Cell,
}

/// Function value: registry identity plus optional bound receiver
#[derive(Debug, Clone)]
pub struct FuncValue {
    /// Identity in the function registry
    pub id: FuncId,
    /// Signature (receiver included as the first input for methods)
    pub sig: FuncSig,
    /// Bound receiver, prepended on invocation
    pub receiver: Option<Box<ValueHandle>>,
}

/// Boxed value inside a non-nil empty interface
#[derive(Debug, Clone)]
pub struct IfaceValue {
    /// Dynamic type of the boxed value
    pub ty: TypeRef,
    /// Boxed value
    pub value: HostValue,
}

/// Hashable key for map entries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
}

impl MapKey {
    /// Derive a key from a host value; non-hashable kinds are rejected
    pub fn from_value(v: &HostValue) -> Result<Self> {
        match v {
            HostValue::Bool(b) => Ok(Self::Bool(*b)),
            HostValue::I8(n) => Ok(Self::Int(i64::from(*n))),
            HostValue::I16(n) => Ok(Self::Int(i64::from(*n))),
            HostValue::I32(n) => Ok(Self::Int(i64::from(*n))),
            HostValue::I64(n) => Ok(Self::Int(*n)),
            HostValue::U8(n) => Ok(Self::Uint(u64::from(*n))),
            HostValue::U16(n) => Ok(Self::Uint(u64::from(*n))),
            HostValue::U32(n) => Ok(Self::Uint(u64::from(*n))),
            HostValue::U64(n) => Ok(Self::Uint(*n)),
            HostValue::Str(s) => Ok(Self::Str(s.clone())),
            HostValue::Iface(Some(boxed)) => Self::from_value(&boxed.value),
            other => Err(Error::TypeMismatch {
                expected: "hashable key".into(),
                got: other.kind_name().into(),
            }),
        }
    }

    /// Rebuild a host value of the given key type from this key
    pub fn to_value(&self, ty: &TypeRef) -> HostValue {
        match (&ty.kind, self) {
            (TypeKind::Bool, Self::Bool(b)) => HostValue::Bool(*b),
            (TypeKind::I8, Self::Int(n)) => HostValue::I8(*n as i8),
            (TypeKind::I16, Self::Int(n)) => HostValue::I16(*n as i16),
            (TypeKind::I32, Self::Int(n)) => HostValue::I32(*n as i32),
            (TypeKind::I64, Self::Int(n)) => HostValue::I64(*n),
            (TypeKind::U8, Self::Uint(n)) => HostValue::U8(*n as u8),
            (TypeKind::U16, Self::Uint(n)) => HostValue::U16(*n as u16),
            (TypeKind::U32, Self::Uint(n)) => HostValue::U32(*n as u32),
            (TypeKind::U64, Self::Uint(n)) => HostValue::U64(*n),
            (TypeKind::Str, Self::Str(s)) => HostValue::Str(s.clone()),
            // Interface-keyed maps keep the widest representation
            (_, Self::Bool(b)) => HostValue::Bool(*b),
            (_, Self::Int(n)) => HostValue::I64(*n),
            (_, Self::Uint(n)) => HostValue::U64(*n),
            (_, Self::Str(s)) => HostValue::Str(s.clone()),
        }
    }
}

impl HostValue {
    /// Short kind name, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
            Self::Struct(_) => "struct",
            Self::Map(_) => "map",
            Self::Slice(_) => "slice",
            Self::Array(_) => "array",
            Self::Ptr(_) => "pointer",
            Self::Func(_) => "func",
            Self::Iface(_) => "interface",
        }
    }

    /// Copy with host assignment semantics: structs and arrays copy their
    /// elements into fresh cells, maps and slices share storage, primitives
    /// and strings copy.
    pub fn deep_copy(&self) -> HostValue {
        match self {
            Self::Struct(s) => Self::Struct(StructValue {
                ty: s.ty.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|c| new_cell(c.read().deep_copy()))
                    .collect(),
            }),
            Self::Array(a) => Self::Array(ArrayValue {
                ty: a.ty.clone(),
                cells: a
                    .cells
                    .iter()
                    .map(|c| new_cell(c.read().deep_copy()))
                    .collect(),
            }),
            Self::Iface(Some(boxed)) => Self::Iface(Some(Box::new(IfaceValue {
                ty: boxed.ty.clone(),
                value: boxed.value.deep_copy(),
            }))),
            other => other.clone(),
        }
    }

    /// Structural equality (by value for structs/arrays, by identity for
    /// maps/slices/pointers, by registry id for functions)
    pub fn equals(&self, other: &HostValue) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I8(a), Self::I8(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::U8(a), Self::U8(b)) => a == b,
            (Self::U16(a), Self::U16(b)) => a == b,
            (Self::U32(a), Self::U32(b)) => a == b,
            (Self::U64(a), Self::U64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => {
                a.ty == b.ty
                    && a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(&b.fields)
                        .all(|(x, y)| x.read().equals(&y.read()))
            }
            (Self::Array(a), Self::Array(b)) => {
                a.ty == b.ty
                    && a.cells.len() == b.cells.len()
                    && a.cells
                        .iter()
                        .zip(&b.cells)
                        .all(|(x, y)| x.read().equals(&y.read()))
            }
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(&a.entries, &b.entries),
            (Self::Slice(a), Self::Slice(b)) => {
                Arc::ptr_eq(&a.backing, &b.backing) && a.offset == b.offset && a.len == b.len
            }
            (Self::Ptr(Some(a)), Self::Ptr(Some(b))) => Arc::ptr_eq(&a.cell, &b.cell),
            (Self::Ptr(None), Self::Ptr(None)) => true,
            (Self::Func(Some(a)), Self::Func(Some(b))) => a.id == b.id,
            (Self::Func(None), Self::Func(None)) => true,
            (Self::Iface(Some(a)), Self::Iface(Some(b))) => a.value.equals(&b.value),
            (Self::Iface(None), Self::Iface(None)) => true,
            _ => false,
        }
    }
}

/// Zero value for a type, used by the typed constructors and `make` helpers
pub fn zero_value(ty: &TypeRef) -> HostValue {
    match &ty.kind {
        TypeKind::Bool => HostValue::Bool(false),
        TypeKind::I8 => HostValue::I8(0),
        TypeKind::I16 => HostValue::I16(0),
        TypeKind::I32 => HostValue::I32(0),
        TypeKind::I64 => HostValue::I64(0),
        TypeKind::U8 => HostValue::U8(0),
        TypeKind::U16 => HostValue::U16(0),
        TypeKind::U32 => HostValue::U32(0),
        TypeKind::U64 => HostValue::U64(0),
        TypeKind::F32 => HostValue::F32(0.0),
        TypeKind::F64 => HostValue::F64(0.0),
        TypeKind::Str => HostValue::Str(String::new()),
        TypeKind::Struct(layout) => HostValue::Struct(StructValue {
            ty: ty.clone(),
            fields: layout
                .fields
                .iter()
                .map(|f| new_cell(zero_value(&f.ty)))
                .collect(),
        }),
        TypeKind::Map { .. } => HostValue::Map(MapValue {
            ty: ty.clone(),
            entries: Arc::new(RwLock::new(FxHashMap::default())),
        }),
        TypeKind::Slice { .. } => HostValue::Slice(SliceValue {
            ty: ty.clone(),
            backing: Arc::new(RwLock::new(Vec::new())),
            offset: 0,
            len: 0,
        }),
        TypeKind::Array { elem, len } => HostValue::Array(ArrayValue {
            ty: ty.clone(),
            cells: (0..*len).map(|_| new_cell(zero_value(elem))).collect(),
        }),
        TypeKind::Ptr { .. } => HostValue::Ptr(None),
        TypeKind::Func(_) => HostValue::Func(None),
        TypeKind::Interface => HostValue::Iface(None),
    }
}

/// Opaque wrapper over a host value, passed across the script boundary
#[derive(Debug, Clone)]
pub struct ValueHandle {
    ty: TypeRef,
    cell: Cell,
    addressable: bool,
}

impl ValueHandle {
    /// Handle aliasing live host storage (addressable)
    pub fn from_place(ty: TypeRef, cell: Cell) -> Self {
        Self {
            ty,
            cell,
            addressable: true,
        }
    }

    /// Transient owned handle (not addressable)
    pub fn owned(ty: TypeRef, value: HostValue) -> Self {
        Self {
            ty,
            cell: new_cell(value),
            addressable: false,
        }
    }

    /// View of shared storage whose addressability follows the parent
    /// (fields of a non-addressable struct are readable but not writable)
    pub(crate) fn view(ty: TypeRef, cell: Cell, addressable: bool) -> Self {
        Self {
            ty,
            cell,
            addressable,
        }
    }

    /// Fresh, independently-owned addressable storage (results of `clone`,
    /// `new_with_name` and the zero-value allocators)
    pub fn fresh(ty: TypeRef, value: HostValue) -> Self {
        Self {
            ty,
            cell: new_cell(value),
            addressable: true,
        }
    }

    /// Runtime type of the wrapped value
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Whether the handle aliases mutable host storage
    pub fn is_addressable(&self) -> bool {
        self.addressable
    }

    /// Snapshot of the wrapped value (an aliasing view for composite kinds)
    pub fn get(&self) -> HostValue {
        self.cell.read().clone()
    }

    /// Overwrite the underlying cell. Callers are responsible for the
    /// assignability check; use `access::set_any` for checked assignment.
    pub fn set_raw(&self, v: HostValue) {
        *self.cell.write() = v;
    }

    /// Typed reference to the underlying cell
    pub fn place(&self) -> Place {
        Place {
            ty: self.ty.clone(),
            cell: self.cell.clone(),
        }
    }

    /// The underlying cell
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Value equality against another handle
    pub fn value_equals(&self, other: &ValueHandle) -> bool {
        self.cell.read().equals(&other.cell.read())
    }

    // ========================================================================
    // Primitive constructors
    // ========================================================================

    /// New boolean handle
    pub fn new_bool(v: bool) -> Self {
        Self::owned(TypeDescriptor::bool(), HostValue::Bool(v))
    }

    /// New `i8` handle
    pub fn new_i8(v: i8) -> Self {
        Self::owned(TypeDescriptor::i8(), HostValue::I8(v))
    }

    /// New `i16` handle
    pub fn new_i16(v: i16) -> Self {
        Self::owned(TypeDescriptor::i16(), HostValue::I16(v))
    }

    /// New `i32` handle
    pub fn new_i32(v: i32) -> Self {
        Self::owned(TypeDescriptor::i32(), HostValue::I32(v))
    }

    /// New `i64` handle
    pub fn new_i64(v: i64) -> Self {
        Self::owned(TypeDescriptor::i64(), HostValue::I64(v))
    }

    /// New `u8` handle
    pub fn new_u8(v: u8) -> Self {
        Self::owned(TypeDescriptor::u8(), HostValue::U8(v))
    }

    /// New `u16` handle
    pub fn new_u16(v: u16) -> Self {
        Self::owned(TypeDescriptor::u16(), HostValue::U16(v))
    }

    /// New `u32` handle
    pub fn new_u32(v: u32) -> Self {
        Self::owned(TypeDescriptor::u32(), HostValue::U32(v))
    }

    /// New `u64` handle
    pub fn new_u64(v: u64) -> Self {
        Self::owned(TypeDescriptor::u64(), HostValue::U64(v))
    }

    /// New string handle
    pub fn new_str(v: impl Into<String>) -> Self {
        Self::owned(TypeDescriptor::str(), HostValue::Str(v.into()))
    }

    /// New empty-interface placeholder, usable as a generic container
    pub fn new_interface() -> Self {
        Self::fresh(TypeDescriptor::interface(), HostValue::Iface(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDef;

    fn role_ty() -> TypeRef {
        TypeDescriptor::named_struct(
            "demo::Role",
            vec![
                FieldDef {
                    name: "id".into(),
                    ty: TypeDescriptor::i64(),
                    exported: false,
                },
                FieldDef {
                    name: "name".into(),
                    ty: TypeDescriptor::str(),
                    exported: false,
                },
            ],
        )
    }

    #[test]
    fn test_zero_struct() {
        let ty = role_ty();
        let HostValue::Struct(s) = zero_value(&ty) else {
            panic!("expected struct");
        };
        assert_eq!(s.fields.len(), 2);
        assert!(s.fields[0].read().equals(&HostValue::I64(0)));
    }

    #[test]
    fn test_deep_copy_struct_is_independent() {
        let ty = role_ty();
        let original = zero_value(&ty);
        let copy = original.deep_copy();

        let HostValue::Struct(orig) = &original else {
            panic!("expected struct");
        };
        let HostValue::Struct(copied) = &copy else {
            panic!("expected struct");
        };
        *copied.fields[0].write() = HostValue::I64(7);
        assert!(orig.fields[0].read().equals(&HostValue::I64(0)));
    }

    #[test]
    fn test_clone_aliases_struct_fields() {
        let ty = role_ty();
        let original = zero_value(&ty);
        let view = original.clone();

        let HostValue::Struct(orig) = &original else {
            panic!("expected struct");
        };
        let HostValue::Struct(viewed) = &view else {
            panic!("expected struct");
        };
        *viewed.fields[0].write() = HostValue::I64(9);
        assert!(orig.fields[0].read().equals(&HostValue::I64(9)));
    }

    #[test]
    fn test_map_key_from_value() {
        assert_eq!(
            MapKey::from_value(&HostValue::I32(5)).unwrap(),
            MapKey::Int(5)
        );
        assert_eq!(
            MapKey::from_value(&HostValue::Str("k".into())).unwrap(),
            MapKey::Str("k".into())
        );
        assert!(MapKey::from_value(&HostValue::F64(1.0)).is_err());
    }

    #[test]
    fn test_handle_addressability() {
        let owned = ValueHandle::new_i64(3);
        assert!(!owned.is_addressable());

        let live = ValueHandle::from_place(
            TypeDescriptor::i64(),
            new_cell(HostValue::I64(3)),
        );
        assert!(live.is_addressable());
    }

    #[test]
    fn test_value_equality() {
        assert!(HostValue::Str("a".into()).equals(&HostValue::Str("a".into())));
        assert!(!HostValue::I64(1).equals(&HostValue::I32(1)));
    }
}
