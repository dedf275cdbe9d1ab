//! Runtime type descriptors
//!
//! Host values carry a descriptor from a closed set of kinds instead of open
//! reflection metadata. Named descriptors are interned by the symbol table, so
//! a descriptor resolved by name is pointer-identical to the descriptor a live
//! value of that type carries.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Shared reference to an interned type descriptor
pub type TypeRef = Arc<TypeDescriptor>;

/// Runtime type descriptor: fully-qualified name plus structural kind
#[derive(Debug)]
pub struct TypeDescriptor {
    /// Fully-qualified name (e.g. `demo::Role`, `[]i64`, `map[string]i32`)
    pub name: String,
    /// Structural kind
    pub kind: TypeKind,
}

/// Closed set of runtime kinds
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum TypeKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    /// Struct with named, possibly unexported fields (value semantics)
    Struct(StructLayout),
    /// Hash map (reference semantics)
    Map {
        /// Key type
        key: TypeRef,
        /// Element type
        value: TypeRef,
    },
    /// Growable view over shared backing storage (reference semantics)
    Slice {
        /// Element type
        elem: TypeRef,
    },
    /// Fixed-length sequence (value semantics)
    Array {
        /// Element type
        elem: TypeRef,
        /// Element count
        len: usize,
    },
    /// Pointer to a typed storage cell
    Ptr {
        /// Pointee type
        target: TypeRef,
    },
    /// Function signature
    Func(FuncSig),
    /// Empty-interface container, accepts any value
    Interface,
}

/// Field list of a struct type
#[derive(Debug, Clone, Default)]
pub struct StructLayout {
    /// Declared fields, in order
    pub fields: Vec<FieldDef>,
}

/// Single struct field
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeRef,
    /// Whether ordinary (non-privileged) access may touch this field
    pub exported: bool,
}

/// Function signature: input and output types, in order
#[derive(Debug, Clone, Default)]
pub struct FuncSig {
    /// Parameter types
    pub ins: Vec<TypeRef>,
    /// Result types
    pub outs: Vec<TypeRef>,
}

impl FuncSig {
    /// Build a signature from input and output type lists
    pub fn new(ins: Vec<TypeRef>, outs: Vec<TypeRef>) -> Self {
        Self { ins, outs }
    }
}

impl StructLayout {
    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

macro_rules! interned_primitive {
    ($static_name:ident, $ctor:ident, $name:literal, $kind:expr) => {
        static $static_name: Lazy<TypeRef> = Lazy::new(|| {
            Arc::new(TypeDescriptor {
                name: $name.to_string(),
                kind: $kind,
            })
        });

        impl TypeDescriptor {
            #[doc = concat!("Interned `", $name, "` descriptor")]
            pub fn $ctor() -> TypeRef {
                $static_name.clone()
            }
        }
    };
}

interned_primitive!(TY_BOOL, bool, "bool", TypeKind::Bool);
interned_primitive!(TY_I8, i8, "i8", TypeKind::I8);
interned_primitive!(TY_I16, i16, "i16", TypeKind::I16);
interned_primitive!(TY_I32, i32, "i32", TypeKind::I32);
interned_primitive!(TY_I64, i64, "i64", TypeKind::I64);
interned_primitive!(TY_U8, u8, "u8", TypeKind::U8);
interned_primitive!(TY_U16, u16, "u16", TypeKind::U16);
interned_primitive!(TY_U32, u32, "u32", TypeKind::U32);
interned_primitive!(TY_U64, u64, "u64", TypeKind::U64);
interned_primitive!(TY_F32, f32, "f32", TypeKind::F32);
interned_primitive!(TY_F64, f64, "f64", TypeKind::F64);
interned_primitive!(TY_STR, str, "string", TypeKind::Str);
interned_primitive!(TY_IFACE, interface, "interface{}", TypeKind::Interface);

impl TypeDescriptor {
    /// Named struct descriptor
    pub fn named_struct(name: impl Into<String>, fields: Vec<FieldDef>) -> TypeRef {
        Arc::new(Self {
            name: name.into(),
            kind: TypeKind::Struct(StructLayout { fields }),
        })
    }

    /// Map descriptor (`map[key]value`)
    pub fn map_of(key: TypeRef, value: TypeRef) -> TypeRef {
        Arc::new(Self {
            name: format!("map[{}]{}", key.name, value.name),
            kind: TypeKind::Map { key, value },
        })
    }

    /// Slice descriptor (`[]elem`)
    pub fn slice_of(elem: TypeRef) -> TypeRef {
        Arc::new(Self {
            name: format!("[]{}", elem.name),
            kind: TypeKind::Slice { elem },
        })
    }

    /// Array descriptor (`[len]elem`)
    pub fn array_of(elem: TypeRef, len: usize) -> TypeRef {
        Arc::new(Self {
            name: format!("[{}]{}", len, elem.name),
            kind: TypeKind::Array { elem, len },
        })
    }

    /// Pointer descriptor (`*target`)
    pub fn ptr_to(target: TypeRef) -> TypeRef {
        Arc::new(Self {
            name: format!("*{}", target.name),
            kind: TypeKind::Ptr { target },
        })
    }

    /// Function descriptor
    pub fn func_of(sig: FuncSig) -> TypeRef {
        let ins: Vec<&str> = sig.ins.iter().map(|t| t.name.as_str()).collect();
        let outs: Vec<&str> = sig.outs.iter().map(|t| t.name.as_str()).collect();
        Arc::new(Self {
            name: format!("func({}) ({})", ins.join(", "), outs.join(", ")),
            kind: TypeKind::Func(sig),
        })
    }

    /// Short kind name, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeKind::Bool => "bool",
            TypeKind::I8 => "i8",
            TypeKind::I16 => "i16",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::U8 => "u8",
            TypeKind::U16 => "u16",
            TypeKind::U32 => "u32",
            TypeKind::U64 => "u64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
            TypeKind::Str => "string",
            TypeKind::Struct(_) => "struct",
            TypeKind::Map { .. } => "map",
            TypeKind::Slice { .. } => "slice",
            TypeKind::Array { .. } => "array",
            TypeKind::Ptr { .. } => "pointer",
            TypeKind::Func(_) => "func",
            TypeKind::Interface => "interface",
        }
    }

    /// Whether this kind holds integer or floating-point numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::I8
                | TypeKind::I16
                | TypeKind::I32
                | TypeKind::I64
                | TypeKind::U8
                | TypeKind::U16
                | TypeKind::U32
                | TypeKind::U64
                | TypeKind::F32
                | TypeKind::F64
        )
    }

    /// Host assignability: a value of type `src` may be stored in storage of
    /// this type. Interfaces accept anything; everything else requires the
    /// same named type.
    pub fn assignable_from(&self, src: &TypeDescriptor) -> bool {
        if matches!(self.kind, TypeKind::Interface) {
            return true;
        }
        self.name == src.name
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_interning() {
        assert!(Arc::ptr_eq(&TypeDescriptor::i64(), &TypeDescriptor::i64()));
        assert_eq!(TypeDescriptor::i64().name, "i64");
    }

    #[test]
    fn test_composite_names() {
        let m = TypeDescriptor::map_of(TypeDescriptor::str(), TypeDescriptor::i32());
        assert_eq!(m.name, "map[string]i32");

        let s = TypeDescriptor::slice_of(TypeDescriptor::u8());
        assert_eq!(s.name, "[]u8");

        let p = TypeDescriptor::ptr_to(s);
        assert_eq!(p.name, "*[]u8");
    }

    #[test]
    fn test_assignability() {
        let iface = TypeDescriptor::interface();
        let i64 = TypeDescriptor::i64();
        let i32 = TypeDescriptor::i32();

        assert!(iface.assignable_from(&i64));
        assert!(i64.assignable_from(&i64));
        assert!(!i64.assignable_from(&i32));
    }

    #[test]
    fn test_struct_layout_lookup() {
        let role = TypeDescriptor::named_struct(
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
            ],
        );
        let TypeKind::Struct(layout) = &role.kind else {
            panic!("expected struct kind");
        };
        assert_eq!(layout.index_of("Name"), Some(1));
        assert_eq!(layout.index_of("missing"), None);
    }
}
