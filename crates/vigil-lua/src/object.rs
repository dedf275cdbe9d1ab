//! Userdata crossing the Lua boundary

use mlua::{MetaMethod, UserData, UserDataMethods};
use vigil_core::{TypeRef, ValueHandle};

/// A host object held by the script: either a live value handle or a bare
/// runtime type. Scripts never see host memory directly; every inspection or
/// mutation goes back through a bridge function with one of these as the
/// subject.
pub enum ScriptObject {
    /// Live (possibly aliasing) view of a host value
    Value(ValueHandle),
    /// Runtime type, for allocation and conversion targets
    Type(TypeRef),
}

impl ScriptObject {
    /// The underlying value handle; an error for type objects
    pub fn handle(&self) -> mlua::Result<&ValueHandle> {
        match self {
            ScriptObject::Value(h) => Ok(h),
            ScriptObject::Type(t) => Err(mlua::Error::external(format!(
                "need a value, got type `{}`",
                t.name
            ))),
        }
    }

    /// The object's type: a value's runtime type, or the type itself
    pub fn ty(&self) -> TypeRef {
        match self {
            ScriptObject::Value(h) => h.ty().clone(),
            ScriptObject::Type(t) => t.clone(),
        }
    }
}

impl UserData for ScriptObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this {
                ScriptObject::Value(h) => format!("vigil.value<{}>", h.ty().name),
                ScriptObject::Type(t) => format!("vigil.type<{}>", t.name),
            })
        });
    }
}
