//! Error types shared across the bridge

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by resolution, accessors, invocation and hotfix installation.
///
/// All of these abort the current script call with a descriptive message;
/// none of them crash the host process. Even a panic inside a host
/// implementation or a hotfix replacement is contained by the invoker and
/// surfaced as [`Error::ScriptRuntime`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Symbol (function/type/global) absent from the symbol table
    #[error("{0} not found")]
    NotFound(String),

    /// Operation applied to the wrong value kind
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type or kind name
        expected: String,
        /// Actual type or kind name
        got: String,
    },

    /// Value is a transient copy, not backed by mutable host storage
    #[error("value of type {0} is not addressable")]
    NotAddressable(String),

    /// Assignment between incompatible types
    #[error("cannot assign {src} to {dst}")]
    AssignError {
        /// Destination type name
        dst: String,
        /// Source type name
        src: String,
    },

    /// Conversion between incompatible representations
    #[error("cannot convert {src} to {target}")]
    ConversionError {
        /// Source type name
        src: String,
        /// Target type name
        target: String,
    },

    /// Argument or result count does not match the live signature
    #[error("arity mismatch: expected {expected} values, got {got}")]
    ArityMismatch {
        /// Expected count
        expected: usize,
        /// Actual count
        got: usize,
    },

    /// Index outside a slice/array bound
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Length of the container
        len: usize,
    },

    /// Public access to an unexported field or method
    #[error("`{0}` is unexported")]
    Unexported(String),

    /// Dereference of a nil pointer or nil function
    #[error("nil pointer dereference")]
    NilPointer,

    /// Script failed to compile or load
    #[error("script compile error: {0}")]
    ScriptCompile(String),

    /// Script raised an error at runtime
    #[error("script runtime error: {0}")]
    ScriptRuntime(String),

    /// Metadata registered after the process symbol table was built
    #[error("symbol table already built")]
    TableSealed,
}
