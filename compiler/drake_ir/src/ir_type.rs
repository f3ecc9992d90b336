//! IR-level types.
//!
//! Scalars are Cranelift types: integers of 8 to 128 bits (`bool` is an
//! `i8`), `f16`/`f32`/`f64`, and pointers as the target's pointer-sized
//! integer. Structs exist only as memory layouts; there are no struct
//! values.

use cranelift_codegen::ir::Type;

use crate::ids::StructId;

/// Type of an IR value or stack slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    Scalar(Type),
    Struct(StructId),
}

impl IrType {
    /// The Cranelift type of a scalar.
    #[inline]
    pub fn scalar(self) -> Option<Type> {
        match self {
            IrType::Scalar(ty) => Some(ty),
            IrType::Void | IrType::Struct(_) => None,
        }
    }

    #[inline]
    pub fn is_void(self) -> bool {
        matches!(self, IrType::Void)
    }
}

impl From<Type> for IrType {
    fn from(ty: Type) -> Self {
        IrType::Scalar(ty)
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Scalar(ty) => write!(f, "{ty}"),
            IrType::Struct(id) => write!(f, "struct#{}", id.raw()),
        }
    }
}
