//! Struct wrappers.

use drake_ir::StructId;

use crate::ty::TyId;

/// A declared record type.
///
/// Member functions of a struct `S` are plain functions named `S_<member>`
/// whose first parameter, `this`, is a `*S`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub(crate) name: String,
    pub(crate) elements: Vec<TyId>,
    pub(crate) ty: TyId,
    pub(crate) ptr_ty: TyId,
    pub(crate) ir: StructId,
}

impl StructDef {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field types in field-index order.
    #[inline]
    pub fn elements(&self) -> &[TyId] {
        &self.elements
    }

    #[inline]
    pub fn element(&self, index: u32) -> Option<TyId> {
        self.elements.get(index as usize).copied()
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.elements.len()
    }

    /// The struct type itself.
    #[inline]
    pub fn ty(&self) -> TyId {
        self.ty
    }

    /// `*S`, the type of `this`.
    #[inline]
    pub fn ptr_ty(&self) -> TyId {
        self.ptr_ty
    }

    #[inline]
    pub fn ir(&self) -> StructId {
        self.ir
    }

    /// Name of member `member` as a module-level function.
    pub fn member_name(&self, member: &str) -> String {
        format!("{}_{member}", self.name)
    }
}
