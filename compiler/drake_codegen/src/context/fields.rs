//! Struct field access and pointer indexing.

use tracing::{error, trace};

use drake_ir::{InsertPoint, StructId};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::{TyData, TyId};

impl CodegenCx {
    /// Address of field `index` of the struct `parent` points to.
    ///
    /// `parent` must have type `*S` for a struct `S`: a stack slot from
    /// [`allocate_struct`](Self::allocate_struct) or a `this` parameter. The
    /// result is a value local of type `*field`.
    pub fn get_element_ptr(
        &mut self,
        at: InsertPoint,
        parent: LocalId,
        index: u32,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, parent)?;
        let (sid, field_ty) = self.field(parent, index)?;
        self.emit_field_ptr(at, parent, sid, index, field_ty, name)
    }

    /// Load field `index` of the struct `parent` points to.
    pub fn get_element_val(
        &mut self,
        at: InsertPoint,
        parent: LocalId,
        index: u32,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        let ptr = self.get_element_ptr(at, parent, index, "")?;
        self.load_value(at, ptr, true, name)
    }

    /// Store `value` into field `index` of the struct `parent` points to.
    pub fn store_field(
        &mut self,
        at: InsertPoint,
        parent: LocalId,
        index: u32,
        value: LocalId,
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, parent)?;
        self.check_owner(at.func, value)?;
        let (sid, field_ty) = self.field(parent, index)?;
        self.expect_ty(field_ty, self.value_ty(value))?;
        let ptr = self.emit_field_ptr(at, parent, sid, index, field_ty, "")?;
        self.store(at, ptr, value)
    }

    /// `base + index`, scaled by the pointee's stride.
    ///
    /// `base` must be a `*T` value and `index` any integer; the index is
    /// sign- or zero-extended to pointer width by its signedness. Unchecked.
    pub fn index_ptr(
        &mut self,
        at: InsertPoint,
        base: LocalId,
        index: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, base)?;
        self.check_owner(at.func, index)?;
        let (base_ty, elem_ty) = self.indexable(base)?;
        let index_ty = self.value_ty(index);
        let TyData::Int { signed, .. } = *self.types.data(index_ty) else {
            return Err(self.mismatch("an integer index", index_ty));
        };
        let index_ir = self.types.scalar(index_ty)?;
        let ptr_ir = self.types.pointer_ir();

        let b = self.load_value(at, base, false, "")?;
        let i = self.load_value(at, index, false, "")?;
        let (b, mut i) = (self.local(b).value, self.local(i).value);
        if signed && index_ir.bits() < ptr_ir.bits() {
            i = self.builder.sext(at, i, ptr_ir, "");
        }
        // `void` elements stride by one byte.
        let stride = self.types.stride_of(elem_ty);
        trace!(elem = %self.types.display(elem_ty), stride, "index pointer");
        let value = self.builder.element_gep(at, stride, b, i, name);
        Ok(self.push_value(at.func, value, base_ty))
    }

    /// Load `base[index]`.
    pub fn load_index(
        &mut self,
        at: InsertPoint,
        base: LocalId,
        index: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        let ptr = self.index_ptr(at, base, index, "")?;
        self.load_value(at, ptr, true, name)
    }

    /// Store `value` into `base[index]`.
    pub fn store_index(
        &mut self,
        at: InsertPoint,
        base: LocalId,
        index: LocalId,
        value: LocalId,
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, value)?;
        self.check_owner(at.func, base)?;
        let (_, elem_ty) = self.indexable(base)?;
        self.expect_ty(elem_ty, self.value_ty(value))?;
        let ptr = self.index_ptr(at, base, index, "")?;
        self.store(at, ptr, value)
    }

    /// Struct and field type for field `index` of the struct `parent`
    /// points to.
    fn field(&self, parent: LocalId, index: u32) -> Result<(StructId, TyId), CodegenError> {
        let ty = self.local(parent).ty;
        // Struct types interned directly on the registry have no IR layout.
        let Some(sid) = self
            .types
            .pointee_struct(ty)
            .and_then(|s| self.types.struct_ir(s))
        else {
            let err = CodegenError::NotStructPointer {
                ty: self.ty_name(ty),
            };
            error!(%err, "field access on a non-struct pointer");
            return Err(err);
        };
        let def = self.structure(sid);
        match def.element(index) {
            Some(field_ty) => Ok((sid, field_ty)),
            None => {
                let err = CodegenError::FieldOutOfRange {
                    structure: def.name().to_owned(),
                    index,
                    count: def.field_count(),
                };
                error!(%err, "field index out of range");
                Err(err)
            }
        }
    }

    fn emit_field_ptr(
        &mut self,
        at: InsertPoint,
        parent: LocalId,
        sid: StructId,
        index: u32,
        field_ty: TyId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.resolve(at, parent)?;
        let ptr = self.local(parent).value;
        let value = self.builder.struct_gep(at, sid, ptr, index, name);
        let ptr_ty = self.types.pointer(field_ty);
        Ok(self.push_value(at.func, value, ptr_ty))
    }

    /// Value type and element type of an indexable base `*T`.
    fn indexable(&self, base: LocalId) -> Result<(TyId, TyId), CodegenError> {
        let ty = self.value_ty(base);
        match self.types.pointee(ty) {
            Some(elem) => Ok((ty, elem)),
            None => Err(self.not_a_pointer(ty)),
        }
    }
}
