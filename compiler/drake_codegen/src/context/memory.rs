//! Heap intrinsics and layout constants.
//!
//! `malloc`, `free` and `memcpy` are declared on first use and shared by
//! every caller in the module.

use drake_ir::{FunctionId, InsertPoint};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::TyId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Intrinsic {
    /// `malloc(u64) -> *u8`
    Malloc,
    /// `free(*u8)`
    Free,
    /// `memcpy(*u8, *u8, u64) -> *u8`
    Memcpy,
}

impl CodegenCx {
    fn intrinsic(&mut self, which: Intrinsic) -> Result<FunctionId, CodegenError> {
        let bytes = self.types.byte_ptr();
        match which {
            Intrinsic::Malloc => self.get_or_declare_function(bytes, "malloc", &[TyId::SIZE]),
            Intrinsic::Free => self.get_or_declare_function(TyId::VOID, "free", &[bytes]),
            Intrinsic::Memcpy => {
                self.get_or_declare_function(bytes, "memcpy", &[bytes, bytes, TyId::SIZE])
            }
        }
    }

    /// Allocate `bytes` (a `u64`) on the heap. Returns a `*u8`.
    pub fn malloc(
        &mut self,
        at: InsertPoint,
        bytes: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, bytes)?;
        self.expect_ty(TyId::SIZE, self.value_ty(bytes))?;
        let malloc = self.intrinsic(Intrinsic::Malloc)?;
        self.call(at, malloc, &[bytes], name)?
            .ok_or_else(|| CodegenError::SignatureMismatch {
                name: "malloc".to_owned(),
            })
    }

    /// Free the heap block `ptr` points to. Any pointer type is accepted.
    pub fn free(&mut self, at: InsertPoint, ptr: LocalId) -> Result<(), CodegenError> {
        self.check_pointer(at.func, ptr)?;
        let free = self.intrinsic(Intrinsic::Free)?;
        let raw = self.as_byte_ptr(at, ptr)?;
        self.call(at, free, &[raw], "")?;
        Ok(())
    }

    /// Copy `bytes` bytes from `src` to `dest`. Returns `dest` as a `*u8`.
    pub fn memcpy(
        &mut self,
        at: InsertPoint,
        dest: LocalId,
        src: LocalId,
        bytes: LocalId,
    ) -> Result<LocalId, CodegenError> {
        self.check_pointer(at.func, dest)?;
        self.check_pointer(at.func, src)?;
        self.check_owner(at.func, bytes)?;
        self.expect_ty(TyId::SIZE, self.value_ty(bytes))?;
        let memcpy = self.intrinsic(Intrinsic::Memcpy)?;
        let dest = self.as_byte_ptr(at, dest)?;
        let src = self.as_byte_ptr(at, src)?;
        self.call(at, memcpy, &[dest, src, bytes], "")?
            .ok_or_else(|| CodegenError::SignatureMismatch {
                name: "memcpy".to_owned(),
            })
    }

    /// `size_of(ty)` as a `u64` constant in `func`.
    pub fn const_size_of(&mut self, func: FunctionId, ty: TyId) -> Result<LocalId, CodegenError> {
        let size = self.types.size_of(ty);
        self.const_size(func, size)
    }

    /// `stride_of(ty)` as a `u64` constant in `func`.
    pub fn const_stride(&mut self, func: FunctionId, ty: TyId) -> Result<LocalId, CodegenError> {
        let stride = self.types.stride_of(ty);
        self.const_size(func, stride)
    }

    fn check_pointer(&self, func: FunctionId, ptr: LocalId) -> Result<(), CodegenError> {
        self.check_owner(func, ptr)?;
        let ty = self.value_ty(ptr);
        if self.types.is_pointer(ty) {
            Ok(())
        } else {
            Err(self.not_a_pointer(ty))
        }
    }

    /// `ptr` retyped as `*u8`.
    fn as_byte_ptr(&mut self, at: InsertPoint, ptr: LocalId) -> Result<LocalId, CodegenError> {
        let bytes = self.types.byte_ptr();
        self.type_cast(at, ptr, bytes, "")
    }
}
