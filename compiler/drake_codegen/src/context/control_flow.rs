//! Blocks, branches and returns.

use tracing::trace;

use drake_ir::{BlockId, FunctionId, InsertPoint, IntCC};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::TyId;

impl CodegenCx {
    /// Append an empty block to `func`.
    pub fn append_block(&mut self, func: FunctionId, name: &str) -> Result<BlockId, CodegenError> {
        self.entry(func)?;
        Ok(self.builder.append_block(func, name))
    }

    #[inline]
    pub fn is_terminated(&self, at: InsertPoint) -> bool {
        self.builder.is_terminated(at)
    }

    /// Unconditional branch to `target`.
    pub fn jump(&mut self, at: InsertPoint, target: BlockId) {
        trace!(from = %at.block, to = %target, "jump");
        self.builder.br(at, target);
    }

    /// Branch on the `bool` value `cond`.
    pub fn cond_jump(
        &mut self,
        at: InsertPoint,
        cond: LocalId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, cond)?;
        self.expect_ty(TyId::BOOL, self.value_ty(cond))?;
        let c = self.load_value(at, cond, false, "")?;
        let c = self.local(c).value;
        self.builder.cond_br(at, c, then_block, else_block);
        Ok(())
    }

    /// Return `value`, which must have the function's return type.
    pub fn ret(&mut self, at: InsertPoint, value: LocalId) -> Result<(), CodegenError> {
        self.check_owner(at.func, value)?;
        self.expect_ty(self.func(at.func).ret(), self.value_ty(value))?;
        let v = self.load_value(at, value, false, "")?;
        let v = self.local(v).value;
        self.builder.ret(at, v);
        Ok(())
    }

    /// Return from a `void` function.
    pub fn ret_void(&mut self, at: InsertPoint) -> Result<(), CodegenError> {
        self.expect_ty(self.func(at.func).ret(), TyId::VOID)?;
        self.builder.ret_void(at);
        Ok(())
    }

    /// `bool` that is true when the pointer `ptr` is null.
    pub fn is_null(
        &mut self,
        at: InsertPoint,
        ptr: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, ptr)?;
        let ty = self.value_ty(ptr);
        if !self.types.is_pointer(ty) {
            return Err(self.not_a_pointer(ty));
        }
        let p = self.load_value(at, ptr, false, "")?;
        let p = self.local(p).value;
        let null = self.builder.const_null(at.func)?;
        let value = self.builder.icmp(at, IntCC::Equal, p, null, name);
        Ok(self.push_value(at.func, value, TyId::BOOL))
    }
}
