//! Block terminators for `IrBuilder`.
//!
//! A terminator aimed at a block that already has one is dropped and
//! counted as a codegen error.

use cranelift_codegen::cursor::{Cursor, FuncCursor};
use cranelift_codegen::ir::InstBuilder;

use super::IrBuilder;
use crate::ids::InsertPoint;
use crate::{BlockId, ValueId};

impl IrBuilder {
    pub fn br(&mut self, at: InsertPoint, target: BlockId) {
        if let Some(mut pos) = self.terminator_cursor(at, "br") {
            pos.ins().jump(target, &[]);
        }
    }

    /// Branch to `then_block` if `cond` is non-zero.
    pub fn cond_br(
        &mut self,
        at: InsertPoint,
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) {
        if let Some(mut pos) = self.terminator_cursor(at, "brif") {
            pos.ins().brif(cond, then_block, &[], else_block, &[]);
        }
    }

    pub fn ret(&mut self, at: InsertPoint, value: ValueId) {
        if let Some(mut pos) = self.terminator_cursor(at, "return") {
            pos.ins().return_(&[value]);
        }
    }

    pub fn ret_void(&mut self, at: InsertPoint) {
        if let Some(mut pos) = self.terminator_cursor(at, "return") {
            pos.ins().return_(&[]);
        }
    }

    fn terminator_cursor(&mut self, at: InsertPoint, what: &str) -> Option<FuncCursor<'_>> {
        let function = self.module.function_mut(at.func);
        if function.is_terminated(at.block) {
            tracing::error!(
                func = %function.name,
                block = %at.block,
                new = what,
                "block already terminated, dropping terminator"
            );
            self.codegen_errors.set(self.codegen_errors.get() + 1);
            return None;
        }
        tracing::trace!(func = %function.name, block = %at.block, what, "terminate");
        Some(FuncCursor::new(function.body_mut()).at_bottom(at.block))
    }
}
