//! Memory operations (stack slots, load, store, address arithmetic) for
//! `IrBuilder`.

use cranelift_codegen::cursor::{Cursor, FuncCursor};
use cranelift_codegen::ir::{InstBuilder, MemFlags, StackSlotData, StackSlotKind, Type};

use super::IrBuilder;
use crate::error::IrError;
use crate::ids::{FunctionId, InsertPoint, StructId};
use crate::ir_type::IrType;
use crate::ValueId;

impl IrBuilder {
    /// Reserve a stack slot for `ty` and return its address, computed at the
    /// top of `func`'s entry block.
    ///
    /// Keeps every stack slot in the entry block no matter which block the
    /// caller is currently filling, so a slot declared inside a loop body is
    /// allocated once.
    pub fn entry_alloca(
        &mut self,
        func: FunctionId,
        ty: IrType,
        name: &str,
    ) -> Result<ValueId, IrError> {
        let size = u32::try_from(self.module.size_of(ty)).unwrap_or(u32::MAX);
        let align_shift = self.module.align_of(ty).trailing_zeros() as u8;
        let ptr = self.pointer_type();
        let function = self.module.function_mut(func);
        let Some(entry) = function.entry() else {
            return Err(IrError::MissingBody(function.name.clone()));
        };
        let body = function.body_mut();
        let slot = body.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            size,
            align_shift,
        ));
        let addr = FuncCursor::new(body)
            .at_first_insertion_point(entry)
            .ins()
            .stack_addr(ptr, slot, 0);
        tracing::trace!(func = func.raw(), %ty, size, "entry stack slot");
        Ok(self.name_value(func, addr, name))
    }

    /// Build a load of `ty` from `ptr`.
    pub fn load(&mut self, at: InsertPoint, ty: Type, ptr: ValueId, name: &str) -> ValueId {
        let v = self
            .cursor(at)
            .ins()
            .load(ty, MemFlags::trusted(), ptr, 0);
        self.name_value(at.func, v, name)
    }

    /// Build a store of `value` to `ptr`.
    pub fn store(&mut self, at: InsertPoint, value: ValueId, ptr: ValueId) {
        self.cursor(at)
            .ins()
            .store(MemFlags::trusted(), value, ptr, 0);
    }

    /// Address of field `index` of the struct at `ptr`.
    pub fn struct_gep(
        &mut self,
        at: InsertPoint,
        struct_id: StructId,
        ptr: ValueId,
        index: u32,
        name: &str,
    ) -> ValueId {
        let offset = self.module.field_offset(struct_id, index);
        let v = self
            .cursor(at)
            .ins()
            .iadd_imm(ptr, i64::try_from(offset).unwrap_or(i64::MAX));
        self.name_value(at.func, v, name)
    }

    /// `ptr + index * stride`. The index is read as unsigned and resized to
    /// pointer width first.
    pub fn element_gep(
        &mut self,
        at: InsertPoint,
        stride: u64,
        ptr: ValueId,
        index: ValueId,
        name: &str,
    ) -> ValueId {
        let ptr_ty = self.pointer_type();
        let index_ty = self.value_type(at.func, index);
        let mut pos = self.cursor(at);
        let index = if index_ty.bits() > ptr_ty.bits() {
            pos.ins().ireduce(ptr_ty, index)
        } else if index_ty.bits() < ptr_ty.bits() {
            pos.ins().uextend(ptr_ty, index)
        } else {
            index
        };
        let offset = pos
            .ins()
            .imul_imm(index, i64::try_from(stride).unwrap_or(i64::MAX));
        let v = pos.ins().iadd(ptr, offset);
        self.name_value(at.func, v, name)
    }
}
