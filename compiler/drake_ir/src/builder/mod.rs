//! ID-based instruction builder over Cranelift IR.
//!
//! `IrBuilder` owns the [`Module`] under construction and emits into its
//! function bodies with a `FuncCursor`. Unlike Cranelift's
//! `FunctionBuilder`, no body stays borrowed between calls: every emitting
//! method takes the [`InsertPoint`] to append at, so several functions can
//! be filled in any interleaving.
//!
//! # Method Organization
//!
//! | Category | Methods |
//! |----------|---------|
//! | Constants | `const_int`, `const_float`, `const_null`, `global_string` |
//! | Memory | `entry_alloca`, `load`, `store`, `struct_gep`, `element_gep` |
//! | Arithmetic | `binary`, `unary`, `icmp`, `fcmp` |
//! | Conversions | `cast` |
//! | Control flow | `br`, `cond_br`, `ret`, `ret_void` |
//! | Calls | `call` |
//! | Blocks | `append_block`, `is_terminated` |
//! | Functions | `declare_function`, `function_by_name` |
//! | Types | `add_struct` |
//!
//! Constants and stack slot addresses are placed at the top of the entry
//! block so they dominate every use.
//!
//! # Malformed IR
//!
//! Emitting into a block that already has a terminator does not panic: the
//! builder logs the problem, counts it, and appends the instruction to a
//! separate `dead` block instead. A second terminator is dropped. Callers
//! check [`IrBuilder::codegen_error_count`] before handing the module on.

mod arithmetic;
mod control_flow;
mod conversions;
mod memory;

use std::cell::Cell;

use cranelift_codegen::cursor::{Cursor, FuncCursor};
use cranelift_codegen::ir::immediates::{Ieee32, Ieee64, Imm64};
use cranelift_codegen::ir::{
    self, types, ExtFuncData, ExternalName, GlobalValueData, InstBuilder, UserExternalName,
};

use crate::error::IrError;
use crate::ids::{FunctionId, GlobalId, InsertPoint, StructId};
use crate::module::Module;
use crate::ir_type::IrType;
use crate::{BlockId, ValueId};

pub use arithmetic::{BinOp, UnOp};
pub use conversions::CastOp;

/// Symbol namespace of functions in `UserExternalName`s.
pub(crate) const FUNCTION_NAMESPACE: u32 = 0;
/// Symbol namespace of globals in `UserExternalName`s.
pub(crate) const DATA_NAMESPACE: u32 = 1;

pub struct IrBuilder {
    module: Module,
    /// Count of instructions emitted after a terminator.
    codegen_errors: Cell<u32>,
}

impl IrBuilder {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            codegen_errors: Cell::new(0),
        }
    }

    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Finish building and take the module.
    ///
    /// Fails if any malformed instruction was emitted.
    pub fn into_module(self) -> Result<Module, IrError> {
        match self.codegen_errors.get() {
            0 => Ok(self.module),
            count => Err(IrError::MalformedInstructions { count }),
        }
    }

    /// Number of malformed instructions emitted so far.
    pub fn codegen_error_count(&self) -> u32 {
        self.codegen_errors.get()
    }

    /// Integer type of pointers on the module's target.
    #[inline]
    pub fn pointer_type(&self) -> ir::Type {
        self.module.target().pointer_type()
    }

    // -----------------------------------------------------------------------
    // Functions and blocks
    // -----------------------------------------------------------------------

    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[IrType],
        ret: IrType,
    ) -> Result<FunctionId, IrError> {
        self.module.declare_function(name, params, ret)
    }

    #[inline]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.module.function_by_name(name)
    }

    /// Value bound to parameter `index` of `func`.
    #[inline]
    pub fn param(&self, func: FunctionId, index: usize) -> ValueId {
        self.module.function(func).param(index)
    }

    /// Append a new, empty block to `func`. The first block appended creates
    /// the body and becomes the entry block.
    pub fn append_block(&mut self, func: FunctionId, name: &str) -> BlockId {
        let function = self.module.function_mut(func);
        if function.is_declaration() {
            return function.define();
        }
        function.append_block(name)
    }

    #[inline]
    pub fn is_terminated(&self, at: InsertPoint) -> bool {
        self.module.function(at.func).is_terminated(at.block)
    }

    #[inline]
    pub fn value_type(&self, func: FunctionId, value: ValueId) -> ir::Type {
        self.module.function(func).value_type(value)
    }

    /// Add a named struct layout to the module.
    pub fn add_struct(&mut self, name: &str, fields: Vec<IrType>) -> StructId {
        self.module.add_struct(name, fields)
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    /// Integer constant; `value` is truncated to the width of `ty`.
    pub fn const_int(
        &mut self,
        func: FunctionId,
        ty: ir::Type,
        value: u64,
    ) -> Result<ValueId, IrError> {
        let mut pos = self.entry_cursor(func)?;
        let v = if ty == types::I128 {
            let low = pos.ins().iconst(types::I64, value as i64);
            pos.ins().uextend(types::I128, low)
        } else {
            let bits = ty.bits();
            let masked = if bits >= 64 {
                value
            } else {
                value & ((1u64 << bits) - 1)
            };
            pos.ins().iconst(ty, masked as i64)
        };
        Ok(v)
    }

    pub fn const_float(
        &mut self,
        func: FunctionId,
        ty: ir::Type,
        value: f64,
    ) -> Result<ValueId, IrError> {
        let mut pos = self.entry_cursor(func)?;
        let v = match ty {
            types::F32 => pos.ins().f32const(Ieee32::with_float(value as f32)),
            types::F16 => {
                let wide = pos.ins().f32const(Ieee32::with_float(value as f32));
                pos.ins().fdemote(types::F16, wide)
            }
            _ => pos.ins().f64const(Ieee64::with_float(value)),
        };
        Ok(v)
    }

    /// The null pointer.
    pub fn const_null(&mut self, func: FunctionId) -> Result<ValueId, IrError> {
        let ptr = self.pointer_type();
        self.const_int(func, ptr, 0)
    }

    /// Create a NUL-terminated string global and return its address in
    /// `func`.
    pub fn global_string(
        &mut self,
        func: FunctionId,
        name: &str,
        value: &str,
    ) -> Result<ValueId, IrError> {
        self.entry_cursor(func)?;
        let global = self.module.add_string(name, value);
        self.global_addr(func, global)
    }

    pub fn global_addr(&mut self, func: FunctionId, global: GlobalId) -> Result<ValueId, IrError> {
        let ptr = self.pointer_type();
        let function = self.module.function_mut(func);
        let gv = match function.global_refs.get(&global) {
            Some(&gv) => gv,
            None => {
                let body = function.body_mut();
                let name_ref = body.declare_imported_user_function(UserExternalName::new(
                    DATA_NAMESPACE,
                    global.raw(),
                ));
                let gv = body.create_global_value(GlobalValueData::Symbol {
                    name: ExternalName::User(name_ref),
                    offset: Imm64::new(0),
                    colocated: false,
                    tls: false,
                });
                function.global_refs.insert(global, gv);
                gv
            }
        };
        let mut pos = self.entry_cursor(func)?;
        Ok(pos.ins().symbol_value(ptr, gv))
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Call `callee`. Returns `None` for void callees.
    pub fn call(
        &mut self,
        at: InsertPoint,
        callee: FunctionId,
        args: &[ValueId],
        name: &str,
    ) -> Option<ValueId> {
        let signature = self.module.function(callee).signature().clone();
        let caller = self.module.function_mut(at.func);
        let func_ref = match caller.imports.get(&callee) {
            Some(&func_ref) => func_ref,
            None => {
                let body = caller.body_mut();
                let sig_ref = body.import_signature(signature);
                let name_ref = body.declare_imported_user_function(UserExternalName::new(
                    FUNCTION_NAMESPACE,
                    callee.raw(),
                ));
                let func_ref = body.import_function(ExtFuncData {
                    name: ExternalName::User(name_ref),
                    signature: sig_ref,
                    colocated: false,
                });
                caller.imports.insert(callee, func_ref);
                func_ref
            }
        };
        let mut pos = self.cursor(at);
        let inst = pos.ins().call(func_ref, args);
        let result = pos.func.dfg.inst_results(inst).first().copied();
        if let Some(value) = result {
            self.name_value(at.func, value, name);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Emission core
    // -----------------------------------------------------------------------

    /// Cursor at the end of `at.block`, or at the end of the dead block if
    /// `at.block` is already terminated.
    pub(crate) fn cursor(&mut self, at: InsertPoint) -> FuncCursor<'_> {
        let function = self.module.function_mut(at.func);
        let block = if function.is_terminated(at.block) {
            tracing::error!(
                func = %function.name,
                block = %at.block,
                "instruction emitted after terminator, moving it to a dead block"
            );
            self.codegen_errors.set(self.codegen_errors.get() + 1);
            function.dead_block()
        } else {
            at.block
        };
        tracing::trace!(func = %function.name, %block, "emit");
        FuncCursor::new(function.body_mut()).at_bottom(block)
    }

    /// Cursor at the first insertion point of `func`'s entry block.
    fn entry_cursor(&mut self, func: FunctionId) -> Result<FuncCursor<'_>, IrError> {
        let function = self.module.function_mut(func);
        let Some(entry) = function.entry() else {
            return Err(IrError::MissingBody(function.name.clone()));
        };
        Ok(FuncCursor::new(function.body_mut()).at_first_insertion_point(entry))
    }

    /// Attach a debug name to `value`, shown in the module dump.
    pub fn name_value(&mut self, func: FunctionId, value: ValueId, name: &str) -> ValueId {
        self.module.function_mut(func).name_value(value, name);
        value
    }
}
