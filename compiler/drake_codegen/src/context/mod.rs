//! The code generation context.
//!
//! [`CodegenCx`] owns the type registry, the function and struct tables and
//! the module under construction. Front-ends drive it with explicit
//! [`InsertPoint`]s; there is no "current function" cursor.
//!
//! # Method Organization
//!
//! | Category | Methods | File |
//! |----------|---------|------|
//! | Functions and calls | `declare_function`, `entry`, `param`, `call` | `mod.rs` |
//! | Constants | `const_int`, `const_float`, `const_null`, `global_string` | `mod.rs` |
//! | Structs | `declare_struct`, `declare_member`, `allocate_struct` | `mod.rs` |
//! | Locals and futures | `declare_local`, `load_value`, `set_future`, `resolve`, `store` | `locals.rs` |
//! | Operators | `binary_op`, `unary_op` | `operators.rs` |
//! | Casts | `type_cast` | `casts.rs` |
//! | Field access and indexing | `get_element_ptr`, `store_field`, `index_ptr` | `fields.rs` |
//! | Control flow | `append_block`, `jump`, `cond_jump`, `ret`, `is_null` | `control_flow.rs` |
//! | Memory intrinsics | `malloc`, `free`, `memcpy`, `const_stride` | `memory.rs` |
//!
//! # Errors
//!
//! Every check runs before the first instruction of an operation is
//! emitted. An `Err` therefore leaves the module exactly as it was.

mod casts;
mod control_flow;
mod fields;
mod locals;
mod memory;
mod operators;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use drake_ir::{
    types, FunctionId, InsertPoint, IrBuilder, IrType, Module, StructId, TargetDesc, ValueId,
};

use crate::error::CodegenError;
use crate::func::Func;
use crate::local::{Local, LocalId};
use crate::options::CodegenOptions;
use crate::structs::StructDef;
use crate::ty::{TyData, TyId, TypeRegistry};

pub use operators::{BinaryOp, UnaryOp};

/// Owns everything needed to generate one module.
pub struct CodegenCx {
    builder: IrBuilder,
    types: TypeRegistry,
    /// Indexed by `FunctionId`; every IR function is declared through here.
    funcs: Vec<Func>,
    /// Indexed by `StructId`.
    structs: Vec<StructDef>,
    struct_names: FxHashMap<String, StructId>,
    options: CodegenOptions,
}

impl CodegenCx {
    /// Create a context for a new module.
    ///
    /// The target comes from `options.target_triple`, or the host when unset.
    pub fn new(module_name: &str, options: CodegenOptions) -> Result<Self, CodegenError> {
        let target = match &options.target_triple {
            Some(triple) => TargetDesc::from_triple(triple).map_err(|_| {
                error!(%triple, "unknown target triple");
                CodegenError::UnknownTarget(triple.clone())
            })?,
            None => TargetDesc::host(),
        };
        debug!(module = module_name, triple = target.triple(), "creating codegen context");
        let types = TypeRegistry::new(target.pointer_bytes());
        Ok(Self {
            builder: IrBuilder::new(Module::new(module_name, target)),
            types,
            funcs: Vec::new(),
            structs: Vec::new(),
            struct_names: FxHashMap::default(),
            options,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// The module under construction.
    #[inline]
    pub fn module(&self) -> &Module {
        self.builder.module()
    }

    #[inline]
    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    #[inline]
    pub fn func(&self, id: FunctionId) -> &Func {
        &self.funcs[id.index()]
    }

    #[inline]
    pub fn structure(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    #[inline]
    pub fn local(&self, id: LocalId) -> &Local {
        self.func(id.func()).local(id)
    }

    /// Type of the value `id` yields when read: `T` for a storage local of
    /// type `*T`, the declared type otherwise.
    pub fn value_ty(&self, id: LocalId) -> TyId {
        let local = self.local(id);
        if local.is_storage() {
            self.types.pointee(local.ty).unwrap_or(local.ty)
        } else {
            local.ty
        }
    }

    /// Printable name of a type, for error messages.
    #[inline]
    fn ty_name(&self, ty: TyId) -> String {
        self.types.name(ty)
    }

    /// Printable name of a local: its declared name or `%<index>`.
    fn local_name(&self, id: LocalId) -> String {
        match self.local(id).name() {
            Some(name) => name.to_owned(),
            None => format!("%{}", id.index()),
        }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    /// Declare a function. With `with_body`, an entry block is created and
    /// locals may be declared in it.
    ///
    /// Parameters and the return type must be scalars or pointers (or
    /// `void` for the return type); structs are passed by pointer.
    pub fn declare_function(
        &mut self,
        ret: TyId,
        name: &str,
        params: &[(&str, TyId)],
        with_body: bool,
    ) -> Result<FunctionId, CodegenError> {
        let mut ir_params: SmallVec<[IrType; 4]> = SmallVec::with_capacity(params.len());
        for &(_, ty) in params {
            ir_params.push(self.types.to_ir(ty)?);
        }
        let ir_ret = self.types.to_ir(ret)?;
        let id = self.builder.declare_function(name, &ir_params, ir_ret)?;
        let entry = with_body.then(|| self.builder.append_block(id, "entry"));
        let mut param_values: SmallVec<[ValueId; 4]> = SmallVec::new();
        if with_body {
            for (i, &(pname, _)) in params.iter().enumerate() {
                let value = self.builder.param(id, i);
                param_values.push(self.builder.name_value(id, value, pname));
            }
        }
        let param_tys: SmallVec<[TyId; 4]> = params.iter().map(|&(_, ty)| ty).collect();
        debug_assert_eq!(self.funcs.len(), id.index(), "function table out of sync");
        self.funcs
            .push(Func::new(id, name, ret, &param_tys, &param_values, entry));
        debug!(
            %name,
            params = params.len(),
            ret = %self.types.display(ret),
            with_body,
            "declared function"
        );
        Ok(id)
    }

    /// Look up `name`, or declare it without a body.
    ///
    /// An existing function must have the same signature.
    pub fn get_or_declare_function(
        &mut self,
        ret: TyId,
        name: &str,
        params: &[TyId],
    ) -> Result<FunctionId, CodegenError> {
        if let Some(id) = self.function_by_name(name) {
            let func = self.func(id);
            let same = self.types.is_equal(func.ret(), ret)
                && func.param_types().len() == params.len()
                && func
                    .param_types()
                    .iter()
                    .zip(params)
                    .all(|(&a, &b)| self.types.is_equal(a, b));
            if !same {
                error!(%name, "function redeclared with a different signature");
                return Err(CodegenError::SignatureMismatch {
                    name: name.to_owned(),
                });
            }
            return Ok(id);
        }
        let named: SmallVec<[(&str, TyId); 4]> = params.iter().map(|&ty| ("", ty)).collect();
        self.declare_function(ret, name, &named, false)
    }

    #[inline]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.builder.function_by_name(name)
    }

    /// Insert point at the end of `func`'s entry block.
    pub fn entry(&self, func: FunctionId) -> Result<InsertPoint, CodegenError> {
        let f = self.func(func);
        f.entry().ok_or_else(|| {
            error!(func = %f.name(), "no body to insert into");
            CodegenError::MissingBody(f.name().to_owned())
        })
    }

    /// Local bound to parameter `index` of `func`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn param(&self, func: FunctionId, index: usize) -> LocalId {
        self.func(func).param(index)
    }

    /// Call `callee` with `args`. Returns `None` for void callees.
    pub fn call(
        &mut self,
        at: InsertPoint,
        callee: FunctionId,
        args: &[LocalId],
        name: &str,
    ) -> Result<Option<LocalId>, CodegenError> {
        self.check_call(at.func, callee, args)?;
        let mut values: SmallVec<[ValueId; 4]> = SmallVec::with_capacity(args.len());
        for &arg in args {
            let loaded = self.load_value(at, arg, false, "")?;
            values.push(self.local(loaded).value);
        }
        trace!(callee = %self.func(callee).name(), args = args.len(), "call");
        let ret = self.func(callee).ret();
        Ok(self
            .builder
            .call(at, callee, &values, name)
            .map(|value| self.push_value(at.func, value, ret)))
    }

    /// [`call`](Self::call) by callee name.
    pub fn call_by_name(
        &mut self,
        at: InsertPoint,
        callee: &str,
        args: &[LocalId],
        name: &str,
    ) -> Result<Option<LocalId>, CodegenError> {
        let Some(id) = self.function_by_name(callee) else {
            error!(%callee, "call to undeclared function");
            return Err(CodegenError::UnresolvedSymbol(callee.to_owned()));
        };
        self.call(at, id, args, name)
    }

    /// Check argument count, ownership and types of a call from `caller`.
    fn check_call(
        &self,
        caller: FunctionId,
        callee: FunctionId,
        args: &[LocalId],
    ) -> Result<(), CodegenError> {
        let target = self.func(callee);
        if target.param_types().len() != args.len() {
            error!(callee = %target.name(), expected = target.param_types().len(), found = args.len(), "wrong argument count");
            return Err(CodegenError::ArgumentMismatch {
                callee: target.name().to_owned(),
                detail: format!(
                    "expected {} arguments, found {}",
                    target.param_types().len(),
                    args.len()
                ),
            });
        }
        for (i, (&arg, &param)) in args.iter().zip(target.param_types()).enumerate() {
            self.check_owner(caller, arg)?;
            let found = self.value_ty(arg);
            if !self.types.is_equal(found, param) {
                error!(callee = %target.name(), index = i, "argument type mismatch");
                return Err(CodegenError::ArgumentMismatch {
                    callee: target.name().to_owned(),
                    detail: format!(
                        "argument {i} is `{}`, expected `{}`",
                        self.ty_name(found),
                        self.ty_name(param)
                    ),
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    /// Integer constant of type `ty`; `value` is truncated to its width.
    pub fn const_int(
        &mut self,
        func: FunctionId,
        ty: TyId,
        value: u64,
    ) -> Result<LocalId, CodegenError> {
        let TyData::Int { bits, .. } = *self.types.data(ty) else {
            return Err(self.mismatch("an integer type", ty));
        };
        let ir = self.types.scalar(ty)?;
        let value = if bits < 64 {
            value & ((1u64 << bits) - 1)
        } else {
            value
        };
        let v = self.builder.const_int(func, ir, value)?;
        Ok(self.push_value(func, v, ty))
    }

    pub fn const_float(
        &mut self,
        func: FunctionId,
        ty: TyId,
        value: f64,
    ) -> Result<LocalId, CodegenError> {
        if !self.types.is_float(ty) {
            return Err(self.mismatch("a float type", ty));
        }
        let ir = self.types.scalar(ty)?;
        let v = self.builder.const_float(func, ir, value)?;
        Ok(self.push_value(func, v, ty))
    }

    pub fn const_bool(&mut self, func: FunctionId, value: bool) -> Result<LocalId, CodegenError> {
        let v = self.builder.const_int(func, types::I8, u64::from(value))?;
        Ok(self.push_value(func, v, TyId::BOOL))
    }

    /// `u64` constant.
    pub fn const_size(&mut self, func: FunctionId, value: u64) -> Result<LocalId, CodegenError> {
        let v = self.builder.const_int(func, types::I64, value)?;
        Ok(self.push_value(func, v, TyId::SIZE))
    }

    /// Null pointer of pointer type `ty`.
    pub fn const_null(&mut self, func: FunctionId, ty: TyId) -> Result<LocalId, CodegenError> {
        if !self.types.is_pointer(ty) {
            return Err(self.not_a_pointer(ty));
        }
        let v = self.builder.const_null(func)?;
        Ok(self.push_value(func, v, ty))
    }

    /// NUL-terminated string global; the result is a `*u8` in `func`.
    pub fn global_string(
        &mut self,
        func: FunctionId,
        name: &str,
        value: &str,
    ) -> Result<LocalId, CodegenError> {
        let v = self.builder.global_string(func, name, value)?;
        let ty = self.types.byte_ptr();
        Ok(self.push_value(func, v, ty))
    }

    // -----------------------------------------------------------------------
    // Structs
    // -----------------------------------------------------------------------

    /// Declare a struct with the given field types.
    ///
    /// Redeclaring a name with the same fields returns the existing struct.
    pub fn declare_struct(
        &mut self,
        name: &str,
        elements: &[TyId],
    ) -> Result<StructId, CodegenError> {
        if let Some(id) = self.struct_by_name(name) {
            let def = self.structure(id);
            let same = def.elements.len() == elements.len()
                && def
                    .elements
                    .iter()
                    .zip(elements)
                    .all(|(&a, &b)| self.types.is_equal(a, b));
            if !same {
                error!(%name, "struct redeclared with different fields");
                return Err(CodegenError::SignatureMismatch {
                    name: name.to_owned(),
                });
            }
            return Ok(id);
        }
        if let Some(&void) = elements.iter().find(|&&e| self.types.is_void(e)) {
            return Err(self.mismatch("a sized field type", void));
        }
        let fields = elements
            .iter()
            .map(|&e| self.types.to_ir(e))
            .collect::<Result<Vec<IrType>, _>>()?;
        let ir = self.builder.add_struct(name, fields);
        let ty = self.types.structure(name, elements);
        self.types.bind_struct(ty, ir);
        let ptr_ty = self.types.pointer(ty);
        debug_assert_eq!(self.structs.len(), ir.index(), "struct table out of sync");
        self.structs.push(StructDef {
            name: name.to_owned(),
            elements: elements.to_vec(),
            ty,
            ptr_ty,
            ir,
        });
        self.struct_names.insert(name.to_owned(), ir);
        debug!(%name, fields = elements.len(), "declared struct");
        Ok(ir)
    }

    /// Declare member `name` of struct `id` as `<Struct>_<name>`, with an
    /// implicit first parameter `this: *Struct`.
    pub fn declare_member(
        &mut self,
        id: StructId,
        ret: TyId,
        name: &str,
        params: &[(&str, TyId)],
        with_body: bool,
    ) -> Result<FunctionId, CodegenError> {
        let def = self.structure(id);
        let full_name = def.member_name(name);
        let mut all: SmallVec<[(&str, TyId); 4]> = SmallVec::with_capacity(params.len() + 1);
        all.push(("this", def.ptr_ty));
        all.extend_from_slice(params);
        self.declare_function(ret, &full_name, &all, with_body)
    }

    /// Stack slot for a value of struct `id` in `func`.
    pub fn allocate_struct(
        &mut self,
        func: FunctionId,
        id: StructId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        let ty = self.structure(id).ty;
        self.declare_local(func, ty, name, None)
    }

    // -----------------------------------------------------------------------
    // Verification and output
    // -----------------------------------------------------------------------

    pub fn verify_function(&self, func: FunctionId) -> Result<(), CodegenError> {
        drake_ir::verify_function(self.module(), func)?;
        Ok(())
    }

    pub fn verify_module(&self) -> Result<(), CodegenError> {
        drake_ir::verify_module(self.module())?;
        Ok(())
    }

    /// Textual form of the module so far.
    pub fn dump_ir(&self) -> String {
        self.module().to_string()
    }

    /// Finish generation and take the module.
    ///
    /// Fails if an instruction was emitted into a terminated block, or, when
    /// `verify_functions` is set, if the module does not verify.
    pub fn finish(self) -> Result<Module, CodegenError> {
        let CodegenOptions {
            verify_functions,
            dump_ir,
            ..
        } = self.options;
        let module = self.builder.into_module()?;
        if verify_functions {
            drake_ir::verify_module(&module)?;
        }
        if dump_ir {
            eprintln!("{module}");
        }
        debug!(
            module = module.name(),
            instructions = module.instruction_count(),
            "finished module"
        );
        Ok(module)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Register a materialized value of `ty` in `func`.
    pub(crate) fn push_value(&mut self, func: FunctionId, value: ValueId, ty: TyId) -> LocalId {
        self.funcs[func.index()].push(Local::value(value, ty))
    }

    /// Fail unless `local` belongs to `func`.
    fn check_owner(&self, func: FunctionId, local: LocalId) -> Result<(), CodegenError> {
        if local.func() == func {
            return Ok(());
        }
        let err = CodegenError::ForeignLocal {
            local: self.local_name(local),
            owner: self.func(local.func()).name().to_owned(),
            func: self.func(func).name().to_owned(),
        };
        error!(%err, "local used outside its function");
        Err(err)
    }

    fn mismatch(&self, expected: &str, found: TyId) -> CodegenError {
        let err = CodegenError::TypeMismatch {
            expected: expected.to_owned(),
            found: self.ty_name(found),
        };
        error!(%err, "type mismatch");
        err
    }

    /// Fail unless `found` equals `expected`.
    fn expect_ty(&self, expected: TyId, found: TyId) -> Result<(), CodegenError> {
        if self.types.is_equal(expected, found) {
            Ok(())
        } else {
            Err(self.mismatch(&self.ty_name(expected), found))
        }
    }

    fn not_a_pointer(&self, ty: TyId) -> CodegenError {
        let err = CodegenError::NotAPointer {
            ty: self.ty_name(ty),
        };
        error!(%err, "pointer required");
        err
    }
}
