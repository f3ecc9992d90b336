//! In-process execution of a finished module.
//!
//! Every function and global is declared with `cranelift-module` in
//! arena order, so the `FuncId`/`DataId` the JIT hands out equal the
//! [`FunctionId`](crate::FunctionId) and [`GlobalId`](crate::GlobalId)
//! indices the bodies refer to.
//! Declarations are imports: they resolve to symbols registered with
//! [`Jit::with_symbols`], falling back to the host process (`malloc`,
//! `free`, `memcpy`).

use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{DataDescription, FuncId, Linkage, Module as _};
use rustc_hash::FxHashMap;

use crate::error::IrError;
use crate::module::Module;

/// A module compiled to native code in this process.
pub struct Jit {
    module: JITModule,
    functions: FxHashMap<String, FuncId>,
}

impl Jit {
    /// Compile `module` for the host.
    pub fn new(module: &Module) -> Result<Self, IrError> {
        Self::with_symbols(module, &[])
    }

    /// Compile `module`, resolving the named declarations to `symbols`
    /// instead of the host's.
    pub fn with_symbols(module: &Module, symbols: &[(&str, *const u8)]) -> Result<Self, IrError> {
        let isa = host_isa()?;
        let target = module.target();
        if isa.default_call_conv() != target.call_conv()
            || isa.pointer_type() != target.pointer_type()
        {
            return Err(IrError::Jit(format!(
                "module targets `{}`, which is not the host",
                target.triple()
            )));
        }

        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for &(name, ptr) in symbols {
            builder.symbol(name, ptr);
        }
        let mut jit = JITModule::new(builder);
        let err = |e: cranelift_module::ModuleError| IrError::Jit(e.to_string());

        let mut functions = FxHashMap::default();
        for (id, function) in module.functions() {
            let linkage = if function.is_declaration() {
                Linkage::Import
            } else {
                Linkage::Export
            };
            let func_id = jit
                .declare_function(&function.name, linkage, function.signature())
                .map_err(err)?;
            check_index(func_id.as_u32(), id.raw(), &function.name)?;
            functions.insert(function.name.clone(), func_id);
        }

        for (id, global) in module.globals() {
            let data_id = jit
                .declare_data(&global.name, Linkage::Local, false, false)
                .map_err(err)?;
            check_index(data_id.as_u32(), id.raw(), &global.name)?;
            let mut description = DataDescription::new();
            description.define(global.bytes.clone().into_boxed_slice());
            jit.define_data(data_id, &description).map_err(err)?;
        }

        let mut ctx = jit.make_context();
        for (id, function) in module.functions() {
            let Some(body) = function.body() else {
                continue;
            };
            ctx.func = body.clone();
            jit.define_function(functions[&function.name], &mut ctx)
                .map_err(|e| IrError::Jit(format!("`{}`: {e:?}", function.name)))?;
            jit.clear_context(&mut ctx);
            tracing::debug!(func = %function.name, id = id.raw(), "jit compiled");
        }
        jit.finalize_definitions().map_err(err)?;

        Ok(Self {
            module: jit,
            functions,
        })
    }

    /// Address of the compiled code of `name`, if it is a defined function.
    pub fn function_ptr(&self, name: &str) -> Option<*const u8> {
        let &id = self.functions.get(name)?;
        let declared = self.module.declarations().get_function_decl(id);
        (declared.linkage == Linkage::Export).then(|| self.module.get_finalized_function(id))
    }

    /// The compiled function `name` as a function pointer of type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type matching the
    /// function's signature.
    #[allow(unsafe_code)]
    pub unsafe fn get<F: Copy>(&self, name: &str) -> Option<F> {
        assert_eq!(
            std::mem::size_of::<F>(),
            std::mem::size_of::<*const u8>(),
            "`F` must be a function pointer"
        );
        let ptr = self.function_ptr(name)?;
        // SAFETY: the caller guarantees `F` is a function pointer type
        // matching the compiled signature, and the sizes agree.
        Some(unsafe { std::mem::transmute_copy::<*const u8, F>(&ptr) })
    }
}

impl std::fmt::Debug for Jit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jit")
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

fn host_isa() -> Result<OwnedTargetIsa, IrError> {
    let mut flags = settings::builder();
    for (flag, value) in [("use_colocated_libcalls", "false"), ("is_pic", "false")] {
        flags
            .set(flag, value)
            .map_err(|e| IrError::Jit(e.to_string()))?;
    }
    let isa = cranelift_native::builder().map_err(|e| IrError::Jit(e.to_owned()))?;
    isa.finish(settings::Flags::new(flags))
        .map_err(|e| IrError::Jit(e.to_string()))
}

/// Bodies refer to functions and globals by arena index; the JIT must
/// hand out the same numbers.
fn check_index(jit_index: u32, module_index: u32, name: &str) -> Result<(), IrError> {
    if jit_index == module_index {
        Ok(())
    } else {
        Err(IrError::Jit(format!(
            "`{name}` was numbered {jit_index} by the JIT but is {module_index} in the module"
        )))
    }
}
