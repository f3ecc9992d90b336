//! Builder, module and JIT errors.

/// Errors raised while assembling or running a module.
///
/// Instruction-level misuse is not reported here: the builder records it
/// (see [`IrBuilder::codegen_error_count`](crate::IrBuilder::codegen_error_count))
/// and [`IrBuilder::into_module`](crate::IrBuilder::into_module) refuses the
/// result.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    #[error("function `{0}` is already declared")]
    DuplicateFunction(String),

    #[error("unknown target triple `{0}`")]
    UnknownTarget(String),

    #[error("`{0}` has no body")]
    MissingBody(String),

    #[error("`{function}` cannot take or return a value of type `{ty}`")]
    UnsupportedSignature { function: String, ty: String },

    #[error("{count} malformed instruction(s) were emitted")]
    MalformedInstructions { count: u32 },

    #[error("jit: {0}")]
    Jit(String),
}
