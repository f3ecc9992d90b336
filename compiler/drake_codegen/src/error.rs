//! Code generation errors.

use drake_ir::{IrError, VerifyError};

/// A violated contract of the code generation API.
///
/// Every variant is detected before the offending operation emits anything,
/// so the module is left as it was before the call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    #[error("cannot cast `{from}` to `{to}`")]
    InvalidCast { from: String, to: String },

    #[error("invalid operands to `{op}`: `{lhs}` and `{rhs}`")]
    InvalidOperands {
        op: &'static str,
        lhs: String,
        rhs: String,
    },

    #[error("operator `{op}` is not supported on `{ty}`")]
    UnsupportedOperator { op: &'static str, ty: String },

    #[error("expected a pointer to a struct, found `{ty}`")]
    NotStructPointer { ty: String },

    #[error("expected a pointer, found `{ty}`")]
    NotAPointer { ty: String },

    #[error("`{local}` is not backed by storage")]
    NotStorage { local: String },

    #[error("`{local}` is backed by storage; load it before deferring a write of it")]
    StorageSource { local: String },

    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("field {index} out of range for struct `{structure}` ({count} fields)")]
    FieldOutOfRange {
        structure: String,
        index: u32,
        count: usize,
    },

    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("bad arguments to `{callee}`: {detail}")]
    ArgumentMismatch { callee: String, detail: String },

    #[error("invalid float width {0} (expected 16, 32 or 64)")]
    InvalidFloatWidth(u32),

    #[error("local `{local}` belongs to `{owner}`, not `{func}`")]
    ForeignLocal {
        local: String,
        owner: String,
        func: String,
    },

    #[error("`{0}` is a declaration and has no body")]
    MissingBody(String),

    #[error("`{name}` is already declared with a different signature")]
    SignatureMismatch { name: String },

    #[error("unknown target triple `{0}`")]
    UnknownTarget(String),

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl CodegenError {
    /// Report the error and exit the process with status 1.
    ///
    /// For hosts that treat any code generation error as fatal:
    /// `cx.type_cast(..).unwrap_or_else(|e| e.abort())`.
    pub fn abort(self) -> ! {
        tracing::error!(error = %self, "fatal code generation error");
        eprintln!("error: {self}");
        std::process::exit(1)
    }
}
