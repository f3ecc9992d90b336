//! Structural verification of function bodies.
//!
//! Every block in the layout must end in a terminator; everything else
//! (operand types, dominance, signatures of calls) is left to Cranelift's
//! own verifier.

use cranelift_codegen::settings;

use crate::ids::FunctionId;
use crate::module::Module;

/// A verifier failure in one function.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("in `{function}`: {message}")]
pub struct VerifyError {
    pub function: String,
    pub message: String,
}

/// Verify one function. Declarations always pass.
pub fn verify_function(module: &Module, id: FunctionId) -> Result<(), VerifyError> {
    let function = module.function(id);
    let Some(body) = function.body() else {
        return Ok(());
    };
    let fail = |message: String| VerifyError {
        function: function.name.clone(),
        message,
    };

    for block in body.layout.blocks() {
        if !function.is_terminated(block) {
            let name = function.block_name(block).unwrap_or("");
            return Err(fail(format!("block {block} {name} has no terminator")));
        }
    }

    let flags = settings::Flags::new(settings::builder());
    cranelift_codegen::verify_function(body, &flags).map_err(|errors| fail(errors.to_string()))
}

/// Verify every function, reporting the first failure.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module
        .functions()
        .try_for_each(|(id, _)| verify_function(module, id))
}
