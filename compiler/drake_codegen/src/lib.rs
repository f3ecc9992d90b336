//! Typed code generation over `drake_ir`.
//!
//! This crate lets a front-end emit typed, structured IR without tracking raw
//! IR values and types at every call site. It adds semantic types with
//! signedness, storage-backed locals with deferred writes, struct and member
//! function wrappers, and a generator for growable arrays.
//!
//! # Architecture
//!
//! - **Types** ([`TypeRegistry`], [`TyId`]): interned semantic types. Two
//!   requests for the same structural type return the same `TyId`.
//! - **Locals** ([`Local`], [`LocalId`]): a raw IR value plus its semantic
//!   type and an optional pending write ([`Future`]).
//! - **Functions** ([`Func`]): parameters and the named locals of one body.
//! - **Structs** ([`StructDef`]): record types and their member functions.
//! - **Context** ([`CodegenCx`]): owns all of the above and the module under
//!   construction; operators, casts, field access and control flow live here.
//! - **Arrays** ([`Array`]): synthesizes a growable array type and its
//!   sixteen member functions for any element type.
//!
//! Every emitting call takes an explicit [`InsertPoint`]. Contract
//! violations are returned as [`CodegenError`] and are detected before any
//! instruction is emitted, so a failed call leaves the module unchanged.
//!
//! # Debug Environment Variables
//!
//! - `DRAKE_TARGET`: target triple to generate for (default: host).
//! - `DRAKE_VERIFY`: set to `0` to skip verification in [`CodegenCx::finish`].
//! - `DRAKE_DUMP_IR`: print the finished module to stderr.
//! - `RUST_LOG=drake_codegen=debug`: declaration and synthesis milestones.
//! - `RUST_LOG=drake_codegen=trace`: every emitted operation.
//!
//! # Example
//!
//! ```ignore
//! use drake_codegen::{BinaryOp, CodegenCx, CodegenOptions};
//!
//! let mut cx = CodegenCx::new("demo", CodegenOptions::default())?;
//! let i32_ty = cx.types_mut().signed_int(32);
//! let add = cx.declare_function(i32_ty, "add", &[("a", i32_ty), ("b", i32_ty)], true)?;
//! let at = cx.entry(add)?;
//! let (a, b) = (cx.param(add, 0), cx.param(add, 1));
//! let sum = cx.binary_op(at, BinaryOp::Add, a, b, "sum")?;
//! cx.ret(at, sum)?;
//! let module = cx.finish()?;
//!
//! // Run it in-process.
//! let jit = drake_ir::Jit::new(&module)?;
//! let add = unsafe { jit.get::<extern "C" fn(i32, i32) -> i32>("add") };
//! ```

#![allow(
    // IR indices are u32, layout math is u64, host sizes are usize
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    // Emitting calls thread the insert point, operands and a value name
    clippy::too_many_arguments,
)]

mod array;
mod context;
mod error;
mod func;
mod local;
mod options;
mod structs;
mod ty;

use std::sync::Once;

pub use array::{Array, ArrayMethods};
pub use context::{BinaryOp, CodegenCx, UnaryOp};
pub use error::CodegenError;
pub use func::Func;
pub use local::{Future, FutureSource, Local, LocalId, LocalKind};
pub use options::CodegenOptions;
pub use structs::StructDef;
pub use ty::{TyData, TyId, TypeRegistry};

pub use drake_ir::{BlockId, FunctionId, InsertPoint, Module, StructId};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[cfg(test)]
mod tests;
