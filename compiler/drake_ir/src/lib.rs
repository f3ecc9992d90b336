//! Cranelift-backed IR layer for the Drake code generator.
//!
//! This crate is the instruction-emission layer that `drake_codegen` sits on.
//! Function bodies are `cranelift_codegen` IR; this crate adds the pieces a
//! typed front-end needs around it:
//!
//! - **Module** ([`Module`], [`Function`]): named struct layouts, global byte
//!   strings and functions. Declarations carry only a signature; bodies are
//!   `cranelift_codegen::ir::Function`s.
//! - **Builder** ([`IrBuilder`]): ID-based instruction emission. Every
//!   emitting call takes an explicit [`InsertPoint`], so several bodies can
//!   be filled at once.
//! - **Verification** ([`verify_function`], [`verify_module`]): block
//!   termination plus the Cranelift verifier.
//! - **Printing**: `Display for Module` prints Cranelift's textual IR.
//! - **JIT** ([`Jit`]): compiles a finished module for the host with
//!   `cranelift-jit` so generated code can be run in-process.
//!
//! # Debugging
//!
//! - `RUST_LOG=drake_ir=trace` traces every emitted instruction.
//! - `RUST_LOG=drake_ir::jit=debug` traces JIT compilation.

mod builder;
mod error;
mod ids;
pub mod jit;
mod module;
mod target;
mod ir_type;
mod verify;

pub use builder::{BinOp, CastOp, IrBuilder, UnOp};
pub use error::IrError;
pub use ids::{FunctionId, GlobalId, InsertPoint, StructId};
pub use jit::Jit;
pub use module::{Function, Global, Module, StructType};
pub use target::{Endian, TargetDesc};
pub use ir_type::IrType;
pub use verify::{verify_function, verify_module, VerifyError};

pub use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
pub use cranelift_codegen::ir::types;
pub use cranelift_codegen::ir::Type;

/// A basic block inside one function body.
pub type BlockId = cranelift_codegen::ir::Block;

/// An SSA value inside one function body.
pub type ValueId = cranelift_codegen::ir::Value;

#[cfg(test)]
mod tests;
