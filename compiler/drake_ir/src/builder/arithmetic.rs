//! Arithmetic, bitwise and comparison instructions for `IrBuilder`.
//!
//! Operand types are not checked here; the verifier rejects mismatches.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::InstBuilder;

use super::IrBuilder;
use crate::ids::InsertPoint;
use crate::ValueId;

/// Two-operand operations. The result has the type of both operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    /// Remainder truncated toward zero, with the sign of the dividend.
    FRem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
}

/// One-operand operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    FNeg,
    Not,
}

impl IrBuilder {
    /// Build a two-operand instruction.
    pub fn binary(
        &mut self,
        at: InsertPoint,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> ValueId {
        let mut pos = self.cursor(at);
        let v = match op {
            BinOp::Add => pos.ins().iadd(lhs, rhs),
            BinOp::Sub => pos.ins().isub(lhs, rhs),
            BinOp::Mul => pos.ins().imul(lhs, rhs),
            BinOp::SDiv => pos.ins().sdiv(lhs, rhs),
            BinOp::UDiv => pos.ins().udiv(lhs, rhs),
            BinOp::SRem => pos.ins().srem(lhs, rhs),
            BinOp::URem => pos.ins().urem(lhs, rhs),
            BinOp::FAdd => pos.ins().fadd(lhs, rhs),
            BinOp::FSub => pos.ins().fsub(lhs, rhs),
            BinOp::FMul => pos.ins().fmul(lhs, rhs),
            BinOp::FDiv => pos.ins().fdiv(lhs, rhs),
            BinOp::FRem => {
                // lhs - trunc(lhs / rhs) * rhs
                let quotient = pos.ins().fdiv(lhs, rhs);
                let whole = pos.ins().trunc(quotient);
                let product = pos.ins().fmul(whole, rhs);
                pos.ins().fsub(lhs, product)
            }
            BinOp::And => pos.ins().band(lhs, rhs),
            BinOp::Or => pos.ins().bor(lhs, rhs),
            BinOp::Xor => pos.ins().bxor(lhs, rhs),
            BinOp::Shl => pos.ins().ishl(lhs, rhs),
            BinOp::AShr => pos.ins().sshr(lhs, rhs),
            BinOp::LShr => pos.ins().ushr(lhs, rhs),
        };
        self.name_value(at.func, v, name)
    }

    /// Build a one-operand instruction. The result has the operand's type.
    pub fn unary(&mut self, at: InsertPoint, op: UnOp, operand: ValueId, name: &str) -> ValueId {
        let mut pos = self.cursor(at);
        let v = match op {
            UnOp::Neg => pos.ins().ineg(operand),
            UnOp::FNeg => pos.ins().fneg(operand),
            UnOp::Not => pos.ins().bnot(operand),
        };
        self.name_value(at.func, v, name)
    }

    /// Build an integer or pointer comparison yielding an `i8` of 0 or 1.
    pub fn icmp(
        &mut self,
        at: InsertPoint,
        cond: IntCC,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> ValueId {
        let v = self.cursor(at).ins().icmp(cond, lhs, rhs);
        self.name_value(at.func, v, name)
    }

    /// Build a float comparison yielding an `i8` of 0 or 1.
    pub fn fcmp(
        &mut self,
        at: InsertPoint,
        cond: FloatCC,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> ValueId {
        let v = self.cursor(at).ins().fcmp(cond, lhs, rhs);
        self.name_value(at.func, v, name)
    }
}
