//! Binary and unary operators.
//!
//! Operands must have equal integer or float value types; pointers and
//! structs never take part in arithmetic. The emitted instruction is chosen
//! from the operand type:
//!
//! | Operator | Float | Signed int | Unsigned int | Result |
//! |----------|-------|------------|--------------|--------|
//! | `+ - *` | `fadd` ... | `add` ... | `add` ... | operand type |
//! | `/` | `fdiv` | `sitofp` + `fdiv` | `uitofp` + `fdiv` | `f64` |
//! | `%` | `frem` | `srem` | `urem` | operand type |
//! | `& \| ^ <<` | error | `and` ... | `and` ... | operand type |
//! | `>>` | error | `ashr` | `lshr` | operand type |
//! | `== != < <= > >=` | `fcmp` ordered | `icmp s*` | `icmp u*` | `bool` |
//!
//! Integers narrower than their IR type (`bool` lives in an `i8`) are kept
//! zero-extended: `~` on them flips only the semantic bits.

use std::fmt;

use tracing::{error, trace};

use drake_ir::{types, BinOp, CastOp, FloatCC, InsertPoint, IntCC, UnOp, ValueId};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::{TyData, TyId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Always floating-point division yielding `f64`.
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    #[inline]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Operators defined only on integers.
    #[inline]
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation. An unsigned operand yields the signed type of
    /// the same width.
    Neg,
    /// Bitwise complement of an integer.
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "~",
        }
    }
}

/// Scalar class of an operand type.
#[derive(Clone, Copy)]
enum Operand {
    Float(u32),
    Int { signed: bool },
}

impl CodegenCx {
    /// Emit `lhs op rhs`.
    pub fn binary_op(
        &mut self,
        at: InsertPoint,
        op: BinaryOp,
        lhs: LocalId,
        rhs: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, lhs)?;
        self.check_owner(at.func, rhs)?;
        let (lty, rty) = (self.value_ty(lhs), self.value_ty(rhs));
        if !self.types.is_valid_rhs(lty, rty) {
            let err = CodegenError::InvalidOperands {
                op: op.symbol(),
                lhs: self.ty_name(lty),
                rhs: self.ty_name(rty),
            };
            error!(%err, "invalid binary operands");
            return Err(err);
        }
        let operand = match *self.types.data(lty) {
            TyData::Float { bits } => Operand::Float(bits),
            TyData::Int { signed, .. } => Operand::Int { signed },
            _ => unreachable!("is_valid_rhs admits only integers and floats"),
        };
        if op.is_bitwise() && matches!(operand, Operand::Float(_)) {
            return Err(self.unsupported(op.symbol(), lty));
        }
        self.types.scalar(lty)?;

        let l = self.load_value(at, lhs, false, "")?;
        let r = self.load_value(at, rhs, false, "")?;
        let (l, r) = (self.local(l).value, self.local(r).value);
        trace!(op = %op, ty = %self.types.display(lty), "binary op");

        if op.is_comparison() {
            let value = match operand {
                Operand::Float(_) => self.builder.fcmp(at, float_cond(op), l, r, name),
                Operand::Int { signed } => self.builder.icmp(at, int_cond(op, signed), l, r, name),
            };
            return Ok(self.push_value(at.func, value, TyId::BOOL));
        }

        if op == BinaryOp::Div {
            let (l, r) = (
                self.to_f64(at, l, operand),
                self.to_f64(at, r, operand),
            );
            let value = self.builder.binary(at, BinOp::FDiv, l, r, name);
            let f64_ty = self.types.intern(TyData::Float { bits: 64 });
            return Ok(self.push_value(at.func, value, f64_ty));
        }

        let bin = match (op, operand) {
            (BinaryOp::Add, Operand::Float(_)) => BinOp::FAdd,
            (BinaryOp::Sub, Operand::Float(_)) => BinOp::FSub,
            (BinaryOp::Mul, Operand::Float(_)) => BinOp::FMul,
            (BinaryOp::Rem, Operand::Float(_)) => BinOp::FRem,
            (BinaryOp::Add, Operand::Int { .. }) => BinOp::Add,
            (BinaryOp::Sub, Operand::Int { .. }) => BinOp::Sub,
            (BinaryOp::Mul, Operand::Int { .. }) => BinOp::Mul,
            (BinaryOp::Rem, Operand::Int { signed: true }) => BinOp::SRem,
            (BinaryOp::Rem, Operand::Int { signed: false }) => BinOp::URem,
            (BinaryOp::And, _) => BinOp::And,
            (BinaryOp::Or, _) => BinOp::Or,
            (BinaryOp::Xor, _) => BinOp::Xor,
            (BinaryOp::Shl, _) => BinOp::Shl,
            (BinaryOp::Shr, Operand::Int { signed: true }) => BinOp::AShr,
            (BinaryOp::Shr, _) => BinOp::LShr,
            (BinaryOp::Div | BinaryOp::Eq | BinaryOp::Ne, _)
            | (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, _) => {
                unreachable!("handled above")
            }
        };
        let value = self.builder.binary(at, bin, l, r, name);
        Ok(self.push_value(at.func, value, lty))
    }

    /// Emit `op expr`.
    pub fn unary_op(
        &mut self,
        at: InsertPoint,
        op: UnaryOp,
        expr: LocalId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, expr)?;
        let ty = self.value_ty(expr);
        let int_bits = match self.types.data(ty) {
            TyData::Int { bits, .. } => Some(*bits),
            _ => None,
        };
        let (un, result) = match (op, int_bits) {
            (UnaryOp::Neg, None) if self.types.is_float(ty) => (UnOp::FNeg, ty),
            (UnaryOp::Neg, Some(bits)) => (UnOp::Neg, self.types.signed_int(bits)),
            (UnaryOp::Not, Some(_)) => (UnOp::Not, ty),
            _ => return Err(self.unsupported(op.symbol(), ty)),
        };
        let narrow = self.narrow_mask(ty)?;
        let v = self.load_value(at, expr, false, "")?;
        let v = self.local(v).value;
        trace!(op = op.symbol(), ty = %self.types.display(ty), "unary op");
        let value = match (un, narrow) {
            (UnOp::Not, Some((ir, mask))) => {
                let mask = self.builder.const_int(at.func, ir, mask)?;
                self.builder.binary(at, BinOp::Xor, v, mask, name)
            }
            _ => self.builder.unary(at, un, v, name),
        };
        Ok(self.push_value(at.func, value, result))
    }

    /// IR type and semantic-width mask of an integer type that is narrower
    /// than its IR representation.
    pub(super) fn narrow_mask(
        &self,
        ty: TyId,
    ) -> Result<Option<(drake_ir::Type, u64)>, CodegenError> {
        let TyData::Int { bits, .. } = *self.types.data(ty) else {
            return Ok(None);
        };
        let ir = self.types.scalar(ty)?;
        Ok((bits < ir.bits() && bits < 64).then(|| (ir, (1u64 << bits) - 1)))
    }

    /// Convert an operand of class `operand` to `f64`.
    fn to_f64(&mut self, at: InsertPoint, value: ValueId, operand: Operand) -> ValueId {
        let op = match operand {
            Operand::Float(64) => return value,
            Operand::Float(_) => CastOp::FpExt,
            Operand::Int { signed: true } => CastOp::SiToFp,
            Operand::Int { signed: false } => CastOp::UiToFp,
        };
        self.builder.cast(at, op, value, types::F64, "")
    }

    fn unsupported(&self, op: &'static str, ty: TyId) -> CodegenError {
        let err = CodegenError::UnsupportedOperator {
            op,
            ty: self.ty_name(ty),
        };
        error!(%err, "unsupported operator");
        err
    }
}

fn float_cond(op: BinaryOp) -> FloatCC {
    match op {
        BinaryOp::Eq => FloatCC::Equal,
        BinaryOp::Ne => FloatCC::OrderedNotEqual,
        BinaryOp::Lt => FloatCC::LessThan,
        BinaryOp::Le => FloatCC::LessThanOrEqual,
        BinaryOp::Gt => FloatCC::GreaterThan,
        _ => FloatCC::GreaterThanOrEqual,
    }
}

fn int_cond(op: BinaryOp, signed: bool) -> IntCC {
    match (op, signed) {
        (BinaryOp::Eq, _) => IntCC::Equal,
        (BinaryOp::Ne, _) => IntCC::NotEqual,
        (BinaryOp::Lt, true) => IntCC::SignedLessThan,
        (BinaryOp::Le, true) => IntCC::SignedLessThanOrEqual,
        (BinaryOp::Gt, true) => IntCC::SignedGreaterThan,
        (BinaryOp::Ge, true) => IntCC::SignedGreaterThanOrEqual,
        (BinaryOp::Lt, false) => IntCC::UnsignedLessThan,
        (BinaryOp::Le, false) => IntCC::UnsignedLessThanOrEqual,
        (BinaryOp::Gt, false) => IntCC::UnsignedGreaterThan,
        _ => IntCC::UnsignedGreaterThanOrEqual,
    }
}
