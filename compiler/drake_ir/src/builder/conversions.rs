//! Conversion instructions for `IrBuilder`.
//!
//! Float-to-int conversions saturate at 32 or 64 bits and are then
//! truncated. Narrow integers are widened to `i32` before a float
//! conversion, since Cranelift only converts 32 and 64 bit integers.

use cranelift_codegen::cursor::FuncCursor;
use cranelift_codegen::ir::{types, InstBuilder, MemFlags, Type};

use super::IrBuilder;
use crate::ids::InsertPoint;
use crate::ValueId;

/// Value conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpExt,
    FpTrunc,
    FpToSi,
    FpToUi,
    SiToFp,
    UiToFp,
    IntToPtr,
    PtrToInt,
    /// Reinterpret the bits. Same-typed bitcasts (pointer to pointer) emit
    /// nothing.
    BitCast,
}

impl IrBuilder {
    /// Build a conversion of `value` to `to`.
    pub fn cast(
        &mut self,
        at: InsertPoint,
        op: CastOp,
        value: ValueId,
        to: Type,
        name: &str,
    ) -> ValueId {
        let from = self.value_type(at.func, value);
        let mut pos = self.cursor(at);
        let v = match op {
            CastOp::Trunc | CastOp::ZExt | CastOp::SExt | CastOp::IntToPtr | CastOp::PtrToInt => {
                resize(&mut pos, value, from, to, op == CastOp::SExt)
            }
            CastOp::FpExt => pos.ins().fpromote(to, value),
            CastOp::FpTrunc => pos.ins().fdemote(to, value),
            CastOp::FpToSi | CastOp::FpToUi => {
                let signed = op == CastOp::FpToSi;
                let wide = if to.bits() > 32 { types::I64 } else { types::I32 };
                let converted = if signed {
                    pos.ins().fcvt_to_sint_sat(wide, value)
                } else {
                    pos.ins().fcvt_to_uint_sat(wide, value)
                };
                resize(&mut pos, converted, wide, to, signed)
            }
            CastOp::SiToFp | CastOp::UiToFp => {
                let signed = op == CastOp::SiToFp;
                let value = if from.bits() < 32 {
                    resize(&mut pos, value, from, types::I32, signed)
                } else {
                    value
                };
                if signed {
                    pos.ins().fcvt_from_sint(to, value)
                } else {
                    pos.ins().fcvt_from_uint(to, value)
                }
            }
            CastOp::BitCast if from == to => value,
            CastOp::BitCast => pos.ins().bitcast(to, MemFlags::new(), value),
        };
        self.name_value(at.func, v, name)
    }

    pub fn trunc(&mut self, at: InsertPoint, value: ValueId, to: Type, name: &str) -> ValueId {
        self.cast(at, CastOp::Trunc, value, to, name)
    }

    pub fn sext(&mut self, at: InsertPoint, value: ValueId, to: Type, name: &str) -> ValueId {
        self.cast(at, CastOp::SExt, value, to, name)
    }
}

/// Change an integer's width, extending by sign or by zero.
fn resize(pos: &mut FuncCursor<'_>, value: ValueId, from: Type, to: Type, signed: bool) -> ValueId {
    if from.bits() > to.bits() {
        pos.ins().ireduce(to, value)
    } else if from.bits() == to.bits() {
        value
    } else if signed {
        pos.ins().sextend(to, value)
    } else {
        pos.ins().uextend(to, value)
    }
}
