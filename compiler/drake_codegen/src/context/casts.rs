//! Type casts.

use tracing::{error, trace};

use drake_ir::{BinOp, CastOp, InsertPoint};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::{TyData, TyId};

/// How a cast is carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CastPlan {
    /// Same IR representation; only the semantic type changes.
    Retype,
    Emit(CastOp),
}

impl CodegenCx {
    /// Convert `value` to `target`.
    ///
    /// | From | To | Conversion |
    /// |------|----|------------|
    /// | float | float | `fpext` / `fptrunc` by width |
    /// | int | int | `sext` / `zext` by source signedness, `trunc`, or none at equal width |
    /// | float | int | `fptosi` / `fptoui` by target signedness |
    /// | int | float | `sitofp` / `uitofp` by source signedness |
    /// | int | pointer | `inttoptr` |
    /// | pointer | int | `ptrtoint` |
    /// | pointer | pointer | `bitcast` |
    ///
    /// Casting to an equal type returns the loaded value. Everything else,
    /// including float to pointer, is an error and emits nothing.
    ///
    /// Truncating to an integer narrower than its IR type (`bool`, `u4`)
    /// masks off the bits above the semantic width.
    pub fn type_cast(
        &mut self,
        at: InsertPoint,
        value: LocalId,
        target: TyId,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, value)?;
        let from = self.value_ty(value);
        let plan = self.plan_cast(from, target)?;
        let to = self.types.scalar(target)?;
        let mask = match plan {
            CastPlan::Emit(CastOp::Trunc) => self.narrow_mask(target)?,
            _ => None,
        };

        let loaded = self.load_value(at, value, false, "")?;
        let v = self.local(loaded).value;
        trace!(
            from = %self.types.display(from),
            to = %self.types.display(target),
            ?plan,
            "cast"
        );
        let result = match plan {
            CastPlan::Retype if self.local(loaded).ty == target => return Ok(loaded),
            CastPlan::Retype => v,
            CastPlan::Emit(op) => match mask {
                Some((ir, mask)) => {
                    let narrowed = self.builder.cast(at, op, v, to, "");
                    let mask = self.builder.const_int(at.func, ir, mask)?;
                    self.builder.binary(at, BinOp::And, narrowed, mask, name)
                }
                None => self.builder.cast(at, op, v, to, name),
            },
        };
        Ok(self.push_value(at.func, result, target))
    }

    fn plan_cast(&self, from: TyId, to: TyId) -> Result<CastPlan, CodegenError> {
        if self.types.is_equal(from, to) {
            return Ok(CastPlan::Retype);
        }
        let plan = match (self.types.data(from), self.types.data(to)) {
            (TyData::Float { bits: a }, TyData::Float { bits: b }) => {
                if a < b {
                    Some(CastOp::FpExt)
                } else {
                    Some(CastOp::FpTrunc)
                }
            }
            (TyData::Int { bits: a, signed }, TyData::Int { bits: b, .. }) => match a.cmp(b) {
                std::cmp::Ordering::Less if *signed => Some(CastOp::SExt),
                std::cmp::Ordering::Less => Some(CastOp::ZExt),
                std::cmp::Ordering::Greater => Some(CastOp::Trunc),
                std::cmp::Ordering::Equal => None,
            },
            (TyData::Float { .. }, TyData::Int { signed, .. }) => Some(if *signed {
                CastOp::FpToSi
            } else {
                CastOp::FpToUi
            }),
            (TyData::Int { signed, .. }, TyData::Float { .. }) => Some(if *signed {
                CastOp::SiToFp
            } else {
                CastOp::UiToFp
            }),
            (TyData::Int { .. }, TyData::Pointer(_)) => Some(CastOp::IntToPtr),
            (TyData::Pointer(_), TyData::Int { .. }) => Some(CastOp::PtrToInt),
            (TyData::Pointer(_), TyData::Pointer(_)) => Some(CastOp::BitCast),
            _ => {
                let err = CodegenError::InvalidCast {
                    from: self.ty_name(from),
                    to: self.ty_name(to),
                };
                error!(%err, "invalid cast");
                return Err(err);
            }
        };
        Ok(plan.map_or(CastPlan::Retype, CastPlan::Emit))
    }
}
