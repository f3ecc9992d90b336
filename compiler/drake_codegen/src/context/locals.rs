//! Locals, loads, stores and the future protocol.

use smallvec::SmallVec;
use tracing::{error, trace};

use drake_ir::{FunctionId, InsertPoint};

use super::CodegenCx;
use crate::error::CodegenError;
use crate::local::{Future, FutureSource, Local, LocalId};
use crate::ty::TyId;

impl CodegenCx {
    /// Declare a named stack slot of type `ty` in `func`.
    ///
    /// The slot is allocated in the entry block. The returned local has type
    /// `*ty`. An `initial` value becomes the slot's pending write; it must be
    /// a materialized value, since a storage local could change before the
    /// write is resolved. A name already taken in `func` is made unique with
    /// a numeric suffix.
    pub fn declare_local(
        &mut self,
        func: FunctionId,
        ty: TyId,
        name: &str,
        initial: Option<LocalId>,
    ) -> Result<LocalId, CodegenError> {
        self.entry(func)?;
        if self.types.is_void(ty) {
            return Err(self.mismatch("a sized type", ty));
        }
        if let Some(init) = initial {
            self.check_owner(func, init)?;
            self.expect_ty(ty, self.value_ty(init))?;
            if self.local(init).is_storage() {
                let err = CodegenError::StorageSource {
                    local: self.local_name(init),
                };
                error!(%err, "initial value is a storage local");
                return Err(err);
            }
        }
        let ir_ty = self.types.to_ir(ty)?;

        let unique = self.func(func).unique_local_name(name);
        let slot = self.builder.entry_alloca(func, ir_ty, &unique)?;
        let ptr_ty = self.types.pointer(ty);
        let f = &mut self.funcs[func.index()];
        let id = f.push(Local::storage(slot, ptr_ty, unique.clone()));
        f.bind(unique, id);
        if let Some(init) = initial {
            f.local_mut(id).future = Future::Pending(FutureSource::Value(init));
        }
        trace!(func = %f.name(), local = id.index(), ty = %self.types.display(ty), "declared local");
        Ok(id)
    }

    /// Local declared under `name` in `func`.
    pub fn lookup_local(&self, func: FunctionId, name: &str) -> Option<LocalId> {
        self.func(func).lookup(name)
    }

    /// Read `local`.
    ///
    /// A storage local, or any pointer-typed local when `force` is set, is
    /// loaded into a new value local. Anything else is returned as is. A
    /// pending write is resolved first.
    pub fn load_value(
        &mut self,
        at: InsertPoint,
        local: LocalId,
        force: bool,
        name: &str,
    ) -> Result<LocalId, CodegenError> {
        self.check_owner(at.func, local)?;
        let l = self.local(local);
        let pointee = if l.is_storage() || force {
            self.types.pointee(l.ty)
        } else {
            None
        };
        let Some(pointee) = pointee else {
            self.resolve(at, local)?;
            return Ok(local);
        };
        let ir_ty = self.types.scalar(pointee)?;

        self.resolve(at, local)?;
        let ptr = self.local(local).value;
        let value = self.builder.load(at, ir_ty, ptr, name);
        Ok(self.push_value(at.func, value, pointee))
    }

    /// Register `value` as the pending write of the storage local `local`.
    ///
    /// `value` is read at `at`, so a later change to it does not reach the
    /// slot. Nothing is stored until the write is resolved, which must
    /// happen at a point `at` dominates. A write already pending is replaced.
    pub fn set_future(
        &mut self,
        at: InsertPoint,
        local: LocalId,
        value: LocalId,
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, local)?;
        self.check_owner(at.func, value)?;
        self.check_storage(local)?;
        self.expect_ty(self.value_ty(local), self.value_ty(value))?;
        let captured = self.load_value(at, value, false, "")?;
        self.replace_future(local, FutureSource::Value(captured));
        Ok(())
    }

    /// Register a call as the pending write of `local`.
    ///
    /// The arguments are read at `at`; the call itself is emitted when the
    /// write is resolved. A void callee is called for its effect and nothing
    /// is stored; otherwise its return type must match the slot.
    pub fn set_future_call(
        &mut self,
        at: InsertPoint,
        local: LocalId,
        callee: FunctionId,
        args: &[LocalId],
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, local)?;
        self.check_storage(local)?;
        self.check_call(at.func, callee, args)?;
        let ret = self.func(callee).ret();
        if !self.types.is_void(ret) {
            self.expect_ty(self.value_ty(local), ret)?;
        }
        let mut captured: SmallVec<[LocalId; 4]> = SmallVec::with_capacity(args.len());
        for &arg in args {
            captured.push(self.load_value(at, arg, false, "")?);
        }
        self.replace_future(
            local,
            FutureSource::Call {
                callee,
                args: captured,
            },
        );
        Ok(())
    }

    /// Perform `local`'s pending write, if any, at `at`.
    pub fn resolve(&mut self, at: InsertPoint, local: LocalId) -> Result<(), CodegenError> {
        self.check_owner(at.func, local)?;
        let Some(source) = self.funcs[at.func.index()].local_mut(local).future.take() else {
            return Ok(());
        };
        let slot = self.local(local).value;
        trace!(local = local.index(), ?source, "resolving future");
        let stored = match source {
            FutureSource::Value(value) => Some(value),
            FutureSource::Call { callee, args } => self.call(at, callee, &args, "")?,
        };
        if let Some(value) = stored {
            let v = self.local(value).value;
            self.builder.store(at, v, slot);
        }
        Ok(())
    }

    /// Address of `local`'s storage as a value local of type `*T`.
    ///
    /// Resolves any pending write first. Value locals are returned as is.
    pub fn get_value_ptr(
        &mut self,
        at: InsertPoint,
        local: LocalId,
    ) -> Result<LocalId, CodegenError> {
        self.resolve(at, local)?;
        let l = self.local(local);
        if !l.is_storage() {
            return Ok(local);
        }
        let (value, ty) = (l.value, l.ty);
        Ok(self.push_value(at.func, value, ty))
    }

    /// Write `value` through the pointer `dest` immediately.
    ///
    /// A write pending on `dest` is performed first so it cannot overwrite
    /// this one later.
    pub fn store(
        &mut self,
        at: InsertPoint,
        dest: LocalId,
        value: LocalId,
    ) -> Result<(), CodegenError> {
        self.check_owner(at.func, dest)?;
        self.check_owner(at.func, value)?;
        let dest_ty = self.local(dest).ty;
        let Some(pointee) = self.types.pointee(dest_ty) else {
            return Err(self.not_a_pointer(dest_ty));
        };
        self.expect_ty(pointee, self.value_ty(value))?;

        self.resolve(at, dest)?;
        let loaded = self.load_value(at, value, false, "")?;
        let (v, ptr) = (self.local(loaded).value, self.local(dest).value);
        self.builder.store(at, v, ptr);
        Ok(())
    }

    fn check_storage(&self, local: LocalId) -> Result<(), CodegenError> {
        if self.local(local).is_storage() {
            return Ok(());
        }
        let err = CodegenError::NotStorage {
            local: self.local_name(local),
        };
        error!(%err, "future on a value local");
        Err(err)
    }

    fn replace_future(&mut self, local: LocalId, source: FutureSource) {
        let l = self.funcs[local.func().index()].local_mut(local);
        if l.future.is_pending() {
            trace!(local = local.index(), "replacing pending future");
        }
        l.future = Future::Pending(source);
    }
}
