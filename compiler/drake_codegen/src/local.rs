//! Locals: semantic values with an optional pending write.
//!
//! A [`Local`] pairs a raw IR value with its semantic type. Storage-backed
//! locals (stack slots) have type `*T` and yield a `T` when read; value
//! locals are already materialized.
//!
//! A storage local may carry a [`Future`]: a value or a call whose result has
//! not been written to the slot yet. Every read of the slot resolves the
//! future first, so a pending write is always observed before the value is
//! read. Sources are captured when the write is registered: a pending value
//! and the arguments of a pending call are always value locals, never slots
//! that could change in between.

use smallvec::SmallVec;

use drake_ir::{FunctionId, ValueId};

use crate::ty::TyId;

/// Handle to a [`Local`]: the owning function and an index into its locals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalId {
    func: FunctionId,
    index: u32,
}

impl LocalId {
    #[inline]
    pub(crate) fn new(func: FunctionId, index: u32) -> Self {
        Self { func, index }
    }

    /// Function that owns this local.
    #[inline]
    pub fn func(self) -> FunctionId {
        self.func
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalKind {
    /// Backed by a stack slot; the local's type is `*T` and reads load a `T`.
    Storage,
    /// An already-materialized value.
    Value,
}

/// Where a pending write gets its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FutureSource {
    /// Store this value local.
    Value(LocalId),
    /// Call `callee` with the value locals `args`; store the result unless
    /// it is void.
    Call {
        callee: FunctionId,
        args: SmallVec<[LocalId; 4]>,
    },
}

/// Deferred write state of a local.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Future {
    /// Nothing pending; storage holds the current value.
    #[default]
    Materialized,
    Pending(FutureSource),
}

impl Future {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Future::Pending(_))
    }

    /// Take the pending source, leaving `Materialized`.
    pub(crate) fn take(&mut self) -> Option<FutureSource> {
        match std::mem::take(self) {
            Future::Pending(source) => Some(source),
            Future::Materialized => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub(crate) value: ValueId,
    pub(crate) ty: TyId,
    pub(crate) kind: LocalKind,
    pub(crate) future: Future,
    /// Name in the owning function's local table, if declared by name.
    pub(crate) name: Option<String>,
}

impl Local {
    pub(crate) fn value(value: ValueId, ty: TyId) -> Self {
        Self {
            value,
            ty,
            kind: LocalKind::Value,
            future: Future::Materialized,
            name: None,
        }
    }

    pub(crate) fn storage(slot: ValueId, ptr_ty: TyId, name: String) -> Self {
        Self {
            value: slot,
            ty: ptr_ty,
            kind: LocalKind::Storage,
            future: Future::Materialized,
            name: Some(name),
        }
    }

    /// Raw IR value: the slot address for storage locals.
    #[inline]
    pub fn ir_value(&self) -> ValueId {
        self.value
    }

    /// Declared type; `*T` for storage locals.
    #[inline]
    pub fn ty(&self) -> TyId {
        self.ty
    }

    #[inline]
    pub fn kind(&self) -> LocalKind {
        self.kind
    }

    #[inline]
    pub fn is_storage(&self) -> bool {
        self.kind == LocalKind::Storage
    }

    #[inline]
    pub fn future(&self) -> &Future {
        &self.future
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
