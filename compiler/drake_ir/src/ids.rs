//! Opaque ID newtypes for module-level entities.
//!
//! Functions, struct layouts and globals are stored in arena `Vec`s and
//! referenced by `Copy` handles wrapping a `u32` index. Values and blocks
//! are Cranelift entities local to one body.

use std::fmt;

use crate::BlockId;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Create an ID for the next slot of an arena of length `len`.
            pub(crate) fn from_len(len: usize) -> Self {
                Self(
                    u32::try_from(len)
                        .unwrap_or_else(|_| panic!(concat!($what, " count exceeds u32::MAX"))),
                )
            }
        }
    };
}

arena_id!(
    /// A function (declaration or definition) inside a module. Doubles as
    /// the function's index in the JIT's symbol namespace.
    FunctionId,
    "function"
);

arena_id!(
    /// A named struct layout inside a module.
    StructId,
    "struct"
);

arena_id!(
    /// A global byte string inside a module.
    GlobalId,
    "global"
);

/// Where an instruction is appended: the end of `block` in `func`.
///
/// Threaded explicitly through every emitting call instead of living as
/// builder state, so two functions can be under construction at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InsertPoint {
    pub func: FunctionId,
    pub block: BlockId,
}

impl InsertPoint {
    #[inline]
    pub fn new(func: FunctionId, block: BlockId) -> Self {
        Self { func, block }
    }

    /// Same function, different block.
    #[inline]
    #[must_use]
    pub fn at_block(self, block: BlockId) -> Self {
        Self {
            func: self.func,
            block,
        }
    }
}

impl fmt::Display for InsertPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}:{}", self.func.raw(), self.block)
    }
}
