//! Target description: triple, pointer width, endianness, data layout and
//! calling convention.
//!
//! Only the properties the IR needs for layout and signatures are modelled.
//! The triple is validated by architecture prefix; vendor/OS/ABI components
//! are kept verbatim and only consulted for the calling convention.

use cranelift_codegen::ir::{types, Type};
use cranelift_codegen::isa::CallConv;

use crate::error::IrError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

/// A code-generation target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    triple: String,
    pointer_bytes: u32,
    endian: Endian,
}

/// Architecture prefixes and their (pointer bytes, endianness).
const ARCHES: &[(&str, u32, Endian)] = &[
    ("x86_64", 8, Endian::Little),
    ("amd64", 8, Endian::Little),
    ("aarch64_be", 8, Endian::Big),
    ("aarch64", 8, Endian::Little),
    ("arm64", 8, Endian::Little),
    ("riscv64", 8, Endian::Little),
    ("powerpc64le", 8, Endian::Little),
    ("powerpc64", 8, Endian::Big),
    ("s390x", 8, Endian::Big),
    ("mips64el", 8, Endian::Little),
    ("mips64", 8, Endian::Big),
    ("loongarch64", 8, Endian::Little),
    ("wasm64", 8, Endian::Little),
    ("wasm32", 4, Endian::Little),
    ("i386", 4, Endian::Little),
    ("i586", 4, Endian::Little),
    ("i686", 4, Endian::Little),
    ("x86", 4, Endian::Little),
    ("armv7", 4, Endian::Little),
    ("thumbv7", 4, Endian::Little),
    ("arm", 4, Endian::Little),
    ("riscv32", 4, Endian::Little),
    ("powerpc", 4, Endian::Big),
    ("mipsel", 4, Endian::Little),
    ("mips", 4, Endian::Big),
];

impl TargetDesc {
    /// Look up a target by triple.
    ///
    /// The architecture component (everything before the first `-`) must be
    /// a known architecture; `armv7a` and similar sub-architectures match by
    /// prefix.
    pub fn from_triple(triple: &str) -> Result<Self, IrError> {
        let arch = triple.split('-').next().unwrap_or_default();
        let Some(&(_, pointer_bytes, endian)) = ARCHES
            .iter()
            .find(|(prefix, _, _)| !arch.is_empty() && arch.starts_with(prefix))
        else {
            return Err(IrError::UnknownTarget(triple.to_owned()));
        };
        Ok(Self {
            triple: triple.to_owned(),
            pointer_bytes,
            endian,
        })
    }

    /// The target the compiler itself runs on.
    pub fn host() -> Self {
        let triple = format!(
            "{}-unknown-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        );
        Self::from_triple(&triple).unwrap_or_else(|_| {
            tracing::warn!(%triple, "unrecognized host architecture, assuming 64-bit little endian");
            Self {
                triple,
                pointer_bytes: 8,
                endian: Endian::Little,
            }
        })
    }

    #[inline]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Size of a pointer in bytes.
    #[inline]
    pub fn pointer_bytes(&self) -> u32 {
        self.pointer_bytes
    }

    /// Integer type pointers are represented with.
    #[inline]
    pub fn pointer_type(&self) -> Type {
        if self.pointer_bytes == 4 {
            types::I32
        } else {
            types::I64
        }
    }

    /// Default C calling convention of the target.
    pub fn call_conv(&self) -> CallConv {
        let arch = self.triple.split('-').next().unwrap_or_default();
        let apple = ["apple", "darwin", "macos", "ios"]
            .iter()
            .any(|os| self.triple.contains(os));
        if (arch.starts_with("aarch64") || arch.starts_with("arm64")) && apple {
            CallConv::AppleAarch64
        } else if self.triple.contains("windows") {
            CallConv::WindowsFastcall
        } else {
            CallConv::SystemV
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// LLVM-style data layout string describing this target.
    pub fn data_layout(&self) -> String {
        let e = match self.endian {
            Endian::Little => "e",
            Endian::Big => "E",
        };
        let p = self.pointer_bytes * 8;
        format!("{e}-p:{p}:{p}-i1:8-i8:8-i16:16-i32:32-i64:64-f16:16-f32:32-f64:64-n8:16:32:64-S128")
    }
}

impl Default for TargetDesc {
    fn default() -> Self {
        Self::host()
    }
}
