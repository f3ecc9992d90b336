//! Interned semantic types.
//!
//! Every type is stored once in the [`TypeRegistry`] and referred to by a
//! [`TyId`]. Interning is structural: asking for the same shape twice returns
//! the same ID, so most equality checks are an integer compare. Aliases are
//! the exception: an alias has its own ID but [`TypeRegistry::is_equal`]
//! treats it as its underlying type.
//!
//! Unlike [`IrType`], semantic integers carry a signedness flag and pointers
//! know their pointee. [`TypeRegistry::to_ir`] erases both: integers become
//! the smallest Cranelift integer that holds them (`bool` is an `i8`) and
//! pointers become the target's pointer-sized integer.

use std::fmt;

use rustc_hash::FxHashMap;

use drake_ir::{types, IrType, StructId, Type};

use crate::error::CodegenError;

/// Handle to an interned type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TyId(u32);

impl TyId {
    /// `void`, pre-interned.
    pub const VOID: TyId = TyId(0);
    /// `bool` (`Int { bits: 1, signed: false }`), pre-interned.
    pub const BOOL: TyId = TyId(1);
    /// `u64`, the size and index type, pre-interned.
    pub const SIZE: TyId = TyId(2);

    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of a semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TyData {
    Void,
    Int { bits: u32, signed: bool },
    /// IEEE float of 16, 32 or 64 bits.
    Float { bits: u32 },
    Pointer(TyId),
    /// Named record; field order defines field indices.
    Struct { name: String, elements: Box<[TyId]> },
    /// A second name for `underlying`.
    Alias { name: String, underlying: TyId },
}

/// Owns every type of one code generation context.
pub struct TypeRegistry {
    /// Map from type shape to ID for deduplication.
    map: FxHashMap<TyData, TyId>,
    /// Storage for type data, indexed by `TyId`.
    types: Vec<TyData>,
    /// IR struct backing each declared struct type.
    struct_ir: FxHashMap<TyId, StructId>,
    pointer_bytes: u32,
}

impl TypeRegistry {
    /// Create a registry for a target with `pointer_bytes`-byte pointers.
    pub fn new(pointer_bytes: u32) -> Self {
        let mut registry = Self {
            map: FxHashMap::default(),
            types: Vec::with_capacity(64),
            struct_ir: FxHashMap::default(),
            pointer_bytes,
        };
        // Pre-intern at the indices of the `TyId` constants.
        let void = registry.intern(TyData::Void);
        let bool_ = registry.intern(TyData::Int {
            bits: 1,
            signed: false,
        });
        let size = registry.intern(TyData::Int {
            bits: 64,
            signed: false,
        });
        debug_assert_eq!((void, bool_, size), (TyId::VOID, TyId::BOOL, TyId::SIZE));
        registry
    }

    /// Return the ID of `data`, storing it on first request.
    ///
    /// Crate-private: a struct shape interned here has no IR layout until
    /// [`CodegenCx::declare_struct`](crate::CodegenCx::declare_struct) binds
    /// one.
    pub(crate) fn intern(&mut self, data: TyData) -> TyId {
        if let Some(&id) = self.map.get(&data) {
            return id;
        }
        let id = TyId(
            u32::try_from(self.types.len())
                .unwrap_or_else(|_| panic!("type count exceeds u32::MAX")),
        );
        tracing::trace!(id = id.raw(), ?data, "interned type");
        self.types.push(data.clone());
        self.map.insert(data, id);
        id
    }

    /// Shape of `id`.
    #[inline]
    pub fn get(&self, id: TyId) -> &TyData {
        &self.types[id.index()]
    }

    /// Number of distinct types.
    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // -- Constructors --

    #[inline]
    pub fn void(&self) -> TyId {
        TyId::VOID
    }

    #[inline]
    pub fn bool(&self) -> TyId {
        TyId::BOOL
    }

    /// `u64`.
    #[inline]
    pub fn size(&self) -> TyId {
        TyId::SIZE
    }

    /// Unsigned integer of `bits` bits.
    pub fn int(&mut self, bits: u32) -> TyId {
        debug_assert!(bits > 0, "zero-width integer");
        self.intern(TyData::Int {
            bits,
            signed: false,
        })
    }

    pub fn signed_int(&mut self, bits: u32) -> TyId {
        debug_assert!(bits > 0, "zero-width integer");
        self.intern(TyData::Int { bits, signed: true })
    }

    /// Float of 16, 32 or 64 bits.
    pub fn float(&mut self, bits: u32) -> Result<TyId, CodegenError> {
        match bits {
            16 | 32 | 64 => Ok(self.intern(TyData::Float { bits })),
            _ => {
                tracing::error!(bits, "invalid float width");
                Err(CodegenError::InvalidFloatWidth(bits))
            }
        }
    }

    pub fn pointer(&mut self, pointee: TyId) -> TyId {
        self.intern(TyData::Pointer(pointee))
    }

    pub fn alias(&mut self, name: &str, underlying: TyId) -> TyId {
        self.intern(TyData::Alias {
            name: name.to_owned(),
            underlying,
        })
    }

    /// Pointer to an unsigned integer.
    pub fn int_ptr(&mut self, bits: u32) -> TyId {
        let int = self.int(bits);
        self.pointer(int)
    }

    pub fn int_ptr_ptr(&mut self, bits: u32) -> TyId {
        let ptr = self.int_ptr(bits);
        self.pointer(ptr)
    }

    pub fn float_ptr(&mut self, bits: u32) -> Result<TyId, CodegenError> {
        let float = self.float(bits)?;
        Ok(self.pointer(float))
    }

    pub fn float_ptr_ptr(&mut self, bits: u32) -> Result<TyId, CodegenError> {
        let ptr = self.float_ptr(bits)?;
        Ok(self.pointer(ptr))
    }

    /// `*u8`, the type of raw memory (`malloc`, `memcpy`, string literals).
    pub fn byte_ptr(&mut self) -> TyId {
        self.int_ptr(8)
    }

    /// Intern a struct shape. Structs are declared through
    /// [`CodegenCx::declare_struct`](crate::CodegenCx::declare_struct), which
    /// also creates the IR struct.
    pub(crate) fn structure(&mut self, name: &str, elements: &[TyId]) -> TyId {
        self.intern(TyData::Struct {
            name: name.to_owned(),
            elements: elements.into(),
        })
    }

    pub(crate) fn bind_struct(&mut self, ty: TyId, ir: StructId) {
        self.struct_ir.insert(ty, ir);
    }

    /// IR struct backing the struct type `ty`.
    pub fn struct_ir(&self, ty: TyId) -> Option<StructId> {
        self.struct_ir.get(&self.resolve_alias(ty)).copied()
    }

    // -- Queries --

    /// Follow aliases down to a non-alias type.
    pub fn resolve_alias(&self, mut ty: TyId) -> TyId {
        while let TyData::Alias { underlying, .. } = self.get(ty) {
            ty = *underlying;
        }
        ty
    }

    /// Alias-resolved shape of `ty`.
    #[inline]
    pub fn data(&self, ty: TyId) -> &TyData {
        self.get(self.resolve_alias(ty))
    }

    /// Structural equality, seeing through aliases.
    pub fn is_equal(&self, a: TyId, b: TyId) -> bool {
        let (a, b) = (self.resolve_alias(a), self.resolve_alias(b));
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            // Distinct IDs for pointers may still differ only in aliasing.
            (TyData::Pointer(pa), TyData::Pointer(pb)) => self.is_equal(*pa, *pb),
            // Interned: equal shapes of anything else have equal IDs.
            _ => false,
        }
    }

    /// Whether `rhs` may be the right operand of a binary operator whose
    /// left operand is `lhs`.
    pub fn is_valid_rhs(&self, lhs: TyId, rhs: TyId) -> bool {
        let operand = |ty| matches!(self.data(ty), TyData::Int { .. } | TyData::Float { .. });
        operand(lhs) && operand(rhs) && self.is_equal(lhs, rhs)
    }

    /// Pointee of a pointer type.
    pub fn pointee(&self, ty: TyId) -> Option<TyId> {
        match self.data(ty) {
            TyData::Pointer(pointee) => Some(*pointee),
            _ => None,
        }
    }

    /// Struct type behind a `Pointer<Struct>`.
    pub fn pointee_struct(&self, ty: TyId) -> Option<TyId> {
        let pointee = self.pointee(ty)?;
        matches!(self.data(pointee), TyData::Struct { .. }).then(|| self.resolve_alias(pointee))
    }

    /// Element types of a struct type.
    pub fn struct_elements(&self, ty: TyId) -> Option<&[TyId]> {
        match self.data(ty) {
            TyData::Struct { elements, .. } => Some(&elements[..]),
            _ => None,
        }
    }

    #[inline]
    pub fn is_int(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Int { .. })
    }

    #[inline]
    pub fn is_float(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Float { .. })
    }

    #[inline]
    pub fn is_pointer(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Pointer(_))
    }

    #[inline]
    pub fn is_void(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Void)
    }

    /// True for signed integers.
    #[inline]
    pub fn is_signed(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Int { signed: true, .. })
    }

    /// Bit width of an integer or float.
    pub fn bits(&self, ty: TyId) -> Option<u32> {
        match self.data(ty) {
            TyData::Int { bits, .. } | TyData::Float { bits } => Some(*bits),
            _ => None,
        }
    }

    // -- Lowering and layout --

    /// Integer type pointers lower to.
    #[inline]
    pub fn pointer_ir(&self) -> Type {
        if self.pointer_bytes == 4 {
            types::I32
        } else {
            types::I64
        }
    }

    /// The IR type values of `ty` are represented with.
    ///
    /// Fails for integers wider than 128 bits and for struct shapes that
    /// were never given an IR layout.
    pub fn to_ir(&self, ty: TyId) -> Result<IrType, CodegenError> {
        let unsupported = |expected: &str| CodegenError::TypeMismatch {
            expected: expected.to_owned(),
            found: self.name(ty),
        };
        let ir = match self.data(ty) {
            TyData::Void => IrType::Void,
            TyData::Int { bits, .. } => IrType::Scalar(match bits {
                0..=8 => types::I8,
                9..=16 => types::I16,
                17..=32 => types::I32,
                33..=64 => types::I64,
                65..=128 => types::I128,
                _ => return Err(unsupported("an integer of at most 128 bits")),
            }),
            TyData::Float { bits: 16 } => IrType::Scalar(types::F16),
            TyData::Float { bits: 32 } => IrType::Scalar(types::F32),
            TyData::Float { .. } => IrType::Scalar(types::F64),
            TyData::Pointer(_) => IrType::Scalar(self.pointer_ir()),
            TyData::Struct { .. } => match self.struct_ir(ty) {
                Some(id) => IrType::Struct(id),
                None => {
                    tracing::error!(ty = %self.display(ty), "struct has no IR layout");
                    return Err(unsupported("a struct declared with declare_struct"));
                }
            },
            TyData::Alias { .. } => unreachable!("resolve_alias returned an alias"),
        };
        Ok(ir)
    }

    /// The Cranelift type of a value of `ty`. Fails for `void` and structs,
    /// which have no SSA values.
    pub fn scalar(&self, ty: TyId) -> Result<Type, CodegenError> {
        self.to_ir(ty)?
            .scalar()
            .ok_or_else(|| CodegenError::TypeMismatch {
                expected: "a scalar or pointer type".to_owned(),
                found: self.name(ty),
            })
    }

    /// Size of `ty` in bytes, padded to its alignment.
    pub fn size_of(&self, ty: TyId) -> u64 {
        match self.data(ty) {
            TyData::Void => 0,
            TyData::Int { bits, .. } => u64::from(bits.div_ceil(8)).next_power_of_two(),
            TyData::Float { bits } => u64::from(bits / 8),
            TyData::Pointer(_) => u64::from(self.pointer_bytes),
            TyData::Struct { elements, .. } => {
                let mut offset = 0u64;
                for &element in elements.iter() {
                    offset = offset.next_multiple_of(self.align_of(element));
                    offset += self.size_of(element);
                }
                offset.next_multiple_of(self.align_of(ty))
            }
            TyData::Alias { .. } => unreachable!("resolve_alias returned an alias"),
        }
    }

    /// Alignment of `ty` in bytes.
    pub fn align_of(&self, ty: TyId) -> u64 {
        match self.data(ty) {
            TyData::Struct { elements, .. } => elements
                .iter()
                .map(|&e| self.align_of(e))
                .max()
                .unwrap_or(1),
            _ => self.size_of(ty).clamp(1, 8),
        }
    }

    /// Distance in bytes between consecutive elements of type `ty`.
    ///
    /// `void` strides by one byte, so `*void` arithmetic is byte arithmetic.
    pub fn stride_of(&self, ty: TyId) -> u64 {
        self.size_of(ty).next_multiple_of(self.align_of(ty)).max(1)
    }

    /// Printable form of `ty`.
    pub fn display(&self, ty: TyId) -> TyDisplay<'_> {
        TyDisplay { registry: self, ty }
    }

    /// `display` rendered to a `String`, for error messages.
    pub(crate) fn name(&self, ty: TyId) -> String {
        self.display(ty).to_string()
    }
}

/// Renders a type as `i32`, `u8`, `bool`, `f64`, `*T` or a struct or alias
/// name.
pub struct TyDisplay<'a> {
    registry: &'a TypeRegistry,
    ty: TyId,
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registry.get(self.ty) {
            TyData::Void => f.write_str("void"),
            TyData::Int {
                bits: 1,
                signed: false,
            } => f.write_str("bool"),
            TyData::Int { bits, signed: true } => write!(f, "i{bits}"),
            TyData::Int {
                bits,
                signed: false,
            } => write!(f, "u{bits}"),
            TyData::Float { bits } => write!(f, "f{bits}"),
            TyData::Pointer(pointee) => write!(f, "*{}", self.registry.display(*pointee)),
            TyData::Struct { name, .. } | TyData::Alias { name, .. } => f.write_str(name),
        }
    }
}
