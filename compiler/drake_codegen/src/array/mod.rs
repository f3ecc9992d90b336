//! Growable array synthesis.
//!
//! [`Array::create`] emits, for one element type `T`, a struct
//!
//! ```text
//! Name { buffer: *T, size: u64, max: u64, factor: u64 }
//! ```
//!
//! and sixteen member functions `Name_<method>`, each taking `this: *Name`
//! first:
//!
//! | Method | Behavior |
//! |--------|----------|
//! | `get_<field>` / `set_<field>` | read or write one field |
//! | `constructor` | null buffer, `size = max = 0`, `factor = 16` |
//! | `constructor_size(n)` | `malloc(n * stride)`, `size = max = n` |
//! | `constructor_copy(original)` | deep copy of `original` |
//! | `destructor` | `free(buffer)` unless null |
//! | `resize(new_max)` | new buffer of `new_max` elements, old `size` elements copied |
//! | `is_valid_index(i)` | `i < max` |
//! | `get_at_index(i)` / `set_at_index(i, v)` | unchecked element access |
//!
//! `resize` does not change `size`, and `is_valid_index` checks against
//! `max`, not `size`. `factor` is stored but unused.
//!
//! Elements must be scalars or pointers; arrays of structs hold pointers.

use tracing::{debug, error};

use drake_ir::{FunctionId, InsertPoint, IrError, StructId};

use crate::context::{BinaryOp, CodegenCx};
use crate::error::CodegenError;
use crate::local::LocalId;
use crate::ty::TyId;

/// Initial `factor` of a constructed array.
const DEFAULT_FACTOR: u64 = 16;

/// The generated member functions of an [`Array`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayMethods {
    pub get_buffer: FunctionId,
    pub set_buffer: FunctionId,
    pub get_size: FunctionId,
    pub set_size: FunctionId,
    pub get_max: FunctionId,
    pub set_max: FunctionId,
    pub get_factor: FunctionId,
    pub set_factor: FunctionId,
    pub constructor: FunctionId,
    pub constructor_size: FunctionId,
    pub constructor_copy: FunctionId,
    pub destructor: FunctionId,
    pub resize: FunctionId,
    pub is_valid_index: FunctionId,
    pub get_at_index: FunctionId,
    pub set_at_index: FunctionId,
}

/// A synthesized growable array type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Array {
    name: String,
    elem: TyId,
    buffer_ty: TyId,
    structure: StructId,
    methods: ArrayMethods,
}

impl Array {
    pub const BUFFER: u32 = 0;
    pub const SIZE: u32 = 1;
    pub const MAX: u32 = 2;
    pub const FACTOR: u32 = 3;

    /// Member names generated for every array, without the struct prefix.
    pub const METHOD_NAMES: [&'static str; 16] = [
        "get_buffer",
        "set_buffer",
        "get_size",
        "set_size",
        "get_max",
        "set_max",
        "get_factor",
        "set_factor",
        "constructor",
        "constructor_size",
        "constructor_copy",
        "destructor",
        "resize",
        "is_valid_index",
        "get_at_index",
        "set_at_index",
    ];

    /// Declare the array struct `name` for elements of type `elem` and
    /// generate its member functions.
    ///
    /// Fails without touching the module if `elem` is not a scalar or
    /// pointer, or if any `name_<method>` function already exists.
    pub fn create(cx: &mut CodegenCx, elem: TyId, name: &str) -> Result<Self, CodegenError> {
        if cx.types().is_void(elem) {
            return Err(CodegenError::TypeMismatch {
                expected: "a sized element type".to_owned(),
                found: "void".to_owned(),
            });
        }
        cx.types().scalar(elem)?;
        if let Some(taken) = Self::METHOD_NAMES
            .iter()
            .map(|method| format!("{name}_{method}"))
            .find(|member| cx.function_by_name(member).is_some())
        {
            error!(array = %name, function = %taken, "array member already declared");
            return Err(IrError::DuplicateFunction(taken).into());
        }
        let buffer_ty = cx.types_mut().pointer(elem);
        let size = TyId::SIZE;
        let structure = cx.declare_struct(name, &[buffer_ty, size, size, size])?;
        let mut generator = Generator {
            cx,
            structure,
            elem,
            buffer_ty,
        };

        let (get_buffer, set_buffer) = generator.accessors("buffer", Self::BUFFER, buffer_ty)?;
        let (get_size, set_size) = generator.accessors("size", Self::SIZE, size)?;
        let (get_max, set_max) = generator.accessors("max", Self::MAX, size)?;
        let (get_factor, set_factor) = generator.accessors("factor", Self::FACTOR, size)?;
        let methods = ArrayMethods {
            get_buffer,
            set_buffer,
            get_size,
            set_size,
            get_max,
            set_max,
            get_factor,
            set_factor,
            constructor: generator.constructor()?,
            constructor_size: generator.constructor_size()?,
            constructor_copy: generator.constructor_copy()?,
            destructor: generator.destructor()?,
            resize: generator.resize()?,
            is_valid_index: generator.is_valid_index()?,
            get_at_index: generator.get_at_index()?,
            set_at_index: generator.set_at_index()?,
        };
        debug!(%name, elem = %generator.cx.types().display(elem), "synthesized array");
        Ok(Self {
            name: name.to_owned(),
            elem,
            buffer_ty,
            structure,
            methods,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type.
    #[inline]
    pub fn elem(&self) -> TyId {
        self.elem
    }

    /// `*elem`, the type of the `buffer` field.
    #[inline]
    pub fn buffer_ty(&self) -> TyId {
        self.buffer_ty
    }

    /// The backing struct.
    #[inline]
    pub fn structure(&self) -> StructId {
        self.structure
    }

    #[inline]
    pub fn methods(&self) -> &ArrayMethods {
        &self.methods
    }
}

/// Emits the member functions of one array struct.
struct Generator<'a> {
    cx: &'a mut CodegenCx,
    structure: StructId,
    elem: TyId,
    buffer_ty: TyId,
}

impl Generator<'_> {
    /// Declare member `name` with a body; returns it, its entry insert point
    /// and `this`.
    fn member(
        &mut self,
        ret: TyId,
        name: &str,
        params: &[(&str, TyId)],
    ) -> Result<(FunctionId, InsertPoint, LocalId), CodegenError> {
        let f = self
            .cx
            .declare_member(self.structure, ret, name, params, true)?;
        let at = self.cx.entry(f)?;
        Ok((f, at, self.cx.param(f, 0)))
    }

    fn accessors(
        &mut self,
        field: &str,
        index: u32,
        ty: TyId,
    ) -> Result<(FunctionId, FunctionId), CodegenError> {
        let (get, at, this) = self.member(ty, &format!("get_{field}"), &[])?;
        let value = self.cx.get_element_val(at, this, index, field)?;
        self.cx.ret(at, value)?;

        let (set, at, this) = self.member(TyId::VOID, &format!("set_{field}"), &[(field, ty)])?;
        let value = self.cx.param(set, 1);
        self.cx.store_field(at, this, index, value)?;
        self.cx.ret_void(at)?;
        Ok((get, set))
    }

    fn constructor(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(TyId::VOID, "constructor", &[])?;
        let null = self.cx.const_null(f, self.buffer_ty)?;
        let zero = self.cx.const_size(f, 0)?;
        self.cx.store_field(at, this, Array::BUFFER, null)?;
        self.cx.store_field(at, this, Array::SIZE, zero)?;
        self.cx.store_field(at, this, Array::MAX, zero)?;
        self.store_default_factor(f, at, this)?;
        self.cx.ret_void(at)?;
        Ok(f)
    }

    fn constructor_size(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(TyId::VOID, "constructor_size", &[("size", TyId::SIZE)])?;
        let size = self.cx.param(f, 1);
        let buffer = self.allocate(f, at, size)?;
        self.cx.store_field(at, this, Array::BUFFER, buffer)?;
        self.cx.store_field(at, this, Array::SIZE, size)?;
        self.cx.store_field(at, this, Array::MAX, size)?;
        self.store_default_factor(f, at, this)?;
        self.cx.ret_void(at)?;
        Ok(f)
    }

    /// Deep copy: a non-null buffer is duplicated with room for `max`
    /// elements, of which the first `size` are copied.
    fn constructor_copy(&mut self) -> Result<FunctionId, CodegenError> {
        let ptr_ty = self.cx.structure(self.structure).ptr_ty();
        let (f, at, this) = self.member(TyId::VOID, "constructor_copy", &[("original", ptr_ty)])?;
        let original = self.cx.param(f, 1);
        let copy_block = self.cx.append_block(f, "copy")?;
        let null_block = self.cx.append_block(f, "null")?;
        let done = self.cx.append_block(f, "done")?;

        for field in [Array::SIZE, Array::MAX, Array::FACTOR] {
            let value = self.cx.get_element_val(at, original, field, "")?;
            self.cx.store_field(at, this, field, value)?;
        }
        let old = self.cx.get_element_val(at, original, Array::BUFFER, "old")?;
        let is_null = self.cx.is_null(at, old, "is_null")?;
        self.cx.cond_jump(at, is_null, null_block, copy_block)?;

        let at = at.at_block(copy_block);
        let max = self.cx.get_element_val(at, original, Array::MAX, "max")?;
        let size = self.cx.get_element_val(at, original, Array::SIZE, "size")?;
        let buffer = self.allocate(f, at, max)?;
        let bytes = self.byte_len(f, at, size)?;
        self.cx.memcpy(at, buffer, old, bytes)?;
        self.cx.store_field(at, this, Array::BUFFER, buffer)?;
        self.cx.jump(at, done);

        let at = at.at_block(null_block);
        let null = self.cx.const_null(f, self.buffer_ty)?;
        self.cx.store_field(at, this, Array::BUFFER, null)?;
        self.cx.jump(at, done);

        self.cx.ret_void(at.at_block(done))?;
        Ok(f)
    }

    fn destructor(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(TyId::VOID, "destructor", &[])?;
        let free_block = self.cx.append_block(f, "free")?;
        let done = self.cx.append_block(f, "done")?;

        let buffer = self.cx.get_element_val(at, this, Array::BUFFER, "buffer")?;
        let is_null = self.cx.is_null(at, buffer, "is_null")?;
        self.cx.cond_jump(at, is_null, done, free_block)?;

        let at = at.at_block(free_block);
        self.cx.free(at, buffer)?;
        self.cx.jump(at, done);

        self.cx.ret_void(at.at_block(done))?;
        Ok(f)
    }

    fn resize(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(TyId::VOID, "resize", &[("new_max", TyId::SIZE)])?;
        let new_max = self.cx.param(f, 1);
        let copy_block = self.cx.append_block(f, "copy")?;
        let store_block = self.cx.append_block(f, "store")?;

        let buffer = self.allocate(f, at, new_max)?;
        let old = self.cx.get_element_val(at, this, Array::BUFFER, "old")?;
        let is_null = self.cx.is_null(at, old, "is_null")?;
        self.cx.cond_jump(at, is_null, store_block, copy_block)?;

        let at = at.at_block(copy_block);
        let size = self.cx.get_element_val(at, this, Array::SIZE, "size")?;
        let bytes = self.byte_len(f, at, size)?;
        self.cx.memcpy(at, buffer, old, bytes)?;
        self.cx.free(at, old)?;
        self.cx.jump(at, store_block);

        let at = at.at_block(store_block);
        self.cx.store_field(at, this, Array::BUFFER, buffer)?;
        self.cx.store_field(at, this, Array::MAX, new_max)?;
        self.cx.ret_void(at)?;
        Ok(f)
    }

    fn is_valid_index(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(TyId::BOOL, "is_valid_index", &[("index", TyId::SIZE)])?;
        let index = self.cx.param(f, 1);
        let max = self.cx.get_element_val(at, this, Array::MAX, "max")?;
        let valid = self.cx.binary_op(at, BinaryOp::Lt, index, max, "valid")?;
        self.cx.ret(at, valid)?;
        Ok(f)
    }

    fn get_at_index(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(self.elem, "get_at_index", &[("index", TyId::SIZE)])?;
        let index = self.cx.param(f, 1);
        let buffer = self.cx.get_element_val(at, this, Array::BUFFER, "buffer")?;
        let value = self.cx.load_index(at, buffer, index, "value")?;
        self.cx.ret(at, value)?;
        Ok(f)
    }

    fn set_at_index(&mut self) -> Result<FunctionId, CodegenError> {
        let (f, at, this) = self.member(
            TyId::VOID,
            "set_at_index",
            &[("index", TyId::SIZE), ("value", self.elem)],
        )?;
        let (index, value) = (self.cx.param(f, 1), self.cx.param(f, 2));
        let buffer = self.cx.get_element_val(at, this, Array::BUFFER, "buffer")?;
        self.cx.store_index(at, buffer, index, value)?;
        self.cx.ret_void(at)?;
        Ok(f)
    }

    /// `count * stride(elem)` as a `u64`.
    fn byte_len(
        &mut self,
        f: FunctionId,
        at: InsertPoint,
        count: LocalId,
    ) -> Result<LocalId, CodegenError> {
        let stride = self.cx.const_stride(f, self.elem)?;
        self.cx.binary_op(at, BinaryOp::Mul, count, stride, "bytes")
    }

    /// A heap buffer for `count` elements, typed `*elem`.
    fn allocate(
        &mut self,
        f: FunctionId,
        at: InsertPoint,
        count: LocalId,
    ) -> Result<LocalId, CodegenError> {
        let bytes = self.byte_len(f, at, count)?;
        let raw = self.cx.malloc(at, bytes, "raw")?;
        self.cx.type_cast(at, raw, self.buffer_ty, "buffer")
    }

    fn store_default_factor(
        &mut self,
        f: FunctionId,
        at: InsertPoint,
        this: LocalId,
    ) -> Result<(), CodegenError> {
        let factor = self.cx.const_size(f, DEFAULT_FACTOR)?;
        self.cx.store_field(at, this, Array::FACTOR, factor)
    }
}

#[cfg(test)]
mod tests;
