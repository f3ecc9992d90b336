//! Modules and functions.
//!
//! A [`Module`] owns every struct layout, global and function. A
//! [`Function`] always has a Cranelift [`Signature`]; functions with a body
//! also own a `cranelift_codegen::ir::Function`. Declarations (externals
//! like `malloc`) never get one.

use std::fmt;

use cranelift_codegen::ir::{self, AbiParam, FuncRef, GlobalValue, Signature, UserFuncName};
use rustc_hash::FxHashMap;

use crate::error::IrError;
use crate::ids::{FunctionId, GlobalId, StructId};
use crate::target::TargetDesc;
use crate::ir_type::IrType;
use crate::{BlockId, ValueId};

// ── Functions ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
    signature: Signature,
    body: Option<ir::Function>,
    /// Callees referenced from this body.
    pub(crate) imports: FxHashMap<FunctionId, FuncRef>,
    /// Globals referenced from this body.
    pub(crate) global_refs: FxHashMap<GlobalId, GlobalValue>,
    value_names: FxHashMap<ValueId, String>,
    block_names: FxHashMap<BlockId, String>,
    /// Receives instructions emitted after a block's terminator.
    dead_block: Option<BlockId>,
}

impl Function {
    fn new(name: &str, params: &[IrType], ret: IrType, signature: Signature) -> Self {
        Self {
            name: name.to_owned(),
            params: params.to_vec(),
            ret,
            signature,
            body: None,
            imports: FxHashMap::default(),
            global_refs: FxHashMap::default(),
            value_names: FxHashMap::default(),
            block_names: FxHashMap::default(),
            dead_block: None,
        }
    }

    /// True if the function has no body.
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The Cranelift body, if any.
    #[inline]
    pub fn body(&self) -> Option<&ir::Function> {
        self.body.as_ref()
    }

    /// The body, panicking for declarations. Insert points only exist for
    /// functions with a body, so emitting methods never hit the panic.
    pub(crate) fn body_mut(&mut self) -> &mut ir::Function {
        let name = &self.name;
        self.body
            .as_mut()
            .unwrap_or_else(|| panic!("`{name}` has no body"))
    }

    /// Create the body and its entry block, whose parameters are the
    /// function's parameters.
    pub(crate) fn define(&mut self) -> BlockId {
        let mut body = ir::Function::with_name_signature(
            UserFuncName::testcase(&self.name),
            self.signature.clone(),
        );
        let entry = body.dfg.make_block();
        body.layout.append_block(entry);
        for param in &self.signature.params {
            body.dfg.append_block_param(entry, param.value_type);
        }
        self.body = Some(body);
        self.block_names.insert(entry, "entry".to_owned());
        entry
    }

    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        self.body.as_ref().and_then(|b| b.layout.entry_block())
    }

    /// The value bound to parameter `index`.
    ///
    /// # Panics
    ///
    /// Panics for declarations and if `index` is out of range.
    pub fn param(&self, index: usize) -> ValueId {
        let params = self
            .body
            .as_ref()
            .and_then(|b| Some(b.dfg.block_params(b.layout.entry_block()?)))
            .unwrap_or_else(|| panic!("`{}` has no body", self.name));
        assert!(
            index < params.len(),
            "parameter {index} out of range for `{}` ({} params)",
            self.name,
            params.len()
        );
        params[index]
    }

    /// Cranelift type of `value`.
    ///
    /// # Panics
    ///
    /// Panics for declarations.
    pub fn value_type(&self, value: ValueId) -> ir::Type {
        match &self.body {
            Some(body) => body.dfg.value_type(value),
            None => panic!("`{}` has no body", self.name),
        }
    }

    /// True if `block` ends in a terminator.
    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.body.as_ref().is_some_and(|body| {
            body.layout
                .last_inst(block)
                .is_some_and(|inst| body.dfg.insts[inst].opcode().is_terminator())
        })
    }

    /// Total instructions across all blocks, terminators included.
    pub fn instruction_count(&self) -> usize {
        self.body.as_ref().map_or(0, |body| {
            body.layout
                .blocks()
                .map(|block| body.layout.block_insts(block).count())
                .sum()
        })
    }

    /// Name given to `value` when it was emitted.
    pub fn value_name(&self, value: ValueId) -> Option<&str> {
        self.value_names.get(&value).map(String::as_str)
    }

    pub fn block_name(&self, block: BlockId) -> Option<&str> {
        self.block_names.get(&block).map(String::as_str)
    }

    pub(crate) fn name_value(&mut self, value: ValueId, name: &str) {
        if !name.is_empty() {
            self.value_names.insert(value, name.to_owned());
        }
    }

    pub(crate) fn append_block(&mut self, name: &str) -> BlockId {
        let body = self.body_mut();
        let block = body.dfg.make_block();
        body.layout.append_block(block);
        if !name.is_empty() {
            self.block_names.insert(block, name.to_owned());
        }
        block
    }

    /// The block that collects instructions emitted after a terminator,
    /// created on first use.
    pub(crate) fn dead_block(&mut self) -> BlockId {
        if let Some(block) = self.dead_block {
            return block;
        }
        let block = self.append_block("dead");
        self.dead_block = Some(block);
        block
    }
}

// ── Structs and globals ─────────────────────────────────────────────

/// A named memory layout. Fields are laid out in order, each at its
/// natural alignment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<IrType>,
}

/// A constant, NUL-terminated byte string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Global {
    pub name: String,
    pub bytes: Vec<u8>,
}

// ── Module ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    target: TargetDesc,
    structs: Vec<StructType>,
    globals: Vec<Global>,
    functions: Vec<Function>,
    function_index: FxHashMap<String, FunctionId>,
}

impl Module {
    pub fn new(name: impl Into<String>, target: TargetDesc) -> Self {
        Self {
            name: name.into(),
            target,
            structs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            function_index: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn target(&self) -> &TargetDesc {
        &self.target
    }

    // -- Struct layouts --

    /// Add a named struct layout. A repeated name gets a numeric suffix.
    pub fn add_struct(&mut self, name: &str, fields: Vec<IrType>) -> StructId {
        let mut unique = name.to_owned();
        let mut n = 0u32;
        while self.structs.iter().any(|s| s.name == unique) {
            n += 1;
            unique = format!("{name}.{n}");
        }
        let id = StructId::from_len(self.structs.len());
        self.structs.push(StructType {
            name: unique,
            fields,
        });
        id
    }

    #[inline]
    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.structs[id.index()]
    }

    // -- Globals --

    /// Add a NUL-terminated string global.
    pub fn add_string(&mut self, name: &str, value: &str) -> GlobalId {
        let id = GlobalId::from_len(self.globals.len());
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        let name = if name.is_empty() {
            format!(".str.{}", id.raw())
        } else {
            name.to_owned()
        };
        self.globals.push(Global { name, bytes });
        id
    }

    #[inline]
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId::from_len(i), g))
    }

    // -- Functions --

    /// Declare a function without a body.
    ///
    /// Parameters must be scalars and the return type void or a scalar.
    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[IrType],
        ret: IrType,
    ) -> Result<FunctionId, IrError> {
        if self.function_index.contains_key(name) {
            return Err(IrError::DuplicateFunction(name.to_owned()));
        }
        let unsupported = |ty: IrType| IrError::UnsupportedSignature {
            function: name.to_owned(),
            ty: ty.to_string(),
        };
        let mut signature = Signature::new(self.target.call_conv());
        for &param in params {
            let ty = param.scalar().ok_or_else(|| unsupported(param))?;
            signature.params.push(AbiParam::new(ty));
        }
        match ret {
            IrType::Void => {}
            IrType::Scalar(ty) => signature.returns.push(AbiParam::new(ty)),
            IrType::Struct(_) => return Err(unsupported(ret)),
        }

        let id = FunctionId::from_len(self.functions.len());
        self.functions
            .push(Function::new(name, params, ret, signature));
        self.function_index.insert(name.to_owned(), id);
        tracing::trace!(%name, id = id.raw(), "declared function");
        Ok(id)
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub(crate) fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    #[inline]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.function_index.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId::from_len(i), f))
    }

    /// Total instructions across all function bodies.
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(Function::instruction_count).sum()
    }

    // -- Layout --

    /// Allocation size of `ty` in bytes (size rounded up to alignment).
    pub fn size_of(&self, ty: IrType) -> u64 {
        match ty {
            IrType::Void => 0,
            IrType::Scalar(ty) => u64::from(ty.bytes()),
            IrType::Struct(id) => {
                let mut offset = 0u64;
                for &field in &self.struct_type(id).fields {
                    offset = offset.next_multiple_of(self.align_of(field));
                    offset += self.size_of(field);
                }
                offset.next_multiple_of(self.align_of(ty))
            }
        }
    }

    /// ABI alignment of `ty` in bytes.
    pub fn align_of(&self, ty: IrType) -> u64 {
        match ty {
            IrType::Void => 1,
            IrType::Scalar(_) => self.size_of(ty).clamp(1, 8),
            IrType::Struct(id) => self
                .struct_type(id)
                .fields
                .iter()
                .map(|&f| self.align_of(f))
                .max()
                .unwrap_or(1),
        }
    }

    /// Byte offset of field `index` within struct `id`.
    pub fn field_offset(&self, id: StructId, index: u32) -> u64 {
        let mut offset = 0u64;
        for (i, &field) in self.struct_type(id).fields.iter().enumerate() {
            offset = offset.next_multiple_of(self.align_of(field));
            if i == index as usize {
                return offset;
            }
            offset += self.size_of(field);
        }
        offset
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        writeln!(
            f,
            "; target {} ({})",
            self.target.triple(),
            self.target.data_layout()
        )?;
        for s in &self.structs {
            let fields: Vec<String> = s.fields.iter().map(ToString::to_string).collect();
            writeln!(f, "; struct %{} {{ {} }}", s.name, fields.join(", "))?;
        }
        for g in &self.globals {
            writeln!(f, "data %{} = \"{}\"", g.name, g.bytes.escape_ascii())?;
        }
        for func in &self.functions {
            writeln!(f)?;
            match &func.body {
                None => writeln!(f, "declare %{}{}", func.name, func.signature)?,
                Some(body) => {
                    write!(f, "{}", body.display())?;
                    let mut names: Vec<_> = func.value_names.iter().collect();
                    names.sort_by_key(|(value, _)| **value);
                    for (value, name) in names {
                        writeln!(f, "; {value} = {name}")?;
                    }
                }
            }
        }
        Ok(())
    }
}
