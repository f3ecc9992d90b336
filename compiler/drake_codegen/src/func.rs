//! Function wrappers.

use rustc_hash::FxHashMap;

use drake_ir::{BlockId, FunctionId, InsertPoint, ValueId};

use crate::local::{Local, LocalId};
use crate::ty::TyId;

/// A callable and the locals of its body.
///
/// Parameters of a function with a body are value locals created with the
/// function; declarations have parameter types only. Named locals are
/// unique per function: declaring a second local called `x` binds it as
/// `x_1`.
#[derive(Clone, Debug)]
pub struct Func {
    id: FunctionId,
    name: String,
    ret: TyId,
    param_tys: Vec<TyId>,
    params: Vec<LocalId>,
    entry: Option<BlockId>,
    locals: Vec<Local>,
    named: FxHashMap<String, LocalId>,
}

impl Func {
    pub(crate) fn new(
        id: FunctionId,
        name: &str,
        ret: TyId,
        param_tys: &[TyId],
        param_values: &[ValueId],
        entry: Option<BlockId>,
    ) -> Self {
        let mut func = Self {
            id,
            name: name.to_owned(),
            ret,
            param_tys: param_tys.to_vec(),
            params: Vec::with_capacity(param_values.len()),
            entry,
            locals: Vec::new(),
            named: FxHashMap::default(),
        };
        for (&value, &ty) in param_values.iter().zip(param_tys) {
            let local = func.push(Local::value(value, ty));
            func.params.push(local);
        }
        func
    }

    #[inline]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared return type.
    #[inline]
    pub fn ret(&self) -> TyId {
        self.ret
    }

    #[inline]
    pub fn param_types(&self) -> &[TyId] {
        &self.param_tys
    }

    #[inline]
    pub fn params(&self) -> &[LocalId] {
        &self.params
    }

    /// Local bound to parameter `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the function is a declaration.
    #[inline]
    pub fn param(&self, index: usize) -> LocalId {
        self.params[index]
    }

    /// Insert point at the end of the entry block; `None` for declarations.
    #[inline]
    pub fn entry(&self) -> Option<InsertPoint> {
        self.entry.map(|block| InsertPoint::new(self.id, block))
    }

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.entry.is_none()
    }

    /// Local declared under `name`.
    pub fn lookup(&self, name: &str) -> Option<LocalId> {
        self.named.get(name).copied()
    }

    /// Number of locals (parameters, temporaries and named slots).
    #[inline]
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    #[inline]
    pub(crate) fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.index()]
    }

    #[inline]
    pub(crate) fn local_mut(&mut self, id: LocalId) -> &mut Local {
        &mut self.locals[id.index()]
    }

    pub(crate) fn push(&mut self, local: Local) -> LocalId {
        let index = u32::try_from(self.locals.len())
            .unwrap_or_else(|_| panic!("local count exceeds u32::MAX in `{}`", self.name));
        self.locals.push(local);
        LocalId::new(self.id, index)
    }

    /// Make `base` unique among this function's named locals.
    pub(crate) fn unique_local_name(&self, base: &str) -> String {
        if !self.named.contains_key(base) {
            return base.to_owned();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.named.contains_key(&candidate) {
                tracing::warn!(func = %self.name, name = %base, renamed = %candidate, "local name already taken");
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn bind(&mut self, name: String, local: LocalId) {
        self.named.insert(name, local);
    }
}
