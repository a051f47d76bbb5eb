//! The type registry.
//!
//! Types live in an arena addressed by [`TypeId`] and are keyed by path.
//! Parents are resolved lazily from each type's `parent_type` variable, and
//! variable values are evaluated on first use and memoized in place.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dmkit_foundation::{Error, ErrorKind, Result, SourcePos, Typepath, Value, render};
use tracing::{debug, warn};

use crate::ast::{Expr, ProcCall};
use crate::eval::EvalContext;

/// Index of a type in a [`TypeRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a type's parent link stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentLink {
    /// Not looked at yet.
    Unresolved,
    /// Being resolved; seeing this again means a cycle.
    Resolving,
    /// The type has no parent.
    Root,
    /// The parent type.
    Resolved(TypeId),
}

/// Evaluation state of one variable.
#[derive(Clone, Debug, PartialEq)]
pub enum VarState {
    /// Not evaluated yet.
    NotEvaluated,
    /// Being evaluated; seeing this again means a circular definition.
    InProgress,
    /// Evaluated successfully.
    Evaluated(Value),
    /// Evaluation failed; the failure was logged.
    Undefined,
}

/// A variable's declared expression and its evaluation state.
#[derive(Debug)]
pub struct VarSlot {
    expr: Option<Arc<Expr>>,
    state: RefCell<VarState>,
}

impl VarSlot {
    fn from_expr(expr: Option<Expr>) -> Self {
        Self {
            expr: expr.map(Arc::new),
            state: RefCell::new(VarState::NotEvaluated),
        }
    }

    fn from_value(value: Value) -> Self {
        Self {
            expr: None,
            state: RefCell::new(VarState::Evaluated(value)),
        }
    }

    /// The declared expression, if any.
    #[must_use]
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_deref()
    }

    /// A snapshot of the evaluation state.
    #[must_use]
    pub fn state(&self) -> VarState {
        self.state.borrow().clone()
    }
}

/// Declaration metadata for a variable introduced with `var/`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarMeta {
    /// The declared value type, e.g. `/list` or `/` when untyped.
    pub value_type: String,
    /// Declared `global` or `static`.
    pub is_global: bool,
    /// Declared `tmp`.
    pub is_tmp: bool,
    /// Declared `const`.
    pub is_const: bool,
}

/// Properties that `FASTDMM_PROP` may set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FastdmmProp {
    /// Variables the editor shows first.
    PinnedVars,
    /// How many directions the icon has.
    DirAmount,
    /// Pipe connection group.
    PipeGroup,
    /// Pipe interference group.
    PipeInterferenceGroup,
    /// Pipe kind for routing.
    PipeType,
    /// Routing cost of crossing this type.
    PipeAstarCost,
}

const FASTDMM_PROPS: &[(&str, FastdmmProp)] = &[
    ("pinned_vars", FastdmmProp::PinnedVars),
    ("dir_amount", FastdmmProp::DirAmount),
    ("pipe_group", FastdmmProp::PipeGroup),
    ("pipe_interference_group", FastdmmProp::PipeInterferenceGroup),
    ("pipe_type", FastdmmProp::PipeType),
    ("pipe_astar_cost", FastdmmProp::PipeAstarCost),
];

impl FastdmmProp {
    /// Looks up a property by its source name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        FASTDMM_PROPS.iter().find(|(n, _)| *n == name).map(|(_, p)| *p)
    }

    /// The source name.
    #[must_use]
    pub fn name(self) -> &'static str {
        FASTDMM_PROPS
            .iter()
            .find(|(_, p)| *p == self)
            .map_or("", |(n, _)| n)
    }
}

/// Macro annotations that `FASTDMM_PROP` may attach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FastdmmMacro {
    /// `set_instance_vars(name = value, ...)`: adjust instances as they
    /// are placed.
    SetInstanceVars,
}

impl FastdmmMacro {
    /// Looks up a macro by its source name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "set_instance_vars" => Some(Self::SetInstanceVars),
            _ => None,
        }
    }
}

/// An attached macro annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroCall {
    /// Which macro.
    pub kind: FastdmmMacro,
    /// The call as written.
    pub call: ProcCall,
}

/// One type in the tree.
#[derive(Debug)]
pub struct TypeNode {
    path: Arc<str>,
    vars: BTreeMap<String, VarSlot>,
    metas: BTreeMap<String, VarMeta>,
    props: BTreeMap<FastdmmProp, Expr>,
    macros: Vec<MacroCall>,
    parent: ParentLink,
    subtypes: Vec<TypeId>,
}

impl TypeNode {
    fn new(path: &str) -> Self {
        Self {
            path: Arc::from(path),
            vars: BTreeMap::new(),
            metas: BTreeMap::new(),
            props: BTreeMap::new(),
            macros: Vec::new(),
            parent: ParentLink::Unresolved,
            subtypes: Vec::new(),
        }
    }

    /// The type's path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The type's path, shared.
    #[must_use]
    pub fn path_arc(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    /// Variables assigned or declared on this type itself.
    pub fn own_vars(&self) -> impl Iterator<Item = (&str, &VarSlot)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Variables declared with `var/` on this type itself.
    pub fn own_metas(&self) -> impl Iterator<Item = (&str, &VarMeta)> {
        self.metas.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The parent link.
    #[must_use]
    pub const fn parent_link(&self) -> ParentLink {
        self.parent
    }

    /// Attached macro annotations, in declaration order.
    #[must_use]
    pub fn macros(&self) -> &[MacroCall] {
        &self.macros
    }
}

/// Path-keyed registry of types.
#[derive(Debug)]
pub struct TypeRegistry {
    nodes: Vec<TypeNode>,
    by_path: HashMap<Arc<str>, TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry holding only the root type `/`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            nodes: Vec::new(),
            by_path: HashMap::new(),
        };
        registry.get_or_create("/");
        registry
    }

    /// Number of types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root type exists from the start.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All type ids, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = TypeId> + use<> {
        (0..self.nodes.len()).map(|i| TypeId(i as u32))
    }

    /// The root type `/`.
    #[must_use]
    pub const fn root(&self) -> TypeId {
        TypeId(0)
    }

    /// Returns the node for `id`.
    #[must_use]
    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    /// The path of `id`.
    #[must_use]
    pub fn path(&self, id: TypeId) -> &str {
        &self.nodes[id.index()].path
    }

    /// Finds a type by path.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<TypeId> {
        self.by_path.get(path).copied()
    }

    /// Finds or creates the type at `path`.
    ///
    /// New types get a `type` variable holding their own path and, except
    /// for `/`, `/datum` and `/world`, a `parent_type` derived from the path:
    /// the path minus its last segment, or `/datum` for single-segment paths.
    pub fn get_or_create(&mut self, path: &str) -> TypeId {
        if let Some(id) = self.lookup(path) {
            return id;
        }
        let id = TypeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        let mut node = TypeNode::new(path);
        if path != "/" {
            node.vars.insert("type".to_string(), VarSlot::from_value(Value::path(path)));
        }
        if !matches!(path, "/" | "/datum" | "/world") {
            let parent = match path.rfind('/') {
                Some(i) if i > 0 => &path[..i],
                _ => "/datum",
            };
            node.vars.insert(
                "parent_type".to_string(),
                VarSlot::from_value(Value::path(parent)),
            );
        }
        self.by_path.insert(node.path_arc(), id);
        self.nodes.push(node);
        id
    }

    /// Assigns a variable on `id`.
    ///
    /// A declaration without a value keeps an existing value on the same
    /// type.
    pub fn set_var(&mut self, id: TypeId, name: &str, expr: Option<Expr>) {
        let node = &mut self.nodes[id.index()];
        if expr.is_none() && node.vars.contains_key(name) {
            return;
        }
        node.vars.insert(name.to_string(), VarSlot::from_expr(expr));
    }

    /// Assigns an already evaluated value.
    pub fn set_var_value(&mut self, id: TypeId, name: &str, value: Value) {
        self.nodes[id.index()]
            .vars
            .insert(name.to_string(), VarSlot::from_value(value));
    }

    /// Records a `var/` declaration.
    ///
    /// # Errors
    ///
    /// Returns a `TypeTree` error if `id` already declares `name`.
    pub fn set_var_meta(&mut self, id: TypeId, name: &str, meta: VarMeta) -> Result<()> {
        let node = &mut self.nodes[id.index()];
        if node.metas.contains_key(name) {
            return Err(Error::type_tree(
                format!("duplicate definition of {}/var/{name}", node.path),
                None,
            ));
        }
        node.metas.insert(name.to_string(), meta);
        Ok(())
    }

    /// The declaration of `name`, searching parents.
    #[must_use]
    pub fn var_meta(&self, id: TypeId, name: &str) -> Option<&VarMeta> {
        self.ancestry(id)
            .find_map(|t| self.nodes[t.index()].metas.get(name))
    }

    /// The resolved parent of `id`.
    #[must_use]
    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        match self.nodes[id.index()].parent {
            ParentLink::Resolved(parent) => Some(parent),
            _ => None,
        }
    }

    /// `id` followed by its resolved ancestors.
    pub fn ancestry(&self, id: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::successors(Some(id), |t| self.parent(*t))
    }

    /// Returns true if `id` is `path` or inherits from it.
    #[must_use]
    pub fn is_a(&self, id: TypeId, path: &str) -> bool {
        self.ancestry(id).any(|t| self.path(t) == path)
    }

    /// Direct subtypes, sorted by path once finalized.
    #[must_use]
    pub fn subtypes(&self, id: TypeId) -> &[TypeId] {
        &self.nodes[id.index()].subtypes
    }

    /// The type that holds the effective value of `name` for `id`.
    #[must_use]
    pub fn var_owner(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.ancestry(id)
            .find(|t| self.nodes[t.index()].vars.contains_key(name))
    }

    /// Returns true if `id` or a parent has a value for `name`.
    #[must_use]
    pub fn has_var(&self, id: TypeId, name: &str) -> bool {
        self.var_owner(id, name).is_some()
    }

    /// The effective value of `name`, with evaluation failures treated as
    /// missing.
    #[must_use]
    pub fn get_var(&self, id: TypeId, name: &str) -> Option<Value> {
        self.eval_var(id, name).ok().flatten()
    }

    /// Evaluates the effective value of `name` for `id`.
    ///
    /// The value is computed in the context of the type that declares it and
    /// memoized there. `Ok(None)` means no type in the chain has the var.
    ///
    /// # Errors
    ///
    /// Returns a `NonConstant` error if the expression is not constant, is
    /// circular, or failed before.
    pub fn eval_var(&self, id: TypeId, name: &str) -> Result<Option<Value>> {
        let Some(owner) = self.var_owner(id, name) else {
            return Ok(None);
        };
        let node = &self.nodes[owner.index()];
        let Some(slot) = node.vars.get(name) else {
            return Ok(None);
        };
        match &*slot.state.borrow() {
            VarState::Evaluated(value) => return Ok(Some(value.clone())),
            VarState::InProgress => {
                return Err(Error::non_constant(format!(
                    "circular reference in {}/var/{name}",
                    node.path
                )));
            }
            VarState::Undefined => {
                return Err(Error::non_constant(format!(
                    "{}/var/{name} could not be evaluated",
                    node.path
                )));
            }
            VarState::NotEvaluated => {}
        }

        let Some(expr) = slot.expr.clone() else {
            slot.state.replace(VarState::Evaluated(Value::Null));
            return Ok(Some(Value::Null));
        };
        slot.state.replace(VarState::InProgress);
        match expr.evaluate_constant(&EvalContext::for_type(self, owner)) {
            Ok(value) => {
                slot.state.replace(VarState::Evaluated(value.clone()));
                Ok(Some(value))
            }
            Err(e) => {
                warn!("could not evaluate {}/var/{name}: {e}", node.path);
                slot.state.replace(VarState::Undefined);
                Err(e)
            }
        }
    }

    /// Attaches the arguments of a `FASTDMM_PROP(...)` call to `id`.
    ///
    /// Named arguments set properties; unnamed calls attach macros.
    /// Nothing is evaluated here.
    ///
    /// # Errors
    ///
    /// Returns a `TypeTree` error for unknown names and other arguments.
    pub fn attach_fastdmm(&mut self, id: TypeId, call: &ProcCall) -> Result<()> {
        for (arg, name) in call.args.iter().zip(&call.arg_names) {
            let node = &mut self.nodes[id.index()];
            match (name, arg) {
                (Some(name), Some(arg)) => {
                    let Some(prop) = FastdmmProp::from_name(name) else {
                        return Err(Error::type_tree(
                            format!("unrecognized FASTDMM_PROP property {name} in {}", node.path),
                            Some(call.pos.clone()),
                        ));
                    };
                    node.props.insert(prop, arg.clone());
                }
                (None, Some(Expr::Call(inner))) => {
                    let Some(kind) = FastdmmMacro::from_name(&inner.name) else {
                        return Err(Error::type_tree(
                            format!("unrecognized FASTDMM_PROP macro {} in {}", inner.name, node.path),
                            Some(inner.pos.clone()),
                        ));
                    };
                    node.macros.push(MacroCall {
                        kind,
                        call: inner.clone(),
                    });
                }
                _ => {
                    return Err(Error::type_tree(
                        format!("unexpected FASTDMM_PROP argument in {}", node.path),
                        Some(call.pos.clone()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The expression for `prop`, searching parents, with the type that
    /// declares it.
    #[must_use]
    pub fn fastdmm_prop(&self, id: TypeId, prop: FastdmmProp) -> Option<(TypeId, &Expr)> {
        self.ancestry(id)
            .find_map(|t| self.nodes[t.index()].props.get(&prop).map(|e| (t, e)))
    }

    /// Evaluates `prop` in the context of the type that declares it.
    ///
    /// # Errors
    ///
    /// Returns a `NonConstant` error if the expression is not constant.
    pub fn eval_fastdmm_prop(&self, id: TypeId, prop: FastdmmProp) -> Result<Option<Value>> {
        let Some((owner, expr)) = self.fastdmm_prop(id, prop) else {
            return Ok(None);
        };
        expr.evaluate_constant(&EvalContext::for_type(self, owner))
            .map(Some)
    }

    /// Macros of `kind` on `id` and its parents, with the type each was
    /// attached to.
    ///
    /// By default the most derived type comes first and each type's own
    /// macros are listed last-declared first. With `parent_first` the order
    /// is reversed.
    #[must_use]
    pub fn fastdmm_macros(
        &self,
        id: TypeId,
        kind: FastdmmMacro,
        parent_first: bool,
    ) -> Vec<(TypeId, &ProcCall)> {
        let mut out = Vec::new();
        for t in self.ancestry(id) {
            for m in self.nodes[t.index()].macros.iter().rev() {
                if m.kind == kind {
                    out.push((t, &m.call));
                }
            }
        }
        if parent_first {
            out.reverse();
        }
        out
    }

    /// Finishes the tree: resolves every parent link, evaluates every
    /// variable once so failures are logged up front, and sorts subtypes.
    ///
    /// # Errors
    ///
    /// Returns a `TypeTree` error for a `parent_type` that is not a path or
    /// null, or for a cycle of parents.
    pub fn finalize(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.nodes.len() {
            self.resolve_parent(TypeId(u32::try_from(i).unwrap_or(u32::MAX)))?;
            i += 1;
        }
        debug!(types = self.nodes.len(), "resolved parent types");

        let mut failures = 0usize;
        for id in self.ids() {
            let names: Vec<String> = self.nodes[id.index()].vars.keys().cloned().collect();
            for name in names {
                if self.eval_var(id, &name).is_err() {
                    failures += 1;
                }
            }
        }
        debug!(failures, "evaluated type variables");

        let paths: Vec<Arc<str>> = self.nodes.iter().map(TypeNode::path_arc).collect();
        for node in &mut self.nodes {
            node.subtypes.sort_by(|a, b| paths[a.index()].cmp(&paths[b.index()]));
        }
        Ok(())
    }

    fn resolve_parent(&mut self, id: TypeId) -> Result<()> {
        match self.nodes[id.index()].parent {
            ParentLink::Root | ParentLink::Resolved(_) => return Ok(()),
            ParentLink::Resolving => {
                return Err(Error::type_tree(
                    format!("cyclic parent_type involving {}", self.path(id)),
                    None,
                ));
            }
            ParentLink::Unresolved => {}
        }
        self.nodes[id.index()].parent = ParentLink::Resolving;

        let declared = if self.nodes[id.index()].vars.contains_key("parent_type") {
            self.eval_var(id, "parent_type").map_err(|e| {
                Error::type_tree(
                    format!("cannot evaluate parent_type of {}: {e}", self.path(id)),
                    None,
                )
            })?
        } else {
            None
        };

        let link = match declared {
            None | Some(Value::Null) => ParentLink::Root,
            Some(Value::Typepath(Typepath { path, .. })) => {
                let parent = self.get_or_create(&path);
                self.resolve_parent(parent)?;
                self.nodes[parent.index()].subtypes.push(id);
                ParentLink::Resolved(parent)
            }
            Some(other) => {
                return Err(Error::type_tree(
                    format!(
                        "parent_type {} of {} is not null or a typepath",
                        render(&other, false),
                        self.path(id)
                    ),
                    None,
                ));
            }
        };
        self.nodes[id.index()].parent = link;
        Ok(())
    }
}

/// Adds `pos` to a type tree error that has none.
pub(crate) fn locate(mut err: Error, pos: &SourcePos) -> Error {
    if let ErrorKind::TypeTree { pos: slot, .. } = &mut err.kind {
        slot.get_or_insert_with(|| pos.clone());
    }
    err
}
