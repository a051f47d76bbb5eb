//! Objects placed on a map.
//!
//! An [`Instance`] is a type path plus the variables that differ from the
//! type's defaults. Instances are shared between tiles and the undo history
//! through `Rc`, so an instance must not change once it is on a map: build a
//! new one instead.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dmkit_foundation::{Result, Value, render};
use dmkit_language::{EvalContext, FastdmmMacro, FastdmmProp, TypeId, TypeRegistry, VarSource};
use im::OrdMap;
use tracing::warn;

use crate::appearance::Appearance;

/// Identifies an instance within its map. Used for change detection, never
/// for equality of content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Name that removes an override when used as a `set_instance_vars` value.
pub const INSTANCE_VAR_DEFAULT: &str = "INSTANCE_VAR_DEFAULT";

/// Name that leaves a variable untouched when used as a `set_instance_vars`
/// value.
pub const INSTANCE_VAR_KEEP: &str = "INSTANCE_VAR_KEEP";

// Noncharacter-prefixed strings cannot come out of a lexed literal.
const DEFAULT_MARKER: &str = "\u{FDDE}default";
const KEEP_MARKER: &str = "\u{FDDE}keep";

/// A typed object with its own variable overrides.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    path: Arc<str>,
    type_id: Option<TypeId>,
    vars: OrdMap<Arc<str>, Value>,
    appearance: OnceCell<Appearance>,
}

impl Instance {
    /// Creates an instance of `path` with the given overrides, then applies
    /// the type's `set_instance_vars` macros.
    ///
    /// An unknown path is not an error: the instance keeps its variables and
    /// renders with the error appearance.
    pub fn new(
        types: &TypeRegistry,
        id: InstanceId,
        path: &str,
        vars: impl IntoIterator<Item = (Arc<str>, Value)>,
    ) -> Self {
        let mut instance = Self {
            id,
            path: Arc::from(path),
            type_id: types.lookup(path),
            vars: vars.into_iter().collect(),
            appearance: OnceCell::new(),
        };
        instance.apply_instance_vars(types);
        instance
    }

    /// Copies this instance's type and overrides under a new id.
    ///
    /// The variable map is shared structurally with the original.
    #[must_use]
    pub fn copy(&self, id: InstanceId) -> Self {
        Self {
            id,
            path: Arc::clone(&self.path),
            type_id: self.type_id,
            vars: self.vars.clone(),
            appearance: OnceCell::new(),
        }
    }

    /// The instance id.
    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// The type path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The type, if the path names one in the tree.
    #[must_use]
    pub const fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Overrides, sorted by name.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// The override for `name`, if any.
    #[must_use]
    pub fn own_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// The value of `name`: the override, else the type's value.
    #[must_use]
    pub fn get_var(&self, types: &TypeRegistry, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.clone());
        }
        self.type_id.and_then(|id| types.get_var(id, name))
    }

    /// Sets an override. Only valid before the instance is placed.
    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(Arc::from(name), value);
        self.appearance = OnceCell::new();
    }

    /// Removes an override, returning it.
    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.appearance = OnceCell::new();
        self.vars.remove(name)
    }

    /// Returns true if this instance is of type `path` or, unless `strict`,
    /// one of its subtypes.
    ///
    /// For an unknown type the path prefix decides.
    #[must_use]
    pub fn is_a(&self, types: &TypeRegistry, path: &str, strict: bool) -> bool {
        if *self.path == *path {
            return true;
        }
        if strict {
            return false;
        }
        match self.type_id {
            Some(id) => types.is_a(id, path),
            None => self
                .path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('/')),
        }
    }

    /// The instance as it is written in a map file.
    ///
    /// With `pretty`, each override goes on its own line.
    #[must_use]
    pub fn signature(&self, pretty: bool) -> String {
        if self.vars.is_empty() {
            return self.path.to_string();
        }
        let entries: Vec<String> = self
            .vars
            .iter()
            .map(|(k, v)| format!("{k} = {}", render(v, false)))
            .collect();
        if pretty {
            format!("{}{{\n\t{}\n\t}}", self.path, entries.join(";\n\t"))
        } else {
            format!("{}{{{}}}", self.path, entries.join("; "))
        }
    }

    /// The derived appearance, computed once per set of overrides.
    pub fn appearance(&self, types: &TypeRegistry) -> &Appearance {
        self.appearance.get_or_init(|| {
            if self.type_id.is_none() {
                return Appearance::error();
            }
            Appearance::from_vars(|name| self.get_var(types, name))
        })
    }

    /// Evaluates a `FASTDMM_PROP` property of the instance's type.
    ///
    /// # Errors
    ///
    /// Returns a `NonConstant` error if the property fails to evaluate.
    pub fn fastdmm_prop(&self, types: &TypeRegistry, prop: FastdmmProp) -> Result<Option<Value>> {
        match self.type_id {
            Some(id) => types.eval_fastdmm_prop(id, prop),
            None => Ok(None),
        }
    }

    /// Runs the type's `set_instance_vars` macros. Own macros come before
    /// parent macros and the first macro to name a variable wins.
    fn apply_instance_vars(&mut self, types: &TypeRegistry) {
        let Some(type_id) = self.type_id else {
            return;
        };
        let macros = types.fastdmm_macros(type_id, FastdmmMacro::SetInstanceVars, false);
        if macros.is_empty() {
            return;
        }
        let markers: HashMap<String, Value> = [
            (INSTANCE_VAR_DEFAULT.to_string(), Value::string(DEFAULT_MARKER)),
            (INSTANCE_VAR_KEEP.to_string(), Value::string(KEEP_MARKER)),
        ]
        .into_iter()
        .collect();

        let mut touched: Vec<&str> = Vec::new();
        for (_, call) in macros {
            for (name, arg) in call.named_args() {
                let Some(name) = name else { continue };
                if touched.contains(&name) {
                    continue;
                }
                touched.push(name);
                let ctx = EvalContext::for_instance(types, &*self).with_var_overrides(&markers);
                let value = match arg.evaluate_constant(&ctx) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(path = %self.path, var = name, "set_instance_vars: {err}");
                        continue;
                    }
                };
                match value.as_str() {
                    Some(KEEP_MARKER) => {}
                    Some(DEFAULT_MARKER) => {
                        self.vars.remove(name);
                    }
                    _ => {
                        self.vars.insert(Arc::from(name), value);
                    }
                }
            }
        }
    }
}

impl VarSource for Instance {
    fn lookup_var(&self, types: Option<&TypeRegistry>, name: &str) -> Result<Option<Value>> {
        if let Some(value) = self.vars.get(name) {
            return Ok(Some(value.clone()));
        }
        match (types, self.type_id) {
            (Some(types), Some(id)) => types.eval_var(id, name),
            _ => Ok(None),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature(false))
    }
}
