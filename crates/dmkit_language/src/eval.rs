//! Constant evaluation of expressions.
//!
//! Evaluation never has side effects. Anything that would need a running
//! world (proc calls other than the builtins, member access, assignment)
//! fails with a `NonConstant` error, which callers treat as
//! recoverable.
//!
//! Variable lookup order:
//! 1. caller-supplied overrides
//! 2. `null`
//! 3. variables of the root type `/`
//! 4. the variables of `src`

mod builtins;
mod operators;

use std::collections::HashMap;
use std::sync::Arc;

use dmkit_foundation::{DeferredNew, Error, List, Result, Typepath, Value};

use crate::ast::{Expr, PathExpr, ProcCall, StrSegment};
use crate::types::{TypeId, TypeRegistry};

/// Something whose variables an expression may read as `src`.
pub trait VarSource {
    /// Looks up `name`. `Ok(None)` means the source has no such variable.
    ///
    /// # Errors
    ///
    /// Returns a `NonConstant` error if the variable exists but cannot be
    /// evaluated.
    fn lookup_var(&self, types: Option<&TypeRegistry>, name: &str) -> Result<Option<Value>>;
}

/// What `src` refers to during evaluation.
#[derive(Clone, Copy, Default)]
pub enum Src<'a> {
    /// No `src`.
    #[default]
    None,
    /// A type's initial values.
    Type(TypeId),
    /// An object with its own variables.
    Instance(&'a dyn VarSource),
}

/// A caller-supplied implementation of a proc.
pub type ProcOverride = fn(&ProcCall, &EvalContext<'_>) -> Result<Value>;

/// Everything an evaluation can see.
#[derive(Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// The type registry, for root and type variables.
    pub types: Option<&'a TypeRegistry>,
    /// The `src` object.
    pub src: Src<'a>,
    /// Variables that shadow everything else.
    pub var_overrides: Option<&'a HashMap<String, Value>>,
    /// Procs that shadow the builtins.
    pub proc_overrides: Option<&'a HashMap<String, ProcOverride>>,
}

impl<'a> EvalContext<'a> {
    /// A context that sees nothing but literals and builtins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that sees root variables but has no `src`.
    #[must_use]
    pub fn with_types(types: &'a TypeRegistry) -> Self {
        Self {
            types: Some(types),
            ..Self::default()
        }
    }

    /// A context whose `src` is the type `id`.
    #[must_use]
    pub fn for_type(types: &'a TypeRegistry, id: TypeId) -> Self {
        Self {
            types: Some(types),
            src: Src::Type(id),
            ..Self::default()
        }
    }

    /// A context whose `src` is an object.
    #[must_use]
    pub fn for_instance(types: &'a TypeRegistry, src: &'a dyn VarSource) -> Self {
        Self {
            types: Some(types),
            src: Src::Instance(src),
            ..Self::default()
        }
    }

    /// Adds variable overrides.
    #[must_use]
    pub const fn with_var_overrides(mut self, vars: &'a HashMap<String, Value>) -> Self {
        self.var_overrides = Some(vars);
        self
    }

    /// Adds proc overrides.
    #[must_use]
    pub const fn with_proc_overrides(mut self, procs: &'a HashMap<String, ProcOverride>) -> Self {
        self.proc_overrides = Some(procs);
        self
    }

    fn lookup_var(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.var_overrides.and_then(|vars| vars.get(name)) {
            return Ok(value.clone());
        }
        if name == "null" {
            return Ok(Value::Null);
        }
        if let Some(types) = self.types {
            if let Some(value) = types.eval_var(types.root(), name)? {
                return Ok(value);
            }
        }
        let found = match self.src {
            Src::None => None,
            Src::Type(id) => match self.types {
                Some(types) => types.eval_var(id, name)?,
                None => None,
            },
            Src::Instance(src) => src.lookup_var(self.types, name)?,
        };
        found.ok_or_else(|| Error::non_constant(format!("undefined variable {name}")))
    }
}

/// Returns true if `name` is a proc the evaluator runs itself.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    matches!(name, "list" | "newlist" | "matrix" | "rgb") || builtins::lookup(name).is_some()
}

/// Names of the builtin procs, excluding the list and color constructors.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    builtins::names()
}

impl Expr {
    /// Evaluates this expression to a constant.
    ///
    /// # Errors
    ///
    /// Returns a `NonConstant` error if the expression depends on anything
    /// that is not known at compile time, or on a variable that fails to
    /// evaluate.
    pub fn evaluate_constant(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        match self {
            Self::Number(n) => Ok(Value::Number(*n)),
            Self::Str(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        StrSegment::Text(text) => out.push_str(text),
                        StrSegment::Expr(expr) => {
                            out.push_str(&expr.evaluate_constant(ctx)?.to_text());
                        }
                    }
                }
                Ok(Value::string(out))
            }
            Self::File(name) => Ok(Value::File(Arc::from(name.as_str()))),
            Self::Path(path) => evaluate_path(path, ctx),
            Self::Var {
                name,
                receiver: None,
                ..
            } => ctx.lookup_var(name),
            Self::Var { name, .. } => Err(Error::non_constant(format!(
                "member access to {name}"
            ))),
            Self::Prefix { op, operand } => {
                operators::prefix(op, &operand.evaluate_constant(ctx)?)
            }
            Self::Postfix { op, .. } => Err(Error::non_constant(format!("{op} has side effects"))),
            Self::Binary { op: "&&", lhs, rhs } => {
                let left = lhs.evaluate_constant(ctx)?;
                if left.is_truthy() {
                    rhs.evaluate_constant(ctx)
                } else {
                    Ok(left)
                }
            }
            Self::Binary { op: "||", lhs, rhs } => {
                let left = lhs.evaluate_constant(ctx)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    rhs.evaluate_constant(ctx)
                }
            }
            Self::Binary { op, lhs, rhs } => {
                if op.ends_with('=') && !matches!(*op, "==" | "!=" | "<=" | ">=" | "~=") {
                    return Err(Error::non_constant(format!("{op} has side effects")));
                }
                let left = lhs.evaluate_constant(ctx)?;
                let right = rhs.evaluate_constant(ctx)?;
                operators::binary(op, &left, &right)
            }
            Self::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if cond.evaluate_constant(ctx)?.is_truthy() {
                    then.evaluate_constant(ctx)
                } else {
                    otherwise.evaluate_constant(ctx)
                }
            }
            Self::Index { .. } => Err(Error::non_constant("list indexing")),
            Self::Call(call) => evaluate_call(call, ctx),
            Self::New {
                type_expr,
                args,
                arg_names,
            } => {
                let type_path = match type_expr {
                    Some(expr) => Some(Box::new(expr.evaluate_constant(ctx)?)),
                    None => None,
                };
                Ok(Value::New(DeferredNew {
                    type_path,
                    args: evaluate_args(args, ctx)?,
                    arg_names: arg_names
                        .iter()
                        .map(|n| n.as_deref().map(Arc::from))
                        .collect(),
                }))
            }
        }
    }
}

/// Paths evaluate to absolute typepaths whatever their leading separator, so
/// `.proc/x` and `:foo` become `/proc/x` and `/foo`.
fn evaluate_path(path: &PathExpr, ctx: &EvalContext<'_>) -> Result<Value> {
    let text = path.path_string();
    match &path.overrides {
        None => Ok(Value::path(text)),
        Some(overrides) => {
            let vars = overrides
                .iter()
                .map(|(name, expr)| Ok((Arc::from(name.as_str()), expr.evaluate_constant(ctx)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Typepath(Typepath::with_vars(text, vars)))
        }
    }
}

fn evaluate_args(args: &[Option<Expr>], ctx: &EvalContext<'_>) -> Result<Vec<Option<Value>>> {
    args.iter()
        .map(|arg| arg.as_ref().map(|a| a.evaluate_constant(ctx)).transpose())
        .collect()
}

fn evaluate_call(call: &ProcCall, ctx: &EvalContext<'_>) -> Result<Value> {
    if call.receiver.is_some() {
        return Err(Error::non_constant(format!("{}() on an object", call.name)));
    }
    if let Some(proc) = ctx.proc_overrides.and_then(|procs| procs.get(&call.name)) {
        return proc(call, ctx);
    }
    match call.name.as_str() {
        "list" => evaluate_list(call, ctx),
        "newlist" => {
            let items = call
                .named_args()
                .map(|(_, arg)| arg.evaluate_constant(ctx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::NewList(items))
        }
        "matrix" => evaluate_matrix(call, ctx),
        "rgb" => evaluate_rgb(call, ctx),
        name => {
            let Some(builtin) = builtins::lookup(name) else {
                return Err(Error::non_constant(format!("call to {name}()")));
            };
            let args: Vec<Value> = evaluate_args(&call.args, ctx)?
                .into_iter()
                .map(|arg| arg.unwrap_or(Value::Null))
                .collect();
            builtin(&args)
        }
    }
}

/// `list(a, b = c, "d" = e)`: named and `key = value` arguments become
/// associations.
fn evaluate_list(call: &ProcCall, ctx: &EvalContext<'_>) -> Result<Value> {
    let mut list = List::new();
    for (arg, name) in call.args.iter().zip(&call.arg_names) {
        let Some(arg) = arg else {
            list.push(None, None);
            continue;
        };
        if let Some(name) = name {
            list.push(
                Some(Value::string(name.as_str())),
                Some(arg.evaluate_constant(ctx)?),
            );
            continue;
        }
        if let Expr::Binary { op: "=", lhs, rhs } = arg {
            let key = match lhs.as_plain_var() {
                Some(name) => Value::string(name),
                None => lhs.evaluate_constant(ctx)?,
            };
            list.push(Some(key), Some(rhs.evaluate_constant(ctx)?));
            continue;
        }
        list.push(Some(arg.evaluate_constant(ctx)?), None);
    }
    Ok(Value::List(list))
}

fn numeric_args(call: &ProcCall, ctx: &EvalContext<'_>) -> Result<Vec<f64>> {
    call.named_args()
        .map(|(_, arg)| operators::number(&arg.evaluate_constant(ctx)?, &call.name))
        .collect()
}

fn evaluate_matrix(call: &ProcCall, ctx: &EvalContext<'_>) -> Result<Value> {
    let args = numeric_args(call, ctx)?;
    match args.as_slice() {
        [] => Ok(Value::Matrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])),
        [a, b, c, d, e, f] => Ok(Value::Matrix([*a, *b, *c, *d, *e, *f])),
        _ => Err(Error::non_constant(format!(
            "matrix() with {} arguments",
            args.len()
        ))),
    }
}

/// `rgb(r, g, b[, a])` as `#rrggbb[aa]`, each channel clamped to 0..=255.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn evaluate_rgb(call: &ProcCall, ctx: &EvalContext<'_>) -> Result<Value> {
    let args = numeric_args(call, ctx)?;
    if !(3..=4).contains(&args.len()) {
        return Err(Error::non_constant(format!(
            "rgb() with {} arguments",
            args.len()
        )));
    }
    let mut out = String::from("#");
    for channel in args {
        let byte = channel.round().clamp(0.0, 255.0) as u8;
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(Value::string(out))
}
