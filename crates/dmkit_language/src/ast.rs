//! Expression syntax tree.
//!
//! Nodes are immutable once parsed and are evaluated against a caller
//! supplied context (see [`crate::eval`]).

use dmkit_foundation::SourcePos;

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `op operand`, for `~ ! - ++ --`.
    Prefix {
        /// The operator.
        op: &'static str,
        /// The operand.
        operand: Box<Expr>,
    },
    /// `operand op`, for `++ --`.
    Postfix {
        /// The operator.
        op: &'static str,
        /// The operand.
        operand: Box<Expr>,
    },
    /// `lhs op rhs`.
    Binary {
        /// The operator.
        op: &'static str,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`.
    Ternary {
        /// The condition.
        cond: Box<Expr>,
        /// Value when the condition is truthy.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// A numeric literal.
    Number(f64),
    /// A string literal, possibly with embedded expressions.
    Str(Vec<StrSegment>),
    /// A file literal (`'icon.dmi'`).
    File(String),
    /// A path literal.
    Path(PathExpr),
    /// A variable access, optionally through a receiver.
    Var {
        /// The variable name.
        name: String,
        /// The receiver for `a.b` style access.
        receiver: Option<Box<Expr>>,
        /// The access symbol (`.`, `:`, `?.`, `?:`) when there is a receiver.
        accessor: Option<&'static str>,
    },
    /// `list[index]`.
    Index {
        /// The indexed expression.
        list: Box<Expr>,
        /// The index.
        index: Box<Expr>,
    },
    /// A proc call.
    Call(ProcCall),
    /// `new [type][(args)]`.
    New {
        /// The type expression, if one was given.
        type_expr: Option<Box<Expr>>,
        /// Arguments; `None` marks an elided argument.
        args: Vec<Option<Expr>>,
        /// Argument names parallel to `args`.
        arg_names: Vec<Option<String>>,
    },
}

/// One segment of a string literal.
#[derive(Clone, Debug, PartialEq)]
pub enum StrSegment {
    /// Literal text.
    Text(String),
    /// An embedded `[...]` expression.
    Expr(Expr),
}

/// A path literal such as `/obj/item{name = "x"}`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathExpr {
    /// The leading separator: `/`, `.` or `:`.
    pub leading: &'static str,
    /// The path segments, separators dropped.
    pub names: Vec<String>,
    /// Override variables, in source order.
    pub overrides: Option<Vec<(String, Expr)>>,
    /// Position of the leading separator.
    pub pos: SourcePos,
}

impl PathExpr {
    /// Returns the path as text, always starting with `/`.
    #[must_use]
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for name in &self.names {
            out.push('/');
            out.push_str(name);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

/// A call such as `rgb(1, 2, 3)` or `src.proc(x = 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcCall {
    /// The proc name.
    pub name: String,
    /// Arguments; `None` marks an elided argument.
    pub args: Vec<Option<Expr>>,
    /// Argument names parallel to `args`.
    pub arg_names: Vec<Option<String>>,
    /// The receiver, for member calls.
    pub receiver: Option<Box<Expr>>,
    /// The access symbol when there is a receiver.
    pub accessor: Option<&'static str>,
    /// Position of the proc name.
    pub pos: SourcePos,
}

impl ProcCall {
    /// Iterates over `(name, argument)` pairs, skipping elided arguments.
    pub fn named_args(&self) -> impl Iterator<Item = (Option<&str>, &Expr)> {
        self.args
            .iter()
            .zip(&self.arg_names)
            .filter_map(|(arg, name)| arg.as_ref().map(|a| (name.as_deref(), a)))
    }
}

impl Expr {
    /// Returns the call, if this is one.
    #[must_use]
    pub const fn as_call(&self) -> Option<&ProcCall> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Returns the variable name, if this is a plain variable access.
    #[must_use]
    pub fn as_plain_var(&self) -> Option<&str> {
        match self {
            Self::Var {
                name,
                receiver: None,
                ..
            } => Some(name),
            _ => None,
        }
    }
}
