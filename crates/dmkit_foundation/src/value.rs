//! Constant values produced by the evaluator.

use std::fmt;
use std::sync::Arc;

use crate::render;

/// A constant value.
///
/// Values are immutable and cheaply cloneable for the scalar variants;
/// composite variants own their children.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `null`.
    Null,
    /// A number. The language has a single numeric type.
    Number(f64),
    /// A text string.
    String(Arc<str>),
    /// A type path, optionally with override variables.
    Typepath(Typepath),
    /// A file reference (`'icon.dmi'`).
    File(Arc<str>),
    /// `list(...)`: parallel key/value sequences.
    List(List),
    /// `newlist(...)`: a list of paths to instantiate.
    NewList(Vec<Value>),
    /// `new T(...)`: construction deferred to whoever consumes the value.
    New(DeferredNew),
    /// `matrix(a, b, c, d, e, f)`.
    Matrix([f64; 6]),
}

/// A type path value such as `/obj/item{name = "x"}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Typepath {
    /// The absolute path.
    pub path: Arc<str>,
    /// Override variables in declaration order.
    pub vars: Option<Vec<(Arc<str>, Value)>>,
}

impl Typepath {
    /// Creates a typepath without overrides.
    #[must_use]
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            vars: None,
        }
    }

    /// Creates a typepath with overrides.
    #[must_use]
    pub fn with_vars(path: impl Into<Arc<str>>, vars: Vec<(Arc<str>, Value)>) -> Self {
        Self {
            path: path.into(),
            vars: Some(vars),
        }
    }
}

/// The value of a `list(...)` call.
///
/// `keys[i]` is the entry itself for plain lists; for associative entries
/// `values[i]` holds the associated value. A `None` key is an elided argument.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct List {
    /// Entry keys.
    pub keys: Vec<Option<Value>>,
    /// Associated values, parallel to `keys`.
    pub values: Vec<Option<Value>>,
}

impl List {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, key: Option<Value>, value: Option<Value>) {
        self.keys.push(key);
        self.values.push(value);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if any entry carries an associated value.
    #[must_use]
    pub fn is_assoc(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

/// A `new` expression kept as data.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredNew {
    /// The type being created, if one was given.
    pub type_path: Option<Box<Value>>,
    /// Positional arguments; `None` marks an elided argument.
    pub args: Vec<Option<Value>>,
    /// Argument names parallel to `args`.
    pub arg_names: Vec<Option<Arc<str>>>,
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Self::String(text.into())
    }

    /// Creates a typepath value without overrides.
    #[must_use]
    pub fn path(path: impl Into<Arc<str>>) -> Self {
        Self::Typepath(Typepath::new(path))
    }

    /// Returns true if this value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this value is truthy: anything but null, zero and the
    /// empty string.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Number(n) => *n != 0.0,
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Attempts to extract a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract a typepath.
    #[must_use]
    pub const fn as_typepath(&self) -> Option<&Typepath> {
        match self {
            Self::Typepath(t) => Some(t),
            _ => None,
        }
    }

    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Typepath(_) => "typepath",
            Self::File(_) => "file",
            Self::List(_) => "list",
            Self::NewList(_) => "newlist",
            Self::New(_) => "new",
            Self::Matrix(_) => "matrix",
        }
    }

    /// Returns the text this value produces when embedded in a string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(n) => render::format_number(*n),
            Self::String(s) | Self::File(s) => s.to_string(),
            Self::Typepath(t) => t.path.to_string(),
            Self::List(_) | Self::NewList(_) => "/list".to_string(),
            Self::New(n) => n
                .type_path
                .as_deref()
                .map_or_else(String::new, Self::to_text),
            Self::Matrix(_) => "/matrix".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render::render(self, false))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Typepath> for Value {
    fn from(t: Typepath) -> Self {
        Self::Typepath(t)
    }
}
