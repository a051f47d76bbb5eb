//! Error types for dmkit.
//!
//! Uses `thiserror` for ergonomic error definition. Every fatal failure of the
//! front end or the map codec ends up as an [`Error`]; recoverable problems are
//! logged instead.

use std::fmt;

use thiserror::Error;

use crate::pos::SourcePos;

/// Result type alias using dmkit's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for dmkit operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Appends an include frame, creating the context if needed.
    #[must_use]
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_frame(file));
        self
    }

    /// Creates a preprocessor directive error.
    #[must_use]
    pub fn preprocess(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Preprocess {
            message: message.into(),
            pos,
        })
    }

    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Syntax {
            message: message.into(),
            pos,
        })
    }

    /// Creates a type tree error.
    #[must_use]
    pub fn type_tree(message: impl Into<String>, pos: Option<SourcePos>) -> Self {
        Self::new(ErrorKind::TypeTree {
            message: message.into(),
            pos,
        })
    }

    /// Creates a non-constant expression error.
    #[must_use]
    pub fn non_constant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NonConstant(message.into()))
    }

    /// Creates a map codec error.
    #[must_use]
    pub fn map(message: impl Into<String>, pos: Option<SourcePos>) -> Self {
        Self::new(ErrorKind::Map {
            message: message.into(),
            pos,
        })
    }

    /// Creates a resource exhaustion error.
    #[must_use]
    pub fn exhausted(limit: ResourceLimit) -> Self {
        Self::new(ErrorKind::ResourceExhausted(limit))
    }

    /// Creates a read failure error.
    #[must_use]
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io {
            path: path.into(),
            message: message.into(),
        })
    }

    /// Returns true if this is a non-constant evaluation failure.
    #[must_use]
    pub fn is_non_constant(&self) -> bool {
        matches!(self.kind, ErrorKind::NonConstant(_))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Malformed directive or macro use, or an `#error` directive.
    #[error("{pos}: {message}")]
    Preprocess {
        /// Description of the failure.
        message: String,
        /// Where the directive starts.
        pos: SourcePos,
    },

    /// Unexpected token while parsing.
    #[error("{pos}: syntax error: {message}")]
    Syntax {
        /// Description of the failure.
        message: String,
        /// The offending token's position.
        pos: SourcePos,
    },

    /// Structural problem in the type tree.
    #[error("{}{message}", prefix(.pos))]
    TypeTree {
        /// Description of the failure.
        message: String,
        /// Position of the declaration, when known.
        pos: Option<SourcePos>,
    },

    /// An expression touched something that is not a compile-time constant.
    #[error("non-constant expression: {0}")]
    NonConstant(String),

    /// Map parse or serialize failure.
    #[error("{}map error: {message}", prefix(.pos))]
    Map {
        /// Description of the failure.
        message: String,
        /// Position in the map text, when known.
        pos: Option<SourcePos>,
    },

    /// A recursion budget was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(ResourceLimit),

    /// A source reader failed.
    #[error("cannot read {path}: {message}")]
    Io {
        /// The path that was requested.
        path: String,
        /// The reader's message.
        message: String,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn prefix(pos: &Option<SourcePos>) -> String {
    pos.as_ref().map(|p| format!("{p}: ")).unwrap_or_default()
}

/// Recursion budgets that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLimit {
    /// Too many nested `#include`s.
    IncludeDepth {
        /// The configured limit.
        limit: usize,
        /// The include that went over the limit.
        file: String,
    },
    /// Too many nested macro expansions.
    ExpansionDepth {
        /// The configured limit.
        limit: usize,
        /// The macro being expanded when the limit was hit.
        name: String,
    },
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncludeDepth { limit, file } => {
                write!(f, "include depth ({limit}) exceeded at {file}")
            }
            Self::ExpansionDepth { limit, name } => {
                write!(f, "macro expansion depth ({limit}) exceeded in {name}")
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Chain of files being processed, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.stack {
            writeln!(f, "  included from {frame}")?;
        }
        Ok(())
    }
}
