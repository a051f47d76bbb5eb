//! Front end for the DM language.
//!
//! This crate provides:
//! - [`Lexer`] - Tokenization of DM source, including embedded strings
//! - [`Preprocessor`] - Macros, conditionals and `#include` through a
//!   [`FileCache`]
//! - [`parse_expression`] - Precedence-climbing expression parser
//! - [`TreeBuilder`] - Declaration walker that fills a [`TypeRegistry`]
//! - [`EvalContext`] - Constant evaluation of expressions
//! - [`Environment`] - The whole pipeline behind one call

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod builder;
pub mod eval;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod preprocess;
pub mod reader;
pub mod stddef;
pub mod token;
pub mod types;


pub use ast::{Expr, PathExpr, ProcCall, StrSegment};
pub use builder::TreeBuilder;
pub use eval::{EvalContext, ProcOverride, Src, VarSource, builtin_names, is_builtin};
pub use lexer::{Diagnostic, Lexed, Lexer, tokenize};
pub use loader::{Environment, Progress, eval_text};
pub use parser::{Cursor, parse_expression, parse_tokens};
pub use preprocess::{Define, DefineTable, Preprocessor};
pub use reader::{FileCache, MemoryReader, SourceReader, is_source_file, join_path};
pub use token::{Token, TokenKind};
pub use types::{
    FastdmmMacro, FastdmmProp, MacroCall, ParentLink, TypeId, TypeNode, TypeRegistry, VarMeta,
    VarSlot, VarState,
};
