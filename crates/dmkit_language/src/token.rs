//! Token types for the DM language.
//!
//! Tokens are the output of the lexer, the input and output of the
//! preprocessor, and the input of the parser and the type tree builder.

use std::fmt;
use std::sync::Arc;

use dmkit_foundation::{SourcePos, format_number};

/// A token from lexical analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The type and value of this token.
    pub kind: TokenKind,
    /// Where the token starts.
    pub pos: SourcePos,
    /// Whether whitespace or a comment came directly before this token.
    pub ws: bool,
}

/// Token types for the DM language.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// An identifier or keyword: `[A-Za-z0-9_]+` not starting with a digit.
    Word(String),
    /// Punctuation, from the fixed symbol table.
    Symbol(&'static str),
    /// A numeric literal.
    Number(f64),
    /// A string or file literal.
    Str(StringLit),
    /// A line or block comment, text included.
    Comment(String),
    /// A line break, with the indentation of the following line.
    Newline(usize),
    /// The preprocessed contents of an included file.
    Include(Include),
    /// Free text following `#error` / `#warn`.
    Raw(String),
}

/// A string literal split into literal text and embedded expressions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringLit {
    /// Literal segments and `[...]` embedded token lists, in order.
    pub parts: Vec<StrPart>,
    /// Written as `{"..."}`.
    pub multiline: bool,
    /// Written as `'...'`.
    pub is_file: bool,
}

/// One segment of a string literal.
#[derive(Clone, Debug, PartialEq)]
pub enum StrPart {
    /// Literal text with escapes already applied.
    Text(String),
    /// Tokens of an embedded `[...]` expression.
    Embed(Vec<Token>),
}

/// An included file: its name and preprocessed tokens.
#[derive(Clone, Debug, PartialEq)]
pub struct Include {
    /// The resolved path of the included file.
    pub file: Arc<str>,
    /// The file's preprocessed tokens.
    pub tokens: Arc<Vec<Token>>,
}

impl StringLit {
    /// Creates a literal with a single text segment.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![StrPart::Text(text.into())],
            ..Self::default()
        }
    }

    /// Returns the text if the literal has no embedded expressions.
    #[must_use]
    pub fn as_plain(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                StrPart::Text(t) => out.push_str(t),
                StrPart::Embed(_) => return None,
            }
        }
        Some(out)
    }
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, pos: SourcePos, ws: bool) -> Self {
        Self { kind, pos, ws }
    }

    /// Returns a copy of this token stamped with another position.
    #[must_use]
    pub fn restamped(&self, pos: &SourcePos) -> Self {
        Self {
            kind: self.kind.clone(),
            pos: pos.clone(),
            ws: self.ws,
        }
    }

    /// Returns the word, if this is a word token.
    #[must_use]
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Returns the symbol, if this is a symbol token.
    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        match self.kind {
            TokenKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is the given symbol.
    #[must_use]
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.symbol() == Some(symbol)
    }

    /// Returns true if this is the given word.
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        self.word() == Some(word)
    }

    /// Returns true if this is a newline.
    #[must_use]
    pub const fn is_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Newline(_))
    }

    /// Returns true if this is a comment.
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::Comment(_))
    }
}

impl TokenKind {
    /// Returns a short name for this token type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Word(_) => "word",
            Self::Symbol(_) => "symbol",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Comment(_) => "comment",
            Self::Newline(_) => "newline",
            Self::Include(_) => "include",
            Self::Raw(_) => "raw text",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Word(w) => f.write_str(w),
            TokenKind::Symbol(s) => f.write_str(s),
            TokenKind::Number(n) => f.write_str(&format_number(*n)),
            TokenKind::Str(s) => {
                let (open, close) = if s.is_file {
                    ("'", "'")
                } else if s.multiline {
                    ("{\"", "\"}")
                } else {
                    ("\"", "\"")
                };
                f.write_str(open)?;
                for part in &s.parts {
                    match part {
                        StrPart::Text(t) => f.write_str(t)?,
                        StrPart::Embed(tokens) => write!(f, "[{}]", stringify_tokens(tokens))?,
                    }
                }
                f.write_str(close)
            }
            TokenKind::Comment(c) | TokenKind::Raw(c) => f.write_str(c),
            TokenKind::Newline(_) => f.write_str("\n"),
            TokenKind::Include(_) => Ok(()),
        }
    }
}

/// Joins tokens back into source-like text, inserting a space wherever the
/// lexer saw whitespace.
#[must_use]
pub fn stringify_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i != 0 && token.ws && !token.is_newline() {
            out.push(' ');
        }
        out.push_str(&token.to_string());
    }
    out
}
