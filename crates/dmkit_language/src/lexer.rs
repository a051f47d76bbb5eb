//! Lexer for the DM language.
//!
//! The lexer converts source text into a flat stream of tokens. It never
//! fails: characters it does not recognize are reported as [`Diagnostic`]s
//! and skipped.

use std::fmt;
use std::sync::Arc;

use dmkit_foundation::{SourcePos, TEXT_MACROS};
use tracing::warn;

use crate::token::{StrPart, StringLit, Token, TokenKind};

/// Symbols by length: one, two and three characters.
pub const SYMBOLS: [&[&str]; 3] = [
    &[
        "!", "#", "%", "&", "(", ")", "*", "+", ",", "-", ".", "/", ":", ";", "<", "=", ">", "?",
        "[", "]", "^", "{", "|", "}", "~",
    ],
    &[
        "!=", "##", "%=", "&&", "**", "*=", "++", "+=", "--", "-=", "..", "/=", "<<", "<=", "<>",
        "==", ">=", ">>", "?.", "?:", "^=", "|=", "||", "~!", "~=",
    ],
    &["...", ">>=", "<<="],
];

/// For each ASCII byte, bit `n` is set if some symbol of length `n + 1`
/// starts with it.
const SYMBOL_STARTS: [u8; 128] = symbol_starts();

const fn symbol_starts() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut group = 0;
    while group < SYMBOLS.len() {
        let symbols = SYMBOLS[group];
        let mut i = 0;
        while i < symbols.len() {
            let first = symbols[i].as_bytes()[0] as usize;
            table[first] |= 1 << group;
            i += 1;
        }
        group += 1;
    }
    table
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A recoverable problem found while lexing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the problem is.
    pub pos: SourcePos,
    /// What the problem is.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// The result of lexing one file.
#[derive(Clone, Debug, Default)]
pub struct Lexed {
    /// The token stream.
    pub tokens: Vec<Token>,
    /// Warnings for skipped characters.
    pub diagnostics: Vec<Diagnostic>,
}

/// Lexer for DM source code.
pub struct Lexer {
    file: Arc<str>,
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    /// Creates a lexer over `text`, normalizing line endings to `\n`.
    #[must_use]
    pub fn new(file: &str, text: &str) -> Self {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            file: file.into(),
            chars: text.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenizes the whole input.
    #[must_use]
    pub fn tokenize(mut self) -> Lexed {
        let tokens = self.lex(None);
        Lexed {
            tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos {
            file: Arc::clone(&self.file),
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn bump(&mut self) {
        match self.peek(0) {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => return,
        }
        self.index += 1;
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn text_from(&self, start: usize) -> String {
        self.chars[start..self.index].iter().collect()
    }

    fn match_symbol(&self) -> Option<&'static str> {
        let c = self.peek(0)?;
        let mask = *SYMBOL_STARTS.get(c as usize)?;
        if mask == 0 {
            return None;
        }
        for len in (1..=SYMBOLS.len()).rev() {
            if mask & (1 << (len - 1)) == 0 {
                continue;
            }
            if let Some(symbol) = SYMBOLS[len - 1].iter().find(|s| self.starts_with(s)) {
                return Some(symbol);
            }
        }
        None
    }

    /// Lexes until the end of input, or until `end_on` appears outside of any
    /// bracket opened inside this call.
    fn lex(&mut self, end_on: Option<char>) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut brackets: Vec<&'static str> = Vec::new();
        let mut ws = false;

        while let Some(c) = self.peek(0) {
            if Some(c) == end_on && brackets.is_empty() {
                break;
            }
            if c == ' ' || c == '\t' {
                self.bump();
                ws = true;
                continue;
            }
            if self.starts_with("//") {
                let pos = self.pos();
                let start = self.index;
                while let Some(c) = self.peek(0) {
                    if c == '\n' && self.chars.get(self.index - 1) != Some(&'\\') {
                        break;
                    }
                    self.bump();
                }
                tokens.push(Token::new(TokenKind::Comment(self.text_from(start)), pos, ws));
                ws = true;
                continue;
            }
            if self.starts_with("/*") {
                let pos = self.pos();
                let start = self.index;
                self.bump_n(2);
                // block comments nest
                let mut depth = 0usize;
                while self.peek(0).is_some() {
                    if self.starts_with("*/") {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    } else if self.starts_with("/*") {
                        depth += 1;
                    }
                    self.bump();
                }
                self.bump_n(2);
                tokens.push(Token::new(TokenKind::Comment(self.text_from(start)), pos, ws));
                ws = true;
                continue;
            }
            if c == '"' || c == '\'' || (c == '{' && self.peek(1) == Some('"')) {
                let escapes = !follows_include(&tokens);
                let token = self.lex_string(c, escapes, ws);
                tokens.push(token);
                ws = false;
                continue;
            }
            if c == '@' {
                let token = self.lex_raw_string(ws);
                tokens.push(token);
                ws = false;
                continue;
            }
            if let Some(symbol) = self.match_symbol() {
                tokens.push(Token::new(TokenKind::Symbol(symbol), self.pos(), ws));
                ws = false;
                self.bump_n(symbol.len());
                if end_on.is_some() {
                    match symbol {
                        "(" => brackets.push(")"),
                        "[" => brackets.push("]"),
                        "{" => brackets.push("}"),
                        _ if brackets.last() == Some(&symbol) => {
                            brackets.pop();
                        }
                        _ => {}
                    }
                }
                continue;
            }
            if self.starts_with("1.#INF") {
                tokens.push(Token::new(TokenKind::Number(f64::INFINITY), self.pos(), ws));
                ws = false;
                self.bump_n(6);
                continue;
            }
            if c == '\\' && self.peek(1) == Some('\n') {
                self.bump_n(2);
                continue;
            }
            if c == '\n' {
                self.bump();
                let pos = self.pos();
                // tabs and spaces count the same
                let mut indent = 0;
                while matches!(self.peek(0), Some(' ' | '\t')) {
                    indent += 1;
                    self.bump();
                }
                tokens.push(Token::new(TokenKind::Newline(indent), pos, ws));
                ws = true;
                continue;
            }
            if c.is_ascii_digit() {
                let token = self.lex_number(ws);
                tokens.push(token);
                ws = false;
                continue;
            }
            if is_name_char(c) {
                let pos = self.pos();
                let start = self.index;
                while self.peek(0).is_some_and(is_name_char) {
                    self.bump();
                }
                let word = self.text_from(start);
                let directive_text = (word == "error" || word == "warn")
                    && tokens.last().is_some_and(|t| t.is_symbol("#"));
                tokens.push(Token::new(TokenKind::Word(word), pos, ws));
                if directive_text {
                    while matches!(self.peek(0), Some(' ' | '\t')) {
                        self.bump();
                    }
                    let pos = self.pos();
                    let start = self.index;
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                    tokens.push(Token::new(TokenKind::Raw(self.text_from(start)), pos, false));
                }
                ws = false;
                continue;
            }
            let diagnostic = Diagnostic {
                pos: self.pos(),
                message: format!("unrecognized character {c:?}"),
            };
            warn!("{diagnostic}");
            self.diagnostics.push(diagnostic);
            self.bump();
        }
        tokens
    }

    fn lex_string(&mut self, open: char, escapes: bool, ws: bool) -> Token {
        let pos = self.pos();
        let (end, multiline, is_file) = match open {
            '{' => ("\"}", true, false),
            '\'' => ("'", false, true),
            _ => ("\"", false, false),
        };
        self.bump_n(end.len());

        let mut parts = Vec::new();
        let mut text = String::new();
        while self.peek(0).is_some() && !self.starts_with(end) {
            let Some(c) = self.peek(0) else { break };
            if escapes && c == '\\' {
                self.bump();
                let Some(escaped) = self.peek(0) else { break };
                match escaped {
                    '<' => text.push_str("&lt;"),
                    '>' => text.push_str("&gt;"),
                    'n' => text.push('\n'),
                    'r' => text.push('\r'),
                    _ => {
                        if let Some((ch, name)) =
                            TEXT_MACROS.iter().find(|(_, name)| self.starts_with(name))
                        {
                            text.push(*ch);
                            self.bump_n(name.len());
                            if self.peek(0) == Some(' ') {
                                self.bump();
                            }
                            continue;
                        }
                        text.push(escaped);
                    }
                }
                self.bump();
            } else if escapes && c == '[' {
                self.bump();
                parts.push(StrPart::Text(std::mem::take(&mut text)));
                let embedded = self.lex(Some(']'));
                parts.push(StrPart::Embed(embedded));
                self.bump();
            } else {
                text.push(c);
                self.bump();
            }
        }
        self.bump_n(end.len());
        parts.push(StrPart::Text(text));
        let lit = StringLit {
            parts,
            multiline,
            is_file,
        };
        Token::new(TokenKind::Str(lit), pos, ws)
    }

    fn lex_raw_string(&mut self, ws: bool) -> Token {
        let pos = self.pos();
        self.bump();
        let end: String = if self.starts_with("{\"") {
            self.bump_n(2);
            "\"}".to_string()
        } else {
            let delimiter = self.peek(0).map(String::from).unwrap_or_default();
            self.bump();
            delimiter
        };
        let start = self.index;
        while self.peek(0).is_some() && !self.starts_with(&end) {
            self.bump();
        }
        let text = self.text_from(start);
        self.bump_n(end.chars().count());
        Token::new(TokenKind::Str(StringLit::text(text)), pos, ws)
    }

    #[allow(clippy::cast_precision_loss)]
    fn lex_number(&mut self, ws: bool) -> Token {
        let pos = self.pos();
        let start = self.index;
        let value = if self.peek(0) == Some('0') && self.peek(1) == Some('x') {
            self.bump_n(2);
            while self.peek(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits: String = self.chars[start + 2..self.index].iter().collect();
            u64::from_str_radix(&digits, 16).map_or(f64::NAN, |v| v as f64)
        } else {
            while let Some(c) = self.peek(0) {
                if c.is_ascii_digit() || c == '.' {
                    self.bump();
                } else if c == 'e' || c == 'E' {
                    self.bump();
                    if matches!(self.peek(0), Some('+' | '-')) {
                        self.bump();
                    }
                } else {
                    break;
                }
            }
            self.text_from(start).parse().unwrap_or(f64::NAN)
        };
        Token::new(TokenKind::Number(value), pos, ws)
    }
}

/// Strings directly after `#include` are paths: no escapes, no embedding.
fn follows_include(tokens: &[Token]) -> bool {
    match tokens {
        [.., hash, word] => hash.is_symbol("#") && word.is_word("include"),
        _ => false,
    }
}

/// Tokenizes `text`, discarding diagnostics (they are still logged).
#[must_use]
pub fn tokenize(file: &str, text: &str) -> Vec<Token> {
    Lexer::new(file, text).tokenize().tokens
}
