//! Expression parser.
//!
//! Recursive descent for primaries, precedence climbing for binary
//! operators. Works over a [`Cursor`], a copyable position in a token slice,
//! so lookahead is just a copy.

use dmkit_foundation::{Error, Result, SourcePos};

use crate::ast::{Expr, PathExpr, ProcCall, StrSegment};
use crate::token::{StrPart, Token, TokenKind};

/// Returns the binding power of a binary operator, or `None` if `op` is not
/// one.
#[must_use]
pub fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "**" => 13,
        "*" | "/" | "%" => 12,
        "+" | "-" => 11,
        "<" | "<=" | ">" | ">=" => 10,
        "<<" | ">>" => 9,
        "==" | "!=" | "<>" | "~=" | "~!" => 8,
        "&" => 7,
        "^" => 6,
        "|" => 5,
        "&&" => 4,
        "||" => 3,
        "?" => 2,
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => 1,
        _ => return None,
    })
}

/// Returns true for the right-associative operators: assignments and `?`.
#[must_use]
pub fn is_right_associative(op: &str) -> bool {
    matches!(
        op,
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" | "?"
    )
}

/// A position in a token slice.
///
/// Comments are always skipped. Newlines are returned by [`Cursor::peek`]
/// and consumed by [`Cursor::advance`]; every newline passed over updates
/// [`Cursor::indent`].
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    index: usize,
    indent: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at the start of `tokens`.
    #[must_use]
    pub const fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            index: 0,
            indent: 0,
        }
    }

    /// Indentation of the line the cursor is on.
    #[must_use]
    pub const fn indent(&self) -> usize {
        self.indent
    }

    /// The last consumed token.
    #[must_use]
    pub fn current(&self) -> Option<&'a Token> {
        self.index.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// The next token that is not a comment.
    #[must_use]
    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens[self.index..].iter().find(|t| !t.is_comment())
    }

    /// The next token that is neither a comment nor a newline.
    #[must_use]
    pub fn peek_skipping_newlines(&self) -> Option<&'a Token> {
        self.tokens[self.index..]
            .iter()
            .find(|t| !t.is_comment() && !t.is_newline())
    }

    /// Consumes the next non-comment token.
    pub fn advance(&mut self) {
        self.advance_inner(false);
    }

    /// Consumes the next token that is neither a comment nor a newline.
    pub fn advance_skipping_newlines(&mut self) {
        self.advance_inner(true);
    }

    fn advance_inner(&mut self, skip_newlines: bool) {
        for i in self.index..self.tokens.len() {
            let token = &self.tokens[i];
            if let TokenKind::Newline(indent) = token.kind {
                self.indent = indent;
                if skip_newlines {
                    continue;
                }
            }
            if token.is_comment() {
                continue;
            }
            self.index = i + 1;
            return;
        }
    }

    /// Consumes newlines, and semicolons too if asked.
    pub fn skip_newlines(&mut self, semicolons: bool) {
        while let Some(t) = self.peek() {
            if t.is_newline() || (semicolons && t.is_symbol(";")) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Returns true if only comments and newlines remain.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.peek_skipping_newlines().is_none()
    }

    /// The best position to blame: the next token, else the last one.
    #[must_use]
    pub fn error_pos(&self) -> SourcePos {
        self.peek()
            .or_else(|| self.current())
            .or_else(|| self.tokens.last())
            .map_or_else(|| SourcePos::start_of("<expression>"), |t| t.pos.clone())
    }

    fn peek_symbol(&self) -> Option<&'static str> {
        self.peek().and_then(Token::symbol)
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        match self.peek() {
            Some(t) if t.is_symbol(symbol) => {
                self.advance();
                Ok(())
            }
            other => Err(unexpected(other, &format!("'{symbol}'"), self.error_pos())),
        }
    }

    fn skip_newlines_only(&mut self) {
        self.skip_newlines(false);
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        None => "end of input".to_string(),
        Some(t) if t.is_newline() => "newline".to_string(),
        Some(t) => format!("'{t}'"),
    }
}

fn unexpected(found: Option<&Token>, expected: &str, pos: SourcePos) -> Error {
    Error::syntax(format!("expected {expected}, found {}", describe(found)), pos)
}

/// Parses a complete expression.
///
/// # Errors
///
/// Returns a `Syntax` error at the first unexpected token.
pub fn parse_expression(cursor: &mut Cursor<'_>) -> Result<Expr> {
    let lhs = parse_primary(cursor)?;
    parse_operators(cursor, lhs, 0)
}

/// Parses all of `tokens` as one expression; anything but newlines and
/// comments after it is an error.
///
/// # Errors
///
/// Returns a `Syntax` error for malformed or trailing input.
pub fn parse_tokens(tokens: &[Token]) -> Result<Expr> {
    let mut cursor = Cursor::new(tokens);
    let expr = parse_expression(&mut cursor)?;
    if let Some(extra) = cursor.peek_skipping_newlines() {
        return Err(Error::syntax(
            format!("unexpected {} after expression", describe(Some(extra))),
            extra.pos.clone(),
        ));
    }
    Ok(expr)
}

fn parse_operators(cursor: &mut Cursor<'_>, mut lhs: Expr, min_precedence: u8) -> Result<Expr> {
    while let Some(op) = cursor.peek_symbol() {
        let Some(op_precedence) = binary_precedence(op) else {
            break;
        };
        if op_precedence < min_precedence {
            break;
        }
        cursor.advance();

        let middle = if op == "?" {
            let middle = parse_expression(cursor)?;
            cursor.expect_symbol(":")?;
            Some(middle)
        } else {
            None
        };

        let mut rhs = parse_primary(cursor)?;
        while let Some(next) = cursor.peek_symbol() {
            let Some(next_precedence) = binary_precedence(next) else {
                break;
            };
            if next_precedence > op_precedence
                || (is_right_associative(next) && next_precedence == op_precedence)
            {
                rhs = parse_operators(cursor, rhs, next_precedence)?;
            } else {
                break;
            }
        }

        lhs = match middle {
            Some(then) => Expr::Ternary {
                cond: Box::new(lhs),
                then: Box::new(then),
                otherwise: Box::new(rhs),
            },
            None => Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        };
    }
    Ok(lhs)
}

/// Parses a primary expression and any postfix operators after it.
///
/// # Errors
///
/// Returns a `Syntax` error at the first unexpected token.
pub fn parse_primary(cursor: &mut Cursor<'_>) -> Result<Expr> {
    let Some(token) = cursor.peek() else {
        return Err(unexpected(None, "an expression", cursor.error_pos()));
    };
    cursor.advance();

    let mut expr = match &token.kind {
        TokenKind::Symbol(leading @ ("." | "/" | ":")) => parse_path(cursor, *leading, token)?,
        TokenKind::Symbol(op @ ("~" | "!" | "-" | "++" | "--")) => Expr::Prefix {
            op: *op,
            operand: Box::new(parse_primary(cursor)?),
        },
        TokenKind::Number(n) => Expr::Number(*n),
        TokenKind::Symbol("(") => {
            cursor.skip_newlines_only();
            let inner = parse_expression(cursor)?;
            cursor.skip_newlines_only();
            cursor.expect_symbol(")")?;
            inner
        }
        TokenKind::Word(w) if w == "new" => {
            let type_expr = match cursor.peek() {
                Some(t) if t.word().is_some() || matches!(t.symbol(), Some("/" | "." | ":")) => {
                    Some(Box::new(parse_expression(cursor)?))
                }
                _ => None,
            };
            if cursor.peek_symbol() == Some("(") {
                let (args, arg_names) = parse_call_args(cursor)?;
                Expr::New {
                    type_expr,
                    args,
                    arg_names,
                }
            } else {
                Expr::New {
                    type_expr,
                    args: Vec::new(),
                    arg_names: Vec::new(),
                }
            }
        }
        TokenKind::Word(w) => {
            if cursor.peek_symbol() == Some("(") {
                let (args, arg_names) = parse_call_args(cursor)?;
                let call = Expr::Call(ProcCall {
                    name: w.clone(),
                    args,
                    arg_names,
                    receiver: None,
                    accessor: None,
                    pos: token.pos.clone(),
                });
                if w == "call" && cursor.peek_symbol() == Some("(") {
                    let pos = cursor.error_pos();
                    let (args, arg_names) = parse_call_args(cursor)?;
                    Expr::Call(ProcCall {
                        name: "__call__".to_string(),
                        args,
                        arg_names,
                        receiver: Some(Box::new(call)),
                        accessor: None,
                        pos,
                    })
                } else {
                    call
                }
            } else {
                Expr::Var {
                    name: w.clone(),
                    receiver: None,
                    accessor: None,
                }
            }
        }
        TokenKind::Str(lit) if lit.is_file => match lit.parts.as_slice() {
            [StrPart::Text(text)] => Expr::File(text.clone()),
            _ => {
                return Err(Error::syntax(
                    "file literals cannot contain embedded expressions",
                    token.pos.clone(),
                ));
            }
        },
        TokenKind::Str(lit) => {
            let mut segments = Vec::with_capacity(lit.parts.len());
            for part in &lit.parts {
                segments.push(match part {
                    StrPart::Text(text) => StrSegment::Text(text.clone()),
                    StrPart::Embed(tokens) => StrSegment::Expr(parse_embedded(tokens, token)?),
                });
            }
            Expr::Str(segments)
        }
        _ => {
            return Err(Error::syntax(
                format!("unexpected {}", describe(Some(token))),
                token.pos.clone(),
            ));
        }
    };

    while let Some(next) = cursor.peek() {
        let Some(symbol) = next.symbol() else {
            break;
        };
        let attached = !next.ws || matches!(symbol, "--" | "++" | "[");
        if !attached || !matches!(symbol, "--" | "++" | "[" | "." | ":" | "?." | "?:") {
            break;
        }
        cursor.advance();
        expr = match symbol {
            "--" | "++" => Expr::Postfix {
                op: symbol,
                operand: Box::new(expr),
            },
            "[" => {
                let index = parse_expression(cursor)?;
                cursor.expect_symbol("]")?;
                Expr::Index {
                    list: Box::new(expr),
                    index: Box::new(index),
                }
            }
            accessor => {
                let name_token = cursor.peek();
                let Some(name) = name_token.and_then(Token::word) else {
                    return Err(unexpected(name_token, "a member name", cursor.error_pos()));
                };
                let pos = cursor.error_pos();
                cursor.advance();
                if cursor.peek_symbol() == Some("(") {
                    let (args, arg_names) = parse_call_args(cursor)?;
                    Expr::Call(ProcCall {
                        name: name.to_string(),
                        args,
                        arg_names,
                        receiver: Some(Box::new(expr)),
                        accessor: Some(accessor),
                        pos,
                    })
                } else {
                    Expr::Var {
                        name: name.to_string(),
                        receiver: Some(Box::new(expr)),
                        accessor: Some(accessor),
                    }
                }
            }
        };
    }
    Ok(expr)
}

fn parse_embedded(tokens: &[Token], string: &Token) -> Result<Expr> {
    if tokens.iter().all(|t| t.is_comment() || t.is_newline()) {
        return Err(Error::syntax("empty embedded expression", string.pos.clone()));
    }
    parse_tokens(tokens)
}

fn parse_path(cursor: &mut Cursor<'_>, leading: &'static str, token: &Token) -> Result<Expr> {
    let mut names = Vec::new();
    if let Some(word) = cursor.peek().and_then(Token::word) {
        names.push(word.to_string());
        cursor.advance();
    }
    while matches!(cursor.peek_symbol(), Some("." | "/" | ":")) {
        cursor.advance();
        let Some(word) = cursor.peek().and_then(Token::word) else {
            break;
        };
        names.push(word.to_string());
        cursor.advance();
    }

    let mut overrides = None;
    if cursor.peek_symbol() == Some("{") {
        cursor.advance();
        let mut entries: Vec<(String, Expr)> = Vec::new();
        let mut first = true;
        loop {
            cursor.skip_newlines_only();
            match cursor.peek() {
                None => return Err(unexpected(None, "'}'", cursor.error_pos())),
                Some(t) if t.is_symbol("}") => break,
                Some(_) => {}
            }
            if !first {
                cursor.expect_symbol(";")?;
                cursor.skip_newlines_only();
            }
            first = false;
            let next = cursor.peek();
            if next.is_some_and(|t| t.is_symbol(";") || t.is_symbol("}")) {
                continue;
            }
            let Some(name) = next.and_then(Token::word) else {
                return Err(unexpected(next, "a variable name", cursor.error_pos()));
            };
            cursor.advance();
            cursor.expect_symbol("=")?;
            let value = parse_expression(cursor)?;
            match entries.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value,
                None => entries.push((name.to_string(), value)),
            }
        }
        cursor.advance();
        overrides = Some(entries);
    }

    Ok(Expr::Path(PathExpr {
        leading,
        names,
        overrides,
        pos: token.pos.clone(),
    }))
}

/// Parses a parenthesized argument list; the cursor must be on the `(`.
///
/// Consecutive commas leave explicit gaps. `name = value` and
/// `"name" = value` give named arguments.
fn parse_call_args(cursor: &mut Cursor<'_>) -> Result<(Vec<Option<Expr>>, Vec<Option<String>>)> {
    cursor.expect_symbol("(")?;
    let mut args = Vec::new();
    let mut arg_names = Vec::new();
    cursor.skip_newlines_only();
    let mut prev_is_comma = false;

    loop {
        let Some(lookahead) = cursor.peek_skipping_newlines() else {
            return Err(unexpected(None, "')'", cursor.error_pos()));
        };
        if lookahead.is_symbol(")") {
            break;
        }
        if lookahead.is_symbol(",") {
            if prev_is_comma {
                args.push(None);
                arg_names.push(None);
            }
            prev_is_comma = true;
            cursor.advance_skipping_newlines();
            cursor.skip_newlines_only();
        } else if args.is_empty() || prev_is_comma {
            prev_is_comma = false;
            let mut probe = *cursor;
            probe.advance_skipping_newlines();
            let followed_by_equals = probe.peek().is_some_and(|t| t.is_symbol("="));
            let name = match &lookahead.kind {
                TokenKind::Word(w) if followed_by_equals => Some(w.clone()),
                TokenKind::Str(lit) if followed_by_equals => Some(lit.as_plain().unwrap_or_default()),
                _ => None,
            };
            if name.is_some() {
                cursor.advance_skipping_newlines();
                cursor.advance();
            }
            arg_names.push(name);
            args.push(Some(parse_expression(cursor)?));
        } else {
            return Err(unexpected(Some(lookahead), "',' or ')'", lookahead.pos.clone()));
        }
    }
    cursor.advance_skipping_newlines();
    Ok((args, arg_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> Expr {
        parse_tokens(&tokenize("t.dm", src)).unwrap()
    }

    fn parse_err(src: &str) -> Error {
        parse_tokens(&tokenize("t.dm", src)).unwrap_err()
    }

    fn binary(expr: &Expr) -> (&'static str, &Expr, &Expr) {
        match expr {
            Expr::Binary { op, lhs, rhs } => (op, lhs, rhs),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn precedence_climbing() {
        let expr = parse("1 + 2 * 3 ** 2");
        let (op, lhs, rhs) = binary(&expr);
        assert_eq!(op, "+");
        assert_eq!(*lhs, Expr::Number(1.0));
        let (op, _, rhs) = binary(rhs);
        assert_eq!(op, "*");
        assert_eq!(binary(rhs).0, "**");
    }

    #[test]
    fn left_associative_subtraction() {
        let expr = parse("10 - 3 - 2");
        let (op, lhs, rhs) = binary(&expr);
        assert_eq!(op, "-");
        assert_eq!(binary(lhs).0, "-");
        assert_eq!(*rhs, Expr::Number(2.0));
    }

    #[test]
    fn right_associative_ternary() {
        let expr = parse("1 ? 2 : 3 ? 4 : 5");
        let Expr::Ternary { otherwise, .. } = expr else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }

    #[test]
    fn right_associative_assignment() {
        let expr = parse("a = b = 3");
        let (op, _, rhs) = binary(&expr);
        assert_eq!(op, "=");
        assert_eq!(binary(rhs).0, "=");
    }

    #[test]
    fn path_with_overrides() {
        let expr = parse("/obj/item{name = \"x\";\n\tdir = 4;}");
        let Expr::Path(path) = expr else {
            panic!("expected path");
        };
        assert_eq!(path.path_string(), "/obj/item");
        let overrides = path.overrides.unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[1].0, "dir");
    }

    #[test]
    fn path_override_blank_entries() {
        let Expr::Path(path) = parse("/obj{;a = 1;;b = 2}") else {
            panic!("expected path");
        };
        assert_eq!(path.overrides.unwrap().len(), 2);
    }

    #[test]
    fn relative_path_keeps_leading_symbol() {
        let Expr::Path(path) = parse(".foo/bar") else {
            panic!("expected path");
        };
        assert_eq!(path.leading, ".");
        assert_eq!(path.names, vec!["foo", "bar"]);
    }

    #[test]
    fn call_with_gaps_and_names() {
        let Expr::Call(call) = parse("f(1,,x = 2, \"y\" = 3)") else {
            panic!("expected call");
        };
        assert_eq!(call.name, "f");
        assert_eq!(call.args.len(), 4);
        assert!(call.args[1].is_none());
        assert_eq!(call.arg_names[2].as_deref(), Some("x"));
        assert_eq!(call.arg_names[3].as_deref(), Some("y"));
    }

    #[test]
    fn call_args_may_span_lines() {
        let Expr::Call(call) = parse("list(\n\t1,\n\t2\n)") else {
            panic!("expected call");
        };
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn call_call_becomes_receiver() {
        let Expr::Call(call) = parse("call(x)(1)") else {
            panic!("expected call");
        };
        assert_eq!(call.name, "__call__");
        assert!(matches!(call.receiver.as_deref(), Some(Expr::Call(inner)) if inner.name == "call"));
    }

    #[test]
    fn new_forms() {
        assert!(matches!(parse("new"), Expr::New { type_expr: None, .. }));
        let Expr::New { type_expr, args, .. } = parse("new /obj/item(1, 2)") else {
            panic!("expected new");
        };
        assert!(matches!(type_expr.as_deref(), Some(Expr::Path(_))));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn postfix_and_member_access() {
        let expr = parse("a.b[1]++");
        let Expr::Postfix { op, operand } = expr else {
            panic!("expected postfix");
        };
        assert_eq!(op, "++");
        let Expr::Index { list, .. } = *operand else {
            panic!("expected index");
        };
        assert!(matches!(*list, Expr::Var { ref name, accessor: Some("."), .. } if name == "b"));
    }

    #[test]
    fn member_call() {
        let Expr::Call(call) = parse("src?.proc(1)") else {
            panic!("expected call");
        };
        assert_eq!(call.accessor, Some("?."));
        assert_eq!(call.name, "proc");
    }

    #[test]
    fn spaced_dot_is_not_member_access() {
        let err = parse_err("a .b");
        assert!(err.to_string().contains("after expression"));
    }

    #[test]
    fn prefix_operators() {
        let expr = parse("-!x");
        let Expr::Prefix { op, operand } = expr else {
            panic!("expected prefix");
        };
        assert_eq!(op, "-");
        assert!(matches!(*operand, Expr::Prefix { op: "!", .. }));
    }

    #[test]
    fn parenthesized_with_newlines() {
        let expr = parse("(\n1 +\n2\n) * 3");
        assert_eq!(binary(&expr).0, "*");
    }

    #[test]
    fn strings_and_files() {
        assert_eq!(parse("'icon.dmi'"), Expr::File("icon.dmi".into()));
        let Expr::Str(segments) = parse("\"a[1 + 2]b\"") else {
            panic!("expected string");
        };
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[1], StrSegment::Expr(Expr::Binary { op: "+", .. })));
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse_err("(1 + 2");
        assert!(err.to_string().starts_with("t.dm:1:"));
        assert!(err.to_string().contains("expected ')'"));
        let err = parse_err("1 +");
        assert!(err.to_string().contains("end of input"));
        let err = parse_err("f(1 2)");
        assert!(err.to_string().contains("',' or ')'"));
    }

    #[test]
    fn cursor_tracks_indentation() {
        let tokens = tokenize("t.dm", "a\n\t\tb // c\nd");
        let mut cursor = Cursor::new(&tokens);
        cursor.advance();
        assert_eq!(cursor.indent(), 0);
        cursor.advance_skipping_newlines();
        assert_eq!(cursor.indent(), 2);
        assert!(cursor.current().unwrap().is_word("b"));
        assert!(cursor.peek().unwrap().is_newline());
        cursor.advance();
        assert_eq!(cursor.indent(), 0);
        let probe = cursor;
        cursor.advance();
        assert!(cursor.is_at_end());
        assert!(!probe.is_at_end());
    }
}
