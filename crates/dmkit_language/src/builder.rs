//! Builds the type tree from preprocessed tokens.
//!
//! Only declarations are interpreted: type paths, variable declarations and
//! assignments, and `FASTDMM_PROP(...)` annotations. Proc bodies are skipped
//! structurally without being parsed.

use dmkit_foundation::{Error, Result, SourcePos};
use tracing::trace;

use crate::ast::{Expr, ProcCall};
use crate::parser::{Cursor, parse_expression};
use crate::token::{Token, TokenKind};
use crate::types::{TypeId, TypeRegistry, VarMeta, locate};

/// Walks declaration blocks and records them in a [`TypeRegistry`].
#[derive(Debug)]
pub struct TreeBuilder<'r> {
    types: &'r mut TypeRegistry,
}

impl<'r> TreeBuilder<'r> {
    /// Creates a builder writing into `types`.
    #[must_use]
    pub fn new(types: &'r mut TypeRegistry) -> Self {
        Self { types }
    }

    /// Records every declaration in `tokens`.
    ///
    /// # Errors
    ///
    /// Returns a `Syntax` error for malformed declarations and a `TypeTree`
    /// error for conflicting ones.
    pub fn build(&mut self, tokens: &[Token]) -> Result<()> {
        let mut cursor = Cursor::new(tokens);
        self.block(&mut cursor, 0, &[])
    }

    /// Parses declarations indented at least `indentation` deep, or enclosed
    /// in braces, relative to `current_path`.
    fn block(&mut self, cursor: &mut Cursor<'_>, indentation: usize, current_path: &[String]) -> Result<()> {
        let mut braced = false;
        if cursor.peek().is_some_and(|t| t.is_symbol("{")) {
            braced = true;
            cursor.advance();
        }

        while let Some(lookahead) = cursor.peek() {
            if !braced && cursor.indent() < indentation {
                break;
            }
            if braced && lookahead.is_symbol("}") {
                cursor.advance();
                break;
            }
            match &lookahead.kind {
                TokenKind::Newline(_) => cursor.skip_newlines(false),
                TokenKind::Symbol(";") => cursor.advance(),
                TokenKind::Symbol("/") | TokenKind::Word(_) => {
                    self.line(cursor, indentation, current_path)?;
                }
                TokenKind::Include(include) => {
                    trace!(file = %include.file, "entering include");
                    let mut inner = Cursor::new(&include.tokens);
                    self.block(&mut inner, 0, &[])?;
                    cursor.advance();
                }
                _ => {
                    return Err(Error::syntax(
                        format!("unexpected '{lookahead}' in declaration"),
                        lookahead.pos.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parses one declaration line and whatever block hangs off it.
    fn line(&mut self, cursor: &mut Cursor<'_>, indentation: usize, current_path: &[String]) -> Result<()> {
        let Some(first) = cursor.peek() else {
            return Ok(());
        };
        let pos = first.pos.clone();
        let mut path: Vec<String> = if first.is_symbol("/") {
            Vec::new()
        } else {
            current_path.to_vec()
        };

        while let Some(token) = cursor.peek() {
            if token.is_symbol("/") {
                cursor.advance();
                continue;
            }
            match token.word() {
                Some("FASTDMM_PROP") => return self.fastdmm_prop(cursor, &path, &pos),
                Some(word) if !is_clause_keyword(word) => {
                    path.push(word.to_string());
                    cursor.advance();
                }
                _ => break,
            }
        }

        // `operator+=` and friends: the symbol is part of the proc name.
        if path.last().is_some_and(|last| last == "operator") {
            while let Some(symbol) = cursor.peek().filter(|t| !t.ws).and_then(Token::symbol) {
                if symbol == "(" {
                    break;
                }
                if let Some(last) = path.last_mut() {
                    last.push_str(symbol);
                }
                cursor.advance();
            }
        }

        let mut value: Option<Expr> = None;
        let mut is_proc = false;
        while cursor.peek().is_some_and(|t| t.is_symbol("[")) {
            cursor.advance();
            if cursor.peek().is_some_and(|t| t.is_symbol("]")) {
                cursor.advance();
                continue;
            }
            let size_pos = cursor.error_pos();
            let size = parse_expression(cursor)?;
            expect(cursor, "]")?;
            value = Some(Expr::Call(ProcCall {
                name: "list".to_string(),
                args: vec![Some(size)],
                arg_names: vec![None],
                receiver: None,
                accessor: None,
                pos: size_pos,
            }));
        }

        match cursor.peek() {
            Some(t) if t.is_symbol("=") => {
                cursor.advance();
                value = Some(parse_expression(cursor)?);
            }
            Some(t) if t.is_symbol("(") => {
                is_proc = true;
                skip_params(cursor)?;
            }
            _ => {}
        }

        if cursor.peek().and_then(Token::word).is_some_and(is_clause_keyword) {
            while let Some(t) = cursor.peek() {
                if t.is_newline() || t.is_symbol("{") || t.is_symbol(";") {
                    break;
                }
                cursor.advance();
            }
        }

        if !is_proc {
            if let Some(t) = cursor.peek() {
                if !t.is_newline() && !matches!(t.symbol(), Some("{" | ";" | "}")) {
                    return Err(Error::syntax(
                        format!("unexpected '{t}' after declaration"),
                        t.pos.clone(),
                    ));
                }
            }
        }

        cursor.skip_newlines(true);
        let next = cursor.peek();
        let opens_block = next.is_some_and(|t| t.is_symbol("{")) || cursor.indent() > indentation;
        if !is_proc && value.is_none() && next.is_some() && opens_block {
            let child_indent = cursor.indent();
            self.block(cursor, child_indent, &path)?;
        } else if is_proc {
            self.declare(&path, None, true, &pos)?;
            skip_proc_body(cursor, indentation);
        } else {
            self.declare(&path, value, false, &pos)?;
        }
        Ok(())
    }

    fn fastdmm_prop(&mut self, cursor: &mut Cursor<'_>, path: &[String], pos: &SourcePos) -> Result<()> {
        let id = self.declare(path, None, false, pos)?;
        let expr_pos = cursor.error_pos();
        let Expr::Call(call) = parse_expression(cursor)? else {
            return Err(Error::syntax("FASTDMM_PROP must be called", expr_pos));
        };
        self.types
            .attach_fastdmm(id, &call)
            .map_err(|e| locate(e, &expr_pos))?;
        cursor.skip_newlines(true);
        Ok(())
    }

    /// Records a declaration path, returning the type it belongs to.
    ///
    /// `var`, the modifiers after it and the declared value type are split
    /// off; for procs, everything from `proc`/`verb` on is dropped.
    fn declare(&mut self, path: &[String], value: Option<Expr>, is_proc: bool, pos: &SourcePos) -> Result<TypeId> {
        let declares_var = path.iter().any(|segment| segment == "var");
        let (var_name, type_segments) = match path.split_last() {
            Some((name, rest)) if declares_var || value.is_some() => (Some(name.as_str()), rest),
            Some((_, rest)) if is_proc => (None, rest),
            _ => (None, path),
        };
        if value.is_some() && var_name.is_none() {
            return Err(Error::type_tree("assignment without a variable name", Some(pos.clone())));
        }

        let mut owner: Vec<&str> = Vec::new();
        let mut value_type: Vec<&str> = Vec::new();
        let mut meta = VarMeta::default();
        let mut in_var = false;
        for segment in type_segments {
            match segment.as_str() {
                "var" => in_var = true,
                "global" | "static" if in_var => meta.is_global = true,
                "tmp" if in_var => meta.is_tmp = true,
                "const" if in_var => meta.is_const = true,
                "proc" | "verb" if !in_var => break,
                other if in_var => value_type.push(other),
                other => owner.push(other),
            }
        }
        meta.value_type = format!("/{}", value_type.join("/"));

        let id = self.types.get_or_create(&format!("/{}", owner.join("/")));
        if let Some(name) = var_name {
            if in_var {
                self.types
                    .set_var_meta(id, name, meta)
                    .map_err(|e| locate(e, pos))?;
            }
            self.types.set_var(id, name, value);
        }
        Ok(id)
    }
}

/// Words that end a declaration path: `as` and `in` clauses.
fn is_clause_keyword(word: &str) -> bool {
    matches!(word, "as" | "in")
}

fn expect(cursor: &mut Cursor<'_>, symbol: &str) -> Result<()> {
    match cursor.peek() {
        Some(t) if t.is_symbol(symbol) => {
            cursor.advance();
            Ok(())
        }
        other => Err(Error::syntax(
            format!(
                "expected '{symbol}', found {}",
                other.map_or_else(|| "end of input".to_string(), |t| format!("'{t}'"))
            ),
            cursor.error_pos(),
        )),
    }
}

/// Skips a proc parameter list; the cursor must be on the `(`.
///
/// Parameters are `[type/path/]name[[]][ = default][ as ...][ in ...]` or
/// `...`. Defaults are parsed as expressions and discarded.
fn skip_params(cursor: &mut Cursor<'_>) -> Result<()> {
    let open = cursor.error_pos();
    cursor.advance();
    let mut count = 0usize;
    loop {
        cursor.skip_newlines(true);
        match cursor.peek() {
            None => return Err(Error::syntax("unterminated parameter list", open)),
            Some(t) if t.is_symbol(")") => break,
            Some(_) => {}
        }
        if count > 0 {
            expect(cursor, ",")?;
            cursor.skip_newlines(true);
        }
        count += 1;

        if cursor.peek().is_some_and(|t| t.is_symbol("...")) {
            cursor.advance();
            continue;
        }
        while let Some(t) = cursor.peek() {
            let part_of_name = matches!(t.symbol(), Some("/" | "."))
                || t.word().is_some_and(|w| !is_clause_keyword(w));
            if !part_of_name {
                break;
            }
            cursor.advance();
        }
        while cursor.peek().is_some_and(|t| t.is_symbol("[")) {
            cursor.advance();
            expect(cursor, "]")?;
        }
        if cursor.peek().is_some_and(|t| t.is_symbol("=")) {
            cursor.advance();
            parse_expression(cursor)?;
        }
        if cursor.peek().and_then(Token::word).is_some_and(is_clause_keyword) {
            let mut depth = 0usize;
            while let Some(t) = cursor.peek() {
                match t.symbol() {
                    Some("(") => depth += 1,
                    Some(")") if depth == 0 => break,
                    Some(")") => depth -= 1,
                    Some(",") if depth == 0 => break,
                    _ => {}
                }
                cursor.advance();
            }
        }
    }
    cursor.advance();
    Ok(())
}

/// Skips a proc body: nothing, a braced block, the rest of the line, or an
/// indented block.
fn skip_proc_body(cursor: &mut Cursor<'_>, indentation: usize) {
    let Some(next) = cursor.peek() else {
        return;
    };
    if next.is_symbol(";") {
        cursor.advance();
    } else if next.is_symbol("{") {
        cursor.advance();
        let mut depth = 1usize;
        while depth > 0 {
            let Some(t) = cursor.peek() else {
                break;
            };
            match t.symbol() {
                Some("{") => depth += 1,
                Some("}") => depth -= 1,
                _ => {}
            }
            cursor.advance();
        }
    } else if !cursor.current().is_some_and(Token::is_newline) {
        while let Some(t) = cursor.peek() {
            if t.is_newline() || t.is_symbol(";") {
                break;
            }
            cursor.advance();
        }
    } else if cursor.indent() > indentation {
        let body_indent = cursor.indent();
        let mut depth = 0i64;
        while let Some(t) = cursor.peek() {
            let inside = cursor.indent() >= body_indent
                || depth > 0
                || !cursor.current().is_some_and(Token::is_newline)
                || t.is_newline();
            if !inside {
                break;
            }
            match t.symbol() {
                Some("{" | "(") => depth += 1,
                Some("}" | ")") => depth -= 1,
                _ => {}
            }
            cursor.advance();
        }
    }
}
