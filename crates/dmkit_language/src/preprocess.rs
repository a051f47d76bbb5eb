//! Macro preprocessor.
//!
//! Consumes a token stream and produces a clean one: macros expanded,
//! conditional blocks resolved, `#include`d files lexed, preprocessed and
//! wrapped as [`TokenKind::Include`] tokens so file boundaries survive.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use dmkit_foundation::{Error, LoadConfig, ResourceLimit, Result, SourcePos, format_number};
use tracing::{debug, warn};

use crate::eval::EvalContext;
use crate::lexer::Lexer;
use crate::parser::parse_tokens;
use crate::reader::{FileCache, is_source_file, join_path, scan_includes};
use crate::token::{Include, StrPart, StringLit, Token, TokenKind, stringify_tokens};

/// A `#define`.
#[derive(Clone, Debug, PartialEq)]
pub struct Define {
    /// The macro name.
    pub name: String,
    /// Parameter names for function-like macros. A variadic `...` is named
    /// `__VA_ARGS__`.
    pub params: Option<Vec<String>>,
    /// The last parameter swallows any extra arguments.
    pub variadic: bool,
    /// Replacement tokens, comments removed.
    pub body: Vec<Token>,
    /// Where the macro was defined.
    pub pos: SourcePos,
}

/// The macros defined so far.
#[derive(Clone, Debug, Default)]
pub struct DefineTable {
    defines: HashMap<String, Arc<Define>>,
}

impl DefineTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a macro.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Define>> {
        self.defines.get(name)
    }

    /// Returns true if `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// Adds or replaces a macro.
    pub fn insert(&mut self, define: Define) {
        self.defines.insert(define.name.clone(), Arc::new(define));
    }

    /// Removes a macro, returning it if it was defined.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Define>> {
        self.defines.remove(name)
    }

    /// Number of macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    /// Returns true if nothing is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }
}

/// State of one `#if` level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Branch {
    /// No branch taken yet.
    Pending,
    /// In the taken branch.
    Active,
    /// A branch was already taken, or the enclosing block is inactive.
    Done,
}

/// The preprocessor. Defines persist across calls, so the builtin library
/// and the environment share one instance.
#[derive(Debug)]
pub struct Preprocessor {
    defines: DefineTable,
    cache: Arc<FileCache>,
    config: LoadConfig,
    include_depth: usize,
    expansion_depth: usize,
    included: Vec<Arc<str>>,
}

impl Preprocessor {
    /// Creates a preprocessor reading includes through `cache`.
    #[must_use]
    pub fn new(cache: Arc<FileCache>, config: LoadConfig) -> Self {
        Self {
            defines: DefineTable::new(),
            cache,
            config,
            include_depth: 0,
            expansion_depth: 0,
            included: Vec::new(),
        }
    }

    /// Starts from an existing macro table.
    #[must_use]
    pub fn with_defines(mut self, defines: DefineTable) -> Self {
        self.defines = defines;
        self
    }

    /// The current macro table.
    #[must_use]
    pub const fn defines(&self) -> &DefineTable {
        &self.defines
    }

    /// Consumes the preprocessor, returning its macro table.
    #[must_use]
    pub fn into_defines(self) -> DefineTable {
        self.defines
    }

    /// Every file pulled in by `#include`, in the order they were processed.
    #[must_use]
    pub fn included_files(&self) -> &[Arc<str>] {
        &self.included
    }

    /// Reads, lexes and preprocesses a top-level file.
    ///
    /// When preloading is enabled, the file's include graph starts loading
    /// in the background first.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, tagged with the include chain.
    pub fn preprocess_file(&mut self, path: &str) -> Result<Vec<Token>> {
        let text = self.cache.read(path)?;
        if self.config.preload_includes {
            let targets = scan_includes(path, &text);
            if !targets.is_empty() {
                debug!(file = path, count = targets.len(), "preloading includes");
                let _detached = self.cache.preload(targets);
            }
        }
        let lexed = Lexer::new(path, &text).tokenize();
        self.preprocess(&lexed.tokens, path, false)
    }

    /// Preprocesses `tokens` from `file`.
    ///
    /// With `evaluate_defined`, `defined(X)` becomes `1` or `0`; this is how
    /// `#if` conditions are prepared.
    ///
    /// # Errors
    ///
    /// Returns a `Preprocess` error for malformed directives in active
    /// regions, `#error`, and failed includes; `ResourceExhausted` when a
    /// depth budget runs out.
    pub fn preprocess(
        &mut self,
        tokens: &[Token],
        file: &str,
        evaluate_defined: bool,
    ) -> Result<Vec<Token>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut stack: Vec<Branch> = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let active = stack.iter().all(|b| *b == Branch::Active);
            let token = &tokens[i];

            if token.is_symbol("#") {
                i = self.directive(tokens, i, file, active, &mut stack, &mut out)?;
                continue;
            }
            if !active {
                i += 1;
                continue;
            }

            match &token.kind {
                TokenKind::Str(lit) if lit.parts.iter().any(|p| matches!(p, StrPart::Embed(_))) => {
                    let mut parts = Vec::with_capacity(lit.parts.len());
                    for part in &lit.parts {
                        parts.push(match part {
                            StrPart::Embed(inner) => StrPart::Embed(self.preprocess(inner, file, false)?),
                            StrPart::Text(text) => StrPart::Text(text.clone()),
                        });
                    }
                    let lit = StringLit {
                        parts,
                        ..lit.clone()
                    };
                    out.push(Token::new(TokenKind::Str(lit), token.pos.clone(), token.ws));
                    i += 1;
                }
                TokenKind::Word(word) => {
                    if let Some(define) = self.defines.get(word).cloned() {
                        let callable = define.params.is_none()
                            || tokens.get(i + 1).is_some_and(|t| t.is_symbol("("));
                        if callable {
                            i = self.expand(&define, tokens, i, file, &mut out)?;
                            continue;
                        }
                        out.push(token.clone());
                    } else if evaluate_defined && word == "defined" {
                        out.push(self.defined_check(tokens, i)?);
                        i += 4;
                        continue;
                    } else if word == "__FILE__" {
                        let lit = StringLit::text(file);
                        out.push(Token::new(TokenKind::Str(lit), token.pos.clone(), token.ws));
                    } else if word == "__LINE__" {
                        let line = TokenKind::Number(f64::from(token.pos.line));
                        out.push(Token::new(line, token.pos.clone(), token.ws));
                    } else {
                        out.push(token.clone());
                    }
                    i += 1;
                }
                _ => {
                    out.push(token.clone());
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    /// Handles `defined(X)` starting at `i`, which spans four tokens.
    fn defined_check(&self, tokens: &[Token], i: usize) -> Result<Token> {
        let open = tokens.get(i + 1);
        let name = tokens.get(i + 2);
        let close = tokens.get(i + 3);
        match (open, name.and_then(Token::word), close) {
            (Some(o), Some(name_text), Some(c)) if o.is_symbol("(") && c.is_symbol(")") => {
                let value = if self.defines.contains(name_text) { 1.0 } else { 0.0 };
                let pos = name.map_or_else(|| tokens[i].pos.clone(), |t| t.pos.clone());
                Ok(Token::new(TokenKind::Number(value), pos, tokens[i].ws))
            }
            _ => Err(Error::preprocess(
                "expected defined(NAME)",
                tokens[i].pos.clone(),
            )),
        }
    }

    /// Expands the macro invoked at `tokens[i]` into `out`, returning the
    /// index after the invocation.
    fn expand(
        &mut self,
        define: &Define,
        tokens: &[Token],
        mut i: usize,
        file: &str,
        out: &mut Vec<Token>,
    ) -> Result<usize> {
        let invocation = &tokens[i];
        i += 1;

        let mut args: Vec<Vec<Token>> = Vec::new();
        if let Some(params) = &define.params {
            i += 1;
            let mut current = Vec::new();
            let mut depth = 0usize;
            loop {
                let Some(t) = tokens.get(i) else {
                    return Err(Error::preprocess(
                        format!("unterminated argument list for macro {}", define.name),
                        invocation.pos.clone(),
                    ));
                };
                match t.symbol() {
                    Some("(") => depth += 1,
                    Some(")") if depth == 0 => break,
                    Some(")") => depth -= 1,
                    Some(",") if depth == 0 && (!define.variadic || params.len() > args.len() + 1) => {
                        args.push(mem::take(&mut current));
                        i += 1;
                        continue;
                    }
                    _ => {}
                }
                if !t.is_comment() {
                    current.push(t.clone());
                }
                i += 1;
            }
            args.push(current);
            i += 1;
            while args.len() < params.len() {
                args.push(Vec::new());
            }
        }

        let body = substitute(define, &args, invocation);

        if self.expansion_depth >= self.config.max_expansion_depth {
            return Err(Error::exhausted(ResourceLimit::ExpansionDepth {
                limit: self.config.max_expansion_depth,
                name: define.name.clone(),
            }));
        }
        self.expansion_depth += 1;
        let expanded = self.preprocess(&body, file, false);
        self.expansion_depth -= 1;

        let mut expanded = token_paste(expanded?);
        if let Some(first) = expanded.first_mut() {
            first.ws = invocation.ws;
        }
        out.extend(expanded);
        Ok(i)
    }

    /// Handles the directive whose `#` is at `tokens[i]`, returning the index
    /// of the first token after it.
    fn directive(
        &mut self,
        tokens: &[Token],
        mut i: usize,
        file: &str,
        active: bool,
        stack: &mut Vec<Branch>,
        out: &mut Vec<Token>,
    ) -> Result<usize> {
        let hash = &tokens[i];
        i += 1;
        let Some(name) = tokens.get(i).and_then(Token::word) else {
            if active {
                return Err(Error::preprocess("expected a directive after '#'", hash.pos.clone()));
            }
            return Ok(i);
        };
        i += 1;

        match name {
            "endif" => {
                if stack.pop().is_none() {
                    return Err(Error::preprocess("#endif without #if", hash.pos.clone()));
                }
            }
            "else" => {
                let Some(top) = stack.last_mut() else {
                    return Err(Error::preprocess("#else without #if", hash.pos.clone()));
                };
                *top = match *top {
                    Branch::Pending => Branch::Active,
                    Branch::Active | Branch::Done => Branch::Done,
                };
            }
            "if" | "ifdef" | "ifndef" if !active => {
                stack.push(Branch::Done);
            }
            "ifdef" | "ifndef" => {
                let Some(macro_name) = tokens.get(i).and_then(Token::word) else {
                    return Err(Error::preprocess(
                        format!("expected a macro name after #{name}"),
                        hash.pos.clone(),
                    ));
                };
                i += 1;
                let defined = self.defines.contains(macro_name);
                stack.push(if defined == (name == "ifdef") {
                    Branch::Active
                } else {
                    Branch::Pending
                });
            }
            "if" => {
                let end = line_end(tokens, i);
                let taken = self.condition(&tokens[i..end], file, hash)?;
                i = end;
                stack.push(if taken { Branch::Active } else { Branch::Pending });
            }
            "elif" => {
                let end = line_end(tokens, i);
                let Some(top) = stack.last().copied() else {
                    return Err(Error::preprocess("#elif without #if", hash.pos.clone()));
                };
                let next = if top == Branch::Pending {
                    if self.condition(&tokens[i..end], file, hash)? {
                        Branch::Active
                    } else {
                        Branch::Pending
                    }
                } else {
                    Branch::Done
                };
                i = end;
                if let Some(top) = stack.last_mut() {
                    *top = next;
                }
            }
            _ if !active => {}
            "include" => {
                let Some(TokenKind::Str(lit)) = tokens.get(i).map(|t| &t.kind) else {
                    return Err(Error::preprocess("expected a file name after #include", hash.pos.clone()));
                };
                i += 1;
                let target = join_path(file, &lit.as_plain().unwrap_or_default());
                if is_source_file(&target) {
                    let included = self.include(&target).map_err(|e| e.in_file(file))?;
                    let include = Include {
                        file: Arc::from(target.as_str()),
                        tokens: Arc::new(included),
                    };
                    out.push(Token::new(TokenKind::Include(include), hash.pos.clone(), hash.ws));
                }
            }
            "undef" => {
                let Some(macro_name) = tokens.get(i).and_then(Token::word) else {
                    return Err(Error::preprocess("expected a macro name after #undef", hash.pos.clone()));
                };
                self.defines.remove(macro_name);
                i += 1;
            }
            "define" => {
                i = self.define(tokens, i, hash)?;
            }
            "error" => {
                let message = match tokens.get(i).map(|t| &t.kind) {
                    Some(TokenKind::Raw(text)) => text.trim().to_string(),
                    _ => String::from("#error"),
                };
                return Err(Error::preprocess(message, hash.pos.clone()));
            }
            "warn" => {
                if let Some(TokenKind::Raw(text)) = tokens.get(i).map(|t| &t.kind) {
                    warn!("{}: {}", hash.pos, text.trim());
                    i += 1;
                }
            }
            other => {
                warn!("{}: unknown directive #{other}", hash.pos);
                i = line_end(tokens, i);
            }
        }
        Ok(i)
    }

    /// Evaluates an `#if`/`#elif` condition.
    fn condition(&mut self, tokens: &[Token], file: &str, hash: &Token) -> Result<bool> {
        let tokens = self.preprocess(tokens, file, true)?;
        if tokens.iter().all(|t| t.is_comment() || t.is_newline()) {
            return Err(Error::preprocess("missing condition", hash.pos.clone()));
        }
        let expr = parse_tokens(&tokens)?;
        match expr.evaluate_constant(&EvalContext::new()) {
            Ok(value) => Ok(value.is_truthy()),
            Err(e) if e.is_non_constant() => Err(Error::preprocess(e.to_string(), hash.pos.clone())),
            Err(e) => Err(e),
        }
    }

    /// Parses a `#define` whose name is at `tokens[i]`.
    fn define(&mut self, tokens: &[Token], mut i: usize, hash: &Token) -> Result<usize> {
        let bad = |t: Option<&Token>| {
            let pos = t.map_or_else(|| hash.pos.clone(), |t| t.pos.clone());
            let found = t.map_or_else(|| "end of input".to_string(), |t| format!("'{t}'"));
            Error::preprocess(format!("unexpected {found} in #define"), pos)
        };

        let Some(name) = tokens.get(i).and_then(Token::word) else {
            return Err(bad(tokens.get(i)));
        };
        let pos = tokens[i].pos.clone();
        i += 1;

        let mut params = None;
        let mut variadic = false;
        if tokens.get(i).is_some_and(|t| t.is_symbol("(") && !t.ws) {
            let mut names = Vec::new();
            i += 1;
            loop {
                let t = tokens.get(i);
                match t.map(|t| &t.kind) {
                    Some(TokenKind::Symbol(")")) => {
                        i += 1;
                        break;
                    }
                    Some(TokenKind::Symbol("...")) => {
                        names.push("__VA_ARGS__".to_string());
                        variadic = true;
                        i += 1;
                    }
                    Some(TokenKind::Word(w)) => {
                        names.push(w.clone());
                        i += 1;
                        match tokens.get(i).and_then(Token::symbol) {
                            Some(",") => i += 1,
                            Some(")") => {}
                            Some("...") => {
                                variadic = true;
                                i += 1;
                            }
                            _ => return Err(bad(tokens.get(i))),
                        }
                    }
                    _ => return Err(bad(t)),
                }
                if variadic {
                    if !tokens.get(i).is_some_and(|t| t.is_symbol(")")) {
                        return Err(bad(tokens.get(i)));
                    }
                    i += 1;
                    break;
                }
            }
            params = Some(names);
        }

        let end = line_end(tokens, i);
        let body = tokens[i..end]
            .iter()
            .filter(|t| !t.is_comment())
            .cloned()
            .collect();
        self.defines.insert(Define {
            name: name.to_string(),
            params,
            variadic,
            body,
            pos,
        });
        Ok(end)
    }

    /// Reads and preprocesses an included file under the depth budget.
    fn include(&mut self, path: &str) -> Result<Vec<Token>> {
        if self.include_depth >= self.config.max_include_depth {
            return Err(Error::exhausted(ResourceLimit::IncludeDepth {
                limit: self.config.max_include_depth,
                file: path.to_string(),
            }));
        }
        self.included.push(Arc::from(path));
        let text = self.cache.read(path)?;
        let lexed = Lexer::new(path, &text).tokenize();

        self.include_depth += 1;
        let result = self.preprocess(&lexed.tokens, path, false);
        self.include_depth -= 1;
        result
    }
}

fn line_end(tokens: &[Token], from: usize) -> usize {
    tokens[from..]
        .iter()
        .position(Token::is_newline)
        .map_or(tokens.len(), |n| from + n)
}

/// Replaces parameters in a macro body with their arguments, stringizing
/// `#param`. Everything else is restamped with the invocation's position.
fn substitute(define: &Define, args: &[Vec<Token>], invocation: &Token) -> Vec<Token> {
    let Some(params) = &define.params else {
        return define.body.iter().map(|t| t.restamped(&invocation.pos)).collect();
    };
    let param_index = |t: Option<&Token>| {
        t.and_then(Token::word)
            .and_then(|w| params.iter().position(|p| p == w))
    };

    let mut out = Vec::with_capacity(define.body.len());
    let mut j = 0;
    while j < define.body.len() {
        let t = &define.body[j];
        if let Some(k) = param_index(Some(t)) {
            out.extend(args[k].iter().cloned());
            j += 1;
            continue;
        }
        if t.is_symbol("#") {
            if let Some(k) = param_index(define.body.get(j + 1)) {
                let pos = args[k].first().map_or_else(|| invocation.pos.clone(), |a| a.pos.clone());
                let text = StringLit::text(stringify_tokens(&args[k]));
                out.push(Token::new(TokenKind::Str(text), pos, t.ws));
                j += 2;
                continue;
            }
        }
        out.push(t.restamped(&invocation.pos));
        j += 1;
    }
    out
}

/// Applies `##`: a word or number following it is appended to the word
/// directly before it. A `##` that is spaced off from its left operand, or
/// has nothing usable on both sides, is dropped.
fn token_paste(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if !token.is_symbol("##") {
            out.push(token);
            continue;
        }
        let Some(next) = iter.next() else {
            break;
        };
        let suffix = match &next.kind {
            _ if token.ws => None,
            TokenKind::Word(w) => Some(w.clone()),
            TokenKind::Number(n) => Some(format_number(*n)),
            _ => None,
        };
        if let (Some(suffix), Some(Token { kind: TokenKind::Word(prev), .. })) = (suffix, out.last_mut()) {
            prev.push_str(&suffix);
            continue;
        }
        out.push(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::reader::MemoryReader;
    use dmkit_foundation::ErrorKind;

    fn preprocessor(files: &[(&str, &str)]) -> Preprocessor {
        let mut reader = MemoryReader::new();
        for (path, text) in files {
            reader.insert(*path, *text);
        }
        let cache = Arc::new(FileCache::new(Arc::new(reader)));
        Preprocessor::new(cache, LoadConfig::bare())
    }

    fn run(src: &str) -> Result<String> {
        let mut pp = preprocessor(&[]);
        let out = pp.preprocess(&tokenize("t.dm", src), "t.dm", false)?;
        Ok(stringify_tokens(&out).trim().to_string())
    }

    fn words(src: &str) -> Vec<String> {
        let mut pp = preprocessor(&[]);
        let out = pp.preprocess(&tokenize("t.dm", src), "t.dm", false).unwrap();
        out.iter()
            .filter(|t| !t.is_newline() && !t.is_comment())
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn object_like_macro() {
        assert_eq!(words("#define X 42\nX + X"), vec!["42", "+", "42"]);
    }

    #[test]
    fn function_like_macro() {
        assert_eq!(
            words("#define ADD(a,b) ((a)+(b))\nADD(2,3)"),
            vec!["(", "(", "2", ")", "+", "(", "3", ")", ")"]
        );
    }

    #[test]
    fn function_like_macro_without_call_is_left_alone() {
        assert_eq!(words("#define F(a) a\nF + 1"), vec!["F", "+", "1"]);
    }

    #[test]
    fn spaced_paren_makes_object_like_macro() {
        assert_eq!(words("#define F (a)\nF"), vec!["(", "a", ")"]);
    }

    #[test]
    fn nested_parentheses_in_arguments() {
        assert_eq!(words("#define ID(a) a\nID(f(1, 2))"), vec!["f", "(", "1", ",", "2", ")"]);
    }

    #[test]
    fn variadic_macro() {
        assert_eq!(
            words("#define F(a,...) a __VA_ARGS__\nF(1,2,3)"),
            vec!["1", "2", ",", "3"]
        );
        assert_eq!(words("#define G(a, rest...) rest\nG(1,2,3)"), vec!["2", ",", "3"]);
    }

    #[test]
    fn missing_arguments_are_empty() {
        assert_eq!(words("#define F(a,b) [a|b]\nF(1)"), vec!["[", "1", "|", "]"]);
    }

    #[test]
    fn empty_parameter_list() {
        assert_eq!(words("#define F() 7\nF()"), vec!["7"]);
    }

    #[test]
    fn stringize_parameter() {
        let out = run("#define S(x) #x\nS(a + b)").unwrap();
        assert_eq!(out, "\"a + b\"");
    }

    #[test]
    fn token_paste_words_and_numbers() {
        assert_eq!(words("#define CAT(a,b) a##b\nCAT(foo, bar) CAT(x, 1)"), vec!["foobar", "x1"]);
        assert_eq!(words("#define P(a) /obj/##a\nP(item)"), vec!["/", "obj", "/", "item"]);
        assert_eq!(words("#define SPACED(a,b) a ## b\nSPACED(foo, bar)"), vec!["foo", "bar"]);
        assert_eq!(words("#define RIGHT(a,b) a## b\nRIGHT(foo, bar)"), vec!["foobar"]);
    }

    #[test]
    fn macros_are_rescanned() {
        assert_eq!(words("#define A B\n#define B 5\nA"), vec!["5"]);
    }

    #[test]
    fn expansion_takes_invocation_position() {
        let mut pp = preprocessor(&[]);
        let out = pp
            .preprocess(&tokenize("t.dm", "#define X 1\n\n  X"), "t.dm", false)
            .unwrap();
        let number = out.iter().find(|t| matches!(t.kind, TokenKind::Number(_))).unwrap();
        assert_eq!(number.pos.line, 3);
        assert_eq!(number.pos.column, 3);
    }

    #[test]
    fn recursive_macro_hits_budget() {
        let err = run("#define A A\nA").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ResourceExhausted(ResourceLimit::ExpansionDepth { ref name, .. }) if name == "A"
        ));
    }

    #[test]
    fn unterminated_arguments() {
        let err = run("#define F(a) a\nF(1, 2").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn ifdef_else() {
        assert_eq!(words("#ifdef X\nA\n#else\nB\n#endif"), vec!["B"]);
        assert_eq!(words("#define X\n#ifdef X\nA\n#else\nB\n#endif"), vec!["A"]);
        assert_eq!(words("#ifndef X\nA\n#endif"), vec!["A"]);
    }

    #[test]
    fn nested_inactive_block_stays_inactive() {
        assert_eq!(words("#if 0\n#if 1\nA\n#endif\nB\n#endif\nC"), vec!["C"]);
    }

    #[test]
    fn elif_chain() {
        let src = "#define V 2\n#if V == 1\nA\n#elif V == 2\nB\n#elif V == 2\nC\n#else\nD\n#endif";
        assert_eq!(words(src), vec!["B"]);
    }

    #[test]
    fn defined_in_condition() {
        assert_eq!(words("#define X\n#if defined(X) && !defined(Y)\nA\n#endif"), vec!["A"]);
    }

    #[test]
    fn directives_in_inactive_blocks_are_ignored() {
        assert_eq!(words("#if 0\n#error nope\n#include \"missing.dm\"\n#define Z 1\n#endif\nZ"), vec!["Z"]);
    }

    #[test]
    fn directive_errors() {
        assert!(run("#endif").is_err());
        assert!(run("#else").is_err());
        assert!(run("# 5").is_err());
        assert!(run("#define").is_err());
        assert!(run("#if\n#endif").is_err());
        let err = run("#error custom failure").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Preprocess { .. }));
        assert_eq!(err.to_string(), "t.dm:1:1: custom failure");
    }

    #[test]
    fn warn_and_unknown_directives_continue() {
        assert_eq!(words("#warn careful\n#pragma foo\nA"), vec!["A"]);
    }

    #[test]
    fn undef_removes_macro() {
        assert_eq!(words("#define X 1\n#undef X\nX"), vec!["X"]);
    }

    #[test]
    fn file_and_line_builtins() {
        assert_eq!(words("\n__LINE__ __FILE__"), vec!["2", "\"t.dm\""]);
    }

    #[test]
    fn embedded_string_expressions_are_expanded() {
        let out = run("#define N 3\n\"x[N]\"").unwrap();
        assert_eq!(out, "\"x[3]\"");
    }

    #[test]
    fn define_body_drops_comments() {
        let mut pp = preprocessor(&[]);
        pp.preprocess(&tokenize("t.dm", "#define X 1 // one"), "t.dm", false)
            .unwrap();
        let define = pp.defines().get("X").unwrap();
        assert_eq!(define.body.len(), 1);
        assert_eq!(define.pos.line, 1);
    }

    #[test]
    fn include_wraps_tokens() {
        let mut pp = preprocessor(&[
            ("game.dme", "#include \"code\\\\a.dm\"\n#include \"map.dmm\"\nA"),
            ("code/a.dm", "#define A 1\n/obj"),
        ]);
        let out = pp.preprocess_file("game.dme").unwrap();
        let include = out
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Include(inc) => Some(inc),
                _ => None,
            })
            .unwrap();
        assert_eq!(&*include.file, "code/a.dm");
        assert!(include.tokens.iter().any(|t| t.is_word("obj")));
        assert!(out.iter().any(|t| matches!(t.kind, TokenKind::Number(n) if n == 1.0)));
        assert_eq!(pp.included_files().len(), 1);
    }

    #[test]
    fn missing_include_reports_chain() {
        let mut pp = preprocessor(&[("game.dme", "#include \"gone.dm\"\n")]);
        let err = pp.preprocess_file("game.dme").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
        assert_eq!(err.context.unwrap().stack, vec!["game.dme".to_string()]);
    }

    #[test]
    fn include_cycle_hits_budget() {
        let mut pp = preprocessor(&[("a.dm", "#include \"a.dm\"\n")]);
        let err = pp.preprocess_file("a.dm").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ResourceExhausted(ResourceLimit::IncludeDepth { .. })
        ));
    }
}
