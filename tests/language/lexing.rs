//! Integration tests for the lexer and expression parser

use dmkit_foundation::Value;
use dmkit_language::{Cursor, Lexer, TokenKind, parse_expression, parse_tokens, tokenize};

fn kinds(src: &str) -> Vec<TokenKind> {
    tokenize("t.dm", src)
        .into_iter()
        .filter(|t| !t.is_newline())
        .map(|t| t.kind)
        .collect()
}

// =============================================================================
// Tokens
// =============================================================================

#[test]
fn words_numbers_and_symbols() {
    let tokens = kinds("var/x = 1.5 << 2");
    assert_eq!(tokens[0], TokenKind::Word("var".into()));
    assert_eq!(tokens[1], TokenKind::Symbol("/"));
    assert_eq!(tokens[3], TokenKind::Symbol("="));
    assert_eq!(tokens[4], TokenKind::Number(1.5));
    assert_eq!(tokens[5], TokenKind::Symbol("<<"));
}

#[test]
fn positions_are_one_based() {
    let tokens = tokenize("code.dm", "/obj\n  name = 1");
    let name = tokens.iter().find(|t| t.is_word("name")).unwrap();
    assert_eq!(name.pos.line, 2);
    assert_eq!(name.pos.column, 3);
    assert_eq!(&*name.pos.file, "code.dm");
}

#[test]
fn comments_are_kept_as_tokens() {
    let tokens = tokenize("t.dm", "a // note\nb /* block /* nested */ */ c");
    let comments = tokens.iter().filter(|t| t.is_comment()).count();
    assert_eq!(comments, 2);
    assert!(tokens.iter().any(|t| t.is_word("c")));
}

#[test]
fn newline_tokens_carry_indentation() {
    let tokens = tokenize("t.dm", "/obj\n\t\tname");
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Newline(2)));
}

#[test]
fn lexer_reports_diagnostics() {
    let lexed = Lexer::new("t.dm", "a $ b").tokenize();
    assert!(lexed.tokens.iter().any(|t| t.is_word("b")));
    assert!(!lexed.diagnostics.is_empty());
}

// =============================================================================
// Expressions
// =============================================================================

#[test]
fn precedence_and_associativity() {
    let eval = |src: &str| {
        parse_tokens(&tokenize("t.dm", src))
            .unwrap()
            .evaluate_constant(&dmkit_language::EvalContext::new())
            .unwrap()
    };
    assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3"), Value::Number(9.0));
    assert_eq!(eval("10 - 4 - 3"), Value::Number(3.0));
    assert_eq!(eval("1 ? 2 : 3"), Value::Number(2.0));
}

#[test]
fn cursor_stops_at_commas() {
    let tokens = tokenize("t.dm", "1 + 1, 2");
    let mut cursor = Cursor::new(&tokens);
    parse_expression(&mut cursor).unwrap();
    assert!(cursor.peek().unwrap().is_symbol(","));
}

#[test]
fn syntax_errors_have_positions() {
    let err = parse_tokens(&tokenize("t.dm", "1 + (2")).unwrap_err();
    assert!(err.to_string().starts_with("t.dm:1:"));
}
