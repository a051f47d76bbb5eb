//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use dmkit_foundation::{Error, ErrorKind, ResourceLimit, SourcePos};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_preprocess() {
    let err = Error::preprocess("#error stop here", SourcePos::new("game.dme", 4, 1));
    assert!(matches!(err.kind, ErrorKind::Preprocess { .. }));
    assert_eq!(err.to_string(), "game.dme:4:1: #error stop here");
}

#[test]
fn error_type_tree_with_and_without_position() {
    let err = Error::type_tree("duplicate var health", Some(SourcePos::new("mob.dm", 9, 2)));
    assert_eq!(err.to_string(), "mob.dm:9:2: duplicate var health");
    let err = Error::type_tree("cyclic parent_type at /obj/a", None);
    assert_eq!(err.to_string(), "cyclic parent_type at /obj/a");
}

#[test]
fn error_non_constant() {
    let err = Error::non_constant("call to prob()");
    assert!(err.is_non_constant());
    assert!(err.to_string().contains("prob()"));
}

#[test]
fn error_exhausted() {
    let err = Error::exhausted(ResourceLimit::IncludeDepth {
        limit: 64,
        file: "loop.dm".to_string(),
    });
    assert!(matches!(err.kind, ErrorKind::ResourceExhausted(_)));
    let msg = err.to_string();
    assert!(msg.contains("64"));
    assert!(msg.contains("loop.dm"));
}

#[test]
fn error_io() {
    let err = Error::io("code/missing.dm", "no such file");
    assert_eq!(err.to_string(), "cannot read code/missing.dm: no such file");
    assert!(!err.is_non_constant());
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_does_not_change_message() {
    let err = Error::syntax("expected ')'", SourcePos::new("a.dm", 1, 5)).in_file("game.dme");
    assert_eq!(err.to_string(), "a.dm:1:5: syntax error: expected ')'");
    let ctx = err.context.unwrap();
    assert_eq!(ctx.stack, vec!["game.dme"]);
}

#[test]
fn source_pos_moves_within_file() {
    let pos = SourcePos::start_of("maps/station.dmm");
    assert_eq!(pos.to_string(), "maps/station.dmm:1:1");
    let moved = pos.moved(20, 3);
    assert_eq!(moved.file, pos.file);
    assert_eq!(moved.to_string(), "maps/station.dmm:20:3");
}
