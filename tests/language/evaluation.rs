//! Integration tests for constant evaluation

use std::sync::Arc;

use dmkit_foundation::{LoadConfig, Value};
use dmkit_language::{Environment, MemoryReader, eval_text};

fn num(text: &str) -> f64 {
    eval_text(text).unwrap().as_number().unwrap()
}

fn text(src: &str) -> String {
    eval_text(src).unwrap().to_text()
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn arithmetic_and_bitwise() {
    assert!((num("7 / 2") - 3.5).abs() < f64::EPSILON);
    assert!((num("2 ** 3") - 8.0).abs() < f64::EPSILON);
    assert!((num("7 % 3") - 1.0).abs() < f64::EPSILON);
    assert!((num("1 << 4 | 1") - 17.0).abs() < f64::EPSILON);
    assert!((num("-(3)") + 3.0).abs() < f64::EPSILON);
}

#[test]
fn comparison_and_logic() {
    assert!((num("3 > 2 && 2 >= 2") - 1.0).abs() < f64::EPSILON);
    assert!(num("!1").abs() < f64::EPSILON);
    assert_eq!(eval_text("null || \"fallback\"").unwrap(), Value::from("fallback"));
}

#[test]
fn string_concatenation_and_interpolation() {
    assert_eq!(text("\"a\" + \"b\""), "ab");
    assert_eq!(text("\"total: [2 + 3]\""), "total: 5");
}

// =============================================================================
// Builtins
// =============================================================================

#[test]
fn builtin_procs() {
    assert!((num("abs(-4)") - 4.0).abs() < f64::EPSILON);
    assert!((num("length(\"four\")") - 4.0).abs() < f64::EPSILON);
    assert_eq!(text("ckey(\"Some Guy\")"), "someguy");
    assert_eq!(text("copytext(\"hello\", 2, 4)"), "el");
    assert!((num("round(2.7)") - 2.0).abs() < f64::EPSILON);
}

#[test]
fn rgb_builds_color_strings() {
    assert_eq!(text("rgb(255, 0, 128)"), "#ff0080");
    assert_eq!(text("rgb(300, -5, 0)"), "#ff0000");
}

#[test]
fn lists_and_typepaths() {
    let Value::List(list) = eval_text("list(\"a\" = 1, \"b\")").unwrap() else {
        panic!("expected a list");
    };
    assert_eq!(list.len(), 2);
    assert!(list.is_assoc());

    let value = eval_text("/obj/item{name = \"box\"; dir = 4}").unwrap();
    let path = value.as_typepath().unwrap();
    assert_eq!(&*path.path, "/obj/item");
    assert_eq!(path.vars.as_ref().map(Vec::len), Some(2));
}

// =============================================================================
// Non-constant Expressions
// =============================================================================

#[test]
fn runtime_only_expressions_are_rejected() {
    assert!(eval_text("prob(50)").unwrap_err().is_non_constant());
    assert!(eval_text("some_var").unwrap_err().is_non_constant());
    assert!(eval_text("list(1)[1]").unwrap_err().is_non_constant());
}

#[test]
fn environment_eval_sees_macros_and_globals() {
    let reader = MemoryReader::new().with_file(
        "game.dme",
        "#define SCALE 4\nvar/global/base = 2\n/obj\n",
    );
    let env = Environment::load(Arc::new(reader), "game.dme", &LoadConfig::default(), None).unwrap();
    assert_eq!(env.eval_text("SCALE * base").unwrap(), Value::Number(8.0));
    assert_eq!(env.eval_text("NORTH | EAST").unwrap(), Value::Number(5.0));
}
