//! Integration tests for Value and its rendering
//!
//! The rendered form is what map files store, so it must match the
//! reference compiler's text exactly.

use dmkit_foundation::{List, Typepath, Value, format_number, render, render_string};

// =============================================================================
// Numbers
// =============================================================================

#[test]
fn numbers_use_six_significant_digits() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(2.5), "2.5");
    assert_eq!(format_number(1.0 / 3.0), "0.333333");
    assert_eq!(format_number(999_999.0), "999999");
    assert_eq!(format_number(1_000_000.0), "1e+006");
}

#[test]
fn special_numbers() {
    assert_eq!(format_number(f64::INFINITY), "1.#INF");
    assert_eq!(format_number(f64::NEG_INFINITY), "-1.#INF");
    assert_eq!(format_number(f64::NAN), "1.#IND");
}

// =============================================================================
// Strings and Paths
// =============================================================================

#[test]
fn strings_are_escaped() {
    assert_eq!(render_string("plain"), "\"plain\"");
    assert_eq!(render_string("a \"b\""), "\"a \\\"b\\\"\"");
    assert_eq!(render_string("x[y]"), "\"x\\[y]\"");
    assert_eq!(render_string("line\nbreak"), "\"line\\nbreak\"");
}

#[test]
fn typepaths_render_overrides() {
    let bare = Value::path("/obj/item");
    assert_eq!(bare.to_string(), "/obj/item");

    let with_vars = Value::from(Typepath::with_vars(
        "/obj/item",
        vec![("name".into(), Value::from("box")), ("dir".into(), Value::from(4))],
    ));
    assert_eq!(render(&with_vars, false), "/obj/item{name = \"box\"; dir = 4}");
    assert_eq!(
        render(&with_vars, true),
        "/obj/item{\n\tname = \"box\";\n\tdir = 4\n\t}"
    );
}

#[test]
fn lists_render_in_order() {
    let mut list = List::new();
    list.push(Some(Value::from(1)), None);
    list.push(Some(Value::from("two")), None);
    assert_eq!(Value::List(list).to_string(), "list(1,\"two\")");

    let mut assoc = List::new();
    assoc.push(Some(Value::from("a")), Some(Value::from(1)));
    assoc.push(Some(Value::from("b")), None);
    assert_eq!(Value::List(assoc).to_string(), "list(\"a\" = 1, \"b\")");
}

#[test]
fn files_and_null() {
    assert_eq!(Value::File("icons/obj.dmi".into()).to_string(), "'icons/obj.dmi'");
    assert_eq!(Value::Null.to_string(), "null");
}

// =============================================================================
// Conversions
// =============================================================================

#[test]
fn text_form() {
    assert_eq!(Value::Null.to_text(), "");
    assert_eq!(Value::from(12).to_text(), "12");
    assert_eq!(Value::from("hi").to_text(), "hi");
    assert_eq!(Value::path("/mob").to_text(), "/mob");
}

#[test]
fn truthiness_and_kinds() {
    assert!(Value::from(true).is_truthy());
    assert!(!Value::from(false).is_truthy());
    assert!(Value::path("/obj").is_truthy());
    assert_eq!(Value::from(1.5).as_number(), Some(1.5));
    assert_eq!(Value::from("s").as_str(), Some("s"));
    assert_eq!(Value::Matrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).kind_name(), "matrix");
}
