//! Checks for values that simplified map loaders cannot read back.
//!
//! Many servers load maps with a regex-based reader instead of the engine's
//! own. Those readers only understand numbers, plain strings, files, bare
//! typepaths and lists of those.

use dmkit_foundation::{Value, render_string};

/// Returns true if `value` survives a simplified map loader unchanged.
#[must_use]
pub fn is_loader_compatible(value: &Value) -> bool {
    match value {
        Value::Null | Value::File(_) => true,
        Value::Number(n) => n.is_finite(),
        Value::String(s) => render_string(s) == format!("\"{s}\""),
        Value::Typepath(t) => t.vars.as_ref().is_none_or(Vec::is_empty),
        Value::List(list) => list
            .keys
            .iter()
            .chain(&list.values)
            .flatten()
            .all(is_loader_compatible),
        Value::NewList(_) | Value::New(_) | Value::Matrix(_) => false,
    }
}
