//! Textual rendering of [`Value`]s in the source syntax.
//!
//! The output is what a map file stores, so it matches the reference
//! compiler's formatting exactly: numbers go through 32-bit floats and the
//! compiler's six-significant-digit rules, strings are escaped so they lex back
//! to the same text.

use std::fmt::Write as _;

use crate::value::{List, Typepath, Value};

/// Text macros, stored in strings as Unicode noncharacters.
pub const TEXT_MACROS: &[(char, &str)] = &[('\u{FDD0}', "improper"), ('\u{FDD1}', "proper")];

/// Renders a value in the source syntax.
///
/// With `pretty` set, typepath overrides are laid out one per line, the way
/// the one-object-per-line map format stores them.
#[must_use]
pub fn render(value: &Value, pretty: bool) -> String {
    let mut out = String::new();
    render_into(&mut out, value, pretty);
    out
}

fn render_into(out: &mut String, value: &Value, pretty: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::String(s) => out.push_str(&render_string(s)),
        Value::Typepath(t) => render_typepath(out, t, pretty),
        Value::File(f) => {
            out.push('\'');
            out.push_str(f);
            out.push('\'');
        }
        Value::List(list) => render_list(out, list, pretty),
        Value::NewList(types) => {
            out.push_str("newlist(");
            for (i, t) in types.iter().enumerate() {
                if i != 0 {
                    out.push(',');
                }
                render_into(out, t, pretty);
            }
            out.push(')');
        }
        Value::New(new) => {
            out.push_str("new ");
            match &new.type_path {
                Some(t) => render_into(out, t, pretty),
                None => out.push_str("null"),
            }
            out.push('(');
            for (i, arg) in new.args.iter().enumerate() {
                if i != 0 {
                    out.push(',');
                }
                if let Some(Some(name)) = new.arg_names.get(i) {
                    out.push_str(name);
                    out.push_str(" = ");
                }
                render_opt(out, arg.as_ref(), pretty);
            }
            out.push(')');
        }
        Value::Matrix(m) => {
            out.push_str("matrix(");
            for (i, n) in m.iter().enumerate() {
                if i != 0 {
                    out.push_str(", ");
                }
                out.push_str(&format_number(*n));
            }
            out.push(')');
        }
    }
}

fn render_opt(out: &mut String, value: Option<&Value>, pretty: bool) {
    match value {
        Some(v) => render_into(out, v, pretty),
        None => out.push_str("null"),
    }
}

fn render_typepath(out: &mut String, t: &Typepath, pretty: bool) {
    out.push_str(&t.path);
    let Some(vars) = t.vars.as_ref().filter(|v| !v.is_empty()) else {
        return;
    };
    out.push('{');
    for (i, (name, value)) in vars.iter().enumerate() {
        if i != 0 {
            out.push(';');
            if !pretty {
                out.push(' ');
            }
        }
        if pretty {
            out.push_str("\n\t");
        }
        out.push_str(name);
        out.push_str(" = ");
        render_into(out, value, pretty);
    }
    if pretty {
        out.push_str("\n\t");
    }
    out.push('}');
}

fn render_list(out: &mut String, list: &List, pretty: bool) {
    let assoc = list.is_assoc();
    out.push_str("list(");
    for (i, key) in list.keys.iter().enumerate() {
        if i != 0 {
            out.push(',');
            if assoc {
                out.push(' ');
            }
        }
        render_opt(out, key.as_ref(), pretty);
        if let Some(Some(value)) = list.values.get(i) {
            out.push_str(" = ");
            render_into(out, value, pretty);
        }
    }
    out.push(')');
}

/// Renders a string literal with escapes.
#[must_use]
pub fn render_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '[' => out.push_str("\\["),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => match TEXT_MACROS.iter().find(|(ch, _)| *ch == c) {
                Some((_, name)) => {
                    out.push('\\');
                    out.push_str(name);
                    out.push(' ');
                }
                None => out.push(c),
            },
        }
    }
    out.push('"');
    out
}

/// Formats a number the way the reference compiler prints it.
///
/// The value is first rounded to single precision. Magnitudes below `0.0001`
/// or at least `1e6` use exponent form with five fractional digits and a
/// three-digit exponent; everything else prints with six significant digits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: f64) -> String {
    let n = f64::from(n as f32);
    if n.is_nan() {
        return "1.#IND".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "1.#INF" } else { "-1.#INF" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let scientific = format!("{n:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let abs = n.abs();
    if abs < 0.0001 || abs >= 1_000_000.0 {
        let sign = if exponent < 0 { '-' } else { '+' };
        if n < 0.0 {
            // negative exponent forms are printed untrimmed and unpadded
            return format!("{mantissa}e{sign}{}", exponent.abs());
        }
        return format!("{}e{sign}{:03}", trim_zeros(mantissa), exponent.abs());
    }
    let decimals = usize::try_from(5 - exponent).unwrap_or(0);
    trim_zeros(&format!("{n:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
