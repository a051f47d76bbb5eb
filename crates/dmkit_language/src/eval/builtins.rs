//! Builtin procs that are safe to run at compile time.
//!
//! Trigonometry works in degrees. Text positions are 1-based, and a
//! non-positive end position counts back from the end of the text.

use dmkit_foundation::{Error, Result, Value};

use super::operators::number;

/// A builtin proc implementation.
pub(crate) type Builtin = fn(&[Value]) -> Result<Value>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("abs", builtin_abs),
    ("arccos", builtin_arccos),
    ("arcsin", builtin_arcsin),
    ("arctan", builtin_arctan),
    ("ascii2text", builtin_ascii2text),
    ("ckey", builtin_ckey),
    ("ckeyEx", builtin_ckey_ex),
    ("clamp", builtin_clamp),
    ("copytext", builtin_copytext),
    ("cos", builtin_cos),
    ("length", builtin_length),
    ("text2num", builtin_text2num),
    ("round", builtin_round),
    ("sin", builtin_sin),
    ("sqrt", builtin_sqrt),
    ("tan", builtin_tan),
    ("text2ascii", builtin_text2ascii),
];

/// Looks up a builtin by name.
pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

/// Names of every builtin.
pub(crate) fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(n, _)| *n)
}

fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&Value::Null)
}

fn text<'a>(value: &'a Value, proc: &str) -> Result<&'a str> {
    match value {
        Value::Null => Ok(""),
        Value::String(s) => Ok(s),
        other => Err(Error::non_constant(format!(
            "{proc}() expects text, got a {}",
            other.kind_name()
        ))),
    }
}

// =============================================================================
// Math
// =============================================================================

fn builtin_abs(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "abs")?.abs()))
}

fn builtin_sqrt(args: &[Value]) -> Result<Value> {
    let n = number(arg(args, 0), "sqrt")?;
    if n < 0.0 {
        return Err(Error::non_constant("sqrt() of a negative number"));
    }
    Ok(Value::Number(n.sqrt()))
}

fn builtin_sin(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "sin")?.to_radians().sin()))
}

fn builtin_cos(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "cos")?.to_radians().cos()))
}

fn builtin_tan(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "tan")?.to_radians().tan()))
}

fn builtin_arcsin(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "arcsin")?.asin().to_degrees()))
}

fn builtin_arccos(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number(arg(args, 0), "arccos")?.acos().to_degrees()))
}

/// `arctan(y)` or `arctan(x, y)`.
fn builtin_arctan(args: &[Value]) -> Result<Value> {
    if args.len() >= 2 {
        let x = number(arg(args, 0), "arctan")?;
        let y = number(arg(args, 1), "arctan")?;
        return Ok(Value::Number(y.atan2(x).to_degrees()));
    }
    Ok(Value::Number(number(arg(args, 0), "arctan")?.atan().to_degrees()))
}

fn builtin_clamp(args: &[Value]) -> Result<Value> {
    let n = number(arg(args, 0), "clamp")?;
    let low = number(arg(args, 1), "clamp")?;
    let high = number(arg(args, 2), "clamp")?;
    Ok(Value::Number(n.max(low).min(high)))
}

/// `round(n)` floors; `round(n, step)` rounds to the nearest multiple of
/// `step`, with halves going up.
fn builtin_round(args: &[Value]) -> Result<Value> {
    let n = number(arg(args, 0), "round")?;
    if args.len() < 2 {
        return Ok(Value::Number(n.floor()));
    }
    let step = number(arg(args, 1), "round")?;
    if step == 0.0 {
        return Err(Error::non_constant("round() to a step of zero"));
    }
    Ok(Value::Number((n / step + 0.5).floor() * step))
}

// =============================================================================
// Text
// =============================================================================

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn builtin_ascii2text(args: &[Value]) -> Result<Value> {
    let code = number(arg(args, 0), "ascii2text")?;
    let text = if code >= 0.0 {
        char::from_u32(code as u32).map(String::from).unwrap_or_default()
    } else {
        String::new()
    };
    Ok(Value::string(text))
}

/// `text2ascii(text, pos = 1)`: the code of one character, or 0 past the end.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn builtin_text2ascii(args: &[Value]) -> Result<Value> {
    let s = text(arg(args, 0), "text2ascii")?;
    let pos = if args.len() >= 2 {
        number(arg(args, 1), "text2ascii")?
    } else {
        1.0
    };
    let code = if pos >= 1.0 {
        s.chars().nth(pos as usize - 1).map_or(0, u32::from)
    } else {
        0
    };
    Ok(Value::Number(f64::from(code)))
}

fn builtin_ckey(args: &[Value]) -> Result<Value> {
    let s = text(arg(args, 0), "ckey")?;
    let key: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '@')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    Ok(Value::string(key))
}

fn builtin_ckey_ex(args: &[Value]) -> Result<Value> {
    let s = text(arg(args, 0), "ckeyEx")?;
    let key: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '@')
        .collect();
    Ok(Value::string(key))
}

/// `copytext(text, start = 1, end = 0)`: characters from `start` up to but
/// not including `end`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn builtin_copytext(args: &[Value]) -> Result<Value> {
    let s = text(arg(args, 0), "copytext")?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let start = if args.len() >= 2 {
        number(arg(args, 1), "copytext")?.trunc() as i64
    } else {
        1
    };
    let end = if args.len() >= 3 {
        number(arg(args, 2), "copytext")?.trunc() as i64
    } else {
        0
    };
    let resolve = |p: i64| if p <= 0 { p + len + 1 } else { p };
    let from = resolve(start).clamp(1, len + 1);
    let to = resolve(end).clamp(1, len + 1);
    if to <= from {
        return Ok(Value::string(""));
    }
    #[allow(clippy::cast_sign_loss)]
    let slice: String = chars[(from - 1) as usize..(to - 1) as usize].iter().collect();
    Ok(Value::string(slice))
}

#[allow(clippy::cast_precision_loss)]
fn builtin_length(args: &[Value]) -> Result<Value> {
    let len = match arg(args, 0) {
        Value::String(s) => s.chars().count(),
        Value::List(list) => list.len(),
        Value::NewList(items) => items.len(),
        _ => 0,
    };
    Ok(Value::Number(len as f64))
}

/// Parses a number; text that is not one gives null.
fn builtin_text2num(args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::String(s) => Ok(s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or(Value::Null, Value::Number)),
        _ => Ok(Value::Null),
    }
}
