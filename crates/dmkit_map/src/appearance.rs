//! What an instance looks like, derived from its variables.

use std::sync::Arc;

use dmkit_foundation::Value;
use tracing::warn;

/// Icon file shown for instances whose type is unknown.
pub const ERROR_ICON: &str = "_fastdmm_interface.dmi";

/// Planes beyond this magnitude are offsets from `FLOAT_PLANE`.
const PLANE_RELATIVE_LIMIT: i32 = 10_000;

const FLOAT_PLANE: i32 = -32_767;

/// The drawable state of an instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Appearance {
    /// Icon file.
    pub icon: Option<Arc<str>>,
    /// State within the icon file.
    pub icon_state: Option<Arc<str>>,
    /// Facing; only the four cardinal bits are kept.
    pub dir: u8,
    /// Layer within the plane.
    pub layer: f64,
    /// Plane, with `FLOAT_PLANE`-relative values folded to small numbers.
    pub plane: i16,
    /// Horizontal pixel offset.
    pub pixel_x: i16,
    /// Vertical pixel offset.
    pub pixel_y: i16,
    /// Horizontal offset independent of direction.
    pub pixel_w: i16,
    /// Vertical offset independent of direction.
    pub pixel_z: i16,
    /// RGB multipliers, each 0 to 1.
    pub color: [f32; 3],
    /// Opacity, 0 to 1.
    pub alpha: f32,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            icon: None,
            icon_state: None,
            dir: 2,
            layer: 2.0,
            plane: 0,
            pixel_x: 0,
            pixel_y: 0,
            pixel_w: 0,
            pixel_z: 0,
            color: [1.0; 3],
            alpha: 1.0,
        }
    }
}

impl Appearance {
    /// The appearance of an instance whose type is not in the tree.
    #[must_use]
    pub fn error() -> Self {
        Self {
            icon: Some(ERROR_ICON.into()),
            icon_state: Some("error".into()),
            ..Self::default()
        }
    }

    /// Builds an appearance from a variable getter.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_vars(mut get: impl FnMut(&str) -> Option<Value>) -> Self {
        let icon = match get("icon") {
            Some(Value::File(f) | Value::String(f)) => Some(f),
            _ => None,
        };
        let icon_state = match get("icon_state") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        let mut plane = int32(get("plane").as_ref());
        if !(-PLANE_RELATIVE_LIMIT..=PLANE_RELATIVE_LIMIT).contains(&plane) {
            plane = plane.wrapping_sub(FLOAT_PLANE);
        }

        let mut alpha = match get("alpha") {
            Some(Value::Number(n)) => (n / 255.0) as f32,
            _ => 1.0,
        };
        let color = match get("color") {
            Some(Value::String(s)) if !s.is_empty() => match parse_color(&s) {
                Some((rgb, a)) => {
                    alpha *= a;
                    rgb
                }
                None => {
                    warn!(color = %s, "cannot parse color");
                    [1.0; 3]
                }
            },
            _ => [1.0; 3],
        };

        Self {
            icon,
            icon_state,
            dir: (int32(get("dir").as_ref()) & 0xF) as u8,
            layer: get("layer").and_then(|v| v.as_number()).unwrap_or(0.0),
            plane: plane as i16,
            pixel_x: int32(get("pixel_x").as_ref()) as i16,
            pixel_y: int32(get("pixel_y").as_ref()) as i16,
            pixel_w: int32(get("pixel_w").as_ref()) as i16,
            pixel_z: int32(get("pixel_z").as_ref()) as i16,
            color,
            alpha,
        }
    }
}

/// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` into RGB multipliers and
/// an alpha multiplier.
#[must_use]
pub fn parse_color(text: &str) -> Option<([f32; 3], f32)> {
    let hex = text.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channels: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .map(|c| u8::from_str_radix(&c.to_string(), 16).map(|n| n * 17))
            .collect::<Result<_, _>>()
            .ok()?,
        6 | 8 => (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<_, _>>()
            .ok()?,
        _ => return None,
    };
    let unit = |c: u8| f32::from(c) / 255.0;
    let alpha = channels.get(3).map_or(1.0, |a| unit(*a));
    Some(([unit(channels[0]), unit(channels[1]), unit(channels[2])], alpha))
}

/// Converts a number the way the engine does before storing it in a 16- or
/// 32-bit field: truncated toward zero, wrapped to 32 bits. Non-numbers are 0.
#[allow(clippy::cast_possible_truncation)]
fn int32(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Number(n)) if n.is_finite() => (n.trunc() as i64) as i32,
        _ => 0,
    }
}
