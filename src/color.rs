//! Fill color parsing
//!
//! Literal fill values in templates are CSS color strings. Hex forms
//! (`#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`) are handled directly; anything
//! else (named colors, `rgb()`, `hsl()`, ...) goes through `csscolorparser`.

use image::Rgba;
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color string")]
    Empty,
    #[error("invalid hex color length {0}, expected 3, 4, 6, or 8 digits")]
    InvalidLength(usize),
    #[error("invalid hex digit '{0}'")]
    InvalidHex(char),
    #[error("unrecognized color: {0}")]
    Css(String),
}

/// Parse a CSS color string into straight-alpha RGBA.
///
/// # Examples
///
/// ```
/// use themeblit::color::parse_color;
///
/// assert_eq!(parse_color("#112233").unwrap(), image::Rgba([0x11, 0x22, 0x33, 255]));
/// assert_eq!(parse_color("white").unwrap(), image::Rgba([255, 255, 255, 255]));
/// ```
pub fn parse_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ColorError::Empty);
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let color = csscolorparser::parse(s).map_err(|e| ColorError::Css(e.to_string()))?;
    Ok(Rgba(color.to_rgba8()))
}

fn parse_hex(hex: &str) -> Result<Rgba<u8>, ColorError> {
    let digits: Vec<u8> = hex.chars().map(hex_digit).collect::<Result<_, _>>()?;
    match digits.as_slice() {
        // Short forms double each digit: #123 == #112233
        &[r, g, b] => Ok(Rgba([r * 17, g * 17, b * 17, 255])),
        &[r, g, b, a] => Ok(Rgba([r * 17, g * 17, b * 17, a * 17])),
        &[r1, r0, g1, g0, b1, b0] => Ok(Rgba([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0, 255])),
        &[r1, r0, g1, g0, b1, b0, a1, a0] => {
            Ok(Rgba([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0, a1 * 16 + a0]))
        }
        _ => Err(ColorError::InvalidLength(digits.len())),
    }
}

fn hex_digit(c: char) -> Result<u8, ColorError> {
    c.to_digit(16).map(|d| d as u8).ok_or(ColorError::InvalidHex(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_six_digits() {
        assert_eq!(parse_color("#112233").unwrap(), Rgba([0x11, 0x22, 0x33, 255]));
        assert_eq!(parse_color("#FF0000").unwrap(), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_hex_short_forms() {
        assert_eq!(parse_color("#F00").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#F00F").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#1234").unwrap(), Rgba([0x11, 0x22, 0x33, 0x44]));
    }

    #[test]
    fn test_hex_with_alpha() {
        assert_eq!(parse_color("#00000000").unwrap(), Rgba([0, 0, 0, 0]));
        assert_eq!(parse_color("#11223380").unwrap(), Rgba([0x11, 0x22, 0x33, 0x80]));
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_color("white").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("transparent").unwrap(), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_functional_notation() {
        assert_eq!(parse_color("rgb(0, 255, 0)").unwrap(), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_color(""), Err(ColorError::Empty));
        assert_eq!(parse_color("#12"), Err(ColorError::InvalidLength(2)));
        assert_eq!(parse_color("#xyz"), Err(ColorError::InvalidHex('x')));
        assert!(matches!(parse_color("not-a-color"), Err(ColorError::Css(_))));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_color("  #fff "), Ok(Rgba([255, 255, 255, 255])));
    }
}
