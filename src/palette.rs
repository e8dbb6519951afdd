//! Theme palettes with a closed set of swatch names
//!
//! Templates reference colors through semantic swatch names rather than
//! literal values. The set of names is closed (`bg1..bg5`, `fg1`, `fg2`) and
//! the palette mapping is total, so a lookup can never fail at render time;
//! unknown names are rejected when a template is parsed.

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use thiserror::Error;

use crate::color::{parse_color, ColorError};

/// A semantic color slot a template fill can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Swatch {
    Bg1,
    Bg2,
    Bg3,
    Bg4,
    Bg5,
    Fg1,
    Fg2,
}

impl Swatch {
    /// All swatches in palette order.
    pub const ALL: [Swatch; 7] = [
        Swatch::Bg1,
        Swatch::Bg2,
        Swatch::Bg3,
        Swatch::Bg4,
        Swatch::Bg5,
        Swatch::Fg1,
        Swatch::Fg2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Swatch::Bg1 => "bg1",
            Swatch::Bg2 => "bg2",
            Swatch::Bg3 => "bg3",
            Swatch::Bg4 => "bg4",
            Swatch::Bg5 => "bg5",
            Swatch::Fg1 => "fg1",
            Swatch::Fg2 => "fg2",
        }
    }

    fn index(self) -> usize {
        match self {
            Swatch::Bg1 => 0,
            Swatch::Bg2 => 1,
            Swatch::Bg3 => 2,
            Swatch::Bg4 => 3,
            Swatch::Bg5 => 4,
            Swatch::Fg1 => 5,
            Swatch::Fg2 => 6,
        }
    }
}

impl fmt::Display for Swatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown swatch names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown swatch name '{0}', expected bg1..bg5, fg1 or fg2")]
pub struct SwatchParseError(pub String);

impl FromStr for Swatch {
    type Err = SwatchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bg1" => Ok(Swatch::Bg1),
            "bg2" => Ok(Swatch::Bg2),
            "bg3" => Ok(Swatch::Bg3),
            "bg4" => Ok(Swatch::Bg4),
            "bg5" => Ok(Swatch::Bg5),
            "fg1" => Ok(Swatch::Fg1),
            "fg2" => Ok(Swatch::Fg2),
            _ => Err(SwatchParseError(s.to_string())),
        }
    }
}

/// Error when building a palette from name/color entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error(transparent)]
    UnknownSwatch(#[from] SwatchParseError),
    #[error("invalid color for swatch '{swatch}': {source}")]
    BadColor {
        swatch: Swatch,
        source: ColorError,
    },
}

/// A total mapping from swatch to color, immutable per theme selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePalette {
    colors: [Rgba<u8>; 7],
}

impl ThemePalette {
    /// Build a palette from one color per swatch, in `Swatch::ALL` order.
    pub fn new(colors: [Rgba<u8>; 7]) -> Self {
        Self { colors }
    }

    /// Build a palette from `(name, css-color)` entries over the neutral
    /// default; later entries for the same swatch win.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self, PaletteError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut palette = Self::default();
        for (name, value) in entries {
            let swatch: Swatch = name.parse()?;
            let color = parse_color(value)
                .map_err(|source| PaletteError::BadColor { swatch, source })?;
            palette.set(swatch, color);
        }
        Ok(palette)
    }

    /// Color for a swatch. Total: every swatch always has a color.
    pub fn get(&self, swatch: Swatch) -> Rgba<u8> {
        self.colors[swatch.index()]
    }

    pub fn set(&mut self, swatch: Swatch, color: Rgba<u8>) {
        self.colors[swatch.index()] = color;
    }
}

impl Default for ThemePalette {
    /// Neutral grayscale ramp with white foreground.
    fn default() -> Self {
        Self::new([
            Rgba([0x20, 0x20, 0x20, 255]),
            Rgba([0x40, 0x40, 0x40, 255]),
            Rgba([0x60, 0x60, 0x60, 255]),
            Rgba([0x80, 0x80, 0x80, 255]),
            Rgba([0xA0, 0xA0, 0xA0, 255]),
            Rgba([0xFF, 0xFF, 0xFF, 255]),
            Rgba([0xC0, 0xC0, 0xC0, 255]),
        ])
    }
}
