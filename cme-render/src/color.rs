//! Continuous color scale for choropleth fills.

use serde::{Serialize, Serializer};
use std::fmt;

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Viridis sampled at nine evenly spaced points.
const VIRIDIS: [Rgb; 9] = [
    Rgb::new(0x44, 0x01, 0x54),
    Rgb::new(0x47, 0x2d, 0x7b),
    Rgb::new(0x3b, 0x52, 0x8b),
    Rgb::new(0x2c, 0x72, 0x8e),
    Rgb::new(0x21, 0x90, 0x8c),
    Rgb::new(0x27, 0xad, 0x81),
    Rgb::new(0x5d, 0xc8, 0x63),
    Rgb::new(0xaa, 0xdc, 0x32),
    Rgb::new(0xfd, 0xe7, 0x25),
];

/// Fill for features without an estimate.
pub const NA_COLOR: Rgb = Rgb::new(0xbd, 0xbd, 0xbd);

/// Viridis at position `t` in [0, 1].
pub fn viridis(t: f64) -> Rgb {
    if !t.is_finite() {
        return NA_COLOR;
    }
    let t = t.clamp(0.0, 1.0);
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let lower = scaled.floor() as usize;
    if lower >= VIRIDIS.len() - 1 {
        return VIRIDIS[VIRIDIS.len() - 1];
    }
    VIRIDIS[lower].lerp(VIRIDIS[lower + 1], scaled - lower as f64)
}

/// Linear mapping of a value domain onto the viridis palette.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn new(min: f64, max: f64) -> Self {
        ColorScale { min, max }
    }

    /// Position of `value` in the domain; a zero-width domain maps to the midpoint.
    pub fn position(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            0.5
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0)
        }
    }

    pub fn color(&self, value: Option<f64>) -> Rgb {
        match value {
            Some(v) if v.is_finite() => viridis(self.position(v)),
            _ => NA_COLOR,
        }
    }
}
