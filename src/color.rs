//! Color parsing and conversion.
//!
//! Settings carry colors as CSS-style strings. They are parsed at paint time
//! into [`Rgba8`], which converts into whatever the drawing backend needs.

use palette::{Hsl, IntoColor, Srgb};
use resvg::tiny_skia;

/// A straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parses any CSS color: hex forms, `rgb()`/`rgba()`, `hsl()`/`hsla()`,
    /// `hwb()`, named colors and `transparent`.
    pub fn parse(input: &str) -> Option<Self> {
        let [r, g, b, a] = csscolorparser::parse(input.trim()).ok()?.to_rgba8();
        Some(Self::new(r, g, b, a))
    }

    /// Parses `input`, logging and substituting `fallback` when it is not a color.
    pub fn parse_or(input: &str, fallback: Self) -> Self {
        Self::parse(input).unwrap_or_else(|| {
            tracing::warn!(color = input, "unparseable color, using fallback");
            fallback
        })
    }

    /// Builds an opaque color from hue (degrees), saturation and lightness (0-1).
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hsl = Hsl::new(hue.rem_euclid(360.0), saturation, lightness);
        let rgb: Srgb = hsl.into_color();
        Self::rgb(
            (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
            (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
            (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
        )
    }

    /// `#rrggbb`, alpha omitted.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }

    pub fn to_skia(&self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}
