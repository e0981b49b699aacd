//! The settings record consumed by every paint call.
//!
//! [`Settings`] mirrors the flat settings object produced by the UI layer.
//! Every field carries a default, so a record deserialized from partial JSON
//! is always fully populated by the time it reaches the renderer.
//!
//! # Example
//!
//! ```
//! use emoji_renderer::{Settings, TextAnimation};
//!
//! let settings = Settings::from_json(r#"{ "text": "OK", "animation": "bounce" }"#).unwrap();
//! assert_eq!(settings.animation, TextAnimation::Bounce);
//! assert_eq!(settings.gif_frames, 30);
//! ```

use serde::{Deserialize, Serialize};

use crate::animation::{ImageAnimation, TextAnimation};
use crate::color::Rgba8;

/// Default number of frames in one animation cycle.
pub const DEFAULT_FRAME_COUNT: u32 = 30;

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum TextColorMode {
    #[default]
    Solid,
    Gradient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    #[default]
    Transparent,
    Color,
}

/// Stacking order of the image layer relative to the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    Back,
    #[default]
    Front,
}

/// The two supported output sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum CanvasSize {
    Small,
    #[default]
    Standard,
}

impl CanvasSize {
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Small => 64,
            Self::Standard => 128,
        }
    }
}

impl TryFrom<u32> for CanvasSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            64 => Ok(Self::Small),
            128 => Ok(Self::Standard),
            other => Err(format!("unsupported canvas size {other}, expected 64 or 128")),
        }
    }
}

impl From<CanvasSize> for u32 {
    fn from(size: CanvasSize) -> Self {
        size.pixels()
    }
}

#[cfg(feature = "jsonschema")]
impl schemars::JsonSchema for CanvasSize {
    fn schema_name() -> String {
        "CanvasSize".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        <u32 as schemars::JsonSchema>::json_schema(generator)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Fully populated settings record.
///
/// Grouped conceptually into basic text styling, animation, the optional image
/// layer and output optimization. Field names serialize in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // ---- Basic ----
    /// Text to render. Embedded `\n` starts a new line.
    pub text: String,
    pub font_family: String,
    /// Requested size in px. Layout auto-fits, so this is only a hint.
    pub font_size: f32,
    pub font_color: String,
    pub text_color_mode: TextColorMode,
    pub gradient_color1: String,
    pub gradient_color2: String,
    pub gradient_direction: GradientDirection,
    pub background_type: BackgroundType,
    pub background_color: String,

    // ---- Outline / shadow ----
    pub stroke_color: String,
    /// Outline width in px; 0 disables the outline.
    pub stroke_width: f32,
    pub shadow_color: String,
    /// Shadow blur in px; 0 disables the shadow.
    pub shadow_blur: f32,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,

    // ---- Animation ----
    pub animation: TextAnimation,
    /// Requested milliseconds per frame step.
    pub animation_speed: u32,
    pub animation_amplitude: f32,
    pub secondary_color: String,

    // ---- Image ----
    /// Base64 `data:` URI, or `None`.
    pub image_data: Option<String>,
    /// Horizontal center, percent of canvas width.
    pub image_x: f32,
    /// Vertical center, percent of canvas height.
    pub image_y: f32,
    /// Size, percent of the fitted size.
    pub image_size: f32,
    /// Opacity, 0-100.
    pub image_opacity: f32,
    pub image_position: ImagePosition,
    pub image_animation: ImageAnimation,
    pub image_animation_amplitude: f32,

    // ---- Optimization ----
    pub canvas_size: CanvasSize,
    pub png_quality: u8,
    /// 1 (best) to 30 (fastest).
    pub gif_quality: u8,
    pub gif_frames: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "Noto Sans JP".to_string(),
            font_size: 64.0,
            font_color: "#000000".to_string(),
            text_color_mode: TextColorMode::Solid,
            gradient_color1: "#ff0000".to_string(),
            gradient_color2: "#0000ff".to_string(),
            gradient_direction: GradientDirection::Vertical,
            background_type: BackgroundType::Transparent,
            background_color: "#ffffff".to_string(),
            stroke_color: "#ffffff".to_string(),
            stroke_width: 0.0,
            shadow_color: "#00000080".to_string(),
            shadow_blur: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            animation: TextAnimation::None,
            animation_speed: 50,
            animation_amplitude: 10.0,
            secondary_color: "#ffd700".to_string(),
            image_data: None,
            image_x: 50.0,
            image_y: 50.0,
            image_size: 100.0,
            image_opacity: 100.0,
            image_position: ImagePosition::Front,
            image_animation: ImageAnimation::None,
            image_animation_amplitude: 10.0,
            canvas_size: CanvasSize::Standard,
            png_quality: 80,
            gif_quality: 10,
            gif_frames: DEFAULT_FRAME_COUNT,
        }
    }
}

impl Settings {
    /// Creates default settings rendering `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// True when either the text or the image layer animates.
    pub fn is_animated(&self) -> bool {
        self.animation.is_active() || self.image_animation.is_active()
    }

    /// Canvas edge length in pixels.
    pub fn canvas_pixels(&self) -> u32 {
        self.canvas_size.pixels()
    }

    /// Frames per cycle, never zero.
    pub fn frame_count(&self) -> u32 {
        self.gif_frames.max(1)
    }

    pub fn background(&self) -> Rgba8 {
        Rgba8::parse_or(&self.background_color, Rgba8::WHITE)
    }

    pub fn font_rgba(&self) -> Rgba8 {
        Rgba8::parse_or(&self.font_color, Rgba8::BLACK)
    }

    pub fn secondary_rgba(&self) -> Rgba8 {
        Rgba8::parse_or(&self.secondary_color, Rgba8::WHITE)
    }

    /// Serializes the settings to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the settings to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes settings, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_fully_populated() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.canvas_pixels(), 128);
        assert_eq!(settings.frame_count(), 30);
        assert!(!settings.is_animated());
    }

    #[test]
    fn camel_case_field_names() {
        let json = Settings::default().to_json_pretty().unwrap();
        assert!(json.contains("\"fontFamily\""));
        assert!(json.contains("\"animationSpeed\""));
        assert!(json.contains("\"imageData\""));
        assert!(json.contains("\"backgroundType\": \"transparent\""));
        assert!(json.contains("\"canvasSize\": 128"));
    }

    #[test]
    fn parses_ui_settings_shape() {
        let json = r##"{
            "text": "UP",
            "animation": "bounce",
            "animationSpeed": 20,
            "backgroundType": "color",
            "backgroundColor": "#123456",
            "canvasSize": 64,
            "imageAnimation": "shake"
        }"##;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.animation, TextAnimation::Bounce);
        assert_eq!(settings.image_animation, ImageAnimation::Shake);
        assert_eq!(settings.background(), Rgba8::rgb(0x12, 0x34, 0x56));
        assert_eq!(settings.canvas_pixels(), 64);
        assert!(settings.is_animated());
    }

    #[test]
    fn image_animation_alone_counts_as_animated() {
        let settings = Settings {
            image_animation: ImageAnimation::Rotate,
            ..Settings::default()
        };
        assert!(settings.is_animated());
    }

    #[test]
    fn rejects_unsupported_canvas_size() {
        assert!(Settings::from_json(r#"{ "canvasSize": 100 }"#).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let settings = Settings {
            image_data: Some("data:image/png;base64,AAAA".into()),
            text_color_mode: TextColorMode::Gradient,
            ..Settings::with_text("hi\nthere")
        };
        let restored = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn zero_frames_is_clamped() {
        let settings = Settings {
            gif_frames: 0,
            ..Settings::default()
        };
        assert_eq!(settings.frame_count(), 1);
    }
}
