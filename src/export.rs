//! Raster export: PNG for static settings, GIF for animated ones.
//!
//! Outputs are returned as `data:` URIs. Saving them to disk or triggering a
//! download is left to the caller; [`suggested_file_name`] gives the
//! conventional name.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::animation::TextAnimation;
use crate::canvas::{CanvasPreset, create_surface_with_fonts};
use crate::compositor::paint_static;
use crate::error::{RenderError, RenderResult};
use crate::gif::encode_animated_with;
use crate::settings::Settings;
use crate::text::FontBook;

/// Output container chosen for a settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Gif,
}

impl OutputFormat {
    /// PNG unless a text animation is selected.
    ///
    /// Only the text animation decides; an image-only animation still
    /// exports a single PNG frame.
    pub fn for_settings(settings: &Settings) -> Self {
        if settings.animation == TextAnimation::None {
            Self::Png
        } else {
            Self::Gif
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

/// Renders the settings and returns the result as a `data:` URI.
pub fn generate_raster_output(settings: &Settings) -> RenderResult<String> {
    generate_raster_output_with(settings, &FontBook::system())
}

#[tracing::instrument(skip_all, fields(animation = ?settings.animation))]
pub fn generate_raster_output_with(settings: &Settings, fonts: &FontBook) -> RenderResult<String> {
    let format = OutputFormat::for_settings(settings);
    let bytes = match format {
        OutputFormat::Png => render_png(settings, fonts)?,
        OutputFormat::Gif => encode_animated_with(settings, fonts, |_| {})?,
    };
    Ok(data_uri(format.mime_type(), &bytes))
}

/// Paints the static appearance once and encodes it as PNG.
pub fn render_png(settings: &Settings, fonts: &FontBook) -> RenderResult<Vec<u8>> {
    let size = CanvasPreset::for_settings(settings).size();
    let mut surface = create_surface_with_fonts(size.width, size.height, None, fonts.clone());
    let ctx = surface
        .context_mut()
        .ok_or_else(|| RenderError::ContextUnavailable("png".to_string()))?;
    paint_static(ctx, settings)?;
    encode_png(&ctx.to_rgba_image(), settings.png_quality)
}

/// Encodes straight-alpha RGBA as PNG. `quality` 0-100 picks the
/// compression effort.
pub fn encode_png(img: &RgbaImage, quality: u8) -> RenderResult<Vec<u8>> {
    let compression = match quality {
        0..=33 => CompressionType::Fast,
        34..=66 => CompressionType::Default,
        _ => CompressionType::Best,
    };
    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(&mut bytes, compression, FilterType::Adaptive).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// `emoji-<millis>.png` or `.gif`, by the same rule as the export format.
pub fn suggested_file_name(settings: &Settings, unix_millis: u128) -> String {
    let format = OutputFormat::for_settings(settings);
    format!("emoji-{unix_millis}.{}", format.extension())
}

// ============================================================================
// Tests
// ============================================================================
