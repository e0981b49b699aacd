//! Embedded image layer: decoding and placement.
//!
//! Images arrive as base64 `data:` URIs. A payload that cannot be decoded
//! makes the layer absent for the paint; it never aborts the paint itself.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::RgbaImage;
use resvg::tiny_skia::{ColorU8, Pixmap, PixmapRef};

use crate::error::{ErrorKind, ErrorReporter, ImageLoadError};
use crate::settings::Settings;

/// Extracts the raw bytes of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImageLoadError> {
    let uri = uri.trim();
    if !uri.starts_with("data:") {
        return Err(ImageLoadError::NotDataUri);
    }
    let Some((_, payload)) = uri.split_once(";base64,") else {
        return Err(ImageLoadError::NotDataUri);
    };
    Ok(BASE64_STANDARD.decode(payload)?)
}

// ============================================================================
// ImageLayer
// ============================================================================

/// A decoded image ready to be drawn.
#[derive(Debug, Clone)]
pub struct ImageLayer {
    pixmap: Pixmap,
}

impl ImageLayer {
    pub fn from_data_uri(uri: &str) -> Result<Self, ImageLoadError> {
        let bytes = decode_data_uri(uri)?;
        let decoded = image::load_from_memory(&bytes)?;
        Self::from_rgba(&decoded.to_rgba8())
    }

    pub fn from_rgba(img: &RgbaImage) -> Result<Self, ImageLoadError> {
        let mut pixmap = Pixmap::new(img.width(), img.height()).ok_or(ImageLoadError::Empty)?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> PixmapRef<'_> {
        self.pixmap.as_ref()
    }

    /// Destination rectangle on a `canvas_w` x `canvas_h` surface.
    ///
    /// The image is first fitted inside the canvas preserving its aspect
    /// ratio, scaled by `size_pct`, then centered on the point at
    /// (`x_pct`, `y_pct`) percent of the canvas.
    pub fn placement(
        &self,
        canvas_w: u32,
        canvas_h: u32,
        x_pct: f32,
        y_pct: f32,
        size_pct: f32,
    ) -> Placement {
        let cw = canvas_w as f32;
        let ch = canvas_h as f32;
        let fit = (cw / self.width() as f32).min(ch / self.height() as f32);
        let scale = fit * size_pct.max(0.0) / 100.0;
        let width = self.width() as f32 * scale;
        let height = self.height() as f32 * scale;
        let center_x = cw * x_pct / 100.0;
        let center_y = ch * y_pct / 100.0;
        Placement {
            x: center_x - width / 2.0,
            y: center_y - height / 2.0,
            width,
            height,
        }
    }
}

/// Where an image layer lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Decodes the settings' image layer, if any.
///
/// Failures are logged and reported as [`ErrorKind::ImageLoad`]; the layer
/// is then skipped.
pub fn load_image(settings: &Settings, reporter: Option<&dyn ErrorReporter>) -> Option<ImageLayer> {
    let uri = settings.image_data.as_deref().filter(|s| !s.is_empty())?;
    match ImageLayer::from_data_uri(uri) {
        Ok(layer) => Some(layer),
        Err(err) => {
            tracing::warn!(error = %err, "skipping image layer");
            if let Some(reporter) = reporter {
                reporter.report(ErrorKind::ImageLoad, &err);
            }
            None
        }
    }
}

/// The last decoded layer, reused while the settings carry the same payload.
///
/// A payload that failed to decode is remembered too, so it is reported
/// once rather than on every frame.
#[derive(Debug, Default)]
pub struct ImageCache {
    source: Option<String>,
    layer: Option<ImageLayer>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The layer for `settings`, decoding only when the payload changed.
    pub fn layer_for(
        &mut self,
        settings: &Settings,
        reporter: Option<&dyn ErrorReporter>,
    ) -> Option<&ImageLayer> {
        if self.source != settings.image_data {
            self.layer = load_image(settings, reporter);
            self.source = settings.image_data.clone();
        }
        self.layer.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    fn png_data_uri(img: &RgbaImage) -> String {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", BASE64_STANDARD.encode(bytes))
    }

    #[test]
    fn decodes_png_data_uri() {
        let img = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 128]));
        let layer = ImageLayer::from_data_uri(&png_data_uri(&img)).unwrap();
        assert_eq!((layer.width(), layer.height()), (4, 2));
        let px = layer.pixmap().pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 128);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            decode_data_uri("http://example.com/a.png"),
            Err(ImageLoadError::NotDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png,raw"),
            Err(ImageLoadError::NotDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(ImageLoadError::Base64(_))
        ));
        let not_an_image = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"hello"));
        assert!(matches!(
            ImageLayer::from_data_uri(&not_an_image),
            Err(ImageLoadError::Decode(_))
        ));
    }

    #[test]
    fn placement_preserves_aspect_and_centers() {
        let layer = ImageLayer::from_rgba(&RgbaImage::new(200, 100)).unwrap();
        let full = layer.placement(128, 128, 50.0, 50.0, 100.0);
        assert_eq!(full.width, 128.0);
        assert_eq!(full.height, 64.0);
        assert_eq!((full.x, full.y), (0.0, 32.0));
        assert_eq!(full.center(), (64.0, 64.0));

        let half = layer.placement(128, 128, 25.0, 75.0, 50.0);
        assert_eq!((half.width, half.height), (64.0, 32.0));
        assert_eq!(half.center(), (32.0, 96.0));
    }

    #[test]
    fn load_image_skips_bad_layers() {
        let mut settings = Settings::default();
        assert!(load_image(&settings, None).is_none());
        settings.image_data = Some("not a uri".into());
        assert!(load_image(&settings, None).is_none());
        settings.image_data = Some(png_data_uri(&RgbaImage::new(3, 3)));
        assert!(load_image(&settings, None).is_some());
    }

    #[derive(Default)]
    struct CountingReporter {
        reports: std::cell::Cell<usize>,
    }

    impl ErrorReporter for CountingReporter {
        fn report(&self, kind: ErrorKind, _error: &dyn std::error::Error) {
            assert_eq!(kind, ErrorKind::ImageLoad);
            self.reports.set(self.reports.get() + 1);
        }
    }

    #[test]
    fn cache_decodes_each_payload_once() {
        let reporter = CountingReporter::default();
        let mut cache = ImageCache::new();
        let mut settings = Settings {
            image_data: Some("data:image/png;base64,@@@".into()),
            ..Settings::default()
        };
        for _ in 0..3 {
            assert!(cache.layer_for(&settings, Some(&reporter)).is_none());
        }
        assert_eq!(reporter.reports.get(), 1);

        settings.image_data = Some(png_data_uri(&RgbaImage::new(5, 5)));
        assert_eq!(cache.layer_for(&settings, Some(&reporter)).map(ImageLayer::width), Some(5));
        settings.image_data = None;
        assert!(cache.layer_for(&settings, Some(&reporter)).is_none());
        assert_eq!(reporter.reports.get(), 1);
    }
}
