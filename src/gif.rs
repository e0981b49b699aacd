//! Animated GIF assembly.
//!
//! Frames are composited off-screen in index order and streamed into the
//! encoder one at a time. Any frame that fails to composite aborts the whole
//! encode; no partial GIF is ever returned.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};

use crate::canvas::{CanvasPreset, ContextOverrides, create_surface_with_fonts};
use crate::compositor::{fill_background, paint_frame_with};
use crate::error::{RenderError, RenderResult};
use crate::image_layer::load_image;
use crate::settings::Settings;
use crate::text::FontBook;

/// Exported frames never carry a shorter delay than this.
pub const GIF_MIN_DELAY_MS: u32 = 20;

/// Per-frame GIF delay for a requested speed.
pub fn gif_frame_delay(speed_ms: u32) -> u32 {
    speed_ms.max(GIF_MIN_DELAY_MS)
}

/// Encoder progress after a frame has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    /// Frames submitted so far.
    pub frame: u32,
    pub total: u32,
}

impl EncodeProgress {
    /// Completion in percent, 0-100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.frame.min(self.total) as u64 * 100) / self.total as u64) as u8
    }
}

/// Encodes the settings' animation with system fonts.
pub fn encode_animated(settings: &Settings) -> RenderResult<Vec<u8>> {
    encode_animated_with(settings, &FontBook::system(), |_| {})
}

/// Encodes the settings' animation, reporting progress after every frame.
#[tracing::instrument(skip_all, fields(frames = settings.frame_count(), size = settings.canvas_pixels()))]
pub fn encode_animated_with<F>(
    settings: &Settings,
    fonts: &FontBook,
    mut on_progress: F,
) -> RenderResult<Vec<u8>>
where
    F: FnMut(EncodeProgress),
{
    let total = settings.frame_count();
    let delay_ms = gif_frame_delay(settings.animation_speed);
    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    let size = CanvasPreset::for_settings(settings).size();

    let overrides = ContextOverrides {
        alpha: Some(true),
        will_read_frequently: Some(true),
    };
    let mut surface = create_surface_with_fonts(size.width, size.height, Some(&overrides), fonts.clone());
    let image = load_image(settings, None);

    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, i32::from(settings.gif_quality.clamp(1, 30)));
        encoder.set_repeat(Repeat::Infinite)?;

        for index in 0..total {
            let ctx = surface
                .context_mut()
                .ok_or_else(|| RenderError::ContextUnavailable("gif".to_string()).in_frame(index))?;
            ctx.clear();
            fill_background(ctx, settings.background());
            paint_frame_with(ctx, settings, image.as_ref(), index, total)
                .map_err(|e| e.in_frame(index))?;

            let frame = Frame::from_parts(ctx.to_rgba_image(), 0, 0, delay);
            encoder.encode_frame(frame)?;
            on_progress(EncodeProgress {
                frame: index + 1,
                total,
            });
        }
    }

    tracing::debug!(bytes = bytes.len(), delay_ms, "gif encoded");
    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;

    use super::*;
    use crate::animation::TextAnimation;
    use crate::settings::CanvasSize;

    fn decode(bytes: &[u8]) -> Vec<Frame> {
        let decoder = GifDecoder::new(Cursor::new(bytes)).unwrap();
        decoder.into_frames().collect_frames().unwrap()
    }

    fn delay_ms(frame: &Frame) -> u32 {
        let (numer, denom) = frame.delay().numer_denom_ms();
        numer / denom
    }

    #[test]
    fn delay_floor() {
        assert_eq!(gif_frame_delay(10), 20);
        assert_eq!(gif_frame_delay(20), 20);
        assert_eq!(gif_frame_delay(80), 80);
    }

    #[test]
    fn round_trip_keeps_frame_count_and_delay() {
        let settings = Settings {
            animation: TextAnimation::Bounce,
            animation_speed: 10,
            canvas_size: CanvasSize::Small,
            ..Settings::with_text("UP")
        };
        let mut reports = Vec::new();
        let fonts = crate::text::test_fonts();
        let bytes = encode_animated_with(&settings, &fonts, |p| reports.push(p)).unwrap();

        let frames = decode(&bytes);
        assert_eq!(frames.len(), 30);
        assert!(frames.iter().all(|f| delay_ms(f) == 20));
        assert_eq!(frames[0].buffer().dimensions(), (64, 64));
        assert!(frames[0].buffer().pixels().any(|p| p.0[0] < 128), "no glyphs drawn");
        assert_ne!(frames[0].buffer(), frames[7].buffer());

        assert_eq!(reports.len(), 30);
        assert_eq!(reports.last().map(EncodeProgress::percent), Some(100));
    }

    #[test]
    fn frames_are_opaque() {
        let settings = Settings {
            animation: TextAnimation::Fade,
            animation_speed: 50,
            canvas_size: CanvasSize::Small,
            gif_frames: 4,
            background_color: "#336699".into(),
            ..Settings::with_text("UP")
        };
        let frames = decode(&encode_animated_with(&settings, &FontBook::empty(), |_| {}).unwrap());
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| delay_ms(f) == 50));
        for frame in &frames {
            assert!(frame.buffer().pixels().all(|p| p.0[3] == 255));
        }
    }

    #[test]
    fn progress_percent() {
        assert_eq!(EncodeProgress { frame: 15, total: 30 }.percent(), 50);
        assert_eq!(EncodeProgress { frame: 0, total: 0 }.percent(), 100);
    }
}
