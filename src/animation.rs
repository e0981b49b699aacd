//! Per-frame animation transforms.
//!
//! Each animation kind maps a normalized progress value in `[0, 1)` to a
//! transform/style delta. Kinds are closed enums dispatched through a single
//! exhaustive `match`, so a new kind cannot silently fall through.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::context::Context2d;

/// Fraction of the canvas size the text bounces upward.
pub const BOUNCE_AMPLITUDE: f32 = 0.15;
/// Fraction of the canvas size the text slides sideways.
pub const SLIDE_AMPLITUDE: f32 = 0.23;
/// Peak scale delta of `pulse`.
pub const PULSE_AMPLITUDE: f32 = 0.2;
/// Peak shadow blur of `glow`, in pixels.
pub const GLOW_MAX_BLUR: f32 = 20.0;

// ============================================================================
// Kinds
// ============================================================================

/// Text animation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum TextAnimation {
    #[default]
    None,
    Rainbow,
    Blink,
    Rotate,
    Bounce,
    Pulse,
    Glow,
    Slide,
    Fade,
}

impl TextAnimation {
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// Image-layer animation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ImageAnimation {
    #[default]
    None,
    Rotate,
    Bounce,
    Pulse,
    Slide,
    Fade,
    Shake,
}

impl ImageAnimation {
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// `frame_index / frame_count`, zero for an empty cycle.
pub fn progress(frame_index: u32, frame_count: u32) -> f32 {
    if frame_count == 0 {
        return 0.0;
    }
    (frame_index % frame_count) as f32 / frame_count as f32
}

// ============================================================================
// Text Transform
// ============================================================================

/// Replacement for the configured text fill on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FillOverride {
    #[default]
    Keep,
    /// Fully saturated color at this hue, in degrees.
    Hue(f32),
    /// The settings' secondary color.
    Secondary,
}

/// Transform and style delta applied to the text on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextTransform {
    pub offset_x: f32,
    pub offset_y: f32,
    /// Radians, about the canvas center.
    pub rotation: f32,
    /// Uniform scale about the canvas center.
    pub scale: f32,
    pub alpha: f32,
    pub fill: FillOverride,
    /// Shadow blur in the secondary color.
    pub glow_blur: Option<f32>,
}

impl Default for TextTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0.0,
            scale: 1.0,
            alpha: 1.0,
            fill: FillOverride::Keep,
            glow_blur: None,
        }
    }
}

impl TextTransform {
    pub fn compute(kind: TextAnimation, progress: f32, canvas_size: f32) -> Self {
        let wave = (progress * TAU).sin();
        let identity = Self::default();
        match kind {
            TextAnimation::None => identity,
            TextAnimation::Rainbow => Self {
                fill: FillOverride::Hue(progress * 360.0),
                ..identity
            },
            TextAnimation::Blink => {
                let fill = if (progress * 2.0 * TAU).sin() > 0.0 {
                    FillOverride::Keep
                } else {
                    FillOverride::Secondary
                };
                Self { fill, ..identity }
            }
            TextAnimation::Rotate => Self {
                rotation: progress * TAU,
                ..identity
            },
            TextAnimation::Bounce => Self {
                offset_y: -wave.abs() * BOUNCE_AMPLITUDE * canvas_size,
                ..identity
            },
            TextAnimation::Pulse => Self {
                scale: 1.0 + wave * PULSE_AMPLITUDE,
                ..identity
            },
            TextAnimation::Glow => Self {
                glow_blur: Some(wave.abs() * GLOW_MAX_BLUR),
                ..identity
            },
            TextAnimation::Slide => Self {
                offset_x: wave * SLIDE_AMPLITUDE * canvas_size,
                ..identity
            },
            TextAnimation::Fade => Self {
                alpha: (wave + 1.0) / 2.0,
                ..identity
            },
        }
    }

    /// Applies the geometric part and alpha to `ctx`.
    ///
    /// Callers apply it inside a saved state so it never leaks across frames.
    pub fn apply(&self, ctx: &mut Context2d) {
        let center = (ctx.width() as f32 / 2.0, ctx.height() as f32 / 2.0);
        apply_geometry(
            ctx,
            center,
            self.offset_x,
            self.offset_y,
            self.rotation,
            self.scale,
            self.alpha,
        );
    }
}

// ============================================================================
// Image Transform
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTransform {
    pub offset_x: f32,
    pub offset_y: f32,
    pub rotation: f32,
    pub scale: f32,
    pub alpha: f32,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0.0,
            scale: 1.0,
            alpha: 1.0,
        }
    }
}

impl ImageTransform {
    /// `amplitude` is a percentage: of the canvas size for motion, of the
    /// image size for `pulse`, of a quarter turn for `shake`.
    pub fn compute(kind: ImageAnimation, progress: f32, canvas_size: f32, amplitude: f32) -> Self {
        let wave = (progress * TAU).sin();
        let magnitude = amplitude / 100.0;
        let identity = Self::default();
        match kind {
            ImageAnimation::None => identity,
            ImageAnimation::Rotate => Self {
                rotation: progress * TAU,
                ..identity
            },
            ImageAnimation::Bounce => Self {
                offset_y: -wave.abs() * magnitude * canvas_size,
                ..identity
            },
            ImageAnimation::Pulse => Self {
                scale: 1.0 + wave * magnitude,
                ..identity
            },
            ImageAnimation::Slide => Self {
                offset_x: wave * magnitude * canvas_size,
                ..identity
            },
            ImageAnimation::Fade => Self {
                alpha: (wave + 1.0) / 2.0,
                ..identity
            },
            ImageAnimation::Shake => Self {
                rotation: (progress * 4.0 * TAU).sin() * magnitude * PI / 2.0,
                ..identity
            },
        }
    }

    /// Applies the transform, rotating and scaling about `pivot`.
    pub fn apply(&self, ctx: &mut Context2d, pivot: (f32, f32)) {
        apply_geometry(
            ctx,
            pivot,
            self.offset_x,
            self.offset_y,
            self.rotation,
            self.scale,
            self.alpha,
        );
    }
}

fn apply_geometry(
    ctx: &mut Context2d,
    (px, py): (f32, f32),
    offset_x: f32,
    offset_y: f32,
    rotation: f32,
    scale: f32,
    alpha: f32,
) {
    ctx.translate(offset_x, offset_y);
    if rotation != 0.0 || scale != 1.0 {
        ctx.translate(px, py);
        ctx.rotate(rotation);
        ctx.scale(scale, scale);
        ctx.translate(-px, -py);
    }
    ctx.set_global_alpha(ctx.global_alpha() * alpha);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn progress_is_normalized() {
        assert_eq!(progress(0, 30), 0.0);
        assert_eq!(progress(15, 30), 0.5);
        assert_eq!(progress(30, 30), 0.0);
        assert_eq!(progress(3, 0), 0.0);
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(TextTransform::compute(TextAnimation::None, 0.4, 128.0), TextTransform::default());
        assert_eq!(
            ImageTransform::compute(ImageAnimation::None, 0.4, 128.0, 10.0),
            ImageTransform::default()
        );
    }

    #[test]
    fn boundary_values_at_zero() {
        let bounce = TextTransform::compute(TextAnimation::Bounce, 0.0, 128.0);
        assert_eq!(bounce.offset_y, 0.0);
        let pulse = TextTransform::compute(TextAnimation::Pulse, 0.0, 128.0);
        assert_eq!(pulse.scale, 1.0);
        let fade = TextTransform::compute(TextAnimation::Fade, 0.0, 128.0);
        assert!((fade.alpha - 0.5).abs() < EPS);
        let rotate = TextTransform::compute(TextAnimation::Rotate, 0.0, 128.0);
        assert_eq!(rotate.rotation, 0.0);
        let slide = TextTransform::compute(TextAnimation::Slide, 0.0, 128.0);
        assert_eq!(slide.offset_x, 0.0);
        let rainbow = TextTransform::compute(TextAnimation::Rainbow, 0.0, 128.0);
        assert_eq!(rainbow.fill, FillOverride::Hue(0.0));
    }

    #[test]
    fn boundary_values_near_one() {
        let p = 29.0 / 30.0;
        let rotate = TextTransform::compute(TextAnimation::Rotate, p, 128.0);
        assert!(rotate.rotation < TAU);
        assert!((rotate.rotation - TAU * p).abs() < EPS);
        let bounce = TextTransform::compute(TextAnimation::Bounce, 0.999_999, 128.0);
        assert!(bounce.offset_y.abs() < 0.01);
        let pulse = TextTransform::compute(TextAnimation::Pulse, 0.999_999, 128.0);
        assert!((pulse.scale - 1.0).abs() < 0.001);
    }

    #[test]
    fn pulse_peaks_at_quarter() {
        let pulse = TextTransform::compute(TextAnimation::Pulse, 0.25, 128.0);
        assert!((pulse.scale - 1.2).abs() < EPS);
    }

    #[test]
    fn bounce_is_upward_only() {
        for frame in 0..30 {
            let t = TextTransform::compute(TextAnimation::Bounce, progress(frame, 30), 128.0);
            assert!(t.offset_y <= 0.0);
            assert!(t.offset_y >= -0.15 * 128.0 - EPS);
        }
        let frame7 = TextTransform::compute(TextAnimation::Bounce, progress(7, 30), 128.0);
        let expected = -(7.0_f32 / 30.0 * TAU).sin().abs() * 19.2;
        assert!((frame7.offset_y - expected).abs() < EPS);
        assert!((frame7.offset_y + 19.094).abs() < 0.01);
    }

    #[test]
    fn slide_spans_both_directions() {
        let right = TextTransform::compute(TextAnimation::Slide, 0.25, 100.0);
        let left = TextTransform::compute(TextAnimation::Slide, 0.75, 100.0);
        assert!((right.offset_x - 23.0).abs() < EPS);
        assert!((left.offset_x + 23.0).abs() < EPS);
    }

    #[test]
    fn blink_alternates() {
        assert_eq!(TextTransform::compute(TextAnimation::Blink, 0.1, 128.0).fill, FillOverride::Keep);
        assert_eq!(
            TextTransform::compute(TextAnimation::Blink, 0.3, 128.0).fill,
            FillOverride::Secondary
        );
    }

    #[test]
    fn glow_uses_secondary_shadow() {
        let glow = TextTransform::compute(TextAnimation::Glow, 0.25, 128.0);
        assert!((glow.glow_blur.unwrap() - GLOW_MAX_BLUR).abs() < EPS);
        assert_eq!(glow.fill, FillOverride::Keep);
    }

    #[test]
    fn image_motion_scales_with_amplitude() {
        let bounce = ImageTransform::compute(ImageAnimation::Bounce, 0.25, 100.0, 20.0);
        assert!((bounce.offset_y + 20.0).abs() < EPS);
        let pulse = ImageTransform::compute(ImageAnimation::Pulse, 0.25, 100.0, 50.0);
        assert!((pulse.scale - 1.5).abs() < EPS);
    }

    #[test]
    fn apply_is_scoped_to_guard() {
        use crate::canvas::ContextOptions;
        use crate::text::FontBook;

        let mut ctx = Context2d::new(100, 100, ContextOptions::default(), FontBook::empty()).unwrap();
        {
            let mut guard = ctx.save_guard();
            TextTransform::compute(TextAnimation::Bounce, 0.25, 100.0).apply(&mut guard);
            assert!((guard.transform().ty + 15.0).abs() < EPS);
            TextTransform::compute(TextAnimation::Fade, 0.75, 100.0).apply(&mut guard);
            assert!(guard.global_alpha() < EPS);
        }
        assert_eq!(ctx.transform(), resvg::tiny_skia::Transform::identity());
        assert_eq!(ctx.global_alpha(), 1.0);
    }

    #[test]
    fn rotation_keeps_pivot_fixed() {
        use crate::canvas::ContextOptions;
        use crate::text::FontBook;

        let mut ctx = Context2d::new(64, 64, ContextOptions::default(), FontBook::empty()).unwrap();
        ImageTransform::compute(ImageAnimation::Rotate, 0.25, 64.0, 10.0).apply(&mut ctx, (10.0, 20.0));
        let mut pivot = resvg::tiny_skia::Point::from_xy(10.0, 20.0);
        ctx.transform().map_point(&mut pivot);
        assert!((pivot.x - 10.0).abs() < 1e-3);
        assert!((pivot.y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn kinds_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&TextAnimation::Rainbow).unwrap(), "\"rainbow\"");
        assert_eq!(
            serde_json::from_str::<ImageAnimation>("\"shake\"").unwrap(),
            ImageAnimation::Shake
        );
    }
}
