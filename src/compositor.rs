//! Paints one instant of the emoji onto a context.
//!
//! The compositor is stateless: every call reads the settings, lays the text
//! out from scratch and paints background, text and the optional image layer.
//! Animation deltas come from [`crate::animation`] and are applied inside a
//! scoped context state.

use crate::animation::{FillOverride, ImageTransform, TextTransform, progress};
use crate::color::Rgba8;
use crate::context::Context2d;
use crate::error::RenderResult;
use crate::image_layer::{ImageLayer, load_image};
use crate::settings::{BackgroundType, GradientDirection, ImagePosition, Settings, TextColorMode};
use crate::text::{
    self, FillStyle, Font, FontWeight, LinearGradient, Shadow, TextAlign, TextBaseline,
    TextMetrics, is_decorative_font,
};

/// Base font size as a fraction of the canvas size.
pub const BASE_FONT_FRACTION: f32 = 0.7;
pub const DECORATIVE_BASE_FONT_FRACTION: f32 = 0.5;
/// Padding on each side as a fraction of the canvas size.
pub const PADDING_FRACTION: f32 = 0.02;
pub const DECORATIVE_PADDING_FRACTION: f32 = 0.1;
/// Line advance relative to the base font size.
pub const LINE_HEIGHT: f32 = 1.2;
/// Upper bound on either scale factor for decorative fonts.
pub const DECORATIVE_SCALE_CAP: f32 = 0.9;

// ============================================================================
// Layout
// ============================================================================

/// Scale-to-fit layout of a multi-line text block.
///
/// Lines are laid out at `base_size` around the origin and then scaled
/// independently on each axis so the block fills the padded canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    /// Pen x of each line that puts its ink center on the block center.
    pub line_starts: Vec<f32>,
    pub base_size: f32,
    pub line_height: f32,
    /// Width of the widest line at `base_size`.
    pub block_width: f32,
    pub block_height: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl TextLayout {
    /// Lays out `text` for a `width` x `height` canvas.
    ///
    /// `measure` returns the ink metrics of a line at a font size. Returns `None`
    /// when nothing would be drawn: no non-blank lines, or nothing measurable.
    pub fn compute<M>(
        text: &str,
        width: u32,
        height: u32,
        decorative: bool,
        mut measure: M,
    ) -> RenderResult<Option<Self>>
    where
        M: FnMut(&str, f32) -> RenderResult<TextMetrics>,
    {
        let lines: Vec<String> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            return Ok(None);
        }

        let size = width.min(height) as f32;
        let (font_fraction, padding_fraction) = if decorative {
            (DECORATIVE_BASE_FONT_FRACTION, DECORATIVE_PADDING_FRACTION)
        } else {
            (BASE_FONT_FRACTION, PADDING_FRACTION)
        };
        let base_size = size * font_fraction;
        let padding = size * padding_fraction;

        let mut block_width: f32 = 0.0;
        let mut line_starts = Vec::with_capacity(lines.len());
        for line in &lines {
            let metrics = measure(line, base_size)?;
            block_width = block_width.max(metrics.width);
            line_starts.push(-(metrics.left + metrics.width / 2.0));
        }
        if block_width <= 0.0 {
            return Ok(None);
        }

        let line_height = base_size * LINE_HEIGHT;
        let block_height = line_height * lines.len() as f32;
        let mut scale_x = (width as f32 - padding * 2.0).max(0.0) / block_width;
        let mut scale_y = (height as f32 - padding * 2.0).max(0.0) / block_height;
        if decorative {
            scale_x = scale_x.min(DECORATIVE_SCALE_CAP);
            scale_y = scale_y.min(DECORATIVE_SCALE_CAP);
        }

        Ok(Some(Self {
            lines,
            line_starts,
            base_size,
            line_height,
            block_width,
            block_height,
            scale_x,
            scale_y,
        }))
    }

    /// Vertical center of line `index`, relative to the block center.
    pub fn line_offset(&self, index: usize) -> f32 {
        let middle = (self.lines.len() as f32 - 1.0) / 2.0;
        (index as f32 - middle) * self.line_height
    }
}

// ============================================================================
// Painting
// ============================================================================

/// Fills the whole surface, ignoring the current transform and alpha.
pub fn fill_background(ctx: &mut Context2d, color: Rgba8) {
    let mut guard = ctx.save_guard();
    guard.reset_transform();
    guard.set_global_alpha(1.0);
    guard.set_fill_color(color);
    let (w, h) = (guard.width() as f32, guard.height() as f32);
    guard.fill_rect(0.0, 0.0, w, h);
}

fn wants_background(settings: &Settings) -> bool {
    settings.is_animated() || settings.background_type == BackgroundType::Color
}

/// Paints the non-animated appearance.
pub fn paint_static(ctx: &mut Context2d, settings: &Settings) -> RenderResult<()> {
    let image = load_image(settings, None);
    paint_static_with(ctx, settings, image.as_ref())
}

/// [`paint_static`] with an already decoded image layer.
pub fn paint_static_with(
    ctx: &mut Context2d,
    settings: &Settings,
    image: Option<&ImageLayer>,
) -> RenderResult<()> {
    if wants_background(settings) {
        fill_background(ctx, settings.background());
    }
    paint_layers(
        ctx,
        settings,
        image,
        &TextTransform::default(),
        &ImageTransform::default(),
    )
}

/// Paints frame `frame_index` of a `frame_count` frame cycle.
pub fn paint_frame(
    ctx: &mut Context2d,
    settings: &Settings,
    frame_index: u32,
    frame_count: u32,
) -> RenderResult<()> {
    let image = load_image(settings, None);
    paint_frame_with(ctx, settings, image.as_ref(), frame_index, frame_count)
}

/// [`paint_frame`] with an already decoded image layer.
pub fn paint_frame_with(
    ctx: &mut Context2d,
    settings: &Settings,
    image: Option<&ImageLayer>,
    frame_index: u32,
    frame_count: u32,
) -> RenderResult<()> {
    if wants_background(settings) {
        fill_background(ctx, settings.background());
    }
    let p = progress(frame_index, frame_count);
    let size = ctx.width().min(ctx.height()) as f32;
    let text_transform = TextTransform::compute(settings.animation, p, size);
    let image_transform = ImageTransform::compute(
        settings.image_animation,
        p,
        size,
        settings.image_animation_amplitude,
    );
    paint_layers(ctx, settings, image, &text_transform, &image_transform)
}

fn paint_layers(
    ctx: &mut Context2d,
    settings: &Settings,
    image: Option<&ImageLayer>,
    text_transform: &TextTransform,
    image_transform: &ImageTransform,
) -> RenderResult<()> {
    let (back, front) = match settings.image_position {
        ImagePosition::Back => (image, None),
        ImagePosition::Front => (None, image),
    };
    if let Some(layer) = back {
        paint_image(ctx, settings, layer, image_transform);
    }
    paint_text(ctx, settings, text_transform)?;
    if let Some(layer) = front {
        paint_image(ctx, settings, layer, image_transform);
    }
    Ok(())
}

fn paint_image(
    ctx: &mut Context2d,
    settings: &Settings,
    layer: &ImageLayer,
    transform: &ImageTransform,
) {
    let placement = layer.placement(
        ctx.width(),
        ctx.height(),
        settings.image_x,
        settings.image_y,
        settings.image_size,
    );
    let mut guard = ctx.save_guard();
    transform.apply(&mut guard, placement.center());
    let alpha = guard.global_alpha() * (settings.image_opacity / 100.0).clamp(0.0, 1.0);
    guard.set_global_alpha(alpha);
    guard.draw_pixmap(
        layer.pixmap(),
        placement.x,
        placement.y,
        placement.width,
        placement.height,
    );
}

/// Paints the text block with `transform` applied. Blank text is a no-op.
pub fn paint_text(
    ctx: &mut Context2d,
    settings: &Settings,
    transform: &TextTransform,
) -> RenderResult<()> {
    let family = settings.font_family.as_str();
    let weight = FontWeight::for_family(family).value();
    let font_at = |size: f32| Font {
        family: family.to_string(),
        size,
        weight,
    };

    let fonts = ctx.fonts().clone();
    let layout = TextLayout::compute(
        &settings.text,
        ctx.width(),
        ctx.height(),
        is_decorative_font(family),
        |line, size| text::measure(line, &font_at(size), &fonts),
    )?;
    let Some(layout) = layout else {
        return Ok(());
    };

    let (cx, cy) = (ctx.width() as f32 / 2.0, ctx.height() as f32 / 2.0);
    let mut guard = ctx.save_guard();
    transform.apply(&mut guard);
    guard.translate(cx, cy);
    guard.scale(layout.scale_x, layout.scale_y);

    guard.set_font(font_at(layout.base_size));
    guard.set_text_align(TextAlign::Start);
    guard.set_text_baseline(TextBaseline::Middle);
    guard.set_fill_style(fill_style(settings, transform.fill, &layout));
    guard.set_shadow(shadow(settings, transform));

    let mean_scale = (layout.scale_x + layout.scale_y) / 2.0;
    let stroke_width = if mean_scale > 0.0 {
        settings.stroke_width.max(0.0) / mean_scale
    } else {
        0.0
    };
    guard.set_stroke(Rgba8::parse_or(&settings.stroke_color, Rgba8::WHITE), stroke_width);

    for (i, (line, x)) in layout.lines.iter().zip(&layout.line_starts).enumerate() {
        guard.fill_and_stroke_text(line, *x, layout.line_offset(i))?;
    }
    Ok(())
}

fn fill_style(settings: &Settings, fill: FillOverride, layout: &TextLayout) -> FillStyle {
    match fill {
        FillOverride::Hue(hue) => FillStyle::Color(Rgba8::from_hsl(hue, 1.0, 0.5)),
        FillOverride::Secondary => FillStyle::Color(settings.secondary_rgba()),
        FillOverride::Keep => match settings.text_color_mode {
            TextColorMode::Solid => FillStyle::Color(settings.font_rgba()),
            TextColorMode::Gradient => {
                let (start, end) = match settings.gradient_direction {
                    GradientDirection::Horizontal => {
                        let half = layout.block_width / 2.0;
                        ((-half, 0.0), (half, 0.0))
                    }
                    GradientDirection::Vertical => {
                        let half = layout.block_height / 2.0;
                        ((0.0, -half), (0.0, half))
                    }
                };
                FillStyle::Linear(LinearGradient {
                    start,
                    end,
                    from: Rgba8::parse_or(&settings.gradient_color1, Rgba8::BLACK),
                    to: Rgba8::parse_or(&settings.gradient_color2, Rgba8::BLACK),
                })
            }
        },
    }
}

fn shadow(settings: &Settings, transform: &TextTransform) -> Option<Shadow> {
    if let Some(blur) = transform.glow_blur {
        return Some(Shadow {
            color: settings.secondary_rgba(),
            blur,
            offset_x: 0.0,
            offset_y: 0.0,
        });
    }
    let enabled = settings.shadow_blur > 0.0
        || settings.shadow_offset_x != 0.0
        || settings.shadow_offset_y != 0.0;
    enabled.then(|| Shadow {
        color: Rgba8::parse_or(&settings.shadow_color, Rgba8::new(0, 0, 0, 128)),
        blur: settings.shadow_blur,
        offset_x: settings.shadow_offset_x,
        offset_y: settings.shadow_offset_y,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::animation::TextAnimation;
    use crate::canvas::ContextOptions;
    use crate::text::FontBook;

    fn ctx(size: u32, fonts: FontBook) -> Context2d {
        Context2d::new(size, size, ContextOptions::default(), fonts).unwrap()
    }

    /// Monospace stand-in: every char is 0.6 em wide.
    fn mono(line: &str, size: f32) -> RenderResult<TextMetrics> {
        Ok(TextMetrics {
            width: line.chars().count() as f32 * size * 0.6,
            height: size,
            left: 0.0,
        })
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of pixels with any alpha.
    fn ink_bounds(c: &Context2d) -> Option<(u32, u32, u32, u32)> {
        let width = c.width();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (i, p) in c.pixmap().pixels().iter().enumerate() {
            if p.alpha() == 0 {
                continue;
            }
            let (x, y) = (i as u32 % width, i as u32 / width);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds
    }

    #[test]
    fn single_line_fills_padded_width() {
        let layout = TextLayout::compute("OK", 128, 128, false, mono).unwrap().unwrap();
        assert_eq!(layout.lines, vec!["OK".to_string()]);
        assert_eq!(layout.line_starts, vec![-layout.block_width / 2.0]);
        assert!((layout.base_size - 89.6).abs() < 1e-4);
        let drawn_width = layout.block_width * layout.scale_x;
        assert!((drawn_width / 128.0 - 0.96).abs() < 1e-4);
        let drawn_height = layout.block_height * layout.scale_y;
        assert!((drawn_height / 128.0 - 0.96).abs() < 1e-4);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let layout = TextLayout::compute("A\n\n  \nBB\n", 64, 64, false, mono).unwrap().unwrap();
        assert_eq!(layout.lines, vec!["A".to_string(), "BB".to_string()]);
        assert!((layout.block_height - layout.base_size * 1.2 * 2.0).abs() < 1e-4);
        assert!((layout.line_offset(0) + layout.line_height / 2.0).abs() < 1e-4);
        assert!((layout.line_offset(1) - layout.line_height / 2.0).abs() < 1e-4);
    }

    #[test]
    fn empty_or_unmeasurable_text_lays_out_nothing() {
        assert!(TextLayout::compute("", 128, 128, false, mono).unwrap().is_none());
        assert!(TextLayout::compute(" \n\n", 128, 128, false, mono).unwrap().is_none());
        let zero = |_: &str, _: f32| -> RenderResult<TextMetrics> { Ok(TextMetrics::default()) };
        assert!(TextLayout::compute("OK", 128, 128, false, zero).unwrap().is_none());
    }

    #[test]
    fn side_bearing_shifts_pen_position() {
        let bearing = |line: &str, size: f32| -> RenderResult<TextMetrics> {
            Ok(TextMetrics {
                left: 5.0,
                ..mono(line, size)?
            })
        };
        let layout = TextLayout::compute("AB\nC", 128, 128, false, bearing).unwrap().unwrap();
        let widths = [2.0 * 89.6 * 0.6 / 2.0, 89.6 * 0.6 / 2.0];
        for (start, half) in layout.line_starts.iter().zip(widths) {
            assert!((start + 5.0 + half).abs() < 1e-3, "{start}");
        }
    }

    #[test]
    fn decorative_fonts_are_capped() {
        let layout = TextLayout::compute("I", 128, 128, true, mono).unwrap().unwrap();
        assert!((layout.base_size - 64.0).abs() < 1e-4);
        assert_eq!(layout.scale_x, DECORATIVE_SCALE_CAP);
        assert!(layout.scale_y <= DECORATIVE_SCALE_CAP);
    }

    #[test]
    fn scale_is_not_aspect_preserving() {
        let layout = TextLayout::compute("WIDE TEXT", 128, 128, false, mono).unwrap().unwrap();
        assert!(layout.scale_x < layout.scale_y);
    }

    #[test]
    fn measure_errors_propagate() {
        let failing =
            |_: &str, _: f32| -> RenderResult<TextMetrics> { Err(crate::error::RenderError::text("boom")) };
        assert!(TextLayout::compute("OK", 128, 128, false, failing).is_err());
    }

    #[test]
    fn static_transparent_leaves_background_clear() {
        let mut c = ctx(32, FontBook::empty());
        paint_static(&mut c, &Settings::with_text("OK")).unwrap();
        assert!(c.pixmap().pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn color_background_fills_surface() {
        let mut c = ctx(16, FontBook::empty());
        let settings = Settings {
            background_type: BackgroundType::Color,
            background_color: "#00ff00".into(),
            ..Settings::with_text("OK")
        };
        c.translate(100.0, 100.0);
        paint_static(&mut c, &settings).unwrap();
        let px = c.pixmap().pixel(8, 8).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (0, 255, 0, 255));
    }

    #[test]
    fn animated_frames_are_opaque() {
        let mut c = ctx(16, FontBook::empty());
        let settings = Settings {
            animation: TextAnimation::Fade,
            ..Settings::with_text("UP")
        };
        paint_frame(&mut c, &settings, 7, 30).unwrap();
        assert!(c.pixmap().pixels().iter().all(|p| p.alpha() == 255));
        assert_eq!(c.saved_depth(), 0);
    }

    #[test]
    fn static_paint_is_idempotent() {
        let settings = Settings {
            text: "OK\nGO".into(),
            text_color_mode: TextColorMode::Gradient,
            stroke_width: 2.0,
            ..Settings::default()
        };
        let mut a = ctx(64, text::test_fonts());
        let mut b = ctx(64, text::test_fonts());
        paint_static(&mut a, &settings).unwrap();
        paint_static(&mut b, &settings).unwrap();
        assert!(ink_bounds(&a).is_some());
        assert_eq!(a.pixmap().data(), b.pixmap().data());
    }

    #[test]
    fn default_family_text_is_centered_at_full_width() {
        let mut c = ctx(128, text::test_fonts());
        paint_static(&mut c, &Settings::with_text("OK")).unwrap();
        let (x0, y0, x1, y1) = ink_bounds(&c).expect("text should leave ink");

        let span = (x1 - x0 + 1) as f32 / 128.0;
        assert!((0.93..=0.99).contains(&span), "span {span}");
        let center_x = (x0 + x1 + 1) as f32 / 2.0;
        assert!((center_x - 64.0).abs() <= 1.5, "center {center_x}");
        assert!(x0 >= 1 && x1 <= 126, "ink {x0}..{x1} reaches the edge");
        let center_y = (y0 + y1 + 1) as f32 / 2.0;
        assert!((center_y - 64.0).abs() <= 16.0, "vertical center {center_y}");
    }

    #[test]
    fn bounce_moves_text_between_frames() {
        let settings = Settings {
            animation: TextAnimation::Bounce,
            animation_speed: 20,
            ..Settings::with_text("UP")
        };
        let mut first = ctx(128, text::test_fonts());
        let mut seventh = ctx(128, text::test_fonts());
        paint_frame(&mut first, &settings, 0, 30).unwrap();
        paint_frame(&mut seventh, &settings, 7, 30).unwrap();
        assert_ne!(first.pixmap().data(), seventh.pixmap().data());

        // Background is opaque, so look for the black glyphs on white.
        let dark_top = |c: &Context2d| {
            c.pixmap()
                .pixels()
                .iter()
                .position(|p| p.red() < 128)
                .map(|i| i as u32 / c.width())
        };
        let (top0, top7) = (dark_top(&first).unwrap(), dark_top(&seventh).unwrap());
        // Frame 7 rises by about 19 px.
        assert!(top0 >= top7 + 15 && top0 <= top7 + 23, "{top0} vs {top7}");
    }

    #[test]
    fn outlined_text_casts_its_shadow_once() {
        let settings = Settings {
            font_color: "#ff0000".into(),
            stroke_width: 3.0,
            stroke_color: "#ff0000".into(),
            shadow_color: "rgba(0, 0, 255, 0.5)".into(),
            shadow_offset_x: 6.0,
            shadow_offset_y: 6.0,
            ..Settings::with_text("O")
        };
        let mut c = ctx(64, text::test_fonts());
        paint_static(&mut c, &settings).unwrap();

        let shadow_alpha = c
            .to_rgba_image()
            .pixels()
            .filter(|p| p.0[0] == 0 && p.0[3] > 0)
            .map(|p| p.0[3])
            .max()
            .expect("shadow should show beside the glyph");
        assert!((120..=136).contains(&shadow_alpha), "shadow alpha {shadow_alpha}");
    }

    #[test]
    fn image_layer_respects_opacity_and_order() {
        let layer = ImageLayer::from_rgba(&RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))).unwrap();
        let settings = Settings {
            image_opacity: 50.0,
            ..Settings::default()
        };
        let mut c = ctx(16, FontBook::empty());
        paint_static_with(&mut c, &settings, Some(&layer)).unwrap();
        let px = c.pixmap().pixel(8, 8).unwrap();
        assert!((px.alpha() as i32 - 128).abs() <= 1);

        let back = Settings {
            image_position: ImagePosition::Back,
            background_type: BackgroundType::Color,
            ..Settings::default()
        };
        let mut c = ctx(16, FontBook::empty());
        paint_static_with(&mut c, &back, Some(&layer)).unwrap();
        let px = c.pixmap().pixel(8, 8).unwrap();
        assert_eq!((px.red(), px.green(), px.alpha()), (255, 0, 255));
    }

    #[test]
    fn fill_override_replaces_font_color() {
        let layout = TextLayout::compute("A", 64, 64, false, mono).unwrap().unwrap();
        let settings = Settings::default();
        assert_eq!(
            fill_style(&settings, FillOverride::Hue(120.0), &layout),
            FillStyle::Color(Rgba8::rgb(0, 255, 0))
        );
        assert_eq!(
            fill_style(&settings, FillOverride::Secondary, &layout),
            FillStyle::Color(Rgba8::rgb(0xff, 0xd7, 0x00))
        );
        let gradient = Settings {
            text_color_mode: TextColorMode::Gradient,
            gradient_direction: GradientDirection::Horizontal,
            ..Settings::default()
        };
        let FillStyle::Linear(g) = fill_style(&gradient, FillOverride::Keep, &layout) else {
            panic!("expected gradient");
        };
        assert_eq!(g.start.1, 0.0);
        assert!((g.end.0 - layout.block_width / 2.0).abs() < 1e-4);
    }

    #[test]
    fn glow_overrides_configured_shadow() {
        let settings = Settings {
            shadow_blur: 3.0,
            ..Settings::default()
        };
        let plain = shadow(&settings, &TextTransform::default()).unwrap();
        assert_eq!(plain.blur, 3.0);
        let glow = TextTransform {
            glow_blur: Some(12.0),
            ..TextTransform::default()
        };
        let glowing = shadow(&settings, &glow).unwrap();
        assert_eq!(glowing.color, settings.secondary_rgba());
        assert_eq!(glowing.blur, 12.0);
        assert!(shadow(&Settings::default(), &TextTransform::default()).is_none());
    }
}
