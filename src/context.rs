//! 2D drawing context bound to a raster surface.
//!
//! [`Context2d`] follows the canvas drawing model: a current state (transform,
//! global alpha, fill/stroke styles, shadow, font, text alignment) that can be
//! pushed and popped, plus drawing calls that read it. State changes should go
//! through [`Context2d::save_guard`], which restores on drop so no exit path
//! can leak a transform into the next frame.

use std::ops::{Deref, DerefMut};

use image::RgbaImage;
use resvg::tiny_skia::{
    self, BlendMode, FilterQuality, GradientStop, Paint, Pixmap, PixmapPaint, PixmapRef, Point,
    Rect, SpreadMode, Transform,
};

use crate::canvas::ContextOptions;
use crate::color::Rgba8;
use crate::error::RenderResult;
use crate::text::{
    self, FillStyle, Font, FontBook, RunPaint, Shadow, TextAlign, TextBaseline, TextMetrics,
    TextRun,
};

/// Drawing state that can be saved and restored.
#[derive(Debug, Clone)]
struct DrawState {
    transform: Transform,
    global_alpha: f32,
    fill: FillStyle,
    stroke_color: Rgba8,
    line_width: f32,
    shadow: Option<Shadow>,
    font: Font,
    text_align: TextAlign,
    text_baseline: TextBaseline,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            global_alpha: 1.0,
            fill: FillStyle::default(),
            stroke_color: Rgba8::BLACK,
            line_width: 1.0,
            shadow: None,
            font: Font::default(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
        }
    }
}

pub struct Context2d {
    pixmap: Pixmap,
    options: ContextOptions,
    fonts: FontBook,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Context2d {
    /// Acquires a context for a `width` x `height` surface.
    ///
    /// Returns `None` when no backing store can be allocated (zero or
    /// oversized dimensions).
    pub fn new(width: u32, height: u32, options: ContextOptions, fonts: FontBook) -> Option<Self> {
        let pixmap = Pixmap::new(width, height)?;
        let mut ctx = Self {
            pixmap,
            options,
            fonts,
            state: DrawState::default(),
            stack: Vec::new(),
        };
        ctx.clear();
        Some(ctx)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn set_fonts(&mut self, fonts: FontBook) {
        self.fonts = fonts;
    }

    // ---- State ----

    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    /// Pops the last saved state. Unbalanced calls are ignored.
    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    /// Saves the state and returns a guard that restores it when dropped.
    pub fn save_guard(&mut self) -> StateGuard<'_> {
        self.save();
        StateGuard { ctx: self }
    }

    /// Depth of the save stack.
    pub fn saved_depth(&self) -> usize {
        self.stack.len()
    }

    // ---- Transform ----

    pub fn translate(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform.pre_translate(x, y);
    }

    /// Rotates by `angle` radians.
    pub fn rotate(&mut self, angle: f32) {
        let (sin, cos) = angle.sin_cos();
        let rotation = Transform::from_row(cos, sin, -sin, cos, 0.0, 0.0);
        self.state.transform = self.state.transform.pre_concat(rotation);
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform.pre_scale(x, y);
    }

    pub fn transform(&self) -> Transform {
        self.state.transform
    }

    pub fn reset_transform(&mut self) {
        self.state.transform = Transform::identity();
    }

    // ---- Style ----

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    pub fn set_fill_style(&mut self, fill: FillStyle) {
        self.state.fill = fill;
    }

    pub fn set_fill_color(&mut self, color: Rgba8) {
        self.state.fill = FillStyle::Color(color);
    }

    pub fn fill_style(&self) -> &FillStyle {
        &self.state.fill
    }

    pub fn set_stroke(&mut self, color: Rgba8, width: f32) {
        self.state.stroke_color = color;
        self.state.line_width = width.max(0.0);
    }

    pub fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.state.shadow = shadow;
    }

    pub fn shadow(&self) -> Option<&Shadow> {
        self.state.shadow.as_ref()
    }

    pub fn set_font(&mut self, font: Font) {
        self.state.font = font;
    }

    pub fn font(&self) -> &Font {
        &self.state.font
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.text_baseline = baseline;
    }

    // ---- Drawing ----

    /// Resets every pixel: transparent, or opaque black without an alpha channel.
    pub fn clear(&mut self) {
        if self.options.alpha {
            self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        } else {
            self.pixmap.fill(tiny_skia::Color::BLACK);
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        if let Some(paint) = self.fill_paint() {
            self.pixmap.fill_rect(rect, &paint, self.state.transform, None);
        }
    }

    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult<()> {
        let fill = self.state.fill;
        self.draw_text(text, x, y, RunPaint::Fill(&fill))
    }

    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult<()> {
        if self.state.line_width <= 0.0 {
            return Ok(());
        }
        let paint = RunPaint::Stroke {
            color: self.state.stroke_color,
            width: self.state.line_width,
        };
        self.draw_text(text, x, y, paint)
    }

    /// Strokes then fills `text` as one shape, so the shadow is cast once.
    /// Without a line width this is [`Self::fill_text`].
    pub fn fill_and_stroke_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult<()> {
        if self.state.line_width <= 0.0 {
            return self.fill_text(text, x, y);
        }
        let fill = self.state.fill;
        let paint = RunPaint::FillAndStroke {
            fill: &fill,
            stroke: self.state.stroke_color,
            width: self.state.line_width,
        };
        self.draw_text(text, x, y, paint)
    }

    pub fn measure_text(&self, text: &str) -> RenderResult<TextMetrics> {
        text::measure(text, &self.state.font, &self.fonts)
    }

    /// Draws `src` into the destination rectangle under the current transform.
    pub fn draw_pixmap(&mut self, src: PixmapRef<'_>, dx: f32, dy: f32, dw: f32, dh: f32) {
        if src.width() == 0 || src.height() == 0 || dw <= 0.0 || dh <= 0.0 {
            return;
        }
        let transform = self
            .state
            .transform
            .pre_translate(dx, dy)
            .pre_scale(dw / src.width() as f32, dh / src.height() as f32);
        let paint = PixmapPaint {
            opacity: self.state.global_alpha,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        self.pixmap.draw_pixmap(0, 0, src, &paint, transform, None);
    }

    // ---- Output ----

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Copy of the current bitmap.
    pub fn snapshot(&self) -> Pixmap {
        self.pixmap.clone()
    }

    /// Straight-alpha copy of the current bitmap.
    pub fn to_rgba_image(&self) -> RgbaImage {
        text::pixmap_to_rgba_image(&self.pixmap)
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: RunPaint<'_>) -> RenderResult<()> {
        let run = TextRun {
            text,
            x,
            y,
            font: &self.state.font,
            align: self.state.text_align,
            baseline: self.state.text_baseline,
            paint,
            shadow: self.state.shadow.as_ref(),
            opacity: self.state.global_alpha,
        };
        text::rasterize(&run, &self.fonts, &mut self.pixmap, self.state.transform)
    }

    fn fill_paint(&self) -> Option<Paint<'static>> {
        let mut paint = Paint {
            anti_alias: true,
            ..Paint::default()
        };
        match self.state.fill {
            FillStyle::Color(color) => {
                let mut color = color.to_skia();
                color.apply_opacity(self.state.global_alpha);
                paint.set_color(color);
            }
            FillStyle::Linear(g) => {
                let mut shader = tiny_skia::LinearGradient::new(
                    Point::from_xy(g.start.0, g.start.1),
                    Point::from_xy(g.end.0, g.end.1),
                    vec![
                        GradientStop::new(0.0, g.from.to_skia()),
                        GradientStop::new(1.0, g.to.to_skia()),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                )?;
                shader.apply_opacity(self.state.global_alpha);
                paint.shader = shader;
            }
        }
        Some(paint)
    }
}

impl std::fmt::Debug for Context2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context2d")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("options", &self.options)
            .field("saved_depth", &self.stack.len())
            .finish()
    }
}

// ============================================================================
// Scoped State
// ============================================================================

/// Restores the context state saved by [`Context2d::save_guard`] on drop.
pub struct StateGuard<'a> {
    ctx: &'a mut Context2d,
}

impl Deref for StateGuard<'_> {
    type Target = Context2d;

    fn deref(&self) -> &Context2d {
        self.ctx
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context2d {
        self.ctx
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.ctx.restore();
    }
}

// ============================================================================
// Tests
// ============================================================================
