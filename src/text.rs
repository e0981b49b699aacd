//! Text shaping and rasterization through resvg/usvg.
//!
//! Each text draw call is expressed as a single-element SVG document (font,
//! fill or gradient, stroke, drop shadow, opacity) and rendered onto the
//! target pixmap with the caller's transform. Measurement parses the same
//! document and reads the laid-out bounding box.

use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use crate::color::Rgba8;
use crate::error::{RenderError, RenderResult};

/// Family appended to every font stack.
pub const FALLBACK_FAMILY: &str = "sans-serif";

/// Family-name fragments that mark a font as decorative.
///
/// Decorative faces run wider and taller than their nominal size, so layout
/// gives them a smaller base size and more padding.
pub const DECORATIVE_FONTS: &[&str] = &[
    "Rampart",
    "Reggae",
    "RocknRoll",
    "Train One",
    "Stick",
    "DotGothic",
    "Yusei",
    "Hachi Maru",
    "Mochiy",
    "Dela Gothic",
];

pub fn is_decorative_font(family: &str) -> bool {
    DECORATIVE_FONTS.iter().any(|name| family.contains(name))
}

// ============================================================================
// Fonts
// ============================================================================

/// Weight used both when loading a family and when drawing with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
    Black,
}

impl FontWeight {
    /// Heavy families load at 900, decorative ones at their single
    /// regular weight, everything else bold.
    pub fn for_family(family: &str) -> Self {
        if family.contains("Black") {
            Self::Black
        } else if is_decorative_font(family) {
            Self::Normal
        } else {
            Self::Bold
        }
    }

    pub fn value(self) -> u16 {
        match self {
            Self::Normal => 400,
            Self::Bold => 700,
            Self::Black => 900,
        }
    }
}

/// A font face selection for text drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f32,
    pub weight: u16,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: FALLBACK_FAMILY.to_string(),
            size: 10.0,
            weight: FontWeight::Normal.value(),
        }
    }
}

/// Shared font database used by every drawing context.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<fontdb::Database>,
}

impl FontBook {
    /// System fonts, loaded once per process.
    pub fn system() -> Self {
        static SYSTEM: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
        let db = SYSTEM.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            bind_generic_families(&mut db);
            tracing::debug!(faces = db.len(), "loaded system fonts");
            Arc::new(db)
        });
        Self { db: Arc::clone(db) }
    }

    /// A database with no faces. Text draws nothing.
    pub fn empty() -> Self {
        Self::from_database(fontdb::Database::new())
    }

    pub fn from_database(mut db: fontdb::Database) -> Self {
        bind_generic_families(&mut db);
        Self { db: Arc::new(db) }
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.len() == 0
    }

    /// Adds a font file's faces. Other clones of this book are unaffected.
    pub fn load_font_data(&mut self, data: Vec<u8>) -> usize {
        let before = self.db.len();
        let db = Arc::make_mut(&mut self.db);
        db.load_font_data(data);
        bind_generic_families(db);
        self.db.len() - before
    }

    /// True when a face of `family` close to `weight` is present.
    pub fn has_face(&self, family: &str, weight: u16) -> bool {
        family_present(&self.db, fontdb::Family::Name(family), weight)
    }

    fn options(&self) -> usvg::Options<'static> {
        usvg::Options {
            fontdb: Arc::clone(&self.db),
            font_family: FALLBACK_FAMILY.to_string(),
            ..usvg::Options::default()
        }
    }
}

fn family_present(db: &fontdb::Database, family: fontdb::Family<'_>, weight: u16) -> bool {
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight(weight),
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    };
    db.query(&query).is_some()
}

/// Points `sans-serif` and `serif` at an installed face when their stock
/// mappings (Arial, Times New Roman) are missing.
///
/// Every font stack ends in `sans-serif` and usvg's last resort is `serif`;
/// if neither resolves, text nodes are dropped without an error.
fn bind_generic_families(db: &mut fontdb::Database) {
    let weight = FontWeight::Normal.value();
    let sans_missing = !family_present(db, fontdb::Family::SansSerif, weight);
    let serif_missing = !family_present(db, fontdb::Family::Serif, weight);
    if !sans_missing && !serif_missing {
        return;
    }
    let Some(family) = fallback_family_name(db) else {
        return;
    };
    tracing::debug!(family = %family, "binding generic font families");
    if sans_missing {
        db.set_sans_serif_family(family.clone());
    }
    if serif_missing {
        db.set_serif_family(family);
    }
}

/// A proportional sans face if one exists, else any face. Lowest name wins
/// so the choice does not depend on directory order.
fn fallback_family_name(db: &fontdb::Database) -> Option<String> {
    let mut sans: Option<&str> = None;
    let mut any: Option<&str> = None;
    for face in db.faces() {
        let Some((name, _)) = face.families.first() else {
            continue;
        };
        let name = name.as_str();
        if name.contains("Sans") && !name.contains("Mono") {
            sans = Some(sans.map_or(name, |s| s.min(name)));
        }
        any = Some(any.map_or(name, |a| a.min(name)));
    }
    sans.or(any).map(str::to_string)
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontBook").field("faces", &self.db.len()).finish()
    }
}

// ============================================================================
// Text Runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Start,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Middle,
}

/// Linear gradient between two colors, in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradient {
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub from: Rgba8,
    pub to: Rgba8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillStyle {
    Color(Rgba8),
    Linear(LinearGradient),
}

impl Default for FillStyle {
    fn default() -> Self {
        Self::Color(Rgba8::BLACK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Rgba8,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum RunPaint<'a> {
    Fill(&'a FillStyle),
    Stroke { color: Rgba8, width: f32 },
    /// Stroke painted under the fill as a single shape.
    FillAndStroke {
        fill: &'a FillStyle,
        stroke: Rgba8,
        width: f32,
    },
}

/// Everything needed to draw one string.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub font: &'a Font,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    pub paint: RunPaint<'a>,
    pub shadow: Option<&'a Shadow>,
    pub opacity: f32,
}

/// Ink extent of a laid-out string.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
    /// Distance from the pen position to the left edge of the ink.
    pub left: f32,
}

/// Draws `run` onto `pixmap` under `transform`.
pub(crate) fn rasterize(
    run: &TextRun<'_>,
    fonts: &FontBook,
    pixmap: &mut Pixmap,
    transform: Transform,
) -> RenderResult<()> {
    if run.text.trim().is_empty() || run.opacity <= 0.0 {
        return Ok(());
    }
    let doc = svg_document(run, pixmap.width(), pixmap.height());
    let tree = usvg::Tree::from_str(&doc, &fonts.options())
        .map_err(|e| RenderError::text(e.to_string()))?;
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(())
}

/// Measures the laid-out extent of `text` in `font`.
///
/// Returns zero metrics when no face can render the string.
pub(crate) fn measure(text: &str, font: &Font, fonts: &FontBook) -> RenderResult<TextMetrics> {
    if text.trim().is_empty() {
        return Ok(TextMetrics::default());
    }
    let fill = FillStyle::default();
    let run = TextRun {
        text,
        x: 0.0,
        y: 0.0,
        font,
        align: TextAlign::Start,
        baseline: TextBaseline::Alphabetic,
        paint: RunPaint::Fill(&fill),
        shadow: None,
        opacity: 1.0,
    };
    let doc = svg_document(&run, 1000, 1000);
    let tree = usvg::Tree::from_str(&doc, &fonts.options())
        .map_err(|e| RenderError::text(e.to_string()))?;
    let root = tree.root();
    if root.children().is_empty() {
        return Ok(TextMetrics::default());
    }
    let bbox = root.bounding_box();
    Ok(TextMetrics {
        width: bbox.width(),
        height: bbox.height(),
        left: bbox.x(),
    })
}

fn svg_document(run: &TextRun<'_>, width: u32, height: u32) -> String {
    let mut defs = String::new();
    let mut attrs = String::new();

    match run.paint {
        RunPaint::Fill(fill) => push_fill(&mut defs, &mut attrs, fill),
        RunPaint::Stroke { color, width } => {
            attrs.push_str(r#" fill="none""#);
            push_stroke(&mut attrs, color, width);
        }
        RunPaint::FillAndStroke { fill, stroke, width } => {
            push_fill(&mut defs, &mut attrs, fill);
            push_stroke(&mut attrs, stroke, width);
            attrs.push_str(r#" paint-order="stroke""#);
        }
    }

    if let Some(shadow) = run.shadow.filter(|s| s.blur > 0.0 || s.offset_x != 0.0 || s.offset_y != 0.0) {
        let _ = write!(
            defs,
            r#"<filter id="shadow" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}" flood-opacity="{}"/></filter>"#,
            shadow.offset_x,
            shadow.offset_y,
            shadow.blur / 2.0,
            shadow.color.to_hex(),
            shadow.color.opacity()
        );
        attrs.push_str(r#" filter="url(#shadow)""#);
    }

    let anchor = match run.align {
        TextAlign::Start => "start",
        TextAlign::Center => "middle",
    };
    let baseline = match run.baseline {
        TextBaseline::Alphabetic => "alphabetic",
        TextBaseline::Middle => "central",
    };

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><defs>{defs}</defs><text x="{x}" y="{y}" font-family="{family}" font-size="{size}" font-weight="{weight}" text-anchor="{anchor}" dominant-baseline="{baseline}" opacity="{opacity}" xml:space="preserve"{attrs}>{text}</text></svg>"#,
        x = run.x,
        y = run.y,
        family = escape_xml(&format!("'{}', {FALLBACK_FAMILY}", run.font.family)),
        size = run.font.size.max(0.01),
        weight = run.font.weight,
        opacity = run.opacity.clamp(0.0, 1.0),
        text = escape_xml(run.text),
    )
}

fn push_fill(defs: &mut String, attrs: &mut String, fill: &FillStyle) {
    match fill {
        FillStyle::Color(color) => {
            let _ = write!(
                attrs,
                r#" fill="{}" fill-opacity="{}""#,
                color.to_hex(),
                color.opacity()
            );
        }
        FillStyle::Linear(g) => {
            let _ = write!(
                defs,
                r#"<linearGradient id="fill" gradientUnits="userSpaceOnUse" x1="{}" y1="{}" x2="{}" y2="{}"><stop offset="0" stop-color="{}" stop-opacity="{}"/><stop offset="1" stop-color="{}" stop-opacity="{}"/></linearGradient>"#,
                g.start.0,
                g.start.1,
                g.end.0,
                g.end.1,
                g.from.to_hex(),
                g.from.opacity(),
                g.to.to_hex(),
                g.to.opacity()
            );
            attrs.push_str(r#" fill="url(#fill)""#);
        }
    }
}

fn push_stroke(attrs: &mut String, color: Rgba8, width: f32) {
    let _ = write!(
        attrs,
        r#" stroke="{}" stroke-opacity="{}" stroke-width="{}" stroke-linejoin="round""#,
        color.to_hex(),
        color.opacity(),
        width
    );
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Pixel Conversion
// ============================================================================

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let width = pixmap.width();
    let mut img = RgbaImage::new(width, pixmap.height());

    for (i, pixel) in pixmap.pixels().iter().enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        // tiny_skia uses premultiplied alpha, we need to unpremultiply
        let (r, g, b, a) = unpremultiply(pixel.red(), pixel.green(), pixel.blue(), pixel.alpha());
        img.put_pixel(x, y, Rgba([r, g, b, a]));
    }

    img
}

/// Unpremultiplies a premultiplied alpha pixel.
fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        (0, 0, 0, 0)
    } else {
        let a_f = a as f32 / 255.0;
        (
            (r as f32 / a_f).round().min(255.0) as u8,
            (g as f32 / a_f).round().min(255.0) as u8,
            (b as f32 / a_f).round().min(255.0) as u8,
            a,
        )
    }
}

/// A book holding only the bundled Tuffy face.
#[cfg(test)]
pub(crate) fn test_fonts() -> FontBook {
    let mut fonts = FontBook::empty();
    fonts.load_font_data(include_bytes!("../testdata/fonts/Tuffy.ttf").to_vec());
    fonts
}

// ============================================================================
// Tests
// ============================================================================
