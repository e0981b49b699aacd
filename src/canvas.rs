//! Surface creation.
//!
//! A [`Surface`] is always exactly the requested size. Its [`Context2d`] is
//! optional: when no backing store can be allocated the surface is still
//! returned and callers skip drawing.
//!
//! # Example
//!
//! ```
//! use emoji_renderer::{create_surface, ContextOverrides};
//!
//! let surface = create_surface(128, 128, None);
//! assert!(surface.context().is_some());
//!
//! let opaque = ContextOverrides { alpha: Some(false), ..ContextOverrides::default() };
//! let surface = create_surface(32, 32, Some(&opaque));
//! assert!(!surface.context().unwrap().options().alpha);
//! ```

use crate::context::Context2d;
use crate::settings::{CanvasSize, Settings};
use crate::text::FontBook;

/// Edge length of the standard preset.
pub const STANDARD_SIZE: u32 = 128;

// ============================================================================
// Context Options
// ============================================================================

/// Options a context is acquired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Keep an alpha channel. Without one, cleared pixels are opaque black.
    pub alpha: bool,
    /// Hint that pixels will be read back often (exports, thumbnails).
    pub will_read_frequently: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            will_read_frequently: true,
        }
    }
}

impl ContextOptions {
    /// Applies caller overrides; set fields win.
    pub fn merged(self, overrides: &ContextOverrides) -> Self {
        Self {
            alpha: overrides.alpha.unwrap_or(self.alpha),
            will_read_frequently: overrides
                .will_read_frequently
                .unwrap_or(self.will_read_frequently),
        }
    }
}

/// Caller-supplied context options. `None` keeps the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOverrides {
    pub alpha: Option<bool>,
    pub will_read_frequently: Option<bool>,
}

// ============================================================================
// Surface
// ============================================================================

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if width equals height.
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// A drawing target paired with its (possibly unavailable) context.
#[derive(Debug)]
pub struct Surface {
    size: SizePx,
    context: Option<Context2d>,
}

impl Surface {
    pub fn size(&self) -> SizePx {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn context(&self) -> Option<&Context2d> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut Context2d> {
        self.context.as_mut()
    }
}

/// Creates a surface backed by the system fonts.
pub fn create_surface(width: u32, height: u32, overrides: Option<&ContextOverrides>) -> Surface {
    create_surface_with_fonts(width, height, overrides, FontBook::system())
}

/// Creates a surface whose context draws text from `fonts`.
pub fn create_surface_with_fonts(
    width: u32,
    height: u32,
    overrides: Option<&ContextOverrides>,
    fonts: FontBook,
) -> Surface {
    let options = match overrides {
        Some(o) => ContextOptions::default().merged(o),
        None => ContextOptions::default(),
    };
    let context = Context2d::new(width, height, options, fonts);
    if context.is_none() {
        tracing::warn!(width, height, "2d context unavailable for surface");
    }
    Surface {
        size: SizePx::new(width, height),
        context,
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Named surface sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasPreset {
    /// 128 x 128.
    Standard,
    /// Square preview of the given edge length.
    Preview(u32),
    /// Sized from the settings' canvas size.
    Animation(CanvasSize),
}

impl CanvasPreset {
    pub fn for_settings(settings: &Settings) -> Self {
        Self::Animation(settings.canvas_size)
    }

    pub fn size(&self) -> SizePx {
        let edge = match *self {
            Self::Standard => STANDARD_SIZE,
            Self::Preview(edge) => edge,
            Self::Animation(size) => size.pixels(),
        };
        SizePx::new(edge, edge)
    }

    pub fn create(&self, fonts: FontBook) -> Surface {
        let size = self.size();
        create_surface_with_fonts(size.width, size.height, None, fonts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_has_requested_size() {
        let surface = create_surface_with_fonts(40, 20, None, FontBook::empty());
        assert_eq!(surface.size(), SizePx::new(40, 20));
        let ctx = surface.context().unwrap();
        assert_eq!((ctx.width(), ctx.height()), (40, 20));
        assert_eq!(ctx.options(), ContextOptions::default());
    }

    #[test]
    fn failed_acquisition_keeps_surface() {
        let surface = create_surface_with_fonts(0, 0, None, FontBook::empty());
        assert_eq!(surface.size(), SizePx::new(0, 0));
        assert!(surface.context().is_none());
    }

    #[test]
    fn caller_options_win() {
        let overrides = ContextOverrides {
            alpha: Some(false),
            will_read_frequently: None,
        };
        let merged = ContextOptions::default().merged(&overrides);
        assert!(!merged.alpha);
        assert!(merged.will_read_frequently);
    }

    #[test]
    fn presets() {
        assert_eq!(CanvasPreset::Standard.size(), SizePx::new(128, 128));
        assert_eq!(CanvasPreset::Preview(48).size(), SizePx::new(48, 48));
        let small = Settings {
            canvas_size: CanvasSize::Small,
            ..Settings::default()
        };
        assert_eq!(CanvasPreset::for_settings(&small).size(), SizePx::new(64, 64));
        assert!(CanvasPreset::for_settings(&Settings::default()).size().is_square());
        let surface = CanvasPreset::Preview(32).create(FontBook::empty());
        assert_eq!(surface.width(), 32);
    }
}
