//! emoji-renderer: Rendering and animation engine for text emoji
//!
//! This crate paints styled, optionally animated text (plus an optional image
//! layer) onto raster surfaces and exports the result as a static PNG or an
//! animated GIF sized for chat-platform custom emoji.
//!
//! # Example
//!
//! ```
//! use emoji_renderer::{generate_raster_output, Settings, TextAnimation};
//!
//! // Static text exports as PNG
//! let png = generate_raster_output(&Settings::with_text("OK")).unwrap();
//! assert!(png.starts_with("data:image/png;base64,"));
//!
//! // Any text animation exports as GIF
//! let settings = Settings {
//!     animation: TextAnimation::Bounce,
//!     gif_frames: 4,
//!     ..Settings::with_text("UP")
//! };
//! let gif = generate_raster_output(&settings).unwrap();
//! assert!(gif.starts_with("data:image/gif;base64,"));
//! ```
//!
//! # Live Preview
//!
//! [`RenderEngine`] keeps named canvases and runs their animation loops on a
//! [`FrameScheduler`]. [`PreviewCoordinator`] drives the usual pair of
//! canvases: the full-size `main` and a 32 px thumbnail.
//!
//! ```
//! use emoji_renderer::{PreviewCoordinator, Settings, TextAnimation, MAIN_CANVAS};
//!
//! let mut preview = PreviewCoordinator::with_defaults();
//! let settings = Settings { animation: TextAnimation::Rainbow, ..Settings::with_text("Hi") };
//! preview.update(&settings).unwrap();
//!
//! preview.pump(100.0).unwrap();
//! assert_eq!(preview.engine().record(MAIN_CANVAS).unwrap().frame(), 1);
//! ```

mod animation;
mod canvas;
mod color;
mod compositor;
mod context;
mod engine;
mod error;
mod export;
mod gif;
mod image_layer;
mod preview;
mod settings;
mod text;
mod worker;

pub use animation::{FillOverride, ImageAnimation, ImageTransform, TextAnimation, TextTransform, progress};
pub use canvas::{
    CanvasPreset, ContextOptions, ContextOverrides, STANDARD_SIZE, SizePx, Surface, create_surface,
    create_surface_with_fonts,
};
pub use color::Rgba8;
pub use compositor::{
    TextLayout, fill_background, paint_frame, paint_frame_with, paint_static, paint_static_with,
    paint_text,
};
pub use context::{Context2d, StateGuard};
pub use engine::{
    CanvasRecord, FrameHandle, FrameScheduler, MIN_FRAME_DELAY_MS, QueueScheduler, RenderEngine,
    effective_delay,
};
pub use error::{
    ErrorKind, ErrorReporter, FontLoadError, ImageLoadError, RenderError, RenderResult,
    TracingReporter,
};
pub use export::{
    OutputFormat, data_uri, encode_png, generate_raster_output, generate_raster_output_with,
    render_png, suggested_file_name,
};
pub use gif::{
    EncodeProgress, GIF_MIN_DELAY_MS, encode_animated, encode_animated_with, gif_frame_delay,
};
pub use image_layer::{ImageCache, ImageLayer, Placement, decode_data_uri, load_image};
pub use preview::{
    FontLoader, MAIN_CANVAS, MemoryFontLoader, PreviewCoordinator, SMALL_CANVAS, SystemFontLoader,
    THUMBNAIL_SIZE,
};
pub use settings::{
    BackgroundType, CanvasSize, DEFAULT_FRAME_COUNT, GradientDirection, ImagePosition, Settings,
    TextColorMode,
};
pub use text::{
    DECORATIVE_FONTS, FALLBACK_FAMILY, FillStyle, Font, FontBook, FontWeight, LinearGradient,
    Shadow, TextAlign, TextBaseline, TextMetrics, is_decorative_font, pixmap_to_rgba_image,
};
pub use worker::{GifWorker, WorkerMessage, WorkerRequest, handle_request};
