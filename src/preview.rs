//! Live preview on two canvases.
//!
//! `main` is the full-size preview driven by the engine's animation loop.
//! `small` is a 32 px thumbnail with its own clock: every thumbnail tick
//! renders the thumbnail's frame into `main` and scales `main`'s bitmap down,
//! so the two frame indices can drift apart.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::{FrameHandle, FrameScheduler, QueueScheduler, RenderEngine, effective_delay};
use crate::error::{ErrorKind, ErrorReporter, FontLoadError, RenderError, RenderResult, TracingReporter};
use crate::settings::Settings;
use crate::text::{FontBook, FontWeight};

pub const MAIN_CANVAS: &str = "main";
pub const SMALL_CANVAS: &str = "small";
/// Edge length of the thumbnail, the size chat clients display emoji at.
pub const THUMBNAIL_SIZE: u32 = 32;

// ============================================================================
// Font Loading
// ============================================================================

/// Makes a font family available in a [`FontBook`] before painting.
pub trait FontLoader {
    fn load(&mut self, fonts: &mut FontBook, family: &str, weight: FontWeight) -> Result<(), FontLoadError>;
}

/// Accepts families already present in the book (system fonts).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFontLoader;

impl FontLoader for SystemFontLoader {
    fn load(&mut self, fonts: &mut FontBook, family: &str, weight: FontWeight) -> Result<(), FontLoadError> {
        if fonts.has_face(family, weight.value()) {
            Ok(())
        } else {
            Err(FontLoadError::NotFound {
                family: family.to_string(),
                weight: weight.value(),
            })
        }
    }
}

/// Loads families from font files held in memory, keyed by family name.
#[derive(Debug, Default, Clone)]
pub struct MemoryFontLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFontLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, family: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.insert(family.into(), data);
        self
    }
}

impl FontLoader for MemoryFontLoader {
    fn load(&mut self, fonts: &mut FontBook, family: &str, weight: FontWeight) -> Result<(), FontLoadError> {
        if fonts.has_face(family, weight.value()) {
            return Ok(());
        }
        let Some(data) = self.files.get(family) else {
            return Err(FontLoadError::NotFound {
                family: family.to_string(),
                weight: weight.value(),
            });
        };
        if fonts.load_font_data(data.clone()) == 0 {
            return Err(FontLoadError::InvalidData(family.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// PreviewCoordinator
// ============================================================================

/// Independent clock of the thumbnail canvas.
#[derive(Debug, Default)]
struct SmallClock {
    handle: Option<FrameHandle>,
    last_time: f64,
    frame: u32,
    frame_count: u32,
    delay: f64,
}

/// Keeps the `main` and `small` canvases in step with the latest settings.
///
/// Drive it with [`pump`](Self::pump) rather than the engine's own pump, so
/// thumbnail callbacks reach the thumbnail clock.
pub struct PreviewCoordinator<S: FrameScheduler = QueueScheduler> {
    engine: RenderEngine<S>,
    loader: Box<dyn FontLoader>,
    reporter: Arc<dyn ErrorReporter>,
    settings: Option<Settings>,
    loaded_family: Option<String>,
    small: SmallClock,
}

impl PreviewCoordinator<QueueScheduler> {
    /// In-process scheduler, system fonts, errors reported to `tracing`.
    pub fn with_defaults() -> Self {
        Self::new(
            RenderEngine::new(),
            Box::new(SystemFontLoader),
            Arc::new(TracingReporter),
        )
    }
}

impl<S: FrameScheduler> PreviewCoordinator<S> {
    /// `reporter` also receives the engine's image-load failures.
    pub fn new(
        mut engine: RenderEngine<S>,
        loader: Box<dyn FontLoader>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        engine.set_reporter(Arc::clone(&reporter));
        Self {
            engine,
            loader,
            reporter,
            settings: None,
            loaded_family: None,
            small: SmallClock::default(),
        }
    }

    pub fn engine(&self) -> &RenderEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RenderEngine<S> {
        &mut self.engine
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn small_frame(&self) -> u32 {
        self.small.frame
    }

    pub fn is_small_running(&self) -> bool {
        self.small.handle.is_some()
    }

    /// Applies new settings to both canvases.
    ///
    /// A font family change is loaded before the first paint; failure is
    /// reported and painting continues with the fallback family.
    pub fn update(&mut self, settings: &Settings) -> RenderResult<()> {
        let size = settings.canvas_pixels();
        if self.engine.record(MAIN_CANVAS).map(|r| r.width()) != Some(size) {
            self.engine.register_canvas(MAIN_CANVAS, size, size, None);
        }
        if !self.engine.is_registered(SMALL_CANVAS) {
            self.engine
                .register_canvas(SMALL_CANVAS, THUMBNAIL_SIZE, THUMBNAIL_SIZE, None);
        }

        self.ensure_font(&settings.font_family);
        self.settings = Some(settings.clone());

        self.stop_small();
        self.engine
            .start_animation(MAIN_CANVAS, settings, settings.frame_count())?;

        if settings.is_animated() {
            let handle = self
                .engine
                .scheduler_mut()
                .request_frame()
                .ok_or(RenderError::SchedulerUnavailable)?;
            self.small = SmallClock {
                handle: Some(handle),
                last_time: 0.0,
                frame: 0,
                frame_count: settings.frame_count(),
                delay: effective_delay(settings.animation_speed) as f64,
            };
        } else {
            self.engine
                .render_scaled(MAIN_CANVAS, SMALL_CANVAS, THUMBNAIL_SIZE as f32 / size as f32);
        }
        Ok(())
    }

    fn ensure_font(&mut self, family: &str) {
        if self.loaded_family.as_deref() == Some(family) {
            return;
        }
        let weight = FontWeight::for_family(family);
        let mut fonts = self.engine.fonts().clone();
        match self.loader.load(&mut fonts, family, weight) {
            Ok(()) => {
                tracing::debug!(family, weight = weight.value(), "font ready");
                self.engine.set_fonts(fonts);
            }
            Err(err) => self.reporter.report(ErrorKind::FontLoading, &err),
        }
        self.loaded_family = Some(family.to_string());
    }

    /// Delivers due frame callbacks to the engine and the thumbnail clock.
    pub fn pump(&mut self, now: f64) -> RenderResult<()> {
        let mut result = Ok(());
        for handle in self.engine.scheduler_mut().take_due() {
            let outcome = if self.small.handle == Some(handle) {
                self.tick_small(now)
            } else {
                self.engine.on_frame(handle, now)
            };
            if let Err(err) = outcome {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn tick_small(&mut self, now: f64) -> RenderResult<()> {
        if now - self.small.last_time >= self.small.delay {
            self.small.frame = (self.small.frame + 1) % self.small.frame_count.max(1);
            self.paint_small();
            self.small.last_time = now;
        }
        match self.engine.scheduler_mut().request_frame() {
            Some(next) => {
                self.small.handle = Some(next);
                Ok(())
            }
            None => {
                self.small = SmallClock::default();
                Err(RenderError::SchedulerUnavailable)
            }
        }
    }

    fn paint_small(&mut self) {
        let Some(settings) = self.settings.as_ref() else {
            return;
        };
        if let Err(err) = self.engine.render_frame(
            MAIN_CANVAS,
            settings,
            self.small.frame,
            self.small.frame_count,
        ) {
            tracing::warn!(frame = self.small.frame, error = %err, "thumbnail frame skipped");
        }
        let Some(main) = self.engine.snapshot(MAIN_CANVAS) else {
            return;
        };
        let Some(ctx) = self.engine.context_mut(SMALL_CANVAS) else {
            return;
        };
        let size = main.width() as f32;
        ctx.clear();
        let mut guard = ctx.save_guard();
        guard.scale(THUMBNAIL_SIZE as f32 / size, THUMBNAIL_SIZE as f32 / size);
        guard.set_fill_color(settings.background());
        guard.fill_rect(0.0, 0.0, size, size);
        guard.draw_pixmap(main.as_ref(), 0.0, 0.0, size, main.height() as f32);
    }

    fn stop_small(&mut self) {
        if let Some(handle) = self.small.handle.take() {
            self.engine.scheduler_mut().cancel_frame(handle);
        }
        self.small = SmallClock::default();
    }

    /// Stops both loops, keeping the canvases.
    pub fn stop(&mut self) {
        self.engine.stop_animation(MAIN_CANVAS);
        self.stop_small();
    }

    /// Stops both loops and deregisters both canvases.
    pub fn teardown(&mut self) {
        self.stop();
        self.engine.remove_canvas(MAIN_CANVAS);
        self.engine.remove_canvas(SMALL_CANVAS);
    }
}

impl<S: FrameScheduler> Drop for PreviewCoordinator<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// Tests
// ============================================================================
