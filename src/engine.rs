//! Rendering engine: a registry of named canvases and their animation loops.
//!
//! Each canvas is either idle or running. A running canvas owns exactly one
//! pending frame callback from the [`FrameScheduler`]; starting a new loop
//! always cancels the previous one first. The host advances time by calling
//! [`RenderEngine::pump`], which delivers due callbacks with the current
//! timestamp.
//!
//! # Example
//!
//! ```
//! use emoji_renderer::{RenderEngine, Settings, TextAnimation};
//!
//! let mut engine = RenderEngine::new();
//! engine.register_canvas("main", 128, 128, None);
//!
//! let settings = Settings { animation: TextAnimation::Pulse, ..Settings::with_text("Hi") };
//! engine.start_animation("main", &settings, 30).unwrap();
//! engine.pump(16.0).unwrap();
//! assert_eq!(engine.record("main").unwrap().frame(), 0);
//! engine.pump(50.0).unwrap();
//! assert_eq!(engine.record("main").unwrap().frame(), 1);
//!
//! engine.stop_animation("main");
//! assert!(!engine.is_running("main"));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use resvg::tiny_skia::Pixmap;

use crate::canvas::{ContextOverrides, Surface, create_surface_with_fonts};
use crate::compositor::{fill_background, paint_frame_with, paint_static_with};
use crate::context::Context2d;
use crate::error::{ErrorReporter, RenderError, RenderResult, TracingReporter};
use crate::image_layer::{ImageCache, ImageLayer};
use crate::settings::{DEFAULT_FRAME_COUNT, Settings};
use crate::text::FontBook;

/// Live preview never steps faster than this.
pub const MIN_FRAME_DELAY_MS: u32 = 30;

/// Live-preview step interval for a requested speed.
pub fn effective_delay(speed_ms: u32) -> u32 {
    speed_ms.max(MIN_FRAME_DELAY_MS)
}

// ============================================================================
// Frame Scheduling
// ============================================================================

/// Opaque handle to one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The frame-callback primitive the engine runs on.
pub trait FrameScheduler {
    /// Requests a callback before the next paint. `None` when the primitive
    /// is unavailable.
    fn request_frame(&mut self) -> Option<FrameHandle>;

    /// Cancels a pending callback. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Removes and returns the callbacks due now, in request order.
    fn take_due(&mut self) -> Vec<FrameHandle>;
}

/// In-process scheduler: every pending callback is due on the next pump.
#[derive(Debug, Default)]
pub struct QueueScheduler {
    next: u64,
    pending: VecDeque<FrameHandle>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for QueueScheduler {
    fn request_frame(&mut self) -> Option<FrameHandle> {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending.push_back(handle);
        Some(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }

    fn take_due(&mut self) -> Vec<FrameHandle> {
        self.pending.drain(..).collect()
    }
}

// ============================================================================
// CanvasRecord
// ============================================================================

/// What a running loop paints.
#[derive(Debug)]
struct AnimationJob {
    settings: Settings,
    frame_count: u32,
    delay: f64,
    image: Option<ImageLayer>,
}

/// Per-canvas bookkeeping.
#[derive(Debug)]
pub struct CanvasRecord {
    surface: Surface,
    animation_id: Option<FrameHandle>,
    last_time: f64,
    frame: u32,
    job: Option<AnimationJob>,
    paints: u64,
}

impl CanvasRecord {
    fn new(surface: Surface) -> Self {
        Self {
            surface,
            animation_id: None,
            last_time: 0.0,
            frame: 0,
            job: None,
            paints: 0,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn animation_id(&self) -> Option<FrameHandle> {
        self.animation_id
    }

    /// Timestamp of the last painted frame; 0 before the first.
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn is_running(&self) -> bool {
        self.animation_id.is_some()
    }

    /// Number of completed paints since registration.
    pub fn paint_count(&self) -> u64 {
        self.paints
    }

    fn reset_animation(&mut self) {
        self.animation_id = None;
        self.last_time = 0.0;
        self.frame = 0;
        self.job = None;
    }
}

// ============================================================================
// RenderEngine
// ============================================================================

/// Registry of canvases keyed by identifier.
///
/// Independent consumers should use distinct identifiers, or distinct
/// engines.
pub struct RenderEngine<S: FrameScheduler = QueueScheduler> {
    canvases: HashMap<String, CanvasRecord>,
    scheduler: S,
    fonts: FontBook,
    reporter: Arc<dyn ErrorReporter>,
    images: ImageCache,
}

impl RenderEngine<QueueScheduler> {
    /// Engine on the in-process scheduler with system fonts.
    pub fn new() -> Self {
        Self::with_scheduler(QueueScheduler::new(), FontBook::system())
    }
}

impl Default for RenderEngine<QueueScheduler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FrameScheduler> RenderEngine<S> {
    pub fn with_scheduler(scheduler: S, fonts: FontBook) -> Self {
        Self {
            canvases: HashMap::new(),
            scheduler,
            fonts,
            reporter: Arc::new(TracingReporter),
            images: ImageCache::new(),
        }
    }

    /// Where recoverable failures such as undecodable images are reported.
    pub fn set_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Replaces the font book of the engine and of every registered canvas.
    pub fn set_fonts(&mut self, fonts: FontBook) {
        for record in self.canvases.values_mut() {
            if let Some(ctx) = record.surface.context_mut() {
                ctx.set_fonts(fonts.clone());
            }
        }
        self.fonts = fonts;
    }

    pub fn record(&self, id: &str) -> Option<&CanvasRecord> {
        self.canvases.get(id)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.canvases.contains_key(id)
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.canvases.get(id).is_some_and(CanvasRecord::is_running)
    }

    /// Direct access to a canvas's context, if it has one.
    pub fn context_mut(&mut self, id: &str) -> Option<&mut Context2d> {
        self.canvases.get_mut(id)?.surface.context_mut()
    }

    /// Copy of a canvas's current bitmap.
    pub fn snapshot(&self, id: &str) -> Option<Pixmap> {
        Some(self.canvases.get(id)?.surface.context()?.snapshot())
    }

    // ---- Lifecycle ----

    /// Creates or replaces the canvas `id`, idle.
    pub fn register_canvas(
        &mut self,
        id: impl Into<String>,
        width: u32,
        height: u32,
        overrides: Option<&ContextOverrides>,
    ) {
        let id = id.into();
        self.stop_animation(&id);
        let surface = create_surface_with_fonts(width, height, overrides, self.fonts.clone());
        tracing::debug!(id = %id, width, height, "registered canvas");
        self.canvases.insert(id, CanvasRecord::new(surface));
    }

    /// Stops and deregisters `id`.
    pub fn remove_canvas(&mut self, id: &str) {
        self.stop_animation(id);
        self.canvases.remove(id);
    }

    /// Stops and deregisters every canvas.
    pub fn clear(&mut self) {
        self.stop_all_animations();
        self.canvases.clear();
    }

    // ---- Animation ----

    /// Starts the animation loop for `id`.
    ///
    /// Without an active text or image animation this paints once and stays
    /// idle. Otherwise any previous loop is stopped and a frame callback is
    /// requested. Fails only when the scheduler cannot provide callbacks.
    pub fn start_animation(
        &mut self,
        id: &str,
        settings: &Settings,
        frame_count: u32,
    ) -> RenderResult<()> {
        if !self.canvases.contains_key(id) {
            tracing::debug!(id, "start_animation on unregistered canvas");
            return Ok(());
        }
        self.stop_animation(id);

        if !settings.is_animated() {
            if let Err(err) = self.render_static(id, settings) {
                tracing::warn!(id, error = %err, "static paint failed");
            }
            return Ok(());
        }

        let handle = self
            .scheduler
            .request_frame()
            .ok_or(RenderError::SchedulerUnavailable)?;
        let job = AnimationJob {
            settings: settings.clone(),
            frame_count: frame_count.max(1),
            delay: effective_delay(settings.animation_speed) as f64,
            image: self
                .images
                .layer_for(settings, Some(self.reporter.as_ref()))
                .cloned(),
        };
        if let Some(record) = self.canvases.get_mut(id) {
            record.animation_id = Some(handle);
            record.job = Some(job);
        }
        tracing::debug!(id, ?handle, "animation started");
        Ok(())
    }

    /// [`start_animation`](Self::start_animation) with the default frame count.
    pub fn start_default_animation(&mut self, id: &str, settings: &Settings) -> RenderResult<()> {
        self.start_animation(id, settings, DEFAULT_FRAME_COUNT)
    }

    /// Cancels the loop for `id` and resets its timing. Idempotent.
    pub fn stop_animation(&mut self, id: &str) {
        let Some(record) = self.canvases.get_mut(id) else {
            return;
        };
        if let Some(handle) = record.animation_id {
            self.scheduler.cancel_frame(handle);
            tracing::debug!(id, ?handle, "animation stopped");
        }
        record.reset_animation();
    }

    pub fn stop_all_animations(&mut self) {
        let ids: Vec<String> = self.canvases.keys().cloned().collect();
        for id in ids {
            self.stop_animation(&id);
        }
    }

    /// Delivers every due frame callback at time `now` (milliseconds).
    ///
    /// All due callbacks are delivered; the first error is returned.
    pub fn pump(&mut self, now: f64) -> RenderResult<()> {
        let mut result = Ok(());
        for handle in self.scheduler.take_due() {
            if let Err(err) = self.on_frame(handle, now) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Runs one frame callback.
    ///
    /// A handle that no canvas is waiting on is stale and ignored. Paint
    /// failures are logged and the loop continues.
    pub fn on_frame(&mut self, handle: FrameHandle, now: f64) -> RenderResult<()> {
        let Some((id, record)) = self
            .canvases
            .iter_mut()
            .find(|(_, r)| r.animation_id == Some(handle))
        else {
            tracing::trace!(?handle, "stale frame callback");
            return Ok(());
        };
        let CanvasRecord {
            surface,
            animation_id,
            last_time,
            frame,
            job,
            paints,
        } = record;
        let Some(active) = job.as_ref() else {
            *animation_id = None;
            return Ok(());
        };

        if now - *last_time >= active.delay {
            *frame = (*frame + 1) % active.frame_count;
            if let Some(ctx) = surface.context_mut() {
                let painted = paint_frame_on(
                    ctx,
                    &active.settings,
                    active.image.as_ref(),
                    *frame,
                    active.frame_count,
                );
                match painted {
                    Ok(()) => *paints += 1,
                    Err(err) => tracing::warn!(id = %id, frame = *frame, error = %err, "frame skipped"),
                }
            }
            *last_time = now;
        }

        match self.scheduler.request_frame() {
            Some(next) => {
                *animation_id = Some(next);
                Ok(())
            }
            None => {
                *animation_id = None;
                *last_time = 0.0;
                *frame = 0;
                *job = None;
                Err(RenderError::SchedulerUnavailable)
            }
        }
    }

    // ---- Painting ----

    /// Clears `id` and paints the non-animated appearance.
    pub fn render_static(&mut self, id: &str, settings: &Settings) -> RenderResult<()> {
        let Some(record) = self.canvases.get_mut(id) else {
            return Ok(());
        };
        let Some(ctx) = record.surface.context_mut() else {
            tracing::warn!(id, "render_static skipped, no context");
            return Ok(());
        };
        ctx.clear();
        let image = self.images.layer_for(settings, Some(self.reporter.as_ref()));
        paint_static_with(ctx, settings, image)?;
        record.paints += 1;
        Ok(())
    }

    /// Clears `id`, fills the background and paints one discrete frame.
    pub fn render_frame(
        &mut self,
        id: &str,
        settings: &Settings,
        frame_index: u32,
        frame_count: u32,
    ) -> RenderResult<()> {
        let Some(record) = self.canvases.get_mut(id) else {
            return Ok(());
        };
        let Some(ctx) = record.surface.context_mut() else {
            tracing::warn!(id, "render_frame skipped, no context");
            return Ok(());
        };
        let image = self.images.layer_for(settings, Some(self.reporter.as_ref()));
        paint_frame_on(ctx, settings, image, frame_index, frame_count)?;
        record.paints += 1;
        Ok(())
    }

    /// Clears `target` and draws the whole current bitmap of `source` onto
    /// it at `scale`.
    pub fn render_scaled(&mut self, source: &str, target: &str, scale: f32) {
        let Some(bitmap) = self.snapshot(source) else {
            return;
        };
        let Some(record) = self.canvases.get_mut(target) else {
            return;
        };
        let Some(ctx) = record.surface.context_mut() else {
            return;
        };
        ctx.clear();
        let mut guard = ctx.save_guard();
        guard.scale(scale, scale);
        let (w, h) = (bitmap.width() as f32, bitmap.height() as f32);
        guard.draw_pixmap(bitmap.as_ref(), 0.0, 0.0, w, h);
        drop(guard);
        record.paints += 1;
    }
}

impl<S: FrameScheduler> Drop for RenderEngine<S> {
    fn drop(&mut self) {
        self.stop_all_animations();
    }
}

impl<S: FrameScheduler> std::fmt::Debug for RenderEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("canvases", &self.canvases.len())
            .field("fonts", &self.fonts)
            .finish()
    }
}

fn paint_frame_on(
    ctx: &mut Context2d,
    settings: &Settings,
    image: Option<&ImageLayer>,
    frame_index: u32,
    frame_count: u32,
) -> RenderResult<()> {
    ctx.clear();
    fill_background(ctx, settings.background());
    paint_frame_with(ctx, settings, image, frame_index, frame_count)
}

// ============================================================================
// Tests
// ============================================================================
