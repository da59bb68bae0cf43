//! The drawing surface: owns the raster, the stroke filter state, the fill
//! engine and the event registry, and routes pointer input by mode.

use image::Rgba;
use std::path::Path;
use std::time::Duration;

use crate::color::{self, ColorParseError};
use crate::events::{Event, EventKind, EventTarget, ListenerId};
use crate::fill::{FillError, FillOutcome, FillRequest, FillStatus, FloodFillEngine};
use crate::pixels::{BufferError, PixelBuffer};
use crate::raster::{CurvePainter, StampRasterizer};
use crate::recording::{Stroke, StrokeRecorder};
use crate::scheduler::Scheduler;
use crate::stroke::{self, DrawingMode, Point, RendererState, StrokeStyle, StyleError};

/// Initial surface settings. Every field goes through the same validation as
/// the runtime setters.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub weight: f64,
    pub smoothing: f64,
    pub adaptive_stroke: bool,
    pub mode: DrawingMode,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 150,
            color: "rgba(0,0,0,1)".to_string(),
            weight: stroke::INITIAL_THICKNESS,
            smoothing: stroke::INITIAL_SMOOTHING_FACTOR,
            adaptive_stroke: true,
            mode: DrawingMode::Draw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    Buffer(BufferError),
    Style(StyleError),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Buffer(e) => write!(f, "{}", e),
            SurfaceError::Style(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SurfaceError {}

impl From<BufferError> for SurfaceError {
    fn from(e: BufferError) -> Self {
        SurfaceError::Buffer(e)
    }
}

impl From<StyleError> for SurfaceError {
    fn from(e: StyleError) -> Self {
        SurfaceError::Style(e)
    }
}

impl From<ColorParseError> for SurfaceError {
    fn from(e: ColorParseError) -> Self {
        SurfaceError::Style(StyleError::Color(e))
    }
}

/// Last pointer position plus the last *processed* stroke point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
    pub previous: Point,
    pub down: bool,
}

// ============================================================================
// SURFACE
// ============================================================================

pub struct Surface<P: CurvePainter = StampRasterizer> {
    buffer: PixelBuffer,
    style: StrokeStyle,
    renderer: RendererState,
    painter: P,
    flood: FloodFillEngine,
    scheduler: Scheduler<FillRequest>,
    events: EventTarget,
    recorder: StrokeRecorder,
    pointer: Pointer,
    dirty: bool,
}

impl Surface<StampRasterizer> {
    pub fn new(config: &SurfaceConfig) -> Result<Self, SurfaceError> {
        Self::with_painter(config, StampRasterizer::new())
    }
}

impl<P: CurvePainter> Surface<P> {
    /// Build a surface that renders segments with a custom painter.
    pub fn with_painter(config: &SurfaceConfig, painter: P) -> Result<Self, SurfaceError> {
        let buffer = PixelBuffer::new(config.width, config.height)?;
        let weight = StrokeStyle::validate_weight(config.weight)?;
        let smoothing = StrokeStyle::validate_smoothing(config.smoothing)?;
        let color = color::parse_color(&config.color)?;

        Ok(Self {
            buffer,
            style: StrokeStyle {
                weight,
                smoothing,
                adaptive_stroke: config.adaptive_stroke,
                color,
                mode: config.mode,
            },
            renderer: RendererState::with_weight(weight),
            painter,
            flood: FloodFillEngine::new(),
            scheduler: Scheduler::new(),
            events: EventTarget::new(),
            recorder: StrokeRecorder::new(),
            pointer: Pointer::default(),
            dirty: false,
        })
    }

    // ---- accessors ----------------------------------------------------------

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Direct raster access for hosts. Must not be used while a fill is
    /// pending: queued requests captured their seed colours from the current
    /// pixels.
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        debug_assert!(!self.flood.is_filling(), "raster edited while a fill is pending");
        &mut self.buffer
    }

    /// Swap in a new raster (e.g. a loaded image). The buffer type already
    /// guarantees RGBA layout. Same restriction as [`buffer_mut`](Self::buffer_mut).
    pub fn replace_buffer(&mut self, buffer: PixelBuffer) {
        debug_assert!(!self.flood.is_filling(), "raster replaced while a fill is pending");
        self.buffer = buffer;
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn renderer_state(&self) -> &RendererState {
        &self.renderer
    }

    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_filling(&self) -> bool {
        self.flood.is_filling()
    }

    /// Fill requests waiting behind the running one.
    pub fn queued_fills(&self) -> usize {
        self.flood.queued()
    }

    /// Time until the deferred fill scan is due.
    pub fn next_task_in(&self) -> Option<Duration> {
        self.scheduler.next_due_in()
    }

    // ---- events -------------------------------------------------------------

    pub fn add_listener(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> ListenerId {
        self.events.add_listener(kind, handler)
    }

    pub fn add_listener_by_name(
        &mut self,
        name: &str,
        handler: impl FnMut(&Event) + 'static,
    ) -> Option<ListenerId> {
        self.events.add_listener_by_name(name, handler)
    }

    pub fn remove_listener(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.events.remove_listener(kind, id)
    }

    // ---- style --------------------------------------------------------------

    /// Current colour as a string (`#rrggbb` or `rgba(...)`).
    pub fn color(&self) -> String {
        color::format_color(self.style.color)
    }

    pub fn set_color(&mut self, value: &str) -> Result<(), StyleError> {
        self.style.color = color::parse_color(value)?;
        Ok(())
    }

    pub fn set_color_rgba(&mut self, value: Rgba<u8>) {
        self.style.color = value;
    }

    pub fn weight(&self) -> f64 {
        self.style.weight
    }

    /// Also resets the adaptive thickness state to the new weight.
    pub fn set_weight(&mut self, weight: f64) -> Result<(), StyleError> {
        let weight = StrokeStyle::validate_weight(weight)?;
        self.style.weight = weight;
        self.renderer.set_weight(weight);
        Ok(())
    }

    pub fn set_smoothing(&mut self, smoothing: f64) -> Result<(), StyleError> {
        self.style.smoothing = StrokeStyle::validate_smoothing(smoothing)?;
        Ok(())
    }

    pub fn set_adaptive_stroke(&mut self, adaptive: bool) {
        self.style.adaptive_stroke = adaptive;
    }

    pub fn mode(&self) -> DrawingMode {
        self.style.mode
    }

    pub fn set_mode(&mut self, mode: DrawingMode) {
        self.style.mode = mode;
    }

    pub fn set_record_strokes(&mut self, record: bool) {
        self.recorder.enabled = record;
    }

    pub fn record_strokes(&self) -> bool {
        self.recorder.enabled
    }

    // ---- pointer routing ----------------------------------------------------

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.pointer.down && self.style.mode.draws_path() {
            let prev = self.pointer.previous;
            let processed = self.draw(x, y, prev.x, prev.y);

            if !self.dirty
                && self.style.mode == DrawingMode::Draw
                && (x != self.pointer.x || y != self.pointer.y)
            {
                self.dirty = true;
                self.events.dispatch(&Event::Dirty);
            }

            self.pointer.x = x;
            self.pointer.y = y;
            self.pointer.previous = processed;
        } else {
            self.pointer.x = x;
            self.pointer.y = y;
        }
    }

    /// Fill mode fills at the pointer; draw/erase modes start a stroke;
    /// disabled mode only tracks the position.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.pointer_move(x, y);

        match self.style.mode {
            DrawingMode::Fill => {
                if let Err(e) = self.fill() {
                    crate::log_warn!("pointer fill ignored: {}", e);
                }
            }
            DrawingMode::Disabled => {}
            DrawingMode::Draw | DrawingMode::Erase => {
                self.pointer.previous = Point::new(self.pointer.x, self.pointer.y);
                self.pointer.down = true;
                self.begin_stroke(self.pointer.x, self.pointer.y);
            }
        }
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        if self.style.mode == DrawingMode::Fill || !self.pointer.down {
            return;
        }
        self.pointer.down = false;

        // A click without motion still leaves a dot
        if self.pointer.x == x && self.pointer.y == y && self.style.mode.draws_path() {
            let prev = self.pointer.previous;
            self.pointer.previous = self.draw(self.pointer.x, self.pointer.y, prev.x, prev.y);
        }

        self.end_stroke(self.pointer.x, self.pointer.y);
    }

    // ---- strokes ------------------------------------------------------------

    pub fn begin_stroke(&mut self, x: f64, y: f64) {
        let p = Point::new(x, y);
        self.painter.begin_path(p);
        self.recorder.begin(p);
        self.events.dispatch(&Event::StrokeStart { x, y });
    }

    pub fn end_stroke(&mut self, x: f64, y: f64) {
        self.painter.close_path();
        self.recorder.push(Point::new(x, y));
        self.events.dispatch(&Event::StrokeEnd { x, y });

        let recording = self.recorder.enabled;
        let points = self.recorder.finish();
        if recording {
            let stroke = Stroke {
                points,
                mode: self.style.mode,
                weight: self.style.weight,
                smoothing: self.style.smoothing,
                color: self.color(),
                adaptive_stroke: self.style.adaptive_stroke,
            };
            self.events.dispatch(&Event::StrokeRecorded { stroke });
        }
    }

    /// Filter the raw sample `(x, y)` against the previous processed point,
    /// paint the segment and return the processed point, which the caller
    /// passes back as `prev` next time.
    pub fn draw(&mut self, x: f64, y: f64, prev_x: f64, prev_y: f64) -> Point {
        let current = Point::new(x, y);
        let previous = Point::new(prev_x, prev_y);
        self.recorder.push(current);

        let sample = stroke::process(current, previous, &self.style, &mut self.renderer);
        self.painter.quadratic_to(
            &mut self.buffer,
            previous,
            sample.point,
            sample.line_width,
            self.style.color,
            self.style.mode,
        );
        sample.point
    }

    /// Replay a recorded stroke, shifted by `offset`. The stroke's style is
    /// applied first. Timing is not reproduced.
    pub fn play_stroke(&mut self, stroke: &Stroke, offset: Point) -> Result<(), StyleError> {
        self.set_weight(stroke.weight)?;
        self.set_smoothing(stroke.smoothing)?;
        self.set_color(&stroke.color)?;
        self.set_mode(stroke.mode);
        self.set_adaptive_stroke(stroke.adaptive_stroke);

        let Some(first) = stroke.points.first() else {
            return Ok(());
        };
        let mut prev = Point::new(first.point.x + offset.x, first.point.y + offset.y);
        self.begin_stroke(prev.x, prev.y);
        for sample in &stroke.points[1..] {
            prev = self.draw(
                sample.point.x + offset.x,
                sample.point.y + offset.y,
                prev.x,
                prev.y,
            );
        }
        self.end_stroke(prev.x, prev.y);
        Ok(())
    }

    // ---- fill ---------------------------------------------------------------

    /// Fill at the current pointer position.
    pub fn fill(&mut self) -> Result<FillStatus, FillError> {
        self.fill_at(self.pointer.x, self.pointer.y)
    }

    /// Request a flood fill at `(x, y)` with the current colour at full
    /// opacity. The scan itself runs from [`tick`](Self::tick) or
    /// [`run_until_idle`](Self::run_until_idle).
    pub fn fill_at(&mut self, x: f64, y: f64) -> Result<FillStatus, FillError> {
        let [r, g, b, _] = self.style.color.0;
        self.flood.request_fill(
            Point::new(x, y),
            &self.buffer,
            Rgba([r, g, b, 255]),
            &mut self.events,
            &mut self.scheduler,
        )
    }

    /// Advance the virtual clock by `dt` and run whatever became due.
    pub fn tick(&mut self, dt: Duration) -> Vec<FillOutcome> {
        let mut outcomes = Vec::new();
        for request in self.scheduler.advance(dt) {
            outcomes.extend(self.flood.run(request, &mut self.buffer, &mut self.events));
        }
        outcomes
    }

    /// Run every pending deferred task, jumping the clock as needed.
    pub fn run_until_idle(&mut self) -> Vec<FillOutcome> {
        let mut outcomes = Vec::new();
        while let Some(request) = self.scheduler.pop_next() {
            outcomes.extend(self.flood.run(request, &mut self.buffer, &mut self.events));
        }
        outcomes
    }

    // ---- whole-surface ------------------------------------------------------

    /// Erase everything and reset the dirty flag.
    pub fn clear(&mut self) {
        self.dirty = false;
        self.events.dispatch(&Event::Clean);
        self.buffer.clear();
    }

    pub fn save_png(&self, path: &Path) -> Result<(), String> {
        self.buffer.save_png(path)
    }
}
