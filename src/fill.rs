//! Scanline flood fill with soft edges and a FIFO request queue.

use image::Rgba;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::color::{blend_toward, colors_match};
use crate::events::{Event, EventTarget};
use crate::pixels::PixelBuffer;
use crate::scheduler::Scheduler;
use crate::stroke::{FLOOD_FILL_INTERVAL_MS, Point};

/// One flood fill waiting to run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillRequest {
    pub x: i32,
    pub y: i32,
    /// Seed colour captured when the fill was requested.
    pub target_color: Rgba<u8>,
    pub fill_color: Rgba<u8>,
}

/// What `request_fill` did with the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillStatus {
    /// Engine was idle: `fillstart` emitted and the scan deferred.
    Scheduled,
    /// A fill is running; request appended at this queue position (0 = next).
    Queued { position: usize },
}

/// Result of one completed fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    /// The scan ran and recoloured this many pixels (soft edges excluded).
    Filled { pixels: usize },
    /// Seed already had the fill colour; nothing was scanned.
    AlreadyFilled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillError {
    SeedOutOfBounds { x: i64, y: i64 },
}

impl std::fmt::Display for FillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillError::SeedOutOfBounds { x, y } => {
                write!(f, "fill seed ({}, {}) lies outside the surface", x, y)
            }
        }
    }
}

impl std::error::Error for FillError {}

// ============================================================================
// ENGINE
// ============================================================================

/// Serialises flood fills: one runs at a time, the rest wait in FIFO order.
#[derive(Debug, Default)]
pub struct FloodFillEngine {
    filling: bool,
    queue: VecDeque<FillRequest>,
    scratch: FillScratch,
}

impl FloodFillEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_filling(&self) -> bool {
        self.filling
    }

    /// Requests waiting behind the running fill.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Ask for a fill of the region under `seed` with `fill_color`.
    ///
    /// The seed colour is captured now.  When idle the engine emits
    /// `fillstart` and defers the scan by [`FLOOD_FILL_INTERVAL_MS`] so the
    /// host can show a busy state first; otherwise the request is queued.
    pub fn request_fill(
        &mut self,
        seed: Point,
        buffer: &PixelBuffer,
        fill_color: Rgba<u8>,
        events: &mut EventTarget,
        scheduler: &mut Scheduler<FillRequest>,
    ) -> Result<FillStatus, FillError> {
        let sx = seed.x.floor() as i64;
        let sy = seed.y.floor() as i64;
        let Some(target_color) = buffer.get(sx, sy) else {
            crate::log_warn!("fill rejected: seed ({}, {}) outside surface", sx, sy);
            return Err(FillError::SeedOutOfBounds { x: sx, y: sy });
        };
        let request = FillRequest {
            x: sx as i32,
            y: sy as i32,
            target_color,
            fill_color,
        };

        if self.filling {
            self.queue.push_back(request);
            crate::log_warn!(
                "fill at ({}, {}) queued behind running fill ({} waiting)",
                sx,
                sy,
                self.queue.len()
            );
            return Ok(FillStatus::Queued {
                position: self.queue.len() - 1,
            });
        }

        self.filling = true;
        events.dispatch(&Event::FillStart { x: seed.x, y: seed.y });
        scheduler.schedule(Duration::from_millis(FLOOD_FILL_INTERVAL_MS), request);
        Ok(FillStatus::Scheduled)
    }

    /// Deferred continuation: run `first`, then drain the queue back-to-back.
    ///
    /// Emits one `fillend` per completed request.  Returns the outcomes in
    /// completion order.
    pub fn run(
        &mut self,
        first: FillRequest,
        buffer: &mut PixelBuffer,
        events: &mut EventTarget,
    ) -> Vec<FillOutcome> {
        let mut outcomes = Vec::with_capacity(1 + self.queue.len());
        let mut next = Some(first);

        while let Some(request) = next {
            let outcome = self.run_fill(&request, buffer);
            outcomes.push(outcome);
            next = self.queue.pop_front();
            if next.is_none() {
                self.filling = false;
            }
            events.dispatch(&Event::FillEnd);
        }

        outcomes
    }

    /// Scan a single request against the buffer.
    pub fn run_fill(&mut self, request: &FillRequest, buffer: &mut PixelBuffer) -> FillOutcome {
        let start = Instant::now();
        let (x, y) = (request.x as i64, request.y as i64);

        let seed_is_fill = buffer
            .get(x, y)
            .is_some_and(|c| colors_match(c, request.fill_color));
        if seed_is_fill || colors_match(request.target_color, request.fill_color) {
            crate::log_info!("fill at ({}, {}) skipped: already fill colour", x, y);
            return FillOutcome::AlreadyFilled;
        }

        let pixels = scanline_fill(
            buffer,
            x,
            y,
            request.target_color,
            request.fill_color,
            &mut self.scratch,
        );
        crate::log_info!(
            "fill at ({}, {}) recoloured {} px in {:.1}ms",
            x,
            y,
            pixels,
            start.elapsed().as_secs_f64() * 1000.0
        );
        FillOutcome::Filled { pixels }
    }
}

// ============================================================================
// SCANLINE FILL
// ============================================================================

const UNTOUCHED: u8 = 0;
const FILLED: u8 = 1;
/// Softened by the edge blend; never part of the region.
const EDGE: u8 = 2;

/// Scratch space reused between fills.
#[derive(Debug, Default)]
pub struct FillScratch {
    stack: Vec<(i64, i64)>,
    /// Per-pixel state, row-major. Region membership is decided from this
    /// and the pixel's original colour, never from a blended pixel.
    marks: Vec<u8>,
}

impl FillScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Recolour the 4-connected region of `target` containing `(x, y)`.
///
/// Works column-wise: each popped seed walks up to the top of its vertical
/// run, then scans down recolouring pixels.  Left/right neighbour runs are
/// pushed once per contiguous stretch.  Left and right neighbours that are
/// not `target` get the soft-edge blend.  `target` and `fill` must differ.
///
/// Returns the number of recoloured pixels.
pub fn scanline_fill(
    buffer: &mut PixelBuffer,
    x: i64,
    y: i64,
    target: Rgba<u8>,
    fill: Rgba<u8>,
    scratch: &mut FillScratch,
) -> usize {
    let w = buffer.width() as i64;
    let h = buffer.height() as i64;

    let FillScratch { stack, marks } = scratch;
    marks.clear();
    marks.resize((w * h) as usize, UNTOUCHED);

    let in_region = |buf: &PixelBuffer, marks: &[u8], px: i64, py: i64| {
        buf.contains(px, py)
            && marks[(py * w + px) as usize] == UNTOUCHED
            && colors_match(buf.pixel(px as u32, py as u32), target)
    };

    let mut filled = 0usize;
    stack.clear();
    stack.push((x, y));

    while let Some((x, seed_y)) = stack.pop() {
        // Already recoloured by an overlapping run
        if !in_region(buffer, marks, x, seed_y) {
            continue;
        }

        // Walk up to the top of the run
        let mut y = seed_y;
        while y >= 0 && in_region(buffer, marks, x, y) {
            y -= 1;
        }
        y += 1;

        let mut reach_left = false;
        let mut reach_right = false;

        while y < h && in_region(buffer, marks, x, y) {
            color_pixel(buffer, marks, w, x, y, target, fill);
            filled += 1;

            if x > 0 {
                if in_region(buffer, marks, x - 1, y) {
                    if !reach_left {
                        stack.push((x - 1, y));
                        reach_left = true;
                    }
                } else if reach_left {
                    reach_left = false;
                }
            }

            if x < w - 1 {
                if in_region(buffer, marks, x + 1, y) {
                    if !reach_right {
                        stack.push((x + 1, y));
                        reach_right = true;
                    }
                } else if reach_right {
                    reach_right = false;
                }
            }

            y += 1;
        }
    }

    filled
}

/// Recolour one pixel and soften its left/right neighbours that lie outside
/// the region.  Neighbours still waiting to be filled are left alone.
#[inline]
fn color_pixel(
    buffer: &mut PixelBuffer,
    marks: &mut [u8],
    w: i64,
    x: i64,
    y: i64,
    target: Rgba<u8>,
    fill: Rgba<u8>,
) {
    buffer.put(x as u32, y as u32, fill);
    marks[(y * w + x) as usize] = FILLED;

    for nx in [x + 1, x - 1] {
        if nx < 0 || nx >= w {
            continue;
        }
        let idx = (y * w + nx) as usize;
        let neighbor = buffer.pixel(nx as u32, y as u32);
        let pending = marks[idx] == UNTOUCHED && colors_match(neighbor, target);
        if marks[idx] == FILLED || pending {
            continue;
        }
        buffer.put(nx as u32, y as u32, blend_toward(neighbor, fill));
        marks[idx] = EDGE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn event_log(events: &mut EventTarget) -> Rc<RefCell<Vec<&'static str>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::FillStart, EventKind::FillEnd] {
            let log = log.clone();
            events.add_listener(kind, move |e| log.borrow_mut().push(e.kind().name()));
        }
        log
    }

    fn request(buf: &PixelBuffer, x: i32, y: i32, fill: Rgba<u8>) -> FillRequest {
        FillRequest {
            x,
            y,
            target_color: buf.pixel(x as u32, y as u32),
            fill_color: fill,
        }
    }

    #[test]
    fn fills_whole_uniform_buffer_including_last_row() {
        let mut buf = PixelBuffer::new_filled(4, 4, WHITE).unwrap();
        let mut engine = FloodFillEngine::new();
        let req = request(&buf, 0, 0, RED);
        assert_eq!(engine.run_fill(&req, &mut buf), FillOutcome::Filled { pixels: 16 });
        assert!(buf.as_raw().chunks(4).all(|p| p == RED.0));
    }

    #[test]
    fn seed_in_middle_of_column_fills_upward_too() {
        let mut buf = PixelBuffer::new_filled(3, 5, WHITE).unwrap();
        let mut scratch = FillScratch::new();
        let n = scanline_fill(&mut buf, 1, 3, WHITE, BLUE, &mut scratch);
        assert_eq!(n, 15);
    }

    #[test]
    fn fill_stops_at_other_colours_and_blends_horizontal_border() {
        // 5x1 row: W W B W W ; fill from x=0
        let mut buf = PixelBuffer::new_filled(5, 1, WHITE).unwrap();
        buf.put(2, 0, BLACK);
        let mut scratch = FillScratch::new();
        let n = scanline_fill(&mut buf, 0, 0, WHITE, RED, &mut scratch);
        assert_eq!(n, 2);
        assert_eq!(buf.pixel(0, 0), RED);
        assert_eq!(buf.pixel(1, 0), RED);
        // border pixel softened toward red, right side untouched
        assert_eq!(buf.pixel(2, 0), blend_toward(BLACK, RED));
        assert_eq!(buf.pixel(3, 0), WHITE);
        assert_eq!(buf.pixel(4, 0), WHITE);
    }

    #[test]
    fn softened_wall_that_rounds_to_target_still_blocks() {
        // Blending (100,100,100) toward black rounds to the target colour
        let target = Rgba([1, 1, 1, 255]);
        let wall = Rgba([100, 100, 100, 255]);
        let fill = Rgba([0, 0, 0, 255]);
        assert_eq!(blend_toward(wall, fill), target);

        let mut buf = PixelBuffer::new_filled(3, 1, target).unwrap();
        buf.put(1, 0, wall);
        let mut scratch = FillScratch::new();
        let n = scanline_fill(&mut buf, 0, 0, target, fill, &mut scratch);
        assert_eq!(n, 1);
        assert_eq!(buf.pixel(0, 0), fill);
        assert_eq!(buf.pixel(1, 0), target);
        assert_eq!(buf.pixel(2, 0), target);
    }

    #[test]
    fn softened_wall_blocks_across_columns() {
        // Same wall as a full column, region continues on the far side
        let target = Rgba([1, 1, 1, 255]);
        let wall = Rgba([100, 100, 100, 255]);
        let fill = Rgba([0, 0, 0, 255]);
        let mut buf = PixelBuffer::new_filled(4, 3, target).unwrap();
        for y in 0..3 {
            buf.put(1, y, wall);
        }
        let mut engine = FloodFillEngine::new();
        let req = FillRequest {
            x: 0,
            y: 1,
            target_color: target,
            fill_color: fill,
        };
        assert_eq!(engine.run_fill(&req, &mut buf), FillOutcome::Filled { pixels: 3 });
        for y in 0..3 {
            assert_eq!(buf.pixel(2, y), target);
            assert_eq!(buf.pixel(3, y), target);
        }
    }

    #[test]
    fn vertical_border_is_not_blended() {
        // column of 3: W / B / W ; fill from top
        let mut buf = PixelBuffer::new_filled(1, 3, WHITE).unwrap();
        buf.put(0, 1, BLACK);
        let mut scratch = FillScratch::new();
        assert_eq!(scanline_fill(&mut buf, 0, 0, WHITE, RED, &mut scratch), 1);
        assert_eq!(buf.pixel(0, 1), BLACK);
        assert_eq!(buf.pixel(0, 2), WHITE);
    }

    #[test]
    fn already_filled_seed_is_skipped() {
        let mut buf = PixelBuffer::new_filled(3, 3, RED).unwrap();
        let before = buf.clone();
        let mut engine = FloodFillEngine::new();
        let req = request(&buf, 1, 1, RED);
        assert_eq!(engine.run_fill(&req, &mut buf), FillOutcome::AlreadyFilled);
        assert_eq!(buf, before);
    }

    #[test]
    fn stale_target_equal_to_fill_does_not_loop() {
        let mut buf = PixelBuffer::new_filled(3, 3, WHITE).unwrap();
        let mut engine = FloodFillEngine::new();
        let req = FillRequest {
            x: 0,
            y: 0,
            target_color: RED,
            fill_color: RED,
        };
        assert_eq!(engine.run_fill(&req, &mut buf), FillOutcome::AlreadyFilled);
    }

    #[test]
    fn out_of_bounds_seed_is_rejected_without_side_effects() {
        let buf = PixelBuffer::new_filled(3, 3, WHITE).unwrap();
        let mut engine = FloodFillEngine::new();
        let mut events = EventTarget::new();
        let log = event_log(&mut events);
        let mut sched = Scheduler::new();
        let err = engine
            .request_fill(Point::new(3.0, 0.0), &buf, RED, &mut events, &mut sched)
            .unwrap_err();
        assert_eq!(err, FillError::SeedOutOfBounds { x: 3, y: 0 });
        assert!(!engine.is_filling());
        assert!(sched.is_idle());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn requests_while_busy_are_queued_and_drained_fifo() {
        // Three separate columns split by black, one request per column.
        let mut buf = PixelBuffer::new_filled(5, 2, WHITE).unwrap();
        buf.put(1, 0, BLACK);
        buf.put(1, 1, BLACK);
        buf.put(3, 0, BLACK);
        buf.put(3, 1, BLACK);

        let mut engine = FloodFillEngine::new();
        let mut events = EventTarget::new();
        let log = event_log(&mut events);
        let mut sched = Scheduler::new();

        let s1 = engine
            .request_fill(Point::new(0.5, 0.5), &buf, RED, &mut events, &mut sched)
            .unwrap();
        let s2 = engine
            .request_fill(Point::new(2.0, 1.0), &buf, BLUE, &mut events, &mut sched)
            .unwrap();
        let s3 = engine
            .request_fill(Point::new(4.0, 0.0), &buf, RED, &mut events, &mut sched)
            .unwrap();
        assert_eq!(s1, FillStatus::Scheduled);
        assert_eq!(s2, FillStatus::Queued { position: 0 });
        assert_eq!(s3, FillStatus::Queued { position: 1 });
        assert_eq!(*log.borrow(), vec!["fillstart"]);

        // Nothing ran yet: the scan is deferred.
        assert_eq!(buf.pixel(0, 0), WHITE);
        assert!(sched.advance(Duration::from_millis(FLOOD_FILL_INTERVAL_MS - 1)).is_empty());
        let due = sched.advance(Duration::from_millis(1));
        assert_eq!(due.len(), 1);

        let outcomes = engine.run(due[0], &mut buf, &mut events);
        assert_eq!(
            outcomes,
            vec![
                FillOutcome::Filled { pixels: 2 },
                FillOutcome::Filled { pixels: 2 },
                FillOutcome::Filled { pixels: 2 },
            ]
        );
        assert_eq!(*log.borrow(), vec!["fillstart", "fillend", "fillend", "fillend"]);
        assert!(!engine.is_filling());
        assert_eq!(engine.queued(), 0);
        assert_eq!(buf.pixel(0, 1), RED);
        assert_eq!(buf.pixel(2, 1), BLUE);
        assert_eq!(buf.pixel(4, 1), RED);
    }

    #[test]
    fn queued_request_is_logged_as_warning() {
        let path = std::env::temp_dir().join(format!("freehand-fill-{}.log", std::process::id()));
        crate::logger::init_at(&path);
        // Another test may have opened the session log first
        let Some(log_path) = crate::logger::log_path().cloned() else {
            return;
        };

        let buf = PixelBuffer::new_filled(2, 2, WHITE).unwrap();
        let mut engine = FloodFillEngine::new();
        let mut events = EventTarget::new();
        let mut sched = Scheduler::new();
        engine
            .request_fill(Point::new(0.0, 0.0), &buf, RED, &mut events, &mut sched)
            .unwrap();
        engine
            .request_fill(Point::new(1.0, 1.0), &buf, BLUE, &mut events, &mut sched)
            .unwrap();

        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(
            text.lines()
                .any(|l| l.contains("[WARN] fill at (1, 1) queued behind running fill"))
        );
    }

    #[test]
    fn engine_accepts_new_burst_after_drain() {
        let mut buf = PixelBuffer::new_filled(2, 2, WHITE).unwrap();
        let mut engine = FloodFillEngine::new();
        let mut events = EventTarget::new();
        let log = event_log(&mut events);
        let mut sched = Scheduler::new();

        engine
            .request_fill(Point::new(0.0, 0.0), &buf, RED, &mut events, &mut sched)
            .unwrap();
        let first = sched.pop_next().unwrap();
        engine.run(first, &mut buf, &mut events);

        let status = engine
            .request_fill(Point::new(1.0, 1.0), &buf, BLUE, &mut events, &mut sched)
            .unwrap();
        assert_eq!(status, FillStatus::Scheduled);
        let second = sched.pop_next().unwrap();
        engine.run(second, &mut buf, &mut events);
        assert_eq!(*log.borrow(), vec!["fillstart", "fillend", "fillstart", "fillend"]);
        assert!(buf.as_raw().chunks(4).all(|p| p == BLUE.0));
    }
}
