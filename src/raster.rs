//! Curve-drawing primitive.
//!
//! [`CurvePainter`] is the seam a host can replace with its own renderer.
//! [`StampRasterizer`] is the built-in CPU version: it subdivides each
//! quadratic segment into pixel-sized pieces, skipping pieces that miss the
//! buffer, and stamps a hard-edged disc at every piece end, which gives round
//! caps and joins for free.

use image::Rgba;

use crate::color::{TRANSPARENT, source_over};
use crate::pixels::PixelBuffer;
use crate::stroke::{DrawingMode, Point};

/// Renders smoothed stroke segments into a pixel buffer.
pub trait CurvePainter {
    /// Move the pen to `start` without painting.
    fn begin_path(&mut self, start: Point);

    /// Paint a quadratic segment from the pen through `control` to `end`,
    /// then leave the pen at `end`.  Returns the number of pixels touched.
    fn quadratic_to(
        &mut self,
        buffer: &mut PixelBuffer,
        control: Point,
        end: Point,
        width: f64,
        color: Rgba<u8>,
        mode: DrawingMode,
    ) -> usize;

    fn close_path(&mut self);
}

/// Disc-stamping rasterizer.
#[derive(Debug, Default, Clone)]
pub struct StampRasterizer {
    pen: Option<Point>,
}

impl StampRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pen(&self) -> Option<Point> {
        self.pen
    }
}

impl CurvePainter for StampRasterizer {
    fn begin_path(&mut self, start: Point) {
        self.pen = Some(start);
    }

    fn quadratic_to(
        &mut self,
        buffer: &mut PixelBuffer,
        control: Point,
        end: Point,
        width: f64,
        color: Rgba<u8>,
        mode: DrawingMode,
    ) -> usize {
        let start = self.pen.unwrap_or(control);
        self.pen = Some(end);
        if !mode.draws_path() {
            return 0;
        }

        let radius = (width / 2.0).max(0.5);

        // Bounding box of the segment's hull, padded by the radius and
        // clipped to the buffer
        let min_x = (start.x.min(control.x).min(end.x) - radius).floor().max(0.0) as i64;
        let min_y = (start.y.min(control.y).min(end.y) - radius).floor().max(0.0) as i64;
        let max_x = ((start.x.max(control.x).max(end.x) + radius).ceil() as i64)
            .min(buffer.width() as i64 - 1);
        let max_y = ((start.y.max(control.y).max(end.y) + radius).ceil() as i64)
            .min(buffer.height() as i64 - 1);
        if min_x > max_x || min_y > max_y {
            return 0;
        }
        let bw = (max_x - min_x + 1) as usize;
        let bh = (max_y - min_y + 1) as usize;

        // Coverage mask so overlapping stamps composite once per segment
        let mut mask = vec![false; bw * bh];

        let r_sq = radius * radius;
        let clip = ClipBox {
            min_x: min_x as f64 - radius,
            min_y: min_y as f64 - radius,
            max_x: max_x as f64 + radius,
            max_y: max_y as f64 + radius,
        };
        for c in flatten_visible(start, control, end, &clip) {
            let sx0 = ((c.x - radius).floor() as i64).max(min_x);
            let sy0 = ((c.y - radius).floor() as i64).max(min_y);
            let sx1 = ((c.x + radius).ceil() as i64).min(max_x);
            let sy1 = ((c.y + radius).ceil() as i64).min(max_y);
            for py in sy0..=sy1 {
                let dy = py as f64 - c.y;
                for px in sx0..=sx1 {
                    let dx = px as f64 - c.x;
                    if dx * dx + dy * dy <= r_sq {
                        mask[(py - min_y) as usize * bw + (px - min_x) as usize] = true;
                    }
                }
            }
        }

        let mut touched = 0;
        for (idx, _) in mask.iter().enumerate().filter(|(_, m)| **m) {
            let px = (idx % bw) as i64 + min_x;
            let py = (idx / bw) as i64 + min_y;
            let (ux, uy) = (px as u32, py as u32);
            let dst = buffer.pixel(ux, uy);
            let out = match mode {
                DrawingMode::Erase => destination_out(dst, color),
                _ => source_over(dst, color),
            };
            buffer.put(ux, uy, out);
            touched += 1;
        }
        touched
    }

    fn close_path(&mut self) {
        self.pen = None;
    }
}

/// Stamp centres must land inside this box to touch the buffer.
struct ClipBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl ClipBox {
    /// Does the control hull of `p0, c, p1` overlap the box?
    fn overlaps_hull(&self, p0: Point, c: Point, p1: Point) -> bool {
        let lo_x = p0.x.min(c.x).min(p1.x);
        let hi_x = p0.x.max(c.x).max(p1.x);
        let lo_y = p0.y.min(c.y).min(p1.y);
        let hi_y = p0.y.max(c.y).max(p1.y);
        hi_x >= self.min_x && lo_x <= self.max_x && hi_y >= self.min_y && lo_y <= self.max_y
    }
}

/// Hull length at or under which a piece is stamped at its ends only.
const FLATTEN_TOLERANCE: f64 = 1.0;
/// Subdivision limit for degenerate or enormous coordinates.
const MAX_SUBDIVISION_DEPTH: u32 = 48;

/// Stamp centres along the curve, spaced at most about a pixel apart.
///
/// Subdivides at `t = 0.5` and drops every piece whose control hull misses
/// `clip`, so the work follows the visible part of the curve rather than
/// its full length.
fn flatten_visible(p0: Point, c: Point, p1: Point, clip: &ClipBox) -> Vec<Point> {
    let mut out = Vec::new();
    let mut pending = vec![(p0, c, p1, 0u32)];

    while let Some((a, ctrl, b, depth)) = pending.pop() {
        if !clip.overlaps_hull(a, ctrl, b) {
            continue;
        }
        let hull_len = a.distance(ctrl) + ctrl.distance(b);
        if hull_len <= FLATTEN_TOLERANCE || depth >= MAX_SUBDIVISION_DEPTH {
            out.push(a);
            out.push(b);
            continue;
        }

        // de Casteljau split at the midpoint
        let left_ctrl = midpoint(a, ctrl);
        let right_ctrl = midpoint(ctrl, b);
        let mid = midpoint(left_ctrl, right_ctrl);
        pending.push((mid, right_ctrl, b, depth + 1));
        pending.push((a, left_ctrl, mid, depth + 1));
    }
    out
}

#[inline]
fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

/// Point at parameter `t` on the quadratic Bézier `p0, c, p1`.
#[inline]
pub fn quadratic_point(p0: Point, c: Point, p1: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    Point::new(
        mt * mt * p0.x + 2.0 * mt * t * c.x + t * t * p1.x,
        mt * mt * p0.y + 2.0 * mt * t * c.y + t * t * p1.y,
    )
}

/// Remove `dst` coverage by the eraser's alpha.
fn destination_out(dst: Rgba<u8>, eraser: Rgba<u8>) -> Rgba<u8> {
    let keep = 255 - eraser.0[3] as u32;
    let a = (dst.0[3] as u32 * keep + 127) / 255;
    if a == 0 {
        return TRANSPARENT;
    }
    Rgba([dst.0[0], dst.0[1], dst.0[2], a as u8])
}
