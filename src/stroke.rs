//! Stroke smoothing and adaptive thickness.
//!
//! Every pointer sample goes through a single-pole low-pass filter whose
//! strength scales with how far the pointer jumped since the last processed
//! point: fast motion gets more filtering, slow deliberate motion keeps more
//! fidelity.  The distance between the filtered point and the previous one
//! then drives a line width that drifts toward a speed-dependent target by a
//! fixed increment per sample.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::color::{self, ColorParseError};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Delay before the first fill of a burst starts scanning, in milliseconds.
pub const FLOOD_FILL_INTERVAL_MS: u64 = 100;
pub const MAX_LINE_THICKNESS: f64 = 50.0;
pub const MIN_LINE_THICKNESS: f64 = 1.0;
pub const LINE_THICKNESS_RANGE: f64 = MAX_LINE_THICKNESS - MIN_LINE_THICKNESS;
/// How far `thickness` moves toward its target per sample.
pub const THICKNESS_INCREMENT: f64 = 0.5;
/// Upper clip for the per-sample smoothing factor.
pub const MIN_SMOOTHING_FACTOR: f64 = 0.87;
pub const INITIAL_SMOOTHING_FACTOR: f64 = 0.85;
/// `max_weight = weight + WEIGHT_SPREAD`.
pub const WEIGHT_SPREAD: f64 = 10.0;
pub const INITIAL_THICKNESS: f64 = 2.0;

// ============================================================================
// POINT / MODE / STYLE
// ============================================================================

/// Location in canvas-pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance.
    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// What a pointer-down does and how painted pixels are composited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawingMode {
    /// Source-over painting.
    #[default]
    Draw,
    /// Destination-out: painted pixels become transparent.
    Erase,
    /// Pointer-down flood fills.
    Fill,
    /// Pointer input is ignored.
    Disabled,
}

impl DrawingMode {
    pub fn name(&self) -> &'static str {
        match self {
            DrawingMode::Draw => "draw",
            DrawingMode::Erase => "erase",
            DrawingMode::Fill => "fill",
            DrawingMode::Disabled => "disabled",
        }
    }

    /// Unknown names select `Draw`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "erase" => DrawingMode::Erase,
            "fill" => DrawingMode::Fill,
            "disabled" => DrawingMode::Disabled,
            _ => DrawingMode::Draw,
        }
    }

    /// Modes in which pointer motion paints a path.
    pub fn draws_path(&self) -> bool {
        matches!(self, DrawingMode::Draw | DrawingMode::Erase)
    }
}

/// Rejected style assignment. Nothing is changed when a setter returns this.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleError {
    InvalidWeight(f64),
    InvalidSmoothing(f64),
    Color(ColorParseError),
}

impl std::fmt::Display for StyleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleError::InvalidWeight(w) => {
                write!(f, "weight must be a finite number > 0, got {}", w)
            }
            StyleError::InvalidSmoothing(s) => {
                write!(f, "smoothing must be within 0..=1, got {}", s)
            }
            StyleError::Color(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StyleError {}

impl From<ColorParseError> for StyleError {
    fn from(e: ColorParseError) -> Self {
        StyleError::Color(e)
    }
}

/// Stroke parameters owned by the surface.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    pub weight: f64,
    pub smoothing: f64,
    pub adaptive_stroke: bool,
    pub color: Rgba<u8>,
    pub mode: DrawingMode,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            weight: INITIAL_THICKNESS,
            smoothing: INITIAL_SMOOTHING_FACTOR,
            adaptive_stroke: true,
            color: color::BLACK,
            mode: DrawingMode::Draw,
        }
    }
}

impl StrokeStyle {
    pub fn validate_weight(weight: f64) -> Result<f64, StyleError> {
        if weight.is_finite() && weight > 0.0 {
            Ok(weight)
        } else {
            Err(StyleError::InvalidWeight(weight))
        }
    }

    pub fn validate_smoothing(smoothing: f64) -> Result<f64, StyleError> {
        if smoothing.is_finite() && (0.0..=1.0).contains(&smoothing) {
            Ok(smoothing)
        } else {
            Err(StyleError::InvalidSmoothing(smoothing))
        }
    }
}

// ============================================================================
// RENDERER STATE
// ============================================================================

/// Per-surface thickness state.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererState {
    pub thickness: f64,
    pub target_thickness: f64,
    pub weight: f64,
    pub max_weight: f64,
}

impl Default for RendererState {
    fn default() -> Self {
        Self::with_weight(INITIAL_THICKNESS)
    }
}

impl RendererState {
    pub fn with_weight(weight: f64) -> Self {
        Self {
            thickness: weight,
            target_thickness: weight,
            weight,
            max_weight: weight + WEIGHT_SPREAD,
        }
    }

    /// Reset everything to a new base weight.
    pub fn set_weight(&mut self, weight: f64) {
        *self = Self::with_weight(weight);
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Smoothing factor for a pointer jump of `raw_dist` pixels.
#[inline]
pub fn smoothing_factor(smoothing: f64, raw_dist: f64) -> f64 {
    MIN_SMOOTHING_FACTOR.min(smoothing + (raw_dist - 60.0) / 3000.0)
}

/// Output of one filter step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessedSample {
    /// Filtered position; becomes the caller's next `previous`.
    pub point: Point,
    /// Width to stroke the segment `previous -> point` with.
    pub line_width: f64,
}

/// Filter one raw pointer sample.
///
/// `previous` is the last *processed* point.  The caller draws the segment
/// from `previous` to the returned point and stores the returned point as the
/// next `previous`.
pub fn process(
    current: Point,
    previous: Point,
    style: &StrokeStyle,
    state: &mut RendererState,
) -> ProcessedSample {
    let raw_dist = current.distance(previous);
    let factor = smoothing_factor(style.smoothing, raw_dist);

    let point = Point::new(
        current.x - (current.x - previous.x) * factor,
        current.y - (current.y - previous.y) * factor,
    );

    // Thickness follows the smoothed motion, not sensor jitter
    let dist = point.distance(previous);

    let line_width = if style.adaptive_stroke {
        state.target_thickness = (dist - MIN_LINE_THICKNESS) / LINE_THICKNESS_RANGE
            * (state.max_weight - state.weight)
            + state.weight;
        if state.thickness > state.target_thickness {
            state.thickness -= THICKNESS_INCREMENT;
        } else if state.thickness < state.target_thickness {
            state.thickness += THICKNESS_INCREMENT;
        }
        state.thickness
    } else {
        state.weight
    };

    ProcessedSample { point, line_width }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_factor_never_exceeds_clip() {
        for smoothing in [0.0, 0.3, 0.85, 1.0] {
            for raw in [0.0, 1.0, 60.0, 500.0, 10_000.0, 1e9] {
                assert!(smoothing_factor(smoothing, raw) <= MIN_SMOOTHING_FACTOR);
            }
        }
    }

    #[test]
    fn smoothing_factor_grows_with_speed() {
        let slow = smoothing_factor(0.5, 0.0);
        let fast = smoothing_factor(0.5, 300.0);
        assert!(fast > slow);
        assert!((slow - (0.5 - 0.02)).abs() < 1e-12);
    }

    #[test]
    fn processed_point_lies_between_previous_and_current() {
        let style = StrokeStyle::default();
        let mut state = RendererState::default();
        let prev = Point::new(10.0, 10.0);
        let cur = Point::new(40.0, 50.0);
        let out = process(cur, prev, &style, &mut state);
        let f = smoothing_factor(style.smoothing, cur.distance(prev));
        assert!((out.point.x - (40.0 - 30.0 * f)).abs() < 1e-9);
        assert!((out.point.y - (50.0 - 40.0 * f)).abs() < 1e-9);
        assert!(out.point.distance(prev) < cur.distance(prev));
    }

    #[test]
    fn constant_width_without_adaptive_stroke() {
        let style = StrokeStyle {
            adaptive_stroke: false,
            weight: 7.0,
            ..StrokeStyle::default()
        };
        let mut state = RendererState::with_weight(7.0);
        for i in 0..20 {
            let out = process(
                Point::new(i as f64 * 30.0, 0.0),
                Point::new(0.0, 0.0),
                &style,
                &mut state,
            );
            assert_eq!(out.line_width, 7.0);
        }
        assert_eq!(state.thickness, 7.0);
    }

    #[test]
    fn thickness_moves_one_increment_per_call() {
        let style = StrokeStyle::default();
        let mut state = RendererState::with_weight(2.0);
        // Huge jump: smoothed distance is large, target above thickness
        let out = process(Point::new(1000.0, 0.0), Point::new(0.0, 0.0), &style, &mut state);
        assert!(state.target_thickness > 2.0);
        assert_eq!(out.line_width, 2.0 + THICKNESS_INCREMENT);
    }

    #[test]
    fn thickness_converges_monotonically() {
        let style = StrokeStyle {
            smoothing: 0.0,
            ..StrokeStyle::default()
        };
        let mut state = RendererState::with_weight(2.0);
        // Same step every call gives the same target every call.
        let step = Point::new(25.0, 0.0);
        let mut last = state.thickness;
        let mut target = 0.0;
        for _ in 0..200 {
            process(step, Point::new(0.0, 0.0), &style, &mut state);
            target = state.target_thickness;
            let before_gap = (last - target).abs();
            let after_gap = (state.thickness - target).abs();
            assert!(after_gap <= before_gap || after_gap <= THICKNESS_INCREMENT);
            last = state.thickness;
        }
        assert!((state.thickness - target).abs() <= THICKNESS_INCREMENT);
        assert!(state.thickness >= state.weight && state.thickness <= state.max_weight);
    }

    #[test]
    fn setting_weight_resets_thickness_state() {
        let mut state = RendererState::default();
        state.thickness = 9.0;
        state.target_thickness = 11.0;
        state.set_weight(4.0);
        assert_eq!(state, RendererState::with_weight(4.0));
        assert_eq!(state.max_weight, 14.0);
    }

    #[test]
    fn mode_names_round_trip_and_fall_back_to_draw() {
        for mode in [
            DrawingMode::Draw,
            DrawingMode::Erase,
            DrawingMode::Fill,
            DrawingMode::Disabled,
        ] {
            assert_eq!(DrawingMode::from_name(mode.name()), mode);
        }
        assert_eq!(DrawingMode::from_name("sculpt"), DrawingMode::Draw);
    }

    #[test]
    fn style_validation() {
        assert!(StrokeStyle::validate_weight(0.0).is_err());
        assert!(StrokeStyle::validate_weight(f64::NAN).is_err());
        assert_eq!(StrokeStyle::validate_weight(3.5), Ok(3.5));
        assert!(StrokeStyle::validate_smoothing(1.5).is_err());
        assert_eq!(StrokeStyle::validate_smoothing(0.0), Ok(0.0));
    }
}
