//! Freehand drawing engine: smoothed, adaptive-width strokes and a queued
//! scanline flood fill over an RGBA raster.
//!
//! The [`Surface`] is the entry point. Feed it pointer events, pump its
//! scheduler with [`Surface::tick`] or [`Surface::run_until_idle`], and
//! listen for lifecycle events through [`Surface::add_listener`].

pub mod logger;

pub mod color;
pub mod events;
pub mod fill;
pub mod pixels;
pub mod raster;
pub mod recording;
pub mod scheduler;
pub mod script;
pub mod stroke;
pub mod surface;

pub use events::{Event, EventKind, ListenerId};
pub use fill::{FillError, FillOutcome, FillStatus};
pub use pixels::{BufferError, PixelBuffer};
pub use raster::{CurvePainter, StampRasterizer};
pub use recording::{Stroke, StrokePoint};
pub use stroke::{DrawingMode, Point, StyleError};
pub use surface::{Surface, SurfaceConfig, SurfaceError};
