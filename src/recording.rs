use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use crate::stroke::{DrawingMode, Point};

/// One recorded pointer sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub point: Point,
    /// Milliseconds since the stroke started.
    pub time_ms: f64,
}

/// A recorded stroke: raw samples plus the style it was drawn with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    pub mode: DrawingMode,
    pub weight: f64,
    pub smoothing: f64,
    /// Colour string as accepted by [`crate::color::parse_color`].
    pub color: String,
    pub adaptive_stroke: bool,
}

// ============================================================================
// RECORDER
// ============================================================================

/// Collects samples for the stroke in progress while recording is enabled.
#[derive(Debug, Default)]
pub struct StrokeRecorder {
    pub enabled: bool,
    started: Option<Instant>,
    memory: Vec<StrokePoint>,
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new stroke at `point`.
    pub fn begin(&mut self, point: Point) {
        if !self.enabled {
            return;
        }
        self.started = Some(Instant::now());
        self.memory.clear();
        self.push(point);
    }

    /// Append a sample to the stroke in progress.
    pub fn push(&mut self, point: Point) {
        if !self.enabled {
            return;
        }
        let time_ms = self
            .started
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.memory.push(StrokePoint { point, time_ms });
    }

    /// Samples recorded so far.
    pub fn points(&self) -> &[StrokePoint] {
        &self.memory
    }

    /// Drain the samples of the finished stroke. Always resets the recorder.
    pub fn finish(&mut self) -> Vec<StrokePoint> {
        self.started = None;
        std::mem::take(&mut self.memory)
    }
}

// ============================================================================
// RECORDING FILES (.fhs)
// ============================================================================

/// Magic header for stroke recording files.
const FHS_MAGIC: &str = "FHS1";

#[derive(Serialize, Deserialize)]
struct RecordingFile {
    magic: String,
    strokes: Vec<Stroke>,
}

/// Error type for recording file operations
#[derive(Debug)]
pub enum RecordingError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::Io(e) => write!(f, "I/O error: {}", e),
            RecordingError::Serialize(e) => write!(f, "Serialization error: {}", e),
            RecordingError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for RecordingError {}

impl From<std::io::Error> for RecordingError {
    fn from(e: std::io::Error) -> Self {
        RecordingError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for RecordingError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        RecordingError::Serialize(e.to_string())
    }
}

/// Write `strokes` to a recording file.
pub fn save_strokes(strokes: &[Stroke], path: &Path) -> Result<(), RecordingError> {
    let file = RecordingFile {
        magic: FHS_MAGIC.to_string(),
        strokes: strokes.to_vec(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

/// Read strokes back from a recording file.
pub fn load_strokes(path: &Path) -> Result<Vec<Stroke>, RecordingError> {
    let reader = BufReader::new(File::open(path)?);
    let file: RecordingFile = bincode::deserialize_from(reader)?;
    if file.magic != FHS_MAGIC {
        return Err(RecordingError::InvalidFormat(format!(
            "Unknown magic '{}'",
            file.magic
        )));
    }
    Ok(file.strokes)
}
