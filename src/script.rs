//! Plain-text drawing scripts.
//!
//! One command per line, `#` starts a comment:
//!
//! ```text
//! color #ff0000
//! weight 4
//! down 10 10
//! move 40 12
//! up 40 12
//! mode fill
//! fill 80 80
//! wait 100
//! ```

use std::time::Duration;

use crate::stroke::{DrawingMode, Point};
use crate::surface::Surface;

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    Color(String),
    Weight(f64),
    Smoothing(f64),
    Adaptive(bool),
    Mode(DrawingMode),
    Record(bool),
    Down(Point),
    Move(Point),
    Up(Point),
    Fill(Point),
    /// Advance the surface clock by this many milliseconds.
    Wait(u64),
    Clear,
}

/// A command paired with its 1-based source line.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: ScriptCommand,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
}

impl ScriptError {
    fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Message with the line prefix when known.
    pub fn friendly_message(&self) -> String {
        match self.line {
            Some(line) => format!("line {}: {}", line, self.message),
            None => self.message.clone(),
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.friendly_message())
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// PARSING
// ============================================================================

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut out = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (line, ""),
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "color" | "colour" => {
                if rest.is_empty() {
                    return Err(ScriptError::at(line_no, "color needs a value"));
                }
                ScriptCommand::Color(rest.to_string())
            }
            "weight" => ScriptCommand::Weight(number(line_no, rest)?),
            "smoothing" => ScriptCommand::Smoothing(number(line_no, rest)?),
            "adaptive" => ScriptCommand::Adaptive(switch(line_no, rest)?),
            "record" => ScriptCommand::Record(switch(line_no, rest)?),
            "mode" => {
                let mode = DrawingMode::from_name(rest);
                if !mode.name().eq_ignore_ascii_case(rest) {
                    return Err(ScriptError::at(
                        line_no,
                        format!("unknown mode '{}' (draw, erase, fill, disabled)", rest),
                    ));
                }
                ScriptCommand::Mode(mode)
            }
            "down" => ScriptCommand::Down(point(line_no, rest)?),
            "move" => ScriptCommand::Move(point(line_no, rest)?),
            "up" => ScriptCommand::Up(point(line_no, rest)?),
            "fill" => ScriptCommand::Fill(point(line_no, rest)?),
            "wait" => ScriptCommand::Wait(
                rest.parse()
                    .map_err(|_| ScriptError::at(line_no, format!("bad duration '{}'", rest)))?,
            ),
            "clear" => ScriptCommand::Clear,
            other => {
                return Err(ScriptError::at(line_no, format!("unknown command '{}'", other)));
            }
        };
        out.push(ScriptLine {
            line: line_no,
            command,
        });
    }
    Ok(out)
}

fn strip_comment(raw: &str) -> &str {
    for (pos, _) in raw.match_indices('#') {
        // `#` directly after `color ` is a hex colour, not a comment
        if !is_hex_color_start(raw, pos) {
            return &raw[..pos];
        }
    }
    raw
}

fn is_hex_color_start(raw: &str, pos: usize) -> bool {
    let before = raw[..pos].trim();
    before.eq_ignore_ascii_case("color") || before.eq_ignore_ascii_case("colour")
}

fn number(line: usize, s: &str) -> Result<f64, ScriptError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScriptError::at(line, format!("expected a number, got '{}'", s)))
}

fn switch(line: usize, s: &str) -> Result<bool, ScriptError> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ScriptError::at(line, format!("expected on/off, got '{}'", s))),
    }
}

fn point(line: usize, s: &str) -> Result<Point, ScriptError> {
    let mut parts = s.split(|c: char| c == ',' || c.is_whitespace()).filter(|p| !p.is_empty());
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ScriptError::at(line, format!("expected 'X Y', got '{}'", s)));
    };
    Ok(Point::new(number(line, x)?, number(line, y)?))
}

// ============================================================================
// EXECUTION
// ============================================================================

/// Counters collected while running a script.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub commands: usize,
    pub fills: usize,
    /// Fill requests whose seed was off the surface.
    pub rejected_fills: usize,
}

/// Run parsed commands against `surface`, then drain pending fills.
pub fn run_script(surface: &mut Surface, script: &[ScriptLine]) -> Result<ScriptReport, ScriptError> {
    let mut report = ScriptReport::default();

    for entry in script {
        let line = entry.line;
        match &entry.command {
            ScriptCommand::Color(c) => surface
                .set_color(c)
                .map_err(|e| ScriptError::at(line, e.to_string()))?,
            ScriptCommand::Weight(w) => surface
                .set_weight(*w)
                .map_err(|e| ScriptError::at(line, e.to_string()))?,
            ScriptCommand::Smoothing(s) => surface
                .set_smoothing(*s)
                .map_err(|e| ScriptError::at(line, e.to_string()))?,
            ScriptCommand::Adaptive(on) => surface.set_adaptive_stroke(*on),
            ScriptCommand::Mode(m) => surface.set_mode(*m),
            ScriptCommand::Record(on) => surface.set_record_strokes(*on),
            ScriptCommand::Down(p) => surface.pointer_down(p.x, p.y),
            ScriptCommand::Move(p) => surface.pointer_move(p.x, p.y),
            ScriptCommand::Up(p) => surface.pointer_up(p.x, p.y),
            ScriptCommand::Fill(p) => match surface.fill_at(p.x, p.y) {
                Ok(_) => report.fills += 1,
                Err(e) => {
                    crate::log_warn!("script line {}: {}", line, e);
                    report.rejected_fills += 1;
                }
            },
            ScriptCommand::Wait(ms) => {
                surface.tick(Duration::from_millis(*ms));
            }
            ScriptCommand::Clear => surface.clear(),
        }
        report.commands += 1;
    }

    surface.run_until_idle();
    Ok(report)
}
