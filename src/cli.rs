// ============================================================================
// freehand CLI: headless drawing via command scripts
// ============================================================================
//
// Usage examples:
//   freehand --script sketch.fh --output sketch.png
//   freehand -s "scripts/*.fh" --output-dir out/ --width 800 --height 600
//   freehand -s sketch.fh --record strokes.fhs
//   freehand --replay strokes.fhs --offset 40,0 --output shifted.png
//
// Every script runs on its own surface. Pending fills are drained before the
// PNG is written.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;

use freehand::recording::{self, Stroke};
use freehand::script::{self, ScriptLine};
use freehand::{Event, EventKind, Point, Surface, SurfaceConfig, color, stroke};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Headless freehand renderer.
#[derive(Parser, Debug)]
#[command(
    name = "freehand",
    about = "Render freehand drawing scripts to PNG",
    long_about = "Run drawing scripts (pointer moves, fills, style changes) against an\n\
                  in-memory surface and write the result as PNG. Recorded strokes can\n\
                  be saved and replayed.\n\n\
                  Example:\n  \
                  freehand --script sketch.fh --output sketch.png\n  \
                  freehand -s \"*.fh\" --output-dir out/ --width 800 --height 600"
)]
pub struct CliArgs {
    /// Script file(s). Glob patterns accepted (e.g. "*.fh").
    #[arg(short, long, num_args = 1.., value_name = "SCRIPT.fh")]
    pub script: Vec<String>,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 300)]
    pub width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 150)]
    pub height: u32,

    /// Fill the surface with this colour before drawing (default: transparent).
    #[arg(short, long, value_name = "COLOR")]
    pub background: Option<String>,

    /// Initial stroke colour.
    #[arg(short, long, value_name = "COLOR")]
    pub color: Option<String>,

    /// Initial stroke weight.
    #[arg(short, long)]
    pub weight: Option<f64>,

    /// Initial smoothing (0..1).
    #[arg(long)]
    pub smoothing: Option<f64>,

    /// Output file path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory; files are named after the script stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Save every stroke drawn by the scripts to a recording file.
    #[arg(long, value_name = "FILE.fhs")]
    pub record: Option<PathBuf>,

    /// Replay a recording file before running each script.
    #[arg(long, value_name = "FILE.fhs")]
    pub replay: Option<PathBuf>,

    /// Offset applied to replayed strokes, as "DX,DY".
    #[arg(long, default_value = "0,0", value_name = "DX,DY")]
    pub offset: String,

    /// Session log file (default: platform data directory).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print per-file timing and script statistics.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every job succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.script);
    if inputs.is_empty() && args.replay.is_none() {
        eprintln!("error: no script files matched and no --replay given.");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let offset = match parse_offset(&args.offset) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let replay: Option<Vec<Stroke>> = match &args.replay {
        Some(path) => match recording::load_strokes(path) {
            Ok(strokes) => Some(strokes),
            Err(e) => {
                eprintln!("error: could not read recording '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let recorded: Rc<RefCell<Vec<Stroke>>> = Rc::new(RefCell::new(Vec::new()));
    let job = Job {
        config: &config,
        background: args.background.as_deref(),
        replay: replay.as_deref(),
        offset,
        record: args.record.is_some().then(|| recorded.clone()),
        verbose: args.verbose,
    };

    // A replay on its own is one job with no script
    let jobs: Vec<Option<&Path>> = if inputs.is_empty() {
        vec![None]
    } else {
        inputs.iter().map(|p| Some(p.as_path())).collect()
    };

    let total = jobs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input) in jobs.iter().enumerate() {
        if let Some(path) = input
            && (multi || args.verbose)
        {
            println!("[{}/{}] {}", idx + 1, total, path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(*input, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path.");
            any_failure = true;
            continue;
        };

        match run_one(*input, &output_path, &job) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                freehand::log_err!("job failed: {}", e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if let Some(path) = &args.record {
        let strokes = recorded.borrow();
        match recording::save_strokes(&strokes, path) {
            Ok(()) => {
                if args.verbose {
                    println!("recorded {} stroke(s) to {}", strokes.len(), path.display());
                }
            }
            Err(e) => {
                eprintln!("error: could not write recording '{}': {}", path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-script pipeline
// ============================================================================

/// Settings shared by every job in one invocation.
struct Job<'a> {
    config: &'a SurfaceConfig,
    background: Option<&'a str>,
    replay: Option<&'a [Stroke]>,
    offset: Point,
    record: Option<Rc<RefCell<Vec<Stroke>>>>,
    verbose: bool,
}

fn run_one(input: Option<&Path>, output: &Path, job: &Job<'_>) -> Result<(), String> {
    // -- Step 1: Parse ---------------------------------------------------
    let script: Vec<ScriptLine> = match input {
        Some(path) => {
            let src = std::fs::read_to_string(path)
                .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
            script::parse_script(&src).map_err(|e| format!("script error: {}", e))?
        }
        None => Vec::new(),
    };

    // -- Step 2: Surface -------------------------------------------------
    let mut surface = Surface::new(job.config).map_err(|e| e.to_string())?;
    if let Some(bg) = job.background {
        let bg = color::parse_color(bg).map_err(|e| format!("background: {}", e))?;
        surface.buffer_mut().fill(bg);
    }
    if let Some(sink) = &job.record {
        surface.set_record_strokes(true);
        let sink = sink.clone();
        surface.add_listener(EventKind::StrokeRecorded, move |e| {
            if let Event::StrokeRecorded { stroke } = e {
                sink.borrow_mut().push(stroke.clone());
            }
        });
    }

    // -- Step 3: Replay, then script -------------------------------------
    if let Some(strokes) = job.replay {
        for s in strokes {
            surface
                .play_stroke(s, job.offset)
                .map_err(|e| format!("replay: {}", e))?;
        }
        // Replayed strokes carry their own style; start the script fresh
        apply_config_style(&mut surface, job.config)?;
    }

    let report = script::run_script(&mut surface, &script).map_err(|e| format!("script error: {}", e))?;
    if job.verbose {
        println!(
            "  {} command(s), {} fill(s), {} rejected fill(s)",
            report.commands, report.fills, report.rejected_fills
        );
    }

    // -- Step 4: Save ----------------------------------------------------
    surface
        .save_png(output)
        .map_err(|e| format!("save failed: {}", e))?;
    freehand::log_info!("wrote {}", output.display());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn build_config(args: &CliArgs) -> Result<SurfaceConfig, String> {
    let mut config = SurfaceConfig {
        width: args.width,
        height: args.height,
        ..SurfaceConfig::default()
    };
    if let Some(c) = &args.color {
        color::parse_color(c).map_err(|e| e.to_string())?;
        config.color = c.clone();
    }
    if let Some(w) = args.weight {
        config.weight = stroke::StrokeStyle::validate_weight(w).map_err(|e| e.to_string())?;
    }
    if let Some(s) = args.smoothing {
        config.smoothing = stroke::StrokeStyle::validate_smoothing(s).map_err(|e| e.to_string())?;
    }
    Ok(config)
}

fn apply_config_style(surface: &mut Surface, config: &SurfaceConfig) -> Result<(), String> {
    surface.set_color(&config.color).map_err(|e| e.to_string())?;
    surface.set_weight(config.weight).map_err(|e| e.to_string())?;
    surface.set_smoothing(config.smoothing).map_err(|e| e.to_string())?;
    surface.set_adaptive_stroke(config.adaptive_stroke);
    surface.set_mode(config.mode);
    Ok(())
}

/// Parse "DX,DY".
fn parse_offset(s: &str) -> Result<Point, String> {
    let (dx, dy) = s
        .split_once(',')
        .ok_or_else(|| format!("offset '{}' must look like DX,DY", s))?;
    let dx: f64 = dx.trim().parse().map_err(|_| format!("bad offset x '{}'", dx))?;
    let dy: f64 = dy.trim().parse().map_err(|_| format!("bad offset y '{}'", dy))?;
    Ok(Point::new(dx, dy))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for one job.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` joined with the script stem
/// 3. next to the script, `.png` extension
/// 4. `freehand.png` in the working directory (replay without a script)
fn build_output_path(
    input: Option<&Path>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = match input {
        Some(path) => path.file_stem()?.to_string_lossy().into_owned(),
        None => "freehand".to_string(),
    };

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.and_then(Path::parent).unwrap_or(Path::new("."));
    Some(parent.join(format!("{}.png", stem)))
}
