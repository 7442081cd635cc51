// ============================================================================
// DigitPad CLI — headless stroke replay and prediction
// ============================================================================
//
// Usage examples:
//   digitpad --strokes seven.txt --output seven.png
//   digitpad --strokes seven.txt --predict --endpoint http://127.0.0.1:8000/predict
//   digitpad -s seven.txt --predict --field image --density 2
//
// Without --strokes the GUI opens; the shared options (endpoint, field, size,
// density) then configure the window instead.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::canvas::DrawingSurface;
use crate::ops::predict::{PredictionClient, PredictionDisplay, PredictionOutcome};
use crate::ops::replay::{parse_script, replay};
use crate::settings::{PadSettings, SettingsError, parse_color};

/// DigitPad handwritten-digit pad.
///
/// Draw a digit and send it to a recognizer service, or replay a recorded
/// stroke script without opening a window.
#[derive(Parser, Debug, Default)]
#[command(
    name = "digitpad",
    about = "Handwritten digit pad for a remote recognizer",
    long_about = "Draw a digit and post it as a PNG data URL to a recognizer endpoint.\n\
                  With --strokes, replay a stroke script headlessly instead.\n\n\
                  Example:\n  \
                  digitpad --strokes seven.txt --output seven.png --predict"
)]
pub struct CliArgs {
    /// Stroke script to replay headlessly (down X Y / move X Y / up / leave /
    /// width W / color #RRGGBB / clear).
    #[arg(short, long, value_name = "FILE")]
    pub strokes: Option<PathBuf>,

    /// Write the resulting pad image as PNG.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: Option<PathBuf>,

    /// Post the resulting image to the recognizer and print the answer.
    #[arg(short, long)]
    pub predict: bool,

    /// Recognizer endpoint URL.
    #[arg(long, env = "DIGITPAD_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// JSON field carrying the image data URL (image_data or image).
    #[arg(long, value_name = "NAME")]
    pub field: Option<String>,

    /// Logical edge length of the square pad.
    #[arg(long, value_name = "PX")]
    pub size: Option<u32>,

    /// Density factor (physical pixels per logical pixel).
    #[arg(long, value_name = "FACTOR")]
    pub density: Option<f32>,

    /// Initial stroke width in logical pixels.
    #[arg(long, value_name = "PX")]
    pub width: Option<f32>,

    /// Initial pen colour (#rrggbb).
    #[arg(long, value_name = "COLOR")]
    pub color: Option<String>,

    /// Read settings from this file instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// True when a headless run was requested.
    pub fn is_cli_mode(&self) -> bool {
        self.strokes.is_some()
    }

    /// Defaults, then the settings file, then these flags.
    pub fn resolve_settings(&self) -> Result<PadSettings, SettingsError> {
        let mut s = match &self.config {
            Some(path) => PadSettings::load_from(path),
            None => PadSettings::load(),
        };
        self.apply_overrides(&mut s);
        s.validate()
    }

    fn apply_overrides(&self, s: &mut PadSettings) {
        if let Some(endpoint) = &self.endpoint {
            s.endpoint = endpoint.clone();
        }
        if let Some(field) = &self.field {
            s.payload_field = field.clone();
        }
        if let Some(size) = self.size {
            s.canvas_size = size;
        }
        if let Some(density) = self.density {
            s.density = Some(density);
        }
        if let Some(width) = self.width {
            s.default_width = width;
        }
        if let Some(color) = &self.color {
            match parse_color(color) {
                Some(c) => s.default_color = c,
                None => log::warn!("ignoring unparsable colour '{}'", color),
            }
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Process status for any failed run, headless or GUI start-up.
pub const FAILURE_STATUS: i32 = 1;

/// Run the headless replay and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = match args.resolve_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match run_headless(&args, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_headless(args: &CliArgs, settings: &PadSettings) -> Result<(), String> {
    let Some(path) = &args.strokes else {
        return Err("no stroke script given".to_string());
    };
    if args.output.is_none() && !args.predict {
        eprintln!("warning: neither --output nor --predict given; nothing will be produced.");
    }

    // -- Step 1: Parse -----------------------------------------------------
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let commands = parse_script(&src).map_err(|e| format!("{}: {}", path.display(), e))?;

    // -- Step 2: Replay ----------------------------------------------------
    let mut surface = build_surface(settings);
    replay(&mut surface, &commands);
    if surface.is_active() {
        // A script ending mid-gesture is finished as if the pointer lifted
        surface.end_stroke();
    }
    log::info!("replayed {} command(s) from {}", commands.len(), path.display());
    if args.verbose {
        let (w, h) = surface.physical_size();
        println!("replayed {} command(s) onto a {}x{} surface", commands.len(), w, h);
        if let Some(log) = crate::logger::log_path() {
            println!("log: {}", log.display());
        }
    }

    let image = surface.export_image().map_err(|e| e.to_string())?;

    // -- Step 3: Save ------------------------------------------------------
    if let Some(out) = &args.output {
        image
            .write_to(out)
            .map_err(|e| format!("could not write '{}': {}", out.display(), e))?;
        println!("  → {}", out.display());
    }

    // -- Step 4: Predict ---------------------------------------------------
    if args.predict {
        let client = PredictionClient::new(settings).map_err(|e| e.to_string())?;
        if args.verbose {
            println!("posting to {}", client.endpoint());
        }
        let mut display = PredictionDisplay::default();
        let outcome = PredictionOutcome {
            token: display.token(),
            result: client.predict(&image),
        };
        if let Err(e) = &outcome.result {
            return Err(format!("prediction failed: {}", e));
        }
        display.accept(outcome);
        if let Some(summary) = display.summary() {
            println!("{}", summary);
        }
        if let Some(line) = display.probabilities_line() {
            println!("Probabilities: {}", line);
        }
    }

    Ok(())
}

/// Surface configured from settings (density 1 when following the display).
pub fn build_surface(settings: &PadSettings) -> DrawingSurface {
    let mut surface = DrawingSurface::new(
        settings.canvas_size,
        settings.canvas_size,
        settings.density.unwrap_or(1.0),
    );
    surface.set_stroke_width(settings.default_width);
    surface.set_stroke_color(settings.default_color);
    surface
}
