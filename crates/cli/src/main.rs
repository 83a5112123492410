//! pdfstamp - stamp JSON text runs onto a copy of a PDF
//!
//! Usage:
//!   pdfstamp --input form.pdf --json texts.json --output stamped.pdf
//!   INPUT_FILE=form.pdf JSON_FILE=texts.json pdfstamp --grid -v

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use pdf_core::{BoxStyle, Color};
use textrun::{ErrorPolicy, FontPaths, GridOptions, Scale, StampConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source PDF, copied and never modified
    #[arg(long, env = "INPUT_FILE")]
    input: PathBuf,

    /// Text-run JSON
    #[arg(long, env = "JSON_FILE")]
    json: PathBuf,

    /// Stamped PDF; the optimized copy is written next to it as <stem>_opt
    #[arg(long, env = "OUTPUT_FILE", default_value = "output.pdf")]
    output: PathBuf,

    /// Factor applied to every run's left position
    #[arg(long, default_value_t = 1.0)]
    scale_x: f64,

    /// Factor applied to every run's top position
    #[arg(long, default_value_t = 1.0)]
    scale_y: f64,

    /// What to do with a malformed text run
    #[arg(long, value_enum, default_value_t = OnError::Skip)]
    on_error: OnError,

    /// Draw a grid of line annotations before stamping
    #[arg(long)]
    grid: bool,

    /// Distance between grid lines in points
    #[arg(long, default_value_t = 25)]
    grid_step: u32,

    /// Size of the grid labels
    #[arg(long, default_value_t = 5.0)]
    grid_font_size: f32,

    /// TrueType font for stamped text (standard Helvetica otherwise)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Bold face of the --font family
    #[arg(long, requires = "font")]
    bold_font: Option<PathBuf>,

    /// Italic face of the --font family
    #[arg(long, requires = "font")]
    italic_font: Option<PathBuf>,

    /// Bold italic face of the --font family
    #[arg(long, requires = "font")]
    bold_italic_font: Option<PathBuf>,

    /// Base font size of every text box
    #[arg(long, default_value_t = 14.0)]
    font_size: f32,

    /// Base text color of every text box
    #[arg(long, default_value = "#11d")]
    color: String,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnError {
    Skip,
    Abort,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Skip => ErrorPolicy::Skip,
            OnError::Abort => ErrorPolicy::Abort,
        }
    }
}

impl Args {
    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn into_config(self) -> Result<StampConfig> {
        let color = Color::parse(&self.color)
            .ok_or_else(|| anyhow!("invalid color {:?}", self.color))?;
        if self.font_size.is_nan() || self.font_size <= 0.0 {
            return Err(anyhow!("font size must be positive, got {}", self.font_size));
        }

        let fonts = self.font.map(|regular| FontPaths {
            regular,
            bold: self.bold_font,
            italic: self.italic_font,
            bold_italic: self.bold_italic_font,
        });
        let grid = self.grid.then(|| GridOptions {
            step: self.grid_step,
            font_size: self.grid_font_size,
            ..GridOptions::default()
        });

        Ok(StampConfig {
            input: self.input,
            json: self.json,
            output: self.output,
            scale: Scale::new(self.scale_x, self.scale_y),
            policy: self.on_error.into(),
            grid,
            fonts,
            style: BoxStyle {
                font_size: self.font_size,
                color,
                ..BoxStyle::default()
            },
        })
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    info!("Input: {}", config.input.display());
    info!("JSON: {}", config.json.display());
    info!("Output: {}", config.output.display());

    let summary = textrun::run(&config).with_context(|| {
        format!(
            "failed to stamp {} with {}",
            config.input.display(),
            config.json.display()
        )
    })?;

    println!(
        "{} texts on {} pages ({} skipped, {} overflowed) -> {}, {}",
        summary.report.stamped,
        summary.report.pages,
        summary.report.skipped,
        summary.report.overflowed,
        summary.output.display(),
        summary.optimized.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
