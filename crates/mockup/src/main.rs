//! mockup: render a screenshot into the screen of device template photos.
//!
//! Template photos carry a green-keyed screen. The first time a template
//! is used its screen corners are detected and saved to a layout file;
//! later runs read the corners back instead of detecting again.
//!
//! # Usage
//!
//! ```text
//! mockup render --screenshot shot.png --template templates/phone.png --output phone.png
//! mockup batch --screenshot shot.png --templates templates/ --output out/ --preset bezel
//! mockup calibrate --templates templates/ --reset
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mockup_io::{BatchReport, IoError, LayoutStore};
use mockup_pipeline::{AlphaStrategy, CornerSource, MockupConfig};

/// Layout file name used when `--layout` is not given.
const LAYOUT_FILE: &str = "layout.json";

/// Composite UI screenshots into device mockup photographs.
#[derive(Parser)]
#[command(name = "mockup", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log per-stage details (debug level).
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Render one screenshot into one template.
    Render(RenderArgs),
    /// Render one screenshot into every `*.png` template in a directory.
    Batch(BatchArgs),
    /// Detect and save screen corners for every template without rendering.
    Calibrate(CalibrateArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Screenshot to place on the screen.
    #[arg(long)]
    screenshot: PathBuf,

    /// Template photo with a green-keyed screen.
    #[arg(long)]
    template: PathBuf,

    /// Layout file [default: layout.json next to the template].
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Output PNG [default: final_<template>.png].
    #[arg(long)]
    output: Option<PathBuf>,

    /// Ignore saved corners and detect again.
    #[arg(long)]
    reset: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct BatchArgs {
    /// Screenshot to place on every screen.
    #[arg(long)]
    screenshot: PathBuf,

    /// Directory of template photos.
    #[arg(long)]
    templates: PathBuf,

    /// Directory for `final_<template>.png` outputs.
    #[arg(long)]
    output: PathBuf,

    /// Layout file [default: <templates>/layout.json].
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Ignore saved corners and detect again.
    #[arg(long)]
    reset: bool,

    /// Worker threads [default: one per core].
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    jobs: Option<usize>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct CalibrateArgs {
    /// Directory of template photos.
    #[arg(long)]
    templates: PathBuf,

    /// Layout file [default: <templates>/layout.json].
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Detect every template again, replacing saved corners.
    #[arg(long)]
    reset: bool,

    /// Worker threads [default: one per core].
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    jobs: Option<usize>,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Pipeline parameters shared by every subcommand.
#[derive(Args)]
struct ConfigArgs {
    /// Starting configuration; the flags below override parts of it.
    #[arg(long, value_enum, default_value_t = Preset::Geometry)]
    preset: Preset,

    /// Warp resampling filter [default: from preset].
    #[arg(long, value_enum)]
    interpolation: Option<Interp>,

    /// Warp border handling [default: from preset].
    #[arg(long, value_enum)]
    border: Option<Border>,

    /// Outward scale applied to detected corners.
    #[arg(long, default_value_t = MockupConfig::DEFAULT_OVERSCAN)]
    overscan: f64,

    /// Centroid correction applied to detected corners.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_RECENTER)]
    recenter: Recenter,

    /// Odd feather kernel for the blend mask, 0 to disable [default: from preset].
    #[arg(long)]
    feather: Option<u32>,

    /// Rescale the screenshot to this width before warping.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    screenshot_width: Option<u32>,

    /// Full configuration as a JSON string.
    ///
    /// When provided, all other configuration flags are ignored.
    /// The JSON must be a valid `MockupConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Configuration preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Blend weights from the warped screenshot outline (cubic, transparent border).
    Geometry,
    /// Blend weights from the template's own keyed screen (linear, replicated border).
    Bezel,
}

/// Warp resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Interp {
    Nearest,
    Linear,
    Cubic,
}

/// Warp border selection.
#[derive(Clone, Copy, ValueEnum)]
enum Border {
    /// Leave pixels outside the screenshot empty.
    Transparent,
    /// Extend the screenshot's edge pixels.
    Replicate,
}

/// Corner recentering selection.
#[derive(Clone, Copy, ValueEnum)]
enum Recenter {
    /// Shift corners horizontally toward the region centroid.
    Horizontal,
    /// Shift corners along both axes.
    Symmetric,
    /// Keep the fitted corners.
    Disabled,
}

/// Maps a [`mockup_pipeline::RecenterStrategy`] to the local CLI [`Recenter`] enum.
const fn recenter_from_pipeline(r: mockup_pipeline::RecenterStrategy) -> Recenter {
    match r {
        mockup_pipeline::RecenterStrategy::Horizontal => Recenter::Horizontal,
        mockup_pipeline::RecenterStrategy::Symmetric => Recenter::Symmetric,
        mockup_pipeline::RecenterStrategy::Disabled => Recenter::Disabled,
    }
}

/// The CLI default recentering, derived from
/// [`MockupConfig::DEFAULT_RECENTER`] so the two cannot silently diverge.
const CLI_DEFAULT_RECENTER: Recenter = recenter_from_pipeline(MockupConfig::DEFAULT_RECENTER);

/// Build a [`MockupConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual configuration flags are ignored. Otherwise the preset is
/// taken as the base and the flags are applied on top.
fn config_from_cli(args: &ConfigArgs) -> Result<MockupConfig, String> {
    let config = if let Some(ref json) = args.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let mut config = match args.preset {
            Preset::Geometry => MockupConfig::default(),
            Preset::Bezel => MockupConfig::bezel_blend(),
        };
        config.overscan = args.overscan;
        config.recenter = match args.recenter {
            Recenter::Horizontal => mockup_pipeline::RecenterStrategy::Horizontal,
            Recenter::Symmetric => mockup_pipeline::RecenterStrategy::Symmetric,
            Recenter::Disabled => mockup_pipeline::RecenterStrategy::Disabled,
        };
        if let Some(interp) = args.interpolation {
            config.interpolation = match interp {
                Interp::Nearest => mockup_pipeline::Interpolation::Nearest,
                Interp::Linear => mockup_pipeline::Interpolation::Linear,
                Interp::Cubic => mockup_pipeline::Interpolation::Cubic,
            };
        }
        if let Some(border) = args.border {
            config.border = match border {
                Border::Transparent => mockup_pipeline::BorderMode::Transparent,
                Border::Replicate => mockup_pipeline::BorderMode::Replicate,
            };
        }
        if let Some(kernel) = args.feather {
            match &mut config.alpha {
                AlphaStrategy::Geometry { feather_kernel } => *feather_kernel = kernel,
                AlphaStrategy::Appearance(mask) => mask.feather_kernel = kernel,
            }
        }
        config.screenshot_width = args.screenshot_width;
        config
    };

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Layout path for templates in `dir`, honoring an explicit override.
fn layout_path(explicit: Option<&Path>, dir: &Path) -> PathBuf {
    explicit.map_or_else(|| dir.join(LAYOUT_FILE), Path::to_path_buf)
}

/// Run `f` on a dedicated pool of `jobs` threads, or on the global pool.
fn with_jobs<T: Send>(jobs: Option<usize>, f: impl FnOnce() -> T + Send) -> Result<T, String> {
    match jobs {
        None => Ok(f()),
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map(|pool| pool.install(f))
            .map_err(|e| format!("Error building thread pool: {e}")),
    }
}

/// Human-readable origin of a set of corners.
fn describe(source: CornerSource) -> String {
    match source {
        CornerSource::Cached => "cached".to_string(),
        CornerSource::Detected => "detected".to_string(),
        CornerSource::Fallback(reason) => format!("estimated ({reason})"),
    }
}

/// Merge newly computed corners into `layout` and save it once.
fn persist(layout: &mut LayoutStore, report: &BatchReport, path: &Path) -> Result<(), IoError> {
    if report.detected.is_empty() {
        return Ok(());
    }
    layout.merge(report.detected.clone());
    layout.save(path)?;
    tracing::info!(
        path = %path.display(),
        added = report.detected.len(),
        entries = layout.len(),
        "saved layout"
    );
    Ok(())
}

fn render(args: &RenderArgs) -> Result<(), String> {
    let config = config_from_cli(&args.config)?;
    let name = mockup_io::template_name(&args.template);
    let template_dir = args.template.parent().unwrap_or_else(|| Path::new(""));
    let layout_file = layout_path(args.layout.as_deref(), template_dir);
    let mut layout = LayoutStore::load_or_empty(&layout_file);

    let screenshot = mockup_io::read_rgb(&args.screenshot).map_err(|e| e.to_string())?;
    let template = mockup_io::read_rgb(&args.template).map_err(|e| e.to_string())?;
    let cached = if args.reset { None } else { layout.get(&name) };

    let result = mockup_pipeline::render_mockup(&screenshot, &template, cached, &config)
        .map_err(|source| {
            IoError::Pipeline {
                template: name.clone(),
                source,
            }
            .to_string()
        })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}{name}.png", mockup_io::OUTPUT_PREFIX)));
    mockup_io::write_png(&output, &result.composite).map_err(|e| e.to_string())?;
    println!("{}: {} ({})", name, output.display(), describe(result.source));

    if result.source.is_computed() {
        layout.insert(name, result.corners);
        layout.save(&layout_file).map_err(|e| e.to_string())?;
        tracing::info!(path = %layout_file.display(), "saved layout");
    }
    Ok(())
}

fn batch(args: &BatchArgs) -> Result<(), String> {
    let config = config_from_cli(&args.config)?;
    let templates = mockup_io::discover_templates(&args.templates).map_err(|e| e.to_string())?;
    if templates.is_empty() {
        return Err(format!(
            "No .png templates found in {}",
            args.templates.display()
        ));
    }
    let layout_file = layout_path(args.layout.as_deref(), &args.templates);
    let mut layout = LayoutStore::load_or_empty(&layout_file);
    let screenshot = mockup_io::read_rgb(&args.screenshot).map_err(|e| e.to_string())?;

    let empty = LayoutStore::default();
    let lookup = if args.reset { &empty } else { &layout };
    let report = with_jobs(args.jobs, || {
        mockup_io::run_batch(&screenshot, &templates, lookup, &config, &args.output)
    })?;

    for rendered in &report.rendered {
        if let Some(ref output) = rendered.output {
            println!(
                "{}: {} ({})",
                rendered.name,
                output.display(),
                describe(rendered.source)
            );
        }
    }
    finish(&mut layout, &report, &layout_file, "rendered")
}

fn calibrate(args: &CalibrateArgs) -> Result<(), String> {
    let config = config_from_cli(&args.config)?;
    let templates = mockup_io::discover_templates(&args.templates).map_err(|e| e.to_string())?;
    if templates.is_empty() {
        return Err(format!(
            "No .png templates found in {}",
            args.templates.display()
        ));
    }
    let layout_file = layout_path(args.layout.as_deref(), &args.templates);
    let mut layout = LayoutStore::load_or_empty(&layout_file);

    let empty = LayoutStore::default();
    let lookup = if args.reset { &empty } else { &layout };
    let report = with_jobs(args.jobs, || {
        mockup_io::run_calibration(&templates, lookup, &config)
    })?;

    for rendered in &report.rendered {
        let corners = serde_json::to_string(&rendered.corners)
            .map_err(|e| format!("Error serializing corners: {e}"))?;
        println!(
            "{}: {corners} ({})",
            rendered.name,
            describe(rendered.source)
        );
    }
    finish(&mut layout, &report, &layout_file, "calibrated")
}

/// Save the layout, summarize, and fail if nothing succeeded.
fn finish(
    layout: &mut LayoutStore,
    report: &BatchReport,
    layout_file: &Path,
    verb: &str,
) -> Result<(), String> {
    persist(layout, report, layout_file).map_err(|e| e.to_string())?;
    eprintln!(
        "{verb} {} of {} templates",
        report.rendered.len(),
        report.total()
    );
    if report.all_failed() {
        return Err("Every template failed".to_string());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Render(args) => render(args),
        Command::Batch(args) => batch(args),
        Command::Calibrate(args) => calibrate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
