//! Render one screenshot into a directory of templates.
//!
//! Templates are independent, so each one is rendered on the rayon pool.
//! The layout is only read here: newly detected corners come back in the
//! [`BatchReport`] and the caller decides whether to merge and save them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mockup_pipeline::{
    CornerSource, Detection, MockupConfig, QuadCorners, RgbImage, locate_screen, render_mockup,
};
use rayon::prelude::*;

use crate::error::IoError;
use crate::files::{read_rgb, write_png};
use crate::layout::LayoutStore;

/// One template that made it through the batch.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Template name (file stem), also the layout key.
    pub name: String,
    /// Where the composite was written. `None` for calibration runs.
    pub output: Option<PathBuf>,
    pub corners: QuadCorners,
    pub source: CornerSource,
}

/// One template that failed. The rest of the batch is unaffected.
#[derive(Debug)]
pub struct BatchFailure {
    pub name: String,
    pub error: IoError,
}

/// Outcome of a batch or calibration run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful templates, in input order.
    pub rendered: Vec<Rendered>,
    /// Failed templates, in input order.
    pub failures: Vec<BatchFailure>,
    /// Corners computed during this run, keyed by template name. Cached
    /// corners are not repeated here.
    pub detected: BTreeMap<String, QuadCorners>,
}

impl BatchReport {
    /// Number of templates processed, successful or not.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rendered.len() + self.failures.len()
    }

    /// Whether at least one template was attempted and none succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.rendered.is_empty() && !self.failures.is_empty()
    }

    fn collect(outcomes: Vec<Result<Rendered, BatchFailure>>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                Ok(rendered) => {
                    if rendered.source.is_computed() {
                        report
                            .detected
                            .insert(rendered.name.clone(), rendered.corners);
                    }
                    report.rendered.push(rendered);
                }
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }
}

/// File name prefix of rendered composites.
pub const OUTPUT_PREFIX: &str = "final_";

/// List the `*.png` files in `dir`, sorted by file name.
///
/// Files named like a rendered composite (`final_*.png`) are skipped, so
/// writing the output into the templates directory never feeds earlier
/// results back in as templates.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the directory cannot be listed.
pub fn discover_templates(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let read_err = |source| IoError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut templates = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        let is_output = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(OUTPUT_PREFIX));
        if is_png && !is_output && path.is_file() {
            templates.push(path);
        }
    }
    templates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(templates)
}

/// Layout key for a template file: its stem.
#[must_use]
pub fn template_name(path: &Path) -> String {
    path.file_stem().map_or_else(
        || path.display().to_string(),
        |stem| stem.to_string_lossy().into_owned(),
    )
}

/// Render `screenshot` into every template and write
/// `out_dir/final_<name>.png` for each.
///
/// Corners come from `layout` when it has an entry for the template and
/// are detected otherwise. Per-template failures are logged and collected
/// in the report; they never stop the other templates.
#[tracing::instrument(level = "debug", skip_all, fields(templates = templates.len()))]
pub fn run_batch(
    screenshot: &RgbImage,
    templates: &[PathBuf],
    layout: &LayoutStore,
    config: &MockupConfig,
    out_dir: &Path,
) -> BatchReport {
    let outcomes = templates
        .par_iter()
        .map(|path| {
            let name = template_name(path);
            render_one(screenshot, path, &name, layout, config, out_dir)
                .map_err(|error| fail(name, error))
        })
        .collect();
    BatchReport::collect(outcomes)
}

fn render_one(
    screenshot: &RgbImage,
    path: &Path,
    name: &str,
    layout: &LayoutStore,
    config: &MockupConfig,
    out_dir: &Path,
) -> Result<Rendered, IoError> {
    let template = read_rgb(path)?;
    let result =
        render_mockup(screenshot, &template, layout.get(name), config).map_err(|source| {
            IoError::Pipeline {
                template: name.to_string(),
                source,
            }
        })?;

    let output = out_dir.join(format!("{OUTPUT_PREFIX}{name}.png"));
    write_png(&output, &result.composite)?;
    tracing::info!(
        template = name,
        source = ?result.source,
        output = %output.display(),
        "rendered"
    );

    Ok(Rendered {
        name: name.to_string(),
        output: Some(output),
        corners: result.corners,
        source: result.source,
    })
}

/// Locate the screen in every template without rendering anything.
///
/// Templates that already have a layout entry are reported as cached and
/// not opened.
#[tracing::instrument(level = "debug", skip_all, fields(templates = templates.len()))]
pub fn run_calibration(
    templates: &[PathBuf],
    layout: &LayoutStore,
    config: &MockupConfig,
) -> BatchReport {
    let outcomes = templates
        .par_iter()
        .map(|path| {
            let name = template_name(path);
            if let Some(corners) = layout.get(&name) {
                tracing::debug!(template = %name, "corners already in layout");
                return Ok(Rendered {
                    name,
                    output: None,
                    corners: *corners,
                    source: CornerSource::Cached,
                });
            }
            calibrate_one(path, &name, config).map_err(|error| fail(name, error))
        })
        .collect();
    BatchReport::collect(outcomes)
}

fn calibrate_one(path: &Path, name: &str, config: &MockupConfig) -> Result<Rendered, IoError> {
    let template = read_rgb(path)?;
    let detection = locate_screen(&template, config).map_err(|source| IoError::Pipeline {
        template: name.to_string(),
        source,
    })?;
    let (corners, source) = match detection {
        Detection::Detected(corners) => (corners, CornerSource::Detected),
        Detection::Fallback { corners, reason } => (corners, CornerSource::Fallback(reason)),
    };
    tracing::info!(template = name, source = ?source, "located");
    Ok(Rendered {
        name: name.to_string(),
        output: None,
        corners,
        source,
    })
}

fn fail(name: String, error: IoError) -> BatchFailure {
    tracing::warn!(template = %name, "{error}");
    BatchFailure { name, error }
}
