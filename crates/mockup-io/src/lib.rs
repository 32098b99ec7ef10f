//! mockup-io: Filesystem shell around the mockup pipeline.
//!
//! Reads and writes image files, persists template layouts
//! (template name -> screen corners) as JSON, and renders one screenshot
//! into a directory of templates in parallel. All geometry and
//! compositing lives in `mockup-pipeline`.

pub mod batch;
pub mod error;
pub mod files;
pub mod layout;

pub use batch::{
    BatchFailure, BatchReport, OUTPUT_PREFIX, Rendered, discover_templates, run_batch,
    run_calibration, template_name,
};
pub use error::IoError;
pub use files::{read_rgb, write_png};
pub use layout::LayoutStore;
