//! Errors raised by the filesystem shell.

use std::path::PathBuf;

use mockup_pipeline::PipelineError;

/// Errors that can occur while reading inputs, writing outputs or
/// rendering a template from disk.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// A file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image file could not be decoded or encoded.
    #[error("image error in {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: PipelineError,
    },

    /// The layout file is not valid layout JSON.
    #[error("invalid layout file {}: {source}", path.display())]
    Layout {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The pipeline failed for one template.
    #[error("template {template}: {source}")]
    Pipeline {
        template: String,
        #[source]
        source: PipelineError,
    },
}
