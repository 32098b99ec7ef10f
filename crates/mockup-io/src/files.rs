//! Image files on disk.

use std::fs;
use std::path::Path;

use mockup_pipeline::RgbImage;
use mockup_pipeline::decode::{decode_rgb, encode_png};

use crate::error::IoError;

/// Read and decode an image file (PNG, JPEG, BMP, WebP) as 8-bit RGB.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be read and
/// [`IoError::Image`] if it is empty or not a decodable image.
pub fn read_rgb(path: &Path) -> Result<RgbImage, IoError> {
    let bytes = fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_rgb(&bytes).map_err(|source| IoError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode `image` as PNG and write it to `path`, creating missing parent
/// directories.
///
/// # Errors
///
/// Returns [`IoError::Image`] if encoding fails and [`IoError::Write`] if
/// the directory or file cannot be written.
pub fn write_png(path: &Path, image: &RgbImage) -> Result<(), IoError> {
    let bytes = encode_png(image).map_err(|source| IoError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
