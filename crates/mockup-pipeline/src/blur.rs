//! Gaussian feathering for blend masks.
//!
//! Softens hard mask edges into a gradual alpha ramp with
//! [`imageproc::filter::separable_filter_equal`]. Feather strength is
//! configured as an odd kernel size in pixels (the way mockup templates
//! are tuned) and the filter has exactly that many taps; the matching
//! sigma is derived with [`kernel_sigma`].

use image::{GrayImage, ImageBuffer, Luma};

use crate::types::PipelineError;

/// Sigma of the Gaussian whose support is `kernel` pixels wide.
///
/// Uses `0.3 * ((k - 1) / 2 - 1) + 0.8`, the usual rule for deriving
/// sigma from a fixed kernel size. Returns `0.0` for kernels of 0 or 1
/// (no blur).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn kernel_sigma(kernel: u32) -> f32 {
    if kernel <= 1 {
        return 0.0;
    }
    let k = kernel as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized `kernel`-tap Gaussian weights with sigma from
/// [`kernel_sigma`]. Empty for kernels of 0 or 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(kernel: u32) -> Vec<f32> {
    let sigma = kernel_sigma(kernel);
    if sigma <= 0.0 {
        return Vec::new();
    }
    let half = (kernel / 2) as f32;
    let weights: Vec<f32> = (0..kernel)
        .map(|i| {
            let x = i as f32 - half;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Feather a mask with a Gaussian of exactly `kernel` taps per axis.
///
/// Kernel sizes of 0 or 1 return the mask unchanged. Edges are padded by
/// continuity.
#[must_use = "returns the feathered mask"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn feather(mask: &GrayImage, kernel: u32) -> GrayImage {
    let weights = gaussian_kernel(kernel);
    if weights.is_empty() || mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }

    // Filter in f32 and round once, rather than truncating per pass.
    let levels: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([f32::from(mask.get_pixel(x, y).0[0])])
        });
    let blurred = imageproc::filter::separable_filter_equal(&levels, &weights);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([blurred.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Reject even kernel sizes above 1.
pub(crate) fn validate_kernel(field: &str, kernel: u32) -> Result<(), PipelineError> {
    if kernel > 1 && kernel % 2 == 0 {
        return Err(PipelineError::InvalidConfig(format!(
            "{field} must be odd (or 0 to disable), got {kernel}"
        )));
    }
    Ok(())
}
