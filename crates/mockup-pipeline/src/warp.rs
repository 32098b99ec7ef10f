//! Perspective resampling.
//!
//! Pixel `(i, j)` is sampled at integer coordinates, so the source
//! rectangle `(0,0)..(w,h)` covers pixels `0..w` and `0..h`. Transparent
//! borders go straight through imageproc's `warp_into`, which writes zero
//! wherever an interpolation tap would leave the source. imageproc has no
//! replicated border, so [`BorderMode::Replicate`] uses a small sampler
//! here that clamps every tap to the nearest edge pixel.

use image::{GrayImage, ImageBuffer, Luma, Pixel};
use imageproc::geometric_transformations::{self as geometric, warp_into};
use serde::{Deserialize, Serialize};

use crate::homography::Homography;
use crate::types::{Dimensions, PipelineError};

/// Source resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Nearest source pixel.
    Nearest,
    /// Bilinear over a 2x2 neighbourhood.
    Linear,
    /// Catmull-Rom bicubic over a 4x4 neighbourhood.
    #[default]
    Cubic,
}

impl Interpolation {
    const fn to_imageproc(self) -> geometric::Interpolation {
        match self {
            Self::Nearest => geometric::Interpolation::Nearest,
            Self::Linear => geometric::Interpolation::Bilinear,
            Self::Cubic => geometric::Interpolation::Bicubic,
        }
    }
}

/// What interpolation reads outside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderMode {
    /// Destination pixels whose taps leave the source stay zero.
    #[default]
    Transparent,
    /// Taps outside the source read the nearest edge pixel.
    Replicate,
}

/// Cubic convolution coefficient; matches imageproc's bicubic blend.
const CUBIC_A: f32 = -0.5;

/// Keys cubic convolution kernel.
fn cubic_weight(t: f32) -> f32 {
    let t = t.abs();
    if t <= 1.0 {
        ((CUBIC_A + 2.0) * t - (CUBIC_A + 3.0)).mul_add(t * t, 1.0)
    } else if t < 2.0 {
        ((CUBIC_A * t - 5.0 * CUBIC_A).mul_add(t, 8.0 * CUBIC_A)).mul_add(t, -4.0 * CUBIC_A)
    } else {
        0.0
    }
}

/// Source view whose taps are clamped into the image.
struct ClampedSampler<'a, P: Pixel<Subpixel = u8>> {
    image: &'a ImageBuffer<P, Vec<u8>>,
    max_x: i64,
    max_y: i64,
}

impl<'a, P: Pixel<Subpixel = u8>> ClampedSampler<'a, P> {
    fn new(image: &'a ImageBuffer<P, Vec<u8>>) -> Self {
        Self {
            image,
            max_x: i64::from(image.width()) - 1,
            max_y: i64::from(image.height()) - 1,
        }
    }

    /// Accumulate `weight * pixel(x, y)` into `acc`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn add(&self, acc: &mut [f32; 4], x: i64, y: i64, weight: f32) {
        let (x, y) = (x.clamp(0, self.max_x), y.clamp(0, self.max_y));
        let p = self.image.get_pixel(x as u32, y as u32);
        for (a, &c) in acc.iter_mut().zip(p.channels()) {
            *a += weight * f32::from(c);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample(&self, sx: f32, sy: f32, interpolation: Interpolation) -> [f32; 4] {
        let mut acc = [0.0f32; 4];
        match interpolation {
            Interpolation::Nearest => {
                let (x, y) = ((sx + 0.5).floor(), (sy + 0.5).floor());
                self.add(&mut acc, x as i64, y as i64, 1.0);
            }
            Interpolation::Linear => {
                let (x0, y0) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - x0, sy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                self.add(&mut acc, x0, y0, (1.0 - fx) * (1.0 - fy));
                self.add(&mut acc, x0 + 1, y0, fx * (1.0 - fy));
                self.add(&mut acc, x0, y0 + 1, (1.0 - fx) * fy);
                self.add(&mut acc, x0 + 1, y0 + 1, fx * fy);
            }
            Interpolation::Cubic => {
                let (x0, y0) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - x0, sy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let wx = [-1.0, 0.0, 1.0, 2.0].map(|o: f32| cubic_weight(fx - o));
                let wy = [-1.0, 0.0, 1.0, 2.0].map(|o: f32| cubic_weight(fy - o));
                for (j, wy) in (-1..=2).zip(wy) {
                    for (i, wx) in (-1..=2).zip(wx) {
                        self.add(&mut acc, x0 + i, y0 + j, wx * wy);
                    }
                }
            }
        }
        acc
    }
}

/// Resample every pixel of `out` from `image` through `inverse` (canvas to
/// source), replicating the source's edge pixels outward.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn warp_replicate_into<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    inverse: &Homography,
    interpolation: Interpolation,
    out: &mut ImageBuffer<P, Vec<u8>>,
) where
    P: Pixel<Subpixel = u8>,
{
    let sampler = ClampedSampler::new(image);
    let projection = *inverse.projection();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = projection * (x as f32, y as f32);
        if !sx.is_finite() || !sy.is_finite() {
            continue;
        }
        let acc = sampler.sample(sx, sy, interpolation);
        for (dst, value) in pixel.channels_mut().iter_mut().zip(acc) {
            *dst = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Resample `image` onto a `canvas`-sized buffer through `homography`
/// (which maps source coordinates to canvas coordinates).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] for an empty source.
pub fn warp_perspective<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    homography: &Homography,
    canvas: Dimensions,
    interpolation: Interpolation,
    border: BorderMode,
) -> Result<ImageBuffer<P, Vec<u8>>, PipelineError>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    if Dimensions::of(image).is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot warp an empty image".to_string(),
        ));
    }

    let mut out = ImageBuffer::<P, Vec<u8>>::new(canvas.width, canvas.height);
    match border {
        BorderMode::Transparent => {
            let zero = vec![0u8; usize::from(P::CHANNEL_COUNT)];
            warp_into(
                image,
                homography.projection(),
                interpolation.to_imageproc(),
                *P::from_slice(&zero),
                &mut out,
            );
        }
        BorderMode::Replicate => {
            warp_replicate_into(image, &homography.inverse(), interpolation, &mut out);
        }
    }
    Ok(out)
}

/// Warp a uniform full-opacity mask of the given source size. Used as the
/// geometric blend weight: 255 where the source lands, 0 elsewhere, with
/// interpolated edges.
///
/// # Errors
///
/// As [`warp_perspective`].
pub fn warp_full_mask(
    width: u32,
    height: u32,
    homography: &Homography,
    canvas: Dimensions,
    interpolation: Interpolation,
) -> Result<GrayImage, PipelineError> {
    let mask = GrayImage::from_pixel(width, height, Luma([255]));
    warp_perspective(
        &mask,
        homography,
        canvas,
        interpolation,
        BorderMode::Transparent,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::types::{Point, QuadCorners};

    /// A 24x16 test card with distinct values in every pixel.
    fn card() -> RgbImage {
        RgbImage::from_fn(24, 16, |x, y| {
            Rgb([(x * 10) as u8, (y * 15) as u8, ((x + y) * 5) as u8])
        })
    }

    fn identity_quad(w: u32, h: u32) -> QuadCorners {
        let (w, h) = (f64::from(w), f64::from(h));
        QuadCorners::new([
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ])
    }

    /// Largest channel difference over pixels at least `margin` from every
    /// edge.
    fn max_channel_diff(a: &RgbImage, b: &RgbImage, margin: u32) -> u8 {
        let (w, h) = a.dimensions();
        a.enumerate_pixels()
            .filter(|(x, y, _)| {
                (margin..w.saturating_sub(margin)).contains(x)
                    && (margin..h.saturating_sub(margin)).contains(y)
            })
            .flat_map(|(x, y, p)| {
                let q = b.get_pixel(x, y);
                p.0.into_iter().zip(q.0).map(|(u, v)| u.abs_diff(v))
            })
            .max()
            .unwrap_or(0)
    }

    fn near(a: Rgb<u8>, b: Rgb<u8>) -> bool {
        a.0.iter().zip(b.0).all(|(x, y)| x.abs_diff(y) <= 1)
    }

    #[test]
    fn cubic_weights_partition_unity() {
        for t in [0.0f32, 0.25, 0.5, 0.9] {
            let sum: f32 = [-1.0, 0.0, 1.0, 2.0].iter().map(|o| cubic_weight(t - o)).sum();
            assert!((sum - 1.0).abs() < 1e-5, "t={t}: {sum}");
        }
        assert!((cubic_weight(0.0) - 1.0).abs() < f32::EPSILON);
        assert!(cubic_weight(1.0).abs() < f32::EPSILON);
        assert!(cubic_weight(2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn identity_warp_reproduces_source() {
        let src = card();
        let h = Homography::rect_to_quad(24, 16, &identity_quad(24, 16)).unwrap();
        for interpolation in [
            Interpolation::Nearest,
            Interpolation::Linear,
            Interpolation::Cubic,
        ] {
            // Transparent warps blank the rim where taps leave the source.
            let out = warp_perspective(
                &src,
                &h,
                Dimensions::of(&src),
                interpolation,
                BorderMode::Transparent,
            )
            .unwrap();
            assert!(
                max_channel_diff(&out, &src, 3) <= 2,
                "{interpolation:?} changed the interior"
            );

            let out = warp_perspective(
                &src,
                &h,
                Dimensions::of(&src),
                interpolation,
                BorderMode::Replicate,
            )
            .unwrap();
            assert!(
                max_channel_diff(&out, &src, 0) <= 1,
                "{interpolation:?} changed the image"
            );
        }
    }

    #[test]
    fn transparent_cubic_blanks_the_rim() {
        let src = RgbImage::from_pixel(12, 12, Rgb([90, 90, 90]));
        let h = Homography::identity();
        let canvas = Dimensions::of(&src);
        let out = warp_perspective(&src, &h, canvas, Interpolation::Cubic, BorderMode::Transparent)
            .unwrap();
        assert_eq!(out.get_pixel(0, 6), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(11, 6), &Rgb([0, 0, 0]));
        assert!(near(*out.get_pixel(6, 6), Rgb([90, 90, 90])));
    }

    #[test]
    fn transparent_border_leaves_zero_outside() {
        let src = RgbImage::from_pixel(10, 10, Rgb([200, 100, 50]));
        let quad = identity_quad(10, 10).translated(10.0, 10.0);
        let h = Homography::rect_to_quad(10, 10, &quad).unwrap();
        let canvas = Dimensions {
            width: 30,
            height: 30,
        };
        let out = warp_perspective(&src, &h, canvas, Interpolation::Linear, BorderMode::Transparent)
            .unwrap();
        assert_eq!(out.get_pixel(2, 2), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(28, 28), &Rgb([0, 0, 0]));
        assert!(near(*out.get_pixel(15, 15), Rgb([200, 100, 50])));
    }

    #[test]
    fn replicate_border_extends_edges() {
        let src = RgbImage::from_pixel(10, 10, Rgb([200, 100, 50]));
        let quad = identity_quad(10, 10).translated(10.0, 10.0);
        let h = Homography::rect_to_quad(10, 10, &quad).unwrap();
        let canvas = Dimensions {
            width: 30,
            height: 30,
        };
        let out = warp_perspective(&src, &h, canvas, Interpolation::Cubic, BorderMode::Replicate)
            .unwrap();
        assert!(near(*out.get_pixel(2, 2), Rgb([200, 100, 50])));
        assert!(near(*out.get_pixel(28, 5), Rgb([200, 100, 50])));
    }

    #[test]
    fn replicate_reads_the_nearest_edge_pixel() {
        // Left half dark, right half bright: far left stays dark and far
        // right stays bright.
        let src = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 { Rgb([10, 10, 10]) } else { Rgb([240, 240, 240]) }
        });
        let quad = identity_quad(8, 8).translated(8.0, 0.0);
        let h = Homography::rect_to_quad(8, 8, &quad).unwrap();
        let canvas = Dimensions {
            width: 24,
            height: 8,
        };
        let out = warp_perspective(&src, &h, canvas, Interpolation::Linear, BorderMode::Replicate)
            .unwrap();
        assert!(near(*out.get_pixel(1, 4), Rgb([10, 10, 10])));
        assert!(near(*out.get_pixel(22, 4), Rgb([240, 240, 240])));
    }

    #[test]
    fn full_mask_covers_the_quad() {
        let quad = QuadCorners::new([
            Point::new(10.0, 8.0),
            Point::new(50.0, 12.0),
            Point::new(52.0, 40.0),
            Point::new(8.0, 36.0),
        ]);
        let h = Homography::rect_to_quad(100, 80, &quad).unwrap();
        let canvas = Dimensions {
            width: 64,
            height: 48,
        };
        let mask = warp_full_mask(100, 80, &h, canvas, Interpolation::Cubic).unwrap();
        assert_eq!(mask.dimensions(), (64, 48));
        assert!(mask.get_pixel(30, 24).0[0] >= 254);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
        assert_eq!(mask.get_pixel(60, 45).0[0], 0);
    }

    #[test]
    fn empty_source_is_invalid() {
        let h = Homography::identity();
        let result = warp_perspective(
            &RgbImage::new(0, 5),
            &h,
            Dimensions {
                width: 4,
                height: 4,
            },
            Interpolation::Linear,
            BorderMode::Transparent,
        );
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }
}
