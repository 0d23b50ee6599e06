//! Region preprocessing ahead of OCR
//!
//! grayscale -> local-mean adaptive threshold -> median denoise -> closing

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::morphology::close;

use super::config::PreprocessConfig;

/// Turns a cropped region into a clean binary image
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Binarize `img`. Output has the same dimensions and only 0 / 255 pixels.
    pub fn preprocess(&self, img: &DynamicImage) -> GrayImage {
        self.preprocess_gray(&img.to_luma8())
    }

    /// [`preprocess`](Self::preprocess) for an image already in grayscale
    pub fn preprocess_gray(&self, gray: &GrayImage) -> GrayImage {
        if gray.width() == 0 || gray.height() == 0 {
            return gray.clone();
        }

        let mut binary = adaptive_threshold(gray, self.config.block_radius, self.config.threshold_offset);
        if self.config.denoise_radius > 0 {
            binary = median_filter(&binary, self.config.denoise_radius, self.config.denoise_radius);
        }
        if self.config.closing_radius > 0 {
            binary = close(&binary, Norm::LInf, self.config.closing_radius);
        }
        binary
    }
}

/// Mean-C adaptive threshold: a pixel is white when it is brighter than the
/// mean of its `(2r+1)²` window minus `offset`. Windows are clipped at the
/// image border.
pub fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let integral = integral_image::<_, u64>(gray);

    GrayImage::from_fn(w, h, |x, y| {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = (x + radius).min(w - 1);
        let bottom = (y + radius).min(h - 1);
        let count = ((right - left + 1) * (bottom - top + 1)) as f64;
        let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
        let mean = sum as f64 / count;

        if gray.get_pixel(x, y)[0] as f64 > mean - offset as f64 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
