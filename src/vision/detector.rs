//! Template location in a live frame

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

/// Longest template side matched at full resolution; larger templates are
/// matched on a downscaled copy of both images.
const MAX_MATCH_SIDE: u32 = 64;

/// Result of a detection operation
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Whether a match was found
    pub found: bool,
    /// Normalised cross-correlation of the best match (0.0 - 1.0)
    pub confidence: f32,
    /// Top-left of the match (x, y) if found
    pub location: Option<(u32, u32)>,
}

impl DetectionResult {
    /// Create a not-found result
    pub fn not_found() -> Self {
        Self {
            found: false,
            confidence: 0.0,
            location: None,
        }
    }

    /// Create a found result
    pub fn found(confidence: f32, x: u32, y: u32) -> Self {
        Self {
            found: true,
            confidence,
            location: Some((x, y)),
        }
    }
}

/// Finds where a template image sits inside a larger frame
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    /// Minimum correlation to accept a match
    threshold: f32,
}

impl TemplateLocator {
    pub fn new() -> Self {
        Self { threshold: 0.0 }
    }

    /// Set the confidence threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Locate `template` in `frame` by normalised cross-correlation.
    ///
    /// Templates wider or taller than the frame are never found.
    pub fn locate(&self, frame: &DynamicImage, template: &DynamicImage) -> DetectionResult {
        let (fw, fh) = frame.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > fw || th > fh {
            return DetectionResult::not_found();
        }

        let scale = (MAX_MATCH_SIDE as f32 / tw.max(th) as f32).min(1.0);
        let (frame_gray, template_gray) = if scale < 1.0 {
            (downscale(frame, scale), downscale(template, scale))
        } else {
            (frame.to_luma8(), template.to_luma8())
        };
        if template_gray.width() > frame_gray.width()
            || template_gray.height() > frame_gray.height()
        {
            return DetectionResult::not_found();
        }

        let scores = match_template(
            &frame_gray,
            &template_gray,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        let confidence = if extremes.max_value.is_nan() {
            0.0
        } else {
            extremes.max_value.clamp(0.0, 1.0)
        };
        if confidence < self.threshold {
            return DetectionResult::not_found();
        }

        let (x, y) = extremes.max_value_location;
        let x = ((x as f32 / scale).round() as u32).min(fw - tw);
        let y = ((y as f32 / scale).round() as u32).min(fh - th);
        DetectionResult::found(confidence, x, y)
    }
}

impl Default for TemplateLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn downscale(img: &DynamicImage, scale: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    img.resize_exact(nw, nh, FilterType::Triangle).to_luma8()
}
