//! Vision tuning sections of the pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Preprocessor tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Half-size of the local window used for adaptive thresholding
    #[serde(default = "default_block_radius")]
    pub block_radius: u32,
    /// Subtracted from the local mean before comparing (OpenCV's `C`)
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i32,
    /// Median filter radius, 0 disables denoising
    #[serde(default = "default_one")]
    pub denoise_radius: u32,
    /// Radius of the morphological closing, 0 disables it
    #[serde(default = "default_closing_radius")]
    pub closing_radius: u8,
}

fn default_block_radius() -> u32 {
    5 // 11x11 window
}

fn default_threshold_offset() -> i32 {
    2
}

fn default_one() -> u32 {
    1
}

fn default_closing_radius() -> u8 {
    1
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            block_radius: default_block_radius(),
            threshold_offset: default_threshold_offset(),
            denoise_radius: default_one(),
            closing_radius: default_closing_radius(),
        }
    }
}

/// Field extraction tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Minimum contour area (px²) for a card candidate
    #[serde(default = "default_min_card_area")]
    pub min_card_area: f64,
    /// Luma above which a pixel belongs to a card face
    #[serde(default = "default_card_threshold")]
    pub card_threshold: u8,
}

fn default_min_card_area() -> f64 {
    100.0
}

fn default_card_threshold() -> u8 {
    127
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_card_area: default_min_card_area(),
            card_threshold: default_card_threshold(),
        }
    }
}

/// Tesseract CLI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Executable name or path
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    /// Passed as `--tessdata-dir` when set
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
}

fn default_tesseract_path() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_language() -> String {
    "eng".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: default_tesseract_path(),
            language: default_language(),
            tessdata_dir: None,
        }
    }
}
