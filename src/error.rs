//! Error types for the capture pipeline

use std::io;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for calibration, OCR and scheduler operations.
///
/// Low-confidence OCR output is not an error: it is reported as a
/// [`FieldReading`](crate::FieldReading) with a low confidence instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Template unusable for calibration (degenerate size, no match)
    #[error("Calibration failed: {0}")]
    Calibration(String),
    /// Input bytes could not be decoded into an image
    #[error("Image could not be decoded")]
    Decode(#[from] image::ImageError),
    /// The OCR backend failed for one region/mode
    #[error("OCR failed: {0}")]
    Ocr(String),
    /// `start` called before any region set was installed
    #[error("No region set calibrated")]
    NotCalibrated,
    /// `start` called while the worker is already running
    #[error("Capture scheduler already running")]
    AlreadyRunning,
    /// Operation not allowed while the worker is running
    #[error("Capture scheduler busy: {0}")]
    Busy(String),
    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Configuration could not be parsed")]
    Toml(#[from] toml::de::Error),
}
