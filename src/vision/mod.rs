//! Image side of the pipeline
//!
//! Frames come in through a [`FrameQueue`], regions are derived by the
//! [`Calibrator`], and each frame is cropped, binarized and OCR'd region by
//! region before the [`CaptureScheduler`] fuses the result.
//!
//! # Example
//!
//! ```ignore
//! use tablesight::vision::{CalibrationStrategy, CaptureScheduler, Frame, TesseractEngine};
//!
//! let config = PipelineConfig::load("tablesight.toml")?;
//! let engine = Arc::new(TesseractEngine::new(config.ocr.clone()));
//! let mut scheduler = CaptureScheduler::new(config, engine, Logger::default());
//! scheduler.calibrate(&template, CalibrationStrategy::Proportional)?;
//! scheduler.start(Some(Arc::new(|snapshot, changes| {
//!     println!("pot {} ({:?})", snapshot.pot.value, changes.detected_kinds());
//! })))?;
//! scheduler.enqueue(Frame::new(screenshot));
//! ```

pub mod analyzer;
pub mod calibrate;
pub mod capture;
pub mod config;
pub mod detector;
pub mod extract;
pub mod ocr;
pub mod preprocess;

mod runner;

pub use analyzer::{FrameAnalysis, FrameAnalyzer};
pub use calibrate::{proportional_layout, CalibrationStrategy, Calibrator, SEAT_LABELS};
pub use capture::{crop_region, decode_image, frames_differ, Frame, FrameBuffer, FrameQueue};
pub use config::{ExtractConfig, OcrConfig, PreprocessConfig};
pub use detector::{DetectionResult, TemplateLocator};
pub use extract::FieldExtractor;
pub use ocr::{OcrEngine, OcrOutput, OcrWord, PageSegMode};
pub use preprocess::Preprocessor;
pub use runner::CaptureScheduler;

#[cfg(feature = "tesseract")]
pub use ocr::TesseractEngine;
