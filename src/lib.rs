//! Tablesight
//!
//! Poker table state capture: calibrates regions on a table screenshot, OCRs
//! cards, pot, stacks, position and actions from each captured frame, and
//! fuses the noisy per-frame readings into a stable table state.
//!
//! The pipeline, leaves first:
//! - [`vision::Calibrator`] derives a [`RegionSet`] from a template image
//! - [`vision::Preprocessor`] binarizes each cropped region
//! - [`vision::FieldExtractor`] turns OCR output into [`FieldReading`]s
//! - [`vision::FrameAnalyzer`] builds one [`AnalysisSnapshot`] per frame
//! - [`fusion::TemporalFuser`] keeps the last trusted value of each field
//! - [`fusion::ChangeDetector`] reports material changes as a [`ChangeSet`]
//! - [`vision::CaptureScheduler`] runs all of it on a worker thread

pub mod config;
pub mod core;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod vision;

// Re-export commonly used types
pub use crate::core::{
    ActionEntry, ActionLabel, ActionReading, ActionTiming, AnalysisHistory, AnalysisSnapshot,
    CaptureRecord, Card, Change, ChangeKind, ChangeSet, FieldReading, RecordSink, RecordedAction,
    Region, RegionKind, RegionSet, SchedulerState, SchedulerStats, SnapshotCallback,
    UNKNOWN_POSITION,
};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use fusion::{ChangeDetector, FusionThresholds, TemporalFuser};
pub use logging::Logger;
pub use vision::{CalibrationStrategy, CaptureScheduler, Frame, FrameQueue, OcrEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
