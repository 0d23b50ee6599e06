//! One analysis pass over a frame

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::capture::Frame;
use super::extract::FieldExtractor;
use super::preprocess::Preprocessor;
use crate::core::region::names;
use crate::core::{
    ActionReading, AnalysisSnapshot, Card, FieldReading, Region, RegionKind, RegionSet,
    UNKNOWN_POSITION,
};
use crate::logging::{Logger, debug, error, warn};

/// Per-frame analysis and how many regions failed along the way
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub snapshot: AnalysisSnapshot,
    pub region_failures: usize,
}

/// What one region produced
enum RegionValue {
    Cards(FieldReading<Vec<Card>>),
    Number(FieldReading<f64>),
    Position(FieldReading<String>),
    Actions(ActionReading),
}

impl RegionValue {
    /// Zero-confidence reading of the right shape for `kind`
    fn unknown(kind: RegionKind) -> Self {
        match kind {
            RegionKind::Cards => RegionValue::Cards(FieldReading::new(Vec::new(), 0.0)),
            RegionKind::Numeric => RegionValue::Number(FieldReading::new(0.0, 0.0)),
            RegionKind::Position => RegionValue::Position(FieldReading::new(UNKNOWN_POSITION.to_string(), 0.0)),
            RegionKind::Action => RegionValue::Actions(ActionReading::empty_with_confidence(0.0)),
        }
    }
}

/// Crops, preprocesses and extracts every region of a frame
#[derive(Clone)]
pub struct FrameAnalyzer {
    preprocessor: Preprocessor,
    extractor: FieldExtractor,
    log: Logger,
}

impl FrameAnalyzer {
    pub fn new(preprocessor: Preprocessor, extractor: FieldExtractor, log: Logger) -> Self {
        Self {
            preprocessor,
            extractor,
            log,
        }
    }

    /// Build the snapshot for `frame`
    pub fn analyze(&self, frame: &Frame, regions: &RegionSet) -> AnalysisSnapshot {
        self.analyze_frame(frame, regions).snapshot
    }

    /// Like [`analyze`](Self::analyze), also reporting failed regions.
    ///
    /// A region that cannot be cropped, or whose processing panics, yields a
    /// zero-confidence reading; the other regions are unaffected.
    pub fn analyze_frame(&self, frame: &Frame, regions: &RegionSet) -> FrameAnalysis {
        let mut snapshot = AnalysisSnapshot::empty(frame.timestamp_ms());
        let mut region_failures = 0;

        for region in regions.iter() {
            let value = match self.analyze_region(frame, region) {
                Some(value) => value,
                None => {
                    region_failures += 1;
                    RegionValue::unknown(region.kind)
                }
            };
            assign(&mut snapshot, region, value);
        }

        if region_failures > 0 {
            debug!(
                self.log,
                "Frame {}: {} of {} regions failed",
                frame.timestamp_ms(),
                region_failures,
                regions.len()
            );
        }
        FrameAnalysis {
            snapshot,
            region_failures,
        }
    }

    fn analyze_region(&self, frame: &Frame, region: &Region) -> Option<RegionValue> {
        let Some(crop) = frame.crop(region) else {
            warn!(
                self.log,
                "Region '{}' lies outside the {}x{} frame",
                region.name,
                frame.width(),
                frame.height()
            );
            return None;
        };

        // Card faces are located before binarization, other fields read the binary image
        let result = catch_unwind(AssertUnwindSafe(|| match region.kind {
            RegionKind::Cards => {
                RegionValue::Cards(self.extractor.extract_cards(&crop.to_luma8(), &self.preprocessor))
            }
            RegionKind::Numeric => {
                RegionValue::Number(self.extractor.extract_number(&self.preprocessor.preprocess(&crop)))
            }
            RegionKind::Position => {
                RegionValue::Position(self.extractor.extract_position(&self.preprocessor.preprocess(&crop)))
            }
            RegionKind::Action => {
                RegionValue::Actions(self.extractor.extract_actions(&self.preprocessor.preprocess(&crop)))
            }
        }));

        match result {
            Ok(value) => Some(value),
            Err(_) => {
                error!(self.log, "Analysis of region '{}' panicked", region.name);
                None
            }
        }
    }
}

/// Route a region's reading to its snapshot field
fn assign(snapshot: &mut AnalysisSnapshot, region: &Region, value: RegionValue) {
    match value {
        RegionValue::Cards(reading) => {
            if region.name == names::COMMUNITY_CARDS {
                snapshot.community_cards = reading;
            } else {
                snapshot.hole_cards = reading;
            }
        }
        RegionValue::Number(reading) => match region.name.as_str() {
            names::POT => snapshot.pot = reading,
            names::STACK => snapshot.stack = reading,
            other => {
                snapshot.other_stacks.insert(seat_key(other), reading);
            }
        },
        RegionValue::Position(reading) => snapshot.position = reading,
        RegionValue::Actions(reading) => snapshot.actions = reading,
    }
}

/// `stack_btn` -> `BTN`; other names are upper-cased as they are
fn seat_key(name: &str) -> String {
    name.strip_prefix(names::SEAT_STACK_PREFIX)
        .unwrap_or(name)
        .to_uppercase()
}
