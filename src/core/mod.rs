//! Plain data types shared across the pipeline
//!
//! - `Region` / `RegionSet` - calibrated frame layout
//! - `FieldReading` - a value with its confidence
//! - `AnalysisSnapshot` / `AnalysisHistory` - per-frame results and their bounded history
//! - `ChangeSet` - diff between two fused snapshots

pub mod region;
mod reading;
mod snapshot;
mod events;
mod state;

pub use events::{Change, ChangeKind, ChangeSet, RecordSink, SnapshotCallback};
pub use reading::{ActionEntry, ActionLabel, ActionReading, Card, FieldReading, RANKS, SUITS};
pub use region::{Region, RegionKind, RegionSet};
pub use snapshot::{
    ActionTiming, AnalysisHistory, AnalysisSnapshot, CaptureRecord, RecordedAction,
    UNKNOWN_POSITION,
};
pub(crate) use snapshot::now_ms;
pub use state::{SchedulerState, SchedulerStats};
