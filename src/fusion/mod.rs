//! Fusion of per-frame readings into a stable table state
//!
//! - `TemporalFuser` - holds the last trusted value of each field
//! - `ChangeDetector` - reports which fields changed materially

mod changes;
mod fuser;

pub use changes::ChangeDetector;
pub use fuser::{fuse_with, FusionThresholds, TemporalFuser};
