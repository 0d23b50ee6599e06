//! Scheduler state and statistics

use serde::{Deserialize, Serialize};

use super::snapshot::ActionTiming;

/// Lifecycle of the capture scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No worker running
    #[default]
    Idle,
    /// Worker draining the frame queue
    Running,
}

/// Counters maintained by the scheduler worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Frames analysed and fused
    pub frames_processed: u64,
    /// Frames skipped because they matched the previous frame
    pub frames_skipped: u64,
    /// Frames evicted from a full queue before the worker saw them
    pub frames_dropped: u64,
    /// Regions whose analysis failed and degraded to a zero-confidence reading
    pub region_failures: u64,
    /// Poll cycles that found the queue empty
    pub idle_polls: u64,
    /// Wall time of the most recent frame, in milliseconds
    pub last_processing_ms: u64,
    /// Gaps between fused snapshots in the current history
    pub action_timing: Option<ActionTiming>,
}

impl SchedulerStats {
    /// Share of received frames that were skipped as unchanged
    pub fn skip_rate(&self) -> f64 {
        let seen = self.frames_processed + self.frames_skipped;
        if seen == 0 {
            0.0
        } else {
            self.frames_skipped as f64 / seen as f64
        }
    }
}
