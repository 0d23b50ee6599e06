//! Change sets and the callbacks that receive them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::snapshot::{AnalysisSnapshot, CaptureRecord};

/// Kinds of material change between two fused snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewCards,
    PotChanged,
    StackChanged,
    PositionChanged,
    NewAction,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::NewCards,
        ChangeKind::PotChanged,
        ChangeKind::StackChanged,
        ChangeKind::PositionChanged,
        ChangeKind::NewAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::NewCards => "new_cards",
            ChangeKind::PotChanged => "pot_changed",
            ChangeKind::StackChanged => "stack_changed",
            ChangeKind::PositionChanged => "position_changed",
            ChangeKind::NewAction => "new_action",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a change fired, and how far to trust it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Change {
    pub detected: bool,
    pub confidence: f64,
}

/// Result of diffing two snapshots. Empty when there was nothing to compare.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet(BTreeMap<ChangeKind, Change>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: ChangeKind, change: Change) {
        self.0.insert(kind, change);
    }

    pub fn get(&self, kind: ChangeKind) -> Option<&Change> {
        self.0.get(&kind)
    }

    /// Whether `kind` fired
    pub fn detected(&self, kind: ChangeKind) -> bool {
        self.0.get(&kind).map(|c| c.detected).unwrap_or(false)
    }

    /// Whether any kind fired
    pub fn any_detected(&self) -> bool {
        self.0.values().any(|c| c.detected)
    }

    /// Kinds that fired, in declaration order
    pub fn detected_kinds(&self) -> Vec<ChangeKind> {
        self.0
            .iter()
            .filter(|(_, c)| c.detected)
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChangeKind, &Change)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Invoked once per processed frame with the fused snapshot and its change set
pub type SnapshotCallback = Arc<dyn Fn(&AnalysisSnapshot, &ChangeSet) + Send + Sync>;

/// Receives a record for every frame whose change set has a detected change
pub type RecordSink = Arc<dyn Fn(&CaptureRecord) + Send + Sync>;
