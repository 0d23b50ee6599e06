//! Analysis snapshots and their bounded history

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use super::reading::{ActionLabel, ActionReading, Card, FieldReading};

/// Label used when no position could be read
pub const UNKNOWN_POSITION: &str = "Unknown";

/// Milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Every field read from one frame, each with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    /// Capture time of the frame, ms since the Unix epoch
    pub timestamp_ms: u64,
    pub position: FieldReading<String>,
    pub hole_cards: FieldReading<Vec<Card>>,
    pub community_cards: FieldReading<Vec<Card>>,
    pub pot: FieldReading<f64>,
    pub stack: FieldReading<f64>,
    pub actions: ActionReading,
    /// Per-seat stacks keyed by seat label (`BTN`, `SB`, ...)
    pub other_stacks: BTreeMap<String, FieldReading<f64>>,
}

impl AnalysisSnapshot {
    /// A snapshot where nothing was recognised
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            position: FieldReading::new(UNKNOWN_POSITION.to_string(), 0.0),
            hole_cards: FieldReading::unknown(),
            community_cards: FieldReading::unknown(),
            pot: FieldReading::unknown(),
            stack: FieldReading::unknown(),
            actions: ActionReading::empty_with_confidence(0.0),
            other_stacks: BTreeMap::new(),
        }
    }
}

/// Timing between consecutive snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionTiming {
    pub average_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Bounded FIFO of fused snapshots, oldest evicted first
#[derive(Debug, Clone)]
pub struct AnalysisHistory {
    entries: VecDeque<AnalysisSnapshot>,
    capacity: usize,
}

impl AnalysisHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest past capacity
    pub fn push(&mut self, snapshot: AnalysisSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&AnalysisSnapshot> {
        self.entries.back()
    }

    /// The snapshot before the latest one
    pub fn previous(&self) -> Option<&AnalysisSnapshot> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        self.entries.get(len - 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisSnapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Average/min/max gap between consecutive snapshots
    pub fn action_timing(&self) -> Option<ActionTiming> {
        if self.entries.len() < 2 {
            return None;
        }
        let gaps: Vec<u64> = self
            .entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .map(|(a, b)| b.timestamp_ms.saturating_sub(a.timestamp_ms))
            .collect();
        let sum: u64 = gaps.iter().sum();
        Some(ActionTiming {
            average_ms: sum as f64 / gaps.len() as f64,
            min_ms: gaps.iter().copied().min().unwrap_or(0),
            max_ms: gaps.iter().copied().max().unwrap_or(0),
        })
    }
}

/// One action taken, as stored by persistence collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub action: ActionLabel,
    pub amount: f64,
}

/// Flat view of a fused snapshot handed to persistence sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub timestamp_ms: u64,
    pub position: String,
    pub pot_size: f64,
    pub stack_size: f64,
    pub hole_cards: Vec<Card>,
    pub community_cards: Vec<Card>,
    pub actions: Vec<RecordedAction>,
    /// Confidence of the position reading
    pub confidence: f64,
}

impl CaptureRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&AnalysisSnapshot> for CaptureRecord {
    fn from(snapshot: &AnalysisSnapshot) -> Self {
        Self {
            timestamp_ms: snapshot.timestamp_ms,
            position: snapshot.position.value.clone(),
            pot_size: snapshot.pot.value,
            stack_size: snapshot.stack.value,
            hole_cards: snapshot.hole_cards.value.clone(),
            community_cards: snapshot.community_cards.value.clone(),
            actions: snapshot
                .actions
                .iter()
                .filter(|(_, entry)| entry.amount > 0.0)
                .map(|(label, entry)| RecordedAction {
                    action: *label,
                    amount: entry.amount,
                })
                .collect(),
            confidence: snapshot.position.confidence,
        }
    }
}
