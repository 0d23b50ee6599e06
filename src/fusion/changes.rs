//! Significant-change detection between fused snapshots

use crate::core::{AnalysisHistory, AnalysisSnapshot, Change, ChangeKind, ChangeSet};

/// Absorbs float noise so a decimal delta of exactly the threshold does not fire
const DELTA_EPSILON: f64 = 1e-9;

/// Diffs two fused snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDetector {
    pot_delta: f64,
    stack_delta: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(0.1, 0.1)
    }
}

impl ChangeDetector {
    pub fn new(pot_delta: f64, stack_delta: f64) -> Self {
        Self {
            pot_delta,
            stack_delta,
        }
    }

    /// Compare the two newest snapshots of `history`; empty with fewer than two
    pub fn detect_latest(&self, history: &AnalysisHistory) -> ChangeSet {
        match (history.previous(), history.latest()) {
            (Some(prev), Some(curr)) => self.detect_changes(prev, curr),
            _ => ChangeSet::new(),
        }
    }

    /// Every change kind, fired or not. Confidences come from `curr`.
    pub fn detect_changes(&self, prev: &AnalysisSnapshot, curr: &AnalysisSnapshot) -> ChangeSet {
        let mut changes = ChangeSet::new();

        let cards_changed = prev.hole_cards.value.len() != curr.hole_cards.value.len()
            || prev.community_cards.value.len() != curr.community_cards.value.len();
        changes.set(
            ChangeKind::NewCards,
            fired_if(
                cards_changed,
                curr.hole_cards.confidence.min(curr.community_cards.confidence),
            ),
        );

        changes.set(
            ChangeKind::PotChanged,
            fired_if(
                exceeds(prev.pot.value, curr.pot.value, self.pot_delta),
                curr.pot.confidence,
            ),
        );
        changes.set(
            ChangeKind::StackChanged,
            fired_if(
                exceeds(prev.stack.value, curr.stack.value, self.stack_delta),
                curr.stack.confidence,
            ),
        );

        changes.set(
            ChangeKind::PositionChanged,
            fired_if(prev.position.value != curr.position.value, curr.position.confidence),
        );

        let before = prev.actions.active_labels();
        let after = curr.actions.active_labels();
        let action_confidence = before
            .symmetric_difference(&after)
            .filter_map(|label| curr.actions.get(label).map(|e| e.confidence))
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))))
            .unwrap_or(0.0);
        changes.set(ChangeKind::NewAction, fired_if(before != after, action_confidence));

        changes
    }
}

fn exceeds(prev: f64, curr: f64, delta: f64) -> bool {
    (curr - prev).abs() > delta + DELTA_EPSILON
}

fn fired_if(detected: bool, confidence: f64) -> Change {
    Change {
        detected,
        confidence: if detected { confidence } else { 0.0 },
    }
}
