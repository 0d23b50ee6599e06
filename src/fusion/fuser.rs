//! Temporal error correction across frames

use std::collections::BTreeMap;

use crate::core::{ActionReading, AnalysisHistory, AnalysisSnapshot, Card, FieldReading};

/// Hole-card counts a fused snapshot may carry
const VALID_HOLE_COUNTS: [usize; 2] = [0, 2];
/// Board sizes: preflop, flop, turn, river
const VALID_BOARD_COUNTS: [usize; 4] = [0, 3, 4, 5];

/// Minimum confidences for accepting a new reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionThresholds {
    /// Position, pot, stack, other stacks and actions
    pub scalar: f64,
    /// Card lists
    pub cards: f64,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            scalar: 0.5,
            cards: 0.3,
        }
    }
}

/// Merges each new snapshot with the last fused one and keeps the history
#[derive(Debug, Clone)]
pub struct TemporalFuser {
    thresholds: FusionThresholds,
    history: AnalysisHistory,
}

impl TemporalFuser {
    pub fn new(thresholds: FusionThresholds, history_size: usize) -> Self {
        Self {
            thresholds,
            history: AnalysisHistory::new(history_size),
        }
    }

    /// Fuse `snapshot` against the latest fused snapshot and record the result
    pub fn fuse(&mut self, snapshot: AnalysisSnapshot) -> AnalysisSnapshot {
        let fused = fuse_with(self.history.latest(), snapshot, &self.thresholds);
        self.history.push(fused.clone());
        fused
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    pub fn thresholds(&self) -> &FusionThresholds {
        &self.thresholds
    }

    /// Forget everything fused so far
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Fuse `new` against `prev` without touching any history.
///
/// Without a previous snapshot the new one passes through unchanged. Otherwise
/// each field below its threshold takes the previous value and confidence.
pub fn fuse_with(
    prev: Option<&AnalysisSnapshot>,
    new: AnalysisSnapshot,
    thresholds: &FusionThresholds,
) -> AnalysisSnapshot {
    let Some(prev) = prev else {
        return new;
    };

    AnalysisSnapshot {
        timestamp_ms: new.timestamp_ms,
        position: keep_trusted(new.position, &prev.position, thresholds.scalar),
        hole_cards: keep_trusted_cards(new.hole_cards, &prev.hole_cards, thresholds.cards, &VALID_HOLE_COUNTS),
        community_cards: keep_trusted_cards(
            new.community_cards,
            &prev.community_cards,
            thresholds.cards,
            &VALID_BOARD_COUNTS,
        ),
        pot: keep_trusted(new.pot, &prev.pot, thresholds.scalar),
        stack: keep_trusted(new.stack, &prev.stack, thresholds.scalar),
        actions: fuse_actions(new.actions, &prev.actions, thresholds.scalar),
        other_stacks: fuse_stacks(new.other_stacks, &prev.other_stacks, thresholds.scalar),
    }
}

fn keep_trusted<T: Clone>(new: FieldReading<T>, prev: &FieldReading<T>, threshold: f64) -> FieldReading<T> {
    if new.is_trusted(threshold) {
        new
    } else {
        prev.clone()
    }
}

/// Card lists of an impossible size count as untrusted
fn keep_trusted_cards(
    new: FieldReading<Vec<Card>>,
    prev: &FieldReading<Vec<Card>>,
    threshold: f64,
    valid_counts: &[usize],
) -> FieldReading<Vec<Card>> {
    if !valid_counts.contains(&new.value.len()) {
        return prev.clone();
    }
    keep_trusted(new, prev, threshold)
}

fn fuse_actions(new: ActionReading, prev: &ActionReading, threshold: f64) -> ActionReading {
    let mut fused = ActionReading::new();
    for (label, entry) in new.iter() {
        match prev.get(label) {
            Some(old) if entry.confidence < threshold => {
                fused.insert(*label, old.amount, old.confidence)
            }
            _ => fused.insert(*label, entry.amount, entry.confidence),
        }
    }
    fused
}

fn fuse_stacks(
    new: BTreeMap<String, FieldReading<f64>>,
    prev: &BTreeMap<String, FieldReading<f64>>,
    threshold: f64,
) -> BTreeMap<String, FieldReading<f64>> {
    new.into_iter()
        .map(|(seat, reading)| {
            let fused = match prev.get(&seat) {
                Some(old) => keep_trusted(reading, old, threshold),
                None => reading,
            };
            (seat, fused)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionLabel;

    fn snapshot(ts: u64, pot: f64, pot_conf: f64) -> AnalysisSnapshot {
        let mut s = AnalysisSnapshot::empty(ts);
        s.pot = FieldReading::new(pot, pot_conf);
        s
    }

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn test_first_frame_passes_through() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        let mut s = snapshot(1, 12.0, 0.01);
        s.community_cards = FieldReading::new(cards(&["Ah", "Kd"]), 0.05);
        let fused = fuser.fuse(s.clone());
        assert_eq!(fused, s);
        assert_eq!(fuser.history().len(), 1);
    }

    #[test]
    fn test_low_confidence_keeps_previous() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        fuser.fuse(snapshot(1, 50.857, 0.7));
        let fused = fuser.fuse(snapshot(2, 0.0, 0.2));
        assert_eq!(fused.pot.value, 50.857);
        assert_eq!(fused.pot.confidence, 0.7);
        assert_eq!(fused.timestamp_ms, 2);

        // Exactly at the threshold is trusted
        let fused = fuser.fuse(snapshot(3, 60.0, 0.5));
        assert_eq!(fused.pot.value, 60.0);
        assert_eq!(fused.pot.confidence, 0.5);
    }

    #[test]
    fn test_cards_use_lower_threshold() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        let mut first = snapshot(1, 0.0, 0.0);
        first.hole_cards = FieldReading::new(cards(&["Ah", "Kd"]), 0.9);
        fuser.fuse(first);

        let mut second = snapshot(2, 0.0, 0.0);
        second.hole_cards = FieldReading::new(cards(&["Qs", "Qh"]), 0.35);
        assert_eq!(fuser.fuse(second).hole_cards.value, cards(&["Qs", "Qh"]));
    }

    #[test]
    fn test_impossible_board_rejected() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        let mut first = snapshot(1, 0.0, 0.0);
        first.community_cards = FieldReading::new(cards(&["2c", "3d", "4h"]), 0.8);
        fuser.fuse(first);

        let mut second = snapshot(2, 0.0, 0.0);
        second.community_cards = FieldReading::new(cards(&["2c", "3d"]), 0.95);
        let fused = fuser.fuse(second);
        assert_eq!(fused.community_cards.value.len(), 3);
    }

    #[test]
    fn test_actions_and_stacks_fused_per_label() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        let mut first = snapshot(1, 0.0, 0.0);
        first.actions.insert(ActionLabel::Call, 20.0, 0.9);
        first.other_stacks.insert("BTN".to_string(), FieldReading::new(500.0, 0.8));
        fuser.fuse(first);

        let mut second = snapshot(2, 0.0, 0.0);
        second.actions.insert(ActionLabel::Call, 0.0, 0.1);
        second.actions.insert(ActionLabel::Raise, 60.0, 0.9);
        second.other_stacks.insert("BTN".to_string(), FieldReading::new(5.0, 0.1));
        second.other_stacks.insert("SB".to_string(), FieldReading::new(300.0, 0.1));
        let fused = fuser.fuse(second);

        assert_eq!(fused.actions[&ActionLabel::Call].amount, 20.0);
        assert_eq!(fused.actions[&ActionLabel::Raise].amount, 60.0);
        assert_eq!(fused.other_stacks["BTN"].value, 500.0);
        assert_eq!(fused.other_stacks["SB"].value, 300.0);
    }

    #[test]
    fn test_monotonic_trust_over_sequence() {
        let readings = [(10.0, 0.9), (3.0, 0.1), (4.0, 0.49), (20.0, 0.5), (1.0, 0.0)];
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        let mut last = None;
        for (i, (pot, conf)) in readings.iter().enumerate() {
            let fused = fuser.fuse(snapshot(i as u64, *pot, *conf));
            if let Some(prev) = last {
                if *conf < 0.5 {
                    assert_eq!(fused.pot.value, prev);
                }
            }
            last = Some(fused.pot.value);
        }
        assert_eq!(last, Some(20.0));
    }

    #[test]
    fn test_history_bounded() {
        let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
        for ts in 0..15 {
            fuser.fuse(snapshot(ts, ts as f64, 0.9));
        }
        assert_eq!(fuser.history().len(), 10);
        assert_eq!(fuser.history().iter().next().unwrap().timestamp_ms, 5);

        fuser.reset();
        assert!(fuser.history().is_empty());
    }
}
