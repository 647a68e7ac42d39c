//! Deterministic reveal sequencing for end-of-round score presentation.
//!
//! The coordinator walks a replicated [`ScoreSnapshot`] and yields the exact
//! sequence of marker spawns, pacing delays and lifecycle steps that every
//! participant must execute. The walk is a pure function of the snapshot:
//! categories are visited in registry order (not snapshot order), and within
//! a category participants are visited in snapshot (slot) order, so two
//! participants that received the same snapshot produce identical step
//! sequences even though the snapshot reached them at different times.
//!
//! The coordinator itself never sleeps and never touches the ledger. Drivers
//! consume the steps: they sleep on [`RevealStep::Pause`], forward
//! [`RevealStep::Marker`] to their visualization sink (and, on the
//! authoritative side only, into the all-time log), fold pending points on
//! [`RevealStep::Fold`], and hand off to the readiness handshake on
//! [`RevealStep::AwaitReady`].

use std::collections::VecDeque;
use std::time::Duration;

use crate::score::{ScoreSnapshot, CATEGORIES};

/// Delay before the first marker of a category that scored.
pub const CATEGORY_LEAD_DELAY: Duration = Duration::from_millis(300);
/// Delay after the last marker of a category that scored.
pub const CATEGORY_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Visualization collaborator invoked locally for each revealed delta.
/// Fire-and-forget; the core never reads anything back from it.
pub trait MarkerSink {
    fn spawn_marker(&mut self, slot: usize, category_id: u32, amount: i64);
}

/// One step of the reveal sequence. `Pause` steps are the only suspension
/// points; everything between two pauses executes back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    Pause(Duration),
    Marker {
        slot: usize,
        participant_id: u64,
        category_id: u32,
        amount: i64,
    },
    /// Reveal processing is complete; the authoritative driver commits
    /// pending round points into the running totals here.
    Fold,
    /// Terminal step: wait for every participant's ready signal.
    AwaitReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Revealing,
    Folded,
    Done,
}

/// State machine over one snapshot. Create it when the snapshot-changed
/// notification fires, then drain it with [`RevealCoordinator::next_step`].
#[derive(Debug)]
pub struct RevealCoordinator {
    snapshot: ScoreSnapshot,
    next_category: usize,
    queued: VecDeque<RevealStep>,
    phase: Phase,
}

impl RevealCoordinator {
    pub fn new(snapshot: ScoreSnapshot) -> Self {
        Self {
            snapshot,
            next_category: 0,
            queued: VecDeque::new(),
            phase: Phase::Revealing,
        }
    }

    /// Yields the next step, or `None` once the sequence is exhausted.
    pub fn next_step(&mut self) -> Option<RevealStep> {
        match self.phase {
            Phase::Revealing => {
                if let Some(step) = self.queued.pop_front() {
                    return Some(step);
                }

                while self.next_category < CATEGORIES.len() {
                    let category_id = CATEGORIES[self.next_category].id;
                    self.next_category += 1;

                    let markers = self.collect_markers(category_id);
                    if !markers.is_empty() {
                        self.queued.push_back(RevealStep::Pause(CATEGORY_LEAD_DELAY));
                        self.queued.extend(markers);
                        self.queued
                            .push_back(RevealStep::Pause(CATEGORY_SETTLE_DELAY));
                        return self.queued.pop_front();
                    }
                }

                self.phase = Phase::Folded;
                Some(RevealStep::Fold)
            }
            Phase::Folded => {
                self.phase = Phase::Done;
                Some(RevealStep::AwaitReady)
            }
            Phase::Done => None,
        }
    }

    /// Markers for one category: participants in slot order, each
    /// participant's entries in log order.
    fn collect_markers(&self, category_id: u32) -> Vec<RevealStep> {
        let mut markers = Vec::new();
        for (slot, entry) in self.snapshot.entries.iter().enumerate() {
            for point in &entry.round_log {
                if point.category_id == category_id {
                    markers.push(RevealStep::Marker {
                        slot,
                        participant_id: entry.participant_id,
                        category_id,
                        amount: point.amount,
                    });
                }
            }
        }
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{
        DescriptivePoint, SnapshotEntry, CATEGORY_CHECKOUT, CATEGORY_ENEMY_HIT,
        CATEGORY_FIRST_TO_CHECKOUT,
    };

    fn snapshot_two_participants() -> ScoreSnapshot {
        ScoreSnapshot::new(vec![
            SnapshotEntry {
                participant_id: 2,
                total_points: 0,
                round_log: vec![
                    DescriptivePoint::new(CATEGORY_FIRST_TO_CHECKOUT, 5),
                    DescriptivePoint::new(CATEGORY_ENEMY_HIT, 2),
                ],
                all_time_log: Vec::new(),
            },
            SnapshotEntry {
                participant_id: 1,
                total_points: 0,
                round_log: vec![DescriptivePoint::new(CATEGORY_CHECKOUT, 3)],
                all_time_log: Vec::new(),
            },
        ])
    }

    fn drain(mut coordinator: RevealCoordinator) -> Vec<RevealStep> {
        let mut steps = Vec::new();
        while let Some(step) = coordinator.next_step() {
            steps.push(step);
        }
        steps
    }

    fn marker_categories(steps: &[RevealStep]) -> Vec<u32> {
        steps
            .iter()
            .filter_map(|step| match step {
                RevealStep::Marker { category_id, .. } => Some(*category_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_markers_grouped_by_ascending_category() {
        let steps = drain(RevealCoordinator::new(snapshot_two_participants()));
        assert_eq!(
            marker_categories(&steps),
            vec![CATEGORY_ENEMY_HIT, CATEGORY_CHECKOUT, CATEGORY_FIRST_TO_CHECKOUT]
        );
    }

    #[test]
    fn test_slot_follows_snapshot_order() {
        let steps = drain(RevealCoordinator::new(snapshot_two_participants()));

        // Participant 1 sorts into slot 0, participant 2 into slot 1.
        for step in &steps {
            if let RevealStep::Marker {
                slot,
                participant_id,
                ..
            } = step
            {
                match participant_id {
                    1 => assert_eq!(*slot, 0),
                    2 => assert_eq!(*slot, 1),
                    _ => panic!("unexpected participant"),
                }
            }
        }
    }

    #[test]
    fn test_unscored_categories_add_no_pauses() {
        let steps = drain(RevealCoordinator::new(snapshot_two_participants()));

        // Three scored categories, two pauses each.
        let pauses = steps
            .iter()
            .filter(|step| matches!(step, RevealStep::Pause(_)))
            .count();
        assert_eq!(pauses, 6);
    }

    #[test]
    fn test_scored_category_framed_by_lead_and_settle() {
        let steps = drain(RevealCoordinator::new(snapshot_two_participants()));

        assert_eq!(steps[0], RevealStep::Pause(CATEGORY_LEAD_DELAY));
        assert!(matches!(steps[1], RevealStep::Marker { .. }));
        assert_eq!(steps[2], RevealStep::Pause(CATEGORY_SETTLE_DELAY));
    }

    #[test]
    fn test_sequence_ends_with_fold_then_await_ready() {
        let steps = drain(RevealCoordinator::new(snapshot_two_participants()));

        assert_eq!(steps[steps.len() - 2], RevealStep::Fold);
        assert_eq!(steps[steps.len() - 1], RevealStep::AwaitReady);
    }

    #[test]
    fn test_two_runs_over_same_snapshot_are_identical() {
        let first = drain(RevealCoordinator::new(snapshot_two_participants()));
        let second = drain(RevealCoordinator::new(snapshot_two_participants()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_snapshot_skips_straight_to_fold() {
        let steps = drain(RevealCoordinator::new(ScoreSnapshot::default()));
        assert_eq!(steps, vec![RevealStep::Fold, RevealStep::AwaitReady]);
    }
}
