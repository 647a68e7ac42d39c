//! Score data model shared between the authoritative server and clients.
//!
//! `DescriptivePoint` is one scoring event attributed to a category.
//! `ScoreSnapshot` is the immutable wire representation of the full ledger
//! at one instant; it is produced on the server, replicated to every
//! participant, and consumed by the reveal sequence. Snapshots are never
//! patched incrementally, the next round's snapshot supersedes the previous
//! one wholesale.

use serde::{Deserialize, Serialize};

pub const CATEGORY_ENEMY_HIT: u32 = 0;
pub const CATEGORY_CHECKOUT: u32 = 1;
pub const CATEGORY_ITEM_GRABBED: u32 = 2;
pub const CATEGORY_CART_SLAM: u32 = 3;
pub const CATEGORY_SHELF_SWEEP: u32 = 4;
pub const CATEGORY_FIRST_TO_CHECKOUT: u32 = 5;

/// Display metadata for one scoring category. Read-only registry data,
/// consumed by the reveal drivers when spawning point markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: &'static str,
    pub color: &'static str,
}

/// Every category the game can score, in reveal order. The reveal sequence
/// iterates this table rather than the snapshot contents so that all
/// participants walk categories in the same order regardless of which
/// categories actually scored.
pub const CATEGORIES: [Category; 6] = [
    Category {
        id: CATEGORY_ENEMY_HIT,
        name: "Enemy hit",
        color: "red",
    },
    Category {
        id: CATEGORY_CHECKOUT,
        name: "Checkout",
        color: "green",
    },
    Category {
        id: CATEGORY_ITEM_GRABBED,
        name: "Item grabbed",
        color: "blue",
    },
    Category {
        id: CATEGORY_CART_SLAM,
        name: "Cart slam",
        color: "orange",
    },
    Category {
        id: CATEGORY_SHELF_SWEEP,
        name: "Shelf sweep",
        color: "purple",
    },
    Category {
        id: CATEGORY_FIRST_TO_CHECKOUT,
        name: "First to checkout",
        color: "yellow",
    },
];

pub fn category_by_id(id: u32) -> Option<&'static Category> {
    CATEGORIES.iter().find(|category| category.id == id)
}

/// One scoring event: `amount` points attributed to `category_id`.
/// Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DescriptivePoint {
    pub category_id: u32,
    pub amount: i64,
}

impl DescriptivePoint {
    pub fn new(category_id: u32, amount: i64) -> Self {
        Self {
            category_id,
            amount,
        }
    }
}

/// One participant's row in a snapshot: committed total plus the two
/// category logs as they stood when the snapshot was taken.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub participant_id: u64,
    pub total_points: i64,
    pub round_log: Vec<DescriptivePoint>,
    pub all_time_log: Vec<DescriptivePoint>,
}

impl SnapshotEntry {
    /// Sum of this round's pending deltas.
    pub fn round_points(&self) -> i64 {
        self.round_log.iter().map(|point| point.amount).sum()
    }
}

/// Point-in-time copy of every score record, ordered by ascending
/// participant id. A participant's index in `entries` doubles as its
/// visual slot, so the ordering must be identical on every participant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct ScoreSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl ScoreSnapshot {
    pub fn new(mut entries: Vec<SnapshotEntry>) -> Self {
        entries.sort_by_key(|entry| entry.participant_id);
        Self { entries }
    }

    /// Visual slot assigned to a participant, i.e. its index in the
    /// id-ordered entry list.
    pub fn slot_of(&self, participant_id: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.participant_id == participant_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(participant_id: u64, round_log: Vec<DescriptivePoint>) -> SnapshotEntry {
        SnapshotEntry {
            participant_id,
            total_points: 0,
            round_log,
            all_time_log: Vec::new(),
        }
    }

    #[test]
    fn test_category_registry_lookup() {
        let checkout = category_by_id(CATEGORY_CHECKOUT).unwrap();
        assert_eq!(checkout.name, "Checkout");
        assert_eq!(checkout.color, "green");

        assert!(category_by_id(99).is_none());
    }

    #[test]
    fn test_categories_ordered_by_id() {
        for window in CATEGORIES.windows(2) {
            assert!(window[0].id < window[1].id);
        }
    }

    #[test]
    fn test_round_points_sums_log() {
        let entry = entry(
            1,
            vec![
                DescriptivePoint::new(CATEGORY_ENEMY_HIT, 2),
                DescriptivePoint::new(CATEGORY_CHECKOUT, 3),
            ],
        );
        assert_eq!(entry.round_points(), 5);
    }

    #[test]
    fn test_snapshot_orders_entries_by_participant() {
        let snapshot = ScoreSnapshot::new(vec![
            entry(7, Vec::new()),
            entry(2, Vec::new()),
            entry(5, Vec::new()),
        ]);

        let ids: Vec<u64> = snapshot
            .entries
            .iter()
            .map(|entry| entry.participant_id)
            .collect();
        assert_eq!(ids, vec![2, 5, 7]);

        assert_eq!(snapshot.slot_of(5), Some(1));
        assert_eq!(snapshot.slot_of(9), None);
    }

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let snapshot = ScoreSnapshot::new(vec![entry(
            3,
            vec![DescriptivePoint::new(CATEGORY_FIRST_TO_CHECKOUT, 5)],
        )]);

        let serialized = bincode::serialize(&snapshot).unwrap();
        let deserialized: ScoreSnapshot = bincode::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, snapshot);
    }
}
