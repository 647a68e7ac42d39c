//! Authoritative score ledger for the running match.
//!
//! Exactly one ledger exists per match and it lives on the server. It owns
//! every score record for the lifetime of the match and is the only place
//! score state is ever mutated. Mutators are gated on the authority flag
//! and silently ignore unknown participant ids, so a stale or late remote
//! call can never crash the match.
//!
//! Replication happens through immutable [`ScoreSnapshot`]s produced by
//! [`ScoreLedger::snapshot`]; the ledger itself never leaves the server.

use log::{debug, info};
use shared::score::{
    CATEGORY_CHECKOUT, CATEGORY_ENEMY_HIT, CATEGORY_FIRST_TO_CHECKOUT,
};
use shared::{DescriptivePoint, ScoreSnapshot, SnapshotEntry};
use std::collections::HashMap;

/// Per-participant score state for the whole match.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub participant_id: u64,
    /// Committed total; only grows, and only at round-close fold.
    pub total_points: i64,
    /// Points reported for the current round, not yet folded.
    pub pending_round_points: i64,
    /// Append-only log of every folded scoring event; feeds the tie-break.
    pub all_time_log: Vec<DescriptivePoint>,
    /// This round's scoring events; replaced wholesale by the next report.
    pub pending_round_log: Vec<DescriptivePoint>,
    pub consecutive_losses: u32,
}

impl ScoreRecord {
    fn new(participant_id: u64) -> Self {
        Self {
            participant_id,
            total_points: 0,
            pending_round_points: 0,
            all_time_log: Vec::new(),
            pending_round_log: Vec::new(),
            consecutive_losses: 0,
        }
    }

    /// Number of all-time scoring events in the given category.
    pub fn category_count(&self, category_id: u32) -> usize {
        self.all_time_log
            .iter()
            .filter(|point| point.category_id == category_id)
            .count()
    }
}

/// Deterministic total order over equal-total records. Compares all-time
/// event counts: first-to-checkout, then checkout, then enemy hit; on a
/// full tie the first operand wins. The first-operand preference is policy,
/// callers pass operands in ascending participant-id order.
pub fn tiebreak<'a>(a: &'a ScoreRecord, b: &'a ScoreRecord) -> &'a ScoreRecord {
    const TIEBREAK_CATEGORIES: [u32; 3] = [
        CATEGORY_FIRST_TO_CHECKOUT,
        CATEGORY_CHECKOUT,
        CATEGORY_ENEMY_HIT,
    ];

    for category_id in TIEBREAK_CATEGORIES {
        let count_a = a.category_count(category_id);
        let count_b = b.category_count(category_id);
        if count_a > count_b {
            return a;
        }
        if count_a < count_b {
            return b;
        }
    }

    a
}

/// Authoritative participant -> score record store.
pub struct ScoreLedger {
    records: HashMap<u64, ScoreRecord>,
    authoritative: bool,
}

impl ScoreLedger {
    /// Ledger for the single authoritative process of the match.
    pub fn authoritative() -> Self {
        Self {
            records: HashMap::new(),
            authoritative: true,
        }
    }

    /// Inert ledger: every mutator is a no-op. Constructed anywhere the
    /// score flow runs without authority.
    pub fn non_authoritative() -> Self {
        Self {
            records: HashMap::new(),
            authoritative: false,
        }
    }

    /// Creates a zeroed record for the participant. Idempotent.
    pub fn register_participant(&mut self, participant_id: u64) {
        if !self.authoritative {
            return;
        }
        if !self.records.contains_key(&participant_id) {
            info!("Registered participant {} in score ledger", participant_id);
            self.records
                .insert(participant_id, ScoreRecord::new(participant_id));
        }
    }

    /// Drops the participant's record. Idempotent.
    pub fn remove_participant(&mut self, participant_id: u64) {
        if !self.authoritative {
            return;
        }
        if self.records.remove(&participant_id).is_some() {
            info!("Removed participant {} from score ledger", participant_id);
        }
    }

    /// Stores the participant's round result. Last write wins within a
    /// round; callers report once per round per participant.
    pub fn record_points(
        &mut self,
        participant_id: u64,
        points: i64,
        entries: Vec<DescriptivePoint>,
    ) {
        if !self.authoritative {
            return;
        }
        if let Some(record) = self.records.get_mut(&participant_id) {
            record.pending_round_points = points;
            record.pending_round_log = entries;
            debug!(
                "Recorded {} round points for participant {}",
                points, participant_id
            );
        }
    }

    /// Appends one revealed event to the participant's all-time log.
    pub fn append_to_all_time_log(&mut self, participant_id: u64, point: DescriptivePoint) {
        if !self.authoritative {
            return;
        }
        if let Some(record) = self.records.get_mut(&participant_id) {
            record.all_time_log.push(point);
        }
    }

    /// Commits every pending round result into the running totals and
    /// clears the pending state. Called exactly once per round, after all
    /// reveal processing of that round's deltas.
    pub fn fold_pending_into_total(&mut self) {
        if !self.authoritative {
            return;
        }
        for record in self.records.values_mut() {
            record.total_points += record.pending_round_points;
            record.pending_round_points = 0;
            record.pending_round_log.clear();
        }
    }

    pub fn increment_loss_counter(&mut self, participant_id: u64) {
        if !self.authoritative {
            return;
        }
        if let Some(record) = self.records.get_mut(&participant_id) {
            record.consecutive_losses += 1;
        }
    }

    pub fn reset_loss_counter(&mut self, participant_id: u64) {
        if !self.authoritative {
            return;
        }
        if let Some(record) = self.records.get_mut(&participant_id) {
            record.consecutive_losses = 0;
        }
    }

    pub fn loss_threshold_reached(&self, participant_id: u64, threshold: u32) -> bool {
        self.records
            .get(&participant_id)
            .map(|record| record.consecutive_losses >= threshold)
            .unwrap_or(false)
    }

    /// Immutable point-in-time copy of the whole ledger, entries ordered by
    /// participant id.
    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot::new(
            self.records
                .values()
                .map(|record| SnapshotEntry {
                    participant_id: record.participant_id,
                    total_points: record.total_points,
                    round_log: record.pending_round_log.clone(),
                    all_time_log: record.all_time_log.clone(),
                })
                .collect(),
        )
    }

    pub fn has_winner(&self, target_score: i64) -> bool {
        self.records
            .values()
            .any(|record| record.total_points >= target_score)
    }

    /// Participant with the maximum committed total among those at or above
    /// the target, ties resolved by [`tiebreak`]. `None` when nobody
    /// qualifies; callers must handle the sentinel rather than assume a
    /// winner exists.
    pub fn resolve_winner(&self, target_score: i64) -> Option<u64> {
        let mut qualifying: Vec<&ScoreRecord> = self
            .records
            .values()
            .filter(|record| record.total_points >= target_score)
            .collect();
        qualifying.sort_by_key(|record| record.participant_id);

        let mut winner: Option<&ScoreRecord> = None;
        for record in qualifying {
            winner = Some(match winner {
                None => record,
                Some(best) if record.total_points > best.total_points => record,
                Some(best) if record.total_points == best.total_points => tiebreak(best, record),
                Some(best) => best,
            });
        }

        winner.map(|record| record.participant_id)
    }

    /// Participant with the highest pending round result, lowest id on a
    /// tie. `None` on an empty ledger.
    pub fn round_top_scorer(&self) -> Option<u64> {
        let mut ids: Vec<u64> = self.records.keys().copied().collect();
        ids.sort_unstable();

        let mut top: Option<&ScoreRecord> = None;
        for id in ids {
            if let Some(record) = self.records.get(&id) {
                match top {
                    Some(best) if record.pending_round_points <= best.pending_round_points => {}
                    _ => top = Some(record),
                }
            }
        }

        top.map(|record| record.participant_id)
    }

    pub fn participant_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn record(&self, participant_id: u64) -> Option<&ScoreRecord> {
        self.records.get(&participant_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
