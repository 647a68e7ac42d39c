//! Simulated shopping rounds.
//!
//! The real game reports points from supermarket mayhem; this client
//! rolls random events per category so a handful of them can exercise a
//! server end to end.

use rand::Rng;
use shared::score::{
    DescriptivePoint, CATEGORY_CART_SLAM, CATEGORY_CHECKOUT, CATEGORY_ENEMY_HIT,
    CATEGORY_FIRST_TO_CHECKOUT, CATEGORY_ITEM_GRABBED, CATEGORY_SHELF_SWEEP,
};

/// Point value of a single event in each category.
const EVENT_VALUES: [(u32, i64); 6] = [
    (CATEGORY_ENEMY_HIT, 2),
    (CATEGORY_CHECKOUT, 3),
    (CATEGORY_ITEM_GRABBED, 1),
    (CATEGORY_CART_SLAM, 2),
    (CATEGORY_SHELF_SWEEP, 4),
    (CATEGORY_FIRST_TO_CHECKOUT, 5),
];

/// Outcome of one simulated round, ready to report to the server.
pub struct RoundReport {
    pub points: i64,
    pub entries: Vec<DescriptivePoint>,
}

/// Rolls a random set of scoring events for one round.
///
/// At most one participant per round can be first to checkout, so that
/// category fires rarely; the rest roll 0-2 events each.
pub fn simulate_round<R: Rng>(rng: &mut R) -> RoundReport {
    let mut entries = Vec::new();
    for (category_id, value) in EVENT_VALUES {
        let events = if category_id == CATEGORY_FIRST_TO_CHECKOUT {
            u32::from(rng.gen_bool(0.25))
        } else {
            rng.gen_range(0..3)
        };
        for _ in 0..events {
            entries.push(DescriptivePoint::new(category_id, value));
        }
    }
    let points = entries.iter().map(|point| point.amount).sum();
    RoundReport { points, entries }
}
