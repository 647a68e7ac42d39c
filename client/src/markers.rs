//! Point marker presentation for the reveal sequence.
//!
//! Rendering is out of scope for this client, so the marker sink writes
//! the markers the reveal would spawn to the log, using the shared
//! category registry for names and colors.

use log::info;
use shared::score::category_by_id;
use shared::MarkerSink;

pub struct ConsoleMarkerSink;

impl MarkerSink for ConsoleMarkerSink {
    fn spawn_marker(&mut self, slot: usize, category_id: u32, amount: i64) {
        match category_by_id(category_id) {
            Some(category) => info!(
                "Slot {}: +{} {} [{}]",
                slot, amount, category.name, category.color
            ),
            None => info!("Slot {}: +{} (unknown category {})", slot, amount, category_id),
        }
    }
}
