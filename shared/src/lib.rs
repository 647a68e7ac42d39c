//! Types and logic shared by the Cart Chaos server and client.
//!
//! Both sides must agree byte for byte on the wire protocol and step for
//! step on the reveal sequence, so everything that has to behave
//! identically everywhere lives here: the packet definitions, the score
//! data model and category registry, the replicated snapshot cell, and the
//! deterministic reveal state machine.

pub mod cell;
pub mod protocol;
pub mod reveal;
pub mod score;

pub use cell::ReplicatedCell;
pub use protocol::Packet;
pub use reveal::{MarkerSink, RevealCoordinator, RevealStep};
pub use score::{Category, DescriptivePoint, ScoreSnapshot, SnapshotEntry, CATEGORIES};
