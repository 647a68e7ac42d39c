//! # Score Server Library
//!
//! Authoritative server for the Cart Chaos score flow. The server is the
//! single place score state is ever mutated: it owns the match ledger,
//! collects round reports from every connected participant, replicates an
//! immutable snapshot back to everyone, runs the same paced reveal the
//! clients run, and gates the next round on the readiness handshake.
//!
//! ## Module Organization
//!
//! ### Ledger Module (`ledger`)
//! The authoritative score store: per-participant records, round folds,
//! losing streaks, the winner query and its deterministic tie-break.
//!
//! ### Session Module (`session`)
//! Participant roster and per-round bookkeeping: connection lifecycle,
//! timeout cleanup, report tracking and the idempotent readiness count.
//!
//! ### Network Module (`network`)
//! UDP protocol handling and the round flow phase machine that ties the
//! ledger, the sessions and the reveal sequence together.
//!
//! ## Architecture Design
//!
//! The server uses a single-threaded, event-driven core: helper tasks feed
//! packets and timeout events into one select loop that owns the ledger,
//! so all score mutation happens on a single logical thread and the ledger
//! needs no locking. Clients never hold score authority; they receive
//! snapshots and acknowledge reveals.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::ScoreServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 30 points to win, comeback after 3 losing rounds, 4 participants
//!     let mut server = ScoreServer::new("127.0.0.1:8080", 30, 3, 4).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ledger;
pub mod network;
pub mod session;
