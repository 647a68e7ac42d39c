//! # Score Client Library
//!
//! This library provides the client-side implementation for the authoritative
//! scorekeeping service. It simulates shopping rounds, reports the resulting
//! scores to the server, and plays back the paced score reveal from the
//! replicated snapshot.
//!
//! ## Architecture Overview
//!
//! The client never computes standings itself. It holds a read-only replica of
//! the server's score snapshot and reacts to it: every replicated update drives
//! one local reveal sequence, after which the client tells the server it is
//! ready for the next round.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - UDP socket management and connection handling
//! - Packet serialization and deserialization
//! - The round loop: shop, report, reveal, ready
//!
//! ### Shopper Module (`shopper`)
//! Rolls random scoring events per category to stand in for real gameplay.
//!
//! ### Markers Module (`markers`)
//! Writes the point markers spawned during a reveal to the log.

pub mod markers;
pub mod network;
pub mod shopper;
