//! Participant connection management and round bookkeeping.
//!
//! This module handles the server-side roster of connected participants:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Per-round report and readiness flags for the round flow
//! - Connection health monitoring and automatic cleanup
//! - Capacity management and address tracking
//!
//! The session manager is what makes the readiness handshake safe: ready
//! signals are idempotent per round, and a participant that vanishes simply
//! stops being counted, so the round never blocks on a departed peer.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected participant and its per-round flags.
///
/// Each session tracks:
/// - Connection metadata (id, address, last activity)
/// - Whether the participant reported this round's score yet
/// - Whether the participant acknowledged this round's reveal
#[derive(Debug)]
pub struct Session {
    /// Unique participant identifier assigned by the server.
    pub participant_id: u64,
    /// Network address for sending responses.
    pub addr: SocketAddr,
    /// Last time we received any packet from this participant.
    pub last_seen: Instant,
    /// Round-score report received for the current round.
    pub reported: bool,
    /// Ready signal received for the current round.
    pub ready: bool,
}

impl Session {
    pub fn new(participant_id: u64, addr: SocketAddr) -> Self {
        Self {
            participant_id,
            addr,
            last_seen: Instant::now(),
            reported: false,
            ready: false,
        }
    }

    /// Marks the session as recently active.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if no packets arrived from this participant within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected participants and their round state.
///
/// Enforces the capacity limit, assigns monotonically increasing ids, and
/// answers the two aggregate questions the round flow asks: has everyone
/// reported, and is everyone ready. Both are computed over the *currently
/// connected* roster, which is exactly what gives disconnects their
/// compensating effect on the readiness count.
pub struct SessionManager {
    sessions: HashMap<u64, Session>,
    next_participant_id: u64,
    max_participants: usize,
}

impl SessionManager {
    /// Roster with the given capacity limit. Participant ids start from 1.
    pub fn new(max_participants: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_participant_id: 1,
            max_participants,
        }
    }

    /// Attempts to add a new participant connection.
    ///
    /// Returns `Some(participant_id)` on success, `None` at capacity.
    pub fn add_session(&mut self, addr: SocketAddr) -> Option<u64> {
        if self.sessions.len() >= self.max_participants {
            return None;
        }

        let participant_id = self.next_participant_id;
        self.next_participant_id += 1;

        info!("Participant {} connected from {}", participant_id, addr);
        self.sessions
            .insert(participant_id, Session::new(participant_id, addr));

        Some(participant_id)
    }

    /// Removes a participant. Returns true if they were present.
    pub fn remove_session(&mut self, participant_id: u64) -> bool {
        if let Some(session) = self.sessions.remove(&participant_id) {
            info!("Participant {} disconnected", session.participant_id);
            true
        } else {
            false
        }
    }

    /// Resolves a participant id from a network address.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u64> {
        self.sessions
            .iter()
            .find(|(_, session)| session.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn touch(&mut self, participant_id: u64) {
        if let Some(session) = self.sessions.get_mut(&participant_id) {
            session.touch();
        }
    }

    /// Flags the participant's round report as received. Returns false for
    /// unknown ids.
    pub fn mark_reported(&mut self, participant_id: u64) -> bool {
        if let Some(session) = self.sessions.get_mut(&participant_id) {
            session.touch();
            session.reported = true;
            true
        } else {
            false
        }
    }

    /// Flags the participant as ready for this round. Returns true only the
    /// first time within the round, so duplicate ready signals never
    /// double-count.
    pub fn mark_ready(&mut self, participant_id: u64) -> bool {
        if let Some(session) = self.sessions.get_mut(&participant_id) {
            session.touch();
            if session.ready {
                return false;
            }
            session.ready = true;
            true
        } else {
            false
        }
    }

    /// True when at least one participant is connected and every connected
    /// participant reported this round's score.
    pub fn all_reported(&self) -> bool {
        !self.sessions.is_empty() && self.sessions.values().all(|session| session.reported)
    }

    /// True when at least one participant is connected and every connected
    /// participant signaled readiness. Departed participants no longer
    /// appear in the roster, so they count as ready implicitly.
    pub fn all_ready(&self) -> bool {
        !self.sessions.is_empty() && self.sessions.values().all(|session| session.ready)
    }

    pub fn ready_count(&self) -> usize {
        self.sessions.values().filter(|session| session.ready).count()
    }

    /// Clears per-round flags at the start of a new round.
    pub fn begin_round(&mut self) {
        for session in self.sessions.values_mut() {
            session.reported = false;
            session.ready = false;
        }
    }

    /// Checks for and removes timed-out participants, returning their ids
    /// so other systems (ledger, round flow) can clean up after them.
    ///
    /// The window must cover a full quiet stretch of the round flow: a
    /// participant sends nothing between its round report and its ready
    /// signal, which spans the slowest peer's round plus the whole reveal.
    pub fn check_timeouts(&mut self) -> Vec<u64> {
        let timeout = Duration::from_secs(30);
        let timed_out: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for participant_id in &timed_out {
            self.remove_session(*participant_id);
        }

        timed_out
    }

    /// Drops every session, used at match teardown.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// All participant ids and their addresses, for broadcasting.
    pub fn session_addrs(&self) -> Vec<(u64, SocketAddr)> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn test_addr3() -> SocketAddr {
        "127.0.0.1:8082".parse().unwrap()
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(1, test_addr());
        assert_eq!(session.participant_id, 1);
        assert!(!session.reported);
        assert!(!session.ready);
    }

    #[test]
    fn test_session_timeout() {
        let mut session = Session::new(1, test_addr());
        assert!(!session.is_timed_out(Duration::from_secs(1)));

        session.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(session.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_session_assigns_incrementing_ids() {
        let mut manager = SessionManager::new(3);
        assert_eq!(manager.add_session(test_addr()), Some(1));
        assert_eq!(manager.add_session(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_session_at_capacity() {
        let mut manager = SessionManager::new(1);
        assert!(manager.add_session(test_addr()).is_some());
        assert!(manager.add_session(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = SessionManager::new(2);
        let id = manager.add_session(test_addr()).unwrap();

        assert!(manager.remove_session(id));
        assert!(!manager.remove_session(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_by_addr() {
        let mut manager = SessionManager::new(2);
        let id = manager.add_session(test_addr()).unwrap();
        manager.add_session(test_addr2()).unwrap();

        assert_eq!(manager.find_by_addr(test_addr()), Some(id));
        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_by_addr(unknown), None);
    }

    #[test]
    fn test_all_reported_requires_every_session() {
        let mut manager = SessionManager::new(3);
        let a = manager.add_session(test_addr()).unwrap();
        let b = manager.add_session(test_addr2()).unwrap();

        assert!(!manager.all_reported());
        manager.mark_reported(a);
        assert!(!manager.all_reported());
        manager.mark_reported(b);
        assert!(manager.all_reported());
    }

    #[test]
    fn test_empty_roster_is_never_reported_or_ready() {
        let manager = SessionManager::new(4);
        assert!(!manager.all_reported());
        assert!(!manager.all_ready());
    }

    #[test]
    fn test_mark_ready_is_idempotent_per_round() {
        let mut manager = SessionManager::new(3);
        let a = manager.add_session(test_addr()).unwrap();

        assert!(manager.mark_ready(a));
        assert!(!manager.mark_ready(a));
        assert_eq!(manager.ready_count(), 1);
    }

    #[test]
    fn test_mark_ready_unknown_participant() {
        let mut manager = SessionManager::new(3);
        assert!(!manager.mark_ready(42));
        assert_eq!(manager.ready_count(), 0);
    }

    #[test]
    fn test_advance_requires_three_distinct_ready_signals() {
        let mut manager = SessionManager::new(4);
        let a = manager.add_session(test_addr()).unwrap();
        let b = manager.add_session(test_addr2()).unwrap();
        let c = manager.add_session(test_addr3()).unwrap();

        manager.mark_ready(a);
        manager.mark_ready(a);
        manager.mark_ready(b);
        assert!(!manager.all_ready());

        manager.mark_ready(c);
        assert!(manager.all_ready());
    }

    #[test]
    fn test_disconnect_compensates_for_missing_ready() {
        let mut manager = SessionManager::new(4);
        let a = manager.add_session(test_addr()).unwrap();
        let b = manager.add_session(test_addr2()).unwrap();
        let c = manager.add_session(test_addr3()).unwrap();

        manager.mark_ready(a);
        manager.mark_ready(b);
        assert!(!manager.all_ready());

        // The silent participant vanishes; the remaining two suffice.
        manager.remove_session(c);
        assert!(manager.all_ready());
    }

    #[test]
    fn test_begin_round_clears_flags() {
        let mut manager = SessionManager::new(2);
        let a = manager.add_session(test_addr()).unwrap();
        manager.mark_reported(a);
        manager.mark_ready(a);

        manager.begin_round();
        assert!(!manager.all_reported());
        assert!(!manager.all_ready());
        assert!(manager.mark_ready(a));
    }

    #[test]
    fn test_check_timeouts_removes_stale_sessions() {
        let mut manager = SessionManager::new(2);
        let a = manager.add_session(test_addr()).unwrap();
        let b = manager.add_session(test_addr2()).unwrap();

        if let Some(session) = manager.sessions.get_mut(&a) {
            session.last_seen = Instant::now() - Duration::from_secs(60);
        }

        let timed_out = manager.check_timeouts();
        assert_eq!(timed_out, vec![a]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_by_addr(test_addr2()), Some(b));
    }
}
