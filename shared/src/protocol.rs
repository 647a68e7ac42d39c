use serde::{Deserialize, Serialize};

use crate::score::{DescriptivePoint, ScoreSnapshot};

/// Wire protocol between participants and the authoritative server.
///
/// `round` fields scope per-round packets so a stale or duplicated datagram
/// from a previous round is dropped instead of double-counted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    /// Round result reported by the gameplay layer at the end of a round.
    /// One report per participant per round; a second report within the
    /// same round replaces the first.
    RoundScore {
        round: u32,
        points: i64,
        entries: Vec<DescriptivePoint>,
    },
    /// Readiness acknowledgment after the local reveal finished.
    /// Idempotent per round.
    Ready {
        round: u32,
    },
    Disconnect,

    // Server -> client
    Connected {
        participant_id: u64,
        round: u32,
    },
    /// Replicated score snapshot push; receipt starts the local reveal.
    SnapshotUpdate {
        round: u32,
        snapshot: ScoreSnapshot,
    },
    /// Advance transition: every participant acknowledged, next round begins.
    NextRound {
        round: u32,
    },
    /// Terminal transition. `winner` is `None` when the match was torn down
    /// without anyone reaching the target score.
    MatchOver {
        winner: Option<u64>,
    },
    /// A participant's losing streak reached the comeback threshold.
    ComebackAvailable {
        participant_id: u64,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::CATEGORY_CHECKOUT;

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect { client_version: 42 };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect { client_version } => assert_eq!(client_version, 42),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_round_score() {
        let packet = Packet::RoundScore {
            round: 3,
            points: 9,
            entries: vec![
                DescriptivePoint::new(CATEGORY_CHECKOUT, 3),
                DescriptivePoint::new(CATEGORY_CHECKOUT, 6),
            ],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::RoundScore {
                round,
                points,
                entries,
            } => {
                assert_eq!(round, 3);
                assert_eq!(points, 9);
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].amount, 6);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_match_over() {
        for winner in [Some(7u64), None] {
            let packet = Packet::MatchOver { winner };
            let serialized = bincode::serialize(&packet).unwrap();
            let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

            match deserialized {
                Packet::MatchOver { winner: decoded } => assert_eq!(decoded, winner),
                _ => panic!("Wrong packet type after deserialization"),
            }
        }
    }
}
