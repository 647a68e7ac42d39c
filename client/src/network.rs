use crate::markers::ConsoleMarkerSink;
use crate::shopper;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::score::category_by_id;
use shared::{MarkerSink, Packet, ReplicatedCell, RevealCoordinator, RevealStep, ScoreSnapshot};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    participant_id: Option<u64>,
    connected: bool,
    round: u32,
    shop_millis: u64,

    snapshot_cell: ReplicatedCell<ScoreSnapshot>,
    reveal_rx: mpsc::UnboundedReceiver<ScoreSnapshot>,
    marker_sink: ConsoleMarkerSink,
    rng: StdRng,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        shop_millis: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        // The server owns the snapshot; this replica only reacts to it.
        let (reveal_tx, reveal_rx) = mpsc::unbounded_channel();
        let mut snapshot_cell = ReplicatedCell::read_only();
        snapshot_cell.on_change(move |_previous, snapshot: &ScoreSnapshot| {
            let _ = reveal_tx.send(snapshot.clone());
        });

        Ok(Client {
            socket,
            server_addr,
            participant_id: None,
            connected: false,
            round: 1,
            shop_millis,
            snapshot_cell,
            reveal_rx,
            marker_sink: ConsoleMarkerSink,
            rng: StdRng::from_entropy(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect { client_version: 1 };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Simulates the shopping phase and reports this round's score.
    async fn play_round(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.shop_millis > 0 {
            let wait = self.rng.gen_range(self.shop_millis / 2..=self.shop_millis);
            sleep(Duration::from_millis(wait)).await;
        }

        let report = shopper::simulate_round(&mut self.rng);
        info!(
            "Round {}: scored {} points in {} events",
            self.round,
            report.points,
            report.entries.len()
        );

        let packet = Packet::RoundScore {
            round: self.round,
            points: report.points,
            entries: report.entries,
        };
        self.send_packet(&packet).await
    }

    /// Plays the paced reveal locally, then logs the standings.
    async fn run_reveal(&mut self, snapshot: ScoreSnapshot) {
        info!("Revealing scores for round {}", self.round);

        let mut coordinator = RevealCoordinator::new(snapshot.clone());
        while let Some(step) = coordinator.next_step() {
            match step {
                RevealStep::Pause(delay) => sleep(delay).await,
                RevealStep::Marker {
                    slot,
                    category_id,
                    amount,
                    ..
                } => self.marker_sink.spawn_marker(slot, category_id, amount),
                // Totals commit on the server; there is nothing local to fold.
                RevealStep::Fold => {}
                RevealStep::AwaitReady => {}
            }
        }

        self.log_standings(&snapshot);
    }

    fn log_standings(&self, snapshot: &ScoreSnapshot) {
        for entry in &snapshot.entries {
            let mut description = String::new();
            for point in &entry.round_log {
                if !description.is_empty() {
                    description.push_str(", ");
                }
                match category_by_id(point.category_id) {
                    Some(category) => {
                        description.push_str(&format!("+{} {}", point.amount, category.name))
                    }
                    None => description.push_str(&format!("+{} ?", point.amount)),
                }
            }

            let marker = if Some(entry.participant_id) == self.participant_id {
                " (you)"
            } else {
                ""
            };
            info!(
                "Participant {}{}: {} points (round: {})",
                entry.participant_id,
                marker,
                entry.total_points + entry.round_points(),
                description
            );
        }
    }

    /// Returns false once the match is over and the client should exit.
    async fn handle_packet(&mut self, packet: Packet) -> Result<bool, Box<dyn std::error::Error>> {
        match packet {
            Packet::Connected {
                participant_id,
                round,
            } => {
                info!("Connected! Participant ID: {}", participant_id);
                self.participant_id = Some(participant_id);
                self.connected = true;
                self.round = round;
                self.play_round().await?;
            }

            Packet::SnapshotUpdate { round, snapshot } => {
                if round == self.round {
                    debug!("Snapshot for round {} received", round);
                    self.snapshot_cell.replicate(snapshot);
                } else {
                    debug!("Dropping stale snapshot for round {}", round);
                }
            }

            Packet::NextRound { round } => {
                self.round = round;
                self.play_round().await?;
            }

            Packet::MatchOver { winner } => {
                match winner {
                    Some(id) if Some(id) == self.participant_id => info!("Match over: you win!"),
                    Some(id) => info!("Match over: participant {} wins", id),
                    None => info!("Match over: no winner"),
                }
                return Ok(false);
            }

            Packet::ComebackAvailable { participant_id } => {
                if Some(participant_id) == self.participant_id {
                    info!("Comeback boost unlocked!");
                } else {
                    debug!("Comeback boost unlocked for participant {}", participant_id);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.participant_id = None;
                return Ok(false);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut buffer = [0u8; 4096];
        let mut running = true;

        while running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                running = self.handle_packet(packet).await?;
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                changed = self.reveal_rx.recv() => {
                    if let Some(snapshot) = changed {
                        self.run_reveal(snapshot).await;
                        let round = self.round;
                        self.send_packet(&Packet::Ready { round }).await?;
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_client_starts_disconnected() {
        let client = Client::new("127.0.0.1:8080", 0).await.unwrap();
        assert!(!client.connected);
        assert!(client.participant_id.is_none());
        assert_eq!(client.round, 1);
    }

    #[tokio::test]
    async fn test_replicated_snapshot_queues_reveal() {
        let mut client = Client::new("127.0.0.1:8080", 0).await.unwrap();

        let snapshot = ScoreSnapshot::new(Vec::new());
        client.snapshot_cell.replicate(snapshot);

        let queued = client.reveal_rx.try_recv();
        assert!(queued.is_ok());
        assert!(queued.unwrap().is_empty());
    }
}
