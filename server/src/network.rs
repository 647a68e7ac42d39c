//! Server network layer and round flow coordination.
//!
//! One logical thread of execution owns the ledger: every packet and timer
//! event funnels through the main select loop, so ledger mutation needs no
//! locking. The round flow is a small phase machine:
//!
//! Playing -> (all reported) -> Revealing -> Fold -> AwaitingReady
//!         -> (all ready) -> Playing, or MatchOver when a participant
//! crossed the target score in a previous round.

use crate::ledger::ScoreLedger;
use crate::session::SessionManager;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::score::category_by_id;
use shared::{
    DescriptivePoint, Packet, ReplicatedCell, RevealCoordinator, RevealStep, ScoreSnapshot,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ParticipantTimeout {
        participant_id: u64,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the round flow to the network sender task.
#[derive(Debug)]
pub enum FlowMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundPhase {
    Playing,
    Revealing,
    AwaitingReady,
}

/// Main server coordinating networking and the authoritative score flow.
pub struct ScoreServer {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    ledger: ScoreLedger,
    snapshot_cell: ReplicatedCell<ScoreSnapshot>,
    round: u32,
    phase: RoundPhase,
    points_to_win: i64,
    losing_rounds: u32,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    flow_tx: mpsc::UnboundedSender<FlowMessage>,
    flow_rx: mpsc::UnboundedReceiver<FlowMessage>,
    reveal_rx: mpsc::UnboundedReceiver<ScoreSnapshot>,
}

impl ScoreServer {
    pub async fn new(
        addr: &str,
        points_to_win: i64,
        losing_rounds: u32,
        max_participants: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Score server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (flow_tx, flow_rx) = mpsc::unbounded_channel();

        // The replicated cell's change notification is what starts the
        // reveal, on the server exactly as on every client.
        let (reveal_tx, reveal_rx) = mpsc::unbounded_channel();
        let mut snapshot_cell = ReplicatedCell::writable();
        snapshot_cell.on_change(move |_previous, new: &ScoreSnapshot| {
            let _ = reveal_tx.send(new.clone());
        });

        Ok(ScoreServer {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(max_participants))),
            ledger: ScoreLedger::authoritative(),
            snapshot_cell,
            round: 1,
            phase: RoundPhase::Playing,
            points_to_win,
            losing_rounds,
            server_tx,
            server_rx,
            flow_tx,
            flow_rx,
            reveal_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets.
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue.
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);
        let mut flow_rx = std::mem::replace(&mut self.flow_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = flow_rx.recv().await {
                match message {
                    FlowMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    FlowMessage::BroadcastPacket { packet } => {
                        let session_addrs = {
                            let sessions_guard = sessions.read().await;
                            sessions_guard.session_addrs()
                        };

                        for (participant_id, addr) in session_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to participant {}: {}", participant_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors participant timeouts.
    async fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut sessions_guard = sessions.write().await;
                    sessions_guard.check_timeouts()
                };

                for participant_id in timed_out {
                    if let Err(e) =
                        server_tx.send(ServerMessage::ParticipantTimeout { participant_id })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.flow_tx.send(FlowMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn broadcast_packet(&self, packet: &Packet) {
        if let Err(e) = self.flow_tx.send(FlowMessage::BroadcastPacket {
            packet: packet.clone(),
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets and advances the round flow.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Participant connecting from {} (version: {})",
                    addr, client_version
                );

                // Remove existing connection if present
                let existing_participant = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(existing_id) = existing_participant {
                    info!("Removing existing participant {} from {}", existing_id, addr);
                    let mut sessions = self.sessions.write().await;
                    sessions.remove_session(existing_id);
                    self.ledger.remove_participant(existing_id);
                }

                // Joiners are only admitted while a round is open for play.
                if self.phase != RoundPhase::Playing {
                    let response = Packet::Disconnected {
                        reason: "Match in progress".to_string(),
                    };
                    self.send_packet(&response, addr).await;
                    return;
                }

                let participant_id = {
                    let mut sessions = self.sessions.write().await;
                    sessions.add_session(addr)
                };

                if let Some(participant_id) = participant_id {
                    self.ledger.register_participant(participant_id);
                    let response = Packet::Connected {
                        participant_id,
                        round: self.round,
                    };
                    self.send_packet(&response, addr).await;
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(&response, addr).await;
                }
            }

            Packet::RoundScore {
                round,
                points,
                entries,
            } => {
                let participant_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(participant_id) = participant_id {
                    if round != self.round || self.phase != RoundPhase::Playing {
                        debug!(
                            "Ignoring stale round score from participant {} (round {})",
                            participant_id, round
                        );
                        return;
                    }

                    self.ledger.record_points(participant_id, points, entries);
                    {
                        let mut sessions = self.sessions.write().await;
                        sessions.mark_reported(participant_id);
                    }

                    let all_reported = {
                        let sessions = self.sessions.read().await;
                        sessions.all_reported()
                    };
                    if all_reported {
                        self.close_round().await;
                    }
                }
            }

            Packet::Ready { round } => {
                let participant_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(participant_id) = participant_id {
                    if round != self.round || self.phase != RoundPhase::AwaitingReady {
                        debug!(
                            "Ignoring out-of-round ready from participant {} (round {})",
                            participant_id, round
                        );
                        return;
                    }

                    let newly_ready = {
                        let mut sessions = self.sessions.write().await;
                        sessions.mark_ready(participant_id)
                    };

                    if newly_ready {
                        let (ready, total) = {
                            let sessions = self.sessions.read().await;
                            (sessions.ready_count(), sessions.len())
                        };
                        info!(
                            "Participant {} is ready ({}/{})",
                            participant_id, ready, total
                        );
                    } else {
                        debug!("Duplicate ready from participant {}", participant_id);
                    }

                    self.try_advance().await;
                }
            }

            Packet::Disconnect => {
                let participant_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(participant_id) = participant_id {
                    {
                        let mut sessions = self.sessions.write().await;
                        sessions.remove_session(participant_id);
                    }
                    self.handle_departure(participant_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from participant at {}", addr);
            }
        }
    }

    /// Ledger cleanup and phase re-evaluation after a participant left.
    /// A departure can complete the round's report set or satisfy the
    /// readiness count, so both conditions are re-checked here.
    async fn handle_departure(&mut self, participant_id: u64) {
        self.ledger.remove_participant(participant_id);

        match self.phase {
            RoundPhase::Playing => {
                let all_reported = {
                    let sessions = self.sessions.read().await;
                    sessions.all_reported()
                };
                if all_reported {
                    self.close_round().await;
                }
            }
            RoundPhase::AwaitingReady => self.try_advance().await,
            RoundPhase::Revealing => {}
        }
    }

    /// Closes the round once every connected participant reported.
    ///
    /// The winner check runs before any reveal, against the totals
    /// committed in previous rounds: a decided match ends immediately and
    /// this round's points are never shown.
    async fn close_round(&mut self) {
        if self.ledger.has_winner(self.points_to_win) {
            let winner = self.ledger.resolve_winner(self.points_to_win);
            match winner {
                Some(participant_id) => info!("Match over, participant {} wins", participant_id),
                None => warn!("Winner check passed but no participant resolved"),
            }
            self.broadcast_packet(&Packet::MatchOver { winner }).await;
            self.finish_match().await;
            return;
        }

        info!("Round {} closed, publishing snapshot", self.round);
        self.phase = RoundPhase::Revealing;

        let snapshot = self.ledger.snapshot();
        self.broadcast_packet(&Packet::SnapshotUpdate {
            round: self.round,
            snapshot: snapshot.clone(),
        })
        .await;

        // Fires the change notification that drives our own reveal.
        self.snapshot_cell.set(snapshot);
    }

    /// Walks the reveal sequence for the published snapshot, mirroring what
    /// every client visualizes while also feeding the all-time log and the
    /// round-close fold.
    async fn run_reveal(&mut self, snapshot: ScoreSnapshot) {
        info!("Revealing scores for round {}", self.round);

        let mut coordinator = RevealCoordinator::new(snapshot);
        while let Some(step) = coordinator.next_step() {
            match step {
                RevealStep::Pause(delay) => sleep(delay).await,
                RevealStep::Marker {
                    slot,
                    participant_id,
                    category_id,
                    amount,
                } => {
                    let name = category_by_id(category_id)
                        .map(|category| category.name)
                        .unwrap_or("Unknown");
                    debug!(
                        "Marker: slot {} +{} {} (participant {})",
                        slot, amount, name, participant_id
                    );
                    self.ledger.append_to_all_time_log(
                        participant_id,
                        DescriptivePoint::new(category_id, amount),
                    );
                }
                RevealStep::Fold => self.settle_round().await,
                RevealStep::AwaitReady => {
                    self.phase = RoundPhase::AwaitingReady;
                    info!("Awaiting ready signals for round {}", self.round);
                }
            }
        }

        // The roster may have shrunk to all-ready while we were pacing.
        self.try_advance().await;
    }

    /// Commits the round: folds pending points into totals and settles the
    /// losing streaks. The round's top scorer breaks their streak, everyone
    /// else extends theirs; a streak at the threshold unlocks a comeback.
    async fn settle_round(&mut self) {
        let top_scorer = self.ledger.round_top_scorer();
        self.ledger.fold_pending_into_total();

        for participant_id in self.ledger.participant_ids() {
            if Some(participant_id) == top_scorer {
                self.ledger.reset_loss_counter(participant_id);
            } else {
                self.ledger.increment_loss_counter(participant_id);
                if self
                    .ledger
                    .loss_threshold_reached(participant_id, self.losing_rounds)
                {
                    info!("Participant {} unlocked a comeback boost", participant_id);
                    self.broadcast_packet(&Packet::ComebackAvailable { participant_id })
                        .await;
                }
            }
        }
    }

    /// Starts the next round once every connected participant acknowledged
    /// the reveal (or none remain).
    async fn try_advance(&mut self) {
        if self.phase != RoundPhase::AwaitingReady {
            return;
        }

        let (all_ready, empty) = {
            let sessions = self.sessions.read().await;
            (sessions.all_ready(), sessions.is_empty())
        };

        if empty {
            info!("All participants left, resetting to an open round");
        } else if !all_ready {
            return;
        }

        self.round += 1;
        {
            let mut sessions = self.sessions.write().await;
            sessions.begin_round();
        }
        self.phase = RoundPhase::Playing;
        self.broadcast_packet(&Packet::NextRound { round: self.round })
            .await;
        info!("Round {} started", self.round);
    }

    /// Tears the finished match down and opens a fresh lobby.
    async fn finish_match(&mut self) {
        self.broadcast_packet(&Packet::Disconnected {
            reason: "Match complete".to_string(),
        })
        .await;

        {
            let mut sessions = self.sessions.write().await;
            sessions.clear();
        }
        self.ledger = ScoreLedger::authoritative();
        self.round = 1;
        self.phase = RoundPhase::Playing;
        info!("Match complete, ready for a new lobby");
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!(
            "Score server started (target {} points, comeback after {} losing rounds)",
            self.points_to_win, self.losing_rounds
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ParticipantTimeout { participant_id }) => {
                            warn!("Participant {} timed out", participant_id);
                            self.handle_departure(participant_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Snapshot-changed notification from the replicated cell.
                changed = self.reveal_rx.recv() => {
                    if let Some(snapshot) = changed {
                        self.run_reveal(snapshot).await;
                    }
                },
            }
        }

        Ok(())
    }
}
