//! Server network layer handling UDP communications and the session loop

use crate::client_manager::ClientManager;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::game::GameState;
use crate::host::Recipient;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Presentation, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Main server coordinating networking, the world and the roulette engine
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    engine: Engine,
    tick_duration: Duration,
    started: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: EngineConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let engine = Engine::new(config)?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state: GameState::new(),
            engine,
            tick_duration,
            started: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Milliseconds since the server started; the engine's clock.
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

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

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
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

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, exclude }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join {
                client_version,
                spectator,
            } => {
                info!("Client joining from {} (version: {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&existing_id);
                    self.game_state.remove_player(&existing_id);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, spectator)
                };

                match client_id {
                    Some(client_id) => {
                        let team = self.game_state.add_player(client_id, spectator);
                        self.send_packet(
                            Packet::Joined {
                                participant_id: client_id,
                                team,
                            },
                            addr,
                        );
                    }
                    None => self.send_packet(
                        Packet::Rejected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    ),
                }
            }

            Packet::Command { text } => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                let Some(client_id) = client_id else {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Join before sending commands".to_string(),
                        },
                        addr,
                    );
                    return;
                };

                match self.engine.submit(Some(client_id), &text) {
                    Ok(_) => {
                        let mut clients = self.clients.write().await;
                        clients.record_command(client_id);
                    }
                    Err(e) => self.send_packet(
                        Packet::Presentation(Presentation::Notice {
                            text: format!("Rejected: {}", e),
                        }),
                        addr,
                    ),
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Leave => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    self.game_state.remove_player(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Advances the world and the engine, then ships what they produced.
    async fn tick(&mut self, now: u64) {
        self.game_state.update(now);
        self.engine.tick(&mut self.game_state, now);
        self.flush_presentations().await;
    }

    async fn flush_presentations(&mut self) {
        let outbox = self.game_state.take_outbox();
        if outbox.is_empty() {
            return;
        }

        for (recipient, message) in outbox {
            let packet = Packet::Presentation(message);
            match recipient {
                Recipient::All => self.broadcast_packet(packet, None),
                Recipient::Participant(id) => {
                    let addr = {
                        let clients = self.clients.read().await;
                        clients.get(id).map(|c| c.addr)
                    };
                    match addr {
                        Some(addr) => self.send_packet(packet, addr),
                        None => debug!("Dropping presentation for departed participant {}", id),
                    }
                }
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let start = self.now_ms();
        self.engine.start_session(&mut self.game_state, start);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_player(&client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = self.now_ms();
                    self.tick(now).await;

                    if self.game_state.tick % 600 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!(
                                "Tick {}: {} clients, {}",
                                self.game_state.tick,
                                client_count,
                                self.engine.status_line(now)
                            );
                        }
                    }
                },
            }
        }

        let now = self.now_ms();
        self.engine.clear(&mut self.game_state, now);
        self.flush_presentations().await;
        Ok(())
    }
}
