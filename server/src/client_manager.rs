//! Client connection management for the roulette host
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Address tracking so incoming datagrams map back to a participant
//! - Capacity limits and spectator tracking
//!
//! The client manager only knows about sockets and liveness. Whether a client
//! is eligible for effects is decided by the game state it is registered in.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a client may stay silent before it is dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected client
///
/// Each client maintains:
/// - Connection metadata (ID, address, last activity)
/// - Whether it joined to play or only to watch
/// - How many commands it has sent, for status reporting
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also used as the participant id
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Spectators receive presentations but are never targeted
    pub spectator: bool,
    /// Commands accepted from this client so far
    pub commands_sent: u32,
}

impl Client {
    /// Creates a new client with the given ID and network address
    ///
    /// The client starts as recently active with no commands sent.
    pub fn new(id: u32, addr: SocketAddr, spectator: bool) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            spectator,
            commands_sent: 0,
        }
    }

    /// Marks the client as alive right now
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager provides centralized control over client connections and
/// enforces server capacity limits. Client ids double as participant ids in
/// the game state, so they are never reused within a server run.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, CLIENT_TIMEOUT)
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, spectator: bool) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr, spectator);
        info!(
            "Client {} connected from {}{}",
            client_id,
            addr,
            if spectator { " (spectating)" } else { "" }
        );
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone. Handles both explicit leaves and timeout cleanup.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Refreshes a client's activity timestamp. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    /// Counts an accepted command against the client
    pub fn record_command(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            client.commands_sent += 1;
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so the game state can drop their
    /// participants as well.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    ///
    /// Used for broadcasting presentations to every connected client.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, false);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert!(!client.spectator);
        assert_eq!(client.commands_sent, 0);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), false);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), false).unwrap();
        assert_eq!(client_id, 1);
        assert_eq!(manager.len(), 1);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), false).is_some());
        assert!(manager.add_client(test_addr2(), true).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut manager = ClientManager::new(2);
        let first = manager.add_client(test_addr(), false).unwrap();
        manager.remove_client(&first);
        let second = manager.add_client(test_addr(), false).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.remove_client(&999));
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr(), false).unwrap();
        let _client_id2 = manager.add_client(test_addr2(), true).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_record_command() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), false).unwrap();
        manager.record_command(client_id);
        manager.record_command(client_id);
        assert_eq!(manager.get(client_id).unwrap().commands_sent, 2);
        assert!(!manager.touch(42));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::with_timeout(4, Duration::from_millis(100));
        let stale = manager.add_client(test_addr(), false).unwrap();
        let fresh = manager.add_client(test_addr2(), false).unwrap();

        if let Some(client) = manager.clients.get_mut(&stale) {
            client.last_seen = Instant::now() - Duration::from_secs(1);
        }

        assert_eq!(manager.check_timeouts(), vec![stale]);
        assert!(manager.get(fresh).is_some());
        assert!(manager.get(stale).is_none());
    }
}
