//! Connected-client bookkeeping for the match server
//!
//! This module tracks who is talking to the server, including:
//! - Client identity, keyed by the UDP source address of their datagrams
//! - Which room (if any) each client has joined
//! - Connection health monitoring and automatic cleanup of silent clients
//! - Capacity limits
//!
//! Clients never say goodbye reliably over UDP, so anything that goes quiet
//! for longer than the timeout is treated as having left.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Silence after which a client is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and the room they are playing in
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server; doubles as the
    /// survivor id inside a room
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any datagram from this client
    pub last_seen: Instant,
    /// Room joined with `joinRoom`, if any
    pub room_id: Option<String>,
}

impl Client {
    /// Creates a freshly seen client that has not joined a room yet
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            room_id: None,
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if nothing has been received from this client within
    /// `timeout`, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager hands out ids, enforces the capacity limit and lets the
/// network tasks map addresses to clients and clients to rooms.
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

    /// Attempts to register a new client
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client, returning it so the caller can clean up its room.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds a client ID by their network address
    ///
    /// Used to associate incoming datagrams with existing clients.
    /// Returns None if no client is connected from the given address.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks a client as alive. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Records the room a client joined and returns the one it left, if any.
    pub fn set_room(&mut self, client_id: u32, room_id: Option<String>) -> Option<String> {
        let client = self.clients.get_mut(&client_id)?;
        std::mem::replace(&mut client.room_id, room_id)
    }

    pub fn room_of(&self, client_id: u32) -> Option<&str> {
        self.clients.get(&client_id)?.room_id.as_deref()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed clients so their rooms can drop them too.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// Addresses of every client in `room_id`, for broadcasting its state.
    pub fn room_addrs(&self, room_id: &str) -> Vec<(u32, SocketAddr)> {
        self.clients
            .values()
            .filter(|client| client.room_id.as_deref() == Some(room_id))
            .map(|client| (client.id, client.addr))
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
