//! Server network layer: UDP sessions, JSON envelopes and the room tick loop

use crate::client_manager::ClientManager;
use crate::error::ServerError;
use crate::rooms::RoomRegistry;
use log::{debug, error, info, warn};
use shared::protocol::{Disconnected, Welcome};
use shared::{ClientMessage, Envelope, ServerMessage, DEFAULT_ROOM_ID};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Receive buffer size; any datagram that fits in UDP fits here.
pub const RECV_BUFFER_SIZE: usize = 65_536;

/// Longest step a single tick may simulate after a stall
const MAX_TICK_DT: f32 = 0.25;

/// Events sent from network tasks to the main server loop
#[derive(Debug)]
pub enum NetEvent {
    DatagramReceived {
        envelope: Envelope<ClientMessage>,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        room_id: Option<String>,
    },
}

/// Messages queued by the main loop for the sender task
#[derive(Debug)]
pub enum Outgoing {
    Send {
        message: Envelope<ServerMessage>,
        addr: SocketAddr,
    },
    /// Sent to every client currently in the room
    RoomBroadcast {
        room_id: String,
        message: Envelope<ServerMessage>,
    },
}

/// Main server coordinating sessions and room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomRegistry,
    tick_duration: Duration,
    ticks: u64,

    // Communication channels
    event_tx: mpsc::UnboundedSender<NetEvent>,
    event_rx: mpsc::UnboundedReceiver<NetEvent>,
    outgoing_tx: mpsc::UnboundedSender<Outgoing>,
    outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        rooms: RoomRegistry,
    ) -> Result<Self, ServerError> {
        Self::with_clients(addr, tick_duration, ClientManager::new(max_clients), rooms).await
    }

    pub async fn with_clients(
        addr: &str,
        tick_duration: Duration,
        clients: ClientManager,
        rooms: RoomRegistry,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(clients)),
            rooms,
            tick_duration,
            ticks: 0,
            event_tx,
            event_rx,
            outgoing_tx,
            outgoing_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Spawns task that listens for datagrams and decodes their envelopes
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Envelope::<ClientMessage>::decode(&buffer[..len]) {
                        Ok(envelope) => {
                            if let Err(e) =
                                event_tx.send(NetEvent::DatagramReceived { envelope, addr })
                            {
                                error!("Failed to send datagram to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that encodes and sends the outgoing queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut outgoing_rx =
            std::mem::replace(&mut self.outgoing_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(outgoing) = outgoing_rx.recv().await {
                match outgoing {
                    Outgoing::Send { message, addr } => {
                        let data = match message.encode() {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode message for {}: {}", addr, e);
                                continue;
                            }
                        };
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    Outgoing::RoomBroadcast { room_id, message } => {
                        let recipients = {
                            let clients_guard = clients.read().await;
                            clients_guard.room_addrs(&room_id)
                        };
                        if recipients.is_empty() {
                            continue;
                        }

                        let data = match message.encode() {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast for room '{}': {}", room_id, e);
                                continue;
                            }
                        };
                        for (client_id, addr) in recipients {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that removes silent clients
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                for event in expire_clients(&clients).await {
                    if let Err(e) = event_tx.send(event) {
                        error!("Failed to send timeout event: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send(&self, message: ServerMessage, reply_to: Option<u32>, addr: SocketAddr) {
        let message = Envelope::reply_to(message, reply_to);
        if let Err(e) = self.outgoing_tx.send(Outgoing::Send { message, addr }) {
            error!("Failed to queue message for sending: {}", e);
        }
    }

    fn broadcast_to_room(&self, room_id: &str, message: ServerMessage) {
        let outgoing = Outgoing::RoomBroadcast {
            room_id: room_id.to_string(),
            message: Envelope::new(message),
        };
        if let Err(e) = self.outgoing_tx.send(outgoing) {
            error!("Failed to queue room broadcast: {}", e);
        }
    }

    /// Resolves the sender of a datagram, registering it on first contact.
    async fn resolve_client(&self, addr: SocketAddr, message: &ClientMessage) -> Option<u32> {
        let mut clients = self.clients.write().await;
        if let Some(client_id) = clients.find_client_by_addr(addr) {
            clients.touch(client_id);
            return Some(client_id);
        }
        if matches!(message, ClientMessage::Disconnect {}) {
            return None;
        }

        match clients.add_client(addr) {
            Some(client_id) => {
                self.send(ServerMessage::Welcome(Welcome { id: client_id }), None, addr);
                Some(client_id)
            }
            None => {
                warn!("Rejecting {}: server full", addr);
                let reason = "Server full".to_string();
                self.send(ServerMessage::Disconnected(Disconnected { reason }), None, addr);
                None
            }
        }
    }

    /// Processes one decoded envelope from `addr`
    async fn handle_datagram(&mut self, envelope: Envelope<ClientMessage>, addr: SocketAddr) {
        let Envelope { message, seq, .. } = envelope;
        let Some(client_id) = self.resolve_client(addr, &message).await else {
            return;
        };

        match message {
            ClientMessage::JoinRoom(join) => {
                let room_id = join.room_id.unwrap_or_else(|| DEFAULT_ROOM_ID.to_string());
                let previous = {
                    let mut clients = self.clients.write().await;
                    clients.set_room(client_id, Some(room_id.clone()))
                };
                if let Some(previous) = previous.filter(|previous| *previous != room_id) {
                    self.rooms.leave(&previous, client_id);
                }

                let ack = self
                    .rooms
                    .join(&room_id, client_id, join.char_type.unwrap_or_default());
                self.send(ServerMessage::JoinRoomAck(Box::new(ack)), seq, addr);
            }

            ClientMessage::Ping {} => {
                self.send(ServerMessage::Pong {}, seq, addr);
            }

            ClientMessage::Disconnect {} => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id)
                };
                if let Some(room_id) = removed.and_then(|client| client.room_id) {
                    self.rooms.leave(&room_id, client_id);
                }
            }

            command => {
                let room_id = {
                    let clients = self.clients.read().await;
                    clients.room_of(client_id).map(str::to_string)
                };
                let reply = room_id
                    .and_then(|room_id| self.rooms.get_mut(&room_id))
                    .and_then(|room| room.apply_command(client_id, &command));

                match reply {
                    Some(reply) => self.send(reply, seq, addr),
                    None => debug!("Client {} sent {:?}", client_id, command),
                }
            }
        }
    }

    /// Dispatches one event from the network tasks
    async fn handle_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::DatagramReceived { envelope, addr } => {
                self.handle_datagram(envelope, addr).await;
            }
            NetEvent::ClientTimeout { client_id, room_id } => {
                if let Some(room_id) = room_id {
                    if self.rooms.leave(&room_id, client_id) {
                        debug!("Removed timed out client {} from room '{}'", client_id, room_id);
                    }
                }
            }
        }
    }

    /// Advances every room and broadcasts its state to its members
    fn tick_rooms(&mut self, dt: f32) {
        self.ticks += 1;
        let reports = self.rooms.tick_all(dt);

        for (room_id, report) in &reports {
            for phase in &report.phase_changes {
                debug!("Room '{}' tick {}: phase {}", room_id, report.tick, phase.as_str());
            }
        }
        for (room_id, room) in self.rooms.iter() {
            self.broadcast_to_room(room_id, room.snapshot());
        }

        if self.ticks % 100 == 0 && !self.rooms.is_empty() {
            debug!(
                "Tick {}: {} rooms, {:.1}Hz",
                self.ticks,
                self.rooms.len(),
                1.0 / dt.max(f32::EPSILON)
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started on {}", self.local_addr()?);

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_TICK_DT {
                        warn!("Tick took {:.3}s, capping to {:.3}s", dt, MAX_TICK_DT);
                        dt = MAX_TICK_DT;
                    }
                    self.tick_rooms(dt);
                }
            }
        }

        Ok(())
    }
}

/// Drops clients that went silent and turns each into a timeout event
async fn expire_clients(clients: &RwLock<ClientManager>) -> Vec<NetEvent> {
    let timed_out = clients.write().await.check_timeouts();
    timed_out
        .into_iter()
        .map(|client| {
            info!("Client {} timed out", client.id);
            NetEvent::ClientTimeout {
                client_id: client.id,
                room_id: client.room_id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::rooms::RoomDefaults;
    use shared::protocol::JoinRoom;
    use shared::{CharType, KillerType};

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn create_test_server(max_clients: usize) -> Server {
        let rooms = RoomRegistry::new(
            GameConfig::default(),
            RoomDefaults {
                seed: Some(3),
                killer_type: Some(KillerType::Stalker),
            },
        );
        Server::new("127.0.0.1:0", Duration::from_millis(50), max_clients, rooms)
            .await
            .unwrap()
    }

    fn drain(server: &mut Server) -> Vec<Outgoing> {
        let mut out = Vec::new();
        while let Ok(outgoing) = server.outgoing_rx.try_recv() {
            out.push(outgoing);
        }
        out
    }

    fn sent(outgoing: &Outgoing) -> (&ServerMessage, Option<u32>) {
        match outgoing {
            Outgoing::Send { message, .. } => (&message.message, message.reply_to),
            other => panic!("Unexpected outgoing message {:?}", other),
        }
    }

    fn join(room_id: Option<&str>, seq: u32) -> Envelope<ClientMessage> {
        Envelope::new(ClientMessage::JoinRoom(JoinRoom {
            room_id: room_id.map(str::to_string),
            char_type: Some(CharType::Scout),
        }))
        .with_seq(seq)
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = create_test_server(4).await;
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_first_contact_sends_welcome() {
        let mut server = create_test_server(4).await;
        let envelope = Envelope::new(ClientMessage::Ping {}).with_seq(9);

        server.handle_datagram(envelope, test_addr(5000)).await;

        let out = drain(&mut server);
        assert_eq!(out.len(), 2);
        assert_eq!(
            sent(&out[0]),
            (&ServerMessage::Welcome(Welcome { id: 1 }), None)
        );
        assert_eq!(sent(&out[1]), (&ServerMessage::Pong {}, Some(9)));

        // Known clients are not welcomed twice
        let envelope = Envelope::new(ClientMessage::Ping {});
        server.handle_datagram(envelope, test_addr(5000)).await;
        let out = drain(&mut server);
        assert_eq!(out.len(), 1);
        assert_eq!(sent(&out[0]), (&ServerMessage::Pong {}, None));
    }

    #[tokio::test]
    async fn test_full_server_rejects_client() {
        let mut server = create_test_server(1).await;
        server
            .handle_datagram(Envelope::new(ClientMessage::Ping {}), test_addr(5000))
            .await;
        drain(&mut server);

        server
            .handle_datagram(join(None, 1), test_addr(5001))
            .await;

        let out = drain(&mut server);
        assert_eq!(out.len(), 1);
        match sent(&out[0]).0 {
            ServerMessage::Disconnected(disconnected) => {
                assert_eq!(disconnected.reason, "Server full")
            }
            other => panic!("Unexpected message {:?}", other),
        }
        assert!(server.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_join_room_acks_with_reply_to() {
        let mut server = create_test_server(4).await;
        server.handle_datagram(join(None, 4), test_addr(5000)).await;

        let out = drain(&mut server);
        assert_eq!(out.len(), 2);
        let (message, reply_to) = sent(&out[1]);
        assert_eq!(reply_to, Some(4));
        match message {
            ServerMessage::JoinRoomAck(ack) => {
                assert_eq!(ack.room_id, DEFAULT_ROOM_ID);
                assert_eq!(ack.survivor_id, 1);
                assert_eq!(ack.world_seed, 3);
                assert_eq!(ack.killer_type, KillerType::Stalker);
            }
            other => panic!("Unexpected message {:?}", other),
        }
        assert_eq!(server.rooms().len(), 1);
    }

    #[tokio::test]
    async fn test_switching_rooms_leaves_previous() {
        let mut server = create_test_server(4).await;
        server
            .handle_datagram(join(Some("attic"), 1), test_addr(5000))
            .await;
        server
            .handle_datagram(join(Some("cellar"), 2), test_addr(5000))
            .await;

        assert!(server.rooms().get("attic").is_none());
        assert_eq!(server.rooms().get("cellar").unwrap().members().count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_destroys_empty_room() {
        let mut server = create_test_server(4).await;
        server.handle_datagram(join(None, 1), test_addr(5000)).await;
        server
            .handle_datagram(Envelope::new(ClientMessage::Disconnect {}), test_addr(5000))
            .await;

        assert!(server.rooms().is_empty());
        assert!(server.clients.read().await.is_empty());

        // Disconnect from a stranger does not register it
        drain(&mut server);
        server
            .handle_datagram(Envelope::new(ClientMessage::Disconnect {}), test_addr(5001))
            .await;
        assert!(drain(&mut server).is_empty());
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_room_command_without_room_is_ignored() {
        let mut server = create_test_server(4).await;
        server
            .handle_datagram(
                Envelope::new(ClientMessage::UseScoutAbility {}),
                test_addr(5000),
            )
            .await;

        let out = drain(&mut server);
        assert_eq!(out.len(), 1);
        assert!(matches!(sent(&out[0]).0, ServerMessage::Welcome(_)));
    }

    #[tokio::test]
    async fn test_tick_broadcasts_state_per_room() {
        let mut server = create_test_server(4).await;
        server
            .handle_datagram(join(Some("attic"), 1), test_addr(5000))
            .await;
        server
            .handle_datagram(join(Some("cellar"), 1), test_addr(5001))
            .await;
        drain(&mut server);

        server.tick_rooms(0.05);

        let mut rooms: Vec<String> = drain(&mut server)
            .into_iter()
            .map(|outgoing| match outgoing {
                Outgoing::RoomBroadcast { room_id, message } => {
                    match message.message {
                        ServerMessage::GameState(state) => assert_eq!(state.tick, 1),
                        other => panic!("Unexpected broadcast {:?}", other),
                    }
                    room_id
                }
                other => panic!("Unexpected outgoing message {:?}", other),
            })
            .collect();
        rooms.sort();
        assert_eq!(rooms, vec!["attic".to_string(), "cellar".to_string()]);
    }

    #[tokio::test]
    async fn test_timed_out_client_leaves_room_state() {
        let rooms = RoomRegistry::new(
            GameConfig::default(),
            RoomDefaults {
                seed: Some(3),
                killer_type: Some(KillerType::Stalker),
            },
        );
        let clients = ClientManager::with_timeout(4, Duration::from_millis(20));
        let mut server = Server::with_clients("127.0.0.1:0", Duration::from_millis(50), clients, rooms)
            .await
            .unwrap();

        server.handle_datagram(join(Some("attic"), 1), test_addr(5000)).await;
        server.handle_datagram(join(Some("attic"), 1), test_addr(5001)).await;
        server.tick_rooms(0.05);
        assert_eq!(server.rooms().get("attic").unwrap().state().survivors.len(), 2);

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Only the second client is still talking
        server
            .handle_datagram(Envelope::new(ClientMessage::Ping {}), test_addr(5001))
            .await;

        let events = expire_clients(&server.clients).await;
        assert_eq!(events.len(), 1);
        for event in events {
            server.handle_event(event).await;
        }
        drain(&mut server);
        server.tick_rooms(0.05);

        let state = server.rooms().get("attic").unwrap().state();
        assert!(!state.survivors.contains_key(&1));
        assert!(state.survivors.contains_key(&2));
        assert_eq!(state.living_survivor_count, 1);
        assert_eq!(server.clients.read().await.len(), 1);

        let broadcasts: Vec<Outgoing> = drain(&mut server);
        assert_eq!(broadcasts.len(), 1);
        match &broadcasts[0] {
            Outgoing::RoomBroadcast { room_id, message } => {
                assert_eq!(room_id, "attic");
                match &message.message {
                    ServerMessage::GameState(state) => {
                        assert_eq!(state.survivors.keys().copied().collect::<Vec<_>>(), vec![2]);
                    }
                    other => panic!("Unexpected broadcast {:?}", other),
                }
            }
            other => panic!("Unexpected outgoing message {:?}", other),
        }

        // The last member timing out destroys the room
        tokio::time::sleep(Duration::from_millis(60)).await;
        for event in expire_clients(&server.clients).await {
            server.handle_event(event).await;
        }
        assert!(server.rooms().is_empty());
        assert!(server.clients.read().await.is_empty());
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NetEvent>();
        let event = NetEvent::ClientTimeout {
            client_id: 42,
            room_id: Some("default".to_string()),
        };

        assert!(tx.send(event).is_ok());

        match rx.try_recv().unwrap() {
            NetEvent::ClientTimeout { client_id, room_id } => {
                assert_eq!(client_id, 42);
                assert_eq!(room_id.as_deref(), Some("default"));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }
}
