//! Connected clients and their sessions.
//!
//! This module handles the server-side bookkeeping for every connection:
//! - Admission against the configured capacity
//! - Routing inbound frames to the owning session
//! - Per-tick flushing, color cycle firing and chat fan-out
//! - Idle detection and cleanup
//!
//! The manager is generic over the [`Transport`] so the same code drives real
//! sockets in the server loop and in-memory transports in tests.

use crate::game::{ChatBroadcast, PlayerCounts};
use crate::player::Player;
use crate::session::{FrameOutcome, Rejection, Session};
use crate::transport::{Transport, CLOSE_NORMAL};
use crate::world::GameServer;
use log::info;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// A connected client and the session that interprets its frames
pub struct Client<T: Transport> {
    /// Unique client identifier, also used as the player id
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Last time a frame with a known opcode arrived
    pub last_seen: Instant,
    pub session: Session<T>,
}

impl<T: Transport> Client<T> {
    pub fn new(id: u32, addr: SocketAddr, session: Session<T>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            session,
        }
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the connection limit and gives new players their scramble
/// offsets. Every mutation happens on the game loop task, so the manager
/// needs no locking.
pub struct ClientManager<T: Transport> {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client<T>>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Bound for the random mouse scramble offsets
    scramble_limit: i32,
    /// Addresses whose players start with operator rights
    operators: Vec<IpAddr>,
}

impl<T: Transport> ClientManager<T> {
    pub fn new(max_clients: usize, scramble_limit: i32) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            scramble_limit,
            operators: Vec::new(),
        }
    }

    /// Grants operator rights to every player connecting from one of `operators`
    pub fn with_operators(mut self, operators: Vec<IpAddr>) -> Self {
        self.operators = operators;
        self
    }

    /// Admits a new connection
    ///
    /// Hands the transport back when the server is at capacity or the id is
    /// already taken, so the caller can close it.
    pub fn add_client(&mut self, id: u32, addr: SocketAddr, transport: T) -> Result<(), T> {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&id) {
            return Err(transport);
        }

        let mut player =
            Player::new(id).with_scramble(self.scramble_limit, &mut rand::thread_rng());
        if self.operators.contains(&addr.ip()) {
            info!("Client {} from {} is an operator", id, addr);
            player.operator.enabled = true;
        }
        let session = Session::new(player, transport);
        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, session));
        Ok(())
    }

    /// Removes a client and returns it so its cells can be released
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client<T>> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client<T>> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Client<T>> {
        self.clients.get_mut(&client_id)
    }

    /// Routes one frame to the client's session
    ///
    /// Returns `None` for an unknown client. Any frame the active table knows
    /// refreshes the client's activity timestamp.
    pub fn handle_frame<W: GameServer>(
        &mut self,
        client_id: u32,
        world: &mut W,
        frame: &[u8],
    ) -> Option<FrameOutcome> {
        let client = self.clients.get_mut(&client_id)?;
        let outcome = client.session.handle_message(world, frame);
        if !matches!(
            outcome,
            FrameOutcome::Dropped(Rejection::UnknownOpcode { .. } | Rejection::EmptyFrame)
        ) {
            client.last_seen = Instant::now();
        }
        Some(outcome)
    }

    /// Flushes every session's latched input
    pub fn process_tick<W: GameServer>(&mut self, world: &mut W) {
        for client in self.clients.values_mut() {
            client.session.process(world);
        }
    }

    /// Fires the color cycle of every session that has it enabled
    pub fn color_tick<W: GameServer>(&mut self, world: &mut W) {
        for client in self.clients.values_mut() {
            if client.session.color_cycle().is_enabled() {
                client.session.on_color_tick(world);
            }
        }
    }

    /// Delivers queued chat lines, either to one player or to everyone
    pub fn deliver_chat(&mut self, broadcasts: Vec<ChatBroadcast>) {
        for broadcast in broadcasts {
            match broadcast.target {
                Some(target) => {
                    if let Some(client) = self.clients.get_mut(&target) {
                        client.session.send_chat(&broadcast.message);
                    }
                }
                None => {
                    for client in self.clients.values_mut() {
                        client.session.send_chat(&broadcast.message);
                    }
                }
            }
        }
    }

    /// Ids of clients whose session closed the connection
    pub fn closed_clients(&self) -> Vec<u32> {
        self.clients
            .values()
            .filter(|client| client.session.is_closed())
            .map(|client| client.id)
            .collect()
    }

    /// Closes, removes and returns clients silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client<T>> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|id| self.remove_client(id))
            .map(|mut client| {
                client.session.close(CLOSE_NORMAL, "Connection timeout");
                client
            })
            .collect()
    }

    pub fn player_counts(&self) -> PlayerCounts {
        let mut counts = PlayerCounts {
            total: self.clients.len(),
            ..PlayerCounts::default()
        };
        for client in self.clients.values() {
            let player = client.session.player();
            if player.is_alive() {
                counts.alive += 1;
            } else if player.is_spectating {
                counts.spectating += 1;
            }
        }
        counts
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
    use crate::config::Config;
    use crate::game::GameState;
    use crate::transport::MemoryTransport;
    use shared::{frames, opcode, ChatMessage, ServerPacket, StringCodec};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_world() -> GameState {
        GameState::with_seed(Config::default(), Vec::new(), 1)
    }

    fn handshake(manager: &mut ClientManager<MemoryTransport>, world: &mut GameState, id: u32) {
        manager.handle_frame(id, world, &frames::protocol(7).unwrap());
        manager.handle_frame(id, world, &frames::handshake_key(0).unwrap());
    }

    fn chat_texts(client: &Client<MemoryTransport>) -> Vec<String> {
        client
            .session
            .transport()
            .packets()
            .filter_map(|packet| match packet {
                ServerPacket::ChatMessage(message) => Some(message.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_client_timeout() {
        let session = Session::new(Player::new(1), MemoryTransport::new());
        let mut client = Client::new(1, test_addr(), session);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager: ClientManager<MemoryTransport> = ClientManager::new(5, 0);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_client() {
        let mut manager = ClientManager::new(2, 0);

        assert!(manager.add_client(1, test_addr(), MemoryTransport::new()).is_ok());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(1).unwrap().session.player().id, 1);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1, 0);

        assert!(manager.add_client(1, test_addr(), MemoryTransport::new()).is_ok());
        assert!(manager.add_client(2, test_addr(), MemoryTransport::new()).is_err());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = ClientManager::new(4, 0);

        assert!(manager.add_client(1, test_addr(), MemoryTransport::new()).is_ok());
        assert!(manager.add_client(1, test_addr(), MemoryTransport::new()).is_err());
    }

    #[test]
    fn test_scramble_applied_to_new_players() {
        let mut manager = ClientManager::new(8, 300);
        for id in 1..=8 {
            manager.add_client(id, test_addr(), MemoryTransport::new()).unwrap();
            let player = manager.get(id).unwrap().session.player();
            assert!((-300..=300).contains(&player.scramble_x));
            assert!((-300..=300).contains(&player.scramble_y));
        }
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2, 0);
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();

        let removed = manager.remove_client(&1);
        assert_eq!(removed.map(|client| client.id), Some(1));
        assert!(manager.is_empty());
        assert!(manager.remove_client(&1).is_none());
    }

    #[test]
    fn test_handle_frame_unknown_client() {
        let mut manager: ClientManager<MemoryTransport> = ClientManager::new(2, 0);
        let mut world = test_world();

        assert!(manager.handle_frame(9, &mut world, &[0]).is_none());
    }

    #[test]
    fn test_unknown_opcode_does_not_refresh_activity() {
        let mut manager = ClientManager::new(2, 0);
        let mut world = test_world();
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();
        let stale = Instant::now() - Duration::from_secs(10);
        manager.get_mut(1).unwrap().last_seen = stale;

        manager.handle_frame(1, &mut world, &[opcode::SPLIT]);
        assert_eq!(manager.get(1).unwrap().last_seen, stale);

        manager.handle_frame(1, &mut world, &frames::protocol(7).unwrap());
        assert!(manager.get(1).unwrap().last_seen > stale);
    }

    #[test]
    fn test_closed_clients_reported() {
        let mut manager = ClientManager::new(2, 0);
        let mut world = test_world();
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();
        manager.add_client(2, test_addr(), MemoryTransport::new()).unwrap();

        let outcome = manager.handle_frame(2, &mut world, &frames::protocol(99).unwrap());

        assert_eq!(outcome, Some(FrameOutcome::Closed));
        assert_eq!(manager.closed_clients(), vec![2]);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(3, 0);
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();
        manager.add_client(2, test_addr(), MemoryTransport::new()).unwrap();
        manager.get_mut(2).unwrap().last_seen = Instant::now() - Duration::from_secs(60);

        let removed = manager.check_timeouts(Duration::from_secs(30));

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, 2);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_timed_out_client_is_closed() {
        let mut manager = ClientManager::new(2, 0);
        let mut world = test_world();
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();
        handshake(&mut manager, &mut world, 1);
        manager.get_mut(1).unwrap().last_seen = Instant::now() - Duration::from_secs(10_000);

        let removed = manager.check_timeouts(Duration::from_secs(300));

        assert!(removed[0].session.is_closed());
        assert_eq!(
            removed[0].session.transport().closed,
            Some((1000, "Connection timeout".to_string()))
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn test_operator_addresses() {
        let mut manager =
            ClientManager::new(2, 0).with_operators(vec!["10.0.0.5".parse().unwrap()]);
        manager
            .add_client(1, "10.0.0.5:4000".parse().unwrap(), MemoryTransport::new())
            .unwrap();
        manager.add_client(2, test_addr(), MemoryTransport::new()).unwrap();

        assert!(manager.get(1).unwrap().session.player().operator.enabled);
        assert!(!manager.get(2).unwrap().session.player().operator.enabled);
    }

    #[test]
    fn test_player_counts() {
        let mut manager = ClientManager::new(4, 0);
        let mut world = test_world();
        for id in 1..=3 {
            manager.add_client(id, test_addr(), MemoryTransport::new()).unwrap();
            handshake(&mut manager, &mut world, id);
        }
        manager.handle_frame(1, &mut world, &frames::join("Alice", StringCodec::Utf8));
        manager.handle_frame(2, &mut world, &frames::key(opcode::SPECTATE));

        assert_eq!(
            manager.player_counts(),
            PlayerCounts {
                total: 3,
                alive: 1,
                spectating: 1
            }
        );
    }

    #[test]
    fn test_deliver_chat_targets() {
        let mut manager = ClientManager::new(4, 0);
        let mut world = test_world();
        for id in 1..=2 {
            manager.add_client(id, test_addr(), MemoryTransport::new()).unwrap();
            handshake(&mut manager, &mut world, id);
        }
        manager.add_client(3, test_addr(), MemoryTransport::new()).unwrap();

        manager.deliver_chat(vec![
            ChatBroadcast {
                target: None,
                message: ChatMessage::server("everyone"),
            },
            ChatBroadcast {
                target: Some(2),
                message: ChatMessage::server("just you"),
            },
        ]);

        assert!(chat_texts(manager.get(1).unwrap()).ends_with(&["everyone".to_string()]));
        assert!(chat_texts(manager.get(2).unwrap())
            .ends_with(&["everyone".to_string(), "just you".to_string()]));
        // still mid-handshake
        assert!(chat_texts(manager.get(3).unwrap()).is_empty());
    }

    #[test]
    fn test_process_tick_flushes_all() {
        let mut manager = ClientManager::new(4, 0);
        let mut world = test_world();
        manager.add_client(1, test_addr(), MemoryTransport::new()).unwrap();
        handshake(&mut manager, &mut world, 1);
        manager.handle_frame(1, &mut world, &frames::mouse_i16(-5, 7).unwrap());

        manager.process_tick(&mut world);

        let player = manager.get(1).unwrap().session.player();
        assert_eq!((player.mouse.x, player.mouse.y), (-5.0, 7.0));
    }

    #[test]
    fn test_color_tick_only_enabled() {
        let mut manager = ClientManager::new(4, 0);
        let mut world = test_world();
        for id in 1..=2 {
            manager.add_client(id, test_addr(), MemoryTransport::new()).unwrap();
            handshake(&mut manager, &mut world, id);
        }
        manager.handle_frame(1, &mut world, &frames::key(opcode::KEY_X));

        manager.color_tick(&mut world);

        assert_eq!(manager.get(1).unwrap().session.color_cycle().phase(), 1);
        assert_eq!(manager.get(2).unwrap().session.color_cycle().phase(), 0);
    }
}
