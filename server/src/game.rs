//! In-memory world backing the server binary.
//!
//! Stores nodes and answers the calls the input layer makes. Movement,
//! collisions and merging are not simulated here.

use crate::config::Config;
use crate::player::Player;
use crate::world::{GameServer, Node, NodeId, NodeKind, PlayerId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{Border, ChatMessage, Color, ServerStat, Vec2};
use std::collections::HashMap;
use std::time::Instant;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Chat line queued for delivery by the server loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatBroadcast {
    /// `None` sends to every connected player.
    pub target: Option<PlayerId>,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerCounts {
    pub total: usize,
    pub alive: usize,
    pub spectating: usize,
}

pub fn game_mode_name(id: u32) -> &'static str {
    match id {
        0 => "Free For All",
        1 => "Teams",
        2 => "Experimental",
        3 => "Rainbow",
        _ => "Unknown",
    }
}

pub struct GameState {
    pub tick: u64,
    config: Config,
    border: Border,
    nodes: HashMap<NodeId, Node>,
    next_node_id: NodeId,
    /// Nodes whose position changed outside the simulation since the last drain.
    moved: Vec<NodeId>,
    bad_words: Vec<String>,
    skins: Vec<String>,
    rng: StdRng,
    pending_chat: Vec<ChatBroadcast>,
    player_counts: PlayerCounts,
    start_time: Instant,
}

impl GameState {
    pub fn new(config: Config, skins: Vec<String>) -> Self {
        Self::with_rng(config, skins, StdRng::from_entropy())
    }

    /// Deterministic world for tests.
    pub fn with_seed(config: Config, skins: Vec<String>, seed: u64) -> Self {
        Self::with_rng(config, skins, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, skins: Vec<String>, rng: StdRng) -> Self {
        let border = Border::centered(config.border_width, config.border_height);
        let bad_words = config.bad_words.iter().map(|w| w.to_lowercase()).collect();

        Self {
            tick: 0,
            config,
            border,
            nodes: HashMap::new(),
            next_node_id: 1,
            moved: Vec::new(),
            bad_words,
            skins,
            rng,
            pending_chat: Vec::new(),
            player_counts: PlayerCounts::default(),
            start_time: Instant::now(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_player_counts(&mut self, counts: PlayerCounts) {
        self.player_counts = counts;
    }

    pub fn drain_chat(&mut self) -> Vec<ChatBroadcast> {
        std::mem::take(&mut self.pending_chat)
    }

    pub fn drain_moved(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.moved)
    }

    fn random_position(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.gen_range(self.border.min_x..=self.border.max_x),
            self.rng.gen_range(self.border.min_y..=self.border.max_y),
        )
    }

    fn angle_to_mouse(from: Vec2, mouse: Vec2) -> f64 {
        (mouse.x - from.x).atan2(mouse.y - from.y)
    }
}

impl GameServer for GameState {
    fn tick_count(&self) -> u64 {
        self.tick
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn border(&self) -> Border {
        self.border
    }

    fn game_mode_id(&self) -> u32 {
        self.config.server_gamemode
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        node.id = id;
        self.nodes.insert(id, node);
        id
    }

    fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    fn update_node_quad(&mut self, id: NodeId) {
        if self.nodes.contains_key(&id) {
            self.moved.push(id);
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn nodes_of(&self, kind: NodeKind) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.kind == kind)
            .map(|node| node.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn check_bad_word(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.bad_words
            .iter()
            .any(|word| !word.is_empty() && text.contains(word.as_str()))
    }

    fn random_color(&mut self) -> Color {
        // One channel full, one nearly empty, one random
        let mut channels = [255u8, 7, self.rng.gen()];
        channels.shuffle(&mut self.rng);
        Color::new(channels[0], channels[1], channels[2])
    }

    fn random_skins(&self) -> &[String] {
        &self.skins
    }

    fn on_chat_message(&mut self, from: &Player, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.config.server_chat {
            self.pending_chat.push(ChatBroadcast {
                target: Some(from.id),
                message: ChatMessage::server("The chat is disabled."),
            });
            return;
        }
        if self.config.filter_bad_words && self.check_bad_word(text) {
            self.pending_chat.push(ChatBroadcast {
                target: Some(from.id),
                message: ChatMessage::server("Message failed - please keep the chat friendly."),
            });
            return;
        }

        info!("[CHAT] {}: {}", from.name, text);
        self.pending_chat.push(ChatBroadcast {
            target: None,
            message: ChatMessage::from_player(&from.name, from.color, from.operator.enabled, text),
        });
    }

    fn server_stat(&self) -> ServerStat {
        ServerStat {
            name: self.config.server_name.clone(),
            mode: game_mode_name(self.config.server_gamemode).to_string(),
            uptime: self.start_time.elapsed().as_secs(),
            update: self.config.tick_ms as f64,
            players_total: self.player_counts.total,
            players_alive: self.player_counts.alive,
            players_spect: self.player_counts.spectating,
            players_limit: self.config.max_connections,
        }
    }

    fn join_game(&mut self, player: &mut Player, name: String, skin: Option<String>) {
        player.name = name;
        player.skin = skin;
        player.is_spectating = false;
        player.color = self.random_color();

        let position = self.random_position();
        let cell = Node::new(NodeKind::Player, position, self.config.player_start_size)
            .with_color(player.color)
            .with_owner(player.id);
        let id = self.add_node(cell);
        player.cells.push(id);

        info!(
            "Player {} joined as {:?} (skin {:?}) at ({:.0}, {:.0})",
            player.id, player.name, player.skin, position.x, position.y
        );
    }

    fn press_space(&mut self, player: &mut Player) {
        let min_size = self.config.player_min_split_size;
        let speed = self.config.eject_speed;

        for id in player.cells.clone() {
            if player.cells.len() >= self.config.player_max_cells {
                break;
            }
            let Some(cell) = self.nodes.get_mut(&id) else {
                continue;
            };
            if cell.size < min_size {
                continue;
            }

            let half = cell.size / std::f64::consts::SQRT_2;
            cell.set_size(half);
            let (position, color) = (cell.position, cell.color);

            let mut piece = Node::new(NodeKind::Player, position, half)
                .with_color(color)
                .with_owner(player.id);
            piece.set_boost(speed, Self::angle_to_mouse(position, player.mouse));
            let piece_id = self.add_node(piece);
            player.cells.push(piece_id);
        }
        debug!("Player {} split into {} cells", player.id, player.cells.len());
    }

    fn press_w(&mut self, player: &mut Player) {
        let min_size = self.config.player_min_eject_size;
        let loss = self.config.eject_size_loss;
        let size = self.config.eject_min_size;

        for &id in &player.cells {
            let Some(cell) = self.nodes.get_mut(&id) else {
                continue;
            };
            if cell.size < min_size {
                continue;
            }

            cell.set_size((cell.radius - loss * loss).max(0.0).sqrt());
            let angle = Self::angle_to_mouse(cell.position, player.mouse);
            let position = Vec2::new(
                cell.position.x + cell.size * angle.sin(),
                cell.position.y + cell.size * angle.cos(),
            );

            let mut eject = Node::new(NodeKind::Ejected, position, size).with_color(player.color);
            eject.set_boost(self.config.eject_speed, angle + self.rng.gen_range(-0.3..0.3));
            self.add_node(eject);
        }
    }

    fn press_q(&mut self, player: &mut Player) {
        if player.is_spectating {
            player.free_roam = !player.free_roam;
            debug!("Player {} free roam: {}", player.id, player.free_roam);
        }
    }
}
