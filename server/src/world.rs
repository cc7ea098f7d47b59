//! The simulation as seen from the input layer.
//!
//! The session never computes positions or collisions. It reaches the world
//! only through [`GameServer`] and the node records defined here.

use crate::config::Config;
use crate::player::Player;
use shared::{Border, Color, ServerStat, Vec2};

pub type NodeId = u32;
pub type PlayerId = u32;

/// Game mode id whose mother cells are cleared along with food.
pub const EXPERIMENTAL_MODE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Player,
    Food,
    Virus,
    Ejected,
    MotherCell,
}

/// Initial impulse applied by the simulation. `angle` is in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boost {
    pub distance: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Vec2,
    pub size: f64,
    /// Always `size * size`.
    pub radius: f64,
    pub color: Color,
    pub owner: Option<PlayerId>,
    pub boost: Option<Boost>,
}

impl Node {
    /// A node without an id yet. [`GameServer::add_node`] assigns one.
    pub fn new(kind: NodeKind, position: Vec2, size: f64) -> Self {
        Self {
            id: 0,
            kind,
            position,
            size,
            radius: size * size,
            color: Color::default(),
            owner: None,
            boost: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_owner(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn set_size(&mut self, size: f64) {
        self.size = size;
        self.radius = size * size;
    }

    pub fn set_boost(&mut self, distance: f64, angle: f64) {
        self.boost = Some(Boost { distance, angle });
    }
}

/// Everything the input layer consumes from the simulation.
pub trait GameServer {
    fn tick_count(&self) -> u64;
    fn config(&self) -> &Config;
    fn border(&self) -> Border;
    fn game_mode_id(&self) -> u32;
    fn version(&self) -> &str;

    /// Inserts `node` and returns the id it was given.
    fn add_node(&mut self, node: Node) -> NodeId;
    fn remove_node(&mut self, id: NodeId) -> Option<Node>;
    /// Re-indexes a node after its position changed outside the simulation.
    fn update_node_quad(&mut self, id: NodeId);
    fn node(&self, id: NodeId) -> Option<&Node>;
    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node>;
    fn nodes_of(&self, kind: NodeKind) -> Vec<NodeId>;

    fn check_bad_word(&self, text: &str) -> bool;
    fn random_color(&mut self) -> Color;
    fn random_skins(&self) -> &[String];

    fn on_chat_message(&mut self, from: &Player, text: &str);
    fn server_stat(&self) -> ServerStat;

    // Player command surface
    fn join_game(&mut self, player: &mut Player, name: String, skin: Option<String>);
    fn press_space(&mut self, player: &mut Player);
    fn press_w(&mut self, player: &mut Player);
    fn press_q(&mut self, player: &mut Player);
}
