use crate::world::{NodeId, PlayerId};
use rand::Rng;
use shared::{Color, Vec2};

/// Operator sub-settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorState {
    pub enabled: bool,
    pub food_size: f64,
    pub food_color: Color,
}

impl Default for OperatorState {
    fn default() -> Self {
        Self {
            enabled: false,
            food_size: 10.0,
            food_color: Color::new(255, 255, 255),
        }
    }
}

/// Orders given to the player's minions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinionState {
    pub follow: bool,
    /// Single-tick pulse.
    pub split: bool,
    /// Single-tick pulse.
    pub eject: bool,
    pub frozen: bool,
    pub collect: bool,
}

/// The player behind a connection.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub skin: Option<String>,
    pub cells: Vec<NodeId>,
    /// Authoritative cursor, already descrambled.
    pub mouse: Vec2,
    pub color: Color,
    pub is_spectating: bool,
    pub free_roam: bool,
    pub frozen: bool,
    pub merge_override: bool,
    pub rec_mode: bool,
    pub operator: OperatorState,
    pub minion: MinionState,
    pub scramble_x: i32,
    pub scramble_y: i32,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: String::new(),
            skin: None,
            cells: Vec::new(),
            mouse: Vec2::default(),
            color: Color::default(),
            is_spectating: false,
            free_roam: false,
            frozen: false,
            merge_override: false,
            rec_mode: false,
            operator: OperatorState::default(),
            minion: MinionState::default(),
            scramble_x: 0,
            scramble_y: 0,
        }
    }

    /// Picks random descrambling offsets in `[-limit, limit]`.
    pub fn with_scramble(mut self, limit: i32, rng: &mut impl Rng) -> Self {
        if limit > 0 {
            self.scramble_x = rng.gen_range(-limit..=limit);
            self.scramble_y = rng.gen_range(-limit..=limit);
        }
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.cells.is_empty()
    }
}
