//! Opcode tables, one per handshake phase.
//!
//! A table is a fixed `opcode -> Command` mapping. The session never edits a
//! table. Changing phase swaps which static table is active.

use shared::opcode;

/// What a frame asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Protocol,
    HandshakeKey,
    Join,
    Spectate,
    Mouse,
    Split,
    MinionFollow,
    Eject,
    MinionSplit,
    MinionEject,
    MinionFreeze,
    MinionCollect,
    Freeze,
    MergeOverride,
    RecordMode,
    KillCells,
    GrowCells,
    ShrinkCells,
    ClearWorld,
    ShedMass,
    Recolor,
    Rainbow,
    SpawnVirus,
    FoodBrushSize,
    Teleport,
    SpawnFood,
    FoodBrushColor,
    EjectAtCursor,
    ScatterFood,
    Chat,
    Stat,
}

#[derive(Debug)]
pub struct DispatchTable {
    name: &'static str,
    entries: &'static [(u8, Command)],
}

impl DispatchTable {
    pub const fn new(name: &'static str, entries: &'static [(u8, Command)]) -> Self {
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lookup(&self, opcode: u8) -> Option<Command> {
        self.entries
            .iter()
            .find(|(byte, _)| *byte == opcode)
            .map(|(_, command)| *command)
    }

    pub fn opcodes(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|(byte, _)| *byte)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub static PROTOCOL_TABLE: DispatchTable =
    DispatchTable::new("awaiting protocol", &[(opcode::PROTOCOL, Command::Protocol)]);

pub static KEY_TABLE: DispatchTable =
    DispatchTable::new("awaiting key", &[(opcode::HANDSHAKE_KEY, Command::HandshakeKey)]);

pub static GAMEPLAY_TABLE: DispatchTable = DispatchTable::new(
    "operational",
    &[
        (opcode::JOIN, Command::Join),
        (opcode::SPECTATE, Command::Spectate),
        (opcode::MOUSE, Command::Mouse),
        (opcode::SPLIT, Command::Split),
        (opcode::KEY_Q, Command::MinionFollow),
        (opcode::EJECT, Command::Eject),
        (opcode::KEY_E, Command::MinionSplit),
        (opcode::KEY_R, Command::MinionEject),
        (opcode::KEY_T, Command::MinionFreeze),
        (opcode::KEY_P, Command::MinionCollect),
        (opcode::KEY_O, Command::Freeze),
        (opcode::KEY_M, Command::MergeOverride),
        (opcode::KEY_I, Command::RecordMode),
        (opcode::KEY_K, Command::KillCells),
        (opcode::KEY_Y, Command::GrowCells),
        (opcode::KEY_U, Command::ShrinkCells),
        (opcode::KEY_L, Command::ClearWorld),
        (opcode::KEY_H, Command::ShedMass),
        (opcode::KEY_Z, Command::Recolor),
        (opcode::KEY_X, Command::Rainbow),
        (opcode::KEY_S, Command::SpawnVirus),
        (opcode::KEY_C, Command::FoodBrushSize),
        (opcode::KEY_G, Command::Teleport),
        (opcode::KEY_J, Command::SpawnFood),
        (opcode::KEY_B, Command::FoodBrushColor),
        (opcode::KEY_V, Command::EjectAtCursor),
        (opcode::KEY_N, Command::ScatterFood),
        (opcode::CHAT, Command::Chat),
        (opcode::STAT, Command::Stat),
    ],
);
