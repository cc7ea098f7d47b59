//! Wire format shared by the cell-arena server and its tooling.
//!
//! Frames are raw little-endian byte layouts with an opcode in the first byte.
//! This crate knows how to read and write those layouts. It has no notion of
//! sessions, handshake phases or game rules.

pub mod frames;
pub mod opcode;
pub mod packets;
pub mod reader;
pub mod writer;

pub use packets::{ChatMessage, EncodeError, ServerPacket, ServerStat};
pub use reader::{BinaryReader, ReadError, StringCodec};
pub use writer::BinaryWriter;

use serde::{Deserialize, Serialize};

/// Lowest protocol version a client may negotiate.
pub const MIN_PROTOCOL: i32 = 1;
/// Highest protocol version a client may negotiate.
pub const MAX_PROTOCOL: i32 = 17;

/// 24-bit RGB color as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// 2D position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned world border.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Border {
    /// Border of the given size centered on the origin.
    pub fn centered(width: f64, height: f64) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self {
            min_x: -half_w,
            min_y: -half_h,
            max_x: half_w,
            max_y: half_h,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }
}
