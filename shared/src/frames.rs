//! Client -> server frame builders, used by the test client and by tests.

use crate::opcode;
use crate::reader::StringCodec;
use crate::writer::BinaryWriter;
use serde::Serialize;

#[derive(Serialize)]
struct Handshake {
    opcode: u8,
    value: u32,
}

/// Mouse frames carry a trailing 4-byte field that the server ignores.
#[derive(Serialize)]
struct Coords<T> {
    opcode: u8,
    x: T,
    y: T,
    id: u32,
}

fn record<T: Serialize>(value: &T) -> bincode::Result<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    writer.write_record(value)?;
    Ok(writer.into_bytes())
}

/// `[254][version u32]`
pub fn protocol(version: u32) -> bincode::Result<Vec<u8>> {
    record(&Handshake {
        opcode: opcode::PROTOCOL,
        value: version,
    })
}

/// `[255][key u32]`
pub fn handshake_key(key: u32) -> bincode::Result<Vec<u8>> {
    record(&Handshake {
        opcode: opcode::HANDSHAKE_KEY,
        value: key,
    })
}

/// 13-byte mouse frame: `[16][x i32][y i32][0 u32]`.
pub fn mouse_i32(x: i32, y: i32) -> bincode::Result<Vec<u8>> {
    record(&Coords {
        opcode: opcode::MOUSE,
        x,
        y,
        id: 0,
    })
}

/// 9-byte mouse frame: `[16][x i16][y i16][0 u32]`.
pub fn mouse_i16(x: i16, y: i16) -> bincode::Result<Vec<u8>> {
    record(&Coords {
        opcode: opcode::MOUSE,
        x,
        y,
        id: 0,
    })
}

/// 21-byte mouse frame: `[16][x f64][y f64][0 u32]`.
pub fn mouse_f64(x: f64, y: f64) -> bincode::Result<Vec<u8>> {
    record(&Coords {
        opcode: opcode::MOUSE,
        x,
        y,
        id: 0,
    })
}

pub fn join(name: &str, codec: StringCodec) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.write_u8(opcode::JOIN);
    writer.write_string(name, codec);
    writer.into_bytes()
}

/// Chat frame. `flags` bits 2, 4 and 8 announce 4, 8 and 16 reserved bytes,
/// which are zero-filled here.
pub fn chat(flags: u8, text: &str, codec: StringCodec) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.write_u8(opcode::CHAT);
    writer.write_u8(flags);
    for _ in 0..reserved_len(flags) {
        writer.write_u8(0);
    }
    writer.write_string(text, codec);
    writer.into_bytes()
}

/// Number of reserved bytes following the chat flags byte.
pub fn reserved_len(flags: u8) -> usize {
    (if flags & 2 != 0 { 4 } else { 0 })
        + (if flags & 4 != 0 { 8 } else { 0 })
        + (if flags & 8 != 0 { 16 } else { 0 })
}

/// Single-byte frame such as a key press or the stat request.
pub fn key(opcode: u8) -> Vec<u8> {
    vec![opcode]
}
