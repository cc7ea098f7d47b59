//! Server -> client packets sent by the input layer.

use crate::opcode;
use crate::reader::StringCodec;
use crate::writer::BinaryWriter;
use crate::{Border, Color};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode record: {0}")]
    Record(#[from] bincode::Error),
    #[error("failed to encode stats: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chat flag: message originates from the server itself.
pub const CHAT_FLAG_SERVER: u8 = 0x80;
/// Chat flag: sender holds operator privilege.
pub const CHAT_FLAG_ADMIN: u8 = 0x40;

const SERVER_CHAT_COLOR: Color = Color::new(0x9B, 0x9B, 0x9B);

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub flags: u8,
    pub color: Color,
    pub name: String,
    pub text: String,
}

impl ChatMessage {
    pub fn server(text: impl Into<String>) -> Self {
        Self {
            flags: CHAT_FLAG_SERVER,
            color: SERVER_CHAT_COLOR,
            name: "SERVER".to_string(),
            text: text.into(),
        }
    }

    pub fn from_player(name: &str, color: Color, operator: bool, text: impl Into<String>) -> Self {
        let name = if name.is_empty() {
            "An unnamed cell"
        } else {
            name
        };
        Self {
            flags: if operator { CHAT_FLAG_ADMIN } else { 0 },
            color,
            name: name.to_string(),
            text: text.into(),
        }
    }
}

/// Server statistics returned for a stat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStat {
    pub name: String,
    pub mode: String,
    pub uptime: u64,
    pub update: f64,
    pub players_total: usize,
    pub players_alive: usize,
    pub players_spect: usize,
    pub players_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    ClearAll,
    SetBorder {
        border: Border,
        game_type: u32,
        server_name: Option<String>,
    },
    ChatMessage(ChatMessage),
    ServerStat(ServerStat),
}

#[derive(Serialize)]
struct BorderRecord {
    opcode: u8,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

#[derive(Serialize)]
struct ChatHeader {
    opcode: u8,
    flags: u8,
    color: Color,
}

impl ServerPacket {
    pub fn opcode(&self) -> u8 {
        match self {
            ServerPacket::ClearAll => opcode::CLEAR_ALL,
            ServerPacket::SetBorder { .. } => opcode::SET_BORDER,
            ServerPacket::ChatMessage(_) => opcode::CHAT_MESSAGE,
            ServerPacket::ServerStat(_) => opcode::SERVER_STAT,
        }
    }

    /// Encodes the packet, writing text fields in `codec`.
    pub fn to_bytes(&self, codec: StringCodec) -> Result<Vec<u8>, EncodeError> {
        let mut writer = BinaryWriter::new();

        match self {
            ServerPacket::ClearAll => writer.write_u8(opcode::CLEAR_ALL),
            ServerPacket::SetBorder {
                border,
                game_type,
                server_name,
            } => {
                writer.write_record(&BorderRecord {
                    opcode: opcode::SET_BORDER,
                    min_x: border.min_x,
                    min_y: border.min_y,
                    max_x: border.max_x,
                    max_y: border.max_y,
                })?;
                if let Some(name) = server_name {
                    writer.write_record(game_type)?;
                    writer.write_string(name, codec);
                }
            }
            ServerPacket::ChatMessage(message) => {
                writer.write_record(&ChatHeader {
                    opcode: opcode::CHAT_MESSAGE,
                    flags: message.flags,
                    color: message.color,
                })?;
                writer.write_string(&message.name, codec);
                writer.write_string(&message.text, codec);
            }
            ServerPacket::ServerStat(stat) => {
                writer.write_u8(opcode::SERVER_STAT);
                writer.write_string_zero_utf8(&serde_json::to_string(stat)?);
            }
        }

        Ok(writer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::BinaryReader;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_clear_all_is_single_byte() {
        let bytes = ServerPacket::ClearAll.to_bytes(StringCodec::Utf8).unwrap();
        assert_eq!(bytes, vec![0x12]);
    }

    #[test]
    fn test_set_border_layout() {
        let packet = ServerPacket::SetBorder {
            border: Border::centered(200.0, 100.0),
            game_type: 2,
            server_name: Some("arena".to_string()),
        };
        let bytes = packet.to_bytes(StringCodec::Utf8).unwrap();
        assert_eq!(bytes.len(), 1 + 32 + 4 + 6);

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), opcode::SET_BORDER);
        assert_approx_eq!(reader.read_f64().unwrap(), -100.0);
        assert_approx_eq!(reader.read_f64().unwrap(), -50.0);
        assert_approx_eq!(reader.read_f64().unwrap(), 100.0);
        assert_approx_eq!(reader.read_f64().unwrap(), 50.0);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.read_string_zero_utf8(), "arena");
    }

    #[test]
    fn test_set_border_without_name_stops_after_doubles() {
        let packet = ServerPacket::SetBorder {
            border: Border::centered(10.0, 10.0),
            game_type: 0,
            server_name: None,
        };
        assert_eq!(packet.to_bytes(StringCodec::Utf8).unwrap().len(), 33);
    }

    #[test]
    fn test_chat_message_layout_ucs2() {
        let packet = ServerPacket::ChatMessage(ChatMessage::server("hi"));
        let bytes = packet.to_bytes(StringCodec::Ucs2).unwrap();

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), opcode::CHAT_MESSAGE);
        assert_eq!(reader.read_u8().unwrap(), CHAT_FLAG_SERVER);
        assert_eq!(reader.read_u8().unwrap(), 0x9B);
        reader.skip_bytes(2);
        assert_eq!(reader.read_string_zero_unicode(), "SERVER");
        assert_eq!(reader.read_string_zero_unicode(), "hi");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_unnamed_player_chat() {
        let message = ChatMessage::from_player("", Color::new(1, 2, 3), false, "yo");
        assert_eq!(message.name, "An unnamed cell");
        assert_eq!(message.flags, 0);

        let admin = ChatMessage::from_player("op", Color::default(), true, "yo");
        assert_eq!(admin.flags, CHAT_FLAG_ADMIN);
    }

    #[test]
    fn test_server_stat_json() {
        let stat = ServerStat {
            name: "arena".to_string(),
            mode: "Free For All".to_string(),
            uptime: 12,
            update: 1.5,
            players_total: 3,
            players_alive: 2,
            players_spect: 1,
            players_limit: 64,
        };
        let bytes = ServerPacket::ServerStat(stat.clone())
            .to_bytes(StringCodec::Ucs2)
            .unwrap();
        assert_eq!(bytes[0], opcode::SERVER_STAT);
        assert_eq!(*bytes.last().unwrap(), 0);

        let json = BinaryReader::new(&bytes[1..]).read_string_zero_utf8();
        assert!(json.contains("\"playersAlive\":2"));
        let parsed: ServerStat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stat);
    }
}
