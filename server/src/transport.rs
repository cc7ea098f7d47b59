//! Outbound side of a connection.

use log::{debug, error};
use shared::{ServerPacket, StringCodec};
use tokio::sync::mpsc;

/// WebSocket close code for an orderly shutdown, used for idle timeouts.
pub const CLOSE_NORMAL: u16 = 1000;
/// WebSocket close code for protocol errors.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// WebSocket close code sent when the server is at capacity.
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

pub trait Transport {
    fn send(&mut self, packet: &ServerPacket, codec: StringCodec);
    fn close(&mut self, code: u16, reason: &str);
}

/// Work for a connection's socket writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Frame(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Encodes packets and hands them to the socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    client_id: u32,
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ChannelTransport {
    pub fn new(client_id: u32, tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { client_id, tx }
    }

    fn push(&self, outgoing: Outgoing) {
        if self.tx.send(outgoing).is_err() {
            debug!("Client {} writer is gone, dropping outbound message", self.client_id);
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, packet: &ServerPacket, codec: StringCodec) {
        match packet.to_bytes(codec) {
            Ok(bytes) => self.push(Outgoing::Frame(bytes)),
            Err(e) => error!(
                "Failed to encode packet 0x{:02X} for client {}: {}",
                packet.opcode(),
                self.client_id,
                e
            ),
        }
    }

    fn close(&mut self, code: u16, reason: &str) {
        self.push(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Keeps everything in memory. Used to drive sessions without a socket.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    pub sent: Vec<(ServerPacket, StringCodec)>,
    pub closed: Option<(u16, String)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> impl Iterator<Item = &ServerPacket> {
        self.sent.iter().map(|(packet, _)| packet)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, packet: &ServerPacket, codec: StringCodec) {
        self.sent.push((packet.clone(), codec));
    }

    fn close(&mut self, code: u16, reason: &str) {
        self.closed = Some((code, reason.to_string()));
    }
}
