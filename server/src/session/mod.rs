//! Per-connection input handling.
//!
//! A [`Session`] owns one connection's handshake state, the player behind it
//! and everything latched between ticks. The server loop feeds it raw frames
//! with [`Session::handle_message`] and calls [`Session::process`] once per
//! tick. All world access goes through [`GameServer`].

mod dispatch;
mod handlers;
mod handshake;
mod operator;

pub use dispatch::{Command, DispatchTable, GAMEPLAY_TABLE, KEY_TABLE, PROTOCOL_TABLE};
pub use operator::FOOD_BRUSH_PALETTE;

use crate::color_cycle::ColorCycle;
use crate::latch::{self, InputLatch};
use crate::player::Player;
use crate::rate_limit::RateLimiter;
use crate::transport::{Transport, CLOSE_PROTOCOL_ERROR};
use crate::world::GameServer;
use log::{debug, warn};
use shared::{ChatMessage, ReadError, ServerPacket, StringCodec, Vec2};
use thiserror::Error;

/// Handshake progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingProtocol,
    AwaitingKey {
        protocol: i32,
    },
    Operational {
        protocol: i32,
        key: i32,
        codec: StringCodec,
    },
}

impl Phase {
    /// The opcode table accepted in this phase.
    pub fn dispatch_table(&self) -> &'static DispatchTable {
        match self {
            Phase::AwaitingProtocol => &PROTOCOL_TABLE,
            Phase::AwaitingKey { .. } => &KEY_TABLE,
            Phase::Operational { .. } => &GAMEPLAY_TABLE,
        }
    }
}

/// Why a frame had no effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("{0} is a non-supported protocol!")]
    UnsupportedProtocol(i32),
    #[error("This is a non-supported protocol!")]
    UnsupportedKey { protocol: i32, key: i32 },
    #[error("empty frame")]
    EmptyFrame,
    #[error("opcode {opcode} is not accepted while {phase}")]
    UnknownOpcode { opcode: u8, phase: &'static str },
    #[error("opcode {opcode} has invalid length {len}")]
    BadLength { opcode: u8, len: usize },
    #[error(transparent)]
    Decode(#[from] ReadError),
    #[error("rate limited")]
    RateLimited,
    #[error("operator privilege required")]
    NotOperator,
    #[error("player already has cells")]
    HasCells,
    #[error("player has no cells")]
    NoCells,
    #[error("connection is closed")]
    Closed,
}

impl Rejection {
    /// Fatal rejections close the connection with a protocol error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Rejection::UnsupportedProtocol(_) | Rejection::UnsupportedKey { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Handled,
    /// Ignored without side effects. The connection stays open.
    Dropped(Rejection),
    /// The session closed the transport.
    Closed,
}

pub struct Session<T: Transport> {
    phase: Phase,
    transport: T,
    player: Player,
    latch: InputLatch,
    chat_limiter: RateLimiter,
    stat_limiter: RateLimiter,
    color_cycle: ColorCycle,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(player: Player, transport: T) -> Self {
        Self {
            phase: Phase::AwaitingProtocol,
            transport,
            player,
            latch: InputLatch::new(),
            chat_limiter: RateLimiter::chat(),
            stat_limiter: RateLimiter::stat(),
            color_cycle: ColorCycle::new(),
            closed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dispatch_table(&self) -> &'static DispatchTable {
        self.phase.dispatch_table()
    }

    pub fn is_operational(&self) -> bool {
        matches!(self.phase, Phase::Operational { .. })
    }

    pub fn protocol(&self) -> Option<i32> {
        match self.phase {
            Phase::AwaitingProtocol => None,
            Phase::AwaitingKey { protocol } | Phase::Operational { protocol, .. } => Some(protocol),
        }
    }

    pub fn handshake_key(&self) -> Option<i32> {
        match self.phase {
            Phase::Operational { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Negotiated string codec, once the handshake is complete.
    pub fn codec(&self) -> Option<StringCodec> {
        match self.phase {
            Phase::Operational { codec, .. } => Some(codec),
            _ => None,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn latch(&self) -> &InputLatch {
        &self.latch
    }

    pub fn color_cycle(&self) -> &ColorCycle {
        &self.color_cycle
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Routes one inbound frame through the active dispatch table.
    pub fn handle_message<W: GameServer>(&mut self, world: &mut W, frame: &[u8]) -> FrameOutcome {
        if self.closed {
            return FrameOutcome::Dropped(Rejection::Closed);
        }
        let Some(&opcode) = frame.first() else {
            return FrameOutcome::Dropped(Rejection::EmptyFrame);
        };

        let table = self.dispatch_table();
        let Some(command) = table.lookup(opcode) else {
            let rejection = Rejection::UnknownOpcode {
                opcode,
                phase: table.name(),
            };
            debug!("Client {}: {}", self.player.id, rejection);
            return FrameOutcome::Dropped(rejection);
        };

        match self.dispatch(command, world, frame) {
            Ok(()) => FrameOutcome::Handled,
            Err(rejection) if rejection.is_fatal() => {
                warn!("Closing client {}: {}", self.player.id, rejection);
                self.close(CLOSE_PROTOCOL_ERROR, &rejection.to_string());
                FrameOutcome::Closed
            }
            Err(rejection) => {
                debug!("Client {} dropped {:?}: {}", self.player.id, command, rejection);
                FrameOutcome::Dropped(rejection)
            }
        }
    }

    fn dispatch<W: GameServer>(
        &mut self,
        command: Command,
        world: &mut W,
        frame: &[u8],
    ) -> Result<(), Rejection> {
        match command {
            Command::Protocol => self.on_protocol(frame),
            Command::HandshakeKey => self.on_handshake_key(world, frame),
            Command::Join => self.on_join(world, frame),
            Command::Spectate => self.on_spectate(frame),
            Command::Mouse => self.on_mouse(frame),
            Command::Split => {
                expect_len(frame, 1)?;
                self.latch.space = true;
                Ok(())
            }
            Command::Eject => {
                expect_len(frame, 1)?;
                self.latch.forward = true;
                Ok(())
            }
            Command::MinionFollow => self.on_minion_follow(frame),
            Command::MinionSplit => {
                self.player.minion.split = true;
                Ok(())
            }
            Command::MinionEject => {
                self.player.minion.eject = true;
                Ok(())
            }
            Command::MinionFreeze => {
                self.player.minion.frozen = !self.player.minion.frozen;
                Ok(())
            }
            Command::MinionCollect => {
                self.player.minion.collect = !self.player.minion.collect;
                Ok(())
            }
            Command::Rainbow => {
                let enabled = self.color_cycle.toggle();
                debug!("Client {} rainbow: {}", self.player.id, enabled);
                Ok(())
            }
            Command::Chat => self.on_chat(world, frame),
            Command::Stat => self.on_stat(world, frame),
            operator_command => operator::run(
                operator_command,
                &mut self.player,
                world,
                &mut rand::thread_rng(),
            ),
        }
    }

    /// Applies everything latched since the previous tick.
    pub fn process<W: GameServer>(&mut self, world: &mut W) {
        let latched = self.latch.take();

        if latched.space {
            world.press_space(&mut self.player);
        }
        if latched.forward {
            world.press_w(&mut self.player);
        }
        if latched.minion_toggle {
            world.press_q(&mut self.player);
        }
        self.player.minion.split = false;
        self.player.minion.eject = false;

        if let Some(frame) = latched.pending_mouse() {
            self.apply_mouse(frame);
        }
    }

    fn apply_mouse(&mut self, frame: &[u8]) {
        match latch::decode_mouse(frame) {
            Ok(Some((x, y))) => {
                self.player.mouse = Vec2::new(
                    f64::from(x) - f64::from(self.player.scramble_x),
                    f64::from(y) - f64::from(self.player.scramble_y),
                );
            }
            Ok(None) => debug!(
                "Client {} latched mouse frame of length {}",
                self.player.id,
                frame.len()
            ),
            Err(e) => debug!("Client {} mouse decode failed: {}", self.player.id, e),
        }
    }

    /// One firing of the color cycle. Does nothing while the effect is off.
    pub fn on_color_tick<W: GameServer>(&mut self, world: &mut W) {
        let Some(color) = self.color_cycle.fire() else {
            return;
        };
        self.player.color = color;
        for &id in &self.player.cells {
            if let Some(cell) = world.node_mut(id) {
                cell.color = color;
            }
        }
    }

    /// Sends a chat line. Ignored until the handshake completes.
    pub fn send_chat(&mut self, message: &ChatMessage) {
        if let Some(codec) = self.codec() {
            self.transport
                .send(&ServerPacket::ChatMessage(message.clone()), codec);
        }
    }

    pub fn close(&mut self, code: u16, reason: &str) {
        if !self.closed {
            self.transport.close(code, reason);
            self.closed = true;
        }
    }

    /// Removes the player's cells from the world, used when the connection goes away.
    pub fn release_cells<W: GameServer>(&mut self, world: &mut W) {
        for id in self.player.cells.drain(..) {
            world.remove_node(id);
        }
    }
}

fn expect_len(frame: &[u8], len: usize) -> Result<(), Rejection> {
    if frame.len() == len {
        Ok(())
    } else {
        Err(bad_length(frame))
    }
}

fn bad_length(frame: &[u8]) -> Rejection {
    Rejection::BadLength {
        opcode: frame.first().copied().unwrap_or_default(),
        len: frame.len(),
    }
}
