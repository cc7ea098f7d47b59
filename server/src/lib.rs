//! # Cell Arena Server Library
//!
//! This library provides the client-input layer of a real-time cell arena
//! server. It accepts binary WebSocket frames from game clients, negotiates a
//! versioned handshake, and turns every later frame into either an immediate
//! effect on the world or input latched until the next simulation tick.
//!
//! ## Core Responsibilities
//!
//! ### Handshake
//! Each connection walks through three phases: awaiting the protocol version,
//! awaiting the handshake key, and operational. Unsupported versions or keys
//! close the socket with WebSocket code 1002. Completion selects the string
//! codec (UCS-2 below protocol 6, UTF-8 otherwise) and sends the welcome
//! packets.
//!
//! ### Input Dispatch
//! Every phase owns a fixed opcode table. Frames whose opcode is missing from
//! the active table, or whose length is wrong, are dropped without closing
//! the connection.
//!
//! ### Tick Flush
//! Split, eject and minion keys plus the newest mouse frame are latched and
//! applied once per tick, in a fixed order.
//!
//! ## Architecture Design
//!
//! ### Single Game Loop
//! Socket reader and writer tasks only move bytes. Frame handling, tick
//! flushes and color cycle firings all run sequentially on one task, so no
//! session state is ever shared between threads.
//!
//! ### Collaborator Traits
//! Sessions reach the simulation through [`world::GameServer`] and the socket
//! through [`transport::Transport`]. The bundled [`game::GameState`] is a
//! minimal in-memory world. Tests swap in [`transport::MemoryTransport`].
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Handshake state machine, dispatch tables, frame handlers and operator keys.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection admission, frame routing, per-tick flushing and chat fan-out.
//!
//! ### Network Module (`network`)
//! WebSocket listener, connection tasks and the main `tokio::select!` loop.
//!
//! ### Supporting Modules
//! - `latch`: per-tick input latch and mouse frame decoding
//! - `rate_limit`: tick-based cooldowns for chat and stat requests
//! - `nickname`: `<skin>name` parsing
//! - `color_cycle`: the rainbow effect gradient
//! - `config`: JSON configuration and the random skin list
//! - `player`, `world`, `game`, `transport`: entities and collaborators
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Config;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let mut server = Server::new("127.0.0.1:8080", config, Vec::new()).await?;
//!
//!     // Accepts connections, routes frames and ticks until shut down
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod color_cycle;
pub mod config;
pub mod game;
pub mod latch;
pub mod network;
pub mod nickname;
pub mod player;
pub mod rate_limit;
pub mod session;
pub mod transport;
pub mod world;
