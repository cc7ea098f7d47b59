//! Server network layer handling WebSocket connections and game loop coordination

use crate::client_manager::ClientManager;
use crate::color_cycle::COLOR_CYCLE_PERIOD;
use crate::config::Config;
use crate::game::GameState;
use crate::session::FrameOutcome;
use crate::transport::{ChannelTransport, Outgoing, Transport, CLOSE_TRY_AGAIN_LATER};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        client_id: u32,
        addr: SocketAddr,
        transport: ChannelTransport,
    },
    Frame {
        client_id: u32,
        data: Vec<u8>,
    },
    Disconnected {
        client_id: u32,
    },
    Shutdown,
}

/// Main server coordinating networking and the input layer
pub struct Server {
    listener: Arc<TcpListener>,
    clients: ClientManager<ChannelTransport>,
    game_state: GameState,
    tick_duration: Duration,
    client_timeout: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    /// Flipped to `true` when the main loop stops, which ends the acceptor
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: Config,
        skins: Vec<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = Arc::new(TcpListener::bind(addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let clients = ClientManager::new(config.max_connections, config.scramble_limit)
            .with_operators(config.operator_ips.clone());

        Ok(Server {
            listener,
            clients,
            tick_duration: Duration::from_millis(config.tick_ms.max(1)),
            client_timeout: Duration::from_secs(config.server_timeout),
            game_state: GameState::new(config, skins),
            server_tx,
            server_rx,
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Sender into the main loop. Sending [`ServerMessage::Shutdown`] stops [`Server::run`].
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn clients(&self) -> &ClientManager<ChannelTransport> {
        &self.clients
    }

    /// Spawns task that accepts TCP connections and hands them to connection tasks
    fn spawn_acceptor(&self) -> tokio::task::JoinHandle<()> {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut next_client_id: u32 = 1;

            loop {
                let accepted = tokio::select! {
                    accepted = listener.accept() => accepted,
                    // Also resolves once the server is dropped
                    _ = shutdown_rx.changed() => break,
                };

                match accepted {
                    Ok((stream, addr)) => {
                        let client_id = next_client_id;
                        next_client_id = next_client_id.wrapping_add(1).max(1);
                        tokio::spawn(Self::serve_connection(
                            stream,
                            addr,
                            client_id,
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
            debug!("Acceptor stopped");
        })
    }

    /// Runs one connection: WebSocket upgrade, then a reader loop and a writer task
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        client_id: u32,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };
        let (mut sink, mut source) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let transport = ChannelTransport::new(client_id, out_tx);
        if server_tx
            .send(ServerMessage::Connected {
                client_id,
                addr,
                transport,
            })
            .is_err()
        {
            return;
        }

        tokio::spawn(async move {
            while let Some(outgoing) = out_rx.recv().await {
                let result = match outgoing {
                    Outgoing::Frame(bytes) => sink.send(Message::Binary(bytes)).await,
                    Outgoing::Close { code, reason } => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            debug!("Client {} close frame not sent: {}", client_id, e);
                        }
                        break;
                    }
                };
                if let Err(e) = result {
                    debug!("Client {} write failed: {}", client_id, e);
                    break;
                }
            }
        });

        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    if server_tx
                        .send(ServerMessage::Frame { client_id, data })
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                // Text frames, pings and pongs carry no input
                Ok(_) => {}
                Err(e) => {
                    debug!("Client {} read failed: {}", client_id, e);
                    break;
                }
            }
        }

        if let Err(e) = server_tx.send(ServerMessage::Disconnected { client_id }) {
            debug!("Main loop gone before client {} disconnect: {}", client_id, e);
        }
    }

    /// Applies one message from a connection task
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                client_id,
                addr,
                transport,
            } => {
                if let Err(mut transport) = self.clients.add_client(client_id, addr, transport) {
                    warn!("Rejecting client {} from {}: server full", client_id, addr);
                    transport.close(CLOSE_TRY_AGAIN_LATER, "Server is full");
                }
            }
            ServerMessage::Frame { client_id, data } => {
                let outcome = self
                    .clients
                    .handle_frame(client_id, &mut self.game_state, &data);
                if outcome == Some(FrameOutcome::Closed) {
                    self.drop_client(client_id);
                }
            }
            ServerMessage::Disconnected { client_id } => self.drop_client(client_id),
            ServerMessage::Shutdown => {}
        }
    }

    fn drop_client(&mut self, client_id: u32) {
        if let Some(mut client) = self.clients.remove_client(&client_id) {
            client.session.release_cells(&mut self.game_state);
        }
    }

    /// Advances one tick: flush latched input, then deliver queued chat
    fn on_tick(&mut self) {
        self.game_state.tick += 1;
        self.game_state.set_player_counts(self.clients.player_counts());
        self.clients.process_tick(&mut self.game_state);

        let chat = self.game_state.drain_chat();
        if !chat.is_empty() {
            self.clients.deliver_chat(chat);
        }

        let moved = self.game_state.drain_moved();
        if !moved.is_empty() {
            debug!("Tick {}: {} nodes re-indexed", self.game_state.tick, moved.len());
        }

        if self.game_state.tick % 250 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} clients, {} nodes",
                self.game_state.tick,
                self.clients.len(),
                self.game_state.node_count()
            );
        }
    }

    fn check_timeouts(&mut self) {
        for mut client in self.clients.check_timeouts(self.client_timeout) {
            info!("Client {} timed out", client.id);
            client.session.release_cells(&mut self.game_state);
        }
    }

    /// Main server loop coordinating all operations
    ///
    /// Network events, ticks and color cycle firings all run on this task,
    /// so session state is never touched concurrently.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let acceptor = self.spawn_acceptor();

        let mut tick_interval = interval(self.tick_duration);
        let mut color_interval = interval(COLOR_CYCLE_PERIOD);
        let mut timeout_interval = interval(Duration::from_secs(1));

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = tick_interval.tick() => self.on_tick(),

                _ = color_interval.tick() => self.clients.color_tick(&mut self.game_state),

                _ = timeout_interval.tick() => self.check_timeouts(),
            }
        }

        self.shutdown_tx.send_replace(true);
        if let Err(e) = acceptor.await {
            error!("Acceptor task failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{frames, opcode, StringCodec};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40000)
    }

    async fn test_server(config: Config) -> Server {
        Server::new("127.0.0.1:0", config, Vec::new()).await.unwrap()
    }

    fn connect(
        server: &mut Server,
        client_id: u32,
    ) -> mpsc::UnboundedReceiver<Outgoing> {
        let (tx, rx) = mpsc::unbounded_channel();
        server.handle_message(ServerMessage::Connected {
            client_id,
            addr: test_addr(),
            transport: ChannelTransport::new(client_id, tx),
        });
        rx
    }

    fn frame(server: &mut Server, client_id: u32, data: Vec<u8>) {
        server.handle_message(ServerMessage::Frame { client_id, data });
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<Outgoing> {
        let mut out = Vec::new();
        while let Ok(outgoing) = rx.try_recv() {
            out.push(outgoing);
        }
        out
    }

    #[tokio::test]
    async fn test_handshake_over_channels() {
        let mut server = test_server(Config::default()).await;
        let mut rx = connect(&mut server, 1);

        frame(&mut server, 1, frames::protocol(8).unwrap());
        frame(&mut server, 1, frames::handshake_key(0).unwrap());

        let out = drain(&mut rx);
        // ClearAll, SetBorder, banner, welcome1
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], Outgoing::Frame(vec![opcode::CLEAR_ALL]));
        match &out[1] {
            Outgoing::Frame(bytes) => assert_eq!(bytes[0], opcode::SET_BORDER),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_full_closes_with_try_again() {
        let config = Config {
            max_connections: 1,
            ..Config::default()
        };
        let mut server = test_server(config).await;
        let _first = connect(&mut server, 1);
        let mut second = connect(&mut server, 2);

        assert_eq!(server.clients().len(), 1);
        assert_eq!(
            drain(&mut second),
            vec![Outgoing::Close {
                code: 1013,
                reason: "Server is full".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_protocol_violation_drops_client() {
        let mut server = test_server(Config::default()).await;
        let mut rx = connect(&mut server, 1);

        frame(&mut server, 1, frames::protocol(42).unwrap());

        assert!(server.clients().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![Outgoing::Close {
                code: 1002,
                reason: "42 is a non-supported protocol!".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_timeout_closes_socket() {
        let mut server = test_server(Config::default()).await;
        let mut rx = connect(&mut server, 1);
        frame(&mut server, 1, frames::protocol(8).unwrap());
        frame(&mut server, 1, frames::handshake_key(0).unwrap());
        frame(&mut server, 1, frames::join("Alice", StringCodec::Utf8));
        drain(&mut rx);

        server.clients.get_mut(1).unwrap().last_seen =
            std::time::Instant::now() - Duration::from_secs(10_000);
        server.check_timeouts();

        assert!(server.clients().is_empty());
        assert_eq!(server.game_state().node_count(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![Outgoing::Close {
                code: 1000,
                reason: "Connection timeout".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_acceptor() {
        let server = test_server(Config::default()).await;
        let acceptor = server.spawn_acceptor();

        server.shutdown_tx.send_replace(true);

        assert!(tokio::time::timeout(Duration::from_secs(2), acceptor)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_releases_cells() {
        let mut server = test_server(Config::default()).await;
        let _rx = connect(&mut server, 1);
        frame(&mut server, 1, frames::protocol(8).unwrap());
        frame(&mut server, 1, frames::handshake_key(0).unwrap());
        frame(&mut server, 1, frames::join("Alice", StringCodec::Utf8));
        assert_eq!(server.game_state().node_count(), 1);

        server.handle_message(ServerMessage::Disconnected { client_id: 1 });

        assert!(server.clients().is_empty());
        assert_eq!(server.game_state().node_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_flushes_and_delivers_chat() {
        let mut server = test_server(Config::default()).await;
        let mut alice = connect(&mut server, 1);
        let mut bob = connect(&mut server, 2);
        for id in [1, 2] {
            frame(&mut server, id, frames::protocol(8).unwrap());
            frame(&mut server, id, frames::handshake_key(0).unwrap());
        }
        drain(&mut alice);
        drain(&mut bob);

        server.game_state.tick = 100;
        frame(&mut server, 1, frames::chat(0, "hi all", StringCodec::Utf8));
        frame(&mut server, 1, frames::mouse_i32(10, 20).unwrap());
        assert!(drain(&mut bob).is_empty());

        server.on_tick();

        assert_eq!(server.game_state().tick, 101);
        assert_eq!(drain(&mut alice).len(), 1);
        assert_eq!(drain(&mut bob).len(), 1);
        let player = server.clients().get(1).unwrap().session.player();
        assert_eq!((player.mouse.x, player.mouse.y), (10.0, 20.0));
    }

    #[tokio::test]
    async fn test_websocket_handshake_end_to_end() {
        let mut server = test_server(Config::default()).await;
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let running = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        ws.send(Message::Binary(frames::protocol(8).unwrap())).await.unwrap();
        ws.send(Message::Binary(frames::handshake_key(0).unwrap())).await.unwrap();

        let first = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Binary(bytes) => break bytes,
                _ => continue,
            }
        };
        assert_eq!(first, vec![opcode::CLEAR_ALL]);

        handle.send(ServerMessage::Shutdown).unwrap();
        running.await.unwrap();
    }
}
