use super::{expect_len, Phase, Rejection, Session};
use crate::transport::Transport;
use crate::world::GameServer;
use log::{debug, info};
use shared::{BinaryReader, ChatMessage, ServerPacket, StringCodec, MAX_PROTOCOL, MIN_PROTOCOL};

/// Protocols above this one must present a zero handshake key.
const KEYLESS_PROTOCOL_MAX: i32 = 6;

/// `[opcode][value i32]`
fn read_handshake_value(frame: &[u8]) -> Result<i32, Rejection> {
    expect_len(frame, 5)?;
    let mut reader = BinaryReader::new(frame);
    reader.skip_bytes(1);
    Ok(reader.read_i32()?)
}

impl<T: Transport> Session<T> {
    pub(super) fn on_protocol(&mut self, frame: &[u8]) -> Result<(), Rejection> {
        let protocol = read_handshake_value(frame)?;
        if !(MIN_PROTOCOL..=MAX_PROTOCOL).contains(&protocol) {
            return Err(Rejection::UnsupportedProtocol(protocol));
        }

        debug!("Client {} requested protocol {}", self.player.id, protocol);
        self.phase = Phase::AwaitingKey { protocol };
        Ok(())
    }

    pub(super) fn on_handshake_key<W: GameServer>(
        &mut self,
        world: &mut W,
        frame: &[u8],
    ) -> Result<(), Rejection> {
        // Only reachable through the key table, which only AwaitingKey installs
        let Phase::AwaitingKey { protocol } = self.phase else {
            return Ok(());
        };
        let key = read_handshake_value(frame)?;
        if protocol > KEYLESS_PROTOCOL_MAX && key != 0 {
            return Err(Rejection::UnsupportedKey { protocol, key });
        }

        self.complete_handshake(world, protocol, key);
        Ok(())
    }

    fn complete_handshake<W: GameServer>(&mut self, world: &mut W, protocol: i32, key: i32) {
        let codec = StringCodec::for_protocol(protocol);
        self.phase = Phase::Operational {
            protocol,
            key,
            codec,
        };

        let config = world.config();
        let banner = format!("{} {}", config.server_name, world.version());
        let mut lines = vec![banner.clone()];
        lines.extend(
            [&config.server_welcome1, &config.server_welcome2]
                .into_iter()
                .filter(|line| !line.is_empty())
                .cloned(),
        );
        if !config.server_chat {
            lines.push("The chat is disabled.".to_string());
        }

        self.transport.send(&ServerPacket::ClearAll, codec);
        self.transport.send(
            &ServerPacket::SetBorder {
                border: world.border(),
                game_type: world.game_mode_id(),
                server_name: Some(banner),
            },
            codec,
        );
        for line in lines {
            self.transport
                .send(&ServerPacket::ChatMessage(ChatMessage::server(line)), codec);
        }

        info!(
            "Client {} completed handshake (protocol {}, {:?})",
            self.player.id, protocol, codec
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::game::GameState;
    use crate::player::Player;
    use crate::session::{FrameOutcome, Phase, Rejection, Session};
    use crate::transport::MemoryTransport;
    use crate::world::GameServer;
    use shared::{frames, ServerPacket, StringCodec};

    fn world_with(config: Config) -> GameState {
        GameState::with_seed(config, Vec::new(), 3)
    }

    fn session() -> Session<MemoryTransport> {
        Session::new(Player::new(4), MemoryTransport::new())
    }

    fn chat_lines(session: &Session<MemoryTransport>) -> Vec<String> {
        session
            .transport()
            .packets()
            .filter_map(|packet| match packet {
                ServerPacket::ChatMessage(message) => Some(message.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_protocol_out_of_range_closes() {
        for version in [0u32, 18, 1000] {
            let mut world = world_with(Config::default());
            let mut session = session();

            let outcome = session.handle_message(&mut world, &frames::protocol(version).unwrap());

            assert_eq!(outcome, FrameOutcome::Closed);
            assert_eq!(
                session.transport().closed,
                Some((1002, format!("{} is a non-supported protocol!", version)))
            );
            assert!(session.is_closed());
            assert_eq!(session.phase(), Phase::AwaitingProtocol);
        }
    }

    #[test]
    fn test_protocol_reads_signed_value() {
        let mut world = world_with(Config::default());
        let mut session = session();

        session.handle_message(&mut world, &frames::protocol(u32::MAX).unwrap());

        assert_eq!(
            session.transport().closed,
            Some((1002, "-1 is a non-supported protocol!".to_string()))
        );
    }

    #[test]
    fn test_protocol_bounds_accepted() {
        for version in [1u32, 17] {
            let mut world = world_with(Config::default());
            let mut session = session();
            assert_eq!(
                session.handle_message(&mut world, &frames::protocol(version).unwrap()),
                FrameOutcome::Handled
            );
            assert_eq!(
                session.phase(),
                Phase::AwaitingKey {
                    protocol: version as i32
                }
            );
        }
    }

    #[test]
    fn test_protocol_wrong_length_ignored() {
        let mut world = world_with(Config::default());
        let mut session = session();

        let outcome = session.handle_message(&mut world, &[254, 7, 0, 0]);

        assert!(matches!(outcome, FrameOutcome::Dropped(Rejection::BadLength { len: 4, .. })));
        assert_eq!(session.phase(), Phase::AwaitingProtocol);
        assert!(session.transport().closed.is_none());
    }

    #[test]
    fn test_key_wrong_length_ignored() {
        let mut world = world_with(Config::default());
        let mut session = session();
        session.handle_message(&mut world, &frames::protocol(8).unwrap());

        let mut long_key = frames::handshake_key(0).unwrap();
        long_key.push(0);
        for (frame, len) in [(vec![255, 0, 0, 0], 4), (long_key, 6)] {
            let outcome = session.handle_message(&mut world, &frame);

            assert_eq!(
                outcome,
                FrameOutcome::Dropped(Rejection::BadLength { opcode: 255, len })
            );
            assert_eq!(session.phase(), Phase::AwaitingKey { protocol: 8 });
            assert!(session.transport().closed.is_none());
            assert!(session.transport().sent.is_empty());
        }

        session.handle_message(&mut world, &frames::handshake_key(0).unwrap());
        assert!(session.is_operational());
    }

    #[test]
    fn test_key_before_protocol_ignored() {
        let mut world = world_with(Config::default());
        let mut session = session();

        let outcome = session.handle_message(&mut world, &frames::handshake_key(0).unwrap());

        assert!(matches!(outcome, FrameOutcome::Dropped(Rejection::UnknownOpcode { .. })));
        assert_eq!(session.phase(), Phase::AwaitingProtocol);
    }

    #[test]
    fn test_nonzero_key_on_new_protocol_closes() {
        let mut world = world_with(Config::default());
        let mut session = session();
        session.handle_message(&mut world, &frames::protocol(7).unwrap());

        let outcome = session.handle_message(&mut world, &frames::handshake_key(1).unwrap());

        assert_eq!(outcome, FrameOutcome::Closed);
        assert_eq!(
            session.transport().closed,
            Some((1002, "This is a non-supported protocol!".to_string()))
        );
        assert!(session.transport().sent.is_empty());
    }

    #[test]
    fn test_old_protocol_accepts_any_key() {
        let mut world = world_with(Config::default());
        let mut session = session();
        session.handle_message(&mut world, &frames::protocol(5).unwrap());
        session.handle_message(&mut world, &frames::handshake_key(12345).unwrap());

        assert_eq!(session.protocol(), Some(5));
        assert_eq!(session.handshake_key(), Some(12345));
        assert_eq!(session.codec(), Some(StringCodec::Ucs2));
    }

    #[test]
    fn test_completion_sends_welcome_in_order() {
        let config = Config {
            server_name: "Arena".to_string(),
            server_welcome1: "Hello".to_string(),
            server_welcome2: String::new(),
            server_chat: false,
            ..Config::default()
        };
        let mut world = world_with(config);
        let mut session = session();
        session.handle_message(&mut world, &frames::protocol(9).unwrap());
        session.handle_message(&mut world, &frames::handshake_key(0).unwrap());

        let packets: Vec<&ServerPacket> = session.transport().packets().collect();
        assert_eq!(packets[0], &ServerPacket::ClearAll);
        match packets[1] {
            ServerPacket::SetBorder {
                border,
                game_type,
                server_name,
            } => {
                assert_eq!(*border, world.border());
                assert_eq!(*game_type, 0);
                assert_eq!(
                    server_name.as_deref(),
                    Some(format!("Arena {}", world.version()).as_str())
                );
            }
            other => panic!("expected SetBorder, got {:?}", other),
        }
        assert_eq!(
            chat_lines(&session),
            vec![
                format!("Arena {}", world.version()),
                "Hello".to_string(),
                "The chat is disabled.".to_string(),
            ]
        );
        assert!(session
            .transport()
            .sent
            .iter()
            .all(|(_, codec)| *codec == StringCodec::Utf8));
    }

    #[test]
    fn test_handshake_is_final() {
        let mut world = world_with(Config::default());
        let mut session = session();
        session.handle_message(&mut world, &frames::protocol(7).unwrap());
        session.handle_message(&mut world, &frames::handshake_key(0).unwrap());
        let sent = session.transport().sent.len();

        // 254 is the stat request once operational
        session.handle_message(&mut world, &frames::protocol(3).unwrap());
        session.handle_message(&mut world, &frames::handshake_key(5).unwrap());

        assert_eq!(session.protocol(), Some(7));
        assert_eq!(session.handshake_key(), Some(0));
        assert_eq!(session.transport().sent.len(), sent);
        assert!(session.transport().closed.is_none());
    }
}
