use super::{bad_length, expect_len, Rejection, Session};
use crate::latch::MouseEncoding;
use crate::nickname;
use crate::transport::Transport;
use crate::world::GameServer;
use log::debug;
use shared::{frames, BinaryReader, ServerPacket, StringCodec};

/// Shortest chat frame: opcode, flags and a terminator.
const MIN_CHAT_LEN: usize = 3;

/// Turns raw join text into the name and skin handed to the world.
fn resolve_nickname<W: GameServer>(world: &W, text: &str) -> (String, Option<String>) {
    let parsed = nickname::parse(text);
    let config = world.config();
    let name = nickname::truncate(parsed.name, config.player_max_nick);

    if config.filter_bad_words && world.check_bad_word(&name) {
        return (String::new(), None);
    }
    let skin = parsed
        .skin
        .resolve(world.random_skins(), &mut rand::thread_rng());
    (name, skin)
}

impl<T: Transport> Session<T> {
    fn string_codec(&self) -> StringCodec {
        self.codec().unwrap_or(StringCodec::Utf8)
    }

    pub(super) fn on_join<W: GameServer>(
        &mut self,
        world: &mut W,
        frame: &[u8],
    ) -> Result<(), Rejection> {
        if self.player.is_alive() {
            return Err(Rejection::HasCells);
        }

        let mut reader = BinaryReader::new(frame);
        reader.skip_bytes(1);
        let text = reader.read_string(self.string_codec());

        let (name, skin) = resolve_nickname(world, &text);
        world.join_game(&mut self.player, name, skin);
        Ok(())
    }

    pub(super) fn on_spectate(&mut self, frame: &[u8]) -> Result<(), Rejection> {
        expect_len(frame, 1)?;
        if self.player.is_alive() {
            return Err(Rejection::HasCells);
        }
        self.player.is_spectating = true;
        Ok(())
    }

    pub(super) fn on_mouse(&mut self, frame: &[u8]) -> Result<(), Rejection> {
        if MouseEncoding::from_len(frame.len()).is_none() {
            return Err(bad_length(frame));
        }
        self.latch.set_mouse(frame);
        Ok(())
    }

    pub(super) fn on_minion_follow(&mut self, frame: &[u8]) -> Result<(), Rejection> {
        expect_len(frame, 1)?;
        if self.player.is_alive() {
            self.player.minion.follow = !self.player.minion.follow;
        }
        self.latch.minion_toggle = true;
        Ok(())
    }

    /// `[99][flags][reserved...][text]`
    pub(super) fn on_chat<W: GameServer>(
        &mut self,
        world: &mut W,
        frame: &[u8],
    ) -> Result<(), Rejection> {
        if frame.len() < MIN_CHAT_LEN {
            return Err(bad_length(frame));
        }
        // Stamped before the reserved-bytes check
        if !self.chat_limiter.try_acquire(world.tick_count()) {
            return Err(Rejection::RateLimited);
        }

        let reserved = frames::reserved_len(frame[1]);
        if frame.len() < MIN_CHAT_LEN + reserved {
            return Err(bad_length(frame));
        }

        let mut reader = BinaryReader::new(frame);
        reader.skip_bytes(2 + reserved);
        let text = reader.read_string(self.string_codec());
        debug!("Client {} chat: {:?}", self.player.id, text);
        world.on_chat_message(&self.player, &text);
        Ok(())
    }

    pub(super) fn on_stat<W: GameServer>(
        &mut self,
        world: &mut W,
        frame: &[u8],
    ) -> Result<(), Rejection> {
        expect_len(frame, 1)?;
        if !self.stat_limiter.try_acquire(world.tick_count()) {
            return Err(Rejection::RateLimited);
        }

        let codec = self.string_codec();
        self.transport
            .send(&ServerPacket::ServerStat(world.server_stat()), codec);
        Ok(())
    }
}
