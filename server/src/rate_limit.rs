//! Tick-based cooldowns for chat and stat requests.

/// Minimum tick gap between two accepted chat messages.
pub const CHAT_COOLDOWN_TICKS: u64 = 20;
/// Minimum tick gap between two accepted stat requests.
pub const STAT_COOLDOWN_TICKS: u64 = 30;

/// Cooldown keyed by the simulation tick counter.
///
/// Every attempt stamps the current tick, accepted or not. A client sending
/// faster than the cooldown therefore never gets through until it backs off
/// for a full window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiter {
    cooldown: u64,
    last: u64,
}

impl RateLimiter {
    pub fn new(cooldown: u64) -> Self {
        Self { cooldown, last: 0 }
    }

    pub fn chat() -> Self {
        Self::new(CHAT_COOLDOWN_TICKS)
    }

    pub fn stat() -> Self {
        Self::new(STAT_COOLDOWN_TICKS)
    }

    /// Records an attempt at `tick`. Returns whether it is allowed.
    pub fn try_acquire(&mut self, tick: u64) -> bool {
        let elapsed = tick.saturating_sub(self.last);
        self.last = tick;
        elapsed >= self.cooldown
    }

    pub fn last_tick(&self) -> u64 {
        self.last
    }

    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }
}
