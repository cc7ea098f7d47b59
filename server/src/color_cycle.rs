//! Rainbow effect: cycles a player's color through a fixed gradient.
//!
//! Firing is driven by the server loop on its own 40 ms interval, on the same
//! task that runs ticks, so color writes never interleave with a tick.

use shared::Color;
use std::time::Duration;

pub const COLOR_CYCLE_PERIOD: Duration = Duration::from_millis(40);

/// Red -> orange -> yellow -> green -> blue -> indigo -> violet.
pub const GRADIENT: [Color; 28] = [
    Color::new(255, 0, 0),
    Color::new(255, 32, 0),
    Color::new(255, 64, 0),
    Color::new(255, 96, 0),
    Color::new(255, 128, 0),
    Color::new(255, 160, 0),
    Color::new(255, 192, 0),
    Color::new(255, 224, 0),
    Color::new(255, 255, 0),
    Color::new(192, 255, 0),
    Color::new(128, 255, 0),
    Color::new(64, 255, 0),
    Color::new(0, 255, 0),
    Color::new(0, 192, 64),
    Color::new(0, 128, 128),
    Color::new(0, 64, 192),
    Color::new(0, 0, 255),
    Color::new(18, 0, 192),
    Color::new(37, 0, 128),
    Color::new(56, 0, 64),
    Color::new(75, 0, 130),
    Color::new(92, 0, 161),
    Color::new(109, 0, 192),
    Color::new(126, 0, 223),
    Color::new(143, 0, 255),
    Color::new(171, 0, 192),
    Color::new(199, 0, 128),
    Color::new(227, 0, 64),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorCycle {
    enabled: bool,
    phase: usize,
}

impl ColorCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the effect and returns the new state. The phase is kept.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    /// Color for this firing, or `None` while disabled.
    pub fn fire(&mut self) -> Option<Color> {
        if !self.enabled {
            return None;
        }
        let color = GRADIENT[self.phase];
        self.phase = (self.phase + 1) % GRADIENT.len();
        Some(color)
    }
}
