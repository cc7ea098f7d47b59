//! Per-tick input latch.
//!
//! Frame handlers write intents here as they arrive. Once per tick the
//! session drains the latch with [`InputLatch::take`] and applies what it finds.
//! Only the newest mouse frame is kept.

use shared::{BinaryReader, ReadError};

/// Mouse payload layouts, told apart by total frame length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEncoding {
    /// `[16][x i16][y i16][id u32]`
    Int16,
    /// `[16][x i32][y i32][id u32]`
    Int32,
    /// `[16][x f64][y f64][id u32]`, truncated toward zero
    Float64,
}

impl MouseEncoding {
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            9 => Some(MouseEncoding::Int16),
            13 => Some(MouseEncoding::Int32),
            21 => Some(MouseEncoding::Float64),
            _ => None,
        }
    }
}

/// Decodes the raw cursor coordinates of a mouse frame.
///
/// Returns `Ok(None)` for a length that matches no layout.
pub fn decode_mouse(frame: &[u8]) -> Result<Option<(i32, i32)>, ReadError> {
    let Some(encoding) = MouseEncoding::from_len(frame.len()) else {
        return Ok(None);
    };

    let mut reader = BinaryReader::new(frame);
    reader.skip_bytes(1);

    let coords = match encoding {
        MouseEncoding::Int16 => (
            i32::from(reader.read_i16()?),
            i32::from(reader.read_i16()?),
        ),
        MouseEncoding::Int32 => (reader.read_i32()?, reader.read_i32()?),
        // `as` truncates toward zero and saturates out-of-range values
        MouseEncoding::Float64 => (reader.read_f64()? as i32, reader.read_f64()? as i32),
    };
    Ok(Some(coords))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputLatch {
    pub space: bool,
    pub forward: bool,
    pub minion_toggle: bool,
    mouse: Option<Vec<u8>>,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending mouse frame with `frame`.
    pub fn set_mouse(&mut self, frame: &[u8]) {
        match &mut self.mouse {
            Some(buf) => {
                buf.clear();
                buf.extend_from_slice(frame);
            }
            None => self.mouse = Some(frame.to_vec()),
        }
    }

    pub fn pending_mouse(&self) -> Option<&[u8]> {
        self.mouse.as_deref()
    }

    /// Returns everything latched so far and leaves the latch empty.
    pub fn take(&mut self) -> InputLatch {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        !self.space && !self.forward && !self.minion_toggle && self.mouse.is_none()
    }
}
