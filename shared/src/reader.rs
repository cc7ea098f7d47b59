//! Sequential little-endian reader over a raw client frame.

use thiserror::Error;

/// Failure to decode a field from a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("frame too short: {needed} bytes needed at offset {offset}, frame is {len} bytes")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        len: usize,
    },
}

/// Text encoding negotiated during the handshake.
///
/// Protocols below 6 send zero-terminated UCS-2 (16-bit code units), newer
/// ones send zero-terminated UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCodec {
    Ucs2,
    Utf8,
}

impl StringCodec {
    pub fn for_protocol(protocol: i32) -> Self {
        if protocol < 6 {
            StringCodec::Ucs2
        } else {
            StringCodec::Utf8
        }
    }
}

/// Cursor over a byte buffer. Advances as it reads.
///
/// Callers are expected to validate the total frame length before reading.
/// Numeric reads past the end fail with [`ReadError`] rather than panicking.
/// String reads stop at the terminator or at the end of the buffer.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn skip_bytes(&mut self, count: usize) {
        self.offset = self.offset.saturating_add(count);
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let eof = ReadError::UnexpectedEof {
            offset: self.offset,
            needed: N,
            len: self.data.len(),
        };
        let end = self.offset.checked_add(N).ok_or_else(|| eof.clone())?;
        let bytes = self.data.get(self.offset..end).ok_or(eof)?;

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.offset = end;
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.offset..).unwrap_or(&[])
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ReadError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Reads 16-bit code units up to a zero unit. A trailing odd byte is ignored.
    pub fn read_string_zero_unicode(&mut self) -> String {
        let rest = self.rest();
        let mut units = Vec::with_capacity(rest.len() / 2);
        let mut consumed = 0;

        for pair in rest.chunks_exact(2) {
            consumed += 2;
            let unit = u16::from_le_bytes([pair[0], pair[1]]);
            if unit == 0 {
                break;
            }
            units.push(unit);
        }

        self.offset += consumed;
        String::from_utf16_lossy(&units)
    }

    /// Reads UTF-8 bytes up to a zero byte. Invalid sequences are replaced.
    pub fn read_string_zero_utf8(&mut self) -> String {
        let rest = self.rest();
        let (text, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };

        self.offset += consumed;
        String::from_utf8_lossy(text).into_owned()
    }

    /// Reads a text field in the negotiated encoding.
    pub fn read_string(&mut self, codec: StringCodec) -> String {
        match codec {
            StringCodec::Ucs2 => self.read_string_zero_unicode(),
            StringCodec::Utf8 => self.read_string_zero_utf8(),
        }
    }
}
