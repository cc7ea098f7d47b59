//! Little-endian frame builder.
//!
//! Fixed-width records go through `bincode`, whose default encoding is
//! fixed-size little-endian integers with no padding, so a `#[derive(Serialize)]`
//! struct lays out exactly as the wire expects.

use crate::reader::StringCodec;
use serde::Serialize;

#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends a fixed-layout record.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> bincode::Result<()> {
        bincode::serialize_into(&mut self.buf, record)
    }

    pub fn write_string_zero_utf8(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(0);
    }

    pub fn write_string_zero_unicode(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        self.buf.extend_from_slice(&[0, 0]);
    }

    pub fn write_string(&mut self, text: &str, codec: StringCodec) {
        match codec {
            StringCodec::Ucs2 => self.write_string_zero_unicode(text),
            StringCodec::Utf8 => self.write_string_zero_utf8(text),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
