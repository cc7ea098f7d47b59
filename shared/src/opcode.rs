//! Opcode bytes. The client values 254 and 255 mean different things
//! depending on the handshake phase.

// Client -> server
pub const JOIN: u8 = 0;
pub const SPECTATE: u8 = 1;
pub const MOUSE: u8 = 16;
pub const SPLIT: u8 = 17;
pub const KEY_Q: u8 = 18;
pub const EJECT: u8 = 21;
pub const KEY_E: u8 = 22;
pub const KEY_R: u8 = 23;
pub const KEY_T: u8 = 24;
pub const KEY_P: u8 = 25;
pub const KEY_O: u8 = 26;
pub const KEY_M: u8 = 27;
pub const KEY_I: u8 = 28;
pub const KEY_K: u8 = 29;
pub const KEY_Y: u8 = 30;
pub const KEY_U: u8 = 31;
pub const KEY_L: u8 = 33;
pub const KEY_H: u8 = 34;
pub const KEY_Z: u8 = 35;
pub const KEY_X: u8 = 36;
pub const KEY_S: u8 = 37;
pub const KEY_C: u8 = 38;
pub const KEY_G: u8 = 39;
pub const KEY_J: u8 = 40;
pub const KEY_B: u8 = 41;
pub const KEY_V: u8 = 42;
pub const KEY_N: u8 = 43;
pub const CHAT: u8 = 99;
/// Stat request once operational.
pub const STAT: u8 = 254;
/// Protocol select during the handshake.
pub const PROTOCOL: u8 = 254;
pub const HANDSHAKE_KEY: u8 = 255;

// Server -> client
pub const CLEAR_ALL: u8 = 0x12;
pub const SET_BORDER: u8 = 0x40;
pub const CHAT_MESSAGE: u8 = 0x63;
pub const SERVER_STAT: u8 = 0xFE;
