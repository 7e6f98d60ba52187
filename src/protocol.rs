//! Line-oriented wire protocol.
//!
//! Every message is one newline-terminated line of text. This module is a
//! pure codec shared by both ends of the connection:
//! - [`Command`]: client → server requests, decoded on the server and encoded
//!   by clients.
//! - [`ServerLine`]: server → client replies and notices, encoded on the server
//!   and decoded by clients.
//!
//! Decoding is total. Input that matches nothing becomes an explicit
//! sentinel (`Command::Unrecognized`, `ServerLine::Other`) rather than an
//! error, and encoding a value always yields the same text.

mod command;
mod server_line;

pub use command::{Command, Direction, decode_handshake, encode_handshake};
pub use server_line::{ChatTarget, ServerLine};

/// First line a server sends after a valid handshake.
pub const WELCOME: &str = "Welcome to DOD";

/// Farewell sent before the server closes a connection.
pub const FAREWELL: &str = "bye bye";
