// Allow unwrap in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Dungeons of Doom: an authoritative multiplayer dungeon-crawl server.
//!
//! Players connect over TCP, identify as `human` or `bot`, and then send
//! one-line commands to move through a shared dungeon, collect gold and
//! reach an exit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   server: accept, reader/writer     │
//! ├─────────────────────────────────────┤
//! │   protocol: Command / ServerLine    │
//! ├─────────────────────────────────────┤
//! │   game: SharedEngine → GameEngine   │
//! │         TileMap, PlayerSession      │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use error::{EngineError, MapFormatError, ServerError};

// Re-export key game types at crate root for convenience
pub use game::{GameEngine, PlayerId, PlayerKind, SharedEngine, TileMap};
