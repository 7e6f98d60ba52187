//! Game layer for Dungeons of Doom.
//!
//! Implements the rules of the dungeon crawl:
//! - Tile map loading and look windows
//! - Player sessions and username rules
//! - The engine that executes commands and broadcasts events
//! - A shared handle that serializes access across threads

mod engine;
mod invariants;
mod map;
mod player;
mod shared;
mod username;

pub use engine::{GameEngine, PlayerSummary, Reply};
pub use invariants::{InvariantViolation, check_invariants};
pub use map::{Cell, Coord, LOOK_RADIUS, Tile, TileMap};
pub use player::{Outbox, PlayerId, PlayerKind, PlayerSession};
pub use shared::{SessionFlow, SharedEngine};
pub use username::{MAX_USERNAME_LEN, UsernameVerdict, is_valid_username, judge_rename};
