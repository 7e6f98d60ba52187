//! Player session state.

use std::fmt;

use serde::Serialize;

use crate::game::Coord;
use crate::protocol::ServerLine;

/// Unique identifier for a player. Allocated monotonically, never reused.
pub type PlayerId = u64;

/// Whether a connection is driven by a person or a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Connected with the `human` handshake.
    Human,
    /// Connected with the `bot` handshake.
    Bot,
}

impl PlayerKind {
    /// Icon drawn for this player in look windows and the populated map.
    #[must_use]
    pub const fn icon(self) -> char {
        match self {
            Self::Human => 'H',
            Self::Bot => 'B',
        }
    }
}

/// Outbound line sink for one connection.
///
/// The engine pushes encoded lines here while holding its lock, so
/// implementations must only enqueue and never block on the network.
pub trait Outbox: Send + fmt::Debug {
    /// Queue one line for the client. Lines to a dead connection are dropped.
    fn deliver(&self, line: String);

    /// Ask the connection layer to close the connection after queued lines.
    fn close(&self);
}

/// State for a single connected player.
#[derive(Debug)]
pub struct PlayerSession {
    /// Unique identifier for this player.
    id: PlayerId,
    /// Display name.
    username: String,
    /// Human or bot.
    kind: PlayerKind,
    /// Current tile.
    position: Coord,
    /// Gold picked up since the last spawn.
    collected_gold: u32,
    /// Where lines for this player go.
    outbox: Box<dyn Outbox>,
}

impl PlayerSession {
    /// Create an unplaced session named `PLAYER_<id>`.
    #[must_use]
    pub fn new(id: PlayerId, kind: PlayerKind, outbox: Box<dyn Outbox>) -> Self {
        Self {
            id,
            username: format!("PLAYER_{id}"),
            kind,
            position: Coord::new(0, 0),
            collected_gold: 0,
            outbox,
        }
    }

    /// Player id.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Current display name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Human or bot.
    #[must_use]
    pub const fn kind(&self) -> PlayerKind {
        self.kind
    }

    /// Current tile.
    #[must_use]
    pub const fn position(&self) -> Coord {
        self.position
    }

    /// Gold carried.
    #[must_use]
    pub const fn collected_gold(&self) -> u32 {
        self.collected_gold
    }

    /// Check if this player stands on `coord`.
    #[must_use]
    pub fn occupies(&self, coord: Coord) -> bool {
        self.position == coord
    }

    /// Put the player on a fresh spawn tile. Carried gold is lost.
    pub(crate) fn place(&mut self, coord: Coord) {
        self.position = coord;
        self.collected_gold = 0;
    }

    /// Step onto `coord`, keeping carried gold.
    pub(crate) fn move_to(&mut self, coord: Coord) {
        self.position = coord;
    }

    /// Add one coin and return the new total.
    pub(crate) fn add_gold(&mut self) -> u32 {
        self.collected_gold = self.collected_gold.saturating_add(1);
        self.collected_gold
    }

    /// Replace the display name, returning the old one.
    pub(crate) fn rename(&mut self, username: String) -> String {
        std::mem::replace(&mut self.username, username)
    }

    /// Queue a line for this player.
    pub(crate) fn send(&self, line: &ServerLine) {
        self.outbox.deliver(line.to_string());
    }

    /// Ask the connection layer to drop this player's connection.
    pub(crate) fn disconnect(&self) {
        self.outbox.close();
    }
}
