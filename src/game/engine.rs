//! The game engine: the single authority over the map and the live players.
//!
//! [`GameEngine`] is plain single-threaded state. Every mutation goes through
//! one of its methods; [`SharedEngine`](crate::game::SharedEngine) wraps it in
//! a mutex so connection threads observe one total order of commands.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::game::{
    Cell, Coord, LOOK_RADIUS, Outbox, PlayerId, PlayerKind, PlayerSession, Tile, TileMap,
    UsernameVerdict, judge_rename,
};
use crate::protocol::{ChatTarget, Command, Direction, ServerLine};

/// What the engine answers to one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Lines for the issuing player, in order.
    lines: Vec<ServerLine>,
    /// Whether the issuing player's session is over.
    ends_session: bool,
}

impl Reply {
    /// A single-line reply.
    #[must_use]
    pub fn line(line: ServerLine) -> Self {
        Self {
            lines: vec![line],
            ends_session: false,
        }
    }

    /// A reply after which the connection is closed.
    #[must_use]
    pub fn closing(lines: Vec<ServerLine>) -> Self {
        Self {
            lines,
            ends_session: true,
        }
    }

    /// Lines for the issuing player.
    #[must_use]
    pub fn lines(&self) -> &[ServerLine] {
        &self.lines
    }

    /// Check if the issuing player's session is over.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        self.ends_session
    }
}

/// Snapshot of one live player, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
    /// Human or bot.
    pub kind: PlayerKind,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Gold carried.
    pub gold: u32,
}

/// Authoritative game state.
#[derive(Debug)]
pub struct GameEngine {
    /// The dungeon.
    map: TileMap,
    /// Live players, ordered by id so broadcasts and listings are stable.
    players: BTreeMap<PlayerId, PlayerSession>,
    /// Spawn selection.
    rng: SmallRng,
    /// False once the game has ended.
    active: bool,
}

impl GameEngine {
    /// Create an engine over `map` with an entropy-seeded RNG.
    #[must_use]
    pub fn new(map: TileMap) -> Self {
        Self::with_rng(map, SmallRng::from_entropy())
    }

    /// Create an engine whose spawn choices are reproducible.
    #[must_use]
    pub fn with_seed(map: TileMap, seed: u64) -> Self {
        Self::with_rng(map, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(map: TileMap, rng: SmallRng) -> Self {
        Self {
            map,
            players: BTreeMap::new(),
            rng,
            active: true,
        }
    }

    /// The dungeon map.
    #[must_use]
    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    /// Check if the game is still running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Number of live players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Look up a live player.
    #[must_use]
    pub fn session(&self, id: PlayerId) -> Option<&PlayerSession> {
        self.players.get(&id)
    }

    /// Iterate over live players in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &PlayerSession> {
        self.players.values()
    }

    /// Summaries of every live player.
    #[must_use]
    pub fn players(&self) -> Vec<PlayerSummary> {
        self.players
            .values()
            .map(|p| PlayerSummary {
                id: p.id(),
                username: p.username().to_owned(),
                kind: p.kind(),
                x: p.position().x,
                y: p.position().y,
                gold: p.collected_gold(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSession> {
        self.players.get_mut(&id)
    }

    fn player(&self, id: PlayerId) -> Result<&PlayerSession, EngineError> {
        self.players.get(&id).ok_or(EngineError::UnknownPlayer(id))
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerSession, EngineError> {
        self.players
            .get_mut(&id)
            .ok_or(EngineError::UnknownPlayer(id))
    }

    /// Register a freshly handshaken connection and spawn it.
    ///
    /// `id` comes from the connection layer's allocator. Every other live
    /// player is told about the newcomer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameOver`] after [`GameEngine::end_game`],
    /// [`EngineError::DuplicatePlayer`] if `id` is live, and
    /// [`EngineError::NoSpawnLocation`] if every open tile is taken.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        kind: PlayerKind,
        outbox: Box<dyn Outbox>,
    ) -> Result<PlayerId, EngineError> {
        if !self.active {
            return Err(EngineError::GameOver);
        }
        if self.players.contains_key(&id) {
            return Err(EngineError::DuplicatePlayer(id));
        }

        let spot = self
            .spawn_location(None)
            .ok_or(EngineError::NoSpawnLocation)?;
        let mut session = PlayerSession::new(id, kind, outbox);
        session.place(spot);

        self.broadcast(&ServerLine::NewPlayer(session.username().to_owned()), id);
        info!(player = id, ?kind, x = spot.x, y = spot.y, "player spawned");
        self.players.insert(id, session);
        Ok(id)
    }

    /// Move a live player to a random free tile and empty their purse.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] or
    /// [`EngineError::NoSpawnLocation`].
    pub fn spawn(&mut self, id: PlayerId) -> Result<Coord, EngineError> {
        self.player(id)?;
        let spot = self
            .spawn_location(Some(id))
            .ok_or(EngineError::NoSpawnLocation)?;
        self.player_mut(id)?.place(spot);
        Ok(spot)
    }

    /// Uniformly random passable tile not held by anyone except `ignoring`.
    fn spawn_location(&mut self, ignoring: Option<PlayerId>) -> Option<Coord> {
        let candidates: Vec<Coord> = self
            .map
            .iter()
            .filter(|&(coord, tile)| tile.is_passable() && !self.is_occupied(coord, ignoring))
            .map(|(coord, _)| coord)
            .collect();
        candidates.choose(&mut self.rng).copied()
    }

    /// Check if a live player other than `ignoring` stands on `coord`.
    fn is_occupied(&self, coord: Coord, ignoring: Option<PlayerId>) -> bool {
        self.players
            .values()
            .any(|p| Some(p.id()) != ignoring && p.occupies(coord))
    }

    /// Send `line` to every live player except `except`.
    fn broadcast(&self, line: &ServerLine, except: PlayerId) {
        for player in self.players.values().filter(|p| p.id() != except) {
            player.send(line);
        }
    }

    /// Execute one raw command line for player `id`.
    ///
    /// Game-rule rejections (blocked moves, empty pickups, bad names) and
    /// protocol errors are ordinary replies. Once the game has ended every
    /// command gets a closing `GAME OVER`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` is not live.
    pub fn process_command(&mut self, id: PlayerId, raw: &str) -> Result<Reply, EngineError> {
        if !self.active {
            return Ok(Reply::closing(vec![ServerLine::GameOver]));
        }
        self.player(id)?;

        let command = Command::decode(raw);
        debug!(player = id, ?command, "processing command");

        let reply = match command {
            Command::Hello => Reply::line(ServerLine::Gold(self.map.gold_to_win())),
            Command::Move(direction) => self.move_player(id, direction)?,
            Command::Look => self.look(id)?,
            Command::Pickup => self.pickup(id)?,
            Command::Username(name) => self.rename(id, &name)?,
            Command::Usernames => self.list_others(id),
            Command::Shout(text) => self.shout(id, text)?,
            Command::Whisper { to, text } => self.whisper(id, &to, text)?,
            Command::Quit => return self.quit(id),
            Command::Malformed { .. } => Reply::line(ServerLine::Fail),
            Command::Unrecognized(_) => Reply::line(ServerLine::Invalid),
        };
        self.settle(id, reply)
    }

    fn move_player(&mut self, id: PlayerId, direction: Direction) -> Result<Reply, EngineError> {
        let (dx, dy) = direction.delta();
        let target = self.player(id)?.position().offset(dx, dy);

        if !self.map.tile_at(target).is_passable() || self.is_occupied(target, Some(id)) {
            return Ok(Reply::line(ServerLine::Fail));
        }

        self.player_mut(id)?.move_to(target);
        Ok(Reply::line(ServerLine::Success))
    }

    fn pickup(&mut self, id: PlayerId) -> Result<Reply, EngineError> {
        let position = self.player(id)?.position();
        if self.map.tile_at(position) != Tile::Gold {
            return Ok(Reply::line(ServerLine::NothingToPickUp));
        }

        self.map.replace_tile(position, Tile::Empty);
        let total = self.player_mut(id)?.add_gold();
        Ok(Reply::line(ServerLine::GoldCoins(total)))
    }

    /// Finish any command: a player who now qualifies leaves as a winner.
    ///
    /// Runs after every command, so a player who spawned on an exit with
    /// enough gold wins on their first command.
    fn settle(&mut self, id: PlayerId, mut reply: Reply) -> Result<Reply, EngineError> {
        if !self.check_win(id)? {
            return Ok(reply);
        }

        let winner = self.remove_player(id)?;
        info!(
            player = id,
            username = winner.username(),
            gold = winner.collected_gold(),
            "player won"
        );
        reply.lines.extend([ServerLine::Win, ServerLine::Bye]);
        reply.ends_session = true;
        Ok(reply)
    }

    /// Check if player `id` stands on an exit carrying enough gold.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` is not live.
    pub fn check_win(&self, id: PlayerId) -> Result<bool, EngineError> {
        let player = self.player(id)?;
        Ok(self.map.tile_at(player.position()) == Tile::Exit
            && player.collected_gold() >= self.map.gold_to_win())
    }

    /// Look window around player `id` with other players drawn in.
    ///
    /// The caller's own tile shows the terrain underneath them.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` is not live.
    pub fn visible_cells(&self, id: PlayerId) -> Result<Vec<Vec<Cell>>, EngineError> {
        let center = self.player(id)?.position();
        let half = LOOK_RADIUS / 2;

        let mut window: Vec<Vec<Cell>> = self
            .map
            .look_window(center, LOOK_RADIUS)
            .into_iter()
            .map(|row| row.into_iter().map(Cell::Tile).collect())
            .collect();

        for other in self.players.values().filter(|p| p.id() != id) {
            let position = other.position();
            let col = usize::try_from(position.x - center.x + half).ok();
            let row = usize::try_from(position.y - center.y + half).ok();
            if let Some(cell) = row
                .zip(col)
                .and_then(|(row, col)| window.get_mut(row)?.get_mut(col))
            {
                *cell = Cell::Player(other.kind());
            }
        }

        Ok(window)
    }

    fn look(&self, id: PlayerId) -> Result<Reply, EngineError> {
        let lines = self
            .visible_cells(id)?
            .iter()
            .map(|row| ServerLine::LookRow(row.iter().map(|cell| cell.glyph()).collect()))
            .collect();
        Ok(Reply {
            lines,
            ends_session: false,
        })
    }

    fn rename(&mut self, id: PlayerId, requested: &str) -> Result<Reply, EngineError> {
        let current = self.player(id)?.username().to_owned();

        let line = match judge_rename(&current, requested) {
            UsernameVerdict::TooLong => ServerLine::MaxUsernameLength,
            UsernameVerdict::Invalid => ServerLine::InvalidUsername(requested.to_owned()),
            UsernameVerdict::Unchanged => ServerLine::UsernameUnchanged(current),
            UsernameVerdict::Accepted => {
                let old = self.player_mut(id)?.rename(requested.to_owned());
                info!(player = id, %old, new = requested, "player renamed");
                self.broadcast(
                    &ServerLine::UsernameUpdated {
                        old,
                        new: requested.to_owned(),
                    },
                    id,
                );
                ServerLine::UsernameChanged(requested.to_owned())
            }
        };
        Ok(Reply::line(line))
    }

    fn list_others(&self, id: PlayerId) -> Reply {
        let others = self
            .players
            .values()
            .filter(|p| p.id() != id)
            .map(|p| (p.id(), p.username().to_owned()))
            .collect();
        Reply::line(ServerLine::ActivePlayers(others))
    }

    fn shout(&self, id: PlayerId, text: String) -> Result<Reply, EngineError> {
        let from = self.player(id)?.username().to_owned();
        self.broadcast(
            &ServerLine::Chat {
                from: Some(from),
                to: ChatTarget::All,
                text: text.clone(),
            },
            id,
        );
        Ok(Reply::line(ServerLine::Chat {
            from: None,
            to: ChatTarget::All,
            text,
        }))
    }

    fn whisper(&self, id: PlayerId, to: &str, text: String) -> Result<Reply, EngineError> {
        let from = self.player(id)?.username().to_owned();
        let line = ServerLine::Chat {
            from: Some(from),
            to: ChatTarget::You,
            text: text.clone(),
        };

        let mut delivered = false;
        for player in self
            .players
            .values()
            .filter(|p| p.id() != id && p.username() == to)
        {
            player.send(&line);
            delivered = true;
        }

        if !delivered {
            return Ok(Reply::line(ServerLine::Fail));
        }
        Ok(Reply::line(ServerLine::Chat {
            from: None,
            to: ChatTarget::User(to.to_owned()),
            text,
        }))
    }

    fn quit(&mut self, id: PlayerId) -> Result<Reply, EngineError> {
        let session = self.remove_player(id)?;
        info!(player = id, username = session.username(), "player quit");
        Ok(Reply::closing(vec![ServerLine::Bye]))
    }

    /// Drop a player from the registry and tell everyone else.
    fn remove_player(&mut self, id: PlayerId) -> Result<PlayerSession, EngineError> {
        let session = self
            .players
            .remove(&id)
            .ok_or(EngineError::UnknownPlayer(id))?;
        self.broadcast(&ServerLine::PlayerExit(session.username().to_owned()), id);
        Ok(session)
    }

    /// Handle a connection that died without `QUIT`.
    ///
    /// Others see the same exit notice as for a quit; nothing is sent to the
    /// dead connection.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` already left.
    pub fn player_lost_connection(&mut self, id: PlayerId) -> Result<(), EngineError> {
        let session = self.remove_player(id)?;
        info!(player = id, username = session.username(), "player lost connection");
        Ok(())
    }

    /// The full grid with every live player's icon drawn in.
    #[must_use]
    pub fn populated_map(&self) -> Vec<Vec<Cell>> {
        let width = usize::try_from(self.map.width()).unwrap_or_default();
        let mut grid: Vec<Vec<Cell>> = Vec::new();
        for (coord, tile) in self.map.iter() {
            if coord.x == 0 {
                grid.push(Vec::with_capacity(width));
            }
            if let Some(row) = grid.last_mut() {
                row.push(Cell::Tile(tile));
            }
        }

        for player in self.players.values() {
            let position = player.position();
            let cell = usize::try_from(position.y)
                .ok()
                .zip(usize::try_from(position.x).ok())
                .and_then(|(row, col)| grid.get_mut(row)?.get_mut(col));
            if let Some(cell) = cell {
                *cell = Cell::Player(player.kind());
            }
        }
        grid
    }

    /// End the game: reject all further commands and send everyone home.
    ///
    /// Each live player is told `bye bye` and their connection is closed.
    /// Returns how many players were disconnected.
    pub fn end_game(&mut self) -> usize {
        self.active = false;
        let players = std::mem::take(&mut self.players);
        for player in players.values() {
            player.send(&ServerLine::Bye);
            player.disconnect();
        }
        info!(disconnected = players.len(), "game ended");
        players.len()
    }
}
