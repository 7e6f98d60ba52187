//! Thread-safe handle to the one [`GameEngine`].
//!
//! All connection threads and the operator console share a single coarse
//! lock. Each command runs start to finish under it, so every client sees
//! one total order of game events and replies go out in that order.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::error::EngineError;
use crate::game::{Cell, GameEngine, Outbox, PlayerId, PlayerKind, PlayerSummary};

/// What a connection should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    /// Keep reading commands.
    Continue,
    /// The session is over; stop reading.
    Close,
}

/// Cloneable handle to the shared engine.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<GameEngine>>,
}

impl SharedEngine {
    /// Wrap an engine for sharing.
    #[must_use]
    pub fn new(engine: GameEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Take the lock. A panic in another holder does not stop the game.
    fn lock(&self) -> MutexGuard<'_, GameEngine> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("engine lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut GameEngine) -> T) -> T {
        let mut engine = self.lock();
        let result = f(&mut engine);
        debug_check(&engine);
        result
    }

    /// See [`GameEngine::add_player`].
    ///
    /// # Errors
    ///
    /// Propagates the engine's refusal.
    pub fn add_player(
        &self,
        id: PlayerId,
        kind: PlayerKind,
        outbox: Box<dyn Outbox>,
    ) -> Result<PlayerId, EngineError> {
        self.with_engine(|engine| engine.add_player(id, kind, outbox))
    }

    /// Run one command and deliver its reply to `outbox` before releasing
    /// the lock, so the reply is ordered against every broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` is no longer live.
    pub fn handle_line(
        &self,
        id: PlayerId,
        raw: &str,
        outbox: &dyn Outbox,
    ) -> Result<SessionFlow, EngineError> {
        self.with_engine(|engine| {
            let reply = engine.process_command(id, raw)?;
            for line in reply.lines() {
                outbox.deliver(line.to_string());
            }
            if reply.ends_session() {
                outbox.close();
                Ok(SessionFlow::Close)
            } else {
                Ok(SessionFlow::Continue)
            }
        })
    }

    /// See [`GameEngine::player_lost_connection`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] if `id` already left.
    pub fn player_lost_connection(&self, id: PlayerId) -> Result<(), EngineError> {
        self.with_engine(|engine| engine.player_lost_connection(id))
    }

    /// See [`GameEngine::populated_map`].
    #[must_use]
    pub fn populated_map(&self) -> Vec<Vec<Cell>> {
        self.lock().populated_map()
    }

    /// See [`GameEngine::players`].
    #[must_use]
    pub fn players(&self) -> Vec<PlayerSummary> {
        self.lock().players()
    }

    /// See [`GameEngine::end_game`].
    pub fn end_game(&self) -> usize {
        self.with_engine(GameEngine::end_game)
    }

    /// Swap in a fresh engine, returning the old one.
    pub fn reset(&self, engine: GameEngine) -> GameEngine {
        std::mem::replace(&mut *self.lock(), engine)
    }
}

#[cfg(debug_assertions)]
fn debug_check(engine: &GameEngine) {
    for violation in crate::game::check_invariants(engine) {
        warn!(%violation, "engine invariant broken");
    }
}

#[cfg(not(debug_assertions))]
const fn debug_check(_engine: &GameEngine) {}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::game::{Coord, TileMap};
    use crate::server::{ChannelOutbox, Outgoing};

    fn shared(source: &str) -> SharedEngine {
        SharedEngine::new(GameEngine::with_seed(TileMap::load(source).unwrap(), 11))
    }

    #[test]
    fn test_handle_line_delivers_reply() {
        let engine = shared("name S\nwin 2\n...\n");
        let (outbox, rx) = ChannelOutbox::channel();
        engine
            .add_player(0, PlayerKind::Human, Box::new(outbox.clone()))
            .unwrap();

        let flow = engine.handle_line(0, "HELLO", &outbox).unwrap();
        assert_eq!(flow, SessionFlow::Continue);
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Line("GOLD: 2".to_owned()));

        let flow = engine.handle_line(0, "QUIT", &outbox).unwrap();
        assert_eq!(flow, SessionFlow::Close);
        let rest: Vec<Outgoing> = rx.try_iter().collect();
        assert_eq!(
            rest,
            vec![Outgoing::Line("bye bye".to_owned()), Outgoing::Close]
        );

        assert_eq!(
            engine.handle_line(0, "HELLO", &outbox),
            Err(EngineError::UnknownPlayer(0))
        );
    }

    #[test]
    fn test_reset_replaces_engine() {
        let engine = shared("name S\nwin 2\n...\n");
        let (outbox, _rx) = ChannelOutbox::channel();
        engine
            .add_player(0, PlayerKind::Bot, Box::new(outbox))
            .unwrap();
        assert_eq!(engine.end_game(), 1);

        let fresh = GameEngine::with_seed(TileMap::load("name T\nwin 0\n..\n").unwrap(), 1);
        let old = engine.reset(fresh);
        assert!(!old.is_active());
        assert!(engine.with_engine(|e| GameEngine::is_active(e)));
        assert_eq!(engine.with_engine(|e| e.map().name().to_owned()), "T");
    }

    #[test]
    fn test_concurrent_moves_into_same_tile() {
        for _ in 0..20 {
            let engine = shared("name Race\nwin 9\n...\n");
            let (left, left_rx) = ChannelOutbox::channel();
            let (right, right_rx) = ChannelOutbox::channel();
            engine
                .add_player(0, PlayerKind::Human, Box::new(left.clone()))
                .unwrap();
            engine
                .add_player(1, PlayerKind::Human, Box::new(right.clone()))
                .unwrap();

            engine.with_engine(|e| {
                while e.session(0).unwrap().position() != Coord::new(0, 0)
                    || e.session(1).unwrap().position() != Coord::new(2, 0)
                {
                    e.spawn(0).unwrap();
                    e.spawn(1).unwrap();
                }
            });
            left_rx.try_iter().for_each(drop);

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [(0, "MOVE E", left), (1, "MOVE W", right)]
                .into_iter()
                .map(|(id, command, outbox)| {
                    let engine = engine.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        engine.handle_line(id, command, &outbox).unwrap()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), SessionFlow::Continue);
            }

            let mut replies: Vec<String> = left_rx
                .try_iter()
                .chain(right_rx.try_iter())
                .filter_map(|out| match out {
                    Outgoing::Line(line) => Some(line),
                    Outgoing::Close => None,
                })
                .collect();
            replies.sort();
            assert_eq!(replies, ["FAIL", "SUCCESS"]);

            let in_middle = engine.players().iter().filter(|p| p.x == 1).count();
            assert_eq!(in_middle, 1);
            assert!(engine.with_engine(|e| crate::game::check_invariants(e).is_empty()));
        }
    }
}
