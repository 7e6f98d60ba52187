//! The read side of one client connection.

use std::io::{BufRead, Read};

use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::game::{Outbox, PlayerId, SessionFlow, SharedEngine};
use crate::protocol::{ServerLine, decode_handshake};
use crate::server::{ChannelOutbox, PlayerIds};

/// How a connection's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The first line was not a valid handshake.
    Rejected,
    /// The engine would not admit the player.
    Refused(EngineError),
    /// The player quit, won, or the game ended.
    Closed(PlayerId),
    /// The connection died mid-game.
    Lost(PlayerId),
}

/// Longest command line accepted, newline included.
pub const MAX_LINE_BYTES: usize = 4096;

/// Read one line, lossily decoded. `None` at end of stream, on error, or
/// when the line runs past [`MAX_LINE_BYTES`].
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    buf.clear();
    let limit = MAX_LINE_BYTES as u64;
    match reader.by_ref().take(limit).read_until(b'\n', buf) {
        Ok(0) => None,
        Ok(n) if n == MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
            warn!(limit = MAX_LINE_BYTES, "line too long; dropping connection");
            None
        }
        Ok(_) => {
            let line = String::from_utf8_lossy(buf);
            Some(line.trim_end_matches(['\r', '\n']).to_owned())
        }
        Err(e) => {
            debug!(error = %e, "read failed");
            None
        }
    }
}

/// Drive one connection from handshake to close.
///
/// Every line for the client goes through `outbox`; the outbox is always
/// closed before this returns.
pub fn run_session<R: BufRead>(
    engine: &SharedEngine,
    ids: &PlayerIds,
    mut reader: R,
    outbox: &ChannelOutbox,
) -> SessionEnd {
    let end = session(engine, ids, &mut reader, outbox);
    outbox.close();
    end
}

fn session<R: BufRead>(
    engine: &SharedEngine,
    ids: &PlayerIds,
    reader: &mut R,
    outbox: &ChannelOutbox,
) -> SessionEnd {
    let mut buf = Vec::new();

    let Some(kind) = next_line(reader, &mut buf)
        .as_deref()
        .and_then(decode_handshake)
    else {
        warn!("invalid handshake");
        outbox.deliver(ServerLine::Bye.to_string());
        outbox.deliver(ServerLine::InvalidConnection.to_string());
        return SessionEnd::Rejected;
    };

    outbox.deliver(ServerLine::Welcome.to_string());
    let id = ids.allocate();
    if let Err(e) = engine.add_player(id, kind, Box::new(outbox.clone())) {
        warn!(player = id, error = %e, "player not admitted");
        let farewell = match e {
            EngineError::GameOver => ServerLine::GameOver,
            _ => ServerLine::Bye,
        };
        outbox.deliver(farewell.to_string());
        return SessionEnd::Refused(e);
    }
    info!(player = id, ?kind, "player joined");

    while let Some(line) = next_line(reader, &mut buf) {
        match engine.handle_line(id, &line, outbox) {
            Ok(SessionFlow::Continue) => {}
            Ok(SessionFlow::Close) => return SessionEnd::Closed(id),
            Err(e) => {
                // The registry forgot us; the game was ended from the console.
                debug!(player = id, error = %e, "session no longer registered");
                return SessionEnd::Closed(id);
            }
        }
    }

    if let Err(e) = engine.player_lost_connection(id) {
        debug!(player = id, error = %e, "connection dropped after removal");
        return SessionEnd::Closed(id);
    }
    SessionEnd::Lost(id)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc::Receiver;

    use super::*;
    use crate::game::{GameEngine, TileMap};
    use crate::server::Outgoing;

    fn engine() -> SharedEngine {
        let map = TileMap::load("name T\nwin 0\n#..#\n").unwrap();
        SharedEngine::new(GameEngine::with_seed(map, 5))
    }

    fn run(engine: &SharedEngine, ids: &PlayerIds, input: &str) -> (SessionEnd, Vec<Outgoing>) {
        let (outbox, rx): (ChannelOutbox, Receiver<Outgoing>) = ChannelOutbox::channel();
        let end = run_session(engine, ids, Cursor::new(input.to_owned()), &outbox);
        (end, rx.try_iter().collect())
    }

    fn line(text: &str) -> Outgoing {
        Outgoing::Line(text.to_owned())
    }

    #[test]
    fn test_bad_handshake() {
        let (end, out) = run(&engine(), &PlayerIds::new(), "robot\nHELLO\n");
        assert_eq!(end, SessionEnd::Rejected);
        assert_eq!(
            out,
            vec![line("bye bye"), line("INVALID CONNECTION"), Outgoing::Close]
        );
    }

    #[test]
    fn test_empty_connection_is_rejected() {
        let (end, out) = run(&engine(), &PlayerIds::new(), "");
        assert_eq!(end, SessionEnd::Rejected);
        assert_eq!(out.last(), Some(&Outgoing::Close));
    }

    #[test]
    fn test_quit_session() {
        let engine = engine();
        let input = "human\r\nHELLO\nQUIT\nHELLO\n";
        let (end, out) = run(&engine, &PlayerIds::starting_at(9), input);
        assert_eq!(end, SessionEnd::Closed(9));
        assert_eq!(
            out,
            vec![
                line("Welcome to DOD"),
                line("GOLD: 0"),
                line("bye bye"),
                Outgoing::Close,
                Outgoing::Close
            ]
        );
        assert!(engine.players().is_empty());
    }

    #[test]
    fn test_eof_is_lost_connection() {
        let engine = engine();
        let (end, out) = run(&engine, &PlayerIds::new(), "bot\nFLY\n");
        assert_eq!(end, SessionEnd::Lost(0));
        assert_eq!(
            out,
            vec![line("Welcome to DOD"), line("Invalid"), Outgoing::Close]
        );
        assert!(engine.players().is_empty());
    }

    #[test]
    fn test_overlong_line_drops_connection() {
        let engine = engine();
        let input = format!("human\n{}\nHELLO\n", "A".repeat(MAX_LINE_BYTES + 100));
        let (end, out) = run(&engine, &PlayerIds::new(), &input);
        assert_eq!(end, SessionEnd::Lost(0));
        assert_eq!(out, vec![line("Welcome to DOD"), Outgoing::Close]);
        assert!(engine.players().is_empty());
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let engine = engine();
        let verb = "X".repeat(MAX_LINE_BYTES - 1);
        let (end, out) = run(&engine, &PlayerIds::new(), &format!("human\n{verb}\nQUIT\n"));
        assert_eq!(end, SessionEnd::Closed(0));
        assert_eq!(out[1], line("Invalid"));
        assert_eq!(out[2], line("bye bye"));
    }

    #[test]
    fn test_game_over_refuses_join() {
        let engine = engine();
        engine.end_game();
        let (end, out) = run(&engine, &PlayerIds::new(), "human\n");
        assert_eq!(end, SessionEnd::Refused(EngineError::GameOver));
        assert_eq!(
            out,
            vec![line("Welcome to DOD"), line("GAME OVER"), Outgoing::Close]
        );
    }
}
