#![no_main]

use arbitrary::Arbitrary;
use dod::game::{GameEngine, PlayerKind, TileMap, check_invariants};
use dod::server::ChannelOutbox;
use libfuzzer_sys::fuzz_target;

const MAP: &str = "name Fuzz\nwin 2\n#######\n#..G..#\n#.#E#.#\n#G...G#\n#######\n";

/// One step in a fuzzed game.
#[derive(Arbitrary, Debug)]
enum Step {
    /// A new player connects.
    Join { bot: bool },
    /// A player sends a raw line.
    Line { player: u8, text: String },
    /// A player's connection drops.
    Drop { player: u8 },
}

fuzz_target!(|input: (u64, Vec<Step>)| {
    let (seed, steps) = input;
    let Ok(map) = TileMap::load(MAP) else {
        return;
    };
    let mut engine = GameEngine::with_seed(map, seed);
    let mut next_id = 0u64;
    let mut receivers = Vec::new();

    for step in steps.into_iter().take(200) {
        match step {
            Step::Join { bot } => {
                let kind = if bot { PlayerKind::Bot } else { PlayerKind::Human };
                let (outbox, rx) = ChannelOutbox::channel();
                let _ = engine.add_player(next_id, kind, Box::new(outbox));
                receivers.push(rx);
                next_id += 1;
            }
            Step::Line { player, text } => {
                let _ = engine.process_command(u64::from(player) % next_id.max(1), &text);
            }
            Step::Drop { player } => {
                let _ = engine.player_lost_connection(u64::from(player) % next_id.max(1));
            }
        }
        assert!(check_invariants(&engine).is_empty());
    }
});
