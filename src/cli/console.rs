//! Operator console read from stdin while the server runs.

use std::io::{BufRead, Write};

use dod::ServerConfig;
use dod::game::{Cell, SharedEngine};
use tracing::{info, warn};

use super::CliError;

/// One console instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    /// Print the map with players drawn in.
    Map,
    /// Print live players as JSON.
    Players,
    /// End the game and start a fresh one on a reloaded map.
    End,
    /// Stop the server.
    Quit,
    /// List the commands.
    Help,
    /// Nothing typed.
    Blank,
    /// Anything else.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one console line. Case-insensitive, surrounding space ignored.
    pub(crate) fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" => Self::Blank,
            "map" => Self::Map,
            "players" => Self::Players,
            "end" => Self::End,
            "quit" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            _ => Self::Unknown(line.to_owned()),
        }
    }
}

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleExit {
    /// The operator asked to stop.
    Quit,
    /// Stdin reached end of file.
    InputClosed,
}

const HELP: &str = "commands: map, players, end, quit";

/// Render a populated map as text, one row per line.
pub(crate) fn render_map(grid: &[Vec<Cell>]) -> String {
    let mut output = String::new();
    for row in grid {
        output.extend(row.iter().map(|cell| cell.glyph()));
        output.push('\n');
    }
    output
}

/// Read console commands from `input` until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub(crate) fn run<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    engine: &SharedEngine,
    config: &ServerConfig,
) -> Result<ConsoleExit, CliError> {
    writeln!(out, "{HELP}")?;
    for line in input.lines() {
        match ConsoleCommand::parse(&line?) {
            ConsoleCommand::Blank => {}
            ConsoleCommand::Map => write!(out, "{}", render_map(&engine.populated_map()))?,
            ConsoleCommand::Players => {
                writeln!(out, "{}", serde_json::to_string_pretty(&engine.players())?)?;
            }
            ConsoleCommand::End => {
                let disconnected = engine.end_game();
                writeln!(out, "game over: {disconnected} player(s) disconnected")?;
                match config.build_engine() {
                    Ok(fresh) => {
                        engine.reset(fresh);
                        info!("new game started");
                        writeln!(out, "new game started")?;
                    }
                    Err(e) => {
                        warn!(error = %e, "could not reload map; game stays over");
                        writeln!(out, "could not reload map: {e}")?;
                    }
                }
            }
            ConsoleCommand::Quit => {
                engine.end_game();
                return Ok(ConsoleExit::Quit);
            }
            ConsoleCommand::Help => writeln!(out, "{HELP}")?,
            ConsoleCommand::Unknown(other) => writeln!(out, "unknown command: {other} ({HELP})")?,
        }
        out.flush()?;
    }
    Ok(ConsoleExit::InputClosed)
}
