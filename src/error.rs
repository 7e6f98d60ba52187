//! Error types for map loading, the game engine and the network server.

use std::fmt;
use std::io;

use crate::game::PlayerId;

/// Reasons a map description cannot be loaded.
///
/// Every variant is fatal at boot: the server refuses to listen without a
/// valid map.
#[derive(Debug)]
pub enum MapFormatError {
    /// The map file could not be read.
    Io(io::Error),
    /// The first line is missing, lacks the `name ` prefix, or names nothing.
    MalformedName(String),
    /// The second line is missing.
    MissingWin,
    /// The win line lacks the `win ` prefix or holds a negative or
    /// non-numeric threshold.
    InvalidWin(String),
    /// The description has no grid rows.
    NoRows,
    /// A grid row differs in width from the first row.
    RowWidth {
        /// Zero-based grid row index.
        row: usize,
        /// Width fixed by the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// A grid cell holds a character outside `#.GE`.
    UnknownGlyph {
        /// Zero-based grid row index.
        row: usize,
        /// Zero-based column index.
        col: usize,
        /// The offending character.
        glyph: char,
    },
    /// The grid is wider or taller than coordinates can address.
    TooLarge,
    /// No tile is passable, so nobody could ever spawn.
    NoOpenFloor,
}

impl fmt::Display for MapFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read map: {e}"),
            Self::MalformedName(line) => write!(f, "malformed name line: {line:?}"),
            Self::MissingWin => write!(f, "missing win line"),
            Self::InvalidWin(line) => write!(f, "invalid win line: {line:?}"),
            Self::NoRows => write!(f, "map has no grid rows"),
            Self::RowWidth {
                row,
                expected,
                found,
            } => write!(f, "row {row} has width {found}, expected {expected}"),
            Self::UnknownGlyph { row, col, glyph } => {
                write!(f, "unknown tile {glyph:?} at row {row}, column {col}")
            }
            Self::TooLarge => write!(f, "map dimensions exceed the addressable range"),
            Self::NoOpenFloor => write!(f, "map has no open floor to spawn on"),
        }
    }
}

impl std::error::Error for MapFormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MapFormatError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Engine-level failures.
///
/// These are bookkeeping faults between the connection layer and the engine,
/// never game-rule outcomes: a blocked move or an empty pickup is a normal
/// reply, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// No live session has this id.
    UnknownPlayer(PlayerId),
    /// A live session already has this id.
    DuplicatePlayer(PlayerId),
    /// Every passable tile is occupied.
    NoSpawnLocation,
    /// The game has ended; no new players are accepted.
    GameOver,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlayer(id) => write!(f, "unknown player {id}"),
            Self::DuplicatePlayer(id) => write!(f, "player {id} is already registered"),
            Self::NoSpawnLocation => write!(f, "no free tile to spawn on"),
            Self::GameOver => write!(f, "the game is over"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors raised while bootstrapping or running the network server.
#[derive(Debug)]
pub enum ServerError {
    /// Socket or thread setup failed.
    Io(io::Error),
    /// The configured map could not be loaded.
    Map(MapFormatError),
    /// A server thread panicked.
    WorkerPanicked(&'static str),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Map(e) => write!(f, "map error: {e}"),
            Self::WorkerPanicked(name) => write!(f, "{name} thread panicked"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Map(e) => Some(e),
            Self::WorkerPanicked(_) => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MapFormatError> for ServerError {
    fn from(e: MapFormatError) -> Self {
        Self::Map(e)
    }
}
