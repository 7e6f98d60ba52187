//! Client → server commands.

use std::fmt;

use crate::game::PlayerKind;

/// A compass direction for `MOVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Up (`N`), toward row 0.
    North,
    /// Right (`E`).
    East,
    /// Down (`S`).
    South,
    /// Left (`W`).
    West,
}

impl Direction {
    /// All four directions in wire order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Parse the single-letter wire token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "N" => Some(Self::North),
            "E" => Some(Self::East),
            "S" => Some(Self::South),
            "W" => Some(Self::West),
            _ => None,
        }
    }

    /// Single-letter wire token.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::East => 'E',
            Self::South => 'S',
            Self::West => 'W',
        }
    }

    /// Column and row delta of one step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// A request issued by a connected player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for the gold needed to win.
    Hello,
    /// Step one tile.
    Move(Direction),
    /// Ask for the 5×5 window around the player.
    Look,
    /// Pick up gold on the current tile.
    Pickup,
    /// Change display name.
    Username(String),
    /// List the other connected players.
    Usernames,
    /// Chat to everyone.
    Shout(String),
    /// Chat to players with a given name.
    Whisper {
        /// Recipient username.
        to: String,
        /// Message text.
        text: String,
    },
    /// Leave the game.
    Quit,
    /// A known verb with a missing or bad argument.
    Malformed {
        /// The verb that was recognised.
        verb: &'static str,
    },
    /// Anything else, kept verbatim.
    Unrecognized(String),
}

impl Command {
    /// Decode one line. Never fails; unknown input becomes
    /// [`Command::Unrecognized`].
    #[must_use]
    pub fn decode(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, Some(arg)),
            None => (line, None),
        };

        match (verb, arg) {
            ("HELLO", None) => Self::Hello,
            ("LOOK", None) => Self::Look,
            ("PICKUP", None) => Self::Pickup,
            ("USERNAMES", None) => Self::Usernames,
            ("QUIT", None) => Self::Quit,
            ("MOVE", Some(arg)) => Direction::from_token(arg.trim())
                .map_or(Self::Malformed { verb: "MOVE" }, Self::Move),
            ("USERNAME", Some(name)) if !name.trim().is_empty() => {
                Self::Username(name.trim().to_owned())
            }
            ("SHOUT", Some(text)) if !text.trim().is_empty() => Self::Shout(text.to_owned()),
            ("WHISPER", Some(rest)) => match rest.split_once(' ') {
                Some((to, text)) if !to.is_empty() && !text.trim().is_empty() => Self::Whisper {
                    to: to.to_owned(),
                    text: text.to_owned(),
                },
                _ => Self::Malformed { verb: "WHISPER" },
            },
            ("MOVE", None) => Self::Malformed { verb: "MOVE" },
            ("USERNAME", _) => Self::Malformed { verb: "USERNAME" },
            ("SHOUT", _) => Self::Malformed { verb: "SHOUT" },
            ("WHISPER", None) => Self::Malformed { verb: "WHISPER" },
            _ => Self::Unrecognized(line.to_owned()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello => f.write_str("HELLO"),
            Self::Move(direction) => write!(f, "MOVE {}", direction.letter()),
            Self::Look => f.write_str("LOOK"),
            Self::Pickup => f.write_str("PICKUP"),
            Self::Username(name) => write!(f, "USERNAME {name}"),
            Self::Usernames => f.write_str("USERNAMES"),
            Self::Shout(text) => write!(f, "SHOUT {text}"),
            Self::Whisper { to, text } => write!(f, "WHISPER {to} {text}"),
            Self::Quit => f.write_str("QUIT"),
            Self::Malformed { verb } => f.write_str(verb),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Decode the first line of a connection: `human` or `bot`.
#[must_use]
pub fn decode_handshake(line: &str) -> Option<PlayerKind> {
    match line.trim_end_matches(['\r', '\n']) {
        "human" => Some(PlayerKind::Human),
        "bot" => Some(PlayerKind::Bot),
        _ => None,
    }
}

/// Handshake line a client of the given kind sends.
#[must_use]
pub const fn encode_handshake(kind: PlayerKind) -> &'static str {
    match kind {
        PlayerKind::Human => "human",
        PlayerKind::Bot => "bot",
    }
}
