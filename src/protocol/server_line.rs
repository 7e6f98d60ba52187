//! Server → client lines.

use std::fmt;

use crate::game::{MAX_USERNAME_LEN, PlayerId};
use crate::protocol::{FAREWELL, WELCOME};

const NOTHING_TO_PICK_UP: &str = "There is nothing to pick up...";

/// Audience of a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// A shout.
    All,
    /// A whisper, as seen by its recipient.
    You,
    /// A whisper, as echoed to its sender.
    User(String),
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::You => f.write_str("YOU"),
            Self::User(name) => f.write_str(name),
        }
    }
}

/// One line sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Handshake accepted.
    Welcome,
    /// Reply to `HELLO`: gold needed to win.
    Gold(u32),
    /// One row of a `LOOK` window.
    LookRow(String),
    /// Successful `PICKUP`: gold now carried.
    GoldCoins(u32),
    /// `PICKUP` on a tile without gold.
    NothingToPickUp,
    /// Generic success.
    Success,
    /// Generic failure, with no reason given.
    Fail,
    /// Someone joined.
    NewPlayer(String),
    /// Someone left, won, or lost their connection.
    PlayerExit(String),
    /// Someone else renamed.
    UsernameUpdated {
        /// Previous name.
        old: String,
        /// New name.
        new: String,
    },
    /// Your rename went through.
    UsernameChanged(String),
    /// You asked for the name you already have.
    UsernameUnchanged(String),
    /// The requested name breaks the grammar.
    InvalidUsername(String),
    /// The requested name is too long.
    MaxUsernameLength,
    /// Reply to `USERNAMES`: every other player as `(id, name)`.
    ActivePlayers(Vec<(PlayerId, String)>),
    /// A chat message.
    Chat {
        /// Sender name, or `None` for the echo to the sender (`YOU`).
        from: Option<String>,
        /// Audience.
        to: ChatTarget,
        /// Message text.
        text: String,
    },
    /// You reached the exit with enough gold.
    Win,
    /// The game has ended; commands are no longer accepted.
    GameOver,
    /// The handshake was neither `human` nor `bot`.
    InvalidConnection,
    /// The command was not understood.
    Invalid,
    /// Farewell before the connection closes.
    Bye,
    /// Text this codec does not know, kept verbatim.
    Other(String),
}

impl ServerLine {
    /// Decode one line received from a server. Never fails; unknown text
    /// becomes [`ServerLine::Other`].
    #[must_use]
    pub fn decode(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        match line {
            WELCOME => return Self::Welcome,
            FAREWELL => return Self::Bye,
            NOTHING_TO_PICK_UP => return Self::NothingToPickUp,
            "SUCCESS" => return Self::Success,
            "FAIL" => return Self::Fail,
            "WIN" => return Self::Win,
            "GAME OVER" => return Self::GameOver,
            "INVALID CONNECTION" => return Self::InvalidConnection,
            "Invalid" => return Self::Invalid,
            _ => {}
        }

        decode_counted(line)
            .or_else(|| decode_username_notice(line))
            .or_else(|| decode_presence(line))
            .or_else(|| decode_active_players(line))
            .or_else(|| is_look_row(line).then(|| Self::LookRow(line.to_owned())))
            .or_else(|| decode_chat(line))
            .unwrap_or_else(|| Self::Other(line.to_owned()))
    }
}

fn decode_counted(line: &str) -> Option<ServerLine> {
    if let Some(value) = line.strip_prefix("GOLD: ") {
        return value.parse().ok().map(ServerLine::Gold);
    }
    if let Some(value) = line.strip_prefix("GOLD COINS: ") {
        return value.parse().ok().map(ServerLine::GoldCoins);
    }
    let limit = line
        .strip_prefix("MAXIMUM USERNAME LENGTH ")
        .and_then(|value| value.parse::<usize>().ok());
    (limit == Some(MAX_USERNAME_LEN)).then_some(ServerLine::MaxUsernameLength)
}

fn decode_username_notice(line: &str) -> Option<ServerLine> {
    if let Some(name) = line.strip_prefix("USERNAME CHANGED: ") {
        return Some(ServerLine::UsernameChanged(name.to_owned()));
    }
    if let Some(name) = line.strip_prefix("USERNAME UNCHANGED: ") {
        return Some(ServerLine::UsernameUnchanged(name.to_owned()));
    }
    if let Some(name) = line.strip_prefix("INVALID USERNAME: ") {
        return Some(ServerLine::InvalidUsername(name.to_owned()));
    }
    let (old, new) = line
        .strip_prefix("USERNAME: ")?
        .split_once(" UPDATED TO: ")?;
    Some(ServerLine::UsernameUpdated {
        old: old.to_owned(),
        new: new.to_owned(),
    })
}

fn decode_presence(line: &str) -> Option<ServerLine> {
    if let Some(name) = line.strip_prefix("NEW PLAYER: ") {
        return Some(ServerLine::NewPlayer(name.to_owned()));
    }
    line.strip_prefix("PLAYER EXIT: ")
        .map(|name| ServerLine::PlayerExit(name.to_owned()))
}

fn decode_active_players(line: &str) -> Option<ServerLine> {
    let mut fields = line.split('\t');
    let header = fields.next()?;
    let count = header
        .strip_suffix(" OTHER PLAYER ACTIVE:")
        .or_else(|| header.strip_suffix(" OTHER PLAYERS ACTIVE:"))?;
    count.parse::<usize>().ok()?;

    fields
        .map(|entry| {
            let (id, name) = entry.split_once('-')?;
            Some((id.parse().ok()?, name.to_owned()))
        })
        .collect::<Option<Vec<_>>>()
        .map(ServerLine::ActivePlayers)
}

fn is_look_row(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| matches!(c, 'H' | 'B' | 'G' | 'E' | '.' | '#'))
}

fn decode_chat(line: &str) -> Option<ServerLine> {
    let (from, rest) = line.split_once(" (TO ")?;
    let (target, text) = rest.split_once("): ")?;
    if from.is_empty() || from.contains(' ') || target.is_empty() {
        return None;
    }

    let from = (from != "YOU").then(|| from.to_owned());
    let to = match target {
        "ALL" => ChatTarget::All,
        "YOU" => ChatTarget::You,
        user => ChatTarget::User(user.to_owned()),
    };
    Some(ServerLine::Chat {
        from,
        to,
        text: text.to_owned(),
    })
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => f.write_str(WELCOME),
            Self::Gold(amount) => write!(f, "GOLD: {amount}"),
            Self::LookRow(row) => f.write_str(row),
            Self::GoldCoins(amount) => write!(f, "GOLD COINS: {amount}"),
            Self::NothingToPickUp => f.write_str(NOTHING_TO_PICK_UP),
            Self::Success => f.write_str("SUCCESS"),
            Self::Fail => f.write_str("FAIL"),
            Self::NewPlayer(name) => write!(f, "NEW PLAYER: {name}"),
            Self::PlayerExit(name) => write!(f, "PLAYER EXIT: {name}"),
            Self::UsernameUpdated { old, new } => write!(f, "USERNAME: {old} UPDATED TO: {new}"),
            Self::UsernameChanged(name) => write!(f, "USERNAME CHANGED: {name}"),
            Self::UsernameUnchanged(name) => write!(f, "USERNAME UNCHANGED: {name}"),
            Self::InvalidUsername(name) => write!(f, "INVALID USERNAME: {name}"),
            Self::MaxUsernameLength => write!(f, "MAXIMUM USERNAME LENGTH {MAX_USERNAME_LEN}"),
            Self::ActivePlayers(players) => {
                let plural = if players.len() == 1 { "" } else { "S" };
                write!(f, "{} OTHER PLAYER{plural} ACTIVE:", players.len())?;
                for (id, name) in players {
                    write!(f, "\t{id}-{name}")?;
                }
                Ok(())
            }
            Self::Chat { from, to, text } => {
                let from = from.as_deref().unwrap_or("YOU");
                write!(f, "{from} (TO {to}): {text}")
            }
            Self::Win => f.write_str("WIN"),
            Self::GameOver => f.write_str("GAME OVER"),
            Self::InvalidConnection => f.write_str("INVALID CONNECTION"),
            Self::Invalid => f.write_str("Invalid"),
            Self::Bye => f.write_str(FAREWELL),
            Self::Other(text) => f.write_str(text),
        }
    }
}
